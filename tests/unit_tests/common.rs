// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! An in-process iRODS server good enough to exercise the client stack
//! over real sockets: handshake, native auth, catalog queries with
//! continuation, data object io with replica tokens, metadata and ACL
//! listings. State lives in memory; every API call is counted so tests
//! can assert on wire traffic.

use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use dashmap::DashMap;
use irods_client_rs::{
    cfg::{
        config::{Account, FsConfig, SessionConfig},
        enums::{AuthScheme, CSNegotiationPolicy},
    },
    models::{
        api,
        codec,
        collection::CollInp,
        columns::*,
        data_object::{DataObjCopyInp, DataObjInp, FileLseekOut, HostStr, OpenedDataObjInp},
        descriptor::BinBytesBuf,
        error_codes,
        message::{
            MSG_TYPE_API_REPLY, MSG_TYPE_CS_NEG, MSG_TYPE_VERSION, Message, MessageHeader,
        },
        metadata::ModAvuMetadataInp,
        negotiation::CsNegotiation,
        proc_stat::*,
        query::{GenQueryInp, GenQueryOut, SqlResult},
        startup::StartupPack,
        types::open_flags,
    },
};
use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

pub const ZONE: &str = "testZone";
pub const OWNER: &str = "rods";
pub const HOME: &str = "/testZone/home/rods";
const MOCK_TIME: &str = "01598471234";

type Row = Vec<(i32, String)>;

struct FileData {
    id: i64,
    content: Vec<u8>,
}

struct Descriptor {
    path: String,
    offset: i64,
}

#[derive(Default)]
struct MockFs {
    collections: BTreeMap<String, i64>,
    files: BTreeMap<String, FileData>,
    metadata: HashMap<String, Vec<(i64, String, String, String)>>,
    descriptors: HashMap<i32, Descriptor>,
    pending_queries: HashMap<i32, Vec<Row>>,
    next_id: i64,
    next_fd: i32,
    next_continue: i32,
}

impl MockFs {
    fn new() -> Self {
        let mut fs = Self {
            next_id: 10_000,
            next_fd: 3,
            next_continue: 1,
            ..Self::default()
        };
        for path in ["/", "/testZone", "/testZone/home", HOME] {
            fs.add_collection(path);
        }
        fs
    }

    fn add_collection(&mut self, path: &str) -> i64 {
        if let Some(id) = self.collections.get(path) {
            return *id;
        }
        self.next_id += 1;
        self.collections.insert(path.to_string(), self.next_id);
        self.next_id
    }

    fn add_file(&mut self, path: &str, content: Vec<u8>) -> i64 {
        self.next_id += 1;
        self.files.insert(
            path.to_string(),
            FileData {
                id: self.next_id,
                content,
            },
        );
        self.next_id
    }

    fn open(&mut self, path: &str) -> i32 {
        let fd = self.next_fd;
        self.next_fd += 1;
        self.descriptors.insert(
            fd,
            Descriptor {
                path: path.to_string(),
                offset: 0,
            },
        );
        fd
    }
}

pub struct MockState {
    api_calls: DashMap<i32, u64>,
    pub connections_accepted: AtomicU64,
    fs: Mutex<MockFs>,
    negotiation_policy: CSNegotiationPolicy,
}

impl MockState {
    pub fn api_calls(&self, api_number: i32) -> u64 {
        self.api_calls.get(&api_number).map(|v| *v).unwrap_or(0)
    }

    pub fn seed_collection(&self, path: &str) {
        let mut fs = self.fs.lock().expect("mock fs lock");
        fs.add_collection(path);
    }

    pub fn seed_collections(&self, parent: &str, names: &[String]) {
        let mut fs = self.fs.lock().expect("mock fs lock");
        for name in names {
            let path = format!("{parent}/{name}");
            fs.add_collection(&path);
        }
    }

    pub fn seed_file(&self, path: &str, content: Vec<u8>) {
        let mut fs = self.fs.lock().expect("mock fs lock");
        fs.add_file(path, content);
    }

    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        let fs = self.fs.lock().expect("mock fs lock");
        fs.files.get(path).map(|f| f.content.clone())
    }

    pub fn has_collection(&self, path: &str) -> bool {
        let fs = self.fs.lock().expect("mock fs lock");
        fs.collections.contains_key(path)
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Result<Self> {
        Self::start_with_policy(CSNegotiationPolicy::DontCare).await
    }

    pub async fn start_with_policy(policy: CSNegotiationPolicy) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind mock listener")?;
        let addr = listener.local_addr()?;
        let state = Arc::new(MockState {
            api_calls: DashMap::new(),
            connections_accepted: AtomicU64::new(0),
            fs: Mutex::new(MockFs::new()),
            negotiation_policy: policy,
        });

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                accept_state
                    .connections_accepted
                    .fetch_add(1, Ordering::SeqCst);
                let conn_state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(conn_state, stream).await;
                });
            }
        });

        Ok(Self { addr, state })
    }

    pub fn account(&self) -> Account {
        let mut account = Account {
            host: "127.0.0.1".to_string(),
            port: self.addr.port(),
            zone: ZONE.to_string(),
            proxy_user: OWNER.to_string(),
            client_user: String::new(),
            client_zone: String::new(),
            password: "secret".to_string(),
            auth_scheme: AuthScheme::Native,
            default_resource: String::new(),
            client_server_negotiation: false,
            cs_negotiation_policy: CSNegotiationPolicy::RequireTcp,
            pam_ttl: 1,
            ssl: Default::default(),
        };
        account.validate_and_normalize().expect("valid mock account");
        account
    }

    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new("irods-client-rs-test");
        config.operation_timeout = Duration::from_secs(10);
        config.connection_init_number = 1;
        config
    }

    pub fn fs_config(&self) -> FsConfig {
        FsConfig {
            transfer_chunk_size: 256 * 1024,
            ..FsConfig::default()
        }
    }
}

// ── mock-side wire io ───────────────────────────────────────────────────

async fn read_frame(stream: &mut TcpStream) -> Result<Option<Message>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let header_len = u32::from_be_bytes(len_buf) as usize;
    let mut header_buf = vec![0u8; header_len];
    stream.read_exact(&mut header_buf).await?;
    let header: MessageHeader = codec::unmarshal(&header_buf)?;

    let mut body = vec![0u8; header.msg_len as usize];
    stream.read_exact(&mut body).await?;
    let mut error = vec![0u8; header.error_len as usize];
    stream.read_exact(&mut error).await?;
    let mut bs = vec![0u8; header.bs_len as usize];
    stream.read_exact(&mut bs).await?;

    Ok(Some(Message {
        msg_type: header.msg_type,
        int_info: header.int_info,
        body,
        error,
        bs: Bytes::from(bs),
    }))
}

async fn write_frame(stream: &mut TcpStream, msg: &Message) -> Result<()> {
    let header_xml = codec::marshal(&msg.header())?;
    stream
        .write_all(&(header_xml.len() as u32).to_be_bytes())
        .await?;
    stream.write_all(header_xml.as_bytes()).await?;
    stream.write_all(&msg.body).await?;
    stream.write_all(&msg.error).await?;
    stream.write_all(&msg.bs).await?;
    stream.flush().await?;
    Ok(())
}

fn reply_status(status: i32) -> Message {
    Message {
        msg_type: MSG_TYPE_API_REPLY.to_string(),
        int_info: status,
        ..Message::default()
    }
}

fn reply_body<T: serde::Serialize>(status: i32, body: &T) -> Result<Message> {
    Ok(Message {
        msg_type: MSG_TYPE_API_REPLY.to_string(),
        int_info: status,
        body: codec::marshal(body)?.into_bytes(),
        ..Message::default()
    })
}

// ── connection lifecycle ────────────────────────────────────────────────

async fn serve_connection(state: Arc<MockState>, mut stream: TcpStream) -> Result<()> {
    let Some(startup_msg) = read_frame(&mut stream).await? else {
        return Ok(());
    };
    let startup: StartupPack = codec::unmarshal(&startup_msg.body)?;

    if startup.requests_negotiation() {
        let announce = CsNegotiation {
            status: 1,
            result: state.negotiation_policy.as_wire().to_string(),
        };
        let mut msg = reply_body(0, &announce)?;
        msg.msg_type = MSG_TYPE_CS_NEG.to_string();
        write_frame(&mut stream, &msg).await?;

        let Some(client_reply) = read_frame(&mut stream).await? else {
            return Ok(());
        };
        let _: CsNegotiation = codec::unmarshal(&client_reply.body)?;
    }

    let version = irods_client_rs::models::startup::VersionReply {
        status: 0,
        rel_version: "rods4.3.1".to_string(),
        api_version: "d".to_string(),
        reconn_port: 0,
        reconn_addr: String::new(),
        cookie: 400,
    };
    let mut msg = reply_body(0, &version)?;
    msg.msg_type = MSG_TYPE_VERSION.to_string();
    write_frame(&mut stream, &msg).await?;

    while let Some(request) = read_frame(&mut stream).await? {
        match request.msg_type.as_str() {
            "RODS_API_REQ" => {
                *state.api_calls.entry(request.int_info).or_insert(0) += 1;
                let reply = handle_api(&state, &request)?;
                write_frame(&mut stream, &reply).await?;
            }
            "RODS_DISCONNECT" => break,
            other => bail!("mock got unexpected message type {other}"),
        }
    }
    Ok(())
}

fn handle_api(state: &MockState, request: &Message) -> Result<Message> {
    match request.int_info {
        api::AUTH_REQUEST_AN => {
            let challenge = BASE64.encode([7u8; 64]);
            reply_body(
                0,
                &irods_client_rs::models::auth::AuthChallenge { challenge },
            )
        }
        api::AUTH_RESPONSE_AN
        | api::GET_MISC_SVR_INFO_AN
        | api::MOD_ACCESS_CONTROL_AN
        | api::END_TRANSACTION_AN => Ok(reply_status(0)),
        api::GEN_QUERY_AN => {
            let inp: GenQueryInp = codec::unmarshal(&request.body)?;
            let mut fs = state.fs.lock().expect("mock fs lock");
            match run_mock_query(&mut fs, &inp) {
                Some(out) => reply_body(0, &out),
                None => Ok(reply_status(error_codes::CAT_NO_ROWS_FOUND)),
            }
        }
        api::COLL_CREATE_AN => {
            let inp: CollInp = codec::unmarshal(&request.body)?;
            let mut fs = state.fs.lock().expect("mock fs lock");
            if fs.collections.contains_key(&inp.coll_name) {
                return Ok(reply_status(error_codes::CAT_NAME_EXISTS_AS_COLLECTION));
            }
            let parent = parent_of(&inp.coll_name);
            if !fs.collections.contains_key(&parent) {
                return Ok(reply_status(error_codes::CAT_UNKNOWN_COLLECTION));
            }
            fs.add_collection(&inp.coll_name);
            Ok(reply_status(0))
        }
        api::RM_COLL_AN => {
            let inp: CollInp = codec::unmarshal(&request.body)?;
            let mut fs = state.fs.lock().expect("mock fs lock");
            if !fs.collections.contains_key(&inp.coll_name) {
                return Ok(reply_status(error_codes::CAT_NO_ROWS_FOUND));
            }
            let prefix = format!("{}/", inp.coll_name);
            let recursive = inp.key_vals.get("recursiveOpr").is_some();
            let has_children = fs.collections.keys().any(|c| c.starts_with(&prefix))
                || fs.files.keys().any(|f| f.starts_with(&prefix));
            if has_children && !recursive {
                return Ok(reply_status(error_codes::CAT_COLLECTION_NOT_EMPTY));
            }
            fs.collections.retain(|c, _| c != &inp.coll_name && !c.starts_with(&prefix));
            fs.files.retain(|f, _| !f.starts_with(&prefix));
            Ok(reply_status(0))
        }
        api::DATA_OBJ_CREATE_AN => {
            let inp: DataObjInp = codec::unmarshal(&request.body)?;
            let mut fs = state.fs.lock().expect("mock fs lock");
            let force = inp.key_vals.get("forceFlag").is_some();
            if fs.files.contains_key(&inp.obj_path) && !force {
                return Ok(reply_status(error_codes::OVERWRITE_WITHOUT_FORCE_FLAG));
            }
            if !fs.collections.contains_key(&parent_of(&inp.obj_path)) {
                return Ok(reply_status(error_codes::CAT_UNKNOWN_COLLECTION));
            }
            fs.add_file(&inp.obj_path, Vec::new());
            Ok(reply_status(fs.open(&inp.obj_path)))
        }
        api::DATA_OBJ_OPEN_AN => {
            let inp: DataObjInp = codec::unmarshal(&request.body)?;
            let mut fs = state.fs.lock().expect("mock fs lock");
            if !fs.files.contains_key(&inp.obj_path) {
                if inp.open_flags & open_flags::O_CREAT != 0 {
                    fs.add_file(&inp.obj_path, Vec::new());
                } else {
                    return Ok(reply_status(error_codes::CAT_NO_ROWS_FOUND));
                }
            } else if inp.open_flags & open_flags::O_TRUNC != 0 {
                if let Some(file) = fs.files.get_mut(&inp.obj_path) {
                    file.content.clear();
                }
            }
            Ok(reply_status(fs.open(&inp.obj_path)))
        }
        api::DATA_OBJ_LSEEK_AN => {
            let inp: OpenedDataObjInp = codec::unmarshal(&request.body)?;
            let mut fs = state.fs.lock().expect("mock fs lock");
            let Some(size) = fs
                .descriptors
                .get(&inp.descriptor)
                .and_then(|d| fs.files.get(&d.path))
                .map(|f| f.content.len() as i64)
            else {
                return Ok(reply_status(error_codes::SYS_FILE_DESC_OUT_OF_RANGE));
            };
            let desc = fs.descriptors.get_mut(&inp.descriptor).expect("descriptor");
            desc.offset = match inp.whence {
                0 => inp.offset,
                1 => desc.offset + inp.offset,
                _ => size + inp.offset,
            };
            let offset = desc.offset;
            reply_body(0, &FileLseekOut { offset })
        }
        api::DATA_OBJ_READ_AN => {
            let inp: OpenedDataObjInp = codec::unmarshal(&request.body)?;
            let mut fs = state.fs.lock().expect("mock fs lock");
            let Some(desc_path) = fs.descriptors.get(&inp.descriptor).map(|d| d.path.clone())
            else {
                return Ok(reply_status(error_codes::SYS_FILE_DESC_OUT_OF_RANGE));
            };
            let offset = fs.descriptors[&inp.descriptor].offset as usize;
            let content = &fs.files.get(&desc_path).expect("file").content;
            let end = (offset + inp.len as usize).min(content.len());
            let chunk = if offset < end {
                content[offset..end].to_vec()
            } else {
                Vec::new()
            };
            let n = chunk.len();
            fs.descriptors.get_mut(&inp.descriptor).expect("descriptor").offset += n as i64;
            Ok(Message {
                msg_type: MSG_TYPE_API_REPLY.to_string(),
                int_info: n as i32,
                bs: Bytes::from(chunk),
                ..Message::default()
            })
        }
        api::DATA_OBJ_WRITE_AN => {
            let inp: OpenedDataObjInp = codec::unmarshal(&request.body)?;
            let data = request.bs.clone();
            let mut fs = state.fs.lock().expect("mock fs lock");
            let Some(desc_path) = fs.descriptors.get(&inp.descriptor).map(|d| d.path.clone())
            else {
                return Ok(reply_status(error_codes::SYS_FILE_DESC_OUT_OF_RANGE));
            };
            let offset = fs.descriptors[&inp.descriptor].offset as usize;
            let file = fs.files.get_mut(&desc_path).expect("file");
            if file.content.len() < offset + data.len() {
                file.content.resize(offset + data.len(), 0);
            }
            file.content[offset..offset + data.len()].copy_from_slice(&data);
            fs.descriptors.get_mut(&inp.descriptor).expect("descriptor").offset +=
                data.len() as i64;
            Ok(reply_status(data.len() as i32))
        }
        api::DATA_OBJ_CLOSE_AN => {
            let inp: OpenedDataObjInp = codec::unmarshal(&request.body)?;
            let mut fs = state.fs.lock().expect("mock fs lock");
            fs.descriptors.remove(&inp.descriptor);
            Ok(reply_status(0))
        }
        api::DATA_OBJ_UNLINK_AN => {
            let inp: DataObjInp = codec::unmarshal(&request.body)?;
            let mut fs = state.fs.lock().expect("mock fs lock");
            match fs.files.remove(&inp.obj_path) {
                Some(_) => Ok(reply_status(0)),
                None => Ok(reply_status(error_codes::CAT_NO_ROWS_FOUND)),
            }
        }
        api::DATA_OBJ_RENAME_AN => {
            let inp: DataObjCopyInp = codec::unmarshal(&request.body)?;
            let [src, dest] = &inp.objects[..] else {
                bail!("rename expects two DataObjInp entries");
            };
            let mut fs = state.fs.lock().expect("mock fs lock");
            if let Some(file) = fs.files.remove(&src.obj_path) {
                fs.files.insert(dest.obj_path.clone(), file);
                return Ok(reply_status(0));
            }
            if let Some(id) = fs.collections.remove(&src.obj_path) {
                fs.collections.insert(dest.obj_path.clone(), id);
                return Ok(reply_status(0));
            }
            Ok(reply_status(error_codes::CAT_NO_ROWS_FOUND))
        }
        api::DATA_OBJ_COPY_AN => {
            let inp: DataObjCopyInp = codec::unmarshal(&request.body)?;
            let [src, dest] = &inp.objects[..] else {
                bail!("copy expects two DataObjInp entries");
            };
            let mut fs = state.fs.lock().expect("mock fs lock");
            let Some(content) = fs.files.get(&src.obj_path).map(|f| f.content.clone()) else {
                return Ok(reply_status(error_codes::CAT_NO_ROWS_FOUND));
            };
            fs.add_file(&dest.obj_path, content);
            Ok(reply_status(0))
        }
        api::DATA_OBJ_TRUNCATE_AN => {
            let inp: DataObjInp = codec::unmarshal(&request.body)?;
            let mut fs = state.fs.lock().expect("mock fs lock");
            match fs.files.get_mut(&inp.obj_path) {
                Some(file) => {
                    file.content.resize(inp.data_size.max(0) as usize, 0);
                    Ok(reply_status(0))
                }
                None => Ok(reply_status(error_codes::CAT_NO_ROWS_FOUND)),
            }
        }
        api::GET_HOST_FOR_PUT_AN | api::GET_HOST_FOR_GET_AN => reply_body(
            0,
            &HostStr {
                host: "thisAddress".to_string(),
            },
        ),
        api::GET_FILE_DESCRIPTOR_INFO_APN => {
            let inp: BinBytesBuf = codec::unmarshal(&request.body)?;
            let doc = inp.json()?;
            let fd = doc.get("fd").and_then(|v| v.as_i64()).unwrap_or(-1);
            let fs = state.fs.lock().expect("mock fs lock");
            if !fs.descriptors.contains_key(&(fd as i32)) {
                return Ok(reply_status(error_codes::SYS_FILE_DESC_OUT_OF_RANGE));
            }
            let payload = json!({
                "replica_token": "mock-replica-token",
                "data_object_info": { "resource_hierarchy": "demoResc" },
            });
            reply_body(0, &BinBytesBuf::from_json(&payload))
        }
        api::REPLICA_CLOSE_APN => {
            let inp: BinBytesBuf = codec::unmarshal(&request.body)?;
            let doc = inp.json()?;
            let fd = doc.get("fd").and_then(|v| v.as_i64()).unwrap_or(-1);
            let mut fs = state.fs.lock().expect("mock fs lock");
            fs.descriptors.remove(&(fd as i32));
            Ok(reply_status(0))
        }
        api::MOD_AVU_METADATA_AN => {
            let inp: ModAvuMetadataInp = codec::unmarshal(&request.body)?;
            let mut fs = state.fs.lock().expect("mock fs lock");
            let metas = fs.metadata.entry(inp.arg2.clone()).or_default();
            match inp.arg0.as_str() {
                "add" => {
                    let id = metas.len() as i64 + 1;
                    metas.push((id, inp.arg3, inp.arg4, inp.arg5));
                }
                "rm" => {
                    metas.retain(|(_, a, v, u)| {
                        !(a == &inp.arg3 && v == &inp.arg4 && u == &inp.arg5)
                    });
                }
                other => bail!("mock got unexpected metadata op {other}"),
            }
            Ok(reply_status(0))
        }
        api::PROC_STAT_AN => {
            let table = GenQueryOut {
                row_count: 1,
                attribute_count: 9,
                continue_index: 0,
                total_row_count: 1,
                results: vec![
                    proc_col(PROC_PID_INDEX, "1234"),
                    proc_col(PROC_STARTTIME_INDEX, MOCK_TIME),
                    proc_col(PROC_CLIENT_NAME_INDEX, OWNER),
                    proc_col(PROC_CLIENT_ZONE_INDEX, ZONE),
                    proc_col(PROC_PROXY_NAME_INDEX, OWNER),
                    proc_col(PROC_PROXY_ZONE_INDEX, ZONE),
                    proc_col(PROC_REMOTE_ADDR_INDEX, "127.0.0.1"),
                    proc_col(PROC_SERVER_ADDR_INDEX, "127.0.0.1"),
                    proc_col(PROC_PROG_NAME_INDEX, "irods-client-rs-test"),
                ],
            };
            reply_body(0, &table)
        }
        other => bail!("mock has no handler for api {other}"),
    }
}

fn proc_col(index: i32, value: &str) -> SqlResult {
    SqlResult {
        attribute_index: index,
        result_len: value.len() as i32 + 1,
        values: vec![value.to_string()],
    }
}

fn parent_of(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

// ── query engine ────────────────────────────────────────────────────────

fn cond_value(inp: &GenQueryInp, column: i32) -> Option<String> {
    inp.conditions
        .columns
        .iter()
        .position(|c| *c == column)
        .map(|i| {
            inp.conditions.values[i]
                .trim()
                .trim_start_matches("=")
                .trim()
                .trim_matches('\'')
                .to_string()
        })
}

fn has_select(inp: &GenQueryInp, column: i32) -> bool {
    inp.selects.columns.contains(&column)
}

fn collection_row(path: &str, id: i64) -> Row {
    vec![
        (COL_COLL_ID, id.to_string()),
        (COL_COLL_NAME, path.to_string()),
        (COL_COLL_OWNER_NAME, OWNER.to_string()),
        (COL_COLL_OWNER_ZONE, ZONE.to_string()),
        (COL_COLL_CREATE_TIME, MOCK_TIME.to_string()),
        (COL_COLL_MODIFY_TIME, MOCK_TIME.to_string()),
        (COL_COLL_INHERITANCE, "0".to_string()),
    ]
}

fn data_object_row(path: &str, file: &FileData) -> Row {
    let name = path.rsplit('/').next().unwrap_or(path);
    vec![
        (COL_D_DATA_ID, file.id.to_string()),
        (COL_DATA_NAME, name.to_string()),
        (COL_DATA_SIZE, file.content.len().to_string()),
        (COL_DATA_TYPE_NAME, "generic".to_string()),
        (COL_DATA_REPL_NUM, "0".to_string()),
        (COL_D_OWNER_NAME, OWNER.to_string()),
        (COL_D_OWNER_ZONE, ZONE.to_string()),
        (COL_D_DATA_CHECKSUM, String::new()),
        (COL_D_DATA_STATUS, String::new()),
        (COL_D_RESC_NAME, "demoResc".to_string()),
        (COL_D_DATA_PATH, format!("/var/lib/irods{path}")),
        (COL_D_RESC_HIER, "demoResc".to_string()),
        (COL_D_CREATE_TIME, MOCK_TIME.to_string()),
        (COL_D_MODIFY_TIME, MOCK_TIME.to_string()),
    ]
}

fn user_row(id: i64, name: &str, user_type: &str) -> Row {
    vec![
        (COL_USER_ID, id.to_string()),
        (COL_USER_NAME, name.to_string()),
        (COL_USER_ZONE, ZONE.to_string()),
        (COL_USER_TYPE, user_type.to_string()),
    ]
}

fn rows_for_query(fs: &MockFs, inp: &GenQueryInp) -> Vec<Row> {
    // ACL listings
    if has_select(inp, COL_COLL_ACCESS_NAME) || has_select(inp, COL_DATA_ACCESS_NAME) {
        let access_col = if has_select(inp, COL_COLL_ACCESS_NAME) {
            COL_COLL_ACCESS_NAME
        } else {
            COL_DATA_ACCESS_NAME
        };
        return vec![vec![
            (access_col, "own".to_string()),
            (COL_USER_NAME, OWNER.to_string()),
            (COL_USER_ZONE, ZONE.to_string()),
            (COL_USER_TYPE, "rodsadmin".to_string()),
        ]];
    }

    // metadata listings
    if has_select(inp, COL_META_COLL_ATTR_NAME) {
        let Some(path) = cond_value(inp, COL_COLL_NAME) else {
            return Vec::new();
        };
        return metadata_rows(fs, &path, true);
    }
    if has_select(inp, COL_META_DATA_ATTR_NAME) {
        let (Some(parent), Some(name)) =
            (cond_value(inp, COL_COLL_NAME), cond_value(inp, COL_DATA_NAME))
        else {
            return Vec::new();
        };
        let path = format!("{}/{}", parent.trim_end_matches('/'), name);
        return metadata_rows(fs, &path, false);
    }

    // user-groups of one user
    if has_select(inp, COL_USER_GROUP_NAME) && !has_select(inp, COL_USER_ID) {
        return vec![vec![(COL_USER_GROUP_NAME, "public".to_string())]];
    }

    // group members
    if let Some(group) = cond_value(inp, COL_USER_GROUP_NAME) {
        return vec![
            user_row(9001, &group, "rodsgroup"),
            user_row(9002, OWNER, "rodsadmin"),
            user_row(9003, "alice", "rodsuser"),
        ];
    }

    // users / groups listings
    if has_select(inp, COL_USER_ID) {
        let type_cond = inp
            .conditions
            .columns
            .iter()
            .position(|c| *c == COL_USER_TYPE)
            .map(|i| inp.conditions.values[i].clone())
            .unwrap_or_default();
        if type_cond.contains("= 'rodsgroup'") {
            return vec![user_row(9001, "public", "rodsgroup")];
        }
        return vec![
            user_row(9002, OWNER, "rodsadmin"),
            user_row(9003, "alice", "rodsuser"),
        ];
    }

    // data objects by collection id
    if let Some(coll_id) = cond_value(inp, COL_D_COLL_ID) {
        let coll_id: i64 = coll_id.parse().unwrap_or(-1);
        let Some(coll_path) = fs
            .collections
            .iter()
            .find(|(_, id)| **id == coll_id)
            .map(|(p, _)| p.clone())
        else {
            return Vec::new();
        };
        let prefix = format!("{}/", coll_path.trim_end_matches('/'));
        let name_filter = cond_value(inp, COL_DATA_NAME);
        return fs
            .files
            .iter()
            .filter(|(path, _)| {
                path.starts_with(&prefix) && !path[prefix.len()..].contains('/')
            })
            .filter(|(path, _)| match &name_filter {
                Some(name) => path[prefix.len()..] == *name,
                None => true,
            })
            .map(|(path, file)| data_object_row(path, file))
            .collect();
    }

    // child collections
    if let Some(parent) = cond_value(inp, COL_COLL_PARENT_NAME) {
        let prefix = format!("{}/", parent.trim_end_matches('/'));
        return fs
            .collections
            .iter()
            .filter(|(path, _)| {
                path.starts_with(&prefix) && !path[prefix.len()..].contains('/')
            })
            .map(|(path, id)| collection_row(path, *id))
            .collect();
    }

    // one collection by path
    if let Some(path) = cond_value(inp, COL_COLL_NAME) {
        return fs
            .collections
            .get(&path)
            .map(|id| vec![collection_row(&path, *id)])
            .into_iter()
            .flatten()
            .collect();
    }

    Vec::new()
}

fn metadata_rows(fs: &MockFs, path: &str, collection: bool) -> Vec<Row> {
    let (id_col, name_col, value_col, units_col) = if collection {
        (
            COL_META_COLL_ATTR_ID,
            COL_META_COLL_ATTR_NAME,
            COL_META_COLL_ATTR_VALUE,
            COL_META_COLL_ATTR_UNITS,
        )
    } else {
        (
            COL_META_DATA_ATTR_ID,
            COL_META_DATA_ATTR_NAME,
            COL_META_DATA_ATTR_VALUE,
            COL_META_DATA_ATTR_UNITS,
        )
    };
    fs.metadata
        .get(path)
        .map(|metas| {
            metas
                .iter()
                .map(|(id, attr, value, units)| {
                    vec![
                        (id_col, id.to_string()),
                        (name_col, attr.clone()),
                        (value_col, value.clone()),
                        (units_col, units.clone()),
                    ]
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Runs one query page, honoring `max_rows` and the continuation index.
fn run_mock_query(fs: &mut MockFs, inp: &GenQueryInp) -> Option<GenQueryOut> {
    let mut rows = if inp.continue_index != 0 {
        fs.pending_queries.remove(&inp.continue_index)?
    } else {
        rows_for_query(fs, inp)
    };
    if rows.is_empty() {
        return None;
    }

    let max_rows = if inp.max_rows > 0 { inp.max_rows as usize } else { rows.len() };
    let mut continue_index = 0;
    if rows.len() > max_rows {
        let rest = rows.split_off(max_rows);
        continue_index = fs.next_continue;
        fs.next_continue += 1;
        fs.pending_queries.insert(continue_index, rest);
    }

    let columns: Vec<i32> = rows[0].iter().map(|(c, _)| *c).collect();
    let results: Vec<SqlResult> = columns
        .iter()
        .map(|col| SqlResult {
            attribute_index: *col,
            result_len: 64,
            values: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .find(|(c, _)| c == col)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default()
                })
                .collect(),
        })
        .collect();

    Some(GenQueryOut {
        row_count: rows.len() as i32,
        attribute_count: results.len() as i32,
        continue_index,
        total_row_count: rows.len() as i32,
        results,
    })
}
