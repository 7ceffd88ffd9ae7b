// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

use crate::{
    cfg::config::Account,
    error::{IrodsError, Result},
    models::types::Version,
};

/// Release/API identifiers this client announces.
pub const CLIENT_RELEASE_VERSION: &str = "rods4.3.0";
pub const CLIENT_API_VERSION: &str = "d";

/// Option token appended to the startup pack when the account wants
/// client/server negotiation.
pub const REQUEST_NEGOTIATION_OPTION: &str = "request_server_negotiation";

/// `StartupPack_PI`: the first message on every connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "StartupPack_PI")]
pub struct StartupPack {
    #[serde(rename = "irodsProt")]
    pub irods_prot: i32,
    #[serde(rename = "reconnFlag")]
    pub reconn_flag: i32,
    #[serde(rename = "connectCnt")]
    pub connect_cnt: i32,
    #[serde(rename = "proxyUser")]
    pub proxy_user: String,
    #[serde(rename = "proxyRcatZone")]
    pub proxy_rcat_zone: String,
    #[serde(rename = "clientUser")]
    pub client_user: String,
    #[serde(rename = "clientRcatZone")]
    pub client_rcat_zone: String,
    #[serde(rename = "relVersion")]
    pub rel_version: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    #[serde(rename = "option")]
    pub option: String,
}

impl StartupPack {
    pub fn new(account: &Account, application_name: &str) -> Self {
        let mut option = application_name.to_string();
        if account.client_server_negotiation {
            option.push(';');
            option.push_str(REQUEST_NEGOTIATION_OPTION);
        }

        Self {
            irods_prot: 1,
            reconn_flag: 0,
            connect_cnt: 0,
            proxy_user: account.proxy_user.clone(),
            proxy_rcat_zone: account.zone.clone(),
            client_user: account.client_user.clone(),
            client_rcat_zone: account.client_zone.clone(),
            rel_version: CLIENT_RELEASE_VERSION.to_string(),
            api_version: CLIENT_API_VERSION.to_string(),
            option,
        }
    }

    pub fn requests_negotiation(&self) -> bool {
        self.option.contains(REQUEST_NEGOTIATION_OPTION)
    }
}

/// `Version_PI`: the server's handshake reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Version_PI")]
pub struct VersionReply {
    pub status: i32,
    #[serde(rename = "relVersion")]
    pub rel_version: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    #[serde(rename = "reconnPort", default)]
    pub reconn_port: i32,
    #[serde(rename = "reconnAddr", default)]
    pub reconn_addr: String,
    #[serde(default)]
    pub cookie: i32,
}

impl VersionReply {
    pub fn into_version(self) -> Result<Version> {
        if self.status < 0 {
            return Err(IrodsError::protocol(
                "handshake",
                format!("server version reply carried status {}", self.status),
            ));
        }
        Ok(Version {
            release_version: self.rel_version,
            api_version: self.api_version,
            cookie: self.cookie,
        })
    }
}
