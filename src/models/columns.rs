// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! iCAT general-query column ids. The values are stable across server
//! versions; only the ones the crate selects or filters on are listed.

// users / groups
pub const COL_USER_ID: i32 = 201;
pub const COL_USER_NAME: i32 = 202;
pub const COL_USER_TYPE: i32 = 203;
pub const COL_USER_ZONE: i32 = 204;
pub const COL_USER_GROUP_ID: i32 = 900;
pub const COL_USER_GROUP_NAME: i32 = 901;

// resources
pub const COL_R_RESC_ID: i32 = 301;
pub const COL_R_RESC_NAME: i32 = 302;
pub const COL_R_ZONE_NAME: i32 = 303;
pub const COL_R_TYPE_NAME: i32 = 304;
pub const COL_R_LOC: i32 = 306;

// data objects / replicas
pub const COL_D_DATA_ID: i32 = 401;
pub const COL_D_COLL_ID: i32 = 402;
pub const COL_DATA_NAME: i32 = 403;
pub const COL_DATA_REPL_NUM: i32 = 404;
pub const COL_DATA_TYPE_NAME: i32 = 406;
pub const COL_DATA_SIZE: i32 = 407;
pub const COL_D_RESC_NAME: i32 = 409;
pub const COL_D_DATA_PATH: i32 = 410;
pub const COL_D_OWNER_NAME: i32 = 411;
pub const COL_D_OWNER_ZONE: i32 = 412;
pub const COL_D_REPL_STATUS: i32 = 413;
pub const COL_D_DATA_STATUS: i32 = 414;
pub const COL_D_DATA_CHECKSUM: i32 = 415;
pub const COL_D_CREATE_TIME: i32 = 419;
pub const COL_D_MODIFY_TIME: i32 = 420;
pub const COL_D_RESC_HIER: i32 = 422;

// collections
pub const COL_COLL_ID: i32 = 500;
pub const COL_COLL_NAME: i32 = 501;
pub const COL_COLL_PARENT_NAME: i32 = 502;
pub const COL_COLL_OWNER_NAME: i32 = 503;
pub const COL_COLL_OWNER_ZONE: i32 = 504;
pub const COL_COLL_INHERITANCE: i32 = 506;
pub const COL_COLL_CREATE_TIME: i32 = 508;
pub const COL_COLL_MODIFY_TIME: i32 = 509;

// metadata
pub const COL_META_DATA_ATTR_NAME: i32 = 600;
pub const COL_META_DATA_ATTR_VALUE: i32 = 601;
pub const COL_META_DATA_ATTR_UNITS: i32 = 602;
pub const COL_META_DATA_ATTR_ID: i32 = 603;
pub const COL_META_COLL_ATTR_NAME: i32 = 610;
pub const COL_META_COLL_ATTR_VALUE: i32 = 611;
pub const COL_META_COLL_ATTR_UNITS: i32 = 612;
pub const COL_META_COLL_ATTR_ID: i32 = 613;

// access control
pub const COL_DATA_ACCESS_TYPE: i32 = 700;
pub const COL_DATA_ACCESS_NAME: i32 = 701;
pub const COL_DATA_TOKEN_NAMESPACE: i32 = 702;
pub const COL_DATA_ACCESS_USER_ID: i32 = 703;
pub const COL_DATA_ACCESS_DATA_ID: i32 = 704;
pub const COL_COLL_ACCESS_TYPE: i32 = 710;
pub const COL_COLL_ACCESS_NAME: i32 = 711;
pub const COL_COLL_TOKEN_NAMESPACE: i32 = 712;
pub const COL_COLL_ACCESS_USER_ID: i32 = 713;
pub const COL_COLL_ACCESS_COLL_ID: i32 = 714;
