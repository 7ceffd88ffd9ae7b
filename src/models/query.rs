// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

use crate::error::{IrodsError, Result};

/// Page size used for catalog queries.
pub const MAX_QUERY_ROWS: i32 = 500;

// Condition keywords the crate uses in key-value option sets.
pub const KW_FORCE_FLAG: &str = "forceFlag";
pub const KW_RECURSIVE_OPR: &str = "recursiveOpr";
pub const KW_DEST_RESC_NAME: &str = "destRescName";
pub const KW_RESC_NAME: &str = "rescName";
pub const KW_RESC_HIER: &str = "resc_hier";
pub const KW_REPLICA_TOKEN: &str = "replicaToken";
pub const KW_DATA_TYPE: &str = "dataType";
pub const KW_ADMIN: &str = "irodsAdmin";

/// `KeyValPair_PI`: parallel keyword/value arrays preceded by a count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "KeyValPair_PI")]
pub struct KeyValPair {
    #[serde(rename = "ssLen")]
    pub len: i32,
    #[serde(rename = "keyWord", default)]
    pub keys: Vec<String>,
    #[serde(rename = "svalue", default)]
    pub values: Vec<String>,
}

impl KeyValPair {
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.keys.push(key.into());
        self.values.push(value.into());
        self.len = self.keys.len() as i32;
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .position(|k| k == key)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }
}

/// `InxIvalPair_PI`: the select list (column id, aggregation flag).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "InxIvalPair_PI")]
pub struct InxIvalPair {
    #[serde(rename = "iiLen")]
    pub len: i32,
    #[serde(rename = "inx", default)]
    pub columns: Vec<i32>,
    #[serde(rename = "ivalue", default)]
    pub values: Vec<i32>,
}

impl InxIvalPair {
    pub fn add(&mut self, column: i32, value: i32) {
        self.columns.push(column);
        self.values.push(value);
        self.len = self.columns.len() as i32;
    }
}

/// `InxValPair_PI`: the condition list (column id, SQL-ish expression).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "InxValPair_PI")]
pub struct InxValPair {
    #[serde(rename = "isLen")]
    pub len: i32,
    #[serde(rename = "inx", default)]
    pub columns: Vec<i32>,
    #[serde(rename = "svalue", default)]
    pub values: Vec<String>,
}

impl InxValPair {
    pub fn add(&mut self, column: i32, expression: impl Into<String>) {
        self.columns.push(column);
        self.values.push(expression.into());
        self.len = self.columns.len() as i32;
    }
}

/// `GenQueryInp_PI`: one catalog query page request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "GenQueryInp_PI")]
pub struct GenQueryInp {
    #[serde(rename = "maxRows")]
    pub max_rows: i32,
    #[serde(rename = "continueInx")]
    pub continue_index: i32,
    #[serde(rename = "partialStartIndex")]
    pub partial_start_index: i32,
    pub options: i32,
    #[serde(rename = "KeyValPair_PI")]
    pub key_vals: KeyValPair,
    #[serde(rename = "InxIvalPair_PI")]
    pub selects: InxIvalPair,
    #[serde(rename = "InxValPair_PI")]
    pub conditions: InxValPair,
}

impl GenQueryInp {
    pub fn new() -> Self {
        Self {
            max_rows: MAX_QUERY_ROWS,
            continue_index: 0,
            partial_start_index: 0,
            options: 0,
            key_vals: KeyValPair::default(),
            selects: InxIvalPair::default(),
            conditions: InxValPair::default(),
        }
    }

    pub fn select(mut self, column: i32) -> Self {
        self.selects.add(column, 1);
        self
    }

    /// Adds an equality condition. Escaping happens at the codec layer.
    pub fn condition_eq(self, column: i32, value: &str) -> Self {
        self.condition(column, format!("= '{value}'"))
    }

    pub fn condition(mut self, column: i32, expression: impl Into<String>) -> Self {
        self.conditions.add(column, expression);
        self
    }
}

impl Default for GenQueryInp {
    fn default() -> Self {
        Self::new()
    }
}

/// `SqlResult_PI`: the value column for one selected attribute, one entry
/// per row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "SqlResult_PI")]
pub struct SqlResult {
    #[serde(rename = "attriInx")]
    pub attribute_index: i32,
    #[serde(rename = "reslen")]
    pub result_len: i32,
    #[serde(rename = "value", default)]
    pub values: Vec<String>,
}

/// `GenQueryOut_PI`: one page of catalog query results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "GenQueryOut_PI")]
pub struct GenQueryOut {
    #[serde(rename = "rowCnt")]
    pub row_count: i32,
    #[serde(rename = "attriCnt")]
    pub attribute_count: i32,
    #[serde(rename = "continueInx")]
    pub continue_index: i32,
    #[serde(rename = "totalRowCount", default)]
    pub total_row_count: i32,
    #[serde(rename = "SqlResult_PI", default)]
    pub results: Vec<SqlResult>,
}

impl GenQueryOut {
    /// Sanity-checks the advertised attribute/row counts against the
    /// arrays actually present.
    pub fn validate(&self) -> Result<()> {
        if self.attribute_count as usize > self.results.len() {
            return Err(IrodsError::protocol(
                "decode query result",
                format!(
                    "expected {} attributes, received {}",
                    self.attribute_count,
                    self.results.len()
                ),
            ));
        }
        for result in &self.results[..self.attribute_count as usize] {
            if result.values.len() < self.row_count as usize {
                return Err(IrodsError::protocol(
                    "decode query result",
                    format!(
                        "attribute {} carries {} rows, expected {}",
                        result.attribute_index,
                        result.values.len(),
                        self.row_count
                    ),
                ));
            }
        }
        Ok(())
    }
}
