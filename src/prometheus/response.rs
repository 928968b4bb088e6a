//! Typed view of the `/api/v1/query_range` response body.
//!
//! Only the fields the pipeline reads are modelled. A matrix series carries
//! `values`; a vector series carries a single `value`. Both are accepted so
//! that a non-matrix `resultType` degrades to best-effort parsing.

use std::collections::HashMap;

use serde::Deserialize;

pub const RESULT_TYPE_MATRIX: &str = "matrix";

/// One `[unix_seconds, "value"]` pair.
pub type Sample = (f64, String);

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRangeResponse {
    #[serde(default)]
    pub status: Option<String>,
    pub data: QueryRangeData,
}

impl QueryRangeResponse {
    /// `false` only when the server reported a status other than `success`.
    pub fn is_success(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == "success")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRangeData {
    #[serde(rename = "resultType", default)]
    pub result_type: Option<String>,
    #[serde(default)]
    pub result: Vec<Series>,
}

impl QueryRangeData {
    pub fn is_matrix(&self) -> bool {
        self.result_type.as_deref() == Some(RESULT_TYPE_MATRIX)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    #[serde(default)]
    pub values: Vec<Sample>,
    #[serde(default)]
    pub value: Option<Sample>,
}

impl Series {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.metric.get(name).map(String::as_str)
    }

    /// Most recent sample: the last of `values`, else the instant `value`.
    pub fn latest(&self) -> Option<&Sample> {
        self.values.last().or(self.value.as_ref())
    }
}
