//! Outbound message schema.
//!
//! ```json
//! {"container_id": "...", "type": "...",
//!  "data": [{"timestamp": "...", "unit": "...", "type": "...", "name": "...", "value": "..."}]}
//! ```

use serde::{Deserialize, Serialize};

/// One timestamped value inside a [`MetricRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub value: String,
}

/// The unit of publication on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub container_id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub data: Vec<DataPoint>,
}

impl MetricRecord {
    /// JSON-encode as UTF-8 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
