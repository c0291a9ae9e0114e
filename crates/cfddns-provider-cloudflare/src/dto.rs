//! Cloudflare API v4 wire types
//!
//! Only the fields cfddns reads are modelled; everything else in the
//! responses is ignored.

use serde::{Deserialize, Serialize};

/// Envelope shared by every v4 response
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub errors: Vec<ApiMessage>,

    pub result: Option<T>,
}

/// One entry of the `errors` array
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiMessage {
    #[serde(default)]
    pub code: i64,

    #[serde(default)]
    pub message: String,
}

/// Error-only body, used when a non-2xx response is not a full envelope
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Zone {
    pub id: String,

    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Record {
    pub id: String,

    #[serde(rename = "type")]
    pub record_type: String,

    pub name: String,

    #[serde(default)]
    pub content: String,
}

/// PATCH body; only the content changes
#[derive(Debug, Serialize)]
pub(crate) struct ContentPatch<'a> {
    pub content: &'a str,
}

/// `"[1003] Invalid or missing zone id, [9109] Unauthorized"`
pub(crate) fn describe(errors: &[ApiMessage]) -> String {
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}
