//! Wire format for RFC requests and responses.
//!
//! Requests arrive as UTF-8 JSON:
//! `{"function": "...", "parameters": [{"name": "...", "value": <number|string>}, ...]}`.
//!
//! Responses use one of three fixed shapes so a receiver can discriminate
//! by key presence without a type tag:
//! - `{"result": {...}}` for a successful call
//! - `{"rfcError": "...", "code": <int>}` for a backend failure (code optional)
//! - `{"error": "..."}` for a request that failed validation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::error;

/// A decoded RFC request.
#[derive(Debug, Clone, Deserialize)]
pub struct RfcRequest {
    pub function: String,
    pub parameters: Vec<Parameter>,
}

/// A single named call parameter. Names need not be unique within a request.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: ParamValue,
}

/// A parameter value; only numbers and strings are accepted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

/// Opaque decode failure. The precise cause is logged, never exposed to the
/// caller, so clients only ever see the generic malformed-request response.
#[derive(Debug, Error)]
#[error("malformed RFC request")]
pub struct DecodeError;

/// Decode raw request bytes into an [`RfcRequest`].
pub fn decode(message: &[u8]) -> Result<RfcRequest, DecodeError> {
    serde_json::from_slice(message).map_err(|reason| {
        error!(reason = %reason, "Malformed RFC request");
        DecodeError
    })
}

/// The closed set of responses the bridge can produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// Successful backend call carrying its result mapping.
    Success { result: Map<String, Value> },
    /// The backend rejected or failed the call.
    RfcError {
        #[serde(rename = "rfcError")]
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<i64>,
    },
    /// The request never reached the backend because it failed validation.
    Invalid {
        #[serde(rename = "error")]
        message: String,
    },
}

/// Encode a [`Response`] into raw bytes.
pub fn encode(response: &Response) -> Vec<u8> {
    // The enum is closed and every variant is plain JSON data; a failure here
    // is a programming error and must not be handled quietly.
    serde_json::to_vec(response).expect("response serialization is infallible")
}
