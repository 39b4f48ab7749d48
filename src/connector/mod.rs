//! The RFC backend seam.
//!
//! The bridge treats the backend as an opaque capability: one call operation
//! that either returns a result mapping or fails with [`RfcCallError`].
//! [`GrpcRfcConnector`] is the production implementation; tests substitute
//! their own.

mod grpc;

pub use grpc::GrpcRfcConnector;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::codec::ParamValue;

/// Raised by a connector when the backend rejects or fails a call.
#[derive(Debug, Error)]
#[error("RFC call failed: {message}")]
pub struct RfcCallError {
    pub message: String,
    /// Backend-specific numeric code, when the connector reports one.
    pub code: Option<i64>,
}

/// An established connection to the RFC backend.
///
/// The connection is created once at startup and reused for every request;
/// the single-consumer dispatch loop guarantees it is never called
/// concurrently.
#[async_trait]
pub trait RfcConnector: Send + Sync {
    /// Invoke `function` on the backend with the given keyword parameters.
    async fn call(
        &self,
        function: &str,
        parameters: HashMap<String, ParamValue>,
    ) -> Result<Map<String, Value>, RfcCallError>;
}
