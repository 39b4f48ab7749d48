//! The bridge between raw transport payloads and the RFC backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::codec::{self, ParamValue, Response};
use crate::connector::RfcConnector;
use crate::processor::MessageProcessor;

/// The concrete [`MessageProcessor`]: decode, call the backend, encode.
///
/// Every failure mode maps to exactly one [`Response`] variant, so `process`
/// always returns an encoded response and never propagates an error.
pub struct RfcBridge<C> {
    connector: C,
}

impl<C: RfcConnector> RfcBridge<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl<C: RfcConnector> MessageProcessor for RfcBridge<C> {
    async fn process(&self, request: &[u8]) -> Vec<u8> {
        let rfc = match codec::decode(request) {
            Ok(rfc) => rfc,
            Err(_) => {
                return codec::encode(&Response::Invalid {
                    message: "Malformed RFC request".to_string(),
                });
            }
        };

        debug!(
            function = %rfc.function,
            parameters = rfc.parameters.len(),
            "Dispatching RFC call"
        );

        // Later duplicates overwrite earlier ones, matching keyword expansion
        // on the backend side.
        let parameters: HashMap<String, ParamValue> = rfc
            .parameters
            .into_iter()
            .map(|parameter| (parameter.name, parameter.value))
            .collect();

        match self.connector.call(&rfc.function, parameters).await {
            Ok(result) => codec::encode(&Response::Success { result }),
            Err(reason) => {
                warn!(function = %rfc.function, reason = %reason, "RFC call failed");
                codec::encode(&Response::RfcError {
                    message: "RFC error".to_string(),
                    code: None,
                })
            }
        }
    }
}
