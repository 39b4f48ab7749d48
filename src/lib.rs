//! # rfc-bridge
//!
//! Bridges MQTT publish/subscribe messaging to a synchronous RFC backend.
//!
//! Requests published on a configured topic are decoded, executed against the
//! backend connector, and the encoded result is published to the reply topic
//! the caller named in the MQTT v5 response-topic property (fire-and-forget
//! when absent).
//!
//! ```ignore
//! use rfc_bridge::{AdapterConfig, BackendConfig, GrpcRfcConnector, MessageAdapter, RfcBridge};
//!
//! let connector = GrpcRfcConnector::connect(&backend_config).await?;
//! let bridge = Arc::new(RfcBridge::new(connector));
//! let adapter = MessageAdapter::connect(adapter_config, bridge);
//!
//! // ... run until shutdown ...
//! adapter.close().await;
//! ```
//!
//! Every failure while handling a request is converted into one of three
//! response shapes inside the bridge; nothing escapes
//! [`MessageProcessor::process`]. Transport connectivity failures are retried
//! by the adapter and never surface on the request path.

pub mod adapter;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod connector;
pub mod processor;

pub mod rfc_proto {
    include!(concat!(env!("OUT_DIR"), "/rfc.rs"));
}

pub use adapter::{InboundEnvelope, MessageAdapter};
pub use bridge::RfcBridge;
pub use codec::{DecodeError, ParamValue, Parameter, Response, RfcRequest, decode, encode};
pub use config::{AdapterConfig, BackendConfig};
pub use connector::{GrpcRfcConnector, RfcCallError, RfcConnector};
pub use processor::MessageProcessor;
