use std::time::Duration;

use bon::Builder;

/// Configuration for the transport adapter.
///
/// Values are injected by whoever boots the process; the core never reads
/// the environment itself.
#[derive(Debug, Clone, Builder)]
pub struct AdapterConfig {
    /// Broker host name or address.
    pub broker_host: String,

    #[builder(default = 1883)]
    pub broker_port: u16,

    /// Topic the bridge receives RFC requests on.
    pub request_topic: String,

    /// MQTT client identifier.
    #[builder(default = "rfc-bridge".to_string())]
    pub client_id: String,

    #[builder(default = Duration::from_secs(5))]
    pub keep_alive: Duration,

    /// Pause before polling again after the connection drops.
    #[builder(default = Duration::from_secs(1))]
    pub reconnect_delay: Duration,

    /// Bound on envelopes queued between the transport pump and the
    /// dispatch loop.
    #[builder(default = 16)]
    pub inbox_capacity: usize,
}

/// Configuration for the RFC backend connection.
#[derive(Debug, Clone, Builder)]
pub struct BackendConfig {
    /// gRPC endpoint of the RFC backend, e.g. "http://[::1]:50051".
    pub endpoint: String,

    pub user: String,

    pub password: String,
}
