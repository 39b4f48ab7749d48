//! gRPC implementation of the RFC backend connector.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::Channel;
use tonic::{Request, Status};
use tracing::{debug, info};

use crate::codec::ParamValue;
use crate::config::BackendConfig;
use crate::rfc_proto::rfc_service_client::RfcServiceClient;
use crate::rfc_proto::{CallRequest, ParamValue as ProtoParamValue, param_value};

use super::{RfcCallError, RfcConnector};

/// A client of the backend's `rfc.RfcService`, holding one long-lived channel.
pub struct GrpcRfcConnector {
    client: RfcServiceClient<Channel>,
    user: MetadataValue<Ascii>,
    password: MetadataValue<Ascii>,
}

impl GrpcRfcConnector {
    /// Establish the backend connection.
    ///
    /// Called once at startup; failure here is fatal and the process must
    /// refuse to start rather than run degraded.
    pub async fn connect(config: &BackendConfig) -> Result<Self> {
        let user: MetadataValue<Ascii> = config
            .user
            .parse()
            .context("backend user is not valid call metadata")?;
        let password: MetadataValue<Ascii> = config
            .password
            .parse()
            .context("backend password is not valid call metadata")?;

        let client = RfcServiceClient::connect(config.endpoint.clone())
            .await
            .with_context(|| {
                format!("failed to connect to RFC backend at {}", config.endpoint)
            })?;

        info!(endpoint = %config.endpoint, "RFC backend connection established");

        Ok(Self {
            client,
            user,
            password,
        })
    }
}

#[async_trait]
impl RfcConnector for GrpcRfcConnector {
    async fn call(
        &self,
        function: &str,
        parameters: HashMap<String, ParamValue>,
    ) -> Result<Map<String, Value>, RfcCallError> {
        debug!(function = %function, parameters = parameters.len(), "Calling RFC backend");

        let mut request = Request::new(CallRequest {
            function: function.to_string(),
            parameters: parameters
                .into_iter()
                .map(|(name, value)| (name, ProtoParamValue::from(value)))
                .collect(),
        });
        request.metadata_mut().insert("x-rfc-user", self.user.clone());
        request
            .metadata_mut()
            .insert("x-rfc-password", self.password.clone());

        let reply = self.client.clone().call(request).await?;

        serde_json::from_str(&reply.into_inner().result_json).map_err(|reason| RfcCallError {
            message: format!("backend returned an unparseable result: {reason}"),
            code: None,
        })
    }
}

impl From<ParamValue> for ProtoParamValue {
    fn from(value: ParamValue) -> Self {
        let kind = match value {
            ParamValue::Number(number) => param_value::Kind::Number(number),
            ParamValue::Text(text) => param_value::Kind::Text(text),
        };
        Self { kind: Some(kind) }
    }
}

impl From<Status> for RfcCallError {
    fn from(status: Status) -> Self {
        Self {
            message: status.message().to_string(),
            code: Some(i64::from(i32::from(status.code()))),
        }
    }
}
