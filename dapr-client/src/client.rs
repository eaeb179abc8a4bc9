//! # Dapr Client
//!
//! This module implements the high-level API on top of the sidecar dispatcher.
//!
//! The [`DaprClient`] is generic over the `tonic` service it talks through. In production this
//! is a [`Channel`] built once with [`DaprClientBuilder`] and shared for the whole process;
//! tests can plug any in-process service instead via [`DaprClient::from_service`].
//!
//! Operations are grouped by building block:
//!
//! * [`invocation`]: service invocation against HTTP or gRPC applications.
//! * [`state`]: state management with etags, consistency/concurrency policies and
//!   transactions.
//! * [`messaging`]: pub/sub publishing and output bindings.
//! * [`secrets`]: secret store lookups.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dapr_client::client::DaprClient;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DaprClient::builder()
//!     .grpc_endpoint("http://127.0.0.1:50001")
//!     .build()?;
//!
//! client.save_state("statestore", "order-1", &"pending", None, None).await?;
//! let order: Option<String> = client.get_state("statestore", "order-1", None, None).await?;
//! # Ok(())
//! # }
//! ```
pub mod invocation;
pub mod messaging;
pub mod secrets;
pub mod state;
mod state_types;
mod types;

pub use state_types::*;
pub use types::*;

use crate::{
    BoxError,
    grpc::{
        auth::{ApiTokenSource, EnvApiToken},
        client::{CallOptions, GrpcClient, GrpcRequestError, UnaryResponse},
    },
};
use http_body::Body as HttpBody;
use std::{sync::Arc, time::Duration};
use tonic::transport::{Channel, Endpoint};
use tracing::info;

/// Full endpoint of the sidecar gRPC API, e.g. `http://127.0.0.1:50001`.
pub const GRPC_ENDPOINT_ENV_VAR: &str = "DAPR_GRPC_ENDPOINT";
/// Port of the sidecar gRPC API on localhost, used when no endpoint is configured.
pub const GRPC_PORT_ENV_VAR: &str = "DAPR_GRPC_PORT";
pub const DEFAULT_GRPC_PORT: u16 = 50001;

/// Errors that can occur when connecting to the sidecar.
#[derive(Debug, thiserror::Error)]
pub enum ClientConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// Client for the Dapr sidecar gRPC API.
///
/// Cloning is cheap: clones share the same channel.
#[derive(Debug, Clone)]
pub struct DaprClient<S = Channel> {
    grpc_client: GrpcClient<S>,
    call_options: CallOptions,
}

impl DaprClient<Channel> {
    pub fn builder() -> DaprClientBuilder {
        DaprClientBuilder::default()
    }

    /// Connects eagerly to the sidecar listening at `addr`.
    pub async fn connect(addr: &str) -> Result<Self, ClientConnectError> {
        Self::builder().grpc_endpoint(addr).connect().await
    }
}

impl<S> DaprClient<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Creates a client from an existing Tonic service/channel.
    ///
    /// The API token is read from `DAPR_API_TOKEN` on every call.
    pub fn from_service(service: S) -> Self {
        Self::with_token_source(service, Arc::new(EnvApiToken::default()))
    }

    /// Creates a client from an existing Tonic service/channel with an explicit token source.
    pub fn from_service_with_api_token(
        service: S,
        api_token: impl ApiTokenSource + 'static,
    ) -> Self {
        Self::with_token_source(service, Arc::new(api_token))
    }

    fn with_token_source(service: S, api_token: Arc<dyn ApiTokenSource>) -> Self {
        Self {
            grpc_client: GrpcClient::with_api_token_source(service, api_token),
            call_options: CallOptions::default(),
        }
    }

    /// Returns a handle sharing the same channel whose calls all carry `options`
    /// (headers, deadline, cancellation).
    pub fn with_call_options(&self, options: CallOptions) -> Self {
        Self {
            grpc_client: self.grpc_client.clone(),
            call_options: options,
        }
    }

    pub fn call_options(&self) -> &CallOptions {
        &self.call_options
    }

    pub(crate) async fn call<Req, Res>(
        &self,
        path: &'static str,
        message: Req,
    ) -> Result<UnaryResponse<Res>, GrpcRequestError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Res: prost::Message + Default + Send + Sync + 'static,
    {
        self.grpc_client
            .unary(path, message, &self.call_options)
            .await
    }

    /// Same as [`call`](Self::call) with extra headers appended to the configured ones.
    pub(crate) async fn call_with_headers<Req, Res>(
        &self,
        path: &'static str,
        message: Req,
        headers: Vec<(String, String)>,
    ) -> Result<UnaryResponse<Res>, GrpcRequestError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Res: prost::Message + Default + Send + Sync + 'static,
    {
        if headers.is_empty() {
            return self.call(path, message).await;
        }

        let mut options = self.call_options.clone();
        options.headers.extend(headers);
        self.grpc_client.unary(path, message, &options).await
    }
}

/// Builds a [`DaprClient`] over a [`Channel`].
#[derive(Debug, Default)]
pub struct DaprClientBuilder {
    grpc_endpoint: Option<String>,
    api_token: Option<Arc<dyn ApiTokenSource>>,
    connect_timeout: Option<Duration>,
}

impl DaprClientBuilder {
    /// Overrides the endpoint resolved from the environment (see [`default_grpc_endpoint`]).
    pub fn grpc_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.grpc_endpoint = Some(endpoint.into());
        self
    }

    /// Overrides the default token source, which reads `DAPR_API_TOKEN` on every call.
    pub fn api_token_source(mut self, source: impl ApiTokenSource + 'static) -> Self {
        self.api_token = Some(Arc::new(source));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the client without connecting. The channel connects on first use.
    pub fn build(self) -> Result<DaprClient<Channel>, ClientConnectError> {
        let (addr, endpoint) = self.endpoint()?;
        info!(endpoint = %addr, "Creating lazy Dapr client");
        Ok(self.into_client(endpoint.connect_lazy()))
    }

    /// Builds the client and waits for the connection to be established.
    pub async fn connect(self) -> Result<DaprClient<Channel>, ClientConnectError> {
        let (addr, endpoint) = self.endpoint()?;
        info!(endpoint = %addr, "Connecting to the Dapr sidecar");

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ClientConnectError::ConnectionFailed(addr.clone(), e))?;

        info!(endpoint = %addr, "Connected to the Dapr sidecar");
        Ok(self.into_client(channel))
    }

    fn endpoint(&self) -> Result<(String, Endpoint), ClientConnectError> {
        let addr = self
            .grpc_endpoint
            .clone()
            .unwrap_or_else(default_grpc_endpoint);

        let mut endpoint = Endpoint::new(addr.clone())
            .map_err(|e| ClientConnectError::InvalidUrl(addr.clone(), e))?;

        if let Some(timeout) = self.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }

        Ok((addr, endpoint))
    }

    fn into_client(self, channel: Channel) -> DaprClient<Channel> {
        let api_token = self
            .api_token
            .unwrap_or_else(|| Arc::new(EnvApiToken::default()));
        DaprClient::with_token_source(channel, api_token)
    }
}

/// Resolves the sidecar endpoint: `DAPR_GRPC_ENDPOINT`, then `DAPR_GRPC_PORT` on localhost,
/// then port 50001 on localhost.
pub fn default_grpc_endpoint() -> String {
    resolve_grpc_endpoint(
        std::env::var(GRPC_ENDPOINT_ENV_VAR).ok(),
        std::env::var(GRPC_PORT_ENV_VAR).ok(),
    )
}

fn resolve_grpc_endpoint(endpoint: Option<String>, port: Option<String>) -> String {
    if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
        let endpoint = endpoint.trim();
        return if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{endpoint}")
        };
    }

    let port = port
        .and_then(|p| p.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_GRPC_PORT);

    format!("http://127.0.0.1:{port}")
}
