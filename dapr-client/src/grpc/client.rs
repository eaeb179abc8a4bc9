//! # Sidecar Call Dispatcher
//!
//! This module wraps a standard `tonic` client to issue the unary calls exposed by the
//! `dapr.proto.runtime.v1.Dapr` service. It is agnostic to the specific Protobuf messages
//! being exchanged: any pair of `prost` messages can be sent to any method path.
//!
//! ## How it works
//!
//! Every call goes through [`GrpcClient::unary`], which:
//!
//! 1. Waits for the underlying service to be ready.
//! 2. Builds the outgoing metadata from the [`CallOptions`] headers and the `dapr-api-token`
//!    resolved from the configured [`ApiTokenSource`] (read again on every call).
//! 3. Sends the message and keeps the inbound **headers** and **trailers** apart, so the
//!    layer above can inspect each of them byte-exactly.
//! 4. Races the call against the optional deadline and [`CancellationToken`].
//!
//! Failures reported by the sidecar are surfaced as [`RpcError`], which keeps the status code,
//! the message, the headers received before the failure and the raw trailers (including
//! `grpc-status-details-bin`). Nothing is retried.
use super::auth::{API_TOKEN_HEADER, ApiTokenSource, EnvApiToken};
use super::cancellation::CancellationToken;
use super::status::STATUS_DETAILS_KEY;
use crate::BoxError;
use http_body::Body as HttpBody;
use std::{future::Future, str::FromStr, sync::Arc, time::Duration};
use tonic::{
    Code, Status,
    client::GrpcService,
    metadata::{
        MetadataKey, MetadataMap, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    transport::Channel,
};
use tokio::time::Instant;
use tonic_prost::ProstCodec;
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl GrpcRequestError {
    /// Whether the failure happened on the wire (unreachable sidecar or a non-OK status),
    /// as opposed to a request that could not even be built.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ClientNotReady(_) | Self::Rpc(_))
    }
}

/// A call that reached the sidecar but finished with a non-OK status.
#[derive(thiserror::Error, Debug, Clone)]
#[error("gRPC call failed with status '{code}': '{message}'", code = .status.code(), message = .status.message())]
pub struct RpcError {
    #[source]
    status: Status,
    headers: MetadataMap,
    trailers: MetadataMap,
}

impl RpcError {
    pub fn code(&self) -> Code {
        self.status.code()
    }

    pub fn message(&self) -> &str {
        self.status.message()
    }

    /// Response headers received before the call failed. Empty when none arrived.
    ///
    /// A trailers-only response carries its metadata in a single frame, which then shows up
    /// both here and in [`trailers`](Self::trailers).
    pub fn headers(&self) -> &MetadataMap {
        &self.headers
    }

    /// Trailing metadata of the failed call, `grpc-status-details-bin` included.
    pub fn trailers(&self) -> &MetadataMap {
        &self.trailers
    }

    pub fn with_headers(mut self, headers: MetadataMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> &Status {
        &self.status
    }
}

impl From<Status> for RpcError {
    fn from(status: Status) -> Self {
        // tonic lifts the details blob out of the trailers, put it back where callers expect it.
        let mut trailers = status.metadata().clone();
        if !status.details().is_empty() {
            trailers.insert_bin(
                STATUS_DETAILS_KEY,
                MetadataValue::from_bytes(status.details()),
            );
        }
        Self {
            status,
            headers: MetadataMap::new(),
            trailers,
        }
    }
}

/// Per-call settings: extra headers, deadline and cancellation.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl CallOptions {
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// A successful unary call.
#[derive(Debug, Clone)]
pub struct UnaryResponse<T> {
    pub message: T,
    pub headers: MetadataMap,
    pub trailers: MetadataMap,
}

/// Dispatches unary calls to the sidecar.
///
/// Cloning is cheap and every clone shares the same underlying service (usually a
/// [`Channel`]), which is safe to use from any number of concurrent tasks.
#[derive(Debug, Clone)]
pub struct GrpcClient<S = Channel> {
    client: tonic::client::Grpc<S>,
    api_token: Arc<dyn ApiTokenSource>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Creates a dispatcher reading the API token from `DAPR_API_TOKEN`.
    pub fn new(service: S) -> Self {
        Self::with_api_token_source(service, Arc::new(EnvApiToken::default()))
    }

    pub fn with_api_token_source(service: S, api_token: Arc<dyn ApiTokenSource>) -> Self {
        let client = tonic::client::Grpc::new(service);
        Self { client, api_token }
    }

    /// Performs a unary call against `path` (e.g. `/dapr.proto.runtime.v1.Dapr/GetState`).
    ///
    /// # Returns
    ///
    /// * `Ok(UnaryResponse)` - The decoded message plus inbound headers and trailers.
    /// * `Err(GrpcRequestError::Rpc)` - The sidecar (or the deadline/cancellation) ended the
    ///   call with a non-OK status.
    /// * `Err(_)` - The request could not be built or the service was not ready.
    pub async fn unary<Req, Res>(
        &self,
        path: &'static str,
        message: Req,
        options: &CallOptions,
    ) -> Result<UnaryResponse<Res>, GrpcRequestError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Res: prost::Message + Default + Send + Sync + 'static,
    {
        if let Some(token) = &options.cancellation
            && token.is_cancelled()
        {
            return Err(RpcError::from(cancelled_status()).into());
        }

        let request = self.build_request(message, options)?;

        let mut client = self.client.clone();
        client
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

        debug!(path, "Dispatching unary call to the sidecar");

        let started = Instant::now();
        let call = async move {
            let codec = ProstCodec::<Req, Res>::default();
            let path = http::uri::PathAndQuery::from_static(path);

            // A unary call is a server stream of exactly one message. Driving it as a stream
            // lets us read the trailers separately from the headers.
            let response = client
                .server_streaming(request, path, codec)
                .await
                .map_err(|status| {
                    // Trailers-only response: tonic folds the header frame into the status.
                    let headers = status.metadata().clone();
                    RpcError::from(status).with_headers(headers)
                })?;
            let (headers, mut stream, _) = response.into_parts();

            let body = async {
                let message = stream.message().await?.ok_or_else(|| {
                    Status::internal("The sidecar closed the call without sending a response")
                })?;
                let trailers = stream.trailers().await?.unwrap_or_default();
                Ok::<_, Status>((message, trailers))
            };

            match body.await {
                Ok((message, trailers)) => Ok(UnaryResponse {
                    message,
                    headers,
                    trailers,
                }),
                Err(status) => Err(RpcError::from(status).with_headers(headers)),
            }
        };

        match supervise(call, options).await {
            Ok(response) => Ok(response),
            Err(err) if expired_in_transport(&err, options, started) => {
                debug!(path, "Sidecar call outlived its deadline");
                Err(RpcError::from(deadline_exceeded_status()).into())
            }
            Err(err) => {
                debug!(path, code = ?err.code(), "Sidecar call failed");
                Err(err.into())
            }
        }
    }

    fn build_request<T>(
        &self,
        payload: T,
        options: &CallOptions,
    ) -> Result<tonic::Request<T>, GrpcRequestError> {
        let mut request = tonic::Request::new(payload);

        let token = self
            .api_token
            .api_token()
            .map(|token| (API_TOKEN_HEADER.to_string(), token));

        for (k, v) in options.headers.iter().cloned().chain(token) {
            let key =
                MetadataKey::from_str(&k).map_err(|source| GrpcRequestError::InvalidMetadataKey {
                    key: k.clone(),
                    source,
                })?;
            let val = MetadataValue::from_str(&v)
                .map_err(|source| GrpcRequestError::InvalidMetadataValue { key: k, source })?;
            request.metadata_mut().insert(key, val);
        }

        if let Some(timeout) = options.timeout {
            request.set_timeout(timeout);
        }

        Ok(request)
    }
}

/// Races `call` against the deadline and the cancellation signal of `options`.
async fn supervise<T>(
    call: impl Future<Output = Result<T, RpcError>>,
    options: &CallOptions,
) -> Result<T, RpcError> {
    let deadline = async {
        match options.timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    let cancelled = async {
        match &options.cancellation {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = call => result,
        _ = deadline => Err(RpcError::from(deadline_exceeded_status())),
        _ = cancelled => Err(RpcError::from(cancelled_status())),
    }
}

/// Message of the `Cancelled` status tonic builds from its `TimeoutExpired` error.
const TRANSPORT_TIMEOUT_MESSAGE: &str = "Timeout expired";

/// The `grpc-timeout` header is enforced by tonic as well (on the channel and on the server),
/// and an expiry there is reported as `Cancelled`. Only the caller's token may cancel a call.
///
/// The header is truncated to its unit, so tonic may fire marginally before our own timer.
fn expired_in_transport(error: &RpcError, options: &CallOptions, started: Instant) -> bool {
    let Some(timeout) = options.timeout else {
        return false;
    };

    let cancelled_by_caller = options
        .cancellation
        .as_ref()
        .is_some_and(CancellationToken::is_cancelled);

    error.code() == Code::Cancelled
        && !cancelled_by_caller
        && (started.elapsed() >= timeout || error.message() == TRANSPORT_TIMEOUT_MESSAGE)
}

fn deadline_exceeded_status() -> Status {
    Status::deadline_exceeded("Deadline expired before the sidecar replied")
}

fn cancelled_status() -> Status {
    Status::cancelled("The call was cancelled by the caller")
}
