//! # Sidecar Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide an in-process, in-memory stand-in
//! for the Dapr sidecar gRPC API, used to integration test the `dapr-client` crate.
//! It is not intended for production use.
//!
//! [`InMemorySidecar`] is a `tower` service, so it can be handed to
//! `DaprClient::from_service` directly without opening any socket. It is also a
//! [`NamedService`], so tests exercising a real transport can mount it on a
//! `tonic::transport::Server`.
//!
//! Every invocation response carries an `x-app-id` header naming the target application.
mod store;

pub use store::{StateStore, StoredValue};

use bytes::Bytes;
use dapr_client::grpc::auth::API_TOKEN_HEADER;
use dapr_client::grpc::status::{
    ERROR_INFO_HTTP_CODE, ERROR_INFO_HTTP_ERROR_MESSAGE, HTTP_STATUS_HEADER,
};
use dapr_client::proto::dapr::proto::{
    common::v1::InvokeResponse,
    runtime::v1::{
        BulkStateItem, DeleteStateRequest, ExecuteStateTransactionRequest, GetBulkStateRequest,
        GetBulkStateResponse, GetSecretRequest, GetSecretResponse, GetStateRequest,
        GetStateResponse, InvokeBindingRequest, InvokeBindingResponse, InvokeServiceRequest,
        PublishEventRequest, SaveStateRequest, paths,
    },
};
use dapr_client::proto::google::rpc::{ERROR_INFO_TYPE_URL, ErrorInfo, Status as RpcStatus};
use http_body::Body as HttpBody;
use prost::Message;
use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};
use tonic::{
    Code, Status,
    codegen::{BoxFuture, Service, StdError},
    metadata::MetadataValue,
    server::{Grpc, NamedService, ServerStreamingService, UnaryService},
};
use tonic_prost::ProstCodec;

/// Header naming the application an invocation was routed to.
pub const APP_ID_HEADER: &str = "x-app-id";

/// Invocations are answered as a server stream, so a failure can follow the headers.
type ReplyStream<T> = tokio_stream::Once<Result<T, Status>>;

/// How the sidecar answers invocations targeting a given app id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppBehavior {
    /// Echoes the request body back as an HTTP application answering `status_code`.
    EchoHttp { status_code: u16 },
    /// Echoes the request body back as a gRPC application.
    EchoGrpc,
    /// Echoes the body with a `dapr-http-status` header holding `value` verbatim.
    RawHttpStatus(String),
    /// Fails as an HTTP application answering `http_code`, reported through an `ErrorInfo`.
    FailHttp { http_code: u16, message: String },
    /// Fails with a bare status and no details, in a trailers-only response.
    Fail(Code),
    /// Sends the response headers, then fails with `code` in the trailers.
    FailAfterHeaders(Code),
    /// Never answers.
    Hang,
}

/// A call as seen by the sidecar, before any routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub path: String,
    pub api_token: Option<String>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct SidecarState {
    store: StateStore,
    apps: HashMap<String, AppBehavior>,
    secrets: HashMap<(String, String), HashMap<String, String>>,
    bulk_errors: HashMap<String, String>,
    required_api_token: Option<String>,
    failure: Option<Code>,
    calls: Vec<RecordedCall>,
    invocations: Vec<InvokeServiceRequest>,
    bulk_requests: Vec<GetBulkStateRequest>,
    transactions: Vec<ExecuteStateTransactionRequest>,
    published: Vec<PublishEventRequest>,
}

/// In-memory Dapr sidecar.
///
/// Clones share the same state, so a test can keep one handle to inspect what the client sent.
#[derive(Debug, Clone, Default)]
pub struct InMemorySidecar {
    state: Arc<Mutex<SidecarState>>,
}

impl InMemorySidecar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(self, app_id: impl Into<String>, behavior: AppBehavior) -> Self {
        self.lock().apps.insert(app_id.into(), behavior);
        self
    }

    pub fn with_secret<'a>(
        self,
        store_name: &str,
        key: &str,
        values: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.lock()
            .secrets
            .insert((store_name.to_string(), key.to_string()), values);
        self
    }

    /// Reports `message` as the per-key error of `key` in bulk reads.
    pub fn with_bulk_error(self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.lock().bulk_errors.insert(key.into(), message.into());
        self
    }

    /// Rejects with `Unauthenticated` every call not carrying `token`.
    pub fn with_required_api_token(self, token: impl Into<String>) -> Self {
        self.lock().required_api_token = Some(token.into());
        self
    }

    /// Makes every subsequent call fail with `code`, until [`recover`](Self::recover).
    pub fn fail_all(&self, code: Code) {
        self.lock().failure = Some(code);
    }

    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Seeds `key` bypassing concurrency checks. Returns the new etag.
    pub fn put_state(&self, store_name: &str, key: &str, value: impl Into<Vec<u8>>) -> String {
        self.lock().store.put(store_name, key, value.into())
    }

    pub fn stored(&self, store_name: &str, key: &str) -> Option<StoredValue> {
        self.lock().store.get(store_name, key).cloned()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn invocations(&self) -> Vec<InvokeServiceRequest> {
        self.lock().invocations.clone()
    }

    pub fn bulk_requests(&self) -> Vec<GetBulkStateRequest> {
        self.lock().bulk_requests.clone()
    }

    pub fn transactions(&self) -> Vec<ExecuteStateTransactionRequest> {
        self.lock().transactions.clone()
    }

    pub fn published(&self) -> Vec<PublishEventRequest> {
        self.lock().published.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SidecarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the call and applies the token check and the injected failure.
    fn admit(&self, path: &str, headers: &http::HeaderMap) -> Result<(), Status> {
        let headers: HashMap<String, String> = headers
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let api_token = headers.get(API_TOKEN_HEADER).cloned();

        let mut state = self.lock();
        state.calls.push(RecordedCall {
            path: path.to_string(),
            api_token: api_token.clone(),
            headers,
        });

        if let Some(required) = &state.required_api_token
            && api_token.as_ref() != Some(required)
        {
            return Err(Status::unauthenticated("Missing or invalid 'dapr-api-token'"));
        }

        match state.failure {
            Some(code) => Err(Status::new(code, "Injected failure")),
            None => Ok(()),
        }
    }

    async fn get_state(self, request: GetStateRequest) -> Result<GetStateResponse, Status> {
        let state = self.lock();
        let response = match state.store.get(&request.store_name, &request.key) {
            Some(stored) => GetStateResponse {
                data: stored.value.clone(),
                etag: stored.etag.clone(),
                metadata: stored.metadata.clone(),
            },
            None => GetStateResponse::default(),
        };
        Ok(response)
    }

    async fn get_bulk_state(
        self,
        request: GetBulkStateRequest,
    ) -> Result<GetBulkStateResponse, Status> {
        let mut state = self.lock();

        let items = request
            .keys
            .iter()
            .map(|key| {
                if let Some(error) = state.bulk_errors.get(key) {
                    return BulkStateItem {
                        key: key.clone(),
                        error: error.clone(),
                        ..Default::default()
                    };
                }
                match state.store.get(&request.store_name, key) {
                    Some(stored) => BulkStateItem {
                        key: key.clone(),
                        data: stored.value.clone(),
                        etag: stored.etag.clone(),
                        metadata: stored.metadata.clone(),
                        ..Default::default()
                    },
                    None => BulkStateItem {
                        key: key.clone(),
                        ..Default::default()
                    },
                }
            })
            .collect();

        state.bulk_requests.push(request);
        Ok(GetBulkStateResponse { items })
    }

    async fn save_state(self, request: SaveStateRequest) -> Result<(), Status> {
        self.lock().store.save(&request.store_name, request.states)
    }

    async fn delete_state(self, request: DeleteStateRequest) -> Result<(), Status> {
        self.lock().store.delete(
            &request.store_name,
            &request.key,
            &request.etag,
            request.options,
        )
    }

    async fn execute_state_transaction(
        self,
        request: ExecuteStateTransactionRequest,
    ) -> Result<(), Status> {
        let mut state = self.lock();
        state.transactions.push(request.clone());
        state
            .store
            .transact(&request.store_name, request.operations, &request.metadata)
    }

    async fn invoke_service(
        self,
        request: InvokeServiceRequest,
    ) -> Result<tonic::Response<ReplyStream<InvokeResponse>>, Status> {
        let behavior = {
            let mut state = self.lock();
            state.invocations.push(request.clone());
            state.apps.get(&request.id).cloned()
        };

        let Some(behavior) = behavior else {
            return Err(Status::unavailable(format!(
                "failed to invoke, id: {}, err: app not found",
                request.id
            )));
        };

        let app_id = MetadataValue::try_from(request.id.as_str())
            .map_err(|_| Status::invalid_argument("Unrepresentable app id"))?;

        let message = request.message.unwrap_or_default();
        let echo = InvokeResponse {
            data: message.data,
            content_type: message.content_type,
        };

        let mut response = match behavior {
            AppBehavior::EchoGrpc => tonic::Response::new(tokio_stream::once(Ok(echo))),
            AppBehavior::EchoHttp { status_code } => {
                with_http_status(echo, &status_code.to_string())?
            }
            AppBehavior::RawHttpStatus(value) => with_http_status(echo, &value)?,
            AppBehavior::FailHttp { http_code, message } => {
                return Err(http_failure(&request.id, http_code, &message));
            }
            AppBehavior::Fail(code) => {
                let mut status = Status::new(code, "Application failed");
                status.metadata_mut().insert(APP_ID_HEADER, app_id);
                return Err(status);
            }
            AppBehavior::FailAfterHeaders(code) => tonic::Response::new(tokio_stream::once(Err(
                Status::new(code, "Application failed after answering"),
            ))),
            AppBehavior::Hang => std::future::pending().await,
        };

        response.metadata_mut().insert(APP_ID_HEADER, app_id);
        Ok(response)
    }

    async fn publish_event(self, request: PublishEventRequest) -> Result<(), Status> {
        self.lock().published.push(request);
        Ok(())
    }

    /// Echoes the payload, with the operation added to the metadata.
    async fn invoke_binding(
        self,
        request: InvokeBindingRequest,
    ) -> Result<InvokeBindingResponse, Status> {
        let mut metadata = request.metadata;
        metadata.insert("operation".to_string(), request.operation);

        Ok(InvokeBindingResponse {
            data: request.data,
            metadata,
        })
    }

    async fn get_secret(self, request: GetSecretRequest) -> Result<GetSecretResponse, Status> {
        self.lock()
            .secrets
            .get(&(request.store_name, request.key.clone()))
            .cloned()
            .map(|data| GetSecretResponse { data })
            .ok_or_else(|| Status::not_found(format!("Secret '{}' not found", request.key)))
    }
}

fn with_http_status(
    message: InvokeResponse,
    value: &str,
) -> Result<tonic::Response<ReplyStream<InvokeResponse>>, Status> {
    let value = MetadataValue::try_from(value)
        .map_err(|_| Status::internal("Unrepresentable 'dapr-http-status' value"))?;

    let mut response = tonic::Response::new(tokio_stream::once(Ok(message)));
    response.metadata_mut().insert(HTTP_STATUS_HEADER, value);
    Ok(response)
}

/// The status the sidecar returns when an HTTP application answers with a non-2xx code.
fn http_failure(app_id: &str, http_code: u16, message: &str) -> Status {
    let info = ErrorInfo {
        reason: "DAPR_DIRECT_INVOKE".to_string(),
        domain: "dapr.io".to_string(),
        metadata: HashMap::from([
            (ERROR_INFO_HTTP_CODE.to_string(), http_code.to_string()),
            (ERROR_INFO_HTTP_ERROR_MESSAGE.to_string(), message.to_string()),
        ]),
    };

    let text = format!("failed to invoke target {app_id}: received status code {http_code}");
    let details = RpcStatus {
        code: Code::Unknown as i32,
        message: text.clone(),
        details: vec![prost_types::Any {
            type_url: ERROR_INFO_TYPE_URL.to_string(),
            value: info.encode_to_vec(),
        }],
    };

    Status::with_details(Code::Unknown, text, Bytes::from(details.encode_to_vec()))
}

/// Adapts a one-shot handler to `tonic`'s [`UnaryService`].
struct Handler<F>(Option<F>);

impl<Req, Res, F, Fut> UnaryService<Req> for Handler<F>
where
    F: FnOnce(Req) -> Fut,
    Fut: Future<Output = Result<tonic::Response<Res>, Status>> + Send + 'static,
{
    type Response = Res;
    type Future = BoxFuture<tonic::Response<Res>, Status>;

    fn call(&mut self, request: tonic::Request<Req>) -> Self::Future {
        match self.0.take() {
            Some(handler) => Box::pin(handler(request.into_inner())),
            None => Box::pin(async { Err(Status::internal("Handler invoked twice")) }),
        }
    }
}

/// Decodes `req` as `Req`, runs `handler` and encodes its reply.
fn unary<Req, Res, B, F, Fut>(
    req: http::Request<B>,
    handler: F,
) -> BoxFuture<http::Response<tonic::body::Body>, std::convert::Infallible>
where
    Req: Message + Default + Send + 'static,
    Res: Message + Send + 'static,
    B: HttpBody + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
    F: FnOnce(Req) -> Fut + Send + 'static,
    Fut: Future<Output = Result<tonic::Response<Res>, Status>> + Send + 'static,
{
    Box::pin(async move {
        let mut grpc = Grpc::new(ProstCodec::<Res, Req>::default());
        Ok(grpc.unary(Handler(Some(handler)), req).await)
    })
}

/// Adapts a one-shot handler to `tonic`'s [`ServerStreamingService`].
struct StreamHandler<F>(Option<F>);

impl<Req, Res, F, Fut> ServerStreamingService<Req> for StreamHandler<F>
where
    Res: Send + 'static,
    F: FnOnce(Req) -> Fut,
    Fut: Future<Output = Result<tonic::Response<ReplyStream<Res>>, Status>> + Send + 'static,
{
    type Response = Res;
    type ResponseStream = ReplyStream<Res>;
    type Future = BoxFuture<tonic::Response<ReplyStream<Res>>, Status>;

    fn call(&mut self, request: tonic::Request<Req>) -> Self::Future {
        match self.0.take() {
            Some(handler) => Box::pin(handler(request.into_inner())),
            None => Box::pin(async { Err(Status::internal("Handler invoked twice")) }),
        }
    }
}

/// Decodes `req` as `Req`, runs `handler` and streams its single reply.
fn streaming<Req, Res, B, F, Fut>(
    req: http::Request<B>,
    handler: F,
) -> BoxFuture<http::Response<tonic::body::Body>, std::convert::Infallible>
where
    Req: Message + Default + Send + 'static,
    Res: Message + Send + 'static,
    B: HttpBody + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
    F: FnOnce(Req) -> Fut + Send + 'static,
    Fut: Future<Output = Result<tonic::Response<ReplyStream<Res>>, Status>> + Send + 'static,
{
    Box::pin(async move {
        let mut grpc = Grpc::new(ProstCodec::<Res, Req>::default());
        Ok(grpc.server_streaming(StreamHandler(Some(handler)), req).await)
    })
}

/// Wraps a handler returning a bare message.
async fn reply<Res>(
    result: impl Future<Output = Result<Res, Status>>,
) -> Result<tonic::Response<Res>, Status> {
    result.await.map(tonic::Response::new)
}

impl<B> Service<http::Request<B>> for InMemorySidecar
where
    B: HttpBody + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let path = req.uri().path().to_string();

        if let Err(status) = self.admit(&path, req.headers()) {
            return Box::pin(async move { Ok(status.into_http()) });
        }

        let sidecar = self.clone();
        match path.as_str() {
            paths::GET_STATE => unary(req, move |m| reply(sidecar.get_state(m))),
            paths::GET_BULK_STATE => unary(req, move |m| reply(sidecar.get_bulk_state(m))),
            paths::SAVE_STATE => unary(req, move |m| reply(sidecar.save_state(m))),
            paths::DELETE_STATE => unary(req, move |m| reply(sidecar.delete_state(m))),
            paths::EXECUTE_STATE_TRANSACTION => {
                unary(req, move |m| reply(sidecar.execute_state_transaction(m)))
            }
            paths::INVOKE_SERVICE => streaming(req, move |m| sidecar.invoke_service(m)),
            paths::PUBLISH_EVENT => unary(req, move |m| reply(sidecar.publish_event(m))),
            paths::INVOKE_BINDING => unary(req, move |m| reply(sidecar.invoke_binding(m))),
            paths::GET_SECRET => unary(req, move |m| reply(sidecar.get_secret(m))),
            _ => Box::pin(async move {
                Ok(Status::unimplemented(format!("Unknown method '{path}'")).into_http())
            }),
        }
    }
}

impl NamedService for InMemorySidecar {
    const NAME: &'static str = "dapr.proto.runtime.v1.Dapr";
}
