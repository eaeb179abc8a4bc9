//! # Service Invocation
//!
//! Invokes a method on another application through the sidecar. The target may be an HTTP or
//! a gRPC application: the request always travels as gRPC, with the HTTP semantics (verb,
//! query string, content type) carried in the `HTTPExtension` of the envelope.
//!
//! The result tells both kinds apart (see [`ResponseOrigin`](crate::grpc::status::ResponseOrigin)).
//! A failed call becomes a [`DaprError::Invocation`] carrying the partial result, which holds
//! the HTTP status and message of the remote application when the sidecar reported them.
use super::{DaprClient, HttpInvocation, InvocationDescriptor, InvocationResult};
use crate::{
    BoxError,
    error::{DaprError, InvocationError, ensure_not_empty},
    grpc::{
        client::{GrpcRequestError, RpcError},
        status::{HTTP_CONTENT_TYPE, ResponseOrigin, classify_response, grpc_status_from_failure},
    },
    proto::dapr::proto::{
        common::v1::{HttpExtension, InvokeRequest, InvokeResponse, http_extension::Verb},
        runtime::v1::{InvokeServiceRequest, paths},
    },
};
use bytes::Bytes;
use http_body::Body as HttpBody;
use std::collections::HashMap;
use tonic::metadata::{KeyAndValueRef, MetadataMap};
use tracing::{debug, instrument, warn};

impl<S> DaprClient<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Invokes `descriptor.method` on the application `descriptor.app_id`.
    ///
    /// # Returns
    ///
    /// * `Ok(InvocationResult)` - The call succeeded. `origin` tells whether the remote
    ///   application answered as HTTP (with its status code) or as gRPC.
    /// * `Err(DaprError::Invocation)` - The call failed. The error embeds the partial result.
    /// * `Err(_)` - Invalid arguments, or the request could not be sent at all.
    #[instrument(skip(self, descriptor), fields(app_id = %descriptor.app_id, method = %descriptor.method))]
    pub async fn invoke_method(
        &self,
        descriptor: InvocationDescriptor,
    ) -> Result<InvocationResult, DaprError> {
        ensure_not_empty(&descriptor.app_id, "app_id")?;
        ensure_not_empty(&descriptor.method, "method")?;

        let (request, headers) = build_invoke_request(&descriptor);

        let result = self
            .call_with_headers::<_, InvokeResponse>(paths::INVOKE_SERVICE, request, headers)
            .await;

        match result {
            Ok(response) => {
                let origin = classify_response(&response.headers)?;
                debug!(content_type = origin.content_type(), "Invocation succeeded");

                Ok(InvocationResult {
                    body: response
                        .message
                        .data
                        .map(|any| Bytes::from(any.value))
                        .unwrap_or_default(),
                    content_type: origin.content_type().to_string(),
                    headers: metadata_to_map(&response.headers),
                    trailers: metadata_to_map(&response.trailers),
                    origin,
                })
            }
            Err(GrpcRequestError::Rpc(source)) => {
                let partial = partial_result(&source);
                warn!(
                    code = ?source.code(),
                    inner_http_status = ?partial.grpc_status().and_then(|s| s.inner_http_status_code),
                    "Invocation failed"
                );

                Err(Box::new(InvocationError {
                    app_id: descriptor.app_id,
                    method: descriptor.method,
                    source,
                    partial,
                })
                .into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Translates a descriptor into the wire envelope plus the headers to attach to the call.
fn build_invoke_request(
    descriptor: &InvocationDescriptor,
) -> (InvokeServiceRequest, Vec<(String, String)>) {
    let default_http = HttpInvocation::default();
    let http = descriptor.http.as_ref().unwrap_or(&default_http);

    let content_type = http
        .content_type
        .clone()
        .unwrap_or_else(|| HTTP_CONTENT_TYPE.to_string());

    let http_extension = HttpExtension {
        verb: Verb::from(http.verb) as i32,
        querystring: http.query.iter().cloned().collect(),
    };

    let message = InvokeRequest {
        method: descriptor.method.clone(),
        data: descriptor.body.as_ref().map(|body| prost_types::Any {
            type_url: String::new(),
            value: body.to_vec(),
        }),
        content_type,
        http_extension: Some(http_extension),
    };

    let request = InvokeServiceRequest {
        id: descriptor.app_id.clone(),
        message: Some(message),
    };

    (request, http.headers.clone())
}

/// What can be salvaged from a failed invocation: the metadata received so far and its final
/// status.
fn partial_result(error: &RpcError) -> InvocationResult {
    let origin = ResponseOrigin::Grpc(grpc_status_from_failure(error));

    InvocationResult {
        body: Bytes::new(),
        content_type: origin.content_type().to_string(),
        headers: metadata_to_map(error.headers()),
        trailers: metadata_to_map(error.trailers()),
        origin,
    }
}

/// Flattens metadata into raw bytes per key. Binary entries are base64-decoded.
fn metadata_to_map(metadata: &MetadataMap) -> HashMap<String, Bytes> {
    metadata
        .iter()
        .map(|entry| match entry {
            KeyAndValueRef::Ascii(key, value) => (
                key.as_str().to_string(),
                Bytes::copy_from_slice(value.as_encoded_bytes()),
            ),
            KeyAndValueRef::Binary(key, value) => (
                key.as_str().to_string(),
                value
                    .to_bytes()
                    .unwrap_or_else(|_| Bytes::copy_from_slice(value.as_encoded_bytes())),
            ),
        })
        .collect()
}
