//! # Pub/Sub and Bindings
//!
//! Fire-and-forget publishing to a pub/sub component, and request/reply calls to output
//! bindings. Both are thin pass-throughs: the sidecar does the routing.
use super::{BindingResponse, DaprClient, Metadata};
use crate::{
    BoxError,
    error::{DaprError, ensure_not_empty},
    grpc::status::HTTP_CONTENT_TYPE,
    proto::dapr::proto::runtime::v1::{
        InvokeBindingRequest, InvokeBindingResponse, PublishEventRequest, paths,
    },
};
use bytes::Bytes;
use http_body::Body as HttpBody;
use serde::Serialize;
use tracing::instrument;

impl<S> DaprClient<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Publishes `data`, JSON-encoded, to `topic` on the pub/sub component `pubsub_name`.
    #[instrument(skip(self, data, metadata), fields(pubsub = %pubsub_name, topic = %topic))]
    pub async fn publish_event<T: Serialize>(
        &self,
        pubsub_name: &str,
        topic: &str,
        data: &T,
        metadata: Option<Metadata>,
    ) -> Result<(), DaprError> {
        ensure_not_empty(pubsub_name, "pubsub_name")?;
        ensure_not_empty(topic, "topic")?;

        let request = PublishEventRequest {
            pubsub_name: pubsub_name.to_string(),
            topic: topic.to_string(),
            data: serde_json::to_vec(data)?,
            data_content_type: HTTP_CONTENT_TYPE.to_string(),
            metadata: metadata.unwrap_or_default(),
        };

        self.call::<_, ()>(paths::PUBLISH_EVENT, request).await?;
        Ok(())
    }

    /// Runs `operation` on the output binding `name` and returns its reply.
    #[instrument(skip(self, data, metadata), fields(binding = %name, operation = %operation))]
    pub async fn invoke_binding(
        &self,
        name: &str,
        operation: &str,
        data: impl Into<Bytes>,
        metadata: Option<Metadata>,
    ) -> Result<BindingResponse, DaprError> {
        ensure_not_empty(name, "name")?;
        ensure_not_empty(operation, "operation")?;

        let request = InvokeBindingRequest {
            name: name.to_string(),
            data: data.into().to_vec(),
            metadata: metadata.unwrap_or_default(),
            operation: operation.to_string(),
        };

        let response = self
            .call::<_, InvokeBindingResponse>(paths::INVOKE_BINDING, request)
            .await?;

        Ok(BindingResponse {
            data: response.message.data.into(),
            metadata: response.message.metadata,
        })
    }
}
