//! # Secrets
use super::{DaprClient, Metadata};
use crate::{
    BoxError,
    error::{DaprError, ensure_not_empty},
    proto::dapr::proto::runtime::v1::{GetSecretRequest, GetSecretResponse, paths},
};
use http_body::Body as HttpBody;
use std::collections::HashMap;
use tracing::instrument;

impl<S> DaprClient<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Reads the secret `key` from the secret store `store_name`.
    ///
    /// A secret may hold several values, hence the map.
    #[instrument(skip(self, metadata), fields(store = %store_name, key = %key))]
    pub async fn get_secret(
        &self,
        store_name: &str,
        key: &str,
        metadata: Option<Metadata>,
    ) -> Result<HashMap<String, String>, DaprError> {
        ensure_not_empty(store_name, "store_name")?;
        ensure_not_empty(key, "key")?;

        let request = GetSecretRequest {
            store_name: store_name.to_string(),
            key: key.to_string(),
            metadata: metadata.unwrap_or_default(),
        };

        let response = self
            .call::<_, GetSecretResponse>(paths::GET_SECRET, request)
            .await?;
        Ok(response.message.data)
    }
}
