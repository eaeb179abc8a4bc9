//! # State Management
//!
//! Reads and writes against a state store component, keyed by store name and key.
//!
//! Values are JSON-encoded. Every read returns the etag of the value, an opaque token that
//! later writes and deletes can carry to make them conditional: the store rejects them when
//! the value changed in between.
//!
//! Conditional writes come in two flavours:
//!
//! * [`save_state`](DaprClient::save_state) / [`delete_state`](DaprClient::delete_state)
//!   propagate every failure.
//! * [`try_save_state`](DaprClient::try_save_state) /
//!   [`try_delete_state`](DaprClient::try_delete_state) report a rejected write as `Ok(false)`.
//!   `try_save_state` only absorbs failures that happened on the wire, while
//!   `try_delete_state` absorbs any failure raised once its arguments are validated.
//!
//! Argument errors are always returned before anything is sent.
use super::state_types::{decode_state, non_empty};
use super::{
    BulkStateItem, ConsistencyMode, DaprClient, Metadata, StateEntry, StateOptions,
    StateTransactionRequest,
};
use crate::{
    BoxError,
    error::{DaprError, ensure_not_empty},
    proto::dapr::proto::{
        common::v1::{StateItem, state_options::StateConsistency},
        runtime::v1::{
            DeleteStateRequest, ExecuteStateTransactionRequest, GetBulkStateRequest,
            GetBulkStateResponse, GetStateRequest, GetStateResponse, SaveStateRequest,
            TransactionalStateOperation, paths,
        },
    },
};
use http_body::Body as HttpBody;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

impl<S> DaprClient<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Reads the value stored under `key`, `None` if there is none.
    #[instrument(skip(self, metadata), fields(store = %store_name, key = %key))]
    pub async fn get_state<T: DeserializeOwned>(
        &self,
        store_name: &str,
        key: &str,
        consistency: Option<ConsistencyMode>,
        metadata: Option<Metadata>,
    ) -> Result<Option<T>, DaprError> {
        let response = self
            .fetch_state(store_name, key, consistency, metadata)
            .await?;
        decode_state(&response.data)
    }

    /// Reads the value stored under `key` together with its etag.
    #[instrument(skip(self, metadata), fields(store = %store_name, key = %key))]
    pub async fn get_state_and_etag<T: DeserializeOwned>(
        &self,
        store_name: &str,
        key: &str,
        consistency: Option<ConsistencyMode>,
        metadata: Option<Metadata>,
    ) -> Result<(Option<T>, Option<String>), DaprError> {
        let response = self
            .fetch_state(store_name, key, consistency, metadata)
            .await?;
        let value = decode_state(&response.data)?;
        Ok((value, non_empty(response.etag)))
    }

    /// Reads `key` into a [`StateEntry`] that can be written back conditionally.
    #[instrument(skip(self), fields(store = %store_name, key = %key))]
    pub async fn get_state_entry<T: DeserializeOwned>(
        &self,
        store_name: &str,
        key: &str,
        consistency: Option<ConsistencyMode>,
    ) -> Result<StateEntry<T>, DaprError> {
        let response = self.fetch_state(store_name, key, consistency, None).await?;

        Ok(StateEntry {
            store_name: store_name.to_string(),
            key: key.to_string(),
            value: decode_state(&response.data)?,
            etag: non_empty(response.etag),
            metadata: response.metadata,
        })
    }

    /// Reads several keys in one call.
    ///
    /// `parallelism` is a hint forwarded to the sidecar, `None` leaves it to the sidecar.
    #[instrument(skip(self, keys, metadata), fields(store = %store_name, keys = keys.len()))]
    pub async fn get_bulk_state<K: AsRef<str>>(
        &self,
        store_name: &str,
        keys: &[K],
        parallelism: Option<u32>,
        metadata: Option<Metadata>,
    ) -> Result<Vec<BulkStateItem>, DaprError> {
        ensure_not_empty(store_name, "store_name")?;
        if keys.is_empty() {
            return Err(DaprError::InvalidArgument("keys"));
        }

        let request = GetBulkStateRequest {
            store_name: store_name.to_string(),
            keys: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            parallelism: parallelism.map_or(0, |p| i32::try_from(p).unwrap_or(i32::MAX)),
            metadata: metadata.unwrap_or_default(),
        };

        let response = self
            .call::<_, GetBulkStateResponse>(paths::GET_BULK_STATE, request)
            .await?;

        Ok(response
            .message
            .items
            .into_iter()
            .map(|item| BulkStateItem {
                key: item.key,
                value: item.data.into(),
                etag: non_empty(item.etag),
                error: non_empty(item.error),
                metadata: item.metadata,
            })
            .collect())
    }

    /// Saves `value` under `key`, overwriting any previous value.
    #[instrument(skip(self, value, metadata), fields(store = %store_name, key = %key))]
    pub async fn save_state<T: Serialize>(
        &self,
        store_name: &str,
        key: &str,
        value: &T,
        options: Option<StateOptions>,
        metadata: Option<Metadata>,
    ) -> Result<(), DaprError> {
        let request = save_request(store_name, key, value, None, options, metadata)?;
        self.call::<_, ()>(paths::SAVE_STATE, request).await?;
        Ok(())
    }

    /// Saves `value` under `key` only if the stored etag still is `etag`.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The value was written.
    /// * `Ok(false)` - The call failed on the wire, typically an etag mismatch.
    /// * `Err(_)` - Invalid arguments, or the request could not be built.
    #[instrument(skip(self, value, metadata), fields(store = %store_name, key = %key))]
    pub async fn try_save_state<T: Serialize>(
        &self,
        store_name: &str,
        key: &str,
        value: &T,
        etag: &str,
        options: Option<StateOptions>,
        metadata: Option<Metadata>,
    ) -> Result<bool, DaprError> {
        let request = save_request(store_name, key, value, Some(etag), options, metadata)?;

        match self.call::<_, ()>(paths::SAVE_STATE, request).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_transport() => {
                debug!(error = %err, "Conditional save was not applied");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Deletes `key`.
    #[instrument(skip(self, metadata), fields(store = %store_name, key = %key))]
    pub async fn delete_state(
        &self,
        store_name: &str,
        key: &str,
        options: Option<StateOptions>,
        metadata: Option<Metadata>,
    ) -> Result<(), DaprError> {
        let request = delete_request(store_name, key, None, options, metadata)?;
        self.call::<_, ()>(paths::DELETE_STATE, request).await?;
        Ok(())
    }

    /// Deletes `key` only if the stored etag still is `etag`.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The value was deleted.
    /// * `Ok(false)` - The delete failed for any reason once the arguments were validated.
    /// * `Err(DaprError::InvalidArgument)` - `store_name` or `key` is empty.
    #[instrument(skip(self, metadata), fields(store = %store_name, key = %key))]
    pub async fn try_delete_state(
        &self,
        store_name: &str,
        key: &str,
        etag: &str,
        options: Option<StateOptions>,
        metadata: Option<Metadata>,
    ) -> Result<bool, DaprError> {
        let request = delete_request(store_name, key, Some(etag), options, metadata)?;

        match self.call::<_, ()>(paths::DELETE_STATE, request).await {
            Ok(_) => Ok(true),
            Err(err) => {
                debug!(error = %err, "Conditional delete was not applied");
                Ok(false)
            }
        }
    }

    /// Applies `operations` in order as a single transaction.
    ///
    /// `metadata` is sent with the transaction. Operations carry their own metadata, etag
    /// and options; the store applies the transaction metadata to operations without any.
    #[instrument(skip(self, operations, metadata), fields(store = %store_name, operations = operations.len()))]
    pub async fn execute_state_transaction(
        &self,
        store_name: &str,
        operations: Vec<StateTransactionRequest>,
        metadata: Option<Metadata>,
    ) -> Result<(), DaprError> {
        ensure_not_empty(store_name, "store_name")?;
        if operations.is_empty() {
            return Err(DaprError::InvalidArgument("operations"));
        }
        for operation in &operations {
            ensure_not_empty(&operation.key, "key")?;
        }

        let request = ExecuteStateTransactionRequest {
            store_name: store_name.to_string(),
            operations: operations
                .into_iter()
                .map(TransactionalStateOperation::from)
                .collect(),
            metadata: metadata.unwrap_or_default(),
        };

        self.call::<_, ()>(paths::EXECUTE_STATE_TRANSACTION, request)
            .await?;
        Ok(())
    }

    async fn fetch_state(
        &self,
        store_name: &str,
        key: &str,
        consistency: Option<ConsistencyMode>,
        metadata: Option<Metadata>,
    ) -> Result<GetStateResponse, DaprError> {
        ensure_not_empty(store_name, "store_name")?;
        ensure_not_empty(key, "key")?;

        let consistency = consistency.map_or(StateConsistency::ConsistencyUnspecified, Into::into);
        let request = GetStateRequest {
            store_name: store_name.to_string(),
            key: key.to_string(),
            consistency: consistency as i32,
            metadata: metadata.unwrap_or_default(),
        };

        let response = self
            .call::<_, GetStateResponse>(paths::GET_STATE, request)
            .await?;
        Ok(response.message)
    }
}

impl<T: Serialize> StateEntry<T> {
    /// Writes the value back unconditionally.
    pub async fn save<S>(
        &self,
        client: &DaprClient<S>,
        options: Option<StateOptions>,
    ) -> Result<(), DaprError>
    where
        S: tonic::client::GrpcService<tonic::body::Body> + Clone,
        S::Error: Into<BoxError>,
        S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
        <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
    {
        let value = self.value.as_ref().ok_or(DaprError::InvalidArgument("value"))?;
        client
            .save_state(&self.store_name, &self.key, value, options, None)
            .await
    }

    /// Writes the value back if the stored etag still matches the one it was read at.
    pub async fn try_save<S>(
        &self,
        client: &DaprClient<S>,
        options: Option<StateOptions>,
    ) -> Result<bool, DaprError>
    where
        S: tonic::client::GrpcService<tonic::body::Body> + Clone,
        S::Error: Into<BoxError>,
        S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
        <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
    {
        let value = self.value.as_ref().ok_or(DaprError::InvalidArgument("value"))?;
        client
            .try_save_state(
                &self.store_name,
                &self.key,
                value,
                self.etag.as_deref().unwrap_or_default(),
                options,
                None,
            )
            .await
    }
}

impl<T> StateEntry<T> {
    /// Deletes the key unconditionally.
    pub async fn delete<S>(
        &self,
        client: &DaprClient<S>,
        options: Option<StateOptions>,
    ) -> Result<(), DaprError>
    where
        S: tonic::client::GrpcService<tonic::body::Body> + Clone,
        S::Error: Into<BoxError>,
        S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
        <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
    {
        client
            .delete_state(&self.store_name, &self.key, options, None)
            .await
    }

    /// Deletes the key if the stored etag still matches the one it was read at.
    pub async fn try_delete<S>(
        &self,
        client: &DaprClient<S>,
        options: Option<StateOptions>,
    ) -> Result<bool, DaprError>
    where
        S: tonic::client::GrpcService<tonic::body::Body> + Clone,
        S::Error: Into<BoxError>,
        S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
        <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
    {
        client
            .try_delete_state(
                &self.store_name,
                &self.key,
                self.etag.as_deref().unwrap_or_default(),
                options,
                None,
            )
            .await
    }
}

fn save_request<T: Serialize>(
    store_name: &str,
    key: &str,
    value: &T,
    etag: Option<&str>,
    options: Option<StateOptions>,
    metadata: Option<Metadata>,
) -> Result<SaveStateRequest, DaprError> {
    ensure_not_empty(store_name, "store_name")?;
    ensure_not_empty(key, "key")?;

    let item = StateItem {
        key: key.to_string(),
        value: serde_json::to_vec(value)?,
        etag: etag.unwrap_or_default().to_string(),
        metadata: metadata.unwrap_or_default(),
        options: options.map(Into::into),
    };

    Ok(SaveStateRequest {
        store_name: store_name.to_string(),
        states: vec![item],
    })
}

fn delete_request(
    store_name: &str,
    key: &str,
    etag: Option<&str>,
    options: Option<StateOptions>,
    metadata: Option<Metadata>,
) -> Result<DeleteStateRequest, DaprError> {
    ensure_not_empty(store_name, "store_name")?;
    ensure_not_empty(key, "key")?;

    Ok(DeleteStateRequest {
        store_name: store_name.to_string(),
        key: key.to_string(),
        etag: etag.unwrap_or_default().to_string(),
        options: options.map(Into::into),
        metadata: metadata.unwrap_or_default(),
    })
}
