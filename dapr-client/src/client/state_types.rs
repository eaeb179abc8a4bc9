use super::types::Metadata;
use crate::error::DaprError;
use crate::proto::dapr::proto::common::v1::{
    StateItem, StateOptions as WireStateOptions,
    state_options::{StateConcurrency, StateConsistency},
};
use crate::proto::dapr::proto::runtime::v1::TransactionalStateOperation;
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt, str::FromStr};

/// Read/write consistency requested from the state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsistencyMode {
    Eventual,
    Strong,
}

impl ConsistencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyMode::Eventual => "eventual",
            ConsistencyMode::Strong => "strong",
        }
    }
}

impl FromStr for ConsistencyMode {
    type Err = DaprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eventual" => Ok(ConsistencyMode::Eventual),
            "strong" => Ok(ConsistencyMode::Strong),
            _ => Err(DaprError::unsupported("consistency mode", s)),
        }
    }
}

impl From<ConsistencyMode> for StateConsistency {
    fn from(mode: ConsistencyMode) -> Self {
        match mode {
            ConsistencyMode::Eventual => StateConsistency::ConsistencyEventual,
            ConsistencyMode::Strong => StateConsistency::ConsistencyStrong,
        }
    }
}

impl TryFrom<i32> for ConsistencyMode {
    type Error = DaprError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match StateConsistency::try_from(value) {
            Ok(StateConsistency::ConsistencyEventual) => Ok(ConsistencyMode::Eventual),
            Ok(StateConsistency::ConsistencyStrong) => Ok(ConsistencyMode::Strong),
            Ok(StateConsistency::ConsistencyUnspecified) | Err(_) => {
                Err(DaprError::unsupported("consistency mode", value))
            }
        }
    }
}

/// Conflict resolution applied by the state store on concurrent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConcurrencyMode {
    /// Writes must carry the current etag.
    FirstWrite,
    LastWrite,
}

impl ConcurrencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyMode::FirstWrite => "first-write",
            ConcurrencyMode::LastWrite => "last-write",
        }
    }
}

impl FromStr for ConcurrencyMode {
    type Err = DaprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-write" => Ok(ConcurrencyMode::FirstWrite),
            "last-write" => Ok(ConcurrencyMode::LastWrite),
            _ => Err(DaprError::unsupported("concurrency mode", s)),
        }
    }
}

impl From<ConcurrencyMode> for StateConcurrency {
    fn from(mode: ConcurrencyMode) -> Self {
        match mode {
            ConcurrencyMode::FirstWrite => StateConcurrency::ConcurrencyFirstWrite,
            ConcurrencyMode::LastWrite => StateConcurrency::ConcurrencyLastWrite,
        }
    }
}

impl TryFrom<i32> for ConcurrencyMode {
    type Error = DaprError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match StateConcurrency::try_from(value) {
            Ok(StateConcurrency::ConcurrencyFirstWrite) => Ok(ConcurrencyMode::FirstWrite),
            Ok(StateConcurrency::ConcurrencyLastWrite) => Ok(ConcurrencyMode::LastWrite),
            Ok(StateConcurrency::ConcurrencyUnspecified) | Err(_) => {
                Err(DaprError::unsupported("concurrency mode", value))
            }
        }
    }
}

/// Consistency and concurrency policies of a write or delete. Unset fields are left to the
/// store defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateOptions {
    pub consistency: Option<ConsistencyMode>,
    pub concurrency: Option<ConcurrencyMode>,
}

impl StateOptions {
    pub fn with_consistency(mut self, consistency: ConsistencyMode) -> Self {
        self.consistency = Some(consistency);
        self
    }

    pub fn with_concurrency(mut self, concurrency: ConcurrencyMode) -> Self {
        self.concurrency = Some(concurrency);
        self
    }
}

impl From<StateOptions> for WireStateOptions {
    fn from(options: StateOptions) -> Self {
        let consistency = options
            .consistency
            .map_or(StateConsistency::ConsistencyUnspecified, Into::into);
        let concurrency = options
            .concurrency
            .map_or(StateConcurrency::ConcurrencyUnspecified, Into::into);

        WireStateOptions {
            concurrency: concurrency as i32,
            consistency: consistency as i32,
        }
    }
}

/// Kind of a transactional operation, serialized as a lowercase tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateOperationType {
    Upsert,
    Delete,
}

impl StateOperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateOperationType::Upsert => "upsert",
            StateOperationType::Delete => "delete",
        }
    }
}

impl fmt::Display for StateOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateOperationType {
    type Err = DaprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upsert" => Ok(StateOperationType::Upsert),
            "delete" => Ok(StateOperationType::Delete),
            _ => Err(DaprError::unsupported("state operation type", s)),
        }
    }
}

/// One operation of a state transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransactionRequest {
    pub operation_type: StateOperationType,
    pub key: String,
    pub value: Option<Vec<u8>>,
    pub etag: Option<String>,
    pub metadata: Option<Metadata>,
    pub options: Option<StateOptions>,
}

impl StateTransactionRequest {
    pub fn upsert(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::new(StateOperationType::Upsert, key.into(), Some(value.into()))
    }

    pub fn upsert_json<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self, DaprError> {
        Ok(Self::upsert(key, serde_json::to_vec(value)?))
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::new(StateOperationType::Delete, key.into(), None)
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_options(mut self, options: StateOptions) -> Self {
        self.options = Some(options);
        self
    }

    fn new(operation_type: StateOperationType, key: String, value: Option<Vec<u8>>) -> Self {
        Self {
            operation_type,
            key,
            value,
            etag: None,
            metadata: None,
            options: None,
        }
    }
}

impl From<StateTransactionRequest> for TransactionalStateOperation {
    fn from(operation: StateTransactionRequest) -> Self {
        TransactionalStateOperation {
            operation_type: operation.operation_type.as_str().to_string(),
            request: Some(StateItem {
                key: operation.key,
                value: operation.value.unwrap_or_default(),
                etag: operation.etag.unwrap_or_default(),
                metadata: operation.metadata.unwrap_or_default(),
                options: operation.options.map(Into::into),
            }),
        }
    }
}

/// One key of a bulk read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkStateItem {
    pub key: String,
    /// Raw value, empty when the key does not exist.
    pub value: Bytes,
    pub etag: Option<String>,
    /// Per-key failure reported by the store.
    pub error: Option<String>,
    pub metadata: Metadata,
}

impl BulkStateItem {
    /// Decodes the value as JSON, `None` when the key does not exist.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>, DaprError> {
        decode_state(&self.value)
    }
}

/// A value read from a state store together with the etag it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry<T> {
    pub store_name: String,
    pub key: String,
    pub value: Option<T>,
    pub etag: Option<String>,
    pub metadata: Metadata,
}

/// Empty payloads mean "no value", everything else is JSON.
pub(crate) fn decode_state<T: DeserializeOwned>(data: &[u8]) -> Result<Option<T>, DaprError> {
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(data)?))
}

pub(crate) fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
