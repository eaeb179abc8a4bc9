use crate::client::InvocationResult;
use crate::grpc::client::{GrpcRequestError, RpcError};
use crate::grpc::status::MalformedHttpStatus;

/// Errors returned by [`DaprClient`](crate::client::DaprClient) operations.
#[derive(Debug, thiserror::Error)]
pub enum DaprError {
    /// A required identifier or collection was empty. Raised before any call is made.
    #[error("Argument '{0}' must not be empty")]
    InvalidArgument(&'static str),

    #[error("Unsupported {kind} '{value}'")]
    UnsupportedVariant { kind: &'static str, value: String },

    #[error(transparent)]
    Grpc(#[from] GrpcRequestError),

    #[error(transparent)]
    Invocation(#[from] Box<InvocationError>),

    #[error("Failed to (de)serialize the payload as JSON: '{0}'")]
    Serialization(#[from] serde_json::Error),

    #[error("The sidecar returned an invalid response: '{0}'")]
    InvalidResponse(#[from] MalformedHttpStatus),
}

impl DaprError {
    /// Whether the error came from the wire rather than from building the request.
    pub fn is_transport(&self) -> bool {
        match self {
            DaprError::Grpc(err) => err.is_transport(),
            DaprError::Invocation(_) => true,
            _ => false,
        }
    }

    /// The failed call behind this error, if any.
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            DaprError::Grpc(GrpcRequestError::Rpc(err)) => Some(err),
            DaprError::Invocation(err) => Some(&err.source),
            _ => None,
        }
    }

    pub(crate) fn unsupported(kind: &'static str, value: impl ToString) -> Self {
        DaprError::UnsupportedVariant {
            kind,
            value: value.to_string(),
        }
    }
}

/// A service invocation that reached the sidecar but failed.
///
/// `partial` holds everything recovered from the failed call: the trailers and the gRPC
/// status, including the HTTP status code and message of the remote application when the
/// sidecar reported them.
#[derive(Debug, thiserror::Error)]
#[error("Failed to invoke method '{method}' on app '{app_id}': '{source}'")]
pub struct InvocationError {
    pub app_id: String,
    pub method: String,
    #[source]
    pub source: RpcError,
    pub partial: InvocationResult,
}

pub(crate) fn ensure_not_empty(value: &str, name: &'static str) -> Result<(), DaprError> {
    if value.is_empty() {
        Err(DaprError::InvalidArgument(name))
    } else {
        Ok(())
    }
}
