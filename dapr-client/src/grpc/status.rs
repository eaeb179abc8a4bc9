//! # Response Classification & Error Translation
//!
//! The sidecar fronts both HTTP and gRPC applications. This module looks at the metadata of a
//! call to tell them apart and to recover what the remote application answered:
//!
//! * On success, the presence of the `dapr-http-status` header marks an HTTP application and
//!   carries its status code. Without it the application is gRPC-native.
//! * On failure, the `grpc-status-details-bin` trailer may hold a `google.rpc.Status` whose
//!   `ErrorInfo` detail carries `http.code` and `http.error_message`, i.e. the sidecar reached
//!   an HTTP application which itself answered with an error.
//!
//! [`http_status_for`] maps gRPC status codes onto HTTP status codes. The table is part of the
//! compatibility surface with other Dapr SDKs and must not drift.
use super::client::RpcError;
use crate::proto::google::rpc::{ERROR_INFO_TYPE_URL, ErrorInfo, Status as RpcStatus};
use prost::Message;
use tonic::{Code, metadata::MetadataMap};

/// Response header set by the sidecar when the remote application speaks HTTP.
pub const HTTP_STATUS_HEADER: &str = "dapr-http-status";

/// Binary trailer carrying the serialized `google.rpc.Status`.
pub const STATUS_DETAILS_KEY: &str = "grpc-status-details-bin";

/// `ErrorInfo` metadata entry holding the HTTP status code of the remote application.
pub const ERROR_INFO_HTTP_CODE: &str = "http.code";

/// `ErrorInfo` metadata entry holding the HTTP error message of the remote application.
pub const ERROR_INFO_HTTP_ERROR_MESSAGE: &str = "http.error_message";

pub const HTTP_CONTENT_TYPE: &str = "application/json";
pub const GRPC_CONTENT_TYPE: &str = "application/grpc";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Header 'dapr-http-status' carries a malformed status code: '{0}'")]
pub struct MalformedHttpStatus(pub String);

/// Which kind of application produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOrigin {
    Http { status_code: u16 },
    Grpc(GrpcStatus),
}

impl ResponseOrigin {
    pub fn content_type(&self) -> &'static str {
        match self {
            ResponseOrigin::Http { .. } => HTTP_CONTENT_TYPE,
            ResponseOrigin::Grpc(_) => GRPC_CONTENT_TYPE,
        }
    }
}

/// Final gRPC status of a call, plus the HTTP error reported by the remote application
/// when it could be recovered from the status details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcStatus {
    pub code: Code,
    pub message: String,
    pub inner_http_status_code: Option<u16>,
    pub inner_http_error_message: Option<String>,
}

impl GrpcStatus {
    pub fn ok() -> Self {
        Self {
            code: Code::Ok,
            message: String::new(),
            inner_http_status_code: None,
            inner_http_error_message: None,
        }
    }
}

/// Classifies a successful response from its header metadata.
pub fn classify_response(headers: &MetadataMap) -> Result<ResponseOrigin, MalformedHttpStatus> {
    let Some(value) = headers.get(HTTP_STATUS_HEADER) else {
        return Ok(ResponseOrigin::Grpc(GrpcStatus::ok()));
    };

    let raw = value
        .to_str()
        .map_err(|_| MalformedHttpStatus(format!("{value:?}")))?;
    let status_code = raw
        .trim()
        .parse::<u16>()
        .map_err(|_| MalformedHttpStatus(raw.to_string()))?;

    Ok(ResponseOrigin::Http { status_code })
}

/// Builds the status reported for a failed call, enriched with the remote HTTP error if the
/// trailers carry one. Missing or malformed details leave the inner fields unset.
pub fn grpc_status_from_failure(error: &RpcError) -> GrpcStatus {
    let mut status = GrpcStatus {
        code: error.code(),
        message: error.message().to_string(),
        inner_http_status_code: None,
        inner_http_error_message: None,
    };

    if let Some(info) = error_info(error.trailers()) {
        status.inner_http_status_code = info
            .metadata
            .get(ERROR_INFO_HTTP_CODE)
            .and_then(|code| code.trim().parse().ok());
        status.inner_http_error_message = info.metadata.get(ERROR_INFO_HTTP_ERROR_MESSAGE).cloned();
    }

    status
}

/// Extracts the first `ErrorInfo` detail packed in the `grpc-status-details-bin` trailer.
pub fn error_info(trailers: &MetadataMap) -> Option<ErrorInfo> {
    let blob = trailers.get_bin(STATUS_DETAILS_KEY)?.to_bytes().ok()?;
    let status = RpcStatus::decode(blob).ok()?;

    status
        .details
        .iter()
        .filter(|detail| detail.type_url == ERROR_INFO_TYPE_URL)
        .find_map(|detail| ErrorInfo::decode(detail.value.as_slice()).ok())
}

/// Maps a gRPC status code onto the HTTP status code used by the other Dapr SDKs.
pub fn http_status_for(code: Code) -> u16 {
    match code {
        Code::Ok => 200,
        Code::Cancelled => 408,
        Code::Unknown => 500,
        Code::InvalidArgument => 400,
        Code::DeadlineExceeded => 504,
        Code::NotFound => 404,
        Code::AlreadyExists => 409,
        Code::PermissionDenied => 403,
        Code::Unauthenticated => 401,
        Code::ResourceExhausted => 429,
        // Not 412: the sidecar uses FailedPrecondition for plain bad requests.
        Code::FailedPrecondition => 400,
        Code::Aborted => 409,
        Code::OutOfRange => 400,
        Code::Unimplemented => 501,
        Code::Internal => 500,
        Code::Unavailable => 503,
        Code::DataLoss => 500,
    }
}

/// Same as [`http_status_for`] for a raw status code. Codes outside the known range map to 500.
pub fn http_status_for_code(code: i32) -> u16 {
    match code {
        0..=16 => http_status_for(Code::from_i32(code)),
        _ => 500,
    }
}
