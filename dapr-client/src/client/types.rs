use crate::error::DaprError;
use crate::grpc::status::{GrpcStatus, ResponseOrigin};
use crate::proto::dapr::proto::common::v1::http_extension::Verb;
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use std::{collections::HashMap, fmt, str::FromStr};

/// String metadata forwarded to the sidecar components.
pub type Metadata = HashMap<String, String>;

/// HTTP verb used when the sidecar forwards an invocation to an HTTP application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Head,
    #[default]
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Head => "HEAD",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Connect => "CONNECT",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = DaprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "HEAD" => Ok(HttpVerb::Head),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "DELETE" => Ok(HttpVerb::Delete),
            "CONNECT" => Ok(HttpVerb::Connect),
            "OPTIONS" => Ok(HttpVerb::Options),
            "TRACE" => Ok(HttpVerb::Trace),
            _ => Err(DaprError::unsupported("HTTP verb", s)),
        }
    }
}

impl From<HttpVerb> for Verb {
    fn from(verb: HttpVerb) -> Self {
        match verb {
            HttpVerb::Get => Verb::Get,
            HttpVerb::Head => Verb::Head,
            HttpVerb::Post => Verb::Post,
            HttpVerb::Put => Verb::Put,
            HttpVerb::Delete => Verb::Delete,
            HttpVerb::Connect => Verb::Connect,
            HttpVerb::Options => Verb::Options,
            HttpVerb::Trace => Verb::Trace,
        }
    }
}

impl TryFrom<i32> for HttpVerb {
    type Error = DaprError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match Verb::try_from(value) {
            Ok(Verb::Get) => Ok(HttpVerb::Get),
            Ok(Verb::Head) => Ok(HttpVerb::Head),
            Ok(Verb::Post) => Ok(HttpVerb::Post),
            Ok(Verb::Put) => Ok(HttpVerb::Put),
            Ok(Verb::Delete) => Ok(HttpVerb::Delete),
            Ok(Verb::Connect) => Ok(HttpVerb::Connect),
            Ok(Verb::Options) => Ok(HttpVerb::Options),
            Ok(Verb::Trace) => Ok(HttpVerb::Trace),
            Ok(Verb::None) | Err(_) => Err(DaprError::unsupported("HTTP verb", value)),
        }
    }
}

/// HTTP semantics of an invocation: verb, query string, headers and content type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpInvocation {
    pub verb: HttpVerb,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Defaults to `application/json` when unset.
    pub content_type: Option<String>,
}

/// Everything needed to invoke a method on another application through the sidecar.
///
/// An absent `body` is sent as no data at all, which is distinct from an empty body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationDescriptor {
    /// The Dapr app id of the target application.
    pub app_id: String,
    /// The method (gRPC) or route (HTTP) to invoke.
    pub method: String,
    pub body: Option<Bytes>,
    /// `None` means a POST with an `application/json` body and no extra headers.
    pub http: Option<HttpInvocation>,
}

impl InvocationDescriptor {
    pub fn new(app_id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            method: method.into(),
            body: None,
            http: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_json_body<T: Serialize>(self, body: &T) -> Result<Self, DaprError> {
        Ok(self.with_body(serde_json::to_vec(body)?))
    }

    pub fn with_verb(mut self, verb: HttpVerb) -> Self {
        self.http_mut().verb = verb;
        self
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_mut().query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_mut().headers.push((key.into(), value.into()));
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.http_mut().content_type = Some(content_type.into());
        self
    }

    fn http_mut(&mut self) -> &mut HttpInvocation {
        self.http.get_or_insert_with(HttpInvocation::default)
    }
}

/// The outcome of a service invocation.
///
/// Headers and trailers are reported byte-exactly, binary (`-bin`) entries already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub body: Bytes,
    /// `application/json` for HTTP applications, `application/grpc` otherwise.
    pub content_type: String,
    pub headers: HashMap<String, Bytes>,
    pub trailers: HashMap<String, Bytes>,
    pub origin: ResponseOrigin,
}

impl InvocationResult {
    /// The status code returned by the remote HTTP application, `None` for gRPC applications.
    pub fn http_status_code(&self) -> Option<u16> {
        match &self.origin {
            ResponseOrigin::Http { status_code } => Some(*status_code),
            ResponseOrigin::Grpc(_) => None,
        }
    }

    /// The final gRPC status, `None` for HTTP applications.
    pub fn grpc_status(&self) -> Option<&GrpcStatus> {
        match &self.origin {
            ResponseOrigin::Grpc(status) => Some(status),
            ResponseOrigin::Http { .. } => None,
        }
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DaprError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// The reply of an output binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingResponse {
    pub data: Bytes,
    pub metadata: Metadata,
}
