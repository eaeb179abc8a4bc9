//! # Dapr Client
//!
//! `dapr-client` talks to a Dapr sidecar over its gRPC API. It covers service invocation
//! against HTTP and gRPC applications, state management with etag-based optimistic
//! concurrency, pub/sub publishing, output bindings and secrets.
//!
//! ## Key Components
//!
//! * **[`DaprClient`]:** The main entry point. One instance (or cheap clones of it) per process,
//!   safe to share across tasks.
//! * **[`DaprError`]:** The single error type of the public API. Argument errors are raised
//!   before anything is sent; everything else carries the failed call.
//!
//! ## Internal clients
//!
//! The [`grpc`] module exposes the dispatcher the client is built on, along with the response
//! classification helpers (`dapr-http-status` header, `grpc-status-details-bin` trailer) and
//! the gRPC to HTTP status code table.
//!
//! ## Feature Flags (Internal use only)
//!
//! * `gen-proto`: Enables the binary regenerating the checked-in Protobuf bindings.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost` and `tonic` to ensure that consumers use compatible versions
//! of these underlying dependencies.
//!
//! See the README.md for more details about usage.
pub mod client;
pub mod error;
pub mod grpc;
pub mod proto;

pub use client::DaprClient;
pub use error::DaprError;

// Re-exports
pub use prost;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
