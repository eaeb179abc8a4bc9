//! # Sidecar gRPC Transport
//!
//! This module contains the low-level building blocks used to talk to the Dapr sidecar.
//!
//! * [`client::GrpcClient`] dispatches unary calls through a generic `tonic` service and hands
//!   back the decoded message together with the inbound headers and trailers.
//! * [`auth`] supplies the `dapr-api-token` attached to every outgoing call.
//! * [`cancellation`] provides the cooperative cancellation signal honoured by the dispatcher.
//! * [`status`] classifies responses (HTTP vs gRPC origin) and translates failures, including
//!   the mapping from gRPC status codes to HTTP status codes.
pub mod auth;
pub mod cancellation;
pub mod client;
pub mod status;
