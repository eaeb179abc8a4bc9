//! # Cooperative Cancellation
//!
//! A [`CancellationToken`] is handed to a call through
//! [`CallOptions`](super::client::CallOptions). Cancelling it makes every in-flight call that
//! carries a clone of the token finish with a `Cancelled` status, and calls started afterwards
//! fail before anything is sent.
//!
//! Child tokens ([`CancellationToken::child_token`]) let a caller cancel a group of calls
//! without touching the parent.
pub use tokio_util::sync::CancellationToken;
