//! # MediaSync Client Library
//!
//! Companion client for a media-serving host: pair with the host, keep the
//! session across restarts, browse what it exposes and download files with
//! user cancellation.
//!
//! ## Architecture
//!
//! The client is built using:
//! - **Reqwest**: HTTP access to the host, bearer-authenticated
//! - **SQLx**: Append-only session history in SQLite
//! - **Tokio**: Async runtime, `watch` channels for state broadcast
//! - **tokio-util**: Per-operation cancellation tokens
//!
//! ## Core Components
//!
//! - [`codec`]: Pairing payload parsing (scanned or manual)
//! - [`store`]: Durable session history
//! - [`session`]: Current session, loading flag and subscribers
//! - [`request`]: Authenticated request layer
//! - [`catalog`]: File listing, file fetch and host settings
//! - [`cancel`]: Single-slot cancellation coordinator
//! - [`pairing`]: Scan/manual pairing state machine
//! - [`transfer`]: Cancellable download into a file sink
//! - [`config`], [`db`], [`error`], [`metrics`], [`state`], [`types`]: plumbing

pub mod cancel;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod pairing;
pub mod request;
pub mod session;
pub mod state;
pub mod store;
pub mod transfer;
pub mod types;

#[cfg(test)]
mod tests;
