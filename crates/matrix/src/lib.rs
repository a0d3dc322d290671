//! Matrix client-server API backend: a [`MatrixClient`] implementing the
//! transmission contract and a `/sync` loop feeding raw events to the
//! dispatcher.

pub mod client;
pub mod error;
pub mod sync;

pub use {
    client::MatrixClient,
    error::{Error, Result},
    sync::{SyncHandle, SyncOptions, SyncResponse, start_sync},
};
