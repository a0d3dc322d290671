//! Collaborator contracts consumed by the dispatch core.
//!
//! A protocol backend (Matrix today) implements [`TransmissionClient`] and
//! feeds [`RawEvent`]s into an [`EventHandler`]; a persistence backend
//! implements [`MessageStore`] and [`RoomDirectory`]. Nothing here knows about
//! retries or action matching.

pub mod error;
pub mod raw;
pub mod source;
pub mod store;
pub mod transport;

pub use {
    error::{Error, Result},
    raw::RawEvent,
    source::{EventHandler, route_event},
    store::{MessageFilter, MessageStore, RoomDirectory},
    transport::{Crypto, DecryptedPayload, TransmissionClient, TransmitError},
};
