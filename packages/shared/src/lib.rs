//! Types and utilities shared by the dengon server, client and store.

pub mod envelope;
pub mod logger;
pub mod signal;
pub mod store;
pub mod time;

pub use envelope::{Envelope, EnvelopeKind};
