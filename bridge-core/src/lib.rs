//! # Bridge Core
//!
//! The rendezvous relay behind Jupyter-Bridge: a multi-tenant broker that
//! lets a remote notebook kernel drive a browser-local application the
//! kernel cannot reach directly.
//!
//! ## Overview
//!
//! Each channel (an opaque id, conventionally a UUID, shared out of band)
//! names a pair of single-message mailboxes:
//!
//! - **request**: kernel -> browser, a JSON description of an HTTP call to
//!   run against the local application
//! - **reply**: browser -> kernel, the raw bytes of the local response
//!
//! There is no queueing. A slot holds at most one undelivered message, and
//! posting over an undelivered message is a protocol violation; queueing
//! would only mask peer bugs.
//!
//! ## Architecture
//!
//! - [`store::SlotStore`]: per-slot hashes with atomic field ops and TTL,
//!   backed by Redis in production and an in-memory map in tests
//! - [`engine::RendezvousEngine`]: enqueue/dequeue semantics, the long-poll
//!   wait loop with adaptive cadence, and the zombie-reader reset

/// Rendezvous semantics on top of the slot store
pub mod engine;

/// Error types and handling
pub mod error;

/// Channel, slot, and field naming
pub mod slot;

/// Slot store trait and backends
pub mod store;

pub use engine::{HandoffPolicy, PollTimings, RendezvousEngine};
pub use error::{BridgeError, Result};
pub use slot::{Field, SlotKey, SlotKind};
pub use store::{MemorySlotStore, RedisSlotStore, SlotStore};
