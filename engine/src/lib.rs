//! # Harbor Engine
//!
//! The deterministic core of an offline-first local cache with deferred
//! synchronization.
//!
//! This crate holds the data model that the async runtime (`harbor-client`)
//! moves around: records keyed by identity, the pending operations buffered
//! in the outbox, the sequence clock that orders them, the connectivity state
//! machine, and the persisted formats a storage backend writes to disk.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of files, network, or platform
//! - **Deterministic**: Timestamps are passed in, ordering is by sequence
//! - **Testable**: Pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! Any entity with a stable string `id` implements [`Record`]. Stored values
//! are plain JSON objects grouped into named [`Collection`]s.
//!
//! ### Pending Operations
//!
//! A mutation that could not yet be sent to the remote system of record is
//! captured as a [`PendingOperation`]:
//! - [`OpKind::Insert`] - record created locally
//! - [`OpKind::Update`] - record replaced locally
//! - [`OpKind::Delete`] - record removed locally
//!
//! Entries replay strictly in `seq` order, which the [`SequenceClock`] hands out.
//!
//! ### Connectivity
//!
//! [`ConnectivityState`] is a two-state machine. Only real changes produce a
//! [`Transition`], so subscribers never see a duplicate "online" event.
//!
//! ## Quick Start
//!
//! ```rust
//! use harbor_engine::{Collection, OpKind, PendingOperation, SequenceClock};
//! use serde_json::json;
//!
//! let mut customers = Collection::new();
//! customers.upsert(json!({"id": "c1", "name": "Acme"})).unwrap();
//!
//! let mut clock = SequenceClock::new();
//! let op = PendingOperation::new(
//!     "0190f1c2-0000-7000-8000-000000000001",
//!     clock.tick(),
//!     "customers",
//!     OpKind::Insert,
//!     json!({"id": "c1", "name": "Acme"}),
//!     1706745600000,
//! )
//! .unwrap();
//!
//! assert_eq!(op.record_id, "c1");
//! assert_eq!(customers.len(), 1);
//! ```

pub mod clock;
pub mod connectivity;
pub mod drain;
pub mod error;
pub mod operation;
pub mod record;
pub mod schema;
pub mod snapshot;

// Re-export main types at crate root
pub use clock::SequenceClock;
pub use connectivity::{ConnectivityState, Transition};
pub use drain::{DrainReport, ReplayFailure};
pub use error::Error;
pub use operation::{OpKind, OperationId, PendingOperation};
pub use record::{extract_id, Collection, Record};
pub use schema::{Manifest, Schema, Upgrade, OUTBOX_COLLECTION};
pub use snapshot::{CollectionSnapshot, SNAPSHOT_FORMAT_VERSION};

/// Type aliases for clarity
pub type RecordId = String;
pub type CollectionName = String;
pub type Timestamp = u64;
pub type Sequence = u64;
pub type SchemaVersion = u32;
