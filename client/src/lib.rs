//! # Harbor Client
//!
//! Offline-first local cache with deferred synchronization.
//!
//! The application talks to a [`SyncCoordinator`]. Every mutation lands in the
//! [`DurableStore`] before the call returns, so the app keeps working with no
//! network. Mutations made while offline are also appended to the
//! [`OutboxQueue`]; when the [`ConnectivityMonitor`] reports that the network
//! is back, the coordinator replays them against the
//! [`RemoteRecordService`] in the order they were made.
//!
//! ```text
//! app ──► SyncCoordinator ──► DurableStore ──► StorageBackend (memory | files)
//!               │    ▲
//!               │    └── ConnectivityMonitor ◄── host reachability events
//!               └──► OutboxQueue ──(drain)──► RemoteRecordService (HTTP)
//! ```
//!
//! Guarantees:
//! - no lost writes: a mutation is either stored (and queued if needed) or
//!   the call fails with nothing changed
//! - no duplicate replay: an entry is removed as soon as the remote confirms
//!   it, and drains never overlap
//! - deterministic order: replay follows one global enqueue sequence

pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod handle;
pub mod outbox;
pub mod remote;
pub mod storage;
pub mod store;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use connectivity::{ConnectivityMonitor, ReachabilitySignal, StaticSignal};
pub use coordinator::SyncCoordinator;
pub use error::{RemoteError, Result, StorageError, SyncError};
pub use handle::CollectionHandle;
pub use outbox::OutboxQueue;
pub use remote::{HttpRecordService, RemoteRecordService};
pub use storage::{FileBackend, MemoryBackend, StorageBackend};
pub use store::{CollectionWriter, DurableStore};

pub use harbor_engine::{
    ConnectivityState, DrainReport, OpKind, PendingOperation, Record, ReplayFailure, Schema,
    Transition,
};
