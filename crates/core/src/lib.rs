//! bsync-core: Core library for the bsync mirroring tool
//!
//! This crate provides the core functionality for bsync, including:
//! - Configuration and profile management
//! - Mapping between local paths and object keys
//! - ObjectStore and FileSystem traits
//! - The sync engine: remote listing, local walking, planning and execution
//!
//! This crate is designed to be independent of any specific S3 SDK,
//! allowing the engine to be tested against in-memory stores.

pub mod config;
pub mod error;
pub mod fs;
pub mod path;
pub mod profile;
pub mod sync;
pub mod traits;

pub use config::{Config, ConfigManager, SyncSettings};
pub use error::{Error, Result};
pub use fs::{FileSystem, LocalFs};
pub use path::{ObjectKey, SyncRoot, to_key, to_local_path};
pub use profile::Profile;
pub use sync::{
    Direction, ItemFailure, Plan, PlannedSync, RemoteLister, SyncEngine, SyncEvent, SyncOptions,
    SyncResult, TransferAction,
};
pub use traits::{ListOptions, ListResult, ObjectInfo, ObjectStore};
