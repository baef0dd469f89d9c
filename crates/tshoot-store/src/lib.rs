//! Troubleshooting session state
//!
//! Everything a troubleshooting session persists lives behind the
//! [`KeyValueStore`] trait:
//! - the session hash a browser must present
//! - the extension allow-list and the theme override
//! - the operator notice queue
//! - the backup of the real active extension list
//!
//! [`OverrideStore`] is the typed view over those keys. Backends are
//! swappable so tests run against [`MemoryStore`] while the CLI persists to
//! a [`JsonFileStore`].

pub mod error;
pub mod kv;
pub mod notice;
pub mod overrides;

pub use error::StoreError;
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use notice::{Notice, Severity};
pub use overrides::{keys, OverrideSnapshot, OverrideStore, Overrides};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
