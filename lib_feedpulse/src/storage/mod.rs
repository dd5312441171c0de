//! # User Stores
//!
//! Implementations of the single-slot `UserStore` port.
//!
//! - **`memory`**: in-process slot. `write_external` stands in for a write
//!   made by another tab.
//! - **`file`**: JSON file on disk, with a poller that reports writes made by
//!   other processes as external changes.

pub mod file;
pub mod memory;

pub use file::FileUserStore;
pub use memory::MemoryUserStore;

/// Buffered change notifications per store.
pub(crate) const CHANGE_CAPACITY: usize = 16;
