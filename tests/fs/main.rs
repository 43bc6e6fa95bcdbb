//! Integration tests for the in-memory filesystem.
//!
//! Test modules:
//! - `basic`: Descriptors, reads, writes and the raw errno shape
//! - `dirs`: Directory creation, removal, listing and the current directory
//! - `links`: Symlinks, hard links and unnamed files
//! - `metadata`: Stat, permissions and timestamps
//! - `persist`: Snapshots written to disk and loaded back
//! - `rename`: Rename, no-replace and exchange
//! - `sparse`: Holes, truncation and hole punching
//! - `threads`: Sharing an instance across threads

mod dirs;
mod metadata;
mod persist;
mod rename;
