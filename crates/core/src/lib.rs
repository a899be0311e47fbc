//! Core domain types and shared logic for the Ferry file relay.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Transfer headers and file metadata
//! - The transfer error taxonomy
//! - The bounded chunk pipe bridging stream producers and consumers
//! - The one-shot transfer completion signal
//! - Configuration types for both binaries

pub mod config;
pub mod error;
pub mod pipe;
pub mod signal;
pub mod transfer;

pub use error::{TransferError, TransferResult};
pub use pipe::{PipeReader, PipeWriter, chunk_pipe};
pub use signal::{SignalReceiver, SignalSender, error_signal};
pub use transfer::{FileInfo, TransferHeader};

/// Chunk size for both upload draining and download pumping: 1 MiB.
///
/// Applied uniformly so that no stream fragment and no pipe entry ever
/// exceeds this bound.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Number of in-flight chunks a pipe buffers before the writer suspends.
pub const PIPE_DEPTH: usize = 4;
