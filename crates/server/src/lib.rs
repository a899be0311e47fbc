//! Streaming gRPC file server for Ferry.
//!
//! The server exposes the `ferry.v1.FileService` RPC surface and relays
//! file content between client streams and the configured object store.

pub mod relay;
pub mod service;

pub use service::FileRelayService;
