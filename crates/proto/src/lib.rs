//! Generated gRPC bindings for Ferry.
//!
//! Regenerated from the `.proto` files under `proto/` at build time.

/// File relay service (`ferry.v1`).
pub mod v1 {
    tonic::include_proto!("ferry.v1");
}

/// Token validation service (`ferry.auth.v1`).
pub mod auth {
    pub mod v1 {
        tonic::include_proto!("ferry.auth.v1");
    }
}
