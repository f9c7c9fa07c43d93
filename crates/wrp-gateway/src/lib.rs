//! wrp-gateway library entry point.
//!
//! Re-exports the modules the binary in `main.rs` and the integration tests
//! in `tests/` share.
//!
//! ```text
//! wrp-gateway
//!  ├── config    TOML file schema + loading
//!  └── service   key → node redirect (axum)
//! ```
//!
//! Device sessions themselves live in `wrp-device`.

pub mod config;
pub mod service;
