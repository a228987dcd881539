//! Lookup service
//!
//! Serves point lookups of title records over two protocols against one
//! shared read-only store handle:
//! - HTTP: `GET /meta/{id}` plus a `/health` liveness path
//! - gRPC: `imdb2meta.MetaFetcher/Get`
//!
//! `server` owns the lifecycle: startup verification, serving, and ordered
//! graceful shutdown (listeners drain before the store closes).

pub mod grpc;
pub mod http;
pub mod lookup;
pub mod server;

pub use lookup::Lookup;
pub use server::{Service, ServiceConfig};
