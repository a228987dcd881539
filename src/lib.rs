//! # imdb2meta
//!
//! Imports IMDb title metadata from the `title.basics.tsv.gz` dump into an
//! embedded key-value store and serves point lookups over HTTP and gRPC.
//!
//! Two binaries share this library:
//!
//! ### Import a dataset
//! ```bash
//! imdb2meta-import \
//!   --tsv-path ./data.tsv \
//!   --sled-path ./imdb-sled \
//!   --skip-episodes
//! ```
//!
//! ### Serve lookups
//! ```bash
//! imdb2meta-service \
//!   --bind-addr 0.0.0.0 \
//!   --http-port 8080 \
//!   --grpc-port 8081 \
//!   --sled-path ./imdb-sled
//! ```
//!
//! Either embedded engine can back the store; pass `--rocks-path` instead of
//! `--sled-path` to use RocksDB. Exactly one must be given.

pub mod error;
pub mod ingest;
pub mod model;
pub mod service;
pub mod store;

pub use error::{Error, Result};
pub use model::{TitleRecord, TitleType};
pub use service::{Service, ServiceConfig};

// Generated protobuf code
pub mod proto {
    tonic::include_proto!("imdb2meta");
}

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
