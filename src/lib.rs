//! # YANG Library
//!
//! A schema registry and delivery service for YANG modeling documents.
//!
//! YANG Library loads schema sources from a filesystem cache, keeps a
//! versioned persisted catalog of every source it knows (with a stable
//! retrieval URL per source), and serves the raw schema text over HTTP,
//! resolving each request by (name, optional revision) under a bounded
//! wait.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  FS cache    │──▶│  Repository  │──▶│ Synchronizer │
//! │ *.yang files │   │  (sources)   │   │  (listener)  │
//! └─────────────┘   └──────┬───────┘   └──────┬───────┘
//!                          │                  ▼
//!                          │           ┌──────────────┐
//!                          │           │   Catalog     │
//!                          │           │   (SQLite)    │
//!                          │           └──────────────┘
//!                          ▼
//!                   ┌──────────────┐
//!                   │     HTTP     │
//!                   │ GET /schemas │
//!                   └──────────────┘
//! ```
//!
//! The repository is the only coupling point between the write path
//! (registration notifications flowing into the catalog) and the read
//! path (HTTP retrieval); the two do not otherwise communicate.
//!
//! ## Quick Start
//!
//! ```bash
//! yanglib init                  # create the catalog database
//! yanglib sources               # list cached schema sources
//! yanglib serve                 # sync the catalog and serve HTTP
//! curl http://127.0.0.1:8181/schemas/ietf-inet-types/2010-09-24
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`repository`] | Shared source repository and listener seam |
//! | [`cache`] | Filesystem source cache |
//! | [`catalog`] | Catalog synchronization |
//! | [`store`] | Persisted catalog storage |
//! | [`server`] | HTTP schema delivery server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Catalog schema migrations |

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod migrate;
pub mod models;
pub mod repository;
pub mod server;
pub mod store;
