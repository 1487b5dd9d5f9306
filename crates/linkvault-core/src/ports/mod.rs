//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IDataSink`] - Bookmark metadata state and favicon cache writes
//! - [`IRequestQueue`] - Durable retry queue of deferred requests
//! - [`ICacheStorage`] - Named HTTP response caches
//! - [`IHttpFetcher`] - Network access

pub mod cache_storage;
pub mod data_sink;
pub mod http_fetcher;
pub mod request_queue;

pub use cache_storage::ICacheStorage;
pub use data_sink::IDataSink;
pub use http_fetcher::IHttpFetcher;
pub use request_queue::IRequestQueue;
