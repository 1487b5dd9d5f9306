//! LinkVault Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RequestSnapshot`, `QueuedRequest`, `HttpResponse`,
//!   `BookmarkMetadataState`, `FaviconCacheEntry`, `ProcessResult`
//! - **Port definitions** - Traits for adapters: `IDataSink`, `IRequestQueue`,
//!   `ICacheStorage`, `IHttpFetcher`
//! - **Configuration** - YAML-backed [`config::Config`]
//!
//! # Architecture
//!
//! The domain module contains pure value types with no I/O. Ports define
//! trait interfaces that adapter crates (`linkvault-cache`, `linkvault-sync`)
//! implement, and that the sync engine and offline router consume.

pub mod config;
pub mod domain;
pub mod ports;
