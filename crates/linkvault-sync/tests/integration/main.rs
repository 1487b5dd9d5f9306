//! Integration tests for linkvault-sync
//!
//! Uses wiremock to simulate the application origin and an in-memory SQLite
//! database for the queue and data sink.

mod common;

mod test_engine;
mod test_fetcher;
