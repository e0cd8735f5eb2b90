//! Integration tests for the crawl store and driver
//!
//! Graphs are served by in-memory page sources; databases live in temporary
//! directories so several handles can share one file.

mod common;
mod driver_tests;
mod store_tests;
