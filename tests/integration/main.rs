//! Integration tests for the depth mirror.
//!
//! Everything runs against an in-memory transport; no network access.

mod connection;
mod mirror;
mod support;
