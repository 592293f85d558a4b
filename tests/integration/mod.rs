//! Integration tests for tilestitch
//!
//! These tests run the fetch and pipeline stages against a local tile server.

#[path = "../common/mod.rs"]
pub mod common;

pub mod fetch_flow;
pub mod pipeline_flow;
