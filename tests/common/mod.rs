//! Shared test utilities for tilestitch
//!
//! This module provides common helpers for integration tests:
//! - An in-process HTTP tile server that counts requests
//! - Deterministic PNG tile fixtures

#![allow(dead_code)]

pub mod fixtures;
pub mod tile_server;
