//! Caracal beacon agent library — exposes modules for integration testing.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod beacon;
pub mod cli;
pub mod codec;
pub mod config;
pub mod executor;
pub mod identity;
pub mod transport;
