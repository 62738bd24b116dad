//! Unit tests for the caracal beacon agent.
//!
//! These tests drive the beacon state machine through scripted doubles
//! and run fast, without network access or child processes.

mod beacon_cycle;
