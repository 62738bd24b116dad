//! State-machine tests for one beacon cycle, driven through doubles.

#![allow(clippy::expect_used)]

use anyhow::anyhow;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use caracal::beacon::Beacon;
use caracal::config::AgentConfig;

use crate::mocks::{
    fixture_identity, RecordingExecutor, ScriptedTransport, WIRE_SAMPLE,
    WIRE_SAMPLE_BAD_COMMAND, WIRE_SAMPLE_NO_EXECUTOR,
};

fn test_beacon(
    replies: Vec<anyhow::Result<String>>,
) -> Beacon<ScriptedTransport, RecordingExecutor> {
    let config = AgentConfig::new("https://controller".into(), "red".into(), 5);
    Beacon::new(
        fixture_identity(),
        config,
        ScriptedTransport::new(replies),
        RecordingExecutor::new("scripted-output"),
    )
}

/// Wrap an instruction fixture in a full controller reply.
fn reply_with_instructions(raw: &str) -> String {
    format!(r#"{{"paw":"agent1","instructions":"{raw}"}}"#)
}

#[tokio::test]
async fn empty_reply_means_no_instructions() {
    let mut beacon = test_beacon(vec![Ok(String::new())]);
    beacon.cycle().await.expect("cycle succeeds");

    assert_eq!(beacon.transport().calls().len(), 1);
    assert!(beacon.executor().calls().is_empty());
}

#[tokio::test]
async fn status_poll_targets_beacon_path_with_paw() {
    let mut beacon = test_beacon(vec![Ok(String::new())]);
    beacon.cycle().await.expect("cycle succeeds");

    let calls = beacon.transport().calls();
    assert_eq!(calls[0].0, "/beacon?paw=agent1");

    let status: serde_json::Value =
        serde_json::from_slice(&calls[0].1).expect("status body is JSON");
    assert_eq!(status["paw"], "agent1");
    assert_eq!(status["group"], "red");
    assert_eq!(status["server"], "https://controller");
    assert_eq!(status["contact"], "HTTP");
    assert_eq!(status["pid"], "4242");
}

#[tokio::test]
async fn transport_failure_fails_the_cycle_but_not_the_next() {
    let mut beacon = test_beacon(vec![
        Err(anyhow!("connection refused")),
        Ok(String::new()),
    ]);

    assert!(beacon.cycle().await.is_err(), "first cycle must fail");
    beacon.cycle().await.expect("loop survives the failure");
    assert_eq!(beacon.transport().calls().len(), 2);
}

#[tokio::test]
async fn controller_can_update_poll_interval() {
    let mut beacon = test_beacon(vec![Ok(r#"{"paw":"agent1","sleep":"2"}"#.into())]);
    beacon.cycle().await.expect("cycle succeeds");
    assert_eq!(beacon.poll_interval(), 2);
}

#[tokio::test]
async fn non_numeric_sleep_leaves_interval_unchanged() {
    let mut beacon = test_beacon(vec![Ok(r#"{"paw":"agent1","sleep":"abc"}"#.into())]);
    beacon.cycle().await.expect("cycle succeeds");
    assert_eq!(beacon.poll_interval(), 5);
}

#[tokio::test]
async fn zero_sleep_is_ignored() {
    let mut beacon = test_beacon(vec![Ok(r#"{"paw":"agent1","sleep":"0"}"#.into())]);
    beacon.cycle().await.expect("cycle succeeds");
    assert_eq!(beacon.poll_interval(), 5);
}

#[tokio::test]
async fn empty_instruction_array_never_reaches_executing() {
    let mut beacon =
        beacon_with_reply(r#"{"paw":"agent1","instructions":"[]"}"#);
    beacon.cycle().await.expect("cycle succeeds");

    assert!(beacon.executor().calls().is_empty());
    // No result report either: only the status poll went out.
    assert_eq!(beacon.transport().calls().len(), 1);
}

#[tokio::test]
async fn valid_instruction_is_dispatched_and_reported() {
    let mut beacon = test_beacon(vec![
        Ok(reply_with_instructions(WIRE_SAMPLE)),
        Ok(String::new()),
    ]);
    beacon.cycle().await.expect("cycle succeeds");

    let dispatched = beacon.executor().calls();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].0, "cmd");
    assert_eq!(dispatched[0].1, "whoami");

    let calls = beacon.transport().calls();
    assert_eq!(calls.len(), 2, "status poll plus result report");
    assert_eq!(calls[1].0, "/beacon?paw=agent1");

    let report: serde_json::Value =
        serde_json::from_slice(&calls[1].1).expect("report body is JSON");
    assert_eq!(report["paw"], "agent1");
    let results = report["results"].as_array().expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], "90d1a4d7-f957-4f5a-b891-12530ae3795b");
    assert_eq!(results[0]["output"], BASE64.encode("scripted-output"));
    assert_eq!(results[0]["stderr"], "");
    assert_eq!(results[0]["exit_code"], 0);
    assert_eq!(results[0]["status"], 0);
    assert_eq!(results[0]["pid"], 0);
}

#[tokio::test]
async fn record_missing_executor_is_never_dispatched() {
    let mut beacon =
        beacon_with_reply(&reply_with_instructions(WIRE_SAMPLE_NO_EXECUTOR));
    beacon.cycle().await.expect("cycle succeeds");

    assert!(beacon.executor().calls().is_empty());
    assert_eq!(beacon.transport().calls().len(), 1);
}

#[tokio::test]
async fn undecodable_command_skips_the_record() {
    let mut beacon =
        beacon_with_reply(&reply_with_instructions(WIRE_SAMPLE_BAD_COMMAND));
    beacon.cycle().await.expect("cycle succeeds");

    assert!(beacon.executor().calls().is_empty());
    assert_eq!(beacon.transport().calls().len(), 1);
}

#[tokio::test]
async fn sleep_update_applies_even_alongside_instructions() {
    let reply = format!(
        r#"{{"paw":"agent1","sleep":"9","instructions":"{WIRE_SAMPLE}"}}"#
    );
    let mut beacon = test_beacon(vec![Ok(reply), Ok(String::new())]);
    beacon.cycle().await.expect("cycle succeeds");

    assert_eq!(beacon.poll_interval(), 9);
    assert_eq!(beacon.executor().calls().len(), 1);
}

fn beacon_with_reply(reply: &str) -> Beacon<ScriptedTransport, RecordingExecutor> {
    test_beacon(vec![Ok(reply.to_string())])
}
