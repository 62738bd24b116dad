//! Agent configuration and wire-protocol constants.

/// Poll interval used when no `--sleep` flag is given and the controller
/// has not pushed an override.
pub const DEFAULT_SLEEP_SECS: u64 = 5;

/// Sleep applied after a failed cycle. Deliberately longer than the
/// normal poll interval so a flapping controller is not hammered.
pub const COOLDOWN_SECS: u64 = 30;

/// Path every status and result POST goes to.
pub const BEACON_PATH: &str = "/beacon";

/// Contact method label reported in every status payload.
pub const CONTACT: &str = "HTTP";

/// Mutable runtime configuration owned by the beacon state machine.
///
/// The only field that ever changes after startup is `sleep_secs`,
/// written between cycles when the controller pushes a new interval.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Controller base URL, e.g. `https://10.0.0.5:8888`.
    pub server: String,
    /// Group/tag label reported on every beacon.
    pub group: String,
    /// Seconds slept between successful cycles. Always positive.
    pub sleep_secs: u64,
}

impl AgentConfig {
    /// Build a config, clamping the poll interval to at least one second.
    #[must_use]
    pub fn new(server: String, group: String, sleep_secs: u64) -> Self {
        Self { server, group, sleep_secs: sleep_secs.max(1) }
    }
}
