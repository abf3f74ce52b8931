// Shared data model for the shield pipeline
//
// These types flow between the policy evaluator, the compliance detector,
// the sanitization engines and the audit logger. They also define the wire
// shape of the audit log and the CLI JSON output, so every struct carries
// camelCase serde names matching the documented log format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─────────────────────────────────────────────────────────────────────────────
// Closed enums (string spellings are part of the wire format)
// ─────────────────────────────────────────────────────────────────────────────

/// Severity of a rule or a detected violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Action taken for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    AllowWithSanitization,
    AllowWithWarning,
    Block,
    RateLimited,
}

impl Action {
    /// Wire spelling, used by the signature canonicalization
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::AllowWithSanitization => "allow_with_sanitization",
            Action::AllowWithWarning => "allow_with_warning",
            Action::Block => "block",
            Action::RateLimited => "rate_limited",
        }
    }
}

/// User access level for policy gating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Unrestricted,
    SanitizedOnly,
    Blocked,
}

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Expired,
    Terminated,
}

// ─────────────────────────────────────────────────────────────────────────────
// Rules and policies
// ─────────────────────────────────────────────────────────────────────────────

/// A pattern-based rewrite rule for the sanitization engine
///
/// Rules are applied in ascending `order`. `exceptions` are regexes checked
/// against the matched value; any hit suppresses the rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizationRule {
    pub rule_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub pattern: String,
    /// Alias namespace, e.g. "SERVER" mints SERVER_0, SERVER_1, ...
    pub prefix: String,
    pub severity: Severity,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<String>,
    /// Smaller fires first; more specific patterns should carry smaller values
    #[serde(default)]
    pub order: i32,
}

/// Access rules for a user or a department
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPolicy {
    pub policy_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub department: String,
    pub access_level: AccessLevel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_providers: Vec<String>,
    /// Quotas are carried for the host to enforce; the core does not rate limit
    pub daily_request_limit: u32,
    pub hourly_request_limit: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_rules: Vec<String>,
    pub enabled: bool,
}

/// Result of a policy evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecision {
    pub action: Action,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub policy_applied: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_sanitization: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Violations and engine results
// ─────────────────────────────────────────────────────────────────────────────

/// A single detection hit
///
/// `redacted_value` is the only echo of the matched text that ever leaves
/// the engine; the raw value is never stored or logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule_id: String,
    pub rule_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub redacted_value: String,
    /// Byte offset of the match in the content as the rule saw it
    pub position: usize,
    /// Byte length of the matched value
    pub length: usize,
}

/// Result of a sanitize pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizationResult {
    pub sanitized_content: String,
    pub was_sanitized: bool,
    /// Only mappings freshly minted in this pass; reused aliases are absent
    pub mappings_created: HashMap<String, String>,
    pub violations: Vec<Violation>,
    pub processing_time_ms: u64,
    pub should_block: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub block_reason: String,
}

/// Result of a desanitize pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesanitizationResult {
    pub desanitized_content: String,
    pub replacements_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmatched_aliases: Vec<String>,
    pub processing_time_ms: u64,
}

/// Result of a compliance scan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResult {
    pub has_violations: bool,
    pub should_block: bool,
    pub violations: Vec<Violation>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / response surface
// ─────────────────────────────────────────────────────────────────────────────

/// An outbound prompt entering the shield
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// The processed request, either rewritten or blocked
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub content: String,
    pub session_id: String,
    pub was_sanitized: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mappings_created: HashMap<String, String>,
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub block_reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Audit log entries
// ─────────────────────────────────────────────────────────────────────────────

/// One line of the append-only audit log
///
/// `previous_entry_hash` is the SHA-256 of the previous serialized line,
/// forming a per-process hash chain rooted at the empty string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub department: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_hash: Option<String>,
    pub was_sanitized: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    pub action: Action,
    pub processing_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub previous_entry_hash: String,
}
