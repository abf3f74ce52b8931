// Shield orchestrator - composes the engines into the request lifecycle
//
// Request path: policy gate, compliance scan, session resolution, then
// sanitization. A block at any stage returns a structured Response (never
// an error) and still writes an audit entry. Response path: look the
// session up and run the desanitizer; an unknown session returns the
// content untouched.
//
// The shield owns every engine and the session store as plain values;
// there is no global state anywhere in the pipeline.
//
// NOTE: part of this surface (session export, policy management, stats)
// exists for embedding hosts; the CLI only drives scan/process/serve.
// Suppressing dead_code until a host wires those in.
#![allow(dead_code)]

use crate::audit;
use crate::compliance;
use crate::desanitize;
use crate::model::{
    Action, ComplianceResult, DesanitizationResult, Request, Response, SanitizationRule, UserPolicy,
    Violation,
};
use crate::policy::{self, PolicyContext};
use crate::sanitize;
use crate::session::{Session, SessionManager, SessionStats, SharedSession};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Runtime configuration, flattened from the config file
#[derive(Debug, Clone)]
pub struct ShieldConfig {
    pub enabled: bool,
    pub session_ttl: Duration,
    pub max_mappings: usize,
    pub block_on_critical: bool,
    pub audit_log_path: PathBuf,
    pub sign_audit_logs: bool,
    pub retention_days: u32,
    pub rules: Vec<SanitizationRule>,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session_ttl: Duration::from_secs(8 * 60 * 60),
            max_mappings: 10_000,
            block_on_critical: true,
            audit_log_path: crate::config::expand_tilde("~/.llm-shield/logs"),
            sign_audit_logs: true,
            retention_days: 365,
            rules: sanitize::default_rules(),
        }
    }
}

/// Aggregate counters for the stats surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldStats {
    pub session_stats: SessionStats,
    pub rules_loaded: usize,
}

/// The policy and data-protection gateway
pub struct Shield {
    config: ShieldConfig,
    sanitizer: sanitize::Engine,
    desanitizer: desanitize::Engine,
    compliance: compliance::Detector,
    sessions: SessionManager,
    policy: policy::Engine,
    audit: audit::Logger,
}

impl Shield {
    /// Build a shield; fails if a configured rule does not compile or the
    /// audit directory cannot be opened. Must be called inside a tokio
    /// runtime (the audit writer runs as a background task).
    pub fn new(config: ShieldConfig) -> Result<Self> {
        let sanitizer = sanitize::Engine::new(config.rules.clone(), config.max_mappings)?;
        let audit = audit::Logger::new(
            config.audit_log_path.clone(),
            config.sign_audit_logs,
            config.retention_days,
        )?;

        Ok(Self {
            sanitizer,
            desanitizer: desanitize::Engine::new(),
            compliance: compliance::Detector::new(config.block_on_critical),
            sessions: SessionManager::new(config.session_ttl),
            policy: policy::Engine::new(),
            audit,
            config,
        })
    }

    /// Process an outbound request before it reaches a provider
    pub fn process_request(&self, request: Request) -> Response {
        let start = Instant::now();

        let mut response = Response {
            session_id: request.session_id.clone().unwrap_or_default(),
            ..Default::default()
        };

        if !self.config.enabled {
            response.content = request.content;
            return response;
        }

        // Step 1: policy gate
        let decision = self.policy.evaluate(&PolicyContext {
            user_id: request.user_id.clone(),
            department: request.department.clone().unwrap_or_default(),
            provider: request.provider.clone(),
        });
        if decision.action == Action::Block {
            response.blocked = true;
            response.block_reason = decision.reason;
            self.audit_request(&request, &response, Action::Block, Vec::new(), start);
            return response;
        }

        // Step 2: compliance scan; critical findings stop the request here
        let compliance_result = self.compliance.scan(&request.content);
        if compliance_result.should_block {
            response.blocked = true;
            response.block_reason = "Critical compliance violation detected".into();
            response.violations = compliance_result.violations.clone();
            self.audit_request(&request, &response, Action::Block, compliance_result.violations, start);
            return response;
        }

        // Step 3: session resolution
        let (shared, _) = self.sessions.get_or_create(
            &request.user_id,
            request.department.as_deref().unwrap_or(""),
            request.session_id.as_deref(),
        );
        response.session_id = shared.lock().unwrap().session_id.clone();

        // Step 4: sanitization, when the policy demands it
        if decision.action == Action::AllowWithSanitization {
            let result = {
                let mut session = shared.lock().unwrap();
                self.sanitizer.sanitize(&request.content, &mut session)
            };

            if result.should_block {
                response.blocked = true;
                response.block_reason = result.block_reason;
                response.violations = result.violations.clone();
                self.audit_request(&request, &response, Action::Block, result.violations, start);
                return response;
            }

            response.content = result.sanitized_content;
            response.was_sanitized = result.was_sanitized;
            response.mappings_created = result.mappings_created;
            response.violations = result.violations;
        } else {
            response.content = request.content.clone();
        }

        let mut all_violations = compliance_result.violations;
        all_violations.extend(response.violations.iter().cloned());
        self.audit_request(&request, &response, decision.action, all_violations, start);

        response
    }

    /// Rewrite a provider response back to original values
    pub fn process_response(&self, content: &str, session_id: &str) -> DesanitizationResult {
        match self.sessions.get(session_id) {
            Some(shared) => {
                let session = shared.lock().unwrap();
                self.desanitizer.desanitize(content, &session)
            }
            // No session: nothing to rewrite with
            None => DesanitizationResult {
                desanitized_content: content.to_string(),
                replacements_count: 0,
                unmatched_aliases: Vec::new(),
                processing_time_ms: 0,
            },
        }
    }

    /// Compliance scan without any processing
    pub fn scan_content(&self, content: &str) -> ComplianceResult {
        self.compliance.scan(content)
    }

    pub fn get_session(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.get(session_id)
    }

    /// Snapshot a session for diagnostics or at-rest export
    pub fn export_session(&self, session_id: &str) -> Option<Session> {
        self.sessions.export(session_id)
    }

    pub fn clear_session(&self, user_id: &str) {
        self.sessions.clear(user_id);
    }

    /// Sweep expired sessions; returns how many were removed
    pub fn cleanup_sessions(&self) -> usize {
        self.sessions.cleanup_expired()
    }

    pub fn set_user_policy(&self, user_id: &str, policy: UserPolicy) {
        self.policy.set_user_policy(user_id, policy);
    }

    pub fn set_department_policy(&self, department: &str, policy: UserPolicy) {
        self.policy.set_department_policy(department, policy);
    }

    pub fn stats(&self) -> ShieldStats {
        ShieldStats {
            session_stats: self.sessions.stats(),
            rules_loaded: self.sanitizer.rules().len(),
        }
    }

    /// The audit logger, for rotation and verification surfaces
    pub fn audit(&self) -> &audit::Logger {
        &self.audit
    }

    /// Drain queued audit writes and flush the log before exit
    pub async fn shutdown(self) -> Result<()> {
        self.audit.shutdown().await
    }

    fn audit_request(
        &self,
        request: &Request,
        response: &Response,
        action: Action,
        violations: Vec<Violation>,
        start: Instant,
    ) {
        let entry = self.audit.create_entry(
            &request.user_id,
            &response.session_id,
            request.department.as_deref().unwrap_or(""),
            &request.provider,
            response.was_sanitized,
            violations,
            action,
            start.elapsed().as_millis() as u64,
        );
        self.audit.log(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditEntry, Severity};
    use std::path::Path;
    use tempfile::TempDir;

    fn shield_in(dir: &Path) -> Shield {
        let config = ShieldConfig {
            audit_log_path: dir.to_path_buf(),
            ..Default::default()
        };
        Shield::new(config).unwrap()
    }

    fn request(user: &str, content: &str, provider: &str) -> Request {
        Request {
            user_id: user.into(),
            session_id: None,
            department: None,
            provider: provider.into(),
            content: content.into(),
            headers: Default::default(),
        }
    }

    async fn audit_entries(dir: &Path, expected: usize) -> Vec<AuditEntry> {
        // The audit path is async; poll until the expected lines land
        let today = chrono::Utc::now().format("%Y-%m-%d");
        let path = dir.join(format!("audit_{}.jsonl", today));
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if let Ok(contents) = std::fs::read_to_string(&path) {
                let lines: Vec<&str> = contents.lines().collect();
                if lines.len() >= expected {
                    return lines
                        .iter()
                        .map(|l| serde_json::from_str(l).unwrap())
                        .collect();
                }
            }
        }
        panic!("expected {} audit entries, found fewer", expected);
    }

    #[tokio::test]
    async fn test_ssn_hard_block() {
        let dir = TempDir::new().unwrap();
        let shield = shield_in(dir.path());

        let response = shield.process_request(request("u@x", "My SSN is 123-45-6789", "openai"));

        assert!(response.blocked);
        assert!(response.block_reason.contains("compliance"));
        assert_eq!(response.violations[0].kind, "SSN");
        assert_eq!(response.violations[0].severity, Severity::Critical);

        let entries = audit_entries(dir.path(), 1).await;
        assert_eq!(entries[0].action, Action::Block);
        assert!(!entries[0].violations.is_empty());
    }

    #[tokio::test]
    async fn test_server_rename_persists_across_requests() {
        let dir = TempDir::new().unwrap();
        let shield = shield_in(dir.path());

        let first = shield.process_request(request("u@x", "Query ServerDB01", "openai"));
        assert!(!first.blocked);
        assert_eq!(first.mappings_created.get("ServerDB01").map(String::as_str), Some("SERVER_0"));

        let second =
            shield.process_request(request("u@x", "Also check ServerDB01 and ServerDB02", "openai"));
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.mappings_created.len(), 1);
        assert_eq!(second.mappings_created.get("ServerDB02").map(String::as_str), Some("SERVER_1"));
        assert!(second.content.contains("SERVER_0"));
        assert!(second.content.contains("SERVER_1"));
    }

    #[tokio::test]
    async fn test_round_trip_restores_original_content() {
        let dir = TempDir::new().unwrap();
        let shield = shield_in(dir.path());

        let content = "To optimize ServerDB01.users_prod, add an index";
        let response = shield.process_request(request("u@x", content, "openai"));
        assert!(response.was_sanitized);
        assert!(!response.content.contains("ServerDB01"));

        let restored = shield.process_response(&response.content, &response.session_id);
        assert_eq!(restored.desanitized_content, content);
        assert_eq!(restored.replacements_count, 2);
    }

    #[tokio::test]
    async fn test_disallowed_provider_blocks_before_sanitization() {
        let dir = TempDir::new().unwrap();
        let shield = shield_in(dir.path());

        let response = shield.process_request(request("u@x", "Query ServerDB01", "grok"));

        assert!(response.blocked);
        assert_eq!(response.block_reason, "Provider not in allowed list");
        assert!(!response.was_sanitized);
        assert!(response.content.is_empty());
        // No session work happened for a policy block
        assert_eq!(shield.stats().session_stats.total_sessions, 0);
    }

    #[tokio::test]
    async fn test_audit_chain_and_signatures_over_three_requests() {
        let dir = TempDir::new().unwrap();
        let shield = shield_in(dir.path());

        for content in ["Query ServerDB01", "ping 10.0.0.1", "hello world"] {
            shield.process_request(request("u@x", content, "openai"));
        }

        let entries = audit_entries(dir.path(), 3).await;
        assert_eq!(entries[0].previous_entry_hash, "");

        let today = chrono::Utc::now().format("%Y-%m-%d");
        let contents =
            std::fs::read_to_string(dir.path().join(format!("audit_{}.jsonl", today))).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        use sha2::{Digest, Sha256};
        for i in 1..entries.len() {
            let mut hasher = Sha256::new();
            hasher.update(lines[i - 1].as_bytes());
            assert_eq!(entries[i].previous_entry_hash, format!("{:x}", hasher.finalize()));
        }

        let signer = shield.audit().signer().unwrap();
        for entry in &entries {
            let signature = entry.signature.clone().unwrap();
            assert!(signer.verify(entry, &signature));
        }
    }

    #[tokio::test]
    async fn test_unknown_session_returns_content_unchanged() {
        let dir = TempDir::new().unwrap();
        let shield = shield_in(dir.path());

        let result = shield.process_response("SERVER_0 status", "sess_nonexistent");
        assert_eq!(result.desanitized_content, "SERVER_0 status");
        assert_eq!(result.replacements_count, 0);
    }

    #[tokio::test]
    async fn test_disabled_shield_passes_content_through() {
        let dir = TempDir::new().unwrap();
        let config = ShieldConfig {
            enabled: false,
            audit_log_path: dir.path().to_path_buf(),
            ..Default::default()
        };
        let shield = Shield::new(config).unwrap();

        let response = shield.process_request(request("u@x", "My SSN is 123-45-6789", "grok"));
        assert!(!response.blocked);
        assert_eq!(response.content, "My SSN is 123-45-6789");
    }

    #[tokio::test]
    async fn test_unrestricted_user_skips_sanitization() {
        let dir = TempDir::new().unwrap();
        let shield = shield_in(dir.path());

        let mut policy = crate::policy::default_policy();
        policy.policy_id = "admin".into();
        policy.access_level = crate::model::AccessLevel::Unrestricted;
        shield.set_user_policy("admin@x", policy);

        let response = shield.process_request(request("admin@x", "Query ServerDB01", "openai"));
        assert!(!response.blocked);
        assert!(!response.was_sanitized);
        assert_eq!(response.content, "Query ServerDB01");
    }

    #[tokio::test]
    async fn test_critical_sanitization_rule_blocks_request() {
        let dir = TempDir::new().unwrap();
        let mut rules = sanitize::default_rules();
        for rule in &mut rules {
            if rule.rule_id == "connection_string" {
                rule.severity = Severity::Critical;
            }
        }
        let config = ShieldConfig {
            audit_log_path: dir.path().to_path_buf(),
            rules,
            ..Default::default()
        };
        let shield = Shield::new(config).unwrap();

        let response =
            shield.process_request(request("u@x", "use Server=db1;Password=x;", "openai"));
        assert!(response.blocked);
        assert!(response.block_reason.contains("Connection Strings"));
    }

    #[tokio::test]
    async fn test_stats_reflect_sessions_and_rules() {
        let dir = TempDir::new().unwrap();
        let shield = shield_in(dir.path());

        shield.process_request(request("a@x", "hello", "openai"));
        shield.process_request(request("b@x", "hello", "openai"));

        let stats = shield.stats();
        assert_eq!(stats.session_stats.total_sessions, 2);
        assert!(stats.rules_loaded > 0);
    }
}
