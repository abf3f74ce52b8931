// Sanitization engine - outbound rewriting of sensitive values into aliases
//
// Rules run in ascending `order`. Within one rule's pass, matches are
// processed right to left so the byte offsets of untouched matches stay
// valid while earlier ones are spliced. Aliases are stable per session:
// the same original always rewrites to the same alias, and a mapping is
// reported in `mappings_created` only the first time it is minted.

mod rules;

pub use rules::default_rules;

use crate::model::{SanitizationResult, SanitizationRule, Severity, Violation};
use crate::session::Session;
use crate::util::truncate_utf8_safe;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Per-rule scan budget; a pass that exceeds it is logged, not aborted.
/// The regex crate guarantees linear-time matching, so this only trips on
/// pathological rule sets against very large content.
const RULE_SCAN_BUDGET: Duration = Duration::from_millis(50);

/// Bound on the rule-name echo inside a block reason; rule names come
/// from the config file and flow into user-facing responses
const BLOCK_REASON_NAME_LIMIT: usize = 128;

/// A rule with its compiled patterns
struct CompiledRule {
    rule: SanitizationRule,
    pattern: Regex,
    exceptions: Vec<Regex>,
}

/// The sanitization engine
///
/// Holds the active rule set behind a readers-writer lock. `sanitize` takes
/// an Arc snapshot of the rules and releases the lock before scanning, so
/// `load_rules` never stalls in-flight passes.
pub struct Engine {
    rules: RwLock<Arc<Vec<CompiledRule>>>,
    max_mappings: usize,
}

impl Engine {
    /// Build an engine from an initial rule set
    ///
    /// `max_mappings` caps a session's forward map; once full, new values
    /// are reported as violations but left unrewritten.
    pub fn new(rules: Vec<SanitizationRule>, max_mappings: usize) -> Result<Self> {
        let compiled = compile_rules(rules)?;
        Ok(Self {
            rules: RwLock::new(Arc::new(compiled)),
            max_mappings,
        })
    }

    /// Replace the active rule set
    ///
    /// Compiles everything up front; on any compile failure the previous
    /// rule set stays active and the error is returned.
    pub fn load_rules(&self, rules: Vec<SanitizationRule>) -> Result<()> {
        let compiled = compile_rules(rules)?;
        *self.rules.write().unwrap() = Arc::new(compiled);
        Ok(())
    }

    /// A copy of the currently loaded (enabled) rules
    pub fn rules(&self) -> Vec<SanitizationRule> {
        self.rules
            .read()
            .unwrap()
            .iter()
            .map(|c| c.rule.clone())
            .collect()
    }

    /// Rewrite sensitive values in `content` into session-scoped aliases
    pub fn sanitize(&self, content: &str, session: &mut Session) -> SanitizationResult {
        let start = Instant::now();
        let snapshot = Arc::clone(&self.rules.read().unwrap());

        let mut result = SanitizationResult {
            sanitized_content: content.to_string(),
            was_sanitized: false,
            mappings_created: HashMap::new(),
            violations: Vec::new(),
            processing_time_ms: 0,
            should_block: false,
            block_reason: String::new(),
        };

        let mut working = content.to_string();
        let mut cap_warned = false;

        for compiled in snapshot.iter() {
            let rule_start = Instant::now();
            let matches: Vec<(usize, usize)> = compiled
                .pattern
                .find_iter(&working)
                .map(|m| (m.start(), m.end()))
                .collect();
            if matches.is_empty() {
                continue;
            }

            // Right to left: splicing a match never shifts the ones before it
            for &(match_start, match_end) in matches.iter().rev() {
                let value = working[match_start..match_end].to_string();

                if compiled.exceptions.iter().any(|re| re.is_match(&value)) {
                    continue;
                }

                // Blocking does not short-circuit; later rules still run so
                // the audit record covers the whole request
                if compiled.rule.severity == Severity::Critical {
                    result.should_block = true;
                    result.block_reason = format!(
                        "Critical violation detected: {}",
                        truncate_utf8_safe(&compiled.rule.name, BLOCK_REASON_NAME_LIMIT)
                    );
                }

                let mut alias = session.alias_for(&value).map(String::from);
                if alias.is_none() {
                    if session.mappings.len() >= self.max_mappings {
                        if !cap_warned {
                            tracing::warn!(
                                session_id = %session.session_id,
                                cap = self.max_mappings,
                                "session mapping cap reached; matches recorded but not rewritten"
                            );
                            cap_warned = true;
                        }
                    } else {
                        let minted = generate_alias(session, &compiled.rule.prefix);
                        session.add_mapping(value.clone(), minted.clone());
                        result.mappings_created.insert(value.clone(), minted.clone());
                        alias = Some(minted);
                    }
                }

                result.violations.push(Violation {
                    rule_id: compiled.rule.rule_id.clone(),
                    rule_name: compiled.rule.name.clone(),
                    kind: compiled.rule.prefix.clone(),
                    severity: compiled.rule.severity,
                    redacted_value: redact_value(&value),
                    position: match_start,
                    length: match_end - match_start,
                });

                if let Some(alias) = alias {
                    working.replace_range(match_start..match_end, &alias);
                    result.was_sanitized = true;
                }
            }

            let elapsed = rule_start.elapsed();
            if elapsed > RULE_SCAN_BUDGET {
                tracing::warn!(
                    rule = %compiled.rule.rule_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "sanitization rule exceeded its scan budget"
                );
            }
        }

        result.sanitized_content = working;
        result.processing_time_ms = start.elapsed().as_millis() as u64;
        result
    }
}

/// Mint the next alias for a prefix: SERVER_0, SERVER_1, ...
///
/// Counters start at 0 and are per-session, per-prefix. Alias strings match
/// `[A-Z]+_\d+` so word-boundary matching on them is safe on the way back.
pub fn generate_alias(session: &mut Session, prefix: &str) -> String {
    let counter = session.next_counter(prefix);
    format!("{}_{}", prefix, counter)
}

fn compile_rules(rules: Vec<SanitizationRule>) -> Result<Vec<CompiledRule>> {
    let mut compiled = Vec::with_capacity(rules.len());
    for rule in rules {
        if !rule.enabled {
            continue;
        }
        let pattern = Regex::new(&rule.pattern)
            .with_context(|| format!("failed to compile pattern for rule {}", rule.rule_id))?;
        let mut exceptions = Vec::with_capacity(rule.exceptions.len());
        for exception in &rule.exceptions {
            exceptions.push(Regex::new(exception).with_context(|| {
                format!("failed to compile exception for rule {}", rule.rule_id)
            })?);
        }
        compiled.push(CompiledRule {
            rule,
            pattern,
            exceptions,
        });
    }
    compiled.sort_by_key(|c| c.rule.order);
    Ok(compiled)
}

/// Redacted echo of a matched value: enough to recognize, never to recover
fn redact_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    match chars.len() {
        0..=3 => "***".to_string(),
        4..=6 => format!("{}***{}", chars[0], chars[chars.len() - 1]),
        n => {
            let head: String = chars[..3].iter().collect();
            let tail: String = chars[n - 3..].iter().collect();
            format!("{}***{}", head, tail)
        }
    }
}
