// Desanitization engine - the return path of the alias map
//
// Provider responses come back speaking in aliases; this engine substitutes
// the session's stored originals back in. Aliases are matched as whole
// words, longest first, so SERVER_10 is never corrupted by a SERVER_1
// replacement. Alias-shaped tokens the session does not know pass through
// unchanged and are reported, since they usually mean the provider invented
// an identifier or the caller mixed up sessions.

use crate::model::DesanitizationResult;
use crate::session::Session;
use crate::util::truncate_utf8_safe;
use regex::Regex;
use std::time::Instant;

/// Cap on the compile-error echo in the fallback warning; the error text
/// can embed the entire alias alternation
const ERROR_LOG_LIMIT: usize = 256;

/// Rewrites aliases back to their original values
pub struct Engine;

impl Engine {
    pub fn new() -> Self {
        Self
    }

    /// Replace every known alias in `content` with its stored original
    pub fn desanitize(&self, content: &str, session: &Session) -> DesanitizationResult {
        let start = Instant::now();

        let mut result = DesanitizationResult {
            desanitized_content: content.to_string(),
            replacements_count: 0,
            unmatched_aliases: Vec::new(),
            processing_time_ms: 0,
        };

        if session.reverse_mappings.is_empty() {
            result.processing_time_ms = start.elapsed().as_millis() as u64;
            return result;
        }

        // Longest first: SERVER_10 must be attempted before SERVER_1
        let mut aliases: Vec<&str> = session.reverse_mappings.keys().map(String::as_str).collect();
        aliases.sort_by(|a, b| b.len().cmp(&a.len()));

        // One alternation over every known alias, plus a generic arm that
        // catches alias-shaped tokens missing from the map
        let escaped: Vec<String> = aliases.iter().map(|a| regex::escape(a)).collect();
        let pattern = format!(r"\b(?:{}|[A-Z]+_\d+)\b", escaped.join("|"));

        match Regex::new(&pattern) {
            Ok(re) => {
                let mut replacements = 0usize;
                let mut unmatched: Vec<String> = Vec::new();
                let rewritten = re.replace_all(content, |caps: &regex::Captures| {
                    let token = &caps[0];
                    match session.original_for(token) {
                        Some(original) => {
                            replacements += 1;
                            original.to_string()
                        }
                        None => {
                            unmatched.push(token.to_string());
                            token.to_string()
                        }
                    }
                });
                result.desanitized_content = rewritten.into_owned();
                result.replacements_count = replacements;
                result.unmatched_aliases = unmatched;
            }
            Err(err) => {
                // Should not happen for escaped literals; fall back to plain
                // substitution, still longest first
                let err = err.to_string();
                tracing::warn!(
                    error = %truncate_utf8_safe(&err, ERROR_LOG_LIMIT),
                    "alias alternation failed to compile, using literal fallback"
                );
                let mut working = content.to_string();
                for alias in &aliases {
                    if let Some(original) = session.original_for(alias) {
                        let hits = working.matches(alias).count();
                        if hits > 0 {
                            working = working.replace(alias, original);
                            result.replacements_count += hits;
                        }
                    }
                }
                result.desanitized_content = working;
            }
        }

        result.processing_time_ms = start.elapsed().as_millis() as u64;
        result
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session_with(mappings: &[(&str, &str)]) -> Session {
        let mut session = Session::new("sess_test", "user@test.com", "", Duration::hours(8));
        for (original, alias) in mappings {
            session.add_mapping(*original, *alias);
        }
        session
    }

    #[test]
    fn test_longest_alias_wins() {
        let session = session_with(&[("ServerDB01", "SERVER_1"), ("ServerDB10", "SERVER_10")]);
        let engine = Engine::new();

        let result = engine.desanitize("Check SERVER_10 and SERVER_1 status.", &session);

        assert_eq!(result.desanitized_content, "Check ServerDB10 and ServerDB01 status.");
        assert_eq!(result.replacements_count, 2);
        assert!(result.unmatched_aliases.is_empty());
    }

    #[test]
    fn test_empty_map_is_identity() {
        let session = session_with(&[]);
        let engine = Engine::new();

        let result = engine.desanitize("Nothing to do with SERVER_0 here", &session);

        assert_eq!(result.desanitized_content, "Nothing to do with SERVER_0 here");
        assert_eq!(result.replacements_count, 0);
    }

    #[test]
    fn test_unknown_alias_passes_through_and_is_reported() {
        let session = session_with(&[("ServerDB01", "SERVER_0")]);
        let engine = Engine::new();

        let result = engine.desanitize("SERVER_0 talks to IP_99", &session);

        assert_eq!(result.desanitized_content, "ServerDB01 talks to IP_99");
        assert_eq!(result.replacements_count, 1);
        assert_eq!(result.unmatched_aliases, vec!["IP_99".to_string()]);
    }

    #[test]
    fn test_word_boundaries_prevent_partial_hits() {
        let session = session_with(&[("ServerDB01", "SERVER_0")]);
        let engine = Engine::new();

        // SERVER_01 is a different token; SERVER_0 inside it must not match
        let result = engine.desanitize("see SERVER_01", &session);

        assert_eq!(result.desanitized_content, "see SERVER_01");
        assert_eq!(result.replacements_count, 0);
        assert_eq!(result.unmatched_aliases, vec!["SERVER_01".to_string()]);
    }

    #[test]
    fn test_repeated_alias_counts_every_hit() {
        let session = session_with(&[("10.0.0.5", "IP_0")]);
        let engine = Engine::new();

        let result = engine.desanitize("IP_0, again IP_0", &session);

        assert_eq!(result.desanitized_content, "10.0.0.5, again 10.0.0.5");
        assert_eq!(result.replacements_count, 2);
    }
}
