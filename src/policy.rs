// Policy evaluator - access gating over (user, department, provider)
//
// Precedence: explicit user policy > department policy > built-in default.
// Evaluation is read-only; the tables sit behind a readers-writer lock so
// concurrent requests never serialize on each other.

use crate::model::{AccessLevel, Action, PolicyDecision, UserPolicy};
use std::collections::HashMap;
use std::sync::RwLock;

/// Context for one policy evaluation
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    pub user_id: String,
    pub department: String,
    pub provider: String,
}

#[derive(Default)]
struct PolicyTables {
    /// userID -> policy
    users: HashMap<String, UserPolicy>,
    /// department -> default policy
    departments: HashMap<String, UserPolicy>,
}

/// Evaluates access policies for users
pub struct Engine {
    tables: RwLock<PolicyTables>,
    default_policy: UserPolicy,
}

/// The policy applied when neither a user nor a department policy exists
pub fn default_policy() -> UserPolicy {
    UserPolicy {
        policy_id: "default".into(),
        user_id: String::new(),
        department: String::new(),
        access_level: AccessLevel::SanitizedOnly,
        allowed_providers: vec![
            "openai".into(),
            "anthropic".into(),
            "azure_openai".into(),
            "google".into(),
        ],
        daily_request_limit: 500,
        hourly_request_limit: 50,
        required_rules: vec![],
        enabled: true,
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(PolicyTables::default()),
            default_policy: default_policy(),
        }
    }

    /// Decide what to do with a request
    pub fn evaluate(&self, ctx: &PolicyContext) -> PolicyDecision {
        let tables = self.tables.read().unwrap();
        let policy = tables
            .users
            .get(&ctx.user_id)
            .or_else(|| {
                (!ctx.department.is_empty())
                    .then(|| tables.departments.get(&ctx.department))
                    .flatten()
            })
            .unwrap_or(&self.default_policy);

        if !policy.enabled {
            return PolicyDecision {
                action: Action::Block,
                reason: "User policy is disabled".into(),
                policy_applied: policy.policy_id.clone(),
                required_sanitization: vec![],
            };
        }

        match policy.access_level {
            AccessLevel::Blocked => PolicyDecision {
                action: Action::Block,
                reason: "User access is blocked".into(),
                policy_applied: policy.policy_id.clone(),
                required_sanitization: vec![],
            },
            AccessLevel::Unrestricted => PolicyDecision {
                action: Action::Allow,
                reason: "User has unrestricted access".into(),
                policy_applied: policy.policy_id.clone(),
                required_sanitization: vec![],
            },
            AccessLevel::SanitizedOnly => {
                // An empty allowlist means any provider; an empty provider
                // string is the caller's problem, not a policy violation
                if !policy.allowed_providers.is_empty()
                    && !ctx.provider.is_empty()
                    && !policy.allowed_providers.iter().any(|p| p == &ctx.provider)
                {
                    return PolicyDecision {
                        action: Action::Block,
                        reason: "Provider not in allowed list".into(),
                        policy_applied: policy.policy_id.clone(),
                        required_sanitization: vec![],
                    };
                }

                PolicyDecision {
                    action: Action::AllowWithSanitization,
                    reason: "Request requires sanitization".into(),
                    policy_applied: policy.policy_id.clone(),
                    required_sanitization: policy.required_rules.clone(),
                }
            }
        }
    }

    /// Set or replace a user's policy
    pub fn set_user_policy(&self, user_id: &str, mut policy: UserPolicy) {
        policy.user_id = user_id.to_string();
        self.tables.write().unwrap().users.insert(user_id.to_string(), policy);
    }

    /// Set or replace a department's default policy
    pub fn set_department_policy(&self, department: &str, mut policy: UserPolicy) {
        policy.department = department.to_string();
        self.tables
            .write()
            .unwrap()
            .departments
            .insert(department.to_string(), policy);
    }

    /// Used by: hosts with a policy administration surface
    #[allow(dead_code)]
    pub fn get_user_policy(&self, user_id: &str) -> Option<UserPolicy> {
        self.tables.read().unwrap().users.get(user_id).cloned()
    }

    /// Used by: hosts with a policy administration surface
    #[allow(dead_code)]
    pub fn delete_user_policy(&self, user_id: &str) {
        self.tables.write().unwrap().users.remove(user_id);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
