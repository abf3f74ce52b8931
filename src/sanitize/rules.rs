//! Default sanitization rule catalogue
//!
//! Ordering convention: more specific patterns carry smaller `order` values
//! so they fire first and claim their matches before broader rules run.

use crate::model::{SanitizationRule, Severity};

/// The built-in rule set, used when the config file supplies none
pub fn default_rules() -> Vec<SanitizationRule> {
    vec![
        // Server / database names
        SanitizationRule {
            rule_id: "server_names".into(),
            name: "Server Names".into(),
            description: "Server and database names like ServerDB01, ProductionDB".into(),
            pattern: r"\b[A-Z][a-zA-Z]*DB\d*\b".into(),
            prefix: "SERVER".into(),
            severity: Severity::Medium,
            enabled: true,
            exceptions: vec![],
            order: 10,
        },
        SanitizationRule {
            rule_id: "prod_databases".into(),
            name: "Production Databases".into(),
            description: "Production database names".into(),
            pattern: r"\b[a-zA-Z]+[_-]?[Pp]rod(uction)?\b".into(),
            prefix: "SERVER".into(),
            severity: Severity::Medium,
            enabled: true,
            exceptions: vec![],
            order: 11,
        },
        // Table names
        SanitizationRule {
            rule_id: "table_names_prod".into(),
            name: "Production Table Names".into(),
            description: "Table names with a prod suffix".into(),
            pattern: r"\b[a-z_]+_prod\b".into(),
            prefix: "TABLE".into(),
            severity: Severity::Medium,
            enabled: true,
            exceptions: vec![],
            order: 20,
        },
        SanitizationRule {
            rule_id: "table_names_users".into(),
            name: "User Table Names".into(),
            description: "User-related table names".into(),
            pattern: r"\b(users?|accounts?|customers?|employees?)(_\w+)?\b".into(),
            prefix: "TABLE".into(),
            severity: Severity::Medium,
            enabled: true,
            // Bare generic words are conversation, not table names
            exceptions: vec![r"^user$".into(), r"^account$".into()],
            order: 21,
        },
        // RFC 1918 private address ranges, one rule per block
        SanitizationRule {
            rule_id: "private_ip_10".into(),
            name: "Private IP (10.x.x.x)".into(),
            description: "RFC 1918 private IPs in 10.0.0.0/8".into(),
            pattern: r"\b10\.\d{1,3}\.\d{1,3}\.\d{1,3}\b".into(),
            prefix: "IP".into(),
            severity: Severity::High,
            enabled: true,
            exceptions: vec![],
            order: 30,
        },
        SanitizationRule {
            rule_id: "private_ip_172".into(),
            name: "Private IP (172.16-31.x.x)".into(),
            description: "RFC 1918 private IPs in 172.16.0.0/12".into(),
            pattern: r"\b172\.(1[6-9]|2\d|3[01])\.\d{1,3}\.\d{1,3}\b".into(),
            prefix: "IP".into(),
            severity: Severity::High,
            enabled: true,
            exceptions: vec![],
            order: 31,
        },
        SanitizationRule {
            rule_id: "private_ip_192".into(),
            name: "Private IP (192.168.x.x)".into(),
            description: "RFC 1918 private IPs in 192.168.0.0/16".into(),
            pattern: r"\b192\.168\.\d{1,3}\.\d{1,3}\b".into(),
            prefix: "IP".into(),
            severity: Severity::High,
            enabled: true,
            exceptions: vec![],
            order: 32,
        },
        // Connection strings
        SanitizationRule {
            rule_id: "connection_string".into(),
            name: "Connection Strings".into(),
            description: "Database connection strings".into(),
            pattern: r"(?i)(server|data source|host)=[^;]+;".into(),
            prefix: "CONNSTR".into(),
            severity: Severity::High,
            enabled: true,
            exceptions: vec![],
            order: 40,
        },
        // File paths
        SanitizationRule {
            rule_id: "windows_path".into(),
            name: "Windows File Paths".into(),
            description: "Windows drive-letter paths".into(),
            pattern: r#"[A-Za-z]:\\[^\s*?"<>|:]+"#.into(),
            prefix: "PATH".into(),
            severity: Severity::Medium,
            enabled: true,
            exceptions: vec![],
            order: 50,
        },
        SanitizationRule {
            rule_id: "unc_path".into(),
            name: "UNC Paths".into(),
            description: "UNC network paths".into(),
            pattern: r"\\\\[a-zA-Z0-9._-]+\\[^\s]+".into(),
            prefix: "PATH".into(),
            severity: Severity::Medium,
            enabled: true,
            exceptions: vec![],
            order: 51,
        },
        // Hostnames
        SanitizationRule {
            rule_id: "internal_hostname".into(),
            name: "Internal Hostnames".into(),
            description: "Hostnames under internal-only suffixes".into(),
            pattern: r"\b[a-z][a-z0-9-]*\.(internal|local|corp|lan)\b".into(),
            prefix: "HOST".into(),
            severity: Severity::Medium,
            enabled: true,
            exceptions: vec![],
            order: 60,
        },
        // Email addresses - off by default, enable for stricter environments
        SanitizationRule {
            rule_id: "internal_email".into(),
            name: "Internal Email Addresses".into(),
            description: "Email addresses (internal domain detection)".into(),
            pattern: r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b".into(),
            prefix: "EMAIL".into(),
            severity: Severity::Low,
            enabled: false,
            exceptions: vec![],
            order: 70,
        },
    ]
}
