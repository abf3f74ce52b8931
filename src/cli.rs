// CLI module - command-line argument parsing and handlers
//
// Subcommands:
// - version: show version information
// - init:    write the default configuration file
// - scan:    compliance-scan a piece of content, print the result as JSON
// - process: run one request through the full pipeline, print the response
// - serve:   run as a long-lived service until Ctrl+C

use crate::config::{FullConfig, VERSION};
use crate::shield::Shield;
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;

/// Policy and data-protection gateway for LLM traffic
#[derive(Parser)]
#[command(name = "llm-shield")]
#[command(version = VERSION)]
#[command(about = "Policy and data-protection gateway for LLM traffic", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show version information
    Version,
    /// Initialize the default configuration file
    Init,
    /// Scan content for compliance violations
    Scan {
        /// The content to scan
        content: String,
    },
    /// Process a request through policy, compliance and sanitization
    Process {
        /// User identifier (usually an email address)
        user: String,
        /// The prompt content
        content: String,
        /// Target provider, e.g. "openai"
        provider: String,
    },
    /// Run as a service, sweeping sessions and rotating the audit log
    Serve,
}

pub fn handle_version() {
    println!("llm-shield v{}", VERSION);
}

pub fn handle_init() -> Result<()> {
    let Some(path) = FullConfig::config_path() else {
        anyhow::bail!("could not determine config path");
    };
    if path.exists() {
        anyhow::bail!(
            "config already exists at {}; delete it first to reinitialize",
            path.display()
        );
    }
    FullConfig::default().save(&path)?;
    println!("Configuration initialized at {}", path.display());
    Ok(())
}

pub fn handle_scan(shield: &Shield, content: &str) -> Result<()> {
    print_json(&shield.scan_content(content))
}

pub fn handle_process(shield: &Shield, user: &str, content: &str, provider: &str) -> Result<()> {
    let response = shield.process_request(crate::model::Request {
        user_id: user.to_string(),
        session_id: None,
        department: None,
        provider: provider.to_string(),
        content: content.to_string(),
        headers: Default::default(),
    });
    print_json(&response)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
