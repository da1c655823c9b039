//! CLI module for the gymdesk command-line interface.
//!
//! Provides subcommands for interacting with a running gymdesk server:
//! - `status` - Check that the server is up
//! - `generate <plan_id>` - Generate or regenerate a plan's sessions
//! - `leave list|approve|reject` - Review leave requests
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "gymdesk")]
#[command(author, version, about = "Training plan scheduling, leave, attendance and billing server", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "gymdesk.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API URL to connect to (default: http://localhost:8080)
    #[arg(long, env = "GYMDESK_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Authentication token (can also be set via GYMDESK_TOKEN env var)
    #[arg(long, env = "GYMDESK_TOKEN")]
    pub token: Option<String>,

    /// Staff or admin id recorded as the actor of changes
    #[arg(long, env = "GYMDESK_ACTOR")]
    pub actor: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the server is reachable
    Status,

    /// Generate sessions for a plan
    Generate {
        /// Plan ID
        plan_id: String,
        /// Session start time (HH:MM or HH:MM:SS), defaults to the plan's
        #[arg(long, value_parser = parse_time)]
        start_time: Option<NaiveTime>,
        /// Session length in minutes, defaults to the plan's
        #[arg(long)]
        duration: Option<i64>,
        /// Drop still-scheduled sessions before generating
        #[arg(long)]
        replace: bool,
    },

    /// Leave request commands
    #[command(subcommand)]
    Leave(LeaveCommands),

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Leave subcommands
#[derive(Subcommand, Debug)]
pub enum LeaveCommands {
    /// List leave requests
    List {
        /// Only show requests in this status (Pending, Approved, Rejected)
        #[arg(long)]
        status: Option<String>,
        /// Only show requests of this staff member
        #[arg(long)]
        staff: Option<String>,
    },
    /// Approve a pending leave request
    Approve {
        /// Leave request ID
        id: String,
    },
    /// Reject a pending leave request
    Reject {
        /// Leave request ID
        id: String,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| format!("Invalid time '{}', expected HH:MM or HH:MM:SS", value))
}

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    plan_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_minutes: Option<i64>,
    replace_existing: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResult {
    pub created_count: usize,
    pub deleted_count: u64,
    #[serde(default)]
    pub skipped_dates: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Leave {
    pub id: String,
    pub staff_id: String,
    pub leave_type: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaveDecision {
    pub leave: Leave,
    #[serde(default)]
    pub plans_needing_regeneration: Vec<String>,
}

/// API error response
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: Option<String>,
    pub message: String,
}

// ============================================================================
// CLI Command Handlers
// ============================================================================

/// Create an HTTP client with the given token and actor
fn create_client(token: Option<&str>, actor: Option<&str>) -> Result<Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Some(token) = token {
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", token)
                .parse()
                .context("Invalid token format")?,
        );
    }
    if let Some(actor) = actor {
        headers.insert("X-Actor-Id", actor.parse().context("Invalid actor id")?);
    }

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")
}

fn client_for(cli: &Cli) -> Result<Client> {
    create_client(cli.token.as_deref(), cli.actor.as_deref())
}

/// Turn a non-success response into an error carrying the server's message
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        anyhow::bail!(
            "Authentication required. Use --token or set GYMDESK_TOKEN environment variable."
        );
    }
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("Server returned error {}: {}", status, error_message(&body));
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) => match err.code {
            Some(code) => format!("{} ({})", err.message, code),
            None => err.message,
        },
        Err(_) => body.to_string(),
    }
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Status) => cmd_status(cli).await,
        Some(Commands::Generate {
            plan_id,
            start_time,
            duration,
            replace,
        }) => cmd_generate(cli, plan_id, *start_time, *duration, *replace).await,
        Some(Commands::Leave(LeaveCommands::List { status, staff })) => {
            cmd_leave_list(cli, status.as_deref(), staff.as_deref()).await
        }
        Some(Commands::Leave(LeaveCommands::Approve { id })) => {
            cmd_leave_decide(cli, id, "Approved").await
        }
        Some(Commands::Leave(LeaveCommands::Reject { id })) => {
            cmd_leave_decide(cli, id, "Rejected").await
        }
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        None => {
            // No subcommand means start the server - this is handled in main.rs
            Ok(())
        }
    }
}

/// Display server status
async fn cmd_status(cli: &Cli) -> Result<()> {
    let client = client_for(cli)?;
    let base_url = &cli.api_url;

    println!("Connecting to {}...", base_url);

    let response = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .context("Failed to connect to server. Is gymdesk running?")?;
    let response = check_response(response).await?;
    let body = response.text().await.unwrap_or_default();

    println!("[OK] Server is up ({})", body.trim());
    Ok(())
}

async fn cmd_generate(
    cli: &Cli,
    plan_id: &str,
    start_time: Option<NaiveTime>,
    duration_minutes: Option<i64>,
    replace_existing: bool,
) -> Result<()> {
    let client = client_for(cli)?;
    let body = GenerateBody {
        plan_id,
        start_time,
        duration_minutes,
        replace_existing,
    };

    let response = client
        .post(format!("{}/api/generate-sessions", cli.api_url))
        .json(&body)
        .send()
        .await
        .context("Failed to connect to server")?;
    let result: GenerateResult = check_response(response)
        .await?
        .json()
        .await
        .context("Failed to parse generate response")?;

    println!("Plan {}:", plan_id);
    if replace_existing {
        println!("  Removed:  {} scheduled session(s)", result.deleted_count);
    }
    println!("  Created:  {} session(s)", result.created_count);
    if !result.skipped_dates.is_empty() {
        println!(
            "  Skipped:  {} (trainer on leave)",
            result.skipped_dates.join(", ")
        );
    }
    Ok(())
}

async fn cmd_leave_list(cli: &Cli, status: Option<&str>, staff: Option<&str>) -> Result<()> {
    let client = client_for(cli)?;

    let mut query = Vec::new();
    if let Some(status) = status {
        query.push(("status", status));
    }
    if let Some(staff) = staff {
        query.push(("staff_id", staff));
    }

    let response = client
        .get(format!("{}/api/leave", cli.api_url))
        .query(&query)
        .send()
        .await
        .context("Failed to connect to server")?;
    let leaves: Vec<Leave> = check_response(response)
        .await?
        .json()
        .await
        .context("Failed to parse leave response")?;

    if leaves.is_empty() {
        println!("No leave requests found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<36}  {:<20}  {:<12}  {:<10}  {:<10}  {:<8}",
        "ID", "STAFF", "TYPE", "FROM", "TO", "STATUS"
    );
    println!("{}", "-".repeat(106));
    for leave in leaves {
        println!(
            "{:<36}  {:<20}  {:<12}  {:<10}  {:<10}  {:<8}",
            leave.id,
            truncate(&leave.staff_id, 20),
            truncate(&leave.leave_type, 12),
            leave.start_date,
            leave.end_date,
            leave.status
        );
    }
    println!();
    Ok(())
}

async fn cmd_leave_decide(cli: &Cli, id: &str, status: &str) -> Result<()> {
    let client = client_for(cli)?;

    let response = client
        .put(format!("{}/api/leave/{}", cli.api_url, id))
        .json(&serde_json::json!({ "status": status }))
        .send()
        .await
        .context("Failed to connect to server")?;
    let decision: LeaveDecision = check_response(response)
        .await?
        .json()
        .await
        .context("Failed to parse leave response")?;

    println!(
        "Leave {} for {} ({} to {}) is now {}",
        decision.leave.id,
        decision.leave.staff_id,
        decision.leave.start_date,
        decision.leave.end_date,
        decision.leave.status
    );
    if !decision.plans_needing_regeneration.is_empty() {
        println!();
        println!("These plans still have sessions inside the leave:");
        for plan_id in &decision.plans_needing_regeneration {
            println!("  {}    (gymdesk generate {} --replace)", plan_id, plan_id);
        }
    }
    Ok(())
}

/// Validate the configuration file and print a summary
fn cmd_config_check(cli: &Cli) -> Result<()> {
    use crate::config::Config;

    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        println!("To create a custom configuration, copy gymdesk.example.toml to gymdesk.toml");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Host:         {}", config.server.host);
            println!("  API Port:     {}", config.server.api_port);
            println!("  Data Dir:     {}", config.server.data_dir.display());
            println!(
                "  CORS:         {}",
                if config.server.cors_origins.is_empty() {
                    "any origin".to_string()
                } else {
                    config.server.cors_origins.join(", ")
                }
            );
            println!();
            println!("Scheduling:");
            println!("  Max Plan Days:     {}", config.scheduling.max_plan_days);
            println!();
            println!("Attendance:");
            println!(
                "  Full Day:          {} minutes",
                config.attendance.full_day_minutes
            );
            println!();
            println!("Logging:");
            println!("  Level:        {}", config.logging.level);
            println!();
            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            anyhow::bail!("Configuration validation failed")
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
