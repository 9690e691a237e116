//! CLI argument parsing for the signup tools.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "signup",
    version,
    about = "Demo-session signup form, delivery endpoint, and admin summary",
    after_help = "Examples:\n  signup serve --workbook /tmp/workbook\n  signup register --name \"Jane Doe\" --region +91 --phone 9876543210\n  signup admin --username ops --password ... --json\n  signup probe",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// JSON config file (defaults to the data dir config.json when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the delivery endpoint
    Serve(ServeArgs),
    /// Fill in the signup form and submit it
    Register(RegisterArgs),
    /// Log in and show the registrations summary
    Admin(AdminArgs),
    /// Check that the delivery endpoint is reachable
    Probe(ProbeArgs),
    /// List the bookable demo dates
    Dates(DatesArgs),
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides endpoint.bind)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Workbook directory holding the registrations sheet
    #[arg(long, value_name = "DIR", conflicts_with = "ephemeral")]
    pub workbook: Option<PathBuf>,

    /// Keep the workbook in memory only
    #[arg(long)]
    pub ephemeral: bool,
}

/// Field values for the signup form; anything missing is prompted for.
#[derive(Parser, Debug, Default, Clone)]
pub struct RegisterArgs {
    #[arg(long)]
    pub name: Option<String>,

    /// Dialing code, e.g. +91
    #[arg(long, allow_hyphen_values = true)]
    pub region: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    /// Parent, Student, or Guardian
    #[arg(long)]
    pub role: Option<String>,

    /// Reason text, or its number in the list
    #[arg(long)]
    pub reason: Option<String>,

    /// Required when the reason is "Others"
    #[arg(long)]
    pub custom_reason: Option<String>,

    /// YYYY-MM-DD, or its number in the 7-day window
    #[arg(long)]
    pub date: Option<String>,

    /// Fail instead of prompting when a value is missing or invalid
    #[arg(long)]
    pub no_input: bool,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct AdminArgs {
    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub password: String,

    /// Show the full record with this id
    #[arg(long, value_name = "ID")]
    pub show: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Base URL to probe (overrides client.base_url)
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,
}

#[derive(Parser, Debug)]
pub struct DatesArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
