use anyhow::{anyhow, Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use serde::Serialize;
use signup_relay::admin::{login, StaticCredentials};
use signup_relay::client::{HttpTransport, SubmissionClient, SubmissionOutcome};
use signup_relay::config::{resolve_config, AppConfig, ClientConfig};
use signup_relay::endpoint::{
    notifier_from_config, serve, DeliveryService, FileWorkbook, MemoryWorkbook, SheetStore,
};
use signup_relay::form::{available_dates, SignupForm, SubmitError};
use signup_relay::mirror::{FileBackend, LocalMirror};
use signup_relay::record::RegistrationRecord;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod cli;
mod register;

use cli::{AdminArgs, Command, DatesArgs, ProbeArgs, RegisterArgs, RootArgs, ServeArgs};
use register::FormDriver;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing();
    let config = resolve_config(args.config.as_deref())?;

    match args.command {
        Command::Serve(args) => cmd_serve(&config, args),
        Command::Register(args) => cmd_register(&config, args),
        Command::Admin(args) => cmd_admin(&config, args),
        Command::Probe(args) => cmd_probe(&config, args),
        Command::Dates(args) => cmd_dates(args),
    }
}

/// Logs go to stderr; `SIGNUP_LOG` takes an env-filter directive.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("SIGNUP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn cmd_serve(config: &AppConfig, args: ServeArgs) -> Result<()> {
    let store: Box<dyn SheetStore> = if args.ephemeral {
        Box::new(MemoryWorkbook::default())
    } else {
        let root = match args.workbook {
            Some(path) => path,
            None => config.endpoint.resolved_workbook_dir()?,
        };
        tracing::info!(workbook = %root.display(), "using file workbook");
        Box::new(FileWorkbook::new(root))
    };
    let notifier = notifier_from_config(config.endpoint.notify.as_ref());
    let service = Arc::new(DeliveryService::new(
        store,
        notifier,
        config.endpoint.sheet_name.clone(),
    ));
    let bind = args.bind.unwrap_or_else(|| config.endpoint.bind.clone());

    let runtime = tokio::runtime::Runtime::new().context("start async runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("bind {bind}"))?;
        serve(listener, service, shutdown_signal()).await
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for ctrl-c; serving until killed");
        std::future::pending::<()>().await;
    }
}

#[derive(Serialize)]
struct RegisterReport<'a> {
    record: &'a RegistrationRecord,
    synced: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mirror_error: Option<&'a str>,
}

fn cmd_register(config: &AppConfig, args: RegisterArgs) -> Result<()> {
    let mut mirror = open_mirror(config)?;
    let mut form = SignupForm::new(Local::now().date_naive());

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut driver = FormDriver::new(&args, stdin.lock(), stdout.lock());
    driver.fill(&mut form)?;

    let client = SubmissionClient::new(HttpTransport::new(&config.client), config.client.delivery);
    let submission = match client.submit(&mut form, &mut mirror, Utc::now()) {
        Ok(submission) => submission,
        Err(err) => {
            if matches!(
                err.downcast_ref::<SubmitError>(),
                Some(SubmitError::Invalid { .. })
            ) {
                driver.report_errors(&form)?;
            }
            return Err(err);
        }
    };
    drop(driver);

    let error = match &submission.outcome {
        SubmissionOutcome::SavedLocally { error } => Some(error.to_string()),
        SubmissionOutcome::Synced { .. } => None,
    };
    let mirror_error = submission.mirror_error.as_deref();
    if args.json {
        let report = RegisterReport {
            record: &submission.record,
            synced: submission.outcome.is_synced(),
            message: submission.outcome.message(),
            error: error.as_deref(),
            mirror_error,
        };
        let text = serde_json::to_string_pretty(&report).context("serialize submission")?;
        println!("{text}");
    } else {
        println!("{}", submission.outcome.message());
        println!("id: {}", submission.record.id);
        if let Some(error) = &error {
            println!("delivery error: {error}");
        }
        if let Some(mirror_error) = mirror_error {
            println!("local copy not saved: {mirror_error}");
        }
    }

    match (mirror_error, error) {
        (Some(mirror_error), Some(error)) => Err(anyhow!(
            "registration {} was neither delivered ({error}) nor saved locally ({mirror_error})",
            submission.record.id
        )),
        _ => Ok(()),
    }
}

fn cmd_admin(config: &AppConfig, args: AdminArgs) -> Result<()> {
    let verifier = StaticCredentials::from_config(&config.admin);
    let session = login(&verifier, &args.username, &args.password)?;
    let mirror = open_mirror(config)?;

    if let Some(id) = args.show.as_deref() {
        let record = session
            .detail(&mirror, id)
            .ok_or_else(|| anyhow!("no registration with id {id}"))?;
        if args.json {
            let text = serde_json::to_string_pretty(record).context("serialize record")?;
            println!("{text}");
        } else {
            print_record(record);
        }
        return Ok(());
    }

    let summary = session.summary(&mirror);
    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("serialize summary")?;
        println!("{text}");
        return Ok(());
    }

    println!("Admin Dashboard ({})", session.username());
    println!("Total Registrations: {}", summary.total_registrations);
    println!("Scheduled Sessions: {}", summary.scheduled_sessions);
    for group in &summary.dates {
        println!();
        println!("{} ({})", group.label, group.count_label());
        for row in &group.participants {
            println!(
                "  {}  {}  {}  {}  registered {}  [{}]",
                row.full_name,
                row.email,
                row.phone_number,
                row.user_type,
                row.registered_on,
                row.id
            );
        }
    }
    Ok(())
}

fn print_record(record: &RegistrationRecord) {
    println!("id: {}", record.id);
    println!("full name: {}", record.full_name);
    println!("phone: {}", record.phone_number);
    println!("email: {}", record.email);
    println!("role: {}", record.user_type);
    println!("reason: {}", record.reason);
    println!("preferred date: {}", record.preferred_date);
    println!("signed up: {}", record.signup_timestamp);
}

fn cmd_probe(config: &AppConfig, args: ProbeArgs) -> Result<()> {
    let client = match args.url {
        Some(base_url) => ClientConfig {
            base_url,
            ..config.client.clone()
        },
        None => config.client.clone(),
    };
    let transport = HttpTransport::new(&client);
    let response = transport
        .probe()
        .with_context(|| format!("probe {}", transport.url()))?;
    println!("{}: {}", transport.url(), response.message);
    Ok(())
}

fn cmd_dates(args: DatesArgs) -> Result<()> {
    let dates = available_dates(Local::now().date_naive());
    if args.json {
        let text = serde_json::to_string_pretty(&dates).context("serialize dates")?;
        println!("{text}");
        return Ok(());
    }
    let mut stdout = io::stdout().lock();
    for (idx, option) in dates.iter().enumerate() {
        writeln!(stdout, "{}. {}  {}", idx + 1, option.value, option.label)?;
    }
    Ok(())
}

fn open_mirror(config: &AppConfig) -> Result<LocalMirror<FileBackend>> {
    let path = config.mirror.resolved_path()?;
    tracing::debug!(mirror = %path.display(), "opening local mirror");
    LocalMirror::open(FileBackend::new(path))
}
