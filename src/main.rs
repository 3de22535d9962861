use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sales_desk::config::DeskConfig;
use sales_desk::desk::{DeskService, EscalationNotifier};
use sales_desk::intake::{self, InboundRequest};
use sales_desk::pipeline::{DecisionRecord, PolicyHandle};
use sales_desk::server;

#[derive(Parser)]
#[command(
    name = "sales-desk",
    version,
    about = "Rule-based handler for inbound security-document requests"
)]
struct Cli {
    /// Policy file (overrides SALES_DESK_POLICY)
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Listen port (overrides SALES_DESK_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Decide one request; the body is read from --file or stdin
    Process {
        /// Sender, as `addr` or `Name <addr>`
        #[arg(long)]
        from: String,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Parse an RFC 822 message file and decide it
    Parse { eml: PathBuf },

    /// Show the artifact catalog and trust registry
    Status,

    /// Validate the policy file
    Check,

    /// Run the built-in sample requests
    Demo,
}

/// Sample requests for `demo`.
const DEMO_REQUESTS: &[(&str, &str, &str)] = &[
    (
        "SOC2 request (no NDA)",
        "buyer@newcompany.com",
        "Hi, we need your SOC 2 report and security whitepaper for our vendor assessment.",
    ),
    (
        "Multiple sensitive docs (NDA on file)",
        "acme@example.com",
        "Please send your latest SOC2 report, penetration test results, and ISO 27001 certificate.",
    ),
    (
        "Unclear request",
        "vague@company.com",
        "Can you send me information about your security?",
    ),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = DeskConfig::from_env();
    if let Some(path) = cli.policy {
        config.policy_path = Some(path);
    }

    let _log_guard = init_tracing(&config);

    match cli.command {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Process { from, file } => {
            let body = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("reading request body from stdin")?;
                    buf
                }
            };
            let desk = build_desk(&config)?;
            let record = desk.handle(&InboundRequest::new(&from, None, body)).await;
            desk.flush_notices().await;
            print_record(&record)
        }
        Commands::Parse { eml } => {
            let raw = std::fs::read(&eml).with_context(|| format!("reading {}", eml.display()))?;
            let request = intake::parse_raw(&raw)?;
            eprintln!("   From: {}", request.sender_identity());
            if let Some(subject) = &request.subject {
                eprintln!("   Subject: {subject}");
            }
            let desk = build_desk(&config)?;
            let record = desk.handle(&request).await;
            desk.flush_notices().await;
            print_record(&record)
        }
        Commands::Status => status(&config),
        Commands::Check => {
            let policy = config.load_policy()?;
            let handle = PolicyHandle::from_config(&policy)?;
            let pipeline = handle.current();
            println!(
                "Policy OK: {} artifacts, {} trust entries",
                pipeline.catalog().len(),
                pipeline.trust().len()
            );
            Ok(())
        }
        Commands::Demo => {
            let desk = build_desk(&config)?;
            for (name, from, body) in DEMO_REQUESTS {
                println!("── {name} ──");
                println!("From: {from}");
                let record = desk.handle(&InboundRequest::new(from, None, *body)).await;
                print_record(&record)?;
                println!("\n{}\n", record.response_message);
            }
            desk.flush_notices().await;
            let summary = desk.metrics().summary();
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

/// Stderr logging, plus a daily-rolling file when SALES_DESK_LOG_DIR is set.
/// The returned guard must stay alive for the file writer to flush.
fn init_tracing(config: &DeskConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sales-desk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn build_desk(config: &DeskConfig) -> anyhow::Result<DeskService> {
    let policy = config.load_policy()?;
    let handle = PolicyHandle::from_config(&policy)?;
    let mut desk = DeskService::new(
        Arc::new(handle),
        EscalationNotifier::new(config.slack_webhook.clone()),
    );
    if let Some(path) = &config.policy_path {
        desk = desk.with_policy_path(path);
    }
    Ok(desk)
}

async fn serve(config: DeskConfig, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.port);
    let desk = Arc::new(build_desk(&config)?);

    eprintln!("📨 Sales Desk v{}", env!("CARGO_PKG_VERSION"));
    match &config.policy_path {
        Some(path) => eprintln!("   Policy: {}", path.display()),
        None => eprintln!("   Policy: built-in"),
    }
    eprintln!(
        "   Escalation webhook: {}",
        if config.slack_webhook.is_some() { "configured" } else { "not configured" }
    );
    eprintln!("   API: http://0.0.0.0:{port}/api/process\n");

    let app = server::routes(desk);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("binding port {port}"))?;
    tracing::info!(port, "Sales Desk server started");
    axum::serve(listener, app).await?;
    Ok(())
}

fn status(config: &DeskConfig) -> anyhow::Result<()> {
    let policy = config.load_policy()?;
    let handle = PolicyHandle::from_config(&policy)?;
    let pipeline = handle.current();

    println!("Artifacts:");
    for spec in pipeline.catalog().all_specs() {
        let nda = if spec.requires_nda { "NDA required" } else { "no NDA" };
        println!(
            "  • {} [{}] {}, {}, {}",
            spec.display_name, spec.id, spec.sensitivity, nda, spec.delivery_method
        );
    }

    println!("Trust registry:");
    for (key, on_file) in pipeline.trust().entries() {
        let state = if on_file { "on file" } else { "not on file" };
        println!("  • {key}: {state}");
    }

    println!("Configuration:");
    println!(
        "  • Policy: {}",
        config
            .policy_path
            .as_ref()
            .map_or_else(|| "built-in".to_string(), |p| p.display().to_string())
    );
    println!("  • Detector: {}", pipeline.detector_name());
    println!(
        "  • Escalation webhook: {}",
        if config.slack_webhook.is_some() { "configured" } else { "not configured" }
    );
    Ok(())
}

fn print_record(record: &DecisionRecord) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}
