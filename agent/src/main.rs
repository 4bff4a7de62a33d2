mod config;
mod holdings;
mod llm;
mod pipeline;
mod report;
mod types;
mod util;
mod whatsapp;

use crate::config::Config;
use crate::llm::{LlmInvoker, PerplexityClient, SimulatedInvoker};
use crate::pipeline::{aggregate, DispatchMode, Dispatcher};
use crate::whatsapp::WhatsAppAlert;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "holdagent", about = "LLM-backed stock holdings analysis agent")]
struct Cli {
    /// Holdings JSON file (overrides HOLDINGS_FILE)
    #[arg(long)]
    holdings: Option<String>,

    /// Dispatch mode: per-holding or portfolio
    #[arg(long)]
    mode: Option<String>,

    /// Load config from a specific .env file
    #[arg(long)]
    config_file: Option<String>,

    /// Override the per-entity retry budget
    #[arg(long)]
    max_retries: Option<u32>,

    /// Overall deadline in seconds (0 = disabled)
    #[arg(long)]
    deadline: Option<u64>,

    /// Save the report JSON to this path
    #[arg(long)]
    output: Option<String>,

    /// Use the offline simulated LLM, no API calls
    #[arg(long)]
    simulate: bool,

    /// Send the summary over WhatsApp after the run
    #[arg(long)]
    notify: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = Config::from_env_file(cli.config_file.as_deref())?;

    if let Some(n) = cli.max_retries {
        cfg.max_retries = n.max(1);
    }
    if let Some(d) = cli.deadline {
        cfg.deadline_secs = d;
    }
    if let Some(ref m) = cli.mode {
        cfg.dispatch_mode = m.clone();
    }
    if let Some(ref p) = cli.holdings {
        cfg.holdings_file = p.clone();
    }
    let simulate = cli.simulate || cfg.simulate_llm;
    let mode = DispatchMode::parse(&cfg.dispatch_mode);

    info!("══════════════════════════════════════════════════════");
    info!("  HOLDINGS ANALYSIS AGENT");
    info!("  Mode: {:?} | Model: {} | Temp: {}",
        mode, cfg.llm_model, cfg.llm_temperature);
    info!("  Retries: {} | Workers: {} | Deadline: {}",
        cfg.max_retries, cfg.worker_pool,
        if cfg.deadline_secs > 0 { format!("{}s", cfg.deadline_secs) } else { "none".to_string() });
    info!("  Confidence threshold: {}", cfg.confidence_threshold);
    info!("══════════════════════════════════════════════════════");

    let data = holdings::load_from_json(Path::new(&cfg.holdings_file))?;
    info!(
        "Loaded {} holdings (total value {}) from {}",
        data.holdings.len(),
        data.total_value,
        data.source
    );
    if data.holdings.is_empty() {
        warn!("No holdings to analyze");
        return Ok(());
    }

    let invoker: Box<dyn LlmInvoker> = if simulate {
        info!("SIMULATED LLM - no API calls will be made");
        Box::new(SimulatedInvoker)
    } else {
        let client = PerplexityClient::new(&cfg.pplx_api_key, &cfg.llm_model, cfg.llm_max_tokens);
        if !client.is_configured() {
            error!("PPLX_API_KEY must be set (or pass --simulate)");
            std::process::exit(1);
        }
        Box::new(client)
    };

    let deadline = (cfg.deadline_secs > 0).then(|| Duration::from_secs(cfg.deadline_secs));
    let dispatcher = Dispatcher::new(
        invoker.as_ref(),
        cfg.max_retries,
        cfg.llm_temperature,
        cfg.worker_pool,
        deadline,
    );

    let started = std::time::Instant::now();
    let results = dispatcher.run_all(&data, mode).await;

    let report = match mode {
        DispatchMode::PerHolding => {
            aggregate::combine(&data.holdings, results, cfg.confidence_threshold)?
        }
        DispatchMode::Portfolio => {
            let result = results
                .into_iter()
                .next()
                .context("portfolio run produced no result")?;
            aggregate::single(&data.holdings, result, cfg.confidence_threshold)
        }
    };

    info!(
        "Analysis complete: {}/{} accepted in {:.1}s",
        report.accepted_count,
        report.results.len(),
        started.elapsed().as_secs_f64()
    );

    println!("{}", report::render_text(&report));

    if let Some(path) = &cli.output {
        let json = serde_json::to_string_pretty(&report).context("Serialize report")?;
        std::fs::write(path, json).with_context(|| format!("Write report to {path}"))?;
        info!("Report saved to {path}");
    }

    if cli.notify {
        let alert = WhatsAppAlert::new(
            &cfg.whatsapp_token,
            &cfg.whatsapp_phone_id,
            &cfg.whatsapp_api_url,
            &cfg.whatsapp_template,
            &cfg.whatsapp_language,
        );
        if alert.is_configured() && !cfg.whatsapp_recipient.is_empty() {
            match alert
                .send_message(
                    &cfg.whatsapp_recipient,
                    &report::notification_summary(&report),
                )
                .await
            {
                Ok(()) => info!("Notification sent -> {}", cfg.whatsapp_recipient),
                Err(e) => warn!("WhatsApp notification failed: {e}"),
            }
        } else {
            warn!("WhatsApp NOT configured (set WHATSAPP_* env vars)");
        }
    }

    Ok(())
}
