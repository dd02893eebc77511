//! teleflow: CLI del pipeline de ingesta.
//!
//! - `run`: ejecuta el grafo (o una selección) una vez.
//! - `schedule`: demonio con disparo diario; Ctrl-C cancela el run en curso.
//! - `stale` / `history`: lectura del audit trail.
//! - `migrate`: aplica las migraciones de Postgres.
//! - `top-terms` / `activity` / `search`: consultas sobre el raw store.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tele_core::{CancelToken, RunResult, Selection, Trigger};
use teleflow::analytics::{channel_activity, search_messages, top_terms};
use teleflow::{build_scheduler, AppConfig, Backend, PipelineScheduler};
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "teleflow")]
#[command(about = "Daily Telegram ingestion pipeline")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline once
    Run {
        /// Stage to run (repeatable); default is the whole graph
        #[arg(long = "stage", value_name = "STAGE")]
        stages: Vec<String>,
        /// Also run every stage downstream of the selected ones
        #[arg(long, requires = "stages")]
        downstream: bool,
        /// Run only the stages whose outputs are stale
        #[arg(long, conflicts_with_all = ["stages", "downstream"])]
        stale: bool,
    },
    /// Run the full graph every day at PIPELINE_SCHEDULE (UTC)
    Schedule,
    /// List stages whose outputs are stale
    Stale,
    /// Show past runs, or one run in detail
    History {
        #[arg(long = "run", value_name = "RUN_ID")]
        run: Option<Uuid>,
    },
    /// Apply pending database migrations
    Migrate,
    /// Most mentioned terms across all messages
    TopTerms {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Daily post counts of a channel
    Activity { channel: String },
    /// Messages containing a keyword, newest first
    Search {
        query: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                                      "teleflow=info,tele_core=info,tele_adapters=info,tele_persistence=info".into()
                                  }))
                                  .with(tracing_subscriber::fmt::layer())
                                  .init();

    let args = Args::parse();
    let cfg = AppConfig::from_env().context("invalid configuration")?;

    match args.command {
        Command::Run { stages, downstream, stale } => {
            let selection = if stale {
                Selection::Stale
            } else if stages.is_empty() {
                Selection::All
            } else if downstream {
                Selection::downstream(stages)
            } else {
                Selection::stages(stages)
            };
            run_once(&cfg, selection).await
        }
        Command::Schedule => daemon(&cfg).await,
        Command::Stale => {
            let (scheduler, _) = build_scheduler(&cfg).context("failed to set up pipeline")?;
            let stale = scheduler.stale_stages().context("cannot read run history")?;
            if stale.is_empty() {
                println!("all stages are up to date");
            } else {
                for id in stale {
                    println!("{id}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::History { run } => {
            let (scheduler, _) = build_scheduler(&cfg).context("failed to set up pipeline")?;
            match run {
                Some(run_id) => print!("{}", scheduler.run_report(run_id)?),
                None => {
                    for r in scheduler.runs().context("cannot read run history")? {
                        println!("{}  {:<9} {}  {}", r.run_id, r.status.as_str(), r.requested_at.to_rfc3339(), r.selection);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Migrate => {
            if cfg.database.is_none() {
                bail!("no database configured (set DATABASE_URL or POSTGRES_*)");
            }
            Backend::open(&cfg).context("migration failed")?;
            info!("database schema is up to date");
            Ok(ExitCode::SUCCESS)
        }
        Command::TopTerms { limit } => {
            let backend = Backend::open(&cfg).context("failed to open store")?;
            for t in top_terms(backend.raw_store.as_ref(), limit)? {
                println!("{:>7}  {}", t.mentions, t.term);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Activity { channel } => {
            let backend = Backend::open(&cfg).context("failed to open store")?;
            let Some(activity) = channel_activity(backend.raw_store.as_ref(), &channel)? else {
                eprintln!("no messages for channel '{channel}'");
                return Ok(ExitCode::FAILURE);
            };
            println!("{}: {} posts", activity.channel, activity.total_posts);
            for day in activity.daily {
                println!("  {}  {}", day.date, day.posts);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Search { query, limit } => {
            let backend = Backend::open(&cfg).context("failed to open store")?;
            for hit in search_messages(backend.raw_store.as_ref(), &query, limit)? {
                let when = hit.posted_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into());
                println!("[{}] {} #{}: {}", when, hit.channel, hit.record_id, hit.text);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Cancela `token` y despierta al demonio con el primer Ctrl-C.
fn watch_ctrl_c(token: CancelToken, wake: Arc<Notify>) {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("received Ctrl+C, cancelling");
                token.cancel();
                wake.notify_one();
            }
            Err(e) => error!("cannot listen for Ctrl+C: {e}"),
        }
    });
}

/// Ejecuta un run en un hilo bloqueante y devuelve el scheduler al caller.
async fn execute(scheduler: PipelineScheduler,
                 selection: Selection,
                 trigger: Trigger,
                 cancel: CancelToken)
                 -> Result<(PipelineScheduler, Result<RunResult, tele_core::EngineError>)> {
    tokio::task::spawn_blocking(move || {
        let mut scheduler = scheduler;
        let result = scheduler.execute_with(&selection, trigger, &cancel);
        (scheduler, result)
    }).await
      .context("run task aborted")
}

async fn run_once(cfg: &AppConfig, selection: Selection) -> Result<ExitCode> {
    let (scheduler, _) = build_scheduler(cfg).context("failed to set up pipeline")?;
    let cancel = CancelToken::new();
    watch_ctrl_c(cancel.clone(), Arc::new(Notify::new()));

    let (_, result) = execute(scheduler, selection, Trigger::Manual, cancel).await?;
    let result = result.context("run could not start")?;
    print!("{result}");
    Ok(if result.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn daemon(cfg: &AppConfig) -> Result<ExitCode> {
    let (mut scheduler, _) = build_scheduler(cfg).context("failed to set up pipeline")?;
    let shutdown = CancelToken::new();
    let wake = Arc::new(Notify::new());
    watch_ctrl_c(shutdown.clone(), Arc::clone(&wake));
    info!("daily trigger at {}", cfg.schedule);

    while !shutdown.is_cancelled() {
        let now = Utc::now();
        let next = cfg.schedule.next_after(now);
        info!("next run at {}", next.to_rfc3339());
        let wait = (next - now).to_std().unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = wake.notified() => break,
        }

        let trigger = Trigger::Schedule { scheduled_for: next };
        let (returned, result) = execute(scheduler, Selection::All, trigger, shutdown.child()).await?;
        scheduler = returned;
        match result {
            Ok(r) if r.is_success() => info!("run {} succeeded", r.run_id),
            Ok(r) => warn!("run {} finished as {}\n{r}", r.run_id, r.status.as_str()),
            Err(e) => error!("scheduled run could not start: {e}"),
        }
    }
    info!("scheduler stopped");
    Ok(ExitCode::SUCCESS)
}
