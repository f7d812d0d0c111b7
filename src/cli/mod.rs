//! Command-line interface for signalflow.
//!
//! Provides commands for running a scripted signal scenario against the
//! progress-and-final pattern, inspecting persisted workflow histories, and
//! showing the resolved configuration.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use uuid::Uuid;

use crate::activity::activity_fn;
use crate::config;
use crate::core::{CoordinationError, HistoryStore, WorkflowContext};
use crate::domain::{History, HistoryEvent, Signal, SignalEnvelope};
use crate::patterns::progress_and_final;
use crate::scenario::Scenario;

/// signalflow - Signal-coordination primitives for workflow orchestration
#[derive(Parser, Debug)]
#[command(name = "signalflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scripted progress-and-final scenario
    Demo {
        /// Scenario file (runs the built-in rental search when omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Do not write the workflow history to disk
        #[arg(long)]
        no_persist: bool,
    },

    /// Show the persisted history of a workflow
    History {
        /// Workflow ID
        workflow_id: String,
    },

    /// List workflows with a persisted history
    Workflows {
        /// Maximum number of workflows to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Demo {
                scenario,
                no_persist,
            } => run_demo(scenario, no_persist).await.map(|_| ()),
            Commands::History { workflow_id } => show_history(&workflow_id).await,
            Commands::Workflows { limit } => list_workflows(limit).await,
            Commands::Config => show_config().await,
        }
    }
}

/// What a scenario run observed
#[derive(Debug)]
pub struct DemoOutcome {
    pub workflow_id: String,
    pub started: Option<String>,
    pub progress: Vec<serde_json::Value>,
    pub result: serde_json::Value,
    pub history: History,
}

/// Run a scenario file (or the built-in rental search) and optionally persist its history
async fn run_demo(scenario_path: Option<PathBuf>, no_persist: bool) -> Result<DemoOutcome> {
    let scenario = match scenario_path {
        Some(path) => Scenario::from_file(&path)?,
        None => Scenario::default_rental_search(),
    };

    let outcome = run_scenario(&scenario).await?;
    println!("{}", describe(&outcome.result));

    let expected = scenario.progress_before_completion();
    if outcome.progress.len() != expected {
        warn!(
            expected,
            received = outcome.progress.len(),
            "Progress count differs from the script"
        );
    }

    eprintln!(
        "\n[Workflow {} finished with {} history events, {} of {} scripted progress updates]",
        outcome.workflow_id,
        outcome.history.len(),
        outcome.progress.len(),
        expected
    );

    if !no_persist && config::config()?.history.persist {
        let store = HistoryStore::open(&outcome.workflow_id).await?;
        store.save(&outcome.history).await?;
        eprintln!("History saved to {}", store.history_path().display());
    }

    Ok(outcome)
}

/// Start the activity, deliver the scripted signals, and collect what the pattern reported
pub async fn run_scenario(scenario: &Scenario) -> Result<DemoOutcome> {
    scenario.validate()?;

    let workflow_id = scenario
        .workflow_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let (mut ctx, sender) = WorkflowContext::new(workflow_id.clone());

    let start_result = scenario.start_result.clone();
    let start_delay = Duration::from_millis(scenario.start_delay_ms);
    let start = activity_fn("start_search", move |_: ()| {
        let result = start_result.clone();
        async move {
            tokio::time::sleep(start_delay).await;
            Ok(result)
        }
    });

    let progress: Signal<serde_json::Value> = Signal::named(scenario.progress_signal.clone());
    let completion: Signal<serde_json::Value> = Signal::named(scenario.completion_signal.clone());

    let started = Rc::new(RefCell::new(None));
    let updates = Rc::new(RefCell::new(Vec::new()));

    let started_slot = started.clone();
    let update_log = updates.clone();
    let mut pattern = progress_and_final(start, progress, completion)
        .on_started(move |job: String| {
            eprintln!("Started: {}", job);
            *started_slot.borrow_mut() = Some(job);
        })
        .on_progress(move |update: serde_json::Value| {
            eprintln!("Progress: {}", describe(&update));
            update_log.borrow_mut().push(update);
        });

    let deliveries = scenario.deliveries.clone();
    let driver = tokio::spawn(async move {
        for delivery in deliveries {
            tokio::time::sleep(delivery.delay()).await;
            sender.send_envelope(SignalEnvelope::new(delivery.signal, delivery.payload))?;
        }
        Ok::<_, CoordinationError>(())
    });

    eprintln!("Running scenario '{}' as workflow {}", scenario.name, workflow_id);
    let result = pattern.call(&mut ctx, ()).await?;

    driver.await.context("Signal driver task failed")??;
    drop(pattern);

    Ok(DemoOutcome {
        workflow_id,
        started: started.take(),
        progress: updates.take(),
        result,
        history: ctx.into_history(),
    })
}

/// Show the persisted history of a workflow
async fn show_history(workflow_id: &str) -> Result<()> {
    let store = HistoryStore::open(workflow_id).await?;
    let events = store.replay().await?;

    if events.is_empty() {
        anyhow::bail!("No history found for workflow {}", workflow_id);
    }

    println!("Workflow: {}", workflow_id);
    println!("Events: {}\n", events.len());
    for event in &events {
        print_event(event);
    }

    Ok(())
}

/// List workflows with a persisted history
async fn list_workflows(limit: usize) -> Result<()> {
    let base_dir = HistoryStore::base_directory()?;
    let workflow_ids = HistoryStore::list_workflows(&base_dir).await?;

    if workflow_ids.is_empty() {
        println!("No workflow histories found in {}", base_dir.display());
        return Ok(());
    }

    println!("{:<38} {:>7}  LAST EVENT", "WORKFLOW", "EVENTS");
    for workflow_id in workflow_ids.into_iter().take(limit) {
        let store = HistoryStore::open_at(&base_dir, &workflow_id).await?;
        let history = store.load().await?;
        let last = history
            .events()
            .last()
            .map(|e| format!("{:?}", e.event_type))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<38} {:>7}  {}", workflow_id, history.len(), last);
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("signalflow configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home (engine state): {}", cfg.home.display());
    println!("  Histories:           {}", cfg.histories_dir().display());
    println!();
    println!("History:");
    println!("  Persist: {}", cfg.history.persist);

    Ok(())
}

fn print_event(event: &HistoryEvent) {
    println!(
        "{:>4}  {}  {:<20} {}",
        event.sequence,
        event.timestamp.format("%H:%M:%S%.3f"),
        format!("{:?}", event.event_type),
        event.summary
    );
    if let Some(payload) = &event.payload {
        println!("      payload: {}", payload);
    }
    if let Some(error) = &event.error {
        println!("      error: {}", error);
    }
}

/// Short human-readable form of a JSON payload
fn describe(payload: &serde_json::Value) -> String {
    for key in ["message", "summary", "request"] {
        if let Some(text) = payload.get(key).and_then(|v| v.as_str()) {
            return text.to_string();
        }
    }
    match payload {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
