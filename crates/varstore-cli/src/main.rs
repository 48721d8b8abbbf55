//! CLI binary for reconciling runs against file-backed VariableStores.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};

use varstore_engine::{
    build_environment, reconcile_with_requeue, FileStore, Outcome, Reconciler,
    ReconcilerConfig, RequeuePolicy, VariableStoreClient,
};
use varstore_expr::{CelRuntime, ExpressionRuntime};
use varstore_types::{Binding, RunState, TaskRun, VariableStore};

#[derive(Parser)]
#[command(name = "varstore", version, about = "Evaluate expressions against persisted variable stores")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding `<namespace>/<name>.json` store files
    #[arg(long, global = true, default_value = ".varstore")]
    store_root: PathBuf,

    /// Namespace for stores and ad-hoc runs
    #[arg(short, long, global = true, default_value = "default")]
    namespace: String,

    /// apiVersion a run's ref must carry to be reconciled
    #[arg(long, global = true)]
    api_version: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a run file and write the updated run back
    Reconcile {
        /// Path to the run .json file
        run: PathBuf,

        /// Where to write the updated run (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Requeues allowed for retryable errors
        #[arg(long, default_value = "5")]
        max_requeues: usize,

        /// Wait before the first requeue, in milliseconds; doubles each time
        #[arg(long, default_value = "500")]
        backoff_ms: u64,
    },

    /// Evaluate `name=expr` parameters as an ad-hoc run
    Eval {
        /// Parameter as `name=expression`, evaluated in the order given
        #[arg(short, long = "param", required = true)]
        params: Vec<String>,

        /// Store to read from and write results to
        #[arg(short, long)]
        store: Option<String>,

        /// Print the full run as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the bindings of a store
    Show {
        /// Store name
        store: String,

        /// Print the store as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile and evaluate one expression without persisting anything
    Check {
        /// Expression source
        expression: String,

        /// Store whose bindings are in scope
        #[arg(short, long)]
        store: Option<String>,
    },

    /// Create or overwrite a store from `name=value` bindings
    Put {
        /// Store name
        store: String,

        /// Binding as `name=value`
        #[arg(long = "var")]
        vars: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let files = Arc::new(FileStore::new(&cli.store_root));
    let mut config = ReconcilerConfig::default();
    if let Some(api_version) = cli.api_version {
        config.api_version = api_version;
    }

    match cli.command {
        Commands::Reconcile {
            run,
            output,
            max_requeues,
            backoff_ms,
        } => {
            let policy = RequeuePolicy::new(max_requeues, Duration::from_millis(backoff_ms));
            cmd_reconcile(files, config, &run, output.as_deref(), &policy).await?;
        }
        Commands::Eval {
            params,
            store,
            json,
        } => {
            cmd_eval(files, config, &cli.namespace, &params, store.as_deref(), json).await?;
        }
        Commands::Show { store, json } => {
            cmd_show(&files, &cli.namespace, &store, json).await?;
        }
        Commands::Check { expression, store } => {
            cmd_check(&files, &cli.namespace, &expression, store.as_deref()).await?;
        }
        Commands::Put { store, vars } => {
            cmd_put(&files, &cli.namespace, &store, &vars).await?;
        }
    }

    Ok(())
}

/// Split `name=value`, rejecting an empty name.
fn split_assignment(raw: &str) -> anyhow::Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => bail!("expected name=value, got '{raw}'"),
    }
}

fn print_run(run: &TaskRun) {
    let state = match run.status.state() {
        RunState::NotStarted => "NotStarted",
        RunState::Running => "Running",
        RunState::Succeeded => "Succeeded",
        RunState::Failed => "Failed",
    };
    println!("Run {}: {}", run.metadata.key(), state);
    if let Some(condition) = &run.status.condition {
        println!("  reason:  {}", condition.reason);
        if !condition.message.is_empty() {
            println!("  message: {}", condition.message);
        }
    }
    for result in &run.status.results {
        println!("  {} = {}", result.name, result.value);
    }
}

fn exit_on_failure(outcome: &Outcome) {
    if outcome.is_failure() {
        std::process::exit(1);
    }
}

async fn cmd_reconcile(
    files: Arc<FileStore>,
    config: ReconcilerConfig,
    path: &Path,
    output: Option<&Path>,
    policy: &RequeuePolicy,
) -> anyhow::Result<()> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading run {}", path.display()))?;
    let mut run: TaskRun = serde_json::from_str(&source)
        .with_context(|| format!("parsing run {}", path.display()))?;

    let reconciler = Reconciler::with_config(config, files, Arc::new(CelRuntime::new()));
    let result = reconcile_with_requeue(&reconciler, &mut run, policy).await;

    // The status may have advanced even when the pass errored.
    let target = output.unwrap_or(path);
    tokio::fs::write(target, serde_json::to_string_pretty(&run)?)
        .await
        .with_context(|| format!("writing run {}", target.display()))?;

    let outcome = result?;
    match outcome {
        Outcome::NotOwned => println!("Run {} is not handled by this reconciler", run.metadata.key()),
        Outcome::AlreadyDone => {
            println!("Run {} is already done", run.metadata.key());
            print_run(&run);
        }
        _ => print_run(&run),
    }
    exit_on_failure(&outcome);
    Ok(())
}

async fn cmd_eval(
    files: Arc<FileStore>,
    config: ReconcilerConfig,
    namespace: &str,
    params: &[String],
    store: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let name = format!("eval-{}", uuid::Uuid::new_v4().simple());
    let mut run = TaskRun::new(namespace, name).with_ref(
        config.api_version.as_str(),
        config.kind.as_str(),
        store.unwrap_or_default(),
    );
    for raw in params {
        let (param, expression) = split_assignment(raw)?;
        run = run.with_param(param, expression);
    }

    let reconciler = Reconciler::with_config(config, files, Arc::new(CelRuntime::new()));
    let outcome = reconciler.reconcile(&mut run).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run(&run);
    }
    exit_on_failure(&outcome);
    Ok(())
}

async fn cmd_show(files: &FileStore, namespace: &str, name: &str, json: bool) -> anyhow::Result<()> {
    let store = files.get(namespace, name).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&store)?);
        return Ok(());
    }

    println!(
        "VariableStore {} (resource version {})",
        store.metadata.key(),
        store.metadata.resource_version
    );
    if store.spec.vars.is_empty() {
        println!("  (no bindings)");
    }
    for binding in &store.spec.vars {
        println!("  {} = {}", binding.name, binding.value);
    }
    Ok(())
}

async fn cmd_check(
    files: &FileStore,
    namespace: &str,
    expression: &str,
    store: Option<&str>,
) -> anyhow::Result<()> {
    let store = match store {
        Some(name) => Some(files.get(namespace, name).await?),
        None => None,
    };
    let seed = build_environment(store.as_ref(), &[]);

    let env = CelRuntime::new().new_environment(&seed.declarations)?;
    let program = env.compile(expression)?;
    let value = program.evaluate(&seed.context)?;

    tracing::debug!(value_type = %value.value_type(), "Expression evaluated");
    println!("{}", value.to_canonical_string()?);
    Ok(())
}

async fn cmd_put(files: &FileStore, namespace: &str, name: &str, vars: &[String]) -> anyhow::Result<()> {
    let bindings = vars
        .iter()
        .map(|raw| split_assignment(raw).map(|(n, v)| Binding::new(n, v)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let written = files
        .put(&VariableStore::new(namespace, name, bindings))
        .await?;
    println!(
        "Wrote {} ({} bindings, resource version {})",
        written.metadata.key(),
        written.spec.vars.len(),
        written.metadata.resource_version
    );
    Ok(())
}
