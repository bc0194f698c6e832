use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use autosync_lib::{build_scheduler, AppConfig, Scheduler, SchedulerError, TaskId};

#[derive(Parser)]
#[command(name = "autosync-cli", version)]
#[command(about = "Periodic file copy scheduler", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Task store location (overrides the config file)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Owner key (defaults to this machine's id)
    #[arg(long)]
    owner: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List tasks of this owner
    List {
        #[arg(long)]
        json: bool,
    },

    /// Add a copy task
    Add {
        #[arg(short, long)]
        source: String,

        #[arg(short, long)]
        target: String,

        /// Interval in seconds
        #[arg(short, long, allow_negative_numbers = true)]
        interval: i64,
    },

    /// Change a task; omitted fields keep their value
    Edit {
        id: TaskId,

        #[arg(short, long)]
        source: Option<String>,

        #[arg(short, long)]
        target: Option<String>,

        #[arg(short, long, allow_negative_numbers = true)]
        interval: Option<i64>,
    },

    /// Delete a task
    Delete { id: TaskId },

    /// Print the owner key tasks are scoped to
    Owner,

    /// Start every task and print copy attempts until Ctrl-C
    Run {
        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }
    if let Some(owner) = &cli.owner {
        config.owner_key = Some(owner.clone());
    }

    Ok(config)
}

fn report(err: SchedulerError) -> anyhow::Error {
    anyhow::anyhow!("[{}] {err}", err.code())
}

/// How long `run` waits for in-flight copies after a stop
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async_main());
    // a hung copy keeps its blocking thread; don't wait on it
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn async_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("autosync_lib=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let scheduler = build_scheduler(&config).await;

    match cli.command {
        Command::List { json } => list(&scheduler, json).await?,
        Command::Add {
            source,
            target,
            interval,
        } => {
            let id = scheduler
                .add_task(&source, &target, interval)
                .await
                .map_err(report)?;
            println!("➕ Added task {id}: {source} -> {target} every {interval}s");
        }
        Command::Edit {
            id,
            source,
            target,
            interval,
        } => {
            let current = scheduler
                .tasks()
                .await
                .into_iter()
                .find(|t| t.id == id)
                .ok_or_else(|| report(SchedulerError::UnknownTask(id)))?;

            let source = source.unwrap_or(current.source_path);
            let target = target.unwrap_or(current.target_path);
            let interval = interval.unwrap_or(current.interval_seconds as i64);

            scheduler
                .edit_task(id, &source, &target, interval)
                .await
                .map_err(report)?;
            println!("🔄 Updated task {id}: {source} -> {target} every {interval}s");
        }
        Command::Delete { id } => {
            scheduler.delete_task(id).await.map_err(report)?;
            println!("❌ Deleted task {id}");
        }
        Command::Owner => println!("{}", scheduler.owner_key()),
        Command::Run { duration } => run(&scheduler, duration).await?,
    }

    Ok(())
}

async fn list(scheduler: &Scheduler, json: bool) -> anyhow::Result<()> {
    let tasks = scheduler
        .list_tasks(scheduler.owner_key())
        .await
        .map_err(report)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No tasks for owner {}", scheduler.owner_key());
        return Ok(());
    }

    println!("{:<6} {:<30} {:<30} {:>10}", "ID", "SOURCE", "TARGET", "EVERY (S)");
    println!("{}", "-".repeat(79));
    for task in tasks {
        println!(
            "{:<6} {:<30} {:<30} {:>10}",
            task.id, task.source_path, task.target_path, task.interval_seconds
        );
    }
    Ok(())
}

async fn run(scheduler: &Scheduler, duration: Option<u64>) -> anyhow::Result<()> {
    let mut events = BroadcastStream::new(scheduler.log().subscribe());

    let started = scheduler.start_all().await;
    if started == 0 {
        println!("✅ Nothing to run, add a task first");
        return Ok(());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("{started} task(s) running, Ctrl-C to stop"));

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            event = events.next() => match event {
                Some(Ok(entry)) => pb.println(entry.to_string()),
                Some(Err(e)) => pb.println(format!("⚠️  {e}")),
                None => break,
            },
        }
    }

    let stopped = scheduler.stop_all().await;
    pb.set_message(format!("Stopping {stopped} task(s)..."));
    if scheduler.shutdown_within(SHUTDOWN_GRACE).await {
        pb.finish_with_message("✅ Stopped");
    } else {
        pb.abandon_with_message(format!(
            "⚠️  Copies still running after {}s, exiting without them",
            SHUTDOWN_GRACE.as_secs()
        ));
    }
    Ok(())
}
