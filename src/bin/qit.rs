//! qit CLI: operator interface to the queue service.

use anyhow::Context;
use clap::{Parser, Subcommand};
use qit::config::Config;
use qit::model::{Job, JobId};
use qit::service::QueueService;
use qit::store::{MemoryStore, RedisStore, Store};
use qit::telemetry::{TelemetryConfig, init_telemetry};
use qit::worker::{Worker, WorkerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "qit", about = "Priority work queues with job tracking")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Use a throwaway in-process store instead of Redis
    #[arg(long, global = true)]
    memory: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register (or re-point) an entity's queue
    Register {
        entity: String,
        /// Queue base name
        queue: String,
    },
    /// Remove an entity's queue registration
    Unregister { entity: String },
    /// List registered queues
    Queues,
    /// Enqueue a job
    Enqueue {
        entity: String,
        /// JSON payload
        payload: String,
        #[arg(long, short)]
        priority: String,
    },
    /// Take the next job for an entity
    Dequeue {
        entity: String,
        /// Only this priority (default: highest non-empty)
        #[arg(long, short)]
        priority: Option<String>,
    },
    /// Report a job's result
    Complete {
        /// Job urn
        urn: String,
        /// JSON result
        result: String,
    },
    /// Show a job's status (a completed status is consumed)
    Status { urn: String },
    /// Pending jobs per priority
    Pending { entity: String },
    /// Delete all queued jobs of an entity
    Purge { entity: String },
    /// Delete every job tracker record
    Clear,
    /// Run a worker that echoes each payload back as its result
    Work {
        entity: String,
        #[arg(long, short)]
        priority: Option<String>,
        /// Poll interval when the queue is empty (ms)
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
        /// Stop after this many jobs
        #[arg(long)]
        max_jobs: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let _guard = init_telemetry(TelemetryConfig::from_config(&config, "qit")?)?;

    let store: Arc<dyn Store> = if cli.memory {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            RedisStore::open(&config.redis)
                .await
                .context("cannot reach the queue store")?,
        )
    };

    let service = Arc::new(QueueService::new(&config, store));
    service.connect().await?;

    match cli.command {
        Command::Register { entity, queue } => {
            let created = service.register_queue(&entity, &queue).await?;
            let verb = if created { "Registered" } else { "Re-registered" };
            println!("{verb}: {entity} -> {queue}");
        }
        Command::Unregister { entity } => {
            let queue = service.delete_queue(&entity).await?;
            println!("Removed: {entity} (queue {queue})");
        }
        Command::Queues => {
            let queues = service.registered_queues().await?;
            if queues.is_empty() {
                println!("No queues registered.");
            }
            for (entity, queue) in queues {
                println!("{entity:<20}  {queue}");
            }
        }
        Command::Enqueue {
            entity,
            payload,
            priority,
        } => {
            let payload: serde_json::Value =
                serde_json::from_str(&payload).context("payload is not valid JSON")?;
            let urn = service.enqueue_job(&entity, payload, &priority).await?;
            println!("{urn}");
        }
        Command::Dequeue { entity, priority } => {
            match service.dequeue_job(&entity, priority.as_deref()).await? {
                Some(job) => print_job(&job)?,
                None => println!("Queue is empty."),
            }
        }
        Command::Complete { urn, result } => {
            let urn = JobId::parse(&urn)?;
            let result: serde_json::Value =
                serde_json::from_str(&result).context("result is not valid JSON")?;
            service.complete_job(&urn, result).await?;
            println!("Completed: {urn}");
        }
        Command::Status { urn } => {
            let record = service.get_status(&JobId::parse(&urn)?).await?;
            println!("Status:  {}", record.status);
            if let Some(result) = record.result {
                println!("Result:  {}", serde_json::to_string_pretty(&result)?);
            }
        }
        Command::Pending { entity } => {
            let counts = service.count_pending(&entity).await?;
            for (priority, n) in counts.iter() {
                println!("{priority:<12}  {n}");
            }
            println!("\n{} job(s)", counts.total());
        }
        Command::Purge { entity } => {
            service.purge_entity_queues(&entity).await?;
            println!("Purged all queued jobs for {entity}");
        }
        Command::Clear => {
            service.clear_pending().await?;
            println!("Cleared job tracker");
        }
        Command::Work {
            entity,
            priority,
            poll_ms,
            max_jobs,
        } => {
            let worker = Worker::new(
                Arc::clone(&service),
                WorkerConfig {
                    priority,
                    poll_interval: Duration::from_millis(poll_ms),
                    max_jobs,
                    ..WorkerConfig::new(entity)
                },
            );

            let w = worker.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                w.shutdown();
            });

            let processed = worker
                .run(|job: Job| async move { Ok(job.into_payload()) })
                .await?;
            println!("{processed} job(s) processed");
        }
    }

    Ok(())
}

fn print_job(job: &Job) -> anyhow::Result<()> {
    println!("URN:      {}", job.urn());
    println!("Payload:  {}", serde_json::to_string_pretty(job.payload())?);
    Ok(())
}
