// Demo run: a fixed set of workers drains simulated tasks through a bounded queue
//
// Design Decision: The producer and the final wait run on blocking threads so
// the async runtime stays free to observe Ctrl-C. Ctrl-C closes the pool;
// tasks already queued still run to completion.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use taskpool::{
    JobId, PoolStats, Task, TaskError, TaskHandle, TaskId, TaskSnapshot, WorkerPool,
    WorkerPoolConfig,
};
use tracing::{info, warn};

use super::PoolArgs;
use crate::output::{print_field, print_table_header, print_table_row, OutputFormat};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub pool: PoolArgs,

    /// Number of tasks to submit (ids 1..=N)
    #[arg(long, short, default_value_t = 10)]
    pub tasks: u64,

    /// Job ID offset; each task's job ID is job_base + task ID
    #[arg(long, default_value_t = 100)]
    pub job_base: u64,

    /// Upper bound of each task's simulated work, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub max_delay_ms: u64,

    /// Probability (0.0 - 1.0) that a task reports failure
    #[arg(long, default_value_t = 0.0)]
    pub fail_rate: f64,

    /// Seed for reproducible delays and failures
    #[arg(long)]
    pub seed: Option<u64>,

    /// Exit with an error if any task failed or was rejected
    #[arg(long)]
    pub strict: bool,
}

/// Simulated unit of work decided up front
#[derive(Debug, Clone, PartialEq)]
struct PlannedTask {
    id: TaskId,
    job_id: JobId,
    delay: Duration,
    fails: bool,
}

impl PlannedTask {
    fn into_task(self) -> Task {
        let Self {
            id,
            job_id,
            delay,
            fails,
        } = self;

        Task::new(id, job_id, move || {
            thread::sleep(delay);
            if fails {
                Err(TaskError::failed(format!(
                    "simulated failure after {}ms",
                    delay.as_millis()
                )))
            } else {
                Ok(())
            }
        })
    }
}

fn plan_tasks(args: &RunArgs) -> Result<Vec<PlannedTask>> {
    if !(0.0..=1.0).contains(&args.fail_rate) {
        bail!("--fail-rate must be between 0.0 and 1.0, got {}", args.fail_rate);
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut plan = Vec::new();
    for id in 1..=args.tasks {
        let Some(job_id) = args.job_base.checked_add(id) else {
            bail!(
                "--job-base {} overflows job IDs for {} task(s)",
                args.job_base,
                args.tasks
            );
        };
        plan.push(PlannedTask {
            id,
            job_id,
            delay: Duration::from_millis(rng.gen_range(0..=args.max_delay_ms)),
            fails: rng.gen_bool(args.fail_rate),
        });
    }

    Ok(plan)
}

/// Result of the producer side
#[derive(Debug, Default)]
struct Submission {
    handles: Vec<TaskHandle>,
    rejected: Vec<TaskId>,
}

fn submit_all(pool: &WorkerPool, plan: Vec<PlannedTask>) -> Submission {
    let mut submission = Submission::default();
    let mut remaining = plan.into_iter();

    for planned in remaining.by_ref() {
        let task = planned.into_task();
        let handle = task.handle();
        match pool.submit(task) {
            Ok(()) => submission.handles.push(handle),
            Err(e) => {
                warn!(task_id = e.task().id(), "Pool closed, stopping submission");
                submission.rejected.push(e.task().id());
                break;
            }
        }
    }

    submission.rejected.extend(remaining.map(|p| p.id));
    submission
}

/// Summary printed at the end of a run
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub pool: WorkerPoolConfig,
    pub elapsed_ms: u128,
    pub stats: PoolStats,
    pub rejected: Vec<TaskId>,
    pub tasks: Vec<TaskSnapshot>,
}

pub async fn run(args: RunArgs, output: OutputFormat, quiet: bool) -> Result<()> {
    let config = args.pool.resolve();
    let plan = plan_tasks(&args)?;

    let pool = Arc::new(
        WorkerPool::with_config(config.clone()).context("Failed to start worker pool")?,
    );
    let started = Instant::now();

    info!(
        pool_id = %pool.id(),
        tasks = plan.len(),
        max_delay_ms = args.max_delay_ms,
        "Submitting tasks"
    );

    let mut producer = tokio::task::spawn_blocking({
        let pool = Arc::clone(&pool);
        move || submit_all(&pool, plan)
    });

    let submission = tokio::select! {
        result = &mut producer => result.context("Producer thread failed")?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received shutdown signal, closing pool");
            pool.close();
            producer.await.context("Producer thread failed")?
        }
    };

    pool.close();
    tokio::task::spawn_blocking({
        let pool = Arc::clone(&pool);
        move || pool.wait()
    })
    .await
    .context("Failed waiting for workers")?;

    let report = RunReport {
        pool: config,
        elapsed_ms: started.elapsed().as_millis(),
        stats: pool.stats(),
        rejected: submission.rejected,
        tasks: submission.handles.iter().map(TaskHandle::snapshot).collect(),
    };

    if output.is_text() {
        print_report(&report, quiet);
    } else {
        output.print_value(&report)?;
    }

    if args.strict && (report.stats.failed > 0 || !report.rejected.is_empty()) {
        bail!(
            "{} task(s) failed, {} rejected",
            report.stats.failed,
            report.rejected.len()
        );
    }

    Ok(())
}

fn print_report(report: &RunReport, quiet: bool) {
    if !quiet && !report.tasks.is_empty() {
        print_table_header(&[
            ("TASK", 6),
            ("JOB", 8),
            ("STATUS", 10),
            ("RAN_MS", 8),
            ("FAILURE", 40),
        ]);

        for task in &report.tasks {
            let ran_ms = match (task.started_at, task.finished_at) {
                (Some(start), Some(end)) => (end - start).num_milliseconds().to_string(),
                _ => "-".to_string(),
            };
            print_table_row(&[
                (&task.id.to_string(), 6),
                (&task.job_id.to_string(), 8),
                (&task.status.to_string(), 10),
                (&ran_ms, 8),
                (task.failure.as_deref().unwrap_or("-"), 40),
            ]);
        }
        println!();
    }

    print_field("Pool ID", &report.pool.pool_id);
    print_field("Workers", &report.pool.worker_count.to_string());
    print_field("Capacity", &report.pool.queue_capacity.to_string());
    print_field("Completed", &report.stats.completed.to_string());
    print_field("Failed", &report.stats.failed.to_string());
    print_field("Rejected", &report.rejected.len().to_string());
    print_field("Peak running", &report.stats.peak_running.to_string());
    print_field("Elapsed", &format!("{}ms", report.elapsed_ms));
}
