// CLI commands

pub mod config;
pub mod run;

use clap::Args;
use taskpool::WorkerPoolConfig;

/// Pool sizing flags shared by commands; unset flags fall back to the
/// TASKPOOL_* environment variables, then to defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct PoolArgs {
    /// Number of worker threads
    #[arg(long, short)]
    pub workers: Option<usize>,

    /// Maximum number of queued tasks before submission blocks
    #[arg(long, short)]
    pub capacity: Option<usize>,

    /// Pool ID used in thread names and logs
    #[arg(long)]
    pub pool_id: Option<String>,
}

impl PoolArgs {
    /// Resolve the effective pool configuration
    pub fn resolve(&self) -> WorkerPoolConfig {
        let mut config = WorkerPoolConfig::from_env();
        if let Some(workers) = self.workers {
            config = config.with_worker_count(workers);
        }
        if let Some(capacity) = self.capacity {
            config = config.with_queue_capacity(capacity);
        }
        if let Some(pool_id) = &self.pool_id {
            config = config.with_pool_id(pool_id.clone());
        }
        config
    }
}
