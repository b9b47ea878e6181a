// Effective configuration command

use anyhow::Result;
use taskpool::WorkerPoolConfig;

use super::PoolArgs;
use crate::output::{print_field, OutputFormat};

pub fn run(args: &PoolArgs, output: OutputFormat) -> Result<()> {
    let config = args.resolve();
    let valid = config.validate();

    if output.is_text() {
        print_config(&config);
        match &valid {
            Ok(()) => print_field("Valid", "yes"),
            Err(e) => print_field("Valid", &format!("no ({})", e)),
        }
    } else {
        output.print_value(&config)?;
    }

    valid.map_err(Into::into)
}

pub fn print_config(config: &WorkerPoolConfig) {
    print_field("Pool ID", &config.pool_id);
    print_field("Workers", &config.worker_count.to_string());
    print_field("Capacity", &config.queue_capacity.to_string());
}
