//! CLI argument parsing and run dispatch

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use burst_race_bait::{FileBait, WritebackTuning};
use burst_race_core::config::{
    DEFAULT_ACCUMULATORS, DEFAULT_ITEMS, DEFAULT_MUTATORS, DEFAULT_STATE_PATH, DEFAULT_WORK_DIR,
};
use burst_race_core::{HarnessBuilder, HarnessConfig, RaceBait, StateStore, ThroughputSample};

use crate::report;

/// Pause between the warning and the first burst
const STARTUP_DELAY: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(name = "burst-race")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory for the test files (must be on ext4 with inline_data)
    #[arg(short = 'd', long = "dir", default_value = DEFAULT_WORK_DIR)]
    pub dir: PathBuf,

    /// Files created and converted per burst
    #[arg(short = 'f', long = "files", default_value_t = DEFAULT_ITEMS as i64, allow_negative_numbers = true)]
    pub files: i64,

    /// Converter threads racing writeback
    #[arg(short = 'c', long = "converters", default_value_t = DEFAULT_MUTATORS as i64, allow_negative_numbers = true)]
    pub converters: i64,

    /// Threads creating and cleaning up files
    #[arg(long, default_value_t = DEFAULT_ACCUMULATORS as i64, allow_negative_numbers = true)]
    pub accumulators: i64,

    /// Lower the kernel writeback intervals before starting (needs root)
    #[arg(short, long)]
    pub aggressive: bool,

    /// Where the crash-forensics record is kept
    #[arg(long = "state-file", default_value = DEFAULT_STATE_PATH)]
    pub state_file: PathBuf,

    /// Also print the final summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Harness configuration for these arguments, clamped
    pub fn config(&self) -> HarnessConfig {
        HarnessConfig::new(&self.dir)
            .with_items(non_negative(self.files))
            .with_mutators(non_negative(self.converters))
            .with_accumulators(non_negative(self.accumulators))
            .with_aggressive(self.aggressive)
            .with_state_path(&self.state_file)
            .clamped()
    }

    /// Run the reproducer until a signal arrives
    pub fn run(&self) -> Result<()> {
        let config = self.config();

        print!("{}", report::banner());
        if let Some(crash) = StateStore::new(&config.state_path).detect_prior_crash() {
            println!();
            print!("{}", report::crash_block(&crash));
        }

        let cpus = thread::available_parallelism().map_or(1, |n| n.get());
        println!();
        print!("{}", report::config_block(&config, cpus));

        let tuning = WritebackTuning::new();
        println!();
        print!("{}", report::kernel_block("Kernel settings", &tuning.current()));
        if config.aggressive {
            println!();
            print!(
                "{}",
                report::kernel_block("Applied aggressive settings", &tuning.apply_aggressive())
            );
        }

        println!();
        print!("{}", report::warning(STARTUP_DELAY.as_secs()));
        thread::sleep(STARTUP_DELAY);

        let bait: Arc<dyn RaceBait> = Arc::new(FileBait::new(&config.work_dir, config.items));
        let (harness, samples) = HarnessBuilder::new()
            .config(config)
            .bait(bait)
            .build()
            .context("failed to set up the harness")?;

        let printer = spawn_printer(samples)?;
        let result = harness.run_with_signal_handling();
        if printer.join().is_err() {
            tracing::warn!("Progress printer panicked");
        }
        let summary = result.context("run failed")?;

        print!("{}", report::summary_block(&summary));
        if self.json {
            let json = serde_json::to_string_pretty(&summary)
                .context("failed to serialize the summary")?;
            println!("{}", json);
        }
        Ok(())
    }
}

/// Print progress lines until the harness drops its sender
fn spawn_printer(samples: Receiver<ThroughputSample>) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("progress".to_owned())
        .spawn(move || {
            for sample in samples {
                println!("{}", report::progress_line(&sample));
            }
        })
        .context("failed to spawn the progress printer")
}

fn non_negative(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}
