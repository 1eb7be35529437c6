//! Console text for the reproducer
//!
//! Every block is built as a `String` so the wording can be tested without
//! capturing stdout.

use std::fmt::Write;

use burst_race_bait::KnobResult;
use burst_race_core::{CrashReport, HarnessConfig, RunSummary, ThroughputSample};

const RULE: &str = "================================================================";

/// Bug tracker entry for the race this tool reproduces
pub const BUG_URL: &str = "https://syzkaller.appspot.com/bug?extid=d1da16f03614058fdc48";

/// Startup banner
pub fn banner() -> String {
    format!(
        "{RULE}\next4 Inline Data Race - Burst Reproducer\n{BUG_URL}\n{RULE}\n"
    )
}

/// Block printed when the previous run died mid-flight
pub fn crash_block(report: &CrashReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== PREVIOUS CRASH DETECTED ===");
    let _ = writeln!(
        out,
        "Last run crashed after {} seconds",
        report.runtime.as_secs()
    );
    let _ = writeln!(out, "Started: {}", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "Bursts before crash: {}", report.bursts);
    let _ = writeln!(out, "Conversions: {}", report.operations);
    let _ = writeln!(out, "Last status: {}", report.status);
    let _ = writeln!(out, "===============================");
    out
}

/// Run configuration
pub fn config_block(config: &HarnessConfig, cpus: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Configuration:");
    let _ = writeln!(out, "  Test directory: {}", config.work_dir.display());
    let _ = writeln!(out, "  Files per burst: {}", config.items);
    let _ = writeln!(out, "  Accumulator threads: {}", config.accumulators);
    let _ = writeln!(out, "  Converter threads: {}", config.mutators);
    let _ = writeln!(out, "  CPUs available: {}", cpus);
    let _ = writeln!(out, "  State file: {}", config.state_path.display());
    out
}

/// Kernel writeback settings, one line per knob
pub fn kernel_block(title: &str, knobs: &[KnobResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}:", title);
    for (knob, value) in knobs {
        match value {
            Ok(value) => {
                let _ = writeln!(out, "  {} = {}", knob, value);
            }
            Err(e) => {
                let _ = writeln!(out, "  {} = ? ({})", knob, e);
            }
        }
    }
    out
}

/// Startup warning shown before the delay
pub fn warning(delay_secs: u64) -> String {
    format!(
        "WARNING: This WILL crash the machine when the bug triggers!\n\
         Starting in {} seconds... (Ctrl+C to abort)\n",
        delay_secs
    )
}

/// One progress line
pub fn progress_line(sample: &ThroughputSample) -> String {
    format!(
        "[{}s] Bursts: {}, Conversions: {}, Rate: {:.0}/s",
        sample.elapsed.as_secs(),
        sample.bursts,
        sample.operations,
        sample.ops_per_sec
    )
}

/// Final statistics
pub fn summary_block(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== Final Statistics ===");
    let _ = writeln!(out, "Runtime: {} seconds", summary.runtime.as_secs());
    let _ = writeln!(out, "Bursts: {}", summary.totals.bursts);
    let _ = writeln!(out, "Conversions: {}", summary.totals.operations);
    let _ = writeln!(out, "Rate: {:.0}/s", summary.ops_per_sec);
    let _ = writeln!(out, "Triggers: {}", summary.totals.triggers);
    let _ = writeln!(out, "Misses: {}", summary.totals.misses);
    match &summary.stop_reason {
        Some(reason) => {
            let _ = writeln!(out, "Stopped: {}", reason);
        }
        None => {
            let _ = writeln!(out, "Stopped: unknown");
        }
    }
    if summary.thread_failures > 0 {
        let _ = writeln!(out, "Failed threads: {}", summary.thread_failures);
    }
    if summary.swept > 0 {
        let _ = writeln!(out, "Released at exit: {}", summary.swept);
    }
    let _ = writeln!(out, "State record: {}", summary.record);
    if summary.stalled() {
        let _ = writeln!(out, "\nThe barrier stalled; the run ended early.");
    } else {
        let _ = writeln!(
            out,
            "\nIf the machine didn't crash, the race wasn't triggered."
        );
    }
    out
}
