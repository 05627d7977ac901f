//! Progress bars and summary reporting for CLI downloads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::{BatchStats, ProgressRecord, ProgressStore, TaskStatus, format_bytes, format_duration};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates a percentage bar for a single file.
pub fn make_progress_bar(name: &str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% - {msg}")
            .expect("progress template is valid")
            .progress_chars("━━╌"),
    );
    bar.set_message(format!("{name} (queued)"));
    bar
}

/// Mirrors the store into one bar per record until `token` is cancelled.
///
/// Runs a final sync after cancellation so the bars show the settled state.
pub async fn render(store: Arc<ProgressStore>, multi: MultiProgress, token: CancellationToken) {
    let mut changes = store.subscribe();
    let mut bars = HashMap::new();

    loop {
        sync_bars(&store.snapshot(), &multi, &mut bars);
        tokio::select! {
            () = token.cancelled() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    sync_bars(&store.snapshot(), &multi, &mut bars);
}

/// Brings `bars` in line with `records`, adding bars for new ids.
pub fn sync_bars(
    records: &[ProgressRecord],
    multi: &MultiProgress,
    bars: &mut HashMap<u64, ProgressBar>,
) {
    for record in records {
        let bar = bars
            .entry(record.id)
            .or_insert_with(|| multi.add(make_progress_bar(&record.file_name)));
        if bar.is_finished() {
            continue;
        }

        bar.set_position(u64::from(record.progress_percent));
        match &record.status {
            TaskStatus::Queued => {}
            TaskStatus::Running => {
                if bar.message() != record.file_name {
                    bar.set_message(record.file_name.clone());
                    bar.enable_steady_tick(Duration::from_millis(250));
                }
            }
            TaskStatus::Succeeded => bar.finish_with_message(record.file_name.clone()),
            TaskStatus::Failed(reason) => {
                bar.abandon_with_message(format!("{} failed: {reason}", record.file_name));
            }
        }
    }
}

/// Prints a summary of the batch, listing failed files.
pub fn print_summary(stats: &BatchStats, records: &[ProgressRecord]) {
    if stats.files_settled() == 0 {
        println!("Nothing to download.");
        return;
    }

    println!("\n{SEPARATOR}");
    println!("{}", style("Download Summary").bold());
    println!("{SEPARATOR}");

    println!(
        "  Files downloaded:  {}",
        style(stats.files_succeeded).green()
    );
    if stats.files_failed > 0 {
        println!("  Files failed:      {}", style(stats.files_failed).red());
    }
    println!("  Total size:        {}", format_bytes(stats.total_bytes));
    println!("  Total time:        {}", format_duration(stats.elapsed));
    println!(
        "  Average speed:     {}/s",
        format_bytes(stats.average_speed())
    );
    println!("  Peak concurrency:  {}", stats.peak_running);

    let failed: Vec<_> = records
        .iter()
        .filter_map(|r| match &r.status {
            TaskStatus::Failed(reason) => Some((r, reason)),
            _ => None,
        })
        .collect();
    if !failed.is_empty() {
        println!("{SEPARATOR}");
        for (record, reason) in failed {
            println!(
                "  {} {} at {}%: {reason}",
                style("✗").red(),
                record.file_name,
                record.progress_percent
            );
        }
    }

    println!("{SEPARATOR}");
}
