//! Progress bar driven by orchestrator events

use console::style;
use ferrostage_engine::{Outcome, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Tally {
    succeeded: u64,
    failed: u64,
    partial: u64,
    skipped: u64,
}

impl Tally {
    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.succeeded += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::PartialFailure => self.partial += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }

    fn message(&self) -> String {
        format!(
            "{} {}  {} {}  {} {}  {} {}",
            style("✓").green(),
            self.succeeded,
            style("✗").red(),
            self.failed,
            style("!").yellow(),
            self.partial,
            style("-").dim(),
            self.skipped
        )
    }
}

/// Consume progress events until the run drops its sink
///
/// Operations skipped before scheduling starts are counted but do not move
/// the bar, whose length is the number of scheduled operations.
pub fn track(mut receiver: UnboundedReceiver<ProgressEvent>, quiet: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tally = Tally::default();
        let mut bar: Option<ProgressBar> = None;

        while let Some(event) = receiver.recv().await {
            match event {
                ProgressEvent::RunStarted { operations, .. } if !quiet => {
                    bar = Some(create_bar(operations as u64));
                }
                ProgressEvent::RunStarted { .. } => {}
                ProgressEvent::JobSubmitted { source } => {
                    if let Some(bar) = &bar {
                        let name = source
                            .file_name()
                            .map_or_else(|| source.display().to_string(), |n| {
                                n.to_string_lossy().into_owned()
                            });
                        bar.set_prefix(name);
                    }
                }
                ProgressEvent::OperationFinished { outcome, .. } => {
                    tally.add(outcome);
                    if let Some(bar) = &bar {
                        bar.inc(1);
                        bar.set_message(tally.message());
                    }
                }
            }
        }

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
    })
}

fn create_bar(length: u64) -> ProgressBar {
    let pb = ProgressBar::new(length);
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} {msg} {prefix:.dim}")
    {
        pb.set_style(bar_style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrostage_engine::ProgressSink;
    use std::path::PathBuf;

    #[test]
    fn test_tally_counts_outcomes() {
        let mut tally = Tally::default();
        tally.add(Outcome::Success);
        tally.add(Outcome::Success);
        tally.add(Outcome::PartialFailure);
        tally.add(Outcome::Skipped);

        assert_eq!(tally.succeeded, 2);
        assert_eq!(tally.partial, 1);
        assert_eq!(tally.skipped, 1);
        assert_eq!(tally.failed, 0);
    }

    #[tokio::test]
    async fn test_tracker_stops_when_sink_is_dropped() {
        let (sink, receiver) = ProgressSink::channel();
        let handle = track(receiver, true);

        sink.emit(ProgressEvent::RunStarted {
            operations: 1,
            bytes: 1,
        });
        sink.emit(ProgressEvent::OperationFinished {
            source: PathBuf::from("/v/a"),
            outcome: Outcome::Success,
            size: 1,
        });
        drop(sink);

        handle.await.unwrap();
    }
}
