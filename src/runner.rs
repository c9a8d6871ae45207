use std::future::Future;
use std::time::Instant;

use anyhow::Result;
use futures::{Stream, StreamExt};
use indicatif::ProgressBar;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::usage::{CostRates, UsageCounters, UsageReport, UsageTracker};

/// One item from the remote generation stream.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// A fragment of response text.
    Text(String),
    /// Token usage, typically sent once after the last fragment.
    Usage(UsageCounters),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Streaming,
    Completed,
    Failed,
}

/// Writes a generation stream to an output as it arrives.
pub struct GenerationRunner<W> {
    out: W,
    state: RunState,
    spinner: Option<ProgressBar>,
}

impl<W> GenerationRunner<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: RunState::Idle,
            spinner: None,
        }
    }

    /// Shown until the first fragment arrives.
    pub fn with_spinner(mut self, spinner: ProgressBar) -> Self {
        self.spinner = Some(spinner);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Consumes `events` to the end, writing and flushing each fragment
    /// before asking for the next one. Usage events go to `tracker`.
    ///
    /// An error from the stream stops the run; whatever was already written
    /// stays written.
    pub async fn run<S>(&mut self, events: S, tracker: &mut UsageTracker) -> Result<()>
    where
        S: Stream<Item = Result<GenerationEvent>>,
    {
        let mut events = std::pin::pin!(events);
        let start = Instant::now();
        let mut fragments = 0usize;
        self.state = RunState::Streaming;
        info!("Starting response stream");

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    self.fail();
                    return Err(e);
                }
            };
            match event {
                GenerationEvent::Text(text) => {
                    self.clear_spinner();
                    if text.is_empty() {
                        continue;
                    }
                    if let Err(e) = self.write_fragment(&text).await {
                        self.fail();
                        return Err(e);
                    }
                    fragments += 1;
                }
                GenerationEvent::Usage(usage) => {
                    debug!("Usage reported: {:?}", usage);
                    tracker.record(usage);
                }
            }
        }

        self.clear_spinner();
        self.state = RunState::Completed;
        let dt = start.elapsed();
        info!(
            "{fragments} fragments received in {:?} ({:.2} fragments/s)",
            dt,
            fragments as f64 / dt.as_secs_f64().max(f64::EPSILON),
        );
        Ok(())
    }

    /// Waits for `request` to open the stream, streams it to the end, then
    /// prints the usage summary if `show_tokens_used` is set. Nothing is
    /// summarised when the request or the stream fails.
    pub async fn respond<F, S>(
        &mut self,
        request: F,
        show_tokens_used: bool,
        rates: &CostRates,
    ) -> Result<()>
    where
        F: Future<Output = Result<S>>,
        S: Stream<Item = Result<GenerationEvent>>,
    {
        let events = match request.await {
            Ok(events) => events,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };
        let mut tracker = UsageTracker::begin();
        self.run(events, &mut tracker).await?;

        if show_tokens_used {
            if !tracker.has_reports() {
                warn!("The model reported no token usage");
            }
            let report = UsageReport::new(tracker.counters(), rates);
            self.write_usage_report(&report).await?;
        }
        Ok(())
    }

    /// Prints the usage summary after a completed run.
    pub async fn write_usage_report(&mut self, report: &UsageReport) -> Result<()> {
        let line = format!("\n\n{report}\n");
        self.out.write_all(line.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    async fn write_fragment(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    fn fail(&mut self) {
        self.clear_spinner();
        self.state = RunState::Failed;
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}
