use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use anyhow::Result;
use bedrock_cli::runner::{GenerationEvent, GenerationRunner, RunState};
use bedrock_cli::usage::{CostRates, UsageCounters, UsageReport, UsageTracker};
use tokio::io::AsyncWrite;

/// Only bytes that have been flushed become visible.
struct FlushRecorder {
    pending: Vec<u8>,
    visible: Arc<Mutex<String>>,
}

impl FlushRecorder {
    fn new() -> (Self, Arc<Mutex<String>>) {
        let visible = Arc::new(Mutex::new(String::new()));
        let writer = Self {
            pending: Vec::new(),
            visible: visible.clone(),
        };
        (writer, visible)
    }
}

impl AsyncWrite for FlushRecorder {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.pending.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let bytes = std::mem::take(&mut self.pending);
        self.visible
            .lock()
            .unwrap()
            .push_str(&String::from_utf8(bytes).unwrap());
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Streams `items` and records what was visible each time the runner asked
/// for the next one.
fn observed_stream(
    items: Vec<Result<GenerationEvent>>,
    visible: Arc<Mutex<String>>,
    observations: Arc<Mutex<Vec<String>>>,
) -> impl futures::Stream<Item = Result<GenerationEvent>> {
    futures::stream::unfold(items.into_iter(), move |mut items| {
        let visible = visible.clone();
        let observations = observations.clone();
        async move {
            observations
                .lock()
                .unwrap()
                .push(visible.lock().unwrap().clone());
            items.next().map(|item| (item, items))
        }
    })
}

fn text(s: &str) -> Result<GenerationEvent> {
    Ok(GenerationEvent::Text(s.to_string()))
}

#[tokio::test]
async fn each_fragment_is_visible_before_the_next_is_requested() {
    let (writer, visible) = FlushRecorder::new();
    let observations = Arc::new(Mutex::new(Vec::new()));
    let events = observed_stream(
        vec![text("Hel"), text("lo, "), text("world")],
        visible.clone(),
        observations.clone(),
    );

    let mut runner = GenerationRunner::new(writer);
    let mut tracker = UsageTracker::begin();
    runner.run(events, &mut tracker).await.unwrap();

    assert_eq!(*visible.lock().unwrap(), "Hello, world");
    assert_eq!(
        *observations.lock().unwrap(),
        vec!["", "Hel", "Hello, ", "Hello, world"]
    );
}

#[tokio::test]
async fn failure_mid_stream_leaves_output_in_place() {
    let (writer, visible) = FlushRecorder::new();
    let observations = Arc::new(Mutex::new(Vec::new()));
    let events = observed_stream(
        vec![
            text("Hel"),
            text("lo"),
            Err(anyhow::anyhow!("connection reset")),
        ],
        visible.clone(),
        observations,
    );

    let mut runner = GenerationRunner::new(writer);
    let mut tracker = UsageTracker::begin();
    let result = runner.run(events, &mut tracker).await;

    assert!(result.is_err());
    assert_eq!(runner.state(), RunState::Failed);
    assert_eq!(*visible.lock().unwrap(), "Hello");
}

#[tokio::test]
async fn usage_summary_follows_the_response() {
    let (writer, visible) = FlushRecorder::new();
    let events = futures::stream::iter(vec![
        text("done"),
        Ok(GenerationEvent::Usage(UsageCounters::new(1000, 200))),
    ]);

    let mut runner = GenerationRunner::new(writer);
    let mut tracker = UsageTracker::begin();
    runner.run(events, &mut tracker).await.unwrap();
    let report = UsageReport::new(tracker.counters(), &CostRates::default());
    runner.write_usage_report(&report).await.unwrap();

    assert_eq!(
        *visible.lock().unwrap(),
        "done\n\nTokens: prompt:(1000/0.003000), completion:(200/0.003000), total:(1200/0.006000)\n"
    );
}
