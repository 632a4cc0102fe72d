//! Labeled line output.
//!
//! Every supervised task writes whole lines through an [`OutputHandle`];
//! lines from all tasks are multiplexed through one channel into a single
//! [`LineSink`], so individual lines are never interleaved mid-line across
//! tasks.

use std::sync::Arc;

use tokio::sync::mpsc;

/// One complete output line from one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub prefix: String,
    pub line: String,
}

/// Terminal end of the output pipeline. Implementations must treat each call
/// as one complete line.
pub trait LineSink: Send + Sync {
    fn write_line(&self, prefix: &str, line: &str);
}

/// Per-task writer with a stable prefix.
#[derive(Debug, Clone)]
pub struct OutputHandle {
    prefix: String,
    tx: mpsc::Sender<OutputLine>,
}

impl OutputHandle {
    pub fn new(prefix: impl Into<String>, tx: mpsc::Sender<OutputLine>) -> Self {
        Self {
            prefix: prefix.into(),
            tx,
        }
    }

    /// Write one line. Dropped silently if the sink has already shut down —
    /// a task racing shutdown must not error on its final log line.
    pub async fn write_line(&self, line: impl Into<String>) {
        let _ = self
            .tx
            .send(OutputLine {
                prefix: self.prefix.clone(),
                line: line.into(),
            })
            .await;
    }
}

/// Drain multiplexed lines into the sink until every sender is gone.
pub(crate) async fn drain_lines(mut rx: mpsc::Receiver<OutputLine>, sink: Arc<dyn LineSink>) {
    while let Some(line) = rx.recv().await {
        sink.write_line(&line.prefix, &line.line);
    }
}
