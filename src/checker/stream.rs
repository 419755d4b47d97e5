//! Hand-off from the worker pool to the single consumer of a pass.
//!
//! Workers hold clones of a [`ResultSink`]; the pool sends exactly one
//! [`StreamEvent::EndOfStream`] once every worker has finished.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ResultMessage {
    pub url: String,
    pub text: String,
    pub produced_at: DateTime<Utc>,
    /// Worker that produced the result; `None` for results decided before dispatch.
    pub worker: Option<usize>,
}

#[derive(Debug)]
pub enum StreamEvent {
    Result(ResultMessage),
    EndOfStream,
}

pub fn channel() -> (ResultSink, ResultStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ResultSink { tx },
        ResultStream {
            rx,
            ended: false,
            received: 0,
        },
    )
}

#[derive(Clone)]
pub struct ResultSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ResultSink {
    pub fn emit(&self, url: &str, text: impl Into<String>, worker: Option<usize>) {
        let message = ResultMessage {
            url: url.to_string(),
            text: text.into(),
            produced_at: Utc::now(),
            worker,
        };
        if self.tx.send(StreamEvent::Result(message)).is_err() {
            debug!(url, "Result consumer is gone, dropping result");
        }
    }

    /// Signal that no more results follow.
    pub fn end(self) {
        let _ = self.tx.send(StreamEvent::EndOfStream);
    }
}

pub struct ResultStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    ended: bool,
    received: usize,
}

impl ResultStream {
    /// Next result in completion order, `None` once the stream is over.
    pub async fn next(&mut self) -> Option<ResultMessage> {
        if self.ended {
            return None;
        }

        match self.rx.recv().await {
            Some(StreamEvent::Result(message)) => {
                self.received += 1;
                Some(message)
            }
            Some(StreamEvent::EndOfStream) => {
                self.ended = true;
                None
            }
            None => {
                warn!(
                    received = self.received,
                    "Result stream closed without end-of-stream marker"
                );
                None
            }
        }
    }

    pub fn ended_cleanly(&self) -> bool {
        self.ended
    }

    pub fn received(&self) -> usize {
        self.received
    }
}
