// Events module
// Progress/log stream emitted by the pipeline toward whatever presentation
// layer is attached. The core never depends on a UI toolkit; consumers
// subscribe through the EventSink trait.

use log::{info, warn};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Audio,
    Sentences,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Audio => "audio",
            Phase::Sentences => "sentences",
        }
    }
}

/// Events streamed while the pipeline runs. Completion order within the audio
/// phase follows the workers, not the input list.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    PhaseStarted { phase: Phase, total: usize },
    WordStarted { phase: Phase, word: String },
    WordSucceeded { phase: Phase, word: String },
    WordFailed { phase: Phase, word: String, reason: String },
    Progress { phase: Phase, done: usize, total: usize },
    Log { message: String },
    PhaseFinished { phase: Phase },
}

/// Subscriber interface for pipeline events. Implementations must be cheap;
/// events are emitted synchronously from the workers.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Sink that renders events through the log facade.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::PhaseStarted { phase, total } => {
                info!("phase {} started ({} words)", phase.as_str(), total)
            }
            PipelineEvent::WordStarted { phase, word } => {
                info!("[{}] processing '{}'", phase.as_str(), word)
            }
            PipelineEvent::WordSucceeded { phase, word } => {
                info!("[{}] '{}' succeeded", phase.as_str(), word)
            }
            PipelineEvent::WordFailed { phase, word, reason } => {
                warn!("[{}] '{}' failed: {}", phase.as_str(), word, reason)
            }
            PipelineEvent::Progress { phase, done, total } => {
                info!("[{}] {}/{}", phase.as_str(), done, total)
            }
            PipelineEvent::Log { message } => info!("{}", message),
            PipelineEvent::PhaseFinished { phase } => {
                info!("phase {} finished", phase.as_str())
            }
        }
    }
}

/// Sink that forwards events into an unbounded channel, for callers that
/// consume progress asynchronously.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: PipelineEvent) {
        // A dropped receiver only means nobody is listening anymore
        if self.tx.send(event).is_err() {
            warn!("event receiver dropped, progress no longer delivered");
        }
    }
}
