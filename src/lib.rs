//! ordlyd - Danish pronunciation downloader and Anki card builder.
//!
//! Two-phase pipeline over a user-supplied word list: first download and
//! validate a pronunciation audio file for every word from the ordnet.dk
//! dictionary, then (optionally) generate CEFR-leveled example sentences
//! with grammar metadata through a chat-completion endpoint and flatten the
//! results into an Anki-importable CSV.
//!
//! The presentation layer (the CLI binary, or anything else) drives
//! [`pipeline::PipelineController`] and subscribes to progress through
//! [`events::EventSink`]; the core has no dependency on any UI.

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;

#[cfg(test)]
mod testutil;

pub use config::{CefrLevel, PipelineConfig, SentenceScope};
pub use events::{EventSink, LogSink, PipelineEvent};
pub use models::RunReport;
pub use pipeline::PipelineController;
