//! # snipgen
//!
//! Creates Alfred snippet files from the clipboard, a text argument, or a
//! batch JSON file, with metadata suggested by an LLM.
//!
//! ## Features
//!
//! - Collection, name and keyword suggestions from the Anthropic Messages API
//! - Bounded retries with exponential backoff, then manual fallback
//! - Duplicate keyword detection with overwrite, rename or cancel
//! - Atomic writes in the `{"alfredsnippet": {...}}` format Alfred reads
//! - Unattended batch mode with a JSON report
//!
//! ## Quick Start
//!
//! ```no_run
//! use snipgen::{Config, NoSuggestions, Pipeline, TerminalPrompter};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .snippets_root("~/Alfred/snippets")
//!     .build()?;
//!
//! let outcome = Pipeline::new(&config, &NoSuggestions)
//!     .run("git log --oneline --graph", &mut TerminalPrompter::new())?;
//! outcome.print_summary();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! A single run flows through:
//! 1. **Content**: argument text or the clipboard
//! 2. **Suggest**: metadata from the LLM, validated
//! 3. **Resolve**: confidence policy, manual input, keyword collisions
//! 4. **Write**: the snippet file, atomically
//! 5. **Notify**: a desktop notification with the outcome

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod batch;
mod config;
mod content;
mod error;
mod interactive;
mod library;
mod notify;
mod pipeline;
mod resolver;
mod snippet;
mod suggest;
mod template;
mod writer;

pub use batch::{BatchDriver, BatchSummary, FailedItem, SkippedItem, load_batch};
pub use config::{Config, ConfigBuilder};
pub use content::{ClipboardSource, SystemClipboard, resolve_content};
pub use error::{Error, Result};
pub use interactive::TerminalPrompter;
pub use library::{ExistingSnippet, SnippetLibrary};
pub use notify::{DesktopNotifier, Notice, Notifier};
pub use pipeline::{Pipeline, RunOutcome};
pub use resolver::{
    Cancellation, CollisionChoice, ManualMetadata, PlannedWrite, Prompter, Resolution, Resolver,
    SuggestionReview, Unattended,
};
pub use snippet::{
    Confidence, SnippetDescriptor, SnippetDraft, SnippetFile, SnippetRecord, WRAPPER_KEY,
    filename_keyword, is_conventional_keyword, is_title_case, sanitize_collection_name,
    validate_keyword,
};
pub use suggest::{
    ApiRequest, ApiResponse, HttpTransport, NoSuggestions, Suggest, Suggestion, SuggestionClient,
    SuggestionFailure, Transport, TransportError,
};
pub use writer::{SnippetWriter, WrittenSnippet};

/// Picks the suggester for a configuration: the HTTP client when AI is
/// enabled and a key is set, otherwise [`NoSuggestions`].
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn suggester_for(config: &Config) -> Result<Box<dyn Suggest>> {
    if config.ai_enabled() {
        Ok(Box::new(SuggestionClient::from_config(config)?))
    } else {
        Ok(Box::new(NoSuggestions))
    }
}
