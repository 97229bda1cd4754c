//! Batch mode: many snippets from one JSON file, without prompts.
//!
//! The input file looks like:
//!
//! ```json
//! { "snippets": [ { "content": "git status", "suggested_keyword": "git_st" } ] }
//! ```
//!
//! Entries are handled one at a time in file order. A bad entry fails only
//! itself. Duplicate keywords are skipped unless overwriting is enabled.

use crate::{
    config::Config,
    error::{Error, Result},
    library::SnippetLibrary,
    resolver::{Cancellation, Resolution, Resolver, Unattended},
    snippet::{Confidence, SnippetDescriptor, SnippetDraft, preview},
    suggest::Suggest,
    writer::{SnippetWriter, WrittenSnippet},
};
use serde::Serialize;
use serde_json::Value;
use std::{
    fs,
    path::Path,
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};

const PREVIEW_CHARS: usize = 50;

/// Reads a batch file and returns its raw entries.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read, and
/// [`Error::MalformedBatch`] if it is not an object with a non-empty
/// `snippets` array.
pub fn load_batch(path: &Path) -> Result<Vec<Value>> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

    let root: Value =
        serde_json::from_str(&text).map_err(|e| Error::malformed_batch(path, e.to_string()))?;

    let Some(entries) = root.get("snippets") else {
        return Err(Error::malformed_batch(path, "missing 'snippets' array"));
    };
    let Some(entries) = entries.as_array() else {
        return Err(Error::malformed_batch(path, "'snippets' must be an array"));
    };
    if entries.is_empty() {
        return Err(Error::malformed_batch(path, "'snippets' array is empty"));
    }

    debug!("Loaded {} batch entries from {}", entries.len(), path.display());
    Ok(entries.clone())
}

/// An entry left alone because its keyword is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    /// 1-based position in the batch file
    pub index: usize,
    /// Keyword already in use
    pub keyword: String,
    /// Collection holding the existing snippet
    pub collection: String,
}

/// An entry that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// 1-based position in the batch file
    pub index: usize,
    /// Short content preview
    pub preview: String,
    /// Error message
    pub message: String,
}

/// Results of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    /// Number of entries in the file
    pub total: usize,

    /// Snippets written
    pub created: Vec<WrittenSnippet>,

    /// Duplicates left alone
    pub skipped: Vec<SkippedItem>,

    /// Entries that failed
    pub failed: Vec<FailedItem>,

    /// 1-based positions of created entries whose metadata is low confidence
    pub low_confidence: Vec<usize>,

    /// True if processing stopped at the first failure
    pub stopped_early: bool,

    /// Wall time of the run
    #[serde(skip)]
    pub duration: Duration,
}

#[derive(Serialize)]
struct BatchReport<'a> {
    generated_at: String,
    duration_secs: f64,
    #[serde(flatten)]
    summary: &'a BatchSummary,
}

impl BatchSummary {
    /// Returns true if any entry failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║                 Batch Summary                         ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Entries:              {:>8}                        ║",
            self.total
        );
        println!(
            "║ Created:              {:>8}                        ║",
            self.created.len()
        );
        println!(
            "║ Skipped (duplicates): {:>8}                        ║",
            self.skipped.len()
        );
        println!(
            "║ Failed:               {:>8}                        ║",
            self.failed.len()
        );
        println!(
            "║ Duration:             {:>8.2}s                       ║",
            self.duration.as_secs_f64()
        );
        if self.stopped_early {
            println!("║                                                       ║");
            println!("║ ⚠ Stopped at the first failure                        ║");
        }
        println!("╚═══════════════════════════════════════════════════════╝");

        for snippet in &self.created {
            println!(
                "  ✓ {} ({}) in {}",
                snippet.name, snippet.keyword, snippet.collection
            );
        }
        for item in &self.skipped {
            println!(
                "  - #{} skipped: '{}' already exists in {}",
                item.index, item.keyword, item.collection
            );
        }
        for item in &self.failed {
            println!("  ✗ #{} \"{}\": {}", item.index, item.preview, item.message);
        }
        if !self.low_confidence.is_empty() {
            let positions: Vec<_> = self
                .low_confidence
                .iter()
                .map(|index| format!("#{index}"))
                .collect();
            println!("  ! Low confidence, worth a review: {}", positions.join(", "));
        }
        println!();
    }

    /// Writes the summary as pretty JSON with a timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the report file cannot be written.
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let report = BatchReport {
            generated_at: chrono::Local::now()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            duration_secs: self.duration.as_secs_f64(),
            summary: self,
        };

        let file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
        serde_json::to_writer_pretty(file, &report).map_err(Error::from)?;

        info!("Wrote batch report to {}", path.display());
        Ok(())
    }
}

enum ItemOutcome {
    Created {
        written: WrittenSnippet,
        confidence: Option<Confidence>,
    },
    Skipped { keyword: String, collection: String },
}

/// Processes batch entries against one snippets root.
pub struct BatchDriver<'a> {
    library: SnippetLibrary,
    writer: SnippetWriter,
    suggester: &'a dyn Suggest,
    overwrite: bool,
    stop_on_error: bool,
}

impl<'a> BatchDriver<'a> {
    /// Creates a driver from configuration.
    #[must_use]
    pub fn new(config: &Config, suggester: &'a dyn Suggest) -> Self {
        Self {
            library: SnippetLibrary::new(&config.snippets_root),
            writer: SnippetWriter::new(&config.snippets_root, config.create_root),
            suggester,
            overwrite: config.overwrite,
            stop_on_error: config.stop_on_error,
        }
    }

    /// Processes every entry and collects the results.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub fn run(&self, entries: &[Value]) -> BatchSummary {
        let start = Instant::now();
        let mut summary = BatchSummary {
            total: entries.len(),
            ..BatchSummary::default()
        };

        for (position, entry) in entries.iter().enumerate() {
            let index = position + 1;
            match self.process(entry) {
                Ok(ItemOutcome::Created {
                    written,
                    confidence,
                }) => {
                    info!("✓ #{} created '{}'", index, written.keyword);
                    if confidence == Some(Confidence::Low) {
                        summary.low_confidence.push(index);
                    }
                    summary.created.push(written);
                }
                Ok(ItemOutcome::Skipped {
                    keyword,
                    collection,
                }) => {
                    info!("#{} skipped: '{}' exists in {}", index, keyword, collection);
                    summary.skipped.push(SkippedItem {
                        index,
                        keyword,
                        collection,
                    });
                }
                Err(e) => {
                    warn!("✗ #{} failed: {}", index, e);
                    summary.failed.push(FailedItem {
                        index,
                        preview: entry_preview(entry),
                        message: e.to_string(),
                    });
                    if self.stop_on_error {
                        summary.stopped_early = index < entries.len();
                        break;
                    }
                }
            }
        }

        summary.duration = start.elapsed();
        info!(
            "Batch done: {} created, {} skipped, {} failed",
            summary.created.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
        summary
    }

    fn process(&self, entry: &Value) -> Result<ItemOutcome> {
        let descriptor = SnippetDescriptor::from_value(entry)?;
        debug!("Processing \"{}\"", descriptor.preview());

        let (draft, confidence) = self.draft_for(descriptor)?;

        let mut prompter = Unattended;
        let mut resolver = Resolver::new(&self.library, &mut prompter, self.overwrite);

        match resolver.resolve_collision(draft)? {
            Resolution::Ready(plan) => {
                let written = self.writer.write(&plan)?;
                Ok(ItemOutcome::Created {
                    written,
                    confidence,
                })
            }
            Resolution::Cancelled(Cancellation::Duplicate {
                keyword,
                collection,
            }) => Ok(ItemOutcome::Skipped {
                keyword,
                collection,
            }),
            Resolution::Cancelled(Cancellation::User) => {
                Err(Error::prompt("entry was cancelled"))
            }
        }
    }

    /// Uses supplied metadata as-is, and asks the suggester only for what is
    /// missing. Supplied values win over suggested ones, confidence included.
    ///
    /// Returns the draft with its confidence. A complete entry without a
    /// `confidence` field has none.
    fn draft_for(
        &self,
        descriptor: SnippetDescriptor,
    ) -> Result<(SnippetDraft, Option<Confidence>)> {
        if descriptor.is_complete() {
            if descriptor.confidence == Some(Confidence::Low) {
                warn!("Entry \"{}\" is marked low confidence", descriptor.preview());
            }
            let SnippetDescriptor {
                content,
                suggested_collection,
                suggested_name,
                suggested_keyword,
                description,
                confidence,
            } = descriptor;
            let draft = SnippetDraft::new(
                content,
                suggested_collection.as_deref().unwrap_or_default(),
                suggested_name.unwrap_or_default(),
                suggested_keyword.unwrap_or_default(),
                description.unwrap_or_default(),
            )?;
            return Ok((draft, confidence));
        }

        let collections = self.library.collections()?;
        let suggestion = self.suggester.suggest(&descriptor.content, &collections)?;
        let confidence = descriptor.confidence.unwrap_or(suggestion.confidence);
        if confidence == Confidence::Low {
            warn!(
                "Low confidence metadata for \"{}\", using it anyway",
                descriptor.preview()
            );
        }

        let collection = descriptor
            .suggested_collection
            .unwrap_or(suggestion.collection);

        let draft = SnippetDraft::new(
            descriptor.content,
            &collection,
            descriptor.suggested_name.unwrap_or(suggestion.name),
            descriptor.suggested_keyword.unwrap_or(suggestion.keyword),
            descriptor.description.unwrap_or(suggestion.description),
        )?;
        Ok((draft, Some(confidence)))
    }
}

fn entry_preview(entry: &Value) -> String {
    entry
        .get("content")
        .or_else(|| entry.get("snippet"))
        .and_then(Value::as_str)
        .map(|content| preview(content, PREVIEW_CHARS))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggest::{NoSuggestions, Suggestion, SuggestionFailure};
    use assert_fs::prelude::*;
    use serde_json::json;
    use std::cell::Cell;

    struct Fixed {
        calls: Cell<usize>,
    }

    impl Fixed {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
            }
        }
    }

    impl Suggest for Fixed {
        fn suggest(
            &self,
            _content: &str,
            _existing: &[String],
        ) -> std::result::Result<Suggestion, SuggestionFailure> {
            self.calls.set(self.calls.get() + 1);
            Ok(Suggestion {
                collection: "Terminal".into(),
                name: "Terminal: Suggested".into(),
                keyword: format!("term_s{}", self.calls.get()),
                description: "Suggested".into(),
                confidence: Confidence::High,
            })
        }
    }

    fn config(root: &Path) -> Config {
        Config::builder().snippets_root(root).build().unwrap()
    }

    fn json_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(std::result::Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_load_batch() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("batch.json");
        file.write_str(r#"{"snippets": [{"content": "ls"}, {"content": "pwd"}]}"#)
            .unwrap();

        let entries = load_batch(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_load_batch_rejects_bad_shapes() {
        let temp = assert_fs::TempDir::new().unwrap();
        for (name, text) in [
            ("invalid.json", "{ not json"),
            ("missing.json", r#"{"items": []}"#),
            ("object.json", r#"{"snippets": {}}"#),
            ("empty.json", r#"{"snippets": []}"#),
        ] {
            let file = temp.child(name);
            file.write_str(text).unwrap();

            let err = load_batch(file.path()).unwrap_err();
            assert!(
                matches!(err, Error::MalformedBatch { .. }),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn test_complete_entries_skip_ai() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = config(temp.path());
        let suggester = Fixed::new();
        let driver = BatchDriver::new(&config, &suggester);

        let summary = driver.run(&[json!({
            "content": "git status",
            "suggested_collection": "Git",
            "suggested_name": "Git: Status",
            "suggested_keyword": "git_st"
        })]);

        assert_eq!(summary.created.len(), 1);
        assert_eq!(summary.created[0].keyword, "git_st");
        assert_eq!(suggester.calls.get(), 0);
    }

    #[test]
    fn test_partial_entries_keep_supplied_fields() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = config(temp.path());
        let suggester = Fixed::new();
        let driver = BatchDriver::new(&config, &suggester);

        let summary = driver.run(&[json!({
            "content": "ls -la",
            "suggested_keyword": "term_ll"
        })]);

        let created = &summary.created[0];
        assert_eq!(created.keyword, "term_ll");
        assert_eq!(created.collection, "Terminal");
        assert_eq!(created.name, "Terminal: Suggested");
        assert_eq!(suggester.calls.get(), 1);
    }

    #[test]
    fn test_low_confidence_entries_flagged() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = config(temp.path());
        let suggester = Fixed::new();
        let driver = BatchDriver::new(&config, &suggester);

        let summary = driver.run(&[
            json!({
                "content": "git status",
                "suggested_collection": "Git",
                "suggested_name": "Git: Status",
                "suggested_keyword": "git_st",
                "confidence": "low"
            }),
            json!({
                "content": "git diff",
                "suggested_collection": "Git",
                "suggested_name": "Git: Diff",
                "suggested_keyword": "git_df"
            }),
            json!({ "content": "ls -la", "confidence": "low" }),
            json!({ "content": "pwd" }),
        ]);

        assert_eq!(summary.created.len(), 4);
        assert_eq!(summary.low_confidence, vec![1, 3]);
        assert_eq!(suggester.calls.get(), 2);
    }

    #[test]
    fn test_supplied_confidence_wins_over_suggestion() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = config(temp.path());
        let suggester = Fixed::new();
        let driver = BatchDriver::new(&config, &suggester);

        let descriptor = SnippetDescriptor::from_value(&json!({
            "content": "ls -la",
            "confidence": "medium"
        }))
        .unwrap();
        let (draft, confidence) = driver.draft_for(descriptor).unwrap();

        assert_eq!(draft.collection, "Terminal");
        assert_eq!(confidence, Some(Confidence::Medium));
    }

    #[test]
    fn test_malformed_entries_fail_individually() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = config(temp.path());
        let suggester = Fixed::new();
        let driver = BatchDriver::new(&config, &suggester);

        let summary = driver.run(&[
            json!({"content": "echo one"}),
            json!({"content": ""}),
            json!({"suggested_name": "No Content"}),
            json!({"content": "echo two", "suggested_keyword": 5}),
            json!({"content": "echo three"}),
        ]);

        assert_eq!(summary.total, 5);
        assert_eq!(summary.created.len(), 2);
        assert_eq!(summary.failed.len(), 3);
        assert_eq!(
            summary.failed.iter().map(|f| f.index).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert_eq!(json_files(&temp.path().join("Terminal")), 2);
    }

    #[test]
    fn test_duplicates_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = config(temp.path());
        let driver = BatchDriver::new(&config, &NoSuggestions);
        let entry = json!({
            "content": "git status",
            "suggested_collection": "Git",
            "suggested_name": "Git: Status",
            "suggested_keyword": "git_st"
        });

        let summary = driver.run(&[entry.clone(), entry]);

        assert_eq!(summary.created.len(), 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].index, 2);
        assert!(!summary.has_failures());
        assert_eq!(json_files(&temp.path().join("Git")), 1);
    }

    #[test]
    fn test_duplicates_overwritten_when_enabled() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder()
            .snippets_root(temp.path())
            .overwrite(true)
            .build()
            .unwrap();
        let driver = BatchDriver::new(&config, &NoSuggestions);
        let entry = json!({
            "content": "git status",
            "suggested_collection": "Git",
            "suggested_name": "Git: Status",
            "suggested_keyword": "git_st"
        });

        let summary = driver.run(&[entry.clone(), entry]);

        assert_eq!(summary.created.len(), 2);
        assert_ne!(summary.created[0].uid, summary.created[1].uid);
        assert_eq!(json_files(&temp.path().join("Git")), 1);
    }

    #[test]
    fn test_disabled_ai_fails_incomplete_entries() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = config(temp.path());
        let driver = BatchDriver::new(&config, &NoSuggestions);

        let summary = driver.run(&[json!({"content": "ls"})]);

        assert!(summary.has_failures());
        assert!(summary.failed[0].message.contains("disabled"));
        assert_eq!(summary.failed[0].preview, "ls");
    }

    #[test]
    fn test_stop_on_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder()
            .snippets_root(temp.path())
            .stop_on_error(true)
            .build()
            .unwrap();
        let suggester = Fixed::new();
        let driver = BatchDriver::new(&config, &suggester);

        let summary = driver.run(&[
            json!({"content": ""}),
            json!({"content": "echo two"}),
        ]);

        assert_eq!(summary.failed.len(), 1);
        assert!(summary.created.is_empty());
        assert!(summary.stopped_early);
    }

    #[test]
    fn test_write_report() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = config(temp.path());
        let driver = BatchDriver::new(&config, &NoSuggestions);
        let summary = driver.run(&[json!({"content": "ls"})]);

        let report = temp.child("report.json");
        summary.write_report(report.path()).unwrap();

        let value: Value = serde_json::from_str(&fs::read_to_string(report.path()).unwrap()).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["failed"][0]["index"], 1);
        assert_eq!(value["low_confidence"], json!([]));
        assert!(value["generated_at"].is_string());
    }
}
