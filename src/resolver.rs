//! Turns a suggestion (or its absence) into a draft, and a draft into a
//! collision-free write plan.
//!
//! Confidence policy:
//! - `high`: accepted as-is
//! - `medium`: the [`Prompter`] is asked to accept, edit manually, or cancel
//! - `low`, failed or disabled AI: manual input
//!
//! A keyword is a duplicate when a snippet with the same keyword exists in the
//! target collection, or anywhere in the library if the collection is new.

use crate::error::{Error, Result};
use crate::library::{ExistingSnippet, SnippetLibrary};
use crate::snippet::{Confidence, SnippetDraft, validate_keyword};
use crate::suggest::{Suggestion, SuggestionFailure};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Metadata typed in by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualMetadata {
    /// Display name
    pub name: String,
    /// Trigger keyword
    pub keyword: String,
    /// Optional description (may be empty)
    pub description: String,
}

/// Answer to a medium-confidence suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionReview {
    /// Use the suggestion
    Accept,
    /// Discard it and enter metadata by hand
    Manual,
    /// Abort the run
    Cancel,
}

/// Answer to a keyword collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionChoice {
    /// Replace the existing snippet
    Overwrite,
    /// Try again with another keyword
    Rename(String),
    /// Abort without writing
    Cancel,
}

/// User interaction needed while resolving a snippet.
///
/// Returning `None` from the `Option` methods cancels the run.
pub trait Prompter {
    /// Picks an existing collection or names a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the user cannot be asked.
    fn choose_collection(&mut self, existing: &[String]) -> Result<Option<String>>;

    /// Asks for name, keyword and description.
    ///
    /// # Errors
    ///
    /// Returns an error if the user cannot be asked.
    fn enter_metadata(&mut self, content: &str, collection: &str)
    -> Result<Option<ManualMetadata>>;

    /// Confirms or rejects a medium-confidence suggestion.
    ///
    /// # Errors
    ///
    /// Returns an error if the user cannot be asked.
    fn review_suggestion(&mut self, suggestion: &Suggestion) -> Result<SuggestionReview>;

    /// Decides what to do when the keyword is already taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the user cannot be asked.
    fn resolve_collision(
        &mut self,
        draft: &SnippetDraft,
        existing: &ExistingSnippet,
    ) -> Result<CollisionChoice>;
}

/// Prompter for batch runs: accepts suggestions, skips duplicates, and never
/// falls back to manual input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

impl Prompter for Unattended {
    fn choose_collection(&mut self, _existing: &[String]) -> Result<Option<String>> {
        Err(Error::prompt("manual input is not available in batch mode"))
    }

    fn enter_metadata(
        &mut self,
        _content: &str,
        _collection: &str,
    ) -> Result<Option<ManualMetadata>> {
        Err(Error::prompt("manual input is not available in batch mode"))
    }

    fn review_suggestion(&mut self, _suggestion: &Suggestion) -> Result<SuggestionReview> {
        Ok(SuggestionReview::Accept)
    }

    fn resolve_collision(
        &mut self,
        _draft: &SnippetDraft,
        _existing: &ExistingSnippet,
    ) -> Result<CollisionChoice> {
        Ok(CollisionChoice::Cancel)
    }
}

/// Why nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cancellation {
    /// The user backed out of a prompt
    User,
    /// The keyword is taken and was not overwritten
    Duplicate {
        /// Conflicting keyword
        keyword: String,
        /// Collection holding the existing snippet
        collection: String,
    },
}

impl fmt::Display for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("cancelled by user"),
            Self::Duplicate {
                keyword,
                collection,
            } => write!(f, "keyword '{keyword}' already exists in {collection}"),
        }
    }
}

/// A draft that is safe to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedWrite {
    /// Snippet metadata and content
    pub draft: SnippetDraft,
    /// Existing file to remove once the new one is written
    pub replaces: Option<PathBuf>,
}

/// Outcome of resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Ready to write
    Ready(PlannedWrite),
    /// Stopped before writing
    Cancelled(Cancellation),
}

/// Collection and duplicate resolver.
pub struct Resolver<'a> {
    library: &'a SnippetLibrary,
    prompter: &'a mut dyn Prompter,
    auto_overwrite: bool,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver. With `auto_overwrite`, duplicates are replaced
    /// without asking.
    pub fn new(
        library: &'a SnippetLibrary,
        prompter: &'a mut dyn Prompter,
        auto_overwrite: bool,
    ) -> Self {
        Self {
            library,
            prompter,
            auto_overwrite,
        }
    }

    /// Resolves metadata and then collisions.
    ///
    /// # Errors
    ///
    /// Returns an error on prompt, validation or folder failures.
    pub fn resolve(
        &mut self,
        content: &str,
        suggestion: std::result::Result<Suggestion, SuggestionFailure>,
    ) -> Result<Resolution> {
        match self.resolve_metadata(content, suggestion)? {
            Some(draft) => self.resolve_collision(draft),
            None => Ok(Resolution::Cancelled(Cancellation::User)),
        }
    }

    /// Applies the confidence policy. `None` means the user cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error on prompt, validation or folder failures.
    pub fn resolve_metadata(
        &mut self,
        content: &str,
        suggestion: std::result::Result<Suggestion, SuggestionFailure>,
    ) -> Result<Option<SnippetDraft>> {
        let suggestion = match suggestion {
            Ok(suggestion) => suggestion,
            Err(SuggestionFailure::Disabled) => {
                info!("AI suggestions disabled, asking for metadata");
                return self.manual_draft(content);
            }
            Err(failure) => {
                warn!("Falling back to manual input: {}", failure);
                return self.manual_draft(content);
            }
        };

        match suggestion.confidence {
            Confidence::High => suggestion.into_draft(content).map(Some),
            Confidence::Medium => match self.prompter.review_suggestion(&suggestion)? {
                SuggestionReview::Accept => suggestion.into_draft(content).map(Some),
                SuggestionReview::Manual => self.manual_draft(content),
                SuggestionReview::Cancel => Ok(None),
            },
            Confidence::Low => {
                info!("Suggestion has low confidence, asking for metadata");
                self.manual_draft(content)
            }
        }
    }

    /// Collects collection, name and keyword from the prompter.
    ///
    /// # Errors
    ///
    /// Returns an error on prompt, validation or folder failures.
    pub fn manual_draft(&mut self, content: &str) -> Result<Option<SnippetDraft>> {
        let collections = self.library.collections()?;

        let Some(collection) = self.prompter.choose_collection(&collections)? else {
            return Ok(None);
        };
        let Some(metadata) = self.prompter.enter_metadata(content, &collection)? else {
            return Ok(None);
        };

        SnippetDraft::new(
            content,
            &collection,
            metadata.name,
            metadata.keyword,
            metadata.description,
        )
        .map(Some)
    }

    /// Checks the keyword against existing snippets until it is free, the user
    /// chooses to overwrite, or the user cancels.
    ///
    /// # Errors
    ///
    /// Returns an error on prompt or folder failures. An invalid new keyword
    /// is rejected and the user is asked again.
    pub fn resolve_collision(&mut self, mut draft: SnippetDraft) -> Result<Resolution> {
        loop {
            let Some(existing) = self.library.find_keyword(&draft.keyword, &draft.collection)?
            else {
                return Ok(Resolution::Ready(PlannedWrite {
                    draft,
                    replaces: None,
                }));
            };

            let choice = if self.auto_overwrite {
                CollisionChoice::Overwrite
            } else {
                self.prompter.resolve_collision(&draft, &existing)?
            };

            match choice {
                CollisionChoice::Overwrite => {
                    info!(
                        "Overwriting '{}' in {}",
                        draft.keyword, existing.collection
                    );
                    return Ok(Resolution::Ready(PlannedWrite {
                        draft,
                        replaces: Some(existing.path),
                    }));
                }
                CollisionChoice::Rename(keyword) => {
                    let keyword = keyword.trim().to_string();
                    if let Err(e) = validate_keyword(&keyword) {
                        warn!("Rejected new keyword: {}", e);
                        continue;
                    }
                    draft.keyword = keyword;
                }
                CollisionChoice::Cancel => {
                    return Ok(Resolution::Cancelled(Cancellation::Duplicate {
                        keyword: draft.keyword,
                        collection: existing.collection,
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Scripted {
        collection: Option<String>,
        metadata: Option<ManualMetadata>,
        review: Option<SuggestionReview>,
        collisions: VecDeque<CollisionChoice>,
        manual_calls: usize,
    }

    impl Prompter for Scripted {
        fn choose_collection(&mut self, _existing: &[String]) -> Result<Option<String>> {
            self.manual_calls += 1;
            Ok(self.collection.clone())
        }

        fn enter_metadata(
            &mut self,
            _content: &str,
            _collection: &str,
        ) -> Result<Option<ManualMetadata>> {
            Ok(self.metadata.clone())
        }

        fn review_suggestion(&mut self, _suggestion: &Suggestion) -> Result<SuggestionReview> {
            Ok(self.review.unwrap_or(SuggestionReview::Cancel))
        }

        fn resolve_collision(
            &mut self,
            _draft: &SnippetDraft,
            _existing: &ExistingSnippet,
        ) -> Result<CollisionChoice> {
            Ok(self
                .collisions
                .pop_front()
                .unwrap_or(CollisionChoice::Cancel))
        }
    }

    fn suggestion(confidence: Confidence) -> Suggestion {
        Suggestion {
            collection: "Git".into(),
            name: "Git: Pretty Log".into(),
            keyword: "git_log5".into(),
            description: String::new(),
            confidence,
        }
    }

    fn manual() -> ManualMetadata {
        ManualMetadata {
            name: "Terminal: List".into(),
            keyword: "term_ls".into(),
            description: "List files".into(),
        }
    }

    fn seed(temp: &assert_fs::TempDir, collection: &str, keyword: &str) {
        temp.child(collection)
            .child(format!("{keyword}_OLD.json"))
            .write_str(
                &serde_json::json!({
                    "alfredsnippet": {
                        "snippet": "old", "name": "Old", "keyword": keyword, "uid": "OLD"
                    }
                })
                .to_string(),
            )
            .unwrap();
    }

    #[test]
    fn test_high_confidence_accepted() {
        let temp = assert_fs::TempDir::new().unwrap();
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Scripted::default();
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let resolution = resolver
            .resolve("git log", Ok(suggestion(Confidence::High)))
            .unwrap();

        match resolution {
            Resolution::Ready(plan) => {
                assert_eq!(plan.draft.collection, "Git");
                assert_eq!(plan.draft.keyword, "git_log5");
                assert!(plan.replaces.is_none());
            }
            other => panic!("unexpected resolution: {other:?}"),
        }
        assert_eq!(prompter.manual_calls, 0);
    }

    #[test]
    fn test_medium_confidence_asks_user() {
        let temp = assert_fs::TempDir::new().unwrap();
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Scripted {
            review: Some(SuggestionReview::Manual),
            collection: Some("Terminal".into()),
            metadata: Some(manual()),
            ..Scripted::default()
        };
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let draft = resolver
            .resolve_metadata("ls -la", Ok(suggestion(Confidence::Medium)))
            .unwrap()
            .unwrap();

        assert_eq!(draft.collection, "Terminal");
        assert_eq!(draft.keyword, "term_ls");
    }

    #[test]
    fn test_medium_confidence_cancel() {
        let temp = assert_fs::TempDir::new().unwrap();
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Scripted {
            review: Some(SuggestionReview::Cancel),
            ..Scripted::default()
        };
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let resolution = resolver
            .resolve("x", Ok(suggestion(Confidence::Medium)))
            .unwrap();
        assert_eq!(resolution, Resolution::Cancelled(Cancellation::User));
    }

    #[test]
    fn test_low_confidence_goes_manual() {
        let temp = assert_fs::TempDir::new().unwrap();
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Scripted {
            collection: Some("Terminal".into()),
            metadata: Some(manual()),
            ..Scripted::default()
        };
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let draft = resolver
            .resolve_metadata("ls", Ok(suggestion(Confidence::Low)))
            .unwrap()
            .unwrap();

        assert_eq!(draft.name, "Terminal: List");
        assert_eq!(prompter.manual_calls, 1);
    }

    #[test]
    fn test_failure_goes_manual() {
        let temp = assert_fs::TempDir::new().unwrap();
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Scripted {
            collection: Some("Terminal".into()),
            metadata: Some(manual()),
            ..Scripted::default()
        };
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let failure = SuggestionFailure::Exhausted {
            attempts: 3,
            last_error: "timeout".into(),
        };
        let draft = resolver.resolve_metadata("ls", Err(failure)).unwrap();

        assert!(draft.is_some());
        assert_eq!(prompter.manual_calls, 1);
    }

    #[test]
    fn test_manual_cancel() {
        let temp = assert_fs::TempDir::new().unwrap();
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Scripted::default();
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let resolution = resolver
            .resolve("ls", Err(SuggestionFailure::Disabled))
            .unwrap();
        assert_eq!(resolution, Resolution::Cancelled(Cancellation::User));
    }

    #[test]
    fn test_manual_invalid_keyword_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Scripted {
            collection: Some("Terminal".into()),
            metadata: Some(ManualMetadata {
                keyword: "has space".into(),
                ..manual()
            }),
            ..Scripted::default()
        };
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let err = resolver
            .resolve_metadata("ls", Err(SuggestionFailure::Disabled))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_collision_cancel() {
        let temp = assert_fs::TempDir::new().unwrap();
        seed(&temp, "Git", "git_log5");
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Scripted::default();
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let draft = suggestion(Confidence::High).into_draft("git log").unwrap();
        let resolution = resolver.resolve_collision(draft).unwrap();

        assert_eq!(
            resolution,
            Resolution::Cancelled(Cancellation::Duplicate {
                keyword: "git_log5".into(),
                collection: "Git".into(),
            })
        );
    }

    #[test]
    fn test_collision_overwrite() {
        let temp = assert_fs::TempDir::new().unwrap();
        seed(&temp, "Git", "git_log5");
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Scripted {
            collisions: VecDeque::from([CollisionChoice::Overwrite]),
            ..Scripted::default()
        };
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let draft = suggestion(Confidence::High).into_draft("git log").unwrap();
        let Resolution::Ready(plan) = resolver.resolve_collision(draft).unwrap() else {
            panic!("expected a write plan");
        };

        assert_eq!(
            plan.replaces,
            Some(temp.path().join("Git").join("git_log5_OLD.json"))
        );
    }

    #[test]
    fn test_collision_rename_rechecks() {
        let temp = assert_fs::TempDir::new().unwrap();
        seed(&temp, "Git", "git_log5");
        seed(&temp, "Git", "git_log6");
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Scripted {
            collisions: VecDeque::from([
                CollisionChoice::Rename("git_log6".into()),
                CollisionChoice::Rename("git_log7".into()),
            ]),
            ..Scripted::default()
        };
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let draft = suggestion(Confidence::High).into_draft("git log").unwrap();
        let Resolution::Ready(plan) = resolver.resolve_collision(draft).unwrap() else {
            panic!("expected a write plan");
        };

        assert_eq!(plan.draft.keyword, "git_log7");
        assert!(plan.replaces.is_none());
    }

    #[test]
    fn test_invalid_rename_prompts_again() {
        let temp = assert_fs::TempDir::new().unwrap();
        seed(&temp, "Git", "git_log5");
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Scripted {
            collisions: VecDeque::from([
                CollisionChoice::Rename("bad key".into()),
                CollisionChoice::Rename("git_log7".into()),
            ]),
            ..Scripted::default()
        };
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let draft = suggestion(Confidence::High).into_draft("git log").unwrap();
        let Resolution::Ready(plan) = resolver.resolve_collision(draft).unwrap() else {
            panic!("expected a write plan");
        };

        assert_eq!(plan.draft.keyword, "git_log7");
        assert!(plan.replaces.is_none());
        assert!(prompter.collisions.is_empty());
    }

    #[test]
    fn test_auto_overwrite_skips_prompt() {
        let temp = assert_fs::TempDir::new().unwrap();
        seed(&temp, "Git", "git_log5");
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Unattended;
        let mut resolver = Resolver::new(&library, &mut prompter, true);

        let draft = suggestion(Confidence::High).into_draft("git log").unwrap();
        let resolution = resolver.resolve_collision(draft).unwrap();

        assert!(matches!(resolution, Resolution::Ready(PlannedWrite { replaces: Some(_), .. })));
    }

    #[test]
    fn test_cancellation_display() {
        let duplicate = Cancellation::Duplicate {
            keyword: "git_log5".into(),
            collection: "Git".into(),
        };

        assert_eq!(
            duplicate.to_string(),
            "keyword 'git_log5' already exists in Git"
        );
        assert_eq!(Cancellation::User.to_string(), "cancelled by user");
    }

    #[test]
    fn test_unattended_never_prompts_for_manual_input() {
        let temp = assert_fs::TempDir::new().unwrap();
        let library = SnippetLibrary::new(temp.path());
        let mut prompter = Unattended;
        let mut resolver = Resolver::new(&library, &mut prompter, false);

        let result = resolver.resolve_metadata("x", Err(SuggestionFailure::Disabled));
        assert!(result.is_err());
    }
}
