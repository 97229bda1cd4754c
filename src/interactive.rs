use crate::error::Result;
use crate::library::ExistingSnippet;
use crate::resolver::{CollisionChoice, ManualMetadata, Prompter, SuggestionReview};
use crate::snippet::{
    SnippetDraft, is_conventional_keyword, is_title_case, preview, validate_keyword,
};
use crate::suggest::Suggestion;
use dialoguer::{Input, Select, theme::ColorfulTheme};
use tracing::warn;

const NEW_COLLECTION: &str = "+ New collection...";
const PREVIEW_CHARS: usize = 60;

/// Terminal prompts backed by `dialoguer`. Escape cancels a selection.
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    /// Creates a prompter with the colorful theme.
    #[must_use]
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    fn keyword_input(&self, prompt: &str, initial: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .validate_with(|value: &String| -> std::result::Result<(), String> {
                validate_keyword(value.trim()).map_err(|e| e.to_string())
            });
        if let Some(initial) = initial {
            input = input.with_initial_text(initial);
        }

        let keyword = input.interact_text()?.trim().to_string();
        if !is_conventional_keyword(&keyword) {
            warn!("Keyword '{}' does not follow the lowercase prefix_action style", keyword);
        }
        Ok(keyword)
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn choose_collection(&mut self, existing: &[String]) -> Result<Option<String>> {
        let mut items: Vec<&str> = existing.iter().map(String::as_str).collect();
        items.push(NEW_COLLECTION);

        let Some(index) = Select::with_theme(&self.theme)
            .with_prompt("Collection")
            .items(&items)
            .default(0)
            .interact_opt()?
        else {
            return Ok(None);
        };

        if let Some(name) = existing.get(index) {
            return Ok(Some(name.clone()));
        }

        let name: String = Input::with_theme(&self.theme)
            .with_prompt("New collection name")
            .validate_with(|value: &String| -> std::result::Result<(), &str> {
                if value.trim().is_empty() {
                    Err("name must not be empty")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;
        Ok(Some(name.trim().to_string()))
    }

    fn enter_metadata(
        &mut self,
        content: &str,
        collection: &str,
    ) -> Result<Option<ManualMetadata>> {
        eprintln!("Snippet: {}", preview(content, PREVIEW_CHARS));
        eprintln!("Collection: {collection}");

        let name: String = Input::with_theme(&self.theme)
            .with_prompt("Name")
            .validate_with(|value: &String| -> std::result::Result<(), &str> {
                if value.trim().is_empty() {
                    Err("name must not be empty")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;
        let name = name.trim().to_string();
        if !is_title_case(&name) {
            warn!("Name '{}' is not in Title Case", name);
        }

        let keyword = self.keyword_input("Keyword", None)?;

        let description: String = Input::with_theme(&self.theme)
            .with_prompt("Description (optional)")
            .allow_empty(true)
            .interact_text()?;

        Ok(Some(ManualMetadata {
            name,
            keyword,
            description: description.trim().to_string(),
        }))
    }

    fn review_suggestion(&mut self, suggestion: &Suggestion) -> Result<SuggestionReview> {
        eprintln!("Suggested ({} confidence):", suggestion.confidence);
        eprintln!("  Collection: {}", suggestion.collection);
        eprintln!("  Name:       {}", suggestion.name);
        eprintln!("  Keyword:    {}", suggestion.keyword);
        if !suggestion.description.is_empty() {
            eprintln!("  About:      {}", suggestion.description);
        }

        let choice = Select::with_theme(&self.theme)
            .with_prompt("Use this suggestion?")
            .items(&["Accept", "Enter manually", "Cancel"])
            .default(0)
            .interact_opt()?;

        Ok(match choice {
            Some(0) => SuggestionReview::Accept,
            Some(1) => SuggestionReview::Manual,
            _ => SuggestionReview::Cancel,
        })
    }

    fn resolve_collision(
        &mut self,
        draft: &SnippetDraft,
        existing: &ExistingSnippet,
    ) -> Result<CollisionChoice> {
        eprintln!(
            "Keyword '{}' is already used by '{}' in {}",
            draft.keyword, existing.record.name, existing.collection
        );

        let choice = Select::with_theme(&self.theme)
            .with_prompt("What now?")
            .items(&["Overwrite existing", "Choose another keyword", "Cancel"])
            .default(1)
            .interact_opt()?;

        match choice {
            Some(0) => Ok(CollisionChoice::Overwrite),
            Some(1) => {
                let keyword = self.keyword_input("New keyword", Some(&draft.keyword))?;
                Ok(CollisionChoice::Rename(keyword))
            }
            _ => Ok(CollisionChoice::Cancel),
        }
    }
}
