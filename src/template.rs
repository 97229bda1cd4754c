use crate::suggest::SuggestionFailure;
use serde::Serialize;
use tera::{Context, Tera};

const SUGGEST_TEMPLATE: &str = "suggest";
const MAX_CONTENT_CHARS: usize = 8_000;

#[derive(Serialize)]
struct PromptContext<'a> {
    content: &'a str,
    collections: &'a [String],
    max_content_chars: usize,
}

/// Renders the metadata request sent to the suggestion service.
pub(crate) struct PromptTemplate {
    tera: Tera,
}

impl PromptTemplate {
    /// Creates the template engine with the built-in prompt registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in template fails to parse.
    pub(crate) fn new() -> Result<Self, SuggestionFailure> {
        let mut tera = Tera::default();

        tera.add_raw_template(SUGGEST_TEMPLATE, include_str!("../templates/suggest.tera"))
            .map_err(|e| SuggestionFailure::prompt(&e))?;

        Ok(Self { tera })
    }

    /// Renders the prompt for one piece of content.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub(crate) fn render(
        &self,
        content: &str,
        collections: &[String],
    ) -> Result<String, SuggestionFailure> {
        let ctx = PromptContext {
            content,
            collections,
            max_content_chars: MAX_CONTENT_CHARS,
        };
        let context = Context::from_serialize(&ctx).map_err(|e| SuggestionFailure::prompt(&e))?;

        self.tera
            .render(SUGGEST_TEMPLATE, &context)
            .map_err(|e| SuggestionFailure::prompt(&e))
    }
}
