use crate::error::{Error, Result};
use clipboard::{ClipboardContext, ClipboardProvider};
use tracing::debug;

/// Source of clipboard text.
pub trait ClipboardSource {
    /// Reads the current clipboard text.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be read.
    fn read_text(&self) -> Result<String>;
}

/// The system clipboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl ClipboardSource for SystemClipboard {
    fn read_text(&self) -> Result<String> {
        let mut ctx: ClipboardContext = ClipboardProvider::new().map_err(|e| {
            Error::content_missing(format!("failed to initialize clipboard: {e}"))
        })?;

        ctx.get_contents()
            .map_err(|e| Error::content_missing(format!("failed to read clipboard: {e}")))
    }
}

/// Picks the snippet content.
///
/// A non-blank argument is used verbatim. Otherwise the clipboard text is
/// read and trimmed.
///
/// # Errors
///
/// Returns [`Error::ContentMissing`] if the chosen source is empty or blank,
/// or the clipboard cannot be read.
pub fn resolve_content(argument: Option<&str>, clipboard: &dyn ClipboardSource) -> Result<String> {
    if let Some(text) = argument.filter(|text| !text.trim().is_empty()) {
        debug!("Using {} bytes of argument text", text.len());
        return Ok(text.to_string());
    }

    let text = clipboard.read_text()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::content_missing("clipboard is empty"));
    }

    debug!("Using {} bytes of clipboard text", trimmed.len());
    Ok(trimmed.to_string())
}
