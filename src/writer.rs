use crate::{
    error::{Error, Result},
    resolver::PlannedWrite,
    snippet::{SnippetFile, filename_keyword},
};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A snippet file that was written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenSnippet {
    /// Path of the new file
    pub path: PathBuf,

    /// Generated UID
    pub uid: String,

    /// Collection folder name
    pub collection: String,

    /// Display name
    pub name: String,

    /// Trigger keyword
    pub keyword: String,

    /// File that was replaced, if this was an overwrite
    pub replaced: Option<PathBuf>,
}

/// Writes snippet files into collection folders with atomic operations.
#[derive(Debug, Clone)]
pub struct SnippetWriter {
    root: PathBuf,
    create_root: bool,
}

impl SnippetWriter {
    /// Creates a writer for the snippets root. With `create_root`, a missing
    /// root is created on the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, create_root: bool) -> Self {
        Self {
            root: root.into(),
            create_root,
        }
    }

    /// Writes a planned snippet under a fresh UID.
    ///
    /// When the plan replaces an existing file, the old file is removed only
    /// after the new one is in place.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The snippets root is missing and may not be created
    /// - The collection folder cannot be created
    /// - The file cannot be written
    pub fn write(&self, plan: &PlannedWrite) -> Result<WrittenSnippet> {
        if !self.root.is_dir() {
            if !self.create_root {
                return Err(Error::folder(&self.root, "snippets folder does not exist"));
            }
            fs::create_dir_all(&self.root).map_err(|e| Error::folder(&self.root, e.to_string()))?;
            info!("Created snippets folder {}", self.root.display());
        }

        let draft = &plan.draft;
        let collection_dir = self.root.join(&draft.collection);
        if !collection_dir.is_dir() {
            fs::create_dir_all(&collection_dir)
                .map_err(|e| Error::folder(&collection_dir, e.to_string()))?;
            info!("Created collection '{}'", draft.collection);
        }

        let uid = new_uid();
        let file = SnippetFile::from_draft(draft, uid.clone());
        let path = collection_dir.join(snippet_filename(&draft.keyword, &uid));

        write_file_atomic(&path, &file.to_json()?)?;
        debug!("Wrote snippet {}", path.display());

        if let Some(old) = &plan.replaces {
            if old != &path {
                if let Err(e) = fs::remove_file(old) {
                    warn!("Could not remove replaced snippet {}: {}", old.display(), e);
                }
            }
        }

        Ok(WrittenSnippet {
            path,
            uid,
            collection: draft.collection.clone(),
            name: draft.name.clone(),
            keyword: draft.keyword.clone(),
            replaced: plan.replaces.clone(),
        })
    }
}

/// Generates an uppercase UUID v4.
fn new_uid() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

fn snippet_filename(keyword: &str, uid: &str) -> String {
    format!("{}_{}.json", filename_keyword(keyword), uid)
}

/// Writes a file atomically.
///
/// # Process
///
/// 1. Writes content to a hidden temporary file next to the target
/// 2. Syncs the temporary file to disk
/// 3. Renames it onto the target path
///
/// The temporary file is removed if any step fails.
fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::config("Invalid file path"))?
        .to_string_lossy();
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let result = write_and_rename(&temp_path, path, content);
    if result.is_err() && temp_path.exists() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_and_rename(temp_path: &Path, path: &Path, content: &str) -> Result<()> {
    let mut temp_file = fs::File::create(temp_path).map_err(|e| Error::write(path, e))?;

    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| Error::write(path, e))?;

    temp_file.sync_all().map_err(|e| Error::write(path, e))?;

    drop(temp_file);

    fs::rename(temp_path, path).map_err(|e| Error::write(path, e))
}
