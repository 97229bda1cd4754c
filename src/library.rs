use crate::error::{Error, Result};
use crate::snippet::{SnippetFile, SnippetRecord};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

/// A snippet file already present in the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingSnippet {
    /// Collection folder it lives in
    pub collection: String,
    /// Path to the JSON file
    pub path: PathBuf,
    /// Parsed record
    pub record: SnippetRecord,
}

/// Read-only view of the snippets root: collections and their snippet files.
#[derive(Debug, Clone)]
pub struct SnippetLibrary {
    root: PathBuf,
}

impl SnippetLibrary {
    /// Creates a library view over `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the snippets root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists collection folder names, sorted. A missing root has none.
    ///
    /// # Errors
    ///
    /// Returns a folder access error if the root cannot be read.
    pub fn collections(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| Error::folder(&self.root, e.to_string()))?;
            if entry.file_type().is_dir() && !is_hidden(&entry) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        debug!("Found {} collections in {}", names.len(), self.root.display());
        Ok(names)
    }

    /// Returns true if a folder for `collection` exists.
    #[must_use]
    pub fn has_collection(&self, collection: &str) -> bool {
        self.root.join(collection).is_dir()
    }

    /// Lists the valid snippet files in one collection.
    ///
    /// Files that are not readable snippet JSON are skipped.
    ///
    /// # Errors
    ///
    /// Returns a folder access error if the collection cannot be listed.
    pub fn snippets_in(&self, collection: &str) -> Result<Vec<ExistingSnippet>> {
        let dir = self.root.join(collection);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut snippets = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| Error::folder(&dir, e.to_string()))?;
            if !entry.file_type().is_file() || is_hidden(&entry) || !is_json(entry.path()) {
                continue;
            }

            match load_snippet(entry.path()) {
                Some(record) => snippets.push(ExistingSnippet {
                    collection: collection.to_string(),
                    path: entry.into_path(),
                    record,
                }),
                None => trace!("Skipping non-snippet file {}", entry.path().display()),
            }
        }

        Ok(snippets)
    }

    /// Looks for a snippet using `keyword`.
    ///
    /// An existing collection is searched on its own. For a collection that
    /// does not exist yet, every collection is searched.
    ///
    /// # Errors
    ///
    /// Returns a folder access error if a folder cannot be listed.
    pub fn find_keyword(&self, keyword: &str, collection: &str) -> Result<Option<ExistingSnippet>> {
        let scope = if self.has_collection(collection) {
            vec![collection.to_string()]
        } else {
            self.collections()?
        };

        for name in &scope {
            if let Some(found) = self
                .snippets_in(name)?
                .into_iter()
                .find(|s| s.record.keyword == keyword)
            {
                debug!(
                    "Keyword '{}' already used by {}",
                    keyword,
                    found.path.display()
                );
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    /// Counts valid snippet files across all collections.
    ///
    /// # Errors
    ///
    /// Returns a folder access error if a folder cannot be listed.
    pub fn snippet_count(&self) -> Result<usize> {
        let mut total = 0;
        for collection in self.collections()? {
            total += self.snippets_in(&collection)?.len();
        }
        Ok(total)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn load_snippet(path: &Path) -> Option<SnippetRecord> {
    let text = fs::read_to_string(path).ok()?;
    serde_json::from_str::<SnippetFile>(&text)
        .ok()
        .map(|file| file.record)
}
