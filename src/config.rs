use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const DEFAULT_MAX_TOKENS: u32 = 1_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for snippet creation.
///
/// Built once at startup with [`Config::builder()`] and passed by reference
/// to every component.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root folder holding one directory per collection
    pub snippets_root: PathBuf,

    /// API key for the suggestion service
    pub api_key: Option<String>,

    /// Base URL of the messages API
    pub api_base_url: String,

    /// Model used for suggestions
    pub model: String,

    /// Token limit for the suggestion reply
    pub max_tokens: u32,

    /// Total number of request attempts before giving up
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for each further retry
    pub base_delay: Duration,

    /// Per-attempt HTTP timeout
    pub request_timeout: Duration,

    /// Whether AI suggestions are requested at all
    pub use_ai: bool,

    /// Replace duplicates without asking
    pub overwrite: bool,

    /// Create the snippets root if it is missing
    pub create_root: bool,

    /// Stop a batch at the first failed entry
    pub stop_on_error: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use snipgen::Config;
    ///
    /// let config = Config::builder()
    ///     .snippets_root("~/Library/Application Support/Alfred/Alfred.alfredpreferences/snippets")
    ///     .api_key("sk-ant-...")
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Returns true when suggestions are enabled and an API key is present.
    #[must_use]
    pub fn ai_enabled(&self) -> bool {
        self.use_ai && self.api_key.is_some()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The snippets root is missing (and `create_root` is off), not a
    ///   directory, or read-only
    /// - Retry or timeout settings are zero
    /// - The model name is empty
    pub fn validate(&self) -> Result<()> {
        if self.snippets_root.as_os_str().is_empty() {
            return Err(Error::config(
                "Snippets root is not set. Set ALFRED_SNIPPETS_PATH or pass --snippets-path",
            ));
        }

        if self.snippets_root.exists() {
            if !self.snippets_root.is_dir() {
                return Err(Error::folder(
                    &self.snippets_root,
                    "snippets root is not a directory",
                ));
            }

            let metadata = std::fs::metadata(&self.snippets_root)
                .map_err(|e| Error::folder(&self.snippets_root, e.to_string()))?;
            if metadata.permissions().readonly() {
                return Err(Error::folder(
                    &self.snippets_root,
                    "snippets root is not writable",
                ));
            }
        } else if !self.create_root {
            return Err(Error::folder(
                &self.snippets_root,
                "snippets root does not exist (pass --create-root to create it)",
            ));
        }

        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be greater than 0"));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::config("request_timeout must be greater than 0"));
        }

        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }

        if self.use_ai && self.api_key.is_none() {
            tracing::warn!("No API key configured; AI suggestions are disabled");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snippets_root: PathBuf::new(),
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            use_ai: true,
            overwrite: false,
            create_root: false,
            stop_on_error: false,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    snippets_root: Option<PathBuf>,
    api_key: Option<String>,
    api_base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    max_attempts: Option<u32>,
    base_delay: Option<Duration>,
    request_timeout: Option<Duration>,
    use_ai: Option<bool>,
    overwrite: bool,
    create_root: bool,
    stop_on_error: bool,
}

impl ConfigBuilder {
    /// Sets the snippets root. A leading `~` is expanded to the home directory.
    #[must_use]
    pub fn snippets_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.snippets_root = Some(path.into());
        self
    }

    /// Sets the API key. Blank keys are ignored.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = if key.trim().is_empty() {
            None
        } else {
            Some(key.trim().to_string())
        };
        self
    }

    /// Sets the messages API base URL.
    #[must_use]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the model name.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the reply token limit.
    #[must_use]
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Sets the total number of request attempts.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Sets the per-attempt HTTP timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Enables or disables AI suggestions.
    #[must_use]
    pub fn use_ai(mut self, enabled: bool) -> Self {
        self.use_ai = Some(enabled);
        self
    }

    /// Replace duplicate keywords without asking.
    #[must_use]
    pub fn overwrite(mut self, enabled: bool) -> Self {
        self.overwrite = enabled;
        self
    }

    /// Allows the snippets root to be created when missing.
    #[must_use]
    pub fn create_root(mut self, enabled: bool) -> Self {
        self.create_root = enabled;
        self
    }

    /// Stops batch processing at the first failure.
    #[must_use]
    pub fn stop_on_error(mut self, enabled: bool) -> Self {
        self.stop_on_error = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            snippets_root: self
                .snippets_root
                .map(|p| expand_home(&p))
                .unwrap_or_default(),
            api_key: self.api_key,
            api_base_url: self
                .api_base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            base_delay: self.base_delay.unwrap_or(DEFAULT_BASE_DELAY),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            use_ai: self.use_ai.unwrap_or(true),
            overwrite: self.overwrite,
            create_root: self.create_root,
            stop_on_error: self.stop_on_error,
        };

        config.validate()?;
        Ok(config)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest)),
        Err(_) => path.to_path_buf(),
    }
}
