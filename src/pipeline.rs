use crate::{
    config::Config,
    error::Result,
    library::SnippetLibrary,
    notify::Notice,
    resolver::{Cancellation, Prompter, Resolution, Resolver},
    suggest::Suggest,
    writer::{SnippetWriter, WrittenSnippet},
};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// How an ad hoc run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A snippet file was written
    Created(WrittenSnippet),
    /// Nothing was written
    Cancelled(Cancellation),
}

impl RunOutcome {
    /// Returns the notification describing this outcome.
    #[must_use]
    pub fn notice(&self) -> Notice {
        match self {
            Self::Created(written) => Notice::created(written),
            Self::Cancelled(reason) => Notice::cancelled(&reason.to_string()),
        }
    }

    /// Prints the result line to stdout.
    pub fn print_summary(&self) {
        match self {
            Self::Created(written) => {
                println!(
                    "✓ Created '{}' ({}) in {}",
                    written.name, written.keyword, written.collection
                );
                println!("  {}", written.path.display());
                if let Some(old) = &written.replaced {
                    println!("  replaced {}", old.display());
                }
            }
            Self::Cancelled(reason) => println!("✗ Nothing written: {reason}"),
        }
    }
}

/// Single-snippet workflow: suggest, resolve, write.
pub struct Pipeline<'a> {
    library: SnippetLibrary,
    writer: SnippetWriter,
    suggester: &'a dyn Suggest,
    overwrite: bool,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline over the configured snippets root.
    #[must_use]
    pub fn new(config: &Config, suggester: &'a dyn Suggest) -> Self {
        Self {
            library: SnippetLibrary::new(&config.snippets_root),
            writer: SnippetWriter::new(&config.snippets_root, config.create_root),
            suggester,
            overwrite: config.overwrite,
        }
    }

    /// Runs the workflow for one piece of content.
    ///
    /// # Process
    ///
    /// 1. **Suggest**: asks for metadata, given the existing collections
    /// 2. **Resolve**: applies the confidence policy, falls back to manual
    ///    input, and settles keyword collisions
    /// 3. **Write**: stores the snippet file atomically
    ///
    /// A suggestion failure is not an error here. It leads to manual input.
    ///
    /// # Errors
    ///
    /// Returns an error on folder, prompt, validation or write failures.
    #[instrument(skip_all, fields(root = %self.library.root().display()))]
    pub fn run(&self, content: &str, prompter: &mut dyn Prompter) -> Result<RunOutcome> {
        let start = Instant::now();

        let collections = self.library.collections()?;
        debug!("Existing collections: {:?}", collections);

        info!("Requesting metadata suggestion...");
        let suggestion = self.suggester.suggest(content, &collections);

        let mut resolver = Resolver::new(&self.library, prompter, self.overwrite);
        let plan = match resolver.resolve(content, suggestion)? {
            Resolution::Ready(plan) => plan,
            Resolution::Cancelled(reason) => {
                info!("Cancelled: {}", reason);
                return Ok(RunOutcome::Cancelled(reason));
            }
        };

        let written = self.writer.write(&plan)?;
        info!(
            "✓ Created '{}' in {:.2}s",
            written.keyword,
            start.elapsed().as_secs_f64()
        );

        Ok(RunOutcome::Created(written))
    }
}
