//! `bm extract` command implementation.

use std::path::PathBuf;

use clap::Args;

use super::read_input;
use crate::error::CliError;
use crate::output::write_document;

/// Arguments for the extract command.
#[derive(Args)]
pub(crate) struct ExtractArgs {
    /// Markdown file (default: read stdin).
    file: Option<PathBuf>,

    /// Write the text to a file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl ExtractArgs {
    /// Execute the extract command.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let markdown = read_input(self.file.as_deref())?;
        let text = bm_text::extract(&markdown)?;
        write_document(self.output.as_deref(), &text)?;
        Ok(())
    }
}
