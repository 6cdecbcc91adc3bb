//! `bm lint` command implementation.

use std::path::PathBuf;

use bm_text::LintReport;
use clap::Args;

use super::read_input;
use crate::error::CliError;
use crate::output::{Output, write_document};

/// Arguments for the lint command.
#[derive(Args)]
pub(crate) struct LintArgs {
    /// Markdown file (default: read stdin).
    file: Option<PathBuf>,

    /// Rewrite the file in place instead of printing the fixed text.
    #[arg(short, long, requires = "file")]
    write: bool,
}

impl LintArgs {
    /// Execute the lint command.
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let markdown = read_input(self.file.as_deref())?;
        let report = bm_text::lint_report(&markdown)?;
        print_fixes(output, &report);

        if self.write {
            let path = self
                .file
                .as_deref()
                .ok_or_else(|| CliError::Validation("--write needs a file".to_owned()))?;
            if report.output != markdown {
                std::fs::write(path, &report.output)?;
                output.success(&format!("Fixed {}", path.display()));
            }
        } else {
            write_document(None, &report.output)?;
        }
        Ok(())
    }
}

fn print_fixes(output: &Output, report: &LintReport) {
    if report.is_clean() {
        output.success("No problems found.");
        return;
    }
    output.warning(&format!("Applied {} fix(es):", report.fixes.len()));
    for fix in &report.fixes {
        output.info(&format!("  line {}: {}", fix.line, fix.rule));
    }
}
