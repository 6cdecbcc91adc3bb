//! bm CLI - Markdown to paste-ready HTML.
//!
//! Provides commands for:
//! - `render`: Render markdown for one platform or all of them
//! - `extract`: Print the plain text of a markdown document
//! - `lint`: Auto-fix common markdown style problems
//! - `themes`: List available typography and code themes

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ExtractArgs, LintArgs, RenderArgs, ThemesArgs};
use output::Output;

/// bm - Markdown to paste-ready HTML.
#[derive(Parser)]
#[command(name = "bm", version, about)]
struct Cli {
    /// Enable verbose output (stage timing and recovered warnings at debug
    /// level).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render markdown to HTML.
    Render(RenderArgs),
    /// Print the plain text of a markdown document.
    Extract(ExtractArgs),
    /// Auto-fix markdown style problems.
    Lint(LintArgs),
    /// List available themes.
    Themes(ThemesArgs),
}

/// `--verbose` enables DEBUG level, otherwise use `RUST_LOG` or default to
/// ERROR.
fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Render(args) => args.execute(&output),
        Commands::Extract(args) => args.execute(),
        Commands::Lint(args) => args.execute(&output),
        Commands::Themes(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tracing_subscriber::filter::LevelFilter;

    use super::*;

    #[test]
    fn test_verbose_filter_shows_stage_timing() {
        assert_eq!(log_filter(true).max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
