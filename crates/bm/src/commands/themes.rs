//! `bm themes` command implementation.

use std::path::PathBuf;

use bm_config::Config;
use bm_style::{SheetKind, StyleResolver};
use clap::Args;

use crate::error::CliError;
use crate::output::write_document;

/// Arguments for the themes command.
#[derive(Args)]
pub(crate) struct ThemesArgs {
    /// Path to configuration file (default: auto-discover bm.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ThemesArgs {
    /// Execute the themes command.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let config = Config::load(self.config.as_deref(), None)?;
        let resolver = StyleResolver::with_directories(&config.themes_resolved.dirs);
        write_document(None, &format_listing(&resolver))?;
        Ok(())
    }
}

/// Printed after the listing.
const CUSTOM_THEMES_HINT: &str =
    "Add styles as <dir>/<id>.css and code themes as <dir>/code/<id>.css, \
     with <dir> listed under [themes] dirs in bm.toml.";

/// One section per sheet kind, one id per line, then where custom themes go.
fn format_listing(resolver: &StyleResolver) -> String {
    let mut listing = String::new();
    for (title, kind) in [
        ("Markdown styles:", SheetKind::Markdown),
        ("Code themes:", SheetKind::Code),
    ] {
        if !listing.is_empty() {
            listing.push('\n');
        }
        listing.push_str(title);
        listing.push('\n');
        for id in resolver.available(kind) {
            listing.push_str("  ");
            listing.push_str(&id);
            listing.push('\n');
        }
    }
    listing.push('\n');
    listing.push_str(CUSTOM_THEMES_HINT);
    listing.push('\n');
    listing
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_listing_includes_builtin_themes() {
        let listing = format_listing(&StyleResolver::new());
        assert!(listing.starts_with("Markdown styles:\n"));
        assert!(listing.contains("  professional\n"));
        assert!(listing.contains("\nCode themes:\n"));
        assert!(listing.contains("  tokyo-night-dark\n"));
        assert!(listing.contains("  catppuccin-latte\n"));
    }

    #[test]
    fn test_listing_ends_with_custom_theme_hint() {
        let listing = format_listing(&StyleResolver::new());
        assert!(listing.ends_with(&format!("\n\n{CUSTOM_THEMES_HINT}\n")));
        assert!(CUSTOM_THEMES_HINT.contains("[themes] dirs"));
    }

    #[test]
    fn test_listing_includes_directory_themes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("house.css"), "p { color: red; }").unwrap();
        let listing = format_listing(&StyleResolver::with_directories(&[dir.path()]));
        let styles: Vec<&str> = listing
            .lines()
            .take_while(|l| !l.is_empty())
            .filter_map(|l| l.strip_prefix("  "))
            .collect();
        assert_eq!(styles, vec!["ayu-light", "house", "newsprint", "professional"]);
    }
}
