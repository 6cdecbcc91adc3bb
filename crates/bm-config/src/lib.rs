//! Configuration management for bm.
//!
//! Parses `bm.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `render.markdown_style`
//! - `render.code_theme`
//! - `render.custom_css`
//! - `render.platform`
//! - `render.footnote_label`
//! - `render.reference_title`
//! - `themes.dirs`
//! - `wechat.allowed_hosts`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

use expand::{expand_env, expand_env_list};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the typography theme.
    pub markdown_style: Option<String>,
    /// Override the syntax highlight theme.
    pub code_theme: Option<String>,
    /// Override the custom CSS file.
    pub custom_css: Option<PathBuf>,
    /// Override the destination platform.
    pub platform: Option<String>,
    /// Override the link reference list toggle.
    pub enable_footnote_links: Option<bool>,
    /// Override the new-window toggle for external links.
    pub open_links_in_new_window: Option<bool>,
}

/// Configuration filename to search for.
pub const CONFIG_FILENAME: &str = "bm.toml";

/// Platform identifiers accepted in `render.platform`.
pub const PLATFORMS: [&str; 4] = ["html", "wechat", "zhihu", "juejin"];

/// Default input cap (5 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 5 * 1024 * 1024;

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Render defaults.
    pub render: RenderConfig,
    /// Stylesheet search directories (relative strings from TOML).
    themes: ThemesConfigRaw,
    /// WeChat link policy.
    pub wechat: WechatConfig,
    /// Resource limits.
    pub limits: LimitsConfig,

    /// Resolved stylesheet directories (set after loading).
    #[serde(skip)]
    pub themes_resolved: ThemesConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Render defaults applied to every request.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Typography theme id.
    pub markdown_style: Option<String>,
    /// Syntax highlight theme id.
    pub code_theme: Option<String>,
    /// Custom CSS file as written in TOML.
    #[serde(rename = "custom_css")]
    custom_css_raw: Option<String>,
    /// Custom CSS file, resolved against the config directory.
    #[serde(skip)]
    pub custom_css: Option<PathBuf>,
    /// Collect external links into a numbered reference list.
    pub enable_footnote_links: bool,
    /// Add `target="_blank"` to external links.
    pub open_links_in_new_window: bool,
    /// Default destination platform.
    pub platform: String,
    /// Heading of the GFM footnote section.
    pub footnote_label: String,
    /// Heading of the link reference list.
    pub reference_title: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            markdown_style: None,
            code_theme: None,
            custom_css_raw: None,
            custom_css: None,
            enable_footnote_links: true,
            open_links_in_new_window: true,
            platform: "html".to_owned(),
            footnote_label: "Footnotes".to_owned(),
            reference_title: "References".to_owned(),
        }
    }
}

/// Raw themes configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ThemesConfigRaw {
    dirs: Vec<String>,
}

/// Resolved stylesheet directories.
#[derive(Debug, Default)]
pub struct ThemesConfig {
    /// Directories searched for `<id>.css`, in priority order.
    pub dirs: Vec<PathBuf>,
}

/// WeChat link policy.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WechatConfig {
    /// Hosts whose links survive the strict rewriter.
    pub allowed_hosts: Vec<String>,
}

impl Default for WechatConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec!["mp.weixin.qq.com".to_owned()],
        }
    }
}

/// Resource limits.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted markdown input, in bytes.
    pub max_input_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`render.custom_css`").
        field: String,
        /// Error message (e.g., "${`BM_CSS`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a host entry to be a bare hostname.
fn require_hostname(host: &str, field: &str) -> Result<(), ConfigError> {
    require_non_empty(host, field)?;
    if host.contains("://") || host.contains(['/', ' ', '?', '#']) {
        return Err(ConfigError::Validation(format!(
            "{field} must be a bare hostname, got '{host}'"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `bm.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = std::env::current_dir()
            .ok()
            .and_then(|cwd| Self::discover_from(&cwd))
        {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(style) = &settings.markdown_style {
            self.render.markdown_style = Some(style.clone());
        }
        if let Some(theme) = &settings.code_theme {
            self.render.code_theme = Some(theme.clone());
        }
        if let Some(css) = &settings.custom_css {
            self.render.custom_css = Some(css.clone());
        }
        if let Some(platform) = &settings.platform {
            self.render.platform.clone_from(platform);
        }
        if let Some(enabled) = settings.enable_footnote_links {
            self.render.enable_footnote_links = enabled;
        }
        if let Some(enabled) = settings.open_links_in_new_window {
            self.render.open_links_in_new_window = enabled;
        }
    }

    /// Search for the config file in `start` and its parents.
    pub fn discover_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Expand `${VAR}` references in string fields.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        let render = &mut self.render;
        for (value, field) in [
            (&mut render.markdown_style, "render.markdown_style"),
            (&mut render.code_theme, "render.code_theme"),
            (&mut render.custom_css_raw, "render.custom_css"),
        ] {
            if let Some(v) = value {
                *v = expand_env(v, field)?;
            }
        }
        render.platform = expand_env(&render.platform, "render.platform")?;
        render.footnote_label = expand_env(&render.footnote_label, "render.footnote_label")?;
        render.reference_title = expand_env(&render.reference_title, "render.reference_title")?;

        expand_env_list(&mut self.themes.dirs, "themes.dirs")?;
        expand_env_list(&mut self.wechat.allowed_hosts, "wechat.allowed_hosts")?;
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.render.custom_css = self
            .render
            .custom_css_raw
            .as_deref()
            .map(|css| config_dir.join(css));
        self.themes_resolved.dirs = self
            .themes
            .dirs
            .iter()
            .map(|dir| config_dir.join(dir))
            .collect();
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI settings
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_render()?;
        self.validate_wechat()?;
        self.validate_limits()?;
        Ok(())
    }

    fn validate_render(&self) -> Result<(), ConfigError> {
        let platform = self.render.platform.trim();
        if !PLATFORMS.iter().any(|p| p.eq_ignore_ascii_case(platform)) {
            return Err(ConfigError::Validation(format!(
                "render.platform must be one of {}, got '{platform}'",
                PLATFORMS.join(", ")
            )));
        }
        require_non_empty(&self.render.footnote_label, "render.footnote_label")?;
        require_non_empty(&self.render.reference_title, "render.reference_title")?;
        Ok(())
    }

    fn validate_wechat(&self) -> Result<(), ConfigError> {
        for (i, host) in self.wechat.allowed_hosts.iter().enumerate() {
            require_hostname(host, &format!("wechat.allowed_hosts[{i}]"))?;
        }
        Ok(())
    }

    fn validate_limits(&self) -> Result<(), ConfigError> {
        if self.limits.max_input_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_input_bytes must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILENAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.render.platform, "html");
        assert!(config.render.enable_footnote_links);
        assert!(config.render.open_links_in_new_window);
        assert_eq!(config.render.footnote_label, "Footnotes");
        assert_eq!(config.render.reference_title, "References");
        assert_eq!(config.wechat.allowed_hosts, vec!["mp.weixin.qq.com"]);
        assert_eq!(config.limits.max_input_bytes, 5 * 1024 * 1024);
        assert!(config.themes_resolved.dirs.is_empty());
        assert!(config.config_path.is_none());
    }

    #[test]
    fn test_parse_render_section() {
        let toml = r#"
[render]
markdown_style = "newsprint"
code_theme = "tokyo-night-dark"
enable_footnote_links = false
platform = "wechat"
reference_title = "参考链接"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.render.markdown_style.as_deref(), Some("newsprint"));
        assert_eq!(config.render.code_theme.as_deref(), Some("tokyo-night-dark"));
        assert!(!config.render.enable_footnote_links);
        assert!(config.render.open_links_in_new_window);
        assert_eq!(config.render.platform, "wechat");
        assert_eq!(config.render.reference_title, "参考链接");
        assert_eq!(config.render.footnote_label, "Footnotes");
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[render]
custom_css = "styles/site.css"

[themes]
dirs = ["themes", "/shared/themes"]
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(
            config.render.custom_css,
            Some(PathBuf::from("/project/styles/site.css"))
        );
        assert_eq!(
            config.themes_resolved.dirs,
            vec![
                PathBuf::from("/project/themes"),
                PathBuf::from("/shared/themes")
            ]
        );
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "[render]\ncustom_css = \"custom.css\"\n\n[limits]\nmax_input_bytes = 1024\n",
        );

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.config_path, Some(path));
        assert_eq!(config.render.custom_css, Some(dir.path().join("custom.css")));
        assert_eq!(config.limits.max_input_bytes, 1024);
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")), None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_discover_in_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "");
        let nested = dir.path().join("posts").join("2024");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(Config::discover_from(&nested), Some(path));
    }

    #[test]
    fn test_discover_ignores_directory_named_like_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(CONFIG_FILENAME)).unwrap();
        let found = Config::discover_from(dir.path());
        assert_ne!(found, Some(dir.path().join(CONFIG_FILENAME)));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[render\nplatform = 1");
        let result = Config::load(Some(&path), None);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_platform_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[render]\nplatform = \"myspace\"\n");
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("myspace"));
    }

    #[test]
    fn test_platform_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[render]\nplatform = \"WeChat\"\n");
        assert!(Config::load(Some(&path), None).is_ok());
    }

    #[test]
    fn test_allowed_host_with_scheme_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "[wechat]\nallowed_hosts = [\"https://mp.weixin.qq.com\"]\n",
        );
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(err.to_string().contains("wechat.allowed_hosts[0]"));
    }

    #[test]
    fn test_zero_input_limit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[limits]\nmax_input_bytes = 0\n");
        assert!(matches!(
            Config::load(Some(&path), None),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_reference_title_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[render]\nreference_title = \"  \"\n");
        assert!(matches!(
            Config::load(Some(&path), None),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_env_expansion_in_file() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("BM_TEST_FILE_STYLE", "ayu-light");
            std::env::remove_var("BM_TEST_FILE_HOST");
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
[render]
markdown_style = "${BM_TEST_FILE_STYLE}"

[wechat]
allowed_hosts = ["${BM_TEST_FILE_HOST:-mp.weixin.qq.com}", "docs.example.com"]
"#,
        );

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.render.markdown_style.as_deref(), Some("ayu-light"));
        assert_eq!(
            config.wechat.allowed_hosts,
            vec!["mp.weixin.qq.com", "docs.example.com"]
        );
        unsafe {
            std::env::remove_var("BM_TEST_FILE_STYLE");
        }
    }

    #[test]
    fn test_env_expansion_missing_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("BM_TEST_FILE_MISSING");
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[render]\ncode_theme = \"${BM_TEST_FILE_MISSING}\"\n");
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("render.code_theme"));
    }

    #[test]
    fn test_cli_settings_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "[render]\nmarkdown_style = \"newsprint\"\nplatform = \"zhihu\"\n",
        );
        let settings = CliSettings {
            markdown_style: Some("professional".to_owned()),
            custom_css: Some(PathBuf::from("/tmp/extra.css")),
            enable_footnote_links: Some(false),
            open_links_in_new_window: Some(false),
            ..CliSettings::default()
        };

        let config = Config::load(Some(&path), Some(&settings)).unwrap();
        assert_eq!(config.render.markdown_style.as_deref(), Some("professional"));
        assert_eq!(config.render.platform, "zhihu");
        assert_eq!(config.render.custom_css, Some(PathBuf::from("/tmp/extra.css")));
        assert!(!config.render.enable_footnote_links);
        assert!(!config.render.open_links_in_new_window);
    }

    #[test]
    fn test_cli_platform_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "");
        let settings = CliSettings {
            platform: Some("all-of-them".to_owned()),
            ..CliSettings::default()
        };
        assert!(matches!(
            Config::load(Some(&path), Some(&settings)),
            Err(ConfigError::Validation(_))
        ));
    }
}
