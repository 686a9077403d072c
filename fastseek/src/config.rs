use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::errors::SearchResult;
use crate::search::matcher::Matcher;
use crate::search::SearchOptions;

/// Configuration for a search.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations, later entries
/// overriding earlier ones:
/// 1. Global `$HOME/.config/fastseek/config.yaml`
/// 2. Local `.fastseek.yaml` in the current directory
/// 3. Custom config file specified via `--config` flag
///
/// # Configuration Format
///
/// ```yaml
/// # Directories to search, one after the other
/// roots:
///   - "/var/log"
///   - "/srv/data"
///
/// # Name pattern (* and ? wildcards, [..] character classes)
/// pattern: "*.log"
///
/// # What to look for: files or directories
/// target: files
///
/// # Where "batch found" observers run: inline or deferred
/// delivery: deferred
///
/// # Report cancellation as a normal outcome instead of an error
/// suppress_cancel_error: true
///
/// case_sensitive: true
/// follow_links: false
/// thread_count: 8
/// log_level: "info"
/// ```
///
/// When using the CLI, command-line arguments take precedence over config
/// file values, see [`SearchConfig::merge_with_cli`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Root directories, searched in order
    pub roots: Vec<PathBuf>,

    /// Glob-style name pattern matched against entry names
    pub pattern: String,

    /// Whether files or directories are matched
    pub target: SearchTarget,

    /// Where batch observers run
    pub delivery: DeliveryMode,

    /// When false, a canceled search returns `SearchError::Canceled`
    /// after the completion observers have run
    pub suppress_cancel_error: bool,

    /// Case sensitivity of the name pattern
    pub case_sensitive: bool,

    /// Descend into symlinked directories (no cycle detection)
    pub follow_links: bool,

    /// Number of worker threads.
    /// Defaults to number of CPU cores if not specified
    pub thread_count: Option<NonZeroUsize>,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// What a search reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchTarget {
    #[default]
    Files,
    Directories,
}

/// Where "batch found" observers are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// On the worker thread that found the batch
    #[default]
    Inline,
    /// On a dispatcher thread, joined before completion is reported
    Deferred,
}

pub(crate) fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_pattern() -> String {
    "*".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            pattern: default_pattern(),
            target: SearchTarget::default(),
            delivery: DeliveryMode::default(),
            suppress_cancel_error: true,
            case_sensitive: !cfg!(windows),
            follow_links: false,
            thread_count: None,
            log_level: default_log_level(),
        }
    }
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus `config_path`,
    /// which must exist when given
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("fastseek/config.yaml")),
            Some(PathBuf::from(".fastseek.yaml")),
        ];
        for path in defaults.iter().flatten() {
            builder = builder.add_source(File::from(path.as_path()).required(false));
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli_config: SearchConfig) -> Self {
        // CLI values take precedence over config file values
        if !cli_config.roots.is_empty() {
            self.roots = cli_config.roots;
        }
        if cli_config.pattern != default_pattern() {
            self.pattern = cli_config.pattern;
        }
        // The CLI always names its target through the subcommand
        self.target = cli_config.target;
        if cli_config.delivery == DeliveryMode::Deferred {
            self.delivery = DeliveryMode::Deferred;
        }
        if !cli_config.suppress_cancel_error {
            self.suppress_cancel_error = false;
        }
        if !cli_config.case_sensitive {
            self.case_sensitive = false;
        }
        if cli_config.follow_links {
            self.follow_links = true;
        }
        if cli_config.thread_count.is_some() {
            self.thread_count = cli_config.thread_count;
        }
        if cli_config.log_level != default_log_level() {
            self.log_level = cli_config.log_level;
        }
        self
    }

    /// Builds the glob matcher described by this configuration
    pub fn matcher(&self) -> SearchResult<Matcher> {
        Matcher::glob(self.target, &self.pattern, self.case_sensitive)
    }

    /// Engine options described by this configuration
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            delivery: self.delivery,
            suppress_cancel_error: self.suppress_cancel_error,
            thread_count: self.thread_count.unwrap_or_else(default_thread_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        config_path
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            &dir,
            r#"
            roots: ["/srv/a", "/srv/b"]
            pattern: "*.log"
            target: directories
            delivery: deferred
            suppress_cancel_error: false
            case_sensitive: false
            follow_links: true
            thread_count: 4
            log_level: "debug"
        "#,
        );

        let config = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(
            config.roots,
            vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")]
        );
        assert_eq!(config.pattern, "*.log");
        assert_eq!(config.target, SearchTarget::Directories);
        assert_eq!(config.delivery, DeliveryMode::Deferred);
        assert!(!config.suppress_cancel_error);
        assert!(!config.case_sensitive);
        assert!(config.follow_links);
        assert_eq!(config.thread_count, NonZeroUsize::new(4));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = write_config(&dir, "roots: [\".\"]\n");

        let config = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.roots, vec![PathBuf::from(".")]);
        assert_eq!(config.pattern, "*");
        assert_eq!(config.target, SearchTarget::Files);
        assert_eq!(config.delivery, DeliveryMode::Inline);
        assert!(config.suppress_cancel_error);
        assert!(!config.follow_links);
        assert_eq!(config.thread_count, None);
        assert_eq!(
            config.search_options().thread_count,
            NonZeroUsize::new(num_cpus::get()).unwrap()
        );
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_merge_with_cli() {
        let config_file = SearchConfig {
            roots: vec![PathBuf::from("/srv")],
            pattern: "*.log".to_string(),
            delivery: DeliveryMode::Deferred,
            thread_count: NonZeroUsize::new(4),
            log_level: "info".to_string(),
            ..SearchConfig::default()
        };

        let cli_config = SearchConfig {
            roots: vec![PathBuf::from("tests")],
            target: SearchTarget::Directories,
            follow_links: true,
            ..SearchConfig::default()
        };

        let merged = config_file.merge_with_cli(cli_config);
        assert_eq!(merged.roots, vec![PathBuf::from("tests")]); // CLI value
        assert_eq!(merged.pattern, "*.log"); // File value (CLI default)
        assert_eq!(merged.target, SearchTarget::Directories); // CLI value
        assert_eq!(merged.delivery, DeliveryMode::Deferred); // File value
        assert!(merged.follow_links); // CLI value
        assert_eq!(merged.thread_count, NonZeroUsize::new(4)); // File value
        assert_eq!(merged.log_level, "info"); // File value
    }

    #[test]
    fn test_cli_thread_count_matching_cpu_count_still_wins() {
        let config_file = SearchConfig {
            thread_count: NonZeroUsize::new(num_cpus::get() + 1),
            ..SearchConfig::default()
        };
        let cli_config = SearchConfig {
            thread_count: NonZeroUsize::new(num_cpus::get()),
            ..SearchConfig::default()
        };

        let merged = config_file.merge_with_cli(cli_config);
        assert_eq!(merged.thread_count, NonZeroUsize::new(num_cpus::get()));
    }

    #[test]
    fn test_search_options_from_config() {
        let config = SearchConfig {
            delivery: DeliveryMode::Deferred,
            suppress_cancel_error: false,
            thread_count: NonZeroUsize::new(3),
            ..SearchConfig::default()
        };

        let options = config.search_options();
        assert_eq!(options.delivery, DeliveryMode::Deferred);
        assert!(!options.suppress_cancel_error);
        assert_eq!(options.thread_count.get(), 3);
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            &dir,
            r#"
            target: "sideways"
            thread_count: "invalid"
        "#,
        );

        let result = SearchConfig::load_from(Some(&config_path));
        assert!(result.is_err(), "Expected error loading invalid config");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = SearchConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }
}
