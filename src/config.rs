use std::{
    env, fs,
    path::{Path, PathBuf},
};

use color_eyre::eyre::{Context, ContextCompat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, UserFacingError};

/// Main configuration struct for the application.
///
/// Loaded once at process start and passed by reference to every component
/// that needs it. Credential fields may hold `${ENV_VAR}` placeholders that
/// are resolved at read time through the typed accessors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active provider and model selection
    pub default: DefaultConfig,
    /// Settings for the hosted Anthropic API
    pub anthropic: AnthropicConfig,
    /// Settings for a local Ollama server
    pub ollama: OllamaConfig,
    /// Jira connection settings
    pub jira: JiraConfig,
    /// Context collection limits and ignore patterns
    pub context: ContextConfig,
    /// Configuration settings for application logging
    pub logs: LogsConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultConfig {
    /// Name of the active provider, either `anthropic` or `ollama`
    pub provider: String,
    /// Model identifier passed to the hosted provider
    pub model: String,
    /// Timeout (in seconds) for a single provider call
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    /// The API key, or a `${ANTHROPIC_API_KEY}` placeholder resolved from the environment
    pub api_key: String,
    /// The base URL of the API endpoint
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// The base URL of the Ollama server
    pub host: String,
    /// The model name as configured in Ollama
    pub model: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    /// Base URL of the Jira instance
    pub url: String,
    /// Email of the Jira account
    pub email: String,
    /// API token for the account
    pub api_token: String,
    /// Project key used when none is given explicitly
    pub default_project: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum number of files included in a context bundle
    pub max_files: usize,
    /// Per-file byte cap, oversized files are truncated and flagged
    pub max_file_bytes: usize,
    /// Overall byte budget for the serialized provider payload
    pub max_payload_bytes: usize,
    /// Gitignore-style patterns excluding paths from collection
    pub ignore: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Whether application logging is enabled
    pub enabled: bool,
    /// The log filter to apply, supports the `tracing-subscriber` env filter syntax
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default: DefaultConfig::default(),
            anthropic: AnthropicConfig::default(),
            ollama: OllamaConfig::default(),
            jira: JiraConfig::default(),
            context: ContextConfig::default(),
            logs: LogsConfig::default(),
        }
    }
}
impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            provider: String::from("anthropic"),
            model: String::from("claude-sonnet-4-20250514"),
            timeout_secs: 120,
        }
    }
}
impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::from("${ANTHROPIC_API_KEY}"),
            url: String::from("https://api.anthropic.com/v1"),
        }
    }
}
impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: String::from("http://localhost:11434"),
            model: String::from("codellama"),
        }
    }
}
impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            url: String::from("${JIRA_URL}"),
            email: String::from("${JIRA_EMAIL}"),
            api_token: String::from("${JIRA_API_TOKEN}"),
            default_project: String::new(),
        }
    }
}
impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_files: 50,
            max_file_bytes: 100_000,
            max_payload_bytes: 512_000,
            ignore: [".git", "node_modules", "__pycache__", ".venv", "target", "dist", "build"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}
impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            filter: String::from("info"),
        }
    }
}

/// Resolves a configuration value that may be an `${ENV_VAR}` placeholder.
///
/// Returns `None` when the value is empty or the referenced variable is unset.
pub(crate) fn resolve_value(value: &str) -> Option<String> {
    if let Some(var) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        env::var(var).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl AnthropicConfig {
    /// The API key with any environment placeholder resolved
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_value(&self.api_key)
    }
}

impl JiraConfig {
    /// Resolved `(url, email, api_token)`, or `None` when any of them is missing
    pub fn resolved(&self) -> Option<(String, String, String)> {
        let url = resolve_value(&self.url)?;
        let email = resolve_value(&self.email)?;
        let token = resolve_value(&self.api_token)?;
        Some((url.trim_end_matches('/').to_string(), email, token))
    }

    /// The default project key, if one is configured
    pub fn project(&self) -> Option<String> {
        resolve_value(&self.default_project)
    }
}

/// Handle to the configuration file on disk.
///
/// [`Config`] is the typed view used by the rest of the application; this
/// store is the narrow dynamic `get`/`set` shim backing the `config`
/// subcommand, plus the file lifecycle operations (`init`, ignore updates).
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Creates a store for the given file, or the well-known user config location
    pub fn new(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => default_config_path()?,
        };
        Ok(Self { path })
    }

    /// Path of the configuration file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the typed configuration, falling back to defaults when the file doesn't exist
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("Couldn't read config file {}", self.path.display()))?;
        let config = toml::from_str(&content)
            .wrap_err_with(|| format!("Couldn't parse config file {}", self.path.display()))?;
        Ok(config)
    }

    /// Writes a fresh default configuration file.
    ///
    /// Fails with [`UserFacingError::AlreadyInitialized`] when a file is already
    /// present at the target path, unless `force` is given.
    pub fn init(&self, force: bool) -> Result<()> {
        if self.path.exists() && !force {
            return Err(UserFacingError::AlreadyInitialized(self.path.clone()).into());
        }
        self.write_table(&default_table()?)
    }

    /// Reads a raw value by dotted `section.key` path.
    ///
    /// Values are looked up in the file first and in the registered defaults
    /// second; placeholders are returned verbatim, unresolved.
    pub fn get(&self, key: &str) -> Result<String> {
        let (section, name) = split_key(key)?;
        let table = if self.path.exists() {
            self.read_table()?
        } else {
            default_table()?
        };
        let value = table
            .get(section)
            .and_then(|s| s.as_table())
            .and_then(|s| s.get(name))
            .cloned()
            .or_else(|| {
                // Fall back to the default for keys not present in the file
                default_table()
                    .ok()
                    .and_then(|d| d.get(section).and_then(|s| s.as_table()).and_then(|s| s.get(name)).cloned())
            })
            .ok_or_else(|| UserFacingError::ConfigKey(key.to_string()))?;
        Ok(display_value(&value))
    }

    /// Sets a value by dotted `section.key` path, creating the section as needed.
    ///
    /// The change is persisted immediately; setting the same value twice leaves
    /// the file byte-for-byte identical after the first write.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let (section, name) = split_key(key)?;
        let mut table = if self.path.exists() {
            self.read_table()?
        } else {
            default_table()?
        };
        let section_table = table
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .wrap_err_with(|| format!("Config entry '{section}' is not a table"))?;
        section_table.insert(name.to_string(), coerce_value(value));
        self.write_table(&table)
    }

    /// Adds a pattern to the context ignore list, deduplicated.
    ///
    /// Returns `false` when the pattern was already present.
    pub fn add_ignore_pattern(&self, pattern: &str) -> Result<bool> {
        let mut table = if self.path.exists() {
            self.read_table()?
        } else {
            default_table()?
        };
        let context = table
            .entry("context".to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .wrap_err("Config entry 'context' is not a table")?;
        let ignore = context
            .entry("ignore".to_string())
            .or_insert_with(|| toml::Value::Array(Vec::new()))
            .as_array_mut()
            .wrap_err("Config entry 'context.ignore' is not an array")?;
        if ignore.iter().any(|v| v.as_str() == Some(pattern)) {
            return Ok(false);
        }
        ignore.push(toml::Value::String(pattern.to_string()));
        self.write_table(&table)?;
        Ok(true)
    }

    fn read_table(&self) -> Result<toml::Table> {
        let content = fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("Couldn't read config file {}", self.path.display()))?;
        Ok(content
            .parse::<toml::Table>()
            .wrap_err_with(|| format!("Couldn't parse config file {}", self.path.display()))?)
    }

    fn write_table(&self, table: &toml::Table) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Couldn't create config dir {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(table).wrap_err("Couldn't serialize configuration")?;
        fs::write(&self.path, content)
            .wrap_err_with(|| format!("Couldn't write config file {}", self.path.display()))?;
        Ok(())
    }
}

/// The well-known user config file location
fn default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "flow").wrap_err("Couldn't initialize project directory")?;
    Ok(proj_dirs.config_dir().join("config.toml"))
}

/// Directory for application data such as log files
pub fn data_dir() -> color_eyre::Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "flow").wrap_err("Couldn't initialize project directory")?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

fn default_table() -> Result<toml::Table> {
    let value = toml::Value::try_from(Config::default()).wrap_err("Couldn't serialize default configuration")?;
    match value {
        toml::Value::Table(table) => Ok(table),
        _ => unreachable!("Config always serializes to a table"),
    }
}

fn split_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('.') {
        Some((section, name)) if !section.is_empty() && !name.is_empty() && !name.contains('.') => {
            Ok((section, name))
        }
        _ => Err(UserFacingError::ConfigKey(key.to_string()).into()),
    }
}

/// Coerces a CLI-provided string to the closest TOML type
fn coerce_value(value: &str) -> toml::Value {
    if value.eq_ignore_ascii_case("true") {
        toml::Value::Boolean(true)
    } else if value.eq_ignore_ascii_case("false") {
        toml::Value::Boolean(false)
    } else if let Ok(int) = value.parse::<i64>() {
        toml::Value::Integer(int)
    } else {
        toml::Value::String(value.to_string())
    }
}

/// Renders a value the way `config get` should print it: strings unquoted
fn display_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(Some(dir.path().join("config.toml"))).unwrap()
    }

    #[test]
    fn test_default_config_roundtrip() {
        let serialized = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(Config::default(), parsed);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = store_in(&dir).load().unwrap();
        assert_eq!(Config::default(), config);
    }

    #[test]
    fn test_resolve_value_plain() {
        assert_eq!(resolve_value("hello"), Some(String::from("hello")));
        assert_eq!(resolve_value(""), None);
    }

    #[test]
    fn test_resolve_value_placeholder() {
        unsafe { env::set_var("FLOW_TEST_RESOLVE", "from-env") };
        assert_eq!(resolve_value("${FLOW_TEST_RESOLVE}"), Some(String::from("from-env")));
        assert_eq!(resolve_value("${FLOW_TEST_RESOLVE_UNSET}"), None);
    }

    #[test]
    fn test_init_then_init_fails() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.init(false).unwrap();
        let err = store.init(false).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::AppError::UserFacing(UserFacingError::AlreadyInitialized(_))
        ));
        // Force overwrites without complaining
        store.init(true).unwrap();
    }

    #[test]
    fn test_set_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("default.provider", "ollama").unwrap();
        assert_eq!(store.get("default.provider").unwrap(), "ollama");
    }

    #[test]
    fn test_set_get_keeps_placeholder_verbatim() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("anthropic.api_key", "${MY_CUSTOM_KEY}").unwrap();
        assert_eq!(store.get("anthropic.api_key").unwrap(), "${MY_CUSTOM_KEY}");
    }

    #[test]
    fn test_set_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("context.max_files", "10").unwrap();
        let first = fs::read(store.path()).unwrap();
        store.set("context.max_files", "10").unwrap();
        let second = fs::read(store.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_set_coerces_types() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("logs.enabled", "true").unwrap();
        store.set("context.max_files", "25").unwrap();
        let table = store.read_table().unwrap();
        assert_eq!(table["logs"]["enabled"], toml::Value::Boolean(true));
        assert_eq!(table["context"]["max_files"], toml::Value::Integer(25));
    }

    #[test]
    fn test_set_creates_missing_section() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.init(false).unwrap();
        store.set("custom.flag", "value").unwrap();
        assert_eq!(store.get("custom.flag").unwrap(), "value");
    }

    #[test]
    fn test_get_unknown_key() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let err = store.get("nope.missing").unwrap_err();
        assert!(matches!(
            err,
            crate::errors::AppError::UserFacing(UserFacingError::ConfigKey(_))
        ));
    }

    #[test]
    fn test_get_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("default.provider", "ollama").unwrap();
        // Key not present in the written file, registered default applies
        assert_eq!(store.get("default.timeout_secs").unwrap(), "120");
    }

    #[test]
    fn test_invalid_key_format() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        for key in ["plain", "a.b.c", ".leading", "trailing."] {
            let err = store.set(key, "v").unwrap_err();
            assert!(
                matches!(
                    err,
                    crate::errors::AppError::UserFacing(UserFacingError::ConfigKey(_))
                ),
                "expected ConfigKey error for '{key}'"
            );
        }
    }

    #[test]
    fn test_add_ignore_pattern_dedups() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.add_ignore_pattern("*.log").unwrap());
        assert!(!store.add_ignore_pattern("*.log").unwrap());
        let config = store.load().unwrap();
        assert_eq!(config.context.ignore.iter().filter(|p| *p == "*.log").count(), 1);
    }
}
