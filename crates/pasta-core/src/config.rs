//! Configuration loading and parsing for Pasta
//!
//! Provides functionality to load and parse `pasta.toml` configuration files.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CONFIG_FILENAME: &str = "pasta.toml";

pub const DEFAULT_COMPONENT_BASE: &str = "System.Classes.TComponent";

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &["resolution", "build"];
const KNOWN_RESOLUTION_KEYS: &[&str] = &["unit_scope_names", "unit_aliases", "component_base"];
const KNOWN_BUILD_KEYS: &[&str] = &["parallel"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML in '{path}': {message}")]
    ParseError { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigResult {
    pub config: Config,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub resolution: ResolutionConfig,
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Namespace prefixes tried for unqualified uses-clause names.
    pub unit_scope_names: Vec<String>,
    pub unit_aliases: HashMap<String, String>,
    /// Qualified name of the component-streaming root class.
    pub component_base: String,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            unit_scope_names: Vec::new(),
            unit_aliases: HashMap::new(),
            component_base: DEFAULT_COMPONENT_BASE.to_string(),
        }
    }
}

impl ResolutionConfig {
    /// Names a uses-clause entry may refer to, most specific first.
    pub fn unit_name_candidates(&self, name: &str) -> Vec<String> {
        let mut candidates = vec![name.to_string()];
        if let Some(target) = self
            .unit_aliases
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
            .map(|(_, target)| target)
        {
            candidates.push(target.clone());
        }
        for scope in &self.unit_scope_names {
            candidates.push(format!("{scope}.{name}"));
        }
        candidates
    }

    /// Splits `component_base` into unit name and type name.
    pub fn component_base_parts(&self) -> Option<(&str, &str)> {
        self.component_base.rsplit_once('.')
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    pub parallel: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    Ok(load_config_with_warnings(path)?.config)
}

pub fn load_config_with_warnings(path: &Path) -> Result<ConfigResult, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;

    let warnings = detect_unknown_keys(&content);
    for warning in &warnings {
        warn!(path = %path.display(), "{warning}");
    }

    Ok(ConfigResult { config, warnings })
}

fn detect_unknown_keys(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    let table: toml::Table = match content.parse() {
        Ok(t) => t,
        Err(_) => return warnings,
    };

    let known_top: HashSet<&str> = KNOWN_TOP_LEVEL_KEYS.iter().copied().collect();
    for key in table.keys() {
        if !known_top.contains(key.as_str()) {
            warnings.push(format!("Unknown config option: '{}'", key));
        }
    }

    for (section, known) in [
        ("resolution", KNOWN_RESOLUTION_KEYS),
        ("build", KNOWN_BUILD_KEYS),
    ] {
        if let Some(toml::Value::Table(entries)) = table.get(section) {
            for key in entries.keys() {
                if !known.contains(&key.as_str()) {
                    warnings.push(format!("Unknown config option in [{}]: '{}'", section, key));
                }
            }
        }
    }

    warnings
}

pub fn load_config_or_default(start_dir: &Path) -> Config {
    find_config_file(start_dir)
        .and_then(|path| load_config(&path).ok())
        .unwrap_or_default()
}

pub fn load_config_or_default_with_warnings(start_dir: &Path) -> ConfigResult {
    match find_config_file(start_dir) {
        Some(path) => load_config_with_warnings(&path).unwrap_or_default(),
        None => ConfigResult::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    #[test]
    fn load_config_from_file() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &config_path,
            r#"
[resolution]
unit_scope_names = ["System", "Vcl"]
component_base = "Comps.TComponent"

[resolution.unit_aliases]
WinTypes = "Winapi.Windows"

[build]
parallel = false
"#,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();

        assert_eq!(config.resolution.unit_scope_names, vec!["System", "Vcl"]);
        assert_eq!(config.resolution.component_base, "Comps.TComponent");
        assert_eq!(
            config.resolution.unit_aliases.get("WinTypes"),
            Some(&"Winapi.Windows".to_string())
        );
        assert!(!config.build.parallel);
    }

    #[test]
    fn default_config_when_missing() {
        let dir = create_temp_dir();
        let config = load_config_or_default(dir.path());

        assert_eq!(config, Config::default());
        assert!(config.build.parallel);
        assert_eq!(config.resolution.component_base, DEFAULT_COMPONENT_BASE);
    }

    #[test]
    fn error_on_invalid_toml() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "this is not valid { toml }").unwrap();

        let err = load_config(&config_path).unwrap_err();
        match err {
            ConfigError::ParseError { path, message } => {
                assert_eq!(path, config_path);
                assert!(!message.is_empty());
            }
            _ => panic!("Expected ParseError"),
        }
    }

    #[test]
    fn find_config_file_in_parent_directory() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "").unwrap();
        let nested = dir.path().join("src").join("units");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config_file(&nested), Some(config_path));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "[build]\nparallel = false\n").unwrap();

        let config = load_config(&config_path).unwrap();

        assert!(!config.build.parallel);
        assert_eq!(config.resolution, ResolutionConfig::default());
    }

    #[test]
    fn warns_on_unknown_options() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &config_path,
            "cache = true\n[resolution]\nsearch_path = []\n[build]\nthreads = 4\n",
        )
        .unwrap();

        let result = load_config_with_warnings(&config_path).unwrap();

        assert_eq!(
            result.warnings,
            vec![
                "Unknown config option: 'cache'",
                "Unknown config option in [resolution]: 'search_path'",
                "Unknown config option in [build]: 'threads'",
            ]
        );
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unknown_options_are_logged() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "[build]
threads = 4
").unwrap();

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            load_config_with_warnings(&config_path).unwrap();
        });

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{output}");
        assert!(
            output.contains("Unknown config option in [build]: 'threads'"),
            "{output}"
        );
    }

    #[test]
    fn no_warnings_for_valid_config() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "[resolution]\nunit_scope_names = [\"Vcl\"]\n").unwrap();

        let result = load_config_or_default_with_warnings(dir.path());

        assert!(result.warnings.is_empty());
        assert_eq!(result.config.resolution.unit_scope_names, vec!["Vcl"]);
    }

    #[test]
    fn unit_name_candidates_follow_alias_then_scope_names() {
        let mut resolution = ResolutionConfig {
            unit_scope_names: vec!["System".into(), "Vcl".into()],
            ..Default::default()
        };
        resolution
            .unit_aliases
            .insert("WinTypes".into(), "Winapi.Windows".into());

        assert_eq!(
            resolution.unit_name_candidates("wintypes"),
            vec!["wintypes", "Winapi.Windows", "System.wintypes", "Vcl.wintypes"]
        );
    }

    #[test]
    fn component_base_splits_on_last_dot() {
        let resolution = ResolutionConfig::default();
        assert_eq!(
            resolution.component_base_parts(),
            Some(("System.Classes", "TComponent"))
        );
    }
}
