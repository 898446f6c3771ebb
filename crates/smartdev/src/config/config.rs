use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

use super::diagnostics::Diagnostic;
use super::diagnostics::Diagnostics;
use super::diagnostics::Error;
use super::diagnostics::FieldLocation;
use super::diagnostics::ValidationError;
use super::partial::PartialConfig;
use super::partial::PartialPattern;
use crate::detect::patterns::default_patterns;
use crate::detect::PatternDefinition;
use crate::detect::RolePatternMatcher;
use crate::tree::TreeOptions;

pub const DEFAULT_PORT: u16 = 8566;

#[derive(Debug, Default, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub tree: TreeOptions,
    pub detect: DetectConfig,
    pub ui: UiConfig,
    pub api: ApiConfig,

    /// Configured device patterns; empty means the built-in set.
    pub patterns: BTreeMap<String, PatternDefinition>,
}

// Deserialize is needed for toml::Spanned<LogLevel> in the partial config
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: LogLevel,

    /// Per-target levels, e.g. `"smartdev::detect" = "debug"`
    pub overrides: HashMap<String, LogLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectConfig {
    /// Namespaces whose `device` objects are detection candidates
    pub namespaces: Vec<String>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            namespaces: vec!["alias.0".to_string(), "linkeddevices.0".to_string()],
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UiConfig {
    /// File the UI state is persisted to; in memory only when unset
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub listen: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

struct Validator<'a> {
    locations: &'a HashMap<String, FieldLocation>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl Validator<'_> {
    fn error(&mut self, field_path: &str, located_at: &str, message: String) {
        self.diagnostics
            .push(Diagnostic::Error(Error::Validation(ValidationError {
                field_path: field_path.to_string(),
                message,
                location: self.locations.get(located_at).cloned(),
            })));
    }

    fn language(&mut self, field_path: &str, value: Option<toml::Spanned<String>>) -> Option<String> {
        let value = value?.into_inner();
        if value.trim().is_empty() {
            self.error(field_path, field_path, "language must not be empty".to_string());
            return None;
        }
        Some(value)
    }

    fn pattern(&mut self, name: &str, partial: PartialPattern) -> Option<PatternDefinition> {
        let field_path = format!("patterns.{}", name);
        let before = self.diagnostics.len();

        if partial.states.is_empty() {
            self.error(&field_path, &field_path, "pattern declares no states".to_string());
        } else if !partial.states.iter().any(|state| state.required) {
            self.error(
                &field_path,
                &field_path,
                "pattern needs at least one required state".to_string(),
            );
        }
        for (idx, state) in partial.states.iter().enumerate() {
            if state.name.trim().is_empty() {
                self.error(
                    &format!("{}.states[{}].name", field_path, idx),
                    &field_path,
                    "state name must not be empty".to_string(),
                );
            }
        }

        (self.diagnostics.len() == before).then(|| PatternDefinition {
            priority: partial.priority.unwrap_or_default(),
            states: partial.states,
        })
    }
}

impl Config {
    /// Load configuration from multiple TOML files with import resolution
    ///
    /// Files are merged with first-wins semantics; a field defined in more
    /// than one file is an error. Returns the config and any warnings, or all
    /// errors found.
    pub fn from_files(paths: &[PathBuf]) -> Result<(Self, Vec<Diagnostic>), Diagnostics> {
        let configs = PartialConfig::load_with_imports(paths)?;

        let (partial, diagnostics) = PartialConfig::merge(configs);

        Self::from_partial(partial, diagnostics)
    }

    /// Convert a merged PartialConfig into a Config, validating all fields
    pub fn from_partial(
        partial: PartialConfig,
        mut diagnostics: Vec<Diagnostic>,
    ) -> Result<(Self, Vec<Diagnostic>), Diagnostics> {
        let mut validator = Validator {
            locations: &partial.locations,
            diagnostics: &mut diagnostics,
        };
        let mut config = Config::default();

        if let Some(logging) = partial.logging {
            config.logging = LoggingConfig {
                level: logging.level.map(|s| s.into_inner()).unwrap_or_default(),
                overrides: logging
                    .overrides
                    .map(|hm| hm.into_iter().map(|(k, v)| (k, v.into_inner())).collect())
                    .unwrap_or_default(),
            };
        }

        if let Some(tree) = partial.tree {
            if let Some(language) = validator.language("tree.language", tree.language) {
                config.tree.language = language;
            }
            if let Some(language) = validator.language("tree.default_language", tree.default_language) {
                config.tree.default_language = language;
            }
            if let Some(reserved) = tree.reserved {
                config.tree.reserved = reserved.into_inner();
            }
            config.tree.root_prefix = tree.root_prefix.map(|s| s.into_inner());
        }

        if let Some(namespaces) = partial.detect.and_then(|d| d.namespaces) {
            config.detect.namespaces = namespaces.into_inner();
        }

        if let Some(state_path) = partial.ui.and_then(|ui| ui.state_path) {
            config.ui.state_path = Some(state_path.into_inner());
        }

        if let Some(api) = partial.api {
            if let Some(listen) = api.listen {
                config.api.listen = listen.into_inner();
            }
            if let Some(port) = api.port {
                if *port.get_ref() == 0 {
                    validator.error("api.port", "api.port", "port must not be 0".to_string());
                } else {
                    config.api.port = port.into_inner();
                }
            }
        }

        let mut patterns: Vec<(String, PartialPattern)> =
            partial.patterns.into_iter().flatten().collect();
        patterns.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, pattern) in patterns {
            if let Some(definition) = validator.pattern(&name, pattern) {
                config.patterns.insert(name, definition);
            }
        }

        if diagnostics.iter().any(Diagnostic::is_error) {
            Err(Diagnostics(diagnostics))
        } else {
            Ok((config, diagnostics))
        }
    }

    /// Configured patterns, or the built-in ones when none are configured.
    pub fn patterns(&self) -> BTreeMap<String, PatternDefinition> {
        if self.patterns.is_empty() {
            default_patterns()
        } else {
            self.patterns.clone()
        }
    }

    pub fn matcher(&self) -> RolePatternMatcher {
        RolePatternMatcher::new(self.patterns())
    }
}
