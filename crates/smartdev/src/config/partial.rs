use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use toml::Spanned;

use super::diagnostics::Diagnostic;
use super::diagnostics::Error;
use super::diagnostics::FieldLocation;
use super::diagnostics::LoadError;
use super::diagnostics::MergeError;
use super::diagnostics::SourceInfo;
use super::diagnostics::Warning;
use super::LogLevel;
use crate::detect::PatternState;

/// One config file as written, every field optional.
#[derive(Debug, Default, Deserialize)]
pub struct PartialConfig {
    #[serde(default)]
    pub imports: Vec<String>,

    pub logging: Option<PartialLoggingConfig>,
    pub tree: Option<PartialTreeConfig>,
    pub detect: Option<PartialDetectConfig>,
    pub ui: Option<PartialUiConfig>,
    pub api: Option<PartialApiConfig>,
    pub patterns: Option<HashMap<String, PartialPattern>>,

    /// Source information for error reporting (not serialized)
    #[serde(skip)]
    pub source: Option<SourceInfo>,

    /// Where each merged field was defined, keyed by dotted field path
    #[serde(skip)]
    pub locations: HashMap<String, FieldLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialLoggingConfig {
    pub level: Option<Spanned<LogLevel>>,
    pub overrides: Option<HashMap<String, Spanned<LogLevel>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialTreeConfig {
    pub language: Option<Spanned<String>>,
    pub default_language: Option<Spanned<String>>,
    pub reserved: Option<Spanned<Vec<String>>>,
    pub root_prefix: Option<Spanned<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialDetectConfig {
    pub namespaces: Option<Spanned<Vec<String>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialUiConfig {
    pub state_path: Option<Spanned<PathBuf>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialApiConfig {
    pub listen: Option<Spanned<String>>,
    pub port: Option<Spanned<u16>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialPattern {
    pub priority: Option<i32>,

    #[serde(default)]
    pub states: Vec<PatternState>,
}

/// First-wins merge bookkeeping shared by all fields.
#[derive(Default)]
struct Merger {
    locations: HashMap<String, FieldLocation>,
    diagnostics: Vec<Diagnostic>,
}

impl Merger {
    /// Record that `field_path` is defined at `span` in `source`. Returns
    /// `false` (and records a conflict) when an earlier file defined it.
    fn claim(&mut self, field_path: String, span: std::ops::Range<usize>, source: &SourceInfo) -> bool {
        let location = FieldLocation {
            file_path: source.file_path.clone(),
            span,
            content: source.content.clone(),
        };

        if let Some(previous) = self.locations.get(&field_path) {
            self.diagnostics
                .push(Diagnostic::Error(Error::Merge(MergeError {
                    message: format!("'{}' defined in multiple config files", field_path),
                    field_path,
                    conflicts: vec![previous.clone(), location],
                })));
            false
        } else {
            self.locations.insert(field_path, location);
            true
        }
    }

    fn field<T>(
        &mut self,
        field_path: &str,
        source: &SourceInfo,
        slot: &mut Option<Spanned<T>>,
        value: Option<Spanned<T>>,
    ) {
        if let Some(value) = value {
            if self.claim(field_path.to_string(), value.span(), source) {
                *slot = Some(value);
            }
        }
    }
}

/// Span of a table header such as `[patterns.light]` in `content`.
fn header_span(content: &str, headers: &[String]) -> std::ops::Range<usize> {
    headers
        .iter()
        .find_map(|header| {
            content
                .find(header.as_str())
                .map(|start| start..(start + header.len()))
        })
        .unwrap_or(0..0)
}

impl PartialConfig {
    /// Load a single config file without processing imports
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let mut config: PartialConfig = toml::from_str(&content).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.source = Some(SourceInfo {
            file_path: path.to_path_buf(),
            content,
        });

        Ok(config)
    }

    /// Load config files with import resolution
    ///
    /// Imports are loaded depth-first and come before the file importing
    /// them. Cycle detection prevents infinite loops.
    pub fn load_with_imports(paths: &[PathBuf]) -> Result<Vec<Self>, LoadError> {
        let mut visited = HashSet::new();
        let mut all_configs = Vec::new();

        for path in paths {
            Self::load_recursive(path, &mut visited, &mut all_configs)?;
        }

        Ok(all_configs)
    }

    fn load_recursive(
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        configs: &mut Vec<Self>,
    ) -> Result<(), LoadError> {
        let canonical_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if visited.contains(&canonical_path) {
            return Err(LoadError::ImportCycle {
                path: canonical_path,
                cycle: visited.iter().cloned().collect(),
            });
        }

        visited.insert(canonical_path.clone());

        let config = Self::from_file(path)?;

        for import in &config.imports {
            let import_path = PathBuf::from(import);

            // Relative imports resolve from the importing file's directory
            let resolved_path = if import_path.is_absolute() {
                import_path
            } else {
                let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
                parent_dir.join(import_path)
            };

            Self::load_recursive(&resolved_path, visited, configs)?;
        }

        configs.push(config);

        // Sibling branches may import the same file again
        visited.remove(&canonical_path);

        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.logging.is_none()
            && self.tree.is_none()
            && self.detect.is_none()
            && self.ui.is_none()
            && self.api.is_none()
            && self.patterns.is_none()
            && self.imports.is_empty()
    }

    /// Merge multiple partial configs together
    ///
    /// Uses first-wins semantics: the first occurrence of a field is kept.
    /// Conflicts are collected as errors and merging continues so that all of
    /// them are reported at once.
    pub fn merge<I>(configs: I) -> (Self, Vec<Diagnostic>)
    where
        I: IntoIterator<Item = Self>,
    {
        let mut result = PartialConfig::default();
        let mut merger = Merger::default();
        let mut imports = Vec::new();

        for config in configs {
            imports.extend(config.imports.iter().cloned());

            let source = config.source.clone().unwrap_or_else(|| SourceInfo {
                file_path: PathBuf::from("<unknown>"),
                content: String::new(),
            });

            if config.is_empty() {
                merger
                    .diagnostics
                    .push(Diagnostic::Warning(Warning::EmptyConfig {
                        file_path: source.file_path.clone(),
                    }));
            }

            if let Some(logging) = config.logging {
                let target = result.logging.get_or_insert_with(Default::default);
                merger.field("logging.level", &source, &mut target.level, logging.level);

                for (key, value) in logging.overrides.into_iter().flatten() {
                    if merger.claim(format!("logging.overrides.{}", key), value.span(), &source) {
                        target
                            .overrides
                            .get_or_insert_with(HashMap::new)
                            .insert(key, value);
                    }
                }
            }

            if let Some(tree) = config.tree {
                let target = result.tree.get_or_insert_with(Default::default);
                merger.field("tree.language", &source, &mut target.language, tree.language);
                merger.field(
                    "tree.default_language",
                    &source,
                    &mut target.default_language,
                    tree.default_language,
                );
                merger.field("tree.reserved", &source, &mut target.reserved, tree.reserved);
                merger.field("tree.root_prefix", &source, &mut target.root_prefix, tree.root_prefix);
            }

            if let Some(detect) = config.detect {
                let target = result.detect.get_or_insert_with(Default::default);
                merger.field(
                    "detect.namespaces",
                    &source,
                    &mut target.namespaces,
                    detect.namespaces,
                );
            }

            if let Some(ui) = config.ui {
                let target = result.ui.get_or_insert_with(Default::default);
                merger.field("ui.state_path", &source, &mut target.state_path, ui.state_path);
            }

            if let Some(api) = config.api {
                let target = result.api.get_or_insert_with(Default::default);
                merger.field("api.listen", &source, &mut target.listen, api.listen);
                merger.field("api.port", &source, &mut target.port, api.port);
            }

            // Patterns conflict as a whole, per device type
            let mut names: Vec<(String, PartialPattern)> =
                config.patterns.into_iter().flatten().collect();
            names.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, pattern) in names {
                let headers = [
                    format!("[patterns.{}]", name),
                    format!("[[patterns.{}.states]]", name),
                ];
                let span = header_span(&source.content, &headers);
                if merger.claim(format!("patterns.{}", name), span, &source) {
                    result
                        .patterns
                        .get_or_insert_with(HashMap::new)
                        .insert(name, pattern);
                }
            }
        }

        result.imports = imports;
        result.locations = merger.locations;

        (result, merger.diagnostics)
    }
}
