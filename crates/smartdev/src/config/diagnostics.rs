use std::io::Write;
use std::ops::Range;
use std::path::PathBuf;

/// Source information for where a diagnostic came from
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub file_path: PathBuf,
    pub content: String,
}

/// A diagnostic message that can be either a warning or an error
#[derive(Debug, Clone)]
pub enum Diagnostic {
    Warning(Warning),
    Error(Error),
}

/// Warning messages that don't prevent config loading
#[derive(Debug, Clone)]
pub enum Warning {
    EmptyConfig { file_path: PathBuf },
}

/// Error messages that indicate problems with the config
#[derive(Debug, Clone)]
pub enum Error {
    Merge(MergeError),
    Validation(ValidationError),
    Load(LoadError),
}

/// The same field set by more than one file
#[derive(Debug, Clone)]
pub struct MergeError {
    pub field_path: String,
    pub message: String,
    pub conflicts: Vec<FieldLocation>,
}

/// Where a field was defined
#[derive(Debug, Clone)]
pub struct FieldLocation {
    pub file_path: PathBuf,
    pub span: Range<usize>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field_path: String,
    pub message: String,
    pub location: Option<FieldLocation>,
}

/// Config loading failures. Errors are kept as strings so diagnostics stay
/// `Clone`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read '{}': {error}", path.display())]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse '{}': {error}", path.display())]
    Parse { path: PathBuf, error: String },

    #[error("Import cycle detected at '{}': involves {} file(s)", path.display(), cycle.len())]
    ImportCycle { path: PathBuf, cycle: Vec<PathBuf> },
}

/// A collection of diagnostics containing at least one error
#[derive(Debug, Clone)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_diagnostics(&self.0))
    }
}

impl std::error::Error for Diagnostics {}

impl From<LoadError> for Diagnostics {
    fn from(error: LoadError) -> Self {
        Diagnostics(vec![Diagnostic::Error(Error::Load(error))])
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_diagnostics(std::slice::from_ref(self)))
    }
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        matches!(self, Diagnostic::Error(_))
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Diagnostic::Warning(_))
    }
}

fn file_id(path: &std::path::Path) -> String {
    path.to_string_lossy().to_string()
}

fn format_merge_error(merge_error: &MergeError, output: &mut Vec<u8>) {
    use ariadne::Color;
    use ariadne::Label;
    use ariadne::Report;
    use ariadne::ReportKind;
    use ariadne::Source;

    let Some(first) = merge_error.conflicts.first() else {
        writeln!(output, "Error: Merge conflict in field '{}'", merge_error.field_path).ok();
        return;
    };

    let mut report = Report::build(ReportKind::Error, (file_id(&first.file_path), first.span.clone()))
        .with_message(format!("Merge conflict in field '{}'", merge_error.field_path))
        .with_note(&merge_error.message);

    for (idx, conflict) in merge_error.conflicts.iter().enumerate() {
        let label_msg = if idx == 0 {
            "first definition here"
        } else {
            "conflicts with this definition"
        };

        report = report.with_label(
            Label::new((file_id(&conflict.file_path), conflict.span.clone()))
                .with_message(label_msg)
                .with_color(if idx == 0 { Color::Red } else { Color::Yellow }),
        );
    }

    let finished_report = report.finish();

    // One write per source file; labels pointing at other files are skipped by ariadne.
    let mut written_files = std::collections::HashSet::new();
    for conflict in &merge_error.conflicts {
        let id = file_id(&conflict.file_path);
        if written_files.insert(id.clone()) {
            let source = Source::from(conflict.content.clone());
            finished_report.write((id, source), &mut *output).ok();
        }
    }
}

fn format_validation_error(validation_error: &ValidationError, output: &mut Vec<u8>) {
    use ariadne::Color;
    use ariadne::Label;
    use ariadne::Report;
    use ariadne::ReportKind;
    use ariadne::Source;

    match &validation_error.location {
        Some(location) if !location.span.is_empty() => {
            let id = file_id(&location.file_path);
            let report = Report::build(ReportKind::Error, (id.clone(), location.span.clone()))
                .with_message(format!(
                    "Validation error in '{}'",
                    validation_error.field_path
                ))
                .with_label(
                    Label::new((id.clone(), location.span.clone()))
                        .with_message(&validation_error.message)
                        .with_color(Color::Red),
                )
                .finish();

            let source = Source::from(location.content.clone());
            report.write((id, source), &mut *output).ok();
        }
        _ => {
            writeln!(
                output,
                "Error: Validation error in '{}': {}",
                validation_error.field_path, validation_error.message
            )
            .ok();
            if let Some(location) = &validation_error.location {
                writeln!(output, "  ┌─ {}", location.file_path.display()).ok();
            }
        }
    }
}

/// Format all diagnostics for display using Ariadne
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut output = Vec::new();

    for diagnostic in diagnostics {
        match diagnostic {
            Diagnostic::Warning(Warning::EmptyConfig { file_path }) => {
                writeln!(
                    output,
                    "Warning: Config file '{}' is empty and has no effect",
                    file_path.display()
                )
                .ok();
            }
            Diagnostic::Error(Error::Merge(merge_error)) => format_merge_error(merge_error, &mut output),
            Diagnostic::Error(Error::Validation(validation_error)) => {
                format_validation_error(validation_error, &mut output)
            }
            Diagnostic::Error(Error::Load(load_error)) => {
                writeln!(output, "Error: {}", load_error).ok();
            }
        }
    }

    String::from_utf8_lossy(&output).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_kinds() {
        let error = Diagnostic::Error(Error::Validation(ValidationError {
            field_path: "api.port".to_string(),
            message: "port must not be 0".to_string(),
            location: None,
        }));
        assert!(error.is_error());
        assert!(!error.is_warning());

        let warning = Diagnostic::Warning(Warning::EmptyConfig {
            file_path: PathBuf::from("test.toml"),
        });
        assert!(warning.is_warning());
        assert!(!warning.is_error());
    }

    #[test]
    fn test_format_plain_diagnostics() {
        let diagnostics = vec![
            Diagnostic::Warning(Warning::EmptyConfig {
                file_path: PathBuf::from("/tmp/empty.toml"),
            }),
            Diagnostic::Error(Error::Validation(ValidationError {
                field_path: "tree.language".to_string(),
                message: "language must not be empty".to_string(),
                location: None,
            })),
            Diagnostic::Error(Error::Load(LoadError::ImportCycle {
                path: PathBuf::from("/tmp/a.toml"),
                cycle: vec![PathBuf::from("/tmp/a.toml"), PathBuf::from("/tmp/b.toml")],
            })),
        ];

        insta::assert_snapshot!(format_diagnostics(&diagnostics), @r"
        Warning: Config file '/tmp/empty.toml' is empty and has no effect
        Error: Validation error in 'tree.language': language must not be empty
        Error: Import cycle detected at '/tmp/a.toml': involves 2 file(s)
        ");
    }

    #[test]
    fn test_format_merge_error_mentions_field() {
        let content = "[api]\nport = 8566\n";
        let location = |file: &str| FieldLocation {
            file_path: PathBuf::from(file),
            span: 13..17,
            content: content.to_string(),
        };
        let diagnostics = Diagnostics(vec![Diagnostic::Error(Error::Merge(MergeError {
            field_path: "api.port".to_string(),
            message: "'api.port' defined in multiple config files".to_string(),
            conflicts: vec![location("/tmp/base.toml"), location("/tmp/local.toml")],
        }))]);

        let output = diagnostics.to_string();
        assert!(output.contains("Merge conflict in field 'api.port'"));
        assert!(output.contains("first definition here"));
    }
}
