//! Error handling for the condense CLI

use thiserror::Error;
use std::path::PathBuf;

/// Configuration and validation errors reported before any output is written
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("{message}")]
    MissingInput { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("External tool error: {tool} - {message}")]
    ExternalTool { tool: String, message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn missing_input<S: Into<String>>(message: S) -> Self {
        Self::MissingInput { message: message.into() }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn external_tool<S: Into<String>>(tool: S, message: S) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {}", err))
    }
}

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file",
                path.display()
            ));
        }

        CliError::ExternalTool { tool, .. } => match tool.as_str() {
            "samtools" => {
                message.push_str(
                    "\n\nSuggestions:\n\
                     • Install samtools: https://www.htslib.org/download/\n\
                     • Ensure samtools is in your PATH, or set [coverage] samtools in condense.toml\n\
                     • Plain .sam and .sam.gz inputs are read without samtools",
                );
            }
            _ => {
                message.push_str(&format!(
                    "\n\nSuggestions:\n\
                     • Install {}\n\
                     • Ensure {} is in your PATH",
                    tool, tool
                ));
            }
        },

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your condense.toml configuration file\n\
                 • Verify that all configuration values are valid",
            );
        }

        _ => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CliError::config("test message");
        assert!(matches!(err, CliError::Config { .. }));
        assert_eq!(err.to_string(), "Configuration error: test message");
    }

    #[test]
    fn test_missing_input_message() {
        let err = CliError::missing_input("there is no reference file input");
        assert_eq!(err.to_string(), "there is no reference file input");
        assert_eq!(format_error_with_suggestions(&err), err.to_string());
    }

    #[test]
    fn test_error_suggestions() {
        let err = CliError::file_not_found(PathBuf::from("sample.bam"));
        let formatted = format_error_with_suggestions(&err);
        assert!(formatted.contains("Suggestions:"));
        assert!(formatted.contains("Check that the file path is correct: sample.bam"));

        let err = CliError::external_tool("samtools", "No such file or directory");
        assert!(format_error_with_suggestions(&err).contains("htslib"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let cli_err: CliError = toml_err.into();
        assert!(matches!(cli_err, CliError::Config { .. }));
    }
}
