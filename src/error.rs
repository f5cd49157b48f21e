use std::io;
use std::path::PathBuf;

/// Errors raised while resolving the build step configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to read project metadata {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed project metadata {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Section [{section}] in {} is not a table", .path.display())]
    InvalidSection { path: PathBuf, section: String },
    #[error("Invalid field in section [{section}] of {}: {source}", .path.display())]
    InvalidField {
        path: PathBuf,
        section: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid proto glob {pattern:?}: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("{field} {} exists but is not a directory", .path.display())]
    NotADirectory { field: &'static str, path: PathBuf },
    #[error("{field} {} cannot be read: {source}", .path.display())]
    UnreadableDirectory {
        field: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to search for proto files under {}: {source}", .path.display())]
    Search {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

/// Errors raised while running the protobuf compiler
#[derive(Debug, thiserror::Error)]
pub enum CompilationError {
    #[error("protoc not found. Set the PROTOC env var, pass --protoc, or install protoc.")]
    CompilerNotFound,
    #[error("Failed to create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` failed ({}){}", exit_description(.code), stderr_suffix(.stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Top-level error for the build step and its host
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    #[error("Unknown option '{option}' for command '{command}'")]
    UnknownOption { command: String, option: String },
    #[error("Options of command '{0}' are already finalized")]
    OptionsFrozen(String),
    #[error("Command '{command}' cannot {action} in state {state}")]
    InvalidState {
        command: String,
        action: &'static str,
        state: String,
    },
    #[error("No command registered under the name '{0}'")]
    UnknownCommand(String),
}

/// A Result type specialized for build step operations
pub type Result<T> = std::result::Result<T, Error>;

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    // Keep very long compiler output readable
    const MAX_LEN: usize = 1000;
    let stderr = stderr.trim();
    if stderr.is_empty() {
        return String::new();
    }
    if stderr.len() > MAX_LEN {
        let mut end = MAX_LEN;
        while !stderr.is_char_boundary(end) {
            end -= 1;
        }
        format!(": {}... (truncated)", &stderr[..end])
    } else {
        format!(": {}", stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_display_includes_command_line() {
        let error = CompilationError::Failed {
            command: "protoc -Iproto proto/a.proto".to_string(),
            code: Some(1),
            stderr: "proto/a.proto:3:1: Expected \"message\".\n".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "`protoc -Iproto proto/a.proto` failed (exit status 1): proto/a.proto:3:1: Expected \"message\"."
        );
    }

    #[test]
    fn test_failed_display_truncates_long_stderr() {
        let error = CompilationError::Failed {
            command: "protoc".to_string(),
            code: None,
            stderr: "x".repeat(2000),
        };
        let message = error.to_string();
        assert!(message.starts_with("`protoc` failed (terminated by signal): "));
        assert!(message.ends_with("... (truncated)"));
    }

    #[test]
    fn test_configuration_error_wraps_transparently() {
        let error: Error = ConfigurationError::NotADirectory {
            field: "out_path",
            path: PathBuf::from("py"),
        }
        .into();
        assert_eq!(error.to_string(), "out_path py exists but is not a directory");
    }
}
