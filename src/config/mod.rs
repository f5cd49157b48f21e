//! Configuration resolution for the protobuf compile step
//!
//! A [`ProtobufConfig`] is resolved either from the project metadata file or
//! from the raw string options a build command received on its command line.

pub mod metadata;


use glob::{MatchOptions, Pattern};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ConfigurationError;

pub use metadata::MetadataSource;

/// Default root directory containing the proto files
pub const DEFAULT_PROTO_PATH: &str = "proto";

/// Default glob used to find proto files under the proto path
pub const DEFAULT_PROTO_GLOB: &str = "**/*.proto";

/// Default root directory for the generated files
pub const DEFAULT_OUT_PATH: &str = "py";

/// Resolved configuration of the protobuf compile step.
///
/// Values are never mutated after construction; resolving again produces a
/// new instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtobufConfig {
    proto_path: String,
    proto_glob: String,
    include_paths: Vec<String>,
    out_path: String,
    project_root: PathBuf,
}

/// Raw string options, as received from a command line.
///
/// `include_paths` holds a comma-separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOptions {
    pub proto_path: String,
    pub proto_glob: String,
    pub include_paths: String,
    pub out_path: String,
}

impl RawOptions {
    /// Render a resolved configuration back as raw strings
    pub fn from_config(config: &ProtobufConfig) -> Self {
        RawOptions {
            proto_path: config.proto_path.clone(),
            proto_glob: config.proto_glob.clone(),
            include_paths: config.include_paths.join(","),
            out_path: config.out_path.clone(),
        }
    }
}

impl ProtobufConfig {
    /// Configuration made only of the built-in defaults
    pub fn new<P: AsRef<Path>>(project_root: P) -> Self {
        ProtobufConfig {
            proto_path: DEFAULT_PROTO_PATH.to_string(),
            proto_glob: DEFAULT_PROTO_GLOB.to_string(),
            include_paths: Vec::new(),
            out_path: DEFAULT_OUT_PATH.to_string(),
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    /// Resolve the configuration from the project metadata file.
    ///
    /// A missing file or section falls back to the defaults.
    pub fn from_metadata(source: &MetadataSource) -> Result<Self, ConfigurationError> {
        source.load()
    }

    /// Resolve the configuration from raw string options.
    ///
    /// Empty strings fall back to the defaults. `include_paths` is split on
    /// commas; segments are trimmed and empty ones dropped. The metadata file
    /// is never read.
    pub fn from_strings<P: AsRef<Path>>(
        project_root: P,
        raw: &RawOptions,
    ) -> Result<Self, ConfigurationError> {
        let defaults = ProtobufConfig::new(project_root);

        let include_paths = split_include_paths(&raw.include_paths);
        let config = ProtobufConfig {
            proto_path: non_empty_or(&raw.proto_path, defaults.proto_path),
            proto_glob: non_empty_or(&raw.proto_glob, defaults.proto_glob),
            include_paths: if include_paths.is_empty() {
                defaults.include_paths
            } else {
                include_paths
            },
            out_path: non_empty_or(&raw.out_path, defaults.out_path),
            project_root: defaults.project_root,
        };

        config.check_glob()?;
        debug!("Resolved protobuf configuration from strings: {:?}", config);
        Ok(config)
    }

    pub fn proto_path(&self) -> &str {
        &self.proto_path
    }

    pub fn proto_glob(&self) -> &str {
        &self.proto_glob
    }

    pub fn include_paths(&self) -> &[String] {
        &self.include_paths
    }

    pub fn out_path(&self) -> &str {
        &self.out_path
    }

    /// Directory relative paths are resolved against
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The proto path resolved against the project root
    pub fn proto_dir(&self) -> PathBuf {
        self.project_root.join(&self.proto_path)
    }

    /// The output path resolved against the project root
    pub fn out_dir(&self) -> PathBuf {
        self.project_root.join(&self.out_path)
    }

    /// Check that the proto and output paths are usable directories.
    ///
    /// Paths that do not exist yet are accepted. An existing proto path must
    /// be listable.
    pub fn validate_paths(&self) -> Result<(), ConfigurationError> {
        for (field, path) in [("proto_path", self.proto_dir()), ("out_path", self.out_dir())] {
            if path.exists() && !path.is_dir() {
                return Err(ConfigurationError::NotADirectory { field, path });
            }
        }

        let proto_dir = self.proto_dir();
        if proto_dir.is_dir() {
            if let Err(source) = fs::read_dir(&proto_dir) {
                return Err(ConfigurationError::UnreadableDirectory {
                    field: "proto_path",
                    path: proto_dir,
                    source,
                });
            }
        }
        Ok(())
    }

    /// Find the proto files matching the glob under the proto path.
    ///
    /// Computed on every call. Paths are returned joined onto `proto_path`,
    /// in a depth-first walk ordered by file name. A proto path that does not
    /// exist yields no files.
    pub fn expanded_proto_files(&self) -> Result<Vec<String>, ConfigurationError> {
        let pattern = self.check_glob()?;
        let root = self.proto_dir();

        if !root.is_dir() {
            debug!("Proto path {} does not exist", root.display());
            return Ok(Vec::new());
        }

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };

        let mut files = Vec::new();
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| ConfigurationError::Search {
                path: root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            if pattern.matches_path_with(relative, options) {
                let file = Path::new(&self.proto_path).join(relative);
                files.push(path_to_string(file)?);
            }
        }

        debug!(
            "Found {} proto files in {} with glob {}",
            files.len(),
            self.proto_path,
            self.proto_glob
        );
        Ok(files)
    }

    /// Overlay the fields present in a metadata section on the defaults
    pub(crate) fn with_overrides(
        mut self,
        proto_path: Option<String>,
        proto_glob: Option<String>,
        include_paths: Option<Vec<String>>,
        out_path: Option<String>,
    ) -> Result<Self, ConfigurationError> {
        if let Some(proto_path) = proto_path {
            self.proto_path = proto_path;
        }
        if let Some(proto_glob) = proto_glob {
            self.proto_glob = proto_glob;
        }
        if let Some(include_paths) = include_paths {
            self.include_paths = include_paths;
        }
        if let Some(out_path) = out_path {
            self.out_path = out_path;
        }
        self.check_glob()?;
        Ok(self)
    }

    fn check_glob(&self) -> Result<Pattern, ConfigurationError> {
        Pattern::new(&self.proto_glob).map_err(|source| ConfigurationError::InvalidGlob {
            pattern: self.proto_glob.clone(),
            source,
        })
    }
}

/// Split a comma-separated include path list
pub fn split_include_paths(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty_or(value: &str, default: String) -> String {
    let value = value.trim();
    if value.is_empty() {
        default
    } else {
        value.to_string()
    }
}

fn path_to_string(path: PathBuf) -> Result<String, ConfigurationError> {
    path.into_os_string()
        .into_string()
        .map_err(|raw| ConfigurationError::NonUtf8Path(PathBuf::from(raw)))
}
