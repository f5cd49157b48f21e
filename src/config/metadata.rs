//! Reading the build step configuration from the project metadata file

use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::ProtobufConfig;
use crate::error::ConfigurationError;

/// Name of the project metadata file, relative to the project root
pub const DEFAULT_METADATA_FILE: &str = "pyproject.toml";

/// Table holding the build step configuration inside the metadata file
pub const DEFAULT_SECTION: [&str; 2] = ["tool", "setuptools_betterproto"];

/// Where to look for the configuration section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSource {
    project_root: PathBuf,
    file: PathBuf,
    section: Vec<String>,
}

/// Fields recognized in the configuration section
#[derive(Debug, Default, Deserialize)]
struct MetadataSection {
    proto_path: Option<String>,
    proto_glob: Option<String>,
    include_paths: Option<Vec<String>>,
    out_path: Option<String>,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

impl MetadataSource {
    /// Look for `pyproject.toml` under `project_root`
    pub fn new<P: AsRef<Path>>(project_root: P) -> Self {
        MetadataSource {
            project_root: project_root.as_ref().to_path_buf(),
            file: PathBuf::from(DEFAULT_METADATA_FILE),
            section: DEFAULT_SECTION.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Use a different metadata file, relative to the project root
    pub fn with_file<P: AsRef<Path>>(mut self, file: P) -> Self {
        self.file = file.as_ref().to_path_buf();
        self
    }

    /// Use a different dotted section path, e.g. `tool.protos`
    pub fn with_section(mut self, section: &str) -> Self {
        self.section = section.split('.').map(String::from).collect();
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Full path of the metadata file
    pub fn path(&self) -> PathBuf {
        self.project_root.join(&self.file)
    }

    fn section_name(&self) -> String {
        self.section.join(".")
    }

    pub(super) fn load(&self) -> Result<ProtobufConfig, ConfigurationError> {
        let defaults = ProtobufConfig::new(&self.project_root);
        let path = self.path();

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{} not found, using default configuration", path.display());
                return Ok(defaults);
            }
            Err(source) => return Err(ConfigurationError::Unreadable { path, source }),
        };

        let document: toml::Table = toml::from_str(&content)
            .map_err(|source| ConfigurationError::Malformed {
                path: path.clone(),
                source,
            })?;

        let mut value = toml::Value::Table(document);
        for key in &self.section {
            let next = match value {
                toml::Value::Table(mut table) => table.remove(key),
                _ => {
                    return Err(ConfigurationError::InvalidSection {
                        path,
                        section: self.section_name(),
                    })
                }
            };
            match next {
                Some(next) => value = next,
                None => {
                    debug!(
                        "No [{}] section in {}, using default configuration",
                        self.section_name(),
                        path.display()
                    );
                    return Ok(defaults);
                }
            }
        }

        if !value.is_table() {
            return Err(ConfigurationError::InvalidSection {
                path,
                section: self.section_name(),
            });
        }

        let section: MetadataSection =
            value
                .try_into()
                .map_err(|source| ConfigurationError::InvalidField {
                    path: path.clone(),
                    section: self.section_name(),
                    source,
                })?;

        if !section.unknown.is_empty() {
            let keys: Vec<&str> = section.unknown.keys().map(String::as_str).collect();
            warn!(
                "Ignoring unknown configuration keys in [{}] of {}: {}",
                self.section_name(),
                path.display(),
                keys.join(", ")
            );
        }

        let config = defaults.with_overrides(
            section.proto_path,
            section.proto_glob,
            section.include_paths,
            section.out_path,
        )?;
        debug!(
            "Resolved protobuf configuration from {}: {:?}",
            path.display(),
            config
        );
        Ok(config)
    }
}
