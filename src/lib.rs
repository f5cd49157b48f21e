//! Compile protobuf files as part of a package build
//!
//! This library provides a build command that finds `.proto` files under a
//! configured directory and compiles them with protoc and the betterproto
//! plugin. The command is hooked in as the first sub-command of the host
//! build tool's build action, so generated code exists before any other
//! build step runs.
//!
//! # Example
//!
//! ```rust,no_run
//! use betterproto_build::{command, BuildTool, MetadataSource};
//!
//! fn main() -> Result<(), betterproto_build::Error> {
//!     let mut tool = BuildTool::new();
//!     command::install(&mut tool, MetadataSource::new("."), None);
//!     tool.run_build()?;
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod host;
pub mod protoc;

pub use command::{register, CompileBetterproto, RunOutcome};
pub use config::{MetadataSource, ProtobufConfig, RawOptions};
pub use error::{CompilationError, ConfigurationError, Error, Result};
pub use host::{BuildCommand, BuildTool, SubCommands};
pub use protoc::{Compiler, ExternalTool, ProcessTool, ToolOutput};
