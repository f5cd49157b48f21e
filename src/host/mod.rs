//! Extension points of the host build tool
//!
//! The host drives each build sub-command through the same lifecycle:
//! initialize options, apply user-supplied options, finalize, run.

mod registry;
mod tool;

pub use registry::{Predicate, SubCommand, SubCommands};
pub use tool::{BuildTool, CommandFactory};

use crate::error::Result;

/// A user-settable option of a build command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserOption {
    /// Long flag name, without the leading dashes
    pub long: &'static str,
    pub help: &'static str,
}

/// A command the host build tool can run as part of a build
pub trait BuildCommand {
    /// Name the command is registered under
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn user_options(&self) -> &[UserOption];

    /// Set every option to its default value
    fn initialize_options(&mut self) -> Result<()>;

    /// Set an option by its long name
    fn set_option(&mut self, name: &str, value: &str) -> Result<()>;

    /// Resolve the options set so far into the final configuration
    fn finalize_options(&mut self) -> Result<()>;

    fn run(&mut self) -> Result<()>;
}
