//! The `compile_betterproto` build command
//!
//! Compiles the project's proto files with protoc and the betterproto plugin.
//! [`register`] makes it the first sub-command of the host's build action so
//! generated files exist before anything else is built.


use log::info;
use serde::Serialize;
use std::fmt;

use crate::config::{MetadataSource, ProtobufConfig, RawOptions};
use crate::error::{CompilationError, Error, Result};
use crate::host::{BuildCommand, BuildTool, SubCommands, UserOption};
use crate::protoc::{Compiler, ExternalTool, ProcessTool};

/// Name the command is registered under in the host build tool
pub const COMMAND_NAME: &str = "compile_betterproto";

const DESCRIPTION: &str = "compile protobuf files using betterproto";

/// Options of the command
pub const USER_OPTIONS: [UserOption; 4] = [
    UserOption {
        long: "proto-path",
        help: "path of the root directory containing the protobuf files",
    },
    UserOption {
        long: "proto-glob",
        help: "glob pattern to use to find the protobuf files",
    },
    UserOption {
        long: "include-paths",
        help: "comma-separated list of paths to include when compiling the protobuf files",
    },
    UserOption {
        long: "out-dir",
        help: "path of the root directory where the Python files will be generated",
    },
];

/// Lifecycle state of the command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    OptionsInitialized,
    OptionsFinalized,
    Executed,
    Skipped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Uninitialized => "uninitialized",
            State::OptionsInitialized => "options-initialized",
            State::OptionsFinalized => "options-finalized",
            State::Executed => "executed",
            State::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// What a run of the command did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No proto files matched; protoc was not invoked
    Skipped,
    /// protoc succeeded on these files
    Compiled { files: Vec<String> },
}

/// An option together with its current value, for help output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionDescription {
    pub option: &'static str,
    pub help: &'static str,
    pub value: String,
}

/// Build command compiling proto files with the betterproto plugin
pub struct CompileBetterproto {
    source: MetadataSource,
    raw: RawOptions,
    config: Option<ProtobufConfig>,
    state: State,
    compiler: Option<Compiler>,
    tool: Box<dyn ExternalTool>,
}

impl CompileBetterproto {
    /// Create the command for the project described by `source`.
    ///
    /// protoc is looked up when the command runs unless a compiler is set
    /// with [`CompileBetterproto::with_compiler`].
    pub fn new(source: MetadataSource) -> Self {
        CompileBetterproto {
            source,
            raw: RawOptions::default(),
            config: None,
            state: State::Uninitialized,
            compiler: None,
            tool: Box::new(ProcessTool),
        }
    }

    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Run protoc through `tool` instead of a child process
    pub fn with_tool(mut self, tool: Box<dyn ExternalTool>) -> Self {
        self.tool = tool;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn raw_options(&self) -> &RawOptions {
        &self.raw
    }

    /// The configuration resolved by the last initialize or finalize
    pub fn config(&self) -> Option<&ProtobufConfig> {
        self.config.as_ref()
    }

    /// Options with their current raw values
    pub fn describe_options(&self) -> Vec<OptionDescription> {
        USER_OPTIONS
            .iter()
            .map(|option| OptionDescription {
                option: option.long,
                help: option.help,
                value: self.raw_value(option.long).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Compile the proto files, or skip if there are none.
    pub fn compile(&mut self) -> Result<RunOutcome> {
        let config = match (&self.config, self.state) {
            (Some(config), State::OptionsFinalized) => config,
            _ => return Err(self.invalid_state("run")),
        };

        let proto_files = config.expanded_proto_files()?;
        if proto_files.is_empty() {
            info!(
                "No proto files found in {} with glob {}, skipping compilation of proto files.",
                config.proto_path(),
                config.proto_glob()
            );
            self.state = State::Skipped;
            return Ok(RunOutcome::Skipped);
        }

        let compiler = match &self.compiler {
            Some(compiler) => compiler.clone(),
            None => Compiler::discover()?,
        };
        let invocation = compiler.invocation(config, &proto_files);

        let out_dir = config.out_dir();
        if !out_dir.is_dir() {
            info!("Creating output directory {}", out_dir.display());
            std::fs::create_dir_all(&out_dir).map_err(|source| CompilationError::OutputDir {
                path: out_dir.clone(),
                source,
            })?;
        }

        invocation.run(self.tool.as_mut())?;
        self.state = State::Executed;
        Ok(RunOutcome::Compiled { files: proto_files })
    }

    fn raw_value(&self, option: &str) -> Option<&String> {
        match option {
            "proto-path" => Some(&self.raw.proto_path),
            "proto-glob" => Some(&self.raw.proto_glob),
            "include-paths" => Some(&self.raw.include_paths),
            "out-dir" => Some(&self.raw.out_path),
            _ => None,
        }
    }

    fn raw_value_mut(&mut self, option: &str) -> Option<&mut String> {
        match option {
            "proto-path" => Some(&mut self.raw.proto_path),
            "proto-glob" => Some(&mut self.raw.proto_glob),
            "include-paths" => Some(&mut self.raw.include_paths),
            "out-dir" => Some(&mut self.raw.out_path),
            _ => None,
        }
    }

    fn invalid_state(&self, action: &'static str) -> Error {
        Error::InvalidState {
            command: COMMAND_NAME.to_string(),
            action,
            state: self.state.to_string(),
        }
    }
}

impl BuildCommand for CompileBetterproto {
    fn name(&self) -> &str {
        COMMAND_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn user_options(&self) -> &[UserOption] {
        &USER_OPTIONS
    }

    fn initialize_options(&mut self) -> Result<()> {
        let config = ProtobufConfig::from_metadata(&self.source)?;
        self.raw = RawOptions::from_config(&config);
        self.config = Some(config);
        self.state = State::OptionsInitialized;
        Ok(())
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<()> {
        match self.state {
            State::OptionsInitialized => {}
            State::Uninitialized => return Err(self.invalid_state("set options")),
            _ => return Err(Error::OptionsFrozen(COMMAND_NAME.to_string())),
        }
        let slot = self.raw_value_mut(name).ok_or_else(|| Error::UnknownOption {
            command: COMMAND_NAME.to_string(),
            option: name.to_string(),
        })?;
        *slot = value.to_string();
        Ok(())
    }

    fn finalize_options(&mut self) -> Result<()> {
        match self.state {
            State::OptionsInitialized | State::OptionsFinalized => {}
            _ => return Err(self.invalid_state("finalize options")),
        }
        let config = ProtobufConfig::from_strings(self.source.project_root(), &self.raw)?;
        config.validate_paths()?;
        self.config = Some(config);
        self.state = State::OptionsFinalized;
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        self.compile().map(|_| ())
    }
}

/// Make `compile_betterproto` the first sub-command of the build action.
///
/// No predicate is attached; the command skips itself when there are no
/// proto files.
pub fn register(sub_commands: &mut SubCommands) {
    sub_commands.insert(0, COMMAND_NAME, None);
}

/// Register the command with a host build tool and hook it into the build
/// action. Meant to be called once while the tool is set up.
pub fn install(tool: &mut BuildTool, source: MetadataSource, compiler: Option<Compiler>) {
    tool.register_command(
        COMMAND_NAME,
        Box::new(move || -> Box<dyn BuildCommand> {
            let command = CompileBetterproto::new(source.clone());
            match &compiler {
                Some(compiler) => Box::new(command.with_compiler(compiler.clone())),
                None => Box::new(command),
            }
        }),
    );
    register(tool.sub_commands_mut());
}
