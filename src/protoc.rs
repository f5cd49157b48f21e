//! Protoc invocation utilities.

use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ProtobufConfig;
use crate::error::CompilationError;

/// Code generation plugin passed to protoc as `--<plugin>_out`
pub const BETTERPROTO_PLUGIN: &str = "python_betterproto";

/// Captured result of an external tool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Capability to run an external program to completion
pub trait ExternalTool {
    fn invoke(&mut self, program: &Path, args: &[String], cwd: &Path) -> io::Result<ToolOutput>;
}

/// Runs programs as blocking child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTool;

impl ExternalTool for ProcessTool {
    fn invoke(&mut self, program: &Path, args: &[String], cwd: &Path) -> io::Result<ToolOutput> {
        let output = Command::new(program).args(args).current_dir(cwd).output()?;
        Ok(ToolOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// The protoc executable plus any arguments that must precede the generated ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiler {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl Compiler {
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Compiler {
            program: program.as_ref().to_path_buf(),
            leading_args: Vec::new(),
        }
    }

    /// Find the protoc executable.
    pub fn discover() -> Result<Self, CompilationError> {
        // Check PROTOC environment variable first
        if let Ok(path) = std::env::var("PROTOC") {
            let path = PathBuf::from(path);
            if path.is_file() {
                return Ok(Compiler::new(path));
            }
            warn!("PROTOC={} does not exist, searching PATH", path.display());
        }

        which::which("protoc")
            .map(Compiler::new)
            .map_err(|_| CompilationError::CompilerNotFound)
    }

    /// Add an argument placed before the include flags, e.g. `-m grpc_tools.protoc`
    pub fn leading_arg(mut self, arg: impl Into<String>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    /// Build the protoc arguments for the given configuration and files
    pub fn invocation(&self, config: &ProtobufConfig, proto_files: &[String]) -> Invocation {
        let mut args = self.leading_args.clone();

        for include in std::iter::once(config.proto_path()).chain(
            config.include_paths().iter().map(String::as_str),
        ) {
            args.push(format!("-I{}", include));
        }

        args.push(format!("--{}_out={}", BETTERPROTO_PLUGIN, config.out_path()));
        args.extend(proto_files.iter().cloned());

        Invocation {
            program: self.program.clone(),
            args,
            cwd: config.project_root().to_path_buf(),
        }
    }
}

/// A fully built protoc command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    /// Command line as a single string, for diagnostics
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the invocation to completion, failing on a non-zero exit
    pub fn run(&self, tool: &mut dyn ExternalTool) -> Result<ToolOutput, CompilationError> {
        let command = self.command_line();
        info!("Compiling proto files via: {}", command);

        let output = tool
            .invoke(&self.program, &self.args, &self.cwd)
            .map_err(|source| CompilationError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("protoc stdout: {}", stdout.trim_end());
        }

        if !output.success() {
            return Err(CompilationError::Failed {
                command,
                code: output.code,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!("protoc: {}", stderr.trim_end());
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawOptions;

    struct FixedTool(ToolOutput);

    impl ExternalTool for FixedTool {
        fn invoke(&mut self, _: &Path, _: &[String], _: &Path) -> io::Result<ToolOutput> {
            Ok(self.0.clone())
        }
    }

    struct BrokenTool;

    impl ExternalTool for BrokenTool {
        fn invoke(&mut self, _: &Path, _: &[String], _: &Path) -> io::Result<ToolOutput> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    fn config() -> ProtobufConfig {
        let raw = RawOptions {
            proto_path: "P".to_string(),
            proto_glob: String::new(),
            include_paths: "I1,I2".to_string(),
            out_path: "O".to_string(),
        };
        ProtobufConfig::from_strings("/project", &raw).unwrap()
    }

    #[test]
    fn test_invocation_argument_order() {
        let files = vec!["a.proto".to_string(), "b.proto".to_string()];
        let invocation = Compiler::new("protoc").invocation(&config(), &files);

        assert_eq!(
            invocation.args,
            [
                "-IP",
                "-II1",
                "-II2",
                "--python_betterproto_out=O",
                "a.proto",
                "b.proto"
            ]
        );
        assert_eq!(invocation.cwd, PathBuf::from("/project"));
    }

    #[test]
    fn test_invocation_leading_args_come_first() {
        let compiler = Compiler::new("python3")
            .leading_arg("-m")
            .leading_arg("grpc_tools.protoc");
        let invocation = compiler.invocation(&config(), &["a.proto".to_string()]);

        assert_eq!(invocation.args[..3], ["-m", "grpc_tools.protoc", "-IP"]);
        assert_eq!(
            invocation.command_line(),
            "python3 -m grpc_tools.protoc -IP -II1 -II2 --python_betterproto_out=O a.proto"
        );
    }

    #[test]
    fn test_run_non_zero_exit_is_a_compilation_error() {
        let invocation = Compiler::new("protoc").invocation(&config(), &["a.proto".to_string()]);
        let mut tool = FixedTool(ToolOutput {
            code: Some(1),
            stdout: Vec::new(),
            stderr: b"a.proto: File not found.".to_vec(),
        });

        match invocation.run(&mut tool) {
            Err(CompilationError::Failed {
                command,
                code,
                stderr,
            }) => {
                assert_eq!(command, invocation.command_line());
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "a.proto: File not found.");
            }
            other => panic!("expected a compilation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_run_spawn_failure() {
        let invocation = Compiler::new("protoc").invocation(&config(), &["a.proto".to_string()]);
        assert!(matches!(
            invocation.run(&mut BrokenTool),
            Err(CompilationError::Spawn { .. })
        ));
    }

    #[test]
    fn test_run_success() {
        let invocation = Compiler::new("protoc").invocation(&config(), &["a.proto".to_string()]);
        let mut tool = FixedTool(ToolOutput {
            code: Some(0),
            ..ToolOutput::default()
        });
        assert!(invocation.run(&mut tool).unwrap().success());
    }

    #[test]
    fn test_discover_prefers_existing_protoc_env_var() {
        // PROTOC is process-wide; keep both cases in one test
        let temp_dir = tempfile::tempdir().unwrap();
        let protoc = temp_dir.path().join("protoc");
        std::fs::write(&protoc, "").unwrap();
        let previous = std::env::var_os("PROTOC");

        std::env::set_var("PROTOC", &protoc);
        let found = Compiler::discover();

        let missing = temp_dir.path().join("missing-protoc");
        std::env::set_var("PROTOC", &missing);
        let fallback = Compiler::discover();

        match previous {
            Some(value) => std::env::set_var("PROTOC", value),
            None => std::env::remove_var("PROTOC"),
        }

        assert_eq!(found.unwrap().program, protoc);
        match fallback {
            Ok(compiler) => assert_ne!(compiler.program, missing),
            Err(err) => assert!(matches!(err, CompilationError::CompilerNotFound)),
        }
    }
}
