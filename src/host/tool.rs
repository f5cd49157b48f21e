use log::{debug, info};
use std::collections::HashMap;

use super::{BuildCommand, SubCommands};
use crate::error::{Error, Result};

/// Creates a fresh command instance for a single run
pub type CommandFactory = Box<dyn Fn() -> Box<dyn BuildCommand>>;

/// Minimal host build tool: a set of named commands plus the ordered
/// sub-commands of its build action
#[derive(Default)]
pub struct BuildTool {
    sub_commands: SubCommands,
    factories: HashMap<String, CommandFactory>,
    options: HashMap<String, Vec<(String, String)>>,
}

impl BuildTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sub_commands(&self) -> &SubCommands {
        &self.sub_commands
    }

    pub fn sub_commands_mut(&mut self) -> &mut SubCommands {
        &mut self.sub_commands
    }

    /// Make a command available under `name`
    pub fn register_command(&mut self, name: impl Into<String>, factory: CommandFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Record a user-supplied option, applied when the command runs
    pub fn set_option(
        &mut self,
        command: impl Into<String>,
        option: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.options
            .entry(command.into())
            .or_default()
            .push((option.into(), value.into()));
    }

    /// Create a command with its options initialized and the recorded
    /// user options applied, but not yet finalized
    pub fn create_command(&self, name: &str) -> Result<Box<dyn BuildCommand>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::UnknownCommand(name.to_string()))?;

        let mut command = factory();
        command.initialize_options()?;
        if let Some(options) = self.options.get(name) {
            for (option, value) in options {
                debug!("Setting {}={} on {}", option, value, name);
                command.set_option(option, value)?;
            }
        }
        Ok(command)
    }

    /// Run a single command through its whole lifecycle
    pub fn run_command(&self, name: &str) -> Result<()> {
        let mut command = self.create_command(name)?;
        command.finalize_options()?;
        info!("running {}", name);
        command.run()
    }

    /// Run every sub-command of the build action in order.
    ///
    /// Stops at the first failure. Returns the names of the sub-commands
    /// that ran.
    pub fn run_build(&self) -> Result<Vec<String>> {
        let mut ran = Vec::new();
        for sub_command in self.sub_commands.iter() {
            if !sub_command.should_run() {
                debug!("Skipping sub-command {}", sub_command.name);
                continue;
            }
            self.run_command(&sub_command.name)?;
            ran.push(sub_command.name.clone());
        }
        Ok(ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::UserOption;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recording {
        name: &'static str,
        log: Log,
        fail: bool,
    }

    impl BuildCommand for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "records its lifecycle"
        }

        fn user_options(&self) -> &[UserOption] {
            &[]
        }

        fn initialize_options(&mut self) -> Result<()> {
            self.log.borrow_mut().push(format!("{}:initialize", self.name));
            Ok(())
        }

        fn set_option(&mut self, name: &str, value: &str) -> Result<()> {
            self.log
                .borrow_mut()
                .push(format!("{}:set {}={}", self.name, name, value));
            Ok(())
        }

        fn finalize_options(&mut self) -> Result<()> {
            self.log.borrow_mut().push(format!("{}:finalize", self.name));
            Ok(())
        }

        fn run(&mut self) -> Result<()> {
            self.log.borrow_mut().push(format!("{}:run", self.name));
            if self.fail {
                return Err(Error::UnknownCommand("simulated".to_string()));
            }
            Ok(())
        }
    }

    fn register(tool: &mut BuildTool, name: &'static str, log: &Log, fail: bool) {
        let log = log.clone();
        tool.register_command(
            name,
            Box::new(move || -> Box<dyn BuildCommand> {
                Box::new(Recording {
                    name,
                    log: log.clone(),
                    fail,
                })
            }),
        );
        tool.sub_commands_mut().push(name, None);
    }

    #[test]
    fn test_run_build_follows_lifecycle_in_order() {
        let log = Log::default();
        let mut tool = BuildTool::new();
        register(&mut tool, "first", &log, false);
        register(&mut tool, "second", &log, false);
        tool.set_option("second", "flag", "on");

        let ran = tool.run_build().unwrap();
        assert_eq!(ran, ["first", "second"]);
        assert_eq!(
            *log.borrow(),
            [
                "first:initialize",
                "first:finalize",
                "first:run",
                "second:initialize",
                "second:set flag=on",
                "second:finalize",
                "second:run",
            ]
        );
    }

    #[test]
    fn test_run_build_stops_at_first_failure() {
        let log = Log::default();
        let mut tool = BuildTool::new();
        register(&mut tool, "failing", &log, true);
        register(&mut tool, "after", &log, false);

        assert!(tool.run_build().is_err());
        assert!(!log.borrow().iter().any(|entry| entry.starts_with("after")));
    }

    #[test]
    fn test_unregistered_sub_command_is_an_error() {
        let mut tool = BuildTool::new();
        tool.sub_commands_mut().push("missing", None);
        assert!(matches!(tool.run_build(), Err(Error::UnknownCommand(name)) if name == "missing"));
    }
}
