use std::fmt;

/// Decides at build time whether a sub-command runs
pub type Predicate = fn() -> bool;

/// An entry of the build action's ordered sub-command list
#[derive(Clone)]
pub struct SubCommand {
    pub name: String,
    /// `None` means the sub-command always runs
    pub predicate: Option<Predicate>,
}

impl SubCommand {
    pub fn should_run(&self) -> bool {
        self.predicate.map_or(true, |predicate| predicate())
    }
}

impl fmt::Debug for SubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubCommand")
            .field("name", &self.name)
            .field("gated", &self.predicate.is_some())
            .finish()
    }
}

/// Ordered sub-commands making up the host's build action
#[derive(Debug, Clone, Default)]
pub struct SubCommands {
    entries: Vec<SubCommand>,
}

impl SubCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a sub-command at `index`, shifting later entries
    pub fn insert(&mut self, index: usize, name: impl Into<String>, predicate: Option<Predicate>) {
        let index = index.min(self.entries.len());
        self.entries.insert(
            index,
            SubCommand {
                name: name.into(),
                predicate,
            },
        );
    }

    /// Append a sub-command at the end
    pub fn push(&mut self, name: impl Into<String>, predicate: Option<Predicate>) {
        self.insert(self.entries.len(), name, predicate);
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubCommand> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never() -> bool {
        false
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut sub_commands = SubCommands::new();
        sub_commands.push("build_py", None);
        sub_commands.push("build_ext", None);
        sub_commands.insert(1, "build_clib", None);

        assert_eq!(sub_commands.names(), ["build_py", "build_clib", "build_ext"]);
    }

    #[test]
    fn test_insert_past_end_appends() {
        let mut sub_commands = SubCommands::new();
        sub_commands.insert(10, "build_py", None);
        assert_eq!(sub_commands.names(), ["build_py"]);
    }

    #[test]
    fn test_predicate_gates_sub_command() {
        let mut sub_commands = SubCommands::new();
        sub_commands.push("always", None);
        sub_commands.push("gated", Some(never));

        let runs: Vec<bool> = sub_commands.iter().map(SubCommand::should_run).collect();
        assert_eq!(runs, [true, false]);
    }
}
