//! Alias table that turns command specifications into argument vectors.

use std::collections::HashMap;

use tracing::debug;

use super::command::{CommandArgv, CommandInput, CommandSequence};
use crate::error::RegistryError;

/// Alias registered by [`CommandRegistry::new`].
pub const DEFAULT_TEST_ALIAS: &str = "pytest";

/// Maps aliases to command sequences and resolves free-form specifications.
///
/// Lookup is exact and case-sensitive. Anything that is not an alias is
/// shell-split into a single invocation.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: HashMap<String, CommandSequence>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Registry with the default `pytest` alias (`uv run pytest`).
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.commands.insert(
            DEFAULT_TEST_ALIAS.to_string(),
            CommandSequence::single(default_test_argv()),
        );
        registry
    }

    /// Registry without defaults, e.g. for lint commands.
    pub fn empty() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        input: impl Into<CommandInput>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let sequence = input.into().normalise()?;
        debug!(alias = %name, steps = sequence.len(), "registering command alias");
        self.commands.insert(name, sequence);
        Ok(())
    }

    /// Register sequences that were already normalised, e.g. from config.
    pub fn insert(&mut self, name: impl Into<String>, sequence: CommandSequence) {
        self.commands.insert(name.into(), sequence);
    }

    /// Register several aliases in order. Entries registered before a failing
    /// one stay registered.
    pub fn register_many<I, K, V>(&mut self, entries: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CommandInput>,
    {
        for (name, input) in entries {
            self.register(name, input)?;
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Resolve to a single invocation.
    ///
    /// For multi-step aliases only the first step is returned; use
    /// [`resolve_all`](Self::resolve_all) to get every step.
    pub fn resolve(&self, spec: &str) -> Result<CommandArgv, RegistryError> {
        let sequence = self.resolve_all(spec)?;
        Ok(sequence.first().clone())
    }

    pub fn resolve_all(&self, spec: &str) -> Result<CommandSequence, RegistryError> {
        if spec.is_empty() {
            return Err(RegistryError::EmptySpecification);
        }
        if let Some(sequence) = self.commands.get(spec) {
            return Ok(sequence.clone());
        }
        match CommandArgv::parse(spec) {
            Ok(argv) => Ok(CommandSequence::single(argv)),
            Err(RegistryError::InvalidCommand(_)) => Err(RegistryError::EmptySpecification),
            Err(err) => Err(err),
        }
    }
}

fn default_test_argv() -> CommandArgv {
    CommandArgv(vec!["uv".to_string(), "run".to_string(), "pytest".to_string()])
}
