//! Named test and lint commands loaded from TOML.
//!
//! Either the `[commands]` section of the app config or a standalone file
//! with top-level `[tests]` and `[lint]` tables:
//!
//! ```toml
//! [tests]
//! unit = "cargo test --lib"
//!
//! [lint]
//! ruff = ["uv", "run", "ruff", "check"]
//! quality = [["uv", "run", "ruff", "format"], "uv run ruff check"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::core::command::{CommandInput, CommandSequence};
use crate::core::registry::CommandRegistry;
use crate::error::{ConfigError, RegistryError};

/// Which table of a commands file to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCategory {
    Tests,
    Lint,
}

impl CommandCategory {
    pub fn section(self) -> &'static str {
        match self {
            Self::Tests => "tests",
            Self::Lint => "lint",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowCommandConfig {
    pub tests: BTreeMap<String, CommandSequence>,
    pub lint: BTreeMap<String, CommandSequence>,
}

impl WorkflowCommandConfig {
    /// Parse the `tests` and `lint` tables of `table`. Other keys are ignored.
    pub fn from_table(table: &toml::Table) -> Result<Self, ConfigError> {
        Ok(Self {
            tests: parse_section(table, CommandCategory::Tests)?,
            lint: parse_section(table, CommandCategory::Lint)?,
        })
    }

    /// Load a standalone commands file. Missing or empty files yield no
    /// commands.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "commands file missing");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let table: toml::Table = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_table(&table)
    }

    pub fn commands(&self, category: CommandCategory) -> &BTreeMap<String, CommandSequence> {
        match category {
            CommandCategory::Tests => &self.tests,
            CommandCategory::Lint => &self.lint,
        }
    }

    /// Later entries win on alias clashes.
    pub fn merged_with(mut self, other: Self) -> Self {
        self.tests.extend(other.tests);
        self.lint.extend(other.lint);
        self
    }

    /// Registry for one category. Test registries keep the `pytest` default;
    /// lint registries start empty.
    pub fn registry_for(&self, category: CommandCategory) -> CommandRegistry {
        let mut registry = match category {
            CommandCategory::Tests => CommandRegistry::new(),
            CommandCategory::Lint => CommandRegistry::empty(),
        };
        for (name, sequence) in self.commands(category) {
            registry.insert(name.clone(), sequence.clone());
        }
        registry
    }
}

fn parse_section(
    table: &toml::Table,
    category: CommandCategory,
) -> Result<BTreeMap<String, CommandSequence>, ConfigError> {
    let section = category.section();
    let Some(value) = table.get(section) else {
        return Ok(BTreeMap::new());
    };
    let entries = value.as_table().ok_or_else(|| {
        ConfigError::Invalid(format!(
            "{section} section must be a mapping of command names to commands"
        ))
    })?;

    let mut commands = BTreeMap::new();
    for (name, value) in entries {
        let sequence = CommandInput::try_from(value)
            .and_then(|input| input.normalise())
            .map_err(|err: RegistryError| {
                ConfigError::Invalid(format!("invalid {section} command `{name}`: {err}"))
            })?;
        commands.insert(name.clone(), sequence);
    }
    Ok(commands)
}
