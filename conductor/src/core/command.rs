//! Canonical command forms: argument vectors, sequences and registration input.

use std::fmt;

use crate::error::RegistryError;

const EMPTY_COMMAND: &str = "command must contain at least one element";

/// One process invocation: program followed by its arguments. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandArgv(pub(super) Vec<String>);

impl CommandArgv {
    pub fn new<I, S>(parts: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.is_empty() {
            return Err(RegistryError::InvalidCommand(EMPTY_COMMAND.to_string()));
        }
        Ok(Self(parts))
    }

    /// Split a shell-style line into a vector. Quotes and escapes are honored;
    /// variables are not expanded.
    pub fn parse(line: &str) -> Result<Self, RegistryError> {
        Self::new(tokenize(line)?)
    }

    pub fn program(&self) -> &str {
        &self.0[0]
    }

    pub fn args(&self) -> &[String] {
        &self.0[1..]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// Shell-quoted rendering suitable for logs and prompts.
    pub fn display(&self) -> String {
        display_argv(&self.0)
    }
}

impl fmt::Display for CommandArgv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Ordered, non-empty list of invocations registered under one alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSequence(Vec<CommandArgv>);

impl CommandSequence {
    pub fn single(argv: CommandArgv) -> Self {
        Self(vec![argv])
    }

    pub fn new(steps: Vec<CommandArgv>) -> Result<Self, RegistryError> {
        if steps.is_empty() {
            return Err(RegistryError::InvalidCommand(EMPTY_COMMAND.to_string()));
        }
        Ok(Self(steps))
    }

    pub fn first(&self) -> &CommandArgv {
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommandArgv> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a CommandSequence {
    type Item = &'a CommandArgv;
    type IntoIter = std::slice::Iter<'a, CommandArgv>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One element of a multi-step registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStep {
    /// Shell-style line, tokenized on normalisation.
    Line(String),
    /// Pre-split argument list.
    Argv(Vec<String>),
}

impl CommandStep {
    fn normalise(&self) -> Result<CommandArgv, RegistryError> {
        match self {
            Self::Line(line) => CommandArgv::parse(line),
            Self::Argv(parts) => CommandArgv::new(parts.iter().cloned()),
        }
    }
}

impl From<&str> for CommandStep {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<Vec<&str>> for CommandStep {
    fn from(parts: Vec<&str>) -> Self {
        Self::Argv(parts.into_iter().map(str::to_string).collect())
    }
}

/// Registration input accepted by [`crate::core::registry::CommandRegistry::register`].
///
/// A flat list of strings is one invocation, not one invocation per token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandInput {
    Line(String),
    Argv(Vec<String>),
    Steps(Vec<CommandStep>),
}

impl CommandInput {
    pub fn normalise(&self) -> Result<CommandSequence, RegistryError> {
        match self {
            Self::Line(line) => Ok(CommandSequence::single(CommandArgv::parse(line)?)),
            Self::Argv(parts) => Ok(CommandSequence::single(CommandArgv::new(
                parts.iter().cloned(),
            )?)),
            Self::Steps(steps) => {
                let argvs = steps
                    .iter()
                    .map(CommandStep::normalise)
                    .collect::<Result<Vec<_>, _>>()?;
                CommandSequence::new(argvs)
            }
        }
    }
}

impl From<&str> for CommandInput {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<String> for CommandInput {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

impl From<Vec<String>> for CommandInput {
    fn from(parts: Vec<String>) -> Self {
        Self::Argv(parts)
    }
}

impl From<Vec<&str>> for CommandInput {
    fn from(parts: Vec<&str>) -> Self {
        Self::Argv(parts.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<CommandStep>> for CommandInput {
    fn from(steps: Vec<CommandStep>) -> Self {
        Self::Steps(steps)
    }
}

impl TryFrom<&toml::Value> for CommandInput {
    type Error = RegistryError;

    /// A list made only of strings is one argv; a list holding any nested list
    /// is a multi-step registration.
    fn try_from(value: &toml::Value) -> Result<Self, Self::Error> {
        match value {
            toml::Value::String(line) => Ok(Self::Line(line.clone())),
            toml::Value::Array(items) => {
                if items.is_empty() {
                    return Err(RegistryError::InvalidCommand(EMPTY_COMMAND.to_string()));
                }
                if items.iter().all(toml::Value::is_str) {
                    let parts = items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect();
                    return Ok(Self::Argv(parts));
                }
                items
                    .iter()
                    .map(step_from_toml)
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Steps)
            }
            other => Err(unsupported(other)),
        }
    }
}

fn step_from_toml(value: &toml::Value) -> Result<CommandStep, RegistryError> {
    match value {
        toml::Value::String(line) => Ok(CommandStep::Line(line.clone())),
        toml::Value::Array(parts) => parts
            .iter()
            .map(|part| match part {
                toml::Value::String(s) => Ok(s.clone()),
                other => Err(unsupported(other)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(CommandStep::Argv),
        other => Err(unsupported(other)),
    }
}

fn unsupported(value: &toml::Value) -> RegistryError {
    RegistryError::InvalidCommand(format!(
        "unsupported command element type: {}",
        value.type_str()
    ))
}

/// Shell word-splitting without expansion.
pub fn tokenize(line: &str) -> Result<Vec<String>, RegistryError> {
    shell_words::split(line).map_err(|source| RegistryError::Tokenize {
        input: line.to_string(),
        source,
    })
}

/// Join tokens with POSIX shell quoting.
pub fn display_argv<S: AsRef<str>>(argv: &[S]) -> String {
    shell_words::join(argv.iter().map(AsRef::as_ref))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_rejects_zero_tokens() {
        let err = CommandArgv::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCommand(_)));
    }

    #[test]
    fn parse_keeps_quoted_substrings_together() {
        let argv = CommandArgv::parse(r#"python -c 'print("x")'"#).expect("parse");
        assert_eq!(argv.as_slice(), ["python", "-c", r#"print("x")"#]);
        assert_eq!(argv.program(), "python");
        assert_eq!(argv.args(), ["-c", r#"print("x")"#]);
    }

    #[test]
    fn parse_reports_unbalanced_quotes() {
        let err = CommandArgv::parse("echo 'oops").unwrap_err();
        assert!(matches!(err, RegistryError::Tokenize { .. }));
    }

    #[test]
    fn flat_list_is_one_invocation() {
        let seq = CommandInput::from(vec!["uv", "run", "pytest"])
            .normalise()
            .expect("normalise");
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.first().as_slice(), ["uv", "run", "pytest"]);
    }

    #[test]
    fn mixed_steps_tokenize_string_elements() {
        let input = CommandInput::Steps(vec![vec!["a", "b"].into(), "c d".into()]);
        let seq = input.normalise().expect("normalise");
        let argvs: Vec<&[String]> = seq.iter().map(CommandArgv::as_slice).collect();
        assert_eq!(argvs, vec![&["a", "b"][..], &["c", "d"][..]]);
    }

    #[test]
    fn empty_nested_step_is_invalid() {
        let input = CommandInput::Steps(vec![CommandStep::Argv(Vec::new())]);
        assert!(matches!(
            input.normalise(),
            Err(RegistryError::InvalidCommand(_))
        ));
    }

    #[test]
    fn toml_list_with_nested_list_becomes_steps() {
        let value: toml::Value = toml::from_str::<toml::Table>(
            r#"cmd = [["uv", "run", "ruff", "format"], "uv run ruff check"]"#,
        )
        .expect("toml")
        .remove("cmd")
        .expect("cmd");
        let input = CommandInput::try_from(&value).expect("input");
        let seq = input.normalise().expect("normalise");
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.iter().nth(1).expect("second").as_slice(), ["uv", "run", "ruff", "check"]);
    }

    #[test]
    fn toml_number_is_unsupported() {
        let value = toml::Value::Integer(3);
        let err = CommandInput::try_from(&value).unwrap_err();
        assert!(err.to_string().contains("unsupported command element type"));
    }

    #[test]
    fn display_quotes_tokens_with_spaces() {
        assert_eq!(display_argv(&["ruff", "a b.py"]), "ruff 'a b.py'");
    }
}
