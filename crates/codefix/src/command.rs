use std::{fmt, path::PathBuf};

use tokio::process::Command;

use crate::DiagnoseError;

/// What to execute before asking for a diagnosis.
///
/// `Argv` spawns the program directly with an explicit argument array. `Shell` hands the
/// whole line to the platform interpreter (`sh -c` / `cmd /C`) and is only used when the
/// caller opts in, since the line is re-interpreted by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    Argv { program: PathBuf, args: Vec<String> },
    Shell(String),
}

impl CommandSpec {
    pub fn argv(
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        CommandSpec::Argv {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn shell(line: impl Into<String>) -> Self {
        CommandSpec::Shell(line.into())
    }

    /// Builds a spec from CLI words. With `shell` the words are joined by single spaces
    /// and run as one line; otherwise the first word is the program.
    pub fn from_words(words: &[String], shell: bool) -> Result<Self, DiagnoseError> {
        let spec = if shell {
            CommandSpec::Shell(words.join(" "))
        } else {
            let (program, args) = words.split_first().ok_or(DiagnoseError::EmptyCommand)?;
            CommandSpec::argv(program, args.iter().cloned())
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), DiagnoseError> {
        let empty = match self {
            CommandSpec::Argv { program, .. } => program.as_os_str().is_empty(),
            CommandSpec::Shell(line) => line.trim().is_empty(),
        };
        if empty {
            Err(DiagnoseError::EmptyCommand)
        } else {
            Ok(())
        }
    }

    /// The executable that is actually spawned.
    pub fn program(&self) -> PathBuf {
        match self {
            CommandSpec::Argv { program, .. } => program.clone(),
            CommandSpec::Shell(_) => PathBuf::from(shell_program()),
        }
    }

    pub(crate) fn to_command(&self) -> Command {
        match self {
            CommandSpec::Argv { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            CommandSpec::Shell(line) => {
                let mut cmd = Command::new(shell_program());
                cmd.arg(shell_flag());
                // `cmd.exe` parses its own command line; Rust's quoting would garble it.
                #[cfg(windows)]
                cmd.raw_arg(line);
                #[cfg(not(windows))]
                cmd.arg(line);
                cmd
            }
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Shell(line) => f.write_str(line),
            CommandSpec::Argv { program, args } => {
                f.write_str(&quote_word(&program.to_string_lossy()))?;
                for arg in args {
                    write!(f, " {}", quote_word(arg))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(windows)]
fn shell_program() -> &'static str {
    "cmd"
}

#[cfg(windows)]
fn shell_flag() -> &'static str {
    "/C"
}

#[cfg(not(windows))]
fn shell_program() -> &'static str {
    "sh"
}

#[cfg(not(windows))]
fn shell_flag() -> &'static str {
    "-c"
}

fn quote_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
