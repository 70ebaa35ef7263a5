//! Tagged command values and the explicit string-to-argv parser used for hooks.
//!
//! Hook commands are never handed to a shell. A command string is split into
//! words with POSIX-like quoting rules, leading `KEY=VALUE` words become
//! environment overrides, and unquoted shell operators are rejected so that
//! pipelines and backgrounding must be spelled out as `sh -c '...'`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("command is empty")]
    Empty,
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),
    #[error("trailing backslash at end of command")]
    TrailingBackslash,
    #[error("unquoted shell operator '{0}'; wrap the command in sh -c '...' to use shell syntax")]
    ShellOperator(char),
    #[error("command has environment assignments but no program")]
    MissingProgram,
}

/// A program invocation: program, ordered arguments, and environment overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Build a command from an explicit argument vector (`argv[0]` is the program).
    pub fn from_argv(argv: &[String]) -> Result<Self, CommandParseError> {
        let (program, args) = argv.split_first().ok_or(CommandParseError::Empty)?;
        if program.trim().is_empty() {
            return Err(CommandParseError::Empty);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            env: BTreeMap::new(),
        })
    }

    /// Parse a single command line into program, arguments and leading
    /// `KEY=VALUE` environment assignments.
    pub fn parse(line: &str) -> Result<Self, CommandParseError> {
        let words = split_words(line)?;
        if words.is_empty() {
            return Err(CommandParseError::Empty);
        }

        let mut env = BTreeMap::new();
        let mut rest = words.into_iter().peekable();
        while let Some(word) = rest.peek() {
            let Some((key, value)) = word.as_assignment() else {
                break;
            };
            env.insert(key, value);
            rest.next();
        }

        let program = rest.next().ok_or(CommandParseError::MissingProgram)?.text;
        Ok(Self {
            program,
            args: rest.map(|w| w.text).collect(),
            env,
        })
    }

    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={} ", quote(value))?;
        }
        // A bare `KEY=VALUE` program would read back as an assignment.
        if self.program.contains('=') {
            f.write_str(&force_quote(&self.program))?;
        } else {
            f.write_str(&quote(&self.program))?;
        }
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Word {
    text: String,
    quoted: bool,
    /// Byte offset of the first `=` when everything before it was unquoted.
    assign_at: Option<usize>,
}

impl Word {
    fn as_assignment(&self) -> Option<(String, String)> {
        let at = self.assign_at?;
        let key = &self.text[..at];
        if !is_env_name(key) {
            return None;
        }
        Some((key.to_owned(), self.text[at + 1..].to_owned()))
    }
}

fn is_env_name(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn split_words(line: &str) -> Result<Vec<Word>, CommandParseError> {
    let mut words = Vec::new();
    let mut current: Option<Word> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if let Some(word) = current.take() {
                    words.push(word);
                }
            }
            '\'' => {
                let word = current.get_or_insert_with(Word::default);
                word.quoted = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => word.text.push(ch),
                        None => return Err(CommandParseError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                let word = current.get_or_insert_with(Word::default);
                word.quoted = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(esc @ ('"' | '\\' | '$' | '`')) => word.text.push(esc),
                            Some(other) => {
                                word.text.push('\\');
                                word.text.push(other);
                            }
                            None => return Err(CommandParseError::UnterminatedQuote('"')),
                        },
                        Some(ch) => word.text.push(ch),
                        None => return Err(CommandParseError::UnterminatedQuote('"')),
                    }
                }
            }
            '\\' => {
                let escaped = chars.next().ok_or(CommandParseError::TrailingBackslash)?;
                let word = current.get_or_insert_with(Word::default);
                word.quoted = true;
                word.text.push(escaped);
            }
            '|' | '&' | ';' | '<' | '>' | '(' | ')' | '`' => {
                return Err(CommandParseError::ShellOperator(c));
            }
            '=' => {
                let word = current.get_or_insert_with(Word::default);
                if word.assign_at.is_none() && !word.quoted {
                    word.assign_at = Some(word.text.len());
                }
                word.text.push('=');
            }
            other => current.get_or_insert_with(Word::default).text.push(other),
        }
    }

    if let Some(word) = current {
        words.push(word);
    }
    Ok(words)
}

fn quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(b, b'_' | b'-' | b'.' | b'/' | b':' | b'=' | b'@' | b'%' | b'+' | b',')
        });
    if plain {
        s.to_owned()
    } else {
        force_quote(s)
    }
}

fn force_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
