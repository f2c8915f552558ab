//! Input types shared by the build executor and the report normalizer

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ordered, non-empty set of filesystem roots to fingerprint and cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSet(Vec<PathBuf>);

impl PathSet {
    /// Create a path set, rejecting an empty list.
    pub fn new(paths: Vec<PathBuf>) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::configuration(
                "path set must contain at least one path",
            ));
        }
        Ok(Self(paths))
    }

    /// Parse a whitespace- or newline-delimited list of paths.
    ///
    /// Both `"/a\n/b\n/c"` and `"/a /b /c"` yield `["/a", "/b", "/c"]`;
    /// blank entries are filtered out. Paths containing spaces must be
    /// supplied through [`PathSet::new`] instead.
    pub fn parse(input: &str) -> Result<Self> {
        let paths: Vec<PathBuf> = input
            .split_whitespace()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect();
        Self::new(paths)
    }

    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a PathSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A single build command: program name plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub cmd: String,
    #[serde(default, rename = "cmdParams", skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a command spec, rejecting an empty command name.
    pub fn new(cmd: impl Into<String>, args: Vec<String>) -> Result<Self> {
        let cmd = cmd.into();
        if cmd.trim().is_empty() {
            return Err(Error::configuration("command name must not be empty"));
        }
        Ok(Self { cmd, args })
    }

    /// Parse the canonical structured form: a JSON array of
    /// `{"cmd": "...", "cmdParams": ["..."]}` objects.
    pub fn parse_list(input: &str) -> Result<Vec<Self>> {
        let specs: Vec<CommandSpec> =
            serde_json::from_str(input).map_err(|e| Error::Json {
                message: "failed to parse command list".to_string(),
                source: e,
            })?;
        if specs.is_empty() {
            return Err(Error::configuration("command list must not be empty"));
        }
        for spec in &specs {
            if spec.cmd.trim().is_empty() {
                return Err(Error::configuration(
                    "command list contains an entry with an empty command name",
                ));
            }
        }
        Ok(specs)
    }

    /// Parse the legacy newline-delimited form: one command line per
    /// non-empty line, split with shell quoting rules.
    pub fn parse_script(input: &str) -> Result<Vec<Self>> {
        let mut specs = Vec::new();
        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut words = shell_words::split(line)
                .map_err(|e| Error::configuration(format!("malformed command line '{line}': {e}")))?
                .into_iter();
            let cmd = words
                .next()
                .ok_or_else(|| Error::configuration(format!("empty command line '{line}'")))?;
            specs.push(Self {
                cmd,
                args: words.collect(),
            });
        }
        if specs.is_empty() {
            return Err(Error::configuration("command script contains no commands"));
        }
        Ok(specs)
    }

    /// Full command line for display in logs and errors.
    #[must_use]
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.cmd.clone()
        } else {
            format!("{} {}", self.cmd, self.args.join(" "))
        }
    }
}
