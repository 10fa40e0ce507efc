// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Application descriptors.
//!
//! An __application descriptor__ tells dotmgr what an application's
//! configuration looks like on disk: which executable proves the application
//! is installed, which paths hold its configuration, and which patterns should
//! be left out of a backup.
//!
//! # Descriptor Files
//!
//! Descriptors are JSON documents with the `.dotinfo` extension, see
//! [`DescriptorLayout`] for the exact layout. A descriptor file is parsed into
//! its layout first, and only then validated into an [`AppDescriptor`]. Once
//! validated, a descriptor never changes.
//!
//! # Exclusion Semantics
//!
//! Exclude patterns are shell globs that may match _anywhere_ inside a path.
//! Each pattern is wrapped in wildcards, so excluding `cache` excludes
//! `/home/u/.app/cache/x` as well as `/tmp/foo-cache-bar`. A wildcard also
//! matches path separators. This is not gitignore, there is no anchoring to
//! path components at all.
//!
//! Character classes like `[0-9]` work, but an unclosed `[` does not match
//! itself literally. A pattern such as `foo[` is rejected, together with the
//! descriptor holding it. Write `foo[[]` to match a literal bracket.
//!
//! # See Also
//!
//! 1. [`select`] for turning includes into concrete files.
//! 2. [`catalog`] for loading descriptors in bulk.

pub mod catalog;
pub mod select;

use crate::config::{ConfigError, DescriptorLayout};

use glob::{MatchOptions, Pattern};
use regex::Regex;
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::LazyLock,
};

/// Identifier rule shared by descriptor names and commands.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    // INVARIANT: Pattern is a compile-time constant known to be valid.
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_-]+$").unwrap()
});

/// Check if string is a valid application identifier.
pub fn is_identifier(value: &str) -> bool {
    IDENTIFIER.is_match(value)
}

/// Validated description of one backupable application.
///
/// # Invariant
///
/// - Name and command match `^[A-Za-z0-9_][A-Za-z0-9_-]+$`.
/// - At least one include entry.
/// - Includes and excludes carry no trailing slash, no duplicates, and are
///   sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDescriptor {
    name: String,
    command: String,
    include: Vec<String>,
    exclude: Vec<String>,
    excludes: ExcludeSet,
}

impl AppDescriptor {
    /// Construct new validated application descriptor.
    ///
    /// Strips trailing slashes from include and exclude entries, removes
    /// duplicates, and sorts them.
    ///
    /// # Errors
    ///
    /// - Return [`DescriptorError::InvalidName`] if name is not an identifier.
    /// - Return [`DescriptorError::InvalidCommand`] if command is not an
    ///   identifier.
    /// - Return [`DescriptorError::NoIncludes`] if include listing is empty.
    /// - Return [`DescriptorError::InvalidExclude`] if an exclude pattern is
    ///   empty or cannot be compiled as a glob.
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        include: impl IntoIterator<Item = impl AsRef<str>>,
        exclude: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        let name = name.into();
        let command = command.into();
        let include = normalize(include);
        let exclude = normalize(exclude);

        if !is_identifier(&name) {
            return Err(DescriptorError::InvalidName { name });
        }

        if !is_identifier(&command) {
            return Err(DescriptorError::InvalidCommand { name, command });
        }

        if include.is_empty() {
            return Err(DescriptorError::NoIncludes { name });
        }

        let excludes = ExcludeSet::new(&exclude).map_err(|pattern| {
            DescriptorError::InvalidExclude {
                name: name.clone(),
                pattern,
            }
        })?;

        Ok(Self {
            name,
            command,
            include,
            exclude,
            excludes,
        })
    }

    /// Load descriptor from a descriptor file.
    ///
    /// # Errors
    ///
    /// - Return [`DescriptorError::ReadFile`] if file cannot be read.
    /// - Return [`DescriptorError::Parse`] if file is not a valid descriptor
    ///   document.
    /// - Return any validation error of [`AppDescriptor::new`].
    pub fn from_descriptor_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|err| DescriptorError::ReadFile {
            source: err,
            path: path.into(),
        })?;
        let layout: DescriptorLayout = data.parse().map_err(|err| DescriptorError::Parse {
            source: err,
            path: path.into(),
        })?;

        Self::try_from(layout)
    }

    /// Application identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executable used to check if application is installed.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Sorted listing of include entries.
    pub fn include(&self) -> &[String] {
        &self.include
    }

    /// Sorted listing of exclude patterns.
    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    /// Compiled exclude patterns.
    pub fn excludes(&self) -> &ExcludeSet {
        &self.excludes
    }

    /// Check if application command can be found on the search path.
    pub fn is_installed(&self) -> bool {
        self.is_installed_with(&SearchPath)
    }

    /// Check if application command exists according to given probe.
    pub fn is_installed_with(&self, probe: &impl CommandProbe) -> bool {
        probe.command_exists(&self.command)
    }

    /// Check if path contains an excluded expression.
    ///
    /// Pure string check, the file system is never consulted.
    pub fn is_excluded(&self, path: impl AsRef<Path>) -> bool {
        self.excludes.is_match(path)
    }
}

impl TryFrom<DescriptorLayout> for AppDescriptor {
    type Error = DescriptorError;

    fn try_from(layout: DescriptorLayout) -> Result<Self, Self::Error> {
        Self::new(layout.name, layout.command, layout.include, layout.exclude)
    }
}

impl Display for AppDescriptor {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "Name:     {}", self.name)?;
        writeln!(fmt, "Command:  {}", self.command)?;
        writeln!(fmt, "Include:")?;
        for entry in &self.include {
            writeln!(fmt, "  {entry}")?;
        }
        writeln!(fmt, "Exclude:")?;
        for entry in &self.exclude {
            writeln!(fmt, "  {entry}")?;
        }

        Ok(())
    }
}

/// Set of compiled exclude patterns.
///
/// Each pattern `p` is matched as the glob `*p*`, where `*` also matches path
/// separators. Runs of `*` inside a pattern mean the same thing as a single
/// `*`, so they are collapsed before compiling.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    /// Compile listing of exclude patterns.
    ///
    /// Returns the offending pattern on failure.
    pub fn new(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self, String> {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                return Err(pattern.to_string());
            }

            let wrapped = Pattern::new(&wrap_anywhere(pattern)).map_err(|_| pattern.to_string())?;
            compiled.push(wrapped);
        }

        Ok(Self { patterns: compiled })
    }

    /// Check if any pattern matches somewhere inside the path.
    pub fn is_match(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref().to_string_lossy();
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(&path, options))
    }

    /// Check if there are no patterns at all.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn wrap_anywhere(pattern: &str) -> String {
    let mut wrapped = String::with_capacity(pattern.len() + 2);
    wrapped.push('*');
    for ch in pattern.chars() {
        if ch == '*' && wrapped.ends_with('*') {
            continue;
        }
        wrapped.push(ch);
    }

    if !wrapped.ends_with('*') {
        wrapped.push('*');
    }

    wrapped
}

fn normalize(entries: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| entry.as_ref().trim_end_matches('/').to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Check for the presence of host executables.
pub trait CommandProbe {
    /// Check if command resolves to an executable.
    fn command_exists(&self, command: &str) -> bool;
}

/// Probe executables on the `PATH` environment variable.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchPath;

impl CommandProbe for SearchPath {
    fn command_exists(&self, command: &str) -> bool {
        which::which(command).is_ok()
    }
}

/// Descriptor loading and validation error types.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Application name is not a valid identifier.
    #[error("invalid name {name:?}, must match {}", IDENTIFIER.as_str())]
    InvalidName { name: String },

    /// Application command is not a valid identifier.
    #[error("invalid command {command:?} for {name}, must match {}", IDENTIFIER.as_str())]
    InvalidCommand { name: String, command: String },

    /// Descriptor does not include anything.
    #[error("no config file to include for {name}")]
    NoIncludes { name: String },

    /// Exclude pattern cannot be used.
    #[error("invalid exclude pattern {pattern:?} for {name}")]
    InvalidExclude { name: String, pattern: String },

    /// Descriptor file cannot be read.
    #[error("failed to read descriptor file at {:?}", path.display())]
    ReadFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Descriptor file is not a valid descriptor document.
    #[error("failed to parse descriptor file at {:?}", path.display())]
    Parse {
        #[source]
        source: ConfigError,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = DescriptorError> = std::result::Result<T, E>;
