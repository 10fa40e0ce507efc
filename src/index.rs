// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Snapshot index.
//!
//! The __index__ is the single durable record of which snapshots exist. It
//! maps a user name to application names, and each application name to the
//! configuration names saved for it:
//!
//! ```json
//! {
//!     "alice": {
//!         "vim": [
//!             "default",
//!             "work"
//!         ]
//!     }
//! }
//! ```
//!
//! # Persistence
//!
//! The index is read once when opened, mutated in memory, and written back
//! once by [`Index::flush`] at the end of the program. Keys are sorted and
//! indentation is fixed so the file diffs cleanly. Writes go to a temporary
//! file in the same directory first, which is then renamed over the index.
//!
//! A missing index file is a first run and yields an empty index. A corrupt
//! index file is fatal, because nothing can be said about prior saves without
//! it.
//!
//! Two processes sharing one index file will lose each other's updates. Last
//! writer wins.
//!
//! # Invariant
//!
//! - A configuration name appears at most once under a user and application.
//! - No application without configuration names, no user without
//!   applications.

use crate::config::to_json_pretty;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter, Result as FmtResult},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

type Entries = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// In-memory snapshot index backed by an index file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    path: PathBuf,
    entries: Entries,
}

impl Index {
    /// Construct new empty index that will be flushed to target path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Entries::new(),
        }
    }

    /// Load index file at target path.
    ///
    /// Duplicate configuration names and empty containers found in the file
    /// are dropped, so the invariants hold from the start.
    ///
    /// # Errors
    ///
    /// - Return [`IndexError::Read`] if index file exists but cannot be read.
    /// - Return [`IndexError::Corrupt`] if index file cannot be parsed.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no index at {:?}, starting empty", path.display());
                return Ok(Self::new(path));
            }
            Err(err) => return Err(IndexError::Read { source: err, path }),
        };

        let mut entries: Entries = match serde_json::from_str(&data) {
            Ok(entries) => entries,
            Err(err) => return Err(IndexError::Corrupt { source: err, path }),
        };

        // INVARIANT: No duplicates, no empty containers.
        for apps in entries.values_mut() {
            for confs in apps.values_mut() {
                let mut seen = BTreeSet::new();
                confs.retain(|conf| seen.insert(conf.clone()));
            }
            apps.retain(|_, confs| !confs.is_empty());
        }
        entries.retain(|_, apps| !apps.is_empty());

        Ok(Self { path, entries })
    }

    /// Location of index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if configuration of application is saved for user.
    pub fn query(&self, app: &str, conf: &str, user: &str) -> bool {
        self.entries
            .get(user)
            .and_then(|apps| apps.get(app))
            .is_some_and(|confs| confs.iter().any(|saved| saved == conf))
    }

    /// Record configuration of application as saved for user.
    ///
    /// Does nothing if already recorded.
    pub fn insert(&mut self, app: &str, conf: &str, user: &str) {
        let confs = self
            .entries
            .entry(user.to_string())
            .or_default()
            .entry(app.to_string())
            .or_default();

        if !confs.iter().any(|saved| saved == conf) {
            confs.push(conf.to_string());
        }
    }

    /// Forget saved configuration of application for user.
    ///
    /// Does nothing if not recorded. Prunes application and user entries that
    /// become empty.
    pub fn remove(&mut self, app: &str, conf: &str, user: &str) {
        let Some(apps) = self.entries.get_mut(user) else {
            return;
        };

        if let Some(confs) = apps.get_mut(app) {
            confs.retain(|saved| saved != conf);
            if confs.is_empty() {
                apps.remove(app);
            }
        }

        if apps.is_empty() {
            self.entries.remove(user);
        }
    }

    /// All users with saved configurations.
    pub fn users(&self) -> BTreeSet<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// All applications with saved configurations, across users.
    pub fn apps(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .flat_map(|apps| apps.keys())
            .map(String::as_str)
            .collect()
    }

    /// All saved configuration names, across users and applications.
    pub fn confs(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .flat_map(|apps| apps.values())
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Check if element names any user, application, or configuration.
    pub fn has(&self, element: &str) -> bool {
        self.users().contains(element)
            || self.apps().contains(element)
            || self.confs().contains(element)
    }

    /// Saved application and configuration name pairs of user.
    pub fn saved(&self, user: &str) -> Vec<(&str, &str)> {
        self.entries
            .get(user)
            .into_iter()
            .flatten()
            .flat_map(|(app, confs)| {
                confs
                    .iter()
                    .map(move |conf| (app.as_str(), conf.as_str()))
            })
            .collect()
    }

    /// Check if index records nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write index to index file.
    ///
    /// Creates parent directory of index file if needed.
    ///
    /// # Errors
    ///
    /// - Return [`IndexError::Serialize`] if index cannot be serialized.
    /// - Return [`IndexError::Write`] if index file cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn flush(&self) -> Result<()> {
        let contents = to_json_pretty(&self.entries)?;
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let write_error = |source: std::io::Error| IndexError::Write {
            source,
            path: self.path.clone(),
        };

        std::fs::create_dir_all(parent).map_err(write_error)?;
        let mut file = NamedTempFile::new_in(parent).map_err(write_error)?;
        file.write_all(contents.as_bytes()).map_err(write_error)?;
        file.as_file().sync_all().map_err(write_error)?;
        file.persist(&self.path)
            .map_err(|err| write_error(err.error))?;
        debug!("flushed index to {:?}", self.path.display());

        Ok(())
    }
}

impl Display for Index {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let contents = to_json_pretty(&self.entries).map_err(|_| std::fmt::Error)?;
        fmt.write_str(&contents)
    }
}

/// Index error types.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Index file exists but cannot be read.
    #[error("failed to read index at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Index file cannot be parsed.
    #[error("broken index at {:?}, refusing to continue", path.display())]
    Corrupt {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Index file cannot be written.
    #[error("failed to write index at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Index cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Friendly result alias :3
type Result<T, E = IndexError> = std::result::Result<T, E>;
