// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Snapshot materialization.
//!
//! A __snapshot__ is one saved copy of an application's selected files for a
//! given user and configuration name. Every snapshot lives in its own
//! directory under the save root, named `{user}-{app}-{conf}`.
//!
//! # Snapshot Lifecycle
//!
//! Building a snapshot moves through fixed stages, in order:
//!
//! 1. __Planned__: location computed, nothing on disk yet.
//! 2. __DirectoryReady__: snapshot directory created.
//! 3. __FilesCopied__: included files copied in.
//! 4. __Cleaned__: anything excluded removed from the copy.
//! 5. __ManifestWritten__: `.dotmatch.json` written, snapshot complete.
//!
//! Failing at any stage leaves the snapshot directory as is. A snapshot
//! directory without a manifest is incomplete, and safe to delete.
//!
//! # Manifest
//!
//! The manifest maps each top-level item of the snapshot to the include
//! entry it came from, sorted by item name. It is what restore tooling needs
//! to put things back where they belong.

use crate::{
    config::to_json_pretty,
    descriptor::{is_identifier, select::FileSelector, AppDescriptor},
};

use filetime::FileTime;
use ignore::WalkBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tracing::{debug, instrument};

/// File name of snapshot manifest.
pub const MANIFEST_NAME: &str = ".dotmatch.json";

/// Rule for user and configuration names.
///
/// No dashes allowed, so that `{user}-{app}-{conf}` splits apart in exactly
/// one way even though application names may contain dashes.
static SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    // INVARIANT: Pattern is a compile-time constant known to be valid.
    Regex::new(r"^[A-Za-z0-9_]+$").unwrap()
});

/// Check if string is a valid user or configuration name.
pub fn is_segment(value: &str) -> bool {
    SEGMENT.is_match(value)
}

/// Validate user or configuration name, explaining what is wrong with it.
///
/// # Errors
///
/// - Return [`SnapshotError::InvalidIdentity`] if value is not a plain
///   `[A-Za-z0-9_]+` word.
pub fn check_segment(field: &'static str, value: &str) -> Result<()> {
    if is_segment(value) {
        return Ok(());
    }

    let reason = if value.contains('-') {
        "cannot contain '-'"
    } else {
        "must only hold letters, digits, or '_'"
    };

    Err(SnapshotError::InvalidIdentity {
        field,
        value: value.into(),
        reason,
    })
}

/// Stage of snapshot construction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SnapshotState {
    #[default]
    Planned,
    DirectoryReady,
    FilesCopied,
    Cleaned,
    ManifestWritten,
}

impl Display for SnapshotState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Planned => "planned",
            Self::DirectoryReady => "directory ready",
            Self::FilesCopied => "files copied",
            Self::Cleaned => "cleaned",
            Self::ManifestWritten => "manifest written",
        };
        fmt.write_str(name)
    }
}

/// Mapping of saved item names to the include entries they came from.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Manifest(BTreeMap<String, String>);

impl Manifest {
    /// Construct new empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record saved item.
    pub fn insert(&mut self, item: impl Into<String>, include: impl Into<String>) {
        self.0.insert(item.into(), include.into());
    }

    /// Include entry that saved item came from.
    pub fn get(&self, item: &str) -> Option<&str> {
        self.0.get(item).map(String::as_str)
    }

    /// Iterate saved items in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(item, include)| (item.as_str(), include.as_str()))
    }

    /// Number of saved items.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if nothing was saved.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|item, _| keep(item));
    }
}

/// One snapshot of an application's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    user: String,
    app_name: String,
    conf_name: String,
    location: PathBuf,
    manifest: Manifest,
    state: SnapshotState,
}

impl SnapshotInfo {
    /// Plan new snapshot under save root.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::InvalidIdentity`] if user or configuration
    ///   name is not a plain `[A-Za-z0-9_]+` word, or application name is not
    ///   a valid identifier.
    pub fn new(
        save_root: impl AsRef<Path>,
        user: impl Into<String>,
        app_name: impl Into<String>,
        conf_name: impl Into<String>,
    ) -> Result<Self> {
        let user = user.into();
        let app_name = app_name.into();
        let conf_name = conf_name.into();

        check_segment("user", &user)?;
        if !is_identifier(&app_name) {
            return Err(SnapshotError::InvalidIdentity {
                field: "application",
                value: app_name,
                reason: "must be a valid application identifier",
            });
        }
        check_segment("configuration", &conf_name)?;

        let location = Self::compute_location(save_root, &user, &app_name, &conf_name);
        Ok(Self {
            user,
            app_name,
            conf_name,
            location,
            manifest: Manifest::new(),
            state: SnapshotState::Planned,
        })
    }

    /// Determine snapshot directory for identity triple.
    pub fn compute_location(
        save_root: impl AsRef<Path>,
        user: &str,
        app_name: &str,
        conf_name: &str,
    ) -> PathBuf {
        save_root
            .as_ref()
            .join(format!("{user}-{app_name}-{conf_name}"))
    }

    /// Check if snapshot directory holds a manifest.
    pub fn is_complete(location: impl AsRef<Path>) -> bool {
        location.as_ref().join(MANIFEST_NAME).is_file()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn conf_name(&self) -> &str {
        &self.conf_name
    }

    /// Snapshot directory.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Items copied so far.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Current construction stage.
    pub fn state(&self) -> SnapshotState {
        self.state
    }

    /// Create snapshot directory.
    ///
    /// Never overwrites. Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::OutOfOrder`] if not planned.
    /// - Return [`SnapshotError::AlreadyExists`] if snapshot directory exists.
    /// - Return [`SnapshotError::CreateDir`] if directory creation fails.
    #[instrument(skip(self), fields(location = %self.location.display()), level = "debug")]
    pub fn create_directory(&mut self) -> Result<()> {
        self.expect_state(SnapshotState::Planned)?;

        if let Some(parent) = self.location.parent() {
            std::fs::create_dir_all(parent).map_err(|err| SnapshotError::CreateDir {
                source: err,
                path: parent.into(),
            })?;
        }

        match std::fs::create_dir(&self.location) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(SnapshotError::AlreadyExists {
                    path: self.location.clone(),
                });
            }
            Err(err) => {
                return Err(SnapshotError::CreateDir {
                    source: err,
                    path: self.location.clone(),
                });
            }
        }

        self.state = SnapshotState::DirectoryReady;
        Ok(())
    }

    /// Copy selected files of descriptor into snapshot directory.
    ///
    /// Each include entry lands in the snapshot under its base name. Entries
    /// whose base name is already taken are skipped, first come first served.
    /// File times are preserved.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::OutOfOrder`] if directory is not ready.
    /// - Return [`SnapshotError::Copy`] if anything fails to copy.
    #[instrument(skip(self, descriptor), fields(app = descriptor.name()), level = "debug")]
    pub fn copy_included_files(&mut self, descriptor: &AppDescriptor) -> Result<()> {
        self.expect_state(SnapshotState::DirectoryReady)?;

        for selection in FileSelector::new(descriptor).selections() {
            let Some(name) = selection.root.file_name() else {
                debug!("skip {:?}, it has no base name", selection.pattern);
                continue;
            };

            let destination = self.location.join(name);
            if destination.symlink_metadata().is_ok() {
                debug!(
                    "skip {:?}, {:?} already taken",
                    selection.pattern,
                    name.to_string_lossy()
                );
                continue;
            }

            if selection.is_dir() {
                for dir in &selection.dirs {
                    let target = rebase(dir, &selection.root, &destination);
                    std::fs::create_dir_all(&target).map_err(|err| SnapshotError::Copy {
                        source: err,
                        path: dir.clone(),
                    })?;
                }

                for file in &selection.files {
                    copy_file(file, &rebase(file, &selection.root, &destination))?;
                }

                // INVARIANT: Stamp directory times after their contents are in.
                for dir in selection.dirs.iter().rev() {
                    copy_times(dir, &rebase(dir, &selection.root, &destination))?;
                }
            } else {
                copy_file(&selection.root, &destination)?;
            }

            debug!("saved {:?} as {:?}", selection.pattern, name.to_string_lossy());
            self.manifest
                .insert(name.to_string_lossy(), selection.pattern.as_str());
        }

        self.state = SnapshotState::FilesCopied;
        Ok(())
    }

    /// Remove anything excluded by descriptor from snapshot directory.
    ///
    /// Exclude patterns are matched against paths relative to the snapshot
    /// directory. Top-level items that get removed are dropped from the
    /// manifest too.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::OutOfOrder`] if files were not copied.
    /// - Return [`SnapshotError::Walk`] if snapshot directory cannot be walked.
    /// - Return [`SnapshotError::Cleanup`] if an excluded entry cannot be
    ///   removed.
    #[instrument(skip(self, descriptor), fields(app = descriptor.name()), level = "debug")]
    pub fn cleanup_exclusions(&mut self, descriptor: &AppDescriptor) -> Result<()> {
        self.expect_state(SnapshotState::FilesCopied)?;

        if descriptor.excludes().is_empty() {
            self.state = SnapshotState::Cleaned;
            return Ok(());
        }

        let walker = WalkBuilder::new(&self.location)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut doomed: Vec<PathBuf> = Vec::new();
        for entry in walker {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }

            // INVARIANT: Parents come before children, skip what is already doomed.
            if doomed.last().is_some_and(|parent| entry.path().starts_with(parent)) {
                continue;
            }

            let relative = entry.path().strip_prefix(&self.location).unwrap_or(entry.path());
            if descriptor.is_excluded(relative) {
                doomed.push(entry.into_path());
            }
        }

        for path in &doomed {
            debug!("remove excluded {:?}", path.display());
            let removed = if path.is_dir() && !path.is_symlink() {
                std::fs::remove_dir_all(path)
            } else {
                std::fs::remove_file(path)
            };
            removed.map_err(|err| SnapshotError::Cleanup {
                source: err,
                path: path.clone(),
            })?;
        }

        let location = self.location.clone();
        self.manifest
            .retain(|item| location.join(item).symlink_metadata().is_ok());

        self.state = SnapshotState::Cleaned;
        Ok(())
    }

    /// Write manifest into snapshot directory, completing the snapshot.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::OutOfOrder`] if exclusions were not cleaned.
    /// - Return [`SnapshotError::Serialize`] if manifest cannot be serialized.
    /// - Return [`SnapshotError::WriteManifest`] if manifest cannot be
    ///   written.
    #[instrument(skip(self), fields(location = %self.location.display()), level = "debug")]
    pub fn write_manifest(&mut self) -> Result<()> {
        self.expect_state(SnapshotState::Cleaned)?;

        let path = self.location.join(MANIFEST_NAME);
        let contents = to_json_pretty(&self.manifest)?;
        std::fs::write(&path, contents).map_err(|err| SnapshotError::WriteManifest {
            source: err,
            path,
        })?;

        self.state = SnapshotState::ManifestWritten;
        Ok(())
    }

    fn expect_state(&self, expected: SnapshotState) -> Result<()> {
        if self.state != expected {
            return Err(SnapshotError::OutOfOrder {
                expected,
                found: self.state,
            });
        }

        Ok(())
    }
}

fn rebase(path: &Path, from: &Path, onto: &Path) -> PathBuf {
    match path.strip_prefix(from) {
        Ok(relative) if relative.as_os_str().is_empty() => onto.to_path_buf(),
        Ok(relative) => onto.join(relative),
        Err(_) => onto.to_path_buf(),
    }
}

fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    let copy_error = |err: std::io::Error| SnapshotError::Copy {
        source: err,
        path: source.to_path_buf(),
    };

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(copy_error)?;
    }
    std::fs::copy(source, destination).map_err(copy_error)?;

    copy_times(source, destination)
}

fn copy_times(source: &Path, destination: &Path) -> Result<()> {
    let copy_error = |err: std::io::Error| SnapshotError::Copy {
        source: err,
        path: source.to_path_buf(),
    };

    let metadata = std::fs::metadata(source).map_err(copy_error)?;
    filetime::set_file_times(
        destination,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )
    .map_err(copy_error)
}

/// Snapshot error types.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Identity field cannot be used in a snapshot name.
    #[error("invalid {field} name {value:?}, {reason}")]
    InvalidIdentity {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Snapshot stage run out of order.
    #[error("snapshot step expects stage {expected}, but is at {found}")]
    OutOfOrder {
        expected: SnapshotState,
        found: SnapshotState,
    },

    /// Snapshot directory exists already.
    #[error("snapshot directory {:?} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    /// Snapshot directory cannot be created.
    #[error("failed to create snapshot directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Included file cannot be copied into snapshot.
    #[error("failed to copy {:?} into snapshot", path.display())]
    Copy {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Snapshot directory cannot be walked.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// Excluded entry cannot be removed from snapshot.
    #[error("failed to remove excluded {:?} from snapshot", path.display())]
    Cleanup {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Manifest cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Manifest cannot be written.
    #[error("failed to write manifest {:?}", path.display())]
    WriteManifest {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;
