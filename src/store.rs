// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Snapshot store management and manipulation.
//!
//! dotmgr groups snapshots together into one place called the __store__. The
//! store is a save directory holding every snapshot directory, paired with
//! the [`Index`] that records which snapshots exist.
//!
//! # Keeping Index and Disk in Sync
//!
//! The index is the source of truth for whether a snapshot exists, so the
//! order of index and disk operations matters:
//!
//! - Saving records a snapshot in the index only after its manifest is
//!   written. A failed save leaves an incomplete snapshot directory behind
//!   that the index knows nothing about. The next save of the same snapshot
//!   treats it like an existing one, and replaces it.
//! - Removing forgets a snapshot in the index _before_ deleting its directory.
//!   A crash in between leaves a stray directory, never an index entry
//!   pointing at nothing.
//!
//! Index changes only reach the disk through [`Store::flush`], which the
//! caller must run once when done, even after a failed workflow.

use crate::{
    descriptor::AppDescriptor,
    index::{Index, IndexError},
    prompt::{PromptError, Prompter},
    snapshot::{SnapshotError, SnapshotInfo},
};

use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Result of a save workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Snapshot written and recorded.
    Saved,

    /// User declined to overwrite existing snapshot.
    Skipped,
}

/// Result of a remove workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Snapshot forgotten and deleted.
    Removed,

    /// User declined to remove snapshot.
    Declined,

    /// Index has no such snapshot, nothing done.
    NotSaved,
}

/// Save directory of snapshots plus their index.
#[derive(Debug)]
pub struct Store {
    save_dir: PathBuf,
    index: Index,
}

impl Store {
    /// Construct new store from save directory and loaded index.
    pub fn new(save_dir: impl Into<PathBuf>, index: Index) -> Self {
        Self {
            save_dir: save_dir.into(),
            index,
        }
    }

    /// Open store, loading its index.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Index`] if index cannot be loaded.
    pub fn open(save_dir: impl Into<PathBuf>, index_path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(save_dir, Index::load(index_path)?))
    }

    /// Directory holding snapshot directories.
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Read-only view of index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Save configuration of application for user.
    ///
    /// Asks before replacing an existing snapshot, unless forced. An existing
    /// snapshot is either recorded in the index, or an incomplete snapshot
    /// directory left over from a failed save.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Prompt`] if asking the user fails.
    /// - Return [`StoreError::RemoveSnapshot`] if existing snapshot cannot be
    ///   deleted.
    /// - Return [`StoreError::Snapshot`] if any snapshot step fails. The
    ///   snapshot directory is left as is, and the index is not touched.
    #[instrument(skip(self, descriptor, prompter), fields(app = descriptor.name()), level = "debug")]
    pub fn save(
        &mut self,
        descriptor: &AppDescriptor,
        conf: &str,
        user: &str,
        force: bool,
        prompter: &mut impl Prompter,
    ) -> Result<SaveOutcome> {
        let app = descriptor.name();
        let mut info = SnapshotInfo::new(&self.save_dir, user, app, conf)?;
        let indexed = self.index.query(app, conf, user);
        let on_disk = info.location().symlink_metadata().is_ok();

        if on_disk && !indexed {
            warn!(
                "found incomplete snapshot at {:?}",
                info.location().display()
            );
        }

        if indexed || on_disk {
            let message = format!("{app} config '{conf}' already exists for {user}. Overwrite it?");
            if !force && !prompter.confirm(&message)? {
                info!("Skipping {user}'s {conf} config for {app}.");
                return Ok(SaveOutcome::Skipped);
            }

            if on_disk {
                debug!("remove old snapshot {:?}", info.location().display());
                remove_snapshot_dir(info.location())?;
            }
        }

        info.create_directory()?;
        info.copy_included_files(descriptor)?;
        info.cleanup_exclusions(descriptor)?;
        info.write_manifest()?;
        self.index.insert(app, conf, user);

        info!(
            "saved {user}'s {conf} config for {app} ({} items)",
            info.manifest().len()
        );

        Ok(SaveOutcome::Saved)
    }

    /// Remove saved configuration of application for user.
    ///
    /// Does nothing if the index has no such snapshot. Asks first, unless
    /// forced.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Snapshot`] if the identity cannot name a
    ///   snapshot directory.
    /// - Return [`StoreError::Prompt`] if asking the user fails.
    /// - Return [`StoreError::RemoveSnapshot`] if snapshot directory cannot be
    ///   deleted. The index has already forgotten the snapshot by then.
    #[instrument(skip(self, prompter), level = "debug")]
    pub fn remove(
        &mut self,
        app: &str,
        conf: &str,
        user: &str,
        force: bool,
        prompter: &mut impl Prompter,
    ) -> Result<RemoveOutcome> {
        if !self.index.query(app, conf, user) {
            debug!("no {conf} config of {app} saved for {user}");
            return Ok(RemoveOutcome::NotSaved);
        }

        let info = SnapshotInfo::new(&self.save_dir, user, app, conf)?;
        let message = format!("Are you sure you want to remove {user}'s config {conf} for {app}?");
        if !force && !prompter.confirm(&message)? {
            return Ok(RemoveOutcome::Declined);
        }

        self.index.remove(app, conf, user);
        if info.location().symlink_metadata().is_ok() {
            remove_snapshot_dir(info.location())?;
        } else {
            warn!(
                "snapshot directory {:?} was already gone",
                info.location().display()
            );
        }

        info!("removed {user}'s {conf} config for {app}");
        Ok(RemoveOutcome::Removed)
    }

    /// Write index to disk.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Index`] if index cannot be written.
    pub fn flush(&self) -> Result<()> {
        Ok(self.index.flush()?)
    }
}

fn remove_snapshot_dir(location: &Path) -> Result<()> {
    std::fs::remove_dir_all(location).map_err(|err| StoreError::RemoveSnapshot {
        source: err,
        path: location.into(),
    })
}

/// All possible error types for store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Snapshot cannot be planned or built.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Index cannot be loaded or written.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// User cannot be asked.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Snapshot directory cannot be deleted.
    #[error("failed to delete snapshot directory {:?}", path.display())]
    RemoveSnapshot {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;
