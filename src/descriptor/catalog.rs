// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Descriptor catalog.
//!
//! Load every descriptor file found in a listing of source directories.
//! Source directories are searched in precedence order, so user descriptors
//! placed in an earlier directory override bundled ones placed in a later
//! directory. Once an application name is claimed, any later descriptor for
//! the same name is reported and ignored.
//!
//! A broken descriptor file never prevents the rest from loading. It is
//! reported and skipped.

use crate::descriptor::{AppDescriptor, CommandProbe, SearchPath};

use std::{
    collections::{btree_map::Entry, BTreeMap},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// File extension of descriptor files.
pub const DESCRIPTOR_EXTENSION: &str = "dotinfo";

/// Descriptors keyed by application name.
pub type Descriptors = BTreeMap<String, AppDescriptor>;

/// Collection of descriptor source directories.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DescriptorCatalog {
    source_dirs: Vec<PathBuf>,
}

impl DescriptorCatalog {
    /// Construct new catalog over source directories in precedence order.
    pub fn new(source_dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            source_dirs: source_dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Source directories in precedence order.
    pub fn source_dirs(&self) -> &[PathBuf] {
        &self.source_dirs
    }

    /// Load all supported application descriptors.
    #[instrument(skip(self), level = "debug")]
    pub fn load_all(&self) -> Descriptors {
        let mut descriptors = Descriptors::new();
        for dir in &self.source_dirs {
            for path in descriptor_files(dir) {
                let descriptor = match AppDescriptor::from_descriptor_file(&path) {
                    Ok(descriptor) => descriptor,
                    Err(error) => {
                        warn!("skip descriptor {:?}: {}", path.display(), error_chain(&error));
                        continue;
                    }
                };

                match descriptors.entry(descriptor.name().to_string()) {
                    Entry::Occupied(_) => {
                        warn!(
                            "duplicate descriptor for {}, skipping {:?}",
                            descriptor.name(),
                            path.display()
                        );
                    }
                    Entry::Vacant(slot) => {
                        debug!("load descriptor {} from {:?}", descriptor.name(), path.display());
                        slot.insert(descriptor);
                    }
                }
            }
        }

        descriptors
    }

    /// Load descriptors of applications installed on the search path.
    pub fn load_installed(&self) -> Descriptors {
        self.load_installed_with(&SearchPath)
    }

    /// Load descriptors of applications installed according to given probe.
    ///
    /// Filtering happens after duplicates are resolved, so an overriding
    /// descriptor with a missing command hides a bundled one with a present
    /// command.
    pub fn load_installed_with(&self, probe: &impl CommandProbe) -> Descriptors {
        let mut descriptors = self.load_all();
        descriptors.retain(|_, descriptor| descriptor.is_installed_with(probe));
        descriptors
    }
}

/// Descriptor files of a directory sorted by file name.
fn descriptor_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!("descriptor directory {:?} does not exist", dir.display());
            return Vec::new();
        }
        Err(error) => {
            warn!("cannot read descriptor directory {:?}: {error}", dir.display());
            return Vec::new();
        }
    };

    let mut files = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == DESCRIPTOR_EXTENSION)
        })
        .collect::<Vec<_>>();
    files.sort();

    files
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}
