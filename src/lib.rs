// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Personal dotfile backup manager.
//!
//! dotmgr copies the configuration files of installed applications into named
//! __snapshots__, one directory per user, application, and configuration
//! name. Which files belong to an application is described by an
//! __application descriptor__ loaded from a `.dotinfo` file. Which snapshots
//! exist is recorded in the __index__.
//!
//! # Workflow
//!
//! 1. Load descriptors through a [`DescriptorCatalog`].
//! 2. Open a [`Store`] over the save directory and index file.
//! 3. Run [`Store::save`] or [`Store::remove`] as needed.
//! 4. Run [`Store::flush`] once at the end, whatever happened before.
//!
//! # See Also
//!
//! 1. [`snapshot`] for how a snapshot is laid out on disk.
//! 2. [`descriptor`] for include and exclude semantics.

pub mod config;
pub mod descriptor;
pub mod index;
pub mod path;
pub mod prompt;
pub mod snapshot;
pub mod store;

pub use descriptor::{catalog::DescriptorCatalog, AppDescriptor};
pub use index::Index;
pub use snapshot::SnapshotInfo;
pub use store::{RemoveOutcome, SaveOutcome, Store};
