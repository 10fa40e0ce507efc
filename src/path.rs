// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.
//!
//! # Default Layout
//!
//! Everything dotmgr owns lives under `$XDG_CONFIG_HOME/dotmgr` unless the
//! settings file says otherwise:
//!
//! - `config.toml`: optional [`Settings`](crate::config::Settings) file.
//! - `index.json`: the [`Index`](crate::index::Index) of saved snapshots.
//! - `saved/`: snapshot directories.
//! - `dotinfo/`: user descriptor files, searched before the bundled ones in
//!   `$XDG_DATA_HOME/dotmgr/dotinfo`.

use std::path::PathBuf;

/// Expand environment variables and leading tilde of a path string.
///
/// Variables that are not set are left in the path as literal text, e.g.,
/// `$NOPE/file` stays `$NOPE/file`. A tilde is left alone when no home
/// directory can be determined. Does not check if the path returned actually
/// exists.
pub fn resolve(path: impl AsRef<str>) -> PathBuf {
    let expanded = shellexpand::full_with_context_no_errors(
        path.as_ref(),
        || home_dir().ok().map(|home| home.to_string_lossy().into_owned()),
        |var| std::env::var(var).ok(),
    );

    PathBuf::from(expanded.into_owned())
}

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to dotmgr's configuration directory.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/dotmgr`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("dotmgr"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to directory of bundled descriptor files.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/dotmgr/dotinfo`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_bundled_descriptor_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("dotmgr").join("dotinfo"))
        .ok_or(NoWayHome)
}

/// Name of the user invoking dotmgr.
///
/// Checks `$USER`, then `$LOGNAME`, then `$USERNAME`.
pub fn current_user() -> Option<String> {
    ["USER", "LOGNAME", "USERNAME"]
        .into_iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.is_empty())
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
