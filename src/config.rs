// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration files that dotmgr uses to simplify
//! the process of serialization and deserialization. Aside from
//! [`Settings::load`], file I/O is left to the caller to figure out.

use crate::path::{self, NoWayHome};

use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Settings file layout.
///
/// Every field is optional. Missing fields fall back to XDG defaults when
/// resolved into a [`Layout`]. Path fields go through shell expansion, so
/// `save_dir = "$HOME/backups"` works as expected.
///
/// # General Layout
///
/// ```toml
/// user = "alice"
/// save_dir = "~/dotfiles/saved"
/// index_path = "~/dotfiles/index.json"
/// descriptor_dirs = ["~/dotfiles/dotinfo", "/usr/share/dotmgr/dotinfo"]
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// User name to file snapshots under.
    pub user: Option<String>,

    /// Root directory holding snapshot directories.
    pub save_dir: Option<PathBuf>,

    /// Location of the snapshot index file.
    pub index_path: Option<PathBuf>,

    /// Descriptor source directories in precedence order.
    pub descriptor_dirs: Option<Vec<PathBuf>>,
}

impl Settings {
    /// Load settings file at target path.
    ///
    /// A missing settings file is not an error, it just means defaults.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadFile`] if settings file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if settings file is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(data) => data.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no settings file at {:?}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::ReadFile {
                source: err,
                path: path.into(),
            }),
        }
    }

    /// Resolve settings into concrete locations.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if a default needs the home
    ///   directory and it cannot be determined.
    /// - Return [`ConfigError::NoUser`] if no user is configured and the
    ///   invoking user cannot be determined.
    pub fn into_layout(self) -> Result<Layout> {
        let config_dir = path::default_config_dir()?;
        let user = match self.user {
            Some(user) => user,
            None => path::current_user().ok_or(ConfigError::NoUser)?,
        };
        let save_dir = self.save_dir.unwrap_or_else(|| config_dir.join("saved"));
        let index_path = self
            .index_path
            .unwrap_or_else(|| config_dir.join("index.json"));
        let descriptor_dirs = match self.descriptor_dirs {
            Some(dirs) => dirs,
            None => vec![
                config_dir.join("dotinfo"),
                path::default_bundled_descriptor_dir()?,
            ],
        };

        Ok(Layout {
            user,
            save_dir,
            index_path,
            descriptor_dirs,
        })
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data)?;

        // INVARIANT: Perform shell expansion on every path field.
        let expand = |raw: PathBuf| path::resolve(raw.to_string_lossy());
        settings.save_dir = settings.save_dir.map(expand);
        settings.index_path = settings.index_path.map(expand);
        settings.descriptor_dirs = settings
            .descriptor_dirs
            .map(|dirs| dirs.into_iter().map(expand).collect());

        Ok(settings)
    }
}

/// Fully resolved locations that dotmgr operates on.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Layout {
    pub user: String,
    pub save_dir: PathBuf,
    pub index_path: PathBuf,
    pub descriptor_dirs: Vec<PathBuf>,
}

/// Descriptor file layout.
///
/// Intermediate form of an [`AppDescriptor`](crate::descriptor::AppDescriptor)
/// as written on disk. Keys are PascalCase, and unknown keys are rejected:
///
/// ```json
/// {
///     "Name": "vim",
///     "Command": "vim",
///     "Include": ["~/.vimrc", "~/.vim"],
///     "Exclude": ["*.swp"]
/// }
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct DescriptorLayout {
    /// Application identifier.
    pub name: String,

    /// Executable whose presence marks the application as installed.
    pub command: String,

    /// Paths to back up.
    pub include: Vec<String>,

    /// Patterns to leave out of backups.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl FromStr for DescriptorLayout {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Serialize value as JSON with fixed four space indentation.
///
/// Map keys come out in the order the value iterates them, so use sorted maps
/// for stable output. Always ends with a newline.
pub(crate) fn to_json_pretty(value: &impl Serialize) -> serde_json::Result<String> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    buffer.push(b'\n');

    // INVARIANT: serde_json only ever emits valid UTF-8.
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize settings file.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to deserialize descriptor file.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Settings file exists but cannot be read.
    #[error("failed to read settings file at {:?}", path.display())]
    ReadFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Default locations need a home directory.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),

    /// No user configured, and invoking user is unknown.
    #[error("cannot determine user name, set `user` in the settings file")]
    NoUser,
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
