// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Include resolution.
//!
//! Turn the include entries of an [`AppDescriptor`] into the concrete files
//! that currently exist on the host, minus anything excluded.
//!
//! # Selection Rules
//!
//! Each include entry is shell expanded first. Entries that do not exist are
//! skipped, since most applications never have every optional configuration
//! file present. An entry whose expanded path is excluded is skipped as a
//! whole. A regular file is selected as is. A directory is walked
//! recursively, even when the include entry itself is a symlink to it.
//! Symlinked directories found _inside_ the walk are never followed. During
//! the walk:
//!
//! - an excluded directory path prunes its entire subtree, and
//! - a file is dropped if its _base name_ is excluded.
//!
//! Selection is a pure function of the descriptor and the state of the file
//! system at call time.

use crate::{descriptor::AppDescriptor, path};

use ignore::WalkBuilder;
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Files selected through one include entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeSelection {
    /// Include entry as written in the descriptor.
    pub pattern: String,

    /// Expanded path of the include entry.
    pub root: PathBuf,

    /// Directories kept under root, root itself included when it is one.
    pub dirs: BTreeSet<PathBuf>,

    /// Files kept under root, or root itself when it is a file.
    pub files: BTreeSet<PathBuf>,
}

impl IncludeSelection {
    /// Check if include entry resolved to a directory.
    pub fn is_dir(&self) -> bool {
        self.dirs.contains(&self.root)
    }
}

/// Resolve include entries of a descriptor into existing files.
#[derive(Debug, Clone, Copy)]
pub struct FileSelector<'app> {
    descriptor: &'app AppDescriptor,
}

impl<'app> FileSelector<'app> {
    /// Construct new file selector for descriptor.
    pub fn new(descriptor: &'app AppDescriptor) -> Self {
        Self { descriptor }
    }

    /// Resolve into flat set of selected files.
    pub fn resolve(&self) -> BTreeSet<PathBuf> {
        self.selections()
            .into_iter()
            .flat_map(|selection| selection.files)
            .collect()
    }

    /// Resolve each include entry into its own selection.
    ///
    /// Missing and excluded include entries produce no selection at all.
    /// Selections come out in include order.
    pub fn selections(&self) -> Vec<IncludeSelection> {
        self.descriptor
            .include()
            .iter()
            .filter_map(|pattern| self.select(pattern))
            .collect()
    }

    fn select(&self, pattern: &str) -> Option<IncludeSelection> {
        let root = path::resolve(pattern);
        if !root.exists() {
            debug!("skip missing include {pattern:?} of {}", self.descriptor.name());
            return None;
        }

        if self.descriptor.is_excluded(&root) {
            debug!("skip excluded include {pattern:?} of {}", self.descriptor.name());
            return None;
        }

        let mut selection = IncludeSelection {
            pattern: pattern.to_string(),
            root: root.clone(),
            dirs: BTreeSet::new(),
            files: BTreeSet::new(),
        };

        // INVARIANT: A symlink to a directory given as include root is followed.
        if root.is_dir() {
            selection.dirs.insert(root.clone());
            self.walk(&root, &mut selection);
        } else {
            selection.files.insert(root);
        }

        Some(selection)
    }

    fn walk(&self, root: &Path, selection: &mut IncludeSelection) {
        let excludes = self.descriptor.excludes().clone();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                // INVARIANT: Root was already checked by caller.
                if entry.depth() == 0 {
                    return true;
                }

                match entry.file_type() {
                    Some(kind) if kind.is_dir() => !excludes.is_match(entry.path()),
                    _ => !excludes.is_match(entry.file_name()),
                }
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!("skip unreadable entry under {:?}: {error}", root.display());
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let path = entry.into_path();
            if path.is_dir() && !path.is_symlink() {
                selection.dirs.insert(path);
            } else if path.is_file() {
                selection.files.insert(path);
            } else {
                debug!("skip {:?}, not a regular file", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, write};

    fn home() -> anyhow::Result<PathBuf> {
        let home = std::env::current_dir()?.join("home");
        create_dir_all(&home)?;
        std::env::set_var("HOME", &home);
        Ok(home)
    }

    #[sealed_test]
    fn resolve_files_and_directories() -> anyhow::Result<()> {
        let home = home()?;
        write(home.join(".vimrc"), "set number")?;
        create_dir_all(home.join(".vim/colors"))?;
        create_dir_all(home.join(".vim/backup"))?;
        write(home.join(".vim/colors/x.vim"), "hi Normal")?;
        write(home.join(".vim/backup/file.swp"), "swap")?;

        let app = AppDescriptor::new(
            "vim",
            "vim",
            ["~/.vimrc", "~/.vim", "~/.missing"],
            ["*.swp"],
        )?;
        let result = FileSelector::new(&app).resolve();
        let expect = BTreeSet::from([home.join(".vim/colors/x.vim"), home.join(".vimrc")]);
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn excluded_directory_prunes_subtree() -> anyhow::Result<()> {
        let home = home()?;
        create_dir_all(home.join(".app/cache/deep"))?;
        write(home.join(".app/cache/deep/blob"), "x")?;
        write(home.join(".app/settings.json"), "{}")?;

        let app = AppDescriptor::new("app", "app", ["~/.app"], ["cache"])?;
        let selections = FileSelector::new(&app).selections();
        assert_eq!(selections.len(), 1);

        let selection = &selections[0];
        assert!(selection.is_dir());
        assert_eq!(selection.pattern, "~/.app");
        assert_eq!(selection.dirs, BTreeSet::from([home.join(".app")]));
        assert_eq!(
            selection.files,
            BTreeSet::from([home.join(".app/settings.json")])
        );

        Ok(())
    }

    #[sealed_test]
    fn excluded_include_root_is_skipped() -> anyhow::Result<()> {
        let home = home()?;
        write(home.join(".bash_history"), "ls")?;
        write(home.join(".bashrc"), "alias ll='ls -l'")?;

        let app = AppDescriptor::new(
            "bash",
            "bash",
            ["~/.bashrc", "~/.bash_history"],
            ["history"],
        )?;
        let result = FileSelector::new(&app).resolve();
        assert_eq!(result, BTreeSet::from([home.join(".bashrc")]));

        Ok(())
    }

    #[sealed_test]
    fn file_exclusion_only_checks_base_name() -> anyhow::Result<()> {
        let home = home()?;
        create_dir_all(home.join(".tool/swp"))?;
        write(home.join(".tool/swp/keep"), "x")?;

        // Directory path matches, so the whole subtree goes.
        let app = AppDescriptor::new("tool", "tool", ["~/.tool"], ["/swp"])?;
        assert!(FileSelector::new(&app).resolve().is_empty());

        // Full file path matches, but base name does not, so it stays.
        let app = AppDescriptor::new("tool", "tool", ["~/.tool"], ["swp/keep"])?;
        assert_eq!(
            FileSelector::new(&app).resolve(),
            BTreeSet::from([home.join(".tool/swp/keep")])
        );

        Ok(())
    }

    #[cfg(unix)]
    #[sealed_test]
    fn symlinked_include_root_is_a_directory() -> anyhow::Result<()> {
        let home = home()?;
        create_dir_all(home.join("dotfiles/nvim/lua"))?;
        create_dir_all(home.join(".config"))?;
        write(home.join("dotfiles/nvim/init.lua"), "require('a')")?;
        write(home.join("dotfiles/nvim/lua/a.lua"), "return {}")?;
        std::os::unix::fs::symlink(home.join("dotfiles/nvim"), home.join(".config/nvim"))?;

        let app = AppDescriptor::new("nvim", "nvim", ["~/.config/nvim"], [""; 0])?;
        let selections = FileSelector::new(&app).selections();
        assert_eq!(selections.len(), 1);

        let root = home.join(".config/nvim");
        let selection = &selections[0];
        assert!(selection.is_dir());
        assert_eq!(
            selection.dirs,
            BTreeSet::from([root.clone(), root.join("lua")])
        );
        assert_eq!(
            selection.files,
            BTreeSet::from([root.join("init.lua"), root.join("lua/a.lua")])
        );

        Ok(())
    }

    #[sealed_test]
    fn resolve_is_repeatable() -> anyhow::Result<()> {
        let home = home()?;
        create_dir_all(home.join(".config/kitty/themes"))?;
        write(home.join(".config/kitty/kitty.conf"), "font_size 12")?;
        write(home.join(".config/kitty/themes/dark.conf"), "background #000")?;

        let app = AppDescriptor::new("kitty", "kitty", ["$HOME/.config/kitty"], [""; 0])?;
        let selector = FileSelector::new(&app);
        assert_eq!(selector.resolve(), selector.resolve());
        assert_eq!(selector.resolve().len(), 2);

        Ok(())
    }
}
