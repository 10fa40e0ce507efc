// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{FixedProbe, HomeFixture, ScriptedPrompter};

use dotmgr::{snapshot::MANIFEST_NAME, DescriptorCatalog, Index, SaveOutcome, SnapshotInfo, Store};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    collections::BTreeSet,
    fs::read_to_string,
    path::Path,
};

const VIM: &str = indoc! {r#"
    {
        "Name": "vim",
        "Command": "vim",
        "Include": ["~/.vimrc", "~/.vim"],
        "Exclude": ["*.swp"]
    }
"#};

const GIT: &str = indoc! {r#"
    {
        "Name": "git",
        "Command": "git",
        "Include": ["~/.gitconfig", "~/.config/git/"]
    }
"#};

fn vim_home() -> Result<HomeFixture> {
    let home = HomeFixture::new()?;
    home.write(".vimrc", "set number")?;
    home.write(".vim/colors/x.vim", "hi Normal ctermbg=none")?;
    home.write(".vim/backup/file.swp", "swap")?;
    home.add_descriptor("dotinfo", "vim", VIM)?;
    home.add_descriptor("dotinfo", "git", GIT)?;

    Ok(home)
}

#[sealed_test]
fn save_vim_for_alice() -> Result<()> {
    vim_home()?;
    let descriptors = DescriptorCatalog::new(["dotinfo"]).load_installed_with(&FixedProbe::new(["vim"]));
    assert_eq!(descriptors.keys().collect::<Vec<_>>(), ["vim"]);

    let mut store = Store::open("saved", "index.json")?;
    let mut prompter = ScriptedPrompter::default();
    let outcome = store.save(&descriptors["vim"], "default", "alice", false, &mut prompter)?;
    store.flush()?;

    assert_eq!(outcome, SaveOutcome::Saved);
    assert!(prompter.asked.is_empty());

    let location = Path::new("saved/alice-vim-default");
    assert_eq!(read_to_string(location.join(".vimrc"))?, "set number");
    assert_eq!(
        read_to_string(location.join(".vim/colors/x.vim"))?,
        "hi Normal ctermbg=none"
    );
    assert!(!location.join(".vim/backup/file.swp").exists());

    let result = read_to_string(location.join(MANIFEST_NAME))?;
    let expect = indoc! {r#"
        {
            ".vim": "~/.vim",
            ".vimrc": "~/.vimrc"
        }
    "#};
    assert_eq!(result, expect);

    let index = Index::load("index.json")?;
    assert!(index.query("vim", "default", "alice"));

    Ok(())
}

#[sealed_test]
fn forced_resave_is_stable() -> Result<()> {
    let home = vim_home()?;
    let descriptors = DescriptorCatalog::new(["dotinfo"]).load_all();
    let mut store = Store::open("saved", "index.json")?;
    let mut prompter = ScriptedPrompter::default();

    store.save(&descriptors["vim"], "default", "alice", true, &mut prompter)?;
    let first = read_to_string("saved/alice-vim-default/.dotmatch.json")?;

    home.write(".vimrc", "set relativenumber")?;
    store.save(&descriptors["vim"], "default", "alice", true, &mut prompter)?;
    let second = read_to_string("saved/alice-vim-default/.dotmatch.json")?;

    assert!(prompter.asked.is_empty());
    assert_eq!(first, second);
    assert_eq!(
        read_to_string("saved/alice-vim-default/.vimrc")?,
        "set relativenumber"
    );
    assert_eq!(store.index().saved("alice"), [("vim", "default")]);

    Ok(())
}

#[sealed_test]
fn confirmed_overwrite_replaces_snapshot() -> Result<()> {
    let home = vim_home()?;
    let descriptors = DescriptorCatalog::new(["dotinfo"]).load_all();
    let mut store = Store::open("saved", "index.json")?;
    let mut prompter = ScriptedPrompter::new([true]);

    store.save(&descriptors["vim"], "default", "alice", false, &mut prompter)?;
    std::fs::remove_dir_all(home.path().join(".vim"))?;
    let outcome = store.save(&descriptors["vim"], "default", "alice", false, &mut prompter)?;

    assert_eq!(outcome, SaveOutcome::Saved);
    assert_eq!(
        prompter.asked,
        ["vim config 'default' already exists for alice. Overwrite it?"]
    );
    assert!(!Path::new("saved/alice-vim-default/.vim").exists());

    let result = read_to_string("saved/alice-vim-default/.dotmatch.json")?;
    let expect = indoc! {r#"
        {
            ".vimrc": "~/.vimrc"
        }
    "#};
    assert_eq!(result, expect);

    Ok(())
}

#[sealed_test]
fn missing_includes_are_skipped() -> Result<()> {
    let home = HomeFixture::new()?;
    home.write(".gitconfig", "[user]\n\tname = alice")?;
    home.add_descriptor("dotinfo", "git", GIT)?;

    let descriptors = DescriptorCatalog::new(["dotinfo"]).load_all();
    let mut store = Store::open("saved", "index.json")?;
    store.save(&descriptors["git"], "work", "alice", false, &mut ScriptedPrompter::default())?;

    let location = Path::new("saved/alice-git-work");
    assert!(SnapshotInfo::is_complete(location));
    assert!(location.join(".gitconfig").is_file());
    assert!(!location.join("git").exists());

    let result = read_to_string(location.join(MANIFEST_NAME))?;
    let expect = indoc! {r#"
        {
            ".gitconfig": "~/.gitconfig"
        }
    "#};
    assert_eq!(result, expect);

    Ok(())
}

#[sealed_test]
fn saves_survive_reload() -> Result<()> {
    let home = vim_home()?;
    home.write(".gitconfig", "[core]\n\teditor = vim")?;
    home.write(".config/git/ignore", "target/")?;

    let descriptors = DescriptorCatalog::new(["dotinfo"]).load_all();
    let mut prompter = ScriptedPrompter::default();
    let mut store = Store::open("state/saved", "state/index.json")?;
    store.save(&descriptors["vim"], "default", "alice", false, &mut prompter)?;
    store.save(&descriptors["vim"], "laptop", "alice", false, &mut prompter)?;
    store.save(&descriptors["git"], "default", "bob", false, &mut prompter)?;
    store.flush()?;

    let index = Index::load("state/index.json")?;
    assert_eq!(index.users(), BTreeSet::from(["alice", "bob"]));
    assert_eq!(index.apps(), BTreeSet::from(["git", "vim"]));
    assert_eq!(index.confs(), BTreeSet::from(["default", "laptop"]));
    assert_eq!(index.saved("alice"), [("vim", "default"), ("vim", "laptop")]);
    assert!(index.query("git", "default", "bob"));
    assert!(!index.query("git", "default", "alice"));
    assert_eq!(
        read_to_string("state/saved/bob-git-default/git/ignore")?,
        "target/"
    );

    let result = read_to_string("state/index.json")?;
    let expect = indoc! {r#"
        {
            "alice": {
                "vim": [
                    "default",
                    "laptop"
                ]
            },
            "bob": {
                "git": [
                    "default"
                ]
            }
        }
    "#};
    assert_eq!(result, expect);

    Ok(())
}

#[cfg(unix)]
#[sealed_test]
fn save_symlinked_config_directory() -> Result<()> {
    let home = HomeFixture::new()?;
    home.write("dotfiles/nvim/init.lua", "require('plugins')")?;
    home.write("dotfiles/nvim/lua/plugins.lua", "return {}")?;
    home.write(".config/.keep", "")?;
    std::os::unix::fs::symlink(
        home.path().join("dotfiles/nvim"),
        home.path().join(".config/nvim"),
    )?;

    let app = dotmgr::AppDescriptor::new("nvim", "nvim", ["~/.config/nvim"], [""; 0])?;
    let mut store = Store::open("saved", "index.json")?;
    let outcome = store.save(&app, "default", "alice", false, &mut ScriptedPrompter::default())?;
    assert_eq!(outcome, SaveOutcome::Saved);

    let location = Path::new("saved/alice-nvim-default");
    assert!(SnapshotInfo::is_complete(location));
    assert!(!location.join("nvim").is_symlink());
    assert_eq!(
        read_to_string(location.join("nvim/init.lua"))?,
        "require('plugins')"
    );
    assert_eq!(
        read_to_string(location.join("nvim/lua/plugins.lua"))?,
        "return {}"
    );

    let result = read_to_string(location.join(MANIFEST_NAME))?;
    let expect = indoc! {r#"
        {
            "nvim": "~/.config/nvim"
        }
    "#};
    assert_eq!(result, expect);
    assert!(store.index().query("nvim", "default", "alice"));

    Ok(())
}
