// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{HomeFixture, ScriptedPrompter};

use dotmgr::{AppDescriptor, Index, RemoveOutcome, Store};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{fs::read_to_string, path::Path};

fn tmux_store() -> Result<(Store, AppDescriptor)> {
    let home = HomeFixture::new()?;
    home.write(".tmux.conf", "set -g mouse on")?;

    let app = AppDescriptor::new("tmux", "tmux", ["~/.tmux.conf"], [""; 0])?;
    let store = Store::open("saved", "index.json")?;
    Ok((store, app))
}

#[sealed_test]
fn save_then_remove_round_trip() -> Result<()> {
    let (mut store, app) = tmux_store()?;
    let mut prompter = ScriptedPrompter::new([true]);
    store.save(&app, "default", "alice", false, &mut prompter)?;
    assert!(store.index().query("tmux", "default", "alice"));

    let outcome = store.remove("tmux", "default", "alice", false, &mut prompter)?;
    store.flush()?;

    assert_eq!(outcome, RemoveOutcome::Removed);
    assert_eq!(
        prompter.asked,
        ["Are you sure you want to remove alice's config default for tmux?"]
    );
    assert!(!Path::new("saved/alice-tmux-default").exists());

    // INVARIANT: No empty user or application left behind.
    assert_eq!(read_to_string("index.json")?, "{}\n");
    assert!(Index::load("index.json")?.is_empty());

    Ok(())
}

#[sealed_test]
fn remove_unsaved_is_noop() -> Result<()> {
    let (mut store, app) = tmux_store()?;
    let mut prompter = ScriptedPrompter::new([true, true]);
    store.save(&app, "default", "alice", false, &mut prompter)?;

    assert_eq!(
        store.remove("tmux", "work", "alice", false, &mut prompter)?,
        RemoveOutcome::NotSaved
    );
    assert_eq!(
        store.remove("tmux", "default", "bob", false, &mut prompter)?,
        RemoveOutcome::NotSaved
    );
    assert_eq!(
        store.remove("vim", "default", "alice", false, &mut prompter)?,
        RemoveOutcome::NotSaved
    );

    assert!(prompter.asked.is_empty());
    assert!(store.index().query("tmux", "default", "alice"));
    assert!(Path::new("saved/alice-tmux-default").exists());

    Ok(())
}

#[sealed_test]
fn remove_keeps_sibling_configs() -> Result<()> {
    let (mut store, app) = tmux_store()?;
    let mut prompter = ScriptedPrompter::default();
    store.save(&app, "default", "alice", true, &mut prompter)?;
    store.save(&app, "laptop", "alice", true, &mut prompter)?;

    store.remove("tmux", "default", "alice", true, &mut prompter)?;
    store.flush()?;

    assert!(prompter.asked.is_empty());
    assert!(!Path::new("saved/alice-tmux-default").exists());
    assert!(Path::new("saved/alice-tmux-laptop").exists());

    let result = read_to_string("index.json")?;
    let expect = indoc! {r#"
        {
            "alice": {
                "tmux": [
                    "laptop"
                ]
            }
        }
    "#};
    assert_eq!(result, expect);

    Ok(())
}
