// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotmgr::{descriptor::catalog::DESCRIPTOR_EXTENSION, DescriptorCatalog};

use pretty_assertions::assert_eq;
use std::path::Path;

#[test]
fn every_bundled_descriptor_loads() -> anyhow::Result<()> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("dotinfo");
    let files = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == DESCRIPTOR_EXTENSION))
        .count();

    let descriptors = DescriptorCatalog::new([dir]).load_all();
    assert_eq!(descriptors.len(), files);
    assert!(descriptors.contains_key("vim"));

    Ok(())
}
