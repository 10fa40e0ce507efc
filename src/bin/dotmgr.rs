// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotmgr::{
    config::{Layout, Settings},
    path::default_config_dir,
    prompt::TerminalPrompter,
    snapshot::check_segment,
    store::StoreError,
    AppDescriptor, DescriptorCatalog, Index, RemoveOutcome, SaveOutcome, Store,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use inquire::MultiSelect;
use std::{
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "dotmgr [options] <dotmgr-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config = self.config.as_deref();
        match self.command {
            Command::Save(opts) => run_save(config, opts),
            Command::Remove(opts) => run_remove(config, opts),
            Command::List(opts) => run_list(config, opts),
            Command::Show(opts) => run_show(config, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Save configuration of installed applications.
    #[command(override_usage = "dotmgr save [options] [<app>]...")]
    Save(SaveOptions),

    /// Remove saved configuration of application.
    #[command(name = "rm", alias = "remove", override_usage = "dotmgr rm [options] <app>")]
    Remove(RemoveOptions),

    /// List supported, installed, or saved applications.
    #[command(override_usage = "dotmgr list [options] <listing>")]
    List(ListOptions),

    /// Show descriptor of application.
    #[command(override_usage = "dotmgr show [options] <app>")]
    Show(ShowOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SaveOptions {
    /// Applications to save, asks which ones if none given.
    #[arg(group = "target", value_name = "app")]
    pub apps: Vec<String>,

    /// Save every installed application.
    #[arg(short, long, group = "target")]
    pub all: bool,

    /// Name of configuration to save under.
    #[arg(short, long, default_value = "default", value_name = "conf")]
    pub name: String,

    /// User to save configuration for.
    #[arg(short, long, value_name = "user")]
    pub user: Option<String>,

    /// Overwrite existing configuration without asking.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Application to remove configuration of.
    #[arg(required = true, value_name = "app")]
    pub app: String,

    /// Name of configuration to remove.
    #[arg(short, long, default_value = "default", value_name = "conf")]
    pub name: String,

    /// User to remove configuration for.
    #[arg(short, long, value_name = "user")]
    pub user: Option<String>,

    /// Remove without asking.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// What to list.
    #[arg(value_enum, value_name = "listing")]
    pub listing: Listing,

    /// User to list saved configurations of.
    #[arg(short, long, value_name = "user")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Listing {
    /// Applications with a descriptor.
    Supported,

    /// Supported applications found on the search path.
    Installed,

    /// Saved configurations of user.
    Saved,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ShowOptions {
    /// Application to show descriptor of.
    #[arg(required = true, value_name = "app")]
    pub app: String,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_save(config: Option<&Path>, opts: SaveOptions) -> Result<()> {
    let layout = load_layout(config, opts.user)?;
    check_names(&layout.user, &opts.name)?;
    let catalog = DescriptorCatalog::new(layout.descriptor_dirs.clone());
    let mut failed = 0;

    let selected: Vec<AppDescriptor> = if opts.apps.is_empty() {
        let installed = catalog.load_installed();
        if installed.is_empty() {
            info!("no installed applications found");
            return Ok(());
        }

        if opts.all {
            installed.into_values().collect()
        } else {
            let choices = installed.keys().cloned().collect::<Vec<_>>();
            let picked = MultiSelect::new("Select applications to save:", choices).prompt()?;
            installed
                .into_iter()
                .filter(|(name, _)| picked.contains(name))
                .map(|(_, descriptor)| descriptor)
                .collect()
        }
    } else {
        let supported = catalog.load_all();
        let mut selected = Vec::new();
        for app in &opts.apps {
            match supported.get(app) {
                Some(descriptor) if descriptor.is_installed() => selected.push(descriptor.clone()),
                Some(descriptor) => {
                    warn!("{app} is not installed, {} not found", descriptor.command());
                    failed += 1;
                }
                None => {
                    warn!("no descriptor for {app}");
                    failed += 1;
                }
            }
        }
        selected
    };

    let total = selected.len() + failed;
    with_store(&layout, |store| {
        let mut prompter = TerminalPrompter;
        for descriptor in &selected {
            match store.save(descriptor, &opts.name, &layout.user, opts.force, &mut prompter) {
                Ok(SaveOutcome::Saved | SaveOutcome::Skipped) => {}
                Err(StoreError::Prompt(error)) => return Err(error.into()),
                Err(error) => {
                    error!("failed to save {}: {:?}", descriptor.name(), anyhow::Error::from(error));
                    failed += 1;
                }
            }
        }

        Ok(())
    })?;

    if failed > 0 {
        bail!("failed to save {failed} of {total} applications");
    }

    Ok(())
}

fn run_remove(config: Option<&Path>, opts: RemoveOptions) -> Result<()> {
    let layout = load_layout(config, opts.user)?;
    check_names(&layout.user, &opts.name)?;
    with_store(&layout, |store| {
        let outcome = store.remove(
            &opts.app,
            &opts.name,
            &layout.user,
            opts.force,
            &mut TerminalPrompter,
        )?;

        match outcome {
            RemoveOutcome::Removed => {}
            RemoveOutcome::Declined => info!("keeping {}'s {} config for {}", layout.user, opts.name, opts.app),
            RemoveOutcome::NotSaved => {
                info!("no {} config of {} saved for {}", opts.name, opts.app, layout.user)
            }
        }

        Ok(())
    })
}

fn run_list(config: Option<&Path>, opts: ListOptions) -> Result<()> {
    let layout = load_layout(config, opts.user)?;
    let catalog = DescriptorCatalog::new(layout.descriptor_dirs.clone());
    match opts.listing {
        Listing::Supported => {
            for name in catalog.load_all().keys() {
                println!("{name}");
            }
        }
        Listing::Installed => {
            for name in catalog.load_installed().keys() {
                println!("{name}");
            }
        }
        Listing::Saved => {
            let index = Index::load(&layout.index_path)?;
            for (app, conf) in index.saved(&layout.user) {
                println!("{app}: {conf}");
            }
        }
    }

    Ok(())
}

fn run_show(config: Option<&Path>, opts: ShowOptions) -> Result<()> {
    let layout = load_layout(config, None)?;
    let supported = DescriptorCatalog::new(layout.descriptor_dirs).load_all();
    match supported.get(&opts.app) {
        Some(descriptor) => print!("{descriptor}"),
        None => bail!("no descriptor for {}", opts.app),
    }

    Ok(())
}

/// Resolve settings file into locations, user flag taking precedence.
fn load_layout(config: Option<&Path>, user: Option<String>) -> Result<Layout> {
    let path = match config {
        Some(path) => path.to_path_buf(),
        None => default_config_dir()?.join("config.toml"),
    };

    let mut settings = Settings::load(path)?;
    if user.is_some() {
        settings.user = user;
    }

    Ok(settings.into_layout()?)
}

/// Reject unusable user or configuration name before any work starts.
fn check_names(user: &str, conf: &str) -> Result<()> {
    check_segment("user", user)
        .context("set another user with --user, or `user` in the settings file")?;
    check_segment("configuration", conf)?;

    Ok(())
}

/// Run workflow on store, then flush its index no matter what happened.
fn with_store<T>(layout: &Layout, run: impl FnOnce(&mut Store) -> Result<T>) -> Result<T> {
    let mut store = Store::open(&layout.save_dir, &layout.index_path)?;
    let result = run(&mut store);

    // INVARIANT: Index changes made before a failure still reach the disk.
    match (result, store.flush()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(error)) => Err(error.into()),
        (Err(error), Ok(())) => Err(error),
        (Err(error), Err(flush_error)) => {
            error!("{:?}", anyhow::Error::from(flush_error));
            Err(error)
        }
    }
}
