//! Marginalia - highlight text files and keep annotations in a notes store.
//!
//! # Usage
//!
//! ```bash
//! marginalia notes.txt --mark 10:20 --pen yellow
//! marginalia notes.txt --list
//! marginalia notes.txt --watch
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use marginalia::config::{
    clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags, ConfigFlags,
};
use marginalia::hooks::Hooks;
use marginalia::session::Session;
use marginalia::watcher::StoreWatcher;

/// Highlight text files and keep annotations in a plain-text notes store
#[derive(Parser, Debug)]
#[command(name = "marginalia", version, about, long_about = None)]
struct Cli {
    /// Text file to annotate
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Notes store file (default: marginalia.org)
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Create a highlight over BEG:END (char offsets)
    #[arg(long, value_name = "BEG:END")]
    mark: Option<String>,

    /// Pen label for --mark
    #[arg(long, value_name = "LABEL")]
    pen: Option<String>,

    /// Remove the highlight covering this offset
    #[arg(long, value_name = "OFFSET")]
    unmark: Option<usize>,

    /// With --unmark: delete the whole store entry, annotation included
    #[arg(long)]
    hard: bool,

    /// Confirm destructive deletions without prompting
    #[arg(long)]
    yes: bool,

    /// List stored highlights for the file
    #[arg(long)]
    list: bool,

    /// Print the annotation for the highlight at this offset
    #[arg(long, value_name = "OFFSET")]
    note: Option<usize>,

    /// Run a full save-triggered sync pass for the file and exit
    #[arg(long)]
    sync: bool,

    /// Watch the store for external edits and keep pulling them in
    #[arg(short, long)]
    watch: bool,

    /// Enable verbose diagnostics
    #[arg(long)]
    verbose: bool,

    /// Save current command-line flags as defaults in .marginaliarc
    #[arg(long)]
    save: bool,

    /// Clear saved defaults in .marginaliarc
    #[arg(long)]
    clear: bool,
}

fn parse_mark_range(raw: &str) -> Result<(usize, usize)> {
    let (beg, end) = raw
        .split_once(':')
        .with_context(|| format!("invalid --mark range '{raw}', expected BEG:END"))?;
    let beg = beg.trim().parse().with_context(|| format!("invalid offset '{beg}'"))?;
    let end = end.trim().parse().with_context(|| format!("invalid offset '{end}'"))?;
    if beg >= end {
        bail!("empty --mark range {beg}:{end}");
    }
    Ok((beg, end))
}

fn main() -> Result<()> {
    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();

    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let flags = file_flags.union(&cli_flags);

    let mut hooks = Hooks::default();
    let configured_store = flags.store_path();
    hooks.store_path = Box::new(move |_| configured_store.clone());
    if cli.yes {
        hooks.confirm_delete = Some(Box::new(|_| true));
    }

    let source_name = cli.file.to_string_lossy().into_owned();
    let mut session = Session::for_source(&source_name, hooks)
        .with_context(|| format!("Failed to open store {}", flags.store_path().display()))?;
    let store_path = session.store().path().to_path_buf();

    let doc = session
        .open_file(&cli.file)
        .with_context(|| format!("Failed to open {}", cli.file.display()))?;
    let name = doc
        .borrow()
        .canonical_name()
        .map(ToOwned::to_owned)
        .context("document has no canonical name")?;

    if let Some(raw) = &cli.mark {
        let (beg, end) = parse_mark_range(raw)?;
        let id = session.create_highlight(&name, beg, end, cli.pen.as_deref())?;
        session.save_document(&name)?;
        println!("marked [{beg}, {end}) as {id}");
    }

    if let Some(at) = cli.unmark {
        if session.remove_highlight(&name, at, cli.hard)? {
            session.save_document(&name)?;
            println!("unmarked highlight at {at}");
        } else {
            println!("nothing removed at {at}");
        }
    }

    if let Some(at) = cli.note {
        let body = session.open_annotation(&name, at, true)?;
        println!("{body}");
    }

    if cli.sync {
        session.save_document(&name)?;
        println!("synced {name}");
    }

    if cli.list {
        let stored = session.store().get_all(&name);
        if stored.is_empty() {
            println!("no highlights for {name}");
        }
        for entry in stored {
            let label = entry.label.as_deref().unwrap_or("default");
            println!("{}  {}  {}  {}", entry.id, entry.span, label, entry.body_excerpt);
        }
    }

    if flags.watch {
        let mut watcher = StoreWatcher::new(&store_path, Duration::from_millis(250))
            .with_context(|| format!("Failed to watch {}", store_path.display()))?;
        println!("watching {} (ctrl-c to stop)", watcher.target_path().display());
        loop {
            if watcher.take_change_ready() {
                session.reload_store()?;
                let count = doc.borrow().tracker().len();
                println!("store changed: {count} highlight(s) now tracked");
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    Ok(())
}
