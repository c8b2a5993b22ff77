//! maskconf - edit parameter values described by a definition file.
//!
//! Usage:
//!   maskconf params.toml --values values.toml          # edit and save on OK
//!   maskconf params.json --group Calculation           # show one group only
//!   maskconf params.toml --values values.toml --check  # validate and print
//!
//! Enable logging with RUST_LOG, e.g. `RUST_LOG=debug`.

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use maskconf::{
    ValueStore,
    data::{ConfigSchema, ParseOptions},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Parameter definition file (.json or .toml)
    definition: PathBuf,

    /// Values file (.json or .toml); loaded when present, written when the dialog is confirmed
    #[arg(short, long)]
    values: Option<PathBuf>,

    /// Only show these groups (repeatable)
    #[arg(short, long = "group")]
    groups: Vec<String>,

    /// Validate the definition and values, print them and exit
    #[arg(long)]
    check: bool,

    /// Parser settings file (.json or .toml) with `defaultWidth` and `extraKeys`
    #[arg(long)]
    options: Option<PathBuf>,

    /// Width of parameters that declare none (default 20)
    #[arg(long)]
    width: Option<u16>,

    /// Additional attribute name tolerated in parameter definitions (repeatable)
    #[arg(long = "extra-key")]
    extra_keys: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    #[cfg(not(feature = "logging"))]
    env_logger::init();

    let base = match &args.options {
        Some(path) => maskconf::load_options(path)?,
        None => ParseOptions::default(),
    };
    let mut opts = args
        .extra_keys
        .iter()
        .fold(base, |opts, key| opts.with_extra_key(key));
    if let Some(width) = args.width {
        opts = opts.with_default_width(width);
    }
    let schema = maskconf::load_schema(&args.definition, &opts)?;
    let mut store = ValueStore::new(schema);
    if let Some(path) = &args.values {
        maskconf::load_values(&mut store, path)?;
    }

    if args.check {
        print_values(&store);
        return Ok(());
    }

    let groups: Vec<&str> = args.groups.iter().map(String::as_str).collect();
    let filter = (!groups.is_empty()).then_some(groups.as_slice());
    let title = args
        .definition
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Settings".to_string());

    let Some(edited) = maskconf::run(&store, &title, filter)? else {
        println!("{}", "Cancelled, nothing saved".yellow());
        return Ok(());
    };
    store.apply(&edited)?;

    match &args.values {
        Some(path) => {
            maskconf::save_values(&store, path)?;
            println!("{} {}", "Saved".green().bold(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&store.to_json())?),
    }
    Ok(())
}

fn print_values(store: &ValueStore) {
    let schema: &ConfigSchema = store.schema();
    for group in schema.groups() {
        println!("{}", format!("[{}]", group.name()).bold());
        for spec in group.iter() {
            let Ok(value) = store.get(&spec.name) else {
                continue;
            };
            let value = match (spec.choice_label(value), value.as_flags()) {
                (Some(label), _) if value.as_i64().is_some() => format!("{value} ({label})"),
                (_, Some(bits)) => format!("{value} {:?}", spec.flag_names(bits)),
                _ => value.to_string(),
            };
            let marker = if spec.read_only { " (read-only)" } else { "" };
            println!(
                "  {} = {}{}",
                spec.name.cyan(),
                value,
                marker.dimmed()
            );
        }
    }
}
