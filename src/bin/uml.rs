//! UML Modeler CLI
//!
//! Edits the active snapshot one command at a time. Every model command loads
//! the active snapshot, applies a single change, and writes it back. Snapshot
//! commands work on the index alone, so a damaged snapshot can still be
//! listed, deleted or switched away from.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uml_modeler::{ModelConfig, ModelFacade, SnapshotStatus, SnapshotStore};

#[derive(Parser)]
#[command(name = "uml")]
#[command(about = "Build a UML class model and keep it in named snapshots")]
struct Cli {
    /// Path to a config file (uml.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Snapshot directory (overrides config)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Skip confirmation prompts
    #[arg(short, long)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty snapshot and make it active
    New { name: String },

    /// Save the working model under a name and make it active
    Save { name: String },

    /// Make an existing snapshot the active one
    Load { name: String },

    /// List snapshots and show which one is active
    Snapshots,

    /// Delete a snapshot file and its index entry
    DeleteSnapshot { name: String },

    /// Empty the active snapshot, keeping it active
    Clear,

    /// Deactivate every snapshot
    Default,

    /// Class commands
    #[command(subcommand)]
    Class(ClassCommand),

    /// Attribute commands
    #[command(subcommand)]
    Attr(AttrCommand),

    /// Relationship commands
    #[command(subcommand)]
    Rel(RelCommand),

    /// Sort classes alphabetically
    Sort,

    /// Show the whole model, or one class in detail
    Show { class: Option<String> },
}

#[derive(Subcommand)]
enum ClassCommand {
    Add { name: String },
    Delete { name: String },
    Rename { old: String, new: String },
}

#[derive(Subcommand)]
enum AttrCommand {
    Add { class: String, name: String },
    Delete { class: String, name: String },
    Rename { class: String, old: String, new: String },
}

#[derive(Subcommand)]
enum RelCommand {
    Add { source: String, dest: String, kind: String },
    Delete { source: String, dest: String },
    /// Change the kind of an existing relationship
    Kind { source: String, dest: String, kind: String },
}

fn main() {
    let cli = Cli::parse();

    let config = match ModelConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli, config) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, mut config: ModelConfig) -> anyhow::Result<()> {
    config.storage.dir = match cli.dir {
        Some(dir) => dir,
        None => config.storage_dir(),
    };
    let store = SnapshotStore::from_config(&config.storage)
        .with_context(|| format!("opening snapshots in {:?}", config.storage.dir))?;

    let mut model = ModelFacade::new(store);
    if !cli.yes {
        model = model.with_confirmation(|prompt: &str| {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
                .unwrap_or(false)
        });
    }

    match cli.command {
        Commands::New { name } => {
            model.create_snapshot(&name)?;
            println!("✅ Created snapshot '{}'", name);
        }
        Commands::Save { name } => {
            model.load_active()?;
            model.save(&name)?;
            model.set_active(&name)?;
            println!("✅ Saved model to '{}'", name);
        }
        Commands::Load { name } => {
            model.load(&name)?;
            println!("✅ Loaded '{}'", name);
        }
        Commands::Snapshots => {
            let mut any = false;
            for (name, status) in model.list_snapshots() {
                any = true;
                let marker = if status == SnapshotStatus::On { "*" } else { " " };
                println!("{} {}", marker, name);
            }
            if !any {
                println!("No snapshots");
            }
        }
        Commands::DeleteSnapshot { name } => {
            model.delete_snapshot(&name)?;
            println!("✅ Deleted snapshot '{}'", name);
        }
        Commands::Clear => {
            let name = model.clear_active()?;
            println!("✅ Cleared data in '{}'", name);
        }
        Commands::Default => {
            model.end_session()?;
            println!("✅ Back to the default program, no active snapshot");
        }
        Commands::Show { class } => {
            model.load_active()?;
            match class {
                Some(class) => print_class(&model, &class)?,
                None => print_model(&model),
            }
        }
        command => {
            let Some(active) = model.load_active()? else {
                bail!("no active snapshot; run `uml new <name>` or `uml load <name>` first");
            };
            let message = apply(&mut model, command)?;
            model.save(&active)?;
            println!("✅ {}", message);
        }
    }
    Ok(())
}

/// Apply one model mutation, returning a summary line
fn apply(model: &mut ModelFacade, command: Commands) -> anyhow::Result<String> {
    let message = match command {
        Commands::Class(ClassCommand::Add { name }) => {
            format!("Added class '{}'", model.add_class(&name)?)
        }
        Commands::Class(ClassCommand::Delete { name }) => {
            model.delete_class(&name)?;
            format!("Deleted class '{}'", name)
        }
        Commands::Class(ClassCommand::Rename { old, new }) => {
            let new = model.rename_class(&old, &new)?;
            format!("Renamed class '{}' to '{}'", old, new)
        }
        Commands::Attr(AttrCommand::Add { class, name }) => {
            let name = model.add_attribute(&class, &name)?;
            format!("Added attribute '{}' to '{}'", name, class)
        }
        Commands::Attr(AttrCommand::Delete { class, name }) => {
            model.delete_attribute(&class, &name)?;
            format!("Deleted attribute '{}' from '{}'", name, class)
        }
        Commands::Attr(AttrCommand::Rename { class, old, new }) => {
            let new = model.rename_attribute(&class, &old, &new)?;
            format!("Renamed attribute '{}' to '{}' in '{}'", old, new, class)
        }
        Commands::Rel(RelCommand::Add { source, dest, kind }) => {
            model.add_relationship(&source, &dest, &kind)?;
            format!("Added {} relationship from '{}' to '{}'", kind, source, dest)
        }
        Commands::Rel(RelCommand::Delete { source, dest }) => {
            model.remove_relationship(&source, &dest)?;
            format!("Removed relationship from '{}' to '{}'", source, dest)
        }
        Commands::Rel(RelCommand::Kind { source, dest, kind }) => {
            model.change_relationship_kind(&source, &dest, &kind)?;
            format!("Relationship from '{}' to '{}' is now {}", source, dest, kind)
        }
        Commands::Sort => {
            model.sort_classes();
            "Sorted classes".to_string()
        }
        _ => bail!("not a model command"),
    };
    Ok(message)
}

fn print_model(model: &ModelFacade) {
    match model.active_snapshot() {
        Some(name) => println!("Snapshot: {}", name),
        None => println!("Snapshot: (none)"),
    }
    if model.classes().is_empty() {
        println!("No classes");
    }
    for class in model.classes().iter() {
        let attributes: Vec<_> = class.attribute_names().collect();
        println!("{} [{}]", class.name(), attributes.join(", "));
    }
    for rel in model.relationships().iter() {
        println!("{} --{}--> {}", rel.source(), rel.kind(), rel.destination());
    }
}

fn print_class(model: &ModelFacade, name: &str) -> anyhow::Result<()> {
    let detail = model.class_detail(name)?;
    println!("Class: {}", detail.class.name());
    for attribute in detail.class.attribute_names() {
        println!("  - {}", attribute);
    }
    for rel in &detail.outgoing {
        println!("  --{}--> {}", rel.kind(), rel.destination());
    }
    for rel in &detail.incoming {
        println!("  <--{}-- {}", rel.kind(), rel.source());
    }
    Ok(())
}
