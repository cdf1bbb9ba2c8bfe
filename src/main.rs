//! docfile - pending-change reconciliation for OData file attachments.
//!
//! Usage:
//!   docfile resolve-name NAME [EXISTING...]              Collision-free name
//!   docfile validate-name CURRENT INPUT [EXISTING...]    Check a rename
//!   docfile simulate PLAN                                Replay a save plan
//!   docfile config                                       Show effective settings
//!   docfile --help                                       Show help

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use docfile_core::naming::{self, NameResolver};
use docfile_core::{CollectionKey, DocfileConfig, ItemId};
use docfile_ops::memory::{CountingBinding, MemoryDataClient, MemoryTransport, TransferStep};
use docfile_ops::{
    AttachmentCollection, BatchSubmitter, EnglishTexts, FileSelection, ProgressDisplay,
    ReconciliationController, SaveOutcome, StatusSink, StatusUpdate, Texts, UploadGate,
    UploadOrchestrator,
};

#[derive(Parser)]
#[command(
    name = "docfile",
    version,
    about = "Pending-change reconciliation for OData file attachments",
    long_about = "docfile batches local deletes, renames and uploads of attachment \
                  collections and submits them per operation class.\n\n\
                  Use `simulate` to replay a save plan against an in-memory service."
)]
struct Cli {
    /// Config file (defaults to <config dir>/docfile/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute a collision-free name for a new file
    ResolveName {
        /// Name of the file being added
        name: String,

        /// Names already in the collection
        existing: Vec<String>,
    },

    /// Validate a rename the way the rename dialog does
    ValidateName {
        /// Current file name
        current: String,

        /// Typed name without extension
        input: String,

        /// Other names in the collection
        existing: Vec<String>,
    },

    /// Replay a JSON save plan against the in-memory service
    Simulate {
        /// Plan file
        plan: PathBuf,

        /// Output format of the final collection state
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// A scripted editing session.
#[derive(Debug, Deserialize)]
struct SavePlan {
    collections: Vec<CollectionPlan>,
    #[serde(default)]
    fail_token: bool,
}

#[derive(Debug, Deserialize)]
struct CollectionPlan {
    object_type: String,
    object_id: String,
    document_type: String,
    /// Files already on the server.
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    delete: Vec<String>,
    #[serde(default)]
    rename: Vec<RenamePlan>,
    #[serde(default)]
    upload: Vec<UploadPlan>,
    /// Server files whose requests fail.
    #[serde(default)]
    fail: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RenamePlan {
    from: String,
    /// New name as typed, without extension.
    to: String,
}

#[derive(Debug, Deserialize)]
struct UploadPlan {
    name: String,
    #[serde(default = "default_upload_size")]
    size: u64,
    #[serde(default = "default_upload_status")]
    status: u16,
}

fn default_upload_size() -> u64 {
    1024
}

fn default_upload_status() -> u16 {
    201
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "docfile=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::ResolveName { name, existing } => {
            let resolver = NameResolver::new(config.max_name_length);
            let existing: HashSet<String> = existing.into_iter().collect();
            println!("{}", resolver.resolve(&existing, &name));
        }
        Command::ValidateName {
            current,
            input,
            existing,
        } => {
            run_validate(&config, &current, &input, existing)?;
        }
        Command::Simulate { plan, format } => {
            run_simulate(config, &plan, format).await?;
        }
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<DocfileConfig> {
    let config = match path {
        Some(path) => DocfileConfig::load(path),
        None => DocfileConfig::load_default(),
    };
    config.wrap_err("Could not load configuration")
}

/// Check a typed rename and print the resulting name.
fn run_validate(
    config: &DocfileConfig,
    current: &str,
    input: &str,
    existing: Vec<String>,
) -> Result<()> {
    let resolver = NameResolver::new(config.max_name_length);
    let (_, extension) = naming::split_extension(current);
    let proposed = naming::compose_rename_input(input, extension);
    let existing: HashSet<String> = existing.into_iter().filter(|n| n != current).collect();

    match resolver.validate_rename(&existing, current, &proposed)? {
        Some(name) => println!("{name}"),
        None => println!("{current} (unchanged)"),
    }
    Ok(())
}

/// Replay a save plan and print every status change.
async fn run_simulate(config: DocfileConfig, plan_path: &Path, format: OutputFormat) -> Result<()> {
    let source = std::fs::read_to_string(plan_path)
        .wrap_err_with(|| format!("Could not read plan {}", plan_path.display()))?;
    let plan: SavePlan = serde_json::from_str(&source).wrap_err("Invalid save plan")?;
    tracing::debug!(collections = plan.collections.len(), "save plan loaded");

    let texts: Arc<dyn Texts> = Arc::new(EnglishTexts);
    let server = Arc::new(MemoryDataClient::new(&config));
    if plan.fail_token {
        server.fail_security_token();
    }

    let gate = UploadGate::new();
    let orchestrator = UploadOrchestrator::new(&config, gate.clone(), texts.clone());
    let mut collections = Vec::with_capacity(plan.collections.len());

    for entry in &plan.collections {
        let key = CollectionKey::new(
            entry.object_type.as_str(),
            entry.object_id.as_str(),
            entry.document_type.as_str(),
        );
        for name in &entry.files {
            let file_id = server.add_file(&key, name.as_str(), "0001");
            if entry.fail.contains(name) {
                server.fail_file(file_id);
            }
        }

        let mut collection = AttachmentCollection::from_records(key.clone(), server.files(&key))
            .with_max_files(config.max_files);
        apply_edits(&orchestrator, &server, &mut collection, entry)
            .wrap_err_with(|| format!("Could not apply plan for {key}"))?;
        collections.push(collection);
    }

    let controller = ReconciliationController::new(
        BatchSubmitter::new(server.clone(), &config, gate),
        texts.clone(),
    );
    let display = ConsoleDisplay { texts };
    let binding = CountingBinding::default();

    let outcome = controller.save(&mut collections, &binding, &display).await;
    match &outcome {
        SaveOutcome::NothingToSave => println!("Nothing has changed"),
        SaveOutcome::Saved { reports } => {
            for report in reports {
                println!(
                    "{} | {} | {}",
                    report.deletes.summary(),
                    report.renames.summary(),
                    report.uploads.summary()
                );
            }
        }
        SaveOutcome::Failed { errors, .. } => {
            for (key, error) in errors {
                println!("{key}: {error}");
            }
        }
    }

    print_collections(&collections, format)?;

    if outcome.is_success() {
        Ok(())
    } else {
        Err(eyre!("Some files could not be processed"))
    }
}

fn apply_edits(
    orchestrator: &UploadOrchestrator,
    server: &Arc<MemoryDataClient>,
    collection: &mut AttachmentCollection,
    entry: &CollectionPlan,
) -> Result<()> {
    for name in &entry.delete {
        let id = find_item(collection, name)?;
        collection.mark_for_deletion(id)?;
    }

    for rename in &entry.rename {
        let id = find_item(collection, &rename.from)?;
        let (_, extension) = naming::split_extension(&rename.from);
        let proposed = naming::compose_rename_input(&rename.to, extension);
        orchestrator.rename_to(collection, id, &proposed)?;
    }

    for upload in &entry.upload {
        let transport = MemoryTransport::with_steps(
            upload.size,
            vec![
                TransferStep::Progress(upload.size / 2),
                TransferStep::Progress(upload.size),
                TransferStep::Complete(upload.status),
            ],
        )
        .storing_on(server.clone());
        orchestrator.attach(
            collection,
            FileSelection::selected(upload.name.as_str()),
            Box::new(transport),
        )?;
    }

    Ok(())
}

fn find_item(collection: &AttachmentCollection, name: &str) -> Result<ItemId> {
    collection
        .items()
        .find(|item| item.file_name == name)
        .map(|item| item.id)
        .ok_or_else(|| eyre!("No file named '{name}' in {}", collection.key()))
}

fn print_collections(collections: &[AttachmentCollection], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for collection in collections {
                println!();
                println!("{}", "─".repeat(60));
                println!(" {} - {} files", collection.key(), collection.len());
                println!("{}", "─".repeat(60));
                for item in collection.snapshot().items {
                    println!(
                        "  {:<40} {:>10} {}",
                        item.file_name,
                        item.file_id.as_deref().unwrap_or("-"),
                        item.upload_status
                    );
                }
            }
        }
        OutputFormat::Json => {
            let snapshots: Vec<_> = collections.iter().map(AttachmentCollection::snapshot).collect();
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
        }
    }
    Ok(())
}

/// Prints status changes as they happen.
struct ConsoleDisplay {
    texts: Arc<dyn Texts>,
}

impl StatusSink for ConsoleDisplay {
    fn publish(&self, update: StatusUpdate) {
        println!(
            "  [{:<6}] {:<40} {}",
            update.class,
            update.file_name,
            update.status.label(self.texts.as_ref())
        );
    }
}

impl ProgressDisplay for ConsoleDisplay {
    fn open(&self, title: &str) {
        println!("{title}");
    }

    fn close(&self) {}

    fn show_dismiss(&self) {
        eprintln!("Failed items keep their pending changes");
    }
}
