//! SLR Wizard CLI
//!
//! The `slr` command works on exported wizard snapshots (the JSON written by
//! "export" in the wizard) and can push them to the backend.
//!
//! ## Commands
//!
//! - `check`: list the fields each step still needs
//! - `evaluate`: run the PRISMA/WPOM checklist
//! - `import-references`: load a reference file into a snapshot
//! - `export-protocol`: print the protocol document sent to the backend
//! - `push`: create or update the backend project from a snapshot
//! - `fetch-protocol`: download the protocol stored for a project
//! - `config`: show the effective configuration

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use slr_client::ApiClient;
use slr_core::{
    compliance, export, references, save_protocol, sequencer, EvaluationSummary, ProjectStore,
    ScreeningStats, WizardConfig, WizardData, WizardStep,
};

#[derive(Parser)]
#[command(name = "slr")]
#[command(version = slr_core::VERSION)]
#[command(about = "Systematic literature review protocol wizard", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML); `SLR_*` variables override it
    #[arg(short, long, global = true, env = "SLR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which required fields are still missing, step by step
    Check {
        /// Wizard snapshot (JSON)
        snapshot: PathBuf,
    },

    /// Evaluate the PRISMA/WPOM checklist of a snapshot
    Evaluate {
        snapshot: PathBuf,

        /// Print the items as JSON instead of a table
        #[arg(long)]
        as_json: bool,

        /// Store the evaluated checklist back into the snapshot
        #[arg(long)]
        write: bool,
    },

    /// Replace the screening references of a snapshot with a reference file
    ImportReferences {
        snapshot: PathBuf,

        /// JSON array of references (`title`, `authors`, `year`, `abstract`)
        file: PathBuf,

        /// Where to write the updated snapshot (default: overwrite input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the protocol document built from a snapshot
    ExportProtocol {
        snapshot: PathBuf,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create or update the backend project from a snapshot
    Push {
        snapshot: PathBuf,

        /// Store the project id back into the snapshot
        #[arg(long)]
        write: bool,
    },

    /// Download the protocol document stored for a project
    FetchProtocol {
        project_id: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    slr_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check { snapshot } => cmd_check(&snapshot),
        Commands::Evaluate {
            snapshot,
            as_json,
            write,
        } => cmd_evaluate(&snapshot, as_json, write),
        Commands::ImportReferences {
            snapshot,
            file,
            output,
        } => cmd_import_references(&snapshot, &file, output.as_deref()),
        Commands::ExportProtocol { snapshot, output } => {
            cmd_export_protocol(&snapshot, output.as_deref())
        }
        Commands::Push { snapshot, write } => {
            let client = api_client(&config)?;
            cmd_push(&client, &snapshot, write).await
        }
        Commands::FetchProtocol { project_id, output } => {
            let client = api_client(&config)?;
            cmd_fetch_protocol(&client, &project_id, output.as_deref()).await
        }
        Commands::Config => cmd_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<WizardConfig> {
    match path {
        Some(path) => WizardConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => WizardConfig::from_env().context("Invalid SLR_* environment variables"),
    }
}

fn api_client(config: &WizardConfig) -> Result<ApiClient> {
    ApiClient::from_config(config).context("Failed to build HTTP client")
}

fn read_snapshot(path: &Path) -> Result<WizardData> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    export::parse_snapshot(&text).context("Failed to parse snapshot as wizard data")
}

fn write_snapshot(path: &Path, data: &WizardData) -> Result<()> {
    let text = export::export_snapshot(data)?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))
}

/// Missing fields per step, in wizard order; complete steps are omitted.
fn check_report(data: &WizardData) -> Vec<(WizardStep, Vec<&'static str>)> {
    WizardStep::ALL
        .iter()
        .map(|&step| {
            let missing = sequencer::missing_fields(step, data)
                .into_iter()
                .map(|f| f.label())
                .collect::<Vec<_>>();
            (step, missing)
        })
        .filter(|(_, missing)| !missing.is_empty())
        .collect()
}

fn cmd_check(snapshot: &Path) -> Result<()> {
    let data = read_snapshot(snapshot)?;
    let report = check_report(&data);
    if report.is_empty() {
        println!("All steps complete");
        return Ok(());
    }
    for (step, missing) in report {
        println!("{} ({})", step.label(), step);
        for label in missing {
            println!("  - {label}");
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ItemRow<'a> {
    number: u8,
    complies: bool,
    item: &'a str,
    evidence: &'a str,
}

fn cmd_evaluate(snapshot: &Path, as_json: bool, write: bool) -> Result<()> {
    let mut data = read_snapshot(snapshot)?;
    let items = compliance::evaluate(&data);
    let summary = EvaluationSummary::from_items(&items);
    slr_core::emit_compliance_evaluated(summary.passed, summary.total, summary.percentage);

    if as_json {
        let rows: Vec<ItemRow<'_>> = items
            .iter()
            .map(|i| ItemRow {
                number: i.number,
                complies: i.complies,
                item: &i.item,
                evidence: &i.evidence,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for item in &items {
            let mark = if item.complies { "x" } else { " " };
            println!("[{mark}] {:>2}. {}", item.number, item.item);
            println!("       {}", item.evidence);
        }
        println!(
            "\n{}/{} items ({}%)",
            summary.passed, summary.total, summary.percentage
        );
    }

    if write {
        data.prisma_items = items;
        write_snapshot(snapshot, &data)?;
        info!(path = %snapshot.display(), "checklist stored in snapshot");
    }
    Ok(())
}

fn cmd_import_references(snapshot: &Path, file: &Path, output: Option<&Path>) -> Result<()> {
    let mut data = read_snapshot(snapshot)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read reference file {}", file.display()))?;
    let refs = references::parse_reference_file(&text)
        .with_context(|| format!("Invalid reference file {}", file.display()))?;

    data.screening_stats = ScreeningStats::from_references(&refs);
    data.references = refs;
    write_snapshot(output.unwrap_or(snapshot), &data)?;

    let stats = data.screening_stats;
    println!("Imported {} references ({} pending)", stats.total, stats.pending);
    Ok(())
}

fn cmd_export_protocol(snapshot: &Path, output: Option<&Path>) -> Result<()> {
    let data = read_snapshot(snapshot)?;
    let document = serde_json::to_string_pretty(&export::protocol_document(&data))?;
    match output {
        Some(path) => std::fs::write(path, document)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{document}"),
    }
    Ok(())
}

async fn cmd_push(store: &dyn ProjectStore, snapshot: &Path, write: bool) -> Result<()> {
    let mut data = read_snapshot(snapshot)?;
    if data.title_for_persistence().trim().is_empty() {
        bail!("Snapshot has no selected title; select one before pushing");
    }

    let saved = save_protocol(store, &data).await.with_context(|| match &data.project_id {
        Some(id) => format!("Failed to update project {id}"),
        None => "Failed to create project".to_string(),
    })?;
    slr_core::emit_wizard_finished(&saved.project_id, saved.created);

    if write {
        data.project_id = Some(saved.project_id.clone());
        write_snapshot(snapshot, &data)?;
    }
    let verb = if saved.created { "Created" } else { "Updated" };
    println!("{verb} project {}", saved.project_id);
    Ok(())
}

async fn cmd_fetch_protocol(
    store: &dyn ProjectStore,
    project_id: &str,
    output: Option<&Path>,
) -> Result<()> {
    let protocol = store
        .get_protocol(project_id)
        .await
        .with_context(|| format!("Failed to fetch protocol of {project_id}"))?;
    let document = serde_json::to_string_pretty(&protocol)?;
    match output {
        Some(path) => std::fs::write(path, document)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{document}"),
    }
    Ok(())
}

fn cmd_config(config: &WizardConfig) -> Result<()> {
    let mut shown = config.clone();
    if shown.api.token.is_some() {
        shown.api.token = Some("***".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slr_core::fakes::MemoryProjectStore;
    use slr_core::WizardPatch;

    fn titled_snapshot(dir: &Path) -> PathBuf {
        let snapshot = dir.join("snap.json");
        let data = WizardData {
            selected_title: "IoT en agricultura".into(),
            project_description: "Sensores".into(),
            ..Default::default()
        };
        write_snapshot(&snapshot, &data).unwrap();
        snapshot
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["slr", "evaluate", "snap.json", "--as-json", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Evaluate { as_json: true, write: false, .. }
        ));
    }

    #[test]
    fn test_check_report_lists_incomplete_steps() {
        let mut data = WizardData::default();
        WizardPatch::new()
            .project_name("IoT")
            .project_description("Sensores")
            .research_area("Ingeniería")
            .apply_to(&mut data);
        let report = check_report(&data);
        assert_eq!(report[0].0, WizardStep::PicoMatrix);
        assert!(report.iter().all(|(step, _)| *step != WizardStep::Proposal));
    }

    #[test]
    fn test_import_references_writes_output_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("snap.json");
        let refs = dir.path().join("refs.json");
        let out = dir.path().join("out.json");
        write_snapshot(&snapshot, &WizardData::default()).unwrap();
        std::fs::write(&refs, r#"[{"title": "A"}, {"title": "B"}]"#).unwrap();

        cmd_import_references(&snapshot, &refs, Some(&out)).unwrap();
        let updated = read_snapshot(&out).unwrap();
        assert_eq!(updated.references.len(), 2);
        assert_eq!(updated.screening_stats.pending, 2);
        assert!(read_snapshot(&snapshot).unwrap().references.is_empty());
    }

    #[test]
    fn test_bad_reference_file_leaves_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("snap.json");
        let refs = dir.path().join("refs.json");
        write_snapshot(&snapshot, &WizardData::default()).unwrap();
        std::fs::write(&refs, "not json").unwrap();

        assert!(cmd_import_references(&snapshot, &refs, None).is_err());
        assert!(read_snapshot(&snapshot).unwrap().references.is_empty());
    }

    #[test]
    fn test_evaluate_write_stores_checklist() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("snap.json");
        write_snapshot(&snapshot, &WizardData::default()).unwrap();

        cmd_evaluate(&snapshot, true, true).unwrap();
        assert_eq!(read_snapshot(&snapshot).unwrap().prisma_items.len(), 13);
    }

    #[tokio::test]
    async fn test_push_creates_then_updates_project() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = titled_snapshot(dir.path());
        let store = MemoryProjectStore::new();

        cmd_push(&store, &snapshot, true).await.unwrap();
        let data = read_snapshot(&snapshot).unwrap();
        let id = data.project_id.clone().expect("project id written back");
        assert_eq!(store.project(&id).unwrap().title, "IoT en agricultura");

        cmd_push(&store, &snapshot, false).await.unwrap();
        assert_eq!(store.project_count(), 1);
        assert_eq!(store.protocol_updates(), 1);
    }

    #[tokio::test]
    async fn test_push_without_title_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("snap.json");
        write_snapshot(&snapshot, &WizardData::default()).unwrap();
        let store = MemoryProjectStore::new();

        assert!(cmd_push(&store, &snapshot, false).await.is_err());
        assert_eq!(store.project_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_protocol_writes_stored_document() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = titled_snapshot(dir.path());
        let store = MemoryProjectStore::new();
        cmd_push(&store, &snapshot, true).await.unwrap();
        let id = read_snapshot(&snapshot).unwrap().project_id.unwrap();

        let out = dir.path().join("protocol.json");
        cmd_fetch_protocol(&store, &id, Some(&out)).await.unwrap();
        let fetched: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(fetched, store.get_protocol(&id).await.unwrap());

        assert!(cmd_fetch_protocol(&store, "missing", None).await.is_err());
    }
}
