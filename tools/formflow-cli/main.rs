use clap::Parser;
use formflow::model::{FieldType, RefMultiplicity};
use formflow::prelude::*;
use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::result::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

// --- Script Format ---
// One intent per entry, e.g. `{ "attachExisting": { "target": { "view": 1 }, "fields": [4] } }`.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ScriptStep {
    ChangeType {
        step: StepId,
        from: StepType,
        to: StepType,
        #[serde(default)]
        fields: Option<Vec<FieldId>>,
    },
    AttachNew {
        target: EditTarget,
        label: String,
        #[serde(rename = "type")]
        field_type: FieldType,
        #[serde(default)]
        options: Vec<String>,
        #[serde(default)]
        reference: Option<ObjectIdArg>,
        #[serde(default)]
        required: bool,
    },
    AttachExisting {
        target: EditTarget,
        fields: Vec<FieldId>,
    },
    Reorder {
        target: EditTarget,
        from: usize,
        to: usize,
    },
    Remove {
        target: EditTarget,
        field: FieldId,
    },
    UpdateField(FieldPatch),
    RetryPending,
    RefreshCatalog,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectIdArg {
    object_id: u64,
    #[serde(default)]
    multi: bool,
}

impl ScriptStep {
    fn describe(&self) -> String {
        match self {
            ScriptStep::ChangeType { step, from, to, .. } => {
                format!("step {}: '{}' -> '{}'", step, from, to)
            }
            ScriptStep::AttachNew { target, label, .. } => {
                format!("create '{}' on {:?}", label, target)
            }
            ScriptStep::AttachExisting { target, fields } => {
                format!("attach {:?} to {:?}", fields, target)
            }
            ScriptStep::Reorder { target, from, to } => {
                format!("move {} -> {} in {:?}", from, to, target)
            }
            ScriptStep::Remove { target, field } => format!("remove {} from {:?}", field, target),
            ScriptStep::UpdateField(patch) => format!("update field {}", patch.id),
            ScriptStep::RetryPending => "retry parked attachments".to_string(),
            ScriptStep::RefreshCatalog => "refresh catalog".to_string(),
        }
    }
}

/// Replays field-editing intents against a workflow workspace using in-memory storage
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the workspace JSON file ({ workflow, views, fields })
    snapshot_path: Option<String>,
    /// Optional path to a JSON script of intents to apply
    script_path: Option<String>,

    /// Path to an engine configuration JSON file
    #[arg(short, long)]
    config: Option<String>,

    /// Catalog listings a newly created field stays invisible for
    #[arg(long, default_value_t = 0)]
    lag: u32,

    /// Ambient object id used when no view in scope carries one
    #[arg(long)]
    object_id: Option<String>,

    /// Write the resulting workspace to this path
    #[arg(short, long)]
    output: Option<String>,

    /// Save the in-memory storage state (bincode) to this path
    #[arg(long)]
    store: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("formflow=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to start runtime: {}", e)));
    runtime.block_on(run(cli));
}

async fn run(cli: Cli) {
    let total_start = Instant::now();

    // --- 1. Loading ---
    let snapshot_path = cli
        .snapshot_path
        .unwrap_or_else(|| prompt_for_input("Enter workspace path", Some("data/workspace.json")));
    let mut snapshot = Snapshot::from_file(&snapshot_path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load workspace: {}", e)));
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load config: {}", e))),
        None => EngineConfig::default(),
    };
    let script: Vec<ScriptStep> = match &cli.script_path {
        Some(path) => {
            let json = fs::read_to_string(path).unwrap_or_else(|e| {
                exit_with_error(&format!("Failed to read script file '{}': {}", path, e))
            });
            serde_json::from_str(&json)
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse script JSON: {}", e)))
        }
        None => Vec::new(),
    };

    let backend =
        Arc::new(InMemoryBackend::from_snapshot(&snapshot).with_visibility_lag(cli.lag));
    let route_param = config.object_route_param.clone();
    let mut builder = ReconciliationEngine::builder(backend.clone()).with_config(config);
    if let Some(object_id) = &cli.object_id {
        builder = builder.with_route_param(&route_param, object_id);
    }
    let engine = builder.build();

    println!(
        "Loaded workspace: {} steps, {} views, {} fields",
        snapshot.workflow.steps().count(),
        snapshot.views.len(),
        snapshot.catalog.len()
    );

    // --- 2. Script ---
    let mut warnings = 0;
    for (index, step) in script.into_iter().enumerate() {
        println!("\n[{}] {}", index + 1, step.describe());
        match apply(&engine, &mut snapshot, step).await {
            Ok((effects, step_warnings, summary)) => {
                for effect in &effects {
                    println!("  -> {:?}", effect);
                }
                for warning in &step_warnings {
                    println!("  !! {}", warning);
                }
                if let Some(summary) = summary {
                    println!("  => {}", summary);
                }
                warnings += step_warnings.len();
            }
            Err(e) => println!("  xx rejected: {}", e),
        }
    }

    // --- 3. Results ---
    println!("\n--- Field Groups ---");
    for group in snapshot.groups() {
        let fields: Vec<String> = group
            .fields
            .iter()
            .map(|r| {
                let name = snapshot
                    .catalog
                    .get(r.field_id)
                    .map_or_else(|| format!("#{}", r.field_id), |f| f.name.clone());
                if r.required { format!("{}*", name) } else { name }
            })
            .collect();
        println!("{:?} {}: [{}]", group.source, group.name, fields.join(", "));
    }

    let violations = snapshot.check_invariants();
    println!("\n--- Summary ---");
    println!("Warnings:             {}", warnings);
    println!("Parked attachments:   {}", snapshot.pending.len());
    println!("Invariant violations: {}", violations.len());
    for violation in &violations {
        println!("  - {}", violation);
    }
    println!("Total Execution:      {:?}", total_start.elapsed());

    if let Some(path) = cli.output {
        let json = snapshot
            .to_json()
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize workspace: {}", e)));
        fs::write(&path, json)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to write '{}': {}", path, e)));
        println!("Workspace written to {}", path);
    }
    if let Some(path) = cli.store {
        backend
            .save(&path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to save storage: {}", e)));
        println!("Storage saved to {}", path);
    }
}

type Applied = (Vec<Effect>, Vec<Warning>, Option<String>);

async fn apply(
    engine: &ReconciliationEngine,
    snapshot: &mut Snapshot,
    step: ScriptStep,
) -> Result<Applied, ValidationError> {
    Ok(match step {
        ScriptStep::ChangeType {
            step,
            from,
            to,
            fields,
        } => {
            let provided =
                fields.map(|ids| ids.into_iter().map(FieldReference::new).collect::<Vec<_>>());
            let outcome = engine
                .on_step_type_change(snapshot, step, from, to, provided)
                .await?;
            (outcome.effects, outcome.warnings, None)
        }
        ScriptStep::AttachNew {
            target,
            label,
            field_type,
            options,
            reference,
            required,
        } => {
            let mut draft = FieldDraft::new(&label, field_type).required(required);
            if !options.is_empty() {
                let options: Vec<&str> = options.iter().map(String::as_str).collect();
                draft = draft.with_options(&options);
            }
            if let Some(reference) = reference {
                let multiplicity = if reference.multi {
                    RefMultiplicity::Multi
                } else {
                    RefMultiplicity::Single
                };
                draft = draft.with_reference(reference.object_id, multiplicity);
            }
            let outcome = engine.attach_new_field(snapshot, target, draft).await?;
            let summary = outcome
                .value
                .map(|a| format!("{} {:?} attached={}", a.name, a.resolution, a.attached));
            (outcome.effects, outcome.warnings, summary)
        }
        ScriptStep::AttachExisting { target, fields } => {
            let outcome = engine
                .attach_existing_fields(snapshot, target, &fields)
                .await?;
            let summary = format!("{:?}", outcome.value);
            (outcome.effects, outcome.warnings, Some(summary))
        }
        ScriptStep::Reorder { target, from, to } => {
            let outcome = engine.reorder_fields(snapshot, target, from, to).await?;
            (outcome.effects, outcome.warnings, None)
        }
        ScriptStep::Remove { target, field } => {
            let outcome = engine.remove_field(snapshot, target, field).await?;
            (outcome.effects, outcome.warnings, None)
        }
        ScriptStep::UpdateField(patch) => {
            let outcome = engine.update_field(snapshot, patch).await?;
            (outcome.effects, outcome.warnings, None)
        }
        ScriptStep::RetryPending => {
            let outcome = engine.retry_pending(snapshot).await;
            let summary = format!("{} attached", outcome.value);
            (outcome.effects, outcome.warnings, Some(summary))
        }
        ScriptStep::RefreshCatalog => {
            let outcome = engine.refresh_catalog(snapshot).await;
            let summary = format!("{} fields", snapshot.catalog.len());
            (outcome.effects, outcome.warnings, Some(summary))
        }
    })
}

/// A helper function to prompt the user and read a line of input.
fn prompt_for_input(prompt_text: &str, default: Option<&str>) -> String {
    let mut line = String::new();
    let default_prompt = default.map_or("".to_string(), |d| format!(" [default: {}]", d));

    print!("> {}{}: ", prompt_text, default_prompt);
    io::stdout().flush().ok();

    if let Err(e) = io::stdin().read_line(&mut line) {
        exit_with_error(&format!("Failed to read line: {}", e));
    }
    let trimmed = line.trim().to_string();

    if trimmed.is_empty() {
        default.unwrap_or("").to_string()
    } else {
        trimmed
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
