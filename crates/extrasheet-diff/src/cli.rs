use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value as JsonValue;

use extrasheet_fs::{read_tree, FolderLock, SnapshotHandle, SnapshotStore};
use extrasheet_model::{decode, Spreadsheet};

use crate::{
    BatchUpdateTransport, DiffEngine, DiffOptions, DiffResult, HttpTransport, PushConfig,
    PushError, PushExecutor, PushOutcome, RequestGenerator, RequestPlan, DEFAULT_ENDPOINT,
};

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Diff a spreadsheet folder against its pristine snapshot and push the
/// changes back as one atomic `batchUpdate`.
#[derive(Parser)]
#[command(name = "extrasheet", version)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record the folder as the pristine snapshot (run right after a fetch).
    Capture {
        folder: PathBuf,
    },
    /// Show the pristine snapshot pointer and whether it was already pushed.
    Status {
        folder: PathBuf,
    },
    /// Remove a folder lock left behind by an extrasheet process that is gone.
    Unlock {
        folder: PathBuf,
    },
    /// Show what a push would change.
    Diff {
        #[command(flatten)]
        common: CommonArgs,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Exit with status 1 when there are changes.
        #[arg(long)]
        exit_code: bool,
    },
    /// Send the changes to the remote spreadsheet.
    Push {
        #[command(flatten)]
        common: CommonArgs,

        /// OAuth bearer token for the Sheets API.
        #[arg(long, env = "EXTRASHEET_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Read the bearer token from this environment variable instead.
        #[arg(long, value_name = "VAR")]
        token_env: Option<String>,

        /// API base URL.
        #[arg(long, env = "EXTRASHEET_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Request timeout in seconds.
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,

        /// Print the request body instead of sending it.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(ClapArgs)]
struct CommonArgs {
    /// Spreadsheet folder.
    folder: PathBuf,

    /// Diff against a snapshot that an earlier push was already based on.
    #[arg(long)]
    allow_stale: bool,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    run_with_args(args)
}

pub fn run_with_args(args: Args) -> Result<()> {
    match args.command {
        Command::Capture { folder } => capture(&folder),
        Command::Status { folder } => status(&folder),
        Command::Unlock { folder } => unlock(&folder),
        Command::Diff {
            common,
            format,
            exit_code,
        } => {
            let planned = {
                let _lock = FolderLock::acquire(&common.folder)?;
                plan(&common)?
            };
            match format {
                OutputFormat::Text => print_text(&planned),
                OutputFormat::Json => print_json(&planned)?,
            }
            if exit_code && !planned.plan.is_empty() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Push {
            common,
            token,
            token_env,
            endpoint,
            timeout_secs,
            dry_run,
        } => {
            let _lock = FolderLock::acquire(&common.folder)?;
            let planned = plan(&common)?;
            if dry_run {
                println!("{}", serde_json::to_string_pretty(&planned.plan.body())?);
                return Ok(());
            }
            if planned.plan.is_empty() {
                println!("No changes.");
                return Ok(());
            }
            let token = match token_env {
                Some(var) => Some(
                    std::env::var(&var)
                        .with_context(|| format!("reading access token from ${var}"))?,
                ),
                None => token,
            };
            let Some(token) = token else {
                bail!("no access token; pass --token, --token-env or set EXTRASHEET_TOKEN");
            };
            let config = PushConfig {
                token,
                endpoint,
                timeout: Duration::from_secs(timeout_secs),
            };
            push(&common.folder, &planned, config)
        }
    }
}

struct Planned {
    handle: SnapshotHandle,
    current: Spreadsheet,
    diff: DiffResult,
    plan: RequestPlan,
}

fn plan(common: &CommonArgs) -> Result<Planned> {
    let folder = &common.folder;
    let tree =
        read_tree(folder).with_context(|| format!("reading folder {}", folder.display()))?;
    let current = decode(&tree).with_context(|| format!("decoding folder {}", folder.display()))?;

    let store = SnapshotStore::open(folder);
    let handle = store.current()?.with_context(|| {
        format!(
            "{} has no pristine snapshot; run `extrasheet capture` after fetching",
            folder.display()
        )
    })?;
    let options = DiffOptions {
        allow_stale: common.allow_stale,
    };
    let engine = DiffEngine::from_snapshot_with_options(&store, &handle, &options)?;
    let diff = engine.diff(&current)?;
    let plan = RequestGenerator::new(engine.pristine(), &current).generate(&diff)?;
    Ok(Planned {
        handle,
        current,
        diff,
        plan,
    })
}

fn push(folder: &Path, planned: &Planned, config: PushConfig) -> Result<()> {
    let transport = HttpTransport::new(config)?;
    let outcome = send(folder, planned, transport)?;

    println!(
        "Pushed {} requests to {}.",
        planned.plan.len(),
        planned.current.spreadsheet_id
    );
    for assigned in &outcome.assigned {
        println!(
            "  {} (request {}) -> {}",
            assigned.kind, assigned.request_index, assigned.id
        );
    }
    println!("Re-fetch the spreadsheet and capture a new snapshot before editing further.");
    Ok(())
}

/// Pushes the plan. The snapshot is marked stale after a success and after
/// any failure that may have been applied remotely.
fn send<T: BatchUpdateTransport>(
    folder: &Path,
    planned: &Planned,
    transport: T,
) -> Result<PushOutcome> {
    let store = SnapshotStore::open(folder);
    let result = PushExecutor::new(transport).push(&planned.current.spreadsheet_id, &planned.plan);
    match result {
        Ok(outcome) => {
            store.mark_pushed(&planned.handle)?;
            Ok(outcome)
        }
        Err(err) => {
            if err.outcome_unknown() {
                if let Err(mark) = store.mark_pushed(&planned.handle) {
                    log::warn!("could not mark snapshot {} stale: {mark}", planned.handle);
                }
            }
            if let PushError::Remote {
                payload: Some(payload),
                ..
            } = &err
            {
                eprintln!("failing request:\n{}", serde_json::to_string_pretty(payload)?);
            }
            Err(err.into())
        }
    }
}

fn capture(folder: &Path) -> Result<()> {
    let _lock = FolderLock::acquire(folder)?;
    let tree =
        read_tree(folder).with_context(|| format!("reading folder {}", folder.display()))?;
    let spreadsheet =
        decode(&tree).with_context(|| format!("decoding folder {}", folder.display()))?;
    let handle = SnapshotStore::open(folder).capture(&tree)?;
    println!(
        "Captured snapshot {handle} ({} sheets, {} files).",
        spreadsheet.sheets.len(),
        tree.len()
    );
    Ok(())
}

fn status(folder: &Path) -> Result<()> {
    let store = SnapshotStore::open(folder);
    match store.current()? {
        Some(handle) => println!("snapshot: {handle}"),
        None => println!("snapshot: (none)"),
    }
    match store.stale_marker()? {
        Some(marker) => println!("stale: pushed from {}", marker.pushed_from),
        None => println!("stale: no"),
    }
    Ok(())
}

fn unlock(folder: &Path) -> Result<()> {
    match FolderLock::break_lock(folder)? {
        Some(holder) => println!("Removed the lock held by pid {holder}."),
        None => println!("{} is not locked.", folder.display()),
    }
    Ok(())
}

fn print_text(planned: &Planned) {
    println!("Diff against snapshot {}", planned.handle);
    if planned.diff.is_empty() {
        println!("No changes.");
        return;
    }
    println!();
    for (layer, n) in planned.diff.summary() {
        println!("  {layer}: {n}");
    }
    for sheet in &planned.diff.sheet_diffs {
        let layers: Vec<String> = sheet
            .counts()
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(layer, n)| format!("{layer}={n}"))
            .collect();
        println!("  sheet {:?} ({}): {}", sheet.title, sheet.sheet_id, layers.join(" "));
    }
    println!();
    let kinds: Vec<String> = planned
        .plan
        .counts()
        .into_iter()
        .map(|(kind, n)| format!("{kind}={n}"))
        .collect();
    println!("Requests: {} ({})", planned.plan.len(), kinds.join(", "));
    for line in request_lines(&planned.plan) {
        println!("{line}");
    }
}

/// One line per request: its position, kind and body.
fn request_lines(plan: &RequestPlan) -> Vec<String> {
    plan.requests
        .iter()
        .enumerate()
        .map(|(i, request)| {
            let body = request.to_json();
            let inner = body.get(request.kind()).unwrap_or(&body);
            format!("  {i:>3}  {}  {inner}", request.kind())
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct JsonSheet<'a> {
    sheet_id: u32,
    title: &'a str,
    changes: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    snapshot: &'a str,
    summary: BTreeMap<&'static str, usize>,
    sheets: Vec<JsonSheet<'a>>,
    batch_update: JsonValue,
}

fn print_json(planned: &Planned) -> Result<()> {
    let report = JsonReport {
        snapshot: planned.handle.digest(),
        summary: planned.diff.summary().into_iter().collect(),
        sheets: planned
            .diff
            .sheet_diffs
            .iter()
            .map(|sheet| JsonSheet {
                sheet_id: sheet.sheet_id,
                title: &sheet.title,
                changes: sheet.counts().into_iter().filter(|(_, n)| *n > 0).collect(),
            })
            .collect(),
        batch_update: planned.plan.body(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use extrasheet_fs::write_tree;
    use extrasheet_model::FileTree;

    use super::*;
    use crate::TransportError;

    const MANIFEST: &str = r#"{"spreadsheetId": "1AbC", "properties": {"title": "T"}, "sheets": [
        {"sheetId": 0, "title": "Sheet1", "index": 0, "folder": "Sheet1",
         "gridProperties": {"rowCount": 3, "columnCount": 2}}]}"#;

    struct Failing(fn() -> TransportError);

    impl BatchUpdateTransport for Failing {
        fn batch_update(&self, _: &str, _: &JsonValue) -> Result<JsonValue, TransportError> {
            Err((self.0)())
        }
    }

    /// A captured folder with one edited cell, and its plan.
    fn edited_folder() -> (tempfile::TempDir, Planned) {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = FileTree::new();
        tree.insert("spreadsheet.json", MANIFEST.as_bytes().to_vec());
        tree.insert("Sheet1/data.tsv", b"a\t1\nb\t10\n".to_vec());
        write_tree(dir.path(), &tree).unwrap();
        SnapshotStore::open(dir.path()).capture(&tree).unwrap();
        std::fs::write(dir.path().join("Sheet1/data.tsv"), "a\t1\nb\t20\n").unwrap();

        let planned = plan(&CommonArgs {
            folder: dir.path().to_path_buf(),
            allow_stale: false,
        })
        .unwrap();
        assert_eq!(planned.plan.len(), 1);
        (dir, planned)
    }

    #[test]
    fn timed_out_push_leaves_the_snapshot_stale() {
        let (dir, planned) = edited_folder();
        let transport = Failing(|| TransportError::Timeout(Duration::from_secs(5)));

        let err = send(dir.path(), &planned, transport).unwrap_err();
        assert!(err.to_string().contains("re-fetch"), "{err}");
        assert!(SnapshotStore::open(dir.path()).is_stale().unwrap());

        let again = plan(&CommonArgs {
            folder: dir.path().to_path_buf(),
            allow_stale: false,
        });
        assert!(again.is_err());
    }

    #[test]
    fn text_report_lists_each_request() {
        let (_dir, planned) = edited_folder();
        let lines = request_lines(&planned.plan);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("    0  updateCells  {"), "{}", lines[0]);
        assert!(lines[0].contains("\"sheetId\":0"), "{}", lines[0]);
    }

    #[test]
    fn rejected_push_keeps_the_snapshot_usable() {
        let (dir, planned) = edited_folder();
        let transport = Failing(|| TransportError::Status {
            status: 400,
            body: r#"{"error": {"message": "Invalid requests[0].updateCells: bad"}}"#.into(),
        });

        assert!(send(dir.path(), &planned, transport).is_err());
        assert!(!SnapshotStore::open(dir.path()).is_stale().unwrap());
    }
}
