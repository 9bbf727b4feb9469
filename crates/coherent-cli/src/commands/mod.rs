pub mod apply;
pub mod check;
pub mod show;
pub mod status;

use coherent_core::CoreError;
use coherent_runtime::{select_registry, ModuleRegistry};
use coherent_schema::{parse_plan_file, plan_digest, NormalizedPlan};
use coherent_store::{FileSettingsStore, SettingsBackend, StoreLayout};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PLAN_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;
pub const EXIT_PRECONDITION: u8 = 4;
pub const EXIT_PARTIAL_ROLLBACK: u8 = 5;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, line: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(line);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "running" | "committed" => Style::new().green().apply_to(state).to_string(),
        "stopped" => Style::new().dim().apply_to(state).to_string(),
        "rolled back" => Style::new().yellow().apply_to(state).to_string(),
        "partially rolled back" => Style::new().red().bold().apply_to(state).to_string(),
        other => other.to_owned(),
    }
}

pub fn running_label(running: bool) -> &'static str {
    if running {
        "running"
    } else {
        "stopped"
    }
}

/// Parse and validate a plan file, returning it with its digest.
pub fn load_plan(path: &Path) -> Result<(NormalizedPlan, String), String> {
    let plan = parse_plan_file(path)
        .and_then(|p| p.normalize())
        .map_err(|e| format!("plan error: {e}"))?;
    let digest = plan_digest(&plan).map_err(|e| format!("plan error: {e}"))?;
    Ok((plan, digest))
}

pub struct Backends {
    pub layout: StoreLayout,
    pub registry: Arc<dyn ModuleRegistry>,
    pub settings: Arc<dyn SettingsBackend>,
}

pub fn open_backends(root: &Path, registry: &str) -> Result<Backends, String> {
    let layout = StoreLayout::new(root);
    layout
        .initialize()
        .map_err(|e| format!("store error: {e}"))?;
    let registry = select_registry(registry, root).map_err(|e| e.to_string())?;
    let settings: Arc<dyn SettingsBackend> = Arc::new(FileSettingsStore::new(layout.clone()));
    Ok(Backends {
        layout,
        registry,
        settings,
    })
}

/// Prefix unit construction errors so `main` can pick the exit code.
pub fn construction_error(e: &CoreError) -> String {
    if e.is_precondition() {
        format!("precondition failed: {e}")
    } else if let CoreError::Construction { source, .. } = e {
        match **source {
            CoreError::Store(_) => format!("store error: {e}"),
            _ => e.to_string(),
        }
    } else {
        e.to_string()
    }
}
