use super::{
    colorize_state, construction_error, json_pretty, load_plan, open_backends, spin_fail, spin_ok,
    spinner, EXIT_FAILURE, EXIT_PARTIAL_ROLLBACK, EXIT_SUCCESS,
};
use coherent_core::{
    build_units, shutdown_requested, CoreError, OutcomeReport, OutcomeStatus,
    TransactionController, TransactionLock, TransactionObserver,
};
use coherent_schema::short_digest;
use dialoguer::Confirm;
use indicatif::ProgressBar;
use std::io::{stderr, stdin, IsTerminal};
use std::path::Path;

/// Shows one spinner line per apply and compensate step.
#[derive(Default)]
struct SpinnerObserver {
    current: Option<ProgressBar>,
}

impl SpinnerObserver {
    fn begin(&mut self, msg: &str) {
        self.current = Some(spinner(msg));
    }

    fn end(&mut self, done: &str, error: Option<&CoreError>) {
        if let Some(pb) = self.current.take() {
            match error {
                None => spin_ok(&pb, done),
                Some(e) => spin_fail(&pb, &format!("{done}: {e}")),
            }
        }
    }
}

impl TransactionObserver for SpinnerObserver {
    fn on_apply_start(&mut self, _index: usize, unit: &str) {
        self.begin(&format!("applying {unit}..."));
    }

    fn on_apply_complete(&mut self, _index: usize, unit: &str, error: Option<&CoreError>) {
        self.end(&format!("applied {unit}"), error);
    }

    fn on_compensate_start(&mut self, _index: usize, unit: &str) {
        self.begin(&format!("rolling back {unit}..."));
    }

    fn on_compensate_complete(&mut self, _index: usize, unit: &str, error: Option<&CoreError>) {
        self.end(&format!("rolled back {unit}"), error);
    }
}

fn confirm(description: Option<&str>, labels: &[String]) -> Result<bool, String> {
    if !(stdin().is_terminal() && stderr().is_terminal()) {
        return Err("refusing to apply without confirmation (pass --yes)".to_owned());
    }
    if let Some(d) = description {
        eprintln!("{d}");
    }
    for (i, label) in labels.iter().enumerate() {
        eprintln!("  {:>2}. {label}", i + 1);
    }
    Confirm::new()
        .with_prompt(format!("apply {} change(s)?", labels.len()))
        .default(false)
        .interact()
        .map_err(|e| format!("prompt failed: {e}"))
}

pub fn run(
    root: &Path,
    registry: &str,
    plan_path: &Path,
    yes: bool,
    json: bool,
) -> Result<u8, String> {
    let (plan, digest) = load_plan(plan_path)?;
    let backends = open_backends(root, registry)?;

    let Some(_lock) = TransactionLock::try_acquire(&backends.layout.lock_file())
        .map_err(|e| format!("store lock: {e}"))?
    else {
        return Err("store lock: another transaction is in progress".to_owned());
    };

    let units = build_units(&plan, &backends.registry, &backends.settings)
        .map_err(|e| construction_error(&e))?;
    let transaction_id = format!(
        "{}-{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S"),
        short_digest(&digest)
    );
    let controller = TransactionController::new(units).with_id(transaction_id);

    if !yes && !json && !confirm(plan.description.as_deref(), &controller.labels())? {
        eprintln!("aborted");
        return Ok(EXIT_FAILURE);
    }
    if shutdown_requested() {
        return Err("interrupted before applying".to_owned());
    }

    let report = if json {
        controller.run()
    } else {
        controller.run_with_observer(&mut SpinnerObserver::default())
    };

    print_report(&report, json)?;
    Ok(exit_code(&report))
}

fn exit_code(report: &OutcomeReport) -> u8 {
    match report.status {
        OutcomeStatus::Committed => EXIT_SUCCESS,
        OutcomeStatus::RolledBack => EXIT_FAILURE,
        OutcomeStatus::PartiallyRolledBack => EXIT_PARTIAL_ROLLBACK,
    }
}

fn print_report(report: &OutcomeReport, json: bool) -> Result<(), String> {
    if json {
        println!("{}", json_pretty(report)?);
    } else {
        println!(
            "transaction {}: {}",
            report.transaction_id,
            colorize_state(&report.status.to_string())
        );
        println!("{}", report.summary());
    }

    if report.status == OutcomeStatus::PartiallyRolledBack {
        eprintln!("warning: the following resources could not be restored:");
        for failure in &report.compensation_errors {
            eprintln!("  {}: {}", failure.unit, failure.error);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: OutcomeStatus) -> OutcomeReport {
        OutcomeReport {
            transaction_id: "t".to_owned(),
            status,
            unit_results: Vec::new(),
            compensation_errors: Vec::new(),
            started_at: String::new(),
            finished_at: String::new(),
        }
    }

    #[test]
    fn exit_code_follows_status() {
        assert_eq!(exit_code(&report(OutcomeStatus::Committed)), EXIT_SUCCESS);
        assert_eq!(exit_code(&report(OutcomeStatus::RolledBack)), EXIT_FAILURE);
        assert_eq!(
            exit_code(&report(OutcomeStatus::PartiallyRolledBack)),
            EXIT_PARTIAL_ROLLBACK
        );
    }

    #[test]
    fn observer_tolerates_unpaired_events() {
        let mut observer = SpinnerObserver::default();
        observer.on_apply_complete(0, "module 'm'", None);
        observer.on_compensate_start(0, "module 'm'");
        observer.on_compensate_complete(0, "module 'm'", None);
        assert!(observer.current.is_none());
    }
}
