use crate::lifecycle::{validate_transition, TxnPhase};
use crate::outcome::{CompensationError, OutcomeReport, OutcomeStatus, UnitResult};
use crate::unit::ChangeUnit;
use crate::CoreError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

/// Progress callbacks fired while a transaction runs.
pub trait TransactionObserver {
    fn on_apply_start(&mut self, _index: usize, _unit: &str) {}
    fn on_apply_complete(&mut self, _index: usize, _unit: &str, _error: Option<&CoreError>) {}
    fn on_compensate_start(&mut self, _index: usize, _unit: &str) {}
    fn on_compensate_complete(&mut self, _index: usize, _unit: &str, _error: Option<&CoreError>) {}
}

pub struct NoopObserver;

impl TransactionObserver for NoopObserver {}

/// Applies an ordered list of change units as one transaction.
///
/// Units are applied in list order. On the first failure no further unit is
/// applied, and every unit that applied successfully is compensated in
/// reverse order. The failing unit is not compensated: a unit that reports
/// an apply failure must have left its resource unchanged. A failing
/// compensation is recorded and does not stop the remaining ones.
///
/// Running consumes the controller, so a transaction runs at most once.
pub struct TransactionController {
    units: Vec<Box<dyn ChangeUnit>>,
    transaction_id: String,
    phase: TxnPhase,
}

impl TransactionController {
    pub fn new(units: Vec<Box<dyn ChangeUnit>>) -> Self {
        let transaction_id = generate_id(&units);
        Self {
            units,
            transaction_id,
            phase: TxnPhase::Pending,
        }
    }

    #[must_use]
    pub fn with_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = transaction_id.into();
        self
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.units.iter().map(|u| u.label()).collect()
    }

    pub fn run(self) -> OutcomeReport {
        self.run_with_observer(&mut NoopObserver)
    }

    pub fn run_with_observer(mut self, observer: &mut dyn TransactionObserver) -> OutcomeReport {
        let started_at = chrono::Utc::now().to_rfc3339();
        self.advance(TxnPhase::Applying);
        info!(
            "transaction {}: applying {} change(s)",
            self.transaction_id,
            self.units.len()
        );

        let mut unit_results: Vec<UnitResult> = Vec::with_capacity(self.units.len());
        let mut failed_at = None;

        for (index, unit) in self.units.iter_mut().enumerate() {
            let label = unit.label();
            observer.on_apply_start(index, &label);
            debug!("applying #{index} {label}");

            match guarded(&label, "apply", || unit.apply()) {
                Ok(()) => {
                    observer.on_apply_complete(index, &label, None);
                    unit_results.push(UnitResult::applied(index, label));
                }
                Err(e) => {
                    warn!("{label} failed to apply: {e}");
                    observer.on_apply_complete(index, &label, Some(&e));
                    unit_results.push(UnitResult::failed(index, label, e));
                    failed_at = Some(index);
                    break;
                }
            }
        }

        let Some(failed_at) = failed_at else {
            self.advance(TxnPhase::Committed);
            info!("transaction {} committed", self.transaction_id);
            return self.report(OutcomeStatus::Committed, unit_results, Vec::new(), started_at);
        };

        self.advance(TxnPhase::Compensating);
        info!(
            "transaction {}: compensating {} change(s)",
            self.transaction_id,
            failed_at
        );

        let mut compensation_errors = Vec::new();
        for index in (0..failed_at).rev() {
            let unit = &mut self.units[index];
            let label = unit.label();
            observer.on_compensate_start(index, &label);

            match guarded(&label, "compensate", || unit.compensate()) {
                Ok(()) => {
                    observer.on_compensate_complete(index, &label, None);
                    unit_results[index].compensated = true;
                }
                Err(e) => {
                    error!("{label} failed to compensate: {e}");
                    observer.on_compensate_complete(index, &label, Some(&e));
                    compensation_errors.push(CompensationError {
                        index,
                        unit: label,
                        error: e,
                    });
                }
            }
        }

        let (phase, status) = if compensation_errors.is_empty() {
            (TxnPhase::RolledBack, OutcomeStatus::RolledBack)
        } else {
            (
                TxnPhase::PartiallyRolledBack,
                OutcomeStatus::PartiallyRolledBack,
            )
        };
        self.advance(phase);
        info!("transaction {} {status}", self.transaction_id);
        self.report(status, unit_results, compensation_errors, started_at)
    }

    fn advance(&mut self, to: TxnPhase) {
        if let Err(e) = validate_transition(self.phase, to) {
            error!("transaction {}: {e}", self.transaction_id);
        }
        self.phase = to;
    }

    fn report(
        &self,
        status: OutcomeStatus,
        unit_results: Vec<UnitResult>,
        compensation_errors: Vec<CompensationError>,
        started_at: String,
    ) -> OutcomeReport {
        OutcomeReport {
            transaction_id: self.transaction_id.clone(),
            status,
            unit_results,
            compensation_errors,
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Run a unit operation, turning a panic into an error so it takes the
/// normal failure path.
fn guarded(
    label: &str,
    operation: &'static str,
    f: impl FnOnce() -> Result<(), CoreError>,
) -> Result<(), CoreError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_owned());
        Err(CoreError::UnitPanicked {
            unit: label.to_owned(),
            operation,
            message,
        })
    })
}

fn generate_id(units: &[Box<dyn ChangeUnit>]) -> String {
    let now = chrono::Utc::now();
    let mut hasher = blake3::Hasher::new();
    hasher.update(now.to_rfc3339().as_bytes());
    for unit in units {
        hasher.update(unit.label().as_bytes());
        hasher.update(b"\n");
    }
    let hash = hasher.finalize().to_hex();
    format!("{}-{}", now.format("%Y%m%d%H%M%S"), &hash[..8])
}
