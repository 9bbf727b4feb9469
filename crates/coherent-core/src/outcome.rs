use crate::CoreError;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Every unit applied.
    Committed,
    /// A unit failed and every applied unit was compensated.
    RolledBack,
    /// A unit failed and at least one compensation also failed. The
    /// affected resources are listed in the report.
    PartiallyRolledBack,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Committed => f.write_str("committed"),
            OutcomeStatus::RolledBack => f.write_str("rolled back"),
            OutcomeStatus::PartiallyRolledBack => f.write_str("partially rolled back"),
        }
    }
}

fn serialize_error<S: Serializer>(error: &CoreError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

fn serialize_optional_error<S: Serializer>(
    error: &Option<CoreError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Result of applying one unit. Only attempted units get a result.
#[derive(Debug, Serialize)]
pub struct UnitResult {
    pub index: usize,
    pub unit: String,
    pub success: bool,
    #[serde(serialize_with = "serialize_optional_error")]
    pub error: Option<CoreError>,
    /// Set when the unit was compensated successfully during rollback.
    pub compensated: bool,
}

impl UnitResult {
    pub(crate) fn applied(index: usize, unit: String) -> Self {
        Self {
            index,
            unit,
            success: true,
            error: None,
            compensated: false,
        }
    }

    pub(crate) fn failed(index: usize, unit: String, error: CoreError) -> Self {
        Self {
            index,
            unit,
            success: false,
            error: Some(error),
            compensated: false,
        }
    }
}

/// A compensation that failed, leaving its resource in an unknown state.
#[derive(Debug, Serialize)]
pub struct CompensationError {
    pub index: usize,
    pub unit: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: CoreError,
}

/// Final record of one transaction run.
#[derive(Debug, Serialize)]
pub struct OutcomeReport {
    pub transaction_id: String,
    pub status: OutcomeStatus,
    /// Attempted units in apply order.
    pub unit_results: Vec<UnitResult>,
    /// Failed compensations in the order they were attempted, which is
    /// reverse apply order.
    pub compensation_errors: Vec<CompensationError>,
    pub started_at: String,
    pub finished_at: String,
}

impl OutcomeReport {
    pub fn is_committed(&self) -> bool {
        self.status == OutcomeStatus::Committed
    }

    /// The unit whose apply failure triggered rollback.
    pub fn failure(&self) -> Option<&UnitResult> {
        self.unit_results.iter().find(|r| !r.success)
    }

    /// Labels of resources a failed compensation may have left changed.
    pub fn unrestored(&self) -> Vec<&str> {
        self.compensation_errors
            .iter()
            .map(|e| e.unit.as_str())
            .collect()
    }

    pub fn summary(&self) -> String {
        match self.status {
            OutcomeStatus::Committed => {
                format!("committed {} change(s)", self.unit_results.len())
            }
            OutcomeStatus::RolledBack | OutcomeStatus::PartiallyRolledBack => {
                let cause = self.failure().map_or_else(
                    || "unknown failure".to_owned(),
                    |f| {
                        let reason = f
                            .error
                            .as_ref()
                            .map_or_else(String::new, ToString::to_string);
                        format!("{} failed: {reason}", f.unit)
                    },
                );
                if self.compensation_errors.is_empty() {
                    format!("rolled back: {cause}")
                } else {
                    format!(
                        "partially rolled back ({} compensation failure(s)): {cause}",
                        self.compensation_errors.len()
                    )
                }
            }
        }
    }
}
