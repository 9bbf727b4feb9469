use crate::CoreError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnPhase {
    Pending,
    Applying,
    Compensating,
    Committed,
    RolledBack,
    PartiallyRolledBack,
}

impl TxnPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TxnPhase::Committed | TxnPhase::RolledBack | TxnPhase::PartiallyRolledBack
        )
    }
}

impl std::fmt::Display for TxnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TxnPhase::Pending => "pending",
            TxnPhase::Applying => "applying",
            TxnPhase::Compensating => "compensating",
            TxnPhase::Committed => "committed",
            TxnPhase::RolledBack => "rolled_back",
            TxnPhase::PartiallyRolledBack => "partially_rolled_back",
        };
        f.write_str(s)
    }
}

pub fn validate_transition(from: TxnPhase, to: TxnPhase) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (TxnPhase::Pending, TxnPhase::Applying)
            | (
                TxnPhase::Applying,
                TxnPhase::Committed | TxnPhase::Compensating
            )
            | (
                TxnPhase::Compensating,
                TxnPhase::RolledBack | TxnPhase::PartiallyRolledBack
            )
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
