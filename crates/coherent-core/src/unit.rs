use crate::CoreError;
use coherent_store::Settings;
use serde::Serialize;

/// Observable state of the resource a unit owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitState {
    Module { running: bool },
    /// `None` when the store does not exist.
    Settings { content: Option<Settings> },
}

/// How far a unit has got in touching its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPhase {
    /// Nothing has been mutated.
    Pending,
    Applied,
    /// A mutation was attempted and reported failure.
    Failed,
    Compensated,
}

impl UnitPhase {
    /// Whether the resource may differ from its captured original.
    pub fn touched(self) -> bool {
        !matches!(self, UnitPhase::Pending)
    }
}

/// One reversible change to one resource.
///
/// A unit captures whatever it needs to undo itself when it is constructed,
/// and construction fails if the unit's preconditions do not hold. After a
/// successful `apply`, `compensate` returns the resource to the captured
/// state. `compensate` is idempotent and safe to call whether or not `apply`
/// ran or succeeded.
pub trait ChangeUnit: Send {
    /// Short resource kind, `"module"` or `"settings"`.
    fn kind(&self) -> &'static str;

    /// Id of the resource this unit owns.
    fn target(&self) -> &str;

    fn phase(&self) -> UnitPhase;

    fn apply(&mut self) -> Result<(), CoreError>;

    fn compensate(&mut self) -> Result<(), CoreError>;

    /// Read the live state of the resource without changing it.
    fn inspect(&self) -> Result<UnitState, CoreError>;

    fn label(&self) -> String {
        format!("{} '{}'", self.kind(), self.target())
    }
}
