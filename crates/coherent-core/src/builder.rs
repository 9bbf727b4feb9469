use crate::module_unit::ModuleActivationUnit;
use crate::settings_unit::{SettingsPolicy, SettingsStoreUnit};
use crate::unit::ChangeUnit;
use crate::CoreError;
use coherent_runtime::ModuleRegistry;
use coherent_schema::{NormalizedChange, NormalizedPlan, SettingsPolicyName};
use coherent_store::SettingsBackend;
use std::sync::Arc;
use tracing::debug;

/// Construct one change unit per plan entry, in plan order.
///
/// Construction captures each resource's current state, so nothing is
/// mutated here. The first change whose preconditions fail aborts the build
/// with [`CoreError::Construction`] naming its position.
pub fn build_units(
    plan: &NormalizedPlan,
    registry: &Arc<dyn ModuleRegistry>,
    settings: &Arc<dyn SettingsBackend>,
) -> Result<Vec<Box<dyn ChangeUnit>>, CoreError> {
    let mut units: Vec<Box<dyn ChangeUnit>> = Vec::with_capacity(plan.changes.len());

    for (index, change) in plan.changes.iter().enumerate() {
        let unit = build_unit(change, registry, settings).map_err(|e| CoreError::Construction {
            index,
            target: change.target(),
            source: Box::new(e),
        })?;
        debug!("built #{index} {}", unit.label());
        units.push(unit);
    }

    Ok(units)
}

fn build_unit(
    change: &NormalizedChange,
    registry: &Arc<dyn ModuleRegistry>,
    settings: &Arc<dyn SettingsBackend>,
) -> Result<Box<dyn ChangeUnit>, CoreError> {
    Ok(match change {
        NormalizedChange::Module { module, running } => Box::new(ModuleActivationUnit::new(
            Arc::clone(registry),
            module,
            *running,
        )?),
        NormalizedChange::Settings {
            store,
            policy,
            merge,
            values,
        } => {
            let policy = match policy {
                SettingsPolicyName::Create => SettingsPolicy::Create,
                SettingsPolicyName::Update => SettingsPolicy::Update { merge: *merge },
                SettingsPolicyName::Delete => SettingsPolicy::Delete,
            };
            Box::new(SettingsStoreUnit::new(
                Arc::clone(settings),
                store,
                policy,
                values.clone(),
            )?)
        }
    })
}
