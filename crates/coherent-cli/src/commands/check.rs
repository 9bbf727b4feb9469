use super::{
    construction_error, json_pretty, load_plan, open_backends, running_label, EXIT_SUCCESS,
};
use coherent_core::{build_units, UnitState};
use coherent_schema::short_digest;
use std::path::Path;

fn describe(state: &UnitState) -> String {
    match state {
        UnitState::Module { running } => running_label(*running).to_owned(),
        UnitState::Settings { content: None } => "absent".to_owned(),
        UnitState::Settings {
            content: Some(content),
        } => format!("{} key(s)", content.len()),
    }
}

pub fn run(root: &Path, registry: &str, plan_path: &Path, json: bool) -> Result<u8, String> {
    let (plan, digest) = load_plan(plan_path)?;
    let backends = open_backends(root, registry)?;
    let units = build_units(&plan, &backends.registry, &backends.settings)
        .map_err(|e| construction_error(&e))?;

    let mut changes = Vec::with_capacity(units.len());
    for unit in &units {
        let state = unit.inspect().map_err(|e| e.to_string())?;
        changes.push((unit.label(), state));
    }

    if json {
        let payload = serde_json::json!({
            "digest": digest,
            "description": plan.description,
            "changes": changes
                .iter()
                .map(|(unit, current)| serde_json::json!({ "unit": unit, "current": current }))
                .collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("plan {} is valid", short_digest(&digest));
        if let Some(d) = &plan.description {
            println!("{d}");
        }
        for (i, (unit, current)) in changes.iter().enumerate() {
            println!("  {:>2}. {unit} (currently {})", i + 1, describe(current));
        }
    }
    Ok(EXIT_SUCCESS)
}
