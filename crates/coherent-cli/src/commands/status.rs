use super::{colorize_state, json_pretty, open_backends, running_label, EXIT_SUCCESS};
use coherent_store::Settings;
use std::path::Path;

pub fn run(root: &Path, registry: &str, json: bool) -> Result<u8, String> {
    let backends = open_backends(root, registry)?;
    let modules = backends.registry.list().map_err(|e| e.to_string())?;
    let store_ids = backends
        .settings
        .list()
        .map_err(|e| format!("store error: {e}"))?;

    let mut stores = Vec::with_capacity(store_ids.len());
    for id in store_ids {
        let keys = backends
            .settings
            .read(&id)
            .map_err(|e| format!("store error: {e}"))?
            .as_ref()
            .map_or(0, Settings::len);
        stores.push((id, keys));
    }

    if json {
        let payload = serde_json::json!({
            "registry": backends.registry.name(),
            "modules": modules,
            "settings": stores
                .iter()
                .map(|(id, keys)| serde_json::json!({ "store": id, "keys": keys }))
                .collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    if modules.is_empty() {
        println!("no modules registered");
    } else {
        println!("{:<32} STATE", "MODULE");
        for m in &modules {
            println!(
                "{:<32} {}",
                m.module_id,
                colorize_state(running_label(m.running))
            );
        }
    }
    println!();
    if stores.is_empty() {
        println!("no settings stores");
    } else {
        println!("{:<32} KEYS", "SETTINGS STORE");
        for (id, keys) in &stores {
            println!("{id:<32} {keys}");
        }
    }
    Ok(EXIT_SUCCESS)
}
