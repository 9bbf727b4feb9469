use super::{json_pretty, EXIT_SUCCESS};
use coherent_store::{FileSettingsStore, SettingsBackend, StoreLayout};
use std::path::Path;

pub fn run(root: &Path, store_id: &str, json: bool) -> Result<u8, String> {
    let store = FileSettingsStore::new(StoreLayout::new(root));
    let content = store
        .read(store_id)
        .map_err(|e| format!("store error: {e}"))?
        .ok_or_else(|| format!("store error: settings store '{store_id}' not found"))?;

    if json {
        println!("{}", json_pretty(&content)?);
    } else if content.is_empty() {
        println!("settings store '{store_id}' is empty");
    } else {
        for (key, value) in &content {
            println!("{key} = {value}");
        }
    }
    Ok(EXIT_SUCCESS)
}
