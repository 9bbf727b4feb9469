use crate::normalize::{NormalizedChange, NormalizedPlan};

/// Deterministic blake3 digest of a normalized plan.
///
/// Two plans with the same changes in the same order produce the same digest
/// regardless of key order or whitespace in the source file. The description
/// is not part of the digest.
pub fn plan_digest(plan: &NormalizedPlan) -> Result<String, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(format!("plan_version:{}", plan.plan_version).as_bytes());

    for change in &plan.changes {
        hasher.update(b"\0");
        match change {
            NormalizedChange::Module { .. } => hasher.update(b"module:"),
            NormalizedChange::Settings { .. } => hasher.update(b"settings:"),
        };
        hasher.update(serde_json::to_string(change)?.as_bytes());
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// First 12 hex characters of a digest, for display and transaction ids.
pub fn short_digest(digest: &str) -> &str {
    &digest[..12.min(digest.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::parse_plan_str;

    fn digest_of(input: &str) -> String {
        let plan = parse_plan_str(input).unwrap().normalize().unwrap();
        plan_digest(&plan).unwrap()
    }

    const BASE: &str = r#"
plan_version = 1
[[change]]
kind = "module"
module = "ldap-connector"
running = true
[[change]]
kind = "settings"
store = "auth.properties"
policy = "update"
[change.values]
timeout = "30"
retries = "3"
"#;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(digest_of(BASE), digest_of(BASE));
        assert_eq!(digest_of(BASE).len(), 64);
    }

    #[test]
    fn digest_ignores_description_and_key_order() {
        let reordered = r#"
plan_version = 1
description = "same changes"
[[change]]
kind = "module"
running = true
module = "ldap-connector"
[[change]]
kind = "settings"
store = "auth.properties"
policy = "update"
[change.values]
retries = "3"
timeout = "30"
"#;
        assert_eq!(digest_of(BASE), digest_of(reordered));
    }

    #[test]
    fn digest_depends_on_change_order() {
        let swapped = r#"
plan_version = 1
[[change]]
kind = "settings"
store = "auth.properties"
policy = "update"
[change.values]
timeout = "30"
retries = "3"
[[change]]
kind = "module"
module = "ldap-connector"
running = true
"#;
        assert_ne!(digest_of(BASE), digest_of(swapped));
    }

    #[test]
    fn short_digest_truncates() {
        assert_eq!(short_digest("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_digest("abc"), "abc");
    }
}
