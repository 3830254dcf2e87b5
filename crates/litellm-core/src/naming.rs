//! # Generated Secret Naming
//!
//! Deterministic names for secrets holding generated key material, so a pass
//! that runs after a crash can find a previously created secret without asking
//! the gateway.
//!
//! ```text
//! base  = instance name            (instanceRef)
//!       | connection secret name   (secretRef)
//!
//! API key:   <base>-key-<keyAlias>
//! Account:   <base>-user-<userEmail>
//! ```
//!
//! Names are folded into DNS-1123 subdomain form: lowercase, `[a-z0-9.-]`,
//! alphanumeric at both ends, at most 253 characters.

use crate::types::ConnectionSource;

/// Maximum length of a DNS-1123 subdomain.
pub const MAX_NAME_LEN: usize = 253;

/// Returns the naming base for a connection source.
pub fn secret_base(source: &ConnectionSource) -> &str {
    match source {
        ConnectionSource::Secret { name, .. } => name,
        ConnectionSource::Instance { name, .. } => name,
    }
}

/// Secret name for an API key.
///
/// ## Example
/// ```rust
/// use litellm_core::naming::key_secret_name;
///
/// assert_eq!(key_secret_name("prod", "ci_runner"), "prod-key-ci-runner");
/// ```
pub fn key_secret_name(base: &str, key_alias: &str) -> String {
    sanitize(&format!("{}-key-{}", base, key_alias))
}

/// Secret name for an account's auto-generated key.
pub fn user_secret_name(base: &str, user_email: &str) -> String {
    sanitize(&format!("{}-user-{}", base, user_email))
}

/// Folds an arbitrary string into a DNS-1123 subdomain.
pub fn sanitize(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let mut name: String = mapped
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string();

    if name.len() > MAX_NAME_LEN {
        name.truncate(MAX_NAME_LEN);
        let trimmed_len = name
            .trim_end_matches(|c: char| !c.is_ascii_alphanumeric())
            .len();
        name.truncate(trimmed_len);
    }

    name
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_secret_name() {
        assert_eq!(key_secret_name("gw", "team-a"), "gw-key-team-a");
    }

    #[test]
    fn test_user_secret_name_folds_email() {
        assert_eq!(
            user_secret_name("gw", "Alice@Example.com"),
            "gw-user-alice-example.com"
        );
    }

    #[test]
    fn test_sanitize_trims_edges() {
        assert_eq!(sanitize("_weird name_"), "weird-name");
        assert_eq!(sanitize("--a--"), "a");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = format!("{}-", "a".repeat(300));
        let name = sanitize(&long);
        assert_eq!(name.len(), MAX_NAME_LEN);
        assert!(name.ends_with('a'));
    }

    #[test]
    fn test_secret_base() {
        let source = ConnectionSource::Instance {
            namespace: "ml".to_string(),
            name: "gateway".to_string(),
        };
        assert_eq!(secret_base(&source), "gateway");
    }
}
