use tracing::debug;

/// Resolve a config value. If it starts with '$', treat it as an environment
/// variable reference; an unset variable leaves the literal in place.
pub fn resolve_env_reference(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        match std::env::var(var_name) {
            Ok(resolved) => {
                debug!(var = %var_name, "Resolved config value from environment");
                resolved
            }
            Err(_) => {
                debug!(var = %var_name, "Environment variable not set, using literal");
                value.to_string()
            }
        }
    } else {
        value.to_string()
    }
}

/// Mask a secret for display, keeping only its last four characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_literal() {
        assert_eq!(resolve_env_reference("sk-local"), "sk-local");
    }

    #[test]
    fn test_resolve_env_var() {
        std::env::set_var("TEST_GUARDSTICK_KEY", "secret123");
        assert_eq!(resolve_env_reference("$TEST_GUARDSTICK_KEY"), "secret123");
        std::env::remove_var("TEST_GUARDSTICK_KEY");
    }

    #[test]
    fn test_resolve_missing_env_var() {
        assert_eq!(
            resolve_env_reference("$NONEXISTENT_GUARDSTICK_VAR"),
            "$NONEXISTENT_GUARDSTICK_VAR"
        );
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abcdefgh"), "****efgh");
        assert_eq!(mask_secret("abc"), "****");
    }
}
