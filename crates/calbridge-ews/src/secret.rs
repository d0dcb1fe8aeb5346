//! Secret reference resolver.
//!
//! The account secret in `config.toml` can reference a secret stored
//! outside the file:
//!
//! - `pass::path/in/store`: runs `pass show path/in/store`, returns first line
//! - `env::VAR_NAME`: reads `$VAR_NAME` from the environment
//! - anything else: returned as-is (plain text)

use crate::settings::ConfigError;

/// Resolves a value that may contain a secret reference prefix.
pub fn resolve(value: &str) -> Result<String, ConfigError> {
    if let Some(path) = value.strip_prefix("pass::") {
        resolve_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        resolve_env(var)
    } else {
        Ok(value.to_string())
    }
}

/// Runs `pass show <path>` and returns the first line of stdout.
fn resolve_pass(path: &str) -> Result<String, ConfigError> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| ConfigError::Secret(format!("failed to run `pass show {}`: {}", path, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConfigError::Secret(format!(
            "`pass show {}` failed ({}): {}",
            path,
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::Secret(format!("`pass show {}` produced no output", path)))
}

fn resolve_env(var: &str) -> Result<String, ConfigError> {
    std::env::var(var)
        .map_err(|_| ConfigError::Secret(format!("environment variable `{}` is not set", var)))
}
