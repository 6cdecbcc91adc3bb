//! `${VAR}` expansion for configuration strings.

use crate::ConfigError;

/// Expand environment variable references in a string.
///
/// `${VAR}` fails when VAR is unset; `${VAR:-default}` falls back to the
/// default. Bare `$VAR` is left alone so CSS paths and hostnames containing
/// a dollar sign pass through.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, LookupError> {
        std::env::var(var).map(Some).map_err(|_| LookupError {
            var_name: var.to_owned(),
        })
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

/// Expand every string of a list, naming the field with its index.
pub(crate) fn expand_env_list(values: &mut [String], field: &str) -> Result<(), ConfigError> {
    for (i, value) in values.iter_mut().enumerate() {
        *value = expand_env(value, &format!("{field}[{i}]"))?;
    }
    Ok(())
}

struct LookupError {
    var_name: String,
}
