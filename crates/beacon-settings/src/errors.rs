//! Settings error types.

use thiserror::Error;

/// Why `~/.beacon/settings.json` could not become a [`crate::BeaconSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("cannot read beacon settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not JSON, or a field has the wrong type.
    #[error("beacon settings file is not valid: {0}")]
    Json(#[from] serde_json::Error),
    /// A field parsed but breaks a constraint.
    #[error("invalid setting `{key}`: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field, e.g. `server.keepalive_interval_secs`.
        key: &'static str,
        /// What the value must satisfy.
        reason: &'static str,
    },
}

impl SettingsError {
    /// Constraint violation on `key`.
    pub fn invalid(key: &'static str, reason: &'static str) -> Self {
        Self::InvalidValue { key, reason }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_names_the_key() {
        let err = SettingsError::invalid("server.keepalive_interval_secs", "must be > 0");
        assert_eq!(
            err.to_string(),
            "invalid setting `server.keepalive_interval_secs`: must be > 0"
        );
    }

    #[test]
    fn wrong_field_type_is_json_error() {
        let json_err =
            serde_json::from_str::<crate::BeaconSettings>(r#"{"server":{"port":"high"}}"#)
                .unwrap_err();
        let err = SettingsError::from(json_err);
        assert!(matches!(err, SettingsError::Json(_)));
        assert!(err.to_string().starts_with("beacon settings file is not valid"));
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let err: SettingsError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "settings.json").into();
        assert!(matches!(err, SettingsError::Io(_)));
        assert!(err.to_string().contains("cannot read beacon settings file"));
    }
}
