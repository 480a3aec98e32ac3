//! Settings error types

use thiserror::Error;

/// Errors raised while loading or validating settings.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown manifest category: {0}")]
    UnknownCategory(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_key() {
        let err = Error::Config("username_prefix must be at least 3 characters".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: username_prefix must be at least 3 characters"
        );
    }

    #[test]
    fn unknown_category_includes_name() {
        let err = Error::UnknownCategory("golden_ticket".into());
        assert!(err.to_string().contains("golden_ticket"), "got: {err}");
    }

    #[test]
    fn io_error_converts() {
        let err: Error =
            std::io::Error::new(std::io::ErrorKind::NotFound, "settings missing").into();
        assert!(err.to_string().starts_with("I/O error:"), "got: {err}");
        assert!(format!("{err:?}").contains("Io"));
    }
}
