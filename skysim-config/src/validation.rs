//! Custom validators shared across configuration sections.

use validator::ValidationError;

/// Feed mode must be one of the three supported sources.
pub fn validate_mode(mode: &str) -> Result<(), ValidationError> {
    match mode {
        "live" | "replay" | "archive" => Ok(()),
        _ => Err(ValidationError::new("invalid_feed_mode")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_modes() {
        for mode in ["live", "replay", "archive"] {
            assert!(validate_mode(mode).is_ok());
        }
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(validate_mode("metropolis").is_err());
    }
}
