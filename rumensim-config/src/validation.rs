//! Custom validation functions for configuration.
//!
//! Shared validation logic used across multiple configuration modules.

use validator::ValidationError;

use crate::simulation::KineticProfile;

/// Validate that a floating-point value is strictly positive.
pub fn validate_positive(value: f64) -> Result<(), ValidationError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_positive"))
    }
}

/// Validate a single topic segment: non-empty, no separators or wildcards.
pub fn validate_topic_segment(segment: &str) -> Result<(), ValidationError> {
    let valid = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_topic_segment"))
    }
}

/// Validate that every kinetic profile is usable and at least one exists.
pub fn validate_profiles(profiles: &[KineticProfile]) -> Result<(), ValidationError> {
    if profiles.is_empty() {
        return Err(ValidationError::new("no_kinetic_profiles"));
    }
    if profiles
        .iter()
        .any(|p| p.a <= 0.0 || p.mu <= 0.0 || p.lambda <= 0.0)
    {
        return Err(ValidationError::new("non_positive_kinetic_parameter"));
    }
    Ok(())
}
