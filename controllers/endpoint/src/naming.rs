//! Deterministic, length-bounded provider resource names.

use crate::error::ControllerError;

/// The provider's name-length ceiling.
pub const MAX_RESOURCE_NAME_LEN: usize = 255;

/// Build `"{prefix}-{suffix}"`, truncating the prefix from the right so the
/// result never exceeds `max_len`. The suffix is always preserved intact.
pub fn generate_name(
    prefix: &str,
    suffix: &str,
    max_len: usize,
) -> Result<String, ControllerError> {
    if prefix.is_empty() || suffix.is_empty() {
        return Err(ControllerError::InvalidArgument(
            "name prefix and suffix must be non-empty".to_string(),
        ));
    }
    if max_len < 1 {
        return Err(ControllerError::InvalidArgument(
            "max name length must be at least 1".to_string(),
        ));
    }
    // suffix plus the joining '-'
    let reserved = suffix.len() + 1;
    if reserved >= max_len {
        return Err(ControllerError::InvalidArgument(format!(
            "suffix '{suffix}' does not fit within max length {max_len}"
        )));
    }

    let prefix_budget = max_len - reserved;
    let prefix = if prefix.len() > prefix_budget {
        // back the cut off to a char boundary so a multi-byte character
        // straddling the budget never splits
        let mut cut = prefix_budget;
        while !prefix.is_char_boundary(cut) {
            cut -= 1;
        }
        &prefix[..cut]
    } else {
        prefix
    };
    Ok(format!("{prefix}-{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names_pass_through() {
        let name = generate_name("mycluster-db", "sg", 255).unwrap();
        assert_eq!(name, "mycluster-db-sg");
    }

    #[test]
    fn test_long_prefix_truncated_from_the_right() {
        let prefix = format!("cluster-{}", "a".repeat(255));
        let name = generate_name(&prefix, "sg", 255).unwrap();
        assert_eq!(name.len(), 255);
        assert!(name.ends_with("-sg"));
        assert!(name.starts_with("cluster-"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 'é' is two bytes and sits exactly across the truncation point
        let prefix = format!("{}é{}", "a".repeat(251), "b".repeat(10));
        let name = generate_name(&prefix, "sg", 255).unwrap();
        assert!(name.len() <= 255);
        assert!(name.ends_with("-sg"));
        assert!(name.starts_with(&"a".repeat(251)));
    }

    #[test]
    fn test_exact_fit_not_truncated() {
        let prefix = "a".repeat(252);
        let name = generate_name(&prefix, "sg", 255).unwrap();
        assert_eq!(name.len(), 255);
        assert_eq!(name, format!("{prefix}-sg"));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(generate_name("", "sg", 255).is_err());
        assert!(generate_name("cluster", "", 255).is_err());
        assert!(generate_name("cluster", "sg", 0).is_err());
    }

    #[test]
    fn test_suffix_never_truncated() {
        assert!(generate_name("cluster", "a-long-suffix", 5).is_err());
    }
}
