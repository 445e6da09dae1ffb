use ulid::Ulid;

/// Well-known ID prefixes.
pub mod prefix {
    pub const USER: &str = "usr";
}

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = career_common::id::prefixed_ulid("usr");
/// assert!(id.starts_with("usr_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Returns true when `id` is `<prefix>_<ULID>`.
///
/// Used to reject token subjects that cannot possibly name a user before
/// touching the database.
pub fn has_prefix(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|ulid| Ulid::from_string(ulid).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_ulid_format() {
        let id = prefixed_ulid(prefix::USER);
        assert!(id.starts_with("usr_"));
        assert_eq!(id.len(), 4 + 26);
    }

    #[test]
    fn prefixed_ulids_are_unique() {
        assert_ne!(prefixed_ulid("usr"), prefixed_ulid("usr"));
    }

    #[test]
    fn has_prefix_accepts_generated_ids() {
        let id = prefixed_ulid(prefix::USER);
        assert!(has_prefix(&id, prefix::USER));
    }

    #[test]
    fn has_prefix_rejects_garbage() {
        assert!(!has_prefix("usr_", prefix::USER));
        assert!(!has_prefix("usr_not-a-ulid", prefix::USER));
        assert!(!has_prefix("42", prefix::USER));
        let other = prefixed_ulid("job");
        assert!(!has_prefix(&other, prefix::USER));
    }
}
