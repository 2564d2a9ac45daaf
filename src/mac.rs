//! Hardware-address normalization.
//!
//! Every key entering the lease store goes through [`normalize`] so that
//! `AA:BB:CC:DD:30:60`, `aa-bb-cc-dd-30-60`, and any mixed form collapse to
//! the same canonical key. Lease documents written by older versions used a
//! colon delimiter; they must still resolve to the same lease on reload.

/// Canonical form: lowercase, single `-` delimiter between octets.
pub fn normalize(mac: &str) -> String {
    mac.trim()
        .to_lowercase()
        .replace(':', "-")
}

/// Checks that a hardware address is six `-` or `:` separated hex octets.
///
/// Used only at the configuration boundary; event payloads are normalized
/// but not rejected on shape, matching the permissive engine contract.
pub fn is_valid(mac: &str) -> bool {
    let normalized = normalize(mac);
    let parts: Vec<&str> = normalized.split('-').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_delimiters_and_case() {
        assert_eq!(normalize("AA:BB:CC:DD:30:60"), "aa-bb-cc-dd-30-60");
        assert_eq!(normalize("AA-BB-CC-DD-30-60"), "aa-bb-cc-dd-30-60");
        assert_eq!(normalize("aa-bb-cc-dd-30-60"), "aa-bb-cc-dd-30-60");
        assert_eq!(normalize("Aa:bB-Cc:dD-30:60"), "aa-bb-cc-dd-30-60");
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        assert_eq!(normalize(" aa:bb:cc:dd:ee:ff\n"), "aa-bb-cc-dd-ee-ff");
    }

    #[test]
    fn test_is_valid() {
        assert!(is_valid("AA:BB:CC:DD:30:60"));
        assert!(is_valid("aa-bb-cc-dd-ee-ff"));
        assert!(!is_valid("aa-bb-cc-dd-ee"));
        assert!(!is_valid("aa-bb-cc-dd-ee-ff-00"));
        assert!(!is_valid("aa-bb-cc-dd-ee-gg"));
        assert!(!is_valid(""));
        assert!(!is_valid("aabbccddeeff"));
    }
}
