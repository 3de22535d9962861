//! Trust registry: which senders have an NDA on file.
//!
//! Two-tier lookup: an exact address record always wins, whatever its value;
//! only when no exact record exists is the sender's `*@domain` record consulted.

use std::collections::HashMap;

use crate::error::ConfigError;

/// NDA-on-file records keyed by lowercase address or `*@domain`.
#[derive(Debug, Clone, Default)]
pub struct TrustRegistry {
    records: HashMap<String, bool>,
}

impl TrustRegistry {
    /// Build a registry from `(key, nda_on_file)` pairs.
    ///
    /// Keys are lowercased. Anything that is not `user@domain` or `*@domain`
    /// is rejected, as are two keys that collide after lowercasing.
    pub fn new<I, K>(records: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, bool)>,
        K: AsRef<str>,
    {
        let mut map = HashMap::new();
        for (key, on_file) in records {
            let key = key.as_ref().trim().to_lowercase();
            if !is_valid_key(&key) {
                return Err(ConfigError::InvalidTrustKey { key });
            }
            if map.contains_key(&key) {
                return Err(ConfigError::DuplicateTrustKey { key });
            }
            map.insert(key, on_file);
        }
        Ok(Self { records: map })
    }

    /// Whether the sender has an NDA on file.
    pub fn is_trusted(&self, sender_identity: &str) -> bool {
        let sender = sender_identity.trim().to_lowercase();

        if let Some(&on_file) = self.records.get(&sender) {
            return on_file;
        }

        match sender.rsplit_once('@') {
            Some((_, domain)) if !domain.is_empty() => self
                .records
                .get(&format!("*@{domain}"))
                .copied()
                .unwrap_or(false),
            _ => false,
        }
    }

    /// All records, sorted by key (for status output).
    pub fn entries(&self) -> Vec<(&str, bool)> {
        let mut entries: Vec<(&str, bool)> =
            self.records.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn is_valid_key(key: &str) -> bool {
    match key.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && (local == "*" || !local.contains('*'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(records: &[(&str, bool)]) -> TrustRegistry {
        TrustRegistry::new(records.iter().copied()).unwrap()
    }

    #[test]
    fn exact_match_is_trusted() {
        let reg = registry(&[("acme@example.com", true)]);
        assert!(reg.is_trusted("acme@example.com"));
        assert!(!reg.is_trusted("other@example.com"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let reg = registry(&[("Acme@Example.COM", true)]);
        assert!(reg.is_trusted("ACME@example.com"));
        assert!(reg.is_trusted("  acme@example.com "));
    }

    #[test]
    fn keys_differing_only_in_case_are_rejected() {
        let err = TrustRegistry::new([("ACME@example.com", false), ("acme@example.com", true)]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTrustKey { ref key } if key == "acme@example.com"));

        let err = TrustRegistry::new([("*@Enterprise.com", true), ("*@enterprise.com", false)]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTrustKey { .. }));
    }

    #[test]
    fn domain_wildcard_matches_any_address() {
        let reg = registry(&[("*@enterprise.com", true)]);
        assert!(reg.is_trusted("alice@enterprise.com"));
        assert!(reg.is_trusted("bob@Enterprise.com"));
        assert!(!reg.is_trusted("alice@enterprise.co"));
        assert!(!reg.is_trusted("alice@sub.enterprise.com"));
    }

    #[test]
    fn exact_false_overrides_wildcard_true() {
        let reg = registry(&[("*@partner.com", true), ("intern@partner.com", false)]);
        assert!(!reg.is_trusted("intern@partner.com"));
        assert!(reg.is_trusted("ceo@partner.com"));
    }

    #[test]
    fn exact_true_overrides_wildcard_false() {
        let reg = registry(&[("*@prospect.com", false), ("signed@prospect.com", true)]);
        assert!(reg.is_trusted("signed@prospect.com"));
        assert!(!reg.is_trusted("new@prospect.com"));
    }

    #[test]
    fn unknown_sender_defaults_to_untrusted() {
        let reg = registry(&[("acme@example.com", true)]);
        assert!(!reg.is_trusted("stranger@nowhere.org"));
        assert!(!reg.is_trusted("not-an-address"));
        assert!(!reg.is_trusted(""));
        assert!(!reg.is_trusted("trailing@"));
    }

    #[test]
    fn invalid_keys_rejected() {
        for key in ["example.com", "@example.com", "a@", "*@", "a*b@example.com"] {
            let result = TrustRegistry::new([(key, true)]);
            assert!(
                matches!(result, Err(ConfigError::InvalidTrustKey { .. })),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn entries_sorted() {
        let reg = registry(&[("z@x.com", true), ("*@a.com", false)]);
        assert_eq!(reg.entries(), vec![("*@a.com", false), ("z@x.com", true)]);
    }
}
