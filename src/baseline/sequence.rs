use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DepartError, Result};

/// How peptide strings are turned into residue tokens.
///
/// Tokens follow the modX convention: an optional lowercase modification
/// prefix followed by one uppercase residue (`oxM`, `pS`, `K`). Terminal
/// groups `H-` / `-OH` are dropped and characters that are neither letters
/// nor digits (`_`, `.`) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceRules {
    /// Residue replacements applied before tokenising, e.g. `U → C`.
    pub substitutions: BTreeMap<String, String>,
}

impl Default for SequenceRules {
    fn default() -> Self {
        Self {
            substitutions: BTreeMap::from([("U".to_string(), "C".to_string())]),
        }
    }
}

impl SequenceRules {
    /// Split a sequence into residue tokens.
    pub fn tokenize(&self, sequence: &str) -> Result<Vec<String>> {
        let mut body = sequence.trim();
        body = body.strip_prefix("H-").unwrap_or(body);
        body = body.strip_suffix("-OH").unwrap_or(body);

        let mut substituted = String::with_capacity(body.len());
        let mut buf = [0u8; 4];
        for ch in body.chars() {
            let key: &str = ch.encode_utf8(&mut buf);
            match self.substitutions.get(key) {
                Some(rep) => substituted.push_str(rep),
                None => substituted.push(ch),
            }
        }

        let mut tokens = Vec::new();
        let mut prefix = String::new();
        for ch in substituted.chars() {
            if ch.is_ascii_uppercase() {
                prefix.push(ch);
                tokens.push(std::mem::take(&mut prefix));
            } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
                prefix.push(ch);
            }
        }
        if tokens.is_empty() {
            return Err(DepartError::EmptySequence);
        }
        Ok(tokens)
    }

    /// Token counts and the peptide length.
    pub fn composition(&self, sequence: &str) -> Result<(BTreeMap<String, f64>, usize)> {
        let tokens = self.tokenize(sequence)?;
        let len = tokens.len();
        let mut counts = BTreeMap::new();
        for token in tokens {
            *counts.entry(token).or_insert(0.0) += 1.0;
        }
        Ok((counts, len))
    }
}

/// Residue letter of a (possibly modified) token.
pub fn unmodified(token: &str) -> &str {
    token
        .char_indices()
        .last()
        .map_or(token, |(i, _)| &token[i..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modx_tokens_keep_modification_prefix() {
        let rules = SequenceRules::default();
        assert_eq!(
            rules.tokenize("H-PEoxMpSK-OH").unwrap(),
            vec!["P", "E", "oxM", "pS", "K"]
        );
        assert_eq!(unmodified("oxM"), "M");
        assert_eq!(unmodified("K"), "K");
    }

    #[test]
    fn selenocysteine_is_substituted() {
        let rules = SequenceRules::default();
        let (counts, len) = rules.composition("_AUCU_").unwrap();
        assert_eq!(len, 4);
        assert_eq!(counts.get("C"), Some(&3.0));
        assert!(counts.get("U").is_none());
    }

    #[test]
    fn empty_sequence_is_an_error() {
        assert!(matches!(
            SequenceRules::default().tokenize("__"),
            Err(DepartError::EmptySequence)
        ));
    }
}
