// src/services/normalizer.rs

//! AWB canonicalization, validation and lookup variants.

use std::fmt;

use crate::error::{AppError, Result};
use crate::models::CarrierConfig;

/// A validated, canonical AWB with its manifest lookup variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Awb {
    canonical: String,
    prefix: Option<String>,
    variants: Vec<String>,
}

impl Awb {
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Carrier prefix the AWB starts with, when it has one.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Lookup candidates, canonical form first.
    pub fn variants(&self) -> &[String] {
        &self.variants
    }
}

impl fmt::Display for Awb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Normalizes raw AWB text from manual entry or scan events.
#[derive(Debug, Clone)]
pub struct AwbNormalizer {
    /// Longest first so `BCE` wins over a hypothetical `B`
    prefixes: Vec<String>,
    partner_prefixes: Vec<String>,
}

impl AwbNormalizer {
    pub fn new(config: &CarrierConfig) -> Self {
        let mut prefixes: Vec<String> = config
            .prefixes
            .iter()
            .map(|p| p.trim().to_uppercase())
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        prefixes.dedup();

        let partner_prefixes = config
            .partner_prefixes
            .iter()
            .map(|p| p.trim().to_uppercase())
            .collect();

        Self {
            prefixes,
            partner_prefixes,
        }
    }

    /// Trim and uppercase.
    pub fn canonicalize(raw: &str) -> String {
        raw.trim().to_uppercase()
    }

    /// Canonicalize and generate variants without enforcing the prefix rule.
    pub fn normalize(&self, raw: &str) -> Awb {
        let canonical = Self::canonicalize(raw);
        let prefix = self.matching_prefix(&canonical).map(str::to_string);
        let mut variants = vec![canonical.clone()];

        if let Some(prefix) = &prefix {
            let stripped = &canonical[prefix.len()..];
            if !stripped.is_empty() {
                variants.push(stripped.to_string());
            }
        } else if !canonical.is_empty() && canonical.chars().all(|c| c.is_ascii_digit()) {
            variants.extend(self.prefixes.iter().map(|p| format!("{p}{canonical}")));
        }

        Awb {
            canonical,
            prefix,
            variants,
        }
    }

    /// Normalize and reject anything without an accepted carrier prefix.
    ///
    /// Pure function: nothing is read or written on rejection.
    pub fn parse(&self, raw: &str) -> Result<Awb> {
        let awb = self.normalize(raw);
        let has_body = awb
            .prefix()
            .is_some_and(|prefix| awb.as_str().len() > prefix.len());
        if !has_body {
            return Err(AppError::invalid_format(awb.canonical));
        }
        if awb.as_str().chars().any(char::is_whitespace) {
            return Err(AppError::invalid_format(awb.canonical));
        }
        Ok(awb)
    }

    /// Whether the AWB belongs to a partnered branch.
    pub fn is_partner(&self, awb: &Awb) -> bool {
        awb.prefix()
            .is_some_and(|p| self.partner_prefixes.iter().any(|q| q == p))
    }

    fn matching_prefix(&self, canonical: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|p| canonical.starts_with(p.as_str()))
            .map(String::as_str)
    }
}
