//! Normalised ticker symbol lists

use crate::error::{ReportError, Result};
use serde::Serialize;
use std::fmt;

/// Ordered, non-empty list of uppercase ticker symbols
///
/// Duplicates are kept; order is the caller's order and drives report layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SymbolSet(Vec<String>);

impl SymbolSet {
    /// Trim, uppercase and drop blank entries
    ///
    /// Fails with [`ReportError::InvalidSymbols`] when nothing usable is left.
    pub fn parse<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols: Vec<String> = raw
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        if symbols.is_empty() {
            return Err(ReportError::InvalidSymbols);
        }
        Ok(Self(symbols))
    }

    /// Symbols in input order
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Symbols with later duplicates removed, first-occurrence order kept
    pub fn distinct(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.0
            .iter()
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma separated list, e.g. `AAPL, MSFT`
    pub fn joined(&self) -> String {
        self.0.join(", ")
    }
}

impl fmt::Display for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalisation() {
        let set = SymbolSet::parse([" aapl", "msft ", "", "  ", "Tsla"]).unwrap();
        assert_eq!(set.as_slice(), ["AAPL", "MSFT", "TSLA"]);
        assert_eq!(set.joined(), "AAPL, MSFT, TSLA");
    }

    #[test]
    fn test_empty_is_rejected() {
        let err = SymbolSet::parse(Vec::<String>::new()).unwrap_err();
        assert_eq!(err.status_code(), 400);

        assert!(SymbolSet::parse(["", " "]).is_err());
    }

    #[test]
    fn test_duplicates_kept_but_distinct_available() {
        let set = SymbolSet::parse(["AAPL", "msft", "aapl"]).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.distinct(), vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn test_serializes_as_list() {
        let set = SymbolSet::parse(["nvda"]).unwrap();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["NVDA"]"#);
    }
}
