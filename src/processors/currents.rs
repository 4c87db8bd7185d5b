//! Nominal current parsing from file names.
//!
//! Export names were typed by hand over several years, so the current appears
//! in a handful of spellings. Each spelling is a named matcher; the matchers
//! for a file type are tried in order and the first hit wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::core::loaders::FileCategory;

/// One filename convention for writing a current.
pub struct CurrentPattern {
    /// Short identifier reported with every match.
    pub name: &'static str,
    regex: Regex,
    /// Rewrites the captured text into a parseable number.
    normalize: fn(&str) -> String,
}

impl CurrentPattern {
    fn new(name: &'static str, pattern: &str, normalize: fn(&str) -> String) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("current pattern is valid"),
            normalize,
        }
    }

    /// Try this pattern against a file name.
    pub fn apply(&self, file_name: &str) -> Option<CurrentMatch> {
        let literal = self.regex.captures(file_name)?.get(1)?.as_str();
        let value = (self.normalize)(literal).parse::<f64>().ok()?;
        Some(CurrentMatch {
            value,
            literal: literal.to_string(),
            pattern: self.name,
        })
    }
}

/// A current recovered from a file name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentMatch {
    /// Parsed value.
    pub value: f64,
    /// Text exactly as it appeared in the name.
    pub literal: String,
    /// Name of the pattern that matched.
    pub pattern: &'static str,
}

fn verbatim(literal: &str) -> String {
    literal.to_string()
}

fn collapse_doubled_separator(literal: &str) -> String {
    literal.replace("..", ".")
}

/// Patterns for transient scan (`TRScan`/`CP`) names, in priority order.
pub static TRANSIENT_PATTERNS: Lazy<Vec<CurrentPattern>> = Lazy::new(|| {
    vec![
        CurrentPattern::new("space-amps", r" (\d+(?:\.\d+)?)A", verbatim),
        CurrentPattern::new(
            "underscore-doubled-separator",
            r"_(\d+\.\.\d+)A",
            collapse_doubled_separator,
        ),
        CurrentPattern::new("underscore-amps", r"_(\d+(?:\.\d+)?)A", verbatim),
        CurrentPattern::new("spaced-unit", r" (\d+(?:\.\d+)?) A", verbatim),
    ]
});

/// Patterns for impedance sweep (`EIS`) names, in priority order.
pub static IMPEDANCE_PATTERNS: Lazy<Vec<CurrentPattern>> = Lazy::new(|| {
    vec![
        CurrentPattern::new("eis-space", r"EIS (\d+(?:\.\d+)?)A", verbatim),
        CurrentPattern::new("eis-joined", r"EIS(\d+(?:\.\d+)?)A", verbatim),
        CurrentPattern::new("underscore-amps", r"_(\d+(?:\.\d+)?)A", verbatim),
    ]
});

/// Run an ordered pattern list and return the first match.
pub fn first_match(patterns: &[CurrentPattern], file_name: &str) -> Option<CurrentMatch> {
    patterns.iter().find_map(|pattern| pattern.apply(file_name))
}

/// Extract the nominal current of a transient scan.
pub fn transient_current(file_name: &str) -> Option<CurrentMatch> {
    first_match(&TRANSIENT_PATTERNS, file_name)
}

/// Extract the nominal current of an impedance sweep.
pub fn impedance_current(file_name: &str) -> Option<CurrentMatch> {
    first_match(&IMPEDANCE_PATTERNS, file_name)
}

/// Extract the nominal current using the pattern list for `category`.
///
/// Unrecognized files have no current.
pub fn extract_current(category: FileCategory, file_name: &str) -> Option<CurrentMatch> {
    match category {
        FileCategory::TransientScan => transient_current(file_name),
        FileCategory::ImpedanceSweep => impedance_current(file_name),
        FileCategory::Unrecognized => None,
    }
}
