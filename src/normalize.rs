//! Company-name normalization used as the join key between datasets.
//!
//! The normalized form is never displayed. It only has to be stable: the same
//! airline spelled "Aéro Lloyd", "AERO LLOYD" or " aero  lloyd " must land on
//! one key.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalize a free-text company name into its join key.
///
/// Steps, in order:
/// 1. trim and lower-case
/// 2. NFD-decompose and drop combining marks (strips accents)
/// 3. drop every character outside `[a-z0-9 ]`
/// 4. collapse runs of spaces and trim again
///
/// Tabs and other non-space whitespace are removed in step 3, not turned
/// into separators.
pub fn normalize(name: &str) -> String {
    let lowered = name.trim().to_lowercase();

    let kept: String = lowered
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect();

    kept.split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
