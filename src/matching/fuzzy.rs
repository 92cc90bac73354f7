// src/matching/fuzzy.rs - Fuzzy text similarity for grantor/grantee comparison
//
// Scores live on the 0..=100 integer scale used by the downstream weighting,
// where 100 means "identical" and 0 means "nothing in common".

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Best-alignment scores above this are reported as a perfect match.
const PERFECT_MATCH_CUTOFF: f64 = 0.995;

static NON_WORD_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\W").expect("non-word character pattern is valid"));

/// How text is pre-processed before it is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextProcessing {
    /// Punctuation becomes whitespace, letters are lowercased, ends are trimmed.
    #[default]
    Full,
    /// Strings are compared exactly as they appear in the table.
    Raw,
}

impl TextProcessing {
    pub fn apply<'a>(&self, s: &'a str) -> Cow<'a, str> {
        match self {
            TextProcessing::Full => Cow::Owned(full_process(s)),
            TextProcessing::Raw => Cow::Borrowed(s),
        }
    }
}

impl FromStr for TextProcessing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(TextProcessing::Full),
            "raw" => Ok(TextProcessing::Raw),
            other => Err(format!(
                "unknown text processing mode '{}' (expected 'full' or 'raw')",
                other
            )),
        }
    }
}

impl fmt::Display for TextProcessing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextProcessing::Full => write!(f, "full"),
            TextProcessing::Raw => write!(f, "raw"),
        }
    }
}

/// Replaces every non-word character with a space, lowercases, and trims.
/// Inner runs of whitespace are kept as they are.
pub fn full_process(s: &str) -> String {
    NON_WORD_CHARS
        .replace_all(s, " ")
        .to_lowercase()
        .trim()
        .to_string()
}

/// Best-aligned partial similarity of two strings on a 0..=100 scale.
///
/// The shorter string is slid across every window of equal length in the
/// longer one and each window is scored by normalized indel similarity,
/// `2 * LCS / (|a| + |b|)`; the best window wins. Equal strings (including
/// two empty strings) score 100, an empty string against a non-empty one
/// scores 0.
pub fn partial_ratio(a: &str, b: &str, processing: TextProcessing) -> u8 {
    let a = processing.apply(a);
    let b = processing.apply(b);

    if a == b {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (shorter, longer) = if a_chars.len() <= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };

    to_score(best_window_lcs(shorter, longer) as f64 / shorter.len() as f64)
}

/// Longest LCS between `shorter` and any equal-length window of `longer`.
///
/// The shared character count of a window bounds its LCS from above, and it
/// is kept up to date as the window slides, so windows that cannot beat the
/// current best never run the quadratic LCS.
fn best_window_lcs(shorter: &[char], longer: &[char]) -> usize {
    let window_len = shorter.len();

    let mut needed: HashMap<char, usize> = HashMap::new();
    for &c in shorter {
        *needed.entry(c).or_insert(0) += 1;
    }
    let mut in_window: HashMap<char, usize> = HashMap::new();
    let mut overlap = 0usize;
    for &c in &longer[..window_len] {
        if admit(c, &needed, &mut in_window) {
            overlap += 1;
        }
    }

    let mut best = 0usize;
    for start in 0..=(longer.len() - window_len) {
        if start > 0 {
            if evict(longer[start - 1], &needed, &mut in_window) {
                overlap -= 1;
            }
            if admit(longer[start + window_len - 1], &needed, &mut in_window) {
                overlap += 1;
            }
        }
        if overlap <= best {
            continue;
        }

        let lcs = longest_common_subsequence(shorter, &longer[start..start + window_len]);
        if lcs > best {
            best = lcs;
            if best == window_len {
                break;
            }
        }
    }
    best
}

/// Adds `c` to the window; true when it raises the shared character count.
fn admit(c: char, needed: &HashMap<char, usize>, in_window: &mut HashMap<char, usize>) -> bool {
    let count = in_window.entry(c).or_insert(0);
    *count += 1;
    *count <= needed.get(&c).copied().unwrap_or(0)
}

/// Drops `c` from the window; true when it lowers the shared character count.
fn evict(c: char, needed: &HashMap<char, usize>, in_window: &mut HashMap<char, usize>) -> bool {
    match in_window.get_mut(&c) {
        Some(count) if *count > 0 => {
            let shared = *count <= needed.get(&c).copied().unwrap_or(0);
            *count -= 1;
            shared
        }
        _ => false,
    }
}

fn to_score(similarity: f64) -> u8 {
    if similarity > PERFECT_MATCH_CUTOFF {
        return 100;
    }
    (similarity * 100.0).round_ties_even().clamp(0.0, 100.0) as u8
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
