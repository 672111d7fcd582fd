//! Version strings and their ordering.
//!
//! A version is split into tokens on `.`, `-` and `_`, and on every
//! transition between digits and letters. Tokens are then compared pairwise;
//! when one version runs out of tokens the rest of the other one is compared
//! against an implicit release marker. Token order, lowest first:
//!
//! 1. pre-release qualifiers: `alpha` < `beta` < `milestone` < `rc` < `snapshot`
//! 2. release: `0`, `ga`, `final`, `release` and the implicit padding
//! 3. `sp`
//! 4. any other text, compared case-insensitively
//! 5. positive numbers, compared numerically
//!
//! ```
//! use extman_version::{Version, VersionType};
//!
//! assert!(Version::new("1.2") > Version::new("1.1"));
//! assert!(Version::new("1.1") < Version::new("1.1w"));
//! assert!(Version::new("1.1") > Version::new("1.1-milestone-1"));
//! assert_eq!(Version::new("1.0"), Version::new("1"));
//! assert_eq!(Version::new("1.1-SNAPSHOT").version_type(), VersionType::Snapshot);
//! ```

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Stability class of a version, derived from its qualifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionType {
    /// No pre-release qualifier.
    Stable,
    /// Contains an alpha, beta, milestone or release-candidate qualifier.
    Beta,
    /// Contains a `SNAPSHOT` qualifier.
    Snapshot,
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Beta => write!(f, "beta"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

const ALPHA: i8 = -5;
const BETA: i8 = -4;
const MILESTONE: i8 = -3;
const RELEASE_CANDIDATE: i8 = -2;
const SNAPSHOT: i8 = -1;

/// Decimal digits without leading zeros, compared by magnitude.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Digits(String);

impl Ord for Digits {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Digits {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single version token. Variant order is the comparison order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Token {
    /// Known pre-release qualifier, always negative.
    Qualifier(i8),
    /// Zero, `ga`, `final`, `release`, or the padding past the last token.
    Release,
    /// Service pack (`sp`).
    ServicePack,
    /// Unknown text, lowercased.
    Text(String),
    /// A strictly positive number.
    Number(Digits),
}

impl Token {
    fn from_digits(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            Self::Release
        } else {
            Self::Number(Digits(trimmed.to_string()))
        }
    }

    fn from_text(text: &str, followed_by_digit: bool) -> Self {
        let lower = text.to_ascii_lowercase();
        match lower.as_str() {
            "alpha" => Self::Qualifier(ALPHA),
            "beta" => Self::Qualifier(BETA),
            "milestone" => Self::Qualifier(MILESTONE),
            "rc" | "cr" => Self::Qualifier(RELEASE_CANDIDATE),
            "snapshot" => Self::Qualifier(SNAPSHOT),
            "ga" | "final" | "release" => Self::Release,
            "sp" => Self::ServicePack,
            "a" if followed_by_digit => Self::Qualifier(ALPHA),
            "b" if followed_by_digit => Self::Qualifier(BETA),
            "m" if followed_by_digit => Self::Qualifier(MILESTONE),
            _ => Self::Text(lower),
        }
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '-' | '_')
}

/// Split version text into tokens, then drop trailing release tokens so that
/// `1`, `1.0` and `1.0-ga` share one canonical form.
fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.trim().chars().collect();
    let mut tokens = Vec::new();
    let mut start = 0;

    while start <= chars.len() {
        let mut end = start;
        if end < chars.len() && !is_separator(chars[end]) {
            let digit = chars[end].is_ascii_digit();
            while end < chars.len()
                && !is_separator(chars[end])
                && chars[end].is_ascii_digit() == digit
            {
                end += 1;
            }
            let run: String = chars[start..end].iter().collect();
            let token = if digit {
                Token::from_digits(&run)
            } else {
                let followed_by_digit = chars.get(end).is_some_and(char::is_ascii_digit);
                Token::from_text(&run, followed_by_digit)
            };
            tokens.push(token);
        } else if end < chars.len() {
            // Empty token between two separators
            tokens.push(Token::Release);
        }

        if end >= chars.len() {
            break;
        }
        // Skip one separator; a digit/letter transition has none to skip
        start = if is_separator(chars[end]) { end + 1 } else { end };
    }

    while tokens.last() == Some(&Token::Release) {
        tokens.pop();
    }
    tokens
}

/// An immutable, totally ordered version.
///
/// Construction never fails: text that does not follow the usual
/// `major.minor-qualifier` shape still tokenizes and compares.
#[derive(Clone)]
pub struct Version {
    raw: String,
    tokens: Vec<Token>,
}

impl Version {
    /// Parse a version from text.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let tokens = tokenize(&raw);
        Self { raw, tokens }
    }

    /// The original version text.
    pub fn value(&self) -> &str {
        &self.raw
    }

    /// Classify the version by its qualifiers.
    pub fn version_type(&self) -> VersionType {
        if self.tokens.contains(&Token::Qualifier(SNAPSHOT)) {
            VersionType::Snapshot
        } else if self
            .tokens
            .iter()
            .any(|t| matches!(t, Token::Qualifier(q) if *q < SNAPSHOT))
        {
            VersionType::Beta
        } else {
            VersionType::Stable
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.tokens.len().max(other.tokens.len());
        for index in 0..len {
            let ours = self.tokens.get(index).unwrap_or(&Token::Release);
            let theirs = other.tokens.get(index).unwrap_or(&Token::Release);
            match ours.cmp(theirs) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Tokens are canonical (trailing release markers removed)
        self.tokens.hash(state);
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({:?})", self.raw)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Version {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}
