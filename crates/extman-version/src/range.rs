//! Version intervals.
//!
//! Grammar: `[` or `(`, an optional lower bound, `,`, an optional upper bound,
//! then `]` or `)`. Square brackets are inclusive, parentheses exclusive.
//! `[1.0]` is the single version `1.0`.

use std::fmt;

use crate::error::{Error, Result};
use crate::version::Version;

/// One side of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    pub fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// An interval over versions. A missing bound is unbounded in that direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl VersionRange {
    /// Build a range from explicit bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersionRange`] if the lower bound is above the
    /// upper bound, or if both are equal and either side is exclusive.
    pub fn new(lower: Option<Bound>, upper: Option<Bound>) -> Result<Self> {
        let range = Self { lower, upper };
        if let (Some(lower), Some(upper)) = (&range.lower, &range.upper) {
            if lower.version > upper.version {
                return Err(Error::invalid_range(
                    &range.to_string(),
                    "lower bound is greater than upper bound",
                ));
            }
            if lower.version == upper.version && !(lower.inclusive && upper.inclusive) {
                return Err(Error::invalid_range(
                    &range.to_string(),
                    "a single-version range must be inclusive on both sides",
                ));
            }
        }
        Ok(range)
    }

    /// The range matching exactly one version, `[v]`.
    pub fn exact(version: Version) -> Self {
        Self {
            lower: Some(Bound::inclusive(version.clone())),
            upper: Some(Bound::inclusive(version)),
        }
    }

    /// The range matching every version, `(,)`.
    pub fn unbounded() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    /// Parse a single bracketed range.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();

        let lower_inclusive = match trimmed.chars().next() {
            Some('[') => true,
            Some('(') => false,
            _ => return Err(Error::invalid_range(text, "expected '[' or '('")),
        };
        let upper_inclusive = match trimmed.chars().last() {
            Some(']') if trimmed.len() > 1 => true,
            Some(')') if trimmed.len() > 1 => false,
            _ => return Err(Error::invalid_range(text, "expected ']' or ')'")),
        };

        let inner = &trimmed[1..trimmed.len() - 1];
        if inner.contains(['[', ']', '(', ')']) {
            return Err(Error::invalid_range(text, "unexpected bracket inside range"));
        }

        match inner.split_once(',') {
            Some((lower, upper)) => {
                if upper.contains(',') {
                    return Err(Error::invalid_range(text, "too many bounds"));
                }
                let lower = lower.trim();
                let upper = upper.trim();
                Self::new(
                    (!lower.is_empty()).then(|| Bound {
                        version: Version::new(lower),
                        inclusive: lower_inclusive,
                    }),
                    (!upper.is_empty()).then(|| Bound {
                        version: Version::new(upper),
                        inclusive: upper_inclusive,
                    }),
                )
                .map_err(|e| match e {
                    Error::InvalidVersionRange { reason, .. } => Error::invalid_range(text, reason),
                    other => other,
                })
            }
            None => {
                let version = inner.trim();
                if version.is_empty() {
                    return Err(Error::invalid_range(text, "empty range"));
                }
                if !(lower_inclusive && upper_inclusive) {
                    return Err(Error::invalid_range(
                        text,
                        "a single-version range must use '[' and ']'",
                    ));
                }
                Ok(Self::exact(Version::new(version)))
            }
        }
    }

    pub fn lower(&self) -> Option<&Bound> {
        self.lower.as_ref()
    }

    pub fn upper(&self) -> Option<&Bound> {
        self.upper.as_ref()
    }

    /// Whether this range holds exactly one version.
    pub fn is_exact(&self) -> bool {
        matches!((&self.lower, &self.upper), (Some(l), Some(u)) if l.inclusive && u.inclusive && l.version == u.version)
    }

    /// Whether `version` lies inside the range.
    pub fn contains(&self, version: &Version) -> bool {
        let above_lower = match &self.lower {
            None => true,
            Some(b) if b.inclusive => version >= &b.version,
            Some(b) => version > &b.version,
        };
        let below_upper = match &self.upper {
            None => true,
            Some(b) if b.inclusive => version <= &b.version,
            Some(b) => version < &b.version,
        };
        above_lower && below_upper
    }

    /// The tightest range contained in both, or `None` when they are disjoint.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let lower = tighter(self.lower.as_ref(), other.lower.as_ref(), |a, b| a > b);
        let upper = tighter(self.upper.as_ref(), other.upper.as_ref(), |a, b| a < b);

        if let (Some(l), Some(u)) = (&lower, &upper) {
            let empty = l.version > u.version
                || (l.version == u.version && !(l.inclusive && u.inclusive));
            if empty {
                return None;
            }
        }
        Some(Self { lower, upper })
    }

    /// Whether at least one version satisfies both ranges.
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.intersect(other).is_some()
    }
}

/// Pick the more restrictive of two bounds on the same side.
///
/// `stricter(a, b)` is true when `a` restricts more than `b`. On equal
/// versions the exclusive bound wins.
fn tighter(
    a: Option<&Bound>,
    b: Option<&Bound>,
    stricter: impl Fn(&Version, &Version) -> bool,
) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => {
            if x.version == y.version {
                Some(Bound {
                    version: x.version.clone(),
                    inclusive: x.inclusive && y.inclusive,
                })
            } else if stricter(&x.version, &y.version) {
                Some(x.clone())
            } else {
                Some(y.clone())
            }
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exact() {
            if let Some(lower) = &self.lower {
                return write!(f, "[{}]", lower.version);
            }
        }

        match &self.lower {
            Some(b) => write!(f, "{}{}", if b.inclusive { '[' } else { '(' }, b.version)?,
            None => f.write_str("(")?,
        }
        f.write_str(",")?;
        match &self.upper {
            Some(b) => write!(f, "{}{}", b.version, if b.inclusive { ']' } else { ')' }),
            None => f.write_str(")"),
        }
    }
}
