//! Unions of version ranges.

use std::fmt;

use crate::error::{Error, Result};
use crate::range::VersionRange;
use crate::version::Version;

/// A non-empty, ordered list of ranges. A version matches the collection if
/// any member range contains it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRangeCollection {
    ranges: Vec<VersionRange>,
}

impl VersionRangeCollection {
    /// Build a collection from ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersionRange`] when `ranges` is empty.
    pub fn new(ranges: Vec<VersionRange>) -> Result<Self> {
        if ranges.is_empty() {
            return Err(Error::invalid_range("", "a range collection cannot be empty"));
        }
        Ok(Self { ranges })
    }

    /// Parse comma-joined ranges, e.g. `[1.0,2.0),[3.0,)`.
    ///
    /// Commas inside brackets belong to a range; commas between brackets
    /// separate ranges.
    pub fn parse(text: &str) -> Result<Self> {
        let mut ranges = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;

        for (i, c) in text.char_indices() {
            match c {
                '[' | '(' => depth += 1,
                ']' | ')' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| Error::invalid_range(text, "unbalanced brackets"))?;
                }
                ',' if depth == 0 => {
                    ranges.push(Self::parse_member(text, &text[start..i])?);
                    start = i + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(Error::invalid_range(text, "unbalanced brackets"));
        }
        ranges.push(Self::parse_member(text, &text[start..])?);

        Ok(Self { ranges })
    }

    fn parse_member(text: &str, member: &str) -> Result<VersionRange> {
        if member.trim().is_empty() {
            return Err(Error::invalid_range(text, "empty range in collection"));
        }
        VersionRange::parse(member).map_err(|e| match e {
            Error::InvalidVersionRange { reason, .. } => Error::invalid_range(text, reason),
            other => other,
        })
    }

    pub fn ranges(&self) -> &[VersionRange] {
        &self.ranges
    }

    /// Whether any member range contains `version`.
    pub fn contains(&self, version: &Version) -> bool {
        self.ranges.iter().any(|r| r.contains(version))
    }

    /// Every non-empty pairwise intersection, in order. `None` when all pairs
    /// are disjoint.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let mut ranges: Vec<VersionRange> = Vec::new();
        for a in &self.ranges {
            for b in &other.ranges {
                if let Some(r) = a.intersect(b) {
                    if !ranges.contains(&r) {
                        ranges.push(r);
                    }
                }
            }
        }
        (!ranges.is_empty()).then_some(Self { ranges })
    }

    /// Whether some version matches both collections.
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.ranges
            .iter()
            .any(|a| other.ranges.iter().any(|b| a.is_compatible(b)))
    }
}

impl From<VersionRange> for VersionRangeCollection {
    fn from(range: VersionRange) -> Self {
        Self {
            ranges: vec![range],
        }
    }
}

impl fmt::Display for VersionRangeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}
