//! Version ranges as unions of intervals.
//!
//! Every ecosystem's range syntax normalizes into [`VersionRange`], which
//! supports containment, intersection and "maximum satisfying" queries.

use std::fmt;
use std::ops::Bound;

use super::{Comparison, Version};

/// A contiguous set of versions between two bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    lower: Bound<Version>,
    upper: Bound<Version>,
}

impl Interval {
    pub fn new(lower: Bound<Version>, upper: Bound<Version>) -> Self {
        Self { lower, upper }
    }

    /// The interval containing every version.
    pub fn full() -> Self {
        Self::new(Bound::Unbounded, Bound::Unbounded)
    }

    /// The interval containing exactly `version`.
    pub fn exact(version: Version) -> Self {
        Self::new(Bound::Included(version.clone()), Bound::Included(version))
    }

    pub fn lower(&self) -> &Bound<Version> {
        &self.lower
    }

    pub fn upper(&self) -> &Bound<Version> {
        &self.upper
    }

    /// Returns true if `version` lies within both bounds.
    pub fn contains(&self, version: &Version) -> bool {
        let above = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(l) => matches!(version.compare(l), Comparison::Greater | Comparison::Equal),
            Bound::Excluded(l) => version.compare(l) == Comparison::Greater,
        };
        let below = match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(u) => matches!(version.compare(u), Comparison::Less | Comparison::Equal),
            Bound::Excluded(u) => version.compare(u) == Comparison::Less,
        };
        above && below
    }

    /// Returns true if no version can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
            (lower, upper) => {
                let (Some(l), Some(u)) = (bound_value(lower), bound_value(upper)) else {
                    return false;
                };
                match l.compare(u) {
                    Comparison::Greater => true,
                    Comparison::Equal => {
                        !(matches!(lower, Bound::Included(_)) && matches!(upper, Bound::Included(_)))
                    }
                    Comparison::Less | Comparison::Incomparable => false,
                }
            }
        }
    }

    /// Returns true if both bounds are open.
    pub fn is_full(&self) -> bool {
        matches!((&self.lower, &self.upper), (Bound::Unbounded, Bound::Unbounded))
    }

    /// The single version this interval admits, if it is a point.
    pub fn as_exact(&self) -> Option<&Version> {
        match (&self.lower, &self.upper) {
            (Bound::Included(l), Bound::Included(u)) if l.compare(u) == Comparison::Equal => Some(l),
            _ => None,
        }
    }

    /// Intersects two intervals; `None` when the result is empty.
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let interval = Interval::new(
            tighter_lower(&self.lower, &other.lower),
            tighter_upper(&self.upper, &other.upper),
        );
        if interval.is_empty() {
            None
        } else {
            Some(interval)
        }
    }
}

fn bound_value(bound: &Bound<Version>) -> Option<&Version> {
    match bound {
        Bound::Included(v) | Bound::Excluded(v) => Some(v),
        Bound::Unbounded => None,
    }
}

fn tighter_lower(a: &Bound<Version>, b: &Bound<Version>) -> Bound<Version> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        _ => {
            let (Some(va), Some(vb)) = (bound_value(a), bound_value(b)) else {
                return a.clone();
            };
            match va.compare(vb) {
                Comparison::Greater | Comparison::Incomparable => a.clone(),
                Comparison::Less => b.clone(),
                Comparison::Equal => {
                    if matches!(a, Bound::Excluded(_)) {
                        a.clone()
                    } else {
                        b.clone()
                    }
                }
            }
        }
    }
}

fn tighter_upper(a: &Bound<Version>, b: &Bound<Version>) -> Bound<Version> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        _ => {
            let (Some(va), Some(vb)) = (bound_value(a), bound_value(b)) else {
                return a.clone();
            };
            match va.compare(vb) {
                Comparison::Less | Comparison::Incomparable => a.clone(),
                Comparison::Greater => b.clone(),
                Comparison::Equal => {
                    if matches!(a, Bound::Excluded(_)) {
                        a.clone()
                    } else {
                        b.clone()
                    }
                }
            }
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_full() {
            return f.write_str("*");
        }
        if let Some(v) = self.as_exact() {
            return write!(f, "={}", v);
        }
        let mut parts = Vec::with_capacity(2);
        match &self.lower {
            Bound::Included(v) => parts.push(format!(">={}", v)),
            Bound::Excluded(v) => parts.push(format!(">{}", v)),
            Bound::Unbounded => {}
        }
        match &self.upper {
            Bound::Included(v) => parts.push(format!("<={}", v)),
            Bound::Excluded(v) => parts.push(format!("<{}", v)),
            Bound::Unbounded => {}
        }
        f.write_str(&parts.join(", "))
    }
}

/// A union of version intervals.
///
/// An empty union matches nothing; a union containing the full interval
/// matches everything.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRange {
    intervals: Vec<Interval>,
}

impl VersionRange {
    /// A range matching every version.
    pub fn any() -> Self {
        Self {
            intervals: vec![Interval::full()],
        }
    }

    /// A range matching no version.
    pub fn empty() -> Self {
        Self { intervals: Vec::new() }
    }

    /// A range matching exactly `version`.
    pub fn exact(version: Version) -> Self {
        Self::from_interval(Interval::exact(version))
    }

    /// A range made of a single interval (empty if the interval is).
    pub fn from_interval(interval: Interval) -> Self {
        if interval.is_empty() {
            Self::empty()
        } else {
            Self {
                intervals: vec![interval],
            }
        }
    }

    /// Shorthand for an interval built from two bounds.
    pub fn between(lower: Bound<Version>, upper: Bound<Version>) -> Self {
        Self::from_interval(Interval::new(lower, upper))
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Returns true if no version satisfies the range.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Returns true if every version satisfies the range.
    pub fn is_any(&self) -> bool {
        self.intervals.iter().any(Interval::is_full)
    }

    /// The single version the range admits, if it is a pin.
    pub fn as_exact(&self) -> Option<&Version> {
        match self.intervals.as_slice() {
            [only] => only.as_exact(),
            _ => None,
        }
    }

    /// Returns true if `version` satisfies any interval.
    pub fn contains(&self, version: &Version) -> bool {
        self.intervals.iter().any(|i| i.contains(version))
    }

    /// Versions satisfying either range.
    pub fn union(mut self, other: VersionRange) -> Self {
        self.intervals.extend(other.intervals);
        self
    }

    /// Versions satisfying both ranges.
    ///
    /// # Example
    ///
    /// ```
    /// use deplens::parser::types::Ecosystem;
    /// use deplens::version::{Requirement, Version};
    ///
    /// let a = Requirement::parse(Ecosystem::Npm, "^1.2.0").unwrap();
    /// let b = Requirement::parse(Ecosystem::Npm, "<1.4.0").unwrap();
    /// let both = a.range().unwrap().intersect(b.range().unwrap());
    /// assert!(both.contains(&Version::parse(Ecosystem::Npm, "1.3.9").unwrap()));
    /// assert!(!both.contains(&Version::parse(Ecosystem::Npm, "1.4.0").unwrap()));
    /// ```
    pub fn intersect(&self, other: &VersionRange) -> Self {
        let intervals = self
            .intervals
            .iter()
            .flat_map(|a| other.intervals.iter().filter_map(move |b| a.intersect(b)))
            .collect();
        Self { intervals }
    }

    /// The greatest version in `versions` that satisfies the range.
    pub fn max_satisfying<'a, I>(&self, versions: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions
            .into_iter()
            .filter(|v| self.contains(v))
            .fold(None, |best: Option<&'a Version>, v| match best {
                Some(b) if v.compare(b) != Comparison::Greater => Some(b),
                _ => Some(v),
            })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return f.write_str("<none>");
        }
        let parts: Vec<String> = self.intervals.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(" || "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::Ecosystem;

    fn v(s: &str) -> Version {
        Version::parse(Ecosystem::Cargo, s).unwrap()
    }

    #[test]
    fn test_any_contains_everything() {
        let range = VersionRange::any();
        assert!(range.contains(&v("0.0.1")));
        assert!(range.contains(&v("99.0.0")));
        assert!(range.is_any());
    }

    #[test]
    fn test_empty_contains_nothing() {
        let range = VersionRange::empty();
        assert!(!range.contains(&v("1.0.0")));
        assert!(range.is_empty());
        assert_eq!(range.to_string(), "<none>");
    }

    #[test]
    fn test_interval_bounds() {
        let range = VersionRange::between(Bound::Included(v("1.0.0")), Bound::Excluded(v("2.0.0")));
        assert!(range.contains(&v("1.0.0")));
        assert!(range.contains(&v("1.9.9")));
        assert!(!range.contains(&v("2.0.0")));
        assert!(!range.contains(&v("0.9.0")));
        assert_eq!(range.to_string(), ">=1.0.0, <2.0.0");
    }

    #[test]
    fn test_degenerate_interval_is_empty() {
        let range = VersionRange::between(Bound::Included(v("2.0.0")), Bound::Excluded(v("2.0.0")));
        assert!(range.is_empty());
        let range = VersionRange::between(Bound::Included(v("3.0.0")), Bound::Included(v("2.0.0")));
        assert!(range.is_empty());
    }

    #[test]
    fn test_exact() {
        let range = VersionRange::exact(v("1.2.3"));
        assert_eq!(range.as_exact().unwrap().to_string(), "1.2.3");
        assert_eq!(range.to_string(), "=1.2.3");
    }

    #[test]
    fn test_intersect_overlapping() {
        let a = VersionRange::between(Bound::Included(v("1.0.0")), Bound::Excluded(v("2.0.0")));
        let b = VersionRange::between(Bound::Excluded(v("1.5.0")), Bound::Unbounded);
        let both = a.intersect(&b);
        assert!(!both.contains(&v("1.5.0")));
        assert!(both.contains(&v("1.5.1")));
        assert!(!both.contains(&v("2.0.0")));
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let a = VersionRange::between(Bound::Unbounded, Bound::Excluded(v("1.0.0")));
        let b = VersionRange::between(Bound::Included(v("1.0.0")), Bound::Unbounded);
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn test_intersect_equal_bounds_prefers_exclusive() {
        let a = VersionRange::between(Bound::Included(v("1.0.0")), Bound::Included(v("2.0.0")));
        let b = VersionRange::between(Bound::Excluded(v("1.0.0")), Bound::Excluded(v("2.0.0")));
        let both = a.intersect(&b);
        assert!(!both.contains(&v("1.0.0")));
        assert!(!both.contains(&v("2.0.0")));
    }

    #[test]
    fn test_union() {
        let a = VersionRange::exact(v("1.0.0"));
        let b = VersionRange::exact(v("3.0.0"));
        let either = a.union(b);
        assert!(either.contains(&v("1.0.0")));
        assert!(either.contains(&v("3.0.0")));
        assert!(!either.contains(&v("2.0.0")));
        assert_eq!(either.to_string(), "=1.0.0 || =3.0.0");
    }

    #[test]
    fn test_max_satisfying() {
        let versions = vec![v("1.0.0"), v("1.4.2"), v("1.3.0"), v("2.0.0")];
        let range = VersionRange::between(Bound::Included(v("1.0.0")), Bound::Excluded(v("2.0.0")));
        assert_eq!(range.max_satisfying(&versions).unwrap().to_string(), "1.4.2");
        assert!(VersionRange::empty().max_satisfying(&versions).is_none());
    }
}
