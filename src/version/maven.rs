//! Maven version ordering and range syntax.
//!
//! Versions split on `.`, `-` and `_` into components. Each component sits
//! on an axis (`alpha < beta < milestone < rc < snapshot < sp < release`),
//! unknown qualifiers sort after everything, and missing trailing components
//! compare as `0`.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

use super::{Version, VersionError, VersionRange, VersionResult};
use crate::parser::types::Ecosystem;

/// One dot-, dash- or underscore-separated piece of a Maven version.
///
/// Equality follows the ordering, so `0` and `final` are equal.
#[derive(Debug, Clone)]
pub enum Component {
    Alpha(u64),
    Beta(u64),
    Milestone(u64),
    Rc(u64),
    Snapshot,
    SecurityPatch,
    Number(u64),
    Final,
    Unknown(String),
}

impl Component {
    fn parse(part: &str) -> Result<Self, String> {
        if part.is_empty() {
            return Err("empty version component".to_string());
        }
        if part.bytes().all(|b| b.is_ascii_digit()) {
            return part
                .parse()
                .map(Component::Number)
                .map_err(|_| format!("component '{}' is too large", part));
        }

        let upper = part.to_ascii_uppercase();
        let numbered = |prefix: &str, make: fn(u64) -> Component| -> Option<Component> {
            let rest = upper.strip_prefix(prefix)?;
            if rest.is_empty() {
                return Some(make(0));
            }
            rest.parse().ok().map(make)
        };

        let known = numbered("ALPHA", Component::Alpha)
            .or_else(|| numbered("A", Component::Alpha))
            .or_else(|| numbered("BETA", Component::Beta))
            .or_else(|| numbered("B", Component::Beta))
            .or_else(|| numbered("MILESTONE", Component::Milestone))
            .or_else(|| numbered("M", Component::Milestone))
            .or_else(|| numbered("RC", Component::Rc))
            .or_else(|| match upper.as_str() {
                "SNAPSHOT" => Some(Component::Snapshot),
                "FINAL" | "RELEASE" | "GA" => Some(Component::Final),
                "SP" | "SEC" => Some(Component::SecurityPatch),
                _ => None,
            });

        Ok(known.unwrap_or_else(|| Component::Unknown(part.to_string())))
    }

    fn rank(&self) -> u8 {
        match self {
            Component::Alpha(_) => 1,
            Component::Beta(_) => 2,
            Component::Milestone(_) => 3,
            Component::Rc(_) => 4,
            Component::Snapshot => 5,
            Component::SecurityPatch => 6,
            Component::Number(_) | Component::Final => 7,
            Component::Unknown(_) => 99,
        }
    }

    fn value(&self) -> u64 {
        match self {
            Component::Alpha(n)
            | Component::Beta(n)
            | Component::Milestone(n)
            | Component::Rc(n)
            | Component::Number(n) => *n,
            _ => 0,
        }
    }

    fn is_prerelease(&self) -> bool {
        matches!(
            self,
            Component::Alpha(_) | Component::Beta(_) | Component::Milestone(_) | Component::Rc(_) | Component::Snapshot
        )
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Component::Unknown(a), Component::Unknown(b)) => a.cmp(b),
            _ => self
                .rank()
                .cmp(&other.rank())
                .then_with(|| self.value().cmp(&other.value())),
        }
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Component {}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Number(n) => write!(f, "{}", n),
            Component::Alpha(0) => f.write_str("alpha"),
            Component::Alpha(n) => write!(f, "alpha{}", n),
            Component::Beta(0) => f.write_str("beta"),
            Component::Beta(n) => write!(f, "beta{}", n),
            Component::Milestone(n) => write!(f, "M{}", n),
            Component::Rc(0) => f.write_str("RC"),
            Component::Rc(n) => write!(f, "RC{}", n),
            Component::Snapshot => f.write_str("SNAPSHOT"),
            Component::Final => f.write_str("FINAL"),
            Component::SecurityPatch => f.write_str("SP"),
            Component::Unknown(s) => f.write_str(s),
        }
    }
}

/// A parsed Maven version.
#[derive(Debug, Clone)]
pub struct MavenVersion {
    components: Vec<Component>,
}

impl MavenVersion {
    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        if input.is_empty() {
            return Err("empty version".to_string());
        }
        if input.contains(char::is_whitespace) {
            return Err("whitespace inside version".to_string());
        }
        let components = input
            .split(['.', '-', '_'])
            .map(Component::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Returns true if any component is a pre-release qualifier.
    pub fn is_prerelease(&self) -> bool {
        self.components.iter().any(Component::is_prerelease)
    }

    /// Returns true for `-SNAPSHOT` builds.
    pub fn is_snapshot(&self) -> bool {
        matches!(self.components.last(), Some(Component::Snapshot))
    }
}

impl Ord for MavenVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let zero = Component::Number(0);
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).unwrap_or(&zero);
            let b = other.components.get(i).unwrap_or(&zero);
            match a.cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for MavenVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MavenVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MavenVersion {}

impl fmt::Display for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

fn maven(input: &str, text: &str) -> VersionResult<Version> {
    MavenVersion::parse(text)
        .map(Version::Maven)
        .map_err(|reason| VersionError::range(Ecosystem::Maven, input, reason))
}

/// Gradle dynamic version `1.2.+`: everything starting with the prefix.
fn parse_prefix(input: &str, prefix: &str) -> VersionResult<VersionRange> {
    let prefix = prefix.trim_end_matches(['.', '-', '_']);
    if prefix.is_empty() {
        return Ok(VersionRange::any());
    }
    let lower = MavenVersion::parse(prefix).map_err(|reason| VersionError::range(Ecosystem::Maven, input, reason))?;
    let mut upper = lower.clone();
    match upper.components.last_mut() {
        Some(Component::Number(n)) => {
            *n = n.checked_add(1).ok_or_else(|| {
                VersionError::range(Ecosystem::Maven, input, "dynamic version prefix is too large to bound")
            })?;
        }
        _ => {
            return Err(VersionError::range(
                Ecosystem::Maven,
                input,
                "dynamic version prefix must end in a number",
            ))
        }
    }
    // `1.2.alpha` still belongs to `1.2.+`, so start at the lowest qualifier
    let mut floor = lower.components;
    floor.push(Component::Alpha(0));
    let mut ceiling = upper.components;
    ceiling.push(Component::Alpha(0));
    Ok(VersionRange::between(
        Bound::Included(Version::Maven(MavenVersion { components: floor })),
        Bound::Excluded(Version::Maven(MavenVersion { components: ceiling })),
    ))
}

fn parse_bracketed(input: &str, body: &str, open: char, close: char) -> VersionResult<VersionRange> {
    let body = body.trim();
    match body.split_once(',') {
        None => {
            if open != '[' || close != ']' {
                return Err(VersionError::range(Ecosystem::Maven, input, "single-version range must use []"));
            }
            Ok(VersionRange::exact(maven(input, body)?))
        }
        Some((low, high)) => {
            let (low, high) = (low.trim(), high.trim());
            let lower = match (low.is_empty(), open) {
                (true, _) => Bound::Unbounded,
                (false, '[') => Bound::Included(maven(input, low)?),
                (false, _) => Bound::Excluded(maven(input, low)?),
            };
            let upper = match (high.is_empty(), close) {
                (true, _) => Bound::Unbounded,
                (false, ']') => Bound::Included(maven(input, high)?),
                (false, _) => Bound::Excluded(maven(input, high)?),
            };
            Ok(VersionRange::between(lower, upper))
        }
    }
}

/// Parses a Maven / Gradle version requirement.
///
/// Supported forms:
///
/// - bare version `1.2.3` (a soft requirement, treated as a pin)
/// - Gradle strict pin `1.2.3!!`
/// - ranges `[1.0,2.0)`, `(,1.5]`, `[1.0]` and unions `[1,2),[3,4)`
/// - dynamic versions `1.2.+`, `+`, `latest.release`
pub fn parse_range(input: &str) -> VersionResult<Option<VersionRange>> {
    let spec = input.trim();
    if spec.is_empty() || spec == "+" || spec.starts_with("latest.") {
        return Ok(Some(VersionRange::any()));
    }

    if let Some(prefix) = spec.strip_suffix('+') {
        return parse_prefix(spec, prefix).map(Some);
    }

    if !spec.starts_with(['[', '(']) {
        let pinned = spec.strip_suffix("!!").unwrap_or(spec);
        return Ok(Some(VersionRange::exact(maven(spec, pinned)?)));
    }

    let mut range = VersionRange::empty();
    let mut rest = spec;
    while !rest.is_empty() {
        let mut chars = rest.chars();
        let open = chars.next().unwrap_or(' ');
        if !matches!(open, '[' | '(') {
            return Err(VersionError::range(Ecosystem::Maven, spec, "expected '[' or '('"));
        }
        let Some(end) = rest.find([']', ')']) else {
            return Err(VersionError::range(Ecosystem::Maven, spec, "unterminated range"));
        };
        let close = rest[end..].chars().next().unwrap_or(')');
        range = range.union(parse_bracketed(spec, &rest[1..end], open, close)?);

        rest = rest[end + 1..].trim_start();
        if let Some(after) = rest.strip_prefix(',') {
            rest = after.trim_start();
        } else if !rest.is_empty() {
            return Err(VersionError::range(Ecosystem::Maven, spec, "expected ',' between ranges"));
        }
    }
    Ok(Some(range))
}
