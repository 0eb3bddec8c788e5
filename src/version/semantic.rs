//! Semantic versions and the npm / Cargo range grammars.
//!
//! Both ecosystems share the `semver` crate for ordering. Parsing is a bit
//! more lenient than `semver::Version::parse`: partial versions such as
//! `1` or `1.2` are padded with zeros and a leading `v` or `=` is ignored.

use std::ops::Bound;

use semver::Prerelease;

use super::{Version, VersionError, VersionRange, VersionResult};
use crate::parser::types::Ecosystem;

/// Operators understood by the comparator parser, longest first.
const OPERATORS: &[&str] = &[">=", "<=", "~>", ">", "<", "=", "^", "~"];

/// A version with optional trailing components (`1`, `1.2`, `1.x`).
#[derive(Debug, Clone, PartialEq)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
    wildcard: bool,
}

impl Partial {
    fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        let input = input.strip_prefix(['v', 'V']).unwrap_or(input);
        let input = input.trim_start_matches('=').trim();

        let without_build = input.split_once('+').map_or(input, |(core, _)| core);
        let (core, pre) = match without_build.split_once('-') {
            Some((core, pre)) => (core, pre),
            None => (without_build, ""),
        };

        let mut numbers = [None; 3];
        let mut wildcard_seen = false;
        for (i, part) in core.split('.').enumerate() {
            if i >= 3 {
                return Err("more than three numeric components".to_string());
            }
            if part.is_empty() && core.is_empty() {
                break;
            }
            if matches!(part, "x" | "X" | "*") {
                wildcard_seen = true;
                continue;
            }
            if wildcard_seen {
                continue;
            }
            let n = part
                .parse::<u64>()
                .map_err(|_| format!("'{}' is not a version number", part))?;
            numbers[i] = Some(n);
        }

        let pre = if pre.is_empty() {
            Prerelease::EMPTY
        } else {
            if numbers.iter().any(Option::is_none) {
                return Err("pre-release tag on a partial version".to_string());
            }
            Prerelease::new(pre).map_err(|e| e.to_string())?
        };

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            pre,
            wildcard: wildcard_seen || core.is_empty(),
        })
    }

    fn is_full(&self) -> bool {
        self.major.is_some() && self.minor.is_some() && self.patch.is_some()
    }

    /// The smallest version matching this partial.
    fn floor(&self) -> semver::Version {
        let mut v = semver::Version::new(
            self.major.unwrap_or(0),
            self.minor.unwrap_or(0),
            self.patch.unwrap_or(0),
        );
        v.pre = self.pre.clone();
        v
    }

    /// The first release after every version matching this partial.
    fn next(&self) -> Result<Option<semver::Version>, String> {
        Ok(match (self.major, self.minor, self.patch) {
            (None, _, _) => None,
            (Some(major), None, _) => Some(semver::Version::new(bump(major)?, 0, 0)),
            (Some(major), Some(minor), None) => Some(semver::Version::new(major, bump(minor)?, 0)),
            (Some(major), Some(minor), Some(patch)) => Some(semver::Version::new(major, minor, bump(patch)?)),
        })
    }
}

fn bump(n: u64) -> Result<u64, String> {
    n.checked_add(1)
        .ok_or_else(|| format!("version component {} is too large to bound a range", n))
}

/// Marks an exclusive upper bound so pre-releases of that version stay outside.
fn below(mut version: semver::Version) -> Bound<Version> {
    if version.pre.is_empty() {
        version.pre = Prerelease::new("0").unwrap_or(Prerelease::EMPTY);
    }
    Bound::Excluded(Version::Semver(version))
}

fn included(version: semver::Version) -> Bound<Version> {
    Bound::Included(Version::Semver(version))
}

/// Parses a semantic version, padding partial input.
pub fn parse_version(ecosystem: Ecosystem, input: &str) -> VersionResult<semver::Version> {
    let partial = Partial::parse(input).map_err(|reason| VersionError::version(ecosystem, input, reason))?;
    if partial.wildcard || partial.major.is_none() {
        return Err(VersionError::version(ecosystem, input, "wildcards are not versions"));
    }
    Ok(partial.floor())
}

fn wildcard(p: &Partial) -> Result<VersionRange, String> {
    if p.is_full() {
        return Ok(VersionRange::exact(Version::Semver(p.floor())));
    }
    Ok(match p.next()? {
        Some(next) => VersionRange::between(included(p.floor()), below(next)),
        None => VersionRange::any(),
    })
}

fn caret(p: &Partial) -> Result<VersionRange, String> {
    let Some(major) = p.major else {
        return Ok(VersionRange::any());
    };
    let upper = match (major, p.minor, p.patch) {
        (0, Some(0), Some(patch)) => semver::Version::new(0, 0, bump(patch)?),
        (0, Some(minor), _) => semver::Version::new(0, bump(minor)?, 0),
        _ => semver::Version::new(bump(major)?, 0, 0),
    };
    Ok(VersionRange::between(included(p.floor()), below(upper)))
}

fn tilde(p: &Partial) -> Result<VersionRange, String> {
    let Some(major) = p.major else {
        return Ok(VersionRange::any());
    };
    let upper = match p.minor {
        Some(minor) => semver::Version::new(major, bump(minor)?, 0),
        None => semver::Version::new(bump(major)?, 0, 0),
    };
    Ok(VersionRange::between(included(p.floor()), below(upper)))
}

fn comparator(op: &str, p: &Partial) -> Result<VersionRange, String> {
    let range = match op {
        "" | "=" => return wildcard(p),
        "^" => return caret(p),
        "~" | "~>" => return tilde(p),
        ">=" => match p.major {
            Some(_) => VersionRange::between(included(p.floor()), Bound::Unbounded),
            None => VersionRange::any(),
        },
        ">" => {
            if p.is_full() {
                VersionRange::between(Bound::Excluded(Version::Semver(p.floor())), Bound::Unbounded)
            } else {
                match p.next()? {
                    Some(next) => VersionRange::between(included(next), Bound::Unbounded),
                    None => VersionRange::empty(),
                }
            }
        }
        "<" => match p.major {
            Some(_) if p.is_full() => {
                VersionRange::between(Bound::Unbounded, Bound::Excluded(Version::Semver(p.floor())))
            }
            Some(_) => VersionRange::between(Bound::Unbounded, below(p.floor())),
            None => VersionRange::empty(),
        },
        "<=" => {
            if p.is_full() {
                VersionRange::between(Bound::Unbounded, included(p.floor()))
            } else {
                match p.next()? {
                    Some(next) => VersionRange::between(Bound::Unbounded, below(next)),
                    None => VersionRange::any(),
                }
            }
        }
        _ => VersionRange::empty(),
    };
    Ok(range)
}

/// Splits a comparator token into its operator and version text.
fn split_operator(token: &str) -> Result<(&str, &str), String> {
    let op_len = token
        .chars()
        .take_while(|c| matches!(c, '<' | '>' | '=' | '~' | '^'))
        .count();
    let (op, rest) = token.split_at(op_len);
    if op.is_empty() || OPERATORS.contains(&op) {
        Ok((op, rest.trim()))
    } else {
        Err(format!("unknown operator '{}'", op))
    }
}

fn parse_comparator(
    ecosystem: Ecosystem,
    input: &str,
    token: &str,
    default_op: &str,
) -> VersionResult<VersionRange> {
    let (op, version) = split_operator(token).map_err(|reason| VersionError::range(ecosystem, input, reason))?;
    if version.is_empty() {
        return Err(VersionError::range(ecosystem, input, format!("operator '{}' without a version", op)));
    }
    let partial = Partial::parse(version).map_err(|reason| VersionError::range(ecosystem, input, reason))?;
    let op = if op.is_empty() { default_op } else { op };
    comparator(op, &partial).map_err(|reason| VersionError::range(ecosystem, input, reason))
}

/// Returns true for npm specs that name something other than a registry version.
fn is_npm_unversioned(spec: &str) -> bool {
    if spec.contains(':') || spec.contains('/') {
        return true;
    }
    let Some(first) = spec.chars().next() else {
        return false;
    };
    // dist-tags such as `next` or `beta`; `v1.2.3` and `x` are versions
    first.is_ascii_alphabetic()
        && !matches!(first, 'x' | 'X')
        && !(matches!(first, 'v' | 'V') && spec[1..].starts_with(|c: char| c.is_ascii_digit()))
}

fn parse_npm_alternative(input: &str, alternative: &str) -> VersionResult<VersionRange> {
    let alternative = alternative.trim();
    if alternative.is_empty() {
        return Ok(VersionRange::any());
    }

    if let Some((from, to)) = alternative.split_once(" - ") {
        let from = Partial::parse(from).map_err(|reason| VersionError::range(Ecosystem::Npm, input, reason))?;
        let to = Partial::parse(to).map_err(|reason| VersionError::range(Ecosystem::Npm, input, reason))?;
        let lower = match from.major {
            Some(_) => included(from.floor()),
            None => Bound::Unbounded,
        };
        let upper = if to.is_full() {
            included(to.floor())
        } else {
            match to.next().map_err(|reason| VersionError::range(Ecosystem::Npm, input, reason))? {
                Some(next) => below(next),
                None => Bound::Unbounded,
            }
        };
        return Ok(VersionRange::between(lower, upper));
    }

    // `>= 1.2.3` is written with a space after the operator surprisingly often
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for word in alternative.split_whitespace() {
        if word.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op = Some(word);
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(format!("{}{}", op, word)),
            None => tokens.push(word.to_string()),
        }
    }
    if let Some(op) = pending_op {
        return Err(VersionError::range(Ecosystem::Npm, input, format!("operator '{}' without a version", op)));
    }

    let mut range = VersionRange::any();
    for token in &tokens {
        range = range.intersect(&parse_comparator(Ecosystem::Npm, input, token, "=")?);
    }
    Ok(range)
}

/// Parses an npm range (`^1.2.0`, `>=1 <2 || 3.x`, `1.0.0 - 2.0.0`).
///
/// Returns `Ok(None)` for specs that are not registry versions: git and
/// file URLs, `workspace:` and `npm:` aliases, and dist-tags other than
/// `latest`.
pub fn parse_npm_range(input: &str) -> VersionResult<Option<VersionRange>> {
    let spec = input.trim();
    if spec.is_empty() || spec == "*" || spec.eq_ignore_ascii_case("latest") {
        return Ok(Some(VersionRange::any()));
    }
    if is_npm_unversioned(spec) {
        return Ok(None);
    }

    let mut range = VersionRange::empty();
    for alternative in spec.split("||") {
        range = range.union(parse_npm_alternative(spec, alternative)?);
    }
    Ok(Some(range))
}

/// Parses a Cargo version requirement (`1.0`, `>=1.2, <1.5`, `=0.3.1`).
///
/// A bare version means a caret requirement, as in Cargo itself.
pub fn parse_cargo_range(input: &str) -> VersionResult<Option<VersionRange>> {
    let spec = input.trim();
    if spec.is_empty() || spec == "*" {
        return Ok(Some(VersionRange::any()));
    }

    let mut range = VersionRange::any();
    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(VersionError::range(Ecosystem::Cargo, input, "empty comparator"));
        }
        range = range.intersect(&parse_comparator(Ecosystem::Cargo, spec, token, "^")?);
    }
    Ok(Some(range))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(Ecosystem::Npm, s).unwrap()
    }

    fn npm(s: &str) -> VersionRange {
        parse_npm_range(s).unwrap().unwrap()
    }

    fn cargo(s: &str) -> VersionRange {
        parse_cargo_range(s).unwrap().unwrap()
    }

    #[test]
    fn test_parse_version_padding() {
        assert_eq!(parse_version(Ecosystem::Npm, "1").unwrap(), semver::Version::new(1, 0, 0));
        assert_eq!(parse_version(Ecosystem::Npm, "v2.3").unwrap(), semver::Version::new(2, 3, 0));
        assert!(parse_version(Ecosystem::Npm, "1.x").is_err());
        assert!(parse_version(Ecosystem::Npm, "1.2.3.4").is_err());
        assert!(parse_version(Ecosystem::Npm, "banana").is_err());
    }

    #[test]
    fn test_parse_version_prerelease() {
        let parsed = parse_version(Ecosystem::Cargo, "1.0.0-beta.2").unwrap();
        assert_eq!(parsed.pre.as_str(), "beta.2");
    }

    #[test]
    fn test_npm_caret() {
        let range = npm("^1.2.0");
        assert!(range.contains(&v("1.2.0")));
        assert!(range.contains(&v("1.9.9")));
        assert!(!range.contains(&v("2.0.0")));
        assert!(!range.contains(&v("2.0.0-rc.1")));
        assert!(!range.contains(&v("1.1.9")));
    }

    #[test]
    fn test_npm_caret_zero_major() {
        let range = npm("^0.2.3");
        assert!(range.contains(&v("0.2.9")));
        assert!(!range.contains(&v("0.3.0")));

        let range = npm("^0.0.3");
        assert!(range.contains(&v("0.0.3")));
        assert!(!range.contains(&v("0.0.4")));
    }

    #[test]
    fn test_bound_overflow_is_invalid_range() {
        let max = u64::MAX;
        for spec in [
            format!("^{}.0.0", max),
            format!("~1.{}", max),
            format!("^0.0.{}", max),
            format!("{}.x", max),
            format!(">1.{}", max),
            format!("1.0.0 - 2.{}", max),
        ] {
            let err = parse_npm_range(&spec).unwrap_err();
            assert!(matches!(err, VersionError::InvalidRange { .. }), "{}: {:?}", spec, err);
        }
        assert!(parse_cargo_range(&format!("{}", max)).is_err());

        // the largest version itself is still a valid pin and lower bound
        let exact = npm(&format!("{}.0.0", max));
        assert!(exact.contains(&v(&format!("{}.0.0", max))));
        assert!(npm(&format!(">={}.0.0", max)).contains(&v(&format!("{}.1.0", max))));
    }

    #[test]
    fn test_npm_tilde() {
        let range = npm("~1.2.3");
        assert!(range.contains(&v("1.2.9")));
        assert!(!range.contains(&v("1.3.0")));

        let range = npm("~1");
        assert!(range.contains(&v("1.9.0")));
        assert!(!range.contains(&v("2.0.0")));
    }

    #[test]
    fn test_npm_wildcards() {
        let range = npm("1.x");
        assert!(range.contains(&v("1.4.0")));
        assert!(!range.contains(&v("2.0.0")));

        let range = npm("1.2");
        assert!(range.contains(&v("1.2.7")));
        assert!(!range.contains(&v("1.3.0")));

        assert!(npm("*").is_any());
        assert!(npm("x").is_any());
    }

    #[test]
    fn test_npm_exact() {
        let range = npm("2.0.0");
        assert_eq!(range.as_exact().unwrap().to_string(), "2.0.0");
        let range = npm("=2.0.0");
        assert!(range.as_exact().is_some());
    }

    #[test]
    fn test_npm_comparator_set() {
        let range = npm(">=1.2.7 <1.3.0");
        assert!(range.contains(&v("1.2.7")));
        assert!(range.contains(&v("1.2.99")));
        assert!(!range.contains(&v("1.3.0")));

        let range = npm(">= 1.0.0 < 2");
        assert!(range.contains(&v("1.5.0")));
        assert!(!range.contains(&v("2.0.0")));
    }

    #[test]
    fn test_npm_alternatives() {
        let range = npm("1.2.7 || >=1.2.9 <2.0.0");
        assert!(range.contains(&v("1.2.7")));
        assert!(!range.contains(&v("1.2.8")));
        assert!(range.contains(&v("1.2.9")));
        assert!(!range.contains(&v("2.0.0")));
    }

    #[test]
    fn test_npm_hyphen() {
        let range = npm("1.2.3 - 2.3.4");
        assert!(range.contains(&v("1.2.3")));
        assert!(range.contains(&v("2.3.4")));
        assert!(!range.contains(&v("2.3.5")));

        let range = npm("1.2 - 2.3");
        assert!(range.contains(&v("2.3.9")));
        assert!(!range.contains(&v("2.4.0")));
    }

    #[test]
    fn test_npm_partial_comparators() {
        let range = npm(">1.2");
        assert!(!range.contains(&v("1.2.9")));
        assert!(range.contains(&v("1.3.0")));

        let range = npm("<=1.2");
        assert!(range.contains(&v("1.2.9")));
        assert!(!range.contains(&v("1.3.0")));

        let range = npm("<1.2");
        assert!(range.contains(&v("1.1.9")));
        assert!(!range.contains(&v("1.2.0")));
    }

    #[test]
    fn test_npm_unversioned_specs() {
        assert!(parse_npm_range("git+https://github.com/a/b.git").unwrap().is_none());
        assert!(parse_npm_range("file:../local").unwrap().is_none());
        assert!(parse_npm_range("workspace:*").unwrap().is_none());
        assert!(parse_npm_range("user/repo").unwrap().is_none());
        assert!(parse_npm_range("next").unwrap().is_none());
        assert!(parse_npm_range("latest").unwrap().unwrap().is_any());
        assert!(parse_npm_range("v1.2.3").unwrap().is_some());
    }

    #[test]
    fn test_npm_invalid() {
        assert!(parse_npm_range(">>1.0.0").is_err());
        assert!(parse_npm_range(">=").is_err());
        assert!(parse_npm_range("1.2.3.4").is_err());
    }

    #[test]
    fn test_cargo_bare_is_caret() {
        let range = cargo("1.2");
        assert!(range.contains(&v("1.2.0")));
        assert!(range.contains(&v("1.9.0")));
        assert!(!range.contains(&v("2.0.0")));

        let range = cargo("0.3");
        assert!(range.contains(&v("0.3.5")));
        assert!(!range.contains(&v("0.4.0")));
    }

    #[test]
    fn test_cargo_exact_and_sets() {
        assert!(cargo("=1.0.3").as_exact().is_some());

        let range = cargo(">=1.2, <1.5");
        assert!(range.contains(&v("1.4.9")));
        assert!(!range.contains(&v("1.5.0")));
        assert!(!range.contains(&v("1.1.0")));

        let range = cargo("1.*");
        assert!(range.contains(&v("1.8.0")));
        assert!(!range.contains(&v("2.0.0")));
    }

    #[test]
    fn test_cargo_invalid() {
        assert!(parse_cargo_range("1.0,").is_err());
        assert!(parse_cargo_range("^^1").is_err());
    }
}
