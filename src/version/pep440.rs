//! PEP 440 versions and specifiers for PyPI.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

use super::{Version, VersionError, VersionRange, VersionResult};
use crate::parser::types::Ecosystem;

/// Pre-release phase, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreRelease {
    Alpha,
    Beta,
    Rc,
}

impl PreRelease {
    fn label(&self) -> &'static str {
        match self {
            PreRelease::Alpha => "a",
            PreRelease::Beta => "b",
            PreRelease::Rc => "rc",
        }
    }
}

/// A PEP 440 version such as `1!2.0.3rc1.post2.dev4+local`.
///
/// Local labels are kept for display but ignored by comparisons.
#[derive(Debug, Clone)]
pub struct Pep440Version {
    pub epoch: u64,
    pub release: Vec<u64>,
    pub pre: Option<(PreRelease, u64)>,
    pub post: Option<u64>,
    pub dev: Option<u64>,
    pub local: Option<String>,
}

const PRE_KEYWORDS: &[(&str, PreRelease)] = &[
    ("alpha", PreRelease::Alpha),
    ("a", PreRelease::Alpha),
    ("beta", PreRelease::Beta),
    ("b", PreRelease::Beta),
    ("preview", PreRelease::Rc),
    ("pre", PreRelease::Rc),
    ("rc", PreRelease::Rc),
    ("c", PreRelease::Rc),
];

const POST_KEYWORDS: &[&str] = &["post", "rev", "r"];

fn strip_separator(s: &str) -> &str {
    s.strip_prefix(['.', '-', '_']).unwrap_or(s)
}

/// Splits leading ASCII digits from `s`.
fn take_number(s: &str) -> (Option<u64>, &str) {
    let len = s.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return (None, s);
    }
    (s[..len].parse().ok(), &s[len..])
}

/// Reads an optional number after a keyword, allowing one separator before it.
fn take_keyword_number(s: &str) -> (u64, &str) {
    if let (Some(n), rest) = take_number(s) {
        return (n, rest);
    }
    let after_sep = strip_separator(s);
    if after_sep.len() != s.len() {
        if let (Some(n), rest) = take_number(after_sep) {
            return (n, rest);
        }
    }
    (0, s)
}

impl Pep440Version {
    /// Parses a version in any of the spellings PEP 440 normalizes.
    pub fn parse(input: &str) -> Result<Self, String> {
        let lowered = input.trim().to_ascii_lowercase();
        let s = lowered.strip_prefix('v').unwrap_or(&lowered);

        let (s, local) = match s.split_once('+') {
            Some((main, local)) => {
                if local.is_empty() || !local.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')) {
                    return Err(format!("invalid local label '{}'", local));
                }
                (main, Some(local.replace(['-', '_'], ".")))
            }
            None => (s, None),
        };

        let (epoch, mut rest) = match s.split_once('!') {
            Some((epoch, rest)) => (
                epoch.parse::<u64>().map_err(|_| format!("invalid epoch '{}'", epoch))?,
                rest,
            ),
            None => (0, s),
        };

        let mut release = Vec::new();
        loop {
            let (Some(n), after) = take_number(rest) else {
                return Err("expected a release number".to_string());
            };
            release.push(n);
            rest = after;
            match rest.strip_prefix('.') {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => rest = next,
                _ => break,
            }
        }

        let mut pre = None;
        let candidate = strip_separator(rest);
        if let Some((keyword, phase)) = PRE_KEYWORDS.iter().find(|(k, _)| candidate.starts_with(k)) {
            let (n, after) = take_keyword_number(&candidate[keyword.len()..]);
            pre = Some((*phase, n));
            rest = after;
        }

        let mut post = None;
        let candidate = strip_separator(rest);
        if let Some(keyword) = POST_KEYWORDS.iter().find(|k| candidate.starts_with(*k)) {
            let (n, after) = take_keyword_number(&candidate[keyword.len()..]);
            post = Some(n);
            rest = after;
        } else if let Some(implicit) = rest.strip_prefix('-') {
            if let (Some(n), after) = take_number(implicit) {
                post = Some(n);
                rest = after;
            }
        }

        let mut dev = None;
        let candidate = strip_separator(rest);
        if let Some(after_keyword) = candidate.strip_prefix("dev") {
            let (n, after) = take_keyword_number(after_keyword);
            dev = Some(n);
            rest = after;
        }

        if !rest.is_empty() {
            return Err(format!("unexpected trailing text '{}'", rest));
        }

        Ok(Self {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// A plain release version such as `1.2`.
    pub fn from_release(epoch: u64, release: Vec<u64>) -> Self {
        Self {
            epoch,
            release,
            pre: None,
            post: None,
            dev: None,
            local: None,
        }
    }

    /// The earliest version sharing this release (`X.dev0`).
    fn release_floor(epoch: u64, release: Vec<u64>) -> Self {
        let mut v = Self::from_release(epoch, release);
        v.dev = Some(0);
        v
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    fn pre_key(&self) -> (u8, u64) {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (0, 0),
            (Some((phase, n)), _, _) => (1 + phase as u8, n),
            (None, _, _) => (4, 0),
        }
    }

    fn dev_key(&self) -> (u8, u64) {
        match self.dev {
            Some(n) => (0, n),
            None => (1, 0),
        }
    }
}

fn cmp_release(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for Pep440Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| cmp_release(&self.release, &other.release))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
    }
}

impl PartialOrd for Pep440Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pep440Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pep440Version {}

impl fmt::Display for Pep440Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        f.write_str(&release.join("."))?;
        if let Some((phase, n)) = self.pre {
            write!(f, "{}{}", phase.label(), n)?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{}", n)?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{}", n)?;
        }
        if let Some(local) = &self.local {
            write!(f, "+{}", local)?;
        }
        Ok(())
    }
}

const SPECIFIER_OPERATORS: &[&str] = &["===", "==", "!=", "~=", "<=", ">=", "<", ">"];

fn pep(v: Pep440Version) -> Version {
    Version::Pep440(v)
}

/// Range covering every version that starts with `prefix` (`==1.2.*`).
fn prefix_bounds(input: &str, prefix: &Pep440Version) -> VersionResult<(Bound<Version>, Bound<Version>)> {
    let lower = Pep440Version::release_floor(prefix.epoch, prefix.release.clone());
    let mut next = prefix.release.clone();
    if let Some(last) = next.last_mut() {
        let bumped = last.checked_add(1).ok_or_else(|| {
            VersionError::range(Ecosystem::PyPI, input, format!("release segment {} is too large for a prefix match", last))
        })?;
        *last = bumped;
    }
    let upper = Pep440Version::release_floor(prefix.epoch, next);
    Ok((Bound::Included(pep(lower)), Bound::Excluded(pep(upper))))
}

fn parse_clause(input: &str, clause: &str) -> VersionResult<VersionRange> {
    let op = SPECIFIER_OPERATORS
        .iter()
        .find(|op| clause.starts_with(*op))
        .copied()
        .unwrap_or("");
    let text = clause[op.len()..].trim();
    if text.is_empty() {
        return Err(VersionError::range(Ecosystem::PyPI, input, format!("operator '{}' without a version", op)));
    }

    let parse = |text: &str| {
        Pep440Version::parse(text).map_err(|reason| VersionError::range(Ecosystem::PyPI, input, reason))
    };

    let wildcard = text.strip_suffix(".*");
    match (op, wildcard) {
        ("==" | "", Some(prefix)) => {
            let (lower, upper) = prefix_bounds(input, &parse(prefix)?)?;
            Ok(VersionRange::between(lower, upper))
        }
        ("!=", Some(prefix)) => {
            let (lower, upper) = prefix_bounds(input, &parse(prefix)?)?;
            let below = match lower {
                Bound::Included(v) => Bound::Excluded(v),
                other => other,
            };
            let above = match upper {
                Bound::Excluded(v) => Bound::Included(v),
                other => other,
            };
            Ok(VersionRange::between(Bound::Unbounded, below).union(VersionRange::between(above, Bound::Unbounded)))
        }
        (_, Some(_)) => Err(VersionError::range(
            Ecosystem::PyPI,
            input,
            format!("wildcard not allowed with '{}'", op),
        )),
        ("==" | "===" | "", None) => Ok(VersionRange::exact(pep(parse(text)?))),
        ("!=", None) => {
            let v = parse(text)?;
            Ok(VersionRange::between(Bound::Unbounded, Bound::Excluded(pep(v.clone())))
                .union(VersionRange::between(Bound::Excluded(pep(v)), Bound::Unbounded)))
        }
        ("~=", None) => {
            let v = parse(text)?;
            if v.release.len() < 2 {
                return Err(VersionError::range(
                    Ecosystem::PyPI,
                    input,
                    "'~=' needs at least two release components",
                ));
            }
            let prefix = Pep440Version::from_release(v.epoch, v.release[..v.release.len() - 1].to_vec());
            let (_, upper) = prefix_bounds(input, &prefix)?;
            Ok(VersionRange::between(Bound::Included(pep(v)), upper))
        }
        (">=", None) => Ok(VersionRange::between(Bound::Included(pep(parse(text)?)), Bound::Unbounded)),
        (">", None) => Ok(VersionRange::between(Bound::Excluded(pep(parse(text)?)), Bound::Unbounded)),
        ("<=", None) => Ok(VersionRange::between(Bound::Unbounded, Bound::Included(pep(parse(text)?)))),
        ("<", None) => Ok(VersionRange::between(Bound::Unbounded, Bound::Excluded(pep(parse(text)?)))),
        _ => Err(VersionError::range(Ecosystem::PyPI, input, format!("unknown operator '{}'", op))),
    }
}

/// Parses a comma-separated PEP 440 specifier set (`>=1.4,<2`, `~=2.2`).
///
/// A bare version is read as `==`. Returns `Ok(None)` for direct URL
/// references (`@ https://...`).
pub fn parse_specifiers(input: &str) -> VersionResult<Option<VersionRange>> {
    let spec = input.trim();
    let spec = spec
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(spec)
        .trim();

    if spec.starts_with('@') || spec.contains("://") {
        return Ok(None);
    }
    if spec.is_empty() || spec == "*" {
        return Ok(Some(VersionRange::any()));
    }

    let mut range = VersionRange::any();
    for clause in spec.split(',') {
        let clause = clause.trim();
        if clause.is_empty() {
            return Err(VersionError::range(Ecosystem::PyPI, input, "empty specifier"));
        }
        range = range.intersect(&parse_clause(input, clause)?);
    }
    Ok(Some(range))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Pep440Version {
        Pep440Version::parse(s).unwrap()
    }

    fn v(s: &str) -> Version {
        Version::Pep440(p(s))
    }

    #[test]
    fn test_parse_full_version() {
        let version = p("1!2.0.3rc1.post2.dev4+ubuntu-1");
        assert_eq!(version.epoch, 1);
        assert_eq!(version.release, vec![2, 0, 3]);
        assert_eq!(version.pre, Some((PreRelease::Rc, 1)));
        assert_eq!(version.post, Some(2));
        assert_eq!(version.dev, Some(4));
        assert_eq!(version.to_string(), "1!2.0.3rc1.post2.dev4+ubuntu.1");
    }

    #[test]
    fn test_parse_alternate_spellings() {
        assert_eq!(p("1.0-alpha.2").to_string(), "1.0a2");
        assert_eq!(p("1.0.preview1").to_string(), "1.0rc1");
        assert_eq!(p("1.0-1").to_string(), "1.0.post1");
        assert_eq!(p("1.0.post").to_string(), "1.0.post0");
        assert_eq!(p("V1.0DEV").to_string(), "1.0.dev0");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Pep440Version::parse("").is_err());
        assert!(Pep440Version::parse("abc").is_err());
        assert!(Pep440Version::parse("1.0 beta").is_err());
        assert!(Pep440Version::parse("1.0+").is_err());
    }

    #[test]
    fn test_ordering() {
        let ordered = [
            "1.0.dev0", "1.0a1", "1.0a2.dev1", "1.0a2", "1.0b1", "1.0rc1", "1.0", "1.0.post1.dev0",
            "1.0.post1", "1.1", "1!0.1",
        ];
        for pair in ordered.windows(2) {
            assert!(p(pair[0]) < p(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_trailing_zeros_equal() {
        assert_eq!(p("1.0"), p("1.0.0"));
        assert_eq!(p("1.0+local"), p("1.0"));
    }

    #[test]
    fn test_prerelease_flag() {
        assert!(p("2.0b1").is_prerelease());
        assert!(p("2.0.dev3").is_prerelease());
        assert!(!p("2.0.post1").is_prerelease());
    }

    #[test]
    fn test_specifier_set() {
        let range = parse_specifiers(">=1.4, <2").unwrap().unwrap();
        assert!(range.contains(&v("1.4")));
        assert!(range.contains(&v("1.9.9")));
        assert!(!range.contains(&v("2.0")));
    }

    #[test]
    fn test_compatible_release() {
        let range = parse_specifiers("~=2.2").unwrap().unwrap();
        assert!(range.contains(&v("2.9")));
        assert!(!range.contains(&v("3.0")));

        let range = parse_specifiers("~=1.4.5").unwrap().unwrap();
        assert!(range.contains(&v("1.4.9")));
        assert!(!range.contains(&v("1.5.0")));
        assert!(!range.contains(&v("1.4.4")));
    }

    #[test]
    fn test_wildcards() {
        let range = parse_specifiers("==1.2.*").unwrap().unwrap();
        assert!(range.contains(&v("1.2")));
        assert!(range.contains(&v("1.2.15")));
        assert!(!range.contains(&v("1.3")));

        let range = parse_specifiers("!=1.2.*").unwrap().unwrap();
        assert!(range.contains(&v("1.1")));
        assert!(!range.contains(&v("1.2.5")));
        assert!(range.contains(&v("1.3")));
    }

    #[test]
    fn test_not_equal() {
        let range = parse_specifiers("!=1.5").unwrap().unwrap();
        assert!(range.contains(&v("1.4")));
        assert!(!range.contains(&v("1.5.0")));
        assert!(range.contains(&v("1.6")));
    }

    #[test]
    fn test_exact_and_bare() {
        assert!(parse_specifiers("==2.31.0").unwrap().unwrap().as_exact().is_some());
        assert!(parse_specifiers("2.31.0").unwrap().unwrap().as_exact().is_some());
        assert!(parse_specifiers("(>=1.0)").unwrap().unwrap().contains(&v("1.0")));
    }

    #[test]
    fn test_url_reference_unversioned() {
        assert!(parse_specifiers("@ https://example.com/pkg.whl").unwrap().is_none());
    }

    #[test]
    fn test_prefix_overflow_is_invalid_range() {
        let max = u64::MAX;
        let err = parse_specifiers(&format!("=={}.*", max)).unwrap_err();
        assert!(matches!(err, VersionError::InvalidRange { .. }));
        assert!(parse_specifiers(&format!("~=1.{}", max)).is_ok());
        assert!(parse_specifiers(&format!("~={}.0", max)).is_err());
    }

    #[test]
    fn test_invalid_specifiers() {
        assert!(parse_specifiers("~=1").is_err());
        assert!(parse_specifiers(">=1.0,").is_err());
        assert!(parse_specifiers(">=1.*").is_err());
        assert!(parse_specifiers(">=").is_err());
    }
}
