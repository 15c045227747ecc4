use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};

use crate::{Error, macros::regex_once};

/// The phase of a pre-release.
///
/// Phases order as `Alpha` < `Beta` < `ReleaseCandidate`, matching the
/// ordering of the version strings they occur in (e.g. `1.0a1` < `1.0b1` <
/// `1.0rc1`).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PreReleasePhase {
    /// An alpha release (`a`).
    Alpha,
    /// A beta release (`b`).
    Beta,
    /// A release candidate (`rc`).
    ReleaseCandidate,
}

impl Display for PreReleasePhase {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(
            fmt,
            "{}",
            match self {
                PreReleasePhase::Alpha => "a",
                PreReleasePhase::Beta => "b",
                PreReleasePhase::ReleaseCandidate => "rc",
            }
        )
    }
}

/// One segment of a local version label.
///
/// Numeric segments order after alphanumeric ones, which the derived `Ord`
/// provides through the variant order.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
enum LocalSegment {
    Alpha(String),
    Number(u64),
}

impl Display for LocalSegment {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        match self {
            LocalSegment::Alpha(segment) => write!(fmt, "{segment}"),
            LocalSegment::Number(number) => write!(fmt, "{number}"),
        }
    }
}

/// Rank of the pre-release position in the total order.
///
/// A version that only carries a dev segment sorts before every pre-release
/// of the same release, while a final release sorts after all of them.
#[derive(Eq, Ord, PartialEq, PartialOrd)]
enum PreKey {
    BeforeAll,
    Value(PreReleasePhase, u64),
    AfterAll,
}

/// Rank of the post-release position in the total order.
#[derive(Eq, Ord, PartialEq, PartialOrd)]
enum PostKey {
    BeforeAll,
    Value(u64),
}

/// Rank of the dev-release position in the total order.
#[derive(Eq, Ord, PartialEq, PartialOrd)]
enum DevKey {
    Value(u64),
    AfterAll,
}

/// A package version.
///
/// A `Version` tracks an optional epoch, a dotted release, and optional
/// pre-release, post-release, dev-release and local components, following
/// the PEP 440 scheme. Versions are totally ordered and equality respects
/// canonicalisation (e.g. `1.0` equals `1.0.0` and `1.0RC1` equals
/// `1.0rc1`).
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use reqfix_types::Version;
///
/// # fn main() -> testresult::TestResult {
/// assert!(Version::from_str("1.0a1")? < Version::from_str("1.0")?);
/// assert!(Version::from_str("1.0")? < Version::from_str("1.0.post1")?);
/// assert!(Version::from_str("1.0")? == Version::from_str("1.0.0")?);
/// assert!(Version::from_str("2!0.1")? > Version::from_str("9.9")?);
/// assert!(Version::from_str("not-a-version").is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreReleasePhase, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Vec<LocalSegment>,
}

impl Version {
    /// Creates a new [`Version`] from a string and returns it in a Result.
    ///
    /// # Errors
    ///
    /// Returns an error if `version` is not a valid version string.
    pub fn new(version: &str) -> Result<Self, Error> {
        let input = version.trim();
        let Some(captures) = regex_once!(
            r"(?ix)^v?
            (?:(?P<epoch>[0-9]+)!)?
            (?P<release>[0-9]+(?:\.[0-9]+)*)
            (?:[-_.]?(?P<pre_l>alpha|beta|preview|pre|a|b|c|rc)[-_.]?(?P<pre_n>[0-9]+)?)?
            (?:(?:-(?P<post_n1>[0-9]+))|(?:[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?))?
            (?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>[0-9]+)?)?
            (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?$"
        )
        .captures(input) else {
            return Err(Error::InvalidVersion(version.to_string()));
        };

        let number = |name: &str| -> Result<Option<u64>, Error> {
            captures
                .name(name)
                .map(|m| {
                    m.as_str()
                        .parse::<u64>()
                        .map_err(|_| Error::InvalidVersion(version.to_string()))
                })
                .transpose()
        };

        let epoch = number("epoch")?.unwrap_or(0);
        let release = captures["release"]
            .split('.')
            .map(|segment| {
                segment
                    .parse::<u64>()
                    .map_err(|_| Error::InvalidVersion(version.to_string()))
            })
            .collect::<Result<Vec<u64>, Error>>()?;

        let pre = match captures.name("pre_l") {
            Some(label) => {
                let phase = match label.as_str().to_ascii_lowercase().as_str() {
                    "a" | "alpha" => PreReleasePhase::Alpha,
                    "b" | "beta" => PreReleasePhase::Beta,
                    _ => PreReleasePhase::ReleaseCandidate,
                };
                Some((phase, number("pre_n")?.unwrap_or(0)))
            }
            None => None,
        };

        let post = match (number("post_n1")?, captures.name("post_l")) {
            (Some(number), _) => Some(number),
            (None, Some(_)) => Some(number("post_n2")?.unwrap_or(0)),
            (None, None) => None,
        };

        let dev = match captures.name("dev_l") {
            Some(_) => Some(number("dev_n")?.unwrap_or(0)),
            None => None,
        };

        let local = match captures.name("local") {
            Some(label) => label
                .as_str()
                .to_ascii_lowercase()
                .split(['-', '_', '.'])
                .map(|segment| match segment.parse::<u64>() {
                    Ok(number) => LocalSegment::Number(number),
                    Err(_) => LocalSegment::Alpha(segment.to_string()),
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(Version {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// Returns the epoch of the version (0 unless set explicitly).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the release components of the version.
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// Returns the pre-release phase and number, if any.
    pub fn pre(&self) -> Option<(PreReleasePhase, u64)> {
        self.pre
    }

    /// Returns the post-release number, if any.
    pub fn post(&self) -> Option<u64> {
        self.post
    }

    /// Returns the dev-release number, if any.
    pub fn dev(&self) -> Option<u64> {
        self.dev
    }

    /// Returns the local version label, if any.
    pub fn local(&self) -> Option<String> {
        if self.local.is_empty() {
            None
        } else {
            Some(
                self.local
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<String>>()
                    .join("."),
            )
        }
    }

    /// Returns the first release component.
    pub fn major(&self) -> u64 {
        self.release.first().copied().unwrap_or(0)
    }

    /// Returns the second release component (0 when absent).
    pub fn minor(&self) -> u64 {
        self.release.get(1).copied().unwrap_or(0)
    }

    /// Returns the third release component (0 when absent).
    pub fn micro(&self) -> u64 {
        self.release.get(2).copied().unwrap_or(0)
    }

    /// Compares two versions while ignoring their local version labels.
    ///
    /// `1.0+ubuntu.1` compares equal to `1.0` under this comparison.
    pub fn cmp_ignoring_local(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.cmp_release(other))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post_key().cmp(&other.post_key()))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
    }

    /// Compares two release tuples, treating missing components as 0.
    fn cmp_release(&self, other: &Self) -> Ordering {
        let length = self.release.len().max(other.release.len());
        for index in 0..length {
            let own = self.release.get(index).copied().unwrap_or(0);
            let theirs = other.release.get(index).copied().unwrap_or(0);
            match own.cmp(&theirs) {
                Ordering::Equal => {}
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }

    fn pre_key(&self) -> PreKey {
        match self.pre {
            Some((phase, number)) => PreKey::Value(phase, number),
            None if self.post.is_none() && self.dev.is_some() => PreKey::BeforeAll,
            None => PreKey::AfterAll,
        }
    }

    fn post_key(&self) -> PostKey {
        match self.post {
            Some(number) => PostKey::Value(number),
            None => PostKey::BeforeAll,
        }
    }

    fn dev_key(&self) -> DevKey {
        match self.dev {
            Some(number) => DevKey::Value(number),
            None => DevKey::AfterAll,
        }
    }
}

impl FromStr for Version {
    type Err = Error;
    /// Creates a [`Version`] from a string slice.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Version::new(input)
    }
}

impl Display for Version {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        if self.epoch > 0 {
            write!(fmt, "{}!", self.epoch)?;
        }
        write!(
            fmt,
            "{}",
            self.release
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<String>>()
                .join(".")
        )?;
        if let Some((phase, number)) = self.pre {
            write!(fmt, "{phase}{number}")?;
        }
        if let Some(number) = self.post {
            write!(fmt, ".post{number}")?;
        }
        if let Some(number) = self.dev {
            write!(fmt, ".dev{number}")?;
        }
        if let Some(local) = self.local() {
            write!(fmt, "+{local}")?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.cmp_release(other))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post_key().cmp(&other.post_key()))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        // Trailing zeros are not significant for equality, so they must not
        // be significant for the hash either.
        let significant = self
            .release
            .iter()
            .rposition(|component| *component != 0)
            .map_or(0, |position| position + 1);
        self.release[..significant].hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
        self.local.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn display_parse_roundtrip(
            epoch in 0u64..3,
            release in proptest::collection::vec(0u64..100, 1..4),
            pre in proptest::option::of((0u8..3, 0u64..20)),
            post in proptest::option::of(0u64..20),
            dev in proptest::option::of(0u64..20),
        ) {
            let mut rendered = String::new();
            if epoch > 0 {
                rendered.push_str(&format!("{epoch}!"));
            }
            rendered.push_str(
                &release
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<String>>()
                    .join("."),
            );
            if let Some((phase, number)) = pre {
                let phase = match phase {
                    0 => "a",
                    1 => "b",
                    _ => "rc",
                };
                rendered.push_str(&format!("{phase}{number}"));
            }
            if let Some(number) = post {
                rendered.push_str(&format!(".post{number}"));
            }
            if let Some(number) = dev {
                rendered.push_str(&format!(".dev{number}"));
            }

            let version = Version::from_str(&rendered).unwrap();
            prop_assert_eq!(version.to_string(), rendered);
        }

        #[test]
        fn ordering_is_consistent_with_equality(
            left in r"[0-9]{1,3}(\.[0-9]{1,3}){0,3}",
            right in r"[0-9]{1,3}(\.[0-9]{1,3}){0,3}",
        ) {
            let left = Version::from_str(&left).unwrap();
            let right = Version::from_str(&right).unwrap();
            prop_assert_eq!(left == right, left.cmp(&right).is_eq());
        }
    }

    #[rstest]
    #[case("1.0", 0, vec![1, 0], None, None, None)]
    #[case("v1.0", 0, vec![1, 0], None, None, None)]
    #[case("2!1.0", 2, vec![1, 0], None, None, None)]
    #[case("1.0a1", 0, vec![1, 0], Some((PreReleasePhase::Alpha, 1)), None, None)]
    #[case("1.0alpha1", 0, vec![1, 0], Some((PreReleasePhase::Alpha, 1)), None, None)]
    #[case("1.0b2", 0, vec![1, 0], Some((PreReleasePhase::Beta, 2)), None, None)]
    #[case("1.0rc1", 0, vec![1, 0], Some((PreReleasePhase::ReleaseCandidate, 1)), None, None)]
    #[case("1.0pre1", 0, vec![1, 0], Some((PreReleasePhase::ReleaseCandidate, 1)), None, None)]
    #[case("1.0.post2", 0, vec![1, 0], None, Some(2), None)]
    #[case("1.0.dev3", 0, vec![1, 0], None, None, Some(3))]
    #[case("1.0.dev", 0, vec![1, 0], None, None, Some(0))]
    fn parse_components(
        #[case] input: &str,
        #[case] epoch: u64,
        #[case] release: Vec<u64>,
        #[case] pre: Option<(PreReleasePhase, u64)>,
        #[case] post: Option<u64>,
        #[case] dev: Option<u64>,
    ) {
        let version = Version::from_str(input).unwrap();
        assert_eq!(version.epoch(), epoch);
        assert_eq!(version.release(), release.as_slice());
        assert_eq!(version.pre(), pre);
        assert_eq!(version.post(), post);
        assert_eq!(version.dev(), dev);
    }

    #[rstest]
    #[case("")]
    #[case("not-a-version")]
    #[case("1.0.x")]
    #[case("1..0")]
    #[case("==1.0")]
    fn parse_failure(#[case] input: &str) {
        assert!(Version::from_str(input).is_err());
    }

    #[rstest]
    #[case("1.0", "1.0.1")]
    #[case("1.0", "1.1")]
    #[case("1.9", "1.10")]
    #[case("1.0.dev1", "1.0a1")]
    #[case("1.0a1", "1.0a2")]
    #[case("1.0a2", "1.0b1")]
    #[case("1.0b1", "1.0rc1")]
    #[case("1.0rc1", "1.0")]
    #[case("1.0", "1.0.post1")]
    #[case("1.0", "1.0+local")]
    #[case("1.0+abc", "1.0+abc.1")]
    #[case("1.0+abc", "1.0+2")]
    #[case("9.9", "1!0.1")]
    #[case("1.0a1.dev1", "1.0a1")]
    fn ordering(#[case] lower: &str, #[case] higher: &str) {
        let lower = Version::from_str(lower).unwrap();
        let higher = Version::from_str(higher).unwrap();
        assert!(lower < higher, "expected {lower} < {higher}");
    }

    #[rstest]
    #[case("1.0", "1.0.0")]
    #[case("1.0", "1.0.0.0")]
    #[case("1.0RC1", "1.0rc1")]
    #[case("1.0c1", "1.0rc1")]
    #[case("1.0-1", "1.0.post1")]
    #[case("1.0.rev1", "1.0.post1")]
    fn canonical_equality(#[case] left: &str, #[case] right: &str) {
        let left = Version::from_str(left).unwrap();
        let right = Version::from_str(right).unwrap();
        assert_eq!(left, right);

        let mut left_hasher = std::hash::DefaultHasher::new();
        let mut right_hasher = std::hash::DefaultHasher::new();
        left.hash(&mut left_hasher);
        right.hash(&mut right_hasher);
        assert_eq!(left_hasher.finish(), right_hasher.finish());
    }

    #[rstest]
    #[case("1.0", "1.0")]
    #[case("V1.0.Post2", "1.0.post2")]
    #[case("3!1.2a1.dev2+Ubuntu.1", "3!1.2a1.dev2+ubuntu.1")]
    fn display_is_canonical(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(Version::from_str(input).unwrap().to_string(), expected);
    }

    #[test]
    fn release_accessors() {
        let version = Version::from_str("1.2.3.4").unwrap();
        assert_eq!(version.major(), 1);
        assert_eq!(version.minor(), 2);
        assert_eq!(version.micro(), 3);

        let short = Version::from_str("7").unwrap();
        assert_eq!(short.major(), 7);
        assert_eq!(short.minor(), 0);
        assert_eq!(short.micro(), 0);
    }
}
