use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use strum::IntoEnumIterator;

use crate::{Error, Version};

/// An operator in a version constraint clause.
///
/// ## Note
///
/// The variant order is significant: two-character spellings are listed
/// before the one-character spellings they share a prefix with, so that
/// scanning the variants in order never truncates an operator (e.g. `<=`
/// must be recognised before `<`).
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    strum::AsRefStr,
    strum::Display,
    strum::EnumIter,
    strum::VariantNames,
)]
pub enum Operator {
    /// Version equality (`==`), including prefix matching with a trailing `.*`.
    #[strum(serialize = "==")]
    Equal,
    /// Version exclusion (`!=`).
    #[strum(serialize = "!=")]
    NotEqual,
    /// Inclusive upper bound (`<=`).
    #[strum(serialize = "<=")]
    LessOrEqual,
    /// Inclusive lower bound (`>=`).
    #[strum(serialize = ">=")]
    GreaterOrEqual,
    /// Compatible release (`~=`).
    #[strum(serialize = "~=")]
    Compatible,
    /// Exclusive upper bound (`<`).
    #[strum(serialize = "<")]
    Less,
    /// Exclusive lower bound (`>`).
    #[strum(serialize = ">")]
    Greater,
}

/// A single version constraint clause.
///
/// A `Specifier` pairs an [`Operator`] with a version literal, e.g.
/// `>=1.25.0` or `==2.0.*`. A trailing `.*` (prefix matching) is only
/// accepted with `==` and `!=`.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use reqfix_types::{Specifier, Version};
///
/// # fn main() -> testresult::TestResult {
/// let clause = Specifier::from_str(">=1.25.0")?;
/// assert!(clause.contains(&Version::from_str("1.26.5")?));
/// assert!(!clause.contains(&Version::from_str("1.24.0")?));
///
/// let compatible = Specifier::from_str("~=2.1")?;
/// assert!(compatible.contains(&Version::from_str("2.4.0")?));
/// assert!(!compatible.contains(&Version::from_str("3.0")?));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Specifier {
    operator: Operator,
    version: Version,
    wildcard: bool,
    literal: String,
}

impl Specifier {
    /// Returns the operator of the clause.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Returns the version the clause compares against.
    ///
    /// For a prefix-matching clause this is the version parsed from the
    /// literal without its trailing `.*`.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Returns whether the clause uses prefix matching (a trailing `.*`).
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Returns whether `candidate` satisfies the clause.
    pub fn contains(&self, candidate: &Version) -> bool {
        match self.operator {
            Operator::Equal => self.matches_equal(candidate),
            Operator::NotEqual => !self.matches_equal(candidate),
            Operator::LessOrEqual => candidate <= &self.version,
            Operator::GreaterOrEqual => candidate >= &self.version,
            Operator::Less => candidate < &self.version,
            Operator::Greater => candidate > &self.version,
            Operator::Compatible => {
                candidate >= &self.version
                    && self.release_prefix_matches(candidate, self.version.release().len() - 1)
            }
        }
    }

    /// Equality with prefix matching and local label handling.
    fn matches_equal(&self, candidate: &Version) -> bool {
        if self.wildcard {
            candidate.epoch() == self.version.epoch()
                && self.release_prefix_matches(candidate, self.version.release().len())
        } else if self.version.local().is_none() {
            candidate.cmp_ignoring_local(&self.version).is_eq()
        } else {
            candidate == &self.version
        }
    }

    /// Returns whether the first `components` release components of
    /// `candidate` match this clause's version, padding with zeros.
    fn release_prefix_matches(&self, candidate: &Version, components: usize) -> bool {
        (0..components).all(|index| {
            candidate.release().get(index).copied().unwrap_or(0)
                == self.version.release().get(index).copied().unwrap_or(0)
        })
    }

    fn invalid(clause: &str) -> Error {
        Error::InvalidSpecifier {
            clause: clause.to_string(),
            specifier: clause.to_string(),
        }
    }
}

impl FromStr for Specifier {
    type Err = Error;

    /// Creates a [`Specifier`] from a string slice.
    ///
    /// # Errors
    ///
    /// Returns an error if no operator is recognised, the version literal
    /// does not parse, prefix matching is combined with an ordering
    /// operator, or a compatible release clause has fewer than two release
    /// components.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let clause = input.trim();
        let Some((operator, literal)) = Operator::iter().find_map(|operator| {
            clause
                .strip_prefix(operator.as_ref())
                .map(|rest| (operator, rest.trim()))
        }) else {
            return Err(Specifier::invalid(clause));
        };
        if literal.is_empty() {
            return Err(Specifier::invalid(clause));
        }

        let wildcard = literal.ends_with(".*");
        if wildcard && !matches!(operator, Operator::Equal | Operator::NotEqual) {
            return Err(Specifier::invalid(clause));
        }

        let version_literal = if wildcard {
            literal.trim_end_matches(".*")
        } else {
            literal
        };
        let version =
            Version::new(version_literal).map_err(|_| Specifier::invalid(clause))?;

        if operator == Operator::Compatible && version.release().len() < 2 {
            return Err(Error::CompatibleReleaseTooShort(clause.to_string()));
        }

        Ok(Specifier {
            operator,
            version,
            wildcard,
            literal: literal.to_string(),
        })
    }
}

impl Display for Specifier {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}{}", self.operator, self.literal)
    }
}

/// A set of version constraint clauses.
///
/// A `SpecifierSet` is the comma-joined conjunction of its clauses. The
/// empty set matches every version. Membership is decided in one pass over
/// the clauses.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use reqfix_types::{SpecifierSet, Version};
///
/// # fn main() -> testresult::TestResult {
/// let set = SpecifierSet::from_str(">=1.25.0,<2.0")?;
/// assert!(set.contains(&Version::from_str("1.26.15")?));
/// assert!(!set.contains(&Version::from_str("2.0.0")?));
/// assert!(SpecifierSet::from_str("")?.contains(&Version::from_str("0.1")?));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct SpecifierSet(Vec<Specifier>);

impl SpecifierSet {
    /// Returns whether `candidate` satisfies every clause in the set.
    pub fn contains(&self, candidate: &Version) -> bool {
        self.0.iter().all(|clause| clause.contains(candidate))
    }

    /// Returns the number of clauses in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the set has no clauses.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the clauses of the set.
    pub fn iter(&self) -> impl Iterator<Item = &Specifier> {
        self.0.iter()
    }
}

impl FromStr for SpecifierSet {
    type Err = Error;

    /// Creates a [`SpecifierSet`] from a string slice.
    ///
    /// The input is split on `,`; whitespace around clauses is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first clause that fails to parse.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(SpecifierSet::default());
        }
        let clauses = trimmed
            .split(',')
            .map(|clause| {
                Specifier::from_str(clause).map_err(|error| match error {
                    Error::InvalidSpecifier { clause, .. } => Error::InvalidSpecifier {
                        clause,
                        specifier: trimmed.to_string(),
                    },
                    other => other,
                })
            })
            .collect::<Result<Vec<Specifier>, Error>>()?;
        Ok(SpecifierSet(clauses))
    }
}

impl Display for SpecifierSet {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(
            fmt,
            "{}",
            self.0
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<String>>()
                .join(",")
        )
    }
}
