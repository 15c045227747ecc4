use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    str::FromStr,
};

use log::warn;

use crate::{Error, Name, SpecifierSet, Version, macros::regex_once};

/// A single package requirement.
///
/// A `Requirement` is an immutable pair of a package [`Name`] and a
/// specifier string (possibly empty, meaning "any version"). The specifier
/// is validated on construction and stored without whitespace; equality,
/// hashing and ordering use the canonical `(name, specifier)` pair.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use reqfix_types::Requirement;
///
/// # fn main() -> testresult::TestResult {
/// let requirement = Requirement::from_str("urllib3>=1.25.0,<2.0")?;
/// assert_eq!(requirement.name().as_ref(), "urllib3");
/// assert_eq!(requirement.specifier(), ">=1.25.0,<2.0");
/// assert_eq!(requirement.to_string(), "urllib3>=1.25.0,<2.0");
///
/// let pinned = Requirement::from_str("requests ==2.31.0")?;
/// assert!(pinned.is_exact());
/// assert_eq!(pinned.exact_version().map(|v| v.to_string()), Some("2.31.0".into()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Requirement {
    name: Name,
    specifier: String,
}

impl Requirement {
    /// Creates a new [`Requirement`] from a name and a specifier string.
    ///
    /// Whitespace in the specifier is stripped; the stripped string is kept
    /// verbatim as the requirement's identity (no canonicalisation of
    /// equivalent specifiers takes place).
    ///
    /// # Errors
    ///
    /// Returns an error if the specifier is non-empty and does not parse as
    /// a [`SpecifierSet`].
    pub fn new(name: Name, specifier: &str) -> Result<Self, Error> {
        let specifier: String = specifier.split_whitespace().collect();
        if !specifier.is_empty() {
            SpecifierSet::from_str(&specifier)?;
        }
        Ok(Requirement { name, specifier })
    }

    /// Returns the name of the required package.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the specifier string (empty for "any version").
    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    /// Returns the parsed form of the specifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the specifier does not parse; as construction
    /// validates it, this only occurs for clauses that are valid in
    /// isolation but meaningless to re-parse (it does not in practice).
    pub fn specifier_set(&self) -> Result<SpecifierSet, Error> {
        SpecifierSet::from_str(&self.specifier)
    }

    /// Returns whether the requirement pins one exact version.
    ///
    /// A requirement is exact if its specifier consists of exactly one
    /// clause and that clause uses `==`.
    pub fn is_exact(&self) -> bool {
        self.specifier.starts_with("==") && !self.specifier.contains(',')
    }

    /// Returns the pinned version of an exact requirement.
    ///
    /// Returns [`None`] when the requirement is not exact or the pinned
    /// literal does not parse as a version (e.g. prefix matching `==2.0.*`).
    pub fn exact_version(&self) -> Option<Version> {
        if self.is_exact() {
            Version::new(&self.specifier[2..]).ok()
        } else {
            None
        }
    }
}

impl FromStr for Requirement {
    type Err = Error;

    /// Creates a [`Requirement`] from a single requirement line.
    ///
    /// The expected shape is `name (op version (, op version)*)?`; an
    /// optional trailing `#` comment is removed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not match the requirement shape or
    /// name/specifier validation fails.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let line = match input.split_once('#') {
            Some((content, _comment)) => content.trim(),
            None => input.trim(),
        };
        let Some(captures) = regex_once!(
            r"^([a-zA-Z0-9_.-]+)\s*((?:[<>=!~]=?\s*[a-zA-Z0-9_.*+!-]+(?:\s*,\s*[<>=!~]=?\s*[a-zA-Z0-9_.*+!-]+)*))?$"
        )
        .captures(line) else {
            return Err(Error::InvalidRequirement(input.trim().to_string()));
        };

        let name = Name::new(&captures[1])?;
        let specifier = captures.get(2).map(|m| m.as_str()).unwrap_or("");
        Requirement::new(name, specifier)
    }
}

impl Display for Requirement {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}{}", self.name, self.specifier)
    }
}

/// A set of requirements in which each package name occurs at most once.
///
/// The set iterates in name order, which is also its canonical form: two
/// sets with the same members hash and compare equal, so a
/// `RequirementSet` can serve as a cache key and search-state identity.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use reqfix_types::{Requirement, RequirementSet};
///
/// # fn main() -> testresult::TestResult {
/// let set: RequirementSet = [
///     Requirement::from_str("urllib3==2.0.0")?,
///     Requirement::from_str("requests==2.29.0")?,
/// ]
/// .into_iter()
/// .collect();
///
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.to_string(), "requests==2.29.0\nurllib3==2.0.0");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct RequirementSet(BTreeMap<Name, Requirement>);

impl RequirementSet {
    /// Creates an empty [`RequirementSet`].
    pub fn new() -> Self {
        RequirementSet::default()
    }

    /// Inserts a requirement, replacing any requirement of the same name.
    ///
    /// Returns the replaced requirement, if any.
    pub fn insert(&mut self, requirement: Requirement) -> Option<Requirement> {
        self.0.insert(requirement.name().clone(), requirement)
    }

    /// Removes and returns the requirement for `name`, if present.
    pub fn remove(&mut self, name: &Name) -> Option<Requirement> {
        self.0.remove(name)
    }

    /// Returns the requirement for `name`, if present.
    pub fn get(&self, name: &Name) -> Option<&Requirement> {
        self.0.get(name)
    }

    /// Returns whether a requirement for `name` is present.
    pub fn contains_name(&self, name: &Name) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the number of requirements in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the requirements in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.0.values()
    }

    /// Returns an iterator over the names in the set, in order.
    pub fn names(&self) -> impl Iterator<Item = &Name> {
        self.0.keys()
    }

    /// Returns a shortened one-line rendering for progress messages.
    ///
    /// At most `limit` members are shown, followed by a `(+N more)` note.
    pub fn summary(&self, limit: usize) -> String {
        let rendered: Vec<String> = self.iter().map(ToString::to_string).collect();
        if rendered.len() > limit {
            format!(
                "{}... (+{} more)",
                rendered[..limit].join(", "),
                rendered.len() - limit
            )
        } else {
            rendered.join(", ")
        }
    }
}

impl FromIterator<Requirement> for RequirementSet {
    fn from_iter<I: IntoIterator<Item = Requirement>>(iter: I) -> Self {
        let mut set = RequirementSet::new();
        for requirement in iter {
            set.insert(requirement);
        }
        set
    }
}

impl Display for RequirementSet {
    /// Renders the canonical form: name-sorted members, one per line.
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(
            fmt,
            "{}",
            self.iter()
                .map(ToString::to_string)
                .collect::<Vec<String>>()
                .join("\n")
        )
    }
}

/// Parses requirements from newline-delimited input.
///
/// Blank lines and `#` comment lines are skipped. Malformed lines are
/// dropped with a warning and do not abort parsing; callers decide whether
/// an empty result is fatal.
///
/// ## Examples
/// ```
/// use reqfix_types::parse_requirements;
///
/// let set = parse_requirements(
///     "# direct dependencies\nrequests==2.31.0\nurllib3>=1.25.0,<2.0  # pinned for now\n!!!\n",
/// );
/// assert_eq!(set.len(), 2);
/// ```
pub fn parse_requirements(input: &str) -> RequirementSet {
    let mut set = RequirementSet::new();
    for (line_number, line) in input.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match Requirement::from_str(trimmed) {
            Ok(requirement) => {
                set.insert(requirement);
            }
            Err(error) => {
                warn!(
                    "Skipping malformed requirement on line {}: '{}' ({error})",
                    line_number + 1,
                    trimmed
                );
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn set_names_stay_unique(
            lines in proptest::collection::vec((r"[a-z]{1,5}", 0u64..50), 0..20),
        ) {
            let set: RequirementSet = lines
                .iter()
                .map(|(name, version)| {
                    Requirement::new(
                        Name::new(name).unwrap(),
                        &format!("=={version}"),
                    )
                    .unwrap()
                })
                .collect();

            let names: Vec<&Name> = set.names().collect();
            let mut deduplicated = names.clone();
            deduplicated.dedup();
            prop_assert_eq!(names.len(), deduplicated.len());
            prop_assert!(names.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[rstest]
    #[case("requests", "requests", "")]
    #[case("requests==2.31.0", "requests", "==2.31.0")]
    #[case("requests == 2.31.0", "requests", "==2.31.0")]
    #[case("urllib3>=1.25.0,<2.0", "urllib3", ">=1.25.0,<2.0")]
    #[case("urllib3 >= 1.25.0 , < 2.0", "urllib3", ">=1.25.0,<2.0")]
    #[case("sphinx~=5.0", "sphinx", "~=5.0")]
    #[case("docutils==0.17.* # see build notes", "docutils", "==0.17.*")]
    fn parse_line(#[case] input: &str, #[case] name: &str, #[case] specifier: &str) {
        let requirement = Requirement::from_str(input).unwrap();
        assert_eq!(requirement.name().as_ref(), name);
        assert_eq!(requirement.specifier(), specifier);
    }

    #[rstest]
    #[case("")]
    #[case("==1.0")]
    #[case("name with spaces==1.0")]
    #[case("requests===1.0")]
    #[case("requests==")]
    #[case("requests==1.0,oops")]
    fn parse_line_failure(#[case] input: &str) {
        assert!(Requirement::from_str(input).is_err());
    }

    #[rstest]
    #[case("requests==2.31.0", true, Some("2.31.0"))]
    #[case("requests==2.31.0,!=2.30.0", false, None)]
    #[case("requests>=2.31.0", false, None)]
    #[case("requests", false, None)]
    #[case("docutils==0.17.*", true, None)]
    fn exactness(#[case] input: &str, #[case] exact: bool, #[case] version: Option<&str>) {
        let requirement = Requirement::from_str(input).unwrap();
        assert_eq!(requirement.is_exact(), exact);
        assert_eq!(
            requirement.exact_version().map(|v| v.to_string()),
            version.map(ToString::to_string)
        );
    }

    #[test]
    fn set_keeps_names_unique() {
        let mut set = RequirementSet::new();
        set.insert(Requirement::from_str("requests==2.29.0").unwrap());
        let replaced = set.insert(Requirement::from_str("requests==2.31.0").unwrap());
        assert_eq!(replaced, Some(Requirement::from_str("requests==2.29.0").unwrap()));
        assert_eq!(set.len(), 1);
        assert_eq!(set.to_string(), "requests==2.31.0");
    }

    #[test]
    fn set_identity_is_order_independent() {
        let forward: RequirementSet = ["a==1.0", "b==2.0"]
            .into_iter()
            .map(|line| Requirement::from_str(line).unwrap())
            .collect();
        let backward: RequirementSet = ["b==2.0", "a==1.0"]
            .into_iter()
            .map(|line| Requirement::from_str(line).unwrap())
            .collect();
        assert_eq!(forward, backward);
    }

    #[test]
    fn parse_requirements_drops_malformed_lines() {
        let set = parse_requirements(
            "\n# comment\nrequests==2.31.0\nnot a requirement!\nurllib3==2.0.7\n   \n",
        );
        assert_eq!(set.len(), 2);
        assert!(set.contains_name(&Name::new("requests").unwrap()));
        assert!(set.contains_name(&Name::new("urllib3").unwrap()));
    }

    #[test]
    fn summary_truncates() {
        let set: RequirementSet = ["a==1", "b==2", "c==3", "d==4"]
            .into_iter()
            .map(|line| Requirement::from_str(line).unwrap())
            .collect();
        assert_eq!(set.summary(2), "a==1, b==2... (+2 more)");
        assert_eq!(set.summary(10), "a==1, b==2, c==3, d==4");
    }
}
