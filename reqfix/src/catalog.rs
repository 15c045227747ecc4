//! Version catalogs and candidate selection.

use std::{
    collections::{BTreeSet, HashMap},
    fs::File,
    path::Path,
    str::FromStr,
};

use log::debug;
use reqfix_types::{Name, Requirement, SpecifierSet, Version};

use crate::Error;

/// A read-only source of known versions per package.
///
/// Implementations are treated as pure: the search never mutates a catalog
/// and may query the same name repeatedly.
pub trait VersionCatalog {
    /// Returns all known versions for `name`, in any order.
    ///
    /// An unknown package yields an empty list.
    fn versions(&self, name: &Name) -> Vec<String>;
}

/// Limits for the candidate selection performed by [`candidates`].
#[derive(Clone, Copy, Debug)]
pub struct CandidateLimits {
    /// How many of the newest versions to consider (overall and per hint).
    pub latest: usize,
    /// How many of the newest versions within the current specifier to consider.
    pub within_spec: usize,
    /// How many adjacent versions on either side of an exact pin to consider.
    pub around: usize,
}

impl Default for CandidateLimits {
    fn default() -> Self {
        CandidateLimits {
            latest: 3,
            within_spec: 2,
            around: 2,
        }
    }
}

/// Selects the versions of `name` worth trying next, newest first.
///
/// The returned list is the de-duplicated union of up to four sources:
///
/// 1. the newest versions satisfying `hint`, if a hint is given,
/// 2. the newest versions overall,
/// 3. the newest versions satisfying the current requirement's specifier
///    (plus the single newest satisfying it),
/// 4. the versions adjacent to the currently pinned version, when the
///    current requirement is exact.
///
/// When the catalog has versions that do not parse, a lexicographically
/// sorted subset is returned instead.
pub fn candidates(
    catalog: &dyn VersionCatalog,
    name: &Name,
    current: Option<&Requirement>,
    hint: Option<&str>,
    limits: CandidateLimits,
) -> Vec<String> {
    let known = catalog.versions(name);
    if known.is_empty() {
        return Vec::new();
    }

    let mut parsed: Vec<Version> = Vec::with_capacity(known.len());
    for version in &known {
        match Version::from_str(version) {
            Ok(version) => parsed.push(version),
            Err(_) => {
                debug!("Catalog for '{name}' has unparseable version '{version}', using fallback");
                let mut fallback = known.clone();
                fallback.sort();
                fallback.reverse();
                fallback.truncate(limits.latest + limits.around * 2);
                return fallback;
            }
        }
    }
    parsed.sort();
    parsed.reverse();

    let mut selected: BTreeSet<Version> = BTreeSet::new();

    if let Some(hint) = hint {
        match SpecifierSet::from_str(hint) {
            Ok(hint) => {
                for version in parsed.iter().filter(|v| hint.contains(v)).take(limits.latest) {
                    selected.insert(version.clone());
                }
            }
            Err(error) => debug!("Ignoring unparseable specifier hint for '{name}': {error}"),
        }
    }

    for version in parsed.iter().take(limits.latest) {
        selected.insert(version.clone());
    }

    let mut current_exact: Option<Version> = None;
    if let Some(current) = current {
        if !current.specifier().is_empty() {
            if let Ok(specifier_set) = current.specifier_set() {
                let within: Vec<&Version> =
                    parsed.iter().filter(|v| specifier_set.contains(v)).collect();
                for version in within.iter().take(limits.within_spec) {
                    selected.insert((*version).clone());
                }
                if let Some(newest) = within.first() {
                    selected.insert((*newest).clone());
                }
            }
            current_exact = current.exact_version();
        }
    }

    if let Some(pinned) = current_exact {
        if let Some(index) = parsed.iter().position(|v| *v == pinned) {
            for offset in 1..=limits.around {
                if let Some(older) = parsed.get(index + offset) {
                    selected.insert(older.clone());
                }
                if index >= offset {
                    selected.insert(parsed[index - offset].clone());
                }
            }
        }
    }

    selected
        .into_iter()
        .rev()
        .map(|version| version.to_string())
        .collect()
}

/// An in-memory [`VersionCatalog`].
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use reqfix::{StaticCatalog, VersionCatalog};
/// use reqfix_types::Name;
///
/// # fn main() -> testresult::TestResult {
/// let catalog = StaticCatalog::from_pairs([("requests", ["2.31.0", "2.32.0"].as_slice())])?;
/// assert_eq!(catalog.versions(&Name::from_str("requests")?).len(), 2);
/// assert!(catalog.versions(&Name::from_str("unknown")?).is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog(HashMap<Name, Vec<String>>);

impl StaticCatalog {
    /// Creates a [`StaticCatalog`] from `(name, versions)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the package names is invalid.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a [&'a str])>,
    ) -> Result<Self, Error> {
        let mut catalog = HashMap::new();
        for (name, versions) in pairs {
            catalog.insert(
                Name::new(name)?,
                versions.iter().map(ToString::to_string).collect(),
            );
        }
        Ok(StaticCatalog(catalog))
    }

    /// Reads a [`StaticCatalog`] from a JSON file.
    ///
    /// The file must contain one object mapping package names to arrays of
    /// version strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON of
    /// the expected shape, or contains an invalid package name.
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|source| Error::IoPath {
            path: path.to_path_buf(),
            context: "opening version catalog",
            source,
        })?;
        let raw: HashMap<String, Vec<String>> =
            serde_json::from_reader(file).map_err(|source| Error::MalformedCatalog {
                path: path.to_path_buf(),
                source,
            })?;
        let mut catalog = HashMap::new();
        for (name, versions) in raw {
            catalog.insert(Name::new(&name)?, versions);
        }
        Ok(StaticCatalog(catalog))
    }

    /// Returns the built-in demonstration catalog.
    ///
    /// Covers a handful of well-known packages so that `reqfix` can be
    /// exercised without network access or a catalog file.
    pub fn demo() -> Self {
        let pairs: [(&str, &[&str]); 9] = [
            (
                "sphinx",
                &["4.3.2", "5.0.0", "5.3.0", "6.0.0", "6.1.3", "6.2.1", "7.0.0", "7.1.0"],
            ),
            (
                "docutils",
                &["0.16", "0.17", "0.17.1", "0.18", "0.18.1", "0.19", "0.20", "0.20.1", "0.21.0"],
            ),
            (
                "requests",
                &["2.22.0", "2.25.1", "2.28.1", "2.29.0", "2.31.0", "2.32.0"],
            ),
            (
                "urllib3",
                &["1.25.11", "1.26.5", "1.26.15", "2.0.0", "2.0.7", "2.1.0", "2.2.0", "2.2.1"],
            ),
            (
                "numpy",
                &[
                    "1.17.0", "1.18.5", "1.19.5", "1.20.3", "1.21.6", "1.22.0", "1.22.4",
                    "1.23.5", "1.24.0", "1.24.4", "1.26.0", "1.26.3",
                ],
            ),
            (
                "flask",
                &["1.1.0", "1.1.4", "2.0.0", "2.0.3", "2.1.0", "2.2.0", "2.3.0", "3.0.0"],
            ),
            (
                "werkzeug",
                &["0.16.0", "1.0.1", "2.0.0", "2.0.3", "2.1.0", "2.2.0", "2.3.0", "3.0.0"],
            ),
            (
                "jinja2",
                &["2.11.3", "3.0.0", "3.0.3", "3.1.0", "3.1.2", "3.1.3"],
            ),
            (
                "tensorflow",
                &["2.3.0", "2.5.0", "2.6.0", "2.8.0", "2.9.0", "2.10.0", "2.13.0", "2.15.0"],
            ),
        ];
        StaticCatalog::from_pairs(pairs).expect("demo catalog names are valid")
    }
}

impl VersionCatalog for StaticCatalog {
    fn versions(&self, name: &Name) -> Vec<String> {
        self.0.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn catalog() -> StaticCatalog {
        StaticCatalog::demo()
    }

    fn name(name: &str) -> Name {
        Name::from_str(name).unwrap()
    }

    #[test]
    fn unknown_package_yields_nothing() {
        let versions = candidates(
            &catalog(),
            &name("unknown"),
            None,
            None,
            CandidateLimits::default(),
        );
        assert!(versions.is_empty());
    }

    #[test]
    fn latest_versions_without_context() {
        let versions = candidates(
            &catalog(),
            &name("jinja2"),
            None,
            None,
            CandidateLimits::default(),
        );
        assert_eq!(versions, vec!["3.1.3", "3.1.2", "3.1.0"]);
    }

    #[test]
    fn hint_extends_the_latest_versions() {
        let versions = candidates(
            &catalog(),
            &name("jinja2"),
            None,
            Some("<3.1,>=2.10.1"),
            CandidateLimits::default(),
        );
        assert_eq!(
            versions,
            vec!["3.1.3", "3.1.2", "3.1.0", "3.0.3", "3.0.0", "2.11.3"]
        );
    }

    #[test]
    fn exact_pin_adds_neighbours() {
        let requirement = Requirement::from_str("requests==2.29.0").unwrap();
        let versions = candidates(
            &catalog(),
            &name("requests"),
            Some(&requirement),
            None,
            CandidateLimits::default(),
        );
        // Latest three, the pinned version itself (it satisfies the current
        // specifier) and two neighbours on either side.
        assert_eq!(
            versions,
            vec!["2.32.0", "2.31.0", "2.29.0", "2.28.1", "2.25.1"]
        );
    }

    #[rstest]
    #[case(">=2.0,<2.1", vec!["2.2.1", "2.2.0", "2.1.0", "2.0.7", "2.0.0"])]
    #[case(">=9000", vec!["2.2.1", "2.2.0", "2.1.0"])]
    fn within_specifier(#[case] specifier: &str, #[case] expected: Vec<&str>) {
        let requirement =
            Requirement::new(name("urllib3"), specifier).unwrap();
        let versions = candidates(
            &catalog(),
            &name("urllib3"),
            Some(&requirement),
            None,
            CandidateLimits::default(),
        );
        assert_eq!(versions, expected);
    }

    #[test]
    fn unparseable_catalog_falls_back_to_lexicographic() {
        let catalog = StaticCatalog::from_pairs([(
            "weird",
            ["one", "two", "three"].as_slice(),
        )])
        .unwrap();
        let versions = candidates(
            &catalog,
            &name("weird"),
            None,
            None,
            CandidateLimits::default(),
        );
        assert_eq!(versions, vec!["two", "three", "one"]);
    }
}
