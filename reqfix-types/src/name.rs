use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::Serialize;

use crate::{Error, macros::regex_once};

/// The name of a package.
///
/// A `Name` wraps a `String` that is guaranteed to be non-empty and to only
/// contain ASCII letters, digits, `_`, `.` or `-`.
///
/// ## Examples
/// ```
/// use std::str::FromStr;
///
/// use reqfix_types::Name;
///
/// assert!(Name::from_str("requests").is_ok());
/// assert!(Name::from_str("zope.interface").is_ok());
/// assert!(Name::from_str("typing_extensions").is_ok());
/// assert!(Name::from_str("").is_err());
/// assert!(Name::from_str("no spaces").is_err());
/// ```
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`] and returns it in a Result.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is empty or contains characters outside of
    /// ASCII letters, digits, `_`, `.` and `-`.
    pub fn new(name: &str) -> Result<Self, Error> {
        if regex_once!(r"^[a-zA-Z0-9_.-]+$").is_match(name) {
            Ok(Name(name.to_string()))
        } else {
            Err(Error::InvalidName(name.to_string()))
        }
    }

    /// Returns a reference to the inner type.
    pub fn inner(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        self.inner()
    }
}

impl FromStr for Name {
    type Err = Error;
    /// Creates a [`Name`] from a string slice.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Name::new(input)
    }
}

impl Display for Name {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.inner())
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
        fn valid_name_roundtrip(name_str in r"[a-zA-Z\d_.-]+") {
            let name = Name::from_str(&name_str).unwrap();
            prop_assert_eq!(name_str, format!("{}", name));
        }

        #[test]
        fn invalid_name_rejected(name_str in r"[a-zA-Z\d_.-]*[^a-zA-Z\d_.-]+[a-zA-Z\d_.-]*") {
            prop_assert!(Name::from_str(&name_str).is_err());
        }
    }

    #[rstest]
    #[case("requests")]
    #[case("zope.interface")]
    #[case("typing_extensions")]
    #[case("ruamel.yaml-clib")]
    #[case("a")]
    fn valid_name(#[case] input: &str) {
        assert_eq!(Name::from_str(input).map(|name| name.to_string()), Ok(input.to_string()));
    }

    #[rstest]
    #[case("")]
    #[case("no spaces")]
    #[case("päckage")]
    #[case("name!")]
    fn invalid_name(#[case] input: &str) {
        assert_eq!(Name::from_str(input), Err(Error::InvalidName(input.to_string())));
    }
}
