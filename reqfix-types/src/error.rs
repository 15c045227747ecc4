//! Error handling for reqfix-types.

use thiserror::Error;

/// The error that can occur when handling requirement types.
#[derive(Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// An invalid package name is encountered.
    #[error("Invalid package name: {0}")]
    InvalidName(String),

    /// An invalid version string is encountered.
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// An invalid specifier clause is encountered.
    #[error("Invalid specifier clause '{clause}' in '{specifier}'")]
    InvalidSpecifier {
        /// The clause that failed to parse.
        clause: String,
        /// The full specifier string the clause is part of.
        specifier: String,
    },

    /// A compatible release clause (`~=`) is used with too few release components.
    #[error("A compatible release clause needs at least two release components: {0}")]
    CompatibleReleaseTooShort(String),

    /// A requirement line could not be parsed at all.
    #[error("Invalid requirement: {0}")]
    InvalidRequirement(String),
}
