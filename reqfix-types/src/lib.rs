#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod error;
pub use error::Error;

mod macros;

mod name;
pub use name::Name;

mod requirement;
pub use requirement::Requirement;
pub use requirement::RequirementSet;
pub use requirement::parse_requirements;

mod specifier;
pub use specifier::Operator;
pub use specifier::Specifier;
pub use specifier::SpecifierSet;

mod version;
pub use version::PreReleasePhase;
pub use version::Version;
