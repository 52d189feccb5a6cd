use std::fmt;

use thiserror::Error;

use crate::component::TypeName;
use crate::version::Version;

/// One dependency whose requested version the advertised contract can't serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub implementation: TypeName,
    pub contract: TypeName,
    pub advertised: Version,
    pub requested: Version,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} needs {} {} but {} is available",
            self.implementation, self.contract, self.requested, self.advertised
        )
    }
}

/// Structured errors for building and instantiating a dependency tree.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("{implementation} depends on unknown contract {contract}")]
    UnresolvedDependency {
        implementation: TypeName,
        contract: TypeName,
    },
    #[error("mismatching dependency versions:\n{}", format_mismatches(mismatches))]
    VersionMismatch { mismatches: Vec<Mismatch> },
    #[error("cyclic dependency with no alternative: {}", format_path(path))]
    CyclicDependency { path: Vec<TypeName> },
    #[error("unknown implementation {0}")]
    UnknownImplementation(TypeName),
    #[error("no implementation of {contract} available for {required_by}")]
    NoImplementation {
        contract: TypeName,
        required_by: TypeName,
    },
    #[error("failed to create an instance of {implementation}")]
    Construction {
        implementation: TypeName,
        #[source]
        source: anyhow::Error,
    },
}

fn format_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(|m| format!("  {m}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_path(path: &[TypeName]) -> String {
    path.iter()
        .map(TypeName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
