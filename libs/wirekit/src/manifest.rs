//! Component manifests: two newline-delimited UTF-8 files listing the
//! qualified names of service contracts (`services.txt`) and implementations
//! (`modules.txt`).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::catalog::TypeCatalog;
use crate::component::{Classifier, Component, TypeName};
use crate::logging::{Level, Logger};

pub const SERVICES_FILE: &str = "services.txt";
pub const MODULES_FILE: &str = "modules.txt";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Names listed by one or more manifests, de-duplicated.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Manifest {
    services: BTreeSet<TypeName>,
    modules: BTreeSet<TypeName>,
}

fn parse_lines(raw: &str) -> impl Iterator<Item = TypeName> + '_ {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(TypeName::from)
}

fn read_optional(path: &Path) -> Result<Option<String>, ManifestError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ManifestError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl Manifest {
    pub fn parse(services: &str, modules: &str) -> Self {
        Self {
            services: parse_lines(services).collect(),
            modules: parse_lines(modules).collect(),
        }
    }

    /// Reads `services.txt` and `modules.txt` from `dir`. A missing file counts as empty.
    pub fn read_dir(dir: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let dir = dir.as_ref();
        Self::read_files(dir.join(SERVICES_FILE), dir.join(MODULES_FILE))
    }

    pub fn read_files(
        services: impl AsRef<Path>,
        modules: impl AsRef<Path>,
    ) -> Result<Self, ManifestError> {
        let services = read_optional(services.as_ref())?.unwrap_or_default();
        let modules = read_optional(modules.as_ref())?.unwrap_or_default();
        Ok(Self::parse(&services, &modules))
    }

    pub fn merge(&mut self, other: Manifest) {
        self.services.extend(other.services);
        self.modules.extend(other.modules);
    }

    pub fn services(&self) -> impl Iterator<Item = &TypeName> {
        self.services.iter()
    }

    pub fn modules(&self) -> impl Iterator<Item = &TypeName> {
        self.modules.iter()
    }

    /// Every listed name once, even if it appears in both files.
    pub fn names(&self) -> BTreeSet<&TypeName> {
        self.services.iter().chain(self.modules.iter()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.modules.is_empty()
    }

    /// Look every listed name up in `catalog` and classify it. Names the
    /// catalog doesn't know are reported and skipped.
    pub fn resolve(
        &self,
        catalog: &TypeCatalog,
        classifier: &Classifier,
        logger: &dyn Logger,
    ) -> Vec<Arc<Component>> {
        let mut components = Vec::new();
        for name in self.names() {
            let Some(ty) = catalog.get(name.as_str()) else {
                logger.log(
                    Level::Warning,
                    &format!("Manifest lists unknown component {name}"),
                );
                continue;
            };
            match classifier.classify(ty) {
                Some(component) => components.push(component),
                None => logger.log(
                    Level::Debug,
                    &format!("{name} carries no component marker; ignored"),
                ),
            }
        }
        components
    }
}
