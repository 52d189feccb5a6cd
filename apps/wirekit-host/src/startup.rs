//! Composition of the process: component selection, tree construction and
//! root logger seeding.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use wirekit::logging::{all_levels, tracing_listener, ROOT_LOGGER};
use wirekit::{
    Classifier, Component, DependencyTree, Logger, NamedLogger, TreeError, TypeCatalog,
};
use wirekit_bootstrap::AppConfig;

/// Name of the child logger the tree reports through.
pub const CORE_LOGGER: &str = "Core";

/// Root logger forwarding everything into `tracing`.
pub fn root_logger() -> NamedLogger {
    let root = NamedLogger::root();
    root.add_listener(tracing_listener(), all_levels());
    root
}

/// Components named by the configured manifests, or every registered one
/// when no manifest directory is configured.
pub fn select_components(
    config: &AppConfig,
    base_dir: &Path,
    catalog: &TypeCatalog,
    classifier: &Classifier,
    logger: &dyn Logger,
) -> Result<Vec<Arc<Component>>> {
    match config.components.load_manifest(base_dir)? {
        Some(manifest) => {
            if manifest.is_empty() {
                tracing::warn!("Manifests list no components");
            }
            Ok(manifest.resolve(catalog, classifier, logger))
        }
        None => {
            tracing::info!(
                registered = catalog.len(),
                "No manifest directory configured; using every registered component"
            );
            Ok(catalog.classify_all(classifier))
        }
    }
}

/// Builds and validates the tree, then seeds the root logger node with `root`.
pub fn build_tree(config: &AppConfig, base_dir: &Path, root: &NamedLogger) -> Result<DependencyTree> {
    let core = root.child(CORE_LOGGER);
    let catalog = TypeCatalog::discover();
    let classifier = Classifier::default();
    let components = select_components(config, base_dir, &catalog, &classifier, core.as_ref())?;

    let tree = DependencyTree::builder(core)
        .options(config.tree.to_options())
        .extend(components)
        .build()?;

    match tree.seed_instance(ROOT_LOGGER, root.to_instance()) {
        Ok(()) => {}
        Err(TreeError::UnknownImplementation(_)) => {
            tracing::warn!("{ROOT_LOGGER} is not selected; the logger contract has no root instance")
        }
        Err(e) => return Err(e.into()),
    }
    Ok(tree)
}

/// Process exit code for a failed startup.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<TreeError>() {
        Some(TreeError::VersionMismatch { .. }) => 2,
        Some(TreeError::CyclicDependency { .. }) => 3,
        Some(TreeError::UnresolvedDependency { .. }) => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use wirekit::{Node, TypeName};

    // Keep the demo components linked into the test binary.
    fn catalog() -> TypeCatalog {
        let _ = std::any::type_name::<greeter::Welcome>();
        TypeCatalog::discover()
    }

    fn config_with_manifests(dir: &Path, services: &str, modules: &str) -> AppConfig {
        let manifests = dir.join("manifests");
        fs::create_dir_all(&manifests).expect("mkdir");
        fs::write(manifests.join("services.txt"), services).expect("write services");
        fs::write(manifests.join("modules.txt"), modules).expect("write modules");

        let mut config = AppConfig::default();
        config.components.manifest_dir = Some("manifests".to_string());
        config
    }

    #[test]
    fn exit_codes_follow_failure_kind() {
        let mismatch = anyhow::Error::new(TreeError::VersionMismatch { mismatches: vec![] });
        let cycle = anyhow::Error::new(TreeError::CyclicDependency { path: vec![] });
        let unresolved = anyhow::Error::new(TreeError::UnresolvedDependency {
            implementation: TypeName::from("a.B"),
            contract: TypeName::from("a.C"),
        });
        assert_eq!(exit_code(&mismatch), 2);
        assert_eq!(exit_code(&cycle), 3);
        assert_eq!(exit_code(&unresolved), 4);
        assert_eq!(exit_code(&anyhow::anyhow!("config broken")), 1);
    }

    #[test]
    fn whole_catalog_used_without_manifest_dir() {
        let catalog = catalog();
        let root = NamedLogger::root();
        let components = select_components(
            &AppConfig::default(),
            Path::new("."),
            &catalog,
            &Classifier::default(),
            &root,
        )
        .expect("components");
        assert!(components
            .iter()
            .any(|c| c.name().as_str() == greeter::WELCOME));
        assert!(components.iter().any(|c| c.name().as_str() == ROOT_LOGGER));
    }

    #[test]
    fn manifest_selects_subset_and_tree_starts() {
        let dir = tempdir().expect("temp dir");
        let config = config_with_manifests(
            dir.path(),
            "wirekit.logging.Logger\ngreeter.Greeter\n",
            "wirekit.logging.RootLogger\ngreeter.PlainGreeter\ngreeter.Welcome\n",
        );
        let _ = catalog();

        let root = NamedLogger::root();
        let tree = build_tree(&config, dir.path(), &root).expect("tree builds");
        tree.instantiate_all().expect("instantiation");

        let names: Vec<String> = tree
            .implementations()
            .map(|n| n.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "greeter.PlainGreeter",
                "greeter.Welcome",
                "wirekit.logging.RootLogger"
            ]
        );
        let shared = tree
            .service_instance("wirekit.logging.Logger")
            .and_then(|i| i.get::<NamedLogger>())
            .expect("root logger shared");
        assert!(shared.same_logger(&root));
    }

    #[test]
    fn missing_contract_maps_to_exit_code_four() {
        let dir = tempdir().expect("temp dir");
        // TimedGreeter needs the clock, which the manifest leaves out.
        let config = config_with_manifests(
            dir.path(),
            "greeter.Greeter\n",
            "greeter.TimedGreeter\n",
        );
        let _ = catalog();

        let err = build_tree(&config, dir.path(), &NamedLogger::root()).unwrap_err();
        assert_eq!(exit_code(&err), 4);
    }
}
