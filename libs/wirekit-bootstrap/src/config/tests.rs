use super::*;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    let logging = config.logging.as_ref().expect("default logging");
    let default = logging.get("default").expect("default section");
    assert_eq!(default.console_level, "info");
    assert!(default.file.is_empty());

    assert_eq!(config.components.manifest_dir, None);
    assert_eq!(config.components.services_file, "services.txt");
    assert_eq!(config.components.modules_file, "modules.txt");

    assert!(!config.tree.strict_construction);
    assert!(config.tree.preferred.is_empty());
}

#[test]
fn test_yaml_serialization() {
    let config = AppConfig::default();
    let yaml = config.to_yaml().expect("Failed to serialize to YAML");

    assert!(yaml.contains("logging:"));
    assert!(yaml.contains("components:"));
    assert!(yaml.contains("tree:"));
    assert!(yaml.contains("strict_construction: false"));
}

#[test]
#[serial(env)]
fn test_layered_loading_yaml_only() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("wirekit.yaml");

    let yaml_content = r#"
logging:
  default:
    console_level: "warn"
    file: "logs/wirekit.log"
    file_level: "debug"
    max_backups: 5
  greeter:
    console_level: "debug"

components:
  manifest_dir: "manifests"

tree:
  strict_construction: true
  preferred:
    greeter.Greeter: greeter.TimedGreeter
"#;

    fs::write(&config_path, yaml_content).expect("Failed to write config file");

    let config = AppConfig::load_layered(&config_path).expect("Failed to load config");

    let logging = config.logging.as_ref().expect("logging present");
    assert_eq!(logging["default"].console_level, "warn");
    assert_eq!(logging["default"].max_backups, Some(5));
    assert_eq!(logging["greeter"].console_level, "debug");
    assert!(logging["greeter"].file.is_empty());

    assert_eq!(config.components.manifest_dir.as_deref(), Some("manifests"));
    // Unspecified fields keep their defaults.
    assert_eq!(config.components.services_file, "services.txt");

    assert!(config.tree.strict_construction);
    assert_eq!(
        config.tree.preferred.get("greeter.Greeter").map(String::as_str),
        Some("greeter.TimedGreeter")
    );
}

#[test]
#[serial(env)]
fn test_layered_loading_keeps_logging_unset() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("wirekit.yaml");
    fs::write(&config_path, "tree:\n  strict_construction: false\n").expect("write");

    let config = AppConfig::load_layered(&config_path).expect("Failed to load config");
    assert!(config.logging.is_none());
}

#[test]
#[serial(env)]
fn test_load_or_default_without_path() {
    let config = AppConfig::load_or_default::<&Path>(None).expect("defaults");
    assert!(config.logging.is_some());
    assert_eq!(config.components.manifest_dir, None);
}

#[test]
#[serial(env)]
fn test_env_layer_applies_without_config_file() {
    env::set_var("WIREKIT__TREE__STRICT_CONSTRUCTION", "true");
    env::set_var("WIREKIT__COMPONENTS__MANIFEST_DIR", "from-env");
    let loaded = AppConfig::load_or_default::<&Path>(None);
    env::remove_var("WIREKIT__TREE__STRICT_CONSTRUCTION");
    env::remove_var("WIREKIT__COMPONENTS__MANIFEST_DIR");

    let config = loaded.expect("defaults with env");
    assert!(config.tree.strict_construction);
    assert_eq!(config.components.manifest_dir.as_deref(), Some("from-env"));
    assert!(config.logging.is_some());
}

#[test]
#[serial(env)]
fn test_env_layer_overrides_yaml() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("wirekit.yaml");
    fs::write(&config_path, "tree:\n  strict_construction: false\n").expect("write");

    env::set_var("WIREKIT__TREE__STRICT_CONSTRUCTION", "true");
    let loaded = AppConfig::load_layered(&config_path);
    env::remove_var("WIREKIT__TREE__STRICT_CONSTRUCTION");

    assert!(loaded.expect("layered config").tree.strict_construction);
}

#[test]
fn test_cli_overrides() {
    let mut config = AppConfig::default();

    let args = CliArgs {
        manifest_dir: Some("/etc/wirekit".to_string()),
        verbose: 2,
        strict: true,
        ..CliArgs::default()
    };

    config.apply_cli_overrides(&args);

    assert_eq!(config.components.manifest_dir.as_deref(), Some("/etc/wirekit"));
    assert!(config.tree.strict_construction);
    let logging = config.logging.as_ref().expect("logging");
    assert_eq!(logging["default"].console_level, "trace");
}

#[test]
fn test_cli_overrides_verbose_levels() {
    let test_cases = vec![
        (0, "info"),  // Default, no change
        (1, "debug"), // One -v
        (2, "trace"), // Two -v
        (3, "trace"), // Three+ -v (capped at trace)
    ];

    for (verbose_level, expected_log_level) in test_cases {
        let mut config = AppConfig::default();
        let args = CliArgs {
            verbose: verbose_level,
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);

        let logging = config.logging.as_ref().expect("logging");
        assert_eq!(
            logging["default"].console_level, expected_log_level,
            "verbose level {verbose_level}"
        );
    }
}

#[test]
fn test_cli_overrides_create_logging_section() {
    let mut config = AppConfig {
        logging: None,
        ..AppConfig::default()
    };
    config.apply_cli_overrides(&CliArgs {
        verbose: 1,
        ..CliArgs::default()
    });
    let logging = config.logging.as_ref().expect("logging created");
    assert_eq!(logging["default"].console_level, "debug");
}

#[test]
#[serial(env)]
fn test_deny_unknown_fields() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("bad.yaml");
    fs::write(&config_path, "tree:\n  strict: true\n").expect("write");

    assert!(AppConfig::load_layered(&config_path).is_err());
}

#[test]
fn test_tree_options_conversion() {
    let mut tree = TreeConfig::default();
    tree.preferred
        .insert("greeter.Greeter".to_string(), "greeter.TimedGreeter".to_string());
    tree.strict_construction = true;

    let options = tree.to_options();
    assert!(options.strict_construction);
    assert_eq!(
        options.preferred.get("greeter.Greeter").map(TypeName::as_str),
        Some("greeter.TimedGreeter")
    );
}

#[test]
fn test_manifest_resolved_against_base_dir() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let manifests = temp_dir.path().join("manifests");
    fs::create_dir_all(&manifests).expect("mkdir");
    fs::write(manifests.join("services.txt"), "greeter.Greeter\n").expect("write");
    fs::write(manifests.join("modules.txt"), "greeter.PlainGreeter\n").expect("write");

    let components = ComponentsConfig {
        manifest_dir: Some("manifests".to_string()),
        ..ComponentsConfig::default()
    };
    let manifest = components
        .load_manifest(temp_dir.path())
        .expect("read")
        .expect("configured");
    assert_eq!(manifest.services().count(), 1);
    assert_eq!(manifest.modules().count(), 1);

    let unset = ComponentsConfig::default();
    assert!(unset.load_manifest(temp_dir.path()).expect("read").is_none());
}

#[test]
fn test_base_dir_follows_config_file() {
    let dir = base_dir(Some(Path::new("/opt/wirekit/wirekit.yaml")));
    assert_eq!(dir, PathBuf::from("/opt/wirekit"));
    assert!(base_dir(None).is_absolute());
}
