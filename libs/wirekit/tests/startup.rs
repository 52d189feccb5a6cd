//! End-to-end startup: link-time registration, manifest selection, tree
//! construction and instantiation.

use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::tempdir;

use wirekit::logging::{all_levels, LOGGER_CONTRACT, ROOT_LOGGER};
use wirekit::manifest::{MODULES_FILE, SERVICES_FILE};
use wirekit::{
    Classifier, ComponentRegistration, Constructor, DependencyTree, Instance, Level, LogMessage,
    Logger, Manifest, NamedLogger, Node, TypeCatalog, TypeInfo, Version,
};

// ---------- Test components (module scope for `inventory`) ----------

trait Journal: Send + Sync {
    fn record(&self, entry: &str);
    fn entries(&self) -> Vec<String>;
}

#[derive(Default)]
struct MemoryJournal {
    entries: Mutex<Vec<String>>,
}

impl Journal for MemoryJournal {
    fn record(&self, entry: &str) {
        self.entries.lock().push(entry.to_string());
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

fn journal_contract() -> Arc<TypeInfo> {
    TypeInfo::contract("it.Journal", Version::new(1, 1))
        .unique()
        .build()
}

fn memory_journal() -> Arc<TypeInfo> {
    TypeInfo::module(
        "it.MemoryJournal",
        Constructor::new(|args| {
            let logger = args.service::<dyn Logger>(0)?;
            logger.log(Level::Info, "journal ready");
            let journal = Arc::new(MemoryJournal::default());
            Ok(Instance::from_arc(journal.clone()).provide::<dyn Journal>(journal))
        })
        .param(LOGGER_CONTRACT, Version::new(1, 0)),
    )
    .implements(&journal_contract())
    .build()
}

fn reporter() -> Arc<TypeInfo> {
    TypeInfo::module(
        "it.Reporter",
        Constructor::new(|args| {
            let journal = args.service::<dyn Journal>(0)?;
            journal.record("reporter started");
            Ok(Instance::new(()))
        })
        .param("it.Journal", Version::new(1, 0)),
    )
    .build()
}

fn unlisted() -> Arc<TypeInfo> {
    TypeInfo::module("it.Unlisted", Constructor::new(|_| Ok(Instance::new(())))).build()
}

inventory::submit! { ComponentRegistration(journal_contract) }
inventory::submit! { ComponentRegistration(memory_journal) }
inventory::submit! { ComponentRegistration(reporter) }
inventory::submit! { ComponentRegistration(unlisted) }

type Records = Arc<Mutex<Vec<(String, Level, String)>>>;

fn recording_root() -> (NamedLogger, Records) {
    let root = NamedLogger::root();
    let records: Records = Arc::new(Mutex::new(Vec::new()));
    let sink = records.clone();
    root.add_listener(
        Arc::new(move |m: &LogMessage<'_>| {
            sink.lock()
                .push((m.logger.to_string(), m.level, m.message.to_string()));
        }),
        all_levels(),
    );
    (root, records)
}

fn journal_entries(tree: &DependencyTree) -> Vec<String> {
    tree.service_instance("it.Journal")
        .and_then(|i| i.get::<dyn Journal>())
        .expect("journal built")
        .entries()
}

#[test]
fn manifest_selects_components_and_tree_starts() {
    let dir = tempdir().expect("temp dir");
    fs::write(
        dir.path().join(SERVICES_FILE),
        format!("{LOGGER_CONTRACT}\nit.Journal\n"),
    )
    .expect("write services");
    fs::write(
        dir.path().join(MODULES_FILE),
        format!("{ROOT_LOGGER}\nit.MemoryJournal\nit.Reporter\nit.Ghost\n"),
    )
    .expect("write modules");

    let catalog = TypeCatalog::discover();
    assert!(catalog.get("it.Unlisted").is_some());

    let (root, records) = recording_root();
    let core = root.child("Core");
    let manifest = Manifest::read_dir(dir.path()).expect("manifest");
    let classifier = Classifier::default();
    let components = manifest.resolve(&catalog, &classifier, core.as_ref());

    let tree = DependencyTree::builder(core.clone())
        .extend(components)
        .build()
        .expect("tree builds");
    tree.seed_instance(ROOT_LOGGER, root.to_instance())
        .expect("seed root logger");
    tree.instantiate_all().expect("instantiation");

    assert!(tree.implementation_node("it.Unlisted").is_none());
    assert_eq!(journal_entries(&tree), vec!["reporter started"]);

    let records = records.lock();
    assert!(records.contains(&(
        "Core".to_string(),
        Level::Warning,
        "Manifest lists unknown component it.Ghost".to_string()
    )));
    // The journal logged through the seeded root.
    assert!(records.contains(&(String::new(), Level::Info, "journal ready".to_string())));
}

#[test]
fn whole_catalog_is_used_without_manifest() {
    let catalog = TypeCatalog::discover();
    let classifier = Classifier::default();
    let (root, _) = recording_root();

    let tree = DependencyTree::builder(root.child("Core"))
        .extend(catalog.classify_all(&classifier))
        .build()
        .expect("tree builds");
    tree.seed_instance(ROOT_LOGGER, root.to_instance())
        .expect("seed root logger");
    tree.instantiate_all().expect("instantiation");

    let built: Vec<String> = tree
        .implementations()
        .filter(|n| n.last_instance().is_some())
        .map(|n| n.name().to_string())
        .collect();
    for expected in ["it.MemoryJournal", "it.Reporter", "it.Unlisted", ROOT_LOGGER] {
        assert!(built.iter().any(|b| b == expected), "{expected} missing from {built:?}");
    }
    assert_eq!(journal_entries(&tree), vec!["reporter started"]);
}
