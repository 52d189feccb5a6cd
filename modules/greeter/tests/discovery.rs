use std::sync::Arc;

use parking_lot::Mutex;

use greeter::{Welcome, CLOCK, GREETER, PLAIN_GREETER, SYSTEM_CLOCK, WELCOME};
use wirekit::logging::{all_levels, LOGGER_CONTRACT, ROOT_LOGGER};
use wirekit::{
    Classifier, DependencyTree, Level, LogMessage, Logger, Manifest, NamedLogger, TypeCatalog,
};

#[test]
fn registered_components_are_discovered() {
    let catalog = TypeCatalog::discover();
    for name in [CLOCK, GREETER, SYSTEM_CLOCK, PLAIN_GREETER, WELCOME, LOGGER_CONTRACT] {
        assert!(catalog.get(name).is_some(), "{name} not registered");
    }
}

#[test]
fn manifest_subset_starts_and_greets() {
    let manifest = Manifest::parse(
        &format!("{LOGGER_CONTRACT}\n{GREETER}\n"),
        &format!("{ROOT_LOGGER}\n{PLAIN_GREETER}\n{WELCOME}\n"),
    );
    let catalog = TypeCatalog::discover();
    let classifier = Classifier::default();

    let root = NamedLogger::root();
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    root.add_listener(
        Arc::new(move |m: &LogMessage<'_>| {
            if m.level == Level::Info {
                sink.lock().push(format!("{}: {}", m.logger, m.message));
            }
        }),
        all_levels(),
    );

    let core = root.child("Core");
    let tree = DependencyTree::builder(core.clone())
        .extend(manifest.resolve(&catalog, &classifier, core.as_ref()))
        .build()
        .expect("tree builds");
    tree.seed_instance(ROOT_LOGGER, root.to_instance())
        .expect("seed root logger");
    tree.instantiate_all().expect("instantiation");

    assert!(tree.service_node(CLOCK).is_none());
    let welcome = tree
        .implementation_node(WELCOME)
        .and_then(|n| n.last_instance())
        .and_then(|i| i.get::<Welcome>())
        .expect("welcome built");
    assert_eq!(welcome.message(), "Hello, world!");
    assert!(messages
        .lock()
        .contains(&"Welcome: Hello, world!".to_string()));
}
