use std::sync::{Arc, OnceLock};

use wirekit::logging::LOGGER_CONTRACT;
use wirekit::{ComponentRegistration, Constructor, Instance, Logger, TypeInfo, Version};

use crate::contracts::{Clock, Greeter};
use crate::domain::clock::SystemClock;
use crate::domain::greeters::{PlainGreeter, TimedGreeter};
use crate::domain::welcome::Welcome;

pub const CLOCK: &str = "greeter.Clock";
pub const GREETER: &str = "greeter.Greeter";
pub const SYSTEM_CLOCK: &str = "greeter.SystemClock";
pub const PLAIN_GREETER: &str = "greeter.PlainGreeter";
pub const TIMED_GREETER: &str = "greeter.TimedGreeter";
pub const WELCOME: &str = "greeter.Welcome";

const CLOCK_VERSION: Version = Version::new(1, 0);
const GREETER_VERSION: Version = Version::new(1, 1);

pub fn clock_contract() -> Arc<TypeInfo> {
    static TYPE: OnceLock<Arc<TypeInfo>> = OnceLock::new();
    TYPE.get_or_init(|| TypeInfo::contract(CLOCK, CLOCK_VERSION).unique().build())
        .clone()
}

pub fn greeter_contract() -> Arc<TypeInfo> {
    static TYPE: OnceLock<Arc<TypeInfo>> = OnceLock::new();
    TYPE.get_or_init(|| TypeInfo::contract(GREETER, GREETER_VERSION).build())
        .clone()
}

pub fn system_clock() -> Arc<TypeInfo> {
    TypeInfo::module(
        SYSTEM_CLOCK,
        Constructor::new(|_| {
            let clock = Arc::new(SystemClock);
            Ok(Instance::from_arc(clock.clone()).provide::<dyn Clock>(clock))
        }),
    )
    .implements(&clock_contract())
    .build()
}

pub fn plain_greeter() -> Arc<TypeInfo> {
    TypeInfo::module(
        PLAIN_GREETER,
        Constructor::new(|_| {
            let greeter = Arc::new(PlainGreeter);
            Ok(Instance::from_arc(greeter.clone()).provide::<dyn Greeter>(greeter))
        }),
    )
    .implements(&greeter_contract())
    .build()
}

pub fn timed_greeter() -> Arc<TypeInfo> {
    TypeInfo::module(
        TIMED_GREETER,
        Constructor::new(|args| {
            let greeter = Arc::new(TimedGreeter::new(args.factory(0)?));
            Ok(Instance::from_arc(greeter.clone()).provide::<dyn Greeter>(greeter))
        })
        .lazy_param(CLOCK, CLOCK_VERSION),
    )
    .implements(&greeter_contract())
    .build()
}

pub fn welcome() -> Arc<TypeInfo> {
    TypeInfo::module(
        WELCOME,
        Constructor::new(|args| {
            let greeter = args.service::<dyn Greeter>(0)?;
            let logger = args.service::<dyn Logger>(1)?;
            Ok(Instance::new(Welcome::new(greeter, logger.as_ref())))
        })
        .param(GREETER, Version::new(1, 0))
        .param(LOGGER_CONTRACT, Version::new(1, 0)),
    )
    .build()
}

inventory::submit! { ComponentRegistration(clock_contract) }
inventory::submit! { ComponentRegistration(greeter_contract) }
inventory::submit! { ComponentRegistration(system_clock) }
inventory::submit! { ComponentRegistration(plain_greeter) }
inventory::submit! { ComponentRegistration(timed_greeter) }
inventory::submit! { ComponentRegistration(welcome) }

#[cfg(test)]
mod tests {
    use super::*;
    use wirekit::logging::{logger_contract, root_logger_type, ROOT_LOGGER};
    use wirekit::{Classifier, DependencyTree, NamedLogger, TreeOptions, TypeName};

    fn greeter_tree(options: TreeOptions, root: &NamedLogger) -> DependencyTree {
        let classifier = Classifier::default();
        let types = [
            logger_contract(),
            root_logger_type(),
            clock_contract(),
            greeter_contract(),
            system_clock(),
            plain_greeter(),
            timed_greeter(),
            welcome(),
        ];
        let tree = DependencyTree::builder(root.child("Core"))
            .options(options)
            .extend(types.iter().filter_map(|t| classifier.classify(t)))
            .build()
            .expect("greeter tree builds");
        tree.seed_instance(ROOT_LOGGER, root.to_instance())
            .expect("seed root logger");
        tree
    }

    fn welcome_message(tree: &DependencyTree) -> String {
        tree.implementation_node(WELCOME)
            .and_then(|n| n.last_instance())
            .and_then(|i| i.get::<Welcome>())
            .expect("welcome built")
            .message()
    }

    #[test]
    fn plain_greeter_is_preferred_by_default() {
        let root = NamedLogger::root();
        let tree = greeter_tree(TreeOptions::default(), &root);
        tree.instantiate_all().expect("instantiation");
        assert_eq!(welcome_message(&tree), "Hello, world!");
    }

    #[test]
    fn timed_greeter_can_be_preferred() {
        let root = NamedLogger::root();
        let mut options = TreeOptions::default();
        options
            .preferred
            .insert(TypeName::from(GREETER), TypeName::from(TIMED_GREETER));
        let tree = greeter_tree(options, &root);
        tree.instantiate_all().expect("instantiation");

        let message = welcome_message(&tree);
        assert!(message.starts_with("Good "), "{message}");
        assert!(message.ends_with(", world!"), "{message}");
        // The lazy clock was resolved to the one shared instance.
        assert!(tree.service_instance(CLOCK).is_some());
    }

    #[test]
    fn clock_is_unique_and_greeter_is_not() {
        assert!(clock_contract().is_unique());
        assert!(!greeter_contract().is_unique());
        assert_eq!(greeter_contract().version(), Some(GREETER_VERSION));
    }
}
