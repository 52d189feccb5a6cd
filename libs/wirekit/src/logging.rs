//! Logging sink contract and the hierarchical logger the runtime ships with.
//!
//! The tree reports everything through a [`Logger`]. [`NamedLogger`] is the
//! built-in implementation: a root logger with named children, where each
//! message is delivered synchronously to the listeners of the emitting logger
//! and then to those of every ancestor. [`tracing_listener`] forwards messages
//! into `tracing`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, RwLock};

use crate::catalog::ComponentRegistration;
use crate::component::{Constructor, TypeInfo};
use crate::instance::Instance;
use crate::version::Version;

/// Qualified name of the logger contract.
pub const LOGGER_CONTRACT: &str = "wirekit.logging.Logger";
/// Qualified name of the root logger implementation.
pub const ROOT_LOGGER: &str = "wirekit.logging.RootLogger";

/// Message importance, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    /// True when `self` is as severe as `threshold` or more.
    pub fn is_at_least(self, threshold: Level) -> bool {
        self >= threshold
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        })
    }
}

/// A message as seen by listeners.
#[derive(Debug, Clone, Copy)]
pub struct LogMessage<'a> {
    /// Full name of the logger the message was emitted on.
    pub logger: &'a str,
    pub level: Level,
    pub message: &'a str,
    pub cause: Option<&'a anyhow::Error>,
}

pub type Listener = Arc<dyn Fn(&LogMessage<'_>) + Send + Sync>;
pub type LevelFilter = Arc<dyn Fn(Level) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The logging sink contract consumed by the dependency tree.
pub trait Logger: Send + Sync {
    /// `""` for the root, `name` for its children, `parent/name` below that.
    fn full_name(&self) -> &str;

    /// Returns the child logger called `name`, creating it if needed.
    fn child(&self, name: &str) -> Arc<dyn Logger>;

    /// Receives messages of this logger and all its descendants whose level passes `filter`.
    fn add_listener(&self, listener: Listener, filter: LevelFilter) -> ListenerId;

    /// Silently ignores unknown ids.
    fn remove_listener(&self, id: ListenerId);

    fn log(&self, level: Level, message: &str);

    fn log_with_cause(&self, level: Level, message: &str, cause: &anyhow::Error);
}

static NEXT_LISTENER: AtomicU64 = AtomicU64::new(1);

struct LoggerNode {
    full_name: String,
    parent: Option<Arc<LoggerNode>>,
    children: Mutex<HashMap<String, Weak<LoggerNode>>>,
    listeners: RwLock<Vec<(ListenerId, Listener, LevelFilter)>>,
}

impl LoggerNode {
    fn deliver(&self, message: &LogMessage<'_>) {
        let mut current = Some(self);
        while let Some(node) = current {
            // Snapshot so listeners may register or remove listeners themselves.
            let listeners: Vec<(Listener, LevelFilter)> = node
                .listeners
                .read()
                .iter()
                .map(|(_, l, f)| (l.clone(), f.clone()))
                .collect();
            for (listener, filter) in listeners {
                if filter(message.level) {
                    listener(message);
                }
            }
            current = node.parent.as_deref();
        }
    }
}

/// Hierarchical logger handle. Clones refer to the same logger.
#[derive(Clone)]
pub struct NamedLogger {
    node: Arc<LoggerNode>,
}

impl NamedLogger {
    pub fn root() -> Self {
        Self {
            node: Arc::new(LoggerNode {
                full_name: String::new(),
                parent: None,
                children: Mutex::new(HashMap::new()),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Same as [`Logger::child`], without type erasure.
    pub fn named_child(&self, name: &str) -> NamedLogger {
        let mut children = self.node.children.lock();
        if let Some(existing) = children.get(name).and_then(Weak::upgrade) {
            return NamedLogger { node: existing };
        }

        let full_name = if self.node.parent.is_none() {
            name.to_string()
        } else {
            format!("{}/{}", self.node.full_name, name)
        };
        let node = Arc::new(LoggerNode {
            full_name,
            parent: Some(self.node.clone()),
            children: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
        });
        children.insert(name.to_string(), Arc::downgrade(&node));
        NamedLogger { node }
    }

    pub fn same_logger(&self, other: &NamedLogger) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Wraps this logger as an instance exposing the logger contract view.
    pub fn to_instance(&self) -> Instance {
        let handle = Arc::new(self.clone());
        Instance::from_arc(handle.clone()).provide::<dyn Logger>(handle)
    }
}

impl Logger for NamedLogger {
    fn full_name(&self) -> &str {
        &self.node.full_name
    }

    fn child(&self, name: &str) -> Arc<dyn Logger> {
        Arc::new(self.named_child(name))
    }

    fn add_listener(&self, listener: Listener, filter: LevelFilter) -> ListenerId {
        let id = ListenerId(NEXT_LISTENER.fetch_add(1, Ordering::Relaxed));
        self.node.listeners.write().push((id, listener, filter));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.node.listeners.write().retain(|(lid, _, _)| *lid != id);
    }

    fn log(&self, level: Level, message: &str) {
        self.node.deliver(&LogMessage {
            logger: &self.node.full_name,
            level,
            message,
            cause: None,
        });
    }

    fn log_with_cause(&self, level: Level, message: &str, cause: &anyhow::Error) {
        self.node.deliver(&LogMessage {
            logger: &self.node.full_name,
            level,
            message,
            cause: Some(cause),
        });
    }
}

impl fmt::Debug for NamedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedLogger")
            .field("full_name", &self.node.full_name)
            .finish()
    }
}

/// Accepts every level.
pub fn all_levels() -> LevelFilter {
    Arc::new(|_| true)
}

/// Accepts `threshold` and anything more severe.
pub fn at_least(threshold: Level) -> LevelFilter {
    Arc::new(move |level| level.is_at_least(threshold))
}

/// Listener forwarding every message to `tracing`.
pub fn tracing_listener() -> Listener {
    Arc::new(|msg: &LogMessage<'_>| {
        let logger = if msg.logger.is_empty() {
            "root"
        } else {
            msg.logger
        };
        match (msg.level, msg.cause) {
            (Level::Debug, None) => tracing::debug!(logger, "{}", msg.message),
            (Level::Debug, Some(e)) => tracing::debug!(logger, error = %format!("{e:#}"), "{}", msg.message),
            (Level::Info, None) => tracing::info!(logger, "{}", msg.message),
            (Level::Info, Some(e)) => tracing::info!(logger, error = %format!("{e:#}"), "{}", msg.message),
            (Level::Warning, None) => tracing::warn!(logger, "{}", msg.message),
            (Level::Warning, Some(e)) => tracing::warn!(logger, error = %format!("{e:#}"), "{}", msg.message),
            (Level::Error, None) => tracing::error!(logger, "{}", msg.message),
            (Level::Error, Some(e)) => tracing::error!(logger, error = %format!("{e:#}"), "{}", msg.message),
        }
    })
}

/// The logger contract: unique, version 1.0.
pub fn logger_contract() -> Arc<TypeInfo> {
    static CONTRACT: OnceLock<Arc<TypeInfo>> = OnceLock::new();
    CONTRACT
        .get_or_init(|| {
            TypeInfo::contract(LOGGER_CONTRACT, Version::new(1, 0))
                .unique()
                .build()
        })
        .clone()
}

/// The root logger implementation. Hosts normally seed its node with their
/// own root; if they don't, the tree builds a fresh one.
pub fn root_logger_type() -> Arc<TypeInfo> {
    static ROOT: OnceLock<Arc<TypeInfo>> = OnceLock::new();
    ROOT.get_or_init(|| {
        TypeInfo::module(
            ROOT_LOGGER,
            Constructor::new(|_| Ok(NamedLogger::root().to_instance())),
        )
        .implements(&logger_contract())
        .build()
    })
    .clone()
}

inventory::submit! { ComponentRegistration(logger_contract) }
inventory::submit! { ComponentRegistration(root_logger_type) }
