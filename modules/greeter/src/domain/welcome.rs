use std::sync::Arc;

use wirekit::{Level, Logger};

use crate::contracts::Greeter;

/// Greets the configured audience once at startup and keeps the message.
pub struct Welcome {
    greeter: Arc<dyn Greeter>,
    audience: String,
}

impl Welcome {
    pub const DEFAULT_AUDIENCE: &'static str = "world";

    pub fn new(greeter: Arc<dyn Greeter>, logger: &dyn Logger) -> Self {
        let welcome = Self {
            greeter,
            audience: Self::DEFAULT_AUDIENCE.to_string(),
        };
        logger
            .child("Welcome")
            .log(Level::Info, &welcome.message());
        welcome
    }

    pub fn message(&self) -> String {
        self.greeter.greet(&self.audience)
    }
}
