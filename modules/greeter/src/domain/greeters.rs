use std::sync::Arc;

use chrono::Timelike;
use wirekit::Factory;

use crate::contracts::{Clock, Greeter};

#[derive(Debug, Default)]
pub struct PlainGreeter;

impl Greeter for PlainGreeter {
    fn greet(&self, name: &str) -> String {
        format!("Hello, {name}!")
    }
}

/// Greets according to the time of day. The clock is resolved on first use
/// through a factory, so building this greeter never forces the clock.
pub struct TimedGreeter {
    clock: Factory,
}

impl TimedGreeter {
    pub fn new(clock: Factory) -> Self {
        Self { clock }
    }

    fn clock(&self) -> anyhow::Result<Arc<dyn Clock>> {
        self.clock.get::<dyn Clock>()
    }
}

/// Greeting for an hour of the day in `0..24`.
pub fn salutation(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=17 => "Good afternoon",
        18..=22 => "Good evening",
        _ => "Good night",
    }
}

impl Greeter for TimedGreeter {
    fn greet(&self, name: &str) -> String {
        match self.clock() {
            Ok(clock) => format!("{}, {name}!", salutation(clock.now().hour())),
            Err(e) => {
                tracing::warn!(error = %e, "clock unavailable, falling back to a plain greeting");
                PlainGreeter.greet(name)
            }
        }
    }
}
