use chrono::{DateTime, Local};

/// Source of the current local time. Registered as a unique contract, so the
/// whole process shares one clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Produces a greeting for a name.
pub trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}
