//! Demonstration components: a unique clock, two greeter implementations and
//! a welcome module wiring them together with the root logger.

// === CONTRACTS ===
pub mod contracts;
pub use contracts::{Clock, Greeter};

// === REGISTRATION ===
// Type descriptors submitted to the wirekit catalog.
pub mod module;
pub use module::{CLOCK, GREETER, PLAIN_GREETER, SYSTEM_CLOCK, TIMED_GREETER, WELCOME};

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod domain;
pub use domain::welcome::Welcome;
