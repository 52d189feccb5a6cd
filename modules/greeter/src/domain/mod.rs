pub mod clock;
pub mod greeters;
pub mod welcome;
