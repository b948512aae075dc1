pub mod pace;

pub use pace::{FixedPace, NoPace, RatePolicy, Throttle};
