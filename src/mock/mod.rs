mod driver;

pub use driver::{DriverCall, MockDriver, MockHandle};
