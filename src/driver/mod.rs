//! Browser/UI driver abstraction.

pub(crate) mod error;
pub(crate) mod locator;
pub(crate) mod traits;

pub use error::DriverError;
pub use locator::{Action, Condition, Locator};
pub use traits::{BrowserDriver, Verdict};
