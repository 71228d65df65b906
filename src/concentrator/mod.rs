#[cfg(feature = "embedded")]
pub mod driver;
pub mod traits;

#[cfg(feature = "embedded")]
pub use driver::{Sx1308, Sx1308Pins};
pub use traits::{Concentrator, ConcentratorError, TxMode};
