//! Host side of the concentrator command bridge
//!
//! [`BridgeSession`] owns the serial link to the bridge firmware and exposes
//! register and gateway commands as blocking calls. It is safe to share
//! between threads.

pub mod error;
pub mod logging;
pub mod mcu;
pub mod registers;
pub mod selftest;
pub mod session;
pub mod transport;

pub use error::{BridgeError, Result};
pub use mcu::RxPacket;
pub use session::{Answer, BridgeConfig, BridgeSession, ExchangeState};
pub use transport::Transport;
