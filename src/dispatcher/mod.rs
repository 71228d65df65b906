pub mod event_loop;
pub mod handler;
pub mod notify;

pub use event_loop::{DeviceBridge, Served};
pub use handler::{CommandDispatcher, DispatcherConfig, Outcome};
pub use notify::TxDoneFlag;
