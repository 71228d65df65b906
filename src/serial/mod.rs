#[cfg(feature = "embedded")]
pub mod io;
pub mod reader;
pub mod traits;

#[cfg(feature = "embedded")]
pub use io::SerialIo;
pub use reader::{FrameReader, ReadResult};
pub use traits::{SerialError, SerialPort};
