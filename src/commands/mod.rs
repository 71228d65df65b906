pub mod parser;
pub mod serialiser;
pub mod types;

pub use parser::CommandParser;
pub use serialiser::{AnswerFrame, AnswerSerialiser};
pub use types::{Command, ParseError};
