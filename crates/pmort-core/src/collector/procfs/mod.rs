//! Load sampling from the Linux `/proc` filesystem.

pub mod load;
pub mod parser;

pub use load::{LoadError, LoadSource, ProcLoadSource};
pub use parser::{LoadAvg, ParseError, parse_loadavg};
