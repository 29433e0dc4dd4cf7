mod nom_parser;
pub mod tags;
mod types;

pub use self::nom_parser::{tokenize, LineParts};
pub use self::tags::Tags;
pub use self::types::ParsedLine;
