pub mod combinators;
pub mod grammar;
pub mod parse_error;
pub mod pattern;
