pub mod ast;
pub mod value;
