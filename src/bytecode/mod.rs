pub mod code;
pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod op;
