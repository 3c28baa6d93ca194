pub mod builtins;
pub mod runtime_error;
pub mod trace;
pub mod vm;
