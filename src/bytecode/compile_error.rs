use crate::parse::parse_error::SyntaxError;

/// Errors surfaced by the source-to-bytecode pipeline.
///
/// `Syntax` is user-facing; the remaining variants are contract limits of the
/// one-byte operand encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// The grammar's root rule matched but left input unconsumed.
    /// Carries the unconsumed suffix.
    Syntax(SyntaxError),

    /// A code unit needs more than 256 constant-pool slots.
    TooManyConstants { count: usize },

    /// A call site passes more than 256 arguments.
    TooManyArguments { count: usize },

    /// A function declares more than 256 parameters.
    TooManyParameters { name: String, count: usize },

    /// A jump target or offset does not fit in the one operand byte.
    JumpTooFar { target: usize },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Syntax(err) => write!(f, "syntax error: {}", err),
            CompileError::TooManyConstants { count } => {
                write!(f, "constant pool overflow: {} entries (limit 256)", count)
            }
            CompileError::TooManyArguments { count } => {
                write!(f, "too many call arguments: {} (limit 256)", count)
            }
            CompileError::TooManyParameters { name, count } => {
                write!(
                    f,
                    "function '{}' declares too many parameters: {} (limit 256)",
                    name, count
                )
            }
            CompileError::JumpTooFar { target } => {
                write!(f, "jump target {} does not fit in one operand byte", target)
            }
        }
    }
}

impl std::error::Error for CompileError {}

impl From<SyntaxError> for CompileError {
    fn from(err: SyntaxError) -> Self {
        CompileError::Syntax(err)
    }
}
