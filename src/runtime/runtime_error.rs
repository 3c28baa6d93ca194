/// What category of runtime failure occurred.
///
/// The VM never recovers from either kind internally; both propagate out of
/// `execute` to the caller. Integer overflow is *not* represented here: it is
/// handled inside the object model by promoting to `Long` and never surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An operation was invoked on a value that does not support it.
    Type,
    /// A name lookup missed the frame chain and the builtins registry.
    Name,
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.kind {
            ErrorKind::Type => "type error",
            ErrorKind::Name => "name error",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

impl std::error::Error for RuntimeError {}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
        }
    }
}

pub fn type_error(message: impl Into<String>) -> RuntimeError {
    RuntimeError::new(ErrorKind::Type, message)
}

pub fn unknown_name(name: &str) -> RuntimeError {
    RuntimeError::new(ErrorKind::Name, format!("name '{}' is not defined", name))
}
