use std::collections::HashMap;
use std::sync::OnceLock;

use crate::lang::value::{BuiltinFn, Value};

static BUILTINS: OnceLock<HashMap<&'static str, Value>> = OnceLock::new();

/// The process-wide builtins registry: construct-and-freeze, never mutated
/// after initialization, consulted only after the whole frame chain yields
/// nothing.
pub fn builtins() -> &'static HashMap<&'static str, Value> {
    BUILTINS.get_or_init(|| {
        let mut registry = HashMap::new();
        registry.insert("str", Value::Builtin(BuiltinFn::Str));
        registry.insert("None", Value::None);
        registry
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contents() {
        let registry = builtins();
        assert_eq!(registry.get("None"), Some(&Value::None));
        assert!(matches!(registry.get("str"), Some(Value::Builtin(_))));
        assert_eq!(registry.get("print"), None);
    }
}
