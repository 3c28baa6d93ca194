use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::bytecode::code::Code;
use crate::runtime::runtime_error::{RuntimeError, type_error};

/// Runtime value in the Rill language.
///
/// The variant set is closed: every operation below is one exhaustive match,
/// so adding a variant is a compile-time-checked exercise across all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value.
    Bool(bool),

    /// Machine-width integer. Arithmetic is overflow-checked; on overflow the
    /// operation transparently retries with both operands promoted to `Long`.
    Int(i64),

    /// Arbitrary-precision integer. Never overflows.
    Long(BigInt),

    /// UTF-8 string value.
    Str(String),

    /// The single null value, also the implicit return of every function.
    None,

    /// Native function exposed through the builtins registry.
    Builtin(BuiltinFn),

    /// User-defined function: a reference to its compiled body.
    Function(Arc<Code>),

    /// Compiled code unit. Internal only; programs cannot construct one, it
    /// exists solely as the constant operand of `MAKE_FUNCTION`.
    Code(Arc<Code>),
}

/// The native callbacks reachable from the builtins registry.
///
/// A closed enum rather than a function pointer keeps `Value` serializable
/// and comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltinFn {
    /// `str(x)`: render any value as a string.
    Str,
}

impl BuiltinFn {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinFn::Str => "str",
        }
    }

    /// Invoke the native callback. Arguments arrive in declaration order.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        match self {
            BuiltinFn::Str => match args {
                [value] => Ok(Value::Str(value.str())),
                _ => Err(type_error(format!(
                    "str() takes exactly one argument ({} given)",
                    args.len()
                ))),
            },
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Str(_) => "str",
            Value::None => "None",
            Value::Builtin(_) => "builtin function",
            Value::Function(_) => "function",
            Value::Code(_) => "code",
        }
    }

    // Arithmetic.
    //
    // `Int` ⊕ `Int` uses checked machine arithmetic and falls back to `BigInt`
    // when the checked form overflows; the promotion is invisible to the
    // caller. Any `Long` operand forces big arithmetic outright.

    pub fn add(&self, other: &Value) -> Result<Value, RuntimeError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(match a.checked_add(*b) {
                Some(n) => Value::Int(n),
                None => Value::Long(BigInt::from(*a) + BigInt::from(*b)),
            }),
            (Value::Int(_) | Value::Long(_), Value::Int(_) | Value::Long(_)) => {
                Ok(Value::Long(self.to_big() + other.to_big()))
            }
            (Value::Str(a), Value::Str(b)) => {
                let mut s = String::with_capacity(a.len() + b.len());
                s.push_str(a);
                s.push_str(b);
                Ok(Value::Str(s))
            }
            _ => Err(type_error(format!(
                "cannot add {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value, RuntimeError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(match a.checked_sub(*b) {
                Some(n) => Value::Int(n),
                None => Value::Long(BigInt::from(*a) - BigInt::from(*b)),
            }),
            (Value::Int(_) | Value::Long(_), Value::Int(_) | Value::Long(_)) => {
                Ok(Value::Long(self.to_big() - other.to_big()))
            }
            _ => Err(type_error(format!(
                "cannot subtract {} from {}",
                other.type_name(),
                self.type_name()
            ))),
        }
    }

    pub fn mul(&self, other: &Value) -> Result<Value, RuntimeError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(match a.checked_mul(*b) {
                Some(n) => Value::Int(n),
                None => Value::Long(BigInt::from(*a) * BigInt::from(*b)),
            }),
            (Value::Int(_) | Value::Long(_), Value::Int(_) | Value::Long(_)) => {
                Ok(Value::Long(self.to_big() * other.to_big()))
            }
            (Value::Str(s), Value::Int(n)) => {
                if *n < 0 {
                    return Err(type_error("string repetition count must be non-negative"));
                }
                Ok(Value::Str(s.repeat(*n as usize)))
            }
            _ => Err(type_error(format!(
                "cannot multiply {} by {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    // Comparison.
    //
    // Only `gt` and `eq` are primitive; `le`, `lt` and `ge` derive from them.
    // The derived forms short-circuit on `eq`, so comparing two equal values
    // of an unordered type succeeds while comparing two unequal ones fails.

    /// Language equality: numeric across `Int`/`Long`, structural for the
    /// data kinds, reference identity for functions and code. Total; never
    /// fails.
    pub fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Int(a), Value::Long(b)) => &BigInt::from(*a) == b,
            (Value::Long(a), Value::Int(b)) => a == &BigInt::from(*b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::None, Value::None) => true,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Code(a), Value::Code(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn ne(&self, other: &Value) -> bool {
        !self.eq(other)
    }

    /// Primitive ordering. Only integers are ordered.
    pub fn gt(&self, other: &Value) -> Result<bool, RuntimeError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a > b),
            (Value::Int(_) | Value::Long(_), Value::Int(_) | Value::Long(_)) => {
                Ok(self.to_big() > other.to_big())
            }
            _ => Err(type_error(format!(
                "cannot order {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    pub fn le(&self, other: &Value) -> Result<bool, RuntimeError> {
        Ok(!self.gt(other)?)
    }

    pub fn lt(&self, other: &Value) -> Result<bool, RuntimeError> {
        if self.eq(other) {
            return Ok(false);
        }
        self.le(other)
    }

    pub fn ge(&self, other: &Value) -> Result<bool, RuntimeError> {
        if self.eq(other) {
            return Ok(true);
        }
        Ok(!self.lt(other)?)
    }

    /// Truthiness: numbers are false at zero, strings when empty, `None`
    /// always; functions and code are always true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Long(n) => !n.is_zero(),
            Value::Str(s) => !s.is_empty(),
            Value::None => false,
            Value::Builtin(_) | Value::Function(_) | Value::Code(_) => true,
        }
    }

    /// Render the value the way `PRINT` and the `str` builtin show it.
    pub fn str(&self) -> String {
        match self {
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Long(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::None => "None".to_string(),
            Value::Builtin(f) => format!("<builtin {}>", f.name()),
            Value::Function(_) => "<function>".to_string(),
            Value::Code(_) => "<code>".to_string(),
        }
    }

    fn to_big(&self) -> BigInt {
        match self {
            Value::Int(n) => BigInt::from(*n),
            Value::Long(n) => n.clone(),
            _ => unreachable!("to_big on non-numeric value"),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    #[test]
    fn test_int_add() {
        assert_eq!(int(2).add(&int(3)).unwrap(), int(5));
    }

    #[test]
    fn test_add_overflow_promotes_to_long() {
        let result = int(i64::MAX).add(&int(1)).unwrap();
        // The exact decimal successor, never a wrapped machine value.
        assert_eq!(result.str(), "9223372036854775808");
        assert!(matches!(result, Value::Long(_)));
    }

    #[test]
    fn test_sub_overflow_promotes_to_long() {
        let result = int(i64::MIN).sub(&int(1)).unwrap();
        assert_eq!(result.str(), "-9223372036854775809");
        assert!(matches!(result, Value::Long(_)));
    }

    #[test]
    fn test_mul_overflow_promotes_to_long() {
        let result = int(i64::MAX).mul(&int(2)).unwrap();
        assert_eq!(result.str(), "18446744073709551614");
    }

    #[test]
    fn test_long_arithmetic_mixes_with_int() {
        let big = int(i64::MAX).add(&int(1)).unwrap();
        let back = big.sub(&int(1)).unwrap();
        assert_eq!(back.str(), i64::MAX.to_string());
        assert!(big.gt(&int(5)).unwrap());
        assert!(big.eq(&big.clone()));
    }

    #[test]
    fn test_add_type_error() {
        let err = s("a").add(&int(1)).unwrap_err();
        assert_eq!(err.kind, crate::runtime::runtime_error::ErrorKind::Type);
    }

    #[test]
    fn test_str_concat() {
        assert_eq!(s("foo").add(&s("bar")).unwrap(), s("foobar"));
    }

    #[test]
    fn test_str_repeat() {
        assert_eq!(s("ab").mul(&int(3)).unwrap(), s("ababab"));
        assert_eq!(s("ab").mul(&int(0)).unwrap(), s(""));
    }

    #[test]
    fn test_str_repeat_negative_fails() {
        assert!(s("ab").mul(&int(-1)).is_err());
    }

    #[test]
    fn test_derived_ordering_matches_primitives() {
        let pairs = [(0, 0), (0, 1), (1, 0), (-3, 7), (7, -3), (5, 5)];
        for (a, b) in pairs {
            let (a, b) = (int(a), int(b));
            // le is exactly "not gt"; ge is "eq or not lt".
            assert_eq!(a.le(&b).unwrap(), !a.gt(&b).unwrap());
            assert_eq!(a.ge(&b).unwrap(), a.eq(&b) || !a.lt(&b).unwrap());
        }
    }

    #[test]
    fn test_loop_bound_comparison() {
        assert!(int(2).lt(&int(3)).unwrap());
        assert!(!int(3).lt(&int(3)).unwrap());
        assert!(!int(4).lt(&int(3)).unwrap());
    }

    #[test]
    fn test_unordered_comparison_asymmetry() {
        // Equal unordered values short-circuit through eq; unequal ones fail.
        assert!(!s("a").lt(&s("a")).unwrap());
        assert!(s("a").ge(&s("a")).unwrap());
        assert!(s("a").lt(&s("b")).is_err());
        assert!(s("a").le(&s("a")).is_err());
    }

    #[test]
    fn test_truthiness() {
        assert!(!int(0).truthy());
        assert!(int(-1).truthy());
        assert!(!s("").truthy());
        assert!(s("x").truthy());
        assert!(!Value::None.truthy());
        assert!(Value::Builtin(BuiltinFn::Str).truthy());
        assert!(!Value::Long(BigInt::from(0)).truthy());
    }

    #[test]
    fn test_builtin_str() {
        let f = BuiltinFn::Str;
        assert_eq!(f.invoke(&[int(42)]).unwrap(), s("42"));
        assert!(f.invoke(&[]).is_err());
        assert!(f.invoke(&[int(1), int(2)]).is_err());
    }

    #[test]
    fn test_numeric_eq_across_widths() {
        let one_long = Value::Long(BigInt::from(1));
        assert!(int(1).eq(&one_long));
        assert!(one_long.eq(&int(1)));
        assert!(int(1).ne(&s("1")));
    }
}
