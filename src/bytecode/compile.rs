use crate::bytecode::code::{Code, CodeBuilder};
use crate::bytecode::compile_error::CompileError;
use crate::parse::grammar::Grammar;

/// Source compilation entry point: parse a whole program and lower its
/// top-level statements into one code unit.
///
/// Fails with [`CompileError::Syntax`] carrying the unconsumed suffix when
/// the grammar's root rule does not consume the entire input.
pub fn compile(source: &str) -> Result<Code, CompileError> {
    let statements = Grammar::new().parse(source)?;
    let mut builder = CodeBuilder::new();
    let mut flags = 0;
    for statement in &statements {
        flags = statement.compile(&mut builder, flags)?;
    }
    Ok(builder.finish(flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::op;
    use crate::lang::value::Value;

    #[test]
    fn test_compile_simple_program() {
        let code = compile("x := 3\nprint x\n").unwrap();
        assert_eq!(
            code.bytecode,
            vec![
                op::LOAD_CONST,
                0,
                op::STORE_NAME,
                1,
                op::LOAD_NAME,
                1,
                op::PRINT
            ]
        );
        assert_eq!(
            code.consts,
            vec![Value::Int(3), Value::Str("x".to_string())]
        );
    }

    #[test]
    fn test_trailing_garbage_is_a_syntax_error() {
        let err = compile("x := 3\n???").unwrap_err();
        let CompileError::Syntax(err) = err else {
            panic!("expected a syntax error, got {:?}", err);
        };
        assert_eq!(err.rest, "???");
    }

    #[test]
    fn test_repeated_literals_share_a_pool_slot() {
        let with_one = compile("print 'abc'\n").unwrap();
        let with_two = compile("print 'abc'\nprint 'abc'\n").unwrap();
        assert_eq!(with_one.consts.len(), with_two.consts.len());
    }

    #[test]
    fn test_constant_pool_limit_is_explicit() {
        let mut source = String::new();
        for i in 0..300 {
            source.push_str(&format!("x := {}\n", i));
        }
        let err = compile(&source).unwrap_err();
        assert!(matches!(err, CompileError::TooManyConstants { .. }));
    }

    #[test]
    fn test_while_program_sets_jump_flag() {
        let code = compile("x := 0\nwhile x < 3:\nx := x + 1\n.\n").unwrap();
        assert!(code.contains_jump());
    }

    #[test]
    fn test_straight_line_program_has_no_jump_flag() {
        let code = compile("x := 1\nprint x\n").unwrap();
        assert!(!code.contains_jump());
    }
}
