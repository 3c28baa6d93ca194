use std::sync::Arc;

use crate::bytecode::code::{CodeBuilder, FLAG_CONTAINS_JUMP};
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::op;
use crate::lang::value::Value;

/// Binary operators of the surface syntax, each mapping to one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn from_symbol(symbol: &str) -> Option<BinOp> {
        Some(match symbol {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "<" => BinOp::Lt,
            "<=" => BinOp::Le,
            ">" => BinOp::Gt,
            ">=" => BinOp::Ge,
            _ => return None,
        })
    }

    pub fn opcode(&self) -> u8 {
        match self {
            BinOp::Add => op::ADD,
            BinOp::Sub => op::SUB,
            BinOp::Mul => op::MUL,
            BinOp::Eq => op::EQ,
            BinOp::Ne => op::NE,
            BinOp::Lt => op::LT,
            BinOp::Le => op::LE,
            BinOp::Gt => op::GT,
            BinOp::Ge => op::GE,
        }
    }
}

/// A node of the abstract syntax tree.
///
/// The set is closed; each node owns its children exclusively (a tree, no
/// sharing). `compile` appends opcodes to the builder, registers constants
/// into its pool, and threads the flags bitmask through, returning the
/// updated mask.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Assign {
        name: String,
        expr: Box<Node>,
    },
    BinaryOp {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    Const(Value),
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<Node>,
    },
    If {
        condition: Box<Node>,
        body: Vec<Node>,
    },
    IfElse {
        condition: Box<Node>,
        body: Vec<Node>,
        else_body: Vec<Node>,
    },
    Name(String),
    Print(Box<Node>),
    Return(Box<Node>),
    While {
        condition: Box<Node>,
        body: Vec<Node>,
    },
}

impl Node {
    pub fn compile(&self, b: &mut CodeBuilder, flags: u8) -> Result<u8, CompileError> {
        match self {
            Node::Assign { name, expr } => {
                let flags = expr.compile(b, flags)?;
                let index = b.add_const(Value::Str(name.clone()))?;
                b.emit_with_operand(op::STORE_NAME, index);
                Ok(flags)
            }

            Node::BinaryOp { op, left, right } => {
                let flags = left.compile(b, flags)?;
                let flags = right.compile(b, flags)?;
                b.emit(op.opcode());
                Ok(flags)
            }

            Node::Call { callee, args } => {
                if args.len() > u8::MAX as usize {
                    return Err(CompileError::TooManyArguments { count: args.len() });
                }
                // Rightmost argument first, so the callee prologue finds the
                // leftmost on top of the shared stack.
                let mut flags = flags;
                for arg in args.iter().rev() {
                    flags = arg.compile(b, flags)?;
                }
                let flags = callee.compile(b, flags)?;
                b.emit_with_operand(op::CALL, args.len() as u8);
                Ok(flags)
            }

            Node::Const(value) => {
                let index = b.add_const(value.clone())?;
                b.emit_with_operand(op::LOAD_CONST, index);
                Ok(flags)
            }

            Node::FunctionDef { name, params, body } => {
                if params.len() > u8::MAX as usize {
                    return Err(CompileError::TooManyParameters {
                        name: name.clone(),
                        count: params.len(),
                    });
                }
                let mut fb = CodeBuilder::new();
                let mut fflags = 0;
                // Prologue: pop arguments into named locals. Reverse-declared
                // order matches the order the VM re-pushes them in.
                for param in params.iter().rev() {
                    let index = fb.add_const(Value::Str(param.clone()))?;
                    fb.emit_with_operand(op::STORE_NAME, index);
                }
                for stmt in body {
                    fflags = stmt.compile(&mut fb, fflags)?;
                }
                // Implicit epilogue for fall-through control.
                let none = fb.add_const(Value::None)?;
                fb.emit_with_operand(op::LOAD_CONST, none);
                fb.emit(op::RETURN);

                let mut code = fb.finish(fflags);
                code.arity = params.len() as u8;
                let code_index = b.add_const(Value::Code(Arc::new(code)))?;
                b.emit_with_operand(op::MAKE_FUNCTION, code_index);
                let name_index = b.add_const(Value::Str(name.clone()))?;
                b.emit_with_operand(op::STORE_NAME, name_index);
                Ok(flags)
            }

            Node::If { condition, body } => {
                let mut flags = condition.compile(b, flags)?;
                b.emit(op::JUMP_IF_FALSE);
                let skip = b.emit_placeholder();
                for stmt in body {
                    flags = stmt.compile(b, flags)?;
                }
                b.patch_forward(skip)?;
                Ok(flags | FLAG_CONTAINS_JUMP)
            }

            Node::IfElse {
                condition,
                body,
                else_body,
            } => {
                let mut flags = condition.compile(b, flags)?;
                b.emit(op::JUMP_IF_FALSE);
                let skip = b.emit_placeholder();
                for stmt in body {
                    flags = stmt.compile(b, flags)?;
                }
                b.emit(op::JUMP_ABSOLUTE);
                let end = b.emit_placeholder();
                b.patch_forward(skip)?;
                for stmt in else_body {
                    flags = stmt.compile(b, flags)?;
                }
                b.patch_absolute(end)?;
                Ok(flags | FLAG_CONTAINS_JUMP)
            }

            Node::Name(name) => {
                let index = b.add_const(Value::Str(name.clone()))?;
                b.emit_with_operand(op::LOAD_NAME, index);
                Ok(flags)
            }

            Node::Print(expr) => {
                let flags = expr.compile(b, flags)?;
                b.emit(op::PRINT);
                Ok(flags)
            }

            Node::Return(expr) => {
                let flags = expr.compile(b, flags)?;
                b.emit(op::RETURN);
                Ok(flags)
            }

            Node::While { condition, body } => {
                let loop_top = b.here();
                let mut flags = condition.compile(b, flags)?;
                b.emit(op::JUMP_IF_FALSE);
                let exit = b.emit_placeholder();
                for stmt in body {
                    flags = stmt.compile(b, flags)?;
                }
                if loop_top > u8::MAX as usize {
                    return Err(CompileError::JumpTooFar { target: loop_top });
                }
                b.emit_with_operand(op::JUMP_ABSOLUTE, loop_top as u8);
                b.patch_forward(exit)?;
                Ok(flags | FLAG_CONTAINS_JUMP)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::code::Code;

    fn compile_stmts(stmts: &[Node]) -> Code {
        let mut b = CodeBuilder::new();
        let mut flags = 0;
        for stmt in stmts {
            flags = stmt.compile(&mut b, flags).expect("compile should succeed");
        }
        b.finish(flags)
    }

    fn int(n: i64) -> Node {
        Node::Const(Value::Int(n))
    }

    #[test]
    fn test_const_emits_load() {
        let code = compile_stmts(&[Node::Print(Box::new(int(3)))]);
        assert_eq!(code.bytecode, vec![op::LOAD_CONST, 0, op::PRINT]);
        assert_eq!(code.consts, vec![Value::Int(3)]);
    }

    #[test]
    fn test_repeated_consts_share_one_slot() {
        let code = compile_stmts(&[
            Node::Print(Box::new(int(42))),
            Node::Print(Box::new(int(42))),
        ]);
        assert_eq!(code.consts.len(), 1);
    }

    #[test]
    fn test_assign_compiles_expr_then_store() {
        let code = compile_stmts(&[Node::Assign {
            name: "x".to_string(),
            expr: Box::new(int(3)),
        }]);
        assert_eq!(code.bytecode, vec![op::LOAD_CONST, 0, op::STORE_NAME, 1]);
        assert_eq!(code.consts[1], Value::Str("x".to_string()));
    }

    #[test]
    fn test_binary_op_is_left_then_right() {
        let code = compile_stmts(&[Node::BinaryOp {
            op: BinOp::Sub,
            left: Box::new(int(5)),
            right: Box::new(int(2)),
        }]);
        assert_eq!(
            code.bytecode,
            vec![op::LOAD_CONST, 0, op::LOAD_CONST, 1, op::SUB]
        );
    }

    #[test]
    fn test_call_pushes_arguments_reversed() {
        let code = compile_stmts(&[Node::Call {
            callee: Box::new(Node::Name("f".to_string())),
            args: vec![int(2), int(3)],
        }]);
        // 3 first, then 2, then the callee, then CALL 2.
        assert_eq!(
            code.bytecode,
            vec![
                op::LOAD_CONST,
                0,
                op::LOAD_CONST,
                1,
                op::LOAD_NAME,
                2,
                op::CALL,
                2
            ]
        );
        assert_eq!(code.consts[0], Value::Int(3));
        assert_eq!(code.consts[1], Value::Int(2));
    }

    #[test]
    fn test_if_patches_forward_jump() {
        let code = compile_stmts(&[Node::If {
            condition: Box::new(int(1)),
            body: vec![Node::Print(Box::new(int(2)))],
        }]);
        assert_eq!(
            code.bytecode,
            vec![
                op::LOAD_CONST,
                0,
                op::JUMP_IF_FALSE,
                4, // operand position 3 + 4 = 7 = end
                op::LOAD_CONST,
                1,
                op::PRINT
            ]
        );
        assert!(code.contains_jump());
    }

    #[test]
    fn test_while_jumps_back_to_loop_top() {
        let code = compile_stmts(&[Node::While {
            condition: Box::new(int(0)),
            body: vec![],
        }]);
        assert_eq!(
            code.bytecode,
            vec![op::LOAD_CONST, 0, op::JUMP_IF_FALSE, 3, op::JUMP_ABSOLUTE, 0]
        );
        assert!(code.contains_jump());
    }

    #[test]
    fn test_function_def_nested_code() {
        let code = compile_stmts(&[Node::FunctionDef {
            name: "f".to_string(),
            params: vec!["a".to_string(), "b".to_string()],
            body: vec![Node::Return(Box::new(Node::Name("a".to_string())))],
        }]);
        assert_eq!(
            code.bytecode,
            vec![op::MAKE_FUNCTION, 0, op::STORE_NAME, 1]
        );
        let Value::Code(inner) = &code.consts[0] else {
            panic!("expected nested code constant");
        };
        // Prologue stores b then a, body loads a, epilogue returns None.
        assert_eq!(
            inner.bytecode,
            vec![
                op::STORE_NAME,
                0, // "b"
                op::STORE_NAME,
                1, // "a"
                op::LOAD_NAME,
                1,
                op::RETURN,
                op::LOAD_CONST,
                2, // None
                op::RETURN
            ]
        );
        assert_eq!(inner.consts[0], Value::Str("b".to_string()));
        assert_eq!(inner.consts[1], Value::Str("a".to_string()));
        assert_eq!(inner.consts[2], Value::None);
        assert_eq!(inner.arity, 2);
        assert!(!inner.contains_jump());
    }

    #[test]
    fn test_function_with_loop_is_flagged() {
        let code = compile_stmts(&[Node::FunctionDef {
            name: "f".to_string(),
            params: vec![],
            body: vec![Node::While {
                condition: Box::new(int(0)),
                body: vec![],
            }],
        }]);
        let Value::Code(inner) = &code.consts[0] else {
            panic!("expected nested code constant");
        };
        assert!(inner.contains_jump());
    }

    #[test]
    fn test_empty_paramlist_compiles_to_zero_pops() {
        let code = compile_stmts(&[Node::FunctionDef {
            name: "f".to_string(),
            params: vec![],
            body: vec![],
        }]);
        let Value::Code(inner) = &code.consts[0] else {
            panic!("expected nested code constant");
        };
        assert_eq!(inner.bytecode, vec![op::LOAD_CONST, 0, op::RETURN]);
        assert_eq!(inner.arity, 0);
    }
}
