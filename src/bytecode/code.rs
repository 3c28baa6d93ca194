use serde::{Deserialize, Serialize};

use crate::bytecode::compile_error::CompileError;
use crate::lang::value::Value;

/// Flag bit: the unit contains a jump instruction.
///
/// Set by `if`, `if/else` and `while` bodies. The adaptive backend uses it to
/// exclude functions with internal control flow from trace inlining.
pub const FLAG_CONTAINS_JUMP: u8 = 1;

/// An immutable compiled unit: bytecode, constant pool and control-flow-shape
/// flags.
///
/// A function definition compiles its body into a nested `Code` stored as a
/// constant of the enclosing unit, so ownership forms a DAG rooted at the
/// top-level compiled unit, shared read-only thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    pub bytecode: Vec<u8>,
    pub consts: Vec<Value>,
    pub flags: u8,
    /// Number of arguments a function body's prologue pops; zero for the
    /// top level. Checked against the argument count at call time.
    pub arity: u8,
}

impl Code {
    pub fn contains_jump(&self) -> bool {
        self.flags & FLAG_CONTAINS_JUMP != 0
    }

    /// Serialize to the on-disk compiled-image format.
    pub fn to_image(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Deserialize a compiled image produced by [`Code::to_image`].
    pub fn from_image(bytes: &[u8]) -> Result<Code, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// Growable instruction buffer plus constant pool, shared by every AST node's
/// `compile`.
///
/// Jump targets are emitted as placeholder bytes and patched after the
/// dependent body is compiled; the buffer is index-addressed for exactly that
/// reason.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    code: Vec<u8>,
    consts: Vec<Value>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        CodeBuilder::default()
    }

    /// Current length of the instruction buffer, i.e. the address the next
    /// emitted byte will occupy.
    pub fn here(&self) -> usize {
        self.code.len()
    }

    pub fn emit(&mut self, op: u8) {
        self.code.push(op);
    }

    pub fn emit_with_operand(&mut self, op: u8, operand: u8) {
        self.code.push(op);
        self.code.push(operand);
    }

    /// Emit a placeholder operand byte and return its position for a later
    /// [`CodeBuilder::patch_forward`] or [`CodeBuilder::patch_absolute`].
    pub fn emit_placeholder(&mut self) -> usize {
        let pos = self.code.len();
        self.code.push(0xff);
        pos
    }

    /// Overwrite the placeholder at `pos` with a relative forward offset from
    /// `pos` to the current end of the buffer.
    pub fn patch_forward(&mut self, pos: usize) -> Result<(), CompileError> {
        let offset = self.code.len() - pos;
        self.code[pos] = narrow_jump(offset)?;
        Ok(())
    }

    /// Overwrite the placeholder at `pos` with the absolute address of the
    /// current end of the buffer.
    pub fn patch_absolute(&mut self, pos: usize) -> Result<(), CompileError> {
        let target = self.code.len();
        self.code[pos] = narrow_jump(target)?;
        Ok(())
    }

    /// Register a constant, reusing an existing slot when an equal value is
    /// already pooled. Returns the one-byte pool index.
    pub fn add_const(&mut self, value: Value) -> Result<u8, CompileError> {
        if let Some(index) = self.consts.iter().position(|c| *c == value) {
            return Ok(index as u8);
        }
        let index = self.consts.len();
        if index > u8::MAX as usize {
            return Err(CompileError::TooManyConstants {
                count: index + 1,
            });
        }
        self.consts.push(value);
        Ok(index as u8)
    }

    pub fn finish(self, flags: u8) -> Code {
        Code {
            bytecode: self.code,
            consts: self.consts,
            flags,
            arity: 0,
        }
    }
}

fn narrow_jump(value: usize) -> Result<u8, CompileError> {
    u8::try_from(value).map_err(|_| CompileError::JumpTooFar { target: value })
}
