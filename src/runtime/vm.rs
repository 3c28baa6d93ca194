use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use crate::bytecode::code::Code;
use crate::bytecode::op;
use crate::lang::value::Value;
use crate::runtime::builtins::builtins;
use crate::runtime::runtime_error::{RuntimeError, type_error, unknown_name};
use crate::runtime::trace::{AdaptiveBackend, HotLoopTracer, NullBackend};

/// The per-call record of local bindings.
///
/// Frames live in the VM's call-stack vector: the predecessor is the caller,
/// the successor the most recent callee. A function resolves free names by
/// walking its caller chain at call time, not a captured definition-site
/// environment (dynamic scoping through the live call stack).
#[derive(Debug, Default)]
pub struct Frame {
    pub locals: HashMap<String, Value>,
}

impl Frame {
    pub fn new() -> Frame {
        Frame::default()
    }
}

/// Stack-based bytecode interpreter.
///
/// One operand stack is shared across all frames: a caller pushes call
/// arguments and the callee's prologue pops them directly. The frame chain
/// grows and shrinks with call/return; the operand stack lives as long as
/// the VM.
pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<Frame>,
    backend: Box<dyn AdaptiveBackend>,
    out: Box<dyn Write>,
}

/// Execution entry point. Returns the top-level's implicit final value
/// (`None` unless a top-level `RETURN` ran).
pub fn execute(code: &Arc<Code>, use_adaptive_backend: bool) -> Result<Value, RuntimeError> {
    let backend: Box<dyn AdaptiveBackend> = if use_adaptive_backend {
        Box::new(HotLoopTracer::default())
    } else {
        Box::new(NullBackend)
    };
    Vm::with_backend(backend).run(code)
}

impl Vm {
    #[allow(dead_code)]
    pub fn new() -> Vm {
        Vm::with_backend(Box::new(NullBackend))
    }

    pub fn with_backend(backend: Box<dyn AdaptiveBackend>) -> Vm {
        Vm {
            stack: Vec::new(),
            frames: Vec::new(),
            backend,
            out: Box::new(std::io::stdout()),
        }
    }

    /// Redirect the line-oriented `PRINT` sink.
    #[allow(dead_code)]
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    /// Run a code unit in a fresh frame on top of the current chain and
    /// return the value it ends with.
    pub fn run(&mut self, code: &Arc<Code>) -> Result<Value, RuntimeError> {
        self.frames.push(Frame::new());
        let result = self.dispatch(code);
        self.frames.pop();
        result
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    // The compiler guarantees stack balance; an underflow is an encoding
    // defect, the same category as an unknown opcode.
    fn pop(&mut self) -> Value {
        self.stack
            .pop()
            .expect("operand stack underflow: malformed bytecode")
    }

    fn load_name(&self, name: &str) -> Result<Value, RuntimeError> {
        // Current frame first, then ascending through the caller chain, then
        // the builtins registry.
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.locals.get(name) {
                return Ok(value.clone());
            }
        }
        builtins()
            .get(name)
            .cloned()
            .ok_or_else(|| unknown_name(name))
    }

    fn store_name(&mut self, name: String, value: Value) {
        // Always the current frame's locals, never an ancestor's: assignment
        // inside a function shadows, it cannot mutate a caller's binding.
        let frame = self
            .frames
            .last_mut()
            .expect("frame chain is never empty during dispatch");
        frame.locals.insert(name, value);
    }

    fn const_name(code: &Code, index: u8) -> String {
        match &code.consts[index as usize] {
            Value::Str(name) => name.clone(),
            other => panic!(
                "name operand does not index a string constant: {}",
                other.type_name()
            ),
        }
    }

    fn dispatch(&mut self, code: &Arc<Code>) -> Result<Value, RuntimeError> {
        let bytecode = &code.bytecode;
        let mut pc = 0;
        while pc < bytecode.len() {
            if let Some(fast_path) = self.backend.merge_point(
                code,
                pc,
                self.frames.last_mut().expect("frame chain is never empty"),
                &mut self.stack,
            ) {
                pc = fast_path;
                continue;
            }

            let opcode = bytecode[pc];
            pc += 1;

            match opcode {
                op::ADD | op::MUL | op::SUB | op::EQ | op::NE | op::LT | op::LE | op::GT
                | op::GE => {
                    // rhs is the more recently pushed operand.
                    let rhs = self.pop();
                    let lhs = self.pop();
                    let result = match opcode {
                        op::ADD => lhs.add(&rhs)?,
                        op::MUL => lhs.mul(&rhs)?,
                        op::SUB => lhs.sub(&rhs)?,
                        op::EQ => Value::Bool(lhs.eq(&rhs)),
                        op::NE => Value::Bool(lhs.ne(&rhs)),
                        op::LT => Value::Bool(lhs.lt(&rhs)?),
                        op::LE => Value::Bool(lhs.le(&rhs)?),
                        op::GT => Value::Bool(lhs.gt(&rhs)?),
                        _ => Value::Bool(lhs.ge(&rhs)?),
                    };
                    self.stack.push(result);
                }

                op::JUMP_ABSOLUTE => {
                    let target = bytecode[pc] as usize;
                    if target < pc {
                        // A backward jump is a loop's back edge; invite the
                        // backend to start tracing at the header.
                        self.backend.loop_back_edge(code, target);
                    }
                    pc = target;
                }

                op::JUMP_IF_FALSE => {
                    let offset = bytecode[pc] as usize;
                    if !self.pop().truthy() {
                        pc += offset;
                    } else {
                        pc += 1;
                    }
                }

                op::JUMP_IF_TRUE => {
                    let offset = bytecode[pc] as usize;
                    if self.pop().truthy() {
                        pc += offset;
                    } else {
                        pc += 1;
                    }
                }

                op::LOAD_CONST => {
                    let index = bytecode[pc] as usize;
                    pc += 1;
                    self.stack.push(code.consts[index].clone());
                }

                op::LOAD_NAME => {
                    let name = Self::const_name(code, bytecode[pc]);
                    pc += 1;
                    let value = self.load_name(&name)?;
                    self.stack.push(value);
                }

                op::STORE_NAME => {
                    let name = Self::const_name(code, bytecode[pc]);
                    pc += 1;
                    let value = self.pop();
                    self.store_name(name, value);
                }

                op::PRINT => {
                    let value = self.pop();
                    writeln!(self.out, "{}", value.str()).expect("output sink write failed");
                    self.out.flush().expect("output sink flush failed");
                }

                op::CALL => {
                    let argc = bytecode[pc] as usize;
                    pc += 1;
                    let callee = self.pop();
                    // The caller pushed rightmost-first, so popping yields
                    // the arguments back in declaration order.
                    let mut args = Vec::with_capacity(argc);
                    for _ in 0..argc {
                        args.push(self.pop());
                    }
                    let result = callee.call(self, args)?;
                    self.stack.push(result);
                }

                op::MAKE_FUNCTION => {
                    let index = bytecode[pc] as usize;
                    pc += 1;
                    match &code.consts[index] {
                        Value::Code(body) => self.stack.push(Value::Function(body.clone())),
                        other => panic!(
                            "MAKE_FUNCTION operand does not index a code constant: {}",
                            other.type_name()
                        ),
                    }
                }

                op::RETURN => return Ok(self.pop()),

                other => panic!("unknown opcode {:#04x} at pc {}", other, pc - 1),
            }
        }
        Ok(Value::None)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Value {
    /// Dispatch a call on this value. `args` arrive in declaration order.
    pub fn call(&self, vm: &mut Vm, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match self {
            Value::Builtin(f) => f.invoke(&args),
            Value::Function(body) => {
                // The prologue pops exactly `arity` values, so a mismatched
                // call must fail here or it would unbalance the shared stack.
                if args.len() != body.arity as usize {
                    return Err(type_error(format!(
                        "function takes {} arguments ({} given)",
                        body.arity,
                        args.len()
                    )));
                }
                // Hand the arguments to the callee through the shared stack;
                // its prologue pops them into named locals.
                for arg in args {
                    vm.push(arg);
                }
                vm.run(body)
            }
            other => Err(type_error(format!(
                "{} is not callable",
                other.type_name()
            ))),
        }
    }
}
