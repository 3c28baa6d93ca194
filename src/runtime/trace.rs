//! Anchor points for an adaptive (trace-compiling) execution backend.
//!
//! The VM exposes two events: a per-iteration merge point keyed by the
//! currently executing code unit and pc, and a loop-back-edge event fired on
//! every backward absolute jump. A backend may answer a merge point with a
//! replacement pc to run an already-compiled fast path; the interpreter's
//! correctness never depends on one being present.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bytecode::code::Code;
use crate::lang::value::Value;
use crate::runtime::vm::Frame;

/// Stable identity for a code unit within one VM run.
///
/// Code units are shared read-only behind `Arc`, so the allocation address
/// distinguishes them.
fn code_key(code: &Arc<Code>) -> usize {
    Arc::as_ptr(code) as usize
}

/// Strategy interface the dispatch loop calls into.
pub trait AdaptiveBackend {
    /// Called once per dispatch iteration, before the opcode at `pc` is
    /// decoded. The frame and operand stack are the live runtime state at
    /// that point, passed mutably: a backend that runs a compiled fast path
    /// applies its effects to them and returns `Some(pc)` to redirect the
    /// interpreter past the opcodes it replaced.
    fn merge_point(
        &mut self,
        code: &Arc<Code>,
        pc: usize,
        frame: &mut Frame,
        stack: &mut Vec<Value>,
    ) -> Option<usize>;

    /// Called when a `JUMP_ABSOLUTE` is about to move backwards; `target` is
    /// the loop-header pc the jump re-enters.
    fn loop_back_edge(&mut self, code: &Arc<Code>, target: usize);
}

/// The do-nothing backend. Running with it is semantically identical to
/// running without one.
pub struct NullBackend;

impl AdaptiveBackend for NullBackend {
    fn merge_point(
        &mut self,
        _: &Arc<Code>,
        _: usize,
        _: &mut Frame,
        _: &mut Vec<Value>,
    ) -> Option<usize> {
        None
    }

    fn loop_back_edge(&mut self, _: &Arc<Code>, _: usize) {}
}

/// A recorded fast-path candidate: the linear pc sequence of one full loop
/// iteration, anchored at the loop header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub struct Trace {
    pub anchor: usize,
    pub pcs: Vec<usize>,
}

enum Recording {
    Idle,
    /// Waiting for the next merge point at the anchor of this code unit.
    Armed { key: usize, anchor: usize },
    /// Collecting pcs until execution returns to the anchor.
    Active {
        key: usize,
        anchor: usize,
        pcs: Vec<usize>,
    },
}

/// Profiling backend: counts back-edge events per loop header and, once a
/// header crosses the hotness threshold, records the pc sequence of its next
/// full iteration. It never intercepts execution, so it is observationally
/// transparent.
pub struct HotLoopTracer {
    threshold: u32,
    counters: HashMap<(usize, usize), u32>,
    traces: HashMap<(usize, usize), Trace>,
    recording: Recording,
}

impl HotLoopTracer {
    pub const DEFAULT_THRESHOLD: u32 = 16;

    pub fn new(threshold: u32) -> Self {
        HotLoopTracer {
            threshold,
            counters: HashMap::new(),
            traces: HashMap::new(),
            recording: Recording::Idle,
        }
    }

    /// Whether a function body may be inlined as a continuation inside
    /// another unit's trace. Bodies with internal control flow are excluded
    /// to bound trace length.
    fn can_inline(code: &Code) -> bool {
        !code.contains_jump()
    }
}

#[cfg(test)]
impl HotLoopTracer {
    fn back_edge_count(&self, code: &Arc<Code>, header: usize) -> u32 {
        self.counters
            .get(&(code_key(code), header))
            .copied()
            .unwrap_or(0)
    }

    fn trace_for(&self, code: &Arc<Code>, header: usize) -> Option<&Trace> {
        self.traces.get(&(code_key(code), header))
    }
}

impl Default for HotLoopTracer {
    fn default() -> Self {
        HotLoopTracer::new(Self::DEFAULT_THRESHOLD)
    }
}

impl AdaptiveBackend for HotLoopTracer {
    fn merge_point(
        &mut self,
        code: &Arc<Code>,
        pc: usize,
        _frame: &mut Frame,
        _stack: &mut Vec<Value>,
    ) -> Option<usize> {
        let recording = std::mem::replace(&mut self.recording, Recording::Idle);
        self.recording = match recording {
            Recording::Idle => Recording::Idle,
            Recording::Armed { key, anchor } => {
                if key == code_key(code) && anchor == pc {
                    Recording::Active {
                        key,
                        anchor,
                        pcs: vec![pc],
                    }
                } else {
                    Recording::Armed { key, anchor }
                }
            }
            Recording::Active {
                key,
                anchor,
                mut pcs,
            } => {
                if key == code_key(code) && anchor == pc {
                    // One full iteration captured.
                    self.traces.insert((key, anchor), Trace { anchor, pcs });
                    Recording::Idle
                } else if key == code_key(code) || Self::can_inline(code) {
                    // A jump-free callee extends the trace as an inlined
                    // continuation; a callee with internal control flow
                    // ends the attempt.
                    pcs.push(pc);
                    Recording::Active { key, anchor, pcs }
                } else {
                    Recording::Idle
                }
            }
        };
        None
    }

    fn loop_back_edge(&mut self, code: &Arc<Code>, target: usize) {
        let key = (code_key(code), target);
        let count = self.counters.entry(key).or_insert(0);
        *count += 1;
        let hot = *count >= self.threshold;
        if hot && !self.traces.contains_key(&key) && matches!(self.recording, Recording::Idle) {
            self.recording = Recording::Armed {
                key: key.0,
                anchor: target,
            };
        }
    }
}
