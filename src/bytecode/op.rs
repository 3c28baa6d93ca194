//! One-byte opcodes.
//!
//! Every instruction is a single opcode byte, optionally followed by exactly
//! one operand byte: a constant-pool index (`LOAD_CONST`, `LOAD_NAME`,
//! `STORE_NAME`, `MAKE_FUNCTION`), a jump target or offset (`JUMP_ABSOLUTE`,
//! `JUMP_IF_FALSE`, `JUMP_IF_TRUE`) or an argument count (`CALL`). Never more
//! than one operand byte, which caps pools, jump spans and argument counts
//! at 256.

pub const LOAD_CONST: u8 = 0;
pub const LOAD_NAME: u8 = 1;
pub const STORE_NAME: u8 = 2;
pub const ADD: u8 = 3;
pub const MUL: u8 = 4;
pub const SUB: u8 = 5;
pub const EQ: u8 = 6;
pub const NE: u8 = 7;
pub const LT: u8 = 8;
pub const LE: u8 = 9;
pub const GT: u8 = 10;
pub const GE: u8 = 11;
pub const JUMP_ABSOLUTE: u8 = 12;
pub const JUMP_IF_FALSE: u8 = 13;
pub const JUMP_IF_TRUE: u8 = 14;
pub const PRINT: u8 = 15;
pub const CALL: u8 = 16;
pub const MAKE_FUNCTION: u8 = 17;
pub const RETURN: u8 = 18;

/// Mnemonic for a raw opcode byte, or `None` for bytes outside the set.
pub fn mnemonic(op: u8) -> Option<&'static str> {
    Some(match op {
        LOAD_CONST => "LOAD_CONST",
        LOAD_NAME => "LOAD_NAME",
        STORE_NAME => "STORE_NAME",
        ADD => "ADD",
        MUL => "MUL",
        SUB => "SUB",
        EQ => "EQ",
        NE => "NE",
        LT => "LT",
        LE => "LE",
        GT => "GT",
        GE => "GE",
        JUMP_ABSOLUTE => "JUMP_ABSOLUTE",
        JUMP_IF_FALSE => "JUMP_IF_FALSE",
        JUMP_IF_TRUE => "JUMP_IF_TRUE",
        PRINT => "PRINT",
        CALL => "CALL",
        MAKE_FUNCTION => "MAKE_FUNCTION",
        RETURN => "RETURN",
        _ => return None,
    })
}

/// Does this opcode carry an operand byte?
pub fn has_operand(op: u8) -> bool {
    matches!(
        op,
        LOAD_CONST
            | LOAD_NAME
            | STORE_NAME
            | JUMP_ABSOLUTE
            | JUMP_IF_FALSE
            | JUMP_IF_TRUE
            | CALL
            | MAKE_FUNCTION
    )
}
