use crate::bytecode::code::Code;
use crate::bytecode::op;
use crate::lang::value::Value;

/// Render a code unit as a mnemonic listing, recursing into nested code
/// constants (function bodies).
pub fn disassemble(code: &Code) -> String {
    let mut out = String::new();
    write_unit(code, "", &mut out);
    out
}

fn write_unit(code: &Code, indent: &str, out: &mut String) {
    let mut pc = 0;
    while pc < code.bytecode.len() {
        let opcode = code.bytecode[pc];
        let mnemonic = op::mnemonic(opcode).unwrap_or("???");
        if op::has_operand(opcode) && pc + 1 < code.bytecode.len() {
            let operand = code.bytecode[pc + 1];
            out.push_str(&format!("{}{:4} {} {}", indent, pc, mnemonic, operand));
            if uses_const_pool(opcode) {
                if let Some(value) = code.consts.get(operand as usize) {
                    out.push_str(&format!(" ({})", describe(value)));
                }
            }
            out.push('\n');
            pc += 2;
        } else {
            out.push_str(&format!("{}{:4} {}\n", indent, pc, mnemonic));
            pc += 1;
        }
    }
    for (index, value) in code.consts.iter().enumerate() {
        if let Value::Code(inner) = value {
            out.push_str(&format!("{}const {} = code:\n", indent, index));
            write_unit(inner, &format!("{}    ", indent), out);
        }
    }
}

fn uses_const_pool(opcode: u8) -> bool {
    matches!(
        opcode,
        op::LOAD_CONST | op::LOAD_NAME | op::STORE_NAME | op::MAKE_FUNCTION
    )
}

fn describe(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("{:?}", s),
        other => other.str(),
    }
}
