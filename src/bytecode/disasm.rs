use std::collections::BTreeSet;
use std::fmt::Write;

use crate::bytecode::label::absolute_target;
use crate::bytecode::object::ObjectFile;
use crate::bytecode::op::{OpCode, Operands};

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    pub pc: usize,
    pub op: OpCode,
    /// Decoded immediates; for jumps and calls, the absolute target.
    pub args: Vec<i64>,
}

/// Decodes `code` into instructions. Stops at the first byte that is not an
/// opcode or at a truncated instruction, returning what was decoded so far
/// together with the offending pc.
pub fn decode(code: &[u8]) -> (Vec<Instr>, Option<usize>) {
    let mut out = Vec::new();
    let mut pc = 0;

    while pc < code.len() {
        let Some(op) = OpCode::from_byte(code[pc]) else {
            return (out, Some(pc));
        };
        if pc + op.size() > code.len() {
            return (out, Some(pc));
        }

        let imm = &code[pc + 1..pc + op.size()];
        let args = match op.operands() {
            Operands::None => vec![],
            Operands::Byte => vec![i64::from(imm[0])],
            Operands::TwoBytes if op == OpCode::Inc => {
                vec![i64::from(imm[0]), i64::from(imm[1] as i8)]
            }
            Operands::TwoBytes => vec![i64::from(imm[0]), i64::from(imm[1])],
            Operands::Short => vec![i64::from(u16::from_be_bytes([imm[0], imm[1]]))],
            Operands::Offset => {
                let offset = i16::from_be_bytes([imm[0], imm[1]]);
                vec![absolute_target(offset, pc + 1)]
            }
            Operands::Word => vec![i64::from(i32::from_be_bytes([
                imm[0], imm[1], imm[2], imm[3],
            ]))],
        };

        out.push(Instr { pc, op, args });
        pc += op.size();
    }
    (out, None)
}

fn collect_targets(instrs: &[Instr]) -> BTreeSet<i64> {
    instrs
        .iter()
        .filter(|i| i.op.operands() == Operands::Offset)
        .filter_map(|i| i.args.first().copied())
        .collect()
}

/// Renders an object file as text, one instruction per line.
///
/// Jump and call targets are marked with `►`, the entry point with `main:`.
pub fn disassemble(obj: &ObjectFile) -> String {
    let (instrs, bad) = decode(&obj.code);
    let targets = collect_targets(&instrs);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "; code {} bytes, data {} words, main {}",
        obj.code.len(),
        obj.data_size,
        obj.main_pc
    );

    for instr in &instrs {
        if obj.main_pc >= 0 && instr.pc == obj.main_pc as usize {
            out.push_str("main:\n");
        }
        let marker = if targets.contains(&(instr.pc as i64)) {
            "►"
        } else {
            " "
        };
        let args: Vec<String> = instr.args.iter().map(|a| a.to_string()).collect();
        let args = match instr.op.operands() {
            Operands::Offset => format!("-> {}", args.join(" ")),
            _ => args.join(" "),
        };
        let line = format!("{:04} {} {:<12} {}", instr.pc, marker, instr.op.mnemonic(), args);
        out.push_str(line.trim_end());
        out.push('\n');
    }

    if let Some(pc) = bad {
        let _ = writeln!(out, "{:04}   <invalid byte {}>", pc, obj.code[pc]);
    }
    out
}
