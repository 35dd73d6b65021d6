//! ALU implementation

use crate::instruction::Opcode;

/// Performs an atomic ALU operation
/// Arithmetic wraps in 32-bit two's complement
pub fn alu(op: ALUOp, op1: i32, op2: i32) -> i32 {
    match op {
        ALUOp::ADD => op1.wrapping_add(op2),
        ALUOp::SUB => op1.wrapping_sub(op2),
        ALUOp::AND => op1 & op2,
        ALUOp::OR => op1 | op2,
        ALUOp::XOR => op1 ^ op2,
        ALUOp::MUL => op1.wrapping_mul(op2),
    }
}

/// Selector for ALU src2 input
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ALUSrc {
    // From register
    #[default]
    REG,
    // From immediate
    IMM,
}

/// Set of ALU operations needed for APEX
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ALUOp {
    // Arithmetic
    #[default]
    ADD,
    SUB,
    MUL,
    // Logical
    AND,
    OR,
    XOR,
}

/// ALU controls for the integer and multiply units
pub fn controls(opcode: Opcode) -> Option<(ALUOp, ALUSrc)> {
    use ALUOp::*;
    use ALUSrc::*;
    Some(match opcode {
        Opcode::Add => (ADD, REG),
        Opcode::Sub | Opcode::Cmp => (SUB, REG),
        Opcode::AddL => (ADD, IMM),
        Opcode::SubL => (SUB, IMM),
        Opcode::And => (AND, REG),
        Opcode::Or => (OR, REG),
        Opcode::Xor => (XOR, REG),
        Opcode::Mul => (MUL, REG),
        // rs1 is unused and reads 0
        Opcode::MovC => (ADD, IMM),
        Opcode::Load
        | Opcode::Store
        | Opcode::Ldr
        | Opcode::Str
        | Opcode::Jump
        | Opcode::Jal
        | Opcode::Bz
        | Opcode::Bnz
        | Opcode::Nop
        | Opcode::Halt => return None,
    })
}

/// Evaluates an integer or multiply opcode
pub fn execute(opcode: Opcode, op1: i32, op2: i32, imm: i32) -> i32 {
    match controls(opcode) {
        Some((op, ALUSrc::REG)) => alu(op, op1, op2),
        Some((op, ALUSrc::IMM)) => alu(op, op1, imm),
        None => 0,
    }
}

/// Whether the integer unit updates the zero flag for this opcode
pub fn sets_zero_flag(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::Add
            | Opcode::Sub
            | Opcode::AddL
            | Opcode::SubL
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Cmp
            | Opcode::MovC
    )
}
