//! Static instruction representation

use std::fmt;
use std::str::FromStr;

pub mod parse;

/// APEX opcode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    AddL,
    SubL,
    And,
    Or,
    Xor,
    Mul,
    Cmp,
    MovC,
    Load,
    Store,
    Ldr,
    Str,
    Jump,
    Jal,
    Bz,
    Bnz,
    Nop,
    Halt,
}

impl Opcode {
    pub const ALL: [Opcode; 20] = [
        Opcode::Add,
        Opcode::Sub,
        Opcode::AddL,
        Opcode::SubL,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Mul,
        Opcode::Cmp,
        Opcode::MovC,
        Opcode::Load,
        Opcode::Store,
        Opcode::Ldr,
        Opcode::Str,
        Opcode::Jump,
        Opcode::Jal,
        Opcode::Bz,
        Opcode::Bnz,
        Opcode::Nop,
        Opcode::Halt,
    ];

    /// Mnemonic as written in program files
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::AddL => "ADDL",
            Opcode::SubL => "SUBL",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Mul => "MUL",
            Opcode::Cmp => "CMP",
            Opcode::MovC => "MOVC",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Ldr => "LDR",
            Opcode::Str => "STR",
            Opcode::Jump => "JUMP",
            Opcode::Jal => "JAL",
            Opcode::Bz => "BZ",
            Opcode::Bnz => "BNZ",
            Opcode::Nop => "NOP",
            Opcode::Halt => "HALT",
        }
    }

    /// Operand layout of the opcode
    pub fn format(self) -> Format {
        match self {
            Opcode::Add
            | Opcode::Sub
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Mul
            | Opcode::Ldr => Format::R,
            Opcode::AddL | Opcode::SubL | Opcode::Load | Opcode::Jal => {
                Format::RI
            }
            Opcode::Cmp => Format::Cmp,
            Opcode::MovC => Format::MovC,
            Opcode::Store => Format::Store,
            Opcode::Str => Format::StoreIndexed,
            Opcode::Jump => Format::Jump,
            Opcode::Bz | Opcode::Bnz => Format::Branch,
            Opcode::Nop | Opcode::Halt => Format::Bare,
        }
    }

    /// Functional unit that executes the opcode.
    /// NOP and HALT never leave the reorder buffer.
    pub fn fu_class(self) -> Option<FuClass> {
        match self {
            Opcode::Add
            | Opcode::Sub
            | Opcode::AddL
            | Opcode::SubL
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Cmp
            | Opcode::MovC => Some(FuClass::Int),
            Opcode::Mul => Some(FuClass::Mul),
            Opcode::Jump | Opcode::Jal | Opcode::Bz | Opcode::Bnz => {
                Some(FuClass::Branch)
            }
            Opcode::Load | Opcode::Store | Opcode::Ldr | Opcode::Str => {
                Some(FuClass::Mem)
            }
            Opcode::Nop | Opcode::Halt => None,
        }
    }

    pub fn is_control_flow(self) -> bool {
        self.fu_class() == Some(FuClass::Branch)
    }

    pub fn is_store(self) -> bool {
        matches!(self, Opcode::Store | Opcode::Str)
    }

    pub fn is_load(self) -> bool {
        matches!(self, Opcode::Load | Opcode::Ldr)
    }
}

impl FromStr for Opcode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Opcode::ALL
            .into_iter()
            .find(|op| op.mnemonic() == upper)
            .ok_or_else(|| s.trim().to_string())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.mnemonic())
    }
}

/// Operand layout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// rd, rs1, rs2
    R,
    /// rd, rs1, #imm
    RI,
    /// rs1, rs2
    Cmp,
    /// rd, #imm
    MovC,
    /// rs1, rs2, #imm
    Store,
    /// rs1, rs2, rs3
    StoreIndexed,
    /// rs1, #imm
    Jump,
    /// #imm
    Branch,
    /// no operands
    Bare,
}

impl Format {
    /// Number of comma separated operands after the mnemonic
    pub fn operand_count(self) -> usize {
        match self {
            Format::R | Format::RI | Format::Store | Format::StoreIndexed => 3,
            Format::Cmp | Format::MovC | Format::Jump => 2,
            Format::Branch => 1,
            Format::Bare => 0,
        }
    }
}

/// Functional unit class
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FuClass {
    Int,
    Mul,
    Branch,
    Mem,
}

impl FuClass {
    pub const ALL: [FuClass; 4] =
        [FuClass::Int, FuClass::Mul, FuClass::Branch, FuClass::Mem];
}

impl fmt::Display for FuClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            FuClass::Int => "INT",
            FuClass::Mul => "MUL",
            FuClass::Branch => "BRU",
            FuClass::Mem => "MEM",
        })
    }
}

/// Decoded static instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Destination architectural register
    pub rd: Option<usize>,
    pub rs1: Option<usize>,
    pub rs2: Option<usize>,
    /// Only STR uses a third source
    pub rs3: Option<usize>,
    pub imm: i32,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self { opcode, rd: None, rs1: None, rs2: None, rs3: None, imm: 0 }
    }

    pub fn with_rd(mut self, rd: usize) -> Self {
        self.rd = Some(rd);
        self
    }

    pub fn with_sources(
        mut self,
        rs1: Option<usize>,
        rs2: Option<usize>,
        rs3: Option<usize>,
    ) -> Self {
        self.rs1 = rs1;
        self.rs2 = rs2;
        self.rs3 = rs3;
        self
    }

    pub fn with_imm(mut self, imm: i32) -> Self {
        self.imm = imm;
        self
    }

    /// Source registers in operand order
    pub fn sources(&self) -> [Option<usize>; 3] {
        [self.rs1, self.rs2, self.rs3]
    }
}

impl Default for Instruction {
    fn default() -> Self {
        Self::new(Opcode::Nop)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg = |r: Option<usize>| format!("R{}", r.unwrap_or(0));
        let op = self.opcode;
        match op.format() {
            Format::R => write!(
                f,
                "{},{},{},{}",
                op,
                reg(self.rd),
                reg(self.rs1),
                reg(self.rs2)
            ),
            Format::RI => write!(
                f,
                "{},{},{},#{}",
                op,
                reg(self.rd),
                reg(self.rs1),
                self.imm
            ),
            Format::Cmp => {
                write!(f, "{},{},{}", op, reg(self.rs1), reg(self.rs2))
            }
            Format::MovC => write!(f, "{},{},#{}", op, reg(self.rd), self.imm),
            Format::Store => write!(
                f,
                "{},{},{},#{}",
                op,
                reg(self.rs1),
                reg(self.rs2),
                self.imm
            ),
            Format::StoreIndexed => write!(
                f,
                "{},{},{},{}",
                op,
                reg(self.rs1),
                reg(self.rs2),
                reg(self.rs3)
            ),
            Format::Jump => write!(f, "{},{},#{}", op, reg(self.rs1), self.imm),
            Format::Branch => write!(f, "{},#{}", op, self.imm),
            Format::Bare => write!(f, "{}", op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_round_trip_mnemonic() {
        for op in Opcode::ALL {
            assert_eq!(op.mnemonic().parse::<Opcode>(), Ok(op));
        }
        assert_eq!("movc".parse::<Opcode>(), Ok(Opcode::MovC));
        assert!("DIV".parse::<Opcode>().is_err());
    }

    #[test]
    fn test_fu_class() {
        assert_eq!(Opcode::MovC.fu_class(), Some(FuClass::Int));
        assert_eq!(Opcode::Cmp.fu_class(), Some(FuClass::Int));
        assert_eq!(Opcode::Mul.fu_class(), Some(FuClass::Mul));
        assert_eq!(Opcode::Jal.fu_class(), Some(FuClass::Branch));
        assert_eq!(Opcode::Str.fu_class(), Some(FuClass::Mem));
        assert_eq!(Opcode::Halt.fu_class(), None);
        assert!(Opcode::Bnz.is_control_flow());
        assert!(!Opcode::Load.is_control_flow());
    }

    #[test]
    fn test_display() {
        let inst = Instruction::new(Opcode::Store)
            .with_sources(Some(1), Some(2), None)
            .with_imm(4);
        assert_eq!(inst.to_string(), "STORE,R1,R2,#4");
        let inst = Instruction::new(Opcode::Bz).with_imm(-8);
        assert_eq!(inst.to_string(), "BZ,#-8");
    }
}
