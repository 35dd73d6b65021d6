//! Helpers for turning program text into instructions

use super::{Format, Instruction, Opcode};
use crate::cpu::NUM_ARCH_REGS;
use crate::error::LoadError;

/// Parses one line of program text.
/// Returns `Ok(None)` for blank lines and comments.
pub fn parse_line(
    line: usize,
    text: &str,
) -> Result<Option<Instruction>, LoadError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with(';') || text.starts_with("//") {
        return Ok(None);
    }

    // The mnemonic may be followed by a comma or by whitespace
    let (mnemonic, rest) = text
        .split_once(|c: char| c == ',' || c.is_whitespace())
        .unwrap_or((text, ""));
    let tokens = rest.split(',').map(str::trim);
    let opcode: Opcode = mnemonic
        .parse()
        .map_err(|opcode| LoadError::UnknownOpcode { line, opcode })?;

    let operands: Vec<&str> = tokens.filter(|t| !t.is_empty()).collect();
    let format = opcode.format();
    if operands.len() != format.operand_count() {
        return Err(LoadError::OperandCount {
            line,
            opcode: opcode.to_string(),
            expected: format.operand_count(),
            found: operands.len(),
        });
    }

    let reg = |i: usize| parse_register(line, operands[i]);
    let imm = |i: usize| parse_immediate(line, operands[i]);

    let inst = Instruction::new(opcode);
    let inst = match format {
        Format::R => inst
            .with_rd(reg(0)?)
            .with_sources(Some(reg(1)?), Some(reg(2)?), None),
        Format::RI => inst
            .with_rd(reg(0)?)
            .with_sources(Some(reg(1)?), None, None)
            .with_imm(imm(2)?),
        Format::Cmp => {
            inst.with_sources(Some(reg(0)?), Some(reg(1)?), None)
        }
        Format::MovC => inst.with_rd(reg(0)?).with_imm(imm(1)?),
        Format::Store => inst
            .with_sources(Some(reg(0)?), Some(reg(1)?), None)
            .with_imm(imm(2)?),
        Format::StoreIndexed => {
            inst.with_sources(Some(reg(0)?), Some(reg(1)?), Some(reg(2)?))
        }
        Format::Jump => {
            inst.with_sources(Some(reg(0)?), None, None).with_imm(imm(1)?)
        }
        Format::Branch => inst.with_imm(imm(0)?),
        Format::Bare => inst,
    };

    Ok(Some(inst))
}

/// `R<n>` with n in 0..16
fn parse_register(line: usize, token: &str) -> Result<usize, LoadError> {
    let bad = || LoadError::BadRegister { line, token: token.to_string() };
    let digits = token
        .strip_prefix('R')
        .or_else(|| token.strip_prefix('r'))
        .ok_or_else(bad)?;
    let index: usize = digits.parse().map_err(|_| bad())?;
    if index >= NUM_ARCH_REGS {
        return Err(bad());
    }
    Ok(index)
}

/// `#<signed decimal>`
fn parse_immediate(line: usize, token: &str) -> Result<i32, LoadError> {
    let bad = || LoadError::BadImmediate { line, token: token.to_string() };
    token
        .strip_prefix('#')
        .ok_or_else(bad)?
        .parse()
        .map_err(|_| bad())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_format() {
        let add = parse_line(1, "ADD,R3,R1,R2").unwrap().unwrap();
        assert_eq!(add.opcode, Opcode::Add);
        assert_eq!(add.rd, Some(3));
        assert_eq!(add.sources(), [Some(1), Some(2), None]);

        let load = parse_line(1, "LOAD,R3,R2,#4").unwrap().unwrap();
        assert_eq!((load.rd, load.rs1, load.imm), (Some(3), Some(2), 4));

        let store = parse_line(1, "STORE,R1,R2,#4").unwrap().unwrap();
        assert_eq!(store.rd, None);
        assert_eq!(store.sources(), [Some(1), Some(2), None]);

        let str_ = parse_line(1, "STR,R1,R2,R3").unwrap().unwrap();
        assert_eq!(str_.sources(), [Some(1), Some(2), Some(3)]);

        let cmp = parse_line(1, "CMP,R4,R5").unwrap().unwrap();
        assert_eq!(cmp.rd, None);

        let bz = parse_line(1, " BZ, #-12 ").unwrap().unwrap();
        assert_eq!((bz.opcode, bz.imm), (Opcode::Bz, -12));

        let jal = parse_line(1, "JAL,R15,R2,#0").unwrap().unwrap();
        assert_eq!((jal.rd, jal.rs1), (Some(15), Some(2)));

        let movc = parse_line(1, "MOVC R1, #5").unwrap().unwrap();
        assert_eq!((movc.opcode, movc.rd, movc.imm), (Opcode::MovC, Some(1), 5));

        let halt = parse_line(1, "HALT").unwrap().unwrap();
        assert_eq!(halt.opcode, Opcode::Halt);
    }

    #[test]
    fn test_skips_blank_and_comment_lines() {
        assert!(parse_line(1, "").unwrap().is_none());
        assert!(parse_line(1, "   ").unwrap().is_none());
        assert!(parse_line(1, "; setup").unwrap().is_none());
        assert!(parse_line(1, "// setup").unwrap().is_none());
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert!(matches!(
            parse_line(7, "DIV,R1,R2,R3"),
            Err(LoadError::UnknownOpcode { line: 7, .. })
        ));
        assert!(matches!(
            parse_line(2, "ADD,R1,R2"),
            Err(LoadError::OperandCount { expected: 3, found: 2, .. })
        ));
        assert!(matches!(
            parse_line(3, "MOVC,R16,#1"),
            Err(LoadError::BadRegister { .. })
        ));
        assert!(matches!(
            parse_line(4, "MOVC,R1,5"),
            Err(LoadError::BadImmediate { .. })
        ));
    }
}
