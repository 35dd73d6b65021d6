//! Utility functions for turning a program file into code memory

use std::fs;
use std::path::Path;

use crate::cpu::{CODE_BASE_PC, INSN_WIDTH};
use crate::error::{LoadError, SimulatorResult};
use crate::instruction::parse::parse_line;
use crate::instruction::Instruction;

/// Immutable instruction store addressed by program counter
#[derive(Clone, Debug, Default)]
pub struct CodeMemory {
    instructions: Vec<Instruction>,
}

impl CodeMemory {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Code memory index of the given PC, if it is word aligned
    /// and inside the program
    pub fn index_of(&self, pc: i32) -> Option<usize> {
        let offset = pc.checked_sub(CODE_BASE_PC)?;
        if offset < 0 || offset % INSN_WIDTH != 0 {
            return None;
        }
        let index = (offset / INSN_WIDTH) as usize;
        (index < self.instructions.len()).then_some(index)
    }

    /// Instruction at the given PC
    pub fn fetch(&self, pc: i32) -> Option<Instruction> {
        self.index_of(pc).map(|i| self.instructions[i])
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &Instruction)> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(i, inst)| (CODE_BASE_PC + INSN_WIDTH * i as i32, inst))
    }
}

/// Parses program text into code memory
pub fn parse_program(text: &str) -> Result<CodeMemory, LoadError> {
    let mut instructions = Vec::new();
    for (line_num, line) in text.lines().enumerate() {
        if let Some(inst) = parse_line(line_num + 1, line)? {
            instructions.push(inst);
        }
    }

    if instructions.is_empty() {
        return Err(LoadError::EmptyProgram);
    }
    Ok(CodeMemory::new(instructions))
}

/// Loads a program file
pub fn load_program(path: &Path) -> SimulatorResult<CodeMemory> {
    let text = fs::read_to_string(path)
        .map_err(|e| LoadError::FileReadError(path.to_path_buf(), e))?;
    let code = parse_program(&text)?;

    tracing::debug!(
        "loaded {} instructions from {}",
        code.len(),
        path.display()
    );
    for (pc, inst) in code.iter() {
        tracing::trace!("{:>5}: {}", pc, inst);
    }

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Opcode;

    #[test]
    fn test_pc_mapping() {
        let code = parse_program("MOVC,R1,#5\n\nNOP\nHALT\n").unwrap();
        assert_eq!(code.len(), 3);
        assert_eq!(code.fetch(4000).map(|i| i.opcode), Some(Opcode::MovC));
        assert_eq!(code.fetch(4004).map(|i| i.opcode), Some(Opcode::Nop));
        assert_eq!(code.fetch(4008).map(|i| i.opcode), Some(Opcode::Halt));
        assert_eq!(code.fetch(4012), None);
        assert_eq!(code.fetch(4002), None);
        assert_eq!(code.fetch(3996), None);
    }

    #[test]
    fn test_error_reports_line_number() {
        let err = parse_program("MOVC,R1,#5\nFOO,R1\n").unwrap_err();
        assert!(matches!(err, LoadError::UnknownOpcode { line: 2, .. }));
        assert!(matches!(parse_program("\n; only a comment\n"), Err(LoadError::EmptyProgram)));
    }

    #[test]
    fn test_missing_file() {
        let result = load_program(Path::new("does/not/exist.asm"));
        assert!(result.is_err());
    }
}
