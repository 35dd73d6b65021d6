use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the simulator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Failed to load program: {0}")]
    LoadError(#[from] LoadError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Plotting error: {0}")]
    PlotError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Errors raised while turning a program file into code memory
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read program file '{0}': {1}")]
    FileReadError(PathBuf, #[source] std::io::Error),

    #[error("Line {line}: unknown opcode '{opcode}'")]
    UnknownOpcode { line: usize, opcode: String },

    #[error("Line {line}: {opcode} takes {expected} operand(s), found {found}")]
    OperandCount {
        line: usize,
        opcode: String,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: invalid register '{token}' (expected R0..R15)")]
    BadRegister { line: usize, token: String },

    #[error("Line {line}: invalid immediate '{token}' (expected #<integer>)")]
    BadImmediate { line: usize, token: String },

    #[error("Program contains no instructions")]
    EmptyProgram,
}

/// Type alias for Result with SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;
