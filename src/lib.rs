pub mod alu;
pub mod cpu;
pub mod dump;
pub mod flags;
pub mod instruction;
pub mod issue_queue;
pub mod loader;
pub mod memory;
pub mod rename;
pub mod rob;
pub mod run_wrapper;

pub mod pipelined;

pub mod error;
