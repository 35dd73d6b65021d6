//! Register renaming: physical register file and rename tables

pub mod regfile;
pub mod table;

pub use table::RenameTable;

/// The two rename tables
#[derive(Clone, Debug, Default)]
pub struct RenameTables {
    /// Consulted and updated by dispatch
    pub speculative: RenameTable,
    /// Architectural mapping, updated only by commit
    pub retirement: RenameTable,
}

impl RenameTables {
    /// Reloads the speculative table from the retirement table
    pub fn resync(&mut self) {
        self.speculative = self.retirement.clone();
    }

    pub fn in_sync(&self) -> bool {
        self.speculative == self.retirement
    }
}
