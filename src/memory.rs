//! Flat data memory, written only at commit

use crate::cpu::DATA_MEMORY_SIZE;

/// Data memory of `DATA_MEMORY_SIZE` words
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataMemory {
    words: Vec<i32>,
}

impl Default for DataMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl DataMemory {
    pub fn new() -> Self {
        Self { words: vec![0; DATA_MEMORY_SIZE] }
    }

    /// Maps an effective address onto a word index.
    /// Out of range addresses wrap around.
    pub fn word_index(address: i32) -> usize {
        let index = address.rem_euclid(DATA_MEMORY_SIZE as i32) as usize;
        if index as i32 != address {
            tracing::warn!(
                "data address {} outside memory, wrapped to {}",
                address,
                index
            );
        }
        index
    }

    pub fn read(&self, index: usize) -> i32 {
        self.words[index]
    }

    pub fn write(&mut self, index: usize, value: i32) {
        self.words[index] = value;
    }

    /// Words holding a non-zero value
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        self.words
            .iter()
            .enumerate()
            .filter(|(_, w)| **w != 0)
            .map(|(i, w)| (i, *w))
    }
}
