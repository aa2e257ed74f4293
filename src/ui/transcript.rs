//! Block model behind the content and log areas.
//!
//! A block is a string that may contain line breaks; a full chat response or
//! a full log message is one block. Blocks render separated by a blank line.

use std::collections::VecDeque;

use crate::messages::{BlockKind, StyledBlock};

/// Oldest blocks fall off past this point.
const MAX_BLOCKS: usize = 50;

#[derive(Debug, Default)]
pub struct Transcript {
    blocks: VecDeque<StyledBlock>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &StyledBlock> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last_block(&self) -> Option<&StyledBlock> {
        self.blocks.back()
    }

    pub fn add_block(&mut self, block: StyledBlock) {
        if self.blocks.len() >= MAX_BLOCKS {
            self.blocks.pop_front();
        }
        self.blocks.push_back(block);
    }

    pub fn append_to_last_block(&mut self, text: &str) {
        match self.blocks.back_mut() {
            Some(last) => last.text.push_str(text),
            None => self.add_block(StyledBlock::new(text, BlockKind::Assistant)),
        }
    }

    pub fn replace_last_block(&mut self, block: StyledBlock) {
        match self.blocks.back_mut() {
            Some(last) => *last = block,
            None => self.add_block(block),
        }
    }

    pub fn erase_last_block(&mut self) {
        self.blocks.pop_back();
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}
