//! Chunk Reassembly
//!
//! Message and thought chunks carry a per-channel monotonic `index`. The
//! sender may emit them out of order and with gaps; receivers expose them
//! in-order, treating a gap as "not yet received".

// Layer 1: Standard library imports
use std::collections::BTreeMap;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::protocol::{ContentBlock, MessageChunk};

/// In-order reassembler for one chunk channel (message or thought)
///
/// `push` buffers the chunk and releases the longest contiguous run starting
/// at the next expected index. Chunks behind the watermark (duplicates or
/// replays) are dropped.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    buffered: BTreeMap<u64, ContentBlock>,
    next_index: u64,
    saw_final: bool,
}

impl ChunkAssembler {
    /// Create an assembler expecting index 0 first
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept one chunk, returning the blocks that became deliverable
    pub fn push(&mut self, chunk: MessageChunk) -> Vec<ContentBlock> {
        if chunk.is_final {
            self.saw_final = true;
        }

        if chunk.index < self.next_index {
            // Duplicate or replayed chunk
            return Vec::new();
        }
        self.buffered.insert(chunk.index, chunk.content);

        let mut ready = Vec::new();
        while let Some(content) = self.buffered.remove(&self.next_index) {
            ready.push(content);
            self.next_index += 1;
        }
        ready
    }

    /// Next index the assembler is waiting for
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Number of buffered chunks stuck behind a gap
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    /// Whether the final chunk of the turn has been seen
    pub fn is_complete(&self) -> bool {
        self.saw_final && self.buffered.is_empty()
    }

    /// Drain everything still buffered, sorted by index
    ///
    /// Used at end-of-turn when the sender supplied explicit indices with
    /// gaps that will never be filled.
    pub fn flush(&mut self) -> Vec<ContentBlock> {
        let drained: Vec<ContentBlock> = std::mem::take(&mut self.buffered)
            .into_values()
            .collect();
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u64, text: &str) -> MessageChunk {
        MessageChunk {
            content: ContentBlock::text(text),
            index,
            is_final: false,
        }
    }

    fn texts(blocks: Vec<ContentBlock>) -> Vec<String> {
        blocks
            .into_iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text,
                other => panic!("expected text block, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_in_order_chunks_flow_through() {
        let mut assembler = ChunkAssembler::new();
        assert_eq!(texts(assembler.push(chunk(0, "he"))), vec!["he"]);
        assert_eq!(texts(assembler.push(chunk(1, "llo"))), vec!["llo"]);
        assert_eq!(assembler.buffered_len(), 0);
    }

    #[test]
    fn test_out_of_order_chunks_are_buffered() {
        let mut assembler = ChunkAssembler::new();

        assert!(assembler.push(chunk(2, "c")).is_empty());
        assert!(assembler.push(chunk(1, "b")).is_empty());
        assert_eq!(assembler.buffered_len(), 2);

        // Index 0 releases the whole contiguous run
        assert_eq!(texts(assembler.push(chunk(0, "a"))), vec!["a", "b", "c"]);
        assert_eq!(assembler.next_index(), 3);
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let mut assembler = ChunkAssembler::new();
        assert_eq!(texts(assembler.push(chunk(0, "a"))), vec!["a"]);
        assert!(assembler.push(chunk(0, "a")).is_empty());
        assert_eq!(assembler.next_index(), 1);
    }

    #[test]
    fn test_gap_holds_back_later_chunks() {
        let mut assembler = ChunkAssembler::new();
        assert_eq!(texts(assembler.push(chunk(0, "a"))), vec!["a"]);
        // Index 1 never arrives
        assert!(assembler.push(chunk(2, "c")).is_empty());
        assert!(assembler.push(chunk(3, "d")).is_empty());
        assert_eq!(assembler.buffered_len(), 2);

        // End of turn: drain what is stuck, sorted by index
        assert_eq!(texts(assembler.flush()), vec!["c", "d"]);
        assert_eq!(assembler.buffered_len(), 0);
    }

    #[test]
    fn test_final_flag_tracked() {
        let mut assembler = ChunkAssembler::new();
        assembler.push(chunk(0, "he"));
        assert!(!assembler.is_complete());

        let last = MessageChunk {
            content: ContentBlock::text("llo"),
            index: 1,
            is_final: true,
        };
        assembler.push(last);
        assert!(assembler.is_complete());
    }
}
