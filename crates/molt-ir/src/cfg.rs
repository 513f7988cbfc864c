//! Basic-block partition of a method's instruction list.

use std::ops::Range;

use crate::instruction::Instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

impl BlockId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    start: usize,
    end: usize,
    succs: Vec<BlockId>,
}

impl BasicBlock {
    /// Instruction indices covered by this block.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    #[must_use]
    pub fn successors(&self) -> &[BlockId] {
        &self.succs
    }
}

/// A non-editable control-flow graph over a method's instructions.
///
/// Blocks reference instructions by index range; the instruction list itself
/// stays owned by the `MethodCode` the graph was built from.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    entry: BlockId,
    blocks: Vec<BasicBlock>,
    preds: Vec<Vec<BlockId>>,
}

impl ControlFlowGraph {
    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len()).map(BlockId)
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn successors(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks[id.index()].succs.iter().copied()
    }

    #[must_use]
    pub fn predecessors(&self, id: BlockId) -> &[BlockId] {
        &self.preds[id.index()]
    }
}

/// Partitions `insns` at branch targets and terminators.
pub(crate) fn build(insns: &[Instruction]) -> ControlFlowGraph {
    assert!(!insns.is_empty(), "cannot build a CFG for empty code");
    let n = insns.len();

    let mut leader = vec![false; n];
    leader[0] = true;
    for (i, insn) in insns.iter().enumerate() {
        if let Some(target) = insn.target() {
            leader[target] = true;
        }
        if insn.op().ends_block() && i + 1 < n {
            leader[i + 1] = true;
        }
    }

    let mut blocks = Vec::new();
    let mut block_of = vec![0usize; n];
    for (i, is_leader) in leader.iter().copied().enumerate() {
        if is_leader {
            blocks.push(BasicBlock {
                start: i,
                end: i + 1,
                succs: Vec::new(),
            });
        }
        let current = blocks.len() - 1;
        blocks[current].end = i + 1;
        block_of[i] = current;
    }

    for block in &mut blocks {
        let last = &insns[block.end - 1];
        if let Some(target) = last.target() {
            block.succs.push(BlockId(block_of[target]));
        }
        if !last.op().is_terminator() && block.end < n {
            block.succs.push(BlockId(block_of[block.end]));
        }
    }

    let mut preds = vec![Vec::new(); blocks.len()];
    for (idx, block) in blocks.iter().enumerate() {
        for succ in &block.succs {
            preds[succ.index()].push(BlockId(idx));
        }
    }

    ControlFlowGraph {
        entry: BlockId(0),
        blocks,
        preds,
    }
}
