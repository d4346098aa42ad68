//! Control flow graph representation.

use crate::errors::{AnalysisError, AnalysisResult};
use cw_classfile::code::Code;
use cw_classfile::constants::ConstantPool;
use cw_classfile::instrs::{Instr, Instruction, LabeledInstr, WideInstr};
use cw_classfile::Addr;
use fixedbitset::FixedBitSet;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Write;

/// A basic block: a maximal straight-line run of instructions, entered only
/// at its first instruction.
#[derive(Debug)]
pub struct Block {
    start: Addr,
    instrs: Vec<LabeledInstr>,
    can_throw: bool,
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for linstr in &self.instrs {
            writeln!(f, "{linstr}")?;
        }
        Ok(())
    }
}

impl Block {
    fn new(start: Addr, instrs: Vec<LabeledInstr>) -> Self {
        let can_throw = instrs.iter().any(Instruction::can_throw);
        Self {
            start,
            instrs,
            can_throw,
        }
    }

    #[inline]
    pub fn instructions(&self) -> impl Iterator<Item = &LabeledInstr> {
        self.instrs.iter()
    }

    #[inline]
    #[must_use]
    pub const fn start_addr(&self) -> Addr {
        self.start
    }

    /// Address of the last instruction of the block.
    #[must_use]
    pub fn end_addr(&self) -> Addr {
        self.instrs.last().map_or(self.start, LabeledInstr::addr)
    }

    /// Address following the last instruction of the block.
    #[must_use]
    pub fn next_addr(&self) -> Addr {
        self.instrs.last().map_or(self.start, LabeledInstr::next_addr)
    }

    #[inline]
    #[must_use]
    pub fn last_instruction(&self) -> Option<&LabeledInstr> {
        self.instrs.last()
    }

    #[inline]
    #[must_use]
    pub const fn can_throw(&self) -> bool {
        self.can_throw
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    IfTrue,
    IfFalse,
    Switch(i32),
    SwitchDefault,
    Jmp,
    /// Subroutine call; the return address is pushed on the stack.
    Jsr,
    Sequence,
    /// Edge to an exception handler, with the caught class (`None` for
    /// catch-all handlers).
    Catch(Option<String>),
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::IfTrue => write!(f, "<true>"),
            Self::IfFalse => write!(f, "<false>"),
            Self::Switch(key) => write!(f, "<switch {key}>"),
            Self::SwitchDefault => write!(f, "<switch _>"),
            Self::Jmp => write!(f, "<jmp>"),
            Self::Jsr => write!(f, "<jsr>"),
            Self::Sequence => write!(f, "<seq>"),
            Self::Catch(Some(cls)) => write!(f, "<catch {cls}>"),
            Self::Catch(None) => write!(f, "<catch *>"),
        }
    }
}

impl Branch {
    #[inline]
    #[must_use]
    pub const fn is_catch(&self) -> bool {
        matches!(self, Self::Catch(_))
    }
}

#[derive(Debug)]
pub struct Cfg {
    pub(crate) inner: DiGraph<Block, Branch>,
    node_ids: BTreeMap<Addr, NodeIndex>,
    entry: NodeIndex,
}

impl Cfg {
    #[inline]
    pub(crate) const fn start_index(&self) -> NodeIndex {
        self.entry
    }

    /// Blocks sorted by start address.
    pub fn iter_ordered_blocks(&self) -> impl Iterator<Item = &Block> {
        self.node_ids.values().map(move |id| &self.inner[*id])
    }

    #[inline]
    #[must_use]
    pub fn nb_blocks(&self) -> usize {
        self.inner.node_count()
    }

    #[must_use]
    pub fn block_at(&self, addr: Addr) -> Option<&Block> {
        self.node_ids.get(&addr).map(|id| &self.inner[*id])
    }

    /// Block containing the instruction at `addr`.
    #[must_use]
    pub fn block_containing(&self, addr: Addr) -> Option<&Block> {
        self.node_ids
            .range(..=addr)
            .next_back()
            .map(|(_, id)| &self.inner[*id])
            .filter(|block| addr < block.next_addr())
    }

    /// Outgoing edges of the block starting at `addr`, as (branch, successor start) pairs.
    #[must_use]
    pub fn successors(&self, addr: Addr) -> Vec<(&Branch, Addr)> {
        self.node_ids.get(&addr).map_or_else(Vec::new, |id| {
            let mut succs: Vec<_> = self
                .inner
                .edges_directed(*id, Direction::Outgoing)
                .map(|edge| (edge.weight(), self.inner[edge.target()].start_addr()))
                .collect();
            // petgraph lists edges latest first
            succs.reverse();
            succs
        })
    }

    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut res = String::new();
        res.push_str("digraph {\n");
        res.push_str("  splines=ortho;\n");
        res.push_str("  nodesep=2;\n");
        // writing into a String cannot fail
        let _ = write!(
            res,
            "{}",
            Dot::with_attr_getters(
                &self.inner,
                &[Config::GraphContentOnly, Config::EdgeNoLabel],
                &|_, edge| {
                    let color = match edge.weight() {
                        Branch::IfTrue => "green",
                        Branch::IfFalse => "red",
                        Branch::Switch(_) | Branch::SwitchDefault => "purple",
                        Branch::Jmp => "blue",
                        Branch::Jsr => "darkorange",
                        Branch::Catch(_) => "orchid",
                        Branch::Sequence => "black",
                    };
                    format!("color={},xlabel=\"{}\"", color, edge.weight())
                },
                &|_, (_, block)| if block.can_throw() {
                    String::from("shape=box,color=blue")
                } else {
                    String::from("shape=box,color=black")
                }
            )
        );
        res.push('}');
        res
    }

    /// Builds the control flow graph of a method body.
    ///
    /// # Errors
    ///
    /// Fails when the code cannot be decoded, is empty, or contains a branch
    /// (or handler) target that is not the address of an instruction. Only
    /// sequential fall-through may leave the code, with a warning.
    pub fn build(code: &Code, pool: &ConstantPool) -> AnalysisResult<Self> {
        let instrs = code.instructions()?;
        if instrs.is_empty() {
            return Err(AnalysisError::NoCode);
        }

        let mut boundaries = FixedBitSet::with_capacity(code.len());
        for linstr in &instrs {
            boundaries.insert(linstr.addr().0);
        }

        let leaders = compute_block_leaders(code, &instrs, &boundaries)?;

        let mut cfgraph = DiGraph::new();
        let mut node_ids = BTreeMap::new();
        for block in split_into_blocks(instrs, &leaders) {
            node_ids.insert(block.start_addr(), cfgraph.add_node(block));
        }
        let entry = *node_ids
            .get(&Addr::entry())
            .ok_or_else(|| AnalysisError::Internal("no entry block".to_string()))?;

        let breakers: Vec<(NodeIndex, LabeledInstr)> = cfgraph
            .node_indices()
            .filter_map(|id| {
                cfgraph[id]
                    .last_instruction()
                    .map(|linstr| (id, linstr.clone()))
            })
            .collect();
        for (src_id, linstr) in breakers {
            for (branch, dst) in branch_targets(&linstr)? {
                match node_ids.get(&dst) {
                    Some(dst_id) => {
                        cfgraph.add_edge(src_id, *dst_id, branch);
                    }
                    None => log::warn!(
                        "control flow falls off the end of the code after pc {}",
                        linstr.addr()
                    ),
                }
            }
            for (branch, dst) in handler_targets(code, pool, &linstr)? {
                cfgraph.add_edge(src_id, node_ids[&dst], branch);
            }
        }

        Ok(Self {
            inner: cfgraph,
            node_ids,
            entry,
        })
    }
}

// Block leaders are block first instructions addresses:
//   - the entry point
//   - targets of branching instructions, and the address following them
//   - the address following a return, a throw or a ret
//   - exception handlers entry points
//   - the address following any instruction protected by a handler, since
//     control may leave the block toward the handler there
fn compute_block_leaders(
    code: &Code,
    instrs: &[LabeledInstr],
    boundaries: &FixedBitSet,
) -> AnalysisResult<BTreeSet<Addr>> {
    let mut leaders = BTreeSet::new();
    leaders.insert(Addr::entry());

    for linstr in instrs {
        if ends_block(linstr.instr()) {
            leaders.insert(linstr.next_addr());
        }
        for (branch, dst) in branch_targets(linstr)? {
            // falling through past the last instruction is only warned about
            let fall_through = matches!(branch, Branch::Sequence | Branch::IfFalse);
            let outside = dst.0 >= code.len() && !fall_through;
            if outside || (dst.0 < code.len() && !boundaries.contains(dst.0)) {
                return Err(AnalysisError::InvalidBranchTarget {
                    from: linstr.addr(),
                    target: dst.0 as i64,
                });
            }
            leaders.insert(dst);
        }
        if code.active_handlers(linstr.addr()).next().is_some() {
            leaders.insert(linstr.next_addr());
        }
    }

    for entry in code.exception_table() {
        let handler = entry.handler_addr();
        if !boundaries.contains(handler.0) {
            return Err(AnalysisError::InvalidBranchTarget {
                from: Addr(usize::from(entry.start_pc)),
                target: i64::from(entry.handler_pc),
            });
        }
        leaders.insert(handler);
    }

    // the address right after the code is not a block
    leaders.retain(|addr| addr.0 < code.len());
    Ok(leaders)
}

fn split_into_blocks(instrs: Vec<LabeledInstr>, leaders: &BTreeSet<Addr>) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    let mut start = Addr::entry();

    for linstr in instrs {
        if leaders.contains(&linstr.addr()) && !current.is_empty() {
            blocks.push(Block::new(start, std::mem::take(&mut current)));
        }
        if current.is_empty() {
            start = linstr.addr();
        }
        current.push(linstr);
    }
    if !current.is_empty() {
        blocks.push(Block::new(start, current));
    }

    blocks
}

fn ends_block(instr: &Instr) -> bool {
    is_branching(instr) || is_exit(instr)
}

fn is_branching(instr: &Instr) -> bool {
    matches!(
        instr,
        Instr::Ifeq(_)
            | Instr::Ifne(_)
            | Instr::Iflt(_)
            | Instr::Ifge(_)
            | Instr::Ifgt(_)
            | Instr::Ifle(_)
            | Instr::IfIcmpeq(_)
            | Instr::IfIcmpne(_)
            | Instr::IfIcmplt(_)
            | Instr::IfIcmpge(_)
            | Instr::IfIcmpgt(_)
            | Instr::IfIcmple(_)
            | Instr::IfAcmpeq(_)
            | Instr::IfAcmpne(_)
            | Instr::Ifnull(_)
            | Instr::Ifnonnull(_)
            | Instr::Goto(_)
            | Instr::GotoW(_)
            | Instr::Jsr(_)
            | Instr::JsrW(_)
            | Instr::Tableswitch(_)
            | Instr::Lookupswitch(_)
    )
}

/// Instructions leaving the method or the subroutine.
fn is_exit(instr: &Instr) -> bool {
    matches!(
        instr,
        Instr::Ireturn
            | Instr::Lreturn
            | Instr::Freturn
            | Instr::Dreturn
            | Instr::Areturn
            | Instr::Return
            | Instr::Athrow
            | Instr::Ret(_)
            | Instr::Wide(WideInstr::Ret(_))
    )
}

fn jump(linstr: &LabeledInstr, offset: i32) -> AnalysisResult<Addr> {
    linstr
        .addr()
        .offset(offset)
        .ok_or(AnalysisError::InvalidBranchTarget {
            from: linstr.addr(),
            target: linstr.addr().0 as i64 + i64::from(offset),
        })
}

/// Control flow successors of an instruction, exception handlers excluded.
///
/// Conditional branches yield their target and the next instruction,
/// `goto` and `jsr` their target only, switches every case target and
/// their default, returns, `athrow` and `ret` nothing. Any other
/// instruction falls through to the next one.
///
/// # Errors
///
/// Fails when a branch offset points before the code start.
pub fn branch_targets(linstr: &LabeledInstr) -> AnalysisResult<Vec<(Branch, Addr)>> {
    match linstr.instr() {
        Instr::Ifeq(off)
        | Instr::Ifne(off)
        | Instr::Iflt(off)
        | Instr::Ifge(off)
        | Instr::Ifgt(off)
        | Instr::Ifle(off)
        | Instr::IfIcmpeq(off)
        | Instr::IfIcmpne(off)
        | Instr::IfIcmplt(off)
        | Instr::IfIcmpge(off)
        | Instr::IfIcmpgt(off)
        | Instr::IfIcmple(off)
        | Instr::IfAcmpeq(off)
        | Instr::IfAcmpne(off)
        | Instr::Ifnull(off)
        | Instr::Ifnonnull(off) => Ok(vec![
            (Branch::IfTrue, jump(linstr, off.0)?),
            (Branch::IfFalse, linstr.next_addr()),
        ]),
        Instr::Goto(off) | Instr::GotoW(off) => Ok(vec![(Branch::Jmp, jump(linstr, off.0)?)]),
        Instr::Jsr(off) | Instr::JsrW(off) => Ok(vec![(Branch::Jsr, jump(linstr, off.0)?)]),
        Instr::Tableswitch(table) => {
            let mut targets = table
                .cases()
                .map(|(key, off)| Ok((Branch::Switch(key), jump(linstr, off)?)))
                .collect::<AnalysisResult<Vec<_>>>()?;
            targets.push((Branch::SwitchDefault, jump(linstr, table.default)?));
            Ok(targets)
        }
        Instr::Lookupswitch(table) => {
            let mut targets = table
                .pairs
                .iter()
                .map(|(key, off)| Ok((Branch::Switch(*key), jump(linstr, *off)?)))
                .collect::<AnalysisResult<Vec<_>>>()?;
            targets.push((Branch::SwitchDefault, jump(linstr, table.default)?));
            Ok(targets)
        }
        instr if is_exit(instr) => Ok(vec![]),
        _ => Ok(vec![(Branch::Sequence, linstr.next_addr())]),
    }
}

fn handler_targets(
    code: &Code,
    pool: &ConstantPool,
    linstr: &LabeledInstr,
) -> AnalysisResult<Vec<(Branch, Addr)>> {
    code.active_handlers(linstr.addr())
        .map(|entry| {
            let caught = match entry.catch_type {
                0 => None,
                index => Some(pool.class_name(usize::from(index))?),
            };
            Ok((Branch::Catch(caught), entry.handler_addr()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_classfile::classes::ClassFile;
    use cw_classfile::testing::{ClassBuilder, Handler};

    fn method_cfg(code: &[u8], handlers: &[Handler]) -> AnalysisResult<Cfg> {
        let class = build_class(code, handlers);
        let method = class.iter_methods().next().unwrap();
        Cfg::build(method.code().unwrap(), class.constant_pool())
    }

    fn build_class(code: &[u8], handlers: &[Handler]) -> ClassFile {
        let mut builder = ClassBuilder::new("t/Flow");
        let handlers: Vec<Handler> = handlers
            .iter()
            .map(|&(s, e, h, t)| {
                if t == 0 {
                    (s, e, h, 0)
                } else {
                    (s, e, h, builder.class("java/lang/Exception"))
                }
            })
            .collect();
        builder.method_with_code(0x0009, "m", "(I)I", 4, 4, code, &handlers);
        builder.parse().unwrap()
    }

    fn starts(cfg: &Cfg) -> Vec<usize> {
        cfg.iter_ordered_blocks().map(|b| b.start_addr().0).collect()
    }

    fn assert_partition(cfg: &Cfg, code_len: usize) {
        let mut expected = 0;
        for block in cfg.iter_ordered_blocks() {
            assert_eq!(expected, block.start_addr().0);
            let mut addr = block.start_addr();
            for linstr in block.instructions() {
                assert_eq!(addr, linstr.addr());
                addr = linstr.next_addr();
            }
            expected = block.next_addr().0;
        }
        assert_eq!(code_len, expected);
    }

    fn assert_successors_match_targets(cfg: &Cfg, code_len: usize) {
        for block in cfg.iter_ordered_blocks() {
            let last = block.last_instruction().unwrap();
            let expected: BTreeSet<usize> = branch_targets(last)
                .unwrap()
                .into_iter()
                .map(|(_, addr)| addr.0)
                .filter(|addr| *addr < code_len)
                .collect();
            let found: BTreeSet<usize> = cfg
                .successors(block.start_addr())
                .into_iter()
                .filter(|(branch, _)| !branch.is_catch())
                .map(|(_, addr)| addr.0)
                .collect();
            assert_eq!(expected, found, "block@{}", block.start_addr());
        }
    }

    #[test]
    fn single_block() {
        // iload_0; ireturn
        let cfg = method_cfg(&[0x1a, 0xac], &[]).unwrap();
        assert_eq!(vec![0], starts(&cfg));
        assert!(cfg.successors(Addr(0)).is_empty());
    }

    #[test]
    fn if_else_diamond() {
        //  0: iload_0
        //  1: ifeq +7 (-> 8)
        //  4: iconst_1
        //  5: goto +4 (-> 9)
        //  8: iconst_0
        //  9: ireturn
        let code = [0x1a, 0x99, 0x00, 0x07, 0x04, 0xa7, 0x00, 0x04, 0x03, 0xac];
        let cfg = method_cfg(&code, &[]).unwrap();
        assert_eq!(vec![0, 4, 8, 9], starts(&cfg));
        assert_eq!(
            vec![(&Branch::IfTrue, Addr(8)), (&Branch::IfFalse, Addr(4))],
            cfg.successors(Addr(0))
        );
        assert_eq!(vec![(&Branch::Jmp, Addr(9))], cfg.successors(Addr(4)));
        assert_eq!(vec![(&Branch::Sequence, Addr(9))], cfg.successors(Addr(8)));
        assert_partition(&cfg, code.len());
        assert_successors_match_targets(&cfg, code.len());
    }

    #[test]
    fn tableswitch_edges() {
        //  0: iload_0
        //  1: tableswitch (2 bytes padding) default -> 28, 0..=2 -> 28, 30, 32
        // 28: iconst_0  29: ireturn
        // 30: iconst_1  31: ireturn
        // 32: iconst_2  33: ireturn
        let mut code = vec![0x1a, 0xaa, 0x00, 0x00];
        for v in [27i32, 0, 2, 27, 29, 31] {
            code.extend(v.to_be_bytes());
        }
        code.extend([0x03, 0xac, 0x04, 0xac, 0x05, 0xac]);
        let cfg = method_cfg(&code, &[]).unwrap();
        assert_eq!(vec![0, 28, 30, 32], starts(&cfg));
        let succs = cfg.successors(Addr(0));
        assert_eq!(4, succs.len());
        assert_eq!(
            vec![
                (&Branch::Switch(0), Addr(28)),
                (&Branch::Switch(1), Addr(30)),
                (&Branch::Switch(2), Addr(32)),
                (&Branch::SwitchDefault, Addr(28)),
            ],
            succs
        );
        assert_partition(&cfg, code.len());
        assert_successors_match_targets(&cfg, code.len());
    }

    #[test]
    fn exception_handler_edges() {
        //  0: iconst_0
        //  1: istore_1
        //  2: iload_0      covered
        //  3: iconst_2     covered
        //  4: idiv         covered
        //  5: istore_1     covered
        //  6: nop          covered
        //  7: nop          covered
        //  8: nop          covered
        //  9: nop          covered
        // 10: goto +12 (-> 22)
        // 13..19: nop
        // 20: istore_2 (handler)
        // 21: iconst_0
        // 22: iload_1 ... ireturn
        let mut code = vec![0x03, 0x3c, 0x1a, 0x05, 0x6c, 0x3c, 0x00, 0x00, 0x00, 0x00];
        code.extend([0xa7, 0x00, 0x0c]);
        code.extend([0x00; 7]);
        code.extend([0x3d, 0x03, 0x1b, 0xac]);
        let cfg = method_cfg(&code, &[(2, 10, 20, 1)]).unwrap();

        assert!(cfg.block_at(Addr(20)).is_some());
        let covered = cfg.block_containing(Addr(9)).unwrap();
        assert!(cfg
            .successors(covered.start_addr())
            .contains(&(&Branch::Catch(Some("java/lang/Exception".to_string())), Addr(20))));
        // every covered instruction ends its block
        for pc in 2..10 {
            let block = cfg.block_containing(Addr(pc)).unwrap();
            assert_eq!(Addr(pc), block.end_addr());
        }
        // the goto at 10 is outside the range
        assert!(cfg
            .successors(Addr(10))
            .iter()
            .all(|(branch, _)| !branch.is_catch()));
        assert_partition(&cfg, code.len());
        assert_successors_match_targets(&cfg, code.len());
    }

    #[test]
    fn catch_all_handler() {
        // 0: iload_0  1: ireturn  2: pop? no: handler at 2 -> iconst_0; ireturn
        let code = [0x1a, 0xac, 0x03, 0xac];
        let cfg = method_cfg(&code, &[(0, 2, 2, 0)]).unwrap();
        assert!(cfg
            .successors(Addr(0))
            .contains(&(&Branch::Catch(None), Addr(2))));
        assert_eq!(vec![0, 1, 2], starts(&cfg));
    }

    #[test]
    fn jsr_has_no_fallthrough_edge() {
        // 0: jsr +4 (-> 4)  3: return  4: astore_1  5: ret 1
        let code = [0xa8, 0x00, 0x04, 0xb1, 0x4c, 0xa9, 0x01];
        let cfg = method_cfg(&code, &[]).unwrap();
        assert_eq!(vec![0, 3, 4], starts(&cfg));
        assert_eq!(vec![(&Branch::Jsr, Addr(4))], cfg.successors(Addr(0)));
        assert!(cfg.successors(Addr(4)).is_empty());
    }

    #[test]
    fn bad_branch_targets() {
        // goto into the middle of the goto itself
        assert!(matches!(
            method_cfg(&[0xa7, 0x00, 0x01, 0xb1], &[]),
            Err(AnalysisError::InvalidBranchTarget { .. })
        ));
        // goto before the code start
        assert!(matches!(
            method_cfg(&[0x00, 0xa7, 0xff, 0xf0], &[]),
            Err(AnalysisError::InvalidBranchTarget { .. })
        ));
        // goto +100 in a 4 bytes long code
        assert!(matches!(
            method_cfg(&[0xa7, 0x00, 0x64, 0xb1], &[]),
            Err(AnalysisError::InvalidBranchTarget { target: 100, .. })
        ));
        // goto to the address right after the code
        assert!(matches!(
            method_cfg(&[0xa7, 0x00, 0x03], &[]),
            Err(AnalysisError::InvalidBranchTarget { target: 3, .. })
        ));
        // iload_0 ifeq +9 return: taken branch lands past the end
        assert!(matches!(
            method_cfg(&[0x1a, 0x99, 0x00, 0x09, 0xb1], &[]),
            Err(AnalysisError::InvalidBranchTarget { target: 10, .. })
        ));
        // iload_0 tableswitch: case 0 reaches the return at 20, default lands at 41
        let mut switch = vec![0x1a, 0xaa, 0x00, 0x00];
        switch.extend_from_slice(&40i32.to_be_bytes());
        switch.extend_from_slice(&0i32.to_be_bytes());
        switch.extend_from_slice(&0i32.to_be_bytes());
        switch.extend_from_slice(&19i32.to_be_bytes());
        switch.push(0xb1);
        assert_eq!(21, switch.len());
        assert!(matches!(
            method_cfg(&switch, &[]),
            Err(AnalysisError::InvalidBranchTarget { target: 41, .. })
        ));
    }

    #[test]
    fn falling_off_the_end() {
        // iconst_0 with nothing after it: no successor at all
        let cfg = method_cfg(&[0x03], &[]).unwrap();
        assert!(cfg.successors(Addr(0)).is_empty());
    }

    #[test]
    fn dot_output() {
        let code = [0x1a, 0x99, 0x00, 0x07, 0x04, 0xa7, 0x00, 0x04, 0x03, 0xac];
        let dot = method_cfg(&code, &[]).unwrap().to_dot();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("color=green"));
        assert!(dot.contains("color=red"));
        assert!(dot.ends_with('}'));
    }
}
