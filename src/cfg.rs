//! Control-flow graph construction.
//!
//! A function body (`BLOCK` subtree) becomes a graph of basic blocks joined by
//! typed edges. Blocks and edges live in a per-function [`petgraph::graph::Graph`]
//! arena and are addressed by handles, so the doubly-threaded edge lists are
//! the graph's own adjacency and destruction is a single arena drop.
//!
//! The builder threads a loop context through the recursion: the pending
//! empty block that the next construct may take over, and the exit block a
//! `break` must target. A block whose terminator is a `break` accepts no
//! further out-edges; attempts are dropped silently, which keeps the
//! single-out-edge invariant intact across all control constructs.

use crate::ast::AstNode;
use crate::labels::{self, Kind};
use crate::ot::{self, OtErrors, OtKind, OtNode};
use crate::types;
use petgraph::Direction;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::Bfs;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Conditional,
    Unconditional,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeType {
    TrueCondition,
    FalseCondition,
    UnconditionalJump,
}

/// One statement inside a basic block: the display text derived from the
/// originating AST label plus the operation tree (absent when the expression
/// rewriter produced nothing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub text: String,
    pub ot: Option<OtNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub id: u32,
    pub block_type: BlockType,
    pub name: String,
    pub instructions: Vec<Instruction>,
    pub is_empty: bool,
    pub is_break: bool,
}

/// A typed edge; `condition` carries the guard's display text on the
/// true/false branches of a conditional block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub edge_type: EdgeType,
    pub condition: Option<String>,
}

/// A finished per-function control-flow graph. `entry` is the synthetic
/// `START` block (id 0, no instructions); exactly one block is `Terminal`
/// and named `END`.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub graph: Graph<BasicBlock, Edge>,
    pub entry: NodeIndex,
}

impl Cfg {
    pub fn end(&self) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&i| self.graph[i].block_type == BlockType::Terminal)
    }

    /// Blocks in creation order (ids ascending).
    pub fn blocks(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }
}

pub struct CfgBuilder<'a> {
    graph: Graph<BasicBlock, Edge>,
    entry: NodeIndex,
    next_id: u32,
    file_name: &'a str,
    errors: &'a mut Vec<String>,
    warnings: &'a mut Vec<String>,
}

impl<'a> CfgBuilder<'a> {
    pub fn new(
        file_name: &'a str,
        errors: &'a mut Vec<String>,
        warnings: &'a mut Vec<String>,
    ) -> Self {
        let mut graph = Graph::with_capacity(16, 16);
        let entry = graph.add_node(BasicBlock {
            id: 0,
            block_type: BlockType::Unconditional,
            name: "START".to_owned(),
            instructions: Vec::new(),
            is_empty: true,
            is_break: false,
        });
        Self {
            graph,
            entry,
            next_id: 1,
            file_name,
            errors,
            warnings,
        }
    }

    /// Build the CFG for one function body and run the return-expression
    /// fixup. `func_line`/`func_pos` locate the function name for the
    /// no-return warning.
    pub fn build(mut self, body: &AstNode, func_line: u32, func_pos: u32) -> Cfg {
        let first = self.alloc_block(BlockType::Unconditional, "BLOCK");
        self.add_edge(self.entry, first, EdgeType::UnconditionalJump, None);
        let last = self.build_block(body, first, None);
        self.finish(last, func_line, func_pos)
    }

    fn alloc_block(&mut self, block_type: BlockType, name: &str) -> NodeIndex {
        let id = self.next_id;
        self.next_id += 1;
        debug!(target: "cfg", "block {id} ({name})");
        self.graph.add_node(BasicBlock {
            id,
            block_type,
            name: name.to_owned(),
            instructions: Vec::new(),
            is_empty: true,
            is_break: false,
        })
    }

    /// Take over `current` if it is still an empty pending block (renaming and
    /// retyping it), otherwise allocate a successor and wire the fall-through
    /// edge. This is what keeps the graph free of empty landing blocks
    /// between sequential constructs.
    fn take_or_alloc(&mut self, current: NodeIndex, block_type: BlockType, name: &str) -> NodeIndex {
        if self.graph[current].is_empty {
            let block = &mut self.graph[current];
            debug!(target: "cfg", "reusing empty block {} as {name}", block.id);
            block.block_type = block_type;
            block.name = name.to_owned();
            current
        } else {
            let next = self.alloc_block(block_type, name);
            self.add_edge(current, next, EdgeType::UnconditionalJump, None);
            next
        }
    }

    fn append(&mut self, block: NodeIndex, text: &str, ot: Option<OtNode>) {
        let block = &mut self.graph[block];
        debug!(target: "cfg", "block {} ← instruction `{text}`", block.id);
        block.instructions.push(Instruction {
            text: text.to_owned(),
            ot,
        });
        block.is_empty = false;
    }

    fn add_edge(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        edge_type: EdgeType,
        condition: Option<String>,
    ) {
        if self.graph[from].is_break {
            debug!(
                target: "cfg",
                "edge from break block {} dropped",
                self.graph[from].id
            );
            return;
        }
        debug!(
            target: "cfg",
            "edge {} → {} ({edge_type:?})",
            self.graph[from].id,
            self.graph[to].id
        );
        self.graph.add_edge(from, to, Edge {
            edge_type,
            condition,
        });
    }

    fn expr_ot(&mut self, expr: &AstNode) -> Option<OtNode> {
        let mut ot_errors = OtErrors::default();
        let ot = ot::build_expr(expr, false, false, &mut ot_errors, self.file_name);
        self.errors.append(&mut ot_errors.messages);
        ot
    }

    /// Process the statements of one `BLOCK`, returning the block that is
    /// current when the statement list ends.
    fn build_block(
        &mut self,
        block: &AstNode,
        mut current: NodeIndex,
        loop_exit: Option<NodeIndex>,
    ) -> NodeIndex {
        assert_eq!(block.label, labels::BLOCK, "expected BLOCK node");

        let stmts = &block.children;
        for (i, stmt) in stmts.iter().enumerate() {
            match labels::lookup(&stmt.label) {
                Kind::Block => {
                    current = self.build_block(stmt, current, loop_exit);
                }
                Kind::Var => {
                    let ty = types::parse_typeref(&stmt.children[0]);
                    let mut ot_errors = OtErrors::default();
                    let ot = ot::build_var(stmt, &ty, &mut ot_errors, self.file_name);
                    self.errors.append(&mut ot_errors.messages);
                    self.append(current, labels::VAR, Some(ot));
                }
                Kind::Expr => {
                    let ot = self.expr_ot(&stmt.children[0]);
                    self.append(current, labels::EXPR, ot);
                }
                Kind::If => {
                    current = self.build_if(stmt, current, loop_exit);
                }
                Kind::While => {
                    current = self.build_while(stmt, current);
                }
                Kind::DoWhile => {
                    current = self.build_do_while(stmt, current);
                }
                Kind::Break => {
                    let ot = OtNode::new(OtKind::Break, stmt.line, stmt.pos, stmt.is_imaginary);
                    self.append(current, labels::BREAK, Some(ot));
                    if let Some(exit) = loop_exit {
                        self.add_edge(current, exit, EdgeType::UnconditionalJump, None);
                        self.graph[current].is_break = true;
                        if let Some(next_stmt) = stmts.get(i + 1) {
                            self.errors.push(format!(
                                "Control error. Unreachable code after break at {}:{}:{}",
                                self.file_name,
                                next_stmt.line,
                                next_stmt.pos + 1
                            ));
                            return current;
                        }
                    } else {
                        self.errors.push(format!(
                            "Control error. Break is out of loop at {}:{}:{}",
                            self.file_name,
                            stmt.line,
                            stmt.pos + 1
                        ));
                    }
                }
                Kind::Other => {
                    debug!(target: "cfg", "skipping statement label `{}`", stmt.label);
                }
            }
        }
        current
    }

    fn build_if(
        &mut self,
        stmt: &AstNode,
        current: NodeIndex,
        loop_exit: Option<NodeIndex>,
    ) -> NodeIndex {
        let cond_ast = guard_expr(&stmt.children[0]);
        let cond_text = cond_ast.label.clone();

        let cond = self.take_or_alloc(current, BlockType::Conditional, "IF_COND");
        let guard = self.expr_ot(cond_ast);
        self.append(cond, &cond_text, guard);

        let join = self.alloc_block(BlockType::Unconditional, "IF_EXIT");

        let then_entry = self.alloc_block(BlockType::Unconditional, "IF_TRUE");
        self.add_edge(
            cond,
            then_entry,
            EdgeType::TrueCondition,
            Some(cond_text.clone()),
        );
        let then_exit = self.build_block(&stmt.children[1], then_entry, loop_exit);
        self.add_edge(then_exit, join, EdgeType::UnconditionalJump, None);

        match stmt.children.iter().find(|c| c.label == labels::ELSE) {
            Some(else_node) => {
                let else_entry = self.alloc_block(BlockType::Unconditional, "IF_FALSE");
                self.add_edge(cond, else_entry, EdgeType::FalseCondition, Some(cond_text));
                let else_exit = self.build_block(&else_node.children[0], else_entry, loop_exit);
                self.add_edge(else_exit, join, EdgeType::UnconditionalJump, None);
            }
            None => {
                self.add_edge(cond, join, EdgeType::FalseCondition, Some(cond_text));
            }
        }
        join
    }

    fn build_while(&mut self, stmt: &AstNode, current: NodeIndex) -> NodeIndex {
        let cond_ast = guard_expr(&stmt.children[0]);
        let cond_text = cond_ast.label.clone();

        let cond = self.take_or_alloc(current, BlockType::Conditional, "WHILE_COND");
        let guard = self.expr_ot(cond_ast);
        self.append(cond, &cond_text, guard);

        let exit = self.alloc_block(BlockType::Unconditional, "WHILE_EXIT");
        let body = self.alloc_block(BlockType::Unconditional, "WHILE_BODY");
        self.add_edge(cond, body, EdgeType::TrueCondition, Some(cond_text.clone()));
        self.add_edge(cond, exit, EdgeType::FalseCondition, Some(cond_text));

        let body_exit = self.build_block(&stmt.children[1], body, Some(exit));
        self.add_edge(body_exit, cond, EdgeType::UnconditionalJump, None);
        exit
    }

    fn build_do_while(&mut self, stmt: &AstNode, current: NodeIndex) -> NodeIndex {
        let body = self.take_or_alloc(current, BlockType::Unconditional, "DO_WHILE_BODY");
        let exit = self.alloc_block(BlockType::Unconditional, "DO_WHILE_EXIT");

        let cond_ast = guard_expr(&stmt.children[1]);
        let cond_text = cond_ast.label.clone();
        let cond = self.alloc_block(BlockType::Conditional, "DO_WHILE_COND");
        let guard = self.expr_ot(cond_ast);
        self.append(cond, &cond_text, guard);

        self.add_edge(cond, body, EdgeType::TrueCondition, Some(cond_text.clone()));
        self.add_edge(cond, exit, EdgeType::FalseCondition, Some(cond_text));

        let body_exit = self.build_block(&stmt.children[0], body, Some(exit));
        self.add_edge(body_exit, cond, EdgeType::UnconditionalJump, None);
        exit
    }

    /// Append (or reuse) the terminal `END` block, then give every
    /// END-predecessor last-expression-as-return semantics: a usable last
    /// operation tree is wrapped in a synthetic `return`, anything else earns
    /// a no-return warning.
    fn finish(mut self, last: NodeIndex, func_line: u32, func_pos: u32) -> Cfg {
        let end = if self.graph[last].is_empty {
            let block = &mut self.graph[last];
            block.block_type = BlockType::Terminal;
            block.name = "END".to_owned();
            last
        } else {
            let end = self.alloc_block(BlockType::Terminal, "END");
            self.add_edge(last, end, EdgeType::UnconditionalJump, None);
            end
        };

        let preds: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(end, Direction::Incoming)
            .collect();
        for pred in preds {
            let block = &mut self.graph[pred];
            let wrapped = match block.instructions.last_mut() {
                Some(instr) => match instr.ot.take() {
                    Some(root) if root.produces_value() => {
                        let mut ret = OtNode::new(OtKind::Return, root.line, root.pos, true);
                        ret.children.push(root);
                        instr.ot = Some(ret);
                        true
                    }
                    other => {
                        instr.ot = other;
                        false
                    }
                },
                None => false,
            };
            if !wrapped {
                self.warnings.push(format!(
                    "No-return warning. There are no instructions to use as a return value at {}:{}:{}",
                    self.file_name,
                    func_line,
                    func_pos + 1
                ));
            }
        }

        if cfg!(debug_assertions) {
            let mut reachable: HashSet<NodeIndex> = HashSet::new();
            let mut bfs = Bfs::new(&self.graph, self.entry);
            while let Some(nx) = bfs.next(&self.graph) {
                reachable.insert(nx);
            }
            if reachable.len() != self.graph.node_count() {
                let unreachable: Vec<u32> = self
                    .graph
                    .node_indices()
                    .filter(|i| !reachable.contains(i))
                    .map(|i| self.graph[i].id)
                    .collect();
                debug!(target: "cfg", "unreachable blocks: {unreachable:?}");
            }
        }

        debug!(
            target: "cfg",
            "CFG done — blocks: {}, edges: {}",
            self.graph.node_count(),
            self.graph.edge_count()
        );
        Cfg {
            graph: self.graph,
            entry: self.entry,
        }
    }
}

/// Guards arrive either as a bare expression or wrapped in an `EXPR` node.
fn guard_expr(node: &AstNode) -> &AstNode {
    if node.label == labels::EXPR {
        &node.children[0]
    } else {
        node
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ot::{dec_lit, ident};
    use petgraph::visit::EdgeRef;

    fn build(body: AstNode) -> (Cfg, Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let cfg = CfgBuilder::new("a.lang", &mut errors, &mut warnings).build(&body, 1, 0);
        (cfg, errors, warnings)
    }

    fn assign(name: &str, value: &str, line: u32) -> AstNode {
        AstNode::new(
            labels::EXPR,
            vec![
                AstNode::new(
                    labels::ASSIGN,
                    vec![ident(name, line, 0), dec_lit(value, line, 4)],
                )
                .at(line, 2),
            ],
        )
        .at(line, 0)
    }

    fn out_edges(cfg: &Cfg, block: NodeIndex) -> Vec<(EdgeType, NodeIndex)> {
        cfg.graph
            .edges_directed(block, Direction::Outgoing)
            .map(|e| (e.weight().edge_type, e.target()))
            .collect()
    }

    #[test]
    fn empty_body_is_start_to_end() {
        let (cfg, errors, warnings) = build(AstNode::new(labels::BLOCK, vec![]));

        assert_eq!(cfg.graph.node_count(), 2);
        assert_eq!(cfg.graph[cfg.entry].id, 0);
        assert!(cfg.graph[cfg.entry].instructions.is_empty());

        let end = cfg.end().expect("terminal block");
        assert_eq!(cfg.graph[end].name, "END");
        assert!(cfg.graph[end].instructions.is_empty());

        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("no instructions to use as a return value"));
        assert!(warnings[0].contains("a.lang:1:1"));
    }

    #[test]
    fn bare_last_expression_becomes_a_return() {
        let sum = AstNode::new(
            labels::PLUS,
            vec![dec_lit("1", 2, 4), dec_lit("2", 2, 8)],
        )
        .at(2, 6);
        let body = AstNode::new(
            labels::BLOCK,
            vec![AstNode::new(labels::EXPR, vec![sum]).at(2, 4)],
        );

        let (cfg, errors, warnings) = build(body);
        assert!(errors.is_empty());
        assert!(warnings.is_empty());

        let end = cfg.end().unwrap();
        let pred = cfg
            .graph
            .neighbors_directed(end, Direction::Incoming)
            .next()
            .unwrap();
        let block = &cfg.graph[pred];
        assert_eq!(block.instructions.len(), 1);
        let root = block.instructions[0].ot.as_ref().unwrap();
        assert_eq!(root.kind, OtKind::Return);
        assert!(root.is_imaginary);
        assert!(matches!(root.children[0].kind, OtKind::BinOp(_)));
    }

    #[test]
    fn break_inside_while_cuts_dead_code() {
        let body = AstNode::new(
            labels::BLOCK,
            vec![
                AstNode::new(
                    labels::WHILE,
                    vec![
                        ident("x", 2, 9),
                        AstNode::new(
                            labels::BLOCK,
                            vec![
                                AstNode::new(labels::BREAK, vec![]).at(3, 4),
                                assign("x", "1", 4),
                            ],
                        ),
                    ],
                )
                .at(2, 2),
            ],
        );

        let (cfg, errors, _warnings) = build(body);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Control error. Unreachable code after break"));
        assert!(errors[0].contains("a.lang:4:1"));

        let break_block = cfg
            .blocks()
            .find(|&b| cfg.graph[b].is_break)
            .expect("break block");
        // the break instruction is the only one — nothing was emitted for x = 1
        assert_eq!(cfg.graph[break_block].instructions.len(), 1);
        assert_eq!(
            cfg.graph[break_block].instructions[0]
                .ot
                .as_ref()
                .unwrap()
                .kind,
            OtKind::Break
        );

        // exactly one out-edge, and it targets the loop exit (retyped END here)
        let outs = out_edges(&cfg, break_block);
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].0, EdgeType::UnconditionalJump);
        assert_eq!(outs[0].1, cfg.end().unwrap());
    }

    #[test]
    fn break_outside_loop_is_reported_without_an_exit_edge() {
        let body = AstNode::new(
            labels::BLOCK,
            vec![AstNode::new(labels::BREAK, vec![]).at(2, 4)],
        );

        let (cfg, errors, _warnings) = build(body);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Control error. Break is out of loop"));
        assert!(errors[0].contains("a.lang:2:5"));

        assert!(cfg.blocks().all(|b| !cfg.graph[b].is_break));
        // the block still falls through to END as usual
        let end = cfg.end().unwrap();
        assert_eq!(
            cfg.graph
                .neighbors_directed(end, Direction::Incoming)
                .count(),
            1
        );
    }

    #[test]
    fn if_else_branches_join_without_a_landing_block() {
        let body = AstNode::new(
            labels::BLOCK,
            vec![
                AstNode::new(
                    labels::IF,
                    vec![
                        ident("a", 2, 6),
                        AstNode::new(labels::BLOCK, vec![assign("x", "1", 3)]),
                        AstNode::new(
                            labels::ELSE,
                            vec![AstNode::new(labels::BLOCK, vec![assign("x", "2", 5)])],
                        ),
                    ],
                )
                .at(2, 2),
                assign("y", "3", 7),
            ],
        );

        let (cfg, errors, _warnings) = build(body);
        assert!(errors.is_empty());

        let join = cfg
            .blocks()
            .find(|&b| {
                cfg.graph[b]
                    .instructions
                    .first()
                    .is_some_and(|i| i.text == labels::EXPR)
                    && cfg.graph[b].name == "IF_EXIT"
            })
            .expect("reused join block");

        let preds: Vec<NodeIndex> = cfg
            .graph
            .neighbors_directed(join, Direction::Incoming)
            .collect();
        assert_eq!(preds.len(), 2);
        for p in preds {
            assert_eq!(cfg.graph[p].block_type, BlockType::Unconditional);
            assert!(!cfg.graph[p].instructions.is_empty());
        }
    }

    #[test]
    fn conditional_blocks_carry_true_and_false_edges() {
        let body = AstNode::new(
            labels::BLOCK,
            vec![
                AstNode::new(
                    labels::WHILE,
                    vec![
                        ident("x", 2, 9),
                        AstNode::new(labels::BLOCK, vec![assign("x", "0", 3)]),
                    ],
                )
                .at(2, 2),
            ],
        );

        let (cfg, errors, _warnings) = build(body);
        assert!(errors.is_empty());

        let cond = cfg
            .blocks()
            .find(|&b| cfg.graph[b].block_type == BlockType::Conditional)
            .expect("condition block");
        let outs = out_edges(&cfg, cond);
        assert_eq!(outs.len(), 2);
        let targets: HashSet<NodeIndex> = outs.iter().map(|(_, t)| *t).collect();
        assert_eq!(targets.len(), 2, "true/false targets must be distinct");
        assert!(outs.iter().any(|(t, _)| *t == EdgeType::TrueCondition));
        assert!(outs.iter().any(|(t, _)| *t == EdgeType::FalseCondition));

        // the loop body jumps back to the condition
        let body_block = outs
            .iter()
            .find(|(t, _)| *t == EdgeType::TrueCondition)
            .map(|(_, b)| *b)
            .unwrap();
        assert!(out_edges(&cfg, body_block)
            .iter()
            .any(|(t, b)| *t == EdgeType::UnconditionalJump && *b == cond));

        // condition edges carry the guard text
        for e in cfg.graph.edges_directed(cond, Direction::Outgoing) {
            assert_eq!(e.weight().condition.as_deref(), Some(labels::IDENTIFIER));
        }
    }

    #[test]
    fn do_while_enters_the_body_unconditionally() {
        let body = AstNode::new(
            labels::BLOCK,
            vec![
                AstNode::new(
                    labels::DO_WHILE,
                    vec![
                        AstNode::new(labels::BLOCK, vec![assign("x", "1", 3)]),
                        ident("x", 4, 11),
                    ],
                )
                .at(2, 2),
            ],
        );

        let (cfg, errors, _warnings) = build(body);
        assert!(errors.is_empty());

        let cond = cfg
            .blocks()
            .find(|&b| cfg.graph[b].block_type == BlockType::Conditional)
            .unwrap();
        let body_block = out_edges(&cfg, cond)
            .iter()
            .find(|(t, _)| *t == EdgeType::TrueCondition)
            .map(|(_, b)| *b)
            .unwrap();

        // START falls straight into the body, which was the reused first block
        assert!(out_edges(&cfg, cfg.entry)
            .iter()
            .any(|(_, b)| *b == body_block));
        assert_eq!(cfg.graph[body_block].name, "DO_WHILE_BODY");

        // the body closes the loop through the condition
        assert!(out_edges(&cfg, body_block)
            .iter()
            .any(|(t, b)| *t == EdgeType::UnconditionalJump && *b == cond));
    }

    #[test]
    fn nested_blocks_share_the_current_basic_block() {
        let body = AstNode::new(
            labels::BLOCK,
            vec![
                AstNode::new(labels::BLOCK, vec![assign("a", "1", 2)]),
                assign("b", "2", 3),
            ],
        );

        let (cfg, errors, _warnings) = build(body);
        assert!(errors.is_empty());
        // START, the single shared block, END
        assert_eq!(cfg.graph.node_count(), 3);
        let shared = out_edges(&cfg, cfg.entry)[0].1;
        assert_eq!(cfg.graph[shared].instructions.len(), 2);
    }

    #[test]
    fn construction_is_deterministic() {
        let body = || {
            AstNode::new(
                labels::BLOCK,
                vec![
                    AstNode::new(
                        labels::IF,
                        vec![
                            ident("a", 2, 6),
                            AstNode::new(labels::BLOCK, vec![assign("x", "1", 3)]),
                        ],
                    )
                    .at(2, 2),
                    assign("y", "3", 5),
                ],
            )
        };

        let (first, _, _) = build(body());
        let (second, _, _) = build(body());
        assert_eq!(format!("{:?}", first.graph), format!("{:?}", second.graph));
    }
}
