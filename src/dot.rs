//! Graphviz serializers for the finished IR. Pure functions of the completed
//! structures; nothing here mutates or revalidates a graph.

use crate::cfg::{Cfg, EdgeType};
use crate::cg::CallGraph;
use crate::ot::OtNode;
use petgraph::Direction;
use petgraph::visit::EdgeRef;
use std::fmt::Write;

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render one function's CFG. With `draw_ot` every instruction's operation
/// tree hangs off its block as a hexagon subtree.
pub fn cfg_to_dot(cfg: &Cfg, draw_ot: bool) -> String {
    let mut out = String::new();
    out.push_str("digraph CFG {\n");
    out.push_str("    node [shape=box];\n\n");

    for idx in cfg.blocks() {
        let block = &cfg.graph[idx];
        let mut label = format!("{} (id {})", block.name, block.id);
        for instruction in &block.instructions {
            label.push_str("\\n");
            label.push_str(&escape(&instruction.text));
        }
        let _ = writeln!(out, "    block_{} [label=\"{label}\"];", block.id);
    }
    out.push('\n');

    for idx in cfg.blocks() {
        for edge in cfg.graph.edges_directed(idx, Direction::Outgoing) {
            let from = cfg.graph[edge.source()].id;
            let to = cfg.graph[edge.target()].id;
            let weight = edge.weight();
            let condition = weight.condition.as_deref().unwrap_or("");
            match weight.edge_type {
                EdgeType::TrueCondition => {
                    let _ = writeln!(
                        out,
                        "    block_{from} -> block_{to} [label=\"true ({})\"];",
                        escape(condition)
                    );
                }
                EdgeType::FalseCondition => {
                    let _ = writeln!(
                        out,
                        "    block_{from} -> block_{to} [label=\"false ({})\"];",
                        escape(condition)
                    );
                }
                EdgeType::UnconditionalJump => {
                    let _ = writeln!(out, "    block_{from} -> block_{to};");
                }
            }
        }
    }

    if draw_ot {
        out.push('\n');
        let mut next_id: u64 = 0;
        for idx in cfg.blocks() {
            let block = &cfg.graph[idx];
            for instruction in &block.instructions {
                if let Some(root) = &instruction.ot {
                    let root_id = write_tree(&mut out, root, &mut next_id);
                    let _ = writeln!(
                        out,
                        "    block_{} -> ot_{root_id} [style=dotted];",
                        block.id
                    );
                }
            }
        }
    }

    out.push_str("}\n");
    out
}

fn write_tree(out: &mut String, node: &OtNode, next_id: &mut u64) -> u64 {
    let id = *next_id;
    *next_id += 1;
    let _ = writeln!(
        out,
        "    ot_{id} [shape=hexagon, label=\"{}\"];",
        escape(node.label())
    );
    for child in &node.children {
        let child_id = write_tree(out, child, next_id);
        let _ = writeln!(out, "    ot_{id} -> ot_{child_id};");
    }
    id
}

/// Render the call graph: one ellipse per function, blue caller→callee edges.
pub fn call_graph_to_dot(cg: &CallGraph) -> String {
    let mut out = String::new();
    out.push_str("digraph CallGraph {\n");
    out.push_str("    node [shape=ellipse, style=filled, color=lightblue];\n\n");

    for idx in cg.graph.node_indices() {
        let _ = writeln!(out, "    \"{}\";", escape(&cg.graph[idx].function_name));
    }
    out.push('\n');

    for edge in cg.graph.edge_references() {
        let caller = &cg.graph[edge.source()].function_name;
        let callee = &cg.graph[edge.target()].function_name;
        let _ = writeln!(
            out,
            "    \"{}\" -> \"{}\" [color=blue];",
            escape(caller),
            escape(callee)
        );
    }

    out.push_str("}\n");
    out
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstNode, ParsedFile};
    use crate::cg::build_call_graph;
    use crate::labels;
    use crate::ot::ident;
    use crate::program::{Program, func_def, source};

    fn one_function_program() -> Program {
        let body = vec![
            AstNode::new(
                labels::WHILE,
                vec![
                    ident("x", 2, 9),
                    AstNode::new(
                        labels::BLOCK,
                        vec![
                            AstNode::new(
                                labels::EXPR,
                                vec![
                                    AstNode::new(labels::FUNC_CALL, vec![ident("g", 3, 4)])
                                        .at(3, 4),
                                ],
                            )
                            .at(3, 4),
                        ],
                    ),
                ],
            )
            .at(2, 2),
        ];
        Program::build(&[ParsedFile::new("a.lang", source(vec![func_def("f", 1, body)]))])
    }

    #[test]
    fn cfg_dot_names_blocks_and_labels_branches() {
        let program = one_function_program();
        let cfg = program.functions[0].cfg.as_ref().unwrap();
        let dot = cfg_to_dot(cfg, false);

        assert!(dot.starts_with("digraph CFG {"));
        assert!(dot.contains("START (id 0)"));
        assert!(dot.contains("END"));
        assert!(dot.contains("[label=\"true (IDENTIFIER)\"]"));
        assert!(dot.contains("[label=\"false (IDENTIFIER)\"]"));
        assert!(!dot.contains("hexagon"));
    }

    #[test]
    fn cfg_dot_can_draw_operation_trees() {
        let program = one_function_program();
        let cfg = program.functions[0].cfg.as_ref().unwrap();
        let dot = cfg_to_dot(cfg, true);

        assert!(dot.contains("shape=hexagon"));
        assert!(dot.contains("[style=dotted]"));
        assert!(dot.contains("label=\"call\""));
    }

    #[test]
    fn call_graph_dot_matches_expected_shape() {
        let program = one_function_program();
        let cg = build_call_graph(&program);
        let dot = call_graph_to_dot(&cg);

        assert!(dot.starts_with("digraph CallGraph {"));
        assert!(dot.contains("node [shape=ellipse, style=filled, color=lightblue];"));
        assert!(dot.contains("    \"f\";\n"));
        assert!(dot.contains("    \"g\";\n"));
        assert!(dot.contains("    \"f\" -> \"g\" [color=blue];\n"));
    }
}
