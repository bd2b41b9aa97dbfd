//! Call-graph derivation.
//!
//! Walks every function's finished CFG, finds `call` nodes in the attached
//! operation trees and records caller→callee edges. Callees that name no
//! defined function become leaf nodes; duplicate edges between the same pair
//! are suppressed on insertion.

use crate::ot::{OtKind, OtNode};
use crate::program::Program;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionNode {
    pub function_name: String,
}

#[derive(Debug, Default)]
pub struct CallGraph {
    pub graph: DiGraph<FunctionNode, ()>,
}

impl CallGraph {
    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&i| self.graph[i].function_name == name)
    }

    fn ensure(&mut self, name: &str) -> NodeIndex {
        match self.find(name) {
            Some(existing) => existing,
            None => self.graph.add_node(FunctionNode {
                function_name: name.to_owned(),
            }),
        }
    }

    fn add_call_edge(&mut self, caller: NodeIndex, callee_name: &str) {
        let callee = self.ensure(callee_name);
        if self.graph.find_edge(caller, callee).is_none() {
            self.graph.add_edge(caller, callee, ());
        }
    }
}

/// Derive the program-wide call graph. A pure function of the `call` nodes in
/// the program's operation trees; rebuilding from the same program yields the
/// same graph.
pub fn build_call_graph(program: &Program) -> CallGraph {
    let mut cg = CallGraph::default();

    for func in &program.functions {
        let caller = cg.ensure(&func.function_name);
        let Some(cfg) = &func.cfg else {
            continue;
        };
        for block in cfg.blocks() {
            for instruction in &cfg.graph[block].instructions {
                if let Some(ot) = &instruction.ot {
                    collect_calls(ot, caller, &func.function_name, &mut cg);
                }
            }
        }
    }

    debug!(
        target: "cg",
        "call graph done — functions: {}, edges: {}",
        cg.graph.node_count(),
        cg.graph.edge_count()
    );
    cg
}

fn collect_calls(node: &OtNode, caller: NodeIndex, caller_name: &str, cg: &mut CallGraph) {
    if node.kind == OtKind::Call {
        // the first child names the callee; anything else (an indexed or
        // computed callee) is not resolvable here
        if let Some(OtKind::Name(callee)) = node.children.first().map(|c| &c.kind) {
            debug!(target: "cg", "call edge {caller_name} → {callee}");
            let callee = callee.clone();
            cg.add_call_edge(caller, &callee);
        }
    }
    for child in &node.children {
        collect_calls(child, caller, caller_name, cg);
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstNode, ParsedFile};
    use crate::labels;
    use crate::ot::ident;
    use crate::program::{func_def, source};

    fn call_stmt(callee: &str, line: u32) -> AstNode {
        AstNode::new(
            labels::EXPR,
            vec![AstNode::new(labels::FUNC_CALL, vec![ident(callee, line, 4)]).at(line, 4)],
        )
        .at(line, 4)
    }

    fn chain_program() -> Program {
        let files = [ParsedFile::new(
            "a.lang",
            source(vec![
                func_def("a", 1, vec![call_stmt("b", 2)]),
                func_def("b", 4, vec![call_stmt("c", 5)]),
                func_def("c", 7, vec![]),
            ]),
        )];
        Program::build(&files)
    }

    #[test]
    fn call_chain_produces_one_edge_per_pair() {
        let cg = build_call_graph(&chain_program());

        assert_eq!(cg.graph.node_count(), 3);
        assert_eq!(cg.graph.edge_count(), 2);

        let a = cg.find("a").unwrap();
        let b = cg.find("b").unwrap();
        let c = cg.find("c").unwrap();
        assert!(cg.graph.find_edge(a, b).is_some());
        assert!(cg.graph.find_edge(b, c).is_some());
        assert!(cg.graph.find_edge(a, c).is_none());
        // c is a leaf, but still present
        assert_eq!(cg.graph.edges(c).count(), 0);
    }

    #[test]
    fn duplicate_calls_are_suppressed() {
        let files = [ParsedFile::new(
            "a.lang",
            source(vec![
                func_def("f", 1, vec![call_stmt("g", 2), call_stmt("g", 3)]),
                func_def("g", 5, vec![]),
            ]),
        )];
        let cg = build_call_graph(&Program::build(&files));

        assert_eq!(cg.graph.edge_count(), 1);
    }

    #[test]
    fn undefined_callee_becomes_a_leaf_node() {
        let files = [ParsedFile::new(
            "a.lang",
            source(vec![func_def("f", 1, vec![call_stmt("mystery", 2)])]),
        )];
        let cg = build_call_graph(&Program::build(&files));

        let mystery = cg.find("mystery").expect("leaf node for undefined callee");
        assert_eq!(cg.graph.edges(mystery).count(), 0);
        assert_eq!(cg.graph.edge_count(), 1);
    }

    #[test]
    fn nested_calls_in_arguments_are_found() {
        // f calls g with h(x) as an argument: both edges must appear
        let inner = AstNode::new(labels::FUNC_CALL, vec![ident("h", 2, 8)]).at(2, 8);
        let outer = AstNode::new(
            labels::FUNC_CALL,
            vec![
                AstNode::new(labels::EXPR_LIST, vec![inner]),
                ident("g", 2, 4),
            ],
        )
        .at(2, 4);
        let stmt = AstNode::new(labels::EXPR, vec![outer]).at(2, 4);
        let files = [ParsedFile::new(
            "a.lang",
            source(vec![func_def("f", 1, vec![stmt])]),
        )];

        let cg = build_call_graph(&Program::build(&files));
        let f = cg.find("f").unwrap();
        let g = cg.find("g").unwrap();
        let h = cg.find("h").unwrap();
        assert!(cg.graph.find_edge(f, g).is_some());
        assert!(cg.graph.find_edge(f, h).is_some());
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let program = chain_program();
        let first = build_call_graph(&program);
        let second = build_call_graph(&program);

        assert_eq!(first.graph.node_count(), second.graph.node_count());
        assert_eq!(first.graph.edge_count(), second.graph.edge_count());
        for e in first.graph.edge_indices() {
            let (s, t) = first.graph.edge_endpoints(e).unwrap();
            let s2 = second.find(&first.graph[s].function_name).unwrap();
            let t2 = second.find(&first.graph[t].function_name).unwrap();
            assert!(second.graph.find_edge(s2, t2).is_some());
        }
    }
}
