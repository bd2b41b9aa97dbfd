//! The program model: function signatures, per-function CFGs and the
//! accumulated diagnostics.
//!
//! Assembly runs in two passes over the input files. Pass 1 collects every
//! function signature (and reports redeclarations, keeping the duplicate so
//! downstream code never hits a missing entry). Pass 2 builds each body's
//! CFG and binds it onto the first signature with a matching name.

use crate::ast::{AstNode, ParsedFile};
use crate::cfg::{Cfg, CfgBuilder};
use crate::labels;
use crate::types::{self, TypeInfo};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ArgumentInfo {
    pub arg_type: TypeInfo,
    pub name: String,
    pub line: u32,
    pub pos: u32,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub file_name: String,
    pub function_name: String,
    pub return_type: TypeInfo,
    pub arguments: Vec<ArgumentInfo>,
    /// Absent after pass 1; populated by pass 2. On a program carrying a
    /// redeclaration the duplicate entry keeps `None`.
    pub cfg: Option<Cfg>,
    pub line: u32,
    pub pos: u32,
}

#[derive(Debug, Default)]
pub struct Program {
    pub functions: Vec<FunctionInfo>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Both passes visit the same definitions: top-level `FUNC_DEF`s that lead
/// with a `FUNC_SIGNATURE`.
fn is_function_def(node: &AstNode) -> bool {
    node.label == labels::FUNC_DEF
        && node
            .children
            .first()
            .is_some_and(|c| c.label == labels::FUNC_SIGNATURE)
}

/// The signature parts pass 1 and pass 2 both need. The parser guarantees a
/// `FUNC_SIGNATURE` has two or three children; anything else is a contract
/// violation.
fn split_signature(signature: &AstNode) -> (Option<&AstNode>, &AstNode, &AstNode) {
    match signature.children.as_slice() {
        [typeref, name, args] => (Some(typeref), name, args),
        [name, args] => (None, name, args),
        other => panic!("FUNC_SIGNATURE with {} children", other.len()),
    }
}

impl Program {
    /// Assemble a program from an ordered list of parsed files.
    pub fn build(files: &[ParsedFile]) -> Self {
        let mut program = Self::default();
        program.collect_signatures(files);
        program.build_bodies(files);
        program
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.function_name == name)
    }

    fn collect_signatures(&mut self, files: &[ParsedFile]) {
        for file in files {
            assert_eq!(file.tree.label, labels::SOURCE, "root must be SOURCE");
            for func_def in &file.tree.children {
                if !is_function_def(func_def) {
                    continue;
                }
                let (typeref, name_node, arg_list) = split_signature(&func_def.children[0]);
                let token = name_node.token();
                let return_type = typeref
                    .map(types::parse_typeref)
                    .unwrap_or_else(|| TypeInfo::void(token.line, token.pos));

                let mut func = FunctionInfo {
                    file_name: file.file_name.clone(),
                    function_name: token.label.clone(),
                    return_type,
                    arguments: Vec::new(),
                    cfg: None,
                    line: token.line,
                    pos: token.pos,
                };
                for argdef in &arg_list.children {
                    assert_eq!(argdef.label, labels::ARGDEF, "expected ARGDEF");
                    let arg_token = argdef.children[1].token();
                    func.arguments.push(ArgumentInfo {
                        arg_type: types::parse_typeref(&argdef.children[0]),
                        name: arg_token.label.clone(),
                        line: arg_token.line,
                        pos: arg_token.pos,
                    });
                }
                debug!(
                    target: "program",
                    "signature `{}` ({} arguments) from {}",
                    func.function_name,
                    func.arguments.len(),
                    func.file_name
                );

                if let Some(existing) = self
                    .functions
                    .iter()
                    .find(|f| f.function_name == func.function_name)
                {
                    self.errors.push(format!(
                        "Redeclaration error. Function '{}' at {}:{}:{} is already declared at {}:{}:{}",
                        func.function_name,
                        func.file_name,
                        func.line,
                        func.pos + 1,
                        existing.file_name,
                        existing.line,
                        existing.pos + 1
                    ));
                }
                self.functions.push(func);
            }
        }
    }

    fn build_bodies(&mut self, files: &[ParsedFile]) {
        for file in files {
            for func_def in &file.tree.children {
                if !is_function_def(func_def) {
                    continue;
                }
                let (_, name_node, _) = split_signature(&func_def.children[0]);
                let token = name_node.token();
                let body = &func_def.children[1];

                debug!(target: "program", "building CFG for `{}`", token.label);
                let cfg = CfgBuilder::new(&file.file_name, &mut self.errors, &mut self.warnings)
                    .build(body, token.line, token.pos);

                if let Some(func) = self
                    .functions
                    .iter_mut()
                    .find(|f| f.function_name == token.label)
                {
                    func.cfg = Some(cfg);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) fn func_def(name: &str, line: u32, statements: Vec<AstNode>) -> AstNode {
    let signature = AstNode::new(
        labels::FUNC_SIGNATURE,
        vec![
            AstNode::new(labels::NAME, vec![AstNode::new(name, vec![]).at(line, 5)]),
            AstNode::new(labels::ARGDEF_LIST, vec![]),
        ],
    );
    AstNode::new(
        labels::FUNC_DEF,
        vec![signature, AstNode::new(labels::BLOCK, statements)],
    )
}

#[cfg(test)]
pub(crate) fn source(funcs: Vec<AstNode>) -> AstNode {
    AstNode::new(labels::SOURCE, funcs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ot::{dec_lit, ident};

    fn call_stmt(callee: &str, line: u32) -> AstNode {
        AstNode::new(
            labels::EXPR,
            vec![AstNode::new(labels::FUNC_CALL, vec![ident(callee, line, 4)]).at(line, 4)],
        )
        .at(line, 4)
    }

    #[test]
    fn missing_return_type_defaults_to_void() {
        let files = [ParsedFile::new(
            "a.lang",
            source(vec![func_def("f", 1, vec![])]),
        )];
        let program = Program::build(&files);

        assert_eq!(program.functions.len(), 1);
        let f = &program.functions[0];
        assert_eq!(f.return_type.type_name, "void");
        assert!(!f.return_type.custom);
        assert!(f.cfg.is_some());
    }

    #[test]
    fn arguments_keep_declaration_order() {
        let argdef = |ty: &str, name: &str, pos: u32| {
            AstNode::new(
                labels::ARGDEF,
                vec![
                    AstNode::new(
                        labels::TYPEREF,
                        vec![AstNode::new(
                            labels::TYPE,
                            vec![AstNode::new(
                                labels::BUILTIN_TYPE,
                                vec![AstNode::new(ty, vec![]).at(1, pos)],
                            )],
                        )],
                    ),
                    AstNode::new(labels::NAME, vec![AstNode::new(name, vec![]).at(1, pos + 4)]),
                ],
            )
        };
        let signature = AstNode::new(
            labels::FUNC_SIGNATURE,
            vec![
                AstNode::new(labels::NAME, vec![AstNode::new("f", vec![]).at(1, 5)]),
                AstNode::new(
                    labels::ARGDEF_LIST,
                    vec![argdef("int", "a", 7), argdef("bool", "b", 14)],
                ),
            ],
        );
        let def = AstNode::new(
            labels::FUNC_DEF,
            vec![signature, AstNode::new(labels::BLOCK, vec![])],
        );
        let files = [ParsedFile::new("a.lang", source(vec![def]))];

        let program = Program::build(&files);
        let args = &program.functions[0].arguments;
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].name, "a");
        assert_eq!(args[0].arg_type.type_name, "int");
        assert_eq!(args[1].name, "b");
        assert_eq!(args[1].arg_type.type_name, "bool");
    }

    #[test]
    fn redeclaration_across_files_keeps_both_entries() {
        let files = [
            ParsedFile::new("a.lang", source(vec![func_def("g", 1, vec![])])),
            ParsedFile::new("b.lang", source(vec![func_def("g", 3, vec![])])),
        ];
        let program = Program::build(&files);

        assert_eq!(program.functions.len(), 2);
        assert_eq!(program.functions[0].function_name, "g");
        assert_eq!(program.functions[1].function_name, "g");

        let redecl: Vec<&String> = program
            .errors
            .iter()
            .filter(|e| e.starts_with("Redeclaration error."))
            .collect();
        assert_eq!(redecl.len(), 1);
        assert!(redecl[0].contains("b.lang:3:6"));
        assert!(redecl[0].contains("a.lang:1:6"));
    }

    #[test]
    fn redeclared_duplicate_never_receives_a_cfg() {
        let files = [
            ParsedFile::new("a.lang", source(vec![func_def("g", 1, vec![])])),
            ParsedFile::new("b.lang", source(vec![func_def("g", 3, vec![])])),
        ];
        let program = Program::build(&files);

        assert!(program.functions[0].cfg.is_some());
        assert!(program.functions[1].cfg.is_none());
    }

    #[test]
    fn structural_errors_from_bodies_land_on_the_program() {
        let body = vec![
            AstNode::new(
                labels::EXPR,
                vec![
                    AstNode::new(
                        labels::ASSIGN,
                        vec![dec_lit("1", 2, 4), dec_lit("2", 2, 8)],
                    )
                    .at(2, 6),
                ],
            )
            .at(2, 4),
        ];
        let files = [ParsedFile::new("a.lang", source(vec![func_def("f", 1, body)]))];

        let program = Program::build(&files);
        assert_eq!(program.errors.len(), 1);
        assert!(program.errors[0].starts_with("Assign error."));
    }

    #[test]
    fn bodies_feed_the_function_lookup() {
        let files = [ParsedFile::new(
            "a.lang",
            source(vec![
                func_def("f", 1, vec![call_stmt("g", 2)]),
                func_def("g", 5, vec![]),
            ]),
        )];
        let program = Program::build(&files);

        let f = program.find_function("f").unwrap();
        let g = program.find_function("g").unwrap();
        assert!(f.cfg.is_some());
        assert!(g.cfg.is_some());
    }
}
