use crate::errors::MyLangResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One node of a parsed MyLang source tree.
///
/// The parser runs upstream; this crate consumes its output. `label` is drawn
/// from the closed vocabulary in [`crate::labels`], `pos` is a 0-based column
/// and `is_imaginary` marks nodes the parser synthesized without a direct
/// source token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstNode {
    pub label: String,
    #[serde(default)]
    pub children: Vec<AstNode>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub pos: u32,
    #[serde(default)]
    pub is_imaginary: bool,
}

impl AstNode {
    pub fn new(label: impl Into<String>, children: Vec<AstNode>) -> Self {
        Self {
            label: label.into(),
            children,
            line: 0,
            pos: 0,
            is_imaginary: false,
        }
    }

    pub fn at(mut self, line: u32, pos: u32) -> Self {
        self.line = line;
        self.pos = pos;
        self
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// The token child of wrapper nodes (`IDENTIFIER`, `NAME`, literals): the
    /// single child the parser hangs the lexeme on, carrying its text as the
    /// label plus the source coordinates.
    pub fn token(&self) -> &AstNode {
        self.children
            .first()
            .expect("wrapper node without a token child")
    }
}

/// A source file handed to the engine: the name used in diagnostics plus the
/// root of its tree.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file_name: String,
    pub tree: AstNode,
}

impl ParsedFile {
    pub fn new(file_name: impl Into<String>, tree: AstNode) -> Self {
        Self {
            file_name: file_name.into(),
            tree,
        }
    }
}

/// Load one AST document (a single JSON-serialized root node).
pub fn load_ast_file(path: &Path) -> MyLangResult<ParsedFile> {
    tracing::debug!("loading AST from: {}", path.display());
    let bytes = std::fs::read(path)?;
    let tree: AstNode = serde_json::from_slice(&bytes)?;
    Ok(ParsedFile::new(path.display().to_string(), tree))
}

#[test]
fn json_round_trip_defaults_missing_fields() {
    let doc = r#"{"label":"SOURCE","children":[{"label":"FUNC_DEF","line":3,"pos":1}]}"#;
    let node: AstNode = serde_json::from_str(doc).unwrap();
    assert_eq!(node.label, "SOURCE");
    assert_eq!(node.line, 0);
    assert!(!node.is_imaginary);
    assert_eq!(node.children[0].line, 3);
    assert!(node.children[0].children.is_empty());
}

#[test]
fn load_ast_file_reads_root_node() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prog.ast.json");
    std::fs::write(
        &path,
        r#"{"label":"SOURCE","children":[],"line":1,"pos":0,"isImaginary":true}"#,
    )
    .unwrap();

    let parsed = load_ast_file(&path).unwrap();
    assert!(parsed.file_name.ends_with("prog.ast.json"));
    assert!(parsed.tree.is_imaginary);
}

#[test]
fn token_returns_the_single_child() {
    let id = AstNode::new("IDENTIFIER", vec![AstNode::new("x", vec![]).at(4, 2)]);
    assert_eq!(id.token().label, "x");
    assert_eq!((id.token().line, id.token().pos), (4, 2));
}
