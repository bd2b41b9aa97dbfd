//! Operation trees: the canonical IR form of one statement or expression.
//!
//! The rewriters translate expression and variable-declaration AST subtrees
//! into [`OtNode`] trees. Structural violations (assigning to a literal,
//! calling a binary-operation result, indexing without an index) are recorded
//! in an [`OtErrors`] container and rewriting continues with a best-effort
//! node, so downstream passes always have something to walk.

use crate::ast::AstNode;
use crate::labels;
use crate::types::TypeInfo;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Plus,
    Minus,
    Mul,
    Div,
}

impl BinOpKind {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            labels::PLUS => Some(Self::Plus),
            labels::MINUS => Some(Self::Minus),
            labels::MUL => Some(Self::Mul),
            labels::DIV => Some(Self::Div),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Plus => labels::PLUS,
            Self::Minus => labels::MINUS,
            Self::Mul => labels::MUL,
            Self::Div => labels::DIV,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOpKind {
    Neg,
    Not,
}

impl UnOpKind {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            labels::NEG => Some(Self::Neg),
            labels::NOT => Some(Self::Not),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Neg => labels::NEG,
            Self::Not => labels::NOT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Bool,
    Str,
    Symb,
    Hex,
    Bits,
    Dec,
}

impl LitKind {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            labels::BOOL => Some(Self::Bool),
            labels::STR => Some(Self::Str),
            labels::SYMB => Some(Self::Symb),
            labels::HEX => Some(Self::Hex),
            labels::BITS => Some(Self::Bits),
            labels::DEC => Some(Self::Dec),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Bool => labels::BOOL,
            Self::Str => labels::STR,
            Self::Symb => labels::SYMB,
            Self::Hex => labels::HEX,
            Self::Bits => labels::BITS,
            Self::Dec => labels::DEC,
        }
    }
}

/// The closed set of operation-tree node kinds. Label strings exist only for
/// serialization; all structural decisions pattern-match on this enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtKind {
    Read,
    Write,
    Call,
    Index,
    LitRead,
    BinOp(BinOpKind),
    UnOp(UnOpKind),
    Declare,
    SeqDeclare,
    WithType,
    Array,
    Return,
    Break,
    /// A bare leaf: identifier, type name, dimension, `custom`/`builtin`
    /// marker or literal text.
    Name(String),
    /// The literal-type marker child of a `litRead`.
    Literal(LitKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtNode {
    pub kind: OtKind,
    pub children: Vec<OtNode>,
    pub line: u32,
    pub pos: u32,
    pub is_imaginary: bool,
}

impl OtNode {
    pub fn new(kind: OtKind, line: u32, pos: u32, is_imaginary: bool) -> Self {
        Self {
            kind,
            children: Vec::new(),
            line,
            pos,
            is_imaginary,
        }
    }

    /// Serialization label of this node.
    pub fn label(&self) -> &str {
        match &self.kind {
            OtKind::Read => "read",
            OtKind::Write => "write",
            OtKind::Call => "call",
            OtKind::Index => "index",
            OtKind::LitRead => "litRead",
            OtKind::BinOp(op) => op.label(),
            OtKind::UnOp(op) => op.label(),
            OtKind::Declare => "declare",
            OtKind::SeqDeclare => "seqDeclare",
            OtKind::WithType => "withType",
            OtKind::Array => "array",
            OtKind::Return => "return",
            OtKind::Break => "break",
            OtKind::Name(name) => name,
            OtKind::Literal(lit) => lit.label(),
        }
    }

    /// Whether this root leaves a value behind that a fall-through return can
    /// pick up.
    pub fn produces_value(&self) -> bool {
        matches!(
            self.kind,
            OtKind::Read
                | OtKind::Call
                | OtKind::Index
                | OtKind::LitRead
                | OtKind::BinOp(_)
                | OtKind::UnOp(_)
        )
    }
}

/// Accumulator for structural errors discovered while rewriting. The owner
/// drains the messages into the program-level error list.
#[derive(Debug, Default)]
pub struct OtErrors {
    pub messages: Vec<String>,
}

impl OtErrors {
    fn add(&mut self, message: String) {
        debug!(target: "ot", "{message}");
        self.messages.push(message);
    }
}

fn name_leaf(token: &AstNode) -> OtNode {
    OtNode::new(
        OtKind::Name(token.label.clone()),
        token.line,
        token.pos,
        token.is_imaginary,
    )
}

/// Rewrite an expression AST into an operation tree.
///
/// `is_lvalue` marks the assignment-target position, `is_function_name` the
/// callee/base position of a call or indexing; both change what counts as a
/// structural error and whether identifiers become bare names or `read`s.
/// Labels outside the expression vocabulary produce `None`.
pub fn build_expr(
    root: &AstNode,
    is_lvalue: bool,
    is_function_name: bool,
    errors: &mut OtErrors,
    file_name: &str,
) -> Option<OtNode> {
    if root.label == labels::ASSIGN {
        let mut write = OtNode::new(OtKind::Write, root.line, root.pos, root.is_imaginary);
        if let Some(lvalue) = build_expr(&root.children[0], true, false, errors, file_name) {
            write.children.push(lvalue);
        }
        if let Some(rvalue) = build_expr(&root.children[1], false, false, errors, file_name) {
            write.children.push(rvalue);
        }
        Some(write)
    } else if root.label == labels::FUNC_CALL {
        // Two children: the argument EXPR_LIST first, the callee second.
        // One child: the callee alone.
        let (callee_ast, arg_list) = match root.children.as_slice() {
            [args, callee] => (callee, Some(args)),
            [callee] => (callee, None),
            other => panic!("FUNC_CALL with {} children", other.len()),
        };
        let callee = build_expr(callee_ast, false, true, errors, file_name);
        let (line, pos, imaginary) = callee
            .as_ref()
            .map(|c| (c.line, c.pos, c.is_imaginary))
            .unwrap_or((root.line, root.pos, root.is_imaginary));

        let mut call = OtNode::new(OtKind::Call, line, pos, imaginary);
        if let Some(callee) = callee {
            call.children.push(callee);
        }
        if let Some(list) = arg_list {
            for arg in &list.children {
                if let Some(arg_ot) = build_expr(arg, false, false, errors, file_name) {
                    call.children.push(arg_ot);
                }
            }
        }
        if is_lvalue {
            errors.add(format!(
                "Assign error. Can't use function calling to assign at {}:{}:{}",
                file_name,
                line,
                pos + 1
            ));
        }
        Some(call)
    } else if root.label == labels::INDEXING {
        if root.child_count() == 1 {
            // No index list: report and hand the bare base back.
            let base = build_expr(&root.children[0], false, true, errors, file_name);
            let (line, pos) = base
                .as_ref()
                .map(|b| (b.line, b.pos))
                .unwrap_or((root.line, root.pos));
            errors.add(format!(
                "Index error. Missing index value at {}:{}:{}",
                file_name,
                line,
                pos + 1
            ));
            base
        } else {
            let base = build_expr(&root.children[1], false, true, errors, file_name);
            let (line, pos, imaginary) = base
                .as_ref()
                .map(|b| (b.line, b.pos, b.is_imaginary))
                .unwrap_or((root.line, root.pos, root.is_imaginary));

            let mut index = OtNode::new(OtKind::Index, line, pos, imaginary);
            if let Some(base) = base {
                index.children.push(base);
            }
            for idx in &root.children[0].children {
                if let Some(idx_ot) = build_expr(idx, false, false, errors, file_name) {
                    index.children.push(idx_ot);
                }
            }
            Some(index)
        }
    } else if let Some(op) = BinOpKind::from_label(&root.label) {
        if is_lvalue {
            errors.add(format!(
                "Assign error. Can't use binary operation result to assign at {}:{}:{}",
                file_name,
                root.line,
                root.pos + 1
            ));
        }
        if is_function_name {
            errors.add(format!(
                "Call error. Can't use binary operation to call function at {}:{}:{}",
                file_name,
                root.line,
                root.pos + 1
            ));
        }
        let mut node = OtNode::new(OtKind::BinOp(op), root.line, root.pos, root.is_imaginary);
        if let Some(left) = build_expr(&root.children[0], false, false, errors, file_name) {
            node.children.push(left);
        }
        if let Some(right) = build_expr(&root.children[1], false, false, errors, file_name) {
            node.children.push(right);
        }
        Some(node)
    } else if let Some(op) = UnOpKind::from_label(&root.label) {
        if is_lvalue {
            errors.add(format!(
                "Assign error. Can't use unary operation result to assign at {}:{}:{}",
                file_name,
                root.line,
                root.pos + 1
            ));
        }
        if is_function_name {
            errors.add(format!(
                "Call error. Can't use unary operation to call function at {}:{}:{}",
                file_name,
                root.line,
                root.pos + 1
            ));
        }
        let mut node = OtNode::new(OtKind::UnOp(op), root.line, root.pos, root.is_imaginary);
        if let Some(operand) = build_expr(&root.children[0], false, false, errors, file_name) {
            node.children.push(operand);
        }
        Some(node)
    } else if root.label == labels::IDENTIFIER {
        let value = name_leaf(root.token());
        if is_lvalue || is_function_name {
            Some(value)
        } else {
            let mut read = OtNode::new(OtKind::Read, 0, 0, true);
            read.children.push(value);
            Some(read)
        }
    } else if let Some(lit) = LitKind::from_label(&root.label) {
        let token = root.token();
        if is_lvalue {
            errors.add(format!(
                "Assign error. Can't use literal to assign at {}:{}:{}",
                file_name,
                token.line,
                token.pos + 1
            ));
        }
        if is_function_name {
            errors.add(format!(
                "Call error. Can't use literal to call function at {}:{}:{}",
                file_name,
                token.line,
                token.pos + 1
            ));
        }
        let mut lit_read = OtNode::new(OtKind::LitRead, token.line, token.pos, true);
        lit_read.children.push(OtNode::new(
            OtKind::Literal(lit),
            root.line,
            root.pos,
            root.is_imaginary,
        ));
        lit_read.children.push(name_leaf(token));
        Some(lit_read)
    } else {
        None
    }
}

fn with_type_ot(ty: &TypeInfo) -> OtNode {
    let mut with_type = OtNode::new(OtKind::WithType, 0, 0, true);
    with_type.children.push(OtNode::new(
        OtKind::Name(ty.type_name.clone()),
        ty.line,
        ty.pos,
        false,
    ));
    with_type.children.push(OtNode::new(
        OtKind::Name(if ty.custom { "custom" } else { "builtin" }.to_owned()),
        ty.line,
        ty.pos,
        false,
    ));
    if ty.is_array {
        let mut array = OtNode::new(OtKind::Array, ty.line, ty.pos, false);
        array.children.push(OtNode::new(
            OtKind::Name(ty.array_dim.to_string()),
            ty.line,
            ty.pos,
            false,
        ));
        if let Some(element) = &ty.element {
            array.children.push(with_type_ot(element));
        }
        with_type.children.push(array);
    }
    with_type
}

fn build_declare(
    id: &AstNode,
    init: &AstNode,
    ty: &TypeInfo,
    errors: &mut OtErrors,
    file_name: &str,
) -> OtNode {
    let token = id.token();
    assert_eq!(
        init.token().label,
        token.label,
        "INIT does not match its identifier"
    );

    let mut declare = OtNode::new(OtKind::Declare, token.line, token.pos, true);
    declare.children.push(with_type_ot(ty));
    declare.children.push(name_leaf(token));

    if init.child_count() == 2 {
        let mut write = OtNode::new(OtKind::Write, token.line, token.pos, false);
        write.children.push(name_leaf(token));
        if let Some(value) = build_expr(&init.children[1], false, false, errors, file_name) {
            write.children.push(value);
        }
        declare.children.push(write);
    }
    declare
}

/// Rewrite a `VAR` statement into a `declare` (single variable) or a
/// `seqDeclare` of per-variable `declare`s. The `VAR` node carries the shared
/// `TYPEREF`, then the N identifiers, then their N `INIT` nodes in parallel.
pub fn build_var(
    root: &AstNode,
    ty: &TypeInfo,
    errors: &mut OtErrors,
    file_name: &str,
) -> OtNode {
    assert_eq!(
        root.children[0].label,
        labels::TYPEREF,
        "VAR without leading TYPEREF"
    );
    let var_count = (root.child_count() - 1) / 2;

    if var_count == 1 {
        build_declare(&root.children[1], &root.children[2], ty, errors, file_name)
    } else {
        let mut seq = OtNode::new(OtKind::SeqDeclare, 0, 0, true);
        for i in 0..var_count {
            seq.children.push(build_declare(
                &root.children[1 + i],
                &root.children[1 + var_count + i],
                ty,
                errors,
                file_name,
            ));
        }
        seq
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) fn ident(name: &str, line: u32, pos: u32) -> AstNode {
    AstNode::new(
        labels::IDENTIFIER,
        vec![AstNode::new(name, vec![]).at(line, pos)],
    )
    .at(line, pos)
}

#[cfg(test)]
pub(crate) fn dec_lit(value: &str, line: u32, pos: u32) -> AstNode {
    AstNode::new(labels::DEC, vec![AstNode::new(value, vec![]).at(line, pos)]).at(line, pos)
}

#[test]
fn assignment_becomes_a_write() {
    let mut errors = OtErrors::default();
    let assign = AstNode::new(
        labels::ASSIGN,
        vec![ident("x", 1, 0), dec_lit("4", 1, 4)],
    )
    .at(1, 2);

    let ot = build_expr(&assign, false, false, &mut errors, "a.lang").unwrap();
    assert_eq!(ot.kind, OtKind::Write);
    assert_eq!(ot.children.len(), 2);
    assert_eq!(ot.children[0].kind, OtKind::Name("x".into()));
    assert_eq!(ot.children[1].kind, OtKind::LitRead);
    assert!(errors.messages.is_empty());
}

#[test]
fn plain_identifier_reads() {
    let mut errors = OtErrors::default();
    let ot = build_expr(&ident("y", 2, 7), false, false, &mut errors, "a.lang").unwrap();
    assert_eq!(ot.kind, OtKind::Read);
    assert!(ot.is_imaginary);
    assert_eq!((ot.line, ot.pos), (0, 0));
    assert_eq!(ot.children[0].kind, OtKind::Name("y".into()));
    assert_eq!((ot.children[0].line, ot.children[0].pos), (2, 7));
}

#[test]
fn literal_keeps_type_marker_and_value() {
    let mut errors = OtErrors::default();
    let ot = build_expr(&dec_lit("42", 3, 9), false, false, &mut errors, "a.lang").unwrap();
    assert_eq!(ot.kind, OtKind::LitRead);
    assert!(ot.is_imaginary);
    assert_eq!(ot.children[0].kind, OtKind::Literal(LitKind::Dec));
    assert_eq!(ot.children[1].kind, OtKind::Name("42".into()));
}

#[test]
fn literal_as_assignment_target_is_an_error() {
    let mut errors = OtErrors::default();
    let assign = AstNode::new(
        labels::ASSIGN,
        vec![dec_lit("1", 5, 0), dec_lit("2", 5, 4)],
    )
    .at(5, 2);

    let ot = build_expr(&assign, false, false, &mut errors, "bad.lang").unwrap();
    assert_eq!(ot.kind, OtKind::Write);
    assert_eq!(errors.messages.len(), 1);
    assert_eq!(
        errors.messages[0],
        "Assign error. Can't use literal to assign at bad.lang:5:1"
    );
}

#[test]
fn call_collects_callee_then_arguments() {
    let mut errors = OtErrors::default();
    let call = AstNode::new(
        labels::FUNC_CALL,
        vec![
            AstNode::new(
                labels::EXPR_LIST,
                vec![dec_lit("1", 4, 6), ident("n", 4, 9)],
            ),
            ident("f", 4, 4),
        ],
    )
    .at(4, 4);

    let ot = build_expr(&call, false, false, &mut errors, "a.lang").unwrap();
    assert_eq!(ot.kind, OtKind::Call);
    assert_eq!((ot.line, ot.pos), (4, 4));
    assert_eq!(ot.children.len(), 3);
    assert_eq!(ot.children[0].kind, OtKind::Name("f".into()));
    assert_eq!(ot.children[1].kind, OtKind::LitRead);
    assert_eq!(ot.children[2].kind, OtKind::Read);
    assert!(errors.messages.is_empty());
}

#[test]
fn call_as_assignment_target_is_an_error() {
    let mut errors = OtErrors::default();
    let call = AstNode::new(labels::FUNC_CALL, vec![ident("f", 2, 4)]).at(2, 4);
    let assign = AstNode::new(labels::ASSIGN, vec![call, dec_lit("1", 2, 10)]).at(2, 8);

    build_expr(&assign, false, false, &mut errors, "a.lang").unwrap();
    assert_eq!(errors.messages.len(), 1);
    assert_eq!(
        errors.messages[0],
        "Assign error. Can't use function calling to assign at a.lang:2:5"
    );
}

#[test]
fn indexing_without_index_list_reports_and_returns_base() {
    let mut errors = OtErrors::default();
    let indexing = AstNode::new(labels::INDEXING, vec![ident("arr", 6, 2)]).at(6, 2);

    let ot = build_expr(&indexing, false, false, &mut errors, "a.lang").unwrap();
    assert_eq!(ot.kind, OtKind::Name("arr".into()));
    assert_eq!(
        errors.messages[0],
        "Index error. Missing index value at a.lang:6:3"
    );
}

#[test]
fn indexing_with_indices_builds_index_node() {
    let mut errors = OtErrors::default();
    let indexing = AstNode::new(
        labels::INDEXING,
        vec![
            AstNode::new(labels::EXPR_LIST, vec![dec_lit("0", 6, 6)]),
            ident("arr", 6, 2),
        ],
    )
    .at(6, 2);

    let ot = build_expr(&indexing, false, false, &mut errors, "a.lang").unwrap();
    assert_eq!(ot.kind, OtKind::Index);
    assert_eq!(ot.children.len(), 2);
    assert_eq!(ot.children[0].kind, OtKind::Name("arr".into()));
    assert!(errors.messages.is_empty());
}

#[test]
fn binary_operation_as_callee_is_an_error() {
    let mut errors = OtErrors::default();
    let sum = AstNode::new(labels::PLUS, vec![dec_lit("1", 7, 0), dec_lit("2", 7, 4)]).at(7, 2);
    let call = AstNode::new(labels::FUNC_CALL, vec![sum]).at(7, 2);

    let ot = build_expr(&call, false, false, &mut errors, "a.lang").unwrap();
    assert_eq!(ot.kind, OtKind::Call);
    assert_eq!(
        errors.messages[0],
        "Call error. Can't use binary operation to call function at a.lang:7:3"
    );
}

#[test]
fn unknown_label_produces_no_tree() {
    let mut errors = OtErrors::default();
    let node = AstNode::new("MYSTERY", vec![]).at(1, 1);
    assert!(build_expr(&node, false, false, &mut errors, "a.lang").is_none());
    assert!(errors.messages.is_empty());
}

#[cfg(test)]
fn simple_typeref(name: &str) -> AstNode {
    AstNode::new(
        labels::TYPEREF,
        vec![AstNode::new(
            labels::TYPE,
            vec![AstNode::new(
                labels::BUILTIN_TYPE,
                vec![AstNode::new(name, vec![]).at(1, 0)],
            )],
        )],
    )
}

#[test]
fn single_var_with_init_declares_and_writes() {
    let mut errors = OtErrors::default();
    let var = AstNode::new(
        labels::VAR,
        vec![
            simple_typeref("int"),
            ident("x", 1, 4),
            AstNode::new(
                labels::INIT,
                vec![AstNode::new("x", vec![]).at(1, 4), dec_lit("3", 1, 8)],
            ),
        ],
    );
    let ty = crate::types::parse_typeref(&var.children[0]);

    let ot = build_var(&var, &ty, &mut errors, "a.lang");
    assert_eq!(ot.kind, OtKind::Declare);
    assert_eq!(ot.children.len(), 3);
    assert_eq!(ot.children[0].kind, OtKind::WithType);
    assert_eq!(ot.children[1].kind, OtKind::Name("x".into()));
    let write = &ot.children[2];
    assert_eq!(write.kind, OtKind::Write);
    assert!(!write.is_imaginary);
    assert_eq!(write.children[1].kind, OtKind::LitRead);
}

#[test]
fn multiple_vars_become_a_seq_declare() {
    let mut errors = OtErrors::default();
    let var = AstNode::new(
        labels::VAR,
        vec![
            simple_typeref("int"),
            ident("a", 2, 4),
            ident("b", 2, 7),
            AstNode::new(labels::INIT, vec![AstNode::new("a", vec![]).at(2, 4)]),
            AstNode::new(
                labels::INIT,
                vec![AstNode::new("b", vec![]).at(2, 7), dec_lit("9", 2, 11)],
            ),
        ],
    );
    let ty = crate::types::parse_typeref(&var.children[0]);

    let ot = build_var(&var, &ty, &mut errors, "a.lang");
    assert_eq!(ot.kind, OtKind::SeqDeclare);
    assert_eq!(ot.children.len(), 2);
    assert_eq!(ot.children[0].children.len(), 2); // no initializer
    assert_eq!(ot.children[1].children.len(), 3); // declare + write
}

#[test]
fn with_type_renders_array_rank_and_element() {
    let ty = TypeInfo {
        type_name: "int".into(),
        custom: false,
        is_array: true,
        array_dim: 2,
        element: Some(Box::new(TypeInfo::scalar("int", false, 1, 0))),
        line: 1,
        pos: 0,
    };
    let mut errors = OtErrors::default();
    let var = AstNode::new(
        labels::VAR,
        vec![
            simple_typeref("int"),
            ident("m", 1, 8),
            AstNode::new(labels::INIT, vec![AstNode::new("m", vec![]).at(1, 8)]),
        ],
    );

    let ot = build_var(&var, &ty, &mut errors, "a.lang");
    let with_type = &ot.children[0];
    assert_eq!(with_type.children.len(), 3);
    assert_eq!(with_type.children[1].kind, OtKind::Name("builtin".into()));
    let array = &with_type.children[2];
    assert_eq!(array.kind, OtKind::Array);
    assert_eq!(array.children[0].kind, OtKind::Name("2".into()));
    assert_eq!(array.children[1].kind, OtKind::WithType);
}

#[test]
fn produces_value_matches_expression_roots_only() {
    let read = OtNode::new(OtKind::Read, 0, 0, true);
    let brk = OtNode::new(OtKind::Break, 1, 0, false);
    let declare = OtNode::new(OtKind::Declare, 1, 0, true);
    assert!(read.produces_value());
    assert!(!brk.produces_value());
    assert!(!declare.produces_value());
}
