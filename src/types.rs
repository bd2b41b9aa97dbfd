use crate::ast::AstNode;
use crate::labels;

/// A value type as written in the source: a symbolic name, a built-in/custom
/// flag, and — for arrays — the rank of the outermost array plus an optional
/// nested element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: String,
    pub custom: bool,
    pub is_array: bool,
    pub array_dim: u32,
    pub element: Option<Box<TypeInfo>>,
    pub line: u32,
    pub pos: u32,
}

impl TypeInfo {
    /// A scalar (non-array) type.
    pub fn scalar(type_name: impl Into<String>, custom: bool, line: u32, pos: u32) -> Self {
        Self {
            type_name: type_name.into(),
            custom,
            is_array: false,
            array_dim: 0,
            element: None,
            line,
            pos,
        }
    }

    /// The built-in `void` assigned to functions without an explicit return
    /// type. Coordinates point at the function name.
    pub fn void(line: u32, pos: u32) -> Self {
        Self::scalar(labels::VOID, false, line, pos)
    }
}

/// Parse a `TYPEREF` subtree.
///
/// Shape contract (the parser enforces it, violations panic): one child — a
/// `TYPE` wrapping a `BUILTIN_TYPE` or `CUSTOM_TYPE` wrapper around the name
/// token — or two children, the same plus an `ARRAY` node. An `ARRAY` with a
/// single dimension-marker child has rank equal to that child's child count;
/// any other shape has rank 1. A `TYPEREF` child of `ARRAY` describes the
/// element type of a nested array.
pub fn parse_typeref(typeref: &AstNode) -> TypeInfo {
    assert_eq!(typeref.label, labels::TYPEREF, "expected TYPEREF node");
    assert!(
        typeref.child_count() == 1 || typeref.child_count() == 2,
        "TYPEREF must have 1 or 2 children"
    );

    let type_node = &typeref.children[0];
    assert_eq!(type_node.label, labels::TYPE, "expected TYPE wrapper");
    let wrapper = &type_node.children[0];
    let custom = wrapper.label == labels::CUSTOM_TYPE;
    let name_token = wrapper.token();

    let mut info = TypeInfo::scalar(
        name_token.label.clone(),
        custom,
        name_token.line,
        name_token.pos,
    );

    if let Some(array) = typeref.children.get(1) {
        info.is_array = true;
        info.array_dim = match array.children.as_slice() {
            [dims] if dims.label != labels::TYPEREF => (dims.child_count() as u32).max(1),
            _ => 1,
        };
        info.element = array
            .children
            .iter()
            .find(|c| c.label == labels::TYPEREF)
            .map(|nested| Box::new(parse_typeref(nested)));
    }

    info
}

#[cfg(test)]
fn typeref(wrapper: &str, name: &str, array: Option<AstNode>) -> AstNode {
    let ty = AstNode::new(
        labels::TYPE,
        vec![AstNode::new(
            wrapper,
            vec![AstNode::new(name, vec![]).at(2, 4)],
        )],
    );
    match array {
        Some(a) => AstNode::new(labels::TYPEREF, vec![ty, a]),
        None => AstNode::new(labels::TYPEREF, vec![ty]),
    }
}

#[test]
fn builtin_scalar_type() {
    let info = parse_typeref(&typeref(labels::BUILTIN_TYPE, "int", None));
    assert_eq!(info.type_name, "int");
    assert!(!info.custom);
    assert!(!info.is_array);
    assert!(info.element.is_none());
    assert_eq!((info.line, info.pos), (2, 4));
}

#[test]
fn custom_type_is_flagged() {
    let info = parse_typeref(&typeref(labels::CUSTOM_TYPE, "Point", None));
    assert!(info.custom);
    assert_eq!(info.type_name, "Point");
}

#[test]
fn array_rank_comes_from_the_dimension_marker() {
    // int[,,] — the marker child carries one child per dimension
    let dims = AstNode::new(
        "DIMS",
        vec![
            AstNode::new(",", vec![]),
            AstNode::new(",", vec![]),
            AstNode::new(",", vec![]),
        ],
    );
    let array = AstNode::new(labels::ARRAY, vec![dims]);
    let info = parse_typeref(&typeref(labels::BUILTIN_TYPE, "int", Some(array)));
    assert!(info.is_array);
    assert_eq!(info.array_dim, 3);
    assert!(info.element.is_none());
}

#[test]
fn bare_array_defaults_to_rank_one() {
    let array = AstNode::new(labels::ARRAY, vec![]);
    let info = parse_typeref(&typeref(labels::BUILTIN_TYPE, "bool", Some(array)));
    assert_eq!(info.array_dim, 1);
}

#[test]
fn nested_array_parses_the_element_type() {
    let inner = typeref(
        labels::BUILTIN_TYPE,
        "int",
        Some(AstNode::new(labels::ARRAY, vec![])),
    );
    let dims = AstNode::new("DIMS", vec![AstNode::new(",", vec![])]);
    let array = AstNode::new(labels::ARRAY, vec![dims, inner]);
    let info = parse_typeref(&typeref(labels::BUILTIN_TYPE, "int", Some(array)));

    assert!(info.is_array);
    assert_eq!(info.array_dim, 1);
    let element = info.element.expect("nested element type");
    assert!(element.is_array);
    assert_eq!(element.type_name, "int");
}
