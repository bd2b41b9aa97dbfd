//! The closed AST label vocabulary and the statement classifier.
//!
//! Every label the engine dispatches on lives here; anything outside this set
//! in expression position produces no operation tree.

use phf::phf_map;

// Top-level structure
pub const SOURCE: &str = "SOURCE";
pub const FUNC_DEF: &str = "FUNC_DEF";
pub const FUNC_SIGNATURE: &str = "FUNC_SIGNATURE";
pub const TYPEREF: &str = "TYPEREF";
pub const TYPE: &str = "TYPE";
pub const BUILTIN_TYPE: &str = "BUILTIN_TYPE";
pub const CUSTOM_TYPE: &str = "CUSTOM_TYPE";
pub const ARRAY: &str = "ARRAY";
pub const NAME: &str = "NAME";
pub const ARGDEF_LIST: &str = "ARGDEF_LIST";
pub const ARGDEF: &str = "ARGDEF";
pub const IDENTIFIER: &str = "IDENTIFIER";
pub const BLOCK: &str = "BLOCK";

// Statements
pub const VAR: &str = "VAR";
pub const IF: &str = "IF";
pub const ELSE: &str = "ELSE";
pub const WHILE: &str = "WHILE";
pub const DO_WHILE: &str = "DO_WHILE";
pub const BREAK: &str = "BREAK";
pub const EXPR: &str = "EXPR";
pub const INIT: &str = "INIT";

// Expressions
pub const ASSIGN: &str = "=";
pub const FUNC_CALL: &str = "FUNC_CALL";
pub const INDEXING: &str = "INDEXING";
pub const EXPR_LIST: &str = "EXPR_LIST";
pub const PLUS: &str = "PLUS";
pub const MINUS: &str = "MINUS";
pub const MUL: &str = "MUL";
pub const DIV: &str = "DIV";
pub const NEG: &str = "NEG";
pub const NOT: &str = "NOT";
pub const BOOL: &str = "BOOL";
pub const STR: &str = "STR";
pub const SYMB: &str = "SYMB";
pub const HEX: &str = "HEX";
pub const BITS: &str = "BITS";
pub const DEC: &str = "DEC";

/// Built-in return type assigned to functions without an explicit one.
pub const VOID: &str = "void";

/// Statement-level dispatch classes for the CFG builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Block,
    Var,
    If,
    While,
    DoWhile,
    Break,
    Expr,
    Other,
}

static STATEMENT_KINDS: phf::Map<&'static str, Kind> = phf_map! {
    "BLOCK" => Kind::Block,
    "VAR" => Kind::Var,
    "IF" => Kind::If,
    "WHILE" => Kind::While,
    "DO_WHILE" => Kind::DoWhile,
    "BREAK" => Kind::Break,
    "EXPR" => Kind::Expr,
};

pub fn lookup(label: &str) -> Kind {
    STATEMENT_KINDS.get(label).copied().unwrap_or(Kind::Other)
}

#[test]
fn statement_lookup_covers_the_closed_set() {
    assert_eq!(lookup("WHILE"), Kind::While);
    assert_eq!(lookup("DO_WHILE"), Kind::DoWhile);
    assert_eq!(lookup("VAR"), Kind::Var);
    assert_eq!(lookup("RETURN"), Kind::Other);
}
