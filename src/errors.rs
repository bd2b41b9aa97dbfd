use thiserror::Error;

pub type MyLangResult<T, E = MyLangError> = Result<T, E>;

/// Errors of the tooling surface: file loading, configuration, output.
/// Structural findings inside the IR are not errors in this sense — they
/// accumulate on the [`crate::program::Program`] instead.
#[derive(Debug, Error)]
pub enum MyLangError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("AST parse error: {0}")]
    Ast(#[from] serde_json::Error),

    #[error("{0}")]
    Msg(String),
}

impl From<&str> for MyLangError {
    fn from(s: &str) -> Self {
        MyLangError::Msg(s.to_owned())
    }
}

impl From<String> for MyLangError {
    fn from(s: String) -> Self {
        MyLangError::Msg(s)
    }
}

#[test]
fn io_conversion_retains_message() {
    let e = std::io::Error::other("boom!");
    let err: MyLangError = e.into();
    assert!(matches!(err, MyLangError::Io(_)));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn ast_parse_error_maps_correct_variant() {
    let bad = serde_json::from_str::<crate::ast::AstNode>("{not json").unwrap_err();
    let err: MyLangError = bad.into();
    assert!(matches!(err, MyLangError::Ast(_)));
}

#[test]
fn simple_string_into_msg() {
    let err: MyLangError = "plain msg".into();
    assert!(matches!(err, MyLangError::Msg(s) if s == "plain msg"));
}
