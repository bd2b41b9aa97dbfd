//! Diagnostics-only pass: build the IR, print what was found, and fail the
//! exit status when errors (or, if configured, warnings) were accumulated.

use crate::commands::{load_files, print_diagnostics};
use crate::errors::MyLangResult;
use crate::program::Program;
use crate::utils::Config;
use console::style;

pub fn handle(files: &[String], config: &Config) -> MyLangResult<()> {
    let parsed = load_files(files)?;
    let program = Program::build(&parsed);
    print_diagnostics(&program, config);

    let failed = !program.errors.is_empty()
        || (config.diagnostics.warnings_as_errors && !program.warnings.is_empty());
    if failed {
        return Err(format!(
            "analysis failed: {} errors, {} warnings",
            program.errors.len(),
            program.warnings.len()
        )
        .into());
    }

    if !config.output.quiet {
        println!(
            "{} {} functions, no errors.",
            style("Checked").green().bold(),
            style(program.functions.len()).bold()
        );
    }
    Ok(())
}

#[test]
fn check_fails_on_structural_errors() {
    let dir = tempfile::tempdir().unwrap();
    let ast_path = dir.path().join("bad.ast.json");
    // func f() { break; }
    let doc = r#"
    {"label":"SOURCE","children":[
      {"label":"FUNC_DEF","children":[
        {"label":"FUNC_SIGNATURE","children":[
          {"label":"NAME","children":[{"label":"f","line":1,"pos":5}]},
          {"label":"ARGDEF_LIST","children":[]}]},
        {"label":"BLOCK","children":[{"label":"BREAK","line":2,"pos":4}]}]}]}
    "#;
    std::fs::write(&ast_path, doc).unwrap();

    let config = Config::default();
    let result = handle(&[ast_path.to_string_lossy().into_owned()], &config);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("1 errors"));
}

#[test]
fn check_passes_on_a_clean_program() {
    let dir = tempfile::tempdir().unwrap();
    let ast_path = dir.path().join("ok.ast.json");
    let doc = r#"
    {"label":"SOURCE","children":[
      {"label":"FUNC_DEF","children":[
        {"label":"FUNC_SIGNATURE","children":[
          {"label":"NAME","children":[{"label":"f","line":1,"pos":5}]},
          {"label":"ARGDEF_LIST","children":[]}]},
        {"label":"BLOCK","children":[
          {"label":"EXPR","line":2,"pos":4,"children":[
            {"label":"PLUS","line":2,"pos":6,"children":[
              {"label":"DEC","line":2,"pos":4,"children":[{"label":"1","line":2,"pos":4}]},
              {"label":"DEC","line":2,"pos":8,"children":[{"label":"2","line":2,"pos":8}]}]}]}]}]}]}
    "#;
    std::fs::write(&ast_path, doc).unwrap();

    let config = Config::default();
    handle(&[ast_path.to_string_lossy().into_owned()], &config).unwrap();
}
