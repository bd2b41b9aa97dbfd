//! The full pipeline: load ASTs, assemble the program, report diagnostics,
//! write one dot file per function CFG and — when the program is sound —
//! the call graph.

use crate::cg::build_call_graph;
use crate::commands::{load_files, print_diagnostics};
use crate::dot;
use crate::errors::MyLangResult;
use crate::program::Program;
use crate::utils::Config;
use console::style;
use std::fs;
use std::path::{Path, PathBuf};

pub fn handle(files: &[String], config: &Config) -> MyLangResult<()> {
    let parsed = load_files(files)?;
    let program = Program::build(&parsed);
    print_diagnostics(&program, config);

    let out_dir = (!config.output.directory.is_empty()).then_some(config.output.directory.as_str());

    let mut main_file: Option<&str> = None;
    let mut written = 0usize;
    for func in &program.functions {
        if func.function_name == "main" {
            main_file = Some(&func.file_name);
        }
        let Some(cfg) = &func.cfg else {
            continue;
        };
        let path = output_file_name(&func.file_name, &func.function_name, "dot", out_dir);
        fs::write(
            &path,
            dot::cfg_to_dot(cfg, config.output.draw_operation_trees),
        )?;
        tracing::debug!("wrote {}", path.display());
        written += 1;
    }

    if main_file.is_none() {
        eprintln!("Error: main function is not defined");
    }

    if program.errors.is_empty() && (main_file.is_some() || out_dir.is_some()) {
        let cg = build_call_graph(&program);
        let dir = out_dir
            .map(PathBuf::from)
            .or_else(|| main_file.and_then(|f| Path::new(f).parent().map(Path::to_path_buf)));
        if let Some(dir) = dir {
            let path = dir.join("cg.dot");
            fs::write(&path, dot::call_graph_to_dot(&cg))?;
            tracing::debug!("wrote {}", path.display());
            written += 1;
        }
    }

    if !config.output.quiet {
        println!(
            "{} {} functions, {} dot files.",
            style("Analyzed").green().bold(),
            style(program.functions.len()).bold(),
            style(written).bold()
        );
    }
    Ok(())
}

/// `<source-stem>.<function>.<ext>`, placed in `dir` when given, otherwise
/// next to the source file.
fn output_file_name(source: &str, function: &str, ext: &str, dir: Option<&str>) -> PathBuf {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out");
    let file = format!("{stem}.{function}.{ext}");
    match dir {
        Some(dir) => Path::new(dir).join(file),
        None => match Path::new(source).parent() {
            Some(parent) => parent.join(file),
            None => PathBuf::from(file),
        },
    }
}

#[test]
fn output_file_name_uses_stem_function_and_extension() {
    let path = output_file_name("demo/a.lang", "f", "dot", None);
    assert_eq!(path, PathBuf::from("demo/a.f.dot"));

    let path = output_file_name("demo/a.lang", "f", "dot", Some("out"));
    assert_eq!(path, PathBuf::from("out/a.f.dot"));
}

#[test]
fn analyze_writes_cfg_and_call_graph_files() {
    let dir = tempfile::tempdir().unwrap();
    let ast_path = dir.path().join("prog.ast.json");
    // func main() { f(); }  func f() { }
    let doc = r#"
    {"label":"SOURCE","children":[
      {"label":"FUNC_DEF","children":[
        {"label":"FUNC_SIGNATURE","children":[
          {"label":"NAME","children":[{"label":"main","line":1,"pos":5}]},
          {"label":"ARGDEF_LIST","children":[]}]},
        {"label":"BLOCK","children":[
          {"label":"EXPR","line":2,"pos":4,"children":[
            {"label":"FUNC_CALL","line":2,"pos":4,"children":[
              {"label":"IDENTIFIER","line":2,"pos":4,"children":[{"label":"f","line":2,"pos":4}]}]}]}]}]},
      {"label":"FUNC_DEF","children":[
        {"label":"FUNC_SIGNATURE","children":[
          {"label":"NAME","children":[{"label":"f","line":4,"pos":5}]},
          {"label":"ARGDEF_LIST","children":[]}]},
        {"label":"BLOCK","children":[]}]}]}
    "#;
    std::fs::write(&ast_path, doc).unwrap();

    let mut config = Config::default();
    config.output.directory = dir.path().join("out").to_string_lossy().into_owned();
    std::fs::create_dir_all(&config.output.directory).unwrap();

    handle(&[ast_path.to_string_lossy().into_owned()], &config).unwrap();

    let out = Path::new(&config.output.directory);
    assert!(out.join("prog.ast.main.dot").is_file());
    assert!(out.join("prog.ast.f.dot").is_file());
    let cg = std::fs::read_to_string(out.join("cg.dot")).unwrap();
    assert!(cg.contains("\"main\" -> \"f\""));
}
