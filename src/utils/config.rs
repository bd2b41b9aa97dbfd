use crate::errors::MyLangResult;
use console::style;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

static DEFAULT_CONFIG_TOML: &str = include_str!("../../default-mylang.conf");

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the generated dot files are written to. Empty means next to
    /// the source file.
    pub directory: String,

    /// Draw each instruction's operation tree inside the CFG output.
    pub draw_operation_trees: bool,

    /// Whether to print anything beyond diagnostics.
    pub quiet: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: String::new(),
            draw_operation_trees: false,
            quiet: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Treat accumulated warnings like errors when deciding the exit status.
    pub warnings_as_errors: bool,

    /// The maximum number of diagnostics to print, or `None` for all.
    pub max_messages: Option<u32>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            warnings_as_errors: false,
            max_messages: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    pub fn load(config_dir: &Path) -> MyLangResult<Self> {
        let mut config = Config::default();

        let default_config_path = config_dir.join("mylang.conf");
        if !default_config_path.exists() {
            create_example_config(config_dir)?;
        }

        let user_config_path = config_dir.join("mylang.local");
        if user_config_path.exists() {
            let user_config_content = fs::read_to_string(&user_config_path)?;
            let user_config: Config = toml::from_str(&user_config_content)?;

            config = merge_configs(config, user_config);

            tracing::debug!("loaded user config from: {}", user_config_path.display());
        } else {
            tracing::debug!(
                "using default configuration; create '{}' to customize",
                user_config_path.display()
            );
        }

        Ok(config)
    }
}

fn create_example_config(config_dir: &Path) -> MyLangResult<()> {
    let example_path = config_dir.join("mylang.conf");
    if !example_path.exists() {
        fs::write(&example_path, DEFAULT_CONFIG_TOML)?;
        println!(
            "{}: example config created at: {}\n",
            style("note").green().bold(),
            style(example_path.display()).underlined()
        );
    }
    Ok(())
}

/// Merge user config into default config; every key the user supplies wins.
fn merge_configs(mut default: Config, user: Config) -> Config {
    default.output.directory = user.output.directory;
    default.output.draw_operation_trees = user.output.draw_operation_trees;
    default.output.quiet = user.output.quiet;

    default.diagnostics.warnings_as_errors = user.diagnostics.warnings_as_errors;
    default.diagnostics.max_messages = user.diagnostics.max_messages;

    default
}

#[test]
fn merge_overrides_every_supplied_key() {
    let default_cfg = Config::default();

    let mut user_cfg = Config::default();
    user_cfg.output.directory = "out".into();
    user_cfg.diagnostics.warnings_as_errors = true;

    let merged = merge_configs(default_cfg, user_cfg);
    assert_eq!(merged.output.directory, "out");
    assert!(merged.diagnostics.warnings_as_errors);
    assert!(!merged.output.quiet);
}

#[test]
fn load_creates_example_and_reads_user_overrides() {
    let cfg_dir = tempfile::tempdir().unwrap();
    let cfg_path = cfg_dir.path();

    let user_toml = r#"
        [output]
        draw_operation_trees = true

        [diagnostics]
        max_messages = 25
    "#;
    fs::write(cfg_path.join("mylang.local"), user_toml).unwrap();

    let cfg = Config::load(cfg_path).expect("Config::load should succeed");

    assert!(cfg_path.join("mylang.conf").is_file());
    assert!(cfg.output.draw_operation_trees);
    assert_eq!(cfg.diagnostics.max_messages, Some(25));
    assert!(!cfg.diagnostics.warnings_as_errors);
}
