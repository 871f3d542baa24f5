//! `codeveil` - CLI for redacted source snapshots
//!
//! This binary converts a project tree into redacted, print-ready documents
//! and previews redaction of single files.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use codeveil::cli::{Cli, Command, ConfigCommand, PreviewCommand, RunCommand};
use codeveil::policy::DirectoryPolicy;
use codeveil::{init_logging, ChromiumEngine, Config, Pipeline, ProjectConfig, Redactor, SourceDocument};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Execute the command
    match cli.command {
        Command::Run(run_cmd) => handle_run(config, &run_cmd).await,
        Command::Preview(preview_cmd) => handle_preview(&config, &preview_cmd),
        Command::Config(config_cmd) => handle_config(&config, cli.config.clone(), config_cmd),
    }
}

async fn handle_run(mut config: Config, cmd: &RunCommand) -> anyhow::Result<ExitCode> {
    cmd.apply(&mut config);
    config.validate()?;

    let project_path = match &cmd.project {
        Some(path) => path.clone(),
        None => ProjectConfig::discover(&cmd.input)?,
    };
    let project = ProjectConfig::load(&project_path)
        .with_context(|| format!("loading project configuration {}", project_path.display()))?;

    let output_base = match &cmd.output {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("resolving current directory")?,
    };

    let engine = ChromiumEngine::from_config(&config.render)?;
    let pipeline = Pipeline::new(config, Arc::new(engine));
    let summary = pipeline.run(&cmd.input, &project, &output_base).await?;

    if cmd.json {
        println!("{}", summary.to_json()?);
    } else {
        println!("{summary}");
    }

    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn handle_preview(config: &Config, cmd: &PreviewCommand) -> anyhow::Result<ExitCode> {
    let document = SourceDocument::read(&cmd.file)?;
    let redactor = Redactor::new(config.redaction.markers.clone());

    let redaction = if cmd.target.is_empty() {
        let policy = DirectoryPolicy::private();
        let triggers = policy.triggers_for("", redactor.markers());
        redactor.redact_document(&document, &triggers)?
    } else {
        redactor.redact_document(&document, cmd.target.as_slice())?
    };

    if cmd.json {
        let preview = serde_json::json!({
            "file": document.path(),
            "spans": redaction.spans,
            "obscured_lines": redaction.obscured_lines(),
            "text": redaction.text(),
        });
        println!("{}", serde_json::to_string_pretty(&preview)?);
    } else {
        println!("{}", redaction.text());
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_config(
    config: &Config,
    config_path: Option<std::path::PathBuf>,
    cmd: ConfigCommand,
) -> anyhow::Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                let markers = &config.redaction.markers;
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Redaction]");
                println!("  Doc delimiter:      {}", markers.doc_delimiter);
                println!("  Declaration:        {:?}", markers.declaration_keyword);
                println!("  No-op tokens:       {}", markers.noop_tokens.join(", "));
                println!("  Comment prefix:     {}", markers.comment_prefix);
                println!("  On malformed:       {:?}", config.redaction.on_malformed);
                println!();
                println!("[Walk]");
                println!("  Source extension:   {}", config.walk.source_extension);
                println!("  Initializer:        {}", config.walk.initializer_name);
                println!(
                    "  Ignored dirs:       {}",
                    config.walk.ignored_directories.join(", ")
                );
                println!();
                println!("[Render]");
                match &config.render.browser {
                    Some(browser) => println!("  Browser:            {}", browser.display()),
                    None => println!("  Browser:            (search PATH)"),
                }
                println!("  Timeout (secs):     {}", config.render.timeout_secs);
                println!("  Max concurrent:     {}", config.render.max_concurrent);
                println!("  Landscape:          {}", config.render.landscape);
                println!();
                println!("[Output]");
                println!("  Projects dir:       {}", config.output.projects_dir);
                println!("  Keep tree:          {}", config.output.keep_tree);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(config_path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration error: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
