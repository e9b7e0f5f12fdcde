//! CLI command handling
//!
//! Dispatches CLI commands to the test runner and formats output.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::driver::{Driver, DryRunDriver};
use crate::event::{AttrTable, EventFactory, KindSchema, SchemaRegistry};
use crate::testing;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            scripts,
            config,
            hijacks,
            verbose,
            ..
        } => run(scripts, config, hijacks, verbose).await,

        Commands::Check { scripts } => check(&scripts),

        Commands::Kinds { tag, json } => kinds(tag.as_deref(), json),
    }
}

async fn run(
    scripts: Vec<PathBuf>,
    config_path: Option<PathBuf>,
    hijacks: Vec<String>,
    verbose: bool,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_hijack_args(&hijacks)?;

    let factory = EventFactory::new(Arc::new(SchemaRegistry::builtin()));
    let driver: Arc<dyn Driver> = Arc::new(DryRunDriver::new());

    let total = scripts.len();
    let mut failed = 0;
    for script in &scripts {
        match testing::run_script(script, driver.clone(), &factory, &config, verbose).await {
            Ok(result) if result.passed => {}
            Ok(_) => failed += 1,
            Err(e) => {
                println!(
                    "\n{} {}: {}\n",
                    "✗".red().bold(),
                    script.display(),
                    e
                );
                failed += 1;
            }
        }
    }

    if total > 1 {
        println!(
            "{} passed, {} failed",
            (total - failed).to_string().green().bold(),
            failed.to_string().red().bold()
        );
    }

    if failed > 0 {
        return Err(Error::TestsFailed { failed, total });
    }
    Ok(())
}

fn check(scripts: &[PathBuf]) -> Result<()> {
    let factory = EventFactory::new(Arc::new(SchemaRegistry::builtin()));
    let mut failed = 0;

    for path in scripts {
        match testing::load_script(path, &factory) {
            Ok((script, events)) => {
                let count: usize = events.iter().map(|e| e.count()).sum();
                println!(
                    "{} {} ({}, {} events)",
                    "✓".green(),
                    path.display(),
                    script.name,
                    count
                );
            }
            Err(e) => {
                println!("{} {}: {}", "✗".red(), path.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(Error::TestsFailed {
            failed,
            total: scripts.len(),
        });
    }
    Ok(())
}

fn kinds(tag: Option<&str>, json: bool) -> Result<()> {
    let registry = SchemaRegistry::builtin();

    let schemas: Vec<&KindSchema> = match tag {
        Some(tag) => {
            let kind = registry
                .kind_for_tag(tag)
                .ok_or_else(|| Error::UnknownEventKind(tag.to_string()))?;
            registry.schema(kind).into_iter().collect()
        }
        None => registry.schemas(),
    };

    if json {
        let results: Vec<_> = schemas
            .iter()
            .map(|schema| {
                let kind = schema.kind;
                serde_json::json!({
                    "tag": kind.tag(),
                    "category": kind.category(),
                    "html_tag": kind.html_target().map(|t| t.tag),
                    "html_type": kind.html_target().and_then(|t| t.input_type),
                    "selectors": attr_map(&schema.selectors),
                    "actions": attr_map(&schema.actions),
                    "content": format!("{:?}", schema.content).to_lowercase(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    for schema in schemas {
        let kind = schema.kind;
        let target = match kind.html_target() {
            Some(t) => match t.input_type {
                Some(input) => format!("<{} type={}>", t.tag, input),
                None => format!("<{}>", t.tag),
            },
            None => String::new(),
        };
        println!(
            "  {:12} {:8} {}",
            kind.tag().bold(),
            kind.category().to_string().dimmed(),
            target
        );
        if tag.is_some() {
            println!("    selectors: {}", attr_list(&schema.selectors));
            println!("    actions:   {}", attr_list(&schema.actions));
        }
    }

    Ok(())
}

fn attr_map(table: &AttrTable) -> serde_json::Value {
    table
        .iter()
        .map(|(name, ty)| {
            (
                name.to_string(),
                serde_json::to_value(ty).unwrap_or(serde_json::Value::Null),
            )
        })
        .collect::<serde_json::Map<_, _>>()
        .into()
}

fn attr_list(table: &AttrTable) -> String {
    if table.is_empty() {
        return "-".to_string();
    }
    table
        .iter()
        .map(|(name, ty)| format!("{}:{:?}", name, ty).to_lowercase())
        .collect::<Vec<_>>()
        .join(", ")
}
