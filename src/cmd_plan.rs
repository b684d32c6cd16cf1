//! Plan subcommand: analyze a grid and print the tasks it yields.

use std::path::Path;

use serde_json::json;

use sheetstream_config::Config;
use sheetstream_planner::{StructureAnalyzer, TaskGenerator};
use sheetstream_protocols::{Grid, Prompt, Task};

/// Read a grid file: a JSON array of string rows.
pub(crate) fn read_grid(path: &Path) -> Result<Grid, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let grid: Grid = serde_json::from_str(&content)?;
    Ok(grid)
}

/// Handle the plan subcommand.
pub(crate) fn handle_plan_command(
    config: &Config,
    grid_path: &Path,
    as_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let grid = read_grid(grid_path)?;
    let structure = StructureAnalyzer::new(config.structure.clone()).analyze(&grid);
    let report = TaskGenerator::new(&config.structure).generate(&grid, &structure);

    if as_json {
        let output = json!({
            "structure": structure,
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "Special rows: menu {}, ai {}, model {}, function {}",
        structure.special_rows.menu,
        structure.special_rows.ai,
        structure.special_rows.model,
        structure.special_rows.function
    );
    println!("Groups: {}", structure.groups.len());
    for warning in &structure.warnings {
        println!("  warning: {}", warning);
    }
    println!();

    if report.tasks.is_empty() {
        println!("Nothing to do.");
    } else {
        println!("{:<8} {:<8} {:<10} {:<16} {}", "CELL", "TYPE", "AI", "UNIT", "PROMPT");
        println!("{}", "-".repeat(72));
        for task in &report.tasks {
            println!("{}", describe(task));
        }
    }

    println!();
    println!(
        "{} tasks over {} work rows ({} rows and {} groups excluded by directives, {} empty prompts, {} already answered)",
        report.tasks.len(),
        report.work_rows,
        report.skipped_rows,
        report.skipped_groups,
        report.skipped_empty_prompts,
        report.skipped_answered
    );
    Ok(())
}

fn describe(task: &Task) -> String {
    match task {
        Task::Ai(t) => {
            let prompt = match &t.prompt {
                Prompt::Text { text } => text.lines().next().unwrap_or_default().to_string(),
                Prompt::Deferred { .. } => "(read at execution)".to_string(),
            };
            format!(
                "{:<8} {:<8} {:<10} {:<16} {}",
                t.cell.to_string(),
                "ai",
                t.ai.label(),
                t.group_id,
                truncate(&prompt, 40)
            )
        }
        Task::Report(t) => format!(
            "{:<8} {:<8} {:<10} {:<16} from {}",
            t.cell.to_string(),
            "report",
            "-",
            t.group_id,
            t.source
        ),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
