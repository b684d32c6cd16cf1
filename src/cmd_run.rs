//! Run subcommand: stream a grid against an in-memory sheet.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use sheetstream_config::Config;
use sheetstream_planner::{StructureAnalyzer, TaskGenerator};
use sheetstream_protocols::{MemorySheet, SpreadsheetContext};
use sheetstream_stream::{StreamContext, StreamOptions, StreamScheduler};

use crate::adapters::{EchoDriver, FirstLineReports, SimulatedWindows, StaticAuth};
use crate::cmd_plan::read_grid;

/// Handle the run subcommand.
pub(crate) async fn handle_run_command(
    config: &Config,
    grid_path: &Path,
    test_mode: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let grid = read_grid(grid_path)?;
    let structure = StructureAnalyzer::new(config.structure.clone()).analyze(&grid);
    let tasks = TaskGenerator::new(&config.structure)
        .generate(&grid, &structure)
        .into_tasks();
    info!("Planned {} tasks from {}", tasks.len(), grid_path.display());

    let sheet = Arc::new(MemorySheet::new(grid));
    let context = StreamContext {
        sheets: sheet.clone(),
        windows: Arc::new(SimulatedWindows::default()),
        driver: Arc::new(EchoDriver {
            delay: Duration::from_millis(config.scheduler.test_delay_min_ms),
        }),
        reports: Arc::new(FirstLineReports),
        auth: Arc::new(StaticAuth),
    };
    let scheduler = Arc::new(StreamScheduler::new(config, context)?);

    let stopper = scheduler.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping stream");
            stopper.stop_streaming();
        }
    });

    let spreadsheet = SpreadsheetContext {
        spreadsheet_id: config.sheet.spreadsheet_id.clone(),
        sheet_gid: config.sheet.sheet_gid.clone(),
        sheet_name: config.sheet.sheet_name.clone(),
    };
    let options = StreamOptions {
        test_mode,
        origin_tab: None,
    };
    let summary = scheduler.process_task_stream(tasks, spreadsheet, options).await?;
    ctrl_c.abort();

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&sheet.snapshot())?;
        std::fs::write(path, json)?;
        info!("Grid written to {}", path.display());
    }
    Ok(())
}
