//! End-to-end tests for the stream scheduler.
//!
//! Sheets are planned with the real planner, then streamed against in-memory
//! collaborators on a paused clock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use sheetstream_config::{Config, ExclusiveConfig};
use sheetstream_exclusive::ExclusiveGuard;
use sheetstream_planner::{StructureAnalyzer, TaskGenerator};
use sheetstream_protocols::{
    AuthProvider, CellRef, Grid, MemorySheet, PortError, PromptDriver, PromptRequest,
    PromptResponse, ReportBuilder, ReportTask, ScreenSize, SheetsClient, SpreadsheetContext, Task,
    WindowBounds, WindowHandle, WindowManager,
};
use sheetstream_stream::{
    ClaimOutcome, ColumnPhase, ResultWriter, StreamContext, StreamError, StreamOptions,
    StreamScheduler, StreamSummary,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Ordered record of what the collaborators saw.
#[derive(Default)]
struct Journal(Mutex<Vec<String>>);

impl Journal {
    fn push(&self, entry: String) {
        self.0.lock().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    fn position(&self, entry: &str) -> usize {
        self.entries()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{entry} not in journal"))
    }

    fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }
}

/// Memory sheet that journals acknowledged writes.
struct JournalSheet {
    inner: MemorySheet,
    journal: Arc<Journal>,
}

#[async_trait]
impl SheetsClient for JournalSheet {
    async fn read_range(
        &self,
        ctx: &SpreadsheetContext,
        range: &str,
    ) -> Result<Vec<Vec<String>>, PortError> {
        self.inner.read_range(ctx, range).await
    }

    async fn write_cell(
        &self,
        ctx: &SpreadsheetContext,
        cell: &str,
        value: &str,
    ) -> Result<(), PortError> {
        self.inner.write_cell(ctx, cell, value).await?;
        self.journal.push(format!("write {cell}"));
        Ok(())
    }
}

struct FakeWindows {
    journal: Arc<Journal>,
    next: AtomicU64,
    open: Mutex<HashSet<u64>>,
    max_open: AtomicUsize,
    focused: Mutex<Option<u64>>,
    close_delay: Mutex<Duration>,
}

#[async_trait]
impl WindowManager for FakeWindows {
    async fn open_window(&self, _url: &str, _bounds: WindowBounds) -> Result<WindowHandle, PortError> {
        let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let mut open = self.open.lock();
        open.insert(id);
        self.max_open.fetch_max(open.len(), Ordering::SeqCst);
        self.journal.push(format!("open {id}"));
        Ok(WindowHandle { window_id: id, tab_id: id })
    }

    async fn close_window(&self, window_id: u64) -> Result<(), PortError> {
        let delay = *self.close_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.open.lock().remove(&window_id);
        self.journal.push(format!("close {window_id}"));
        Ok(())
    }

    async fn screen_bounds(&self) -> Result<ScreenSize, PortError> {
        Ok(ScreenSize { width: 2560, height: 1440 })
    }

    async fn focus_tab(&self, tab_id: u64) -> Result<(), PortError> {
        *self.focused.lock() = Some(tab_id);
        Ok(())
    }
}

/// Answers after a per-prompt delay; some prompts fail a number of times.
///
/// Delays are keyed by `"{ai} {prompt}"` or by the prompt alone.
struct FakeDriver {
    journal: Arc<Journal>,
    delays: HashMap<String, Duration>,
    failures: Mutex<HashMap<String, usize>>,
}

#[async_trait]
impl PromptDriver for FakeDriver {
    async fn is_ready(&self, _tab_id: u64) -> Result<bool, PortError> {
        Ok(true)
    }

    async fn send_prompt(
        &self,
        _tab_id: u64,
        request: &PromptRequest,
        _timeout: Duration,
    ) -> Result<PromptResponse, PortError> {
        self.journal.push(format!("send {}", request.text));
        let delay = self
            .delays
            .get(&format!("{} {}", request.ai, request.text))
            .or_else(|| self.delays.get(&request.text))
            .copied()
            .unwrap_or(Duration::from_secs(1));
        tokio::time::sleep(delay).await;

        if let Some(left) = self.failures.lock().get_mut(&request.text) {
            if *left > 0 {
                *left -= 1;
                return Ok(PromptResponse {
                    success: false,
                    text: "send button not found".to_string(),
                });
            }
        }
        Ok(PromptResponse {
            success: true,
            text: format!("{} answer to {}", request.ai, request.text),
        })
    }
}

struct FakeReports;

#[async_trait]
impl ReportBuilder for FakeReports {
    async fn build_report(&self, task: &ReportTask, _answer: &str) -> Result<String, PortError> {
        Ok(format!("https://docs.example/{}", task.source))
    }
}

struct FakeAuth {
    fail: AtomicBool,
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn token(&self) -> Result<String, PortError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(PortError::Auth("token expired".to_string()))
        } else {
            Ok("token".to_string())
        }
    }
}

struct World {
    journal: Arc<Journal>,
    sheet: Arc<JournalSheet>,
    windows: Arc<FakeWindows>,
    auth: Arc<FakeAuth>,
    scheduler: Arc<StreamScheduler>,
    tasks: Vec<Task>,
}

impl World {
    fn new(grid: Grid) -> Self {
        Self::with(grid, Config::default(), HashMap::new(), HashMap::new())
    }

    fn with(
        grid: Grid,
        mut config: Config,
        delays: HashMap<String, Duration>,
        failures: HashMap<String, usize>,
    ) -> Self {
        config.exclusive.worker_id = Some("pc1".to_string());
        let analyzer = StructureAnalyzer::new(config.structure.clone());
        let structure = analyzer.analyze(&grid);
        let tasks = TaskGenerator::new(&config.structure)
            .generate(&grid, &structure)
            .into_tasks();

        let journal = Arc::new(Journal::default());
        let sheet = Arc::new(JournalSheet {
            inner: MemorySheet::new(grid),
            journal: journal.clone(),
        });
        let windows = Arc::new(FakeWindows {
            journal: journal.clone(),
            next: AtomicU64::new(0),
            open: Mutex::new(HashSet::new()),
            max_open: AtomicUsize::new(0),
            focused: Mutex::new(None),
            close_delay: Mutex::new(Duration::ZERO),
        });
        let driver = Arc::new(FakeDriver {
            journal: journal.clone(),
            delays,
            failures: Mutex::new(failures),
        });
        let auth = Arc::new(FakeAuth {
            fail: AtomicBool::new(false),
        });
        let context = StreamContext {
            sheets: sheet.clone(),
            windows: windows.clone(),
            driver,
            reports: Arc::new(FakeReports),
            auth: auth.clone(),
        };
        let scheduler = Arc::new(StreamScheduler::new(&config, context).unwrap());

        Self {
            journal,
            sheet,
            windows,
            auth,
            scheduler,
            tasks,
        }
    }

    async fn run(&self, options: StreamOptions) -> Result<StreamSummary, StreamError> {
        self.scheduler
            .process_task_stream(self.tasks.clone(), SpreadsheetContext::new("sheet"), options)
            .await
    }

    /// Result writer of another worker sharing this sheet.
    fn other_worker(&self, worker_id: &str) -> ResultWriter {
        let guard = ExclusiveGuard::new(&ExclusiveConfig {
            worker_id: Some(worker_id.to_string()),
            ..Default::default()
        })
        .unwrap();
        ResultWriter::new(self.sheet.clone(), Arc::new(guard))
    }

    fn value(&self, cell: &str) -> String {
        self.sheet.inner.value(cell.parse::<CellRef>().unwrap())
    }

    fn max_open(&self) -> usize {
        self.windows.max_open.load(Ordering::SeqCst)
    }
}

fn set(grid: &mut Grid, cell: &str, value: &str) {
    grid.set(cell.parse::<CellRef>().unwrap(), value);
}

fn labelled() -> Grid {
    let mut grid = Grid::default();
    set(&mut grid, "A1", "menu");
    set(&mut grid, "A2", "ai");
    set(&mut grid, "A3", "model");
    set(&mut grid, "A4", "function");
    grid
}

/// Prompt in D, answer in E.
fn single_sheet(rows: &[(u32, &str)]) -> Grid {
    let mut grid = labelled();
    set(&mut grid, "D1", "prompt");
    set(&mut grid, "E1", "answer");
    for (row, prompt) in rows {
        set(&mut grid, &format!("D{row}"), prompt);
    }
    grid
}

/// Three-type group: prompt `p`, log, three answers.
fn add_three_type(grid: &mut Grid, p: &str, log: &str, answers: [&str; 3]) {
    set(grid, &format!("{p}1"), "prompt");
    set(grid, &format!("{p}2"), "3 kinds (ChatGPT/Gemini/Claude)");
    set(grid, &format!("{log}1"), "log");
    for answer in answers {
        set(grid, &format!("{answer}1"), "answer");
    }
}

fn delays(entries: &[(&str, u64)]) -> HashMap<String, Duration> {
    entries
        .iter()
        .map(|(prompt, secs)| (prompt.to_string(), Duration::from_secs(*secs)))
        .collect()
}

fn live() -> StreamOptions {
    StreamOptions::default()
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_single_column_runs_rows_sequentially() {
    let world = World::new(single_sheet(&[(9, "q9"), (10, "q10"), (11, "q11")]));
    assert_eq!(world.tasks.len(), 3);

    let summary = world.run(live()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.total_windows, 3);
    assert_eq!(summary.processed_columns, vec!["single:D".to_string()]);
    assert_eq!(world.max_open(), 1);
    assert_eq!(world.value("E9"), "ChatGPT answer to q9");
    assert_eq!(world.value("E11"), "ChatGPT answer to q11");

    let journal = &world.journal;
    assert!(journal.position("write E9") < journal.position("send q10"));
    assert!(journal.position("write E10") < journal.position("send q11"));
    assert!(world.windows.open.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wavefront_overlaps_columns_diagonally() {
    let mut grid = single_sheet(&[(9, "left 9"), (10, "left 10")]);
    set(&mut grid, "I1", "prompt");
    set(&mut grid, "J1", "answer");
    set(&mut grid, "I9", "right 9");
    set(&mut grid, "I10", "right 10");
    let world = World::with(
        grid,
        Config::default(),
        delays(&[("left 10", 30)]),
        HashMap::new(),
    );

    let summary = world.run(live()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.completed, 4);
    assert_eq!(summary.processed_columns.len(), 2);

    let journal = &world.journal;
    assert!(journal.position("write E9") < journal.position("send right 9"));
    assert!(journal.position("send right 9") < journal.position("write E10"));
    assert!(journal.position("write J9") < journal.position("write E10"));
    // J10 waits for E10.
    assert!(journal.position("write E10") < journal.position("send right 10"));
}

#[tokio::test(start_paused = true)]
async fn test_three_failures_abandon_cell_and_advance() {
    let mut failures = HashMap::new();
    failures.insert("broken".to_string(), 10);
    let world = World::with(
        single_sheet(&[(9, "broken"), (10, "fine")]),
        Config::default(),
        HashMap::new(),
        failures,
    );

    let summary = world.run(live()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(world.journal.count("send broken"), 3);
    assert_eq!(world.value("E9"), "ERROR: Execution failed: send button not found");
    assert_eq!(world.value("E10"), "ChatGPT answer to fine");
}

#[tokio::test(start_paused = true)]
async fn test_window_limit_holds_across_three_type_columns() {
    let mut grid = labelled();
    add_three_type(&mut grid, "D", "E", ["F", "G", "H"]);
    add_three_type(&mut grid, "I", "J", ["K", "L", "M"]);
    for row in 9..=10 {
        set(&mut grid, &format!("D{row}"), &format!("left {row}"));
        set(&mut grid, &format!("I{row}"), &format!("right {row}"));
    }
    let world = World::new(grid);
    assert_eq!(world.tasks.len(), 12);

    let summary = world.run(live()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.completed, 12);
    assert!(world.max_open() <= 4);
    for cell in ["F9", "G10", "H9", "K10", "L9", "M10"] {
        assert!(!world.value(cell).is_empty(), "{cell} not written");
    }
}

#[tokio::test(start_paused = true)]
async fn test_three_type_windows_close_after_whole_row() {
    let mut grid = labelled();
    add_three_type(&mut grid, "D", "E", ["F", "G", "H"]);
    set(&mut grid, "D9", "compare");
    let world = World::new(grid);

    let summary = world.run(live()).await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.total_windows, 3);

    let journal = &world.journal;
    let first_close = journal
        .entries()
        .iter()
        .position(|e| e.starts_with("close"))
        .unwrap();
    for cell in ["F9", "G9", "H9"] {
        assert!(journal.position(&format!("write {cell}")) < first_close);
    }

    let log = world.value("E9");
    assert!(!log.contains("PROCESSING"));
    let chatgpt = log.find("---------- ChatGPT ----------").unwrap();
    let claude = log.find("---------- Claude ----------").unwrap();
    let gemini = log.find("---------- Gemini ----------").unwrap();
    assert!(chatgpt < claude && claude < gemini);
}

#[tokio::test(start_paused = true)]
async fn test_three_type_row_stays_claimed_until_last_ai() {
    let mut grid = labelled();
    add_three_type(&mut grid, "D", "E", ["F", "G", "H"]);
    set(&mut grid, "D9", "compare");
    let world = World::with(
        grid,
        Config::default(),
        delays(&[("Claude compare", 30), ("Gemini compare", 30)]),
        HashMap::new(),
    );
    let scheduler = world.scheduler.clone();
    let tasks = world.tasks.clone();
    let handle = tokio::spawn(async move {
        scheduler
            .process_task_stream(tasks, SpreadsheetContext::new("sheet"), StreamOptions::default())
            .await
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    let log = world.value("E9");
    assert!(log.starts_with("PROCESSING_"), "marker lost: {log}");
    assert!(log.contains("---------- ChatGPT ----------"));
    assert!(world.value("G9").is_empty());

    let pc2 = world.other_worker("pc2");
    let ctx = SpreadsheetContext::new("sheet");
    match pc2.claim(&ctx, "E9".parse().unwrap(), None).await {
        ClaimOutcome::Deferred { holder, .. } => assert_eq!(holder, "pc1"),
        other => panic!("pc2 claimed a row in flight: {other:?}"),
    }

    let summary = handle.await.unwrap().unwrap();
    assert!(summary.success);
    assert_eq!(summary.completed, 3);
    let log = world.value("E9");
    assert!(!log.contains("PROCESSING"));
    assert_eq!(log.matches("----------").count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_does_not_block_column() {
    let world = World::new(single_sheet(&[(9, "q9"), (10, "q10")]));
    world.sheet.inner.fail_writes_to("E9".parse().unwrap());

    let summary = world.run(live()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.completed, 2);
    assert!(summary.persistence_failures >= 1);
    assert_eq!(world.value("E10"), "ChatGPT answer to q10");
}

#[tokio::test(start_paused = true)]
async fn test_row_with_live_foreign_marker_is_deferred() {
    let mut grid = labelled();
    add_three_type(&mut grid, "D", "E", ["F", "G", "H"]);
    set(&mut grid, "D9", "held");
    set(&mut grid, "D10", "free");
    let other = ExclusiveGuard::new(&ExclusiveConfig {
        worker_id: Some("pc2".to_string()),
        ..Default::default()
    })
    .unwrap();
    let marker = other.claim_marker(None);
    set(&mut grid, "E9", &marker);
    let world = World::new(grid);

    let summary = world.run(live()).await.unwrap();

    assert_eq!(summary.deferred, 3);
    assert_eq!(summary.completed, 3);
    assert_eq!(world.value("E9"), marker);
    assert_eq!(world.value("F9"), "");
    assert!(!world.value("F10").is_empty());
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_closes_windows_and_resets_status() {
    let world = World::with(
        single_sheet(&[(9, "slow")]),
        Config::default(),
        delays(&[("slow", 3600)]),
        HashMap::new(),
    );
    let scheduler = world.scheduler.clone();
    let tasks = world.tasks.clone();
    let handle = tokio::spawn(async move {
        scheduler
            .process_task_stream(tasks, SpreadsheetContext::new("sheet"), StreamOptions::default())
            .await
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    let status = world.scheduler.get_status();
    assert!(status.is_processing);
    assert_eq!(status.active_windows, 1);
    assert_eq!(status.per_column[0].state, ColumnPhase::Running);
    assert_eq!(world.windows.open.lock().len(), 1);

    assert!(world.scheduler.stop_streaming());
    let summary = handle.await.unwrap().unwrap();

    assert!(summary.stopped);
    assert!(!summary.success);
    assert!(world.windows.open.lock().is_empty());
    assert_eq!(world.value("E9"), "");
    assert!(!world.scheduler.get_status().is_processing);
    assert!(!world.scheduler.is_running());
    assert!(!world.scheduler.stop_streaming());
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_windows_close_still_closes_them() {
    let mut grid = labelled();
    add_three_type(&mut grid, "D", "E", ["F", "G", "H"]);
    set(&mut grid, "D9", "compare");
    let world = World::new(grid);
    *world.windows.close_delay.lock() = Duration::from_secs(60);

    let scheduler = world.scheduler.clone();
    let tasks = world.tasks.clone();
    let handle = tokio::spawn(async move {
        scheduler
            .process_task_stream(tasks, SpreadsheetContext::new("sheet"), StreamOptions::default())
            .await
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(world.windows.open.lock().len(), 3);
    assert!(!world.value("H9").is_empty());

    assert!(world.scheduler.stop_streaming());
    let summary = handle.await.unwrap().unwrap();

    assert!(summary.stopped);
    assert!(world.windows.open.lock().is_empty());
    assert!(world.scheduler.executor().open_windows().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_stream_is_rejected_while_running() {
    let world = World::with(
        single_sheet(&[(9, "slow")]),
        Config::default(),
        delays(&[("slow", 60)]),
        HashMap::new(),
    );
    let scheduler = world.scheduler.clone();
    let tasks = world.tasks.clone();
    let handle = tokio::spawn(async move {
        scheduler
            .process_task_stream(tasks, SpreadsheetContext::new("sheet"), StreamOptions::default())
            .await
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    let second = world.run(live()).await;
    assert!(matches!(second, Err(StreamError::AlreadyRunning)));

    assert!(handle.await.unwrap().unwrap().success);
    assert!(world.run(live()).await.unwrap().success);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_aborts_before_any_work() {
    let world = World::new(single_sheet(&[(9, "q9")]));
    world.auth.fail.store(true, Ordering::SeqCst);

    let result = world.run(live()).await;

    assert!(matches!(result, Err(StreamError::Auth(_))));
    assert!(world.journal.entries().is_empty());
    assert!(!world.scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_test_mode_skips_auth_and_windows() {
    let world = World::new(single_sheet(&[(9, "q9"), (10, "q10")]));
    world.auth.fail.store(true, Ordering::SeqCst);

    let options = StreamOptions {
        test_mode: true,
        origin_tab: Some(7),
    };
    let summary = world.run(options).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.total_windows, 0);
    assert_eq!(world.max_open(), 0);
    assert_eq!(world.value("E9"), "[test mode] ChatGPT answer for E9");
    assert_eq!(*world.windows.focused.lock(), Some(7));
}

#[tokio::test(start_paused = true)]
async fn test_empty_task_list_succeeds() {
    let world = World::new(labelled());
    assert!(world.tasks.is_empty());

    let summary = world.run(live()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.completed, 0);
    assert!(summary.processed_columns.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_report_written_after_answer() {
    let mut grid = labelled();
    add_three_type(&mut grid, "D", "E", ["F", "G", "H"]);
    set(&mut grid, "I1", "reportify");
    set(&mut grid, "D9", "compare");
    set(&mut grid, "F9", "existing answer");
    set(&mut grid, "G9", "existing answer");
    set(&mut grid, "H9", "existing answer");
    let world = World::new(grid);
    assert_eq!(world.tasks.len(), 1);

    let summary = world.run(live()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.total_windows, 0);
    assert_eq!(world.value("I9"), "https://docs.example/F9");
}
