//! Single-task execution.
//!
//! Every failure is caught here and turned into a [`TaskOutcome`]; nothing a
//! task does can stop the scheduler loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::Mutex;
use rand::Rng;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use sheetstream_config::{SchedulerConfig, UrlConfig};
use sheetstream_protocols::{
    AiTask, CellRef, PortError, Prompt, PromptRequest, ReportTask, Task, WindowBounds,
    WindowHandle,
};

use crate::context::{RunSettings, StreamContext};
use crate::error::TaskError;
use crate::log_entry::LogSection;
use crate::slot::quadrant;
use crate::url::url_for;
use crate::writer::ResultWriter;

/// How long `close_all` waits for window opens still in flight.
const PENDING_OPEN_GRACE: Duration = Duration::from_secs(30);

/// One unit of work handed to the executor.
#[derive(Debug, Clone)]
pub(crate) struct Job {
    pub task: Task,
    pub slot: Option<usize>,
    /// Leave the window open after a success; the row closes it.
    pub keep_window: bool,
    /// A failure now abandons the cell.
    pub final_attempt: bool,
}

/// What happened to a job.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: Task,
    pub result: Result<(), TaskError>,
    /// Window left open for the row.
    pub window: Option<WindowHandle>,
    pub opened_window: bool,
    pub persistence_failures: usize,
}

impl TaskOutcome {
    fn new(task: Task) -> Self {
        Self {
            task,
            result: Ok(()),
            window: None,
            opened_window: false,
            persistence_failures: 0,
        }
    }
}

/// Windows currently open, so a stop can close them.
#[derive(Debug, Default)]
pub struct OpenWindows {
    windows: Mutex<HashMap<u64, WindowHandle>>,
}

impl OpenWindows {
    pub fn insert(&self, handle: WindowHandle) {
        self.windows.lock().insert(handle.window_id, handle);
    }

    pub fn remove(&self, window_id: u64) {
        self.windows.lock().remove(&window_id);
    }

    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn drain(&self) -> Vec<WindowHandle> {
        self.windows.lock().drain().map(|(_, h)| h).collect()
    }
}

/// Runs AI and report tasks against the injected collaborators.
pub struct TaskExecutor {
    context: StreamContext,
    writer: Arc<ResultWriter>,
    config: SchedulerConfig,
    urls: UrlConfig,
    open_windows: Arc<OpenWindows>,
    /// Window opens run here, so a window created after its task was
    /// aborted is still recorded in `open_windows`.
    openings: TaskTracker,
}

impl TaskExecutor {
    pub fn new(
        context: StreamContext,
        writer: Arc<ResultWriter>,
        config: SchedulerConfig,
        urls: UrlConfig,
    ) -> Self {
        Self {
            context,
            writer,
            config,
            urls,
            open_windows: Arc::new(OpenWindows::default()),
            openings: TaskTracker::new(),
        }
    }

    pub fn context(&self) -> &StreamContext {
        &self.context
    }

    pub fn writer(&self) -> &ResultWriter {
        &self.writer
    }

    pub fn open_windows(&self) -> &OpenWindows {
        &self.open_windows
    }

    pub(crate) async fn execute(&self, job: Job, run: &RunSettings) -> TaskOutcome {
        let mut outcome = TaskOutcome::new(job.task.clone());
        debug!("Executing {} (slot {:?})", job.task.id(), job.slot);

        let result = match &job.task {
            Task::Ai(task) => self.run_ai(task, &job, run, &mut outcome).await,
            Task::Report(task) => self.run_report(task, run, &mut outcome).await,
        };

        if let Err(ref e) = result {
            let cell = job.task.cell();
            if !e.is_retryable() || job.final_attempt {
                error!("Abandoning {}: {}", cell, e);
                if self.config.write_failures {
                    if let Err(write_err) = self
                        .writer
                        .write_failure(&run.spreadsheet, cell, &self.config.failure_text, e)
                        .await
                    {
                        error!("Failed to record failure in {}: {}", cell, write_err);
                        outcome.persistence_failures += 1;
                    }
                }
            } else {
                warn!("Task {} failed, will retry: {}", job.task.id(), e);
            }
        }

        outcome.result = result;
        outcome
    }

    async fn run_ai(
        &self,
        task: &AiTask,
        job: &Job,
        run: &RunSettings,
        outcome: &mut TaskOutcome,
    ) -> Result<(), TaskError> {
        let prompt = self.resolve_prompt(task, run).await?;
        let url = url_for(&self.urls, task.ai, task.model.as_deref())
            .map_err(|e| TaskError::WindowCreation(format!("invalid URL for {}: {e}", task.ai)))?;
        let timeout = self.writer.guard().timeout_for(task.feature.as_deref());
        let sent = self.now();

        let (answer, window) = if run.test_mode {
            (self.simulate(task).await, None)
        } else {
            let bounds = quadrant(job.slot.unwrap_or(0), run.screen);
            let handle = self.open(&url, bounds).await?;
            outcome.opened_window = true;
            debug!("Opened window {} for {} at {}", handle.window_id, task.cell, url);

            match self.converse(handle, task, prompt, timeout).await {
                Ok(text) => (text, Some(handle)),
                Err(e) => {
                    self.close(handle).await;
                    return Err(e);
                }
            }
        };

        if let Err(e) = self.writer.write_answer(&run.spreadsheet, task.cell, &answer).await {
            error!("Failed to write answer to {}: {}", task.cell, e);
            outcome.persistence_failures += 1;
        }

        if let Some(column) = task.log_column {
            let section = LogSection {
                ai: task.ai,
                model: task.model.clone(),
                feature: task.feature.clone(),
                url,
                sent,
                written: self.now(),
            };
            let cell = CellRef::new(column, task.cell.row);
            if let Err(e) = self.writer.append_log(&run.spreadsheet, cell, &section).await {
                error!("Failed to write log to {}: {}", cell, e);
                outcome.persistence_failures += 1;
            }
        }

        if let Some(handle) = window {
            if job.keep_window {
                outcome.window = Some(handle);
            } else {
                self.close(handle).await;
            }
        }
        Ok(())
    }

    async fn run_report(
        &self,
        task: &ReportTask,
        run: &RunSettings,
        outcome: &mut TaskOutcome,
    ) -> Result<(), TaskError> {
        let answer = self
            .writer
            .read(&run.spreadsheet, task.source)
            .await
            .map_err(|e| TaskError::Report(e.to_string()))?;
        if answer.trim().is_empty() {
            return Err(TaskError::Report(format!("source {} is empty", task.source)));
        }
        let report = self
            .context
            .reports
            .build_report(task, &answer)
            .await
            .map_err(|e| TaskError::Report(e.to_string()))?;

        if let Err(e) = self.writer.write_answer(&run.spreadsheet, task.cell, &report).await {
            error!("Failed to write report to {}: {}", task.cell, e);
            outcome.persistence_failures += 1;
        }
        Ok(())
    }

    async fn resolve_prompt(&self, task: &AiTask, run: &RunSettings) -> Result<String, TaskError> {
        let text = match &task.prompt {
            Prompt::Text { text } => text.clone(),
            Prompt::Deferred { columns } => {
                let mut parts = Vec::with_capacity(columns.len());
                for &column in columns {
                    let value = self
                        .writer
                        .read(&run.spreadsheet, CellRef::new(column, task.cell.row))
                        .await
                        .map_err(|e| TaskError::Execution(format!("prompt read failed: {e}")))?;
                    let value = value.trim();
                    if !value.is_empty() {
                        parts.push(value.to_string());
                    }
                }
                parts.join("\n")
            }
        };
        if text.trim().is_empty() {
            return Err(TaskError::EmptyPrompt);
        }
        Ok(text)
    }

    async fn converse(
        &self,
        handle: WindowHandle,
        task: &AiTask,
        prompt: String,
        timeout: Duration,
    ) -> Result<String, TaskError> {
        self.wait_ready(handle.tab_id).await?;

        let request = PromptRequest {
            ai: task.ai,
            text: prompt,
            model: task.model.clone(),
            feature: task.feature.clone(),
        };
        let send = self.context.driver.send_prompt(handle.tab_id, &request, timeout);
        match tokio::time::timeout(timeout, send).await {
            Err(_) => Err(TaskError::Timeout(timeout)),
            Ok(Err(PortError::Timeout(after))) => Err(TaskError::Timeout(after)),
            Ok(Err(e)) => Err(TaskError::Execution(e.to_string())),
            Ok(Ok(response)) if !response.success => Err(TaskError::Execution(response.text)),
            Ok(Ok(response)) => Ok(response.text),
        }
    }

    async fn wait_ready(&self, tab_id: u64) -> Result<(), TaskError> {
        let interval = Duration::from_millis(self.config.ready_poll_interval_ms);
        let retries = self.config.ready_poll_retries.max(1);
        for attempt in 1..=retries {
            match self.context.driver.is_ready(tab_id).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => debug!("Readiness check on tab {} failed: {}", tab_id, e),
            }
            if attempt < retries {
                tokio::time::sleep(interval).await;
            }
        }
        Err(TaskError::NotReady(tab_id))
    }

    async fn simulate(&self, task: &AiTask) -> String {
        let low = self.config.test_delay_min_ms.min(self.config.test_delay_max_ms);
        let high = self.config.test_delay_min_ms.max(self.config.test_delay_max_ms);
        let delay = rand::rng().random_range(low..=high);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        format!("[test mode] {} answer for {}", task.ai.label(), task.cell)
    }

    async fn open(&self, url: &str, bounds: WindowBounds) -> Result<WindowHandle, TaskError> {
        let windows = Arc::clone(&self.context.windows);
        let open_windows = Arc::clone(&self.open_windows);
        let url = url.to_string();
        let opening = self.openings.spawn(async move {
            let handle = windows.open_window(&url, bounds).await?;
            open_windows.insert(handle);
            Ok::<_, PortError>(handle)
        });
        match opening.await {
            Ok(result) => result.map_err(|e| TaskError::WindowCreation(e.to_string())),
            Err(e) => Err(TaskError::WindowCreation(e.to_string())),
        }
    }

    /// Close a window. It is forgotten only once the close succeeded.
    pub async fn close(&self, handle: WindowHandle) {
        match self.context.windows.close_window(handle.window_id).await {
            Ok(()) => self.open_windows.remove(handle.window_id),
            Err(e) => warn!("Failed to close window {}: {}", handle.window_id, e),
        }
    }

    /// Close every window still open, including ones whose open was in
    /// flight. Used when a stream ends or is stopped.
    pub async fn close_all(&self) {
        self.openings.close();
        if tokio::time::timeout(PENDING_OPEN_GRACE, self.openings.wait()).await.is_err() {
            warn!("{} window opens still pending, not waiting", self.openings.len());
        }
        self.openings.reopen();
        for handle in self.open_windows.drain() {
            if let Err(e) = self.context.windows.close_window(handle.window_id).await {
                warn!("Failed to close window {}: {}", handle.window_id, e);
            }
        }
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.writer.guard().offset())
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
