//! Stream scheduler: the event loop that drives column cursors to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sheetstream_config::{Config, SchedulerConfig};
use sheetstream_exclusive::ExclusiveGuard;
use sheetstream_protocols::{ScreenSize, SpreadsheetContext, Task};

use crate::context::{RunSettings, StreamContext, StreamOptions};
use crate::error::StreamError;
use crate::executor::TaskExecutor;
use crate::state::{Event, Launch, StreamState};
use crate::status::{StreamStatus, StreamSummary};
use crate::writer::ResultWriter;

/// Runs one task stream at a time.
///
/// Share it behind an `Arc` so another task can call
/// [`stop_streaming`](Self::stop_streaming) or poll
/// [`get_status`](Self::get_status) while a stream is running.
pub struct StreamScheduler {
    config: SchedulerConfig,
    executor: Arc<TaskExecutor>,
    state: Mutex<Option<StreamState>>,
    cancel: Mutex<Option<CancellationToken>>,
    running: AtomicBool,
}

impl StreamScheduler {
    pub fn new(config: &Config, context: StreamContext) -> Result<Self, StreamError> {
        let guard = Arc::new(ExclusiveGuard::new(&config.exclusive)?);
        info!(
            "Stream scheduler ready: worker {}, {} window slots",
            guard.worker_id(),
            config.scheduler.max_concurrent_windows
        );
        let writer = Arc::new(ResultWriter::new(Arc::clone(&context.sheets), guard));
        let executor = TaskExecutor::new(
            context,
            writer,
            config.scheduler.clone(),
            config.urls.clone(),
        );
        Ok(Self {
            config: config.scheduler.clone(),
            executor: Arc::new(executor),
            state: Mutex::new(None),
            cancel: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    pub fn worker_id(&self) -> &str {
        self.executor.writer().guard().worker_id()
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Process `tasks` until every column is closed or the stream is stopped.
    pub async fn process_task_stream(
        &self,
        tasks: Vec<Task>,
        spreadsheet: SpreadsheetContext,
        options: StreamOptions,
    ) -> Result<StreamSummary, StreamError> {
        let run_guard = RunGuard::acquire(self)?;

        if tasks.is_empty() {
            info!("No tasks to process");
            return Ok(StreamSummary {
                success: true,
                ..Default::default()
            });
        }

        if !options.test_mode {
            self.executor
                .context()
                .auth
                .token()
                .await
                .map_err(StreamError::Auth)?;
        }

        let task_count = tasks.len();
        let mut state = StreamState::new(tasks, &self.config)?;
        let screen = self.screen(options.test_mode).await;
        let run = Arc::new(RunSettings {
            spreadsheet,
            test_mode: options.test_mode,
            screen,
        });

        info!(
            "Starting stream: {} tasks in {} columns{}",
            task_count,
            state.column_count(),
            if options.test_mode { " (test mode)" } else { "" }
        );

        let cancel = CancellationToken::new();
        *self.cancel.lock() = Some(cancel.clone());
        let initial = state.pump();
        *self.state.lock() = Some(state);

        let started = Instant::now();
        let mut set = JoinSet::new();
        self.spawn_all(&mut set, initial, &run);

        let stopped = loop {
            if set.is_empty() {
                break false;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break true,
                joined = set.join_next() => match joined {
                    Some(Ok(event)) => {
                        let launches = self.apply(event);
                        self.spawn_all(&mut set, launches, &run);
                    }
                    Some(Err(e)) => error!("Stream task failed to complete: {}", e),
                    None => {}
                },
            }
        };

        if stopped {
            warn!("Stream stopped, aborting {} in-flight operations", set.len());
            set.abort_all();
            while set.join_next().await.is_some() {}
        }

        let summary = self
            .state
            .lock()
            .as_ref()
            .map(|state| state.summary(stopped))
            .unwrap_or_default();
        if !stopped && !summary.success {
            error!("Stream stalled with work remaining");
        }

        self.executor.close_all().await;
        drop(run_guard);

        if let Some(tab_id) = options.origin_tab {
            if let Err(e) = self.executor.context().windows.focus_tab(tab_id).await {
                warn!("Failed to focus tab {}: {}", tab_id, e);
            }
        }

        info!(
            "Stream finished in {:.1}s: {} completed, {} failed, {} deferred, {} windows",
            started.elapsed().as_secs_f64(),
            summary.completed,
            summary.failed,
            summary.deferred,
            summary.total_windows
        );
        Ok(summary)
    }

    /// Request the running stream to stop. Returns `false` when idle.
    pub fn stop_streaming(&self) -> bool {
        match self.cancel.lock().as_ref() {
            Some(token) => {
                info!("Stop requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Snapshot of the running stream, or the idle default.
    pub fn get_status(&self) -> StreamStatus {
        self.state
            .lock()
            .as_ref()
            .map(StreamState::status)
            .unwrap_or_default()
    }

    fn apply(&self, event: Event) -> Vec<Launch> {
        self.state
            .lock()
            .as_mut()
            .map(|state| state.apply(event))
            .unwrap_or_default()
    }

    async fn screen(&self, test_mode: bool) -> ScreenSize {
        let fallback = ScreenSize {
            width: self.config.fallback_screen_width,
            height: self.config.fallback_screen_height,
        };
        if test_mode {
            return fallback;
        }
        match self.executor.context().windows.screen_bounds().await {
            Ok(size) => size,
            Err(e) => {
                warn!("Screen size unavailable, using {}x{}: {}", fallback.width, fallback.height, e);
                fallback
            }
        }
    }

    fn spawn_all(&self, set: &mut JoinSet<Event>, launches: Vec<Launch>, run: &Arc<RunSettings>) {
        for launch in launches {
            let executor = Arc::clone(&self.executor);
            let run = Arc::clone(run);
            match launch {
                Launch::Claim {
                    column,
                    row,
                    cell,
                    feature,
                } => {
                    debug!("Claiming {}", cell);
                    set.spawn(async move {
                        let outcome = executor
                            .writer()
                            .claim(&run.spreadsheet, cell, feature.as_deref())
                            .await;
                        Event::Claimed { column, row, outcome }
                    });
                }
                Launch::Execute { column, job } => {
                    set.spawn(async move {
                        let slot = job.slot;
                        let outcome = executor.execute(job, &run).await;
                        Event::TaskDone {
                            column,
                            slot,
                            outcome,
                        }
                    });
                }
                Launch::CloseWindow {
                    column,
                    slot,
                    window,
                } => {
                    set.spawn(async move {
                        executor.close(window).await;
                        Event::WindowClosed { column, slot }
                    });
                }
                Launch::Release { cell } => {
                    set.spawn(async move {
                        let result = executor.writer().release(&run.spreadsheet, cell).await;
                        Event::Released { cell, result }
                    });
                }
            }
        }
    }
}

/// Marks the scheduler busy for the lifetime of one stream and resets it on
/// drop, including when the caller drops the stream future.
struct RunGuard<'a> {
    scheduler: &'a StreamScheduler,
}

impl<'a> RunGuard<'a> {
    fn acquire(scheduler: &'a StreamScheduler) -> Result<Self, StreamError> {
        scheduler
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| StreamError::AlreadyRunning)?;
        Ok(Self { scheduler })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.scheduler.state.lock() = None;
        *self.scheduler.cancel.lock() = None;
        self.scheduler.executor.writer().reset();
        self.scheduler.running.store(false, Ordering::SeqCst);
    }
}
