//! Scheduling state: per-column cursors, row units and the slot table.
//!
//! Transitions are synchronous and return the async work to launch, so the
//! event loop never holds the state lock across an await.
//!
//! A column's cursor row may start once no unit is active in that column and
//! every column to its left has settled the same row. Settling a row (written,
//! abandoned or deferred) is the only thing that moves a cursor, which gives
//! the diagonal wavefront.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, error, info, warn};

use sheetstream_config::SchedulerConfig;
use sheetstream_protocols::{column_letter, CellRef, GroupRef, PortError, Task, TaskType, WindowHandle};

use crate::error::StreamError;
use crate::executor::{Job, TaskOutcome};
use crate::slot::SlotTable;
use crate::status::{ColumnPhase, ColumnProgress, StreamStatus, StreamSummary};
use crate::writer::ClaimOutcome;

/// Async work requested by a transition.
#[derive(Debug)]
pub(crate) enum Launch {
    Claim {
        column: usize,
        row: u32,
        cell: CellRef,
        feature: Option<String>,
    },
    Execute {
        column: usize,
        job: Job,
    },
    CloseWindow {
        column: usize,
        slot: usize,
        window: WindowHandle,
    },
    Release {
        cell: CellRef,
    },
}

/// Completion of a [`Launch`].
#[derive(Debug)]
pub(crate) enum Event {
    Claimed {
        column: usize,
        row: u32,
        outcome: ClaimOutcome,
    },
    TaskDone {
        column: usize,
        slot: Option<usize>,
        outcome: TaskOutcome,
    },
    WindowClosed {
        column: usize,
        slot: usize,
    },
    Released {
        cell: CellRef,
        result: Result<(), PortError>,
    },
}

#[derive(Debug)]
struct RowUnit {
    row: u32,
    tasks: Vec<Task>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitPhase {
    Claiming,
    Running,
}

#[derive(Debug)]
struct PendingTask {
    task: Task,
    /// Retries keep the slot they already had.
    slot: Option<usize>,
}

#[derive(Debug)]
struct ActiveUnit {
    row: u32,
    phase: UnitPhase,
    claim_cell: Option<CellRef>,
    claimed: bool,
    pending: Vec<PendingTask>,
    running: usize,
    finished: usize,
    total: usize,
    /// Windows kept open until the whole row is done.
    held: Vec<(usize, WindowHandle)>,
    closing: usize,
}

impl ActiveUnit {
    fn new(row: u32, tasks: Vec<Task>, claim_cell: Option<CellRef>) -> Self {
        let total = tasks.len();
        Self {
            row,
            phase: if claim_cell.is_some() {
                UnitPhase::Claiming
            } else {
                UnitPhase::Running
            },
            claim_cell,
            claimed: false,
            pending: tasks
                .into_iter()
                .map(|task| PendingTask { task, slot: None })
                .collect(),
            running: 0,
            finished: 0,
            total,
            held: Vec::new(),
            closing: 0,
        }
    }

    /// Every AI task of the row has a slot.
    ///
    /// Until then finished tasks give their slot back so the rest of the row
    /// can start.
    fn fully_launched(&self) -> bool {
        !self
            .pending
            .iter()
            .any(|p| p.slot.is_none() && p.task.task_type() == TaskType::Ai)
    }
}

#[derive(Debug)]
struct ColumnPlan {
    group: GroupRef,
    label: String,
    columns: Vec<String>,
    log_column: Option<u32>,
    units: Vec<RowUnit>,
    cursor: usize,
    active: Option<ActiveUnit>,
}

impl ColumnPlan {
    fn cursor_row(&self) -> Option<u32> {
        self.units.get(self.cursor).map(|u| u.row)
    }

    /// Whether this column has nothing left to do at `row`.
    fn row_settled(&self, row: u32) -> bool {
        match self.units.binary_search_by_key(&row, |u| u.row) {
            Ok(index) => index < self.cursor,
            Err(_) => true,
        }
    }

    fn is_closed(&self) -> bool {
        self.active.is_none() && self.cursor >= self.units.len()
    }

    fn phase(&self) -> ColumnPhase {
        match &self.active {
            None if self.cursor >= self.units.len() => ColumnPhase::Closed,
            None => ColumnPhase::Idle,
            Some(unit) if unit.phase == UnitPhase::Claiming => ColumnPhase::Claiming,
            Some(unit) if unit.finished > 0 => ColumnPhase::AwaitingWrite,
            Some(_) => ColumnPhase::Running,
        }
    }

    /// Tasks not yet handed to the executor.
    fn queued(&self) -> usize {
        let waiting_units = match &self.active {
            Some(_) => self.cursor + 1,
            None => self.cursor,
        };
        let rest: usize = self
            .units
            .iter()
            .skip(waiting_units)
            .map(|u| u.tasks.len())
            .sum();
        rest + self.active.as_ref().map_or(0, |u| u.pending.len())
    }

    fn running(&self) -> usize {
        self.active.as_ref().map_or(0, |u| u.running)
    }
}

/// In-memory state of one stream.
#[derive(Debug)]
pub(crate) struct StreamState {
    columns: Vec<ColumnPlan>,
    slots: SlotTable,
    failures: HashMap<CellRef, u32>,
    max_errors: u32,
    exclusive_control: bool,
    processed: usize,
    errored: usize,
    abandoned: usize,
    deferred: usize,
    persistence_failures: usize,
    windows_opened: usize,
}

impl StreamState {
    pub fn new(tasks: Vec<Task>, config: &SchedulerConfig) -> Result<Self, StreamError> {
        if config.max_concurrent_windows == 0 {
            return Err(StreamError::InvalidTasks("no window slots configured".to_string()));
        }

        let mut seen = HashSet::new();
        let mut grouped: BTreeMap<GroupRef, BTreeMap<u32, Vec<Task>>> = BTreeMap::new();
        for task in tasks {
            if !seen.insert(task.id().clone()) {
                return Err(StreamError::InvalidTasks(format!("duplicate task id {}", task.id())));
            }
            grouped
                .entry(task.group())
                .or_default()
                .entry(task.row())
                .or_default()
                .push(task);
        }

        let columns = grouped
            .into_iter()
            .map(|(group, rows)| {
                let mut letters: Vec<u32> = rows
                    .values()
                    .flatten()
                    .map(|t| t.cell().column)
                    .collect();
                letters.sort_unstable();
                letters.dedup();
                let log_column = rows
                    .values()
                    .flatten()
                    .find_map(|t| t.as_ai().and_then(|a| a.log_column));
                ColumnPlan {
                    group,
                    label: group.label(),
                    columns: letters.into_iter().map(column_letter).collect(),
                    log_column,
                    units: rows
                        .into_iter()
                        .map(|(row, tasks)| RowUnit { row, tasks })
                        .collect(),
                    cursor: 0,
                    active: None,
                }
            })
            .collect();

        Ok(Self {
            columns,
            slots: SlotTable::new(config.max_concurrent_windows),
            failures: HashMap::new(),
            max_errors: config.max_consecutive_errors.max(1),
            exclusive_control: config.exclusive_control,
            processed: 0,
            errored: 0,
            abandoned: 0,
            deferred: 0,
            persistence_failures: 0,
            windows_opened: 0,
        })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_finished(&self) -> bool {
        self.columns.iter().all(ColumnPlan::is_closed)
    }

    /// Start every row the wavefront allows and hand out free slots.
    pub fn pump(&mut self) -> Vec<Launch> {
        let mut launches = Vec::new();
        for index in 0..self.columns.len() {
            if self.columns[index].active.is_some() {
                continue;
            }
            let Some(row) = self.columns[index].cursor_row() else {
                continue;
            };
            if !self.columns[..index].iter().all(|c| c.row_settled(row)) {
                continue;
            }
            if let Some(launch) = self.start_unit(index) {
                launches.push(launch);
            }
        }
        self.launch_pending(&mut launches);
        launches
    }

    fn start_unit(&mut self, index: usize) -> Option<Launch> {
        let exclusive = self.exclusive_control;
        let plan = &mut self.columns[index];
        let unit = &plan.units[plan.cursor];
        let row = unit.row;
        let tasks = unit.tasks.clone();
        let feature = tasks
            .iter()
            .find_map(|t| t.as_ai().and_then(|a| a.feature.clone()));
        let claim_cell = plan
            .log_column
            .filter(|_| exclusive)
            .map(|column| CellRef::new(column, row));

        info!("Column {} starting row {} ({} tasks)", plan.label, row, tasks.len());
        plan.active = Some(ActiveUnit::new(row, tasks, claim_cell));

        claim_cell.map(|cell| Launch::Claim {
            column: index,
            row,
            cell,
            feature,
        })
    }

    fn launch_pending(&mut self, launches: &mut Vec<Launch>) {
        for (index, plan) in self.columns.iter_mut().enumerate() {
            let Some(unit) = plan.active.as_mut() else {
                continue;
            };
            if unit.phase != UnitPhase::Running {
                continue;
            }
            let pending = std::mem::take(&mut unit.pending);
            for mut entry in pending {
                if entry.slot.is_none() && entry.task.task_type() == TaskType::Ai {
                    match self.slots.reserve(entry.task.id()) {
                        Some(slot) => {
                            debug!("Slot {} reserved for {}", slot, entry.task.id());
                            entry.slot = Some(slot);
                        }
                        None => {
                            unit.pending.push(entry);
                            continue;
                        }
                    }
                }
                let attempts = self.failures.get(&entry.task.cell()).copied().unwrap_or(0);
                let job = Job {
                    keep_window: entry.task.is_multi_ai(),
                    final_attempt: attempts + 1 >= self.max_errors,
                    slot: entry.slot,
                    task: entry.task,
                };
                unit.running += 1;
                launches.push(Launch::Execute { column: index, job });
            }
        }
    }

    /// Fold a completion into the state and return what to launch next.
    pub fn apply(&mut self, event: Event) -> Vec<Launch> {
        let mut launches = Vec::new();
        match event {
            Event::Claimed { column, row, outcome } => self.on_claimed(column, row, outcome),
            Event::TaskDone {
                column,
                slot,
                outcome,
            } => self.on_task_done(column, slot, outcome, &mut launches),
            Event::WindowClosed { column, slot } => {
                self.slots.release(slot);
                debug!("Slot {} released", slot);
                if let Some(unit) = self.columns.get_mut(column).and_then(|p| p.active.as_mut()) {
                    unit.closing = unit.closing.saturating_sub(1);
                }
                self.try_finish(column, &mut launches);
            }
            Event::Released { cell, result } => {
                if let Err(e) = result {
                    error!("Failed to clear marker in {}: {}", cell, e);
                    self.persistence_failures += 1;
                }
            }
        }
        launches.extend(self.pump());
        launches
    }

    fn on_claimed(&mut self, column: usize, row: u32, outcome: ClaimOutcome) {
        let Some(plan) = self.columns.get_mut(column) else {
            return;
        };
        let Some(unit) = plan.active.as_mut().filter(|u| u.row == row) else {
            return;
        };
        match outcome {
            ClaimOutcome::Claimed => {
                debug!("Column {} claimed row {}", plan.label, row);
                unit.claimed = true;
                unit.phase = UnitPhase::Running;
            }
            ClaimOutcome::Unclaimed(e) => {
                error!("Column {} row {} proceeds unclaimed: {}", plan.label, row, e);
                self.persistence_failures += 1;
                unit.phase = UnitPhase::Running;
            }
            ClaimOutcome::Deferred { holder, wait } => {
                warn!(
                    "Column {} row {} is held by {} for another {:?}, deferring",
                    plan.label, row, holder, wait
                );
                self.deferred += unit.total;
                plan.active = None;
                plan.cursor += 1;
            }
        }
    }

    fn on_task_done(
        &mut self,
        column: usize,
        slot: Option<usize>,
        outcome: TaskOutcome,
        launches: &mut Vec<Launch>,
    ) {
        let TaskOutcome {
            task,
            result,
            window,
            opened_window,
            persistence_failures,
        } = outcome;
        let cell = task.cell();
        if opened_window {
            self.windows_opened += 1;
        }
        self.persistence_failures += persistence_failures;

        let Some(unit) = self
            .columns
            .get_mut(column)
            .and_then(|p| p.active.as_mut())
            .filter(|u| u.row == task.row())
        else {
            if let Some(slot) = slot {
                self.slots.release(slot);
            }
            return;
        };
        unit.running = unit.running.saturating_sub(1);

        match result {
            Ok(()) => {
                self.processed += 1;
                self.failures.remove(&cell);
                unit.finished += 1;
                match (slot, window) {
                    (Some(slot), Some(window)) if unit.fully_launched() => {
                        unit.held.push((slot, window));
                    }
                    (Some(slot), Some(window)) => {
                        unit.closing += 1;
                        launches.push(Launch::CloseWindow { column, slot, window });
                    }
                    (Some(slot), None) => {
                        self.slots.release(slot);
                    }
                    (None, _) => {}
                }
            }
            Err(e) => {
                self.errored += 1;
                let count = self.failures.entry(cell).or_insert(0);
                *count += 1;
                if e.is_retryable() && *count < self.max_errors {
                    debug!("Requeueing {} (attempt {} failed)", cell, count);
                    unit.pending.push(PendingTask { task, slot });
                } else {
                    error!("Cell {} abandoned after {} attempt(s): {}", cell, count, e);
                    self.failures.remove(&cell);
                    self.abandoned += 1;
                    unit.finished += 1;
                    if let Some(slot) = slot {
                        self.slots.release(slot);
                    }
                }
            }
        }

        self.try_finish(column, launches);
    }

    /// Advance the cursor once every task of the active row is settled and
    /// its windows are closed.
    fn try_finish(&mut self, column: usize, launches: &mut Vec<Launch>) {
        let Some(plan) = self.columns.get_mut(column) else {
            return;
        };
        let Some(unit) = plan.active.as_mut() else {
            return;
        };
        if unit.running > 0 || !unit.pending.is_empty() || unit.finished < unit.total {
            return;
        }
        if !unit.held.is_empty() {
            for (slot, window) in unit.held.drain(..) {
                unit.closing += 1;
                launches.push(Launch::CloseWindow { column, slot, window });
            }
            return;
        }
        if unit.closing > 0 {
            return;
        }

        if unit.claimed {
            if let Some(cell) = unit.claim_cell {
                launches.push(Launch::Release { cell });
            }
        }
        let row = unit.row;
        plan.active = None;
        plan.cursor += 1;
        debug!("Column {} finished row {}", plan.label, row);
        if plan.cursor >= plan.units.len() {
            info!("Column {} closed after {} rows", plan.label, plan.units.len());
        }
    }

    pub fn status(&self) -> StreamStatus {
        let queue_length: usize = self.columns.iter().map(ColumnPlan::queued).sum();
        let running: usize = self.columns.iter().map(ColumnPlan::running).sum();
        StreamStatus {
            is_processing: true,
            active_windows: self.slots.occupied(),
            queue_length,
            processed: self.processed,
            pending: queue_length + running,
            errored: self.errored,
            abandoned: self.abandoned,
            deferred: self.deferred,
            persistence_failures: self.persistence_failures,
            per_column: self
                .columns
                .iter()
                .map(|plan| ColumnProgress {
                    group_id: plan.label.clone(),
                    columns: plan.columns.clone(),
                    state: plan.phase(),
                    current_row: plan
                        .active
                        .as_ref()
                        .map(|u| u.row)
                        .or_else(|| plan.cursor_row()),
                    completed: plan.cursor,
                    total: plan.units.len(),
                })
                .collect(),
        }
    }

    pub fn summary(&self, stopped: bool) -> StreamSummary {
        StreamSummary {
            success: !stopped && self.is_finished(),
            processed_columns: self
                .columns
                .iter()
                .filter(|c| c.is_closed())
                .map(|c| c.label.clone())
                .collect(),
            total_windows: self.windows_opened,
            completed: self.processed,
            failed: self.abandoned,
            deferred: self.deferred,
            persistence_failures: self.persistence_failures,
            stopped,
        }
    }

    /// Group of each column, left to right.
    pub fn groups(&self) -> Vec<GroupRef> {
        self.columns.iter().map(|c| c.group).collect()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
