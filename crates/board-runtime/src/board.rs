//! The live department board.
//!
//! [`Board`] owns the roster, the live-status overlay, the aggregate, the
//! position map and the drag session. All mutation happens on the caller's
//! task: network work is spawned onto tokio and reports back through an
//! internal inbox, which the caller drains with [`Board::try_process`] (from a
//! UI loop) or [`Board::process_next`] / [`Board::settle`] (from async code).
//! Every completion is tagged with the roster epoch it was started under and
//! is discarded if a newer snapshot has replaced the roster since.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;

use board_core::models::{
    DepartmentAggregate, Machine, MachineDraft, MachineId, MachineStats, MachineStatus, Position,
    StatsWindow,
};
use board_core::notifications::{Notice, NotificationSink};
use board_core::{BoardError, ErrorKind, Result};
use board_data::api::BoardApi;
use board_data::events::{PushChannel, PushEvent};

use crate::layout::{CardGeometry, LayoutEngine, PointerDown, Surface};
use crate::roster::Roster;
use crate::stats::{self, DisplayStatsCache, StatsAggregator};
use crate::subscription::EventSubscription;

// ── Public types ──────────────────────────────────────────────────────────────

/// Static knobs of a board instance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoardConfig {
    pub geometry: CardGeometry,
    pub stats_window: StatsWindow,
}

/// Control-flow requests the board hands back to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    MachineDetail(MachineId),
    DepartmentList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    /// The snapshot could not be fetched. Terminal until the next load.
    Failed(String),
}

/// Proof that the user confirmed deleting one specific machine.
///
/// Only [`Board::confirm_delete`] creates these, and
/// [`Board::delete_machine`] consumes one.
#[derive(Debug, PartialEq, Eq)]
pub struct DeleteConfirmation {
    machine_id: MachineId,
    machine_name: String,
}

impl DeleteConfirmation {
    pub fn machine_id(&self) -> MachineId {
        self.machine_id
    }

    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }
}

// ── Inbox ─────────────────────────────────────────────────────────────────────

enum BoardMessage {
    Push(PushEvent),
    StatsFetched {
        epoch: u64,
        seq: u64,
        results: Vec<(MachineId, Result<MachineStats>)>,
    },
    DisplayStatsFetched {
        epoch: u64,
        seq: u64,
        entries: Vec<(MachineId, MachineStats)>,
    },
    MachineCreated {
        epoch: u64,
        result: Result<Machine>,
    },
    MachineDeleted {
        epoch: u64,
        machine_id: MachineId,
        result: Result<()>,
    },
    PositionSaved {
        epoch: u64,
        machine_id: MachineId,
        position: Position,
        result: Result<()>,
    },
    LayoutSaved {
        epoch: u64,
        batch: Vec<(MachineId, Position)>,
        result: Result<()>,
    },
}

// ── Board ─────────────────────────────────────────────────────────────────────

pub struct Board {
    department_id: String,
    department_name: Option<String>,
    api: Arc<dyn BoardApi>,
    notifier: Arc<dyn NotificationSink>,
    config: BoardConfig,
    load_state: LoadState,
    roster: Roster,
    stats: StatsAggregator,
    display: DisplayStatsCache,
    layout: LayoutEngine,
    subscription: Option<EventSubscription>,
    tx: mpsc::UnboundedSender<BoardMessage>,
    rx: mpsc::UnboundedReceiver<BoardMessage>,
    /// Spawned operations whose completion has not been processed yet.
    in_flight: usize,
}

impl Board {
    pub fn new(
        department_id: impl Into<String>,
        api: Arc<dyn BoardApi>,
        notifier: Arc<dyn NotificationSink>,
        config: BoardConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            department_id: department_id.into(),
            department_name: None,
            api,
            notifier,
            config,
            load_state: LoadState::Loading,
            roster: Roster::new(),
            stats: StatsAggregator::new(),
            display: DisplayStatsCache::new(),
            layout: LayoutEngine::new(config.geometry),
            subscription: None,
            tx,
            rx,
            in_flight: 0,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn department_id(&self) -> &str {
        &self.department_id
    }

    pub fn department_name(&self) -> Option<&str> {
        self.department_name.as_deref()
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn config(&self) -> BoardConfig {
        self.config
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn machines(&self) -> &[Machine] {
        self.roster.machines()
    }

    pub fn displayed_status(&self, id: MachineId) -> Option<MachineStatus> {
        self.roster.displayed_status(id)
    }

    pub fn aggregate(&self) -> DepartmentAggregate {
        self.stats.aggregate()
    }

    /// Cached 24 h figures for a card, if any fetch has succeeded.
    pub fn card_stats(&self, id: MachineId) -> Option<&MachineStats> {
        self.display.get(id)
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    /// Drafted position of `id`.
    pub fn position(&self, id: MachineId) -> Option<Position> {
        self.layout.position(id)
    }

    pub fn is_edit_mode(&self) -> bool {
        self.layout.is_edit_mode()
    }

    pub fn is_active(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(EventSubscription::is_attached)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    // ── Snapshot ──────────────────────────────────────────────────────────

    /// Fetch the department and replace the roster with its machines.
    ///
    /// A failure leaves the board in [`LoadState::Failed`] with an empty
    /// roster, so results and pushes for the previous roster are dropped.
    /// Nothing retries.
    pub async fn load_snapshot(&mut self) -> Result<()> {
        self.load_state = LoadState::Loading;
        let department = match self.api.get_department(&self.department_id).await {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(department = %self.department_id, error = %e, "department load failed");
                self.load_state = LoadState::Failed(e.to_string());
                self.install_roster(Vec::new());
                return Err(e);
            }
        };

        tracing::info!(
            department = %self.department_id,
            machines = department.machines.len(),
            "department snapshot loaded"
        );
        self.department_name = Some(department.name);
        self.install_roster(department.machines);
        self.load_state = LoadState::Ready;

        self.recompute();
        self.refresh_display_stats();
        Ok(())
    }

    /// Replace the roster wholesale and reset everything derived from it.
    fn install_roster(&mut self, machines: Vec<Machine>) {
        self.layout.seed(&machines);
        self.roster.replace(machines);
        self.stats.reset();
        self.display.clear();
    }

    // ── Subscription lifecycle ────────────────────────────────────────────

    /// Attach push handlers on `channel`.
    ///
    /// Handlers only forward into the board's inbox, so every event is
    /// resolved against the roster as it is when the event is processed.
    /// On a partial failure the error is returned and the board stays
    /// attached with whatever registered; [`Board::deactivate`] cleans up.
    pub fn activate(&mut self, channel: Arc<dyn PushChannel>) -> Result<()> {
        self.deactivate();
        let mut subscription = EventSubscription::new(channel);
        let tx = self.tx.clone();
        let result = subscription.activate(move |event| {
            let _ = tx.send(BoardMessage::Push(event));
        });
        self.subscription = Some(subscription);
        result
    }

    /// Remove all push handlers. Events already queued are dropped when
    /// processed.
    pub fn deactivate(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.deactivate();
        }
    }

    // ── Reconciler ────────────────────────────────────────────────────────

    /// Record a live/confirmed status pair. Unknown machines are ignored.
    pub fn apply_status_event(&mut self, id: MachineId, live: MachineStatus, confirmed: MachineStatus) -> bool {
        if !self.roster.apply_status(id, live, confirmed) {
            tracing::debug!(machine_id = %id, "status event for unknown machine dropped");
            return false;
        }
        self.recompute();
        true
    }

    pub fn apply_production_event(&mut self, id: MachineId) -> bool {
        self.signal_recompute(id, "production")
    }

    pub fn apply_stoppage_event(&mut self, id: MachineId) -> bool {
        self.signal_recompute(id, "stoppage")
    }

    fn signal_recompute(&mut self, id: MachineId, signal: &'static str) -> bool {
        if !self.roster.contains(id) {
            tracing::debug!(machine_id = %id, signal, "event for unknown machine dropped");
            return false;
        }
        self.recompute();
        true
    }

    /// Validate `draft` and start creating it.
    ///
    /// The machine joins the roster once the backend confirms it.
    pub fn add_machine(&mut self, draft: MachineDraft) -> Result<()> {
        if let Err(e) = draft.validate() {
            self.report_failure("add machine", &e);
            return Err(e);
        }

        let api = Arc::clone(&self.api);
        let department_id = self.department_id.clone();
        let epoch = self.roster.epoch();
        self.spawn(async move {
            let result = api.create_machine(&department_id, &draft).await;
            BoardMessage::MachineCreated { epoch, result }
        });
        Ok(())
    }

    /// First step of a deletion: check the machine exists and edit mode is
    /// on, and hand back a confirmation to present to the user.
    pub fn confirm_delete(&self, id: MachineId) -> Result<DeleteConfirmation> {
        let outcome = if !self.is_edit_mode() {
            Err(BoardError::validation("machines can only be deleted in edit mode"))
        } else {
            self.roster
                .get(id)
                .map(|m| DeleteConfirmation {
                    machine_id: id,
                    machine_name: m.name.clone(),
                })
                .ok_or_else(|| BoardError::validation(format!("machine {id} is not on this board")))
        };
        if let Err(e) = &outcome {
            self.report_failure("delete machine", e);
        }
        outcome
    }

    /// Second step of a deletion. The roster only changes once the backend
    /// confirms.
    pub fn delete_machine(&mut self, confirmation: DeleteConfirmation) {
        let machine_id = confirmation.machine_id;
        tracing::info!(machine_id = %machine_id, name = %confirmation.machine_name, "deleting machine");

        let api = Arc::clone(&self.api);
        let epoch = self.roster.epoch();
        self.spawn(async move {
            let result = api.delete_machine(machine_id).await;
            BoardMessage::MachineDeleted {
                epoch,
                machine_id,
                result,
            }
        });
    }

    // ── Stats ─────────────────────────────────────────────────────────────

    /// Rebuild the aggregate from a parallel fetch over the current roster.
    ///
    /// Counts are brought in line with the roster immediately; units and OEE
    /// follow when the fetch completes.
    pub fn recompute(&mut self) {
        self.stats.rebuild(&self.roster);
        let seq = self.stats.begin();
        let epoch = self.roster.epoch();
        let ids = self.roster.ids();
        let api = Arc::clone(&self.api);
        let window = self.config.stats_window;
        self.spawn(async move {
            let results = stats::fetch_all(api, ids, window).await;
            BoardMessage::StatsFetched { epoch, seq, results }
        });
    }

    /// Refresh the per-card cache if the roster changed size since the last
    /// refresh.
    pub fn refresh_display_stats(&mut self) {
        let len = self.roster.len();
        if !self.display.needs_refresh(len) {
            return;
        }
        let seq = self.display.mark_requested(len);

        let epoch = self.roster.epoch();
        let ids = self.roster.ids();
        let api = Arc::clone(&self.api);
        let window = self.config.stats_window;
        self.spawn(async move {
            let entries = stats::fetch_sequential(api, ids, window).await;
            BoardMessage::DisplayStatsFetched { epoch, seq, entries }
        });
    }

    // ── Layout ────────────────────────────────────────────────────────────

    /// Switch edit mode. Leaving it releases any card still under the
    /// pointer, which persists its position like a pointer-up.
    pub fn set_edit_mode(&mut self, on: bool) {
        if !on {
            self.pointer_up();
        }
        self.layout.set_edit_mode(on);
    }

    /// Flip edit mode and return the new value.
    pub fn toggle_edit_mode(&mut self) -> bool {
        let on = !self.layout.is_edit_mode();
        self.set_edit_mode(on);
        on
    }

    /// Press on a card. In edit mode this starts a drag; otherwise it is a
    /// click and yields a navigation request.
    pub fn pointer_down(&mut self, id: MachineId, pointer: Position, surface: &Surface) -> Option<Navigation> {
        match self.layout.pointer_down(id, pointer, surface) {
            PointerDown::Navigate(id) => Some(Navigation::MachineDetail(id)),
            PointerDown::DragStarted => {
                tracing::debug!(machine_id = %id, "drag started");
                None
            }
            PointerDown::Ignored => None,
        }
    }

    pub fn pointer_move(&mut self, pointer: Position, surface: &Surface) -> Option<Position> {
        self.layout.pointer_move(pointer, surface)
    }

    /// Release the pointer, persisting the dragged card's position.
    pub fn pointer_up(&mut self) {
        let Some((machine_id, position)) = self.layout.end_drag(&self.roster) else {
            return;
        };

        let api = Arc::clone(&self.api);
        let epoch = self.roster.epoch();
        self.spawn(async move {
            let result = api.update_machine_position(machine_id, position).await;
            BoardMessage::PositionSaved {
                epoch,
                machine_id,
                position,
                result,
            }
        });
    }

    /// The pointer left the surface; same as a release.
    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    /// Persist every drafted position concurrently.
    ///
    /// The batch succeeds or fails as a unit: one failed call reports the
    /// whole save as failed and keeps edit mode on.
    pub fn save_layout(&mut self) -> Result<()> {
        let batch = match self.layout.begin_save(&self.roster) {
            Ok(batch) => batch,
            Err(e) => {
                self.report_failure("save layout", &e);
                return Err(e);
            }
        };

        let api = Arc::clone(&self.api);
        let epoch = self.roster.epoch();
        self.spawn(async move {
            let api = &api;
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|(id, pos)| async move { api.update_machine_position(*id, *pos).await }),
            )
            .await;
            let result = outcomes.into_iter().collect::<Result<Vec<()>>>().map(|_| ());
            BoardMessage::LayoutSaved { epoch, batch, result }
        });
        Ok(())
    }

    /// Throw away unsaved drafts and leave edit mode.
    pub fn cancel_layout(&mut self) {
        self.layout.cancel();
    }

    // ── Navigation ────────────────────────────────────────────────────────

    /// Open a machine from outside the pointer path (keyboard). Only honoured
    /// outside edit mode.
    pub fn click_machine(&self, id: MachineId) -> Option<Navigation> {
        (!self.is_edit_mode() && self.roster.contains(id)).then_some(Navigation::MachineDetail(id))
    }

    pub fn back(&self) -> Navigation {
        Navigation::DepartmentList
    }

    // ── Inbox processing ──────────────────────────────────────────────────

    /// Handle every message already queued without waiting. Returns the
    /// number handled.
    pub fn try_process(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(msg) = self.rx.try_recv() {
            self.handle(msg);
            handled += 1;
        }
        handled
    }

    /// Wait for and handle one message.
    pub async fn process_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(msg) => {
                self.handle(msg);
                true
            }
            None => false,
        }
    }

    /// Process messages until no spawned operation is outstanding.
    pub async fn settle(&mut self) {
        loop {
            self.try_process();
            if self.in_flight == 0 {
                break;
            }
            if !self.process_next().await {
                break;
            }
        }
    }

    fn spawn<F>(&mut self, work: F)
    where
        F: Future<Output = BoardMessage> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(work.await);
        });
    }

    fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    /// Surface a failed user action. Rejected input is shown as is, write
    /// failures are prefixed with the action, and read failures are only
    /// logged.
    fn report_failure(&self, action: &'static str, e: &BoardError) {
        match e.kind() {
            ErrorKind::Validation => self.notify(Notice::error(e.to_string())),
            ErrorKind::Persist | ErrorKind::Other => {
                self.notify(Notice::error(format!("Failed to {action}: {e}")));
            }
            ErrorKind::Fetch => {
                tracing::warn!(action, error = %e, "read failure during user action");
            }
        }
    }

    fn is_current(&self, epoch: u64, what: &'static str) -> bool {
        let current = epoch == self.roster.epoch();
        if !current {
            tracing::debug!(what, epoch, current = self.roster.epoch(), "discarding result for replaced roster");
        }
        current
    }

    fn handle(&mut self, msg: BoardMessage) {
        if !matches!(msg, BoardMessage::Push(_)) {
            self.in_flight = self.in_flight.saturating_sub(1);
        }

        match msg {
            BoardMessage::Push(event) => self.handle_push(event),
            BoardMessage::StatsFetched { epoch, seq, results } => {
                if self.is_current(epoch, "stats") {
                    self.stats.complete(seq, &self.roster, results);
                }
            }
            BoardMessage::DisplayStatsFetched { epoch, seq, entries } => {
                if self.is_current(epoch, "card stats") {
                    self.display.apply(seq, &self.roster, entries);
                }
            }
            BoardMessage::MachineCreated { epoch, result } => self.on_created(epoch, result),
            BoardMessage::MachineDeleted {
                epoch,
                machine_id,
                result,
            } => self.on_deleted(epoch, machine_id, result),
            BoardMessage::PositionSaved {
                epoch,
                machine_id,
                position,
                result,
            } => self.on_position_saved(epoch, machine_id, position, result),
            BoardMessage::LayoutSaved { epoch, batch, result } => {
                self.on_layout_saved(epoch, batch, result)
            }
        }
    }

    fn handle_push(&mut self, event: PushEvent) {
        if !self.is_active() {
            tracing::trace!(event = event.kind().wire_name(), "push after deactivation dropped");
            return;
        }
        if self.load_state != LoadState::Ready {
            tracing::trace!(event = event.kind().wire_name(), "push while not loaded dropped");
            return;
        }
        match event {
            PushEvent::MachineState {
                machine_id,
                status,
                db_status,
            } => {
                self.apply_status_event(machine_id, status, db_status);
            }
            PushEvent::Production { machine_id } => {
                self.apply_production_event(machine_id);
            }
            PushEvent::StoppageAdded { machine_id } | PushEvent::UnclassifiedStoppage { machine_id } => {
                self.apply_stoppage_event(machine_id);
            }
        }
    }

    fn on_created(&mut self, epoch: u64, result: Result<Machine>) {
        match result {
            Ok(machine) => {
                if !self.is_current(epoch, "created machine") {
                    return;
                }
                tracing::info!(machine_id = %machine.id, name = %machine.name, "machine added");
                self.notify(Notice::success(format!("Machine \"{}\" added", machine.name)));
                self.layout.insert(&machine);
                self.roster.push(machine);
                self.recompute();
                self.refresh_display_stats();
            }
            Err(e) => {
                tracing::warn!(error = %e, "machine creation failed");
                self.report_failure("add machine", &e);
            }
        }
    }

    fn on_deleted(&mut self, epoch: u64, machine_id: MachineId, result: Result<()>) {
        if let Err(e) = result {
            tracing::warn!(machine_id = %machine_id, error = %e, "machine deletion failed");
            self.report_failure("delete machine", &e);
            return;
        }
        if !self.is_current(epoch, "deleted machine") {
            return;
        }

        let Some(machine) = self.roster.remove(machine_id) else {
            tracing::debug!(machine_id = %machine_id, "deleted machine already gone");
            return;
        };
        if self.layout.remove(machine_id) {
            tracing::debug!(machine_id = %machine_id, "drag ended by deletion");
        }
        self.display.remove(machine_id);
        self.notify(Notice::success(format!("Machine \"{}\" deleted", machine.name)));
        self.recompute();
        self.refresh_display_stats();
    }

    fn on_position_saved(&mut self, epoch: u64, machine_id: MachineId, position: Position, result: Result<()>) {
        match result {
            Ok(()) => {
                if !self.is_current(epoch, "position") {
                    return;
                }
                tracing::debug!(machine_id = %machine_id, x = position.x, y = position.y, "position saved");
                self.layout.mark_saved(machine_id, position);
                self.roster.set_position(machine_id, position);
            }
            Err(e) => {
                // The draft stays where the user dropped it.
                tracing::warn!(machine_id = %machine_id, error = %e, "position save failed");
                self.report_failure("save position", &e);
            }
        }
    }

    fn on_layout_saved(&mut self, epoch: u64, batch: Vec<(MachineId, Position)>, result: Result<()>) {
        if !self.is_current(epoch, "layout") {
            return;
        }
        match result {
            Ok(()) => {
                for (id, pos) in &batch {
                    self.roster.set_position(*id, *pos);
                }
                // Edit mode ends here; a card still being dragged is saved
                // on its own first.
                self.pointer_up();
                self.layout.finish_save(&batch, true);
                tracing::info!(machines = batch.len(), "layout saved");
                self.notify(Notice::success("Layout saved"));
            }
            Err(e) => {
                self.layout.finish_save(&batch, false);
                tracing::warn!(error = %e, "layout save failed");
                self.report_failure("save layout", &e);
            }
        }
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        self.deactivate();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
