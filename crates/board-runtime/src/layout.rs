//! Spatial layout editing.
//!
//! Each machine has a drafted position (what the surface shows) and a
//! last-saved position (what the backend holds). A single [`DragSession`]
//! slot tracks the card under the pointer; while it is occupied no other
//! card can be picked up.
//!
//! Per machine the state machine is `Idle → Dragging → Idle`. Releasing the
//! pointer yields the position to persist for that one machine; a bulk
//! layout save persists every draft still backed by a roster entry.

use std::collections::HashMap;

use board_core::models::{Machine, MachineId, Position};
use board_core::{BoardError, Result};

use crate::roster::Roster;

// ── Geometry ──────────────────────────────────────────────────────────────────

/// Fixed card footprint and the margin kept from the surface edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardGeometry {
    pub footprint: f64,
    pub margin: f64,
}

impl Default for CardGeometry {
    fn default() -> Self {
        Self {
            footprint: 200.0,
            margin: 10.0,
        }
    }
}

/// Bounding box of the layout surface, in the same coordinate space as
/// pointer events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Surface {
    /// A surface anchored at the origin.
    pub fn sized(width: f64, height: f64) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    /// Convert a pointer position into surface-local coordinates.
    pub fn to_local(&self, pointer: Position) -> Position {
        Position::new(pointer.x - self.left, pointer.y - self.top)
    }
}

impl CardGeometry {
    /// Clamp `raw` so the whole card stays on `surface`.
    ///
    /// `x ∈ [margin, width − footprint − margin]`, likewise for `y`. When the
    /// surface is too small for a card the lower bound wins.
    pub fn clamp(&self, raw: Position, surface: &Surface) -> Position {
        let lo = self.margin;
        let max_x = surface.width - self.footprint - self.margin;
        let max_y = surface.height - self.footprint - self.margin;
        Position::new(raw.x.min(max_x).max(lo), raw.y.min(max_y).max(lo))
    }
}

// ── Drag session ──────────────────────────────────────────────────────────────

/// The one card currently following the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub machine_id: MachineId,
    /// Pointer position minus the card's drafted position at grab time.
    pub pointer_offset: Position,
}

/// Result of a pointer-down on a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerDown {
    /// Edit mode is on and the card is now being dragged.
    DragStarted,
    /// Edit mode is off: a press is a click that opens the machine.
    Navigate(MachineId),
    /// Unknown card, or a drag is already active.
    Ignored,
}

// ── LayoutEngine ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct LayoutEngine {
    geometry: CardGeometry,
    edit_mode: bool,
    drafts: HashMap<MachineId, Position>,
    saved: HashMap<MachineId, Position>,
    drag: Option<DragSession>,
    /// A bulk save is awaiting its result.
    saving: bool,
}

impl LayoutEngine {
    pub fn new(geometry: CardGeometry) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    pub fn geometry(&self) -> CardGeometry {
        self.geometry
    }

    /// Reset to the positions stored in a fresh snapshot.
    pub fn seed(&mut self, machines: &[Machine]) {
        self.drafts = machines.iter().map(|m| (m.id, m.stored_position())).collect();
        self.saved = self.drafts.clone();
        self.drag = None;
        self.saving = false;
    }

    /// Start tracking a newly added machine.
    pub fn insert(&mut self, machine: &Machine) {
        let pos = machine.stored_position();
        self.drafts.insert(machine.id, pos);
        self.saved.insert(machine.id, pos);
    }

    /// Forget `id`. Returns `true` when this terminated an active drag.
    pub fn remove(&mut self, id: MachineId) -> bool {
        self.drafts.remove(&id);
        self.saved.remove(&id);
        match self.drag {
            Some(d) if d.machine_id == id => {
                self.drag = None;
                true
            }
            _ => false,
        }
    }

    pub fn position(&self, id: MachineId) -> Option<Position> {
        self.drafts.get(&id).copied()
    }

    pub fn saved_position(&self, id: MachineId) -> Option<Position> {
        self.saved.get(&id).copied()
    }

    pub fn drafts(&self) -> &HashMap<MachineId, Position> {
        &self.drafts
    }

    pub fn drag(&self) -> Option<DragSession> {
        self.drag
    }

    pub fn is_edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Switch edit mode. Leaving edit mode drops any active drag without
    /// persisting it.
    pub fn set_edit_mode(&mut self, on: bool) {
        self.edit_mode = on;
        if !on {
            self.drag = None;
        }
    }

    // ── Pointer ───────────────────────────────────────────────────────────

    pub fn pointer_down(&mut self, id: MachineId, pointer: Position, surface: &Surface) -> PointerDown {
        let Some(current) = self.position(id) else {
            return PointerDown::Ignored;
        };
        if !self.edit_mode {
            return PointerDown::Navigate(id);
        }
        if self.drag.is_some() {
            return PointerDown::Ignored;
        }

        let local = surface.to_local(pointer);
        self.drag = Some(DragSession {
            machine_id: id,
            pointer_offset: Position::new(local.x - current.x, local.y - current.y),
        });
        PointerDown::DragStarted
    }

    /// Move the dragged card so the grab point follows the pointer.
    ///
    /// Returns the new clamped position, or `None` when nothing is dragged.
    pub fn pointer_move(&mut self, pointer: Position, surface: &Surface) -> Option<Position> {
        let drag = self.drag?;
        let local = surface.to_local(pointer);
        let raw = Position::new(
            local.x - drag.pointer_offset.x,
            local.y - drag.pointer_offset.y,
        );
        let clamped = self.geometry.clamp(raw, surface);
        self.drafts.insert(drag.machine_id, clamped);
        Some(clamped)
    }

    /// End the active drag (pointer up or pointer leaving the surface).
    ///
    /// Returns the machine and drafted position to persist, or `None` when
    /// nothing was dragged or the machine has left the roster meanwhile.
    pub fn end_drag(&mut self, roster: &Roster) -> Option<(MachineId, Position)> {
        let drag = self.drag.take()?;
        if !roster.contains(drag.machine_id) {
            self.drafts.remove(&drag.machine_id);
            return None;
        }
        self.position(drag.machine_id).map(|p| (drag.machine_id, p))
    }

    // ── Persistence bookkeeping ───────────────────────────────────────────

    /// Record a confirmed save of `id` at `position`.
    pub fn mark_saved(&mut self, id: MachineId, position: Position) {
        if self.drafts.contains_key(&id) {
            self.saved.insert(id, position);
        }
    }

    /// Collect the positions a bulk layout save should persist.
    ///
    /// Requires edit mode and no save already in flight. Entries without a
    /// roster counterpart are pruned rather than sent.
    pub fn begin_save(&mut self, roster: &Roster) -> Result<Vec<(MachineId, Position)>> {
        if !self.edit_mode {
            return Err(BoardError::validation("layout can only be saved in edit mode"));
        }
        if self.saving {
            return Err(BoardError::validation("a layout save is already in progress"));
        }

        self.drafts.retain(|id, _| roster.contains(*id));
        self.saved.retain(|id, _| roster.contains(*id));

        let mut batch: Vec<(MachineId, Position)> =
            self.drafts.iter().map(|(id, p)| (*id, *p)).collect();
        batch.sort_by_key(|(id, _)| *id);
        self.saving = true;
        Ok(batch)
    }

    /// Conclude a bulk save. On success the batch becomes the saved layout
    /// and edit mode ends; on failure nothing changes but the in-flight flag.
    pub fn finish_save(&mut self, batch: &[(MachineId, Position)], succeeded: bool) {
        self.saving = false;
        if !succeeded {
            return;
        }
        for (id, pos) in batch {
            self.mark_saved(*id, *pos);
        }
        self.set_edit_mode(false);
    }

    /// Revert every draft to its last-saved position and leave edit mode.
    pub fn cancel(&mut self) {
        self.drafts = self.saved.clone();
        self.set_edit_mode(false);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
