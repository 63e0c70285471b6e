//! Canonical machine roster with its live-status overlay.
//!
//! The roster holds the database-confirmed view of a department's machines.
//! Push events may carry a transient live status ahead of the confirmed one;
//! that value lives in a separate overlay and wins on the read path
//! ([`Roster::displayed_status`]) while the roster's own field is updated on
//! the same event.

use std::collections::HashMap;

use board_core::models::{Machine, MachineId, MachineStatus, Position};

#[derive(Debug, Default)]
pub struct Roster {
    machines: Vec<Machine>,
    overlay: HashMap<MachineId, MachineStatus>,
    /// Bumped on every wholesale replacement; async results tagged with an
    /// older epoch belong to a roster that no longer exists.
    epoch: u64,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole roster with a fresh snapshot.
    ///
    /// Clears the overlay: live values refer to the previous snapshot.
    pub fn replace(&mut self, machines: Vec<Machine>) {
        self.machines = machines;
        self.overlay.clear();
        self.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn ids(&self) -> Vec<MachineId> {
        self.machines.iter().map(|m| m.id).collect()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn contains(&self, id: MachineId) -> bool {
        self.machines.iter().any(|m| m.id == id)
    }

    pub fn get(&self, id: MachineId) -> Option<&Machine> {
        self.machines.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: MachineId) -> Option<&mut Machine> {
        self.machines.iter_mut().find(|m| m.id == id)
    }

    /// Record a status push for `id`.
    ///
    /// Writes the live value to the overlay and the confirmed value to the
    /// roster entry in one step. Returns `false` (and changes nothing) when
    /// `id` is not in the roster.
    pub fn apply_status(&mut self, id: MachineId, live: MachineStatus, confirmed: MachineStatus) -> bool {
        let Some(machine) = self.get_mut(id) else {
            return false;
        };
        machine.status = confirmed;
        self.overlay.insert(id, live);
        true
    }

    /// Live overlay value for `id`, if a push has been received.
    pub fn live_status(&self, id: MachineId) -> Option<MachineStatus> {
        self.overlay.get(&id).copied()
    }

    /// Status to render for `id`: the overlay value when present, otherwise
    /// the roster's confirmed status. `None` for unknown machines.
    pub fn displayed_status(&self, id: MachineId) -> Option<MachineStatus> {
        self.get(id).map(|m| self.displayed_status_of(m))
    }

    /// Same precedence rule as [`Roster::displayed_status`] for a machine
    /// already in hand.
    pub fn displayed_status_of(&self, machine: &Machine) -> MachineStatus {
        self.live_status(machine.id).unwrap_or(machine.status)
    }

    pub fn push(&mut self, machine: Machine) {
        self.overlay.remove(&machine.id);
        self.machines.push(machine);
    }

    /// Remove `id` and its overlay entry.
    pub fn remove(&mut self, id: MachineId) -> Option<Machine> {
        let idx = self.machines.iter().position(|m| m.id == id)?;
        self.overlay.remove(&id);
        Some(self.machines.remove(idx))
    }

    /// Record a persisted position on the roster entry.
    pub fn set_position(&mut self, id: MachineId, position: Position) -> bool {
        match self.get_mut(id) {
            Some(machine) => {
                machine.position = Some(position);
                true
            }
            None => false,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(id: u64, status: MachineStatus) -> Machine {
        Machine {
            id: MachineId(id),
            name: format!("M{id}"),
            description: None,
            status,
            position: None,
        }
    }

    fn roster() -> Roster {
        let mut r = Roster::new();
        r.replace(vec![
            machine(1, MachineStatus::Running),
            machine(2, MachineStatus::Inactive),
        ]);
        r
    }

    #[test]
    fn test_replace_bumps_epoch_and_clears_overlay() {
        let mut r = roster();
        let epoch = r.epoch();
        r.apply_status(MachineId(1), MachineStatus::Stoppage, MachineStatus::Stoppage);
        assert!(r.live_status(MachineId(1)).is_some());

        r.replace(vec![machine(1, MachineStatus::Running)]);
        assert_eq!(r.epoch(), epoch + 1);
        assert!(r.live_status(MachineId(1)).is_none());
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_status_sequence_converges_to_last_event() {
        let mut r = roster();
        let events = [
            (MachineStatus::Stoppage, MachineStatus::Running),
            (MachineStatus::Running, MachineStatus::Stoppage),
            (MachineStatus::StoppedYetProducing, MachineStatus::Inactive),
        ];
        for (live, confirmed) in events {
            assert!(r.apply_status(MachineId(2), live, confirmed));
        }
        assert_eq!(r.live_status(MachineId(2)), Some(MachineStatus::StoppedYetProducing));
        assert_eq!(r.get(MachineId(2)).unwrap().status, MachineStatus::Inactive);
    }

    #[test]
    fn test_status_for_unknown_machine_is_dropped() {
        let mut r = roster();
        assert!(!r.apply_status(MachineId(99), MachineStatus::Running, MachineStatus::Running));
        assert!(r.live_status(MachineId(99)).is_none());
        assert_eq!(r.get(MachineId(1)).unwrap().status, MachineStatus::Running);
        assert_eq!(r.get(MachineId(2)).unwrap().status, MachineStatus::Inactive);
    }

    #[test]
    fn test_displayed_status_prefers_overlay() {
        let mut r = roster();
        assert_eq!(r.displayed_status(MachineId(1)), Some(MachineStatus::Running));

        r.apply_status(MachineId(1), MachineStatus::Stoppage, MachineStatus::Running);
        assert_eq!(r.displayed_status(MachineId(1)), Some(MachineStatus::Stoppage));
        assert_eq!(r.get(MachineId(1)).unwrap().status, MachineStatus::Running);
        assert_eq!(r.displayed_status(MachineId(42)), None);
    }

    #[test]
    fn test_remove_drops_overlay() {
        let mut r = roster();
        r.apply_status(MachineId(2), MachineStatus::Running, MachineStatus::Running);
        let removed = r.remove(MachineId(2)).unwrap();
        assert_eq!(removed.id, MachineId(2));
        assert!(!r.contains(MachineId(2)));
        assert!(r.live_status(MachineId(2)).is_none());
        assert!(r.remove(MachineId(2)).is_none());
    }

    #[test]
    fn test_push_and_set_position() {
        let mut r = roster();
        r.push(machine(3, MachineStatus::Inactive));
        assert_eq!(r.ids(), vec![MachineId(1), MachineId(2), MachineId(3)]);

        assert!(r.set_position(MachineId(3), Position::new(50.0, 60.0)));
        assert_eq!(r.get(MachineId(3)).unwrap().stored_position(), Position::new(50.0, 60.0));
        assert!(!r.set_position(MachineId(8), Position::ORIGIN));
    }
}
