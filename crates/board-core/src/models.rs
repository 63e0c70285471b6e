use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BoardError, Result};

/// Server-assigned machine identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(pub u64);

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operating state of a machine as reported by the plant backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    /// Powered and producing.
    Running,
    /// Halted by a recorded stoppage.
    Stoppage,
    /// Flagged as stopped while the unit counter still advances.
    StoppedYetProducing,
    /// No signal / not in use.
    #[default]
    Inactive,
}

impl MachineStatus {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Wire spelling of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stoppage => "stoppage",
            Self::StoppedYetProducing => "stopped_yet_producing",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point in layout-surface units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One machine in a department roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Database-confirmed status.
    #[serde(default)]
    pub status: MachineStatus,
    /// Last persisted position; absent for machines never placed.
    #[serde(default)]
    pub position: Option<Position>,
}

impl Machine {
    /// Stored position, falling back to the origin when none was ever saved.
    pub fn stored_position(&self) -> Position {
        self.position.unwrap_or(Position::ORIGIN)
    }
}

/// Input for the create-machine call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: MachineStatus,
}

impl MachineDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Reject drafts the backend would refuse.
    ///
    /// The name must contain at least one non-whitespace character.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BoardError::validation("machine name must not be empty"));
        }
        Ok(())
    }
}

/// A department snapshot as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub machines: Vec<Machine>,
}

/// Rolling-window statistics for one machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStats {
    /// Overall equipment effectiveness, in percent.
    pub oee: f64,
    pub total_units_produced: u64,
}

/// Look-back window requested from the stats endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsWindow {
    #[default]
    #[serde(rename = "24h")]
    Last24Hours,
}

impl StatsWindow {
    pub fn as_query(self) -> &'static str {
        match self {
            Self::Last24Hours => "24h",
        }
    }
}

/// Department-level figures derived from the roster and per-machine stats.
///
/// Always rebuilt from scratch; never patched in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentAggregate {
    pub total_units: u64,
    pub avg_oee: f64,
    pub running_machine_count: usize,
    pub stopped_machine_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_status_serde_snake_case() {
        let json = serde_json::to_string(&MachineStatus::StoppedYetProducing).unwrap();
        assert_eq!(json, r#""stopped_yet_producing""#);
        let back: MachineStatus = serde_json::from_str(r#""stoppage""#).unwrap();
        assert_eq!(back, MachineStatus::Stoppage);
    }

    #[test]
    fn test_machine_status_default_is_inactive() {
        assert_eq!(MachineStatus::default(), MachineStatus::Inactive);
        assert!(!MachineStatus::Inactive.is_running());
        assert!(MachineStatus::Running.is_running());
    }

    #[test]
    fn test_machine_deserialize_missing_position() {
        let m: Machine =
            serde_json::from_str(r#"{"id": 4, "name": "Press 4", "status": "running"}"#).unwrap();
        assert_eq!(m.id, MachineId(4));
        assert!(m.position.is_none());
        assert_eq!(m.stored_position(), Position::ORIGIN);
        assert!(m.description.is_none());
    }

    #[test]
    fn test_machine_deserialize_null_position() {
        let m: Machine =
            serde_json::from_str(r#"{"id": 5, "name": "Lathe", "position": null}"#).unwrap();
        assert_eq!(m.stored_position(), Position::ORIGIN);
        assert_eq!(m.status, MachineStatus::Inactive);
    }

    #[test]
    fn test_machine_deserialize_with_position() {
        let m: Machine = serde_json::from_str(
            r#"{"id": 6, "name": "Mill", "status": "stoppage", "position": {"x": 120, "y": 40.5}}"#,
        )
        .unwrap();
        assert_eq!(m.stored_position(), Position::new(120.0, 40.5));
    }

    #[test]
    fn test_draft_validation() {
        assert!(MachineDraft::named("CNC 1").validate().is_ok());
        assert!(MachineDraft::named("").validate().is_err());
        assert!(MachineDraft::named("   ").validate().is_err());
    }

    #[test]
    fn test_draft_serializes_without_missing_description() {
        let json = serde_json::to_value(MachineDraft::named("Saw")).unwrap();
        assert_eq!(json["name"], "Saw");
        assert_eq!(json["status"], "inactive");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_stats_camel_case() {
        let stats: MachineStats =
            serde_json::from_str(r#"{"oee": 82.5, "totalUnitsProduced": 1200}"#).unwrap();
        assert_eq!(stats.total_units_produced, 1200);
        assert!((stats.oee - 82.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregate_default_is_zeroed() {
        let agg = DepartmentAggregate::default();
        assert_eq!(agg.total_units, 0);
        assert_eq!(agg.running_machine_count, 0);
        assert_eq!(agg.stopped_machine_count, 0);
        assert_eq!(agg.avg_oee, 0.0);
    }

    #[test]
    fn test_stats_window_query() {
        assert_eq!(StatsWindow::Last24Hours.as_query(), "24h");
    }
}
