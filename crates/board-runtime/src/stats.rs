//! Department statistics.
//!
//! Two independent consumers of the per-machine stats endpoint:
//!
//! - [`StatsAggregator`] rebuilds the [`DepartmentAggregate`] from a parallel
//!   fetch over the whole roster. A failed fetch only removes that machine
//!   from the unit/OEE figures. Running/stopped counts are rebuilt on every
//!   roster or status change without waiting for the fetch.
//! - [`DisplayStatsCache`] keeps per-card figures, refreshed sequentially
//!   whenever the roster changes size.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;

use board_core::models::{DepartmentAggregate, MachineId, MachineStats, StatsWindow};
use board_core::Result;
use board_data::api::BoardApi;

use crate::roster::Roster;

// ── Fetching ──────────────────────────────────────────────────────────────────

/// Fetch stats for every id concurrently.
///
/// Each result stands alone; one failure never cancels the others.
pub async fn fetch_all(
    api: Arc<dyn BoardApi>,
    ids: Vec<MachineId>,
    window: StatsWindow,
) -> Vec<(MachineId, Result<MachineStats>)> {
    let api = &api;
    join_all(
        ids.into_iter()
            .map(|id| async move { (id, api.get_machine_stats(id, window).await) }),
    )
    .await
}

/// Fetch stats one machine at a time, skipping failures.
pub async fn fetch_sequential(
    api: Arc<dyn BoardApi>,
    ids: Vec<MachineId>,
    window: StatsWindow,
) -> Vec<(MachineId, MachineStats)> {
    let mut fetched = Vec::with_capacity(ids.len());
    for id in ids {
        match api.get_machine_stats(id, window).await {
            Ok(stats) => fetched.push((id, stats)),
            Err(e) => {
                tracing::warn!(machine_id = %id, error = %e, "card stats unavailable");
            }
        }
    }
    fetched
}

// ── Aggregation ───────────────────────────────────────────────────────────────

/// Build the department aggregate from the roster and whatever stats arrived.
///
/// Every roster machine is binned as running or stopped by its displayed
/// status. Units and OEE only consider machines that returned stats and are
/// still in the roster; the OEE mean is taken over those machines alone.
pub fn aggregate(roster: &Roster, stats: &[(MachineId, MachineStats)]) -> DepartmentAggregate {
    let running = roster
        .machines()
        .iter()
        .filter(|m| roster.displayed_status_of(m).is_running())
        .count();

    let reporting: Vec<&MachineStats> = stats
        .iter()
        .filter(|(id, _)| roster.contains(*id))
        .map(|(_, s)| s)
        .collect();

    let total_units = reporting.iter().map(|s| s.total_units_produced).sum();
    let avg_oee = if reporting.is_empty() {
        0.0
    } else {
        reporting.iter().map(|s| s.oee).sum::<f64>() / reporting.len() as f64
    };

    DepartmentAggregate {
        total_units,
        avg_oee,
        running_machine_count: running,
        stopped_machine_count: roster.len() - running,
    }
}

// ── StatsAggregator ───────────────────────────────────────────────────────────

/// Owns the current aggregate and orders overlapping recomputations.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    aggregate: DepartmentAggregate,
    /// Per-machine stats from the last applied recomputation.
    reported: Vec<(MachineId, MachineStats)>,
    /// Sequence number handed to the most recent recomputation.
    requested: u64,
    /// Sequence number of the recomputation the aggregate came from.
    applied: u64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregate(&self) -> DepartmentAggregate {
        self.aggregate
    }

    /// Forget everything; used when a new snapshot replaces the roster.
    pub fn reset(&mut self) {
        *self = Self {
            requested: self.requested,
            applied: self.requested,
            ..Self::default()
        };
    }

    /// Replace the aggregate using the current roster and the stats last
    /// reported. Counts always match the roster after this.
    pub fn rebuild(&mut self, roster: &Roster) {
        self.aggregate = aggregate(roster, &self.reported);
    }

    /// Start a recomputation and return its sequence number.
    pub fn begin(&mut self) -> u64 {
        self.requested += 1;
        self.requested
    }

    /// Apply the results of recomputation `seq`.
    ///
    /// Results older than the last applied recomputation are discarded, since
    /// they describe a roster state that has already been superseded. Returns
    /// whether the aggregate was replaced.
    pub fn complete(
        &mut self,
        seq: u64,
        roster: &Roster,
        results: Vec<(MachineId, Result<MachineStats>)>,
    ) -> bool {
        if seq <= self.applied {
            tracing::debug!(seq, applied = self.applied, "discarding superseded stats");
            return false;
        }

        let mut ok = Vec::with_capacity(results.len());
        for (id, result) in results {
            match result {
                Ok(stats) => ok.push((id, stats)),
                Err(e) => {
                    tracing::debug!(machine_id = %id, error = %e, "excluding machine from aggregate");
                }
            }
        }

        self.reported = ok;
        self.rebuild(roster);
        self.applied = seq;
        true
    }
}

// ── DisplayStatsCache ─────────────────────────────────────────────────────────

/// Per-machine stats shown on each card.
#[derive(Debug, Default)]
pub struct DisplayStatsCache {
    entries: HashMap<MachineId, MachineStats>,
    /// Roster size at the last refresh request.
    refreshed_for: Option<usize>,
    requested: u64,
    applied: u64,
}

impl DisplayStatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: MachineId) -> Option<&MachineStats> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` when the roster size differs from the one last refreshed for.
    pub fn needs_refresh(&self, roster_len: usize) -> bool {
        self.refreshed_for != Some(roster_len)
    }

    /// Record a refresh for `roster_len` machines and return its sequence
    /// number.
    pub fn mark_requested(&mut self, roster_len: usize) -> u64 {
        self.refreshed_for = Some(roster_len);
        self.requested += 1;
        self.requested
    }

    /// Drop all entries and forget the last refresh size. Refreshes still
    /// outstanding will be discarded.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.refreshed_for = None;
        self.applied = self.requested;
    }

    pub fn remove(&mut self, id: MachineId) {
        self.entries.remove(&id);
    }

    /// Store the entries of refresh `seq` for machines still in the roster.
    /// Machines whose fetch failed keep whatever entry they had.
    ///
    /// A refresh older than the last one applied is discarded. Returns
    /// whether the entries were stored.
    pub fn apply(&mut self, seq: u64, roster: &Roster, fetched: Vec<(MachineId, MachineStats)>) -> bool {
        if seq <= self.applied {
            tracing::debug!(seq, applied = self.applied, "discarding superseded card stats");
            return false;
        }
        self.applied = seq;
        for (id, stats) in fetched {
            if roster.contains(id) {
                self.entries.insert(id, stats);
            }
        }
        self.entries.retain(|id, _| roster.contains(*id));
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use board_core::models::{Machine, MachineStatus};
    use board_core::BoardError;

    fn machine(id: u64, status: MachineStatus) -> Machine {
        Machine {
            id: MachineId(id),
            name: format!("M{id}"),
            description: None,
            status,
            position: None,
        }
    }

    fn stats(oee: f64, units: u64) -> MachineStats {
        MachineStats {
            oee,
            total_units_produced: units,
        }
    }

    fn four_machines() -> Roster {
        let mut r = Roster::new();
        r.replace(vec![
            machine(1, MachineStatus::Running),
            machine(2, MachineStatus::Running),
            machine(3, MachineStatus::Stoppage),
            machine(4, MachineStatus::Inactive),
        ]);
        r
    }

    #[test]
    fn test_avg_oee_excludes_failed_fetches() {
        let roster = four_machines();
        let agg = aggregate(
            &roster,
            &[
                (MachineId(1), stats(80.0, 100)),
                (MachineId(2), stats(60.0, 50)),
                (MachineId(3), stats(100.0, 25)),
            ],
        );
        assert!((agg.avg_oee - 80.0).abs() < 1e-9);
        assert_eq!(agg.total_units, 175);
    }

    #[test]
    fn test_avg_oee_zero_without_stats() {
        let roster = four_machines();
        let agg = aggregate(&roster, &[]);
        assert_eq!(agg.avg_oee, 0.0);
        assert_eq!(agg.total_units, 0);
        assert_eq!(agg.running_machine_count + agg.stopped_machine_count, 4);
    }

    #[test]
    fn test_counts_use_displayed_status() {
        let mut roster = four_machines();
        // Live value says machine 4 runs although the database still says inactive.
        roster.apply_status(MachineId(4), MachineStatus::Running, MachineStatus::Inactive);
        // And machine 1 has stopped.
        roster.apply_status(MachineId(1), MachineStatus::Stoppage, MachineStatus::Stoppage);

        let agg = aggregate(&roster, &[]);
        assert_eq!(agg.running_machine_count, 2);
        assert_eq!(agg.stopped_machine_count, 2);
    }

    #[test]
    fn test_stats_for_departed_machines_ignored() {
        let mut roster = four_machines();
        roster.remove(MachineId(2));
        let agg = aggregate(
            &roster,
            &[(MachineId(1), stats(50.0, 10)), (MachineId(2), stats(90.0, 999))],
        );
        assert_eq!(agg.total_units, 10);
        assert!((agg.avg_oee - 50.0).abs() < 1e-9);
        assert_eq!(agg.running_machine_count + agg.stopped_machine_count, 3);
    }

    #[test]
    fn test_empty_roster_aggregate() {
        let roster = Roster::new();
        assert_eq!(aggregate(&roster, &[]), DepartmentAggregate::default());
    }

    #[test]
    fn test_aggregator_discards_superseded_results() {
        let roster = four_machines();
        let mut agg = StatsAggregator::new();
        let first = agg.begin();
        let second = agg.begin();

        assert!(agg.complete(second, &roster, vec![(MachineId(1), Ok(stats(70.0, 7)))]));
        assert!(!agg.complete(first, &roster, vec![(MachineId(1), Ok(stats(10.0, 1)))]));
        assert_eq!(agg.aggregate().total_units, 7);
    }

    #[test]
    fn test_aggregator_isolates_failures() {
        let roster = four_machines();
        let mut agg = StatsAggregator::new();
        let seq = agg.begin();
        let results = vec![
            (MachineId(1), Ok(stats(80.0, 1))),
            (MachineId(2), Err(BoardError::fetch("stats for machine 2", "HTTP 500"))),
            (MachineId(3), Ok(stats(60.0, 1))),
            (MachineId(4), Ok(stats(100.0, 1))),
        ];
        assert!(agg.complete(seq, &roster, results));
        let a = agg.aggregate();
        assert!((a.avg_oee - 80.0).abs() < 1e-9);
        assert_eq!(a.total_units, 3);
    }

    #[test]
    fn test_aggregator_reset_rejects_pending() {
        let roster = four_machines();
        let mut agg = StatsAggregator::new();
        let seq = agg.begin();
        agg.reset();
        assert!(!agg.complete(seq, &roster, vec![]));
        let next = agg.begin();
        assert!(agg.complete(next, &roster, vec![]));
    }

    #[test]
    fn test_display_cache_refresh_tracking() {
        let mut cache = DisplayStatsCache::new();
        assert!(cache.needs_refresh(0));
        cache.mark_requested(4);
        assert!(!cache.needs_refresh(4));
        assert!(cache.needs_refresh(3));
        cache.clear();
        assert!(cache.needs_refresh(4));
    }

    #[test]
    fn test_aggregator_rebuild_tracks_roster_without_fetch() {
        let mut roster = four_machines();
        let mut agg = StatsAggregator::new();
        let seq = agg.begin();
        agg.complete(seq, &roster, vec![(MachineId(1), Ok(stats(80.0, 10))), (MachineId(2), Ok(stats(60.0, 5)))]);

        roster.remove(MachineId(2));
        roster.apply_status(MachineId(4), MachineStatus::Running, MachineStatus::Running);
        agg.rebuild(&roster);

        let a = agg.aggregate();
        assert_eq!(a.running_machine_count, 2);
        assert_eq!(a.stopped_machine_count, 1);
        // Machine 2's figures left with it.
        assert_eq!(a.total_units, 10);
        assert!((a.avg_oee - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregator_reset_forgets_reported_stats() {
        let roster = four_machines();
        let mut agg = StatsAggregator::new();
        let seq = agg.begin();
        agg.complete(seq, &roster, vec![(MachineId(1), Ok(stats(80.0, 10)))]);

        agg.reset();
        agg.rebuild(&roster);
        assert_eq!(agg.aggregate().total_units, 0);
        assert_eq!(agg.aggregate().running_machine_count, 2);
    }

    #[test]
    fn test_display_cache_discards_out_of_order_refresh() {
        let roster = four_machines();
        let mut cache = DisplayStatsCache::new();
        let older = cache.mark_requested(4);
        let newer = cache.mark_requested(5);

        assert!(cache.apply(newer, &roster, vec![(MachineId(1), stats(90.0, 9))]));
        assert!(!cache.apply(older, &roster, vec![(MachineId(1), stats(10.0, 1))]));
        assert_eq!(cache.get(MachineId(1)).unwrap().total_units_produced, 9);
    }

    #[test]
    fn test_display_cache_clear_rejects_pending() {
        let roster = four_machines();
        let mut cache = DisplayStatsCache::new();
        let seq = cache.mark_requested(4);
        cache.clear();
        assert!(!cache.apply(seq, &roster, vec![(MachineId(1), stats(50.0, 5))]));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_display_cache_keeps_stale_entries_on_failure() {
        let mut roster = four_machines();
        let mut cache = DisplayStatsCache::new();
        let seq = cache.mark_requested(4);
        cache.apply(seq, &roster, vec![(MachineId(1), stats(50.0, 5)), (MachineId(2), stats(40.0, 4))]);

        // Second refresh: machine 2's fetch failed, so only machine 1 comes back.
        let seq = cache.mark_requested(4);
        cache.apply(seq, &roster, vec![(MachineId(1), stats(55.0, 6))]);
        assert_eq!(cache.get(MachineId(1)).unwrap().total_units_produced, 6);
        assert_eq!(cache.get(MachineId(2)).unwrap().total_units_produced, 4);

        roster.remove(MachineId(2));
        let seq = cache.mark_requested(3);
        cache.apply(seq, &roster, vec![]);
        assert!(cache.get(MachineId(2)).is_none());
        assert_eq!(cache.len(), 1);
    }
}
