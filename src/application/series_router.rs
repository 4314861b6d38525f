// Series router - Maps records onto windowed series buffers and publishes snapshots
use crate::domain::dashboard::{DashboardSnapshot, SeriesBuffer, SeriesConfig, SeriesSnapshot};
use crate::domain::error::DashboardError;
use crate::domain::telemetry::{Batch, DataPoint};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::watch;

pub const DEFAULT_CAPACITY: usize = 10;

/// How a point without a batch target is assigned to a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingPolicy {
    /// Match the point's key against series keys and titles.
    #[default]
    Keyed,
    /// Ignore keys; the i-th routed point goes to series `i mod count`.
    RoundRobin,
    /// Every series receives every point.
    Broadcast,
}

struct RouterState {
    roster: Vec<SeriesConfig>,
    policy: RoutingPolicy,
    capacity: usize,
    counter: u64,
    buffers: HashMap<String, SeriesBuffer>,
    revision: u64,
}

impl RouterState {
    fn resolve_key(&self, key: Option<&str>) -> Result<usize, DashboardError> {
        key.and_then(|k| self.roster.iter().position(|c| c.matches(k)))
            .ok_or_else(|| DashboardError::unroutable(key))
    }

    fn targets(&mut self, point: &DataPoint) -> Result<Vec<usize>, DashboardError> {
        if self.roster.is_empty() {
            return Err(DashboardError::unroutable(point.series_key.as_deref()));
        }
        match self.policy {
            RoutingPolicy::Keyed => self
                .resolve_key(point.series_key.as_deref())
                .map(|idx| vec![idx]),
            RoutingPolicy::RoundRobin => {
                let idx = (self.counter % self.roster.len() as u64) as usize;
                self.counter += 1;
                Ok(vec![idx])
            }
            RoutingPolicy::Broadcast => Ok((0..self.roster.len()).collect()),
        }
    }

    fn buffer_mut(&mut self, idx: usize) -> &mut SeriesBuffer {
        let key = &self.roster[idx].series_key;
        self.buffers
            .entry(key.clone())
            .or_insert_with(|| SeriesBuffer::new(key.clone()))
    }

    fn snapshot_of(&self, config: &SeriesConfig) -> Option<SeriesSnapshot> {
        self.buffers
            .get(&config.series_key)
            .map(|buffer| SeriesSnapshot::capture(config, buffer))
    }

    fn dashboard_snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            revision: self.revision,
            capacity: self.capacity,
            series: self
                .roster
                .iter()
                .filter_map(|config| self.snapshot_of(config))
                .collect(),
        }
    }
}

/// Owner of every series buffer.
///
/// Buffers are only mutated inside `route`, `route_batch` and
/// `set_capacity`, each under a single lock acquisition that also publishes
/// the resulting snapshot, so no reader ever sees a buffer longer than the
/// window. Readers only ever get copies.
#[derive(Clone)]
pub struct SeriesRouter {
    state: Arc<Mutex<RouterState>>,
    notifier: Arc<watch::Sender<Arc<DashboardSnapshot>>>,
}

impl SeriesRouter {
    pub fn new(
        roster: Vec<SeriesConfig>,
        policy: RoutingPolicy,
        capacity: usize,
    ) -> Result<Self, DashboardError> {
        if capacity == 0 {
            return Err(DashboardError::InvalidCapacity(capacity));
        }

        let state = RouterState {
            roster,
            policy,
            capacity,
            counter: 0,
            buffers: HashMap::new(),
            revision: 0,
        };
        let (notifier, _) = watch::channel(Arc::new(state.dashboard_snapshot()));

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            notifier: Arc::new(notifier),
        })
    }

    /// Routes a point into the window using the configured capacity.
    pub fn route(&self, point: &DataPoint) -> Result<Vec<String>, DashboardError> {
        let mut state = self.state.lock();
        let capacity = state.capacity;
        self.route_locked(&mut state, point, capacity)
    }

    /// Appends the point to its target series and trims each to `capacity`.
    /// Returns the keys of the series that received it.
    pub fn route_with_capacity(
        &self,
        point: &DataPoint,
        capacity: usize,
    ) -> Result<Vec<String>, DashboardError> {
        if capacity == 0 {
            return Err(DashboardError::InvalidCapacity(capacity));
        }

        let mut state = self.state.lock();
        self.route_locked(&mut state, point, capacity)
    }

    fn route_locked(
        &self,
        state: &mut RouterState,
        point: &DataPoint,
        capacity: usize,
    ) -> Result<Vec<String>, DashboardError> {
        let targets = state.targets(point)?;

        let mut routed = Vec::with_capacity(targets.len());
        for idx in targets {
            let buffer = state.buffer_mut(idx);
            let evicted = buffer.push_windowed(point.time.clone(), point.value, capacity);
            if evicted > 0 {
                tracing::trace!(series = %buffer.series_key, evicted, "window trimmed");
            }
            routed.push(buffer.series_key.clone());
        }

        self.commit(state);
        Ok(routed)
    }

    /// Replaces the whole content of the series matching `series_key`.
    pub fn route_batch(&self, series_key: &str, batch: &Batch) -> Result<(), DashboardError> {
        let mut state = self.state.lock();
        let idx = state.resolve_key(Some(series_key))?;

        state.buffer_mut(idx).replace(
            batch
                .records
                .iter()
                .map(|record| (record.name.clone(), record.value)),
        );

        self.commit(&mut state);
        Ok(())
    }

    pub fn get_snapshot(&self, series_key: &str) -> Option<SeriesSnapshot> {
        let state = self.state.lock();
        let config = state.roster.iter().find(|c| c.series_key == series_key)?;
        state.snapshot_of(config)
    }

    pub fn get_all_snapshots(&self) -> BTreeMap<String, SeriesSnapshot> {
        let state = self.state.lock();
        state
            .roster
            .iter()
            .filter_map(|config| state.snapshot_of(config))
            .map(|snapshot| (snapshot.series_key.clone(), snapshot))
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.state.lock().policy
    }

    /// Changes the window and immediately trims existing buffers down to it.
    /// Growing the window never adds data.
    pub fn set_capacity(&self, capacity: usize) -> Result<(), DashboardError> {
        if capacity == 0 {
            return Err(DashboardError::InvalidCapacity(capacity));
        }

        let mut state = self.state.lock();
        let previous = state.capacity;
        state.capacity = capacity;
        let evicted: usize = state
            .buffers
            .values_mut()
            .map(|buffer| buffer.trim(capacity))
            .sum();

        tracing::info!(previous, capacity, evicted, "window capacity changed");
        if previous != capacity || evicted > 0 {
            self.commit(&mut state);
        }
        Ok(())
    }

    /// Receiver of the latest snapshot; notifications may coalesce but the
    /// final state is always observable.
    pub fn watch(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.notifier.subscribe()
    }

    fn commit(&self, state: &mut RouterState) {
        state.revision += 1;
        self.notifier
            .send_replace(Arc::new(state.dashboard_snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dashboard::ChartKind;
    use crate::domain::telemetry::BatchRecord;

    fn series(key: &str, kind: ChartKind) -> SeriesConfig {
        SeriesConfig::new(key, kind, format!("{} chart", key), "#333333")
    }

    fn router(keys: &[&str], policy: RoutingPolicy, capacity: usize) -> SeriesRouter {
        let roster = keys.iter().map(|k| series(k, ChartKind::Line)).collect();
        SeriesRouter::new(roster, policy, capacity).unwrap()
    }

    fn batch(pairs: &[(&str, f64)]) -> Batch {
        pairs
            .iter()
            .map(|(name, value)| BatchRecord::new(*name, *value))
            .collect()
    }

    #[test]
    fn test_window_keeps_last_values() {
        let router = router(&["A"], RoutingPolicy::Keyed, 3);
        for v in 1..=5 {
            router
                .route(&DataPoint::keyed(format!("t{}", v), v as f64, "A"))
                .unwrap();
        }

        let snapshot = router.get_snapshot("A").unwrap();
        assert_eq!(snapshot.ys, vec![3.0, 4.0, 5.0]);
        assert_eq!(snapshot.xs, vec!["t3", "t4", "t5"]);
    }

    #[test]
    fn test_window_length_is_min_of_count_and_capacity() {
        for count in [0usize, 1, 4, 10, 11, 37] {
            let router = router(&["A"], RoutingPolicy::Keyed, 10);
            for i in 0..count {
                router
                    .route(&DataPoint::keyed(i.to_string(), i as f64, "A"))
                    .unwrap();
            }

            let len = router.get_snapshot("A").map(|s| s.xs.len()).unwrap_or(0);
            assert_eq!(len, count.min(10));
            if let Some(snapshot) = router.get_snapshot("A") {
                assert_eq!(snapshot.xs.len(), snapshot.ys.len());
                let expected: Vec<f64> = (count.saturating_sub(10)..count).map(|i| i as f64).collect();
                assert_eq!(snapshot.ys, expected);
            }
        }
    }

    #[test]
    fn test_keyed_matches_title_too() {
        let router = router(&["cpu"], RoutingPolicy::Keyed, 10);
        let routed = router
            .route(&DataPoint::keyed("t0", 1.0, "cpu chart"))
            .unwrap();
        assert_eq!(routed, vec!["cpu"]);
    }

    #[test]
    fn test_keyed_drops_unknown_and_unkeyed() {
        let router = router(&["A"], RoutingPolicy::Keyed, 10);

        let err = router.route(&DataPoint::keyed("t0", 1.0, "B")).unwrap_err();
        assert!(matches!(err, DashboardError::UnroutableRecord { key: Some(ref k) } if k == "B"));
        let err = router.route(&DataPoint::new("t0", 1.0)).unwrap_err();
        assert!(matches!(err, DashboardError::UnroutableRecord { key: None }));

        assert!(router.get_all_snapshots().is_empty());
    }

    #[test]
    fn test_round_robin_alternates() {
        let router = router(&["A", "B"], RoutingPolicy::RoundRobin, 10);
        let assigned: Vec<String> = (0..5)
            .map(|i| router.route(&DataPoint::new(i.to_string(), i as f64)).unwrap())
            .map(|mut keys| keys.remove(0))
            .collect();

        assert_eq!(assigned, vec!["A", "B", "A", "B", "A"]);
        assert_eq!(router.get_snapshot("A").unwrap().ys, vec![0.0, 2.0, 4.0]);
        assert_eq!(router.get_snapshot("B").unwrap().ys, vec![1.0, 3.0]);
    }

    #[test]
    fn test_round_robin_is_reproducible() {
        let run = || {
            let router = router(&["A", "B", "C"], RoutingPolicy::RoundRobin, 100);
            (0..20)
                .map(|i| {
                    let keyed = DataPoint::keyed(i.to_string(), i as f64, "C");
                    router.route(&keyed).unwrap().remove(0)
                })
                .collect::<Vec<_>>()
        };

        let first = run();
        assert_eq!(first, run());
        for (i, key) in first.iter().enumerate() {
            assert_eq!(key, ["A", "B", "C"][i % 3]);
        }
    }

    #[test]
    fn test_broadcast_reaches_every_series() {
        let router = router(&["line", "bar"], RoutingPolicy::Broadcast, 10);
        let routed = router.route(&DataPoint::new("t0", 5.0)).unwrap();

        assert_eq!(routed, vec!["line", "bar"]);
        assert_eq!(router.get_snapshot("line").unwrap().ys, vec![5.0]);
        assert_eq!(router.get_snapshot("bar").unwrap().ys, vec![5.0]);
    }

    #[test]
    fn test_empty_roster_is_unroutable() {
        let router = router(&[], RoutingPolicy::RoundRobin, 10);
        assert!(router.route(&DataPoint::new("t0", 1.0)).is_err());
        assert!(router.route_batch("pie", &batch(&[("x", 1.0)])).is_err());
    }

    #[test]
    fn test_batch_replaces_wholesale() {
        let roster = vec![series("pie", ChartKind::Pie)];
        let router = SeriesRouter::new(roster, RoutingPolicy::Keyed, 10).unwrap();

        router
            .route_batch("pie", &batch(&[("x", 1.0), ("y", 2.0)]))
            .unwrap();
        router.route_batch("pie", &batch(&[("z", 9.0)])).unwrap();

        let snapshot = router.get_snapshot("pie").unwrap();
        assert_eq!(snapshot.xs, vec!["z"]);
        assert_eq!(snapshot.ys, vec![9.0]);
    }

    #[test]
    fn test_batch_overrides_point_history() {
        let router = router(&["A"], RoutingPolicy::Keyed, 3);
        for v in 0..3 {
            router.route(&DataPoint::keyed("t", v as f64, "A")).unwrap();
        }

        let large = batch(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)]);
        router.route_batch("A", &large).unwrap();

        let snapshot = router.get_snapshot("A").unwrap();
        assert_eq!(snapshot.xs, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(snapshot.ys, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_snapshot_reads_are_idempotent() {
        let router = router(&["A"], RoutingPolicy::Keyed, 10);
        router.route(&DataPoint::keyed("t0", 1.0, "A")).unwrap();

        let revision = router.watch().borrow().revision;
        assert_eq!(router.get_snapshot("A"), router.get_snapshot("A"));
        assert_eq!(router.get_all_snapshots(), router.get_all_snapshots());
        assert_eq!(router.watch().borrow().revision, revision);
    }

    #[test]
    fn test_shrinking_capacity_retrims() {
        let router = router(&["A", "B"], RoutingPolicy::Keyed, 10);
        for v in 0..8 {
            router.route(&DataPoint::keyed("t", v as f64, "A")).unwrap();
        }
        router.route(&DataPoint::keyed("t", 1.0, "B")).unwrap();

        router.set_capacity(3).unwrap();
        assert_eq!(router.get_snapshot("A").unwrap().ys, vec![5.0, 6.0, 7.0]);
        assert_eq!(router.get_snapshot("B").unwrap().ys, vec![1.0]);

        router.set_capacity(20).unwrap();
        assert_eq!(router.get_snapshot("A").unwrap().ys.len(), 3);
        assert_eq!(router.capacity(), 20);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            SeriesRouter::new(Vec::new(), RoutingPolicy::Keyed, 0),
            Err(DashboardError::InvalidCapacity(0))
        ));
        let router = router(&["A"], RoutingPolicy::Keyed, 5);
        assert!(router.set_capacity(0).is_err());
        assert_eq!(router.capacity(), 5);
    }

    #[test]
    fn test_route_with_zero_capacity_rejected() {
        let router = router(&["A"], RoutingPolicy::Keyed, 5);
        router.route(&DataPoint::keyed("t0", 1.0, "A")).unwrap();

        let err = router
            .route_with_capacity(&DataPoint::keyed("t1", 2.0, "A"), 0)
            .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidCapacity(0)));
        assert_eq!(router.get_snapshot("A").unwrap().ys, vec![1.0]);
    }

    #[test]
    fn test_window_never_exceeds_capacity_under_concurrent_resize() {
        let router = router(&["A"], RoutingPolicy::Keyed, 10);
        for v in 0..10 {
            router.route(&DataPoint::keyed("t", v as f64, "A")).unwrap();
        }

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let router = router.clone();
                std::thread::spawn(move || {
                    let rx = router.watch();
                    for v in 0..500 {
                        router.route(&DataPoint::keyed("t", v as f64, "A")).unwrap();
                        let snapshot = rx.borrow().clone();
                        for series in &snapshot.series {
                            assert!(series.ys.len() <= snapshot.capacity);
                        }
                    }
                })
            })
            .collect();

        for round in 0..200 {
            let capacity = if round % 2 == 0 { 3 } else { 10 };
            router.set_capacity(capacity).unwrap();
        }
        router.set_capacity(3).unwrap();
        for writer in writers {
            writer.join().unwrap();
        }

        let latest = router.watch().borrow().clone();
        assert_eq!(latest.capacity, 3);
        assert!(router.get_snapshot("A").unwrap().ys.len() <= 3);
    }

    #[test]
    fn test_notifies_once_per_route() {
        let router = router(&["A"], RoutingPolicy::Keyed, 2);
        let rx = router.watch();
        assert_eq!(rx.borrow().revision, 0);

        router.route(&DataPoint::keyed("t0", 1.0, "A")).unwrap();
        router.route(&DataPoint::keyed("t1", 2.0, "A")).unwrap();
        let _ = router.route(&DataPoint::keyed("t2", 3.0, "missing"));
        router.route(&DataPoint::keyed("t3", 4.0, "A")).unwrap();

        let latest = rx.borrow().clone();
        assert_eq!(latest.revision, 3);
        assert_eq!(latest.series[0].ys, vec![2.0, 4.0]);
    }

    #[tokio::test]
    async fn test_watch_observes_final_state() {
        let router = router(&["A"], RoutingPolicy::Keyed, 10);
        let mut rx = router.watch();

        let writer = router.clone();
        tokio::spawn(async move {
            for v in 0..5 {
                writer.route(&DataPoint::keyed("t", v as f64, "A")).unwrap();
            }
        });

        loop {
            rx.changed().await.unwrap();
            if rx.borrow_and_update().revision == 5 {
                break;
            }
        }
        assert_eq!(router.get_snapshot("A").unwrap().ys.len(), 5);
    }
}
