use crate::errors::{ModelError, Result};
use std::collections::VecDeque;

/// Hydrologic confidence bound. Each reach carries one slope and one
/// floodplain-thickness value per scenario; the three trajectories evolve
/// independently from the same base geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Low,
    Mid,
    High,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Low, Scenario::Mid, Scenario::High];

    pub fn index(self) -> usize {
        match self {
            Scenario::Low => 0,
            Scenario::Mid => 1,
            Scenario::High => 2,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Scenario::Low => "min",
            Scenario::Mid => "mid",
            Scenario::High => "max",
        }
    }
}

/// One value per scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Triplet {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

impl Triplet {
    pub fn splat(v: f64) -> Self {
        Triplet {
            low: v,
            mid: v,
            high: v,
        }
    }

    pub fn get(&self, s: Scenario) -> f64 {
        match s {
            Scenario::Low => self.low,
            Scenario::Mid => self.mid,
            Scenario::High => self.high,
        }
    }

    pub fn set(&mut self, s: Scenario, v: f64) {
        match s {
            Scenario::Low => self.low = v,
            Scenario::Mid => self.mid = v,
            Scenario::High => self.high = v,
        }
    }
}

/// Disturbance window and the sediment regime it imposes.
#[derive(Debug, Clone, Copy)]
pub struct Disturbance {
    /// First and last simulation day of the disturbance window.
    pub start: usize,
    pub end: usize,
    /// Median grain size of disturbance-derived fine sediment (mm).
    pub d50: f64,
    /// Gamma parameters for denudation draws while the window is open.
    pub gamma_shape: f64,
    pub gamma_scale: f64,
}

// Network node representing one channel segment
#[derive(Debug, Clone)]
pub struct Reach {
    /// Dense index within the network.
    pub id: usize,
    /// Key of the source feature in the network dataset.
    pub feature_id: i64,
    /// Hierarchical reach label, e.g. "1.1".
    pub label: String,
    pub downstream: Option<usize>,
    pub upstream: Vec<usize>,
    pub length_m: f64,
    /// Bankfull width (m).
    pub width_bf: f64,
    pub sinuosity: f64,
    /// Total upstream drainage area (km^2).
    pub drain_area: f64,
    /// Drainage area adjusted for upstream regulation (km^2).
    pub eff_da: f64,
    /// Area draining directly to this reach (km^2).
    pub direct_da: f64,
    /// Floodplain surface area (m^2); zero for fully confined reaches.
    pub fp_area: f64,
    /// Bed-material grain size percentiles (mm).
    pub d_mid: f64,
    pub d_low: f64,
    pub d_high: f64,
    /// Confinement factor: 0 unconfined, 1 confined.
    pub confine: f64,
    pub confluence: bool,
    pub disturbance: Option<Disturbance>,
    /// Gamma parameters for ambient denudation draws.
    pub gamma_shape: f64,
    pub gamma_scale: f64,
    /// Critical discharge for floodplain erosion, per scenario (m^3/s).
    pub qc: Triplet,
    // dynamic state
    pub slope: Triplet,
    /// Floodplain sediment thickness (m).
    pub fp_thickness: Triplet,
    /// Today's denudation-rate draw (mm/yr).
    pub denude: f64,
}

impl Reach {
    /// True once the disturbance window has opened; the sediment-pulse ledger
    /// stays live from then on even after the window closes.
    pub fn disturbance_started(&self, day: usize) -> bool {
        matches!(&self.disturbance, Some(d) if day >= d.start)
    }

    /// True only while the window is open; gates the denudation regime.
    pub fn disturbance_active(&self, day: usize) -> bool {
        matches!(&self.disturbance, Some(d) if day >= d.start && day <= d.end)
    }
}

impl Default for Reach {
    fn default() -> Self {
        Reach {
            id: 0,
            feature_id: 0,
            label: String::new(),
            downstream: None,
            upstream: Vec::new(),
            length_m: 1000.0,
            width_bf: 10.0,
            sinuosity: 1.0,
            drain_area: 10.0,
            eff_da: 10.0,
            direct_da: 1.0,
            fp_area: 0.0,
            d_mid: 50.0,
            d_low: 30.0,
            d_high: 80.0,
            confine: 1.0,
            confluence: false,
            disturbance: None,
            gamma_shape: 2.0,
            gamma_scale: 0.3,
            qc: Triplet::splat(10.0),
            slope: Triplet::splat(0.01),
            fp_thickness: Triplet::default(),
            denude: 0.0,
        }
    }
}

// Network topology
#[derive(Debug, Clone)]
pub struct NetworkTopology {
    pub reaches: Vec<Reach>,
    /// Dependency-respecting evaluation order, computed once and reused every
    /// simulated day.
    pub order: Vec<usize>,
    all_upstream: Vec<Vec<usize>>,
    all_downstream: Vec<Vec<usize>>,
}

impl NetworkTopology {
    /// Builds the topology index from reaches whose `downstream` links are
    /// already resolved to dense indices. Fills upstream connections, computes
    /// the evaluation order, and precomputes the upstream/downstream closures.
    pub fn from_reaches(mut reaches: Vec<Reach>) -> Result<Self> {
        build_upstream_connections(&mut reaches);

        for reach in &reaches {
            if reach.upstream.len() > 2 {
                return Err(ModelError::TooManyUpstream {
                    segment: reach.feature_id,
                    count: reach.upstream.len(),
                });
            }
        }

        let order = topological_sort(&reaches)?;
        let all_upstream = upstream_closure(&reaches, &order);
        let all_downstream = downstream_closure(&reaches);

        Ok(NetworkTopology {
            reaches,
            order,
            all_upstream,
            all_downstream,
        })
    }

    pub fn len(&self) -> usize {
        self.reaches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reaches.is_empty()
    }

    /// Immediate upstream segments as an (first, second) pair; headwaters get
    /// (None, None), ordinary links (Some, None), confluences (Some, Some).
    pub fn upstream_pair(&self, id: usize) -> (Option<usize>, Option<usize>) {
        let ups = &self.reaches[id].upstream;
        (ups.first().copied(), ups.get(1).copied())
    }

    pub fn next_downstream(&self, id: usize) -> Option<usize> {
        self.reaches[id].downstream
    }

    /// Every segment upstream of `id`, exclusive.
    pub fn all_upstream(&self, id: usize) -> &[usize] {
        &self.all_upstream[id]
    }

    /// Every segment downstream of `id` along the path to the outlet,
    /// exclusive.
    pub fn all_downstream(&self, id: usize) -> &[usize] {
        &self.all_downstream[id]
    }

    pub fn index_of_feature(&self, feature_id: i64) -> Option<usize> {
        self.reaches
            .iter()
            .position(|r| r.feature_id == feature_id)
    }
}

fn build_upstream_connections(reaches: &mut [Reach]) {
    let links: Vec<(usize, usize)> = reaches
        .iter()
        .filter_map(|r| r.downstream.map(|ds| (ds, r.id)))
        .collect();

    for reach in reaches.iter_mut() {
        reach.upstream.clear();
    }
    for (ds, us) in links {
        reaches[ds].upstream.push(us);
    }
    for reach in reaches.iter_mut() {
        reach.upstream.sort_unstable();
    }
}

// Kahn's algorithm; headwaters seed the queue in ascending segment order so
// the evaluation order is deterministic.
fn topological_sort(reaches: &[Reach]) -> Result<Vec<usize>> {
    let n = reaches.len();
    let mut in_degree = vec![0usize; n];
    for reach in reaches {
        if let Some(ds) = reach.downstream {
            in_degree[ds] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    if queue.is_empty() && n > 0 {
        return Err(ModelError::CyclicNetwork {
            processed: 0,
            total: n,
        });
    }

    let mut order = Vec::with_capacity(n);
    while let Some(current) = queue.pop_front() {
        order.push(current);
        if let Some(ds) = reaches[current].downstream {
            in_degree[ds] -= 1;
            if in_degree[ds] == 0 {
                queue.push_back(ds);
            }
        }
    }

    if order.len() != n {
        return Err(ModelError::CyclicNetwork {
            processed: order.len(),
            total: n,
        });
    }

    Ok(order)
}

// Upstream closure accumulated in evaluation order: by the time a segment is
// visited, all of its feeders already have their own closures.
fn upstream_closure(reaches: &[Reach], order: &[usize]) -> Vec<Vec<usize>> {
    let mut closure: Vec<Vec<usize>> = vec![Vec::new(); reaches.len()];
    for &id in order {
        let mut acc = Vec::new();
        for &us in &reaches[id].upstream {
            acc.push(us);
            acc.extend_from_slice(&closure[us]);
        }
        acc.sort_unstable();
        closure[id] = acc;
    }
    closure
}

// In a tree the downstream set is just the walk to the outlet.
fn downstream_closure(reaches: &[Reach]) -> Vec<Vec<usize>> {
    reaches
        .iter()
        .map(|reach| {
            let mut path = Vec::new();
            let mut current = reach.downstream;
            while let Some(ds) = current {
                path.push(ds);
                current = reaches[ds].downstream;
            }
            path
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> Vec<Reach> {
        (0..n)
            .map(|i| Reach {
                id: i,
                feature_id: i as i64,
                downstream: if i + 1 < n { Some(i + 1) } else { None },
                ..Reach::default()
            })
            .collect()
    }

    #[test]
    fn chain_orders_headwater_first() {
        let net = NetworkTopology::from_reaches(chain(4)).unwrap();
        assert_eq!(net.order, vec![0, 1, 2, 3]);
        assert_eq!(net.upstream_pair(0), (None, None));
        assert_eq!(net.upstream_pair(1), (Some(0), None));
        assert_eq!(net.all_downstream(0), &[1, 2, 3]);
        assert_eq!(net.all_upstream(3), &[0, 1, 2]);
    }

    #[test]
    fn confluence_waits_for_both_branches() {
        // 0 and 1 join at 2, which drains to 3
        let mut reaches = chain(4);
        reaches[0].downstream = Some(2);
        reaches[1].downstream = Some(2);
        reaches[2].confluence = true;
        let net = NetworkTopology::from_reaches(reaches).unwrap();

        let pos = |id: usize| net.order.iter().position(|&x| x == id).unwrap();
        assert!(pos(0) < pos(2));
        assert!(pos(1) < pos(2));
        assert!(pos(2) < pos(3));
        assert_eq!(net.upstream_pair(2), (Some(0), Some(1)));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut reaches = chain(3);
        reaches[2].downstream = Some(0);
        match NetworkTopology::from_reaches(reaches) {
            Err(ModelError::CyclicNetwork { .. }) => {}
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn three_way_junction_is_rejected() {
        let mut reaches = chain(4);
        reaches[0].downstream = Some(3);
        reaches[1].downstream = Some(3);
        reaches[2].downstream = Some(3);
        match NetworkTopology::from_reaches(reaches) {
            Err(ModelError::TooManyUpstream { count: 3, .. }) => {}
            other => panic!("expected too-many-upstream error, got {other:?}"),
        }
    }

    #[test]
    fn disturbance_window_flags() {
        let mut reach = Reach::default();
        reach.disturbance = Some(Disturbance {
            start: 5,
            end: 10,
            d50: 1.2,
            gamma_shape: 3.0,
            gamma_scale: 0.4,
        });
        assert!(!reach.disturbance_started(4));
        assert!(reach.disturbance_started(5));
        assert!(reach.disturbance_started(11));
        assert!(reach.disturbance_active(10));
        assert!(!reach.disturbance_active(11));
    }
}
