/// A discrete mass of disturbance-derived fine sediment and the distance it
/// can still travel downstream (m).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    pub mass: f64,
    pub distance: f64,
}

impl Pulse {
    const ZERO: Pulse = Pulse {
        mass: 0.0,
        distance: 0.0,
    };
}

const DAY_SECONDS: f64 = 86400.0;

/// Per-segment ledgers of in-transit sediment pulses, plus the transfer lists
/// handed to the immediate downstream segment within a day. Ledgers are kept
/// sorted ascending by remaining distance; an all-zero ledger collapses to a
/// single zero entry.
#[derive(Debug)]
pub struct PulseTracker {
    ledgers: Vec<Vec<Pulse>>,
    transfers: Vec<Vec<Pulse>>,
}

impl PulseTracker {
    pub fn new(segments: usize) -> Self {
        PulseTracker {
            ledgers: vec![vec![Pulse::ZERO]; segments],
            transfers: vec![Vec::new(); segments],
        }
    }

    /// Total mass resident in a segment's ledger.
    pub fn resident_mass(&self, segment: usize) -> f64 {
        self.ledgers[segment].iter().map(|p| p.mass).sum()
    }

    /// Adds the day's fine sediment input as a zero-distance pulse.
    pub fn inject(&mut self, segment: usize, mass: f64) {
        self.ledgers[segment].push(Pulse {
            mass,
            distance: 0.0,
        });
    }

    /// Advances a segment's ledger for the day: resident mass collapses into
    /// one entry whose travel distance is reset from today's flow velocity,
    /// then pulses handed down from the (up to two) upstream segments are
    /// merged in and the ledger is re-sorted.
    pub fn update_ledger(
        &mut self,
        segment: usize,
        velocity: f64,
        reach_length: f64,
        upstream: (Option<usize>, Option<usize>),
    ) {
        let resident = self.resident_mass(segment).max(0.0);
        let ledger = vec![Pulse {
            mass: resident,
            distance: velocity * DAY_SECONDS - reach_length,
        }];
        self.ledgers[segment] = ledger;

        // transfer lists are consumed on merge; each segment has exactly one
        // downstream reader in a tree
        for us in [upstream.0, upstream.1].into_iter().flatten() {
            let incoming = std::mem::take(&mut self.transfers[us]);
            self.ledgers[segment].extend(incoming);
        }

        self.ledgers[segment].sort_by(|a, b| a.distance.total_cmp(&b.distance));

        if self.resident_mass(segment) == 0.0 {
            self.ledgers[segment] = vec![Pulse::ZERO];
        }
    }

    /// Moves resident pulses out of the segment, limited by transport
    /// capacity, rewriting the transfer list read by the downstream segment.
    /// Returns (mass exported, capacity remaining for coarse sediment).
    ///
    /// Entries whose reduced distance would be non-positive stay resident and
    /// are reconsidered after the next ledger advance.
    pub fn propagate(&mut self, segment: usize, capacity: f64, reach_length: f64) -> (f64, f64) {
        let mut ledger = std::mem::take(&mut self.ledgers[segment]);
        let mut transfers = Vec::new();
        let (exported, remaining) =
            drain_ledger(&mut ledger, &mut transfers, capacity, reach_length);
        self.ledgers[segment] = ledger;
        self.transfers[segment] = transfers;
        (exported, remaining)
    }

    /// Same arithmetic as `propagate` but against a snapshot: neither the
    /// ledger nor the transfer list is touched. Used for the low/high
    /// trajectories so that each scenario's outputs stay independent of the
    /// others; the ledger itself is owned by the mid trajectory.
    pub fn propagate_preview(&self, segment: usize, capacity: f64, reach_length: f64) -> (f64, f64) {
        let mut ledger = self.ledgers[segment].clone();
        let mut transfers = Vec::new();
        drain_ledger(&mut ledger, &mut transfers, capacity, reach_length)
    }

    /// True when the ledger holds nothing but the zero entry.
    pub fn is_trivial(&self, segment: usize) -> bool {
        self.ledgers[segment] == [Pulse::ZERO]
    }

    #[cfg(test)]
    fn ledger(&self, segment: usize) -> &[Pulse] {
        &self.ledgers[segment]
    }

    #[cfg(test)]
    fn transfer_list(&self, segment: usize) -> &[Pulse] {
        &self.transfers[segment]
    }
}

fn drain_ledger(
    ledger: &mut [Pulse],
    transfers: &mut Vec<Pulse>,
    capacity: f64,
    reach_length: f64,
) -> (f64, f64) {
    if *ledger == [Pulse::ZERO] {
        return (0.0, capacity);
    }

    let mut exported = 0.0;
    let mut remaining = capacity;

    for pulse in ledger.iter_mut() {
        if remaining <= 0.0 {
            break;
        }
        let reduced = pulse.distance - reach_length;
        if reduced <= 0.0 {
            // distance exhausted: stays resident for the next step
            continue;
        }
        let moved = pulse.mass.min(remaining);
        if moved <= 0.0 {
            continue;
        }
        transfers.push(Pulse {
            mass: moved,
            distance: reduced,
        });
        exported += moved;
        remaining -= moved;
        pulse.mass -= moved;
    }

    (exported, remaining)
}
