use crate::network::{Scenario, Triplet};

/// Outgoing-flux cell. Exports start each day as `Pending` so the traversal
/// can verify that a reach's feeders were evaluated first; `Failed` marks a
/// reach whose evaluation aborted the day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ExportCell {
    #[default]
    Pending,
    Computed(f64),
    Failed,
}

impl ExportCell {
    pub fn value(self) -> Option<f64> {
        match self {
            ExportCell::Computed(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_computed(self) -> bool {
        matches!(self, ExportCell::Computed(_))
    }
}

/// One (day, segment) row of simulation output.
#[derive(Debug, Clone, Default)]
pub struct SegmentRecord {
    /// Discharge (m^3/s); shared across scenarios.
    pub flow: f64,
    /// Sediment supply (t/day).
    pub supply: Triplet,
    /// Outgoing sediment flux (t/day).
    pub export: [ExportCell; 3],
    /// Capacity-supply ratio.
    pub csr: Triplet,
    /// In-channel sediment storage (t).
    pub store_channel: Triplet,
    /// Channel + floodplain storage (t).
    pub store_total: Triplet,
    /// Change in total storage since the previous day (t).
    pub store_delta: Triplet,
}

impl SegmentRecord {
    pub fn export_value(&self, s: Scenario) -> Option<f64> {
        self.export[s.index()].value()
    }
}

// Dense (day, segment) output table; days are 1-based
#[derive(Debug)]
pub struct OutputTable {
    days: usize,
    segments: usize,
    records: Vec<SegmentRecord>,
}

impl OutputTable {
    pub fn new(days: usize, segments: usize) -> Self {
        OutputTable {
            days,
            segments,
            records: vec![SegmentRecord::default(); days * segments],
        }
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    fn idx(&self, day: usize, segment: usize) -> usize {
        debug_assert!(day >= 1 && day <= self.days);
        debug_assert!(segment < self.segments);
        (day - 1) * self.segments + segment
    }

    pub fn record(&self, day: usize, segment: usize) -> &SegmentRecord {
        &self.records[self.idx(day, segment)]
    }

    pub fn record_mut(&mut self, day: usize, segment: usize) -> &mut SegmentRecord {
        let i = self.idx(day, segment);
        &mut self.records[i]
    }

    /// Resets every export cell of `day` to `Pending`.
    pub fn begin_day(&mut self, day: usize) {
        let start = self.idx(day, 0);
        for record in &mut self.records[start..start + self.segments] {
            record.export = [ExportCell::Pending; 3];
        }
    }

    pub fn export(&self, day: usize, segment: usize, s: Scenario) -> ExportCell {
        self.record(day, segment).export[s.index()]
    }

    /// End-of-run mid-scenario channel storage, one value per segment. Used
    /// to seed day-1 storage of a follow-on run after a spin-up.
    pub fn final_channel_storage(&self) -> Vec<f64> {
        (0..self.segments)
            .map(|seg| self.record(self.days, seg).store_channel.mid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_day_resets_exports_only() {
        let mut table = OutputTable::new(2, 3);
        let rec = table.record_mut(1, 1);
        rec.flow = 4.2;
        rec.export = [ExportCell::Computed(1.0); 3];

        table.begin_day(1);
        assert_eq!(table.export(1, 1, Scenario::Mid), ExportCell::Pending);
        assert_eq!(table.record(1, 1).flow, 4.2);
        // other days untouched
        table.record_mut(2, 0).export[0] = ExportCell::Computed(9.0);
        table.begin_day(1);
        assert_eq!(table.export(2, 0, Scenario::Low), ExportCell::Computed(9.0));
    }

    #[test]
    fn export_cell_states() {
        assert_eq!(ExportCell::Computed(2.5).value(), Some(2.5));
        assert_eq!(ExportCell::Pending.value(), None);
        assert_eq!(ExportCell::Failed.value(), None);
        assert!(!ExportCell::Failed.is_computed());
    }
}
