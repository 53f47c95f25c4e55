use crate::config::ModelParams;
use crate::errors::{ModelError, Result};
use crate::hydrology::HydrographSet;
use crate::network::{NetworkTopology, Reach, Scenario, Triplet};
use crate::output::{ExportCell, OutputTable};
use crate::pulses::PulseTracker;
use crate::width::WidthModel;

// physical constants
const RHO_W: f64 = 1000.0; // water density (kg/m^3)
const RHO_S: f64 = 2650.0; // sediment density (kg/m^3)
const GRAVITY: f64 = 9.8; // m/s^2
const SED_DENSITY: f64 = 2.6; // hillslope sediment mass density (t/m^3)
const DAY_SECONDS: f64 = 86400.0;
const MIN_WIDTH: f64 = 0.5; // m
const UNIT_WEIGHT: f64 = 9810.0; // rho * g (N/m^3), for specific stream power
const SOIL_CRIT_FACTOR: f64 = 4.2; // bank soil critical stream-power multiplier
const SMALL_TRIB_DA: f64 = 3.0; // km^2; below this, hillslope input routes by confinement alone

/// Dimensionless critical stream power. The uncertainty bounds run opposite
/// to capacity: the low-capacity trajectory uses the highest threshold.
fn omega_crit_star(s: Scenario) -> f64 {
    match s {
        Scenario::Low => 0.11,
        Scenario::Mid => 0.10,
        Scenario::High => 0.09,
    }
}

/// Suspended grain size (m) for the overbank settling adjustment.
fn suspended_grain(s: Scenario) -> f64 {
    match s {
        Scenario::Low => 0.0008,
        Scenario::Mid => 0.0005,
        Scenario::High => 0.0003,
    }
}

/// Bed grain size (mm) paired with each capacity trajectory; coarse bounds
/// the low-capacity case, fine bounds the high-capacity case.
fn scenario_grain(reach: &Reach, s: Scenario) -> f64 {
    match s {
        Scenario::Low => reach.d_high,
        Scenario::Mid => reach.d_mid,
        Scenario::High => reach.d_low,
    }
}

/// Manning roughness as a linear function of mid-scenario grain size, fitted
/// across the basin between the configured bounds.
#[derive(Debug, Clone, Copy)]
pub struct RoughnessModel {
    slope: f64,
    intercept: f64,
}

impl RoughnessModel {
    pub fn fit(network: &NetworkTopology, params: &ModelParams) -> Self {
        let d_max = network
            .reaches
            .iter()
            .map(|r| r.d_mid)
            .fold(f64::NEG_INFINITY, f64::max);
        let d_min = network
            .reaches
            .iter()
            .map(|r| r.d_mid)
            .fold(f64::INFINITY, f64::min);
        let span = d_max - d_min;
        let slope = if span > 0.0 {
            (params.mannings_max - params.mannings_min) / span
        } else {
            0.0
        };
        let intercept = slope * -d_max + params.mannings_max;
        RoughnessModel { slope, intercept }
    }

    pub fn n_for(&self, d_mid: f64) -> f64 {
        d_mid * self.slope + self.intercept
    }
}

/// Total-load transport capacity (t/day) after Lammers & Bledsoe. Zero when
/// specific stream power does not exceed the critical threshold.
pub fn transport_capacity(q: f64, w: f64, slope: f64, d: f64, om_crit_star: f64) -> f64 {
    let om_crit = om_crit_star
        * GRAVITY
        * (RHO_S - RHO_W)
        * (((RHO_S - RHO_W) / RHO_W) * GRAVITY * d.powi(3)).sqrt();
    let om = (RHO_W * GRAVITY * q * slope) / w;

    if om > om_crit {
        // total-load concentration in ppm, converted to a daily mass rate
        let rate = 0.0214 * (om - om_crit).powf(1.5) / d * (q / w).powf(-5.0 / 6.0);
        (q * DAY_SECONDS) * (rate / 1e6) * SED_DENSITY
    } else {
        0.0
    }
}

/// Stokes-range settling velocity (m/s) for a grain of diameter `d` (m).
fn settling_velocity(d: f64) -> f64 {
    (16.17 * d * d) / (1.8e-5 + (12.1275 * d * d * d).sqrt())
}

/// Hillslope sediment delivery (t/day) from today's denudation-rate draw over
/// the reach's direct contributing area outside the floodplain.
fn direct_hillslope_supply(reach: &Reach) -> f64 {
    let mut hillslope_da = reach.direct_da - reach.fp_area / 1e6;
    if hillslope_da < 0.0 {
        hillslope_da = reach.direct_da * 0.5;
    }
    let vol = (reach.denude / 1000.0 / 365.0) * (hillslope_da * 1e6);
    vol * SED_DENSITY
}

/// Bank migration rate (m/s) from excess specific stream power over the
/// critical threshold at the reach's critical discharge.
fn migration_rate(
    width_model: &WidthModel,
    reach: &Reach,
    flow: f64,
    w: f64,
    slope: f64,
    qc: f64,
) -> f64 {
    let w_crit = width_model.predict(reach.drain_area, qc);
    let sp_crit = (UNIT_WEIGHT * qc * slope) / w_crit;
    let excess = (UNIT_WEIGHT * flow * slope) / w - sp_crit * SOIL_CRIT_FACTOR;
    if excess <= 0.0 {
        0.0
    } else {
        let wc = sp_crit * SOIL_CRIT_FACTOR;
        let k = 4.49e-6 + 1.74e-7 * wc - 4.56e-6 * reach.sinuosity;
        k * excess.sqrt()
    }
}

fn slope_adjust(channel_store: f64, prev_store: f64, reach: &Reach, params: &ModelParams) -> f64 {
    let delta_h =
        ((channel_store - prev_store) / params.bulk_density) / (0.5 * reach.width_bf * reach.length_m);
    delta_h / reach.length_m
}

/// Velocity-weighted share of overbank deposition routed to the floodplain,
/// plus the floodplain flow velocity used by the settling adjustment.
fn overbank_split(
    reach: &Reach,
    params: &ModelParams,
    n: f64,
    w: f64,
    depth: f64,
    fp_thick: f64,
    slope: f64,
) -> (f64, f64) {
    let vol_channel = depth * reach.length_m * w.min(reach.width_bf);
    let vol_fp = (depth - fp_thick) * reach.fp_area;
    let v_chan = (depth.powf(2.0 / 3.0) * slope.sqrt()) / n;
    let v_fp = ((depth - fp_thick).powf(2.0 / 3.0) * slope.sqrt()) / params.fp_mannings;
    let v_ratio = if v_chan > 0.0 { v_fp / v_chan } else { 0.0 };
    let fp_ratio = vol_fp * v_ratio / ((vol_channel + vol_fp) - (vol_fp * v_ratio));
    (fp_ratio, v_fp)
}

/// CSR when no floodplain recruitment enters the denominator; capacity stands
/// in for the ratio when supply is zero.
fn csr_for(capacity: f64, supply: f64) -> f64 {
    if supply == 0.0 {
        if capacity > 0.0 { capacity } else { 1.0 }
    } else {
        capacity / supply
    }
}

/// Per-scenario inputs to the supply-vs-capacity decision.
struct ScenarioState {
    supply: f64,
    prev_store: f64,
    depth: f64,
    slope: f64,
    capacity: f64,
    transport_rem: f64,
    pulse_export: f64,
    fp_store: f64,
    fp_thick: f64,
    /// Start-of-day thickness attribute, capping floodplain recruitment.
    fp_thick_start: f64,
    mig_rate: f64,
    /// Low-trajectory upstream input; the overbank settling adjustment reads
    /// it in every scenario.
    qs_us_low: f64,
    suspended_d: f64,
}

struct ScenarioOutcome {
    export: f64,
    channel_store: f64,
    csr: f64,
    fp_store: f64,
    fp_thick: f64,
    slope: f64,
}

fn balance(reach: &Reach, params: &ModelParams, n: f64, w: f64, st: &ScenarioState) -> ScenarioOutcome {
    let confined = reach.confine == 1.0;
    let supply = st.supply;
    // pulse-exported fines are already on their way out of the reach
    let effective_load = supply - st.pulse_export;

    if st.transport_rem < effective_load {
        // transport-limited: capacity caps export, the remainder deposits
        let export = st.capacity + st.pulse_export;
        let mut fp_store = st.fp_store;
        let mut fp_thick = st.fp_thick;
        let channel_store;

        if !confined && st.depth >= st.fp_thick {
            let (fp_ratio, _) = overbank_split(reach, params, n, w, st.depth, st.fp_thick, st.slope);
            let sed_remain = supply - export;
            channel_store = sed_remain * (1.0 - fp_ratio);
            fp_store += sed_remain - channel_store;
            if reach.fp_area > 0.0 {
                fp_thick = fp_store / reach.fp_area * (1.0 / params.bulk_density);
            }
        } else {
            channel_store = supply - export;
        }

        ScenarioOutcome {
            export,
            channel_store,
            csr: csr_for(st.capacity, supply),
            fp_store,
            fp_thick,
            slope: st.slope + slope_adjust(channel_store, st.prev_store, reach, params),
        }
    } else if st.transport_rem > effective_load {
        // capacity-limited: everything moves through, the channel empties
        if !confined {
            let mut fp_recr = ((st.mig_rate * DAY_SECONDS)
                * (reach.length_m * (1.0 - reach.confine))
                * st.fp_thick
                * params.bulk_density)
                .min(reach.fp_area * st.fp_thick_start * params.bulk_density);

            if st.depth >= st.fp_thick {
                // overtopping flow re-suspends less of the recruited bank
                // material; scale by the settling-to-flow velocity ratio
                let (fp_ratio, v_fp) =
                    overbank_split(reach, params, n, w, st.depth, st.fp_thick, st.slope);
                let w_s = settling_velocity(st.suspended_d);
                let fp_v_ratio = (w_s / v_fp).min(0.01);
                fp_recr -= st.qs_us_low * fp_ratio * fp_v_ratio;
            }

            let export = supply + fp_recr + st.pulse_export;
            let fp_store = st.fp_store - fp_recr;
            let mut fp_thick = st.fp_thick;
            if reach.fp_area > 0.0 {
                fp_thick = (fp_thick - fp_recr / reach.fp_area * (1.0 / params.bulk_density)).max(0.0);
            }

            let denom = supply + fp_recr;
            ScenarioOutcome {
                export,
                channel_store: 0.0,
                csr: csr_for(st.capacity, denom),
                fp_store,
                fp_thick,
                slope: st.slope + slope_adjust(0.0, st.prev_store, reach, params),
            }
        } else {
            ScenarioOutcome {
                export: supply + st.pulse_export,
                channel_store: 0.0,
                csr: csr_for(st.capacity, supply),
                fp_store: st.fp_store,
                fp_thick: st.fp_thick,
                slope: st.slope + slope_adjust(0.0, st.prev_store, reach, params),
            }
        }
    } else {
        // balanced: pass-through, no storage change
        ScenarioOutcome {
            export: supply,
            channel_store: 0.0,
            csr: 1.0,
            fp_store: st.fp_store,
            fp_thick: st.fp_thick,
            slope: st.slope,
        }
    }
}

/// Runs the full mass balance for one reach on one day: hydraulics, sediment
/// inputs, floodplain exchange, pulse bookkeeping, transport capacity, the
/// three-way supply-vs-capacity decision per scenario, and the dam override.
/// Writes the day's record and persists updated slope/thickness on the reach.
pub fn apply_to_reach(
    network: &mut NetworkTopology,
    hydro: &HydrographSet,
    width_model: &WidthModel,
    roughness: &RoughnessModel,
    pulses: &mut PulseTracker,
    output: &mut OutputTable,
    params: &ModelParams,
    initial_storage: Option<&[f64]>,
    segment: usize,
    day: usize,
) -> Result<()> {
    let reach = network.reaches[segment].clone();

    // hydraulics
    let flow = hydro.discharge(network, segment, day);
    let mut w = width_model.predict(reach.drain_area, flow).max(MIN_WIDTH);
    if reach.confine == 1.0 && w > reach.width_bf {
        w = reach.width_bf;
    }
    let n = roughness.n_for(reach.d_mid);
    let mut depth = Triplet::default();
    for s in Scenario::ALL {
        depth.set(s, ((n * flow) / (w * reach.slope.get(s).sqrt())).powf(0.6));
    }

    // upstream sediment input, per scenario
    let (us1, us2) = network.upstream_pair(segment);
    let mut qs_us = Triplet::default();
    for s in Scenario::ALL {
        let mut total = 0.0;
        for us in [us1, us2].into_iter().flatten() {
            match output.export(day, us, s) {
                ExportCell::Computed(v) => total += v,
                _ => {
                    return Err(ModelError::UnresolvedDependency {
                        segment: reach.feature_id,
                        day,
                        upstream: network.reaches[us].feature_id,
                    });
                }
            }
        }
        qs_us.set(s, total);
    }

    // direct hillslope input, split between channel and floodplain
    let qs_dir = direct_hillslope_supply(&reach);
    let (qs_channel, qs_fp) = if reach.fp_area != 0.0 {
        let channel = if reach.direct_da <= SMALL_TRIB_DA {
            qs_dir * reach.confine
        } else {
            (0.8 * qs_dir).max(qs_dir * reach.confine)
        };
        (channel, qs_dir - channel)
    } else {
        (qs_dir, 0.0)
    };

    // floodplain storage and thickness, advanced by today's direct input
    let mut fp_store = Triplet::default();
    let mut fp_thick = Triplet::default();
    if reach.fp_area != 0.0 {
        let delta_thick = qs_fp / reach.fp_area * (1.0 / params.bulk_density);
        for s in Scenario::ALL {
            fp_store.set(
                s,
                reach.fp_area * reach.fp_thickness.get(s) * params.bulk_density + qs_fp,
            );
            fp_thick.set(s, reach.fp_thickness.get(s) + delta_thick);
        }
    }

    // sediment-pulse ledger, live once the disturbance window has opened
    let pulses_live = reach.disturbance_started(day);
    if pulses_live {
        pulses.inject(segment, qs_channel);
        let velocity = (depth.mid.powf(2.0 / 3.0) * reach.slope.mid.sqrt()) / n;
        pulses.update_ledger(segment, velocity, reach.length_m, (us1, us2));
    }

    // previous channel storage, per scenario
    let prev_store = if day == 1 {
        Triplet::splat(initial_storage.map_or(0.0, |s| s[segment]))
    } else {
        output.record(day - 1, segment).store_channel
    };

    // bed grain size (m), blended toward disturbance fines while a pulse is
    // resident; the blend weight compares fine mass against the coarser of
    // prior storage and a minimum active layer
    let fine_mass = if pulses_live {
        pulses.resident_mass(segment)
    } else {
        0.0
    };
    let mut d_grain = Triplet::default();
    for s in Scenario::ALL {
        let base_mm = scenario_grain(&reach, s);
        let d_mm = match (&reach.disturbance, fine_mass > 0.0) {
            (Some(dist), true) => {
                let min_active = reach.width_bf * reach.length_m * 0.25 * params.bulk_density;
                let coarse = (prev_store.get(s) - fine_mass).max(min_active);
                let fine_ratio = fine_mass / (fine_mass + coarse);
                let coarse_ratio = coarse / (coarse + fine_mass);
                base_mm * coarse_ratio + dist.d50 * fine_ratio
            }
            _ => base_mm,
        };
        d_grain.set(s, d_mm / 1000.0);
    }

    // transport capacity and bank migration, per scenario
    let mut capacity = Triplet::default();
    let mut mig = Triplet::default();
    for s in Scenario::ALL {
        capacity.set(
            s,
            transport_capacity(
                flow,
                w.min(reach.width_bf),
                reach.slope.get(s),
                d_grain.get(s),
                omega_crit_star(s),
            ),
        );
        mig.set(
            s,
            migration_rate(width_model, &reach, flow, w, reach.slope.get(s), reach.qc.get(s)),
        );
    }

    // pulse propagation: low/high run against a snapshot, mid owns the ledger
    let mut pulse_export = Triplet::default();
    let mut transport_rem = capacity;
    if pulses_live {
        let (out_low, rem_low) = pulses.propagate_preview(segment, capacity.low, reach.length_m);
        let (out_high, rem_high) = pulses.propagate_preview(segment, capacity.high, reach.length_m);
        let (out_mid, rem_mid) = pulses.propagate(segment, capacity.mid, reach.length_m);
        pulse_export = Triplet {
            low: out_low,
            mid: out_mid,
            high: out_high,
        };
        transport_rem = Triplet {
            low: rem_low,
            mid: rem_mid,
            high: rem_high,
        };
    }

    // dam/diversion break immediately downstream
    let dammed = network
        .next_downstream(segment)
        .is_some_and(|next| network.reaches[next].eff_da < reach.eff_da);

    for s in Scenario::ALL {
        let supply = qs_channel + qs_us.get(s) + prev_store.get(s);
        let st = ScenarioState {
            supply,
            prev_store: prev_store.get(s),
            depth: depth.get(s),
            slope: reach.slope.get(s),
            capacity: capacity.get(s),
            transport_rem: transport_rem.get(s),
            pulse_export: pulse_export.get(s),
            fp_store: fp_store.get(s),
            fp_thick: fp_thick.get(s),
            fp_thick_start: reach.fp_thickness.get(s),
            mig_rate: mig.get(s),
            qs_us_low: qs_us.low,
            suspended_d: suspended_grain(s),
        };
        let outcome = balance(&reach, params, n, w, &st);

        let export = if dammed { 0.0 } else { outcome.export };
        let store_total = outcome.channel_store + outcome.fp_store;
        let store_delta = if day > 1 {
            store_total - output.record(day - 1, segment).store_total.get(s)
        } else {
            0.0
        };

        let record = output.record_mut(day, segment);
        record.flow = flow;
        record.supply.set(s, supply);
        record.export[s.index()] = ExportCell::Computed(export);
        record.csr.set(s, outcome.csr);
        record.store_channel.set(s, outcome.channel_store);
        record.store_total.set(s, store_total);
        record.store_delta.set(s, store_delta);

        let reach_state = &mut network.reaches[segment];
        reach_state.slope.set(s, outcome.slope);
        if reach.confine != 1.0 {
            reach_state.fp_thickness.set(s, outcome.fp_thick);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_zero_below_critical_power() {
        // gentle slope, coarse bed: stream power stays subcritical
        assert_eq!(transport_capacity(1.0, 10.0, 1e-4, 0.2, 0.1), 0.0);
        // no flow, no capacity
        assert_eq!(transport_capacity(0.0, 10.0, 0.01, 0.05, 0.1), 0.0);
    }

    #[test]
    fn capacity_grows_with_slope() {
        let lo = transport_capacity(20.0, 10.0, 0.005, 0.02, 0.1);
        let hi = transport_capacity(20.0, 10.0, 0.02, 0.02, 0.1);
        assert!(hi > lo);
        assert!(lo > 0.0);
    }

    #[test]
    fn settling_velocity_increases_with_grain_size() {
        let fine = settling_velocity(0.0003);
        let coarse = settling_velocity(0.0008);
        assert!(coarse > fine);
        assert!(fine > 0.0);
    }

    #[test]
    fn hillslope_supply_scales_with_denudation() {
        let mut reach = Reach {
            direct_da: 2.0,
            fp_area: 0.0,
            denude: 0.365,
            ..Reach::default()
        };
        // 0.365 mm/yr over 2 km^2: 1e-6 m/day * 2e6 m^2 * 2.6 t/m^3
        let qs = direct_hillslope_supply(&reach);
        assert!((qs - 2.0 * 2.6).abs() < 1e-9);

        // floodplain larger than the direct area falls back to half of it
        reach.fp_area = 3.0e6;
        let qs_fb = direct_hillslope_supply(&reach);
        assert!((qs_fb - 1.0 * 2.6).abs() < 1e-9);
    }

    #[test]
    fn balanced_case_passes_supply_through() {
        let reach = Reach::default();
        let params = ModelParams::new(1.0);
        let st = ScenarioState {
            supply: 5.0,
            prev_store: 0.0,
            depth: 0.2,
            slope: 0.01,
            capacity: 5.0,
            transport_rem: 5.0,
            pulse_export: 0.0,
            fp_store: 0.0,
            fp_thick: 0.0,
            fp_thick_start: 0.0,
            mig_rate: 0.0,
            qs_us_low: 0.0,
            suspended_d: 0.0005,
        };
        let out = balance(&reach, &params, 0.04, 8.0, &st);
        assert_eq!(out.export, 5.0);
        assert_eq!(out.channel_store, 0.0);
        assert_eq!(out.csr, 1.0);
        assert_eq!(out.slope, 0.01);
    }

    #[test]
    fn transport_limited_confined_stores_the_excess() {
        let reach = Reach::default(); // confined
        let params = ModelParams::new(1.0);
        let st = ScenarioState {
            supply: 10.0,
            prev_store: 0.0,
            depth: 0.3,
            slope: 0.01,
            capacity: 4.0,
            transport_rem: 4.0,
            pulse_export: 0.0,
            fp_store: 0.0,
            fp_thick: 0.0,
            fp_thick_start: 0.0,
            mig_rate: 0.0,
            qs_us_low: 0.0,
            suspended_d: 0.0005,
        };
        let out = balance(&reach, &params, 0.04, 8.0, &st);
        assert_eq!(out.export, 4.0);
        assert_eq!(out.channel_store, 6.0);
        assert!((out.csr - 0.4).abs() < 1e-12);
        // aggradation steepens the reach
        assert!(out.slope > st.slope);
    }

    #[test]
    fn capacity_limited_confined_flushes_everything() {
        let reach = Reach::default();
        let params = ModelParams::new(1.0);
        let st = ScenarioState {
            supply: 3.0,
            prev_store: 2.0,
            depth: 0.3,
            slope: 0.01,
            capacity: 9.0,
            transport_rem: 9.0,
            pulse_export: 0.0,
            fp_store: 0.0,
            fp_thick: 0.0,
            fp_thick_start: 0.0,
            mig_rate: 0.0,
            qs_us_low: 0.0,
            suspended_d: 0.0005,
        };
        let out = balance(&reach, &params, 0.04, 8.0, &st);
        assert_eq!(out.export, 3.0);
        assert_eq!(out.channel_store, 0.0);
        assert!((out.csr - 3.0).abs() < 1e-12);
        // evacuating prior storage relaxes the slope
        assert!(out.slope < st.slope);
    }

    #[test]
    fn zero_supply_csr_convention() {
        assert_eq!(csr_for(0.0, 0.0), 1.0);
        assert_eq!(csr_for(7.5, 0.0), 7.5);
        assert_eq!(csr_for(5.0, 10.0), 0.5);
    }
}
