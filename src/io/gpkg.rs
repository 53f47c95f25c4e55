use crate::config::ColumnConfig;
use crate::errors::{ModelError, Result};
use crate::network::{Disturbance, NetworkTopology, Reach, Triplet};
use rusqlite::Connection;
use std::collections::HashMap;

const NODATA: f64 = -9999.0;

// Raw attribute row straight out of the network table
struct RawReach {
    feature_id: i64,
    downstream: Option<i64>,
    label: String,
    nums: Vec<Option<f64>>,
}

// index into RawReach::nums, matching the SELECT column order
const LENGTH: usize = 0;
const WIDTH_BF: usize = 1;
const SINUOSITY: usize = 2;
const DRAIN_AREA: usize = 3;
const EFF_DA: usize = 4;
const DIRECT_DA: usize = 5;
const FP_AREA: usize = 6;
const D_MID: usize = 7;
const D_LOW: usize = 8;
const D_HIGH: usize = 9;
const DIST_D50: usize = 10;
const CONFINE: usize = 11;
const CONFLUENCE: usize = 12;
const DIST_START: usize = 13;
const DIST_END: usize = 14;
const G_SHAPE: usize = 15;
const G_SCALE: usize = 16;
const DIST_G_SHAPE: usize = 17;
const DIST_G_SCALE: usize = 18;
const QC_LOW: usize = 19;
const QC_MID: usize = 20;
const QC_HIGH: usize = 21;
const SLOPE_MIN: usize = 22;
const SLOPE_MID: usize = 23;
const SLOPE_MAX: usize = 24;
const FPT_MIN: usize = 25;
const FPT_MID: usize = 26;
const FPT_MAX: usize = 27;
const NUM_COLS: usize = 28;

/// Loads the drainage network from a GeoPackage attribute table and builds
/// the topology index. Downstream links pointing outside the table are
/// treated as the outlet, as the routing convention goes.
pub fn load_network(
    conn: &Connection,
    table: &str,
    cols: &ColumnConfig,
) -> Result<NetworkTopology> {
    let query = format!(
        "SELECT {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, \
         {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {} FROM '{}' ORDER BY {}",
        cols.key,
        cols.downstream,
        cols.label,
        cols.length,
        cols.width_bf,
        cols.sinuosity,
        cols.drain_area,
        cols.eff_da,
        cols.direct_da,
        cols.fp_area,
        cols.d_mid,
        cols.d_low,
        cols.d_high,
        cols.dist_d50,
        cols.confine,
        cols.confluence,
        cols.dist_start,
        cols.dist_end,
        cols.g_shape,
        cols.g_scale,
        cols.dist_g_shape,
        cols.dist_g_scale,
        cols.qc_low,
        cols.qc_mid,
        cols.qc_high,
        cols.slope_min,
        cols.slope_mid,
        cols.slope_max,
        cols.fpt_min,
        cols.fpt_mid,
        cols.fpt_max,
        table,
        cols.key
    );

    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        let feature_id: i64 = row.get(0)?;
        let downstream: Option<i64> = row.get(1)?;
        let label: Option<String> = row.get(2)?;
        let mut nums = Vec::with_capacity(NUM_COLS);
        for i in 0..NUM_COLS {
            nums.push(row.get::<_, Option<f64>>(3 + i)?);
        }
        Ok(RawReach {
            feature_id,
            downstream,
            label: label.unwrap_or_default(),
            nums,
        })
    })?;

    let raw: Vec<RawReach> = rows.collect::<rusqlite::Result<_>>()?;
    let index: HashMap<i64, usize> = raw
        .iter()
        .enumerate()
        .map(|(i, r)| (r.feature_id, i))
        .collect();

    let mut reaches = Vec::with_capacity(raw.len());
    for (id, r) in raw.iter().enumerate() {
        let req = |col_idx: usize, name: &str| -> Result<f64> {
            r.nums[col_idx].ok_or_else(|| ModelError::MissingAttribute {
                segment: r.feature_id,
                column: name.to_string(),
            })
        };

        let downstream = match r.downstream {
            Some(ds) => match index.get(&ds) {
                Some(&i) => Some(i),
                None => {
                    println!(
                        "segment {} flows to {} which is outside the domain",
                        r.feature_id, ds
                    );
                    None
                }
            },
            None => None,
        };

        let dist_start = req(DIST_START, &cols.dist_start)?;
        let disturbance = if dist_start != NODATA {
            Some(Disturbance {
                start: dist_start as usize,
                end: req(DIST_END, &cols.dist_end)? as usize,
                d50: req(DIST_D50, &cols.dist_d50)?,
                gamma_shape: req(DIST_G_SHAPE, &cols.dist_g_shape)?,
                gamma_scale: req(DIST_G_SCALE, &cols.dist_g_scale)?,
            })
        } else {
            None
        };

        reaches.push(Reach {
            id,
            feature_id: r.feature_id,
            label: r.label.clone(),
            downstream,
            upstream: Vec::new(),
            length_m: req(LENGTH, &cols.length)?,
            width_bf: req(WIDTH_BF, &cols.width_bf)?,
            sinuosity: req(SINUOSITY, &cols.sinuosity)?,
            drain_area: req(DRAIN_AREA, &cols.drain_area)?,
            eff_da: req(EFF_DA, &cols.eff_da)?,
            direct_da: req(DIRECT_DA, &cols.direct_da)?,
            fp_area: req(FP_AREA, &cols.fp_area)?,
            d_mid: req(D_MID, &cols.d_mid)?,
            d_low: req(D_LOW, &cols.d_low)?,
            d_high: req(D_HIGH, &cols.d_high)?,
            confine: req(CONFINE, &cols.confine)?,
            confluence: req(CONFLUENCE, &cols.confluence)? == 1.0,
            disturbance,
            gamma_shape: req(G_SHAPE, &cols.g_shape)?,
            gamma_scale: req(G_SCALE, &cols.g_scale)?,
            qc: Triplet {
                low: req(QC_LOW, &cols.qc_low)?,
                mid: req(QC_MID, &cols.qc_mid)?,
                high: req(QC_HIGH, &cols.qc_high)?,
            },
            slope: Triplet {
                low: req(SLOPE_MIN, &cols.slope_min)?,
                mid: req(SLOPE_MID, &cols.slope_mid)?,
                high: req(SLOPE_MAX, &cols.slope_max)?,
            },
            fp_thickness: Triplet {
                low: req(FPT_MIN, &cols.fpt_min)?,
                mid: req(FPT_MID, &cols.fpt_mid)?,
                high: req(FPT_MAX, &cols.fpt_max)?,
            },
            denude: 0.0,
        });
    }

    let topology = NetworkTopology::from_reaches(reaches)?;
    println!("network loaded with {} segments", topology.len());
    Ok(topology)
}

/// Writes the evolved slope and floodplain-thickness state back onto the
/// network table after a spin-up run.
pub fn write_back_state(
    conn: &Connection,
    table: &str,
    cols: &ColumnConfig,
    network: &NetworkTopology,
) -> Result<()> {
    let sql = format!(
        "UPDATE '{}' SET {} = ?1, {} = ?2, {} = ?3, {} = ?4, {} = ?5, {} = ?6 WHERE {} = ?7",
        table,
        cols.slope_min,
        cols.slope_mid,
        cols.slope_max,
        cols.fpt_min,
        cols.fpt_mid,
        cols.fpt_max,
        cols.key
    );
    let mut stmt = conn.prepare(&sql)?;
    for reach in &network.reaches {
        stmt.execute(rusqlite::params![
            reach.slope.low,
            reach.slope.mid,
            reach.slope.high,
            reach.fp_thickness.low,
            reach.fp_thickness.mid,
            reach.fp_thickness.high,
            reach.feature_id,
        ])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_table(conn: &Connection) {
        conn.execute_batch(
            "CREATE TABLE reaches (
                id INTEGER, toid INTEGER, rid TEXT, Length_m REAL, w_bf REAL, Sinuos REAL,
                Drain_Area REAL, eff_DA REAL, direct_DA REAL, fp_area REAL,
                D_pred_mid REAL, D_pred_low REAL, D_pred_hig REAL, dist_d50 REAL,
                confine REAL, confluence REAL, dist_start REAL, dist_end REAL,
                g_shape REAL, g_scale REAL, dist_g_sh REAL, dist_g_sc REAL,
                Qc_low REAL, Qc_mid REAL, Qc_high REAL,
                Slope_min REAL, Slope_mid REAL, Slope_max REAL,
                fpt_min REAL, fpt_mid REAL, fpt_max REAL
            );
            INSERT INTO reaches VALUES
                (10, 20, '1.1', 1200, 8, 1.1, 5, 5, 2, 0, 60, 40, 90, -9999,
                 1, 0, -9999, -9999, 2, 0.3, -9999, -9999,
                 4, 6, 9, 0.02, 0.02, 0.02, 0, 0, 0),
                (20, 99, '1.2', 900, 12, 1.3, 11, 11, 3, 40000, 45, 30, 70, 1.5,
                 0, 0, 5, 20, 2, 0.3, 4, 0.5,
                 5, 8, 12, 0.01, 0.01, 0.01, 0.2, 0.2, 0.2);",
        )
        .unwrap();
    }

    #[test]
    fn loads_and_links_segments() {
        let conn = Connection::open_in_memory().unwrap();
        seed_table(&conn);
        let net = load_network(&conn, "reaches", &ColumnConfig::new()).unwrap();

        assert_eq!(net.len(), 2);
        let head = &net.reaches[0];
        assert_eq!(head.feature_id, 10);
        assert_eq!(head.label, "1.1");
        // toid 99 is outside the domain, so segment 20 is the outlet
        assert_eq!(head.downstream, Some(1));
        assert_eq!(net.reaches[1].downstream, None);
        assert!(head.disturbance.is_none());

        let outlet = &net.reaches[1];
        let dist = outlet.disturbance.as_ref().unwrap();
        assert_eq!(dist.start, 5);
        assert_eq!(dist.end, 20);
        assert!((dist.d50 - 1.5).abs() < 1e-12);
        assert!((outlet.fp_thickness.mid - 0.2).abs() < 1e-12);
    }

    #[test]
    fn null_attribute_is_fatal() {
        let conn = Connection::open_in_memory().unwrap();
        seed_table(&conn);
        conn.execute("UPDATE reaches SET Sinuos = NULL WHERE id = 10", [])
            .unwrap();
        match load_network(&conn, "reaches", &ColumnConfig::new()) {
            Err(ModelError::MissingAttribute { segment: 10, column }) => {
                assert_eq!(column, "Sinuos");
            }
            other => panic!("expected missing-attribute error, got {other:?}"),
        }
    }

    #[test]
    fn state_write_back_round_trips() {
        let conn = Connection::open_in_memory().unwrap();
        seed_table(&conn);
        let cols = ColumnConfig::new();
        let mut net = load_network(&conn, "reaches", &cols).unwrap();
        net.reaches[0].slope = Triplet::splat(0.004);
        net.reaches[0].fp_thickness = Triplet::splat(0.7);

        write_back_state(&conn, "reaches", &cols, &net).unwrap();
        let reloaded = load_network(&conn, "reaches", &cols).unwrap();
        assert!((reloaded.reaches[0].slope.mid - 0.004).abs() < 1e-12);
        assert!((reloaded.reaches[0].fp_thickness.high - 0.7).abs() < 1e-12);
    }
}
