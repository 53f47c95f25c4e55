use crate::errors::{ModelError, Result};
use crate::hydrology::GageRecord;
use crate::network::{NetworkTopology, Scenario};
use crate::output::OutputTable;
use crate::width::WidthSample;
use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;

const NODATA: i64 = -9999;

/// Loads the hydrograph table: one row per gauge with columns
/// `Gage, DA, segid, regulated` and one column per simulated day.
pub fn load_hydrographs(path: &Path) -> Result<Vec<GageRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = rdr.headers()?.clone();
    let position = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ModelError::HydrographColumn(name.to_string()))
    };
    let gage_idx = position("Gage")?;
    let da_idx = position("DA")?;
    let seg_idx = position("segid")?;
    let reg_idx = position("regulated")?;

    // day columns are the integer-named ones, in order of appearance
    let day_cols: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.parse::<usize>().is_ok())
        .map(|(i, _)| i)
        .collect();

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let parse = |idx: usize| -> f64 { row[idx].parse().unwrap_or(f64::NAN) };

        let segid: i64 = row[seg_idx].parse().unwrap_or(NODATA);
        let flows = day_cols.iter().map(|&i| parse(i)).collect();
        records.push(GageRecord {
            name: row[gage_idx].to_string(),
            drain_area: parse(da_idx),
            segment_feature: if segid == NODATA { None } else { Some(segid) },
            regulated: row[reg_idx].parse::<f64>().unwrap_or(0.0) != 0.0,
            flows,
        });
    }

    println!("loaded {} gauges from {:?}", records.len(), path);
    Ok(records)
}

/// Loads the width-calibration table (`DA,Q,w`).
pub fn load_width_table(path: &Path) -> Result<Vec<WidthSample>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let samples = rdr
        .deserialize()
        .collect::<std::result::Result<Vec<WidthSample>, _>>()?;
    Ok(samples)
}

/// Writes the full (day, segment) output table, 19 fields per row.
pub fn write_results(path: &Path, output: &OutputTable, network: &NetworkTopology) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;

    let mut header = vec!["day".to_string(), "segment".to_string(), "Q".to_string()];
    for prefix in ["Qs", "Qs_out", "CSR", "Store_chan", "Store_tot", "Store_delta"] {
        for s in Scenario::ALL {
            header.push(format!("{}_{}", prefix, s.suffix()));
        }
    }
    wtr.write_record(&header)?;

    for day in 1..=output.days() {
        for seg in 0..output.segments() {
            let rec = output.record(day, seg);
            let mut row = vec![
                day.to_string(),
                network.reaches[seg].feature_id.to_string(),
                rec.flow.to_string(),
            ];
            for s in Scenario::ALL {
                row.push(rec.supply.get(s).to_string());
            }
            for s in Scenario::ALL {
                row.push(match rec.export_value(s) {
                    Some(v) => v.to_string(),
                    None => String::new(),
                });
            }
            for s in Scenario::ALL {
                row.push(rec.csr.get(s).to_string());
            }
            for s in Scenario::ALL {
                row.push(rec.store_channel.get(s).to_string());
            }
            for s in Scenario::ALL {
                row.push(rec.store_total.get(s).to_string());
            }
            for s in Scenario::ALL {
                row.push(rec.store_delta.get(s).to_string());
            }
            wtr.write_record(&row)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("serfe_csv_test_{}_{}", std::process::id(), name))
    }

    #[test]
    fn hydrograph_parsing_handles_offnet_gauges() {
        let path = temp_path("hydro.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "Gage,DA,segid,regulated,1,2,3").unwrap();
        writeln!(f, "USGS-1,52.5,4,0,1.2,1.4,1.1").unwrap();
        writeln!(f, "USGS-2,10.0,-9999,1,0.2,0.3,0.2").unwrap();
        drop(f);

        let records = load_hydrographs(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].segment_feature, Some(4));
        assert!(!records[0].regulated);
        assert_eq!(records[0].flows, vec![1.2, 1.4, 1.1]);
        assert_eq!(records[1].segment_feature, None);
        assert!(records[1].regulated);
    }

    #[test]
    fn missing_column_is_reported() {
        let path = temp_path("hydro_bad.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "Gage,DA,regulated,1").unwrap();
        writeln!(f, "USGS-1,52.5,0,1.2").unwrap();
        drop(f);

        let result = load_hydrographs(&path);
        std::fs::remove_file(&path).ok();
        match result {
            Err(ModelError::HydrographColumn(col)) => assert_eq!(col, "segid"),
            other => panic!("expected missing-column error, got {other:?}"),
        }
    }

    #[test]
    fn width_table_round_trips() {
        let path = temp_path("width.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "DA,Q,w").unwrap();
        writeln!(f, "12.0,3.5,4.2").unwrap();
        writeln!(f, "80.0,20.0,11.0").unwrap();
        drop(f);

        let samples = load_width_table(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(samples.len(), 2);
        assert!((samples[1].width - 11.0).abs() < 1e-12);
    }
}
