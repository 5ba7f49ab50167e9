//! Flat-text diagnostic dumps driven through [`Observer`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::{Measurement, Simulation};
use crate::error::Result;
use crate::observer::Observer;

/// Writes particle positions and headings at every sampling tick.
///
/// Layout: a header line of tab-separated parameter names, a line with their
/// space-separated values, then four lines per tick: the time, all x, all y,
/// all directions.
#[derive(Debug)]
pub struct SnapshotWriter<W: Write> {
    out: W,
    header_written: bool,
    snapshots: usize,
}

impl SnapshotWriter<BufWriter<File>> {
    /// Create (truncate) `path` and write snapshots to it.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
            snapshots: 0,
        }
    }

    /// Number of ticks written so far.
    pub fn snapshots(&self) -> usize {
        self.snapshots
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_header(&mut self, sim: &Simulation) -> Result<()> {
        let d = sim.domain();
        writeln!(
            self.out,
            "num_particles\tcircle_radius\tcircle_distance\tbridge_height\tbridge_length"
        )?;
        writeln!(
            self.out,
            "{} {} {} {} {}",
            sim.num_particles(),
            d.circle_radius,
            d.circle_distance,
            d.bridge_height,
            d.bridge_length
        )?;
        self.header_written = true;
        Ok(())
    }
}

fn write_row<W: Write>(out: &mut W, values: impl IntoIterator<Item = f64>) -> Result<()> {
    let row: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
    writeln!(out, "{}", row.join(" "))?;
    Ok(())
}

impl<W: Write> Observer for SnapshotWriter<W> {
    fn on_snapshot(&mut self, time: f64, sim: &Simulation) -> Result<()> {
        if !self.header_written {
            self.write_header(sim)?;
        }
        let positions: Vec<[f64; 2]> = sim
            .particles()
            .iter()
            .map(|p| p.position_at(time))
            .collect();
        writeln!(self.out, "{time}")?;
        write_row(&mut self.out, positions.iter().map(|p| p[0]))?;
        write_row(&mut self.out, positions.iter().map(|p| p[1]))?;
        write_row(&mut self.out, sim.particles().iter().map(|p| p.direction))?;
        self.snapshots += 1;
        Ok(())
    }
}

/// Chamber occupancy after every event, for the totals dump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TotalsRecorder {
    times: Vec<f64>,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl TotalsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, m: &Measurement) {
        self.times.push(m.time);
        self.left.push(m.in_left);
        self.right.push(m.in_right);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn left(&self) -> &[usize] {
        &self.left
    }

    /// Three tab-separated rows: times, left counts, right counts.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        fn row<T: ToString>(values: &[T]) -> String {
            values
                .iter()
                .map(T::to_string)
                .collect::<Vec<_>>()
                .join("\t")
        }
        writeln!(out, "{}", row(&self.times))?;
        writeln!(out, "{}", row(&self.left))?;
        writeln!(out, "{}", row(&self.right))?;
        out.flush()?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_to(BufWriter::new(File::create(path)?))
    }
}

impl Observer for TotalsRecorder {
    fn on_event(&mut self, measurement: &Measurement) -> Result<()> {
        self.record(measurement);
        Ok(())
    }
}

/// `dir/token.ext`, or `dir/token-k.ext` with the first free `k` if taken.
pub fn unique_path(dir: impl AsRef<Path>, token: &str, ext: &str) -> PathBuf {
    let dir = dir.as_ref();
    let candidate = dir.join(format!("{token}.{ext}"));
    if !candidate.exists() {
        return candidate;
    }
    (1u64..)
        .map(|k| dir.join(format!("{token}-{k}.{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SimConfig;

    fn small_sim() -> Result<Simulation> {
        let config = SimConfig {
            num_particles: 5,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config, Some(17))?;
        sim.start(0.4)?;
        Ok(sim)
    }

    #[test]
    fn snapshot_layout() -> Result<()> {
        let mut sim = small_sim()?;
        let mut writer = SnapshotWriter::new(Vec::new());
        while sim.time() < 0.35 {
            sim.update(0.1, &mut writer)?;
        }
        let ticks = writer.snapshots();
        assert!(ticks >= 3);
        let text = String::from_utf8(writer.into_inner()).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2 + 4 * ticks);
        assert_eq!(lines[0].split('\t').count(), 5);
        assert_eq!(lines[1].split(' ').next(), Some("5"));
        assert_eq!(lines[2], "0");
        for tick in 0..ticks {
            let block = &lines[2 + 4 * tick..6 + 4 * tick];
            let t: f64 = block[0].parse().expect("time");
            assert!((t - 0.1 * tick as f64).abs() < 1e-9);
            for row in &block[1..] {
                assert_eq!(row.split(' ').count(), 5);
            }
        }
        Ok(())
    }

    #[test]
    fn totals_rows() -> Result<()> {
        let mut sim = small_sim()?;
        let mut totals = TotalsRecorder::new();
        totals.record(&sim.measurement());
        for _ in 0..10 {
            sim.update(0.0, &mut totals)?;
        }
        assert_eq!(totals.len(), 11);
        assert_eq!(totals.left()[0], 2);

        let mut buf = Vec::new();
        totals.write_to(&mut buf)?;
        let text = String::from_utf8(buf).expect("utf8");
        let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split('\t').collect()).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 11));
        for k in 0..11 {
            let l: usize = rows[1][k].parse().expect("left");
            let r: usize = rows[2][k].parse().expect("right");
            assert_eq!(l + r, 5);
        }
        Ok(())
    }

    #[test]
    fn unique_path_skips_existing_files() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("gatesim-io-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let first = unique_path(&dir, "run", "dat");
        assert_eq!(first, dir.join("run.dat"));
        std::fs::write(&first, "x")?;
        assert_eq!(unique_path(&dir, "run", "dat"), dir.join("run-1.dat"));
        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
