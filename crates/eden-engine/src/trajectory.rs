//! Trajectory logger (§6 Outputs): one text file per data writer, one row
//! per non-initialization step.
//!
//! Each row is tab-separated, fixed-width columns of 16 characters: time in
//! seconds first, then each declared column in `%+16.8g`-style format.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use eden_instantiate::ColumnSource;
use eden_tables::Tables;

use crate::error::{EngineError, Result};

/// One open trajectory log file and the resolved column sources it writes
/// from each step.
pub struct TrajectoryLogger {
    writer_id: u32,
    path: String,
    file: BufWriter<File>,
    columns: Vec<LoggedColumn>,
}

struct LoggedColumn {
    scale_factor: f32,
    source: ColumnSource,
}

impl TrajectoryLogger {
    /// Open `path` for writing and collect the columns belonging to `writer_id`
    /// from the Instantiator's resolved column list, in column-id order.
    pub fn open(writer_id: u32, path: &str, resolved: &[eden_instantiate::ResolvedColumn]) -> Result<Self> {
        let mut columns: Vec<(u32, LoggedColumn)> = resolved
            .iter()
            .filter(|c| c.writer_id == writer_id)
            .map(|c| (c.column_id, LoggedColumn { scale_factor: c.scale_factor, source: c.source }))
            .collect();
        columns.sort_by_key(|(id, _)| *id);

        let file = File::create(path).map_err(|e| EngineError::TrajectoryIo { path: path.to_string(), source: e })?;
        Ok(Self {
            writer_id,
            path: path.to_string(),
            file: BufWriter::new(file),
            columns: columns.into_iter().map(|(_, c)| c).collect(),
        })
    }

    /// This logger's data writer id.
    pub fn writer_id(&self) -> u32 {
        self.writer_id
    }

    /// Write one row: `time_s` first, then each column's current value read
    /// from the scalar state vector (local columns) or the value mirror
    /// (remote columns), each scaled to user units.
    pub fn write_row(&mut self, time_s: f64, scalar_now: &[f32], tables: &Tables) -> Result<()> {
        write_field(&mut self.file, time_s)?;
        for column in &self.columns {
            let raw = match column.source {
                ColumnSource::Local { index } => scalar_now[index as usize],
                ColumnSource::Remote { table, index } => tables.state_f32_now[table.raw() as usize][index as usize],
            };
            write_field(&mut self.file, (raw * column.scale_factor) as f64)?;
        }
        self.file.write_all(b"\n").map_err(|e| EngineError::TrajectoryIo { path: self.path.clone(), source: e })?;
        Ok(())
    }

    /// Flush buffered rows to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(|e| EngineError::TrajectoryIo { path: self.path.clone(), source: e })
    }
}

fn write_field(out: &mut BufWriter<File>, value: f64) -> Result<()> {
    write!(out, "{}\t", format_g16_8(value)).map_err(|e| EngineError::TrajectoryIo { path: "<row>".to_string(), source: e })
}

/// Render `value` the way `%+16.8g` would: 8 significant digits, scientific
/// notation outside `[1e-4, 1e8)` the way glibc's `%g` switches representations,
/// right-justified to a 16-character field.
fn format_g16_8(value: f64) -> String {
    let body = if value == 0.0 {
        "+0.0000000".to_string()
    } else if (1e-4..1e8).contains(&value.abs()) {
        format!("{value:+.8}")
    } else {
        let sci = format!("{value:+.7e}");
        let (mantissa, exp) = sci.split_once('e').expect("scientific format always has 'e'");
        let exp_val: i32 = exp.parse().expect("rust exponent is a plain integer");
        format!("{mantissa}e{exp_val:+03}")
    };
    format!("{body:>16}")
}

/// Open every data writer in `model` whose path lands under `dir`-relative
/// resolution already baked into `DataWriter::path`, returning one logger
/// per writer.
pub fn open_all(
    data_writers: &[eden_model::DataWriter],
    resolved_columns: &[eden_instantiate::ResolvedColumn],
) -> Result<Vec<TrajectoryLogger>> {
    data_writers
        .iter()
        .map(|w| TrajectoryLogger::open(w.id, &w.path, resolved_columns))
        .collect()
}

/// Join `dir` and a data writer's declared path, used by callers that want
/// per-rank output files side by side (e.g. `<dir>/<rank>/<path>`).
pub fn rank_scoped_path(dir: &Path, rank: u32, writer_path: &str) -> String {
    dir.join(format!("rank{rank}")).join(writer_path).display().to_string()
}
