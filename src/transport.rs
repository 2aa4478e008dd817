use ndarray::Array2;
use polars::prelude::*;
use regex::Regex;

use crate::enums::{SweepDirection, SweepType};
use crate::errors::{DataError, Result};
use crate::record::{column_f64, column_f64_at, MeasurementRecord, Param};

/// Thermometer channel recorded by the dilution fridge; RT-curve cleanup
/// always reads this column.
pub const DILUTION_THERMOMETER_CHANNEL: &str = "lakeshore_372_ch09_temperature";

/// Magnetic field argument for the MCA coefficient: a fixed value for
/// scans at constant field, or the name of a swept-field column.
#[derive(Debug, Clone)]
pub enum BField {
    Fixed(f64),
    Column(String),
}

/// A 2D sweep grid reconstructed from a series of 1D sweeps: the outer
/// parameter values (initialization value first), the inner sweep axis,
/// and the experiment ids supplying one inner trace each.
#[derive(Debug, Clone)]
pub struct Sweep2d {
    pub outer_values: Vec<f64>,
    pub inner_axis: Vec<f64>,
    pub sweep_ids: Vec<i64>,
}

/// Operations on the multi-table structure of a transport record; tables
/// are addressed by experiment/result-table name.
pub struct TransportSignalProcessor<'a> {
    record: &'a mut MeasurementRecord,
}

impl<'a> TransportSignalProcessor<'a> {
    pub fn new(record: &'a mut MeasurementRecord) -> Self {
        TransportSignalProcessor { record }
    }

    /// Mask selecting the monotonic branch of a hysteretic R-T curve.
    ///
    /// Rows whose sweep-key (first column) value is below `start_time` are
    /// masked out. A warming point passes when its temperature strictly
    /// exceeds the running maximum of all prior in-range temperatures; a
    /// cooling point when it is strictly below the running minimum. The
    /// caller applies the mask to drop non-monotonic thermometry glitches
    /// before plotting or fitting.
    pub fn clean_temperature_sweep(
        &self,
        exp_name: &str,
        start_time: f64,
        warming: bool,
    ) -> Result<BooleanChunked> {
        let df = self.record.table(exp_name)?;
        let sweep_key = column_f64_at(df, 0)?;
        let temperature = column_f64(df, DILUTION_THERMOMETER_CHANNEL)?;

        let mut mask = vec![false; temperature.len()];
        let mut extremum = if warming {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
        for i in 0..temperature.len() {
            if sweep_key[i] < start_time {
                continue;
            }
            let t = temperature[i];
            mask[i] = if warming { t > extremum } else { t < extremum };
            extremum = if warming {
                extremum.max(t)
            } else {
                extremum.min(t)
            };
        }
        Ok(BooleanChunked::from_slice("monotonic".into(), &mask))
    }

    /// Appends `V/I` as `result_name`, divided by the resolved gain and/or
    /// sensitivity (fixed values or metadata keys).
    pub fn append_resistance(
        &mut self,
        exp_name: &str,
        result_name: &str,
        voltage_col: &str,
        current_col: &str,
        gain: Option<Param>,
        sensitivity: Option<Param>,
    ) -> Result<()> {
        let gain = self.record.resolve_param(gain.as_ref())?;
        let sensitivity = self.record.resolve_param(sensitivity.as_ref())?;
        let df = self.record.table_mut(exp_name)?;
        let voltage = column_f64(df, voltage_col)?;
        let current = column_f64(df, current_col)?;
        let mut resistance: Vec<f64> = voltage
            .iter()
            .zip(&current)
            .map(|(&v, &i)| v / i)
            .collect();
        scale_in_place(&mut resistance, gain);
        scale_in_place(&mut resistance, sensitivity);
        df.with_column(Series::new(result_name.into(), resistance))?;
        Ok(())
    }

    /// Appends the magnetochiral-anisotropy coefficient
    /// `gamma = R_2f / (R_f * B * I)` as `result_name`. `b_field` selects
    /// between a fixed field value and a swept-field column; optional gain
    /// and sensitivity divide the result further.
    #[allow(clippy::too_many_arguments)]
    pub fn append_mca_coefficient(
        &mut self,
        exp_name: &str,
        result_name: &str,
        r_2f_col: &str,
        r_f_col: &str,
        b_field: BField,
        i_col: &str,
        gain: Option<Param>,
        sensitivity: Option<Param>,
    ) -> Result<()> {
        let gain = self.record.resolve_param(gain.as_ref())?;
        let sensitivity = self.record.resolve_param(sensitivity.as_ref())?;
        let df = self.record.table_mut(exp_name)?;
        let r_2f = column_f64(df, r_2f_col)?;
        let r_f = column_f64(df, r_f_col)?;
        let current = column_f64(df, i_col)?;
        let field: Vec<f64> = match &b_field {
            BField::Fixed(b) => vec![*b; r_2f.len()],
            BField::Column(name) => column_f64(df, name)?,
        };
        let mut mca: Vec<f64> = (0..r_2f.len())
            .map(|i| r_2f[i] / (r_f[i] * field[i] * current[i]))
            .collect();
        scale_in_place(&mut mca, gain);
        scale_in_place(&mut mca, sensitivity);
        df.with_column(Series::new(result_name.into(), mca))?;
        Ok(())
    }

    /// Appends `"<col>_symm"` and `"<col>_antisymm"`, the halves of the
    /// signal even and odd under row-order reversal. Assumes the table's
    /// row order corresponds to a field-symmetric sweep.
    pub fn append_symmetrized(&mut self, exp_name: &str, resistance_col: &str) -> Result<()> {
        let df = self.record.table_mut(exp_name)?;
        let r = column_f64(df, resistance_col)?;
        let n = r.len();
        let symm: Vec<f64> = (0..n).map(|i| (r[i] + r[n - 1 - i]) / 2.0).collect();
        let antisymm: Vec<f64> = (0..n).map(|i| (r[i] - r[n - 1 - i]) / 2.0).collect();
        df.with_column(Series::new(format!("{}_symm", resistance_col).into(), symm))?;
        df.with_column(Series::new(
            format!("{}_antisymm", resistance_col).into(),
            antisymm,
        ))?;
        Ok(())
    }

    /// Reconstructs a 2D parameter grid from 1D sweeps logged as separate
    /// experiment rows.
    ///
    /// Experiment names carry `"<instrument> <type label>[ <direction>]"`
    /// and, for outer-parameter moves, a trailing `"to <value> <unit>"`
    /// phrase naming the terminal value. The distinguished init row
    /// (`"<instrument> <type label> init …"`) supplies the first outer
    /// value; inner rows supply one experiment id per inner trace, and the
    /// inner axis is read off the first matching result table's sweep-key
    /// column. The free-text value parsing is only as strong as the log
    /// strings it runs on.
    pub fn extract_2d_sweep(
        &self,
        outer_instr: &str,
        outer_type: &str,
        inner_instr: &str,
        inner_type: &str,
        outer_dirn: Option<&str>,
        inner_dirn: Option<&str>,
    ) -> Result<Sweep2d> {
        let outer = SweepType::from_str(outer_type)?;
        let inner = SweepType::from_str(inner_type)?;
        let outer_dirn = outer_dirn.map(SweepDirection::from_str).transpose()?;
        let inner_dirn = inner_dirn.map(SweepDirection::from_str).transpose()?;

        let outer_prefix = sweep_name(outer_instr, &outer, outer_dirn.as_ref());
        let inner_prefix = sweep_name(inner_instr, &inner, inner_dirn.as_ref());
        let init_prefix = format!("{} {} init", outer_instr, outer.label());

        let experiments = self.record.table("experiments")?;
        let names = experiments
            .column("name")
            .map_err(|_| DataError::MissingColumn("name".to_string()))?
            .str()?
            .clone();
        let ids = experiments
            .column("exp_id")
            .map_err(|_| DataError::MissingColumn("exp_id".to_string()))?
            .cast(&DataType::Int64)?;
        let ids = ids.i64()?.clone();

        let mut init_value = None;
        let mut outer_values = Vec::new();
        let mut sweep_ids = Vec::new();
        for (name, id) in names.into_iter().zip(ids.into_iter()) {
            let Some(name) = name else { continue };
            if name.starts_with(&init_prefix) {
                init_value = Some(parse_terminal_value(name, outer.unit())?);
            } else if name.starts_with(&outer_prefix) && !name.contains("init") {
                outer_values.push(parse_terminal_value(name, outer.unit())?);
            } else if name.starts_with(&inner_prefix) && !name.contains("init") {
                if let Some(id) = id {
                    sweep_ids.push(id);
                }
            }
        }

        if init_value.is_none() && outer_values.is_empty() {
            return Err(DataError::MissingExperiment(outer_prefix));
        }
        if let Some(value) = init_value {
            outer_values.insert(0, value);
        }
        if sweep_ids.is_empty() {
            return Err(DataError::MissingExperiment(inner_prefix));
        }

        let first_table = result_table_name(sweep_ids[0]);
        let inner_axis = column_f64_at(self.record.table(&first_table)?, 0)?;
        Ok(Sweep2d {
            outer_values,
            inner_axis,
            sweep_ids,
        })
    }

    /// Stacks the named quantity from each sweep's result table into one
    /// array indexed by `(sweep, inner point)`.
    pub fn extract_2d_array(&self, quantity: &str, sweep_ids: &[i64]) -> Result<Array2<f64>> {
        let mut traces: Vec<Vec<f64>> = Vec::with_capacity(sweep_ids.len());
        for id in sweep_ids {
            let df = self.record.table(&result_table_name(*id))?;
            traces.push(column_f64(df, quantity)?);
        }
        let inner_len = traces.first().map(|t| t.len()).unwrap_or(0);
        if traces.iter().any(|t| t.len() != inner_len) {
            return Err(DataError::Validation(
                "result tables disagree on inner sweep length".to_string(),
            ));
        }
        let flat: Vec<f64> = traces.into_iter().flatten().collect();
        Array2::from_shape_vec((sweep_ids.len(), inner_len), flat)
            .map_err(|e| DataError::Validation(e.to_string()))
    }
}

fn scale_in_place(values: &mut [f64], factor: Option<f64>) {
    if let Some(factor) = factor {
        for v in values.iter_mut() {
            *v /= factor;
        }
    }
}

fn sweep_name(instrument: &str, sweep: &SweepType, direction: Option<&SweepDirection>) -> String {
    match direction {
        Some(dirn) => format!("{} {} {}", instrument, sweep.label(), dirn.label()),
        None => format!("{} {}", instrument, sweep.label()),
    }
}

fn result_table_name(exp_id: i64) -> String {
    format!("results-{}-1", exp_id)
}

/// Recovers the terminal value from descriptive log text by locating the
/// last `"to <value> <unit>"` phrase.
fn parse_terminal_value(text: &str, unit: &str) -> Result<f64> {
    let pattern = format!(
        r"to\s+([-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)\s*{}\b",
        regex::escape(unit)
    );
    let re = Regex::new(&pattern).map_err(|e| DataError::Validation(e.to_string()))?;
    let capture = re.captures_iter(text).last().ok_or_else(|| {
        DataError::Validation(format!(
            "no \"to <value> {}\" phrase in experiment text {:?}",
            unit, text
        ))
    })?;
    capture[1]
        .parse::<f64>()
        .map_err(|e| DataError::Validation(e.to_string()))
}
