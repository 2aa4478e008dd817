use polars::prelude::*;

use crate::enums::CosineWindow;
use crate::errors::{DataError, Result};
use crate::record::{column_f64, MeasurementRecord};
use crate::signal;

/// Columns holding one captured frame each share this name prefix; the
/// prefix match is a naming convention the derived data depends on.
pub const INTENSITY_PREFIX: &str = "Intensity";

/// Operations on a record holding single-table spectral data. Derived
/// signals are appended as new columns; existing columns are never touched.
pub struct OpticalSignalProcessor<'a> {
    record: &'a mut MeasurementRecord,
}

impl<'a> OpticalSignalProcessor<'a> {
    pub fn new(record: &'a mut MeasurementRecord) -> Self {
        OpticalSignalProcessor { record }
    }

    /// Averages all `Intensity`-prefixed columns row-wise into
    /// `Average Intensity`. The divisor is the explicit `frames` argument,
    /// else the `num_frames` metadata entry, else the matched-column count
    /// (which assumes one intensity column per captured frame).
    pub fn average_signal(&mut self, frames: Option<f64>) -> Result<()> {
        let metadata_frames = self.record.metadata_f64("num_frames");
        let df = self.record.primary_table_mut()?;
        let intensity_cols: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.as_str())
            .filter(|n| n.starts_with(INTENSITY_PREFIX))
            .map(|n| n.to_string())
            .collect();
        if intensity_cols.is_empty() {
            return Err(DataError::MissingColumn(format!(
                "no columns with prefix {:?}",
                INTENSITY_PREFIX
            )));
        }

        let mut sum = vec![0.0; df.height()];
        for name in &intensity_cols {
            let values = column_f64(df, name)?;
            for (acc, v) in sum.iter_mut().zip(values) {
                if !v.is_nan() {
                    *acc += v;
                }
            }
        }
        let divisor = frames
            .or(metadata_frames)
            .unwrap_or(intensity_cols.len() as f64);
        let average: Vec<f64> = sum.into_iter().map(|s| s / divisor).collect();
        df.with_column(Series::new("Average Intensity".into(), average))?;
        Ok(())
    }

    /// Converts the `Wavelength` column (nm) to photon energy in eV,
    /// `E = h*c / (lambda*e)`, written to `Energy`.
    pub fn energy_from_wavelength(&mut self) -> Result<()> {
        let h = physical_constants::PLANCK_CONSTANT;
        let c = physical_constants::SPEED_OF_LIGHT_IN_VACUUM;
        let e = physical_constants::ELEMENTARY_CHARGE;
        let df = self.record.primary_table_mut()?;
        let wavelength = column_f64(df, "Wavelength")?;
        let energy: Vec<f64> = wavelength
            .iter()
            .map(|&nm| h * c / (nm * 1e-9 * e))
            .collect();
        df.with_column(Series::new("Energy".into(), energy))?;
        Ok(())
    }

    /// Ideal low-pass filter of the named column, written to
    /// `"<column> (FFT Smoothed)"`. Every frequency bin at or beyond
    /// `cutoff_index` is zeroed; ringing at sharp edges is expected.
    pub fn low_pass_filter(&mut self, column: &str, cutoff_index: usize) -> Result<()> {
        let df = self.record.primary_table_mut()?;
        let values = column_f64(df, column)?;
        let filtered = signal::fft_low_pass(&values, cutoff_index);
        let name = format!("{} (FFT Smoothed)", column);
        df.with_column(Series::new(name.into(), filtered))?;
        Ok(())
    }

    /// Smooths the named column with a sum-of-cosines window of the given
    /// width, normalized by the window sum, written to
    /// `"<column> (<window_name>)"`.
    pub fn sum_cosine_window(
        &mut self,
        column: &str,
        window_name: &str,
        width: usize,
        coefficients: Option<[f64; 5]>,
    ) -> Result<()> {
        let window = CosineWindow::from_name(window_name, coefficients)?;
        let kernel = signal::sum_cosine_window(width, window.coefficients())?;
        let norm: f64 = kernel.iter().sum();
        let df = self.record.primary_table_mut()?;
        let values = column_f64(df, column)?;
        let smoothed: Vec<f64> = signal::convolve_same(&values, &kernel)
            .into_iter()
            .map(|v| v / norm)
            .collect();
        let name = format!("{} ({})", column, window_name);
        df.with_column(Series::new(name.into(), smoothed))?;
        Ok(())
    }

    /// Discrete numerical gradient of the named column, written to
    /// `"Grad <column>"`.
    pub fn gradient(&mut self, column: &str) -> Result<()> {
        let df = self.record.primary_table_mut()?;
        let values = column_f64(df, column)?;
        let grad = signal::gradient(&values)?;
        let name = format!("Grad {}", column);
        df.with_column(Series::new(name.into(), grad))?;
        Ok(())
    }

    /// Differential reflectance against a separately recorded background:
    /// `signal / (signal + background Intensity)`, rows aligned by
    /// position, optionally mean-subtracted. Written to `"dR/R <column>"`.
    pub fn differential_reflectance(
        &mut self,
        column: &str,
        background: &MeasurementRecord,
        subtract_mean: bool,
    ) -> Result<()> {
        let bg = column_f64(background.primary_table()?, "Intensity")?;
        let df = self.record.primary_table_mut()?;
        let sig = column_f64(df, column)?;
        if sig.len() != bg.len() {
            return Err(DataError::Validation(format!(
                "background has {} rows, signal has {}",
                bg.len(),
                sig.len()
            )));
        }
        let mut reflectance: Vec<f64> = sig
            .iter()
            .zip(&bg)
            .map(|(&s, &b)| s / (s + b))
            .collect();
        if subtract_mean {
            let finite: Vec<f64> = reflectance
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            let mean = finite.iter().sum::<f64>() / finite.len() as f64;
            for v in reflectance.iter_mut() {
                *v -= mean;
            }
        }
        let name = format!("dR/R {}", column);
        df.with_column(Series::new(name.into(), reflectance))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TableMap;
    use serde_json::Map;
    use std::path::PathBuf;

    fn record_from(df: DataFrame, metadata: Map<String, serde_json::Value>) -> MeasurementRecord {
        let mut tables = TableMap::new();
        tables.insert("spectrum", df);
        MeasurementRecord::new(tables, metadata, PathBuf::new(), None)
    }

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} != {} within {}", a, b, tol);
    }

    #[test]
    fn test_average_signal_divides_by_column_count() {
        let df = DataFrame::new(vec![
            Column::new("Wavelength".into(), &[500.0f64, 501.0]),
            Column::new("Intensity_1".into(), &[1.0f64, 2.0]),
            Column::new("Intensity_2".into(), &[3.0f64, 4.0]),
            Column::new("Intensity_3".into(), &[5.0f64, 6.0]),
        ])
        .unwrap();
        let mut record = record_from(df, Map::new());
        OpticalSignalProcessor::new(&mut record)
            .average_signal(None)
            .unwrap();
        let avg = record
            .primary_table()
            .unwrap()
            .column("Average Intensity")
            .unwrap()
            .f64()
            .unwrap()
            .to_vec();
        assert_close(avg[0].unwrap(), 3.0, 1e-12);
        assert_close(avg[1].unwrap(), 4.0, 1e-12);
    }

    #[test]
    fn test_average_signal_order_independent() {
        let forward = DataFrame::new(vec![
            Column::new("Intensity_1".into(), &[1.0f64]),
            Column::new("Intensity_2".into(), &[5.0f64]),
        ])
        .unwrap();
        let reversed = DataFrame::new(vec![
            Column::new("Intensity_2".into(), &[5.0f64]),
            Column::new("Intensity_1".into(), &[1.0f64]),
        ])
        .unwrap();
        for df in [forward, reversed] {
            let mut record = record_from(df, Map::new());
            OpticalSignalProcessor::new(&mut record)
                .average_signal(None)
                .unwrap();
            let avg = record
                .primary_table()
                .unwrap()
                .column("Average Intensity")
                .unwrap()
                .f64()
                .unwrap()
                .get(0)
                .unwrap();
            assert_close(avg, 3.0, 1e-12);
        }
    }

    #[test]
    fn test_average_signal_frame_count_sources() {
        let df = DataFrame::new(vec![Column::new("Intensity_1".into(), &[6.0f64])]).unwrap();
        let mut metadata = Map::new();
        metadata.insert("num_frames".to_string(), serde_json::json!(3));

        // Metadata frame count wins over the column count...
        let mut record = record_from(df.clone(), metadata.clone());
        OpticalSignalProcessor::new(&mut record)
            .average_signal(None)
            .unwrap();
        let avg = record
            .primary_table()
            .unwrap()
            .column("Average Intensity")
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();
        assert_close(avg, 2.0, 1e-12);

        // ...and an explicit argument wins over metadata.
        let mut record = record_from(df, metadata);
        OpticalSignalProcessor::new(&mut record)
            .average_signal(Some(2.0))
            .unwrap();
        let avg = record
            .primary_table()
            .unwrap()
            .column("Average Intensity")
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();
        assert_close(avg, 3.0, 1e-12);
    }

    #[test]
    fn test_average_signal_requires_intensity_columns() {
        let df = DataFrame::new(vec![Column::new("Wavelength".into(), &[500.0f64])]).unwrap();
        let mut record = record_from(df, Map::new());
        let result = OpticalSignalProcessor::new(&mut record).average_signal(None);
        assert!(matches!(result, Err(DataError::MissingColumn(_))));
    }

    #[test]
    fn test_energy_from_wavelength_500nm() {
        let df =
            DataFrame::new(vec![Column::new("Wavelength".into(), &[500.0f64])]).unwrap();
        let mut record = record_from(df, Map::new());
        OpticalSignalProcessor::new(&mut record)
            .energy_from_wavelength()
            .unwrap();
        let energy = record
            .primary_table()
            .unwrap()
            .column("Energy")
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();
        assert_close(energy, 2.4797, 1e-3);
    }

    #[test]
    fn test_low_pass_filter_column_name_and_dc() {
        let df = DataFrame::new(vec![Column::new(
            "Average Intensity".into(),
            &[2.0f64; 8],
        )])
        .unwrap();
        let mut record = record_from(df, Map::new());
        OpticalSignalProcessor::new(&mut record)
            .low_pass_filter("Average Intensity", 1)
            .unwrap();
        let smoothed = record
            .primary_table()
            .unwrap()
            .column("Average Intensity (FFT Smoothed)")
            .unwrap()
            .f64()
            .unwrap()
            .to_vec();
        for v in smoothed {
            assert_close(v.unwrap(), 2.0, 1e-9);
        }
    }

    #[test]
    fn test_sum_cosine_window_names_and_rejects() {
        let df = DataFrame::new(vec![Column::new("Intensity".into(), &[1.0f64; 16])]).unwrap();
        let mut record = record_from(df, Map::new());
        {
            let mut processor = OpticalSignalProcessor::new(&mut record);
            processor
                .sum_cosine_window("Intensity", "Hann", 5, None)
                .unwrap();
            let result = processor.sum_cosine_window("Intensity", "Kaiser", 5, None);
            assert!(matches!(result, Err(DataError::InvalidWindow(_))));
        }
        let df = record.primary_table().unwrap();
        let smoothed = df.column("Intensity (Hann)").unwrap().f64().unwrap().to_vec();
        for v in &smoothed[2..14] {
            assert_close(v.unwrap(), 1.0, 1e-12);
        }
    }

    #[test]
    fn test_gradient_missing_column() {
        let df = DataFrame::new(vec![Column::new("Intensity".into(), &[1.0f64, 2.0])]).unwrap();
        let mut record = record_from(df, Map::new());
        let result = OpticalSignalProcessor::new(&mut record).gradient("Energy");
        assert!(matches!(result, Err(DataError::MissingColumn(_))));
    }

    #[test]
    fn test_gradient_of_ramp() {
        let ramp: Vec<f64> = (0..8).map(|i| 0.5 * i as f64).collect();
        let df = DataFrame::new(vec![Column::new("Energy".into(), ramp)]).unwrap();
        let mut record = record_from(df, Map::new());
        OpticalSignalProcessor::new(&mut record)
            .gradient("Energy")
            .unwrap();
        let grad = record
            .primary_table()
            .unwrap()
            .column("Grad Energy")
            .unwrap()
            .f64()
            .unwrap()
            .to_vec();
        for g in grad {
            assert_close(g.unwrap(), 0.5, 1e-12);
        }
    }

    #[test]
    fn test_differential_reflectance() {
        let signal =
            DataFrame::new(vec![Column::new("Average Intensity".into(), &[1.0f64; 4])])
                .unwrap();
        let background =
            DataFrame::new(vec![Column::new("Intensity".into(), &[1.0f64; 4])]).unwrap();
        let mut record = record_from(signal, Map::new());
        let background = record_from(background, Map::new());

        OpticalSignalProcessor::new(&mut record)
            .differential_reflectance("Average Intensity", &background, false)
            .unwrap();
        let dr = record
            .primary_table()
            .unwrap()
            .column("dR/R Average Intensity")
            .unwrap()
            .f64()
            .unwrap()
            .to_vec();
        for v in dr {
            assert_close(v.unwrap(), 0.5, 1e-12);
        }

        // Mean subtraction centers the constant series on zero.
        OpticalSignalProcessor::new(&mut record)
            .differential_reflectance("Average Intensity", &background, true)
            .unwrap();
        let dr = record
            .primary_table()
            .unwrap()
            .column("dR/R Average Intensity")
            .unwrap()
            .f64()
            .unwrap()
            .to_vec();
        for v in dr {
            assert_close(v.unwrap(), 0.0, 1e-12);
        }
    }

    #[test]
    fn test_differential_reflectance_length_mismatch() {
        let signal =
            DataFrame::new(vec![Column::new("Average Intensity".into(), &[1.0f64; 4])])
                .unwrap();
        let background =
            DataFrame::new(vec![Column::new("Intensity".into(), &[1.0f64; 3])]).unwrap();
        let mut record = record_from(signal, Map::new());
        let background = record_from(background, Map::new());
        let result = OpticalSignalProcessor::new(&mut record).differential_reflectance(
            "Average Intensity",
            &background,
            false,
        );
        assert!(matches!(result, Err(DataError::Validation(_))));
    }
}
