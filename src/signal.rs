use rustfft::{num_complex::Complex, FftPlanner};

use crate::errors::{DataError, Result};

/// Builds a symmetric sum-of-cosines window of the given width from a
/// five-term coefficient set `[a0, a1, a2, a3, a4]`.
///
/// `w[n] = a0 - a1*cos(2*pi*n/(N-1)) + a2*cos(4*pi*n/(N-1))
///            - a3*cos(6*pi*n/(N-1)) + a4*cos(8*pi*n/(N-1))`
pub fn sum_cosine_window(width: usize, coefficients: [f64; 5]) -> Result<Vec<f64>> {
    if width < 2 {
        return Err(DataError::Validation(format!(
            "window width must be at least 2, got {}",
            width
        )));
    }
    let denom = (width - 1) as f64;
    let [a0, a1, a2, a3, a4] = coefficients;
    Ok((0..width)
        .map(|n| {
            let phase = 2.0 * std::f64::consts::PI * n as f64 / denom;
            a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos() - a3 * (3.0 * phase).cos()
                + a4 * (4.0 * phase).cos()
        })
        .collect())
}

/// Same-length discrete convolution: the center `signal.len()` samples of
/// the full convolution, matching numpy's `mode='same'`.
pub fn convolve_same(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let m = kernel.len();
    if n == 0 || m == 0 {
        return Vec::new();
    }
    let mut full = vec![0.0; n + m - 1];
    for (i, &x) in signal.iter().enumerate() {
        for (j, &k) in kernel.iter().enumerate() {
            full[i + j] += x * k;
        }
    }
    let start = (m - 1) / 2;
    full[start..start + n].to_vec()
}

/// Ideal low-pass filter: forward FFT, zero every bin whose mirrored
/// frequency index is at or beyond `cutoff_index`, inverse FFT. The sharp
/// cutoff rings at edges (Gibbs); that is the documented behavior.
pub fn fft_low_pass(signal: &[f64], cutoff_index: usize) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .map(|&v| Complex { re: v, im: 0.0 })
        .collect();
    fft.process(&mut buffer);

    for (k, bin) in buffer.iter_mut().enumerate() {
        // Mirrored index folds the negative-frequency half onto the
        // positive half so both sides of a real spectrum are zeroed.
        let folded = k.min(n - k);
        if folded >= cutoff_index {
            *bin = Complex { re: 0.0, im: 0.0 };
        }
    }

    let ifft = planner.plan_fft_inverse(n);
    ifft.process(&mut buffer);
    let scale = 1.0 / n as f64;
    buffer.iter().map(|c| c.re * scale).collect()
}

/// Discrete numerical gradient: central differences in the interior,
/// one-sided differences at the boundaries.
pub fn gradient(signal: &[f64]) -> Result<Vec<f64>> {
    let n = signal.len();
    if n < 2 {
        return Err(DataError::Validation(
            "gradient requires at least 2 samples".to_string(),
        ));
    }
    let mut out = vec![0.0; n];
    out[0] = signal[1] - signal[0];
    out[n - 1] = signal[n - 1] - signal[n - 2];
    for i in 1..n - 1 {
        out[i] = (signal[i + 1] - signal[i - 1]) / 2.0;
    }
    Ok(out)
}
