use crate::errors::DataError;

/// Represents the recognized 1D sweep types an experiment row can encode.
pub enum SweepType {
    KeithleyVoltage,
    DynacoolField,
    DynacoolTemperature,
    KeithleyCurrent,
    Ami430Field,
}

impl SweepType {
    /// Creates a `SweepType` from a string.
    pub fn from_str(sweep_type: &str) -> Result<Self, DataError> {
        match sweep_type.to_lowercase().as_str() {
            "keithley_voltage" => Ok(SweepType::KeithleyVoltage),
            "dynacool_field" => Ok(SweepType::DynacoolField),
            "dynacool_temperature" => Ok(SweepType::DynacoolTemperature),
            "keithley_current" => Ok(SweepType::KeithleyCurrent),
            "ami430_field" => Ok(SweepType::Ami430Field),
            _ => Err(DataError::InvalidSweepType(sweep_type.to_string())),
        }
    }

    /// Returns the phrase this sweep type contributes to an experiment name.
    pub fn label(&self) -> &str {
        match self {
            SweepType::KeithleyVoltage => "voltage sweep",
            SweepType::DynacoolField => "field sweep",
            SweepType::DynacoolTemperature => "temperature sweep",
            SweepType::KeithleyCurrent => "current sweep",
            SweepType::Ami430Field => "field sweep",
        }
    }

    /// Returns the unit suffix the swept parameter is logged with.
    pub fn unit(&self) -> &str {
        match self {
            SweepType::KeithleyVoltage => "V",
            SweepType::DynacoolField => "T",
            SweepType::DynacoolTemperature => "K",
            SweepType::KeithleyCurrent => "A",
            SweepType::Ami430Field => "T",
        }
    }
}

/// Sweep direction encoded in an experiment name.
pub enum SweepDirection {
    Up,
    Down,
}

impl SweepDirection {
    pub fn from_str(dirn: &str) -> Result<Self, DataError> {
        match dirn.to_lowercase().as_str() {
            "up" => Ok(SweepDirection::Up),
            "down" => Ok(SweepDirection::Down),
            _ => Err(DataError::InvalidDirection(dirn.to_string())),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SweepDirection::Up => "up",
            SweepDirection::Down => "down",
        }
    }
}

/// Named sum-of-cosines window coefficient sets.
///
/// The generalized window is
/// `w[n] = a0 - a1*cos(2*pi*n/(N-1)) + a2*cos(4*pi*n/(N-1))
///            - a3*cos(6*pi*n/(N-1)) + a4*cos(8*pi*n/(N-1))`.
pub enum CosineWindow {
    Hann,
    Hamming,
    Blackman,
    ExactBlackman,
    Nuttall,
    BlackmanNuttall,
    BlackmanHarris,
    FlatTop,
    Custom([f64; 5]),
}

impl CosineWindow {
    /// Creates a `CosineWindow` from a name, optionally with caller-supplied
    /// coefficients. `Custom` requires the coefficient set.
    pub fn from_name(name: &str, coefficients: Option<[f64; 5]>) -> Result<Self, DataError> {
        match name.to_lowercase().as_str() {
            "hann" => Ok(CosineWindow::Hann),
            "hamming" => Ok(CosineWindow::Hamming),
            "blackman" => Ok(CosineWindow::Blackman),
            "exact blackman" => Ok(CosineWindow::ExactBlackman),
            "nuttall" => Ok(CosineWindow::Nuttall),
            "blackman-nuttall" => Ok(CosineWindow::BlackmanNuttall),
            "blackman-harris" => Ok(CosineWindow::BlackmanHarris),
            "flat top" => Ok(CosineWindow::FlatTop),
            "custom" => match coefficients {
                Some(coeffs) => Ok(CosineWindow::Custom(coeffs)),
                None => Err(DataError::InvalidWindow(
                    "custom window requires a coefficient set".to_string(),
                )),
            },
            _ => Err(DataError::InvalidWindow(name.to_string())),
        }
    }

    /// Returns the `[a0, a1, a2, a3, a4]` coefficient set.
    pub fn coefficients(&self) -> [f64; 5] {
        match self {
            CosineWindow::Hann => [0.5, 0.5, 0.0, 0.0, 0.0],
            CosineWindow::Hamming => [0.54, 0.46, 0.0, 0.0, 0.0],
            CosineWindow::Blackman => [0.42, 0.5, 0.08, 0.0, 0.0],
            CosineWindow::ExactBlackman => {
                [7938.0 / 18608.0, 9240.0 / 18608.0, 1430.0 / 18608.0, 0.0, 0.0]
            }
            CosineWindow::Nuttall => [0.355768, 0.487396, 0.144232, 0.012604, 0.0],
            CosineWindow::BlackmanNuttall => {
                [0.3635819, 0.4891775, 0.1365995, 0.0106411, 0.0]
            }
            CosineWindow::BlackmanHarris => [0.35875, 0.48829, 0.14128, 0.01168, 0.0],
            CosineWindow::FlatTop => {
                [0.21557895, 0.41663158, 0.277263158, 0.083578947, 0.006947368]
            }
            CosineWindow::Custom(coeffs) => *coeffs,
        }
    }
}
