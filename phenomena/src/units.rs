//! Calibration constants for spectral measurements.

use serde::{Deserialize, Serialize};

/// Spectral dispersion of the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dispersion {
    angstroms_per_pixel: f64,
}

impl Dispersion {
    /// Create a dispersion from an angstroms-per-pixel value.
    pub fn of_angstroms_per_pixel(value: f64) -> Self {
        Self {
            angstroms_per_pixel: value,
        }
    }

    /// Dispersion in angstroms per pixel.
    pub fn angstroms_per_pixel(&self) -> f64 {
        self.angstroms_per_pixel
    }
}

/// A wavelength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wavelen {
    angstroms: f64,
}

impl Wavelen {
    /// Create a wavelength from a value in angstroms.
    pub fn of_angstroms(value: f64) -> Self {
        Self { angstroms: value }
    }

    /// Wavelength in angstroms.
    pub fn angstroms(&self) -> f64 {
        self.angstroms
    }
}
