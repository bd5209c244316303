use crate::error::PsfError;
use crate::zernike;
use serde::{Deserialize, Serialize};

/// Imaging modality selected when composing a PSF.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Widefield,
    Confocal,
    Ism,
    TwoPhoton,
    FourPi,
}

/// Amplitude weighting applied over the aperture as a power of the obliquity
/// factor cos(theta).
///
/// Illumination weights by cos(theta)^(1/2) (energy conservation of the
/// converging cone), detection by cos(theta)^(3/2) (the additional solid-angle
/// projection of collection).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Apodization {
    None,
    Illumination,
    Detection,
}

impl Apodization {
    pub fn factor(self, cos_theta: f64) -> f64 {
        let ct = cos_theta.max(0.0);
        match self {
            Apodization::None => 1.0,
            Apodization::Illumination => ct.sqrt(),
            Apodization::Detection => ct * ct.sqrt(),
        }
    }
}

/// Polarization state of the optical path.
///
/// `Scalar` drops the vectorial treatment and produces a single field
/// component. The other variants produce x/y/z components including the
/// depolarization term that appears at high aperture angles. `Dipole` takes
/// an orientation vector (normalized internally).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Polarization {
    Scalar,
    LinearX,
    LinearY,
    Circular,
    Dipole([f64; 3]),
}

impl Polarization {
    /// Number of field components the pupil and ASF carry.
    pub fn component_count(&self) -> usize {
        match self {
            Polarization::Scalar => 1,
            _ => 3,
        }
    }
}

/// One aberration term: a Noll-indexed Zernike mode and its amplitude in
/// radians of pupil phase.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZernikeTerm {
    pub noll: usize,
    pub amplitude: f64,
}

/// Ordered set of aberration coefficients, evaluated as a weighted sum of the
/// Zernike basis over the unit aperture disc.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aberrations {
    pub terms: Vec<ZernikeTerm>,
}

impl Aberrations {
    pub fn none() -> Self {
        Aberrations { terms: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Total pupil phase in radians at aperture-normalized radius `rho` and
    /// azimuth `phi`.
    pub fn phase(&self, rho: f64, phi: f64) -> f64 {
        self.terms
            .iter()
            .map(|t| t.amplitude * zernike::evaluate(t.noll, rho, phi))
            .sum()
    }
}

/// Grid spacings along x, y and z, in the same length unit as the wavelength.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sampling {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl Sampling {
    pub fn new(dx: f64, dy: f64, dz: f64) -> Result<Self, PsfError> {
        let s = Sampling { dx, dy, dz };
        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<(), PsfError> {
        if !(self.dx > 0.0 && self.dy > 0.0 && self.dz > 0.0) {
            return Err(PsfError::InvalidGrid(format!(
                "spacings must be positive: ({}, {}, {})",
                self.dx, self.dy, self.dz
            )));
        }
        Ok(())
    }
}

/// Parameters of one optical path (excitation or detection).
///
/// Constructed once and treated as immutable; derived parameter sets are
/// produced with the `with_*` methods, which copy and re-validate.
///
/// * `wavelength` - vacuum wavelength, in the caller's length unit
/// * `na` - numerical aperture of the objective
/// * `refractive_index` - refractive index of the sample medium
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathParams {
    pub wavelength: f64,
    pub na: f64,
    pub refractive_index: f64,
    pub apodization: Apodization,
    pub polarization: Polarization,
    pub aberrations: Aberrations,
}

impl PathParams {
    /// Detection-path defaults: detection apodization, scalar polarization,
    /// no aberrations.
    pub fn new(wavelength: f64, na: f64, refractive_index: f64) -> Result<Self, PsfError> {
        let p = PathParams {
            wavelength,
            na,
            refractive_index,
            apodization: Apodization::Detection,
            polarization: Polarization::Scalar,
            aberrations: Aberrations::none(),
        };
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<(), PsfError> {
        if !(self.wavelength > 0.0) {
            return Err(PsfError::InvalidParameter(format!(
                "wavelength must be positive: {}",
                self.wavelength
            )));
        }
        if !(self.na > 0.0) {
            return Err(PsfError::InvalidParameter(format!(
                "numerical aperture must be positive: {}",
                self.na
            )));
        }
        if !(self.refractive_index > 0.0) {
            return Err(PsfError::InvalidParameter(format!(
                "refractive index must be positive: {}",
                self.refractive_index
            )));
        }
        if self.na > self.refractive_index {
            return Err(PsfError::InvalidParameter(format!(
                "numerical aperture {} exceeds the medium index {}",
                self.na, self.refractive_index
            )));
        }
        Ok(())
    }

    pub fn with_wavelength(&self, wavelength: f64) -> Result<Self, PsfError> {
        let mut p = self.clone();
        p.wavelength = wavelength;
        p.validate()?;
        Ok(p)
    }

    pub fn with_na(&self, na: f64) -> Result<Self, PsfError> {
        let mut p = self.clone();
        p.na = na;
        p.validate()?;
        Ok(p)
    }

    pub fn with_refractive_index(&self, refractive_index: f64) -> Result<Self, PsfError> {
        let mut p = self.clone();
        p.refractive_index = refractive_index;
        p.validate()?;
        Ok(p)
    }

    pub fn with_apodization(&self, apodization: Apodization) -> Self {
        let mut p = self.clone();
        p.apodization = apodization;
        p
    }

    pub fn with_polarization(&self, polarization: Polarization) -> Self {
        let mut p = self.clone();
        p.polarization = polarization;
        p
    }

    pub fn with_aberrations(&self, aberrations: Aberrations) -> Self {
        let mut p = self.clone();
        p.aberrations = aberrations;
        p
    }

    /// sin of the aperture half-angle, NA/n.
    pub fn sin_alpha(&self) -> f64 {
        self.na / self.refractive_index
    }

    /// cos of the aperture half-angle.
    pub fn cos_alpha(&self) -> f64 {
        (1.0 - self.sin_alpha() * self.sin_alpha()).max(0.0).sqrt()
    }

    /// Radial cutoff frequency of the aperture, NA/lambda.
    pub fn cutoff(&self) -> f64 {
        self.na / self.wavelength
    }

    /// Wavenumber in the medium in cycles per length unit, n/lambda.
    pub fn medium_wavenumber(&self) -> f64 {
        self.refractive_index / self.wavelength
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_na_above_medium_index() {
        assert!(PathParams::new(0.52, 1.4, 1.33).is_err());
        assert!(PathParams::new(0.52, 1.2, 1.33).is_ok());
    }

    #[test]
    fn rejects_nonpositive_values() {
        assert!(PathParams::new(0.0, 0.8, 1.0).is_err());
        assert!(PathParams::new(0.52, -0.8, 1.0).is_err());
        assert!(Sampling::new(0.05, 0.05, 0.0).is_err());
        assert!(Sampling::new(0.05, 0.05, 0.1).is_ok());
    }

    #[test]
    fn override_copies_and_revalidates() {
        let em = PathParams::new(0.52, 1.2, 1.33).unwrap();
        let ex = em.with_wavelength(0.488).unwrap();
        assert_eq!(em.wavelength, 0.52);
        assert_eq!(ex.wavelength, 0.488);
        assert_eq!(ex.na, em.na);
        // raising NA past the medium index must fail on override too
        assert!(em.with_na(1.4).is_err());
    }

    #[test]
    fn aperture_angles() {
        let p = PathParams::new(0.5, 1.0, 1.0).unwrap();
        assert!((p.sin_alpha() - 1.0).abs() < 1e-12);
        assert!(p.cos_alpha().abs() < 1e-12);
        let q = PathParams::new(0.5, 0.6, 1.2).unwrap();
        assert!((q.sin_alpha() - 0.5).abs() < 1e-12);
        assert!((q.cos_alpha() - 0.75f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn apodization_powers() {
        let ct: f64 = 0.64;
        assert_eq!(Apodization::None.factor(ct), 1.0);
        assert!((Apodization::Illumination.factor(ct) - ct.sqrt()).abs() < 1e-12);
        assert!((Apodization::Detection.factor(ct) - ct.powf(1.5)).abs() < 1e-12);
        // clamped below the horizon
        assert_eq!(Apodization::Detection.factor(-0.1), 0.0);
    }
}
