//! Point-spread-function engine for fluorescence microscopes.
//!
//! Builds vectorial pupil functions, propagates them to 3D amplitude spread
//! functions (ASFs) with several independent methods, and composes intensity
//! PSFs for widefield, confocal, ISM, two-photon and 4Pi imaging.
//!
//! Conventions used throughout: volumes are indexed `[z, y, x]` and grid
//! shapes given in that order; all transforms are unitary and centered (DC at
//! `len/2` on each axis); every length shares the unit of the wavelength.

pub mod error;
pub mod fft;
pub mod modes;
pub mod params;
pub mod pinhole;
pub mod propagate;
pub mod pupil;
pub mod resample;
pub mod zernike;

pub use error::PsfError;
pub use modes::{psf, PsfOptions, PsfOutput};
pub use params::{
    Aberrations, Apodization, Mode, PathParams, Polarization, Sampling, ZernikeTerm,
};
pub use pinhole::{PinholeShape, PinholeSize};
pub use propagate::{
    asf, asf_direct, asf_iterative, asf_richards_wolf, asf_shell, asf_sincr, AsfMethod,
};
pub use pupil::{pupil, Pupil};
pub use resample::{resampled_asf, upsample_amplitude, upsample_intensity};

use ndarray::{Array3, Zip};
use num_complex::Complex;

/// An amplitude spread function sampled on a volume grid.
///
/// Scalar paths carry one component, vectorial paths the x, y and z field
/// components in that order. Squaring and summing the components gives the
/// intensity.
#[derive(Clone, Debug)]
pub struct Amplitude {
    pub components: Vec<Array3<Complex<f64>>>,
    pub sampling: Sampling,
}

impl Amplitude {
    pub fn shape(&self) -> [usize; 3] {
        let s = self.components[0].shape();
        [s[0], s[1], s[2]]
    }

    /// Sum of |A|^2 over all field components.
    pub fn intensity(&self) -> Intensity {
        let mut values = Array3::<f64>::zeros(self.shape());
        for c in &self.components {
            Zip::from(&mut values).and(c).par_for_each(|v, a| {
                *v += a.norm_sqr();
            });
        }
        Intensity {
            values,
            sampling: self.sampling,
        }
    }

    /// Total of the squared norm over the volume and all components.
    pub fn total_energy(&self) -> f64 {
        self.components
            .iter()
            .map(|c| c.iter().fold(0.0, |sum, v| sum + v.norm_sqr()))
            .sum()
    }

    pub(crate) fn scale(&mut self, s: f64) {
        for c in &mut self.components {
            c.par_map_inplace(|e| *e = *e * s);
        }
    }

    /// Rescales so the mean per-plane energy is 1 (total energy equals the
    /// plane count). All propagation methods share this normalization so
    /// their outputs are directly comparable.
    pub(crate) fn normalize_mean_plane_energy(&mut self) {
        let total = self.total_energy();
        if total > 0.0 {
            let nz = self.shape()[0] as f64;
            self.scale((nz / total).sqrt());
        }
    }
}

/// A real intensity volume (a PSF) sampled on a volume grid.
#[derive(Clone, Debug)]
pub struct Intensity {
    pub values: Array3<f64>,
    pub sampling: Sampling,
}

impl Intensity {
    pub fn shape(&self) -> [usize; 3] {
        let s = self.values.shape();
        [s[0], s[1], s[2]]
    }

    /// Lateral sum over one z plane.
    pub fn plane_sum(&self, iz: usize) -> f64 {
        self.values.index_axis(ndarray::Axis(0), iz).sum()
    }

    /// Index of the focal (central) z plane.
    pub fn focal_plane(&self) -> usize {
        self.shape()[0] / 2
    }

    /// Rescales so the focal plane sums to 1. Widefield PSFs conserve the
    /// lateral integral along z, so this puts every plane near unit sum.
    pub(crate) fn normalize_focal_plane(&mut self) {
        let sum = self.plane_sum(self.focal_plane());
        if sum > 0.0 {
            let s = 1.0 / sum;
            self.values.par_map_inplace(|v| *v *= s);
        }
    }
}

/// Radius of Airy pattern from the central peak to the first minimum
///
/// * na - numerical aperture
/// * lambda - wavelength of light
pub fn airy_radius(na: f64, lambda: f64) -> f64 {
    1.22 * 0.5 * lambda / na
}

/// Diameter of the Airy disc central lobe; the Airy unit that pinhole sizes
/// are quoted in.
///
/// * na - numerical aperture
/// * lambda - wavelength of light
pub fn airy_unit(na: f64, lambda: f64) -> f64 {
    2.0 * airy_radius(na, lambda)
}

/// Abbe lateral resolution limit, lambda / (2 NA).
pub fn abbe_limit(p: &PathParams) -> f64 {
    p.wavelength / (2.0 * p.na)
}

/// Coarsest grid spacings that still sample the intensity band of the path.
///
/// The intensity band doubles the amplitude support: laterally 2 NA / lambda,
/// axially 2 n (1 - cos(alpha)) / lambda.
pub fn nyquist_sampling(p: &PathParams) -> Sampling {
    let lateral = p.wavelength / (4.0 * p.na);
    let axial = p.wavelength / (4.0 * p.refractive_index * (1.0 - p.cos_alpha()));
    Sampling {
        dx: lateral,
        dy: lateral,
        dz: axial,
    }
}

/// Axial spacing needed to hold the amplitude carrier n / lambda without
/// folding. The frequency-space propagation methods place the Ewald shell on
/// the axial frequency axis directly and warn against this limit rather than
/// the looser intensity one.
pub fn amplitude_axial_limit(p: &PathParams) -> f64 {
    p.wavelength / (2.0 * p.refractive_index)
}

/// Combined axial Nyquist spacing for coherent two-sided (4Pi) imaging.
///
/// Each two-sided path spans an axial amplitude band of 2 n / lambda; the
/// excitation and emission bands add, giving a harmonic-mean-like combination
/// of the per-path spacings.
pub fn combined_axial_nyquist(ex: &PathParams, em: &PathParams) -> f64 {
    let b_ex = 2.0 * ex.refractive_index / ex.wavelength;
    let b_em = 2.0 * em.refractive_index / em.wavelength;
    1.0 / (2.0 * (b_ex + b_em))
}

pub(crate) fn div_up(num: usize, denom: usize) -> usize {
    (num + denom - 1) / denom
}

pub(crate) fn freq_res(array_shape: &[usize], spatial_res: (f64, f64)) -> (f64, f64) {
    (
        1.0 / (spatial_res.0 * array_shape[0] as f64),
        1.0 / (spatial_res.1 * array_shape[1] as f64),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn airy_conventions() {
        let au = airy_unit(1.2, 0.52);
        assert!((au - 1.22 * 0.52 / 1.2).abs() < 1e-12);
        assert!((au - 2.0 * airy_radius(1.2, 0.52)).abs() < 1e-12);
    }

    #[test]
    fn sampling_limits() {
        let p = PathParams::new(0.5, 1.0, 1.5).unwrap();
        assert!((abbe_limit(&p) - 0.25).abs() < 1e-12);
        let nyq = nyquist_sampling(&p);
        assert!((nyq.dx - 0.125).abs() < 1e-12);
        assert_eq!(nyq.dx, nyq.dy);
        let cos_alpha = (1.0f64 - (1.0 / 1.5f64).powi(2)).sqrt();
        let expected_dz = 0.5 / (4.0 * 1.5 * (1.0 - cos_alpha));
        assert!((nyq.dz - expected_dz).abs() < 1e-12);
        assert!((amplitude_axial_limit(&p) - 0.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn combined_axial_rule_is_tighter_than_each_path() {
        let ex = PathParams::new(0.9, 1.2, 1.33).unwrap();
        let em = PathParams::new(0.52, 1.2, 1.33).unwrap();
        let combined = combined_axial_nyquist(&ex, &em);
        let two_sided_ex = 1.0 / (2.0 * 2.0 * ex.refractive_index / ex.wavelength);
        let two_sided_em = 1.0 / (2.0 * 2.0 * em.refractive_index / em.wavelength);
        assert!(combined < two_sided_ex);
        assert!(combined < two_sided_em);
        // harmonic-mean-like: 1/combined = 1/ex + 1/em
        assert!((1.0 / combined - (1.0 / two_sided_ex + 1.0 / two_sided_em)).abs() < 1e-9);
    }

    #[test]
    fn intensity_sums_component_energy() {
        use ndarray::Array3;
        use num_complex::Complex;
        let mut comps = Vec::new();
        for scale in [1.0f64, 2.0] {
            comps.push(Array3::from_elem([2, 2, 2], Complex::new(scale, scale)));
        }
        let a = Amplitude {
            components: comps,
            sampling: Sampling {
                dx: 0.1,
                dy: 0.1,
                dz: 0.2,
            },
        };
        let i = a.intensity();
        // |1+i|^2 + |2+2i|^2 = 2 + 8
        assert!((i.values[[0, 0, 0]] - 10.0).abs() < 1e-12);
        assert!((a.total_energy() - 80.0).abs() < 1e-12);
        assert_eq!(i.focal_plane(), 1);
        assert!((i.plane_sum(0) - 40.0).abs() < 1e-12);
    }
}
