//! Vectorial pupil functions on the centered lateral frequency grid.
//!
//! The pupil collects everything the objective does to a plane-wave
//! component before propagation: the hard aperture cutoff at NA/lambda,
//! the obliquity apodization, the aberration phase and the polarization
//! rotation into the focal region. Frequencies are in cycles per length
//! unit with DC at `len/2` on each axis.

use crate::params::{PathParams, Polarization, Sampling};
use crate::{freq_res, PsfError};
use log::warn;
use ndarray::{Array2, Zip};
use num_complex::Complex;

/// A sampled pupil function and its geometry.
///
/// `components` holds one array for scalar paths, or the x/y/z field
/// components for vectorial ones. `kz` is the axial spatial frequency of each
/// plane-wave component (zero outside the aperture); `mask` marks the
/// in-aperture pixels.
#[derive(Clone, Debug)]
pub struct Pupil {
    pub components: Vec<Array2<Complex<f64>>>,
    pub kz: Array2<f64>,
    pub mask: Array2<bool>,
    pub freq_res: (f64, f64),
}

impl Pupil {
    pub fn shape(&self) -> [usize; 2] {
        let s = self.components[0].shape();
        [s[0], s[1]]
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

/// Builds the pupil of one optical path on a `[ny, nx]` grid whose real-space
/// spacings are `sampling.dy`/`sampling.dx`.
///
/// The pupil is normalized so the mean of the summed component energy over
/// the in-aperture pixels is 1; with any non-flat apodization this leaves the
/// on-axis value of the dominant component slightly above 1.
pub fn pupil(shape: [usize; 2], params: &PathParams, sampling: Sampling) -> Result<Pupil, PsfError> {
    params.validate()?;
    sampling.validate()?;
    let (ny, nx) = (shape[0], shape[1]);
    if ny < 2 || nx < 2 {
        return Err(PsfError::InvalidGrid(format!(
            "pupil grid must be at least 2x2: {}x{}",
            ny, nx
        )));
    }

    let (dfy, dfx) = freq_res(&shape, (sampling.dy, sampling.dx));
    let cutoff = params.cutoff();
    let kn = params.medium_wavenumber();
    let sin_alpha = params.sin_alpha();

    // positive-frequency extent of the grid on its tighter axis
    let fy_max = (ny - 1 - ny / 2) as f64 * dfy;
    let fx_max = (nx - 1 - nx / 2) as f64 * dfx;
    if cutoff > fy_max || cutoff > fx_max {
        warn!(
            "aperture cutoff {:.4} exceeds the lateral frequency extent ({:.4}, {:.4}); the pupil is clipped",
            cutoff, fy_max, fx_max
        );
    }

    let mut kz = Array2::<f64>::zeros([ny, nx]);
    let mut mask = Array2::<bool>::from_elem([ny, nx], false);
    Zip::indexed(&mut kz).and(&mut mask).par_for_each(|(y, x), kz, m| {
        let fy = (y as f64 - (ny / 2) as f64) * dfy;
        let fx = (x as f64 - (nx / 2) as f64) * dfx;
        let rho_sq = (fy * fy + fx * fx) / (cutoff * cutoff);
        if rho_sq <= 1.0 {
            *m = true;
            let st = rho_sq.sqrt() * sin_alpha;
            *kz = kn * (1.0 - st * st).max(0.0).sqrt();
        }
    });

    let n_components = params.polarization.component_count();
    let mut components = Vec::with_capacity(n_components);
    for comp in 0..n_components {
        let mut values = Array2::<Complex<f64>>::zeros([ny, nx]);
        Zip::indexed(&mut values).par_for_each(|(y, x), e| {
            let fy = (y as f64 - (ny / 2) as f64) * dfy;
            let fx = (x as f64 - (nx / 2) as f64) * dfx;
            let rho_sq = (fy * fy + fx * fx) / (cutoff * cutoff);
            if rho_sq > 1.0 {
                return;
            }
            let rho = rho_sq.sqrt();
            let st = rho * sin_alpha;
            let ct = (1.0 - st * st).max(0.0).sqrt();
            let phi = fy.atan2(fx);

            let mut value = Complex::new(params.apodization.factor(ct), 0.0);
            if !params.aberrations.is_empty() {
                value = value * Complex::new(0.0, params.aberrations.phase(rho, phi)).exp();
            }
            if n_components > 1 {
                let (cp, sp) = (phi.cos(), phi.sin());
                value = value * rotate_into_focus(&params.polarization, ct, st, cp, sp)[comp];
            }
            *e = value;
        });
        components.push(values);
    }

    // unit mean energy over the aperture, jointly across components
    let in_aperture = mask.iter().filter(|&&m| m).count();
    if in_aperture > 0 {
        let total: f64 = components
            .iter()
            .map(|c| c.iter().fold(0.0, |sum, v| sum + v.norm_sqr()))
            .sum();
        if total > 0.0 {
            let scale = (in_aperture as f64 / total).sqrt();
            for c in &mut components {
                c.par_map_inplace(|e| *e = *e * scale);
            }
        }
    }

    Ok(Pupil {
        components,
        kz,
        mask,
        freq_res: (dfy, dfx),
    })
}

/// Rotates the input polarization (or dipole orientation) from the pupil
/// plane onto the converging wavefront for the direction given by
/// cos/sin of the polar angle and azimuth. This is the meridional rotation
/// that tilts the radial component toward -z and produces the axial field
/// term; the azimuthal component is untouched.
pub(crate) fn rotate_into_focus(
    pol: &Polarization,
    ct: f64,
    st: f64,
    cp: f64,
    sp: f64,
) -> [Complex<f64>; 3] {
    let (ax, ay, az): (Complex<f64>, Complex<f64>, Complex<f64>) = match pol {
        Polarization::LinearX => (Complex::new(1.0, 0.0), Complex::new(0.0, 0.0), Complex::new(0.0, 0.0)),
        Polarization::LinearY => (Complex::new(0.0, 0.0), Complex::new(1.0, 0.0), Complex::new(0.0, 0.0)),
        Polarization::Circular => {
            let r = std::f64::consts::FRAC_1_SQRT_2;
            (Complex::new(r, 0.0), Complex::new(0.0, r), Complex::new(0.0, 0.0))
        }
        Polarization::Dipole(d) => {
            let norm = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
            if norm > 0.0 {
                (
                    Complex::new(d[0] / norm, 0.0),
                    Complex::new(d[1] / norm, 0.0),
                    Complex::new(d[2] / norm, 0.0),
                )
            } else {
                (Complex::new(0.0, 0.0), Complex::new(0.0, 0.0), Complex::new(0.0, 0.0))
            }
        }
        Polarization::Scalar => {
            // scalar paths never reach the rotation
            (Complex::new(1.0, 0.0), Complex::new(0.0, 0.0), Complex::new(0.0, 0.0))
        }
    };

    let m00 = ct * cp * cp + sp * sp;
    let m01 = (ct - 1.0) * cp * sp;
    let m02 = st * cp;
    let m11 = ct * sp * sp + cp * cp;
    let m12 = st * sp;

    [
        ax * m00 + ay * m01 + az * m02,
        ax * m01 + ay * m11 + az * m12,
        ax * (-st * cp) + ay * (-st * sp) + az * ct,
    ]
}
