//! Propagation of a pupil to a 3D amplitude spread function.
//!
//! Five independent methods produce the same field up to their respective
//! discretization artefacts. The plane-by-plane methods (`Direct`,
//! `Iterative`) defocus the pupil and transform each z plane separately; the
//! volume methods (`Shell`, `SincR`) build the Ewald-sphere spectrum and
//! transform once; `RichardsWolf` evaluates the vectorial diffraction
//! integral by quadrature and serves as the reference the grid methods are
//! checked against. All outputs share the unit mean-plane-energy
//! normalization.

use crate::fft::{fft2c, fft3c, ifft2c, ifft3c};
use crate::params::{PathParams, Sampling};
use crate::pupil::{pupil, rotate_into_focus};
use crate::{amplitude_axial_limit, div_up, Amplitude, PsfError};
use log::warn;
use ndarray::{Array2, Array3, Axis, Zip};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Default number of border-cleanup sweeps of the iterative method.
const ITERATIONS: usize = 2;

/// Selects how the amplitude spread function is computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsfMethod {
    /// Defocused pupil, one 2D transform per plane.
    Direct,
    /// `Direct` plus border-cleanup sweeps against lateral wrap-around.
    #[default]
    Iterative,
    /// Pupil deposited on the Ewald sphere, one 3D transform.
    Shell,
    /// Spherical-shell spectrum synthesized from a real-space sinc ball.
    SincR,
    /// Richards-Wolf quadrature over the aperture cap.
    RichardsWolf,
}

/// Computes the ASF of one optical path with the given method.
///
/// `shape` is `[nz, ny, nx]`; the focus sits at `len/2` on every axis.
pub fn asf(
    method: AsfMethod,
    shape: [usize; 3],
    params: &PathParams,
    sampling: Sampling,
) -> Result<Amplitude, PsfError> {
    match method {
        AsfMethod::Direct => asf_direct(shape, params, sampling),
        AsfMethod::Iterative => asf_iterative(shape, params, sampling),
        AsfMethod::Shell => asf_shell(shape, params, sampling),
        AsfMethod::SincR => asf_sincr(shape, params, sampling),
        AsfMethod::RichardsWolf => asf_richards_wolf(shape, params, sampling),
    }
}

/// Plane-by-plane angular spectrum propagation: each z plane is the centered
/// inverse transform of the defocused pupil.
pub fn asf_direct(
    shape: [usize; 3],
    params: &PathParams,
    sampling: Sampling,
) -> Result<Amplitude, PsfError> {
    check_axial(shape)?;
    let p = pupil([shape[1], shape[2]], params, sampling)?;
    let nz = shape[0];

    let mut components = Vec::with_capacity(p.component_count());
    for c in &p.components {
        let mut vol = Array3::<Complex<f64>>::zeros(shape);
        for iz in 0..nz {
            let z = axial_offset(iz, nz, sampling.dz);
            let plane = ifft2c(defocused_plane(c, &p.kz, z));
            vol.index_axis_mut(Axis(0), iz).assign(&plane);
        }
        components.push(vol);
    }

    let mut a = Amplitude {
        components,
        sampling,
    };
    a.normalize_mean_plane_energy();
    Ok(a)
}

/// Angular spectrum propagation with border-cleanup sweeps.
///
/// Energy that defocus pushes across the lateral boundary wraps around on a
/// finite grid. Each sweep tapers the wrapped field near the border, returns
/// to the pupil plane and re-pins the in-aperture values, so the borders are
/// progressively served by out-of-aperture spectrum instead of wrapped
/// energy.
pub fn asf_iterative(
    shape: [usize; 3],
    params: &PathParams,
    sampling: Sampling,
) -> Result<Amplitude, PsfError> {
    asf_iterative_with(shape, params, sampling, ITERATIONS)
}

/// `asf_iterative` with an explicit sweep count. Zero sweeps reduce to the
/// direct method.
pub fn asf_iterative_with(
    shape: [usize; 3],
    params: &PathParams,
    sampling: Sampling,
    iterations: usize,
) -> Result<Amplitude, PsfError> {
    check_axial(shape)?;
    let p = pupil([shape[1], shape[2]], params, sampling)?;
    let nz = shape[0];
    let taper = border_taper([shape[1], shape[2]]);

    let mut components = Vec::with_capacity(p.component_count());
    for c in &p.components {
        let mut vol = Array3::<Complex<f64>>::zeros(shape);
        for iz in 0..nz {
            let z = axial_offset(iz, nz, sampling.dz);
            let pinned = defocused_plane(c, &p.kz, z);
            let mut spectrum = pinned.clone();
            for _ in 0..iterations {
                let mut field = ifft2c(spectrum);
                Zip::from(&mut field).and(&taper).par_for_each(|e, &t| {
                    *e = *e * t;
                });
                spectrum = fft2c(field);
                Zip::from(&mut spectrum)
                    .and(&pinned)
                    .and(&p.mask)
                    .par_for_each(|s, d, &m| {
                        if m {
                            *s = *d;
                        }
                    });
            }
            vol.index_axis_mut(Axis(0), iz).assign(&ifft2c(spectrum));
        }
        components.push(vol);
    }

    let mut a = Amplitude {
        components,
        sampling,
    };
    a.normalize_mean_plane_energy();
    Ok(a)
}

/// Ewald-sphere deposit: every pupil pixel is placed at its axial frequency
/// in the 3D spectrum, split linearly over the two nearest axial bins, and
/// the whole volume is produced by a single 3D transform.
///
/// Axial frequencies beyond the grid fold modulo the axial band, matching
/// the implicit aliasing of the plane-by-plane defocus phase.
pub fn asf_shell(
    shape: [usize; 3],
    params: &PathParams,
    sampling: Sampling,
) -> Result<Amplitude, PsfError> {
    check_axial(shape)?;
    let p = pupil([shape[1], shape[2]], params, sampling)?;
    warn_axial_carrier(params, sampling);
    let nz = shape[0];
    let dfz = 1.0 / (nz as f64 * sampling.dz);

    let mut components = Vec::with_capacity(p.component_count());
    for c in &p.components {
        let mut spectrum = Array3::<Complex<f64>>::zeros(shape);
        for ((y, x), &v) in c.indexed_iter() {
            if !p.mask[[y, x]] {
                continue;
            }
            let t = p.kz[[y, x]] / dfz + (nz / 2) as f64;
            let i0 = t.floor();
            let frac = t - i0;
            let lo = (i0 as isize).rem_euclid(nz as isize) as usize;
            let hi = (i0 as isize + 1).rem_euclid(nz as isize) as usize;
            spectrum[[lo, y, x]] += v * (1.0 - frac);
            spectrum[[hi, y, x]] += v * frac;
        }
        components.push(ifft3c(spectrum));
    }

    let mut a = Amplitude {
        components,
        sampling,
    };
    a.normalize_mean_plane_energy();
    Ok(a)
}

/// Shell synthesis from real space: the spectrum of sinc(2 pi k r) is a
/// uniform spherical shell of radius k, so transforming the sampled ball,
/// windowing to the forward hemisphere inside the aperture and weighting by
/// the pupil leaves exactly the Ewald cap, without committing to an axial
/// bin split.
pub fn asf_sincr(
    shape: [usize; 3],
    params: &PathParams,
    sampling: Sampling,
) -> Result<Amplitude, PsfError> {
    check_axial(shape)?;
    let p = pupil([shape[1], shape[2]], params, sampling)?;
    warn_axial_carrier(params, sampling);
    let nz = shape[0];
    let kn = params.medium_wavenumber();
    let dfz = 1.0 / (nz as f64 * sampling.dz);

    let mut ball = Array3::<Complex<f64>>::zeros(shape);
    Zip::indexed(&mut ball).par_for_each(|(z, y, x), e| {
        let rz = axial_offset(z, nz, sampling.dz);
        let ry = (y as f64 - (shape[1] / 2) as f64) * sampling.dy;
        let rx = (x as f64 - (shape[2] / 2) as f64) * sampling.dx;
        let t = 2.0 * PI * kn * (rz * rz + ry * ry + rx * rx).sqrt();
        let s = if t == 0.0 { 1.0 } else { t.sin() / t };
        *e = Complex::new(s, 0.0);
    });
    let shell = fft3c(ball);

    let mut components = Vec::with_capacity(p.component_count());
    for c in &p.components {
        let mut spectrum = shell.clone();
        for iz in 0..nz {
            let fz = (iz as f64 - (nz / 2) as f64) * dfz;
            let forward = fz > 0.0;
            Zip::from(spectrum.index_axis_mut(Axis(0), iz))
                .and(c)
                .and(&p.mask)
                .par_for_each(|s, &w, &m| {
                    if forward && m {
                        *s = *s * w;
                    } else {
                        *s = Complex::new(0.0, 0.0);
                    }
                });
        }
        components.push(ifft3c(spectrum));
    }

    let mut a = Amplitude {
        components,
        sampling,
    };
    a.normalize_mean_plane_energy();
    Ok(a)
}

/// Richards-Wolf diffraction integral by midpoint quadrature over the
/// aperture cap.
///
/// The integrand carries the same apodization, aberration phase and
/// polarization rotation as the pupil, times the cos(theta) sin(theta)
/// Jacobian that maps the cap onto the lateral frequency plane, so the
/// quadrature converges to the same field the grid methods discretize.
pub fn asf_richards_wolf(
    shape: [usize; 3],
    params: &PathParams,
    sampling: Sampling,
) -> Result<Amplitude, PsfError> {
    check_axial(shape)?;
    params.validate()?;
    sampling.validate()?;
    let (nz, ny, nx) = (shape[0], shape[1], shape[2]);
    let kn = params.medium_wavenumber();
    let sin_alpha = params.sin_alpha();
    let alpha = sin_alpha.asin();
    let n_components = params.polarization.component_count();

    let n_theta = 24usize.max(div_up(ny.max(nx), 2));
    let n_phi = 2 * n_theta;
    let d_theta = alpha / n_theta as f64;
    let d_phi = 2.0 * PI / n_phi as f64;

    let mut directions = Vec::with_capacity(n_theta * n_phi);
    let mut coefficients = Vec::with_capacity(n_theta * n_phi);
    for it in 0..n_theta {
        let theta = (it as f64 + 0.5) * d_theta;
        let (st, ct) = theta.sin_cos();
        let weight = params.apodization.factor(ct) * ct * st * d_theta * d_phi;
        let rho = st / sin_alpha;
        for ip in 0..n_phi {
            let phi = (ip as f64 + 0.5) * d_phi;
            let (sp, cp) = phi.sin_cos();
            let mut base = Complex::new(weight, 0.0);
            if !params.aberrations.is_empty() {
                base = base * Complex::new(0.0, params.aberrations.phase(rho, phi)).exp();
            }
            let pol = if n_components > 1 {
                rotate_into_focus(&params.polarization, ct, st, cp, sp)
            } else {
                [
                    Complex::new(1.0, 0.0),
                    Complex::new(0.0, 0.0),
                    Complex::new(0.0, 0.0),
                ]
            };
            coefficients.push([base * pol[0], base * pol[1], base * pol[2]]);
            directions.push([st * cp, st * sp, ct]);
        }
    }

    let mut components = Vec::with_capacity(n_components);
    for comp in 0..n_components {
        let mut vol = Array3::<Complex<f64>>::zeros(shape);
        Zip::indexed(&mut vol).par_for_each(|(z, y, x), e| {
            let rz = axial_offset(z, nz, sampling.dz);
            let ry = (y as f64 - (ny / 2) as f64) * sampling.dy;
            let rx = (x as f64 - (nx / 2) as f64) * sampling.dx;
            let mut sum = Complex::new(0.0, 0.0);
            for (d, cf) in directions.iter().zip(&coefficients) {
                let phase = 2.0 * PI * kn * (rx * d[0] + ry * d[1] + rz * d[2]);
                sum += cf[comp] * Complex::new(0.0, phase).exp();
            }
            *e = sum;
        });
        components.push(vol);
    }

    let mut a = Amplitude {
        components,
        sampling,
    };
    a.normalize_mean_plane_energy();
    Ok(a)
}

fn check_axial(shape: [usize; 3]) -> Result<(), PsfError> {
    if shape[0] == 0 {
        return Err(PsfError::InvalidGrid("empty axial axis".to_string()));
    }
    Ok(())
}

/// z offset of plane `iz` from the focus at `nz / 2`.
fn axial_offset(iz: usize, nz: usize, dz: f64) -> f64 {
    (iz as f64 - (nz / 2) as f64) * dz
}

fn defocused_plane(
    pupil_plane: &Array2<Complex<f64>>,
    kz: &Array2<f64>,
    z: f64,
) -> Array2<Complex<f64>> {
    let mut plane = pupil_plane.clone();
    Zip::from(&mut plane).and(kz).par_for_each(|e, &k| {
        *e = *e * Complex::new(0.0, 2.0 * PI * k * z).exp();
    });
    plane
}

/// Separable window that is 1 in the interior and ramps linearly to 0 at the
/// lateral borders over one eighth of each axis.
fn border_taper(shape: [usize; 2]) -> Array2<f64> {
    let ramp = |i: usize, len: usize| -> f64 {
        let width = (len / 8).max(1) as f64;
        let edge_distance = i.min(len - 1 - i) as f64;
        (edge_distance / width).min(1.0)
    };
    Array2::from_shape_fn(shape, |(y, x)| ramp(y, shape[0]) * ramp(x, shape[1]))
}

/// The 3D-spectrum methods place the carrier n/lambda on the axial frequency
/// axis directly; past this limit it folds back onto the grid, exactly as the
/// plane-by-plane defocus phase aliases when sampled at the same spacing.
fn warn_axial_carrier(params: &PathParams, sampling: Sampling) {
    let limit = amplitude_axial_limit(params);
    if sampling.dz > limit {
        warn!(
            "axial sampling {:.4} cannot hold the amplitude carrier (limit {:.4}); the shell folds onto the grid",
            sampling.dz, limit
        );
    }
}
