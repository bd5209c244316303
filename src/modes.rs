//! Imaging-mode composition: from one or two optical paths to a PSF.
//!
//! Every mode shares the same two front stages (pupil, propagation) through
//! `psf`; the branches differ in how excitation and emission are combined.
//! Intensity bookkeeping is fixed so the limiting cases are exact: widefield
//! output has a unit focal-plane sum, a fully-open pinhole reproduces the
//! excitation PSF unchanged, and 4Pi arms are scaled so a symmetric in-phase
//! pair carries a focal-plane sum of 2.

use crate::error::PsfError;
use crate::params::{Mode, PathParams, Sampling};
use crate::pinhole::{self, Pinhole, PinholeShape, PinholeSize};
use crate::propagate::{asf, AsfMethod};
use crate::resample::resampled_asf;
use crate::{airy_unit, combined_axial_nyquist, freq_res, nyquist_sampling, Amplitude, Intensity};
use log::warn;
use ndarray::{Array3, Zip};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_1_SQRT_2;

/// Options accepted by [`psf`], with working defaults for every field.
///
/// * `sampling` - grid spacings; picked from the sampling limits of the
///   active paths when absent
/// * `method` - propagation method behind every amplitude computation
/// * `use_resampling` - compute amplitudes at half resolution and upsample
/// * `return_amplitude` - return the pre-detection amplitude instead of an
///   intensity; refused for any finite pinhole
/// * `excitation` - second optical path for the modes that need one
/// * `pinhole` - size in Airy units of the emission path; absent means fully
///   open
/// * `pinhole_shape` - transmission profile; defaults to a disc, except ISM
///   which uses boxes
/// * `pinhole_positions` - explicit lateral offsets (x, y) in length units
/// * `pinhole_spacing`, `pinhole_grid` - ISM lattice pitch (Airy units) and
///   shape [gx, gy]
/// * `relative_excitation_phase`, `relative_emission_phase` - 4Pi arm phase
///   in radians; `None` selects single-sided illumination or detection
/// * `two_photon` - square the excitation intensity inside any composition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PsfOptions {
    pub sampling: Option<Sampling>,
    pub method: AsfMethod,
    pub use_resampling: bool,
    pub return_amplitude: bool,
    pub excitation: Option<PathParams>,
    pub pinhole: Option<PinholeSize>,
    pub pinhole_shape: Option<PinholeShape>,
    pub pinhole_positions: Option<Vec<[f64; 2]>>,
    pub pinhole_spacing: f64,
    pub pinhole_grid: [usize; 2],
    pub relative_excitation_phase: Option<f64>,
    pub relative_emission_phase: Option<f64>,
    pub two_photon: bool,
}

impl Default for PsfOptions {
    fn default() -> Self {
        PsfOptions {
            sampling: None,
            method: AsfMethod::default(),
            use_resampling: true,
            return_amplitude: false,
            excitation: None,
            pinhole: None,
            pinhole_shape: None,
            pinhole_positions: None,
            pinhole_spacing: 0.12,
            pinhole_grid: [5, 5],
            relative_excitation_phase: Some(0.0),
            relative_emission_phase: Some(0.0),
            two_photon: false,
        }
    }
}

/// Result of a [`psf`] call.
#[derive(Clone, Debug)]
pub enum PsfOutput {
    Intensity(Intensity),
    /// One intensity per pinhole position (ISM, or any multi-position call).
    Intensities(Vec<Intensity>),
    Amplitude(Amplitude),
}

impl PsfOutput {
    pub fn intensity(&self) -> Option<&Intensity> {
        match self {
            PsfOutput::Intensity(i) => Some(i),
            _ => None,
        }
    }

    pub fn intensities(&self) -> Option<&[Intensity]> {
        match self {
            PsfOutput::Intensities(v) => Some(v),
            _ => None,
        }
    }

    pub fn amplitude(&self) -> Option<&Amplitude> {
        match self {
            PsfOutput::Amplitude(a) => Some(a),
            _ => None,
        }
    }
}

/// Computes the PSF of an imaging mode on a `[nz, ny, nx]` grid.
///
/// `emission` is the detection path; modes that also illuminate take the
/// excitation path from `options`. Configuration errors surface before any
/// numerical work; recoverable physical-limit violations are logged as
/// warnings and the computation continues with the documented fallback.
pub fn psf(
    mode: Mode,
    shape: [usize; 3],
    emission: &PathParams,
    options: &PsfOptions,
) -> Result<PsfOutput, PsfError> {
    emission.validate()?;
    if let Some(ex) = &options.excitation {
        ex.validate()?;
    }
    let sampling = match options.sampling {
        Some(s) => {
            s.validate()?;
            s
        }
        None => auto_sampling(emission, options),
    };
    warn_output_sampling(emission, options, sampling);

    match mode {
        Mode::Widefield => widefield(shape, emission, options, sampling),
        Mode::Confocal => confocal(shape, emission, options, sampling),
        Mode::Ism => ism(shape, emission, options, sampling),
        Mode::TwoPhoton => two_photon(shape, emission, options, sampling),
        Mode::FourPi => four_pi(shape, emission, options, sampling),
    }
}

/// Tightest intensity Nyquist spacing over the supplied paths.
fn auto_sampling(emission: &PathParams, options: &PsfOptions) -> Sampling {
    let mut s = nyquist_sampling(emission);
    if let Some(ex) = &options.excitation {
        let e = nyquist_sampling(ex);
        s = Sampling {
            dx: s.dx.min(e.dx),
            dy: s.dy.min(e.dy),
            dz: s.dz.min(e.dz),
        };
    }
    s
}

fn warn_output_sampling(emission: &PathParams, options: &PsfOptions, sampling: Sampling) {
    let tight = auto_sampling(emission, options);
    if sampling.dx > tight.dx || sampling.dy > tight.dy {
        warn!(
            "lateral sampling ({:.4}, {:.4}) is coarser than the intensity Nyquist spacing ({:.4}, {:.4}); the PSF will alias",
            sampling.dx, sampling.dy, tight.dx, tight.dy
        );
    }
    if sampling.dz > tight.dz {
        warn!(
            "axial sampling {:.4} is coarser than the intensity Nyquist spacing {:.4}; the PSF will alias",
            sampling.dz, tight.dz
        );
    }
}

fn widefield(
    shape: [usize; 3],
    emission: &PathParams,
    options: &PsfOptions,
    sampling: Sampling,
) -> Result<PsfOutput, PsfError> {
    if options.return_amplitude {
        return Ok(PsfOutput::Amplitude(path_asf(
            shape, emission, options, sampling,
        )?));
    }
    let i = normalized_intensity(path_asf(shape, emission, options, sampling)?);
    Ok(PsfOutput::Intensity(i))
}

fn confocal(
    shape: [usize; 3],
    emission: &PathParams,
    options: &PsfOptions,
    sampling: Sampling,
) -> Result<PsfOutput, PsfError> {
    let ex_params = options
        .excitation
        .as_ref()
        .ok_or(PsfError::MissingExcitation {
            mode: Mode::Confocal,
        })?;
    let pin = resolve_pinhole(options, PinholeShape::Disc, emission, shape, sampling, Mode::Confocal)?;
    if options.return_amplitude {
        if pin.is_some() {
            return Err(PsfError::AmplitudeWithPinhole);
        }
        return Ok(PsfOutput::Amplitude(path_asf(
            shape, ex_params, options, sampling,
        )?));
    }

    let mut ex_int = normalized_intensity(path_asf(shape, ex_params, options, sampling)?);
    if options.two_photon {
        square_in_place(&mut ex_int);
    }
    let positions = centered_or(&options.pinhole_positions)?;
    apply_pinhole(
        ex_int,
        || Ok(normalized_intensity(path_asf(shape, emission, options, sampling)?)),
        pin,
        &positions,
        false,
    )
}

fn ism(
    shape: [usize; 3],
    emission: &PathParams,
    options: &PsfOptions,
    sampling: Sampling,
) -> Result<PsfOutput, PsfError> {
    let ex_params = options
        .excitation
        .as_ref()
        .ok_or(PsfError::MissingExcitation { mode: Mode::Ism })?;
    if !(options.pinhole_spacing > 0.0) {
        return Err(PsfError::InvalidParameter(format!(
            "ISM lattice pitch must be positive: {} AU",
            options.pinhole_spacing
        )));
    }

    // default: mutually touching detector cells, one lattice pitch wide
    let size = match options.pinhole {
        Some(s) => {
            let widest = match s {
                PinholeSize::Diameter(d) => d,
                PinholeSize::Axes { x, y } => x.max(y),
            };
            if widest > options.pinhole_spacing {
                warn!(
                    "pinhole ({:.3} AU) exceeds the lattice pitch ({:.3} AU); neighbouring detector cells overlap",
                    widest, options.pinhole_spacing
                );
            }
            s
        }
        None => PinholeSize::Diameter(options.pinhole_spacing),
    };
    let mut sized = options.clone();
    sized.pinhole = Some(size);
    let pin = resolve_pinhole(&sized, PinholeShape::Box, emission, shape, sampling, Mode::Ism)?;
    if options.return_amplitude {
        if pin.is_some() {
            return Err(PsfError::AmplitudeWithPinhole);
        }
        return Ok(PsfOutput::Amplitude(path_asf(
            shape, ex_params, options, sampling,
        )?));
    }

    let mut ex_int = normalized_intensity(path_asf(shape, ex_params, options, sampling)?);
    if options.two_photon {
        square_in_place(&mut ex_int);
    }
    let au = airy_unit(emission.na, emission.wavelength);
    let positions = match &options.pinhole_positions {
        Some(p) if p.is_empty() => {
            return Err(PsfError::InvalidParameter(
                "empty pinhole position list".to_string(),
            ))
        }
        Some(p) => p.clone(),
        None => pinhole::lattice(options.pinhole_grid, options.pinhole_spacing * au),
    };
    if positions.is_empty() {
        return Err(PsfError::InvalidGrid(format!(
            "ISM lattice {:?} has no positions",
            options.pinhole_grid
        )));
    }
    apply_pinhole(
        ex_int,
        || Ok(normalized_intensity(path_asf(shape, emission, options, sampling)?)),
        pin,
        &positions,
        true,
    )
}

fn two_photon(
    shape: [usize; 3],
    emission: &PathParams,
    options: &PsfOptions,
    sampling: Sampling,
) -> Result<PsfOutput, PsfError> {
    if options.pinhole.is_none() {
        // non-descanned detection: the supplied path is the illumination
        if options.pinhole_positions.is_some() {
            return Err(PsfError::MissingPinhole {
                mode: Mode::TwoPhoton,
            });
        }
        if options.return_amplitude {
            return Ok(PsfOutput::Amplitude(path_asf(
                shape, emission, options, sampling,
            )?));
        }
        let mut i = normalized_intensity(path_asf(shape, emission, options, sampling)?);
        square_in_place(&mut i);
        return Ok(PsfOutput::Intensity(i));
    }

    // descanned detection through a pinhole
    let ex_params = options
        .excitation
        .as_ref()
        .ok_or(PsfError::MissingExcitation {
            mode: Mode::TwoPhoton,
        })?;
    let pin = resolve_pinhole(options, PinholeShape::Disc, emission, shape, sampling, Mode::TwoPhoton)?;
    if options.return_amplitude {
        if pin.is_some() {
            return Err(PsfError::AmplitudeWithPinhole);
        }
        return Ok(PsfOutput::Amplitude(path_asf(
            shape, ex_params, options, sampling,
        )?));
    }

    let mut ex_int = normalized_intensity(path_asf(shape, ex_params, options, sampling)?);
    square_in_place(&mut ex_int);
    let positions = centered_or(&options.pinhole_positions)?;
    apply_pinhole(
        ex_int,
        || Ok(normalized_intensity(path_asf(shape, emission, options, sampling)?)),
        pin,
        &positions,
        false,
    )
}

fn four_pi(
    shape: [usize; 3],
    emission: &PathParams,
    options: &PsfOptions,
    sampling: Sampling,
) -> Result<PsfOutput, PsfError> {
    let ex_params = options
        .excitation
        .as_ref()
        .ok_or(PsfError::MissingExcitation { mode: Mode::FourPi })?;
    let combined = combined_axial_nyquist(ex_params, emission);
    if sampling.dz > combined {
        warn!(
            "axial sampling {:.4} exceeds the combined two-sided Nyquist spacing {:.4}; interference fringes will alias",
            sampling.dz, combined
        );
    }

    let pin = resolve_pinhole(options, PinholeShape::Disc, emission, shape, sampling, Mode::FourPi)?;
    if options.return_amplitude {
        if pin.is_some() {
            return Err(PsfError::AmplitudeWithPinhole);
        }
        return Ok(PsfOutput::Amplitude(four_pi_arm(
            shape,
            ex_params,
            options,
            sampling,
            options.relative_excitation_phase,
        )?));
    }

    let mut ex_int = four_pi_arm(
        shape,
        ex_params,
        options,
        sampling,
        options.relative_excitation_phase,
    )?
    .intensity();
    if options.two_photon {
        square_in_place(&mut ex_int);
    }
    let positions = centered_or(&options.pinhole_positions)?;
    apply_pinhole(
        ex_int,
        || {
            Ok(four_pi_arm(
                shape,
                emission,
                options,
                sampling,
                options.relative_emission_phase,
            )?
            .intensity())
        },
        pin,
        &positions,
        false,
    )
}

/// One 4Pi side: the single-arm ASF scaled to a unit focal-plane intensity
/// sum, then coherently combined with its axially mirrored counterpart when
/// a relative phase is given.
///
/// With the scaling fixed per arm, an in-phase symmetric pair doubles the
/// focal-plane sum to 2 while opposed phases cancel it, so the combined
/// intensity reads out interference contrast directly and is deliberately
/// not renormalized.
fn four_pi_arm(
    shape: [usize; 3],
    params: &PathParams,
    options: &PsfOptions,
    sampling: Sampling,
    relative_phase: Option<f64>,
) -> Result<Amplitude, PsfError> {
    let mut a = path_asf(shape, params, options, sampling)?;
    let focal_sum = a.intensity().plane_sum(shape[0] / 2);
    if focal_sum > 0.0 {
        a.scale((1.0 / focal_sum).sqrt());
    }
    let phi = match relative_phase {
        None => return Ok(a),
        Some(phi) => phi,
    };

    let counter = Complex::new(0.0, phi).exp() * FRAC_1_SQRT_2;
    let n_components = a.components.len();
    for (ci, c) in a.components.iter_mut().enumerate() {
        // the counter-propagating arm carries a sign flip on the axial field
        let sigma = if n_components > 1 && ci == 2 { -1.0 } else { 1.0 };
        let mirrored = mirrored_z(c);
        Zip::from(&mut *c).and(&mirrored).par_for_each(|b, &m| {
            *b = *b * FRAC_1_SQRT_2 + counter * sigma * m;
        });
    }
    Ok(a)
}

/// Axially mirrored copy reflected about the focus plane at `nz / 2`. Odd
/// grids pair every plane; on even grids the single edge plane at index 0
/// pairs with itself.
fn mirrored_z(c: &Array3<Complex<f64>>) -> Array3<Complex<f64>> {
    let nz = c.shape()[0];
    let twice_focus = 2 * (nz / 2);
    Array3::from_shape_fn(c.dim(), |(z, y, x)| {
        c[[(twice_focus + nz - z) % nz, y, x]]
    })
}

fn path_asf(
    shape: [usize; 3],
    params: &PathParams,
    options: &PsfOptions,
    sampling: Sampling,
) -> Result<Amplitude, PsfError> {
    if options.use_resampling {
        resampled_asf(options.method, shape, params, sampling)
    } else {
        asf(options.method, shape, params, sampling)
    }
}

fn normalized_intensity(a: Amplitude) -> Intensity {
    let mut i = a.intensity();
    i.normalize_focal_plane();
    i
}

fn square_in_place(i: &mut Intensity) {
    i.values.par_map_inplace(|v| *v = *v * *v);
}

fn centered_or(positions: &Option<Vec<[f64; 2]>>) -> Result<Vec<[f64; 2]>, PsfError> {
    match positions {
        Some(p) if p.is_empty() => Err(PsfError::InvalidParameter(
            "empty pinhole position list".to_string(),
        )),
        Some(p) => Ok(p.clone()),
        None => Ok(vec![[0.0, 0.0]]),
    }
}

/// Resolves the pinhole configuration to physical units, or to `None` for a
/// fully-open detector. Explicit positions demand an explicit size; a
/// pinhole covering the whole field of view degrades to fully open with a
/// warning.
fn resolve_pinhole(
    options: &PsfOptions,
    default_shape: PinholeShape,
    em: &PathParams,
    shape: [usize; 3],
    sampling: Sampling,
    mode: Mode,
) -> Result<Option<Pinhole>, PsfError> {
    let size = match options.pinhole {
        None if options.pinhole_positions.is_some() => {
            return Err(PsfError::MissingPinhole { mode })
        }
        None => return Ok(None),
        Some(s) => s,
    };
    let p = Pinhole::resolve(size, options.pinhole_shape.unwrap_or(default_shape), em)?;
    let fov = (
        shape[2] as f64 * sampling.dx,
        shape[1] as f64 * sampling.dy,
    );
    if p.covers(fov) {
        warn!(
            "pinhole ({:.3}, {:.3}) covers the field of view ({:.3}, {:.3}); treating it as fully open",
            p.extent.0, p.extent.1, fov.0, fov.1
        );
        return Ok(None);
    }
    Ok(Some(p))
}

/// Shared detection stage: multiplies the excitation intensity by the
/// pinhole-filtered emission intensity, once per pinhole position. A
/// fully-open detector skips the emission side entirely and returns the
/// excitation intensity unchanged.
fn apply_pinhole(
    ex_int: Intensity,
    em_int: impl FnOnce() -> Result<Intensity, PsfError>,
    pin: Option<Pinhole>,
    positions: &[[f64; 2]],
    always_list: bool,
) -> Result<PsfOutput, PsfError> {
    let pin = match pin {
        None => {
            return Ok(if always_list {
                PsfOutput::Intensities(vec![ex_int; positions.len()])
            } else {
                PsfOutput::Intensity(ex_int)
            })
        }
        Some(p) => p,
    };

    let em = em_int()?;
    let shape = em.shape();
    let lateral = [shape[1], shape[2]];
    let f_res = freq_res(&lateral, (em.sampling.dy, em.sampling.dx));

    let mut results = Vec::with_capacity(positions.len());
    for pos in positions {
        let mut values = pinhole::filter_intensity(&em, &pin.transfer_function(lateral, f_res, *pos));
        Zip::from(&mut values)
            .and(&ex_int.values)
            .par_for_each(|v, &e| *v *= e);
        results.push(Intensity {
            values,
            sampling: ex_int.sampling,
        });
    }
    if always_list || results.len() > 1 {
        Ok(PsfOutput::Intensities(results))
    } else {
        // a single centered position always exists at this point
        Ok(PsfOutput::Intensity(results.remove(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Apodization;

    fn em() -> PathParams {
        PathParams::new(0.52, 1.2, 1.33).unwrap()
    }

    fn ex() -> PathParams {
        PathParams::new(0.488, 1.2, 1.33)
            .unwrap()
            .with_apodization(Apodization::Illumination)
    }

    fn base() -> PsfOptions {
        PsfOptions {
            sampling: Some(Sampling {
                dx: 0.08,
                dy: 0.08,
                dz: 0.1,
            }),
            ..PsfOptions::default()
        }
    }

    #[test]
    fn documented_defaults() {
        let o = PsfOptions::default();
        assert!(o.sampling.is_none());
        assert_eq!(o.method, AsfMethod::Iterative);
        assert!(o.use_resampling);
        assert!(!o.return_amplitude);
        assert!(o.pinhole.is_none());
        assert_eq!(o.pinhole_spacing, 0.12);
        assert_eq!(o.pinhole_grid, [5, 5]);
        assert_eq!(o.relative_excitation_phase, Some(0.0));
        assert_eq!(o.relative_emission_phase, Some(0.0));
        assert!(!o.two_photon);
    }

    #[test]
    fn widefield_has_unit_focal_plane_sum() {
        let out = psf(Mode::Widefield, [8, 16, 16], &em(), &base()).unwrap();
        let i = out.intensity().unwrap();
        assert_eq!(i.shape(), [8, 16, 16]);
        assert!((i.plane_sum(4) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn widefield_amplitude_on_request() {
        let mut o = base();
        o.return_amplitude = true;
        let out = psf(Mode::Widefield, [4, 12, 12], &em(), &o).unwrap();
        let a = out.amplitude().unwrap();
        assert_eq!(a.components.len(), 1);
        assert_eq!(a.shape(), [4, 12, 12]);
    }

    #[test]
    fn absent_sampling_is_picked_from_the_paths() {
        let out = psf(Mode::Widefield, [4, 8, 8], &em(), &PsfOptions::default()).unwrap();
        let tight = nyquist_sampling(&em());
        let s = out.intensity().unwrap().sampling;
        assert!((s.dx - tight.dx).abs() < 1e-12);
        assert!((s.dz - tight.dz).abs() < 1e-12);
    }

    #[test]
    fn modes_demand_an_excitation_path() {
        for mode in [Mode::Confocal, Mode::Ism, Mode::FourPi] {
            let r = psf(mode, [4, 8, 8], &em(), &base());
            assert!(
                matches!(r, Err(PsfError::MissingExcitation { .. })),
                "{:?}",
                mode
            );
        }
    }

    #[test]
    fn positions_without_a_size_are_rejected() {
        let mut o = base();
        o.excitation = Some(ex());
        o.pinhole_positions = Some(vec![[0.1, 0.0]]);
        let r = psf(Mode::Confocal, [4, 8, 8], &em(), &o);
        assert!(matches!(
            r,
            Err(PsfError::MissingPinhole {
                mode: Mode::Confocal
            })
        ));
    }

    #[test]
    fn amplitude_through_a_pinhole_is_refused() {
        let mut o = base();
        o.excitation = Some(ex());
        o.pinhole = Some(PinholeSize::Diameter(0.5));
        o.return_amplitude = true;
        let r = psf(Mode::Confocal, [4, 16, 16], &em(), &o);
        assert!(matches!(r, Err(PsfError::AmplitudeWithPinhole)));
    }

    #[test]
    fn anisotropic_disc_is_rejected() {
        let mut o = base();
        o.excitation = Some(ex());
        o.pinhole = Some(PinholeSize::Axes { x: 0.5, y: 1.0 });
        let r = psf(Mode::Confocal, [4, 16, 16], &em(), &o);
        assert!(matches!(r, Err(PsfError::AnisotropicDisc(_, _))));
    }

    #[test]
    fn empty_position_list_is_rejected() {
        let mut o = base();
        o.excitation = Some(ex());
        o.pinhole = Some(PinholeSize::Diameter(0.5));
        o.pinhole_positions = Some(Vec::new());
        let r = psf(Mode::Confocal, [4, 16, 16], &em(), &o);
        assert!(matches!(r, Err(PsfError::InvalidParameter(_))));
    }

    #[test]
    fn open_pinhole_returns_the_excitation_psf_unchanged() {
        let mut o = base();
        o.excitation = Some(ex());
        let conf = psf(Mode::Confocal, [6, 16, 16], &em(), &o).unwrap();
        let wf = psf(Mode::Widefield, [6, 16, 16], &ex(), &base()).unwrap();
        let c = conf.intensity().unwrap();
        let w = wf.intensity().unwrap();
        for (a, b) in c.values.iter().zip(w.values.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn oversized_pinhole_falls_back_to_open() {
        let mut o = base();
        o.excitation = Some(ex());
        // 20 AU is far beyond a 16 * 0.08 field of view
        o.pinhole = Some(PinholeSize::Diameter(20.0));
        let conf = psf(Mode::Confocal, [6, 16, 16], &em(), &o).unwrap();
        o.pinhole = None;
        let open = psf(Mode::Confocal, [6, 16, 16], &em(), &o).unwrap();
        let a = conf.intensity().unwrap();
        let b = open.intensity().unwrap();
        for (x, y) in a.values.iter().zip(b.values.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn axial_mirror_reflects_about_the_focus_plane() {
        for nz in [4usize, 5] {
            let c = Array3::from_shape_fn([nz, 1, 1], |(z, _, _)| {
                Complex::new(z as f64, 0.0)
            });
            let m = mirrored_z(&c);
            let focus = nz / 2;
            assert_eq!(m[[focus, 0, 0]].re, focus as f64, "nz = {}", nz);
            for k in 1..=focus.min(nz - 1 - focus) {
                assert_eq!(m[[focus + k, 0, 0]].re, (focus - k) as f64, "nz = {}", nz);
                assert_eq!(m[[focus - k, 0, 0]].re, (focus + k) as f64, "nz = {}", nz);
            }
        }
        // the unpaired edge plane of an even grid maps to itself
        let c = Array3::from_shape_fn([4, 1, 1], |(z, _, _)| Complex::new(z as f64, 0.0));
        assert_eq!(mirrored_z(&c)[[0, 0, 0]].re, 0.0);
    }

    #[test]
    fn ism_defaults_to_a_5_by_5_lattice() {
        let mut o = base();
        o.excitation = Some(ex());
        let out = psf(Mode::Ism, [4, 12, 12], &em(), &o).unwrap();
        let list = out.intensities().unwrap();
        assert_eq!(list.len(), 25);
        for i in list {
            assert_eq!(i.shape(), [4, 12, 12]);
        }
    }
}
