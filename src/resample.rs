//! Coarse-grid computation with Fourier upsampling.
//!
//! An amplitude spread function is band limited to half the intensity band,
//! so it can be computed on a grid with twice the spacing and brought to the
//! requested grid by zero-padding its spectrum. This trades a small amount of
//! interpolation error for a factor near 8 in propagation work.

use crate::fft::{fft3c, ifft3c, pad_centered_3d};
use crate::params::{PathParams, Sampling};
use crate::propagate::{asf, AsfMethod};
use crate::{amplitude_axial_limit, div_up, Amplitude, Intensity, PsfError};
use log::warn;
use ndarray::{Array3, Zip};
use num_complex::Complex;

/// Computes the ASF on a half-resolution grid spanning the same field of
/// view, then upsamples to `shape`.
///
/// The result carries the usual unit mean-plane-energy normalization. It is
/// not bit-identical to the full-resolution computation, and the quality
/// degrades sharply once the coarse axial spacing passes the amplitude
/// carrier limit: the axial phase then folds on the coarse grid and the
/// interpolated planes between the coarse ones come out wrong. A warning is
/// emitted in that regime but the computation proceeds.
// TODO: quantify the usable axial range; the interleaved-plane error jumps
// from a few percent to order one right at the carrier limit.
pub fn resampled_asf(
    method: AsfMethod,
    shape: [usize; 3],
    params: &PathParams,
    sampling: Sampling,
) -> Result<Amplitude, PsfError> {
    let coarse_shape = [
        div_up(shape[0], 2),
        div_up(shape[1], 2),
        div_up(shape[2], 2),
    ];
    let coarse_sampling = Sampling {
        dx: sampling.dx * shape[2] as f64 / coarse_shape[2] as f64,
        dy: sampling.dy * shape[1] as f64 / coarse_shape[1] as f64,
        dz: sampling.dz * shape[0] as f64 / coarse_shape[0] as f64,
    };
    let carrier = amplitude_axial_limit(params);
    if coarse_sampling.dz > carrier {
        warn!(
            "coarse axial spacing {:.4} folds the amplitude carrier (limit {:.4}); upsampled planes between the coarse grid are unreliable",
            coarse_sampling.dz, carrier
        );
    }
    let coarse = asf(method, coarse_shape, params, coarse_sampling)?;
    let mut fine = upsample_amplitude(&coarse, shape, false);
    fine.sampling = sampling;
    fine.normalize_mean_plane_energy();
    Ok(fine)
}

/// Upsamples an amplitude to `shape` by zero-padding its centered spectrum.
///
/// The field of view is preserved, so the grid spacings shrink by the shape
/// ratio per axis. Values are interpolated in place (a band-limited constant
/// stays a constant); with `renormalize` the output is instead rescaled to
/// unit total energy.
///
/// Panics if any axis of `shape` is smaller than the input.
pub fn upsample_amplitude(input: &Amplitude, shape: [usize; 3], renormalize: bool) -> Amplitude {
    let in_shape = input.shape();
    let sampling = Sampling {
        dx: input.sampling.dx * in_shape[2] as f64 / shape[2] as f64,
        dy: input.sampling.dy * in_shape[1] as f64 / shape[1] as f64,
        dz: input.sampling.dz * in_shape[0] as f64 / shape[0] as f64,
    };

    let mut components = Vec::with_capacity(input.components.len());
    for c in &input.components {
        let spectrum = fft3c(c.clone());
        components.push(ifft3c(pad_centered_3d(spectrum.view(), shape)));
    }

    let mut out = Amplitude {
        components,
        sampling,
    };
    let count_ratio = (shape[0] * shape[1] * shape[2]) as f64
        / (in_shape[0] * in_shape[1] * in_shape[2]) as f64;
    out.scale(count_ratio.sqrt());
    if renormalize {
        let total = out.total_energy();
        if total > 0.0 {
            out.scale((1.0 / total).sqrt());
        }
    }
    out
}

/// Upsamples an intensity volume to `shape` by zero-padding its centered
/// spectrum.
///
/// Interpolating a non-negative volume can ring slightly negative next to
/// sharp features; the output is clamped at zero.
///
/// Panics if any axis of `shape` is smaller than the input.
pub fn upsample_intensity(input: &Intensity, shape: [usize; 3]) -> Intensity {
    let in_shape = input.shape();
    let sampling = Sampling {
        dx: input.sampling.dx * in_shape[2] as f64 / shape[2] as f64,
        dy: input.sampling.dy * in_shape[1] as f64 / shape[1] as f64,
        dz: input.sampling.dz * in_shape[0] as f64 / shape[0] as f64,
    };

    let mut complex = Array3::<Complex<f64>>::zeros(in_shape);
    Zip::from(&mut complex).and(&input.values).par_for_each(|c, &v| {
        *c = Complex::new(v, 0.0);
    });
    let padded = ifft3c(pad_centered_3d(fft3c(complex).view(), shape));

    let count_ratio = (shape[0] * shape[1] * shape[2]) as f64
        / (in_shape[0] * in_shape[1] * in_shape[2]) as f64;
    let scale = count_ratio.sqrt();
    let mut values = Array3::<f64>::zeros(shape);
    Zip::from(&mut values).and(&padded).par_for_each(|v, c| {
        *v = (c.re * scale).max(0.0);
    });

    Intensity { values, sampling }
}
