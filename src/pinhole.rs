//! Pinhole transfer functions for descanned detection.
//!
//! A pinhole integrates the descanned emission image over its open area,
//! which on the PSF side is a convolution of the emission intensity with the
//! transmission profile. The convolution runs per z plane in frequency space
//! against the analytic transform of the profile, sampled in grid units: the
//! DC gain is the open area in grid cells, so filtering reads as a plain sum
//! over the open pixels and an open pinhole passes a plane's full sum. That
//! keeps a large pinhole continuous with the skipped-filter fully-open path.

use crate::error::PsfError;
use crate::fft::{fft2c, ifft2c};
use crate::params::PathParams;
use crate::{airy_unit, Intensity};
use ndarray::{Array2, Array3, Axis, Zip};
use num_complex::Complex;
use scilib::math::bessel;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Pinhole size in Airy units of the emission path.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PinholeSize {
    /// Diameter of a disc, or edge length of a square box.
    Diameter(f64),
    /// Separate x and y extents; box pinholes only.
    Axes { x: f64, y: f64 },
}

/// Transmission profile of the pinhole.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinholeShape {
    #[default]
    Disc,
    Box,
}

/// A pinhole resolved to physical units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Pinhole {
    pub shape: PinholeShape,
    /// Full extents (x, y) in length units.
    pub extent: (f64, f64),
}

impl Pinhole {
    /// Converts an Airy-unit size against the emission path that defines the
    /// Airy unit.
    pub fn resolve(
        size: PinholeSize,
        shape: PinholeShape,
        em: &PathParams,
    ) -> Result<Self, PsfError> {
        let au = airy_unit(em.na, em.wavelength);
        let (x, y) = match size {
            PinholeSize::Diameter(d) => (d, d),
            PinholeSize::Axes { x, y } => {
                if shape == PinholeShape::Disc && x != y {
                    return Err(PsfError::AnisotropicDisc(x, y));
                }
                (x, y)
            }
        };
        if !(x > 0.0 && y > 0.0) {
            return Err(PsfError::InvalidParameter(format!(
                "pinhole extent must be positive: ({}, {}) AU",
                x, y
            )));
        }
        Ok(Pinhole {
            shape,
            extent: (x * au, y * au),
        })
    }

    /// True when the open area admits the whole lateral field of view; the
    /// filtering step is then a no-op and the caller skips it.
    pub fn covers(&self, fov: (f64, f64)) -> bool {
        self.extent.0 >= fov.0 && self.extent.1 >= fov.1
    }

    /// Samples the analytic lateral frequency response on the centered
    /// frequency grid of a `[ny, nx]` plane, shifted to `position` (x, y).
    pub fn transfer_function(
        &self,
        shape: [usize; 2],
        freq_res: (f64, f64),
        position: [f64; 2],
    ) -> Array2<Complex<f64>> {
        let (ny, nx) = (shape[0], shape[1]);
        let (dfy, dfx) = freq_res;
        let (wx, wy) = self.extent;
        let profile = self.shape;
        let mut h = Array2::<Complex<f64>>::zeros([ny, nx]);
        Zip::indexed(&mut h).par_for_each(|(y, x), e| {
            let fy = (y as f64 - (ny / 2) as f64) * dfy;
            let fx = (x as f64 - (nx / 2) as f64) * dfx;
            let gain = match profile {
                PinholeShape::Disc => {
                    let a = 0.5 * wx;
                    let q = (fx * fx + fy * fy).sqrt();
                    let t = 2.0 * PI * a * q;
                    if t.abs() < 1e-10 {
                        PI * a * a
                    } else {
                        a * bessel::j_n(1, t) / q
                    }
                }
                PinholeShape::Box => wx * wy * sinc(PI * wx * fx) * sinc(PI * wy * fy),
            };
            *e = Complex::new(gain, 0.0)
                * Complex::new(0.0, -2.0 * PI * (fx * position[0] + fy * position[1])).exp();
        });
        h
    }
}

fn sinc(t: f64) -> f64 {
    if t == 0.0 {
        1.0
    } else {
        t.sin() / t
    }
}

/// Convolves every z plane of an intensity with the pinhole by pointwise
/// multiplication in frequency space. Truncation ringing can dip slightly
/// negative next to sharp features; the output is clamped at zero.
pub(crate) fn filter_intensity(em: &Intensity, h: &Array2<Complex<f64>>) -> Array3<f64> {
    let shape = em.shape();
    let mut out = Array3::<f64>::zeros(shape);
    for iz in 0..shape[0] {
        let mut plane = Array2::<Complex<f64>>::zeros([shape[1], shape[2]]);
        Zip::from(&mut plane)
            .and(em.values.index_axis(Axis(0), iz))
            .par_for_each(|c, &v| {
                *c = Complex::new(v, 0.0);
            });
        let mut spectrum = fft2c(plane);
        Zip::from(&mut spectrum).and(h).par_for_each(|s, &g| {
            *s = *s * g;
        });
        let filtered = ifft2c(spectrum);
        Zip::from(out.index_axis_mut(Axis(0), iz))
            .and(&filtered)
            .par_for_each(|o, f| {
                *o = f.re.max(0.0);
            });
    }
    out
}

/// Centered rectangular lattice of pinhole positions in physical units.
///
/// `grid` is `[gx, gy]` and `spacing` the pitch along both axes; positions
/// come out row-major with x fastest, so the center of an odd grid sits at
/// index `len / 2`.
pub(crate) fn lattice(grid: [usize; 2], spacing: f64) -> Vec<[f64; 2]> {
    let mut positions = Vec::with_capacity(grid[0] * grid[1]);
    for iy in 0..grid[1] {
        let y = (iy as f64 - (grid[1] as f64 - 1.0) / 2.0) * spacing;
        for ix in 0..grid[0] {
            let x = (ix as f64 - (grid[0] as f64 - 1.0) / 2.0) * spacing;
            positions.push([x, y]);
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Sampling;

    fn em() -> PathParams {
        PathParams::new(0.52, 1.2, 1.33).unwrap()
    }

    #[test]
    fn resolves_airy_units() {
        let p = Pinhole::resolve(PinholeSize::Diameter(1.0), PinholeShape::Disc, &em()).unwrap();
        let au = 1.22 * 0.52 / 1.2;
        assert!((p.extent.0 - au).abs() < 1e-12);
        assert!((p.extent.1 - au).abs() < 1e-12);
    }

    #[test]
    fn rejects_anisotropic_disc() {
        let r = Pinhole::resolve(
            PinholeSize::Axes { x: 1.0, y: 2.0 },
            PinholeShape::Disc,
            &em(),
        );
        assert!(matches!(r, Err(PsfError::AnisotropicDisc(_, _))));
        assert!(Pinhole::resolve(
            PinholeSize::Axes { x: 1.0, y: 2.0 },
            PinholeShape::Box,
            &em()
        )
        .is_ok());
    }

    #[test]
    fn dc_gain_is_the_open_area() {
        let disc = Pinhole {
            shape: PinholeShape::Disc,
            extent: (0.8, 0.8),
        };
        let h = disc.transfer_function([8, 8], (0.5, 0.5), [0.0, 0.0]);
        assert!((h[[4, 4]].re - PI * 0.4 * 0.4).abs() < 1e-12);
        assert!(h[[4, 4]].im.abs() < 1e-12);

        let square = Pinhole {
            shape: PinholeShape::Box,
            extent: (0.5, 0.25),
        };
        let h = square.transfer_function([8, 8], (0.5, 0.5), [0.0, 0.0]);
        assert!((h[[4, 4]].re - 0.125).abs() < 1e-12);
    }

    #[test]
    fn offset_is_a_pure_phase() {
        let p = Pinhole {
            shape: PinholeShape::Disc,
            extent: (0.6, 0.6),
        };
        let centered = p.transfer_function([8, 8], (0.4, 0.4), [0.0, 0.0]);
        let shifted = p.transfer_function([8, 8], (0.4, 0.4), [0.3, -0.2]);
        for (a, b) in centered.iter().zip(shifted.iter()) {
            assert!((a.norm() - b.norm()).abs() < 1e-12);
        }
        assert!(centered
            .iter()
            .zip(shifted.iter())
            .any(|(a, b)| (a - b).norm() > 1e-6));
    }

    #[test]
    fn lattice_is_centered() {
        let grid = lattice([5, 3], 0.1);
        assert_eq!(grid.len(), 15);
        let (mx, my) = grid
            .iter()
            .fold((0.0, 0.0), |(mx, my), p| (mx + p[0], my + p[1]));
        assert!(mx.abs() < 1e-12 && my.abs() < 1e-12);
        assert_eq!(grid[7], [0.0, 0.0]);
        assert!((grid[1][0] - grid[0][0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn coverage_test_is_per_axis() {
        let p = Pinhole {
            shape: PinholeShape::Box,
            extent: (2.0, 2.0),
        };
        assert!(p.covers((1.5, 1.9)));
        assert!(!p.covers((1.5, 2.1)));
    }

    #[test]
    fn uniform_plane_filters_to_the_open_area() {
        // only the DC bin survives a uniform plane, so the result is exactly
        // the open area regardless of band truncation
        let i = Intensity {
            values: Array3::from_elem([2, 8, 8], 1.0),
            sampling: Sampling {
                dx: 0.25,
                dy: 0.25,
                dz: 0.2,
            },
        };
        let p = Pinhole {
            shape: PinholeShape::Box,
            extent: (0.5, 0.5),
        };
        let h = p.transfer_function([8, 8], (0.5, 0.5), [0.0, 0.0]);
        let filtered = filter_intensity(&i, &h);
        for v in filtered.iter() {
            assert!((v - 0.25).abs() < 1e-9, "{}", v);
        }
    }
}
