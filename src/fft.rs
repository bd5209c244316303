use ndarray::parallel::prelude::{IntoParallelIterator, ParallelIterator};
use ndarray::{s, Array2, Array3, ArrayView3, ArrayViewMut2, ArrayViewMut3, Axis, Zip};
use num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::{FftDirection, FftPlanner};

/// Performs a 2D fft where the 0th component is at the center rather than the normal right.
/// Removes the need for ifft_shift before and fft_shift after.
pub fn fft2c(mut input: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform2c(input.view_mut(), FftDirection::Forward);
    input
}

/// Performs a 2D ifft where the 0th component is at the center rather than the normal right.
/// Removes the need for ifft_shift before and fft_shift after.
pub fn ifft2c(mut input: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform2c(input.view_mut(), FftDirection::Inverse);
    input
}

/// Performs a 3D fft with the 0th component at the center (len/2 on each axis).
pub fn fft3c(mut input: Array3<Complex<f64>>) -> Array3<Complex<f64>> {
    transform3c(input.view_mut(), FftDirection::Forward);
    input
}

/// Performs a 3D ifft with the 0th component at the center (len/2 on each axis).
pub fn ifft3c(mut input: Array3<Complex<f64>>) -> Array3<Complex<f64>> {
    transform3c(input.view_mut(), FftDirection::Inverse);
    input
}

/// Centered 2D transform of a view, in place.
pub fn transform2c(input: ArrayViewMut2<Complex<f64>>, direction: FftDirection) {
    let mut vol = input.insert_axis(Axis(0));
    transform_axis(vol.view_mut(), Axis(1), direction);
    transform_axis(vol.view_mut(), Axis(2), direction);
    let normalisation = 1.0 / (vol.len() as f64).sqrt();
    vol.par_map_inplace(|e| *e = *e * normalisation);
}

/// Centered 3D transform of a view, in place.
pub fn transform3c(mut input: ArrayViewMut3<Complex<f64>>, direction: FftDirection) {
    transform_axis(input.view_mut(), Axis(0), direction);
    transform_axis(input.view_mut(), Axis(1), direction);
    transform_axis(input.view_mut(), Axis(2), direction);
    let normalisation = 1.0 / (input.len() as f64).sqrt();
    input.par_map_inplace(|e| *e = *e * normalisation);
}

/// Unnormalised centered transform along one axis.
///
/// Contiguous lanes are shifted in place and processed directly; strided lanes
/// are staged through a per-thread buffer, folding the shift permutation into
/// the copy in and out.
fn transform_axis(mut vol: ArrayViewMut3<Complex<f64>>, axis: Axis, direction: FftDirection) {
    let len = vol.shape()[axis.0];
    if len <= 1 {
        return;
    }
    let half = len / 2;
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft(len, direction);

    Zip::from(vol.lanes_mut(axis)).into_par_iter().for_each_init(
        || {
            (
                vec![Zero::zero(); fft.len()],
                vec![Zero::zero(); fft.get_inplace_scratch_len()],
            )
        },
        |(buffer, scratch), lane| {
            let mut lane = lane.0;
            if let Some(slice) = lane.as_slice_mut() {
                ifft_shift_inplace(slice);
                fft.process_with_scratch(slice, scratch);
                fft_shift_inplace(slice);
            } else {
                let buffer = buffer.as_mut_slice();
                debug_assert_eq!(lane.len(), buffer.len());
                for (k, &e) in lane.iter().enumerate() {
                    buffer[(k + len - half) % len] = e;
                }
                fft.process_with_scratch(buffer, scratch);
                for (k, e) in lane.iter_mut().enumerate() {
                    *e = buffer[(k + len - half) % len];
                }
            }
        },
    );
}

/// Moves the origin (0) to the "center" of the slice (N/2)
///
/// For even lengths, which have no center value, this moves the value to the next value after the center
pub fn fft_shift_inplace(input: &mut [Complex<f64>]) {
    let half = input.len() / 2;
    input.rotate_right(half);
}

/// Moves the "center" of the slice (N/2) to the origin (0)
///
/// Inverts fft_shift exactly, accounting for the asymmetry of even lengths
pub fn ifft_shift_inplace(input: &mut [Complex<f64>]) {
    let half = input.len() / 2;
    input.rotate_left(half);
}

/// Zero-pads a centered volume to `out_shape`, keeping the center value (len/2 per axis) aligned.
pub fn pad_centered_3d<A: Clone + Zero>(
    input: ArrayView3<A>,
    out_shape: [usize; 3],
) -> Array3<A> {
    let m0 = input.shape()[0];
    let m1 = input.shape()[1];
    let m2 = input.shape()[2];
    assert!(out_shape[0] >= m0 && out_shape[1] >= m1 && out_shape[2] >= m2);
    let mut out = Array3::zeros(out_shape);
    let slice = s![
        out_shape[0] / 2 - m0 / 2..m0 + out_shape[0] / 2 - m0 / 2,
        out_shape[1] / 2 - m1 / 2..m1 + out_shape[1] / 2 - m1 / 2,
        out_shape[2] / 2 - m2 / 2..m2 + out_shape[2] / 2 - m2 / 2
    ];
    out.slice_mut(slice).assign(&input);
    out
}

/// Crops a centered volume to `out_shape`, keeping the center value (len/2 per axis) aligned.
pub fn crop_centered_3d<A: Clone>(input: ArrayView3<A>, out_shape: [usize; 3]) -> Array3<A> {
    let m0 = input.shape()[0];
    let m1 = input.shape()[1];
    let m2 = input.shape()[2];
    assert!(out_shape[0] <= m0 && out_shape[1] <= m1 && out_shape[2] <= m2);
    let slice = s![
        m0 / 2 - out_shape[0] / 2..out_shape[0] + m0 / 2 - out_shape[0] / 2,
        m1 / 2 - out_shape[1] / 2..out_shape[1] + m1 / 2 - out_shape[1] / 2,
        m2 / 2 - out_shape[2] / 2..out_shape[2] + m2 / 2 - out_shape[2] / 2
    ];
    input.slice(slice).to_owned()
}

#[cfg(test)]
mod tests {
    use super::{
        crop_centered_3d, fft2c, fft3c, fft_shift_inplace, ifft2c, ifft3c, ifft_shift_inplace,
        pad_centered_3d,
    };
    use ndarray::{Array2, Array3};
    use num_complex::Complex;

    fn assert_eq_vecs(a: &[Complex<f64>], b: &[Complex<f64>]) {
        for (a, b) in a.iter().zip(b) {
            assert!((a - b).norm() < 1e-10, "{}", (a - b).norm());
        }
    }

    #[test]
    fn test_fft_shift_odd() {
        let mut input: Vec<Complex<f64>> = vec![1., 2., 3., 4., 5., 6., 7., 8., 9.]
            .into_iter()
            .map(|x| Complex::new(x, 0.))
            .collect();
        let expected: Vec<Complex<f64>> = vec![6., 7., 8., 9., 1., 2., 3., 4., 5.]
            .into_iter()
            .map(|x| Complex::new(x, 0.))
            .collect();

        fft_shift_inplace(&mut input);

        assert_eq!(input, expected);
    }

    #[test]
    fn test_fft_shift_even() {
        let mut input: Vec<Complex<f64>> = vec![1., 2., 3., 4., 5., 6., 7., 8.]
            .into_iter()
            .map(|x| Complex::new(x, 0.))
            .collect();
        let expected: Vec<Complex<f64>> = vec![5., 6., 7., 8., 1., 2., 3., 4.]
            .into_iter()
            .map(|x| Complex::new(x, 0.))
            .collect();

        fft_shift_inplace(&mut input);

        assert_eq!(input, expected);
    }

    #[test]
    fn test_ifft_shift_odd() {
        let mut input: Vec<Complex<f64>> = vec![6., 7., 8., 9., 1., 2., 3., 4., 5.]
            .into_iter()
            .map(|x| Complex::new(x, 0.))
            .collect();
        let expected: Vec<Complex<f64>> = vec![1., 2., 3., 4., 5., 6., 7., 8., 9.]
            .into_iter()
            .map(|x| Complex::new(x, 0.))
            .collect();

        ifft_shift_inplace(&mut input);

        assert_eq!(input, expected);
    }

    #[test]
    fn test_ifft_shift_even() {
        let mut input: Vec<Complex<f64>> = vec![5., 6., 7., 8., 1., 2., 3., 4.]
            .into_iter()
            .map(|x| Complex::new(x, 0.))
            .collect();
        let expected: Vec<Complex<f64>> = vec![1., 2., 3., 4., 5., 6., 7., 8.]
            .into_iter()
            .map(|x| Complex::new(x, 0.))
            .collect();

        ifft_shift_inplace(&mut input);

        assert_eq!(input, expected);
    }

    #[test]
    fn test_fft2c_centered_delta() {
        // a unit impulse at the center transforms to a flat spectrum of 1/sqrt(N)
        let mut input = Array2::<Complex<f64>>::zeros([3, 3]);
        input[[1, 1]] = Complex::new(1.0, 0.0);

        let output = fft2c(input);

        let expected = vec![Complex::new(1.0 / 3.0, 0.0); 9];
        assert_eq_vecs(&expected, output.as_slice().unwrap());
    }

    #[test]
    fn test_fft2c_round_trip() {
        let input = Array2::from_shape_fn([4, 6], |(y, x)| {
            Complex::new((y * 6 + x) as f64, (x as f64) - 1.5)
        });

        let output = ifft2c(fft2c(input.clone()));

        assert_eq_vecs(input.as_slice().unwrap(), output.as_slice().unwrap());
    }

    #[test]
    fn test_fft3c_round_trip_and_parseval() {
        let input = Array3::from_shape_fn([4, 3, 5], |(z, y, x)| {
            Complex::new((z + 2 * y) as f64 - 0.25 * x as f64, (x + z) as f64)
        });
        let energy_in: f64 = input.iter().map(|v| v.norm_sqr()).sum();

        let spectrum = fft3c(input.clone());
        let energy_spec: f64 = spectrum.iter().map(|v| v.norm_sqr()).sum();
        assert!((energy_in - energy_spec).abs() < 1e-9 * energy_in);

        let output = ifft3c(spectrum);
        assert_eq_vecs(input.as_slice().unwrap(), output.as_slice().unwrap());
    }

    #[test]
    fn test_pad_crop_centered() {
        let input = Array3::from_shape_fn([3, 3, 3], |(z, y, x)| {
            Complex::new((z * 9 + y * 3 + x) as f64, 0.0)
        });

        let padded = pad_centered_3d(input.view(), [5, 6, 7]);
        // center value stays at len/2 on each axis
        assert_eq!(padded[[2, 3, 3]], input[[1, 1, 1]]);

        let cropped = crop_centered_3d(padded.view(), [3, 3, 3]);
        assert_eq_vecs(input.as_slice().unwrap(), cropped.as_slice().unwrap());
    }
}
