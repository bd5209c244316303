//! Zernike polynomials over the unit disc, Noll-indexed.
//!
//! Noll normalization: each mode has unit RMS over the disc, so aberration
//! amplitudes in radians are directly comparable between modes.

/// Maps a Noll index (j >= 1) to the radial order n and signed azimuthal
/// frequency m. Odd j carry the sin (m < 0) modes, even j the cos (m > 0)
/// modes; m = 0 modes take whichever parity the sequence assigns them.
pub fn noll_to_nm(j: usize) -> (u32, i32) {
    assert!(j >= 1, "Noll indices start at 1");
    let mut n = 0usize;
    while j > (n + 1) * (n + 2) / 2 {
        n += 1;
    }
    let k = j - n * (n + 1) / 2; // 1-based position within the order
    let m_abs = if n % 2 == 0 {
        2 * (k / 2)
    } else {
        2 * ((k - 1) / 2) + 1
    };
    let m = if m_abs == 0 {
        0
    } else if j % 2 == 0 {
        m_abs as i32
    } else {
        -(m_abs as i32)
    };
    (n as u32, m)
}

/// Evaluates the Noll-normalized Zernike mode j at aperture-normalized radius
/// `rho` (1.0 at the aperture edge) and azimuth `phi`.
pub fn evaluate(j: usize, rho: f64, phi: f64) -> f64 {
    let (n, m) = noll_to_nm(j);
    let m_abs = m.unsigned_abs();
    let norm = if m == 0 {
        ((n + 1) as f64).sqrt()
    } else {
        (2.0 * (n + 1) as f64).sqrt()
    };
    let angular = if m > 0 {
        (m_abs as f64 * phi).cos()
    } else if m < 0 {
        (m_abs as f64 * phi).sin()
    } else {
        1.0
    };
    norm * radial(n, m_abs, rho) * angular
}

/// Radial polynomial R_n^m as the explicit alternating factorial sum.
fn radial(n: u32, m: u32, rho: f64) -> f64 {
    debug_assert!(m <= n && (n - m) % 2 == 0);
    let upper = (n - m) / 2;
    let mut sum = 0.0;
    for s in 0..=upper {
        let sign = if s % 2 == 0 { 1.0 } else { -1.0 };
        let coeff = factorial(n - s)
            / (factorial(s) * factorial((n + m) / 2 - s) * factorial((n - m) / 2 - s));
        sum += sign * coeff * rho.powi((n - 2 * s) as i32);
    }
    sum
}

fn factorial(k: u32) -> f64 {
    (2..=k).fold(1.0, |acc, v| acc * v as f64)
}

#[cfg(test)]
mod tests {
    use super::{evaluate, noll_to_nm};
    use approx::assert_relative_eq;

    #[test]
    fn noll_table() {
        let expected = [
            (1, (0, 0)),
            (2, (1, 1)),
            (3, (1, -1)),
            (4, (2, 0)),
            (5, (2, -2)),
            (6, (2, 2)),
            (7, (3, -1)),
            (8, (3, 1)),
            (9, (3, -3)),
            (10, (3, 3)),
            (11, (4, 0)),
            (12, (4, 2)),
        ];
        for (j, (n, m)) in expected {
            assert_eq!(noll_to_nm(j), (n, m), "j = {}", j);
        }
    }

    #[test]
    fn known_values() {
        // piston
        assert_relative_eq!(evaluate(1, 0.3, 1.1), 1.0);
        // tilt: Z2 = 2 rho cos(phi)
        assert_relative_eq!(evaluate(2, 0.5, 0.0), 1.0, epsilon = 1e-12);
        // defocus: Z4 = sqrt(3) (2 rho^2 - 1)
        assert_relative_eq!(evaluate(4, 1.0, 0.7), 3.0f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(evaluate(4, 0.0, 0.0), -(3.0f64.sqrt()), epsilon = 1e-12);
        // astigmatism: Z6 = sqrt(6) rho^2 cos(2 phi)
        assert_relative_eq!(evaluate(6, 1.0, 0.0), 6.0f64.sqrt(), epsilon = 1e-12);
        // primary spherical: Z11 = sqrt(5) (6 rho^4 - 6 rho^2 + 1)
        assert_relative_eq!(evaluate(11, 1.0, 0.2), 5.0f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(evaluate(11, 0.0, 0.2), 5.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn sin_modes_vanish_on_axis() {
        // odd-j modes carry sin(|m| phi), zero at phi = 0 when m != 0
        for j in [3usize, 5, 7, 9] {
            assert!(evaluate(j, 0.8, 0.0).abs() < 1e-12, "j = {}", j);
        }
    }
}
