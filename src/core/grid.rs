//! `fit` and the doubled-grid sizing rule of §3/§4.1.

use crate::log::RunLog;

/// Which prime factors the chosen 1-D FFT kernel can transform efficiently.
/// The crate fixes `ndrustfft`/`rustfft` as its kernel (§1), which handles
/// mixed radices in {2,3,5,7} well and falls back to a slower Bluestein path
/// otherwise — so `Radix2357` is the capability flag this crate reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftCapability {
    Radix235,
    Radix2357,
}

impl FftCapability {
    fn allowed_primes(self) -> &'static [u64] {
        match self {
            FftCapability::Radix235 => &[2, 3, 5],
            FftCapability::Radix2357 => &[2, 3, 5, 7],
        }
    }

    fn is_smooth(self, mut n: u64) -> bool {
        if n == 0 {
            return false;
        }
        for &p in self.allowed_primes() {
            while n % p == 0 {
                n /= p;
            }
        }
        n == 1
    }
}

/// Smallest `m >= n` with `d | m` and `m`'s prime factorization restricted to
/// the kernel's allowed set (§3 "Grid sizes", testable property #1).
pub fn fit(n: u64, d: u64, cap: FftCapability) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut m = n.div_ceil(d) * d;
    while !cap.is_smooth(m) {
        m += d;
    }
    m
}

/// Whether `nprocs`'s own prime factorization escapes the kernel's allowed
/// set. In that case `fit` is not invoked for `gridZ` sizing at all; only the
/// hard divisibility-by-`2*nprocs` constraint is enforced, and a one-time
/// performance warning is logged (§4.1 "weird" mode).
pub fn is_weird_nprocs(nprocs: u64, cap: FftCapability) -> bool {
    !cap.is_smooth(nprocs)
}

#[derive(Debug, Clone, Copy)]
pub struct GridDims {
    pub grid_x: usize,
    pub grid_y: usize,
    pub grid_z: usize,
    pub weird: bool,
}

impl GridDims {
    /// `gridX = fit(2*boxX, nprocs)`, `gridY = fit(2*boxY, 1)`,
    /// `gridZ = fit(2*boxZ, 2*nprocs)` (§3), falling back to the weird-nprocs
    /// rule when `nprocs` is not itself smooth.
    pub fn new(box_dims: (usize, usize, usize), nprocs: usize, cap: FftCapability, log: &dyn RunLog) -> Self {
        let (box_x, box_y, box_z) = box_dims;
        let weird = is_weird_nprocs(nprocs as u64, cap);
        let grid_x = fit(2 * box_x as u64, nprocs.max(1) as u64, cap) as usize;
        let grid_y = fit(2 * box_y as u64, 1, cap) as usize;
        let grid_z = if weird {
            log.once_warn(
                "weird_nprocs",
                &format!(
                    "nprocs={nprocs} has prime factors outside the FFT kernel's radix set; \
                     falling back to plain divisibility by 2*nprocs for gridZ (performance will suffer)"
                ),
            );
            let d = 2 * nprocs.max(1) as u64;
            (2 * box_z as u64).div_ceil(d) * d
        } else {
            fit(2 * box_z as u64, 2 * nprocs.max(1) as u64, cap)
        } as usize;
        GridDims { grid_x, grid_y, grid_z, weird }
    }

    /// Reduced-FFT storage dimensions: `DsizeY = gridY/2 + 1`, `DsizeZ = gridZ/2 + 1` (§3).
    pub fn reduced_d_sizes(&self) -> (usize, usize) {
        (self.grid_y / 2 + 1, self.grid_z / 2 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_is_at_least_n_and_divisible() {
        let cap = FftCapability::Radix2357;
        for n in 1u64..200 {
            for &d in &[1u64, 2, 3, 4, 6, 7, 8] {
                let m = fit(n, d, cap);
                assert!(m >= n);
                assert_eq!(m % d, 0);
            }
        }
    }

    #[test]
    fn fit_has_no_disallowed_prime_factors() {
        let cap = FftCapability::Radix235;
        let m = fit(97, 1, cap);
        let mut residual = m;
        for p in [2, 3, 5] {
            while residual % p == 0 {
                residual /= p;
            }
        }
        assert_eq!(residual, 1);
    }

    #[test]
    fn fit_is_idempotent() {
        let cap = FftCapability::Radix2357;
        for n in 1u64..100 {
            for &d in &[1u64, 2, 5] {
                let once = fit(n, d, cap);
                let twice = fit(once, d, cap);
                assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn weird_nprocs_detected_for_prime_outside_radix_set() {
        assert!(is_weird_nprocs(11, FftCapability::Radix2357));
        assert!(!is_weird_nprocs(12, FftCapability::Radix2357));
    }
}
