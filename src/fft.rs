//! Thin wrapper around `ndrustfft` used by both the D-matrix builder (C3)
//! and the matrix-vector engine (C4). Both callers need single-axis 1-D FFT
//! passes interleaved with block-transposes rather than one 3-D transform,
//! so this module exposes per-axis handlers instead of a single call that
//! drives a full 3-D transform at once.

use ndarray::{Array3, Axis};
use ndrustfft::{FftHandler, ndfft_par, ndifft_par};
use num_complex::Complex64;

/// A persistent 1-D FFT plan for one axis of a 3-D array, plus the scratch
/// buffer `ndrustfft` needs as its transform destination.
pub struct AxisFft {
    handler: FftHandler<f64>,
    scratch: Array3<Complex64>,
}

impl AxisFft {
    pub fn new(len: usize, shape: [usize; 3]) -> Self {
        AxisFft { handler: FftHandler::new(len), scratch: Array3::zeros(shape) }
    }

    /// Forward transform along `axis`, in place (via the internal scratch buffer).
    pub fn forward(&mut self, data: &mut Array3<Complex64>, axis: usize) {
        ndfft_par(data, &mut self.scratch, &self.handler, axis);
        data.assign(&self.scratch);
    }

    /// Inverse transform along `axis`, in place.
    pub fn inverse(&mut self, data: &mut Array3<Complex64>, axis: usize) {
        ndifft_par(data, &mut self.scratch, &self.handler, axis);
        data.assign(&self.scratch);
    }
}

/// Owns the three per-axis plans for a doubled FFT grid of shape `[gx, gy, gz]`.
pub struct GridFft {
    pub shape: [usize; 3],
    x: AxisFft,
    y: AxisFft,
    z: AxisFft,
}

impl GridFft {
    pub fn new(shape: [usize; 3]) -> Self {
        GridFft {
            shape,
            x: AxisFft::new(shape[0], shape),
            y: AxisFft::new(shape[1], shape),
            z: AxisFft::new(shape[2], shape),
        }
    }

    pub fn forward_axis(&mut self, data: &mut Array3<Complex64>, axis: usize) {
        match axis {
            0 => self.x.forward(data, 0),
            1 => self.y.forward(data, 1),
            _ => self.z.forward(data, 2),
        }
    }

    pub fn inverse_axis(&mut self, data: &mut Array3<Complex64>, axis: usize) {
        match axis {
            0 => self.x.inverse(data, 0),
            1 => self.y.inverse(data, 1),
            _ => self.z.inverse(data, 2),
        }
    }
}

/// Swaps the Y and Z axes of a 3-D array in place (the local, non-process
/// "transposeYZ" step of §4.4/§9 — distinct from the cross-process
/// block-transpose in `comm`).
pub fn transpose_yz(data: &Array3<Complex64>) -> Array3<Complex64> {
    data.clone().permuted_axes([0, 2, 1]).as_standard_layout().to_owned()
}

pub fn axis_len(data: &Array3<Complex64>, axis: usize) -> usize {
    data.len_of(Axis(axis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_then_inverse_round_trips() {
        let shape = [4usize, 4, 4];
        let mut grid = GridFft::new(shape);
        let mut data: Array3<Complex64> = Array3::zeros(shape);
        data[[1, 2, 3]] = Complex64::new(1.0, 0.5);
        let original = data.clone();

        for axis in 0..3 {
            grid.forward_axis(&mut data, axis);
        }
        for axis in (0..3).rev() {
            grid.inverse_axis(&mut data, axis);
        }

        for ((a, b), _) in data.iter().zip(original.iter()).zip(0..) {
            assert!((a - b).norm() < 1e-8);
        }
    }

    #[test]
    fn transpose_yz_swaps_axes() {
        let shape = [2usize, 3, 4];
        let mut data: Array3<Complex64> = Array3::zeros(shape);
        data[[0, 1, 2]] = Complex64::new(7.0, 0.0);
        let t = transpose_yz(&data);
        assert_eq!(t.dim(), (2, 4, 3));
        assert_eq!(t[[0, 2, 1]], Complex64::new(7.0, 0.0));
    }
}
