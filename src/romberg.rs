//! C6: adaptive 2-D Romberg quadrature, used both for orientation averaging
//! (outer: beta/gamma or theta/phi) and for scattering-cross-section
//! integration over the far-field sphere. Ported from the reference
//! engine's `Romberg.c`: when an axis is flagged periodic, Romberg
//! extrapolation degenerates to the plain trapezoid rule (periodic
//! integrands gain nothing from Richardson extrapolation — Davis &
//! Rabinowitz ch. 2.9), which this port implements by skipping the
//! higher-order columns of the `M`/`T` tables instead of building the
//! triangular Romberg table only to ignore its refinements.
//!
//! The reference implementation keeps its `M`/`T`/`dummy` scratch arrays as
//! translation-unit statics and documents that two `Romberg2D` calls must
//! never run concurrently. This port makes that constraint structural: the
//! scratch buffers live in a [`Romberg2D`] value, and integrating requires
//! `&mut self`, so the borrow checker rules out concurrent reentry instead
//! of a code comment asking callers not to.

/// One axis' refinement schedule (`Parms_1D` in the reference).
#[derive(Debug, Clone, Copy)]
pub struct RombergParams {
    pub min: f64,
    pub max: f64,
    /// Minimum number of refinement stages before convergence is checked.
    pub jmin: usize,
    /// Maximum number of refinement stages.
    pub jmax: usize,
    pub eps: f64,
    /// Trapezoid rule instead of Romberg extrapolation.
    pub periodic: bool,
    /// `min` and `max` describe the same physical point (e.g. `cos(theta)`
    /// endpoints coinciding) — skips the endpoint-averaging step.
    pub equival: bool,
}

impl RombergParams {
    pub fn grid_size(&self) -> usize {
        (1usize << (self.jmax.saturating_sub(1))) + 1
    }
}

/// 1-D Romberg integration over a fully precomputed, equally spaced sample
/// array (`Romberg1D`): no adaptation, every sample in `data` is used.
/// `data` holds `grid_size` blocks of `dim` components each. Returns the
/// averaged result and the relative mean-square error estimate.
pub fn romberg_1d(params: &RombergParams, dim: usize, data: &[f64]) -> (Vec<f64>, f64) {
    if params.min == params.max {
        return (data[..dim].to_vec(), 0.0);
    }

    let grid_size = params.grid_size();
    let msize = if params.periodic { 0 } else { params.jmax };
    let mut m1: Vec<Vec<f64>> = vec![vec![0.0; dim]; msize + 1];
    let mut t1 = vec![0.0; dim];

    let mut tv1 = vec![1.0; msize + 1];
    let mut tv2 = vec![0.0; msize + 1];
    let mut tv3 = vec![0.0; msize + 1];
    for i in 1..msize.max(1) {
        tv1[i] = tv1[i - 1] * 4.0;
        tv2[i] = 1.0 / (tv1[i] - 1.0);
        tv3[i - 1] = 2.0 * tv1[i - 1] - 1.0;
    }

    let mut m0 = 0usize;
    for m in 0..params.jmax {
        if m == 0 {
            if params.equival {
                t1.copy_from_slice(&data[..dim]);
            } else {
                let index = (grid_size - 1) * dim;
                for c in 0..dim {
                    t1[c] = 0.5 * (data[c] + data[index + c]);
                }
            }
        } else if params.periodic {
            for c in 0..dim {
                t1[c] = 0.5 * (t1[c] + m1[0][c]);
            }
        } else {
            for c in 0..dim {
                t1[c] = tv3[m - 1] * tv2[m] * (t1[c] - m1[0][c]) + m1[0][c];
            }
            m0 = m;
        }

        let step = (grid_size - 1) >> m;
        for c in 0..dim {
            m1[m0][c] = 0.0;
        }
        let mut j = step / 2;
        while j < grid_size {
            let index = j * dim;
            for c in 0..dim {
                m1[m0][c] += data[index + c];
            }
            j += step;
        }
        let scale = 2f64.powi(-(m as i32));
        for c in 0..dim {
            m1[m0][c] *= scale;
        }

        if m0 != 0 {
            for i in (0..m).rev() {
                for c in 0..dim {
                    m1[i][c] = tv2[m - i] * (tv1[m - i] * m1[i + 1][c] - m1[i][c]);
                }
            }
        }
    }

    let mut res = vec![0.0; dim];
    let mut abs_res = 0.0;
    let mut abs_err = 0.0;
    for c in 0..dim {
        res[c] = 0.5 * (m1[0][c] + t1[c]);
        abs_res += res[c] * res[c];
        let e = 0.5 * (m1[0][c] - t1[c]).abs();
        abs_err += e * e;
    }
    let rel_err = if abs_res == 0.0 { 0.0 } else { (abs_err / abs_res).sqrt() };
    (res, rel_err)
}

/// Function evaluated at a grid point `(theta_idx, phi_idx)`; writes its
/// `dim`-component result into `out` and returns an absolute error estimate
/// for that evaluation (zero for non-adaptive/precomputed integrands).
pub type Integrand<'a> = dyn FnMut(usize, usize, &mut [f64]) -> f64 + 'a;

struct AxisScratch {
    m: Vec<Vec<f64>>,
    t: Vec<f64>,
    dummy: Vec<f64>,
    size: usize,
}

impl AxisScratch {
    fn new(dim: usize, size: usize) -> Self {
        AxisScratch { m: vec![vec![0.0; dim]; size + 1], t: vec![0.0; dim], dummy: vec![0.0; dim], size }
    }
}

/// Shared scratch for nested adaptive 2-D Romberg integration. Non-`Clone`,
/// non-`Sync` by construction of needing `&mut self` to integrate — mirrors
/// the reference implementation's "never run two instances in parallel"
/// requirement without needing to document it as a caller obligation.
pub struct Romberg2D {
    dim: usize,
    inner: AxisScratch,
    outer: AxisScratch,
    tv1: Vec<f64>,
    tv2: Vec<f64>,
    tv3: Vec<f64>,
    /// Count of `inner_romberg` calls that exhausted `phi.jmax` refinement
    /// levels without `err < phi.eps` (§4.6: "the outer integrator records
    /// how many inner integrations failed to converge... without failing
    /// the outer pass").
    inner_not_converged: usize,
}

impl Romberg2D {
    pub fn new(dim: usize, theta: &RombergParams, phi: &RombergParams) -> Self {
        let size_in = if phi.periodic { 0 } else { phi.jmax };
        let size_out = if theta.periodic { 0 } else { theta.jmax };
        let maxdim = size_in.max(size_out);
        let mut tv1 = vec![1.0; maxdim + 1];
        let mut tv2 = vec![0.0; maxdim + 1];
        let mut tv3 = vec![0.0; maxdim + 1];
        for i in 1..maxdim.max(1) {
            tv1[i] = tv1[i - 1] * 4.0;
            tv2[i] = 1.0 / (tv1[i] - 1.0);
            tv3[i - 1] = 2.0 * tv1[i - 1] - 1.0;
        }
        Romberg2D {
            dim,
            inner: AxisScratch::new(dim, size_in),
            outer: AxisScratch::new(dim, size_out),
            tv1,
            tv2,
            tv3,
            inner_not_converged: 0,
        }
    }

    /// Number of inner (`phi`-axis) integrations, across every call to
    /// [`Romberg2D::integrate`] run on this instance so far, that exhausted
    /// `phi.jmax` without meeting `phi.eps`.
    pub fn inner_not_converged(&self) -> usize {
        self.inner_not_converged
    }

    fn romberg_iterate(m_arr: &mut [Vec<f64>], m: usize, dim: usize, tv1: &[f64], tv2: &[f64]) {
        for k in (0..m).rev() {
            for c in 0..dim {
                m_arr[k][c] = tv2[m - k] * (tv1[m - k] * m_arr[k + 1][c] - m_arr[k][c]);
            }
        }
    }

    fn inner_romberg(&mut self, phi: &RombergParams, theta_idx: usize, func: &mut Integrand, res: &mut [f64]) -> f64 {
        let dim = self.dim;
        if phi.min == phi.max {
            return func(theta_idx, 0, res);
        }

        let grid_size = phi.grid_size();
        let mut m0 = 0usize;
        let mut int_err = 0.0;
        let mut err = 0.0;
        let mut converged = false;

        for m in 0..phi.jmax {
            if m == 0 {
                int_err = func(theta_idx, 0, &mut self.inner.t[..dim]);
                if !phi.equival {
                    int_err = 0.5 * (int_err + func(theta_idx, grid_size - 1, &mut self.inner.dummy[..dim]));
                    for c in 0..dim {
                        self.inner.t[c] = 0.5 * (self.inner.dummy[c] + self.inner.t[c]);
                    }
                }
            } else if phi.periodic {
                for c in 0..dim {
                    self.inner.t[c] = 0.5 * (self.inner.t[c] + self.inner.m[0][c]);
                }
            } else {
                for c in 0..dim {
                    self.inner.t[c] = self.tv3[m - 1] * self.tv2[m] * (self.inner.t[c] - self.inner.m[0][c]) + self.inner.m[0][c];
                }
                m0 = m;
            }

            let step = (grid_size - 1) >> m;
            let mut trapz_err = 0.0;
            for c in 0..dim {
                self.inner.m[m0][c] = 0.0;
            }
            let mut j = step / 2;
            while j < grid_size {
                trapz_err += func(theta_idx, j, &mut self.inner.dummy[..dim]);
                for c in 0..dim {
                    self.inner.m[m0][c] += self.inner.dummy[c];
                }
                j += step;
            }
            let scale = 2f64.powi(-(m as i32));
            trapz_err *= scale;
            for c in 0..dim {
                self.inner.m[m0][c] *= scale;
            }
            int_err = 0.5 * (int_err + trapz_err);

            if m0 != 0 {
                Self::romberg_iterate(&mut self.inner.m, m, dim, &self.tv1, &self.tv2);
            }

            if m + 1 >= phi.jmin {
                let abs_res = 0.5 * (self.inner.m[0][0] + self.inner.t[0]).abs();
                let abs_err = 0.5 * (self.inner.m[0][0] - self.inner.t[0]).abs() + int_err;
                err = if abs_res == 0.0 { 0.0 } else { abs_err / abs_res };
                if err < phi.eps {
                    converged = true;
                    break;
                }
            }
        }

        if !converged {
            self.inner_not_converged += 1;
        }

        for c in 0..dim {
            res[c] = 0.5 * (self.inner.m[0][c] + self.inner.t[c]);
        }
        let _ = self.inner.size;
        let _ = err;
        int_err
    }

    /// Runs the full adaptive 2-D quadrature. `func(theta_idx, phi_idx, out)`
    /// must fill `out` (length `dim`) with the integrand's value and return
    /// an absolute error estimate (pass `0.0` for non-adaptive integrands).
    /// Returns the averaged result and the outer convergence criterion's
    /// final value (comparable against `theta.eps`; below it means the
    /// outer integration converged).
    pub fn integrate(&mut self, theta: &RombergParams, phi: &RombergParams, func: &mut Integrand) -> (Vec<f64>, f64) {
        let dim = self.dim;
        let mut res = vec![0.0; dim];

        if theta.min == theta.max {
            let mut dummy = vec![0.0; dim];
            let err = self.inner_romberg(phi, 0, func, &mut res);
            let _ = dummy;
            return (res, if res[0] == 0.0 { 0.0 } else { (err / res[0].abs()).abs() });
        }

        let grid_size = theta.grid_size();
        let mut m0 = 0usize;
        let mut err = 0.0;

        for m in 0..theta.jmax {
            if m == 0 {
                let mut first = vec![0.0; dim];
                let mut int_err = self.inner_romberg(phi, 0, func, &mut first);
                self.outer.t[..dim].copy_from_slice(&first);
                if !theta.equival {
                    let mut last = vec![0.0; dim];
                    int_err = 0.5 * (int_err + self.inner_romberg(phi, grid_size - 1, func, &mut last));
                    for c in 0..dim {
                        self.outer.t[c] = 0.5 * (last[c] + self.outer.t[c]);
                    }
                }
                self.outer.dummy[0] = int_err;
            } else if theta.periodic {
                for c in 0..dim {
                    self.outer.t[c] = 0.5 * (self.outer.t[c] + self.outer.m[0][c]);
                }
            } else {
                for c in 0..dim {
                    self.outer.t[c] = self.tv3[m - 1] * self.tv2[m] * (self.outer.t[c] - self.outer.m[0][c]) + self.outer.m[0][c];
                }
                m0 = m;
            }

            let step = (grid_size - 1) >> m;
            let mut int_err = if m == 0 { self.outer.dummy[0] } else { 0.0 };
            for c in 0..dim {
                self.outer.m[m0][c] = 0.0;
            }
            let mut j = step / 2;
            while j < grid_size {
                let mut point_res = vec![0.0; dim];
                int_err += self.inner_romberg(phi, j, func, &mut point_res);
                for c in 0..dim {
                    self.outer.m[m0][c] += point_res[c];
                }
                j += step;
            }
            let scale = 2f64.powi(-(m as i32));
            int_err *= scale;
            for c in 0..dim {
                self.outer.m[m0][c] *= scale;
            }
            if m == 0 {
                int_err = 0.5 * (self.outer.dummy[0] + int_err);
            }

            if m0 != 0 {
                Self::romberg_iterate(&mut self.outer.m, m, dim, &self.tv1, &self.tv2);
            }

            if m + 1 >= theta.jmin {
                let abs_res = 0.5 * (self.outer.m[0][0] + self.outer.t[0]).abs();
                let abs_err = 0.5 * (self.outer.m[0][0] - self.outer.t[0]).abs() + int_err;
                err = if abs_res == 0.0 { 0.0 } else { abs_err / abs_res };
                if err < theta.eps {
                    break;
                }
            }
        }

        for c in 0..dim {
            res[c] = 0.5 * (self.outer.m[0][c] + self.outer.t[c]);
        }
        (res, err)
    }
}
