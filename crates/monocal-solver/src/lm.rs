//! Least-squares front end over the `levenberg-marquardt` crate.
//!
//! Problems are written against the workspace `nalgebra`; the optimiser
//! crate is built on an older `nalgebra` major, so vectors and matrices are
//! copied across at the [`LmWrapper`] boundary.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use lm_nalgebra::{storage::Owned, Dyn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

type LmVector = lm_nalgebra::DVector<f64>;
type LmMatrix = lm_nalgebra::DMatrix<f64>;

/// Dense non-linear least squares problem.
pub trait NllsProblem {
    fn num_params(&self) -> usize;
    fn num_residuals(&self) -> usize;

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Forward-difference Jacobian; override when structure allows cheaper columns.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let base = self.residuals(x);
        let mut j = DMatrix::zeros(self.num_residuals(), x.len());
        let mut xp = x.clone();
        for k in 0..x.len() {
            let h = finite_difference_step(x[k]);
            xp[k] = x[k] + h;
            let rp = self.residuals(&xp);
            j.set_column(k, &((rp - &base) / h));
            xp[k] = x[k];
        }
        j
    }
}

#[inline]
pub(crate) fn finite_difference_step(x: f64) -> f64 {
    1e-7 * x.abs().max(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Evaluation budget, in multiples of `num_params + 1`.
    pub max_iters: usize,
    /// Relative tolerance on the cost reduction.
    pub ftol: f64,
    /// Tolerance on the cosine between residuals and Jacobian columns.
    pub gtol: f64,
    /// Relative tolerance on the step length.
    pub xtol: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 200,
            ftol: 1e-12,
            gtol: 1e-10,
            xtol: 1e-12,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    /// Residual evaluations spent by the optimiser.
    pub iterations: usize,
    /// `0.5 * |r|^2` at the returned parameters.
    pub final_cost: f64,
    pub converged: bool,
}

fn to_lm(v: &DVector<f64>) -> LmVector {
    LmVector::from_column_slice(v.as_slice())
}

fn from_lm(v: &LmVector) -> DVector<f64> {
    DVector::from_column_slice(v.as_slice())
}

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<f64>,
}

impl<P: NllsProblem> LeastSquaresProblem<f64, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &LmVector) {
        self.params = from_lm(x);
    }

    fn params(&self) -> LmVector {
        to_lm(&self.params)
    }

    fn residuals(&self) -> Option<LmVector> {
        Some(to_lm(&self.problem.residuals(&self.params)))
    }

    fn jacobian(&self) -> Option<LmMatrix> {
        let j = self.problem.jacobian(&self.params);
        Some(LmMatrix::from_column_slice(j.nrows(), j.ncols(), j.as_slice()))
    }
}

/// MINPACK-style Levenberg-Marquardt from the `levenberg-marquardt` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LmBackend;

impl LmBackend {
    pub fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<f64>,
        opts: &SolveOptions,
    ) -> (DVector<f64>, SolveReport) {
        let lm = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_patience(opts.max_iters.max(1));

        let wrapper = LmWrapper {
            problem,
            params: x0,
        };

        let (wrapper, report) = lm.minimize(wrapper);

        (
            wrapper.params,
            SolveReport {
                iterations: report.number_of_evaluations,
                final_cost: report.objective_function,
                converged: report.termination.was_successful(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct OneDim;

    impl NllsProblem for OneDim {
        fn num_params(&self) -> usize {
            1
        }
        fn num_residuals(&self) -> usize {
            1
        }
        fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
            DVector::from_element(1, x[0] - 3.0)
        }
    }

    /// Rosenbrock as residuals `(1 - a, 10 (b - a^2))`.
    struct Rosenbrock;

    impl NllsProblem for Rosenbrock {
        fn num_params(&self) -> usize {
            2
        }
        fn num_residuals(&self) -> usize {
            2
        }
        fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
            DVector::from_vec(vec![1.0 - x[0], 10.0 * (x[1] - x[0] * x[0])])
        }
        fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, -20.0 * x[0], 10.0])
        }
    }

    #[test]
    fn solves_trivial_problem() {
        let x0 = DVector::from_element(1, 10.0);
        let (x, report) = LmBackend.solve(&OneDim, x0, &SolveOptions::default());
        assert_relative_eq!(x[0], 3.0, epsilon = 1e-6);
        assert!(report.final_cost < 1e-12);
        assert!(report.converged, "{report:?}");
        assert!(report.iterations > 0);
    }

    #[test]
    fn solves_rosenbrock() {
        let x0 = DVector::from_vec(vec![-1.2, 1.0]);
        let (x, report) = LmBackend.solve(&Rosenbrock, x0, &SolveOptions::default());
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-5);
        assert!(report.final_cost < 1e-10, "cost {}", report.final_cost);
    }

    #[test]
    fn finite_difference_jacobian_matches_analytic() {
        let x = DVector::from_vec(vec![0.7, -0.3]);
        let analytic = Rosenbrock.jacobian(&x);
        let numeric = ResidualsOnly(&Rosenbrock).jacobian(&x);
        assert_relative_eq!(numeric, analytic, epsilon = 1e-4);
    }

    /// Forwards residuals only, so the default Jacobian is used.
    struct ResidualsOnly<'a>(&'a Rosenbrock);

    impl NllsProblem for ResidualsOnly<'_> {
        fn num_params(&self) -> usize {
            self.0.num_params()
        }
        fn num_residuals(&self) -> usize {
            self.0.num_residuals()
        }
        fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
            self.0.residuals(x)
        }
    }
}
