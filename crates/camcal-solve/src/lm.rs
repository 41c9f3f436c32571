//! Packed-parameter least squares on top of `levenberg_marquardt`.
//!
//! Problems are written against a plain parameter vector; [`minimize`] wraps
//! them into the crate's stateful [`LeastSquaresProblem`] and runs its
//! MINPACK-style trust-region solver with diagonal scaling.

use crate::options::SolveOptions;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::trace;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A nonlinear least-squares problem `min_x 0.5 * |r(x)|^2`.
pub trait NllsProblem {
    fn n_residuals(&self) -> usize;

    /// Residuals at `x`; `None` when `x` is outside the valid domain.
    fn residuals(&self, x: &DVector<f64>) -> Option<DVector<f64>>;

    /// Jacobian of the residuals at a valid `x`.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolveReport {
    /// Residual evaluations, including rejected trial steps.
    pub evaluations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub converged: bool,
}

/// Residual assigned to every row outside the valid domain. Large enough
/// that the trust region always rejects such a step.
const OUT_OF_DOMAIN: f64 = 1e8;

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<f64>,
}

impl<P: NllsProblem> LeastSquaresProblem<f64, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(
            self.problem
                .residuals(&self.params)
                .unwrap_or_else(|| DVector::from_element(self.problem.n_residuals(), OUT_OF_DOMAIN)),
        )
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        Some(self.problem.jacobian(&self.params))
    }
}

/// Minimise `problem` from `x0`; `None` when the start point itself is
/// invalid.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(problem, x0, options), fields(params = x0.len()))
)]
pub fn minimize<P: NllsProblem>(
    problem: &P,
    x0: DVector<f64>,
    options: &SolveOptions,
) -> Option<(DVector<f64>, SolveReport)> {
    let initial_cost = 0.5 * problem.residuals(&x0)?.norm_squared();

    let lm = LevenbergMarquardt::new()
        .with_ftol(options.ftol.max(0.0))
        .with_xtol(options.xtol.max(0.0))
        .with_gtol(options.gtol.max(0.0))
        .with_patience(options.max_iters.max(1));
    let (wrapper, report) = lm.minimize(LmWrapper {
        problem,
        params: x0,
    });
    trace!(
        "lm stopped after {} evaluations: {:?}",
        report.number_of_evaluations,
        report.termination
    );

    Some((
        wrapper.params,
        SolveReport {
            evaluations: report.number_of_evaluations,
            initial_cost,
            final_cost: report.objective_function,
            converged: report.termination.was_successful(),
        },
    ))
}
