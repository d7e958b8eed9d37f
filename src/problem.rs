//! Nonlinear variational problems `F(u; v) = 0` with Dirichlet conditions.
use crate::assembly::{CompiledForm, FormError};
use crate::expr::{EvaluationPoint, Expr};
use crate::form::Form;
use crate::space::Function;
use hytra_optimize::calculus::{DifferentiableVectorFunction, VectorFunction};
use hytra_optimize::newton::{newton, newton_line_search, BacktrackingLineSearch, NewtonError, NewtonSettings};
use hytra_sparse::BandMatrix;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use std::error::Error;

/// Prescribes the value of one component of the unknown on a marked surface.
#[derive(Debug, Clone)]
pub struct DirichletBc {
    pub component: usize,
    pub surface: usize,
    pub value: Expr,
}

impl DirichletBc {
    pub fn new(component: usize, surface: usize, value: Expr) -> Self {
        Self {
            component,
            surface,
            value,
        }
    }
}

#[derive(Debug, Clone)]
struct ConstrainedDof {
    dof: usize,
    value: Expr,
    point: EvaluationPoint,
}

/// A residual form together with its unknown and Dirichlet conditions.
///
/// Rows of constrained dofs are replaced by `u_i - g_i` in the residual and by identity rows
/// in the Jacobian.
#[derive(Debug, Clone)]
pub struct NonlinearProblem {
    form: CompiledForm,
    constraints: Vec<ConstrainedDof>,
    time: f64,
}

impl NonlinearProblem {
    pub fn new(form: &Form, unknown: &Function, bcs: &[DirichletBc]) -> Result<Self, FormError> {
        let compiled = CompiledForm::compile(form, unknown)?;
        let space = unknown.space();
        let mesh = space.mesh();
        let mut constraints = Vec::new();
        for bc in bcs {
            if bc.component >= space.num_components() {
                return Err(FormError::TestComponentOutOfRange {
                    component: bc.component,
                    num_components: space.num_components(),
                });
            }
            for vertex in 0..mesh.num_vertices() {
                if mesh.surface_marker(vertex) == bc.surface {
                    let (cell, xi) = mesh.vertex_cell(vertex);
                    constraints.push(ConstrainedDof {
                        dof: space.dof(vertex, bc.component),
                        value: bc.value.clone(),
                        point: EvaluationPoint {
                            cell,
                            xi,
                            x: mesh.vertices()[vertex],
                            t: 0.0,
                        },
                    });
                }
            }
        }

        Ok(Self {
            form: compiled,
            constraints,
            time: 0.0,
        })
    }

    pub fn unknown(&self) -> &Function {
        self.form.unknown()
    }

    pub fn form(&self) -> &CompiledForm {
        &self.form
    }

    /// Sets the global time used for expressions that are not on their own clock.
    pub fn set_time(&mut self, t: f64) {
        self.time = t;
    }

    pub fn constrained_dofs(&self) -> impl Iterator<Item = usize> + '_ {
        self.constraints.iter().map(|c| c.dof)
    }

    /// Assembles the Jacobian at `x`, with identity rows for constrained dofs.
    pub fn jacobian(&self, x: &DVector<f64>) -> BandMatrix<f64> {
        self.unknown().set_dofs(x);
        let mut jacobian = self.form.assemble_jacobian(self.time);
        for constraint in &self.constraints {
            jacobian.set_identity_row(constraint.dof);
        }
        jacobian
    }

    /// Solves the problem with Newton's method, starting from the current value of the
    /// unknown.
    ///
    /// On success the unknown holds the solution and the number of iterations is returned.
    /// On failure the unknown is left at the initial guess.
    pub fn solve(&mut self, settings: NewtonSettings<f64>, line_search: bool) -> Result<usize, NewtonError> {
        let initial = self.unknown().clone_dofs();
        let n = initial.len();
        let mut x = initial.clone();
        let mut f = DVector::<f64>::zeros(n);
        let mut dx = DVector::<f64>::zeros(n);

        let result = if line_search {
            newton_line_search(
                &mut *self,
                &mut x,
                &mut f,
                &mut dx,
                settings,
                &mut BacktrackingLineSearch::default(),
            )
        } else {
            newton(&mut *self, &mut x, &mut f, &mut dx, settings)
        };

        match result {
            Ok(iterations) => {
                self.unknown().set_dofs(&x);
                Ok(iterations)
            }
            Err(err) => {
                self.unknown().set_dofs(&initial);
                Err(err)
            }
        }
    }
}

impl VectorFunction<f64> for NonlinearProblem {
    fn dimension(&self) -> usize {
        self.form.num_dofs()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) {
        self.unknown().set_dofs(x);
        let mut residual = DVector::zeros(self.form.num_dofs());
        self.form.assemble_residual_into(&mut residual, self.time);
        for constraint in &self.constraints {
            let point = EvaluationPoint {
                t: self.time,
                ..constraint.point
            };
            residual[constraint.dof] = x[constraint.dof] - constraint.value.eval(&point);
        }
        f.copy_from(&residual);
    }
}

impl DifferentiableVectorFunction<f64> for NonlinearProblem {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
    ) -> Result<(), Box<dyn Error>> {
        let x = x.clone_owned();
        let lu = self.jacobian(&x).factor()?;
        lu.solve_into(DVectorViewMut::from(sol), DVectorView::from(rhs))?;
        Ok(())
    }
}
