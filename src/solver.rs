//! Direct solution of the discrete Stokes system.
use crate::assembly::{assemble_system, LinearSystem};
use crate::element::reference_vertices;
use crate::exact::ExactSolution;
use crate::form::{BilinearForm, LinearForm};
use crate::geometry::GeometryPoint;
use crate::mesh::MeshLevel;
use crate::space::{LocalBasisValues, SpacePair};
use eyre::{eyre, WrapErr};
use festokes_sparse::{nested_dissection, LdlFactorization};
use log::{debug, info};
use nalgebra::{DVector, Matrix2, Point2, Vector2};
use nalgebra_sparse::CsrMatrix;

/// Discrete fields evaluated at a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointValues {
    pub velocity: Vector2<f64>,
    /// Velocity gradient with rows corresponding to components.
    pub velocity_gradient: Matrix2<f64>,
    pub divergence: f64,
    pub pressure: f64,
}

/// Coefficients of a discrete velocity and pressure over a space pair.
#[derive(Debug, Clone)]
pub struct DiscreteSolution<'a> {
    space: &'a SpacePair,
    level: &'a MeshLevel,
    coefficients: DVector<f64>,
}

impl<'a> DiscreteSolution<'a> {
    pub fn new(space: &'a SpacePair, level: &'a MeshLevel, coefficients: DVector<f64>) -> Self {
        assert_eq!(coefficients.len(), space.num_dofs(), "Coefficient vector must match the space.");
        Self {
            space,
            level,
            coefficients,
        }
    }

    pub fn space(&self) -> &'a SpacePair {
        self.space
    }

    pub fn level(&self) -> &'a MeshLevel {
        self.level
    }

    pub fn coefficients(&self) -> &DVector<f64> {
        &self.coefficients
    }

    pub fn velocity_order(&self) -> usize {
        self.space.velocity_order()
    }

    pub fn pressure_order(&self) -> usize {
        self.space.pressure_order()
    }

    /// Evaluates the discrete fields at the reference point `xi` of an element.
    pub fn evaluate(&self, element: usize, xi: &Point2<f64>, geometry: &GeometryPoint) -> PointValues {
        let mut values = LocalBasisValues::default();
        self.space.populate(element, xi, geometry, &mut values);
        let dofs = self.space.element_dofs(element);
        let nu = values.num_velocity();

        let mut result = PointValues {
            velocity: Vector2::zeros(),
            velocity_gradient: Matrix2::zeros(),
            divergence: 0.0,
            pressure: 0.0,
        };
        for i in 0..nu {
            let c = self.coefficients[dofs[i]];
            result.velocity += values.velocity.values[i] * c;
            result.velocity_gradient += values.velocity.gradients[i] * c;
            result.divergence += values.velocity.divergences[i] * c;
        }
        for (m, phi) in values.pressure.values.iter().enumerate() {
            result.pressure += self.coefficients[dofs[nu + m]] * phi;
        }
        result
    }

    /// The mean of $p_h - p$ over the domain.
    pub fn pressure_offset(&self, exact: &ExactSolution) -> f64 {
        let [difference, area] = self
            .level
            .integrate(self.space.quadrature_strength(), |element, xi, geometry| {
                let p_h = self.evaluate(element, xi, geometry).pressure;
                [p_h - exact.pressure(&geometry.point), 1.0]
            });
        difference / area
    }

    /// Shifts the discrete pressure such that its mean matches the mean of the exact pressure.
    ///
    /// Lagrange bases are partitions of unity, so the shift is applied to all pressure
    /// coefficients. Returns the removed offset.
    pub fn remove_pressure_offset(&mut self, exact: &ExactSolution) -> f64 {
        let offset = self.pressure_offset(exact);
        let start = self.space.pressure_offset();
        self.coefficients
            .rows_mut(start, self.space.pressure().num_dofs())
            .add_scalar_mut(-offset);
        offset
    }

    /// Velocity and pressure at the mesh vertices, averaged over the incident elements.
    pub fn sample_at_vertices(&self) -> (Vec<Vector2<f64>>, Vec<f64>) {
        let mesh = self.level.mesh();
        let mut velocity = vec![Vector2::zeros(); mesh.num_vertices()];
        let mut pressure = vec![0.0; mesh.num_vertices()];
        let mut counts = vec![0usize; mesh.num_vertices()];
        for (element, conn) in mesh.connectivity().iter().enumerate() {
            for (xi, &v) in reference_vertices().iter().zip(conn) {
                let geometry = self.level.geometry_point(element, xi);
                let values = self.evaluate(element, xi, &geometry);
                velocity[v] += values.velocity;
                pressure[v] += values.pressure;
                counts[v] += 1;
            }
        }
        for ((u, p), &count) in velocity.iter_mut().zip(&mut pressure).zip(&counts) {
            if count > 0 {
                *u /= count as f64;
                *p /= count as f64;
            }
        }
        (velocity, pressure)
    }
}

/// Restricts a matrix to the rows and columns of the free degrees of freedom.
fn restrict_to_free_dofs(matrix: &CsrMatrix<f64>, free_dofs: &[usize]) -> eyre::Result<CsrMatrix<f64>> {
    let mut free_index = vec![None; matrix.nrows()];
    for (index, &dof) in free_dofs.iter().enumerate() {
        free_index[dof] = Some(index);
    }

    let mut offsets = Vec::with_capacity(free_dofs.len() + 1);
    let mut column_indices = Vec::new();
    let mut values = Vec::new();
    offsets.push(0);
    for &dof in free_dofs {
        let row = matrix.row(dof);
        for (&col, &value) in row.col_indices().iter().zip(row.values()) {
            if let Some(j) = free_index[col] {
                column_indices.push(j);
                values.push(value);
            }
        }
        offsets.push(column_indices.len());
    }
    let n = free_dofs.len();
    CsrMatrix::try_from_csr_data(n, n, offsets, column_indices, values)
        .map_err(|err| eyre!("Failed to restrict system to free DOFs: {err}"))
}

/// Solves the discrete Stokes problem with a sparse direct factorization.
#[derive(Debug, Clone, Copy, Default)]
pub struct StokesSolver;

impl StokesSolver {
    /// Assembles and solves the system, then removes the pressure offset.
    ///
    /// Dirichlet degrees of freedom are set to the interpolated boundary velocity. The remaining
    /// degrees of freedom are ordered by nested dissection and solved with an LDLᵀ
    /// factorization, which relies on the pressure regularization for definiteness of the
    /// pressure block.
    pub fn solve<'a>(
        &self,
        bilinear: &BilinearForm,
        linear: &LinearForm,
        space: &'a SpacePair,
        level: &'a MeshLevel,
        exact: &ExactSolution,
    ) -> eyre::Result<DiscreteSolution<'a>> {
        let LinearSystem { matrix, rhs } =
            assemble_system(bilinear, linear, space, level).wrap_err("Failed to assemble the Stokes system")?;

        let mut coefficients = DVector::zeros(space.num_dofs());
        space.interpolate_boundary(
            level,
            |x| exact.boundary_velocity(x),
            coefficients.as_mut_slice(),
        );
        let residual = &rhs - &matrix * &coefficients;

        let dirichlet = space.dirichlet_dofs();
        let free_dofs: Vec<usize> = (0..space.num_dofs()).filter(|&dof| !dirichlet[dof]).collect();
        let free_matrix = restrict_to_free_dofs(&matrix, &free_dofs)?;
        let free_residual = DVector::from_iterator(free_dofs.len(), free_dofs.iter().map(|&dof| residual[dof]));

        let locations = space.dof_locations(level);
        let free_locations: Vec<_> = free_dofs.iter().map(|&dof| locations[dof]).collect();
        let permutation = nested_dissection(free_matrix.pattern(), &free_locations);
        let factorization = LdlFactorization::factor_permuted(&free_matrix, permutation)
            .wrap_err("Sparse factorization of the Stokes system failed")?;
        debug!(
            "Factorized {} free DOFs ({} Dirichlet), nnz(L) = {}",
            free_dofs.len(),
            space.num_dofs() - free_dofs.len(),
            factorization.nnz()
        );

        let correction = factorization.solve(&free_residual);
        for (&dof, delta) in free_dofs.iter().zip(correction.iter()) {
            coefficients[dof] += delta;
        }
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(eyre!("The discrete solution contains non-finite values"));
        }

        let mut solution = DiscreteSolution::new(space, level, coefficients);
        let offset = solution.remove_pressure_offset(exact);
        info!(
            "Solved level {} with {} DOFs (pressure offset {offset:.3e})",
            level.refinement_level(),
            space.num_dofs()
        );
        Ok(solution)
    }
}
