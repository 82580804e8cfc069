//! Assembly of the global sparse system from element and face contributions.
//!
//! Local contributions are computed in parallel with one workspace per rayon job and then
//! scattered sequentially into a CSR matrix with a precomputed sparsity pattern.
use crate::form::{BilinearForm, FaceTraces, LinearForm};
use crate::mesh::MeshLevel;
use crate::quadrature::{triangle_quadrature, SegmentQuadrature, TriangleQuadrature};
use crate::space::{LocalBasisValues, SpacePair};
use eyre::eyre;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{pattern::SparsityPattern, CsrMatrix};
use rayon::prelude::*;

/// A local matrix and load vector together with the global indices of its rows and columns.
///
/// Global indices may repeat, e.g. for degrees of freedom shared by both sides of a face.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalContribution {
    pub dofs: Vec<usize>,
    pub matrix: DMatrix<f64>,
    pub vector: DVector<f64>,
}

impl LocalContribution {
    fn zeros(dofs: Vec<usize>) -> Self {
        let n = dofs.len();
        Self {
            dofs,
            matrix: DMatrix::zeros(n, n),
            vector: DVector::zeros(n),
        }
    }
}

#[derive(Debug, Default)]
struct Workspace {
    owner: LocalBasisValues,
    neighbor: LocalBasisValues,
    traces: FaceTraces,
}

/// The assembled linear system.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    pub matrix: CsrMatrix<f64>,
    pub rhs: DVector<f64>,
}

/// Builds a sparsity pattern from the (possibly repeated) index sets of local blocks.
fn pattern_from_blocks<'a>(num_rows: usize, blocks: impl Iterator<Item = &'a [usize]>) -> SparsityPattern {
    let mut coordinates = Vec::new();
    for dofs in blocks {
        for &i in dofs {
            coordinates.extend(dofs.iter().map(|&j| (i, j)));
        }
    }
    coordinates.par_sort_unstable();
    coordinates.dedup();

    let mut offsets = Vec::with_capacity(num_rows + 1);
    let mut column_indices = Vec::with_capacity(coordinates.len());
    offsets.push(0);
    for (i, j) in coordinates {
        assert!(i < num_rows, "Coordinates must be in bounds");
        while offsets.len() <= i {
            // Handles consecutive empty rows
            offsets.push(column_indices.len());
        }
        column_indices.push(j);
    }
    while offsets.len() < num_rows + 1 {
        offsets.push(column_indices.len());
    }

    SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
        .expect("Internal error: pattern built from sorted, deduplicated coordinates must be valid")
}

fn face_dofs(space: &SpacePair, level: &MeshLevel, edge: usize) -> Vec<usize> {
    let (owner, neighbor) = level.topology().edge_elements(edge);
    let mut dofs = space.element_dofs(owner.element);
    if let Some(neighbor) = neighbor {
        dofs.extend(space.element_dofs(neighbor.element));
    }
    dofs
}

/// The sparsity pattern of the system matrix.
///
/// Element blocks couple all degrees of freedom of an element. With DG jumps enabled, interior
/// faces additionally couple the degrees of freedom of both adjacent elements.
pub fn sparsity_pattern(space: &SpacePair, level: &MeshLevel) -> SparsityPattern {
    let mut blocks: Vec<Vec<usize>> = (0..level.num_elements())
        .map(|element| space.element_dofs(element))
        .collect();
    if space.has_dg_jumps() {
        blocks.extend(
            level
                .topology()
                .interior_edges()
                .map(|edge| face_dofs(space, level, edge)),
        );
    }
    pattern_from_blocks(space.num_dofs(), blocks.iter().map(Vec::as_slice))
}

struct AssemblyContext<'a> {
    bilinear: &'a BilinearForm,
    linear: &'a LinearForm,
    space: &'a SpacePair,
    level: &'a MeshLevel,
    quadrature: TriangleQuadrature,
    face_rule: SegmentQuadrature,
}

impl AssemblyContext<'_> {
    fn element_contribution(&self, element: usize, ws: &mut Workspace) -> LocalContribution {
        let (space, level) = (self.space, self.level);
        let diameter = level.element_diameter(element);
        let mut contribution = LocalContribution::zeros(space.element_dofs(element));
        for (w, xi) in self.quadrature.iter() {
            let geometry = level.geometry_point(element, xi);
            let weight = geometry.physical_weight(w);
            space.populate(element, xi, &geometry, &mut ws.owner);
            for term in &self.bilinear.volume {
                term.accumulate(&ws.owner, diameter, weight, &mut contribution.matrix);
            }
            for term in self.linear.volume_terms() {
                term.accumulate_volume(
                    &ws.owner,
                    &self.linear.exact,
                    &geometry.point,
                    weight,
                    &mut contribution.vector,
                );
            }
        }
        contribution
    }

    fn face_contribution(&self, edge: usize, ws: &mut Workspace) -> LocalContribution {
        let (space, level) = (self.space, self.level);
        let (owner, neighbor) = level.topology().edge_elements(edge);
        let mut contribution = LocalContribution::zeros(face_dofs(space, level, edge));
        let face_length = level.face_length(edge);

        for point in level.face_quadrature(edge, &self.face_rule) {
            let geometry = level.geometry_point(owner.element, &point.xi_owner);
            space.populate(owner.element, &point.xi_owner, &geometry, &mut ws.owner);
            match (neighbor, point.xi_neighbor) {
                (Some(neighbor), Some(xi_neighbor)) => {
                    let geometry = level.geometry_point(neighbor.element, &xi_neighbor);
                    space.populate(neighbor.element, &xi_neighbor, &geometry, &mut ws.neighbor);
                    ws.traces.populate_interior(&ws.owner, &ws.neighbor, &point.normal);
                    for term in &self.bilinear.skeleton {
                        term.accumulate(&ws.traces, &point.normal, face_length, point.weight, &mut contribution.matrix);
                    }
                }
                _ => {
                    ws.traces.populate_boundary(&ws.owner, &point.normal);
                    for term in &self.bilinear.boundary {
                        term.accumulate(&ws.traces, &point.normal, face_length, point.weight, &mut contribution.matrix);
                    }
                    for term in self.linear.boundary_terms() {
                        term.accumulate_boundary(
                            &ws.traces,
                            &self.linear.exact,
                            &point.point,
                            &point.normal,
                            face_length,
                            point.weight,
                            &mut contribution.vector,
                        );
                    }
                }
            }
        }
        contribution
    }
}

/// Computes all element and face contributions of the given forms.
pub fn local_contributions(
    bilinear: &BilinearForm,
    linear: &LinearForm,
    space: &SpacePair,
    level: &MeshLevel,
) -> Vec<LocalContribution> {
    let context = AssemblyContext {
        bilinear,
        linear,
        space,
        level,
        quadrature: triangle_quadrature(space.quadrature_strength()),
        face_rule: space.face_rule(),
    };
    let mut contributions: Vec<_> = (0..level.num_elements())
        .into_par_iter()
        .with_min_len(50)
        .map_init(Workspace::default, |ws, element| context.element_contribution(element, ws))
        .collect();

    let topology = level.topology();
    let has_boundary_terms = !bilinear.boundary.is_empty() || linear.boundary_terms().next().is_some();
    let face_edges: Vec<usize> = (0..topology.num_edges())
        .filter(|&edge| {
            if topology.is_boundary_edge(edge) {
                has_boundary_terms
            } else {
                !bilinear.skeleton.is_empty()
            }
        })
        .collect();
    contributions.par_extend(
        face_edges
            .into_par_iter()
            .with_min_len(50)
            .map_init(Workspace::default, |ws, edge| context.face_contribution(edge, ws)),
    );
    contributions
}

/// Adds a local contribution to the global matrix and vector.
fn scatter(matrix: &mut CsrMatrix<f64>, rhs: &mut DVector<f64>, contribution: &LocalContribution) -> eyre::Result<()> {
    for (local_row, &row) in contribution.dofs.iter().enumerate() {
        rhs[row] += contribution.vector[local_row];
        let mut csr_row = matrix.row_mut(row);
        let (columns, values) = csr_row.cols_and_values_mut();
        for (local_col, &col) in contribution.dofs.iter().enumerate() {
            let entry = columns
                .binary_search(&col)
                .map_err(|_| eyre!("Entry ({row}, {col}) is missing from the sparsity pattern"))?;
            values[entry] += contribution.matrix[(local_row, local_col)];
        }
    }
    Ok(())
}

/// Assembles the global system matrix and load vector.
pub fn assemble_system(
    bilinear: &BilinearForm,
    linear: &LinearForm,
    space: &SpacePair,
    level: &MeshLevel,
) -> eyre::Result<LinearSystem> {
    let pattern = sparsity_pattern(space, level);
    let nnz = pattern.nnz();
    let mut matrix = CsrMatrix::try_from_pattern_and_values(pattern, vec![0.0; nnz])
        .map_err(|err| eyre!("Failed to create system matrix: {err}"))?;
    let mut rhs = DVector::zeros(space.num_dofs());

    let contributions = local_contributions(bilinear, linear, space, level);
    for contribution in &contributions {
        scatter(&mut matrix, &mut rhs, contribution)?;
    }
    debug!(
        "Assembled system with {} DOFs and {} nonzeros from {} local contributions",
        space.num_dofs(),
        nnz,
        contributions.len()
    );
    Ok(LinearSystem { matrix, rhs })
}
