use crate::config::{Discretization, Extra, Extras, MeshFamily};
use crate::exact::{BoundaryData, ExactSolution, ManufacturedFlow};
use crate::geometry::curve_to_circle;
use crate::mesh::procedural::{
    create_hexagon_disk_mesh_2d, create_perturbed_unit_square_mesh_2d, create_unit_square_criss_cross_mesh_2d,
    create_unit_square_uniform_tri_mesh_2d,
};
use crate::mesh::refinement::refine_uniformly_repeat;
use crate::mesh::split::{alfeld_split, powell_sabin_split};
use crate::mesh::{Boundary, MeshLevel, TriangleMesh2d};
use log::debug;

/// Cells per side of the base mesh of the unstructured family, i.e. a target size of `0.25`.
pub const UNSTRUCTURED_CELLS_PER_DIM: usize = 4;
pub const DISK_RADIUS: f64 = 1.0;

/// Builds the mesh and the exact solution of a mesh family at a given refinement level.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshBuilder;

impl MeshBuilder {
    pub fn build(&self, discretization: &Discretization, level: usize) -> (MeshLevel, ExactSolution) {
        let mesh_level = self.build_mesh(discretization.mesh_family, &discretization.extras, level);
        (mesh_level, Self::exact_solution(discretization.mesh_family))
    }

    pub fn exact_solution(family: MeshFamily) -> ExactSolution {
        match family {
            MeshFamily::Curved => ExactSolution::new(ManufacturedFlow::Vortex, BoundaryData::NoSlip),
            MeshFamily::Unstructured | MeshFamily::TypeOne | MeshFamily::SingularVertex => {
                ExactSolution::new(ManufacturedFlow::Trigonometric, BoundaryData::Exact)
            }
        }
    }

    /// Builds the (possibly split and curved) mesh of a family at the given refinement level.
    pub fn build_mesh(&self, family: MeshFamily, extras: &Extras, level: usize) -> MeshLevel {
        let structured_cells = 1 << (level + 1);
        let (mesh, boundary) = match family {
            MeshFamily::Unstructured => {
                let base = create_perturbed_unit_square_mesh_2d(UNSTRUCTURED_CELLS_PER_DIM);
                (refine_uniformly_repeat(&base, Boundary::Polygonal, level), Boundary::Polygonal)
            }
            MeshFamily::Curved => {
                let boundary = Boundary::Circle { radius: DISK_RADIUS };
                let base = create_hexagon_disk_mesh_2d(DISK_RADIUS);
                (refine_uniformly_repeat(&base, boundary, level), boundary)
            }
            MeshFamily::TypeOne => (
                create_unit_square_uniform_tri_mesh_2d(structured_cells),
                Boundary::Polygonal,
            ),
            MeshFamily::SingularVertex => (
                create_unit_square_criss_cross_mesh_2d(structured_cells),
                Boundary::Polygonal,
            ),
        };
        let mesh = apply_splits(mesh, boundary, extras);
        debug!(
            "Built {} mesh at level {level}: {} vertices, {} elements",
            family,
            mesh.num_vertices(),
            mesh.num_elements()
        );

        let mesh_level = MeshLevel::new(mesh, boundary, level);
        match boundary {
            Boundary::Circle { radius } => {
                let geometry = curve_to_circle(mesh_level.mesh(), mesh_level.topology(), radius);
                mesh_level.with_geometry(geometry)
            }
            Boundary::Polygonal => mesh_level,
        }
    }
}

/// Applies the selected splits in the order of the extras.
fn apply_splits(mesh: TriangleMesh2d, boundary: Boundary, extras: &Extras) -> TriangleMesh2d {
    extras.iter().fold(mesh, |mesh, extra| match extra {
        Extra::PowellSabinSplit => powell_sabin_split(&mesh, boundary),
        Extra::AlfeldSplit => alfeld_split(&mesh),
        _ => mesh,
    })
}
