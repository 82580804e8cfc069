use crate::mesh::TriangleMesh2d;
use eyre::{eyre, WrapErr};
use nalgebra::Vector2;
use std::path::Path;
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataSet, Piece, UnstructuredGridPiece, Version, VertexNumbers,
    Vtk,
};

struct PointData {
    name: String,
    num_components: usize,
    values: Vec<f64>,
}

/// Builds a VTK unstructured grid from a triangle mesh and point data.
pub struct TriangleMeshDataSetBuilder<'a> {
    mesh: &'a TriangleMesh2d,
    // Only used for exporting directly to file
    title: Option<String>,
    point_data: Vec<PointData>,
}

impl<'a> TriangleMeshDataSetBuilder<'a> {
    pub fn from_mesh(mesh: &'a TriangleMesh2d) -> Self {
        Self {
            mesh,
            title: None,
            point_data: Vec::new(),
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..self
        }
    }

    pub fn with_point_scalar_attributes(mut self, name: impl Into<String>, values: &[f64]) -> Self {
        self.point_data.push(PointData {
            name: name.into(),
            num_components: 1,
            values: values.to_vec(),
        });
        self
    }

    /// Adds a vector field, padded with a zero third component.
    pub fn with_point_vector_attributes(mut self, name: impl Into<String>, values: &[Vector2<f64>]) -> Self {
        self.point_data.push(PointData {
            name: name.into(),
            num_components: 3,
            values: values.iter().flat_map(|v| [v.x, v.y, 0.0]).collect(),
        });
        self
    }

    pub fn try_build(&self) -> eyre::Result<DataSet> {
        let num_vertices = self.mesh.num_vertices();
        let points: Vec<f64> = self
            .mesh
            .vertices()
            .iter()
            .flat_map(|v| [v.x, v.y, 0.0])
            .collect();

        // Vertices are laid out as N, i_1, ..., i_N for each cell
        let mut vertices = Vec::with_capacity(4 * self.mesh.num_elements());
        for cell in self.mesh.connectivity() {
            vertices.push(3);
            for &index in cell {
                vertices.push(u32::try_from(index).wrap_err("Vertex index does not fit into VTK index type")?);
            }
        }

        let mut data = Attributes::new();
        for point_data in &self.point_data {
            if point_data.values.len() != point_data.num_components * num_vertices {
                return Err(eyre!(
                    "Point attribute \"{}\" has {} values, expected {}",
                    point_data.name,
                    point_data.values.len(),
                    point_data.num_components * num_vertices
                ));
            }
            let attribute = if point_data.num_components == 1 {
                Attribute::scalars(point_data.name.clone(), 1)
            } else {
                Attribute::vectors(point_data.name.clone())
            };
            data.point
                .push(attribute.with_data(point_data.values.clone()));
        }

        let piece = UnstructuredGridPiece {
            points: points.into(),
            cells: Cells {
                cell_verts: VertexNumbers::Legacy {
                    num_cells: self.mesh.num_elements() as u32,
                    vertices,
                },
                types: vec![CellType::Triangle; self.mesh.num_elements()],
            },
            data,
        };

        Ok(DataSet::UnstructuredGrid {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(piece))],
        })
    }

    /// Convenience function for directly exporting the dataset to a file.
    pub fn try_export(&self, filename: impl AsRef<Path>) -> eyre::Result<()> {
        let filepath = filename.as_ref();
        if let Some(parent) = filepath.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let fallback_title = filepath
            .file_stem()
            .map(|os_str| os_str.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string());
        let dataset = self.try_build()?;
        Vtk {
            version: Version { major: 4, minor: 1 },
            // If we don't have a title then just make the filepath the title
            title: self.title.clone().unwrap_or(fallback_title),
            byte_order: ByteOrder::BigEndian,
            data: dataset,
            file_path: None,
        }
        .export(filepath)
        .wrap_err_with(|| format!("Failed to export VTK file {}", filepath.display()))?;
        Ok(())
    }
}
