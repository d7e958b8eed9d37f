//! Legacy VTK output of nodal fields on interval meshes.
use crate::mesh::IntervalMesh;
use eyre::{eyre, WrapErr};
use std::convert::TryInto;
use std::path::Path;
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, IOBuffer, Piece,
    UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

/// Builds an unstructured grid of line cells, with one scalar point attribute per named field.
///
/// Each field must have one value per mesh vertex.
pub fn interval_mesh_dataset(mesh: &IntervalMesh, fields: &[(String, Vec<f64>)]) -> eyre::Result<DataSet> {
    let points: Vec<f64> = mesh
        .vertices()
        .iter()
        .flat_map(|x| [*x, 0.0, 0.0])
        .collect();

    let mut vertices: Vec<u32> = Vec::with_capacity(3 * mesh.num_cells());
    for cell in 0..mesh.num_cells() {
        let [a, b] = mesh.cell_vertices(cell);
        vertices.push(2);
        vertices.push(a.try_into()?);
        vertices.push(b.try_into()?);
    }

    let mut point_attributes = Vec::with_capacity(fields.len());
    for (name, values) in fields {
        if values.len() != mesh.num_vertices() {
            return Err(eyre!(
                "field {} has {} values but the mesh has {} vertices",
                name,
                values.len(),
                mesh.num_vertices()
            ));
        }
        point_attributes.push(Attribute::DataArray(DataArray {
            name: name.clone(),
            elem: ElementType::Scalars {
                num_comp: 1,
                lookup_table: None,
            },
            data: IOBuffer::F64(values.clone()),
        }));
    }

    let piece = UnstructuredGridPiece {
        points: points.into(),
        cells: Cells {
            cell_verts: VertexNumbers::Legacy {
                num_cells: mesh.num_cells().try_into()?,
                vertices,
            },
            types: vec![CellType::Line; mesh.num_cells()],
        },
        data: Attributes {
            point: point_attributes,
            cell: Vec::new(),
        },
    };

    Ok(DataSet::UnstructuredGrid {
        meta: None,
        pieces: vec![Piece::Inline(Box::new(piece))],
    })
}

/// Writes `dataset` to `path`, creating missing parent directories.
pub fn write_vtk(dataset: DataSet, path: impl AsRef<Path>, title: &str) -> eyre::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    Vtk {
        version: Version { major: 4, minor: 1 },
        title: title.to_string(),
        byte_order: ByteOrder::BigEndian,
        data: dataset,
        file_path: None,
    }
    .export(path)
    .map_err(|err| eyre!("failed to write VTK file {}: {:?}", path.display(), err))
}
