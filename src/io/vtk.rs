//! Legacy VTK export of piecewise polynomial fields on one-dimensional meshes.
//!
//! Each cell is written as a poly-line through its own sample points, so discontinuities
//! between cells are preserved.
use hpdwr_traits::Real;
use std::error::Error;
use std::fs;
use std::path::Path;
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, Piece,
    UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

#[derive(Debug, Clone, Default)]
pub struct DgDataSetBuilder {
    // Only used for exporting directly to file
    title: Option<String>,
    points: Vec<f64>,
    cell_point_counts: Vec<usize>,
    point_data: Vec<(String, Vec<f64>)>,
    cell_data: Vec<(String, Vec<f64>)>,
}

fn to_f64<T: Real>(values: impl IntoIterator<Item = T>) -> Vec<f64> {
    values
        .into_iter()
        .map(|v| v.to_subset().unwrap_or(f64::NAN))
        .collect()
}

impl DgDataSetBuilder {
    /// Creates a builder from the sample coordinates of each cell.
    pub fn from_cell_samples<T: Real>(cell_samples: &[Vec<T>]) -> Self {
        Self {
            title: None,
            points: to_f64(cell_samples.iter().flatten().copied()),
            cell_point_counts: cell_samples.iter().map(Vec::len).collect(),
            point_data: Vec::new(),
            cell_data: Vec::new(),
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..self
        }
    }

    /// Adds a scalar field with one value per sample point.
    pub fn with_point_scalars<T: Real>(mut self, name: impl Into<String>, values: impl IntoIterator<Item = T>) -> Self {
        self.point_data.push((name.into(), to_f64(values)));
        self
    }

    /// Adds a scalar field with one value per cell.
    pub fn with_cell_scalars<T: Real>(mut self, name: impl Into<String>, values: impl IntoIterator<Item = T>) -> Self {
        self.cell_data.push((name.into(), to_f64(values)));
        self
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cell_point_counts.len()
    }

    pub fn try_build(&self) -> Result<DataSet, Box<dyn Error + Send + Sync>> {
        for (name, values) in &self.point_data {
            if values.len() != self.num_points() {
                return Err(Box::from(format!(
                    "Point field {} has {} values, but there are {} points",
                    name,
                    values.len(),
                    self.num_points()
                )));
            }
        }
        for (name, values) in &self.cell_data {
            if values.len() != self.num_cells() {
                return Err(Box::from(format!(
                    "Cell field {} has {} values, but there are {} cells",
                    name,
                    values.len(),
                    self.num_cells()
                )));
            }
        }

        // Points are embedded in 3D
        let points: Vec<f64> = self.points.iter().flat_map(|&x| [x, 0.0, 0.0]).collect();

        // Legacy layout: N, i_1, ..., i_N for every cell
        let mut vertices = Vec::with_capacity(self.num_points() + self.num_cells());
        let mut offset = 0;
        for &count in &self.cell_point_counts {
            vertices.push(u32::try_from(count)?);
            for i in offset..offset + count {
                vertices.push(u32::try_from(i)?);
            }
            offset += count;
        }

        let scalars = |(name, values): &(String, Vec<f64>)| {
            Attribute::DataArray(DataArray {
                name: name.clone(),
                elem: ElementType::Scalars {
                    num_comp: 1,
                    lookup_table: None,
                },
                data: values.clone().into(),
            })
        };

        let piece = UnstructuredGridPiece {
            points: points.into(),
            cells: Cells {
                cell_verts: VertexNumbers::Legacy {
                    num_cells: u32::try_from(self.num_cells())?,
                    vertices,
                },
                types: vec![CellType::PolyLine; self.num_cells()],
            },
            data: Attributes {
                point: self.point_data.iter().map(scalars).collect(),
                cell: self.cell_data.iter().map(scalars).collect(),
            },
        };

        Ok(DataSet::UnstructuredGrid {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(piece))],
        })
    }

    /// Builds the dataset and writes it to a legacy VTK file, creating parent directories.
    pub fn try_export(&self, filename: impl AsRef<Path>) -> Result<(), Box<dyn Error + Send + Sync>> {
        let filepath = filename.as_ref();
        if let Some(parent) = filepath.parent() {
            fs::create_dir_all(parent)?;
        }
        let fallback_title = filepath
            .file_stem()
            .map(|os_str| os_str.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string());
        let dataset = self.try_build()?;
        Vtk {
            version: Version { major: 4, minor: 1 },
            title: self.title.clone().unwrap_or(fallback_title),
            byte_order: ByteOrder::BigEndian,
            data: dataset,
            file_path: None,
        }
        .export(filepath)?;
        Ok(())
    }
}
