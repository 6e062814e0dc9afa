//! NIfTI-1 reading and writing.
//!
//! NIfTI stores geometry in RAS; images are held in LPS, so the first two
//! rows of the affine change sign on the way in and out.

use anyhow::{bail, Context, Result};
use burn::tensor::backend::Backend;
use nalgebra::{Matrix3, Vector3 as NaVector3};
use ndarray::{Array3, IxDyn};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;

use coreg_core::image::{Image, ImageGrid, PixelKind};
use coreg_core::spatial::{Direction, Point, Spacing};

const RAS_TO_LPS: [f64; 3] = [-1.0, -1.0, 1.0];

// NIfTI-1 datatype codes.
const DT_UINT8: i16 = 2;
const DT_INT16: i16 = 4;
const DT_INT32: i16 = 8;
const DT_FLOAT32: i16 = 16;
const DT_FLOAT64: i16 = 64;
const DT_INT8: i16 = 256;
const DT_UINT16: i16 = 512;
const DT_UINT32: i16 = 768;

fn pixel_kind_from_datatype(datatype: i16) -> Result<PixelKind> {
    Ok(match datatype {
        DT_UINT8 => PixelKind::UInt8,
        DT_INT8 => PixelKind::Int8,
        DT_INT16 => PixelKind::Int16,
        DT_UINT16 => PixelKind::UInt16,
        DT_INT32 => PixelKind::Int32,
        DT_UINT32 => PixelKind::UInt32,
        DT_FLOAT32 => PixelKind::Float32,
        DT_FLOAT64 => PixelKind::Float64,
        other => bail!("Unsupported NIfTI datatype code {}", other),
    })
}

/// Voxel-to-RAS affine rows from sform, qform, or pixdim alone.
fn affine_rows(header: &NiftiHeader) -> [[f64; 4]; 3] {
    let widen = |row: [f32; 4]| row.map(|v| v as f64);
    if header.sform_code > 0 {
        return [widen(header.srow_x), widen(header.srow_y), widen(header.srow_z)];
    }

    let dx = header.pixdim[1] as f64;
    let dy = header.pixdim[2] as f64;
    let dz = header.pixdim[3] as f64;
    if header.qform_code > 0 {
        let b = header.quatern_b as f64;
        let c = header.quatern_c as f64;
        let d = header.quatern_d as f64;
        let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let dz = dz * qfac;
        return [
            [(a * a + b * b - c * c - d * d) * dx, (2.0 * b * c - 2.0 * a * d) * dy, (2.0 * b * d + 2.0 * a * c) * dz, header.quatern_x as f64],
            [(2.0 * b * c + 2.0 * a * d) * dx, (a * a + c * c - b * b - d * d) * dy, (2.0 * c * d - 2.0 * a * b) * dz, header.quatern_y as f64],
            [(2.0 * b * d - 2.0 * a * c) * dx, (2.0 * c * d + 2.0 * a * b) * dy, (a * a + d * d - c * c - b * b) * dz, header.quatern_z as f64],
        ];
    }

    [[dx, 0.0, 0.0, 0.0], [0.0, dy, 0.0, 0.0], [0.0, 0.0, dz, 0.0]]
}

/// Split a voxel-to-LPS affine into origin, spacing and direction.
fn geometry_from_affine(rows: [[f64; 4]; 3]) -> (Point<3>, Spacing<3>, Direction<3>) {
    let lps = |r: usize, c: usize| rows[r][c] * RAS_TO_LPS[r];
    let origin = Point::new([lps(0, 3), lps(1, 3), lps(2, 3)]);

    let mut spacing = [1.0; 3];
    let mut columns = [NaVector3::x(), NaVector3::y(), NaVector3::z()];
    for c in 0..3 {
        let column = NaVector3::new(lps(0, c), lps(1, c), lps(2, c));
        let norm = column.norm();
        if norm > 1e-9 {
            spacing[c] = norm;
            columns[c] = column / norm;
        }
    }
    (origin, Spacing::new(spacing), Direction::from_matrix(Matrix3::from_columns(&columns)))
}

/// Read a `.nii` / `.nii.gz` volume.
pub fn read_nifti<B: Backend, P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Image<B, 3>> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Failed to read NIfTI file {}", path.display()))?;
    let header = obj.header().clone();

    let ndim = header.dim[0] as usize;
    if !(1..=3).contains(&ndim) && !(ndim == 4 && header.dim[4] == 1) {
        bail!("Expected a 3-D NIfTI volume, found {} dimensions", ndim);
    }
    let size = [
        header.dim[1].max(1) as usize,
        if ndim >= 2 { header.dim[2].max(1) as usize } else { 1 },
        if ndim >= 3 { header.dim[3].max(1) as usize } else { 1 },
    ];
    let pixel_kind = pixel_kind_from_datatype(header.datatype)?;
    let (origin, spacing, direction) = geometry_from_affine(affine_rows(&header));
    let grid = ImageGrid::new(size, origin, spacing, direction);
    grid.validate().context("Invalid NIfTI geometry")?;

    let volume = obj
        .into_volume()
        .into_ndarray::<f32>()
        .context("Failed to convert NIfTI volume to ndarray")?;
    let [nx, ny, nz] = size;
    let mut values = Vec::with_capacity(grid.num_voxels());
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let index: Vec<usize> = [x, y, z, 0].into_iter().take(volume.ndim()).collect();
                values.push(volume[IxDyn(&index)]);
            }
        }
    }

    tracing::debug!(path = %path.display(), ?size, %pixel_kind, "read NIfTI volume");
    Ok(Image::from_values(&grid, values, pixel_kind, device)?)
}

/// Header carrying the image geometry as an sform (and matching pixdim).
fn geometry_header(grid: &ImageGrid) -> NiftiHeader {
    let spacing = grid.spacing();
    let direction = grid.direction();
    let origin = grid.origin();
    let row = |r: usize| -> [f32; 4] {
        let s = RAS_TO_LPS[r];
        [
            (s * direction[(r, 0)] * spacing[0]) as f32,
            (s * direction[(r, 1)] * spacing[1]) as f32,
            (s * direction[(r, 2)] * spacing[2]) as f32,
            (s * origin[r]) as f32,
        ]
    };
    NiftiHeader {
        pixdim: [1.0, spacing[0] as f32, spacing[1] as f32, spacing[2] as f32, 1.0, 1.0, 1.0, 1.0],
        sform_code: 1,
        qform_code: 0,
        srow_x: row(0),
        srow_y: row(1),
        srow_z: row(2),
        xyzt_units: 2 | 8,
        ..NiftiHeader::default()
    }
}

/// Write a volume as NIfTI-1 in the element type of its pixel kind.
/// A `.gz` suffix selects compression.
pub fn write_nifti<B: Backend, P: AsRef<Path>>(path: P, image: &Image<B, 3>) -> Result<()> {
    let path = path.as_ref();
    let buffer = image.to_buffer()?;
    let grid = *buffer.grid();
    let [nx, ny, nz] = grid.size();
    let values = buffer.values();
    let header = geometry_header(&grid);
    let writer = WriterOptions::new(path).reference_header(&header);

    macro_rules! write_as {
        ($ty:ty) => {{
            let array = Array3::<$ty>::from_shape_fn((nx, ny, nz), |(x, y, z)| {
                values[grid.linear_index(x, y, z)] as $ty
            });
            writer.write_nifti(&array)
        }};
    }

    match image.pixel_kind() {
        PixelKind::Int8 => write_as!(i8),
        PixelKind::UInt8 => write_as!(u8),
        PixelKind::Int16 => write_as!(i16),
        PixelKind::UInt16 => write_as!(u16),
        PixelKind::Int32 => write_as!(i32),
        PixelKind::UInt32 => write_as!(u32),
        PixelKind::Float32 => write_as!(f32),
        PixelKind::Float64 => write_as!(f64),
    }
    .with_context(|| format!("Failed to write NIfTI file {}", path.display()))?;

    tracing::debug!(path = %path.display(), size = ?grid.size(), "wrote NIfTI volume");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use coreg_core::spatial::Direction3;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_read_nifti_basic() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.nii");

        // X=3, Y=4, Z=5 written by the nifti crate directly.
        let array = Array3::from_shape_fn((3, 4, 5), |(x, y, z)| (x + 3 * y + 12 * z) as f32);
        WriterOptions::new(&file_path).write_nifti(&array)?;

        let device = Default::default();
        let image = read_nifti::<TestBackend, _>(&file_path, &device)?;
        assert_eq!(image.size(), [3, 4, 5]);
        assert_eq!(image.pixel_kind(), PixelKind::Float32);

        let buffer = image.to_buffer()?;
        for (offset, &v) in buffer.values().iter().enumerate() {
            assert_eq!(v, offset as f32);
        }
        Ok(())
    }

    #[test]
    fn test_affine_lps_conversion() {
        let rows = [[-2.0, 0.0, 0.0, 10.0], [0.0, -3.0, 0.0, 20.0], [0.0, 0.0, 4.0, 30.0]];
        let (origin, spacing, direction) = geometry_from_affine(rows);
        assert_eq!(origin.to_array(), [-10.0, -20.0, 30.0]);
        assert_eq!(spacing.to_array(), [2.0, 3.0, 4.0]);
        assert_eq!(direction, Direction3::identity());
    }
}
