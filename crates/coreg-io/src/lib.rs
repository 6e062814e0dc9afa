//! Volume and transform file I/O for coreg.
//!
//! Volumes are read into LPS physical space regardless of the on-disk
//! convention; the format is picked from the file extension.

pub mod nifti_io;
pub mod nrrd_io;
pub mod transform_io;

use std::path::Path;

use anyhow::{bail, Result};
use burn::tensor::backend::Backend;
use coreg_core::image::Image;

pub use nifti_io::{read_nifti, write_nifti};
pub use nrrd_io::{read_nrrd, write_nrrd};
pub use transform_io::{read_transform, write_transform};

/// Supported volume formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Nifti,
    Nrrd,
}

impl ImageFormat {
    /// Detect the format from `.nii`, `.nii.gz` or `.nrrd`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            Some(Self::Nifti)
        } else if name.ends_with(".nrrd") {
            Some(Self::Nrrd)
        } else {
            None
        }
    }
}

/// Read a 3-D volume in any supported format.
pub fn read_image<B: Backend, P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Image<B, 3>> {
    let path = path.as_ref();
    match ImageFormat::from_path(path) {
        Some(ImageFormat::Nifti) => read_nifti(path, device),
        Some(ImageFormat::Nrrd) => read_nrrd(path, device),
        None => bail!("Unrecognised image file extension: {}", path.display()),
    }
}

/// Write a 3-D volume, picking the format from the extension.
///
/// `compressed` selects gzip encoding for NRRD files only. It is ignored for
/// NIfTI, where a `.nii.gz` path is always compressed and a `.nii` path never
/// is; pick the suffix to choose.
pub fn write_image<B: Backend, P: AsRef<Path>>(image: &Image<B, 3>, path: P, compressed: bool) -> Result<()> {
    let path = path.as_ref();
    match ImageFormat::from_path(path) {
        Some(ImageFormat::Nifti) => write_nifti(path, image),
        Some(ImageFormat::Nrrd) => write_nrrd(path, image, compressed),
        None => bail!("Unrecognised image file extension: {}", path.display()),
    }
}
