//! Plain-text ITK transform files holding a single `Euler3DTransform`.
//!
//! The transform maps points of the fixed (CT) space into the moving (MRI)
//! space, which is the convention every ITK-based tool expects when the file
//! is used for resampling.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use nalgebra::{Rotation3, Vector3 as NaVector3};

use coreg_core::spatial::{Point, Vector};
use coreg_core::transform::RigidTransform;

const FILE_HEADER: &str = "#Insight Transform File V1.0";
const TRANSFORM_DOUBLE: &str = "Euler3DTransform_double_3_3";
const TRANSFORM_FLOAT: &str = "Euler3DTransform_float_3_3";

fn parse_numbers(text: &str, key: &str) -> Result<Vec<f64>> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .with_context(|| format!("Invalid number '{}' in {}", token, key))
        })
        .collect()
}

/// Write `transform` as an ITK transform file.
pub fn write_transform<P: AsRef<Path>>(path: P, transform: &RigidTransform) -> Result<()> {
    let path = path.as_ref();
    let p = transform.parameters();
    let c = transform.center();
    let text = format!(
        "{FILE_HEADER}\n#Transform 0\nTransform: {TRANSFORM_DOUBLE}\nParameters: {} {} {} {} {} {}\nFixedParameters: {} {} {} 1\n",
        p[0], p[1], p[2], p[3], p[4], p[5], c[0], c[1], c[2],
    );
    fs::write(path, text).with_context(|| format!("Failed to write transform {}", path.display()))?;
    tracing::debug!(path = %path.display(), "wrote transform file");
    Ok(())
}

/// Read the first transform of an ITK transform file.
///
/// A fourth fixed parameter of `0` selects the Z-X-Y angle order; the
/// rotation is then re-expressed in this crate's Z-Y-X angles.
pub fn read_transform<P: AsRef<Path>>(path: P) -> Result<RigidTransform> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read transform {}", path.display()))?;

    let mut kind = None;
    let mut parameters = None;
    let mut fixed = None;
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Transform" if kind.is_none() => kind = Some(value.to_string()),
            "Parameters" if parameters.is_none() => parameters = Some(parse_numbers(value, "Parameters")?),
            "FixedParameters" if fixed.is_none() => fixed = Some(parse_numbers(value, "FixedParameters")?),
            _ => {}
        }
    }

    let kind = kind.ok_or_else(|| anyhow!("No transform found in {}", path.display()))?;
    if kind != TRANSFORM_DOUBLE && kind != TRANSFORM_FLOAT {
        bail!("Unsupported transform type '{}'", kind);
    }
    let parameters = parameters.ok_or_else(|| anyhow!("Transform has no Parameters line"))?;
    let fixed = fixed.ok_or_else(|| anyhow!("Transform has no FixedParameters line"))?;
    let [ax, ay, az, tx, ty, tz] = parameters[..] else {
        bail!("Euler3DTransform expects 6 parameters, found {}", parameters.len());
    };
    if fixed.len() < 3 {
        bail!("Euler3DTransform expects at least 3 fixed parameters, found {}", fixed.len());
    }

    let center = Point::new([fixed[0], fixed[1], fixed[2]]);
    let translation = Vector::new([tx, ty, tz]);
    let compute_zyx = fixed.get(3).map_or(false, |&flag| flag != 0.0);
    if compute_zyx {
        return Ok(RigidTransform::from_components([ax, ay, az], translation, center));
    }

    let rx = Rotation3::from_axis_angle(&NaVector3::x_axis(), ax);
    let ry = Rotation3::from_axis_angle(&NaVector3::y_axis(), ay);
    let rz = Rotation3::from_axis_angle(&NaVector3::z_axis(), az);
    let rotation = (rz * rx * ry).into_inner();
    Ok(RigidTransform::from_matrix(&rotation, translation, center)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_written_file_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tfm");
        let transform = RigidTransform::from_components(
            [0.0, 0.0, 0.5],
            Vector::new([1.0, 2.0, 3.0]),
            Point::new([4.0, 5.0, 6.0]),
        );
        write_transform(&path, &transform).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], FILE_HEADER);
        assert_eq!(lines[2], "Transform: Euler3DTransform_double_3_3");
        assert_eq!(lines[3], "Parameters: 0 0 0.5 1 2 3");
        assert_eq!(lines[4], "FixedParameters: 4 5 6 1");
    }

    #[test]
    fn test_zxy_order_is_converted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zxy.tfm");
        fs::write(
            &path,
            "#Insight Transform File V1.0\n#Transform 0\nTransform: Euler3DTransform_double_3_3\n\
             Parameters: 0.1 0.2 0.3 1 2 3\nFixedParameters: 0 0 0 0\n",
        )
        .unwrap();
        let transform = read_transform(&path).unwrap();

        let rx = Rotation3::from_axis_angle(&NaVector3::x_axis(), 0.1);
        let ry = Rotation3::from_axis_angle(&NaVector3::y_axis(), 0.2);
        let rz = Rotation3::from_axis_angle(&NaVector3::z_axis(), 0.3);
        let expected = (rz * rx * ry).into_inner();
        assert!((transform.matrix() - expected).abs().max() < 1e-9);
        assert!((transform.translation().inner() - NaVector3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn test_missing_flag_defaults_to_zxy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("three.tfm");
        fs::write(
            &path,
            "#Insight Transform File V1.0\nTransform: Euler3DTransform_float_3_3\n\
             Parameters: 0 0 0.25 0 0 0\nFixedParameters: 1 1 1\n",
        )
        .unwrap();
        let transform = read_transform(&path).unwrap();
        assert!((transform.angles()[2] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_other_transform_types() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("affine.tfm");
        fs::write(
            &path,
            "#Insight Transform File V1.0\nTransform: AffineTransform_double_3_3\nParameters: 1\nFixedParameters: 0 0 0\n",
        )
        .unwrap();
        assert!(read_transform(&path).is_err());
    }
}
