//! NRRD reading and writing (attached header, raw or gzip encoding).

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use burn::tensor::backend::Backend;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use nalgebra::{Matrix3, Vector3 as NaVector3};

use coreg_core::image::{Image, ImageGrid, PixelKind};
use coreg_core::spatial::{Direction, Point, Spacing};

const MAGIC: &str = "NRRD000";

fn pixel_kind_from_type(name: &str) -> Result<PixelKind> {
    Ok(match name {
        "signed char" | "int8" | "int8_t" => PixelKind::Int8,
        "uchar" | "unsigned char" | "uint8" | "uint8_t" => PixelKind::UInt8,
        "short" | "short int" | "signed short" | "signed short int" | "int16" | "int16_t" => PixelKind::Int16,
        "ushort" | "unsigned short" | "unsigned short int" | "uint16" | "uint16_t" => PixelKind::UInt16,
        "int" | "signed int" | "int32" | "int32_t" => PixelKind::Int32,
        "uint" | "unsigned int" | "uint32" | "uint32_t" => PixelKind::UInt32,
        "float" => PixelKind::Float32,
        "double" => PixelKind::Float64,
        other => bail!("Unsupported NRRD type '{}'", other),
    })
}

fn type_name(kind: PixelKind) -> &'static str {
    match kind {
        PixelKind::Int8 => "int8",
        PixelKind::UInt8 => "uint8",
        PixelKind::Int16 => "int16",
        PixelKind::UInt16 => "uint16",
        PixelKind::Int32 => "int32",
        PixelKind::UInt32 => "uint32",
        PixelKind::Float32 => "float",
        PixelKind::Float64 => "double",
    }
}

/// Parse `(a,b,c)`.
fn parse_vector(text: &str) -> Result<[f64; 3]> {
    let inner = text
        .trim()
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| anyhow!("Malformed NRRD vector '{}'", text))?;
    let parts: Vec<f64> = inner
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Malformed NRRD vector '{}'", text))?;
    match parts.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => bail!("Expected a 3-vector, found '{}'", text),
    }
}

/// Split the space-separated `(..) (..) (..)` list.
fn parse_vectors(text: &str) -> Result<Vec<[f64; 3]>> {
    text.split_whitespace()
        .map(|token| {
            if token == "none" {
                bail!("Unexpected 'none' space direction");
            }
            parse_vector(token)
        })
        .collect()
}

/// Sign flips taking vectors of `space` into LPS.
fn space_to_lps(space: Option<&str>) -> Result<[f64; 3]> {
    Ok(match space {
        None | Some("left-posterior-superior") | Some("LPS") => [1.0, 1.0, 1.0],
        Some("right-anterior-superior") | Some("RAS") => [-1.0, -1.0, 1.0],
        Some("left-anterior-superior") | Some("LAS") => [1.0, -1.0, 1.0],
        Some(other) => bail!("Unsupported NRRD space '{}'", other),
    })
}

struct Header {
    fields: HashMap<String, String>,
    data_offset: usize,
}

impl Header {
    fn parse(bytes: &[u8]) -> Result<Self> {
        let mut fields = HashMap::new();
        let mut offset = 0;
        let mut first = true;
        loop {
            let end = bytes[offset..]
                .iter()
                .position(|&b| b == b'\n')
                .ok_or_else(|| anyhow!("NRRD header is not terminated by a blank line"))?;
            let line = std::str::from_utf8(&bytes[offset..offset + end])
                .context("NRRD header is not valid UTF-8")?
                .trim_end_matches('\r');
            offset += end + 1;

            if first {
                if !line.starts_with(MAGIC) {
                    bail!("Missing NRRD magic line");
                }
                first = false;
                continue;
            }
            if line.is_empty() {
                break;
            }
            if line.starts_with('#') || line.contains(":=") {
                continue;
            }
            if let Some((key, value)) = line.split_once(": ") {
                fields.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }
        Ok(Self {
            fields,
            data_offset: offset,
        })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| anyhow!("NRRD header lacks '{}'", key))
    }
}

fn decode_values(raw: &[u8], kind: PixelKind, little_endian: bool, count: usize) -> Result<Vec<f32>> {
    let width = kind.byte_size();
    if raw.len() < count * width {
        bail!("NRRD data holds {} bytes, expected {}", raw.len(), count * width);
    }

    macro_rules! decode {
        ($ty:ty) => {
            raw.chunks_exact(width)
                .take(count)
                .map(|chunk| {
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    bytes.copy_from_slice(chunk);
                    let value = if little_endian {
                        <$ty>::from_le_bytes(bytes)
                    } else {
                        <$ty>::from_be_bytes(bytes)
                    };
                    value as f32
                })
                .collect()
        };
    }

    Ok(match kind {
        PixelKind::Int8 => decode!(i8),
        PixelKind::UInt8 => decode!(u8),
        PixelKind::Int16 => decode!(i16),
        PixelKind::UInt16 => decode!(u16),
        PixelKind::Int32 => decode!(i32),
        PixelKind::UInt32 => decode!(u32),
        PixelKind::Float32 => decode!(f32),
        PixelKind::Float64 => decode!(f64),
    })
}

fn encode_values(values: &[f32], kind: PixelKind) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * kind.byte_size());
    for &v in values {
        match kind {
            PixelKind::Int8 => out.extend_from_slice(&(v as i8).to_le_bytes()),
            PixelKind::UInt8 => out.extend_from_slice(&(v as u8).to_le_bytes()),
            PixelKind::Int16 => out.extend_from_slice(&(v as i16).to_le_bytes()),
            PixelKind::UInt16 => out.extend_from_slice(&(v as u16).to_le_bytes()),
            PixelKind::Int32 => out.extend_from_slice(&(v as i32).to_le_bytes()),
            PixelKind::UInt32 => out.extend_from_slice(&(v as u32).to_le_bytes()),
            PixelKind::Float32 => out.extend_from_slice(&v.to_le_bytes()),
            PixelKind::Float64 => out.extend_from_slice(&(v as f64).to_le_bytes()),
        }
    }
    out
}

/// Read a `.nrrd` volume with an attached header.
pub fn read_nrrd<B: Backend, P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Image<B, 3>> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("Failed to read NRRD file {}", path.display()))?;
    let header = Header::parse(&bytes).with_context(|| format!("Invalid NRRD header in {}", path.display()))?;

    if header.get("data file").or_else(|| header.get("datafile")).is_some() {
        bail!("Detached NRRD data files are not supported");
    }
    let dimension: usize = header.require("dimension")?.parse().context("Invalid NRRD dimension")?;
    if dimension != 3 {
        bail!("Expected a 3-D NRRD volume, found dimension {}", dimension);
    }
    let kind = pixel_kind_from_type(header.require("type")?)?;
    let sizes: Vec<usize> = header
        .require("sizes")?
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .context("Invalid NRRD sizes")?;
    let size: [usize; 3] = sizes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("Expected 3 NRRD sizes, found {}", sizes.len()))?;

    let flip = space_to_lps(header.get("space"))?;
    let (spacing, direction) = match header.get("space directions") {
        Some(text) => {
            let vectors = parse_vectors(text)?;
            if vectors.len() != 3 {
                bail!("Expected 3 space directions, found {}", vectors.len());
            }
            let mut spacing = [1.0; 3];
            let mut columns = [NaVector3::x(), NaVector3::y(), NaVector3::z()];
            for (axis, v) in vectors.iter().enumerate() {
                let column = NaVector3::new(v[0] * flip[0], v[1] * flip[1], v[2] * flip[2]);
                let norm = column.norm();
                if norm > 1e-12 {
                    spacing[axis] = norm;
                    columns[axis] = column / norm;
                }
            }
            (spacing, Matrix3::from_columns(&columns))
        }
        None => {
            let spacing = match header.get("spacings") {
                Some(text) => {
                    let values: Vec<f64> = text
                        .split_whitespace()
                        .map(str::parse)
                        .collect::<std::result::Result<_, _>>()
                        .context("Invalid NRRD spacings")?;
                    values
                        .as_slice()
                        .try_into()
                        .map_err(|_| anyhow!("Expected 3 NRRD spacings"))?
                }
                None => [1.0; 3],
            };
            (spacing, Matrix3::identity())
        }
    };
    let origin = match header.get("space origin") {
        Some(text) => {
            let o = parse_vector(text)?;
            [o[0] * flip[0], o[1] * flip[1], o[2] * flip[2]]
        }
        None => [0.0; 3],
    };

    let grid = ImageGrid::new(size, Point::new(origin), Spacing::new(spacing), Direction::from_matrix(direction));
    grid.validate().context("Invalid NRRD geometry")?;

    let payload = &bytes[header.data_offset..];
    let raw = match header.get("encoding").unwrap_or("raw") {
        "raw" => payload.to_vec(),
        "gzip" | "gz" => {
            let mut decoded = Vec::new();
            GzDecoder::new(payload)
                .read_to_end(&mut decoded)
                .context("Failed to decompress NRRD data")?;
            decoded
        }
        other => bail!("Unsupported NRRD encoding '{}'", other),
    };
    let little_endian = header.get("endian").map_or(true, |e| e == "little");
    let values = decode_values(&raw, kind, little_endian, grid.num_voxels())?;

    tracing::debug!(path = %path.display(), ?size, %kind, "read NRRD volume");
    Ok(Image::from_values(&grid, values, kind, device)?)
}

fn format_vector(v: [f64; 3]) -> String {
    format!("({},{},{})", v[0], v[1], v[2])
}

/// Write a volume as NRRD in LPS space, gzip-encoded when `compressed`.
pub fn write_nrrd<B: Backend, P: AsRef<Path>>(path: P, image: &Image<B, 3>, compressed: bool) -> Result<()> {
    let path = path.as_ref();
    let buffer = image.to_buffer()?;
    let grid = buffer.grid();
    let [nx, ny, nz] = grid.size();
    let direction = grid.direction();
    let spacing = grid.spacing();
    let directions: Vec<String> = (0..3)
        .map(|c| format_vector([0, 1, 2].map(|r| direction[(r, c)] * spacing[c])))
        .collect();

    let mut header = String::new();
    header.push_str("NRRD0004\n");
    header.push_str("# Complete NRRD file format specification at:\n");
    header.push_str("# http://teem.sourceforge.net/nrrd/format.html\n");
    header.push_str(&format!("type: {}\n", type_name(image.pixel_kind())));
    header.push_str("dimension: 3\n");
    header.push_str("space: left-posterior-superior\n");
    header.push_str(&format!("sizes: {} {} {}\n", nx, ny, nz));
    header.push_str(&format!("space directions: {}\n", directions.join(" ")));
    header.push_str("kinds: domain domain domain\n");
    header.push_str("endian: little\n");
    header.push_str(&format!("encoding: {}\n", if compressed { "gzip" } else { "raw" }));
    header.push_str(&format!("space origin: {}\n\n", format_vector(grid.origin().to_array())));

    let data = encode_values(buffer.values(), image.pixel_kind());
    let mut file = fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(header.as_bytes())?;
    if compressed {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&data)?;
        encoder.finish().context("Failed to finish gzip stream")?;
    } else {
        file.write_all(&data)?;
    }

    tracing::debug!(path = %path.display(), size = ?grid.size(), compressed, "wrote NRRD volume");
    Ok(())
}
