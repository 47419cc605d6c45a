//! # Error visualization helpers.
//!
//! Colors for inspecting per-vertex reconstruction error on triangle meshes.
//! Color arrays are `(N, 3)` f32 tensors with channels in `[0, 1]`.
use std::str::FromStr;

use candle_core::{DType, Device, Tensor};

use crate::error::{DiffusionError, Result};

mod colormap;

pub use colormap::{Colormap, COOLWARM};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

const NAMED_COLORS: [(&str, [u8; 3]); 14] = [
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("lime", [0, 255, 0]),
    ("navy", [0, 0, 128]),
];

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255., g as f32 / 255., b as f32 / 255.)
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    fn channel_u8(v: f32) -> u8 {
        (v.clamp(0., 1.) * 255.).round() as u8
    }

    pub fn to_hex(&self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}",
            Self::channel_u8(self.r),
            Self::channel_u8(self.g),
            Self::channel_u8(self.b)
        )
    }

    /// Rounds every channel to the nearest 8-bit level.
    pub fn quantized(&self) -> Self {
        Self::from_u8(
            Self::channel_u8(self.r),
            Self::channel_u8(self.g),
            Self::channel_u8(self.b),
        )
    }
}

impl FromStr for Rgb {
    type Err = DiffusionError;

    /// Parses `#rrggbb`, `#rgb` or a basic color name.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DiffusionError::InvalidArgument(format!("invalid color '{s}'"));
        let lower = s.trim().to_ascii_lowercase();
        if let Some((_, [r, g, b])) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
            return Ok(Self::from_u8(*r, *g, *b));
        }
        let hex = lower.strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let digit = |i: usize, len: usize| u8::from_str_radix(&hex[i..i + len], 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Self::from_u8(digit(0, 2)?, digit(2, 2)?, digit(4, 2)?)),
            3 => Ok(Self::from_u8(digit(0, 1)? * 17, digit(1, 1)? * 17, digit(2, 1)? * 17)),
            _ => Err(invalid()),
        }
    }
}

/// Fades from `c1` at `mix = 0` to `c2` at `mix = 1`. The blend is rounded
/// to 8-bit channels.
pub fn color_fader(c1: &Rgb, c2: &Rgb, mix: f32) -> Result<Rgb> {
    if !(0. ..=1.).contains(&mix) {
        return Err(DiffusionError::InvalidArgument(format!(
            "mix must lie in [0, 1], got {mix}"
        )));
    }
    let blend = |a: f32, b: f32| (1. - mix) * a + mix * b;
    Ok(Rgb::new(blend(c1.r, c2.r), blend(c1.g, c2.g), blend(c1.b, c2.b)).quantized())
}

/// Maps per-point errors through [`COOLWARM`] after normalizing them to
/// `[min_error, max_error]` and clipping to `[0, 1]`. Returns `(N, 3)`.
pub fn colors_from_error(errors: &Tensor, min_error: f64, max_error: f64) -> Result<Tensor> {
    colors_from_error_with(errors, min_error, max_error, &COOLWARM)
}

pub fn colors_from_error_with(
    errors: &Tensor,
    min_error: f64,
    max_error: f64,
    cmap: &Colormap,
) -> Result<Tensor> {
    if errors.rank() != 1 {
        return Err(DiffusionError::InvalidArgument(format!(
            "expected a 1-D error array, got shape {:?}",
            errors.dims()
        )));
    }
    let device = errors.device().clone();
    let errors = errors.to_dtype(DType::F64)?.to_vec1::<f64>()?;
    let n_points = errors.len();
    let colors: Vec<f32> = errors
        .into_iter()
        .flat_map(|e| {
            let mix = ((e - min_error) / (max_error - min_error)).clamp(0., 1.);
            cmap.map(mix as f32).to_array()
        })
        .collect();
    Ok(Tensor::from_vec(colors, (n_points, 3), &device)?)
}

/// Color of every face as the mean of the colors of its vertices.
///
/// `vertex_colors` is `(V, C)`, `faces` an integer `(F, K)` table of vertex
/// indices; the result is `(F, C)`.
pub fn face_colors_from_vertex_colors(vertex_colors: &Tensor, faces: &Tensor) -> Result<Tensor> {
    let (n_vertices, n_channels) = vertex_colors.dims2()?;
    let (n_faces, face_size) = faces.dims2()?;
    if face_size == 0 {
        return Err(DiffusionError::InvalidArgument(
            "faces must reference at least one vertex".to_string(),
        ));
    }
    let indices = faces.flatten_all()?.to_dtype(DType::I64)?;
    if let Some(&index) = indices
        .to_vec1::<i64>()?
        .iter()
        .find(|&&i| i < 0 || i as usize >= n_vertices)
    {
        return Err(DiffusionError::IndexOutOfBounds { index, len: n_vertices });
    }
    let indices = indices.to_dtype(DType::U32)?.to_device(vertex_colors.device())?;
    let faces_colors = vertex_colors
        .index_select(&indices, 0)?
        .reshape((n_faces, face_size, n_channels))?;
    Ok(faces_colors.mean(1)?)
}

/// Keeps the first three vertex indices of every face as a `(F, 3)` u32
/// table. Indices past the third are dropped, so polygons must already be
/// triangulated.
pub fn faces_from_raw<F: AsRef<[u32]>>(faces_raw: &[F], device: &Device) -> Result<Tensor> {
    let mut faces = Vec::with_capacity(faces_raw.len() * 3);
    for (i, face) in faces_raw.iter().enumerate() {
        match face.as_ref() {
            [a, b, c, ..] => faces.extend_from_slice(&[*a, *b, *c]),
            short => {
                return Err(DiffusionError::InvalidArgument(format!(
                    "face {i} has {} vertices, expected at least 3",
                    short.len()
                )))
            }
        }
    }
    Ok(Tensor::from_vec(faces, (faces_raw.len(), 3), device)?)
}
