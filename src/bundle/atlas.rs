use std::collections::BTreeSet;

use anyhow::Context as _;
use nom::IResult;
use nom::number::complete::{le_f32, le_u16, le_u32};

use crate::bundle::container::{pstring, to_format_error};
use crate::foundation::core::normalize_name;
use crate::foundation::error::{SkelxflError, SkelxflResult};

/// Pixel region of a piece within the packed atlas image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PieceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One named sprite piece. Immutable once decoded.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AtlasPiece {
    /// Piece name, unique within the atlas.
    pub name: String,
    pub region: PieceRegion,
    /// Registration point: offset from the region origin used as the
    /// transform pivot.
    pub reg_x: f64,
    pub reg_y: f64,
    /// Intrinsic piece scale applied inside the registration frame.
    pub scale_x: f64,
    pub scale_y: f64,
}

/// Decoded atlas: piece records plus the packed image they index into.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Atlas {
    /// File name of the packed source image (for diagnostics; pixel data
    /// lives in the bundle's image section).
    pub image_name: String,
    pub pieces: Vec<AtlasPiece>,
}

impl Atlas {
    /// Look up a piece by normalized name.
    pub fn find(&self, normalized: &str) -> Option<usize> {
        self.pieces
            .iter()
            .position(|p| normalize_name(&p.name) == normalized)
    }
}

fn piece(i: &[u8]) -> IResult<&[u8], AtlasPiece> {
    let (i, name) = pstring(i)?;
    let (i, x) = le_u32(i)?;
    let (i, y) = le_u32(i)?;
    let (i, width) = le_u32(i)?;
    let (i, height) = le_u32(i)?;
    let (i, reg_x) = le_f32(i)?;
    let (i, reg_y) = le_f32(i)?;
    let (i, scale_x) = le_f32(i)?;
    let (i, scale_y) = le_f32(i)?;
    Ok((
        i,
        AtlasPiece {
            name: name.trim().to_owned(),
            region: PieceRegion {
                x,
                y,
                width,
                height,
            },
            reg_x: f64::from(reg_x),
            reg_y: f64::from(reg_y),
            scale_x: f64::from(scale_x),
            scale_y: f64::from(scale_y),
        },
    ))
}

/// Decode the atlas section payload. Pure: structural validation only, no
/// image content is inspected.
pub fn decode_atlas(payload: &[u8]) -> SkelxflResult<Atlas> {
    fn parse(i: &[u8]) -> IResult<&[u8], Atlas> {
        let (i, piece_count) = le_u16(i)?;
        let (i, image_name) = pstring(i)?;
        let (i, pieces) = nom::multi::count(piece, usize::from(piece_count))(i)?;
        Ok((i, Atlas { image_name, pieces }))
    }

    let (rest, atlas) = parse(payload).map_err(|e| to_format_error("atlas", payload, e))?;
    if !rest.is_empty() {
        return Err(SkelxflError::format(
            "atlas",
            payload.len() - rest.len(),
            format!("{} trailing bytes after piece records", rest.len()),
        ));
    }

    let mut seen = BTreeSet::new();
    for p in &atlas.pieces {
        if !seen.insert(normalize_name(&p.name)) {
            return Err(SkelxflError::format(
                "atlas",
                0,
                format!("duplicate piece name '{}'", p.name),
            ));
        }
        if p.region.width == 0 || p.region.height == 0 {
            return Err(SkelxflError::format(
                "atlas",
                0,
                format!("piece '{}' has an empty region", p.name),
            ));
        }
    }

    Ok(atlas)
}

/// Decode the packed atlas image bytes into pixels.
pub fn decode_packed_image(packed_png: &[u8]) -> SkelxflResult<image::RgbaImage> {
    Ok(image::load_from_memory(packed_png)
        .context("decode packed atlas image")?
        .to_rgba8())
}

/// Crop one piece region out of the decoded packed image. Bounds are checked
/// against the actual image, not the declared region.
pub fn crop_piece(packed: &image::RgbaImage, piece: &AtlasPiece) -> SkelxflResult<image::RgbaImage> {
    let (pw, ph) = packed.dimensions();
    let r = piece.region;
    if r.x.saturating_add(r.width) > pw || r.y.saturating_add(r.height) > ph {
        return Err(SkelxflError::format(
            "atlas",
            0,
            format!(
                "piece '{}' region {}x{}+{}+{} exceeds packed image {pw}x{ph}",
                piece.name, r.width, r.height, r.x, r.y
            ),
        ));
    }
    Ok(image::imageops::crop_imm(packed, r.x, r.y, r.width, r.height).to_image())
}

/// Crop every piece region out of the packed atlas image.
///
/// Optional operation for the export-images workflow; document building does
/// not require it unless media files are produced from the packed image.
pub fn split_atlas(
    atlas: &Atlas,
    packed_png: &[u8],
) -> SkelxflResult<Vec<(String, image::RgbaImage)>> {
    let packed = decode_packed_image(packed_png)?;
    let mut out = Vec::with_capacity(atlas.pieces.len());
    for p in &atlas.pieces {
        out.push((p.name.clone(), crop_piece(&packed, p)?));
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/bundle/atlas.rs"]
mod tests;
