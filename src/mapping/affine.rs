use kurbo::Affine;

use crate::bundle::atlas::AtlasPiece;
use crate::foundation::core::RawTransform;

/// Map a raw frame transform into authoring-tool coordinates for a piece.
///
/// Composition order mirrors the source renderer exactly:
///
/// ```text
/// M' = M · T(reg_x, reg_y) · S(scale_x, scale_y)
/// ```
///
/// with the registration-point translation to the right of the frame matrix.
/// The resolution-correction `scale` then multiplies the translation
/// components only; linear coefficients are already in tool units. Getting
/// either of these wrong shifts every piece on stage with no structural
/// error, which is why the golden-value tests pin exact coefficients.
pub fn map_placement(raw: RawTransform, piece: &AtlasPiece, scale: f64) -> Affine {
    let composed = raw.to_affine()
        * Affine::translate((piece.reg_x, piece.reg_y))
        * Affine::scale_non_uniform(piece.scale_x, piece.scale_y);
    scale_translation(composed, scale)
}

/// Multiply only the tx/ty coefficients by `scale`.
pub fn scale_translation(m: Affine, scale: f64) -> Affine {
    let [a, b, c, d, tx, ty] = m.as_coeffs();
    Affine::new([a, b, c, d, tx * scale, ty * scale])
}

#[cfg(test)]
#[path = "../../tests/unit/mapping/affine.rs"]
mod tests;
