use crate::foundation::error::{SkelxflError, SkelxflResult};

pub use kurbo::Affine;

/// Resolution-correction multiplier reconciling the source engine's internal
/// asset resolution with the authoring tool's working units (1536 -> 1200).
pub const DEFAULT_STAGE_SCALE: f64 = 0.78125;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps(pub u16);

impl Fps {
    pub fn new(fps: u16) -> SkelxflResult<Self> {
        if fps == 0 {
            return Err(SkelxflError::build("fps must be > 0"));
        }
        Ok(Self(fps))
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self(30)
    }
}

/// Stage dimensions in source-renderer pixels (pre scale correction).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StageSize {
    pub width: f64,
    pub height: f64,
}

impl StageSize {
    pub fn new(width: f64, height: f64) -> SkelxflResult<Self> {
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return Err(SkelxflError::build(
                "stage width/height must be finite and > 0",
            ));
        }
        Ok(Self { width, height })
    }

    /// Dimensions scaled into authoring-tool units.
    pub fn scaled(self, scale: f64) -> Self {
        Self {
            width: self.width * scale,
            height: self.height * scale,
        }
    }
}

/// Raw 2x3 affine transform as stored in the bundle and the external JSON
/// form: maps `(x, y)` to `(a*x + c*y + tx, b*x + d*y + ty)`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl RawTransform {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn to_affine(self) -> Affine {
        // kurbo stores coefficients in the same [a, b, c, d, tx, ty] order.
        Affine::new([self.a, self.b, self.c, self.d, self.tx, self.ty])
    }

    pub fn from_affine(m: Affine) -> Self {
        let [a, b, c, d, tx, ty] = m.as_coeffs();
        Self { a, b, c, d, tx, ty }
    }
}

impl Default for RawTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Canonicalize a piece name for cross-referencing timeline layers against
/// atlas entries: trim, drop directory components, strip a trailing `.png`
/// (any case), lowercase.
pub fn normalize_name(raw: &str) -> String {
    let mut n = raw.trim();
    if let Some(idx) = n.rfind(['/', '\\']) {
        n = &n[idx + 1..];
    }
    let mut n = n.to_ascii_lowercase();
    if n.ends_with(".png") {
        n.truncate(n.len() - 4);
    }
    n
}

/// Sanitize a name for use as an XFL library item path segment.
pub fn sanitize_item_name(name: &str) -> String {
    name.replace('.', "_")
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
