use std::collections::BTreeSet;

use kurbo::Affine;

use crate::bundle::timeline::FrameLabel;
use crate::foundation::core::{Fps, StageSize};
use crate::foundation::error::{SkelxflError, SkelxflResult};

/// A bitmap library item: one per referenced atlas piece. `name` is the
/// sanitized piece name; the media file lands at `library/media/<name>.png`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaItem {
    pub name: String,
    /// Original (unsanitized) piece name, used to locate the pixel source.
    pub piece: String,
}

impl MediaItem {
    pub fn item_name(&self) -> String {
        format!("media/{}", self.name)
    }

    pub fn href(&self) -> String {
        format!("media/{}.png", self.name)
    }
}

/// Wrapper symbol placing a bitmap item at the origin; instances of this
/// symbol carry the full mapped transform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSymbol {
    pub name: String,
}

impl ImageSymbol {
    pub fn item_name(&self) -> String {
        format!("image/{}", self.name)
    }

    pub fn library_path(&self) -> String {
        format!("image/{}.xml", self.name)
    }
}

/// One placed instance: a fully mapped transform for a visible frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub transform: Affine,
}

/// A sprite symbol holding one timeline layer's dense frame sequence as
/// nested placements of an image wrapper symbol. `frames[i] == None` is an
/// empty (hidden) frame that still occupies the slot.
#[derive(Clone, Debug, PartialEq)]
pub struct SpriteSymbol {
    pub name: String,
    /// Sanitized name of the image symbol every placement instances.
    pub image: String,
    pub frames: Vec<Option<Placement>>,
}

impl SpriteSymbol {
    pub fn item_name(&self) -> String {
        format!("sprite/{}", self.name)
    }

    pub fn library_path(&self) -> String {
        format!("sprite/{}.xml", self.name)
    }
}

/// Content of one root-timeline layer, topmost layer first in
/// `DocumentModel::root`.
#[derive(Clone, Debug, PartialEq)]
pub enum RootContent {
    /// Full-span instance of a sprite symbol.
    Sprite { sprite: String },
    /// Static layer optimization: a single direct image-symbol instance.
    Static { image: String, placement: Placement },
    /// Unresolved layer kept as an empty stub (EmptyLayer/Placeholder
    /// policies).
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RootLayer {
    pub name: String,
    pub content: RootContent,
}

/// The assembled XFL object graph. Every reference in here resolves to an
/// item in the same model; `validate` is the structural-closure check and
/// the writer refuses nothing it accepts.
#[derive(Clone, Debug)]
pub struct DocumentModel {
    pub name: String,
    pub fps: Fps,
    /// Stage size already multiplied by the resolution-correction scale.
    pub stage: StageSize,
    pub frame_count: u32,
    pub media: Vec<MediaItem>,
    pub images: Vec<ImageSymbol>,
    pub sprites: Vec<SpriteSymbol>,
    pub root: Vec<RootLayer>,
    pub labels: Vec<FrameLabel>,
}

impl DocumentModel {
    /// Library-relative paths of every item the writer will create, in
    /// write order. This is the manifest the main descriptor enumerates.
    pub fn manifest(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for m in &self.media {
            paths.push(m.href());
        }
        for i in &self.images {
            paths.push(i.library_path());
        }
        for s in &self.sprites {
            paths.push(s.library_path());
        }
        paths
    }

    /// Structural closure: every `libraryItemName` reference resolves to an
    /// item present in this model, and item names are unique so no library
    /// file is written twice. Violations are converter bugs.
    pub fn validate(&self) -> SkelxflResult<()> {
        fn unique<'a>(
            kind: &str,
            names: impl Iterator<Item = &'a str>,
        ) -> SkelxflResult<()> {
            let mut seen = BTreeSet::new();
            for name in names {
                if !seen.insert(name) {
                    return Err(SkelxflError::build(format!(
                        "duplicate {kind} item '{name}'"
                    )));
                }
            }
            Ok(())
        }
        unique("media", self.media.iter().map(|m| m.name.as_str()))?;
        unique("image", self.images.iter().map(|i| i.name.as_str()))?;
        unique("sprite", self.sprites.iter().map(|s| s.name.as_str()))?;

        for img in &self.images {
            if !self.media.iter().any(|m| m.name == img.name) {
                return Err(SkelxflError::build(format!(
                    "image symbol '{}' has no media item",
                    img.name
                )));
            }
        }
        for sprite in &self.sprites {
            if !self.images.iter().any(|i| i.name == sprite.image) {
                return Err(SkelxflError::build(format!(
                    "sprite '{}' references unknown image symbol '{}'",
                    sprite.name, sprite.image
                )));
            }
            if sprite.frames.len() != self.frame_count as usize {
                return Err(SkelxflError::build(format!(
                    "sprite '{}' has {} frames, document has {}",
                    sprite.name,
                    sprite.frames.len(),
                    self.frame_count
                )));
            }
        }
        for layer in &self.root {
            match &layer.content {
                RootContent::Sprite { sprite } => {
                    if !self.sprites.iter().any(|s| &s.name == sprite) {
                        return Err(SkelxflError::build(format!(
                            "root layer '{}' references unknown sprite '{sprite}'",
                            layer.name
                        )));
                    }
                }
                RootContent::Static { image, .. } => {
                    if !self.images.iter().any(|i| &i.name == image) {
                        return Err(SkelxflError::build(format!(
                            "root layer '{}' references unknown image '{image}'",
                            layer.name
                        )));
                    }
                }
                RootContent::Empty => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/document/model.rs"]
mod tests;
