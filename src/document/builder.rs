use std::collections::BTreeSet;

use crate::bundle::atlas::Atlas;
use crate::bundle::timeline::Timeline;
use crate::document::model::{
    DocumentModel, ImageSymbol, MediaItem, Placement, RootContent, RootLayer, SpriteSymbol,
};
use crate::foundation::core::{RawTransform, normalize_name, sanitize_item_name};
use crate::foundation::error::{SkelxflError, SkelxflResult};
use crate::mapping::affine::map_placement;
use crate::resolve::resolver::{MissingPolicy, Resolution, ResolvedLayer};

#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Resolution-correction multiplier for translations and stage size.
    pub scale: f64,
    /// Create library items for atlas pieces no layer references.
    pub include_unused: bool,
    pub missing: MissingPolicy,
    /// When set, only layers resolving to these (normalized) names are
    /// built.
    pub only: Option<Vec<String>>,
    /// Preview mode: ignore the timeline and place every piece once at its
    /// registration point in a single frame.
    pub identity: bool,
    /// Preview mode: put this piece directly on the root timeline instead
    /// of the animated layers.
    pub debug_piece: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            scale: crate::foundation::core::DEFAULT_STAGE_SCALE,
            include_unused: false,
            missing: MissingPolicy::Drop,
            only: None,
            identity: false,
            debug_piece: None,
        }
    }
}

impl BuildOptions {
    fn only_set(&self) -> Option<BTreeSet<String>> {
        self.only
            .as_ref()
            .map(|names| names.iter().map(|n| normalize_name(n)).collect())
    }
}

/// Assemble the XFL object graph from the atlas and the resolved timeline.
///
/// Layer stacking: source index 0 is bottommost, so root layers are emitted
/// in reverse source order (XFL stores layers topmost-first).
#[tracing::instrument(skip(atlas, timeline, resolved, opts))]
pub fn build_document(
    name: &str,
    atlas: &Atlas,
    timeline: &Timeline,
    resolved: &[ResolvedLayer<'_>],
    opts: &BuildOptions,
) -> SkelxflResult<DocumentModel> {
    let only = opts.only_set();

    let kept: Vec<&ResolvedLayer<'_>> = resolved
        .iter()
        .filter(|l| {
            only.as_ref()
                .is_none_or(|set| set.contains(&l.resolved_name))
        })
        .collect();

    // Library items for every referenced piece (or all of them).
    let mut piece_indices: BTreeSet<usize> = kept
        .iter()
        .filter_map(|l| match l.resolution {
            Resolution::Resolved(idx) => Some(idx),
            Resolution::Missing => None,
        })
        .collect();
    if opts.include_unused || opts.identity {
        piece_indices.extend(0..atlas.pieces.len());
    }
    let debug_idx = match &opts.debug_piece {
        Some(name) => {
            let idx = atlas.find(&normalize_name(name)).ok_or_else(|| {
                SkelxflError::build(format!("debug piece '{name}' not found in atlas"))
            })?;
            piece_indices.insert(idx);
            Some(idx)
        }
        None => None,
    };

    let mut media = Vec::with_capacity(piece_indices.len());
    let mut images = Vec::with_capacity(piece_indices.len());
    for &idx in &piece_indices {
        let piece = &atlas.pieces[idx];
        let item = sanitize_item_name(&normalize_name(&piece.name));
        media.push(MediaItem {
            name: item.clone(),
            piece: piece.name.clone(),
        });
        images.push(ImageSymbol { name: item });
    }

    let mut sprites = Vec::new();
    // Built bottom-to-top here, reversed at the end for XFL's layer order.
    let mut root_bottom_up: Vec<RootLayer> = Vec::new();
    // Sprite item names must be unique even when several layers alias to
    // the same piece, so they derive from the source layer name with a
    // numeric suffix on collision.
    let mut sprite_names: BTreeSet<String> = BTreeSet::new();

    let frame_count;
    let labels;
    if let Some(idx) = debug_idx {
        let piece = &atlas.pieces[idx];
        root_bottom_up.push(RootLayer {
            name: piece.name.clone(),
            content: RootContent::Static {
                image: sanitize_item_name(&normalize_name(&piece.name)),
                placement: Placement {
                    transform: map_placement(RawTransform::IDENTITY, piece, opts.scale),
                },
            },
        });
        frame_count = 1;
        labels = Vec::new();
    } else if opts.identity {
        for piece in &atlas.pieces {
            root_bottom_up.push(RootLayer {
                name: piece.name.clone(),
                content: RootContent::Static {
                    image: sanitize_item_name(&normalize_name(&piece.name)),
                    placement: Placement {
                        transform: map_placement(RawTransform::IDENTITY, piece, opts.scale),
                    },
                },
            });
        }
        frame_count = 1;
        labels = Vec::new();
    } else {
        for layer in kept {
            let idx = match layer.resolution {
                Resolution::Resolved(idx) => idx,
                Resolution::Missing => {
                    match opts.missing {
                        MissingPolicy::Drop => {}
                        MissingPolicy::EmptyLayer => root_bottom_up.push(RootLayer {
                            name: layer.layer.name.clone(),
                            content: RootContent::Empty,
                        }),
                        MissingPolicy::Placeholder => root_bottom_up.push(RootLayer {
                            name: format!("missing:{}", layer.resolved_name),
                            content: RootContent::Empty,
                        }),
                    }
                    continue;
                }
            };

            let piece = &atlas.pieces[idx];
            if !piece_indices.contains(&idx) {
                // Resolver handed us a piece the library pass skipped; that
                // is a desync between the two passes, not a user-input
                // problem.
                return Err(SkelxflError::build(format!(
                    "layer '{}' resolved to piece '{}' absent from the media set",
                    layer.layer.name, piece.name
                )));
            }
            let image_name = sanitize_item_name(&normalize_name(&piece.name));

            let frames: Vec<Option<Placement>> = layer
                .layer
                .frames
                .iter()
                .map(|f| {
                    f.visible.then(|| Placement {
                        transform: map_placement(f.transform, piece, opts.scale),
                    })
                })
                .collect();

            if let Some(placement) = static_placement(&frames) {
                root_bottom_up.push(RootLayer {
                    name: layer.layer.name.clone(),
                    content: RootContent::Static {
                        image: image_name,
                        placement,
                    },
                });
                continue;
            }

            let base = sanitize_item_name(&normalize_name(&layer.layer.name));
            let mut sprite_name = base.clone();
            let mut suffix = 2;
            while !sprite_names.insert(sprite_name.clone()) {
                sprite_name = format!("{base}_{suffix}");
                suffix += 1;
            }
            sprites.push(SpriteSymbol {
                name: sprite_name.clone(),
                image: image_name,
                frames,
            });
            root_bottom_up.push(RootLayer {
                name: layer.layer.name.clone(),
                content: RootContent::Sprite {
                    sprite: sprite_name,
                },
            });
        }
        frame_count = timeline.frame_count;
        labels = timeline.labels.clone();
    }

    root_bottom_up.reverse();

    let model = DocumentModel {
        name: sanitize_item_name(name),
        fps: timeline.fps,
        stage: timeline.stage.scaled(opts.scale),
        frame_count,
        media,
        images,
        sprites,
        root: root_bottom_up,
        labels,
    };
    model.validate()?;
    Ok(model)
}

/// A layer is static when it is visible in every frame with one distinct
/// placement; such layers become a direct image instance instead of a
/// one-state sprite symbol.
fn static_placement(frames: &[Option<Placement>]) -> Option<Placement> {
    let first = frames.first().copied().flatten()?;
    frames
        .iter()
        .all(|f| f.as_ref().is_some_and(|p| p.transform == first.transform))
        .then_some(first)
}

#[cfg(test)]
#[path = "../../tests/unit/document/builder.rs"]
mod tests;
