use super::*;

use crate::bundle::atlas::{AtlasPiece, PieceRegion};
use crate::bundle::timeline::{FrameEntry, TimelineLayer};
use crate::foundation::core::{Fps, RawTransform, StageSize};
use crate::resolve::resolver::{AliasTable, resolve_timeline};

fn piece(name: &str) -> AtlasPiece {
    AtlasPiece {
        name: name.to_owned(),
        region: PieceRegion {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
        },
        reg_x: 0.0,
        reg_y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
    }
}

fn atlas(names: &[&str]) -> Atlas {
    Atlas {
        image_name: "pack.png".to_owned(),
        pieces: names.iter().map(|n| piece(n)).collect(),
    }
}

fn frame(visible: bool, tx: f64) -> FrameEntry {
    FrameEntry {
        transform: RawTransform {
            tx,
            ..RawTransform::IDENTITY
        },
        visible,
        label: None,
    }
}

fn timeline(layers: Vec<(&str, Vec<FrameEntry>)>) -> Timeline {
    let frame_count = layers.iter().map(|(_, f)| f.len()).max().unwrap_or(0) as u32;
    Timeline {
        fps: Fps(30),
        stage: StageSize {
            width: 1200.0,
            height: 1200.0,
        },
        frame_count,
        layers: layers
            .into_iter()
            .map(|(name, frames)| TimelineLayer {
                name: name.to_owned(),
                frames,
            })
            .collect(),
        labels: Vec::new(),
    }
}

fn build(
    atlas: &Atlas,
    timeline: &Timeline,
    opts: &BuildOptions,
) -> SkelxflResult<DocumentModel> {
    let (resolved, _) = resolve_timeline(timeline, atlas, &AliasTable::new());
    build_document("hero", atlas, timeline, &resolved, opts)
}

fn unit_opts() -> BuildOptions {
    BuildOptions {
        scale: 1.0,
        ..BuildOptions::default()
    }
}

#[test]
fn animated_layer_becomes_sprite_with_hidden_slots() {
    let atlas = atlas(&["head"]);
    let tl = timeline(vec![(
        "head",
        vec![frame(true, 0.0), frame(false, 0.0), frame(true, 5.0)],
    )]);
    let model = build(&atlas, &tl, &unit_opts()).unwrap();

    assert_eq!(model.sprites.len(), 1);
    let sprite = &model.sprites[0];
    assert_eq!(sprite.frames.len(), 3);
    assert!(sprite.frames[0].is_some());
    assert!(sprite.frames[1].is_none());
    assert_eq!(
        sprite.frames[2].as_ref().map(|p| p.transform.as_coeffs()[4]),
        Some(5.0)
    );
    assert_eq!(
        model.root[0].content,
        RootContent::Sprite {
            sprite: "head".to_owned()
        }
    );
}

#[test]
fn constant_layer_becomes_static_instance() {
    let atlas = atlas(&["bg"]);
    let tl = timeline(vec![("bg", vec![frame(true, 3.0), frame(true, 3.0)])]);
    let model = build(&atlas, &tl, &unit_opts()).unwrap();

    assert!(model.sprites.is_empty());
    match &model.root[0].content {
        RootContent::Static { image, placement } => {
            assert_eq!(image, "bg");
            assert_eq!(placement.transform.as_coeffs()[4], 3.0);
        }
        other => panic!("expected static layer, got {other:?}"),
    }
}

#[test]
fn layer_with_a_hidden_frame_is_not_static() {
    let atlas = atlas(&["bg"]);
    let tl = timeline(vec![("bg", vec![frame(true, 3.0), frame(false, 3.0)])]);
    let model = build(&atlas, &tl, &unit_opts()).unwrap();
    assert_eq!(model.sprites.len(), 1);
}

#[test]
fn root_layers_are_topmost_first() {
    // Source order: bottom is first, so the document reverses it.
    let atlas = atlas(&["a", "b", "c"]);
    let tl = timeline(vec![
        ("a", vec![frame(true, 0.0), frame(true, 1.0)]),
        ("b", vec![frame(true, 0.0), frame(true, 1.0)]),
        ("c", vec![frame(true, 0.0), frame(true, 1.0)]),
    ]);
    let model = build(&atlas, &tl, &unit_opts()).unwrap();
    let names: Vec<&str> = model.root.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["c", "b", "a"]);
}

#[test]
fn missing_layers_follow_the_policy() {
    let atlas = atlas(&["head"]);
    let tl = timeline(vec![
        ("head", vec![frame(true, 0.0), frame(true, 1.0)]),
        ("ghost", vec![frame(true, 0.0), frame(true, 1.0)]),
    ]);

    let model = build(&atlas, &tl, &unit_opts()).unwrap();
    assert_eq!(model.root.len(), 1);

    let model = build(
        &atlas,
        &tl,
        &BuildOptions {
            missing: MissingPolicy::EmptyLayer,
            ..unit_opts()
        },
    )
    .unwrap();
    assert_eq!(model.root.len(), 2);
    assert_eq!(model.root[0].name, "ghost");
    assert_eq!(model.root[0].content, RootContent::Empty);

    let model = build(
        &atlas,
        &tl,
        &BuildOptions {
            missing: MissingPolicy::Placeholder,
            ..unit_opts()
        },
    )
    .unwrap();
    assert_eq!(model.root[0].name, "missing:ghost");
}

#[test]
fn unused_pieces_excluded_unless_requested() {
    let atlas = atlas(&["head", "spare"]);
    let tl = timeline(vec![("head", vec![frame(true, 0.0), frame(true, 1.0)])]);

    let model = build(&atlas, &tl, &unit_opts()).unwrap();
    assert_eq!(model.media.len(), 1);

    let model = build(
        &atlas,
        &tl,
        &BuildOptions {
            include_unused: true,
            ..unit_opts()
        },
    )
    .unwrap();
    assert_eq!(model.media.len(), 2);
    assert!(model.media.iter().any(|m| m.name == "spare"));
    // Unused pieces get library items but no root layer.
    assert_eq!(model.root.len(), 1);
}

#[test]
fn only_filter_restricts_layers_and_media() {
    let atlas = atlas(&["head", "torso"]);
    let tl = timeline(vec![
        ("head", vec![frame(true, 0.0), frame(true, 1.0)]),
        ("torso", vec![frame(true, 0.0), frame(true, 1.0)]),
    ]);
    let model = build(
        &atlas,
        &tl,
        &BuildOptions {
            only: Some(vec!["Torso.png".to_owned()]),
            ..unit_opts()
        },
    )
    .unwrap();
    assert_eq!(model.root.len(), 1);
    assert_eq!(model.root[0].name, "torso");
    assert_eq!(model.media.len(), 1);
    assert_eq!(model.media[0].name, "torso");
}

#[test]
fn aliased_layers_get_distinct_sprites() {
    // Two layers may alias to one atlas piece; their sprites must still be
    // distinct library items with their own frame data.
    let atlas = atlas(&["arm_l"]);
    let tl = timeline(vec![
        ("arm_left", vec![frame(true, 0.0), frame(true, 1.0)]),
        ("arm_other", vec![frame(true, 2.0), frame(true, 3.0)]),
    ]);
    let mut aliases = AliasTable::new();
    aliases.insert("arm_left", "arm_l");
    aliases.insert("arm_other", "arm_l");

    let (resolved, _) = resolve_timeline(&tl, &atlas, &aliases);
    let model = build_document("hero", &atlas, &tl, &resolved, &unit_opts()).unwrap();

    assert_eq!(model.media.len(), 1);
    assert_eq!(model.sprites.len(), 2);
    assert_eq!(model.sprites[0].name, "arm_left");
    assert_eq!(model.sprites[1].name, "arm_other");
    assert_eq!(
        model.sprites[0].frames[0].map(|p| p.transform.as_coeffs()[4]),
        Some(0.0)
    );
    assert_eq!(
        model.sprites[1].frames[0].map(|p| p.transform.as_coeffs()[4]),
        Some(2.0)
    );

    // Root layers keep the source layer names, topmost first.
    let names: Vec<&str> = model.root.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["arm_other", "arm_left"]);

    let manifest = model.manifest();
    let mut deduped = manifest.clone();
    deduped.dedup();
    assert_eq!(manifest, deduped);
}

#[test]
fn duplicate_source_layers_get_suffixed_sprites() {
    let atlas = atlas(&["head"]);
    let tl = timeline(vec![
        ("head", vec![frame(true, 0.0), frame(true, 1.0)]),
        ("head", vec![frame(true, 2.0), frame(true, 3.0)]),
    ]);
    let model = build(&atlas, &tl, &unit_opts()).unwrap();
    assert_eq!(model.sprites[0].name, "head");
    assert_eq!(model.sprites[1].name, "head_2");
}

#[test]
fn identity_preview_places_every_piece_once() {
    let mut atlas = atlas(&["head", "arm_l"]);
    atlas.pieces[1].reg_x = 3.0;
    atlas.pieces[1].reg_y = -1.0;
    let tl = timeline(vec![("head", vec![frame(true, 0.0), frame(true, 5.0)])]);

    let model = build(
        &atlas,
        &tl,
        &BuildOptions {
            identity: true,
            ..unit_opts()
        },
    )
    .unwrap();

    assert_eq!(model.frame_count, 1);
    assert!(model.sprites.is_empty());
    assert_eq!(model.media.len(), 2);
    assert_eq!(model.root.len(), 2);
    // Reverse atlas order: last piece ends up topmost.
    assert_eq!(model.root[0].name, "arm_l");
    match &model.root[0].content {
        RootContent::Static { image, placement } => {
            assert_eq!(image, "arm_l");
            let [.., tx, ty] = placement.transform.as_coeffs();
            assert_eq!((tx, ty), (3.0, -1.0));
        }
        other => panic!("expected static layer, got {other:?}"),
    }
}

#[test]
fn debug_piece_bypasses_the_sprites() {
    let atlas = atlas(&["head", "spare"]);
    let tl = timeline(vec![("head", vec![frame(true, 0.0), frame(true, 5.0)])]);

    let model = build(
        &atlas,
        &tl,
        &BuildOptions {
            debug_piece: Some("Spare.png".to_owned()),
            ..unit_opts()
        },
    )
    .unwrap();

    assert_eq!(model.frame_count, 1);
    assert!(model.sprites.is_empty());
    assert_eq!(model.root.len(), 1);
    assert_eq!(model.root[0].name, "spare");
    assert!(model.media.iter().any(|m| m.name == "spare"));

    let err = build(
        &atlas,
        &tl,
        &BuildOptions {
            debug_piece: Some("ghost".to_owned()),
            ..unit_opts()
        },
    )
    .unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn stage_is_scaled_and_item_names_sanitized() {
    let atlas = atlas(&["face.blink"]);
    let tl = timeline(vec![(
        "face.blink",
        vec![frame(true, 0.0), frame(true, 1.0)],
    )]);
    let model = build(
        &atlas,
        &tl,
        &BuildOptions {
            scale: 0.78125,
            ..BuildOptions::default()
        },
    )
    .unwrap();
    assert_eq!(model.stage.width, 937.5);
    assert_eq!(model.media[0].name, "face_blink");
    assert_eq!(model.sprites[0].image, "face_blink");
    // Root layer keeps the resolved (unsanitized) name.
    assert_eq!(model.root[0].name, "face.blink");
}
