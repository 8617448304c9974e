use super::*;

fn parse(json: &str) -> SkelxflResult<Timeline> {
    parse_timeline_doc("anim.json", json.as_bytes())
}

#[test]
fn parses_minimal_document_with_defaults() {
    let timeline = parse(
        r#"{
            "layers": {
                "head": [
                    {"a": 1, "b": 0, "c": 0, "d": 1, "tx": 4.5, "ty": -2}
                ]
            }
        }"#,
    )
    .unwrap();
    assert_eq!(timeline.fps, Fps(30));
    assert_eq!(timeline.stage.width, 390.0);
    assert_eq!(timeline.stage.height, 390.0);
    assert_eq!(timeline.frame_count, 1);
    let frame = &timeline.layers[0].frames[0];
    assert!(frame.visible);
    assert_eq!(frame.transform.tx, 4.5);
}

#[test]
fn frame_count_inferred_from_longest_layer() {
    let timeline = parse(
        r#"{
            "layers": {
                "head": [
                    {"a": 1, "b": 0, "c": 0, "d": 1, "tx": 0, "ty": 0},
                    {"a": 1, "b": 0, "c": 0, "d": 1, "tx": 1, "ty": 0},
                    {"a": 1, "b": 0, "c": 0, "d": 1, "tx": 2, "ty": 0}
                ],
                "torso": [
                    {"a": 1, "b": 0, "c": 0, "d": 1, "tx": 0, "ty": 0}
                ]
            }
        }"#,
    )
    .unwrap();
    assert_eq!(timeline.frame_count, 3);
    // Shorter layers are padded with hidden slots to the full length.
    let torso = timeline.layers.iter().find(|l| l.name == "torso").unwrap();
    assert_eq!(torso.frames.len(), 3);
    assert!(torso.frames[0].visible);
    assert_eq!(torso.frames[1], FrameEntry::hidden());
    assert_eq!(torso.frames[2], FrameEntry::hidden());
}

#[test]
fn explicit_frame_count_pads_all_layers() {
    let timeline = parse(
        r#"{
            "frame_count": 5,
            "layers": {
                "head": [
                    {"a": 1, "b": 0, "c": 0, "d": 1, "tx": 0, "ty": 0}
                ]
            }
        }"#,
    )
    .unwrap();
    assert_eq!(timeline.frame_count, 5);
    assert_eq!(timeline.layers[0].frames.len(), 5);
}

#[test]
fn layer_longer_than_frame_count_is_rejected() {
    let err = parse(
        r#"{
            "frame_count": 1,
            "layers": {
                "head": [
                    {"a": 1, "b": 0, "c": 0, "d": 1, "tx": 0, "ty": 0},
                    {"a": 1, "b": 0, "c": 0, "d": 1, "tx": 1, "ty": 0}
                ]
            }
        }"#,
    )
    .unwrap_err();
    match err {
        SkelxflError::Schema { path, reason } => {
            assert_eq!(path, "anim.json.layers.head");
            assert!(reason.contains("2 frames"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_transform_field_is_a_schema_error() {
    let err = parse(
        r#"{
            "layers": {
                "head": [
                    {"a": 1, "b": 0, "c": 0, "d": 1, "tx": 0}
                ]
            }
        }"#,
    )
    .unwrap_err();
    match err {
        SkelxflError::Schema { path, reason } => {
            assert_eq!(path, "anim.json");
            assert!(reason.contains("ty"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_layers_and_zero_fps_are_rejected() {
    assert!(parse(r#"{"layers": {}}"#).is_err());
    assert!(
        parse(
            r#"{
                "fps": 0,
                "layers": {
                    "head": [{"a": 1, "b": 0, "c": 0, "d": 1, "tx": 0, "ty": 0}]
                }
            }"#,
        )
        .is_err()
    );
}

#[test]
fn labels_and_visibility_carry_through() {
    let timeline = parse(
        r#"{
            "layers": {
                "head": [
                    {"a": 1, "b": 0, "c": 0, "d": 1, "tx": 0, "ty": 0, "visible": false, "label": "idle"}
                ]
            },
            "labels": {"walk": 4}
        }"#,
    )
    .unwrap();
    let frame = &timeline.layers[0].frames[0];
    assert!(!frame.visible);
    assert_eq!(frame.label.as_deref(), Some("idle"));
    assert_eq!(
        timeline.labels,
        vec![FrameLabel {
            name: "walk".to_owned(),
            frame: 4
        }]
    );
}

#[test]
fn dump_output_parses_back_identically() {
    let timeline = parse(
        r#"{
            "fps": 24,
            "width": 1200,
            "height": 800,
            "layers": {
                "head": [
                    {"a": 0.5, "b": 0, "c": 0, "d": 0.5, "tx": 7, "ty": 3},
                    {"a": 1, "b": 0, "c": 0, "d": 1, "tx": 0, "ty": 0, "visible": false}
                ]
            },
            "labels": {"idle": 0}
        }"#,
    )
    .unwrap();

    let json = timeline_to_doc_json(&timeline).unwrap();
    let reparsed = parse_timeline_doc("dump", json.as_bytes()).unwrap();
    assert_eq!(reparsed.fps, timeline.fps);
    assert_eq!(reparsed.frame_count, timeline.frame_count);
    assert_eq!(reparsed.layers, timeline.layers);
    assert_eq!(reparsed.labels, timeline.labels);
}
