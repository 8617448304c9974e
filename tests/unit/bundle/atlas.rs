use super::*;

fn pstr(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u16).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn push_piece(buf: &mut Vec<u8>, name: &str, region: [u32; 4], reg: [f32; 2], scale: [f32; 2]) {
    pstr(buf, name);
    for v in region {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    for v in reg {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    for v in scale {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

fn atlas_payload(image_name: &str, pieces: &[(&str, [u32; 4])]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(pieces.len() as u16).to_le_bytes());
    pstr(&mut buf, image_name);
    for (name, region) in pieces {
        push_piece(&mut buf, name, *region, [1.5, -2.0], [1.0, 1.0]);
    }
    buf
}

#[test]
fn roundtrip_preserves_piece_count_and_names() {
    let payload = atlas_payload(
        "pack.png",
        &[
            ("head", [0, 0, 4, 4]),
            ("arm_l", [4, 0, 2, 4]),
            ("arm_r", [6, 0, 2, 4]),
        ],
    );
    let atlas = decode_atlas(&payload).unwrap();
    assert_eq!(atlas.image_name, "pack.png");
    let names: Vec<&str> = atlas.pieces.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["head", "arm_l", "arm_r"]);
    assert_eq!(
        atlas.pieces[1].region,
        PieceRegion {
            x: 4,
            y: 0,
            width: 2,
            height: 4
        }
    );
    assert_eq!(atlas.pieces[0].reg_x, 1.5);
    assert_eq!(atlas.pieces[0].reg_y, -2.0);
}

#[test]
fn find_uses_normalized_names() {
    let payload = atlas_payload("pack.png", &[("Head.png", [0, 0, 4, 4])]);
    let atlas = decode_atlas(&payload).unwrap();
    assert_eq!(atlas.find("head"), Some(0));
    assert_eq!(atlas.find("torso"), None);
}

#[test]
fn rejects_duplicate_piece_names() {
    // Duplicates after normalization, not just byte-equal names.
    let payload = atlas_payload("pack.png", &[("head", [0, 0, 4, 4]), ("HEAD.png", [4, 0, 4, 4])]);
    let err = decode_atlas(&payload).unwrap_err();
    assert!(err.to_string().contains("duplicate piece name"));
}

#[test]
fn rejects_empty_region() {
    let payload = atlas_payload("pack.png", &[("head", [0, 0, 0, 4])]);
    assert!(decode_atlas(&payload).is_err());
}

#[test]
fn rejects_truncated_payload() {
    let payload = atlas_payload("pack.png", &[("head", [0, 0, 4, 4])]);
    let err = decode_atlas(&payload[..payload.len() - 3]).unwrap_err();
    assert!(
        matches!(err, crate::foundation::error::SkelxflError::Format { section: "atlas", .. })
    );
}

#[test]
fn rejects_trailing_bytes() {
    let mut payload = atlas_payload("pack.png", &[("head", [0, 0, 4, 4])]);
    payload.push(0);
    assert!(decode_atlas(&payload).is_err());
}

fn packed_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([x as u8, y as u8, 7, 255])
    });
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    png
}

#[test]
fn split_crops_each_region() {
    let payload = atlas_payload("pack.png", &[("head", [0, 0, 4, 4]), ("arm_l", [4, 2, 2, 3])]);
    let atlas = decode_atlas(&payload).unwrap();
    let parts = split_atlas(&atlas, &packed_png(8, 8)).unwrap();
    assert_eq!(parts.len(), 2);

    let (name, img) = &parts[1];
    assert_eq!(name, "arm_l");
    assert_eq!(img.dimensions(), (2, 3));
    // Pixel (0,0) of the crop is pixel (4,2) of the packed image.
    assert_eq!(img.get_pixel(0, 0), &image::Rgba([4, 2, 7, 255]));
}

#[test]
fn split_rejects_out_of_bounds_region() {
    let payload = atlas_payload("pack.png", &[("head", [6, 6, 4, 4])]);
    let atlas = decode_atlas(&payload).unwrap();
    let err = split_atlas(&atlas, &packed_png(8, 8)).unwrap_err();
    assert!(err.to_string().contains("exceeds packed image"));
}
