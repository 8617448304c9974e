use std::fs;
use std::path::Path;

use anyhow::Context as _;
use kurbo::Affine;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::bundle::atlas::{Atlas, crop_piece, decode_packed_image};
use crate::document::model::{DocumentModel, RootContent, SpriteSymbol};
use crate::foundation::error::{SkelxflError, SkelxflResult};

const XFL_NS: &str = "http://ns.adobe.com/xfl/2008/";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XFL_VERSION: &str = "2.971";
const LABELS_LAYER: &str = "__labels__";

/// Where the writer gets pixel data for media files.
#[derive(Clone, Copy, Debug)]
pub enum MediaSource<'a> {
    /// Crop each piece out of the bundle's packed atlas image.
    Packed(&'a [u8]),
    /// Copy pre-split `<piece>.png` files from a caller-supplied directory.
    PartsDir(&'a Path),
}

/// Serialize the document model to the fixed XFL directory layout rooted at
/// `doc_dir`. Write failures abort; partial output is left for the caller to
/// clean up (temp-dir-then-rename if atomicity matters).
#[tracing::instrument(skip(model, atlas, media))]
pub fn write_document(
    model: &DocumentModel,
    atlas: &Atlas,
    media: MediaSource<'_>,
    doc_dir: &Path,
) -> SkelxflResult<()> {
    let library = doc_dir.join("library");
    let media_dir = library.join("media");
    let image_dir = library.join("image");
    let sprite_dir = library.join("sprite");
    for dir in [&media_dir, &image_dir, &sprite_dir] {
        fs::create_dir_all(dir)?;
    }

    write_media_files(model, atlas, media, &media_dir)?;

    for img in &model.images {
        let xml = image_symbol_xml(img.name.as_str())
            .with_context(|| format!("serialize image symbol '{}'", img.name))?;
        fs::write(image_dir.join(format!("{}.xml", img.name)), xml)?;
    }
    for sprite in &model.sprites {
        let xml = sprite_symbol_xml(sprite)
            .with_context(|| format!("serialize sprite symbol '{}'", sprite.name))?;
        fs::write(sprite_dir.join(format!("{}.xml", sprite.name)), xml)?;
    }

    let dom = dom_document_xml(model).context("serialize DOMDocument")?;
    fs::write(doc_dir.join("DOMDocument.xml"), dom)?;

    // Proxy file the authoring tool expects next to DOMDocument.xml when
    // opening an uncompressed document directory.
    fs::write(doc_dir.join("main.xfl"), "PROXY-CS5")?;

    tracing::debug!(
        media = model.media.len(),
        images = model.images.len(),
        sprites = model.sprites.len(),
        "document written"
    );
    Ok(())
}

fn write_media_files(
    model: &DocumentModel,
    atlas: &Atlas,
    media: MediaSource<'_>,
    media_dir: &Path,
) -> SkelxflResult<()> {
    match media {
        MediaSource::Packed(packed_png) => {
            let packed = decode_packed_image(packed_png)?;
            for item in &model.media {
                let piece = atlas
                    .pieces
                    .iter()
                    .find(|p| p.name == item.piece)
                    .ok_or_else(|| {
                        SkelxflError::build(format!(
                            "media item '{}' has no atlas piece '{}'",
                            item.name, item.piece
                        ))
                    })?;
                let cropped = crop_piece(&packed, piece)?;
                let dest = media_dir.join(format!("{}.png", item.name));
                cropped
                    .save(&dest)
                    .with_context(|| format!("write piece png '{}'", dest.display()))?;
            }
        }
        MediaSource::PartsDir(dir) => {
            for item in &model.media {
                let mut src = dir.join(format!("{}.png", item.piece));
                if !src.is_file() {
                    src = dir.join(format!("{}.png", item.name));
                }
                if !src.is_file() {
                    return Err(SkelxflError::Other(anyhow::anyhow!(
                        "no source image for piece '{}' under '{}'",
                        item.piece,
                        dir.display()
                    )));
                }
                fs::copy(&src, media_dir.join(format!("{}.png", item.name)))?;
            }
        }
    }
    Ok(())
}

fn fmt6(v: f64) -> String {
    format!("{v:.6}")
}

fn new_writer(buf: &mut Vec<u8>) -> anyhow::Result<Writer<&mut Vec<u8>>> {
    let mut w = Writer::new_with_indent(buf, b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    Ok(w)
}

fn start(name: &str, attrs: &[(&str, &str)]) -> BytesStart<'static> {
    let mut el = BytesStart::new(name.to_owned());
    for (k, v) in attrs {
        el.push_attribute((*k, *v));
    }
    el
}

fn write_matrix(w: &mut Writer<&mut Vec<u8>>, m: Affine) -> anyhow::Result<()> {
    let [a, b, c, d, tx, ty] = m.as_coeffs();
    w.write_event(Event::Start(start("matrix", &[])))?;
    w.write_event(Event::Empty(start(
        "Matrix",
        &[
            ("a", fmt6(a).as_str()),
            ("b", fmt6(b).as_str()),
            ("c", fmt6(c).as_str()),
            ("d", fmt6(d).as_str()),
            ("tx", fmt6(tx).as_str()),
            ("ty", fmt6(ty).as_str()),
        ],
    )))?;
    w.write_event(Event::End(BytesEnd::new("matrix")))?;
    Ok(())
}

fn write_instance(
    w: &mut Writer<&mut Vec<u8>>,
    library_item: &str,
    matrix: Option<Affine>,
) -> anyhow::Result<()> {
    let attrs = [
        ("libraryItemName", library_item),
        ("firstFrame", "0"),
        ("symbolType", "graphic"),
        ("loop", "loop"),
    ];
    match matrix {
        Some(m) => {
            w.write_event(Event::Start(start("DOMSymbolInstance", &attrs)))?;
            write_matrix(w, m)?;
            w.write_event(Event::End(BytesEnd::new("DOMSymbolInstance")))?;
        }
        None => {
            w.write_event(Event::Empty(start("DOMSymbolInstance", &attrs)))?;
        }
    }
    Ok(())
}

/// Wrapper symbol XML: one frame, one bitmap instance at the origin.
fn image_symbol_xml(name: &str) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut w = new_writer(&mut buf)?;

    let item = format!("image/{name}");
    w.write_event(Event::Start(start(
        "DOMSymbolItem",
        &[
            ("xmlns", XFL_NS),
            ("xmlns:xsi", XSI_NS),
            ("name", item.as_str()),
            ("itemID", item.as_str()),
            ("symbolType", "graphic"),
        ],
    )))?;
    w.write_event(Event::Start(start("timeline", &[])))?;
    w.write_event(Event::Start(start("DOMTimeline", &[("name", name)])))?;
    w.write_event(Event::Start(start("layers", &[])))?;
    w.write_event(Event::Start(start("DOMLayer", &[("name", "Layer 1")])))?;
    w.write_event(Event::Start(start("frames", &[])))?;
    w.write_event(Event::Start(start(
        "DOMFrame",
        &[("index", "0"), ("duration", "1")],
    )))?;
    w.write_event(Event::Start(start("elements", &[])))?;
    let media_item = format!("media/{name}");
    w.write_event(Event::Empty(start(
        "DOMBitmapInstance",
        &[("libraryItemName", media_item.as_str())],
    )))?;
    w.write_event(Event::End(BytesEnd::new("elements")))?;
    w.write_event(Event::End(BytesEnd::new("DOMFrame")))?;
    w.write_event(Event::End(BytesEnd::new("frames")))?;
    w.write_event(Event::End(BytesEnd::new("DOMLayer")))?;
    w.write_event(Event::End(BytesEnd::new("layers")))?;
    w.write_event(Event::End(BytesEnd::new("DOMTimeline")))?;
    w.write_event(Event::End(BytesEnd::new("timeline")))?;
    w.write_event(Event::End(BytesEnd::new("DOMSymbolItem")))?;
    Ok(buf)
}

/// Sprite symbol XML: one layer, one `DOMFrame` per timeline frame. Hidden
/// frames are emitted without elements so they still consume a slot.
fn sprite_symbol_xml(sprite: &SpriteSymbol) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut w = new_writer(&mut buf)?;

    let item = sprite.item_name();
    w.write_event(Event::Start(start(
        "DOMSymbolItem",
        &[
            ("xmlns", XFL_NS),
            ("xmlns:xsi", XSI_NS),
            ("name", item.as_str()),
            ("itemID", item.as_str()),
            ("symbolType", "graphic"),
        ],
    )))?;
    w.write_event(Event::Start(start("timeline", &[])))?;
    w.write_event(Event::Start(start(
        "DOMTimeline",
        &[("name", sprite.name.as_str())],
    )))?;
    w.write_event(Event::Start(start("layers", &[])))?;
    w.write_event(Event::Start(start(
        "DOMLayer",
        &[("name", sprite.name.as_str())],
    )))?;
    w.write_event(Event::Start(start("frames", &[])))?;

    let image_item = format!("image/{}", sprite.image);
    for (index, placement) in sprite.frames.iter().enumerate() {
        let index = index.to_string();
        let attrs = [("index", index.as_str()), ("duration", "1")];
        match placement {
            Some(p) => {
                w.write_event(Event::Start(start("DOMFrame", &attrs)))?;
                w.write_event(Event::Start(start("elements", &[])))?;
                write_instance(&mut w, &image_item, Some(p.transform))?;
                w.write_event(Event::End(BytesEnd::new("elements")))?;
                w.write_event(Event::End(BytesEnd::new("DOMFrame")))?;
            }
            None => {
                w.write_event(Event::Empty(start("DOMFrame", &attrs)))?;
            }
        }
    }

    w.write_event(Event::End(BytesEnd::new("frames")))?;
    w.write_event(Event::End(BytesEnd::new("DOMLayer")))?;
    w.write_event(Event::End(BytesEnd::new("layers")))?;
    w.write_event(Event::End(BytesEnd::new("DOMTimeline")))?;
    w.write_event(Event::End(BytesEnd::new("timeline")))?;
    w.write_event(Event::End(BytesEnd::new("DOMSymbolItem")))?;
    Ok(buf)
}

/// The main descriptor: stage, folders, media items, symbol includes, and
/// the root timeline.
fn dom_document_xml(model: &DocumentModel) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut w = new_writer(&mut buf)?;

    let frame_rate = model.fps.0.to_string();
    w.write_event(Event::Start(start(
        "DOMDocument",
        &[
            ("xmlns", XFL_NS),
            ("xmlns:xsi", XSI_NS),
            ("frameRate", frame_rate.as_str()),
            ("width", fmt6(model.stage.width).as_str()),
            ("height", fmt6(model.stage.height).as_str()),
            ("xflVersion", XFL_VERSION),
        ],
    )))?;

    w.write_event(Event::Start(start("folders", &[])))?;
    for folder in ["media", "image", "sprite"] {
        w.write_event(Event::Empty(start(
            "DOMFolderItem",
            &[("name", folder), ("isExpanded", "true")],
        )))?;
    }
    w.write_event(Event::End(BytesEnd::new("folders")))?;

    w.write_event(Event::Start(start("media", &[])))?;
    for (i, item) in model.media.iter().enumerate() {
        let item_id = format!("bit_{}", i + 1);
        w.write_event(Event::Empty(start(
            "DOMBitmapItem",
            &[
                ("name", item.item_name().as_str()),
                ("href", item.href().as_str()),
                ("itemID", item_id.as_str()),
                ("allowSmoothing", "true"),
                ("useImportedJPEGData", "false"),
            ],
        )))?;
    }
    w.write_event(Event::End(BytesEnd::new("media")))?;

    w.write_event(Event::Start(start("symbols", &[])))?;
    for img in &model.images {
        w.write_event(Event::Empty(start(
            "Include",
            &[("href", img.library_path().as_str())],
        )))?;
    }
    for sprite in &model.sprites {
        w.write_event(Event::Empty(start(
            "Include",
            &[("href", sprite.library_path().as_str())],
        )))?;
    }
    w.write_event(Event::End(BytesEnd::new("symbols")))?;

    w.write_event(Event::Start(start("timelines", &[])))?;
    w.write_event(Event::Start(start(
        "DOMTimeline",
        &[("name", model.name.as_str())],
    )))?;
    w.write_event(Event::Start(start("layers", &[])))?;

    if !model.labels.is_empty() {
        write_labels_layer(&mut w, model)?;
    }

    let duration = model.frame_count.to_string();
    for layer in &model.root {
        w.write_event(Event::Start(start(
            "DOMLayer",
            &[("name", layer.name.as_str())],
        )))?;
        w.write_event(Event::Start(start("frames", &[])))?;
        let attrs = [("index", "0"), ("duration", duration.as_str())];
        match &layer.content {
            RootContent::Sprite { sprite } => {
                w.write_event(Event::Start(start("DOMFrame", &attrs)))?;
                w.write_event(Event::Start(start("elements", &[])))?;
                write_instance(&mut w, &format!("sprite/{sprite}"), None)?;
                w.write_event(Event::End(BytesEnd::new("elements")))?;
                w.write_event(Event::End(BytesEnd::new("DOMFrame")))?;
            }
            RootContent::Static { image, placement } => {
                w.write_event(Event::Start(start("DOMFrame", &attrs)))?;
                w.write_event(Event::Start(start("elements", &[])))?;
                write_instance(
                    &mut w,
                    &format!("image/{image}"),
                    Some(placement.transform),
                )?;
                w.write_event(Event::End(BytesEnd::new("elements")))?;
                w.write_event(Event::End(BytesEnd::new("DOMFrame")))?;
            }
            RootContent::Empty => {
                w.write_event(Event::Empty(start("DOMFrame", &attrs)))?;
            }
        }
        w.write_event(Event::End(BytesEnd::new("frames")))?;
        w.write_event(Event::End(BytesEnd::new("DOMLayer")))?;
    }

    w.write_event(Event::End(BytesEnd::new("layers")))?;
    w.write_event(Event::End(BytesEnd::new("DOMTimeline")))?;
    w.write_event(Event::End(BytesEnd::new("timelines")))?;
    w.write_event(Event::End(BytesEnd::new("DOMDocument")))?;
    Ok(buf)
}

/// Sparse label spans: one `DOMFrame` per span between label start frames,
/// named when a label starts there.
fn write_labels_layer(w: &mut Writer<&mut Vec<u8>>, model: &DocumentModel) -> anyhow::Result<()> {
    let total = model.frame_count;
    let mut starts: Vec<u32> = model
        .labels
        .iter()
        .map(|l| l.frame.min(total.saturating_sub(1)))
        .collect();
    starts.sort_unstable();
    starts.dedup();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    starts.push(total);

    w.write_event(Event::Start(start(
        "DOMLayer",
        &[("name", LABELS_LAYER), ("color", "#FF9900")],
    )))?;
    w.write_event(Event::Start(start("frames", &[])))?;
    for pair in starts.windows(2) {
        let (s, e) = (pair[0], pair[1]);
        let duration = (e - s).max(1).to_string();
        let index = s.to_string();
        let name = model
            .labels
            .iter()
            .find(|l| l.frame.min(total.saturating_sub(1)) == s)
            .map(|l| l.name.as_str());
        let mut attrs = vec![("index", index.as_str()), ("duration", duration.as_str())];
        if let Some(n) = name {
            attrs.push(("name", n));
        }
        w.write_event(Event::Empty(start("DOMFrame", &attrs)))?;
    }
    w.write_event(Event::End(BytesEnd::new("frames")))?;
    w.write_event(Event::End(BytesEnd::new("DOMLayer")))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/document/writer.rs"]
mod tests;
