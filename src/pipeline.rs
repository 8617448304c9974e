use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::bundle::atlas::{Atlas, decode_atlas};
use crate::bundle::container::{SectionKind, parse_bundle};
use crate::bundle::json::parse_timeline_doc;
use crate::bundle::timeline::{Timeline, decode_labels, decode_timeline};
use crate::document::builder::{BuildOptions, build_document};
use crate::document::writer::{MediaSource, write_document};
use crate::foundation::core::{DEFAULT_STAGE_SCALE, Fps, StageSize, sanitize_item_name};
use crate::foundation::error::{SkelxflError, SkelxflResult};
use crate::resolve::resolver::{
    AliasTable, MissingPolicy, ResolutionReport, resolve_timeline, unused_pieces,
};

/// Options for one end-to-end conversion run.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    /// Resolution-correction multiplier applied to translations and stage
    /// dimensions.
    pub scale: f64,
    pub fps_override: Option<u16>,
    pub stage_override: Option<StageSize>,
    pub aliases: AliasTable,
    pub missing: MissingPolicy,
    pub include_unused: bool,
    /// Restrict the document to layers resolving to these piece names.
    pub only: Option<Vec<String>>,
    /// Preview: single-frame document with every piece at its registration
    /// point, ignoring the timeline.
    pub identity_sprite: bool,
    /// Preview: place this piece directly on the root timeline.
    pub debug_piece: Option<String>,
    /// External timeline document consumed instead of the bundle's binary
    /// timeline section.
    pub timeline_json: Option<PathBuf>,
    /// Directory of pre-split piece PNGs to copy instead of cropping the
    /// packed atlas image.
    pub media_dir: Option<PathBuf>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_STAGE_SCALE,
            fps_override: None,
            stage_override: None,
            aliases: AliasTable::new(),
            missing: MissingPolicy::Drop,
            include_unused: false,
            only: None,
            identity_sprite: false,
            debug_piece: None,
            timeline_json: None,
            media_dir: None,
        }
    }
}

/// Result summary of a conversion run.
#[derive(Clone, Debug)]
pub struct ConvertOutcome {
    pub document_dir: PathBuf,
    pub report: ResolutionReport,
    /// Atlas pieces never referenced by any layer.
    pub unused: Vec<String>,
    /// Number of library items written (the manifest length).
    pub items_written: usize,
}

/// Decoded bundle contents needed by every workflow: atlas, timeline, and
/// the packed image bytes (owned, so the bundle buffer can be dropped).
#[derive(Clone, Debug)]
pub struct DecodedBundle {
    pub name: String,
    pub atlas: Atlas,
    pub timeline: Timeline,
    pub packed_image: Option<Vec<u8>>,
}

/// Read and fully decode a bundle file. The timeline section is replaced by
/// `timeline_json` when supplied.
#[tracing::instrument(skip(timeline_json))]
pub fn load_bundle(path: &Path, timeline_json: Option<&Path>) -> SkelxflResult<DecodedBundle> {
    let bytes = fs::read(path)?;
    let bundle = parse_bundle(&bytes)?;

    let atlas = decode_atlas(bundle.require(SectionKind::Atlas, "atlas")?)?;

    let timeline = match timeline_json {
        Some(json_path) => {
            let json = fs::read(json_path)?;
            parse_timeline_doc(&json_path.display().to_string(), &json)?
        }
        None => {
            let mut timeline = decode_timeline(bundle.require(SectionKind::Timeline, "timeline")?)?;
            if let Some(payload) = bundle.section(SectionKind::Labels) {
                timeline.labels = decode_labels(payload)?;
            }
            timeline
        }
    };

    let packed_image = bundle.section(SectionKind::Image).map(<[u8]>::to_vec);

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_owned());

    tracing::debug!(
        pieces = atlas.pieces.len(),
        layers = timeline.layers.len(),
        frames = timeline.frame_count,
        "bundle decoded"
    );

    Ok(DecodedBundle {
        name,
        atlas,
        timeline,
        packed_image,
    })
}

/// Convert one bundle into an XFL document directory under `out_dir`.
///
/// Decode errors abort before anything is written; unresolved names never
/// abort and are returned in the outcome's report.
#[tracing::instrument(skip(opts))]
pub fn convert(
    bundle_path: &Path,
    out_dir: &Path,
    opts: &ConvertOptions,
) -> SkelxflResult<ConvertOutcome> {
    let mut decoded = load_bundle(bundle_path, opts.timeline_json.as_deref())?;

    if let Some(fps) = opts.fps_override {
        decoded.timeline.fps = Fps::new(fps)?;
    }
    if let Some(stage) = opts.stage_override {
        decoded.timeline.stage = StageSize::new(stage.width, stage.height)?;
    }

    if let Some(name) = &opts.debug_piece {
        let normalized = crate::foundation::core::normalize_name(name);
        if decoded.atlas.find(&normalized).is_none() {
            return Err(SkelxflError::Other(anyhow::anyhow!(
                "debug piece '{name}' is not an atlas piece (try the info subcommand)"
            )));
        }
    }

    let (resolved, report) = resolve_timeline(&decoded.timeline, &decoded.atlas, &opts.aliases);
    let unused = unused_pieces(&decoded.atlas, &resolved);

    let build_opts = BuildOptions {
        scale: opts.scale,
        include_unused: opts.include_unused,
        missing: opts.missing,
        only: opts.only.clone(),
        identity: opts.identity_sprite,
        debug_piece: opts.debug_piece.clone(),
    };
    let model = build_document(
        &decoded.name,
        &decoded.atlas,
        &decoded.timeline,
        &resolved,
        &build_opts,
    )?;

    let document_dir = out_dir.join(format!("{}.xfl", sanitize_item_name(&decoded.name)));
    fs::create_dir_all(&document_dir)?;

    let media = match (&opts.media_dir, &decoded.packed_image) {
        (Some(dir), _) => MediaSource::PartsDir(dir),
        (None, Some(packed)) => MediaSource::Packed(packed),
        (None, None) => {
            return Err(SkelxflError::Other(anyhow::anyhow!(
                "bundle has no packed image section; supply --media-dir"
            )));
        }
    };
    write_document(&model, &decoded.atlas, media, &document_dir)?;

    let items_written = model.manifest().len();
    Ok(ConvertOutcome {
        document_dir,
        report,
        unused,
        items_written,
    })
}

/// Export every atlas piece as an individual PNG under `out_dir` (the
/// export-images workflow; no document is built).
pub fn export_images(bundle_path: &Path, out_dir: &Path) -> SkelxflResult<usize> {
    let decoded = load_bundle(bundle_path, None)?;
    let packed = decoded.packed_image.as_deref().ok_or_else(|| {
        SkelxflError::Other(anyhow::anyhow!("bundle has no packed image section"))
    })?;

    let pieces = crate::bundle::atlas::split_atlas(&decoded.atlas, packed)?;
    fs::create_dir_all(out_dir)?;
    let count = pieces.len();
    for (name, img) in pieces {
        let dest = out_dir.join(format!("{}.png", sanitize_item_name(&name)));
        img.save(&dest)
            .with_context(|| format!("write piece png '{}'", dest.display()))?;
    }
    Ok(count)
}
