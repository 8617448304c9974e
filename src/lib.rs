//! skelxfl converts packed skeletal sprite animation bundles into Adobe
//! Animate XFL document directories.
//!
//! # Pipeline overview
//!
//! 1. **Decode**: bundle bytes -> [`Atlas`] + [`Timeline`] (or an external
//!    JSON timeline form via [`parse_timeline_doc`])
//! 2. **Resolve**: timeline layer names -> atlas pieces, through
//!    normalization and an [`AliasTable`]; unresolved names surface in a
//!    [`ResolutionReport`], never as errors
//! 3. **Map**: raw frame transforms -> authoring-tool coordinates
//!    ([`map_placement`], resolution-correction scale on translations)
//! 4. **Build**: atlas + mapped timeline -> [`DocumentModel`] (library
//!    items, sprite symbols, root timeline; structurally closed)
//! 5. **Write**: [`DocumentModel`] -> `DOMDocument.xml` + `library/` tree
//!
//! Key design constraints:
//!
//! - **Decode is pure**: no I/O below [`pipeline`]; decoders take byte
//!   slices and return models, failing fast with offset-bearing errors.
//! - **Stages own their output**: resolution and mapping derive new
//!   structures; the decoded atlas/timeline stay intact for diagnostics.
//! - **No dangling references**: every `libraryItemName` the writer emits
//!   exists in the document manifest.
#![forbid(unsafe_code)]

mod bundle;
mod document;
mod foundation;
mod mapping;
mod resolve;

pub mod pipeline;

pub use bundle::atlas::{Atlas, AtlasPiece, PieceRegion, decode_atlas, split_atlas};
pub use bundle::container::{Bundle, Section, SectionKind, parse_bundle};
pub use bundle::json::{FrameRecord, TimelineDoc, parse_timeline_doc, timeline_to_doc_json};
pub use bundle::timeline::{
    FrameEntry, FrameLabel, Timeline, TimelineLayer, decode_labels, decode_timeline,
};
pub use document::builder::{BuildOptions, build_document};
pub use document::model::{
    DocumentModel, ImageSymbol, MediaItem, Placement, RootContent, RootLayer, SpriteSymbol,
};
pub use document::writer::{MediaSource, write_document};
pub use foundation::core::{
    Affine, DEFAULT_STAGE_SCALE, Fps, RawTransform, StageSize, normalize_name, sanitize_item_name,
};
pub use foundation::error::{SkelxflError, SkelxflResult};
pub use mapping::affine::{map_placement, scale_translation};
pub use pipeline::{
    ConvertOptions, ConvertOutcome, DecodedBundle, convert, export_images, load_bundle,
};
pub use resolve::resolver::{
    AliasTable, MissingName, MissingPolicy, Resolution, ResolutionReport, ResolvedLayer,
    piece_usage, resolve_timeline, unused_pieces,
};
