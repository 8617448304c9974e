use std::collections::BTreeMap;

use crate::bundle::timeline::{FrameEntry, FrameLabel, Timeline, TimelineLayer};
use crate::foundation::core::{Fps, RawTransform, StageSize};
use crate::foundation::error::{SkelxflError, SkelxflResult};

/// External intermediate timeline document: a hand-editable JSON form that
/// bypasses binary timeline decoding when supplied.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TimelineDoc {
    #[serde(default)]
    pub fps: Fps,
    #[serde(default = "default_stage_dim")]
    pub width: f64,
    #[serde(default = "default_stage_dim")]
    pub height: f64,
    /// Total frame count. When absent, the longest layer defines it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u32>,
    /// Per-layer ordered frame records, keyed by piece name.
    pub layers: BTreeMap<String, Vec<FrameRecord>>,
    /// Label name -> 0-based frame index.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, u32>,
}

fn default_stage_dim() -> f64 {
    390.0
}

/// One frame record of the external form. Transform fields are required;
/// visibility defaults to visible.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FrameRecord {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn default_visible() -> bool {
    true
}

/// Parse the external timeline form from JSON bytes. Serde errors surface as
/// `SchemaError` with serde's line/column context in the reason.
pub fn parse_timeline_doc(source: &str, bytes: &[u8]) -> SkelxflResult<Timeline> {
    let doc: TimelineDoc = serde_json::from_slice(bytes)
        .map_err(|e| SkelxflError::schema(source, e.to_string()))?;
    timeline_from_doc(source, doc)
}

fn timeline_from_doc(source: &str, doc: TimelineDoc) -> SkelxflResult<Timeline> {
    if doc.layers.is_empty() {
        return Err(SkelxflError::schema(
            format!("{source}.layers"),
            "at least one layer is required",
        ));
    }
    if doc.fps.0 == 0 {
        return Err(SkelxflError::schema(
            format!("{source}.fps"),
            "fps must be > 0",
        ));
    }
    let stage = StageSize::new(doc.width, doc.height)
        .map_err(|_| SkelxflError::schema(format!("{source}.width"), "stage size must be > 0"))?;

    let longest = doc.layers.values().map(Vec::len).max().unwrap_or(0);
    let frame_count = match doc.frame_count {
        Some(n) => n,
        None => longest as u32,
    };
    if frame_count == 0 {
        return Err(SkelxflError::schema(
            format!("{source}.frame_count"),
            "timeline has no frames",
        ));
    }

    let mut layers = Vec::with_capacity(doc.layers.len());
    for (name, records) in doc.layers {
        if records.len() > frame_count as usize {
            return Err(SkelxflError::schema(
                format!("{source}.layers.{name}"),
                format!(
                    "layer has {} frames but frame_count is {frame_count}",
                    records.len()
                ),
            ));
        }
        let mut frames: Vec<FrameEntry> = records
            .into_iter()
            .map(|r| FrameEntry {
                transform: RawTransform {
                    a: r.a,
                    b: r.b,
                    c: r.c,
                    d: r.d,
                    tx: r.tx,
                    ty: r.ty,
                },
                visible: r.visible,
                label: r.label,
            })
            .collect();
        // Shorter layers are padded with the explicit hidden marker so every
        // layer's sequence length equals the global frame count.
        frames.resize_with(frame_count as usize, FrameEntry::hidden);
        layers.push(TimelineLayer { name, frames });
    }

    let labels = doc
        .labels
        .into_iter()
        .map(|(name, frame)| FrameLabel { name, frame })
        .collect();

    Ok(Timeline {
        fps: doc.fps,
        stage,
        frame_count,
        layers,
        labels,
    })
}

/// Render a decoded timeline back into the external JSON form (the
/// `dump-timeline` workflow).
pub fn timeline_to_doc_json(timeline: &Timeline) -> SkelxflResult<String> {
    #[derive(serde::Serialize)]
    struct DumpRecord<'a> {
        a: f64,
        b: f64,
        c: f64,
        d: f64,
        tx: f64,
        ty: f64,
        visible: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<&'a str>,
    }
    #[derive(serde::Serialize)]
    struct DumpDoc<'a> {
        fps: Fps,
        width: f64,
        height: f64,
        frame_count: u32,
        layers: BTreeMap<&'a str, Vec<DumpRecord<'a>>>,
        labels: BTreeMap<&'a str, u32>,
    }

    let doc = DumpDoc {
        fps: timeline.fps,
        width: timeline.stage.width,
        height: timeline.stage.height,
        frame_count: timeline.frame_count,
        layers: timeline
            .layers
            .iter()
            .map(|l| {
                let records = l
                    .frames
                    .iter()
                    .map(|f| DumpRecord {
                        a: f.transform.a,
                        b: f.transform.b,
                        c: f.transform.c,
                        d: f.transform.d,
                        tx: f.transform.tx,
                        ty: f.transform.ty,
                        visible: f.visible,
                        label: f.label.as_deref(),
                    })
                    .collect();
                (l.name.as_str(), records)
            })
            .collect(),
        labels: timeline
            .labels
            .iter()
            .map(|l| (l.name.as_str(), l.frame))
            .collect(),
    };

    serde_json::to_string_pretty(&doc)
        .map_err(|e| SkelxflError::schema("<timeline>", e.to_string()))
}

#[cfg(test)]
#[path = "../../tests/unit/bundle/json.rs"]
mod tests;
