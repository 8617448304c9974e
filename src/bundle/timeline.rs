use nom::IResult;
use nom::number::complete::{le_f32, le_u8, le_u16, le_u32};

use crate::bundle::container::{pstring, to_format_error};
use crate::foundation::core::{Fps, RawTransform, StageSize};
use crate::foundation::error::{SkelxflError, SkelxflResult};

const FLAG_VISIBLE: u8 = 0b0000_0001;

/// One frame slot of a layer. A hidden entry is the explicit gap marker:
/// every layer carries exactly `frame_count` entries, never a truncated
/// sequence.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameEntry {
    pub transform: RawTransform,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FrameEntry {
    pub fn hidden() -> Self {
        Self {
            transform: RawTransform::IDENTITY,
            visible: false,
            label: None,
        }
    }
}

/// A named timeline layer: piece-name reference plus its dense frame
/// sequence. The name is not guaranteed to match an atlas piece until
/// resolution.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimelineLayer {
    pub name: String,
    pub frames: Vec<FrameEntry>,
}

impl TimelineLayer {
    /// Frames that actually place the piece (the resolver's usage metric).
    pub fn visible_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.visible).count()
    }
}

/// A named frame label (0-based frame index).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameLabel {
    pub name: String,
    pub frame: u32,
}

/// Decoded animation timeline. Layer order is stacking order: index 0 is the
/// bottommost layer in the source renderer's compositing.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Timeline {
    pub fps: Fps,
    pub stage: StageSize,
    pub frame_count: u32,
    pub layers: Vec<TimelineLayer>,
    pub labels: Vec<FrameLabel>,
}

fn frame_entry(i: &[u8]) -> IResult<&[u8], FrameEntry> {
    let (i, flags) = le_u8(i)?;
    let (i, a) = le_f32(i)?;
    let (i, b) = le_f32(i)?;
    let (i, c) = le_f32(i)?;
    let (i, d) = le_f32(i)?;
    let (i, tx) = le_f32(i)?;
    let (i, ty) = le_f32(i)?;
    Ok((
        i,
        FrameEntry {
            transform: RawTransform {
                a: f64::from(a),
                b: f64::from(b),
                c: f64::from(c),
                d: f64::from(d),
                tx: f64::from(tx),
                ty: f64::from(ty),
            },
            visible: flags & FLAG_VISIBLE != 0,
            label: None,
        },
    ))
}

fn layer(frame_count: u32) -> impl FnMut(&[u8]) -> IResult<&[u8], TimelineLayer> {
    move |i: &[u8]| {
        let (i, name) = pstring(i)?;
        let (i, frames) = nom::multi::count(frame_entry, frame_count as usize)(i)?;
        Ok((i, TimelineLayer { name, frames }))
    }
}

/// Decode the timeline section payload. Frame-index alignment across layers
/// is structural here: every layer stores exactly `frame_count` records.
pub fn decode_timeline(payload: &[u8]) -> SkelxflResult<Timeline> {
    fn parse(i: &[u8]) -> IResult<&[u8], Timeline> {
        let (i, fps) = le_u16(i)?;
        let (i, width) = le_f32(i)?;
        let (i, height) = le_f32(i)?;
        let (i, frame_count) = le_u32(i)?;
        let (i, layer_count) = le_u16(i)?;
        let (i, layers) = nom::multi::count(layer(frame_count), usize::from(layer_count))(i)?;
        Ok((
            i,
            Timeline {
                fps: Fps(fps),
                stage: StageSize {
                    width: f64::from(width),
                    height: f64::from(height),
                },
                frame_count,
                layers,
                labels: Vec::new(),
            },
        ))
    }

    let (rest, timeline) = parse(payload).map_err(|e| to_format_error("timeline", payload, e))?;
    if !rest.is_empty() {
        return Err(SkelxflError::format(
            "timeline",
            payload.len() - rest.len(),
            format!("{} trailing bytes after layer records", rest.len()),
        ));
    }
    if timeline.fps.0 == 0 {
        return Err(SkelxflError::format("timeline", 0, "fps must be > 0"));
    }
    if timeline.frame_count == 0 {
        return Err(SkelxflError::format(
            "timeline",
            2,
            "frame count must be > 0",
        ));
    }
    StageSize::new(timeline.stage.width, timeline.stage.height)
        .map_err(|_| SkelxflError::format("timeline", 2, "stage size must be finite and > 0"))?;

    Ok(timeline)
}

/// Decode the labels section payload. Source label frames are 1-based; they
/// are converted to 0-based here, clamping at frame 0.
pub fn decode_labels(payload: &[u8]) -> SkelxflResult<Vec<FrameLabel>> {
    fn entry(i: &[u8]) -> IResult<&[u8], FrameLabel> {
        let (i, name) = pstring(i)?;
        let (i, frame) = le_u32(i)?;
        Ok((
            i,
            FrameLabel {
                name,
                frame: frame.saturating_sub(1),
            },
        ))
    }
    fn parse(i: &[u8]) -> IResult<&[u8], Vec<FrameLabel>> {
        let (i, count) = le_u16(i)?;
        nom::multi::count(entry, usize::from(count))(i)
    }

    let (rest, labels) = parse(payload).map_err(|e| to_format_error("labels", payload, e))?;
    if !rest.is_empty() {
        return Err(SkelxflError::format(
            "labels",
            payload.len() - rest.len(),
            format!("{} trailing bytes after label records", rest.len()),
        ));
    }
    Ok(labels)
}

#[cfg(test)]
#[path = "../../tests/unit/bundle/timeline.rs"]
mod tests;
