use std::collections::BTreeMap;

use crate::bundle::atlas::Atlas;
use crate::bundle::timeline::{Timeline, TimelineLayer};
use crate::foundation::core::normalize_name;

/// Source-name -> atlas-name alias map. Many-to-one is allowed; later
/// inserts for the same source override earlier ones. Keys and values are
/// normalized on insert, so lookups use normalized names throughout.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct AliasTable {
    map: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: &str, target: &str) {
        self.map
            .insert(normalize_name(source), normalize_name(target));
    }

    pub fn apply<'a>(&'a self, normalized: &'a str) -> &'a str {
        self.map.get(normalized).map_or(normalized, String::as_str)
    }

    /// Parse a repeatable `source=target` directive.
    pub fn insert_directive(&mut self, directive: &str) -> Result<(), String> {
        match directive.split_once('=') {
            Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                self.insert(from, to);
                Ok(())
            }
            _ => Err(format!("alias '{directive}' is not of the form from=to")),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Outcome of resolving one layer name against the atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Index into `Atlas::pieces`.
    Resolved(usize),
    Missing,
}

/// A timeline layer paired with its resolution outcome. Borrows the decoded
/// timeline; resolution never mutates prior stages.
#[derive(Clone, Debug)]
pub struct ResolvedLayer<'a> {
    pub layer: &'a TimelineLayer,
    /// Layer name after normalization and aliasing.
    pub resolved_name: String,
    pub resolution: Resolution,
}

impl ResolvedLayer<'_> {
    pub fn is_resolved(&self) -> bool {
        matches!(self.resolution, Resolution::Resolved(_))
    }
}

/// What the document builder does with layers whose names did not resolve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Exclude the layer from the document entirely.
    #[default]
    Drop,
    /// Keep an empty layer (frame slots, no instances) as a visual stub.
    EmptyLayer,
    /// Debug aid: keep the layer and flag it in the layer name.
    Placeholder,
}

/// One unresolved name with its usage count (non-hidden frames referencing
/// it).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct MissingName {
    pub name: String,
    pub usage: usize,
}

/// Resolution summary surfaced to the caller; never aborts the run.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct ResolutionReport {
    pub total_layers: usize,
    pub resolved: usize,
    /// Missing names ordered by usage descending, ties by name ascending, so
    /// the most impactful aliases to fix come first.
    pub missing: Vec<MissingName>,
}

impl ResolutionReport {
    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }
}

/// Resolve every timeline layer against the atlas. Pure function of
/// (timeline names, atlas names, alias table); deterministic and independent
/// of alias insertion order.
pub fn resolve_timeline<'a>(
    timeline: &'a Timeline,
    atlas: &Atlas,
    aliases: &AliasTable,
) -> (Vec<ResolvedLayer<'a>>, ResolutionReport) {
    let mut resolved = Vec::with_capacity(timeline.layers.len());
    let mut missing: BTreeMap<String, usize> = BTreeMap::new();

    for layer in &timeline.layers {
        let normalized = normalize_name(&layer.name);
        let target = aliases.apply(&normalized).to_owned();
        let resolution = match atlas.find(&target) {
            Some(idx) => Resolution::Resolved(idx),
            None => {
                *missing.entry(target.clone()).or_insert(0) += layer.visible_frames();
                tracing::warn!(layer = %layer.name, resolved = %target, "layer name not in atlas");
                Resolution::Missing
            }
        };
        resolved.push(ResolvedLayer {
            layer,
            resolved_name: target,
            resolution,
        });
    }

    let mut missing: Vec<MissingName> = missing
        .into_iter()
        .map(|(name, usage)| MissingName { name, usage })
        .collect();
    missing.sort_by(|x, y| y.usage.cmp(&x.usage).then_with(|| x.name.cmp(&y.name)));

    let report = ResolutionReport {
        total_layers: timeline.layers.len(),
        resolved: resolved.iter().filter(|l| l.is_resolved()).count(),
        missing,
    };

    (resolved, report)
}

/// Atlas pieces never referenced by any resolved layer, name-sorted. A
/// read-only projection over the resolution result.
pub fn unused_pieces(atlas: &Atlas, resolved: &[ResolvedLayer<'_>]) -> Vec<String> {
    let mut names: Vec<String> = atlas
        .pieces
        .iter()
        .enumerate()
        .filter(|(idx, _)| {
            !resolved
                .iter()
                .any(|l| l.resolution == Resolution::Resolved(*idx))
        })
        .map(|(_, p)| p.name.clone())
        .collect();
    names.sort();
    names
}

/// Per-piece usage counts across all layers (visible frames per resolved
/// piece), for the `info` trace output.
pub fn piece_usage(atlas: &Atlas, resolved: &[ResolvedLayer<'_>]) -> Vec<(String, usize)> {
    atlas
        .pieces
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            let usage = resolved
                .iter()
                .filter(|l| l.resolution == Resolution::Resolved(idx))
                .map(|l| l.layer.visible_frames())
                .sum();
            (p.name.clone(), usage)
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/resolve/resolver.rs"]
mod tests;
