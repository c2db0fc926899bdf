use std::ops::Range;

use ego_tree::NodeId;
use multimark_core::ThemeId;
use regex::{Regex, RegexBuilder};

use crate::page::{Marker, PageDocument, PageError, PageNode};

/// Opaque handle to one wrapped fragment. Only meaningful inside the engine
/// that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HighlightId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HighlightRecord {
    pub(crate) node: NodeId,
}

/// Slot arena owning every live highlight of a page.
#[derive(Debug, Default)]
pub(crate) struct HighlightArena {
    slots: Vec<Option<HighlightRecord>>,
    free: Vec<u32>,
}

impl HighlightArena {
    pub(crate) fn insert(&mut self, record: HighlightRecord) -> HighlightId {
        if let Some(slot) = self.free.pop() {
            self.slots[slot as usize] = Some(record);
            return HighlightId(slot);
        }
        self.slots.push(Some(record));
        HighlightId((self.slots.len() - 1) as u32)
    }

    pub(crate) fn get(&self, id: HighlightId) -> Option<&HighlightRecord> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub(crate) fn remove(&mut self, id: HighlightId) -> Option<HighlightRecord> {
        let record = self.slots.get_mut(id.0 as usize)?.take()?;
        self.free.push(id.0);
        Some(record)
    }

    #[cfg(test)]
    pub(crate) fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Page(#[from] PageError),
}

/// Case-insensitive literal matcher; every metacharacter in the query is escaped.
#[derive(Debug, Clone)]
pub struct LiteralMatcher {
    regex: Regex,
}

impl LiteralMatcher {
    pub fn new(query: &str) -> Result<Self, ScanError> {
        let regex = RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()?;
        Ok(Self { regex })
    }

    pub fn ranges(&self, text: &str) -> Vec<Range<usize>> {
        self.regex.find_iter(text).map(|m| m.range()).collect()
    }

    pub fn count(&self, text: &str) -> usize {
        self.regex.find_iter(text).count()
    }
}

/// Wraps every occurrence of `query` in the page's searchable text.
///
/// On failure the highlights created so far are unwrapped again, so an aborted
/// scan leaves no markers behind.
pub(crate) fn scan(
    doc: &mut PageDocument,
    arena: &mut HighlightArena,
    query: &str,
    theme: ThemeId,
) -> Result<Vec<HighlightId>, ScanError> {
    let matcher = LiteralMatcher::new(query)?;
    let candidates = doc.searchable_text_nodes();
    let mut created = Vec::new();

    for node in candidates {
        let ranges = match doc.node(node) {
            Some(PageNode::Text(text)) => matcher.ranges(text),
            _ => continue,
        };
        if ranges.is_empty() {
            continue;
        }
        match doc.wrap_ranges(node, &ranges, Marker::new(theme)) {
            Ok(markers) => {
                created.extend(
                    markers
                        .into_iter()
                        .map(|node| arena.insert(HighlightRecord { node })),
                );
            }
            Err(err) => {
                unwrap_highlights(doc, arena, &created);
                return Err(err.into());
            }
        }
    }
    Ok(created)
}

/// Turns highlights back into plain text and coalesces the text around them.
/// Handles that are already gone are skipped.
pub(crate) fn unwrap_highlights(
    doc: &mut PageDocument,
    arena: &mut HighlightArena,
    ids: &[HighlightId],
) {
    let mut parents: Vec<NodeId> = Vec::new();
    for id in ids {
        let Some(record) = arena.remove(*id) else {
            continue;
        };
        if let Some(parent) = doc.unwrap_marker(record.node) {
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
    }
    for parent in parents {
        doc.normalize(parent);
    }
}

pub(crate) fn mark_current(
    doc: &mut PageDocument,
    arena: &HighlightArena,
    id: HighlightId,
    current: bool,
) {
    if let Some(record) = arena.get(id) {
        doc.set_marker_current(record.node, current);
        if current {
            doc.scroll_into_view(record.node);
        }
    }
}
