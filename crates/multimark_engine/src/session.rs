//! Per-page search bookkeeping: committed terms, the transient preview set and
//! the navigation cursor over whichever set is active.

use multimark_core::{Direction, TermView, ThemeCursor, ThemeId, MAX_TERMS};

use crate::highlight::HighlightId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PersistentTerm {
    pub(crate) query: String,
    pub(crate) theme: ThemeId,
    pub(crate) highlights: Vec<HighlightId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ActiveSet {
    #[default]
    None,
    Transient,
    Persistent(usize),
}

#[derive(Debug, Default)]
pub(crate) struct SearchSession {
    terms: Vec<PersistentTerm>,
    transient: Vec<HighlightId>,
    active: ActiveSet,
    cursor: Option<usize>,
    theme_cursor: ThemeCursor,
}

impl SearchSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether `query` may become a new committed term: a free slot and no
    /// committed term equal to it ignoring case.
    pub(crate) fn can_commit(&self, query: &str) -> bool {
        if self.terms.len() >= MAX_TERMS {
            return false;
        }
        let folded = query.to_lowercase();
        !self
            .terms
            .iter()
            .any(|term| term.query.to_lowercase() == folded)
    }

    pub(crate) fn next_theme(&self) -> ThemeId {
        self.theme_cursor.current()
    }

    /// Hands the transient highlights to the caller for unwrapping.
    pub(crate) fn take_transient(&mut self) -> Vec<HighlightId> {
        if self.active == ActiveSet::Transient {
            self.deactivate();
        }
        std::mem::take(&mut self.transient)
    }

    pub(crate) fn set_transient(&mut self, highlights: Vec<HighlightId>) {
        self.transient = highlights;
        self.activate(ActiveSet::Transient);
    }

    /// Appends a committed term, makes it the active set and advances the
    /// theme cursor. Returns the term's index in commit order.
    pub(crate) fn commit(
        &mut self,
        query: &str,
        theme: ThemeId,
        highlights: Vec<HighlightId>,
    ) -> usize {
        self.terms.push(PersistentTerm {
            query: query.to_string(),
            theme,
            highlights,
        });
        self.theme_cursor.advance();
        let index = self.terms.len() - 1;
        self.activate(ActiveSet::Persistent(index));
        index
    }

    /// Drops the term at `index`. Other terms keep their order and themes.
    pub(crate) fn remove(&mut self, index: usize) -> Option<PersistentTerm> {
        if index >= self.terms.len() {
            return None;
        }
        let term = self.terms.remove(index);
        match self.active {
            ActiveSet::Persistent(active) if active == index => self.deactivate(),
            ActiveSet::Persistent(active) if active > index => {
                self.active = ActiveSet::Persistent(active - 1);
            }
            _ => {}
        }
        Some(term)
    }

    /// Empties the session, returning every highlight it held.
    pub(crate) fn clear_all(&mut self) -> Vec<HighlightId> {
        let mut all = std::mem::take(&mut self.transient);
        all.extend(self.terms.drain(..).flat_map(|term| term.highlights));
        self.deactivate();
        all
    }

    pub(crate) fn terms(&self) -> Vec<TermView> {
        self.terms
            .iter()
            .map(|term| TermView {
                query: term.query.clone(),
                theme: term.theme,
            })
            .collect()
    }

    pub(crate) fn term_count(&self) -> usize {
        self.terms.len()
    }

    fn active_highlights(&self) -> &[HighlightId] {
        match self.active {
            ActiveSet::None => &[],
            ActiveSet::Transient => &self.transient,
            ActiveSet::Persistent(index) => self
                .terms
                .get(index)
                .map(|term| term.highlights.as_slice())
                .unwrap_or(&[]),
        }
    }

    pub(crate) fn match_count(&self) -> usize {
        self.active_highlights().len()
    }

    /// 1-based position of the current match, 0 when there is none.
    pub(crate) fn current_match(&self) -> usize {
        self.cursor.map(|index| index + 1).unwrap_or(0)
    }

    pub(crate) fn current(&self) -> Option<HighlightId> {
        self.cursor
            .and_then(|index| self.active_highlights().get(index).copied())
    }

    /// Moves the cursor with wrap-around. Returns the previous and new current
    /// highlight, or `None` when the active set is empty.
    pub(crate) fn step(&mut self, direction: Direction) -> Option<(HighlightId, HighlightId)> {
        let len = self.match_count();
        let index = self.cursor?;
        if len == 0 {
            return None;
        }
        let next = match direction {
            Direction::Next => (index + 1) % len,
            Direction::Prev => (index + len - 1) % len,
        };
        let previous = self.current()?;
        self.cursor = Some(next);
        Some((previous, self.current()?))
    }

    fn activate(&mut self, set: ActiveSet) {
        self.active = set;
        self.cursor = if self.active_highlights().is_empty() {
            None
        } else {
            Some(0)
        };
    }

    fn deactivate(&mut self) {
        self.active = ActiveSet::None;
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::SearchSession;
    use crate::highlight::{HighlightArena, HighlightId, HighlightRecord};
    use ego_tree::Tree;
    use multimark_core::{Direction, ThemeId};

    fn ids(count: usize) -> Vec<HighlightId> {
        let tree = Tree::new(());
        let node = tree.root().id();
        let mut arena = HighlightArena::default();
        (0..count)
            .map(|_| arena.insert(HighlightRecord { node }))
            .collect()
    }

    #[test]
    fn commits_are_capped_and_deduplicated() {
        let mut session = SearchSession::new();
        for query in ["cat", "sat", "mat", "hat"] {
            assert!(session.can_commit(query));
            session.commit(query, session.next_theme(), Vec::new());
        }
        assert!(!session.can_commit("bat"));

        session.remove(3);
        assert!(!session.can_commit("CAT"));
        assert!(session.can_commit("bat"));
    }

    #[test]
    fn commit_advances_theme_cursor() {
        let mut session = SearchSession::new();
        session.commit("cat", session.next_theme(), Vec::new());
        session.set_transient(Vec::new());
        assert_eq!(session.next_theme(), ThemeId::Ocean);
    }

    #[test]
    fn step_wraps_in_both_directions() {
        let mut session = SearchSession::new();
        let highlights = ids(3);
        session.set_transient(highlights.clone());
        assert_eq!(session.current_match(), 1);

        let (_, current) = session.step(Direction::Prev).expect("step");
        assert_eq!(current, highlights[2]);
        assert_eq!(session.current_match(), 3);

        session.step(Direction::Next);
        assert_eq!(session.current_match(), 1);
    }

    #[test]
    fn step_on_empty_set_is_none() {
        let mut session = SearchSession::new();
        session.set_transient(Vec::new());
        assert!(session.step(Direction::Next).is_none());
        assert_eq!(session.current_match(), 0);
    }

    #[test]
    fn removing_active_term_empties_active_set() {
        let mut session = SearchSession::new();
        session.commit("cat", ThemeId::Default, ids(2));
        assert_eq!(session.match_count(), 2);

        let removed = session.remove(0).expect("term");
        assert_eq!(removed.highlights.len(), 2);
        assert_eq!(session.match_count(), 0);
        assert_eq!(session.current(), None);
    }

    #[test]
    fn removing_earlier_term_keeps_active_term() {
        let mut session = SearchSession::new();
        session.commit("cat", ThemeId::Default, ids(1));
        session.commit("mat", ThemeId::Ocean, ids(2));

        session.remove(0);
        assert_eq!(session.match_count(), 2);
        assert_eq!(session.terms()[0].query, "mat");
    }

    #[test]
    fn taking_transient_keeps_persistent_active_set() {
        let mut session = SearchSession::new();
        session.commit("cat", ThemeId::Default, ids(2));
        assert!(session.take_transient().is_empty());
        assert_eq!(session.match_count(), 2);
    }
}
