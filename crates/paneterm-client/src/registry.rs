#![forbid(unsafe_code)]

//! Bounded, ordered set of panes with a single active pane.

use tracing::debug;

use crate::config::ClientConfig;
use crate::pane::{IdAllocator, Pane, PaneId};

/// Result of [`PaneRegistry::remove`].
#[derive(Debug)]
pub enum RemoveOutcome {
    /// The pane was removed; it is handed back for teardown.
    Removed {
        pane: Box<Pane>,
        /// Active pane after removal, if activity moved.
        new_active: Option<PaneId>,
        active_changed: bool,
    },
    /// Refused: it is the last pane and `allow_empty` was not set.
    RefusedLastPane,
    NotFound,
}

/// Owns every pane of a controller.
#[derive(Debug, Clone)]
pub struct PaneRegistry {
    max_panes: usize,
    panes: Vec<Pane>,
    active: Option<PaneId>,
}

impl PaneRegistry {
    #[must_use]
    pub fn new(max_panes: usize) -> Self {
        Self {
            max_panes: max_panes.max(1),
            panes: Vec::new(),
            active: None,
        }
    }

    #[must_use]
    pub fn max_panes(&self) -> usize {
        self.max_panes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.panes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.panes.len() >= self.max_panes
    }

    #[must_use]
    pub fn active(&self) -> Option<PaneId> {
        self.active
    }

    /// Create a blank pane. Refused at capacity.
    ///
    /// The new pane becomes active only if no pane was active.
    pub(crate) fn create(&mut self, ids: &mut IdAllocator, config: &ClientConfig) -> Option<PaneId> {
        if self.is_full() {
            debug!(
                target: "paneterm::registry",
                panes = self.panes.len(),
                max_panes = self.max_panes,
                "pane creation refused at capacity"
            );
            return None;
        }
        let id = ids.pane();
        let mut pane = Pane::new(id, config);
        pane.ordinal = self.panes.len() + 1;
        self.panes.push(pane);
        if self.active.is_none() {
            self.active = Some(id);
        }
        debug!(target: "paneterm::registry", pane = %id, panes = self.panes.len(), "pane created");
        Some(id)
    }

    /// Remove a pane, moving activity to a neighbor if it was active.
    pub(crate) fn remove(&mut self, id: PaneId, allow_empty: bool) -> RemoveOutcome {
        let Some(index) = self.index_of(id) else {
            return RemoveOutcome::NotFound;
        };
        if self.panes.len() == 1 && !allow_empty {
            return RemoveOutcome::RefusedLastPane;
        }
        let pane = self.panes.remove(index);
        self.renumber();

        let was_active = self.active == Some(id);
        if was_active {
            // Following neighbor takes the slot; otherwise the preceding one.
            let next = self
                .panes
                .get(index)
                .or_else(|| index.checked_sub(1).and_then(|i| self.panes.get(i)))
                .or_else(|| self.panes.first())
                .map(Pane::id);
            self.active = next;
        }
        debug!(
            target: "paneterm::registry",
            pane = %id,
            panes = self.panes.len(),
            was_active,
            "pane removed"
        );
        RemoveOutcome::Removed {
            pane: Box::new(pane),
            new_active: self.active,
            active_changed: was_active,
        }
    }

    /// Make `id` the active pane. Returns `false` for unknown ids.
    pub fn set_active(&mut self, id: PaneId) -> bool {
        if self.index_of(id).is_none() {
            return false;
        }
        self.active = Some(id);
        true
    }

    /// Move activity to the next pane, wrapping.
    pub fn focus_next(&mut self) -> Option<PaneId> {
        self.focus_step(1)
    }

    /// Move activity to the previous pane, wrapping.
    pub fn focus_prev(&mut self) -> Option<PaneId> {
        self.focus_step(self.panes.len().saturating_sub(1))
    }

    fn focus_step(&mut self, step: usize) -> Option<PaneId> {
        if self.panes.is_empty() {
            return None;
        }
        let current = self.active.and_then(|id| self.index_of(id)).unwrap_or(0);
        let next = (current + step) % self.panes.len();
        self.active = Some(self.panes[next].id);
        self.active
    }

    #[must_use]
    pub fn get(&self, id: PaneId) -> Option<&Pane> {
        self.panes.iter().find(|p| p.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: PaneId) -> Option<&mut Pane> {
        self.panes.iter_mut().find(|p| p.id == id)
    }

    /// Panes in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Pane> {
        self.panes.iter()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<PaneId> {
        self.panes.iter().map(Pane::id).collect()
    }

    /// Panes currently bound to `session`.
    #[must_use]
    pub fn panes_bound_to(&self, session: &str) -> Vec<PaneId> {
        if session.is_empty() {
            return Vec::new();
        }
        self.panes
            .iter()
            .filter(|p| p.session == session)
            .map(Pane::id)
            .collect()
    }

    fn index_of(&self, id: PaneId) -> Option<usize> {
        self.panes.iter().position(|p| p.id == id)
    }

    fn renumber(&mut self) {
        for (index, pane) in self.panes.iter_mut().enumerate() {
            pane.ordinal = index + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(n: usize, max: usize) -> (PaneRegistry, IdAllocator, Vec<PaneId>) {
        let config = ClientConfig::default();
        let mut ids = IdAllocator::default();
        let mut registry = PaneRegistry::new(max);
        let created = (0..n)
            .map(|_| registry.create(&mut ids, &config).unwrap())
            .collect();
        (registry, ids, created)
    }

    fn ordinals(registry: &PaneRegistry) -> Vec<usize> {
        registry.iter().map(Pane::ordinal).collect()
    }

    #[test]
    fn creation_refused_at_capacity() {
        let (mut registry, mut ids, _) = registry_with(4, 4);
        assert!(registry.create(&mut ids, &ClientConfig::default()).is_none());
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn first_pane_becomes_active() {
        let (registry, _, created) = registry_with(2, 4);
        assert_eq!(registry.active(), Some(created[0]));
    }

    #[test]
    fn last_pane_removal_refused_without_override() {
        let (mut registry, _, created) = registry_with(1, 4);
        assert!(matches!(
            registry.remove(created[0], false),
            RemoveOutcome::RefusedLastPane
        ));
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.remove(created[0], true),
            RemoveOutcome::Removed { new_active: None, .. }
        ));
        assert!(registry.is_empty());
        assert_eq!(registry.active(), None);
    }

    #[test]
    fn removal_renumbers_ordinals() {
        let (mut registry, _, created) = registry_with(3, 4);
        registry.remove(created[1], false);
        assert_eq!(ordinals(&registry), vec![1, 2]);
        assert_eq!(registry.ids(), vec![created[0], created[2]]);
    }

    #[test]
    fn active_moves_to_following_neighbor() {
        let (mut registry, _, created) = registry_with(3, 4);
        registry.set_active(created[1]);
        registry.remove(created[1], false);
        assert_eq!(registry.active(), Some(created[2]));
    }

    #[test]
    fn active_moves_to_preceding_neighbor_at_end() {
        let (mut registry, _, created) = registry_with(3, 4);
        registry.set_active(created[2]);
        registry.remove(created[2], false);
        assert_eq!(registry.active(), Some(created[1]));
    }

    #[test]
    fn removing_inactive_pane_keeps_active() {
        let (mut registry, _, created) = registry_with(3, 4);
        registry.set_active(created[2]);
        let outcome = registry.remove(created[0], false);
        assert!(matches!(
            outcome,
            RemoveOutcome::Removed { active_changed: false, .. }
        ));
        assert_eq!(registry.active(), Some(created[2]));
    }

    #[test]
    fn focus_cycles_and_wraps() {
        let (mut registry, _, created) = registry_with(3, 4);
        assert_eq!(registry.focus_next(), Some(created[1]));
        assert_eq!(registry.focus_next(), Some(created[2]));
        assert_eq!(registry.focus_next(), Some(created[0]));
        assert_eq!(registry.focus_prev(), Some(created[2]));
    }

    #[test]
    fn unknown_pane_operations() {
        let (mut registry, mut ids, _) = registry_with(1, 4);
        let stranger = ids.pane();
        assert!(!registry.set_active(stranger));
        assert!(matches!(registry.remove(stranger, true), RemoveOutcome::NotFound));
    }
}
