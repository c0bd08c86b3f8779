//! In-memory favorites view with constant-time membership.

use std::collections::HashSet;

use crate::models::{DestinationId, FavoriteItem};

/// Ordered favorites plus an id index, so per-card membership checks do not
/// scan the list.
#[derive(Debug, Clone, Default)]
pub struct FavoriteView {
    items: Vec<FavoriteItem>,
    index: HashSet<DestinationId>,
}

impl FavoriteView {
    /// Build a view, keeping the first item seen for each id.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = FavoriteItem>) -> Self {
        let mut view = Self::default();
        view.extend(items);
        view
    }

    #[must_use]
    pub fn contains(&self, id: &DestinationId) -> bool {
        self.index.contains(id)
    }

    #[must_use]
    pub fn items(&self) -> &[FavoriteItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns `false` when a snapshot for the id was already present.
    ///
    /// An id known only through [`FavoriteView::insert_id`] gains its snapshot.
    pub fn insert(&mut self, item: FavoriteItem) -> bool {
        if !self.index.insert(item.id.clone())
            && self.items.iter().any(|existing| existing.id == item.id)
        {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Record membership for an id whose snapshot could not be fetched.
    pub fn insert_id(&mut self, id: DestinationId) -> bool {
        self.index.insert(id)
    }

    /// Returns `false` when the id was not present.
    pub fn remove(&mut self, id: &DestinationId) -> bool {
        if !self.index.remove(id) {
            return false;
        }
        self.items.retain(|item| &item.id != id);
        true
    }

    /// Union with `items`, existing entries win.
    pub fn extend(&mut self, items: impl IntoIterator<Item = FavoriteItem>) {
        for item in items {
            self.insert(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(id: &str, name: &str) -> FavoriteItem {
        FavoriteItem::new(DestinationId::parse(id).unwrap(), name)
    }

    #[test]
    fn view_dedupes_and_indexes() {
        let mut view = FavoriteView::from_items([item("a", "A"), item("a", "A2"), item("b", "B")]);
        assert_eq!(view.len(), 2);
        assert_eq!(view.items()[0].name, "A");
        assert!(view.contains(&DestinationId::parse("b").unwrap()));

        assert!(!view.insert(item("b", "B2")));
        assert!(view.remove(&DestinationId::parse("a").unwrap()));
        assert!(!view.remove(&DestinationId::parse("a").unwrap()));
        assert_eq!(view.items(), &[item("b", "B")]);
    }

    #[test]
    fn id_without_snapshot_counts_as_member() {
        let mut view = FavoriteView::from_items([item("a", "A")]);
        assert!(view.insert_id(DestinationId::parse("b").unwrap()));
        assert!(!view.insert_id(DestinationId::parse("a").unwrap()));

        assert!(view.contains(&DestinationId::parse("b").unwrap()));
        assert_eq!(view.items(), &[item("a", "A")]);

        assert!(view.insert(item("b", "B")));
        assert_eq!(view.items(), &[item("a", "A"), item("b", "B")]);
        assert!(view.remove(&DestinationId::parse("b").unwrap()));
        assert!(!view.contains(&DestinationId::parse("b").unwrap()));
    }
}
