//! Sparse window over a server-owned ordered list
//!
//! Only chunks of a playlist are ever fetched. Unfetched indices below the
//! highest fetched one are held as explicit `None` holes so that row `n` of
//! the store is always row `n` of the server list.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use tracing::{debug, warn};

use super::entry::{Entry, EntryId, FieldPatch, Plcid};
use super::mode::ViewMode;

/// Auxiliary locale data: tag id -> language -> localized name
pub type Locale = HashMap<String, HashMap<String, String>>;

/// One fetched chunk of a playlist
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub content: Vec<Entry>,
    /// Server total under the requested mode
    pub count: usize,
    pub from: usize,
    pub to: usize,
    pub locale: Locale,
}

/// Sparse ordered collection of entries plus pagination metadata
#[derive(Debug, Clone, Default)]
pub struct WindowStore {
    entries: Vec<Option<Entry>>,
    count: usize,
    loaded_range: Range<usize>,
    mode: ViewMode,
    locale: Locale,
    initialized: bool,
}

impl WindowStore {
    pub fn new(mode: ViewMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Apply a fetched page, choosing between a wholesale reset and a merge.
    ///
    /// A reset happens on the first page, on any explicit reset and whenever
    /// the page was fetched under a different mode than the store holds.
    pub fn apply(&mut self, page: Page, mode: ViewMode, reset: bool) {
        if reset || !self.initialized || mode != self.mode {
            self.replace(page, mode);
        } else {
            self.merge(page);
        }
    }

    /// Discard everything and start over from this page
    pub fn replace(&mut self, page: Page, mode: ViewMode) {
        debug_assert_eq!(page.from, 0, "replace expects a page starting at row 0");

        let Page {
            content,
            count,
            from,
            to,
            locale,
        } = page;

        debug!(
            "Replacing window: {} rows from {} (count {})",
            content.len(),
            from,
            count
        );

        let mut entries = Vec::with_capacity(from + content.len());
        entries.resize(from, None);
        entries.extend(content.into_iter().map(Some));

        self.entries = entries;
        self.count = count;
        self.loaded_range = from..to;
        self.mode = mode;
        self.locale = locale;
        self.initialized = true;
        self.truncate_to_count();
    }

    /// Patch or extend the window with a page fetched under the current mode
    pub fn merge(&mut self, page: Page) {
        let Page {
            content,
            count,
            from,
            to,
            locale,
        } = page;

        // The list shrank on the server since the page was planned
        if from > count {
            warn!("Page at {} lies past the new count {}, keeping the count only", from, count);
            self.count = count;
            self.truncate_to_count();
            return;
        }

        self.count = count;

        if from > self.entries.len() {
            debug!("Padding window from {} to {}", self.entries.len(), from);
            self.entries.resize(from, None);
        }

        for (offset, entry) in content.into_iter().enumerate() {
            let index = from + offset;
            if index < self.entries.len() {
                self.entries[index] = Some(entry);
            } else {
                self.entries.push(Some(entry));
            }
        }

        self.loaded_range = from..to;
        self.locale.extend(locale);
        self.truncate_to_count();
    }

    /// Mutate every loaded entry matching `predicate`. Never fetches.
    pub fn patch_by_predicate<P, F>(&mut self, predicate: P, mut patch: F) -> usize
    where
        P: Fn(&Entry) -> bool,
        F: FnMut(&mut Entry),
    {
        let mut patched = 0;
        for entry in self.entries.iter_mut().flatten() {
            if predicate(entry) {
                patch(entry);
                patched += 1;
            }
        }
        patched
    }

    /// Apply field-level push deltas to loaded entries, returns entries changed
    pub fn patch_fields(&mut self, patches: &[FieldPatch]) -> usize {
        let mut changed = 0;
        for patch in patches {
            self.patch_by_predicate(
                |entry| entry.kid == patch.kid,
                |entry| {
                    if entry.apply(patch) {
                        changed += 1;
                    }
                },
            );
        }
        changed
    }

    /// Remove loaded slots by slot id, returning what was removed
    pub fn remove_by_slot(&mut self, plcids: &[Plcid]) -> Vec<Entry> {
        let wanted: HashSet<Plcid> = plcids.iter().copied().collect();
        self.remove_where(|entry| entry.plcid.is_some_and(|plcid| wanted.contains(&plcid)))
    }

    /// Remove loaded entries by slot or song id
    pub fn remove_by_id(&mut self, ids: &[EntryId]) -> Vec<Entry> {
        let slots: Vec<Plcid> = ids
            .iter()
            .filter_map(|id| match id {
                EntryId::Slot(plcid) => Some(*plcid),
                EntryId::Song(_) => None,
            })
            .collect();
        if slots.len() == ids.len() {
            return self.remove_by_slot(&slots);
        }
        self.remove_where(|entry| ids.iter().any(|id| entry.matches(id)))
    }

    fn remove_where<P>(&mut self, predicate: P) -> Vec<Entry>
    where
        P: Fn(&Entry) -> bool,
    {
        let mut removed = Vec::new();
        let entries = std::mem::take(&mut self.entries);
        self.entries = entries
            .into_iter()
            .filter_map(|slot| match slot {
                Some(entry) if predicate(&entry) => {
                    removed.push(entry);
                    None
                }
                other => Some(other),
            })
            .collect();

        self.count = self.count.saturating_sub(removed.len());
        self.clamp_loaded_range();
        removed
    }

    /// Insert entries before `index`
    pub fn insert_at(&mut self, index: usize, entries: Vec<Entry>) {
        debug_assert!(
            index <= self.entries.len(),
            "insert at {} beyond window length {}",
            index,
            self.entries.len()
        );
        let index = index.min(self.entries.len());
        self.count += entries.len();
        self.entries
            .splice(index..index, entries.into_iter().map(Some));
    }

    /// Move a loaded entry from `old` to `new`. Count is unchanged.
    pub fn move_slot(&mut self, old: usize, new: usize) -> bool {
        if old >= self.entries.len() || new >= self.entries.len() {
            return false;
        }
        if self.entries[old].is_none() {
            return false;
        }
        let removed = self.take_row(old);
        self.insert_at(new, removed);
        true
    }

    fn take_row(&mut self, row: usize) -> Vec<Entry> {
        let removed: Vec<Entry> = self.entries.remove(row).into_iter().collect();
        self.count -= removed.len();
        removed
    }

    /// Drop every entry, used when the side switches playlist
    pub fn clear(&mut self, mode: ViewMode) {
        *self = Self::new(mode);
    }

    fn truncate_to_count(&mut self) {
        if self.entries.len() > self.count {
            self.entries.truncate(self.count);
        }
        self.clamp_loaded_range();
    }

    fn clamp_loaded_range(&mut self) {
        let end = self.loaded_range.end.min(self.entries.len());
        let start = self.loaded_range.start.min(end);
        self.loaded_range = start..end;
    }

    pub fn is_loaded(&self, row: usize) -> bool {
        matches!(self.entries.get(row), Some(Some(_)))
    }

    pub fn row(&self, row: usize) -> Option<&Entry> {
        self.entries.get(row).and_then(Option::as_ref)
    }

    pub fn row_mut(&mut self, row: usize) -> Option<&mut Entry> {
        self.entries.get_mut(row).and_then(Option::as_mut)
    }

    /// First unloaded row inside `range` (bounded by count)
    pub fn first_unloaded(&self, range: Range<usize>) -> Option<usize> {
        let end = range.end.min(self.count);
        (range.start..end).find(|&row| !self.is_loaded(row))
    }

    /// Index of the loaded entry with this id
    pub fn position(&self, id: &EntryId) -> Option<usize> {
        self.entries
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|entry| entry.matches(id)))
    }

    pub fn loaded(&self) -> impl Iterator<Item = (usize, &Entry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|entry| (index, entry)))
    }

    pub fn checked_ids(&self) -> Vec<EntryId> {
        self.loaded()
            .filter(|(_, entry)| entry.checked)
            .map(|(_, entry)| entry.id())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn loaded_range(&self) -> Range<usize> {
        self.loaded_range.clone()
    }

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    /// Display name of a tag in `language`, falling back to the first
    /// language the server sent and then to the tag id itself
    pub fn tag_name<'a>(&'a self, tid: &'a str, language: &str) -> &'a str {
        let Some(names) = self.locale.get(tid) else {
            return tid;
        };
        names
            .get(language)
            .or_else(|| names.iter().min_by_key(|(lang, _)| *lang).map(|(_, name)| name))
            .map_or(tid, String::as_str)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(from: usize, len: usize, count: usize) -> Page {
        let content = (from..from + len)
            .map(|i| Entry::in_slot(format!("k{}", i), i as Plcid, format!("Song {}", i)))
            .collect();
        Page {
            content,
            count,
            from,
            to: from + len,
            locale: Locale::new(),
        }
    }

    fn assert_consistent(store: &WindowStore) {
        assert!(store.len() <= store.count());
        assert!(store.loaded_range().end <= store.len());
    }

    #[test]
    fn test_prefetch_scenario_pads_gap() {
        let mut store = WindowStore::default();
        store.replace(page(0, 400, 1000), ViewMode::default());
        assert_eq!(store.loaded_range(), 0..400);

        store.merge(page(600, 400, 1000));

        assert_eq!(store.len(), 1000);
        assert!((400..600).all(|row| !store.is_loaded(row)));
        assert_eq!(store.row(600).map(|e| e.plcid), Some(Some(600)));
        assert_eq!(store.row(999).map(|e| e.plcid), Some(Some(999)));
        assert_eq!(store.loaded_range(), 600..1000);
        assert_consistent(&store);
    }

    #[test]
    fn test_backfill_overwrites_in_place() {
        let mut store = WindowStore::default();
        store.replace(page(0, 100, 500), ViewMode::default());
        store.merge(page(300, 100, 500));
        store.merge(page(100, 100, 500));

        assert!((0..200).all(|row| store.is_loaded(row)));
        assert!((200..300).all(|row| !store.is_loaded(row)));
        assert!((300..400).all(|row| store.is_loaded(row)));
        assert_eq!(store.len(), 400);
        assert_consistent(&store);
    }

    #[test]
    fn test_pages_in_issue_order_land_at_their_rows() {
        let pages = [page(0, 50, 300), page(200, 50, 300), page(100, 50, 300), page(250, 50, 300)];
        let mut store = WindowStore::default();
        for (i, p) in pages.iter().cloned().enumerate() {
            store.apply(p, ViewMode::default(), i == 0);
        }

        for p in &pages {
            for (offset, entry) in p.content.iter().enumerate() {
                assert_eq!(store.row(p.from + offset), Some(entry));
            }
        }
        assert_eq!(store.first_unloaded(0..300), Some(50));
        assert_consistent(&store);
    }

    #[test]
    fn test_page_past_shrunken_count_adopts_count() {
        let mut store = WindowStore::default();
        store.replace(page(0, 400, 1000), ViewMode::default());

        store.merge(page(700, 0, 500));

        assert_eq!(store.count(), 500);
        assert_eq!(store.len(), 400);
        assert_eq!(store.first_unloaded(700..730), None);
        assert_eq!(store.first_unloaded(380..420), Some(400));
        assert_consistent(&store);
    }

    #[test]
    fn test_tag_names_come_from_locale() {
        let mut p = page(0, 1, 1);
        p.locale.insert(
            "t1".into(),
            HashMap::from([("eng".into(), "Anime".into()), ("fre".into(), "Animé".into())]),
        );
        p.locale.insert("t2".into(), HashMap::from([("jpn".into(), "アニメ".into())]));
        let mut store = WindowStore::default();
        store.replace(p, ViewMode::default());

        assert_eq!(store.tag_name("t1", "fre"), "Animé");
        assert_eq!(store.tag_name("t2", "eng"), "アニメ");
        assert_eq!(store.tag_name("t3", "eng"), "t3");
    }

    #[test]
    fn test_shrinking_count_truncates_tail() {
        let mut store = WindowStore::default();
        store.replace(page(0, 200, 200), ViewMode::default());
        store.merge(page(100, 20, 120));

        assert_eq!(store.count(), 120);
        assert_eq!(store.len(), 120);
        assert_consistent(&store);
    }

    #[test]
    fn test_overrunning_content_is_truncated() {
        let mut store = WindowStore::default();
        store.replace(page(0, 50, 30), ViewMode::default());
        assert_eq!(store.len(), 30);
        assert_consistent(&store);
    }

    #[test]
    fn test_mode_change_forces_replace() {
        let mut store = WindowStore::default();
        store.replace(page(0, 100, 1000), ViewMode::default());
        store.merge(page(100, 100, 1000));

        store.apply(page(0, 10, 10), ViewMode::with_filter("abba"), false);

        assert_eq!(store.len(), 10);
        assert_eq!(store.count(), 10);
        assert_eq!(store.mode().filter, "abba");
    }

    #[test]
    fn test_patch_unknown_kid_is_noop() {
        let mut store = WindowStore::default();
        store.replace(page(0, 10, 10), ViewMode::default());

        let changed = store.patch_fields(&[FieldPatch {
            kid: "missing".into(),
            favorite: Some(true),
            ..Default::default()
        }]);

        assert_eq!(changed, 0);
        assert!(store.loaded().all(|(_, e)| !e.favorite));
    }

    #[test]
    fn test_patch_hits_every_occurrence() {
        let mut store = WindowStore::default();
        let mut p = page(0, 3, 3);
        p.content[2].kid = "k0".into();
        store.replace(p, ViewMode::default());

        let changed = store.patch_fields(&[FieldPatch {
            kid: "k0".into(),
            upvote_count: Some(9),
            ..Default::default()
        }]);

        assert_eq!(changed, 2);
        assert_eq!(store.row(2).map(|e| e.upvote_count), Some(9));
    }

    #[test]
    fn test_remove_and_insert_keep_count_consistent() {
        let mut store = WindowStore::default();
        store.replace(page(0, 10, 10), ViewMode::default());

        let removed = store.remove_by_slot(&[2, 5]);
        assert_eq!(removed.len(), 2);
        assert_eq!(store.count(), 8);
        assert_eq!(store.row(2).and_then(|e| e.plcid), Some(3));

        store.insert_at(2, removed);
        assert_eq!(store.count(), 10);
        assert_eq!(store.row(2).and_then(|e| e.plcid), Some(2));
        assert_consistent(&store);
    }

    #[test]
    fn test_remove_in_sparse_window_keeps_holes() {
        let mut store = WindowStore::default();
        store.replace(page(0, 10, 100), ViewMode::default());
        store.merge(page(50, 10, 100));

        store.remove_by_id(&[EntryId::Slot(55)]);

        assert_eq!(store.count(), 99);
        assert_eq!(store.len(), 59);
        assert!(!store.is_loaded(10));
        assert_eq!(store.row(54).and_then(|e| e.plcid), Some(54));
        assert_eq!(store.row(55).and_then(|e| e.plcid), Some(56));
    }

    #[test]
    fn test_move_slot() {
        let mut store = WindowStore::default();
        store.replace(page(0, 6, 6), ViewMode::default());

        assert!(store.move_slot(2, 5));
        let order: Vec<_> = store.loaded().filter_map(|(_, e)| e.plcid).collect();
        assert_eq!(order, vec![0, 1, 3, 4, 5, 2]);

        assert!(!store.move_slot(2, 6));
        assert_eq!(store.count(), 6);
    }

    #[test]
    fn test_first_unloaded_bounded_by_count() {
        let mut store = WindowStore::default();
        store.replace(page(0, 20, 20), ViewMode::default());
        assert_eq!(store.first_unloaded(10..40), None);
    }
}
