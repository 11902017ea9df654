//! Search filter applied to a fetched media list.

use crate::{collection::MediaEntry, playlist::PlaylistItem};

/// Fields a list row exposes to the search filter.
pub trait Searchable {
    fn search_title(&self) -> &str;
    fn search_owner_name(&self) -> Option<&str>;
}

impl Searchable for MediaEntry {
    fn search_title(&self) -> &str {
        &self.title
    }

    fn search_owner_name(&self) -> Option<&str> {
        self.upper.as_ref().map(|owner| owner.name.as_str())
    }
}

impl Searchable for PlaylistItem {
    fn search_title(&self) -> &str {
        &self.title
    }

    fn search_owner_name(&self) -> Option<&str> {
        self.owner_name.as_deref()
    }
}

/// Keeps items whose title or owner name contains `term`, ignoring case.
///
/// An empty term keeps every item in its original order.
pub fn filter_items<T>(source: &[T], term: &str) -> Vec<T>
where
    T: Searchable + Clone,
{
    if term.is_empty() {
        return source.to_vec();
    }

    let needle = term.to_lowercase();
    source
        .iter()
        .filter(|item| matches_term(*item, &needle))
        .cloned()
        .collect()
}

fn matches_term<T: Searchable>(item: &T, folded_term: &str) -> bool {
    let title = item.search_title();
    if !title.is_empty() && title.to_lowercase().contains(folded_term) {
        return true;
    }
    item.search_owner_name()
        .filter(|name| !name.is_empty())
        .is_some_and(|name| name.to_lowercase().contains(folded_term))
}

#[cfg(test)]
mod tests {
    use super::filter_items;
    use crate::collection::{MediaEntry, MediaOwner};
    use crate::playlist::PlaylistItem;

    fn entry(bvid: &str, title: &str, owner: Option<&str>) -> MediaEntry {
        MediaEntry {
            id: 0,
            bvid: bvid.to_string(),
            title: title.to_string(),
            cover: String::new(),
            duration: 0,
            upper: owner.map(|name| MediaOwner {
                mid: 7,
                name: name.to_string(),
            }),
            cnt_info: Default::default(),
        }
    }

    fn sample() -> Vec<MediaEntry> {
        vec![
            entry("BV1", "Rust Ownership Explained", Some("Ferris")),
            entry("BV2", "Cooking Pasta", Some("Chef Rusty")),
            entry("BV3", "Travel Vlog", None),
            entry("BV4", "", Some("Nobody")),
        ]
    }

    fn bvids(items: &[MediaEntry]) -> Vec<&str> {
        items.iter().map(|item| item.bvid.as_str()).collect()
    }

    #[test]
    fn test_empty_term_is_identity_projection() {
        let source = sample();
        let filtered = filter_items(&source, "");
        assert_eq!(bvids(&filtered), bvids(&source));
    }

    #[test]
    fn test_matches_title_or_owner_case_insensitively() {
        let filtered = filter_items(&sample(), "RUST");
        assert_eq!(bvids(&filtered), vec!["BV1", "BV2"]);

        let filtered = filter_items(&sample(), "nobody");
        assert_eq!(bvids(&filtered), vec!["BV4"]);
    }

    #[test]
    fn test_no_match_yields_empty_list() {
        assert!(filter_items(&sample(), "zzz").is_empty());
    }

    #[test]
    fn test_term_is_not_trimmed() {
        let filtered = filter_items(&sample(), " vlog");
        assert_eq!(bvids(&filtered), vec!["BV3"]);
        assert!(filter_items(&sample(), "vlog ").is_empty());
    }

    #[test]
    fn test_filter_is_idempotent() {
        let once = filter_items(&sample(), "o");
        let twice = filter_items(&once, "o");
        assert_eq!(bvids(&once), bvids(&twice));
    }

    #[test]
    fn test_filters_queue_items_by_owner_name() {
        let mut item = PlaylistItem::video("BV9", "Untitled");
        item.owner_name = Some("Studio Ghibli".to_string());
        let items = vec![item, PlaylistItem::video("BV8", "Other")];
        let filtered = filter_items(&items, "ghibli");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "BV9");
    }
}
