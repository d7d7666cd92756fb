//! Sort and filter descriptor of a window store

use serde::{Deserialize, Serialize};

/// Server-side ordering of a playlist view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Playlist position (or alphabetical for the library)
    #[default]
    Default,
    Recent,
    Requested,
    Likes,
}

impl SortOrder {
    /// Value sent to the server, `None` for the default ordering
    pub fn as_param(&self) -> Option<&'static str> {
        match self {
            SortOrder::Default => None,
            SortOrder::Recent => Some("recent"),
            SortOrder::Requested => Some("requested"),
            SortOrder::Likes => Some("likes"),
        }
    }

    pub fn next(&self) -> Self {
        match self {
            SortOrder::Default => SortOrder::Recent,
            SortOrder::Recent => SortOrder::Requested,
            SortOrder::Requested => SortOrder::Likes,
            SortOrder::Likes => SortOrder::Default,
        }
    }
}

/// Facet narrowing a view beyond the free-text filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facet {
    /// Tag id and its tag type
    Tag { tid: String, kind: u8 },
    Year(u16),
}

impl Facet {
    /// Server query string fragment (`t:<tid>~<kind>` or `y:<year>`)
    pub fn as_query(&self) -> String {
        match self {
            Facet::Tag { tid, kind } => format!("t:{}~{}", tid, kind),
            Facet::Year(year) => format!("y:{}", year),
        }
    }
}

/// Current view mode of a store: free text, facet and ordering.
///
/// Any change here invalidates every loaded entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewMode {
    pub filter: String,
    pub facet: Option<Facet>,
    pub order: SortOrder,
}

impl ViewMode {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }

    /// True when the view shows the playlist in its own order, unfiltered
    pub fn is_natural(&self) -> bool {
        self.filter.trim().is_empty() && self.facet.is_none() && self.order == SortOrder::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_mode() {
        assert!(ViewMode::default().is_natural());
        assert!(ViewMode::with_filter("   ").is_natural());
        assert!(!ViewMode::with_filter("abba").is_natural());

        let sorted = ViewMode {
            order: SortOrder::Likes,
            ..Default::default()
        };
        assert!(!sorted.is_natural());
    }

    #[test]
    fn test_facet_query() {
        let tag = Facet::Tag {
            tid: "abc".into(),
            kind: 2,
        };
        assert_eq!(tag.as_query(), "t:abc~2");
        assert_eq!(Facet::Year(1999).as_query(), "y:1999");
    }

    #[test]
    fn test_order_cycles_back_to_default() {
        let mut order = SortOrder::Default;
        for _ in 0..4 {
            order = order.next();
        }
        assert_eq!(order, SortOrder::Default);
    }
}
