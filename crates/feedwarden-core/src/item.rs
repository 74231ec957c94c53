//! Items, pages and per-item outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const ITEM_ID_PREFIX: &str = "video-";

/// Engine-assigned item identity, rendered as `video-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ItemId(u64);

impl ItemId {
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub fn seq(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ITEM_ID_PREFIX}{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(ITEM_ID_PREFIX)
            .and_then(|n| n.parse().ok())
            .map(ItemId)
            .ok_or_else(|| format!("not an item id: {s:?}"))
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ItemId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Host handle for a node in an observed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(pub u64);

/// A matching node as reported by the host, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedNode {
    pub node: NodeRef,
    #[serde(default)]
    pub title: String,
}

impl ObservedNode {
    pub fn new(node: u64, title: impl Into<String>) -> Self {
        Self {
            node: NodeRef(node),
            title: title.into(),
        }
    }
}

/// Which observed list a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    /// Related items beside the focal item
    Recommendations,
    /// Home or subscriptions grid
    Feed,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Recommendations => "recommendations",
            ListKind::Feed => "feed",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub node: NodeRef,
}

/// Sequence number of a page within one batcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// Items discovered between two completion points. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    id: PageId,
    list: ListKind,
    items: Vec<Item>,
}

impl Page {
    pub(crate) fn new(id: PageId, list: ListKind, items: Vec<Item>) -> Self {
        Self { id, list, items }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn list(&self) -> ListKind {
        self.list
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|i| i.id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Visibility decision for one recommendation item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub visible: bool,
    /// Classifier rationale; `None` when the item was absent from the reply.
    pub reason: Option<String>,
}

impl Outcome {
    pub fn shown(reason: impl Into<String>) -> Self {
        Self {
            visible: true,
            reason: Some(reason.into()),
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            reason: None,
        }
    }
}

pub type OutcomeMap = BTreeMap<ItemId, Outcome>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_text_form() {
        let id = ItemId::new(42);
        assert_eq!(id.to_string(), "video-42");
        assert_eq!("video-42".parse::<ItemId>().unwrap(), id);
        assert!("video-".parse::<ItemId>().is_err());
        assert!("clip-3".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_item_id_orders_numerically() {
        assert!(ItemId::new(9) < ItemId::new(10));
    }

    #[test]
    fn test_outcome_map_serializes_with_string_keys() {
        let mut map = OutcomeMap::new();
        map.insert(ItemId::new(2), Outcome::hidden());
        map.insert(ItemId::new(1), Outcome::shown("on topic"));
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["video-1"]["visible"], true);
        assert_eq!(json["video-2"]["reason"], serde_json::Value::Null);
    }
}
