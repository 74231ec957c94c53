//! Mutation Batcher: groups newly rendered list nodes into pages.
//!
//! The host reports every observation burst as the full ordered list of
//! matching nodes. The batcher keeps `last_emitted` (nodes already paged) and
//! closes a page when the heuristic says the source has finished rendering a
//! chunk. A final partial chunk that never reaches a boundary is never
//! emitted; there is no timeout flush.

use std::collections::{HashMap, HashSet};

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, trace};

use crate::item::{Item, ItemId, ListKind, NodeRef, ObservedNode, Page, PageId};

/// When a burst of additions counts as a complete page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageHeuristic {
    /// New-node count is a whole multiple of any accepted chunk size.
    ChunkSizes(Vec<usize>),
    /// Two consecutive observations report the same total.
    Quiescence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatcherState {
    Observing,
    Slicing,
    Stopped,
}

pub struct MutationBatcher {
    list: ListKind,
    heuristic: PageHeuristic,
    state: BatcherState,
    last_emitted: usize,
    previous_count: Option<usize>,
    next_item: u64,
    next_page: u64,
    assigned: HashMap<NodeRef, ItemId>,
    submitted: HashSet<ItemId>,
}

impl MutationBatcher {
    /// A batcher that is already observing.
    pub fn new(list: ListKind, heuristic: PageHeuristic) -> Self {
        Self {
            list,
            heuristic,
            state: BatcherState::Observing,
            last_emitted: 0,
            previous_count: None,
            next_item: 1,
            next_page: 1,
            assigned: HashMap::new(),
            submitted: HashSet::new(),
        }
    }

    pub fn list(&self) -> ListKind {
        self.list
    }

    pub fn state(&self) -> BatcherState {
        self.state
    }

    pub fn last_emitted(&self) -> usize {
        self.last_emitted
    }

    /// Resume after [`stop`](Self::stop). Counts and id assignments survive.
    pub fn observe(&mut self) {
        if self.state == BatcherState::Stopped {
            self.state = BatcherState::Observing;
            self.previous_count = None;
            debug!(list = %self.list, last_emitted = self.last_emitted, "batcher resumed");
        }
    }

    pub fn stop(&mut self) {
        self.state = BatcherState::Stopped;
    }

    /// Feed one observation burst; returns a page when one closes.
    pub fn on_observation(&mut self, nodes: &[ObservedNode]) -> Option<Page> {
        if self.state != BatcherState::Observing {
            return None;
        }
        let count = nodes.len();
        let complete = self.is_complete(count);
        self.previous_count = Some(count);
        trace!(list = %self.list, count, last_emitted = self.last_emitted, complete);
        if !complete {
            return None;
        }

        self.state = BatcherState::Slicing;
        let page = self.slice(&nodes[self.last_emitted..count]);
        self.last_emitted = count;
        self.state = BatcherState::Observing;
        page
    }

    fn is_complete(&self, count: usize) -> bool {
        if count <= self.last_emitted {
            return false;
        }
        let fresh = count - self.last_emitted;
        match &self.heuristic {
            PageHeuristic::ChunkSizes(sizes) => {
                sizes.iter().any(|&size| size > 0 && fresh % size == 0)
            }
            PageHeuristic::Quiescence => self.previous_count == Some(count),
        }
    }

    fn slice(&mut self, fresh: &[ObservedNode]) -> Option<Page> {
        let mut items = Vec::with_capacity(fresh.len());
        for observed in fresh {
            let id = self.id_for(observed.node);
            // identity is the assigned id; a re-added node is never resubmitted
            if !self.submitted.insert(id) {
                continue;
            }
            items.push(Item {
                id,
                title: observed.title.clone(),
                node: observed.node,
            });
        }
        if items.is_empty() {
            return None;
        }
        let page = Page::new(PageId(self.next_page), self.list, items);
        self.next_page += 1;
        Some(page)
    }

    fn id_for(&mut self, node: NodeRef) -> ItemId {
        if let Some(id) = self.assigned.get(&node) {
            return *id;
        }
        let id = ItemId::new(self.next_item);
        self.next_item += 1;
        self.assigned.insert(node, id);
        id
    }

    /// Adapt a stream of observation bursts into a lazy stream of pages.
    pub fn pages<S>(self, observations: S) -> impl Stream<Item = Page>
    where
        S: Stream<Item = Vec<ObservedNode>> + Unpin,
    {
        stream::unfold((self, observations), |(mut batcher, mut observations)| async move {
            while let Some(nodes) = observations.next().await {
                if let Some(page) = batcher.on_observation(&nodes) {
                    return Some((page, (batcher, observations)));
                }
            }
            None
        })
    }
}
