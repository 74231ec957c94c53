//! Recommendation Filter Pipeline.
//!
//! A submitted page is locked at once and judged by a single batch request
//! under one criteria snapshot. Outcomes apply all-or-nothing: a failed or
//! malformed reply leaves every item of the page locked.

use std::collections::HashMap;

use feedwarden_classifier::{BatchEntry, ClassifyError, ShownSet};
use feedwarden_store::Criteria;
use tracing::{debug, warn};

use crate::effect::{Effect, IndicatorTarget};
use crate::error::{EngineError, EngineResult};
use crate::item::{ListKind, Outcome, OutcomeMap, Page, PageId};

/// One batch classification to dispatch for a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRequest {
    pub list: ListKind,
    pub page_id: PageId,
    pub criteria: Criteria,
    pub batch: Vec<BatchEntry>,
}

/// How a completed page ended.
#[derive(Debug)]
pub enum PageDisposition {
    Applied(OutcomeMap),
    /// Items stay locked and hidden.
    Locked(EngineError),
}

impl PageDisposition {
    pub fn is_applied(&self) -> bool {
        matches!(self, PageDisposition::Applied(_))
    }
}

/// Map a shown set onto every item of the page; absent ids are hidden.
pub fn outcomes_for(page: &Page, shown: &ShownSet) -> OutcomeMap {
    page.items()
        .iter()
        .map(|item| {
            let outcome = match shown.reason_for(&item.id.to_string()) {
                Some(reason) => Outcome::shown(reason),
                None => Outcome::hidden(),
            };
            (item.id, outcome)
        })
        .collect()
}

#[derive(Default)]
pub struct FilterPipeline {
    in_flight: HashMap<(ListKind, PageId), Page>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pages awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn in_flight_for(&self, list: ListKind) -> usize {
        self.in_flight.keys().filter(|(l, _)| *l == list).count()
    }

    /// Lock the page and build its single batch request.
    pub fn submit(&mut self, page: Page, criteria: &Criteria) -> (Vec<Effect>, FilterRequest) {
        let list = page.list();
        let mut effects = vec![Effect::LockItems {
            list,
            ids: page.ids(),
        }];
        if self.in_flight_for(list) == 0 {
            effects.push(Effect::ShowAnalyzing {
                target: IndicatorTarget::from(list),
            });
        }

        let request = FilterRequest {
            list,
            page_id: page.id(),
            criteria: criteria.clone(),
            batch: page
                .items()
                .iter()
                .map(|item| BatchEntry::new(item.id.to_string(), item.title.clone()))
                .collect(),
        };
        debug!(list = %list, page_id = %page.id(), items = page.len(), "page submitted");
        self.in_flight.insert((list, page.id()), page);
        (effects, request)
    }

    /// Resolve an in-flight page with its classifier reply.
    pub fn complete(
        &mut self,
        list: ListKind,
        page_id: PageId,
        result: Result<ShownSet, ClassifyError>,
    ) -> EngineResult<(PageDisposition, Vec<Effect>)> {
        let page = self
            .in_flight
            .remove(&(list, page_id))
            .ok_or_else(|| EngineError::transition(format!("{list}/{page_id}"), "completed"))?;

        let mut effects = Vec::new();
        let disposition = match result {
            Ok(shown) => {
                let outcomes = outcomes_for(&page, &shown);
                effects.push(Effect::ApplyOutcomes {
                    list,
                    outcomes: outcomes.clone(),
                });
                PageDisposition::Applied(outcomes)
            }
            Err(err) => {
                warn!(list = %list, page_id = %page_id, error = %err, "page left locked");
                PageDisposition::Locked(err.into())
            }
        };
        if self.in_flight_for(list) == 0 {
            effects.push(Effect::HideAnalyzing {
                target: IndicatorTarget::from(list),
            });
        }
        Ok((disposition, effects))
    }

    /// Forget every in-flight page.
    pub fn clear(&mut self) {
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batcher::{MutationBatcher, PageHeuristic};
    use crate::item::{ItemId, ObservedNode};
    use feedwarden_classifier::ShownEntry;

    fn page_of(n: usize) -> Page {
        let nodes: Vec<ObservedNode> = (0..n as u64)
            .map(|i| ObservedNode::new(i, format!("t{i}")))
            .collect();
        MutationBatcher::new(
            ListKind::Recommendations,
            PageHeuristic::ChunkSizes(vec![n]),
        )
        .on_observation(&nodes)
        .unwrap()
    }

    fn shown(ids: &[u64]) -> ShownSet {
        ShownSet::new(
            ids.iter()
                .map(|n| ShownEntry {
                    id: format!("video-{n}"),
                    reason: format!("reason {n}"),
                })
                .collect(),
        )
    }

    #[test]
    fn test_submit_locks_whole_page_in_one_request() {
        let mut pipeline = FilterPipeline::new();
        let criteria = Criteria::new("cooking tutorials", "pranks");
        let (effects, request) = pipeline.submit(page_of(3), &criteria);
        assert_eq!(
            effects[0],
            Effect::LockItems {
                list: ListKind::Recommendations,
                ids: vec![ItemId::new(1), ItemId::new(2), ItemId::new(3)],
            }
        );
        assert_eq!(request.batch.len(), 3);
        assert_eq!(request.batch[0].id, "video-1");
        assert_eq!(request.criteria, criteria);
        assert_eq!(pipeline.in_flight(), 1);
    }

    #[test]
    fn test_absent_ids_are_hidden_without_reason() {
        let mut pipeline = FilterPipeline::new();
        let (_, request) = pipeline.submit(page_of(4), &Criteria::new("a", ""));
        let (disposition, effects) = pipeline
            .complete(request.list, request.page_id, Ok(shown(&[2, 4, 99])))
            .unwrap();
        let PageDisposition::Applied(outcomes) = disposition else {
            panic!("expected outcomes");
        };
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[&ItemId::new(2)], Outcome::shown("reason 2"));
        assert_eq!(outcomes[&ItemId::new(1)], Outcome::hidden());
        assert!(effects.contains(&Effect::HideAnalyzing {
            target: IndicatorTarget::Recommendations
        }));
    }

    #[test]
    fn test_failure_applies_nothing() {
        for err in [
            ClassifyError::Malformed("not json".into()),
            ClassifyError::Transport("reset".into()),
            ClassifyError::RateLimit,
        ] {
            let mut pipeline = FilterPipeline::new();
            let (_, request) = pipeline.submit(page_of(5), &Criteria::new("a", ""));
            let (disposition, effects) = pipeline
                .complete(request.list, request.page_id, Err(err))
                .unwrap();
            assert!(!disposition.is_applied());
            assert!(effects
                .iter()
                .all(|e| !matches!(e, Effect::ApplyOutcomes { .. })));
        }
    }

    #[test]
    fn test_unknown_page_is_rejected() {
        let mut pipeline = FilterPipeline::new();
        let result = pipeline.complete(ListKind::Feed, PageId(7), Ok(shown(&[])));
        assert!(matches!(result, Err(EngineError::InvalidTransition { .. })));
    }
}
