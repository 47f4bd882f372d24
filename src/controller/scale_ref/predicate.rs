//! Turns autoscaler watch events into label events.

use super::LabelEvent;
use crate::store::ObjectKey;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Remembers the last seen autoscalers so updates can be compared
#[derive(Debug, Default)]
pub struct LabelEventSource {
    known: HashMap<ObjectKey, Arc<HorizontalPodAutoscaler>>,
    /// Keys listed since the current relist started
    relisted: Option<HashSet<ObjectKey>>,
}

fn key_of(autoscaler: &HorizontalPodAutoscaler) -> ObjectKey {
    ObjectKey {
        namespace: autoscaler.metadata.namespace.clone(),
        name: autoscaler.metadata.name.clone().unwrap_or_default(),
    }
}

fn same_target(old: &HorizontalPodAutoscaler, new: &HorizontalPodAutoscaler) -> bool {
    let target = |hpa: &HorizontalPodAutoscaler| hpa.spec.as_ref().map(|spec| spec.scale_target_ref.clone());
    target(old) == target(new)
}

impl LabelEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events for a created, updated or relisted autoscaler
    ///
    /// A first sighting adds the label. An update that moved the scale
    /// target removes the label from the old target before adding it to the
    /// new one. Other updates emit nothing.
    pub fn on_apply(&mut self, autoscaler: HorizontalPodAutoscaler) -> Vec<LabelEvent> {
        let autoscaler = Arc::new(autoscaler);
        let key = key_of(&autoscaler);
        if let Some(relisted) = self.relisted.as_mut() {
            relisted.insert(key.clone());
        }
        match self.known.insert(key, Arc::clone(&autoscaler)) {
            None => vec![LabelEvent::add(autoscaler)],
            Some(old) if !same_target(&old, &autoscaler) => {
                vec![LabelEvent::delete(old), LabelEvent::add(autoscaler)]
            }
            Some(_) => Vec::new(),
        }
    }

    /// Events for a deleted autoscaler
    pub fn on_delete(&mut self, autoscaler: HorizontalPodAutoscaler) -> Vec<LabelEvent> {
        self.known.remove(&key_of(&autoscaler));
        vec![LabelEvent::delete(Arc::new(autoscaler))]
    }

    /// A relist started; autoscalers it does not list again are deleted
    pub fn on_relist_start(&mut self) {
        self.relisted = Some(HashSet::new());
    }

    /// A relist finished; delete events for autoscalers that vanished while
    /// the watch was down, ordered by key
    pub fn on_relist_done(&mut self) -> Vec<LabelEvent> {
        let Some(relisted) = self.relisted.take() else {
            return Vec::new();
        };
        let mut gone: Vec<ObjectKey> = self
            .known
            .keys()
            .filter(|key| !relisted.contains(*key))
            .cloned()
            .collect();
        gone.sort();
        gone.into_iter()
            .filter_map(|key| self.known.remove(&key))
            .map(LabelEvent::delete)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
