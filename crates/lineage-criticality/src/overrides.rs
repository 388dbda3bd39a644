//! Analyst tier overrides
//!
//! Overrides are append-only audit events. The derived tier is never
//! overwritten: callers read an effective tier (override if present, else
//! derived) and a [`TierDivergenceNotice`] whenever the two disagree.
//!
//! [`OverrideLog`] is a single-writer log with a published read cursor.
//! Appends are serialised by a writer lock and build the next
//! [`OverrideState`] off to the side (persistent `im` structures make this a
//! cheap structural-sharing copy); publishing swaps one `Arc`. A reader
//! holding an `OverrideState` sees a consistent cut of the log.

use crate::classifier::Classification;
use crate::error::OverrideError;
use chrono::{DateTime, Utc};
use lineage_graph::{GraphSnapshot, NodeId, Tier};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// What an override event does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "tier", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideAction {
    /// Pin the field to a tier
    Set(Tier),
    /// Withdraw any earlier override; the derived tier applies again
    Clear,
}

/// Request to append an override event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRequest {
    /// Target field
    pub field_id: NodeId,
    /// Set or clear
    pub action: OverrideAction,
    /// Analyst recording the decision
    pub analyst: String,
    /// Free-text justification
    pub rationale: String,
}

impl OverrideRequest {
    /// Request pinning `field_id` to `tier` (1..=3)
    pub fn set(
        field_id: impl Into<NodeId>,
        tier: u8,
        analyst: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Result<Self, OverrideError> {
        Ok(Self {
            field_id: field_id.into(),
            action: OverrideAction::Set(Tier::try_from(tier)?),
            analyst: analyst.into(),
            rationale: rationale.into(),
        })
    }

    /// Request clearing the override on `field_id`
    #[must_use]
    pub fn clear(
        field_id: impl Into<NodeId>,
        analyst: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            field_id: field_id.into(),
            action: OverrideAction::Clear,
            analyst: analyst.into(),
            rationale: rationale.into(),
        }
    }

    /// Check the request against the snapshot it will be read with
    pub fn validate(&self, graph: &GraphSnapshot) -> Result<(), OverrideError> {
        if self.analyst.trim().is_empty() {
            return Err(OverrideError::MissingAnalyst(self.field_id.clone()));
        }
        let node = graph
            .get_node(self.field_id.as_str())
            .ok_or_else(|| OverrideError::UnknownField(self.field_id.clone()))?;
        if !node.node_type.is_source_level() {
            return Err(OverrideError::NotTiered {
                field_id: self.field_id.clone(),
                node_type: node.node_type,
            });
        }
        Ok(())
    }
}

/// Recorded override event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideEvent {
    /// Event id
    pub id: Uuid,
    /// Position in the log, starting at 1
    pub sequence: u64,
    /// Target field
    pub field_id: NodeId,
    /// Set or clear
    #[serde(flatten)]
    pub action: OverrideAction,
    /// Analyst recording the decision
    pub analyst: String,
    /// Free-text justification
    pub rationale: String,
    /// When it was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Immutable cut of the override log
#[derive(Debug, Clone, Default)]
pub struct OverrideState {
    events: im::Vector<OverrideEvent>,
    latest: im::HashMap<NodeId, OverrideEvent>,
}

impl OverrideState {
    /// Read cursor: number of events visible in this state
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.events.len() as u64
    }

    /// Active override for a field, if the latest event for it is a `Set`
    #[must_use]
    pub fn active(&self, field_id: &str) -> Option<&OverrideEvent> {
        self.latest
            .get(field_id)
            .filter(|e| matches!(e.action, OverrideAction::Set(_)))
    }

    /// Active override tier for a field
    #[must_use]
    pub fn override_tier(&self, field_id: &str) -> Option<Tier> {
        self.active(field_id).and_then(|e| match e.action {
            OverrideAction::Set(tier) => Some(tier),
            OverrideAction::Clear => None,
        })
    }

    /// Every event, oldest first
    pub fn events(&self) -> impl Iterator<Item = &OverrideEvent> + '_ {
        self.events.iter()
    }

    /// Events for one field, oldest first
    pub fn history<'a>(&'a self, field_id: &'a str) -> impl Iterator<Item = &'a OverrideEvent> + 'a {
        self.events
            .iter()
            .filter(move |e| e.field_id.as_str() == field_id)
    }

    fn appended(&self, event: OverrideEvent) -> Self {
        let mut next = self.clone();
        next.latest.insert(event.field_id.clone(), event.clone());
        next.events.push_back(event);
        next
    }
}

/// Append-only override log with a published read cursor
#[derive(Debug, Default)]
pub struct OverrideLog {
    writer: Mutex<()>,
    published: RwLock<Arc<OverrideState>>,
}

impl OverrideLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current published state
    #[must_use]
    pub fn view(&self) -> Arc<OverrideState> {
        Arc::clone(&self.published.read())
    }

    /// Append an event and publish the new state
    pub fn record(&self, request: OverrideRequest) -> OverrideEvent {
        let _writer = self.writer.lock();
        let current = self.view();
        let event = OverrideEvent {
            id: Uuid::new_v4(),
            sequence: current.cursor() + 1,
            field_id: request.field_id,
            action: request.action,
            analyst: request.analyst,
            rationale: request.rationale,
            recorded_at: Utc::now(),
        };
        let next = Arc::new(current.appended(event.clone()));
        *self.published.write() = next;
        info!(
            field = %event.field_id,
            sequence = event.sequence,
            action = ?event.action,
            analyst = %event.analyst,
            "tier override recorded"
        );
        event
    }
}

/// Derived and override tiers disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierDivergenceNotice {
    /// Field in question
    pub field_id: NodeId,
    /// Tier derived from the graph
    pub derived_tier: Tier,
    /// Tier pinned by the analyst
    pub override_tier: Tier,
    /// Event that set the override
    pub override_event_id: Uuid,
    /// Analyst who set it
    pub analyst: String,
}

/// Derived, override and effective tier for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierAssessment {
    /// Field id
    pub field_id: NodeId,
    /// Tier derived from the graph
    pub derived_tier: Tier,
    /// Active analyst override
    pub override_tier: Option<Tier>,
    /// Override if present, else derived
    pub effective_tier: Tier,
    /// Present when override and derived tier differ
    pub divergence: Option<TierDivergenceNotice>,
}

/// Assess one classified field against the override state
#[must_use]
pub fn assess_field(
    classification: &Classification,
    overrides: &OverrideState,
    field_id: &str,
) -> Option<TierAssessment> {
    let derived_tier = classification.derived_tier(field_id)?;
    let active = overrides.active(field_id);
    let override_tier = overrides.override_tier(field_id);
    let divergence = match (active, override_tier) {
        (Some(event), Some(tier)) if tier != derived_tier => Some(TierDivergenceNotice {
            field_id: event.field_id.clone(),
            derived_tier,
            override_tier: tier,
            override_event_id: event.id,
            analyst: event.analyst.clone(),
        }),
        _ => None,
    };
    Some(TierAssessment {
        field_id: NodeId::new(field_id),
        derived_tier,
        override_tier,
        effective_tier: override_tier.unwrap_or(derived_tier),
        divergence,
    })
}

/// Assess every classified field, ordered by field id.
///
/// Overrides naming fields absent from `classification` are ignored: ids
/// superseded by a rebuild carry no tier.
#[must_use]
pub fn assess(classification: &Classification, overrides: &OverrideState) -> Vec<TierAssessment> {
    let assessments: Vec<TierAssessment> = classification
        .iter()
        .filter_map(|d| assess_field(classification, overrides, d.field_id.as_str()))
        .collect();
    for notice in assessments.iter().filter_map(|a| a.divergence.as_ref()) {
        warn!(
            field = %notice.field_id,
            derived = notice.derived_tier.as_u8(),
            override_tier = notice.override_tier.as_u8(),
            "tier override diverges from derived tier"
        );
    }
    assessments
}
