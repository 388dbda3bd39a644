//! Query Facade
//!
//! Read-only API over one published snapshot and one override state. A
//! [`LineageQuery`] never observes a rebuild or override that lands after
//! it was created; take a fresh one from the service to see newer data.

use crate::config::EngineConfig;
use crate::error::LineageError;
use crate::published::PublishedState;
use lineage_criticality::{
    assess, trace_field, CoverageReport, CoverageReporter, CriticalityMapping, OverrideEvent,
    OverrideState, TierAssessment, TierDivergenceNotice,
};
use lineage_graph::{BuildWarning, Direction, GraphSnapshot, NodeId, NodeType, Tier, Traversal};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Consistent read view
#[derive(Debug, Clone)]
pub struct LineageQuery {
    state: Arc<PublishedState>,
    overrides: Arc<OverrideState>,
    reporter: CoverageReporter,
    budget_multiplier: usize,
}

impl LineageQuery {
    pub(crate) fn new(
        state: Arc<PublishedState>,
        overrides: Arc<OverrideState>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            state,
            overrides,
            reporter: CoverageReporter::new(config.coverage.low_confidence_threshold),
            budget_multiplier: config.traversal.budget_multiplier,
        }
    }

    /// Snapshot version this view reads
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.version()
    }

    /// Published graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &GraphSnapshot {
        &self.state.graph
    }

    /// Non-fatal findings from the build that produced this snapshot
    #[must_use]
    pub fn build_warnings(&self) -> &[BuildWarning] {
        &self.state.warnings
    }

    fn traversal(&self) -> Traversal<'_> {
        Traversal::with_budget_multiplier(&self.state.graph, self.budget_multiplier)
    }

    fn effective_tier(&self, field_id: &str) -> Option<Tier> {
        let derived = self.state.classification.derived_tier(field_id)?;
        Some(self.overrides.override_tier(field_id).unwrap_or(derived))
    }

    /// Criticality mapping for a field; `None` for unknown or non-field ids
    #[must_use]
    pub fn lineage_trace(&self, field_id: &str) -> Option<CriticalityMapping> {
        trace_field(
            &self.state.graph,
            &self.state.classification,
            &self.overrides,
            &self.state.hints,
            field_id,
        )
    }

    /// Source-level fields feeding an estimand; empty for non-estimands
    pub fn impact_set(&self, estimand_id: &str) -> Result<BTreeSet<NodeId>, LineageError> {
        match self.state.graph.get_node(estimand_id) {
            Some(node) if node.node_type == NodeType::Estimand => {
                Ok(self.traversal().upstream_sources(estimand_id)?)
            }
            _ => Ok(BTreeSet::new()),
        }
    }

    /// Estimands a node feeds
    pub fn impacted_estimands(&self, id: &str) -> Result<BTreeSet<NodeId>, LineageError> {
        Ok(self.traversal().impacted_estimands(id)?)
    }

    /// Coverage of the published hint registry, using effective tiers
    #[must_use]
    pub fn coverage_report(&self) -> CoverageReport {
        self.reporter
            .report(&self.state.hints, &self.state.graph, |id| self.effective_tier(id.as_str()))
    }

    /// Effective tier for every classified field, ordered by field id
    #[must_use]
    pub fn tier_table(&self) -> Vec<(NodeId, Tier)> {
        self.state
            .classification
            .iter()
            .filter_map(|d| {
                self.effective_tier(d.field_id.as_str())
                    .map(|tier| (d.field_id.clone(), tier))
            })
            .collect()
    }

    /// Derived, override and effective tier per field
    #[must_use]
    pub fn tier_assessments(&self) -> Vec<TierAssessment> {
        assess(&self.state.classification, &self.overrides)
    }

    /// Fields whose active override disagrees with the derived tier
    #[must_use]
    pub fn divergence_notices(&self) -> Vec<TierDivergenceNotice> {
        self.tier_assessments()
            .into_iter()
            .filter_map(|a| a.divergence)
            .collect()
    }

    /// Override events for one field, oldest first
    #[must_use]
    pub fn override_history(&self, field_id: &str) -> Vec<OverrideEvent> {
        self.overrides.history(field_id).cloned().collect()
    }

    /// One-hop neighbours for highlighting
    #[must_use]
    pub fn neighbors(&self, id: &str) -> BTreeSet<NodeId> {
        self.traversal().neighbors(id)
    }

    /// Nodes within `max_hops` of `id`, with hop distance
    pub fn reachable_within(
        &self,
        id: &str,
        direction: Direction,
        max_hops: usize,
    ) -> Result<BTreeMap<NodeId, usize>, LineageError> {
        Ok(self.traversal().reachable_within(id, direction, max_hops)?)
    }

    /// Deterministic path between two nodes; `None` when unconnected
    pub fn canonical_path(&self, from: &str, to: &str) -> Result<Option<Vec<NodeId>>, LineageError> {
        let path = self.traversal().canonical_path(from, to)?;
        debug!(version = self.version(), from, to, found = path.is_some(), "canonical path");
        Ok(path)
    }
}
