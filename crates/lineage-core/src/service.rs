//! Lineage service
//!
//! Owns the published snapshot, the override log and the rebuild queue.
//! Reads go through [`LineageService::query`], which pins one snapshot and
//! one override state for the lifetime of the returned view.

use crate::config::EngineConfig;
use crate::error::LineageError;
use crate::facade::LineageQuery;
use crate::published::{PublishedState, RebuildQueue, RebuildTicket, SnapshotCell};
use lineage_criticality::{
    CriticalDataHint, HintRegistry, OverrideEvent, OverrideLog, OverrideRequest, TierClassifier,
};
use lineage_graph::{GraphBuilder, GraphInput};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Input for one rebuild
#[derive(Debug, Clone, Default)]
pub struct RebuildRequest {
    /// Nodes and edges from the extraction collaborator
    pub input: GraphInput,
    /// Critical data point registry to publish alongside
    pub hints: Vec<CriticalDataHint>,
}

impl RebuildRequest {
    /// Request with no hints
    #[must_use]
    pub fn new(input: GraphInput) -> Self {
        Self {
            input,
            hints: Vec::new(),
        }
    }

    /// With hints
    #[must_use]
    pub fn with_hints(mut self, hints: impl IntoIterator<Item = CriticalDataHint>) -> Self {
        self.hints.extend(hints);
        self
    }
}

/// Lineage engine: rebuild, override, query
#[derive(Debug)]
pub struct LineageService {
    config: EngineConfig,
    builder: GraphBuilder,
    classifier: TierClassifier,
    published: SnapshotCell,
    overrides: OverrideLog,
    queue: Arc<RebuildQueue>,
}

impl LineageService {
    /// Service with no published graph (version 0)
    pub fn new(config: EngineConfig) -> Result<Self, LineageError> {
        config.validate()?;
        Ok(Self {
            classifier: TierClassifier::with_budget_multiplier(config.traversal.budget_multiplier),
            config,
            builder: GraphBuilder::new(),
            published: SnapshotCell::new(),
            overrides: OverrideLog::new(),
            queue: Arc::new(RebuildQueue::default()),
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Version of the published snapshot
    #[must_use]
    pub fn current_version(&self) -> u64 {
        self.published.load().version()
    }

    /// Currently published state
    #[must_use]
    pub fn published(&self) -> Arc<PublishedState> {
        self.published.load()
    }

    /// Read-only view over the current snapshot and override state
    #[must_use]
    pub fn query(&self) -> LineageQuery {
        LineageQuery::new(self.published.load(), self.overrides.view(), &self.config)
    }

    /// Build, classify and publish a new snapshot.
    ///
    /// Waits behind earlier rebuilds. On any failure the previously
    /// published snapshot stays in place.
    pub fn rebuild(&self, request: RebuildRequest) -> Result<Arc<PublishedState>, LineageError> {
        let ticket = self.queue.ticket();
        self.run_rebuild(ticket, request)
    }

    /// Run a rebuild on the blocking pool.
    ///
    /// The queue position is taken before spawning, so rebuilds spawned in
    /// sequence publish in that sequence.
    pub fn spawn_rebuild(
        self: &Arc<Self>,
        request: RebuildRequest,
    ) -> JoinHandle<Result<Arc<PublishedState>, LineageError>> {
        let ticket = self.queue.ticket();
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.run_rebuild(ticket, request))
    }

    /// Spawn a rebuild and wait for it
    pub async fn rebuild_in_background(
        self: &Arc<Self>,
        request: RebuildRequest,
    ) -> Result<Arc<PublishedState>, LineageError> {
        self.spawn_rebuild(request)
            .await
            .map_err(|e| LineageError::RebuildTask(e.to_string()))?
    }

    fn run_rebuild(
        &self,
        ticket: RebuildTicket,
        request: RebuildRequest,
    ) -> Result<Arc<PublishedState>, LineageError> {
        let _turn = ticket.wait();
        let previous = self.published.load().version();

        let hints = HintRegistry::from_hints(request.hints).map_err(|e| {
            error!(error = %e, kept_version = previous, "rebuild rejected");
            e
        })?;
        let pending = self.builder.prepare(request.input).map_err(|e| {
            error!(
                kind = e.kind(),
                error = %e,
                kept_version = previous,
                "rebuild rejected"
            );
            e
        })?;
        // A classification failure must not consume a version.
        let classification = self.classifier.classify(pending.snapshot()).map_err(|e| {
            error!(error = %e, kept_version = previous, "classification failed");
            e
        })?;
        let outcome = self.builder.commit(pending);

        let graph = outcome.snapshot.with_tiers(&classification.tiers());
        let state = Arc::new(PublishedState {
            graph,
            classification,
            hints,
            warnings: outcome.warnings,
            report: Some(outcome.report),
        });
        self.published.publish(Arc::clone(&state));
        info!(
            version = state.version(),
            previous,
            nodes = state.graph.node_count(),
            edges = state.graph.edge_count(),
            fields = state.classification.len(),
            hints = state.hints.len(),
            "snapshot published"
        );
        Ok(state)
    }

    /// Validate an override against the current snapshot and append it
    pub fn record_override(&self, request: OverrideRequest) -> Result<OverrideEvent, LineageError> {
        let published = self.published.load();
        if let Err(e) = request.validate(&published.graph) {
            warn!(field = %request.field_id, error = %e, "override rejected");
            return Err(e.into());
        }
        Ok(self.overrides.record(request))
    }

    /// Every override event, oldest first
    #[must_use]
    pub fn override_history(&self) -> Vec<OverrideEvent> {
        self.overrides.view().events().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_graph::{NodeRecord, NodeType, Relationship, Tier};

    fn input() -> GraphInput {
        GraphInput::new()
            .node(
                NodeRecord::new("SRC1", NodeType::SourceVariable, "HbA1c")
                    .with_attribute("variable_role", "COMPONENT"),
            )
            .node(NodeRecord::new("MTH1", NodeType::Method, "ANCOVA"))
            .node(
                NodeRecord::new("EST1", NodeType::Estimand, "Primary")
                    .with_attribute("objective_type", "PRIMARY"),
            )
            .edge("MTH1", "SRC1", Relationship::DerivedFrom)
            .edge("EST1", "MTH1", Relationship::TargetedBy)
    }

    #[test]
    fn starts_empty() {
        let service = LineageService::new(EngineConfig::default()).unwrap();
        assert_eq!(service.current_version(), 0);
        assert!(service.query().tier_table().is_empty());
    }

    #[test]
    fn rebuild_publishes_stamped_tiers() {
        let service = LineageService::new(EngineConfig::default()).unwrap();
        let state = service.rebuild(RebuildRequest::new(input())).unwrap();
        assert_eq!(state.version(), 1);
        assert_eq!(
            state.graph.get_node("SRC1").and_then(|n| n.criticality_tier),
            Some(Tier::Critical)
        );
        assert_eq!(service.current_version(), 1);
    }

    #[test]
    fn duplicate_hints_keep_prior_snapshot() {
        let service = LineageService::new(EngineConfig::default()).unwrap();
        service.rebuild(RebuildRequest::new(input())).unwrap();
        let err = service
            .rebuild(RebuildRequest::new(input()).with_hints([
                CriticalDataHint::new("CDP-1", "a"),
                CriticalDataHint::new("CDP-1", "b"),
            ]))
            .unwrap_err();
        assert!(err.is_build_failure());
        assert_eq!(service.current_version(), 1);
    }

    #[test]
    fn classification_carries_the_committed_version() {
        let service = LineageService::new(EngineConfig::default()).unwrap();
        service.rebuild(RebuildRequest::new(input())).unwrap();
        let cyclic = input().edge("SRC1", "EST1", Relationship::DerivedFrom);
        assert!(service.rebuild(RebuildRequest::new(cyclic)).is_err());

        let state = service.rebuild(RebuildRequest::new(input())).unwrap();
        assert_eq!(state.version(), 2);
        assert_eq!(state.classification.version(), 2);
        assert_eq!(state.report.as_ref().map(|r| r.version), Some(2));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig::default().with_low_confidence_threshold(-0.1);
        assert!(matches!(LineageService::new(config), Err(LineageError::Config(_))));
    }

    #[test]
    fn override_on_unknown_field_is_rejected() {
        let service = LineageService::new(EngineConfig::default()).unwrap();
        service.rebuild(RebuildRequest::new(input())).unwrap();
        let request = OverrideRequest::set("NOPE", 2, "analyst", "typo").unwrap();
        assert!(matches!(
            service.record_override(request),
            Err(LineageError::Override(_))
        ));
        assert!(service.override_history().is_empty());
    }
}
