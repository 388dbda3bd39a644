//! Coverage Reporter
//!
//! Compares the hint registry against the fields present in a snapshot.
//!
//! External-source-only hints (resolved only to non-CRF placeholder nodes
//! such as IXRS values) are NOT counted as mapped: they stay in the
//! denominator and are listed as unmapped with reason
//! `EXTERNAL_SOURCE_ONLY`. The count is reported separately so a consumer
//! can present them distinctly.

use crate::hints::{CriticalDataHint, HintMapping, HintRegistry};
use lineage_graph::{GraphSnapshot, NodeId, Tier};
use serde::Serialize;
use tracing::debug;

/// Default confidence below which a candidate awaits analyst review
pub const DEFAULT_LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Why a hint has no CRF mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnmappedReason {
    /// No candidate field exists in the graph
    NoCrfField,
    /// Only external-source placeholders were found
    ExternalSourceOnly,
    /// Candidates exist but all fall below the confidence threshold
    LowConfidencePendingReview,
}

/// How one hint resolved against the graph
#[derive(Debug, Clone, PartialEq)]
pub enum HintResolution {
    /// Confident CRF fields, in registry order
    Mapped(Vec<HintMapping>),
    /// Confident candidates exist but all are external placeholders
    ExternalSourceOnly(Vec<HintMapping>),
    /// Candidates exist in the graph but none is confident enough
    LowConfidence {
        /// Highest confidence seen
        best_confidence: f64,
    },
    /// No candidate exists in the graph
    NoCrfField,
}

impl HintResolution {
    /// Reason for non-mapped outcomes
    #[must_use]
    pub fn unmapped_reason(&self) -> Option<UnmappedReason> {
        match self {
            HintResolution::Mapped(_) => None,
            HintResolution::ExternalSourceOnly(_) => Some(UnmappedReason::ExternalSourceOnly),
            HintResolution::LowConfidence { .. } => Some(UnmappedReason::LowConfidencePendingReview),
            HintResolution::NoCrfField => Some(UnmappedReason::NoCrfField),
        }
    }
}

/// Unmapped hint with diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmappedItem {
    /// Hint id
    pub hint_id: String,
    /// Classification
    pub reason: UnmappedReason,
    /// Human-readable diagnostic
    pub detail: String,
    /// Placeholder nodes for external-source hints
    pub external_fields: Vec<NodeId>,
    /// Highest candidate confidence, when candidates exist
    pub best_confidence: Option<f64>,
}

/// Mapped hints per most-critical effective tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierBreakdown {
    /// Hints whose most critical field is tier 1
    pub tier_1: usize,
    /// Hints whose most critical field is tier 2
    pub tier_2: usize,
    /// Hints whose most critical field is tier 3
    pub tier_3: usize,
    /// Mapped hints with no classified field
    pub unclassified: usize,
}

impl TierBreakdown {
    fn count(&mut self, tier: Option<Tier>) {
        match tier {
            Some(Tier::Critical) => self.tier_1 += 1,
            Some(Tier::Important) => self.tier_2 += 1,
            Some(Tier::Supportive) => self.tier_3 += 1,
            None => self.unclassified += 1,
        }
    }
}

/// Coverage of the hint registry by the current snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    /// Snapshot the report was computed from
    pub snapshot_version: u64,
    /// Hints in the registry
    pub total_hints: usize,
    /// Hints resolved to at least one confident CRF field
    pub mapped_count: usize,
    /// `mapped_count / total_hints * 100`; 0 for an empty registry
    pub coverage_percentage: f64,
    /// Hints resolved only to external-source placeholders
    pub external_source_count: usize,
    /// Mapped hints by effective tier
    pub tier_breakdown: TierBreakdown,
    /// Every hint that is not mapped, in registry order
    pub unmapped_items: Vec<UnmappedItem>,
}

/// Stateless coverage reporter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageReporter {
    low_confidence_threshold: f64,
}

impl CoverageReporter {
    /// Reporter with an analyst-chosen confidence threshold, clamped to [0, 1]
    #[must_use]
    pub fn new(low_confidence_threshold: f64) -> Self {
        Self {
            low_confidence_threshold: low_confidence_threshold.clamp(0.0, 1.0),
        }
    }

    /// Configured threshold
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.low_confidence_threshold
    }

    /// Resolve one hint against the graph
    #[must_use]
    pub fn resolve(&self, hint: &CriticalDataHint, graph: &GraphSnapshot) -> HintResolution {
        let present: Vec<&HintMapping> = hint
            .candidates
            .iter()
            .filter(|c| {
                graph
                    .get_node(c.node_id.as_str())
                    .is_some_and(|n| n.node_type.is_source_level())
            })
            .collect();
        if present.is_empty() {
            return HintResolution::NoCrfField;
        }

        let confident: Vec<&HintMapping> = present
            .iter()
            .copied()
            .filter(|c| c.confidence >= self.low_confidence_threshold)
            .collect();
        if confident.is_empty() {
            let best_confidence = present.iter().map(|c| c.confidence).fold(0.0, f64::max);
            return HintResolution::LowConfidence { best_confidence };
        }

        let (external, crf): (Vec<&HintMapping>, Vec<&HintMapping>) =
            confident.into_iter().partition(|c| {
                graph
                    .get_node(c.node_id.as_str())
                    .is_some_and(lineage_graph::Node::is_external_source)
            });
        if crf.is_empty() {
            HintResolution::ExternalSourceOnly(external.into_iter().cloned().collect())
        } else {
            HintResolution::Mapped(crf.into_iter().cloned().collect())
        }
    }

    /// Full coverage report.
    ///
    /// `effective_tier` supplies the tier a field currently carries
    /// (derived or overridden); each mapped hint is attributed the most
    /// critical tier among its fields.
    #[must_use]
    pub fn report(
        &self,
        registry: &HintRegistry,
        graph: &GraphSnapshot,
        effective_tier: impl Fn(&NodeId) -> Option<Tier>,
    ) -> CoverageReport {
        let mut mapped_count = 0;
        let mut external_source_count = 0;
        let mut tier_breakdown = TierBreakdown::default();
        let mut unmapped_items = Vec::new();

        for hint in registry.iter() {
            let resolution = self.resolve(hint, graph);
            match &resolution {
                HintResolution::Mapped(fields) => {
                    mapped_count += 1;
                    let tier = fields.iter().filter_map(|f| effective_tier(&f.node_id)).min();
                    tier_breakdown.count(tier);
                }
                HintResolution::ExternalSourceOnly(fields) => {
                    external_source_count += 1;
                    unmapped_items.push(UnmappedItem {
                        hint_id: hint.id.clone(),
                        reason: UnmappedReason::ExternalSourceOnly,
                        detail: format!(
                            "collected outside the CRF ({})",
                            fields
                                .iter()
                                .filter_map(|f| graph.get_node(f.node_id.as_str()))
                                .map(|n| n.collection_source())
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                        external_fields: fields.iter().map(|f| f.node_id.clone()).collect(),
                        best_confidence: best(&hint.candidates),
                    });
                }
                HintResolution::LowConfidence { best_confidence } => {
                    unmapped_items.push(UnmappedItem {
                        hint_id: hint.id.clone(),
                        reason: UnmappedReason::LowConfidencePendingReview,
                        detail: format!(
                            "best candidate confidence {best_confidence:.2} below threshold {:.2}",
                            self.low_confidence_threshold
                        ),
                        external_fields: Vec::new(),
                        best_confidence: Some(*best_confidence),
                    });
                }
                HintResolution::NoCrfField => {
                    unmapped_items.push(UnmappedItem {
                        hint_id: hint.id.clone(),
                        reason: UnmappedReason::NoCrfField,
                        detail: if hint.candidates.is_empty() {
                            "no candidate field proposed".to_owned()
                        } else {
                            "no candidate field exists in the current graph".to_owned()
                        },
                        external_fields: Vec::new(),
                        best_confidence: best(&hint.candidates),
                    });
                }
            }
        }

        let total_hints = registry.len();
        let coverage_percentage = if total_hints == 0 {
            0.0
        } else {
            mapped_count as f64 / total_hints as f64 * 100.0
        };
        debug!(
            version = graph.version(),
            total_hints,
            mapped_count,
            coverage_percentage,
            "coverage computed"
        );

        CoverageReport {
            snapshot_version: graph.version(),
            total_hints,
            mapped_count,
            coverage_percentage,
            external_source_count,
            tier_breakdown,
            unmapped_items,
        }
    }
}

impl Default for CoverageReporter {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_CONFIDENCE_THRESHOLD)
    }
}

fn best(candidates: &[HintMapping]) -> Option<f64> {
    candidates.iter().map(|c| c.confidence).reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_graph::{GraphBuilder, GraphInput, NodeRecord, NodeType};

    fn graph() -> GraphSnapshot {
        let input = GraphInput::new()
            .node(NodeRecord::new("VS.SYSBP", NodeType::SourceVariable, "Systolic BP"))
            .node(
                NodeRecord::new("IXRS.RANDDT", NodeType::SourceVariable, "Randomization date")
                    .with_attribute("collection_source", "IXRS"),
            )
            .node(NodeRecord::new("MMRM", NodeType::Method, "MMRM"));
        GraphBuilder::new().build(input).unwrap().snapshot
    }

    #[test]
    fn resolves_each_outcome() {
        let g = graph();
        let reporter = CoverageReporter::new(0.7);

        let crf = CriticalDataHint::new("A", "BP").candidate(HintMapping::new("VS.SYSBP", 0.9));
        assert!(matches!(reporter.resolve(&crf, &g), HintResolution::Mapped(f) if f.len() == 1));

        let ext = CriticalDataHint::new("B", "Rand date").candidate(HintMapping::new("IXRS.RANDDT", 0.95));
        assert!(matches!(reporter.resolve(&ext, &g), HintResolution::ExternalSourceOnly(_)));

        let low = CriticalDataHint::new("C", "BP?").candidate(HintMapping::new("VS.SYSBP", 0.4));
        assert_eq!(reporter.resolve(&low, &g), HintResolution::LowConfidence { best_confidence: 0.4 });

        let none = CriticalDataHint::new("D", "Ghost").candidate(HintMapping::new("XX.GHOST", 0.99));
        assert_eq!(reporter.resolve(&none, &g), HintResolution::NoCrfField);

        // Methods are not fields
        let method = CriticalDataHint::new("E", "Model").candidate(HintMapping::new("MMRM", 0.99));
        assert_eq!(reporter.resolve(&method, &g), HintResolution::NoCrfField);
    }

    #[test]
    fn confident_crf_wins_over_external() {
        let g = graph();
        let hint = CriticalDataHint::new("A", "Either")
            .candidate(HintMapping::new("IXRS.RANDDT", 0.95))
            .candidate(HintMapping::new("VS.SYSBP", 0.8));
        let HintResolution::Mapped(fields) = CoverageReporter::default().resolve(&hint, &g) else {
            panic!("expected a CRF mapping");
        };
        assert_eq!(fields[0].node_id, NodeId::new("VS.SYSBP"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let g = graph();
        let hint = CriticalDataHint::new("A", "BP").candidate(HintMapping::new("VS.SYSBP", 0.7));
        assert!(matches!(
            CoverageReporter::new(0.7).resolve(&hint, &g),
            HintResolution::Mapped(_)
        ));
    }

    #[test]
    fn empty_registry_reports_zero() {
        let report = CoverageReporter::default().report(&HintRegistry::new(), &graph(), |_| None);
        assert_eq!(report.total_hints, 0);
        assert_eq!(report.coverage_percentage, 0.0);
    }

    #[test]
    fn breakdown_uses_most_critical_field() {
        let g = graph();
        let registry = HintRegistry::from_hints([CriticalDataHint::new("A", "BP")
            .candidate(HintMapping::new("VS.SYSBP", 0.9))])
        .unwrap();
        let report = CoverageReporter::default().report(&registry, &g, |id| {
            (id.as_str() == "VS.SYSBP").then_some(Tier::Important)
        });
        assert_eq!(report.tier_breakdown.tier_2, 1);
        assert_eq!(report.coverage_percentage, 100.0);
    }

    #[test]
    fn unmapped_items_explain_each_gap() {
        let g = graph();
        let registry = HintRegistry::from_hints([
            CriticalDataHint::new("LOW", "BP?").candidate(HintMapping::new("VS.SYSBP", 0.4)),
            CriticalDataHint::new("GHOST", "Retired form")
                .candidate(HintMapping::new("XX.GHOST", 0.99))
                .candidate(HintMapping::new("MMRM", 0.6)),
            CriticalDataHint::new("BARE", "Protocol-only concept"),
        ])
        .unwrap();
        let report = CoverageReporter::new(0.7).report(&registry, &g, |_| None);

        assert_eq!(report.mapped_count, 0);
        assert_eq!(report.coverage_percentage, 0.0);
        assert_eq!(report.external_source_count, 0);
        let items: Vec<_> = report
            .unmapped_items
            .iter()
            .map(|i| (i.hint_id.as_str(), i.reason, i.detail.as_str(), i.best_confidence))
            .collect();
        assert_eq!(
            items,
            vec![
                (
                    "LOW",
                    UnmappedReason::LowConfidencePendingReview,
                    "best candidate confidence 0.40 below threshold 0.70",
                    Some(0.4),
                ),
                (
                    "GHOST",
                    UnmappedReason::NoCrfField,
                    "no candidate field exists in the current graph",
                    Some(0.99),
                ),
                ("BARE", UnmappedReason::NoCrfField, "no candidate field proposed", None),
            ]
        );
        assert!(report.unmapped_items.iter().all(|i| i.external_fields.is_empty()));
    }
}
