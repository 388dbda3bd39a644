//! Criticality mapping assembly
//!
//! Joins one field's derived tier, active override, hint mappings and
//! lineage into the record returned by `lineage_trace`. Nothing here is
//! stored; a mapping is recomputed from the snapshot it names.

use crate::classifier::Classification;
use crate::hints::{HintMapping, HintRegistry};
use crate::overrides::{assess_field, OverrideState, TierDivergenceNotice};
use lineage_graph::{attr, GraphSnapshot, Node, NodeId, Tier};
use serde::Serialize;
use std::collections::BTreeSet;

/// One data-collection location for a field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedField {
    /// Graph node
    pub node_id: NodeId,
    /// CRF form name
    pub form_name: String,
    /// Domain
    pub domain: String,
    /// Variable name
    pub variable_name: String,
    /// Mapping confidence
    pub mapping_confidence: f64,
    /// Mapping rationale
    pub mapping_rationale: String,
}

impl MappedField {
    fn from_hint(mapping: &HintMapping) -> Self {
        Self {
            node_id: mapping.node_id.clone(),
            form_name: mapping.form_name.clone(),
            domain: mapping.domain.clone(),
            variable_name: mapping.variable_name.clone(),
            mapping_confidence: mapping.confidence,
            mapping_rationale: mapping.rationale.clone(),
        }
    }

    fn from_node(node: &Node) -> Self {
        Self {
            node_id: node.id.clone(),
            form_name: node.text_attribute(attr::FORM_NAME).unwrap_or_default().to_owned(),
            domain: node.text_attribute(attr::DOMAIN).unwrap_or_default().to_owned(),
            variable_name: node
                .text_attribute(attr::VARIABLE_NAME)
                .unwrap_or(node.id.as_str())
                .to_owned(),
            mapping_confidence: 1.0,
            mapping_rationale: "declared on the graph node".to_owned(),
        }
    }
}

/// Field-centric criticality record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalityMapping {
    /// Traced field
    pub field_id: NodeId,
    /// Snapshot the record was derived from
    pub snapshot_version: u64,
    /// First registered hint naming this field
    pub source_hint_id: Option<String>,
    /// Collection locations, in hint preference order
    pub mapped_fields: Vec<MappedField>,
    /// Effective tier (override if active, else derived)
    pub criticality_tier: Tier,
    /// Tier derived from the graph
    pub derived_tier: Tier,
    /// Active analyst override
    pub override_tier: Option<Tier>,
    /// Why the field matters
    pub criticality_description: String,
    /// Consequence of an error in this field
    pub risk_if_erroneous: String,
    /// Guidance for site data collection
    pub data_collection_guidance: String,
    /// Estimands reachable from the field
    pub estimands_impacted: BTreeSet<NodeId>,
    /// Canonical path, source to estimand
    pub lineage_path: Vec<NodeId>,
    /// Present when the override disagrees with the derived tier
    pub divergence: Option<TierDivergenceNotice>,
}

/// Default narrative for a tier when the node carries none
#[must_use]
pub fn default_narrative(tier: Tier) -> (&'static str, &'static str, &'static str) {
    match tier {
        Tier::Critical => (
            "Direct input to a primary estimand",
            "Errors bias the primary efficacy conclusion",
            "Collect at every scheduled visit; source-verify 100%",
        ),
        Tier::Important => (
            "Feeds a key secondary estimand or an indirect primary analysis input",
            "Errors weaken supportive or sensitivity conclusions",
            "Collect per protocol; risk-based source verification",
        ),
        Tier::Supportive => (
            "Supports secondary or descriptive analyses only",
            "Errors have limited effect on trial conclusions",
            "Routine collection and review",
        ),
    }
}

/// Assemble the mapping for `field_id`.
///
/// Returns `None` when the field is not a classified source-level node of
/// this snapshot.
#[must_use]
pub fn trace_field(
    graph: &GraphSnapshot,
    classification: &Classification,
    overrides: &OverrideState,
    hints: &HintRegistry,
    field_id: &str,
) -> Option<CriticalityMapping> {
    let node = graph.get_node(field_id)?;
    if !node.node_type.is_source_level() {
        return None;
    }
    let derivation = classification.get(field_id)?;
    let assessment = assess_field(classification, overrides, field_id)?;

    let source_hint = hints.hints_for_field(field_id).next();
    let mapped_fields = match source_hint {
        Some(hint) => hint
            .candidates
            .iter()
            .filter(|c| {
                graph
                    .get_node(c.node_id.as_str())
                    .is_some_and(|n| n.node_type.is_source_level())
            })
            .map(MappedField::from_hint)
            .collect(),
        None => vec![MappedField::from_node(node)],
    };

    let (description, risk, guidance) = default_narrative(assessment.effective_tier);
    let narrative = |key: &str, fallback: &str| {
        node.text_attribute(key).unwrap_or(fallback).to_owned()
    };

    Some(CriticalityMapping {
        field_id: node.id.clone(),
        snapshot_version: graph.version(),
        source_hint_id: source_hint.map(|h| h.id.clone()),
        mapped_fields,
        criticality_tier: assessment.effective_tier,
        derived_tier: assessment.derived_tier,
        override_tier: assessment.override_tier,
        criticality_description: narrative(attr::CRITICALITY_DESCRIPTION, description),
        risk_if_erroneous: narrative(attr::RISK_IF_ERRONEOUS, risk),
        data_collection_guidance: narrative(attr::DATA_COLLECTION_GUIDANCE, guidance),
        estimands_impacted: derivation.estimands.clone(),
        lineage_path: derivation.lineage_path.clone(),
        divergence: assessment.divergence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TierClassifier;
    use crate::hints::CriticalDataHint;
    use crate::overrides::{OverrideLog, OverrideRequest};
    use lineage_graph::{GraphBuilder, GraphInput, NodeRecord, NodeType, Relationship};

    fn graph() -> GraphSnapshot {
        let input = GraphInput::new()
            .node(
                NodeRecord::new("LB.HBA1C", NodeType::SourceVariable, "HbA1c")
                    .with_attribute("variable_role", "COMPONENT")
                    .with_attribute("form_name", "Central Lab")
                    .with_attribute("domain", "LB")
                    .with_attribute("risk_if_erroneous", "Primary endpoint misestimated"),
            )
            .node(NodeRecord::new("CHG", NodeType::DerivedVariable, "Change from baseline"))
            .node(NodeRecord::new("MMRM", NodeType::Method, "MMRM"))
            .node(NodeRecord::new("FAS", NodeType::Population, "Full analysis set"))
            .node(
                NodeRecord::new("EST1", NodeType::Estimand, "Primary")
                    .with_attribute("objective_type", "PRIMARY"),
            )
            .node(NodeRecord::new("SAF", NodeType::Method, "Safety summary"))
            .edge("CHG", "LB.HBA1C", Relationship::DerivedFrom)
            .edge("MMRM", "CHG", Relationship::AnalyzedOn)
            .edge("MMRM", "FAS", Relationship::AnalyzedOn)
            .edge("EST1", "MMRM", Relationship::TargetedBy);
        GraphBuilder::new().build(input).unwrap().snapshot
    }

    #[test]
    fn traces_field_from_node_attributes() {
        let g = graph();
        let classification = TierClassifier::new().classify(&g).unwrap();
        let mapping = trace_field(&g, &classification, &OverrideLog::new().view(), &HintRegistry::new(), "LB.HBA1C")
            .unwrap();

        assert_eq!(mapping.criticality_tier, Tier::Critical);
        assert_eq!(mapping.source_hint_id, None);
        assert_eq!(mapping.mapped_fields[0].form_name, "Central Lab");
        assert_eq!(mapping.mapped_fields[0].variable_name, "LB.HBA1C");
        assert_eq!(mapping.risk_if_erroneous, "Primary endpoint misestimated");
        assert_eq!(mapping.criticality_description, default_narrative(Tier::Critical).0);
        let path: Vec<&str> = mapping.lineage_path.iter().map(NodeId::as_str).collect();
        assert_eq!(path, vec!["LB.HBA1C", "CHG", "MMRM", "EST1"]);
    }

    #[test]
    fn uses_first_registered_hint() {
        let g = graph();
        let classification = TierClassifier::new().classify(&g).unwrap();
        let hints = HintRegistry::from_hints([
            CriticalDataHint::new("CDP-07", "Glycaemic control").candidate(
                HintMapping::new("LB.HBA1C", 0.92).on_form("Central Lab", "LB", "HBA1C"),
            ),
            CriticalDataHint::new("CDP-08", "Duplicate mention").candidate(HintMapping::new("LB.HBA1C", 0.5)),
        ])
        .unwrap();
        let mapping = trace_field(&g, &classification, &OverrideLog::new().view(), &hints, "LB.HBA1C").unwrap();
        assert_eq!(mapping.source_hint_id.as_deref(), Some("CDP-07"));
        assert_eq!(mapping.mapped_fields.len(), 1);
        assert_eq!(mapping.mapped_fields[0].variable_name, "HBA1C");
    }

    #[test]
    fn override_sets_effective_tier_and_divergence() {
        let g = graph();
        let classification = TierClassifier::new().classify(&g).unwrap();
        let log = OverrideLog::new();
        log.record(OverrideRequest::set("LB.HBA1C", 2, "j.doe", "central read only").unwrap());
        let mapping = trace_field(&g, &classification, &log.view(), &HintRegistry::new(), "LB.HBA1C").unwrap();
        assert_eq!(mapping.criticality_tier, Tier::Important);
        assert_eq!(mapping.derived_tier, Tier::Critical);
        assert!(mapping.divergence.is_some());
        assert_eq!(mapping.criticality_description, default_narrative(Tier::Important).0);
    }

    #[test]
    fn non_field_or_unknown_is_none() {
        let g = graph();
        let classification = TierClassifier::new().classify(&g).unwrap();
        let overrides = OverrideLog::new().view();
        assert!(trace_field(&g, &classification, &overrides, &HintRegistry::new(), "MMRM").is_none());
        assert!(trace_field(&g, &classification, &overrides, &HintRegistry::new(), "NOPE").is_none());
    }
}
