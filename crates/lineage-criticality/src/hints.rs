//! Critical data point hint registry
//!
//! Each hint describes an element the protocol or SAP marks as critical,
//! independent of whether it has been mapped yet. Candidate mappings are
//! prior metadata produced by the extraction collaborator; nothing here
//! re-derives mappings from text.

use crate::error::HintRegistryError;
use indexmap::IndexMap;
use lineage_graph::NodeId;
use serde::{Deserialize, Serialize};

/// One candidate field for a hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintMapping {
    /// Graph node representing the field
    pub node_id: NodeId,
    /// CRF form name
    #[serde(default)]
    pub form_name: String,
    /// Domain (DM, VS, LB, ...)
    #[serde(default)]
    pub domain: String,
    /// Variable name on the form
    #[serde(default)]
    pub variable_name: String,
    /// Mapping confidence in [0, 1]
    pub confidence: f64,
    /// Why the mapping was proposed
    #[serde(default)]
    pub rationale: String,
}

impl HintMapping {
    /// Mapping with empty form metadata
    #[must_use]
    pub fn new(node_id: impl Into<NodeId>, confidence: f64) -> Self {
        Self {
            node_id: node_id.into(),
            form_name: String::new(),
            domain: String::new(),
            variable_name: String::new(),
            confidence,
            rationale: String::new(),
        }
    }

    /// Attach CRF location
    #[must_use]
    pub fn on_form(
        mut self,
        form_name: impl Into<String>,
        domain: impl Into<String>,
        variable_name: impl Into<String>,
    ) -> Self {
        self.form_name = form_name.into();
        self.domain = domain.into();
        self.variable_name = variable_name.into();
        self
    }

    /// Attach rationale
    #[must_use]
    pub fn because(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }
}

/// Expected critical data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalDataHint {
    /// Registry id
    pub id: String,
    /// What the protocol says is critical
    pub description: String,
    /// Optional grouping (efficacy, safety, eligibility, ...)
    #[serde(default)]
    pub category: Option<String>,
    /// Candidate fields, in preference order
    #[serde(default)]
    pub candidates: Vec<HintMapping>,
}

impl CriticalDataHint {
    /// Hint without candidates
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            category: None,
            candidates: Vec::new(),
        }
    }

    /// Add a candidate
    #[must_use]
    pub fn candidate(mut self, mapping: HintMapping) -> Self {
        self.candidates.push(mapping);
        self
    }

    /// Set the category
    #[must_use]
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Whether any candidate points at `field_id`
    #[must_use]
    pub fn references(&self, field_id: &str) -> bool {
        self.candidates.iter().any(|c| c.node_id.as_str() == field_id)
    }
}

/// Ordered registry of hints, keyed by id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HintRegistry {
    hints: IndexMap<String, CriticalDataHint>,
}

impl HintRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry, rejecting duplicate ids and out-of-range confidences
    pub fn from_hints(
        hints: impl IntoIterator<Item = CriticalDataHint>,
    ) -> Result<Self, HintRegistryError> {
        let mut registry = Self::new();
        for hint in hints {
            registry.insert(hint)?;
        }
        Ok(registry)
    }

    /// Add one hint
    pub fn insert(&mut self, hint: CriticalDataHint) -> Result<(), HintRegistryError> {
        if self.hints.contains_key(&hint.id) {
            return Err(HintRegistryError::DuplicateHint(hint.id));
        }
        if let Some(bad) = hint
            .candidates
            .iter()
            .find(|c| !(0.0..=1.0).contains(&c.confidence))
        {
            return Err(HintRegistryError::InvalidConfidence {
                hint_id: hint.id.clone(),
                confidence: bad.confidence,
            });
        }
        self.hints.insert(hint.id.clone(), hint);
        Ok(())
    }

    /// Look up a hint
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CriticalDataHint> {
        self.hints.get(id)
    }

    /// Hints in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CriticalDataHint> + '_ {
        self.hints.values()
    }

    /// Hints with a candidate pointing at `field_id`, in registration order
    pub fn hints_for_field<'a>(
        &'a self,
        field_id: &'a str,
    ) -> impl Iterator<Item = &'a CriticalDataHint> + 'a {
        self.iter().filter(move |h| h.references(field_id))
    }

    /// Number of hints
    #[must_use]
    pub fn len(&self) -> usize {
        self.hints.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_hint_ids() {
        let err = HintRegistry::from_hints([
            CriticalDataHint::new("CDP-01", "Randomization date"),
            CriticalDataHint::new("CDP-01", "Again"),
        ])
        .unwrap_err();
        assert_eq!(err, HintRegistryError::DuplicateHint("CDP-01".to_owned()));
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        let err = HintRegistry::from_hints([CriticalDataHint::new("CDP-02", "HbA1c")
            .candidate(HintMapping::new("LB.HBA1C", 1.2))])
        .unwrap_err();
        assert!(matches!(err, HintRegistryError::InvalidConfidence { .. }));
    }

    #[test]
    fn preserves_registration_order_and_field_lookup() {
        let registry = HintRegistry::from_hints([
            CriticalDataHint::new("CDP-09", "Weight").candidate(HintMapping::new("VS.WEIGHT", 0.9)),
            CriticalDataHint::new("CDP-01", "Height").candidate(HintMapping::new("VS.HEIGHT", 0.9)),
            CriticalDataHint::new("CDP-05", "BMI inputs")
                .candidate(HintMapping::new("VS.WEIGHT", 0.8))
                .candidate(HintMapping::new("VS.HEIGHT", 0.8)),
        ])
        .unwrap();

        let order: Vec<_> = registry.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(order, vec!["CDP-09", "CDP-01", "CDP-05"]);
        let for_weight: Vec<_> = registry.hints_for_field("VS.WEIGHT").map(|h| h.id.as_str()).collect();
        assert_eq!(for_weight, vec!["CDP-09", "CDP-05"]);
    }

    #[test]
    fn deserializes_registry_entry() {
        let json = r#"{
            "id": "CDP-03",
            "description": "Randomization stratum",
            "category": "randomization",
            "candidates": [{ "node_id": "IXRS.STRATUM", "confidence": 0.95 }]
        }"#;
        let hint: CriticalDataHint = serde_json::from_str(json).unwrap();
        assert_eq!(hint.candidates[0].form_name, "");
        assert!(hint.references("IXRS.STRATUM"));
    }
}
