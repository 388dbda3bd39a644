//! Tier Classifier
//!
//! Derives a criticality tier for every source-level node (source
//! variables, intercurrent events, deviations) from the estimands it
//! reaches and its analytic role:
//!
//! | Estimands reached | Direct input role | Not a direct input |
//! |---|---|---|
//! | any PRIMARY | Tier 1 | Tier 2 |
//! | KEY_SECONDARY, no PRIMARY | Tier 2 | Tier 2 |
//! | only SECONDARY | Tier 2 | Tier 3 |
//! | none | Tier 3 | Tier 3 |
//!
//! A direct input has role BASELINE or COMPONENT, taken from the node
//! itself or, when the node declares none, from the nearest derived
//! variable on its canonical lineage path that declares one.

use lineage_graph::{
    GraphSnapshot, InvariantViolationError, Node, NodeId, NodeType, ObjectiveType, Tier,
    Traversal, VariableRole,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Where a node's effective role came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "node_id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleSource {
    /// Declared on the node itself
    Own,
    /// Inherited from a derived variable on the lineage path
    Derived(NodeId),
    /// No role anywhere on the path
    Undeclared,
}

/// Evidence behind one derived tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierDerivation {
    /// Classified node
    pub field_id: NodeId,
    /// Derived tier
    pub tier: Tier,
    /// Role used for the direct-input test
    pub role: Option<VariableRole>,
    /// Origin of `role`
    pub role_source: RoleSource,
    /// Estimands reachable from the node
    pub estimands: BTreeSet<NodeId>,
    /// Objective levels among those estimands
    pub objectives: BTreeSet<ObjectiveType>,
    /// Canonical path to the most important estimand, empty if none
    pub lineage_path: Vec<NodeId>,
}

/// Derived tiers for one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    version: u64,
    derivations: BTreeMap<NodeId, TierDerivation>,
}

impl Classification {
    /// Snapshot version this classification was computed from
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Evidence for one field
    #[must_use]
    pub fn get(&self, field_id: &str) -> Option<&TierDerivation> {
        self.derivations.get(field_id)
    }

    /// Derived tier for one field
    #[must_use]
    pub fn derived_tier(&self, field_id: &str) -> Option<Tier> {
        self.get(field_id).map(|d| d.tier)
    }

    /// All derivations ordered by field id
    pub fn iter(&self) -> impl Iterator<Item = &TierDerivation> + '_ {
        self.derivations.values()
    }

    /// Number of classified fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.derivations.len()
    }

    /// Whether nothing was classified
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.derivations.is_empty()
    }

    /// Field id -> derived tier, for stamping onto a snapshot
    #[must_use]
    pub fn tiers(&self) -> HashMap<NodeId, Tier> {
        self.derivations
            .iter()
            .map(|(id, d)| (id.clone(), d.tier))
            .collect()
    }
}

/// Stateless tier classifier
#[derive(Debug, Clone, Copy)]
pub struct TierClassifier {
    budget_multiplier: usize,
}

impl TierClassifier {
    /// Classifier with the default traversal budget
    #[must_use]
    pub fn new() -> Self {
        Self {
            budget_multiplier: 1,
        }
    }

    /// Classifier whose traversals allow `node count * multiplier` steps
    #[must_use]
    pub fn with_budget_multiplier(multiplier: usize) -> Self {
        Self {
            budget_multiplier: multiplier,
        }
    }

    /// Classify every source-level node in `graph`
    pub fn classify(&self, graph: &GraphSnapshot) -> Result<Classification, InvariantViolationError> {
        let traversal = Traversal::with_budget_multiplier(graph, self.budget_multiplier);
        let mut derivations = BTreeMap::new();
        for node in graph.nodes().filter(|n| n.node_type.is_source_level()) {
            let derivation = self.classify_node(&traversal, node)?;
            derivations.insert(node.id.clone(), derivation);
        }
        debug!(version = graph.version(), fields = derivations.len(), "classified lineage fields");
        Ok(Classification {
            version: graph.version(),
            derivations,
        })
    }

    /// Classify one node
    pub fn classify_node(
        &self,
        traversal: &Traversal<'_>,
        node: &Node,
    ) -> Result<TierDerivation, InvariantViolationError> {
        let graph = traversal.graph();
        let estimands = traversal.impacted_estimands(node.id.as_str())?;
        let objectives: BTreeSet<ObjectiveType> = estimands
            .iter()
            .filter_map(|id| graph.get_node(id.as_str()))
            .map(|n| n.objective_type().unwrap_or(ObjectiveType::Secondary))
            .collect();
        let lineage_path = traversal
            .canonical_lineage(node.id.as_str())?
            .unwrap_or_default();

        let (role, role_source) = match node.variable_role() {
            Some(role) => (Some(role), RoleSource::Own),
            None => lineage_path
                .iter()
                .skip(1)
                .filter_map(|id| graph.get_node(id.as_str()))
                .filter(|n| n.node_type == NodeType::DerivedVariable)
                .find_map(|n| n.variable_role().map(|r| (r, n.id.clone())))
                .map_or((None, RoleSource::Undeclared), |(r, id)| {
                    (Some(r), RoleSource::Derived(id))
                }),
        };

        let direct = role.is_some_and(VariableRole::is_direct_input);
        Ok(TierDerivation {
            field_id: node.id.clone(),
            tier: derive_tier(&objectives, direct),
            role,
            role_source,
            estimands,
            objectives,
            lineage_path,
        })
    }
}

impl Default for TierClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Tier rule. When several conditions hold, the most critical tier wins.
#[must_use]
pub fn derive_tier(objectives: &BTreeSet<ObjectiveType>, direct_input: bool) -> Tier {
    let primary = objectives.contains(&ObjectiveType::Primary);
    let key_secondary = objectives.contains(&ObjectiveType::KeySecondary);

    if primary && direct_input {
        Tier::Critical
    } else if (primary || key_secondary) || (direct_input && !objectives.is_empty()) {
        Tier::Important
    } else {
        Tier::Supportive
    }
}
