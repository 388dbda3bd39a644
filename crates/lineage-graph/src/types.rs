//! Lineage graph data model
//!
//! Nodes represent data-collection fields, derivations, analysis
//! populations, statistical methods, intercurrent events, deviations and
//! estimands. Edges always read `from` depends on / is explained by `to`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Stable string identifier of a node, preserved across rebuilds
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id from any string-like value
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Node classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Raw CRF/eCRF variable or external-system value
    SourceVariable,
    /// Variable computed from other variables
    DerivedVariable,
    /// Analysis population (ITT, PP, safety, ...)
    Population,
    /// Statistical method or model
    Method,
    /// Clinical estimand
    Estimand,
    /// Intercurrent event handled by an estimand strategy
    IntercurrentEvent,
    /// Protocol deviation category
    Deviation,
}

impl NodeType {
    /// All node types, in declaration order
    pub const ALL: [NodeType; 7] = [
        NodeType::SourceVariable,
        NodeType::DerivedVariable,
        NodeType::Population,
        NodeType::Method,
        NodeType::Estimand,
        NodeType::IntercurrentEvent,
        NodeType::Deviation,
    ];

    /// Whether nodes of this type are classified into criticality tiers
    #[inline]
    #[must_use]
    pub fn is_source_level(self) -> bool {
        matches!(
            self,
            NodeType::SourceVariable | NodeType::IntercurrentEvent | NodeType::Deviation
        )
    }

    /// Whether nodes of this type can originate an estimand's lineage
    #[inline]
    #[must_use]
    pub fn is_lineage_origin(self) -> bool {
        matches!(self, NodeType::SourceVariable | NodeType::IntercurrentEvent)
    }
}

/// Edge relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relationship {
    /// `from` is computed from `to`
    DerivedFrom,
    /// Method `from` is analyzed on population `to`
    AnalyzedOn,
    /// Estimand `from` is targeted by method `to`
    TargetedBy,
    /// Estimand `from` handles intercurrent event `to`
    Handles,
    /// `from` is mapped onto `to`
    MappedTo,
}

/// Scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Free text or enumerated token
    Text(String),
}

impl AttributeValue {
    /// Text content, if this is a text value
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Float(x) => write!(f, "{x}"),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

/// Attribute keys with engine-level meaning
pub mod attr {
    /// Role of a variable in the analysis
    pub const VARIABLE_ROLE: &str = "variable_role";
    /// Objective level of an estimand
    pub const OBJECTIVE_TYPE: &str = "objective_type";
    /// Intercurrent event strategy
    pub const STRATEGY: &str = "strategy";
    /// Test statistic of a method
    pub const TEST_STATISTIC: &str = "test_statistic";
    /// Origin system of a source variable (`CRF` unless stated)
    pub const COLLECTION_SOURCE: &str = "collection_source";
    /// CRF form name
    pub const FORM_NAME: &str = "form_name";
    /// SDTM-style domain
    pub const DOMAIN: &str = "domain";
    /// Variable name on the form
    pub const VARIABLE_NAME: &str = "variable_name";
    /// Extraction-supplied criticality description
    pub const CRITICALITY_DESCRIPTION: &str = "criticality_description";
    /// Extraction-supplied risk statement
    pub const RISK_IF_ERRONEOUS: &str = "risk_if_erroneous";
    /// Extraction-supplied collection guidance
    pub const DATA_COLLECTION_GUIDANCE: &str = "data_collection_guidance";
}

/// Analytic role of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableRole {
    /// Baseline value entering the analysis
    Baseline,
    /// Component of the endpoint
    Component,
    /// Intermediate / covariate value
    Intermediate,
}

impl VariableRole {
    /// Parse the attribute token
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "BASELINE" => Some(VariableRole::Baseline),
            "COMPONENT" => Some(VariableRole::Component),
            "INTERMEDIATE" => Some(VariableRole::Intermediate),
            _ => None,
        }
    }

    /// Direct analytic input (baseline or endpoint component)
    #[inline]
    #[must_use]
    pub fn is_direct_input(self) -> bool {
        matches!(self, VariableRole::Baseline | VariableRole::Component)
    }
}

/// Objective level of an estimand
///
/// Ordered from most to least important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectiveType {
    /// Primary objective
    Primary,
    /// Key secondary objective
    KeySecondary,
    /// Secondary objective
    Secondary,
}

impl ObjectiveType {
    /// Parse the attribute token
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "PRIMARY" => Some(ObjectiveType::Primary),
            "KEY_SECONDARY" => Some(ObjectiveType::KeySecondary),
            "SECONDARY" => Some(ObjectiveType::Secondary),
            _ => None,
        }
    }
}

/// Criticality tier (1 = critical, 3 = supportive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    /// Direct estimand impact
    Critical = 1,
    /// Supports primary or key secondary analysis
    Important = 2,
    /// Characterization only
    Supportive = 3,
}

impl Tier {
    /// Numeric tier
    #[inline]
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Short label shown next to the tier number
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Tier::Critical => "Critical",
            Tier::Important => "Important",
            Tier::Supportive => "Supportive",
        }
    }
}

impl TryFrom<u8> for Tier {
    type Error = InvalidTier;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Tier::Critical),
            2 => Ok(Tier::Important),
            3 => Ok(Tier::Supportive),
            other => Err(InvalidTier(other)),
        }
    }
}

impl From<Tier> for u8 {
    fn from(value: Tier) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tier {} ({})", self.as_u8(), self.label())
    }
}

/// Tier number outside 1..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("criticality tier must be 1, 2 or 3 (got {0})")]
pub struct InvalidTier(pub u8);

/// Graph node as published in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable id
    pub id: NodeId,
    /// Node classification
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Human-readable description
    pub label: String,
    /// Scalar attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Derived tier, `None` until classified
    #[serde(default)]
    pub criticality_tier: Option<Tier>,
}

impl Node {
    /// Raw attribute lookup
    #[inline]
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Text attribute lookup
    #[inline]
    #[must_use]
    pub fn text_attribute(&self, key: &str) -> Option<&str> {
        self.attribute(key).and_then(AttributeValue::as_text)
    }

    /// Parsed `variable_role`
    #[must_use]
    pub fn variable_role(&self) -> Option<VariableRole> {
        self.text_attribute(attr::VARIABLE_ROLE)
            .and_then(VariableRole::parse)
    }

    /// Parsed `objective_type`
    #[must_use]
    pub fn objective_type(&self) -> Option<ObjectiveType> {
        self.text_attribute(attr::OBJECTIVE_TYPE)
            .and_then(ObjectiveType::parse)
    }

    /// Intercurrent event strategy, if declared
    #[must_use]
    pub fn strategy(&self) -> Option<&str> {
        self.text_attribute(attr::STRATEGY)
    }

    /// Origin system; source variables without one are CRF fields
    #[must_use]
    pub fn collection_source(&self) -> &str {
        self.text_attribute(attr::COLLECTION_SOURCE).unwrap_or("CRF")
    }

    /// A source variable whose data comes from outside CRF collection
    #[must_use]
    pub fn is_external_source(&self) -> bool {
        self.node_type == NodeType::SourceVariable
            && !self.collection_source().eq_ignore_ascii_case("CRF")
    }
}

/// Directed edge: `from` depends on `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    /// Dependent node
    pub from: NodeId,
    /// Dependency
    pub to: NodeId,
    /// Kind of dependency
    pub relationship: Relationship,
}

impl Edge {
    /// Create an edge
    #[must_use]
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>, relationship: Relationship) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relationship,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --{:?}--> {}", self.from, self.relationship, self.to)
    }
}

/// Node record as emitted by the extraction collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Stable id
    pub id: NodeId,
    /// Node classification
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Human-readable description
    pub label: String,
    /// Scalar attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl NodeRecord {
    /// Create a record without attributes
    #[must_use]
    pub fn new(id: impl Into<NodeId>, node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            label: label.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute
    #[must_use]
    pub fn with_attribute(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.to_owned(), value.into());
        self
    }

    pub(crate) fn into_node(self) -> Node {
        Node {
            id: self.id,
            node_type: self.node_type,
            label: self.label,
            attributes: self.attributes,
            criticality_tier: None,
        }
    }
}

/// Extraction output: candidate node and edge lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphInput {
    /// Node records
    pub nodes: Vec<NodeRecord>,
    /// Edge records
    pub edges: Vec<Edge>,
}

impl GraphInput {
    /// Empty input
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node record
    #[must_use]
    pub fn node(mut self, record: NodeRecord) -> Self {
        self.nodes.push(record);
        self
    }

    /// Append an edge record
    #[must_use]
    pub fn edge(
        mut self,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        relationship: Relationship,
    ) -> Self {
        self.edges.push(Edge::new(from, to, relationship));
        self
    }
}
