//! Testing utilities for the estimand lineage workspace
//!
//! Shared graph fixtures and hint registries.

#![allow(missing_docs)]

use lineage_criticality::{CriticalDataHint, HintMapping, HintRegistry};
use lineage_graph::{GraphBuilder, GraphInput, GraphSnapshot, NodeId, NodeRecord, NodeType, Relationship};

/// The five-node worked example: SRC1 -> DER1 -> MTH1 -> EST1, MTH1 on POP1.
pub fn example_graph_input() -> GraphInput {
    GraphInput::new()
        .node(
            NodeRecord::new("SRC1", NodeType::SourceVariable, "HbA1c (%)")
                .with_attribute("variable_role", "COMPONENT"),
        )
        .node(NodeRecord::new("DER1", NodeType::DerivedVariable, "HbA1c change from baseline"))
        .node(NodeRecord::new("POP1", NodeType::Population, "Full analysis set"))
        .node(NodeRecord::new("MTH1", NodeType::Method, "ANCOVA"))
        .node(
            NodeRecord::new("EST1", NodeType::Estimand, "Treatment effect at week 26")
                .with_attribute("objective_type", "PRIMARY"),
        )
        .edge("DER1", "SRC1", Relationship::DerivedFrom)
        .edge("MTH1", "POP1", Relationship::AnalyzedOn)
        .edge("EST1", "MTH1", Relationship::TargetedBy)
        .edge("MTH1", "DER1", Relationship::DerivedFrom)
}

fn crf(id: &str, label: &str, form: &str, domain: &str, variable: &str) -> NodeRecord {
    NodeRecord::new(id, NodeType::SourceVariable, label)
        .with_attribute("form_name", form)
        .with_attribute("domain", domain)
        .with_attribute("variable_name", variable)
}

fn external(id: &str, label: &str, system: &str) -> NodeRecord {
    NodeRecord::new(id, NodeType::SourceVariable, label).with_attribute("collection_source", system)
}

/// A 26-week type 2 diabetes trial.
///
/// | Field | Expected tier |
/// |---|---|
/// | `LB.HBA1C`, `LB.HBA1C_BL` | 1 |
/// | `IXRS.STRATUM`, `DS.RANDDT`, `VS.WEIGHT`, `VS.WEIGHT_BL`, `ICE.RESCUE`, `CM.RESCUE` | 2 |
/// | `LB.FPG`, `DM.SEX`, `AE.TERM`, `PD.DOSING` | 3 |
pub fn trial_graph_input() -> GraphInput {
    GraphInput::new()
        // Source fields
        .node(crf("LB.HBA1C", "HbA1c", "Central Lab", "LB", "HBA1C").with_attribute("variable_role", "COMPONENT"))
        .node(
            crf("LB.HBA1C_BL", "Baseline HbA1c", "Central Lab", "LB", "HBA1C")
                .with_attribute("variable_role", "BASELINE"),
        )
        .node(crf("LB.FPG", "Fasting plasma glucose", "Central Lab", "LB", "FPG"))
        .node(crf("VS.WEIGHT", "Body weight", "Vital Signs", "VS", "WEIGHT").with_attribute("variable_role", "COMPONENT"))
        .node(
            crf("VS.WEIGHT_BL", "Baseline body weight", "Vital Signs", "VS", "WEIGHT")
                .with_attribute("variable_role", "BASELINE"),
        )
        .node(crf("VS.HEIGHT", "Height", "Vital Signs", "VS", "HEIGHT"))
        .node(crf("DM.AGE", "Age", "Demographics", "DM", "AGE"))
        .node(crf("DM.SEX", "Sex", "Demographics", "DM", "SEX"))
        .node(crf("DS.RANDDT", "Randomization date", "Disposition", "DS", "RANDDT"))
        .node(crf("EX.DOSE", "Dose administered", "Exposure", "EX", "EXDOSE"))
        .node(crf("EX.STDT", "First dose date", "Exposure", "EX", "EXSTDTC"))
        .node(crf("CM.RESCUE", "Rescue medication", "Concomitant Medications", "CM", "CMTRT"))
        .node(crf("DS.DISCREAS", "Discontinuation reason", "Disposition", "DS", "DSDECOD"))
        .node(crf("AE.TERM", "Adverse event term", "Adverse Events", "AE", "AETERM"))
        .node(external("IXRS.STRATUM", "Randomization stratum", "IXRS"))
        .node(external("IXRS.RANDDT", "IXRS randomization timestamp", "IXRS"))
        // Intercurrent events and deviations
        .node(NodeRecord::new("ICE.RESCUE", NodeType::IntercurrentEvent, "Initiation of rescue medication")
            .with_attribute("strategy", "treatment policy"))
        .node(NodeRecord::new("ICE.DISC", NodeType::IntercurrentEvent, "Treatment discontinuation")
            .with_attribute("strategy", "hypothetical"))
        .node(NodeRecord::new("PD.DOSING", NodeType::Deviation, "Dosing non-compliance"))
        // Derivations
        .node(NodeRecord::new("DER.HBA1C_CHG", NodeType::DerivedVariable, "HbA1c change from baseline"))
        .node(NodeRecord::new("DER.WT_CHG", NodeType::DerivedVariable, "Weight change from baseline"))
        .node(NodeRecord::new("DER.BMI", NodeType::DerivedVariable, "Baseline BMI"))
        .node(NodeRecord::new("DER.EXPOSURE", NodeType::DerivedVariable, "Treatment exposure"))
        // Populations
        .node(NodeRecord::new("POP.FAS", NodeType::Population, "Full analysis set"))
        .node(NodeRecord::new("POP.SAF", NodeType::Population, "Safety set"))
        .node(NodeRecord::new("POP.PP", NodeType::Population, "Per-protocol set"))
        // Methods
        .node(NodeRecord::new("MTH.ANCOVA", NodeType::Method, "ANCOVA").with_attribute("test_statistic", "t"))
        .node(NodeRecord::new("MTH.MMRM_WT", NodeType::Method, "MMRM on weight change"))
        .node(NodeRecord::new("MTH.FPG_SUMMARY", NodeType::Method, "FPG descriptive summary"))
        .node(NodeRecord::new("MTH.PP_ANCOVA", NodeType::Method, "Per-protocol ANCOVA"))
        .node(NodeRecord::new("MTH.SAFETY", NodeType::Method, "Safety tables"))
        // Estimands
        .node(NodeRecord::new("EST.PRIMARY", NodeType::Estimand, "HbA1c change at week 26")
            .with_attribute("objective_type", "PRIMARY"))
        .node(NodeRecord::new("EST.KEY_WEIGHT", NodeType::Estimand, "Weight change at week 26")
            .with_attribute("objective_type", "KEY_SECONDARY"))
        .node(NodeRecord::new("EST.SEC_FPG", NodeType::Estimand, "FPG change at week 26")
            .with_attribute("objective_type", "SECONDARY"))
        .node(NodeRecord::new("EST.SENS_PP", NodeType::Estimand, "Per-protocol sensitivity")
            .with_attribute("objective_type", "SECONDARY"))
        .edge("DER.HBA1C_CHG", "LB.HBA1C", Relationship::DerivedFrom)
        .edge("DER.HBA1C_CHG", "LB.HBA1C_BL", Relationship::DerivedFrom)
        .edge("DER.WT_CHG", "VS.WEIGHT", Relationship::DerivedFrom)
        .edge("DER.WT_CHG", "VS.WEIGHT_BL", Relationship::DerivedFrom)
        .edge("DER.BMI", "VS.WEIGHT_BL", Relationship::DerivedFrom)
        .edge("DER.BMI", "VS.HEIGHT", Relationship::DerivedFrom)
        .edge("DER.EXPOSURE", "EX.DOSE", Relationship::DerivedFrom)
        .edge("DER.EXPOSURE", "EX.STDT", Relationship::DerivedFrom)
        .edge("POP.FAS", "DS.RANDDT", Relationship::DerivedFrom)
        .edge("POP.FAS", "IXRS.RANDDT", Relationship::DerivedFrom)
        .edge("POP.SAF", "EX.STDT", Relationship::DerivedFrom)
        .edge("POP.PP", "POP.FAS", Relationship::DerivedFrom)
        .edge("POP.PP", "PD.DOSING", Relationship::DerivedFrom)
        .edge("ICE.RESCUE", "CM.RESCUE", Relationship::MappedTo)
        .edge("ICE.DISC", "DS.DISCREAS", Relationship::MappedTo)
        .edge("MTH.ANCOVA", "POP.FAS", Relationship::AnalyzedOn)
        .edge("MTH.ANCOVA", "DER.HBA1C_CHG", Relationship::DerivedFrom)
        .edge("MTH.ANCOVA", "LB.HBA1C_BL", Relationship::DerivedFrom)
        .edge("MTH.ANCOVA", "IXRS.STRATUM", Relationship::DerivedFrom)
        .edge("MTH.MMRM_WT", "POP.FAS", Relationship::AnalyzedOn)
        .edge("MTH.MMRM_WT", "DER.WT_CHG", Relationship::DerivedFrom)
        .edge("MTH.MMRM_WT", "VS.WEIGHT_BL", Relationship::DerivedFrom)
        .edge("MTH.FPG_SUMMARY", "POP.FAS", Relationship::AnalyzedOn)
        .edge("MTH.FPG_SUMMARY", "LB.FPG", Relationship::DerivedFrom)
        .edge("MTH.FPG_SUMMARY", "DER.BMI", Relationship::DerivedFrom)
        .edge("MTH.PP_ANCOVA", "POP.PP", Relationship::AnalyzedOn)
        .edge("MTH.PP_ANCOVA", "DER.HBA1C_CHG", Relationship::DerivedFrom)
        .edge("MTH.SAFETY", "POP.SAF", Relationship::AnalyzedOn)
        .edge("MTH.SAFETY", "AE.TERM", Relationship::DerivedFrom)
        .edge("MTH.SAFETY", "DER.EXPOSURE", Relationship::DerivedFrom)
        .edge("MTH.SAFETY", "DM.AGE", Relationship::DerivedFrom)
        .edge("EST.PRIMARY", "MTH.ANCOVA", Relationship::TargetedBy)
        .edge("EST.PRIMARY", "ICE.RESCUE", Relationship::Handles)
        .edge("EST.PRIMARY", "ICE.DISC", Relationship::Handles)
        .edge("EST.KEY_WEIGHT", "MTH.MMRM_WT", Relationship::TargetedBy)
        .edge("EST.KEY_WEIGHT", "ICE.RESCUE", Relationship::Handles)
        .edge("EST.SEC_FPG", "MTH.FPG_SUMMARY", Relationship::TargetedBy)
        .edge("EST.SENS_PP", "MTH.PP_ANCOVA", Relationship::TargetedBy)
}

/// Build a fixture, panicking on integrity errors.
pub fn build(input: GraphInput) -> GraphSnapshot {
    GraphBuilder::new().build(input).unwrap().snapshot
}

fn hint(id: &str, description: &str, node: &str, form: &str, domain: &str, variable: &str) -> CriticalDataHint {
    CriticalDataHint::new(id, description).candidate(
        HintMapping::new(node, 0.9)
            .on_form(form, domain, variable)
            .because("named in the SAP analysis section"),
    )
}

/// Sixteen hints against [`trial_graph_input`]: fourteen resolve to CRF
/// fields, two only to IXRS placeholders.
pub fn hint_registry_16() -> HintRegistry {
    HintRegistry::from_hints([
        hint("CDP-01", "HbA1c at week 26", "LB.HBA1C", "Central Lab", "LB", "HBA1C").in_category("efficacy"),
        hint("CDP-02", "Baseline HbA1c", "LB.HBA1C_BL", "Central Lab", "LB", "HBA1C").in_category("efficacy"),
        hint("CDP-03", "Fasting plasma glucose", "LB.FPG", "Central Lab", "LB", "FPG"),
        hint("CDP-04", "Body weight", "VS.WEIGHT", "Vital Signs", "VS", "WEIGHT"),
        hint("CDP-05", "Baseline body weight", "VS.WEIGHT_BL", "Vital Signs", "VS", "WEIGHT"),
        hint("CDP-06", "Height for BMI", "VS.HEIGHT", "Vital Signs", "VS", "HEIGHT"),
        hint("CDP-07", "Age", "DM.AGE", "Demographics", "DM", "AGE"),
        hint("CDP-08", "Sex", "DM.SEX", "Demographics", "DM", "SEX"),
        hint("CDP-09", "Randomization date", "DS.RANDDT", "Disposition", "DS", "RANDDT"),
        hint("CDP-10", "Study drug dose", "EX.DOSE", "Exposure", "EX", "EXDOSE"),
        hint("CDP-11", "First dose date", "EX.STDT", "Exposure", "EX", "EXSTDTC"),
        hint("CDP-12", "Rescue medication use", "CM.RESCUE", "Concomitant Medications", "CM", "CMTRT")
            .in_category("intercurrent event"),
        hint("CDP-13", "Reason for discontinuation", "DS.DISCREAS", "Disposition", "DS", "DSDECOD")
            .in_category("intercurrent event"),
        hint("CDP-14", "Adverse events", "AE.TERM", "Adverse Events", "AE", "AETERM").in_category("safety"),
        CriticalDataHint::new("CDP-15", "Randomization stratum")
            .in_category("randomization")
            .candidate(HintMapping::new("IXRS.STRATUM", 0.95).because("stratification factor")),
        CriticalDataHint::new("CDP-16", "Randomization timestamp")
            .in_category("randomization")
            .candidate(HintMapping::new("IXRS.RANDDT", 0.95)),
    ])
    .unwrap()
}

pub fn ids<const N: usize>(list: [&str; N]) -> Vec<NodeId> {
    list.into_iter().map(NodeId::new).collect()
}
