//! Tactic prompt templates.
//!
//! A tactic seeds the input box with a partially written question. The
//! `UNDEFINED` slots are left for the user to overwrite by hand; nothing here
//! ever fills them in.

use std::str::FromStr;

use crate::error::CoreError;

/// Literal marker for every user-fillable slot in a template.
pub const PLACEHOLDER: &str = "UNDEFINED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tactic {
    ExpandAssumptions,
    Prove,
    ProveWithinContext,
    PremisesRetrieval,
    VerifyEntailment,
    VerifyStatement,
    EmpiricalVerification,
}

impl Tactic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tactic::ExpandAssumptions => "expandAssumptions",
            Tactic::Prove => "prove",
            Tactic::ProveWithinContext => "proveWithinContext",
            Tactic::PremisesRetrieval => "premisesRetrieval",
            Tactic::VerifyEntailment => "verifyEntailment",
            Tactic::VerifyStatement => "verifyStatement",
            Tactic::EmpiricalVerification => "empiricalVerification",
        }
    }

    /// Menu order.
    pub fn all() -> Vec<Tactic> {
        vec![
            Tactic::ExpandAssumptions,
            Tactic::Prove,
            Tactic::ProveWithinContext,
            Tactic::PremisesRetrieval,
            Tactic::VerifyEntailment,
            Tactic::VerifyStatement,
            Tactic::EmpiricalVerification,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Tactic::ExpandAssumptions => "Expand Assumptions",
            Tactic::Prove => "Prove Statement",
            Tactic::ProveWithinContext => "Prove Within Context",
            Tactic::PremisesRetrieval => "Get Premises",
            Tactic::VerifyEntailment => "Verify Entailment",
            Tactic::VerifyStatement => "Verify Statement",
            Tactic::EmpiricalVerification => "Empirical Verification",
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            Tactic::ExpandAssumptions => {
                "Expand the implied definitions and assumptions from p_i.\n\np_i: UNDEFINED"
            }
            Tactic::Prove => "Prove p_i.\n\np_i: UNDEFINED",
            Tactic::ProveWithinContext => {
                "Prove p_i given the context P_i.\n\np_i: UNDEFINED\nP_i: UNDEFINED"
            }
            Tactic::PremisesRetrieval => {
                "Create a list of all premises related to s_i.\n\ns_i: UNDEFINED"
            }
            Tactic::VerifyEntailment => {
                "Verify that p_j follows from p_i.\n\np_i: UNDEFINED\np_j: UNDEFINED"
            }
            Tactic::VerifyStatement => "Is p_i correct?\n\np_i: UNDEFINED",
            Tactic::EmpiricalVerification => {
                "Verify empirically that the statement p_i is true.\n\np_i: UNDEFINED"
            }
        }
    }
}

impl FromStr for Tactic {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tactic::all()
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownTactic(s.to_string()))
    }
}

/// Lookup from tactic id to prompt template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TacticTemplateRegistry;

impl TacticTemplateRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a tactic id (e.g. `"prove"`) to its template.
    pub fn resolve(&self, tactic_id: &str) -> Result<&'static str, CoreError> {
        tactic_id.parse::<Tactic>().map(|t| t.template())
    }

    pub fn tactics(&self) -> Vec<Tactic> {
        Tactic::all()
    }

    /// Number of `UNDEFINED` slots still present in `text`.
    pub fn placeholder_count(text: &str) -> usize {
        text.matches(PLACEHOLDER).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tactic_has_a_placeholder() {
        let registry = TacticTemplateRegistry::new();
        for tactic in registry.tactics() {
            let template = registry.resolve(tactic.as_str()).unwrap();
            assert!(
                TacticTemplateRegistry::placeholder_count(template) >= 1,
                "{} has no placeholder",
                tactic.as_str()
            );
        }
    }

    #[test]
    fn unknown_tactic_fails() {
        let registry = TacticTemplateRegistry::new();
        match registry.resolve("verifyProof") {
            Err(CoreError::UnknownTactic(id)) => assert_eq!(id, "verifyProof"),
            other => panic!("expected UnknownTactic, got {:?}", other),
        }
    }

    #[test]
    fn ids_are_case_sensitive() {
        assert!("Prove".parse::<Tactic>().is_err());
        assert_eq!("prove".parse::<Tactic>().unwrap(), Tactic::Prove);
    }

    #[test]
    fn templates_match_expected_text() {
        let registry = TacticTemplateRegistry::new();
        assert_eq!(registry.resolve("prove").unwrap(), "Prove p_i.\n\np_i: UNDEFINED");
        assert_eq!(
            registry.resolve("proveWithinContext").unwrap(),
            "Prove p_i given the context P_i.\n\np_i: UNDEFINED\nP_i: UNDEFINED"
        );
        let entailment = registry.resolve("verifyEntailment").unwrap();
        assert_eq!(TacticTemplateRegistry::placeholder_count(entailment), 2);
    }

    #[test]
    fn ids_round_trip() {
        for tactic in Tactic::all() {
            assert_eq!(tactic.as_str().parse::<Tactic>().unwrap(), tactic);
        }
    }
}
