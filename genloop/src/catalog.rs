//! Workflow catalog: a closed set of workflow ids, each with a fixed step list.
//!
//! Workflows named with [`LOOP_BODY_PREFIX`] are the entries of the branching
//! loop's menu.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::engine::Step;
use crate::steps::{
    ASK_FEEDBACK, CHOICE_LOOP, CLARIFY, EXECUTE_ENTRYPOINT, FIX_CODE, GEN_CLARIFIED_CODE, GEN_CODE,
    GEN_ENTRYPOINT, GEN_SPEC, GEN_UNIT_TESTS, HUMAN_REVIEW, IMPROVE_EXISTING_CODE, RESPEC,
    SIMPLE_GEN, USE_FEEDBACK,
};

/// Name prefix marking workflows offered by the branching loop.
pub const LOOP_BODY_PREFIX: &str = "loop_body_";

/// Every registered step. Names are unique.
pub const ALL_STEPS: [Step; 15] = [
    SIMPLE_GEN,
    CLARIFY,
    GEN_SPEC,
    RESPEC,
    GEN_UNIT_TESTS,
    GEN_CLARIFIED_CODE,
    GEN_CODE,
    FIX_CODE,
    GEN_ENTRYPOINT,
    EXECUTE_ENTRYPOINT,
    HUMAN_REVIEW,
    ASK_FEEDBACK,
    USE_FEEDBACK,
    IMPROVE_EXISTING_CODE,
    CHOICE_LOOP,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkflowId {
    Default,
    Benchmark,
    Simple,
    Tdd,
    TddPlus,
    Clarify,
    Respec,
    UseFeedback,
    ExecuteOnly,
    Evaluate,
    Improve,
    ChoiceLoop,
    LoopBodyFeedback,
    LoopBodyEvaluate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown workflow '{0}' (see `genloop workflows`)")]
pub struct UnknownWorkflow(pub String);

impl WorkflowId {
    /// Catalog order; loop-body menu entries are numbered in this order.
    pub const ALL: [WorkflowId; 14] = [
        WorkflowId::Default,
        WorkflowId::Benchmark,
        WorkflowId::Simple,
        WorkflowId::Tdd,
        WorkflowId::TddPlus,
        WorkflowId::Clarify,
        WorkflowId::Respec,
        WorkflowId::UseFeedback,
        WorkflowId::ExecuteOnly,
        WorkflowId::Evaluate,
        WorkflowId::Improve,
        WorkflowId::ChoiceLoop,
        WorkflowId::LoopBodyFeedback,
        WorkflowId::LoopBodyEvaluate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WorkflowId::Default => "default",
            WorkflowId::Benchmark => "benchmark",
            WorkflowId::Simple => "simple",
            WorkflowId::Tdd => "tdd",
            WorkflowId::TddPlus => "tdd+",
            WorkflowId::Clarify => "clarify",
            WorkflowId::Respec => "respec",
            WorkflowId::UseFeedback => "use_feedback",
            WorkflowId::ExecuteOnly => "execute_only",
            WorkflowId::Evaluate => "evaluate",
            WorkflowId::Improve => "improve",
            WorkflowId::ChoiceLoop => "choice_loop",
            WorkflowId::LoopBodyFeedback => "loop_body_feedback",
            WorkflowId::LoopBodyEvaluate => "loop_body_evaluate",
        }
    }

    pub fn steps(self) -> &'static [Step] {
        match self {
            WorkflowId::Default | WorkflowId::Clarify => &[
                CLARIFY,
                GEN_CLARIFIED_CODE,
                GEN_ENTRYPOINT,
                EXECUTE_ENTRYPOINT,
                HUMAN_REVIEW,
            ],
            WorkflowId::Benchmark => &[SIMPLE_GEN, GEN_ENTRYPOINT],
            WorkflowId::Simple => &[SIMPLE_GEN, GEN_ENTRYPOINT, EXECUTE_ENTRYPOINT],
            WorkflowId::Tdd => &[
                GEN_SPEC,
                GEN_UNIT_TESTS,
                GEN_CODE,
                GEN_ENTRYPOINT,
                EXECUTE_ENTRYPOINT,
                HUMAN_REVIEW,
            ],
            WorkflowId::TddPlus => &[
                GEN_SPEC,
                GEN_UNIT_TESTS,
                GEN_CODE,
                FIX_CODE,
                GEN_ENTRYPOINT,
                EXECUTE_ENTRYPOINT,
                HUMAN_REVIEW,
            ],
            WorkflowId::Respec => &[
                GEN_SPEC,
                RESPEC,
                GEN_UNIT_TESTS,
                GEN_CODE,
                FIX_CODE,
                GEN_ENTRYPOINT,
                EXECUTE_ENTRYPOINT,
                HUMAN_REVIEW,
            ],
            WorkflowId::UseFeedback => &[
                USE_FEEDBACK,
                GEN_ENTRYPOINT,
                EXECUTE_ENTRYPOINT,
                HUMAN_REVIEW,
            ],
            WorkflowId::ExecuteOnly => &[EXECUTE_ENTRYPOINT],
            WorkflowId::Evaluate | WorkflowId::LoopBodyEvaluate => {
                &[EXECUTE_ENTRYPOINT, HUMAN_REVIEW]
            }
            WorkflowId::Improve => &[
                IMPROVE_EXISTING_CODE,
                GEN_ENTRYPOINT,
                EXECUTE_ENTRYPOINT,
                HUMAN_REVIEW,
            ],
            WorkflowId::ChoiceLoop => &[CHOICE_LOOP],
            WorkflowId::LoopBodyFeedback => &[
                ASK_FEEDBACK,
                USE_FEEDBACK,
                GEN_ENTRYPOINT,
                EXECUTE_ENTRYPOINT,
                HUMAN_REVIEW,
            ],
        }
    }

    pub fn is_loop_body(self) -> bool {
        self.name().starts_with(LOOP_BODY_PREFIX)
    }

    /// Menu title: the name without the loop-body prefix, title-cased.
    pub fn title(self) -> String {
        let bare = self
            .name()
            .strip_prefix(LOOP_BODY_PREFIX)
            .unwrap_or(self.name());
        bare.split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WorkflowId {
    type Err = UnknownWorkflow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowId::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| UnknownWorkflow(s.to_string()))
    }
}

/// Workflows offered by the branching loop, in menu order.
pub fn loop_bodies() -> Vec<WorkflowId> {
    WorkflowId::ALL
        .into_iter()
        .filter(|id| id.is_loop_body())
        .collect()
}

/// Catalog consistency problems; empty when the catalog is usable.
pub fn validate() -> Vec<String> {
    let mut errors = Vec::new();

    let mut names = BTreeSet::new();
    for step in &ALL_STEPS {
        if !names.insert(step.name) {
            errors.push(format!("duplicate step name '{}'", step.name));
        }
    }

    for id in WorkflowId::ALL {
        let steps = id.steps();
        if steps.is_empty() {
            errors.push(format!("workflow '{id}' has no steps"));
        }
        for step in steps {
            if !names.contains(step.name) {
                errors.push(format!(
                    "workflow '{id}' uses unregistered step '{}'",
                    step.name
                ));
            }
        }
    }

    if loop_bodies().is_empty() {
        errors.push(format!("no '{LOOP_BODY_PREFIX}*' workflows registered"));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_names(id: WorkflowId) -> Vec<&'static str> {
        id.steps().iter().map(|step| step.name).collect()
    }

    #[test]
    fn catalog_is_consistent() {
        assert_eq!(validate(), Vec::<String>::new());
    }

    #[test]
    fn names_parse_back() {
        for id in WorkflowId::ALL {
            assert_eq!(id.name().parse::<WorkflowId>(), Ok(id));
        }
        assert_eq!("tdd+".parse::<WorkflowId>(), Ok(WorkflowId::TddPlus));
        assert!("tdd++".parse::<WorkflowId>().is_err());
    }

    #[test]
    fn loop_bodies_are_titled_menu_entries() {
        let bodies = loop_bodies();
        assert_eq!(
            bodies,
            vec![WorkflowId::LoopBodyFeedback, WorkflowId::LoopBodyEvaluate]
        );
        assert_eq!(WorkflowId::LoopBodyFeedback.title(), "Feedback");
        assert_eq!(WorkflowId::ExecuteOnly.title(), "Execute Only");
    }

    #[test]
    fn feedback_body_prepends_ask_feedback() {
        let mut expected = vec!["ask_feedback"];
        expected.extend(step_names(WorkflowId::UseFeedback));
        assert_eq!(step_names(WorkflowId::LoopBodyFeedback), expected);
    }

    #[test]
    fn respec_runs_spec_before_respec() {
        assert_eq!(
            &step_names(WorkflowId::Respec)[..2],
            &["gen_spec", "respec"]
        );
    }
}
