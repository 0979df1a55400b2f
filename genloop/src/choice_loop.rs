//! Branching loop: a menu over the loop-body workflows, driven by the operator.
//!
//! Input is either `done`/`quit`, a menu number in range, or any other text,
//! which the session classifies into a menu entry. Unclassifiable text
//! re-prompts.

use anyhow::Result;
use tracing::{debug, info};

use crate::catalog::{WorkflowId, loop_bodies};
use crate::core::classifier::classify_reply;
use crate::core::types::ConversationLog;
use crate::engine::{StepContext, run_steps};
use crate::io::prompt::classifier_prompt;

/// Session label for classification exchanges.
pub const CHOICE_INPUT_LABEL: &str = "choice_input";

const NOT_UNDERSTOOD: &str = "I don't understand. Please clarify.";

/// What the operator picked from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Done,
    Run(WorkflowId),
}

/// Run chosen loop-body workflows until the operator is done.
///
/// Sub-steps persist their own logs through the engine; the loop itself
/// records no turns.
pub fn run(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let bodies = loop_bodies();
    loop {
        match choose(ctx, &bodies)? {
            Choice::Done => return Ok(ConversationLog::new()),
            Choice::Run(workflow) => {
                info!(workflow = %workflow, "running loop body");
                run_steps(workflow.steps(), ctx)?;
            }
        }
    }
}

/// Menu entries as shown to the operator and to the classifier.
pub fn menu_entries(bodies: &[WorkflowId]) -> Vec<String> {
    bodies
        .iter()
        .enumerate()
        .map(|(idx, id)| format!("{}. {}", idx + 1, id.title()))
        .collect()
}

/// Show the menu until the input resolves to a choice.
pub fn choose(ctx: &StepContext<'_>, bodies: &[WorkflowId]) -> Result<Choice> {
    let entries = menu_entries(bodies);
    loop {
        ctx.console.say("Choose a step to run:");
        for entry in &entries {
            ctx.console.say(entry);
        }
        ctx.console.say("");

        let input = ctx
            .console
            .ask("Enter a number to choose a step, or enter 'done' to finish: ")?;
        let input = input.trim();
        ctx.console.say("");

        if input == "done" || input == "quit" {
            return Ok(Choice::Done);
        }

        let selected = match menu_index(input, bodies.len()) {
            Some(idx) => Some(idx),
            None => classify(ctx, &entries, input)?,
        };

        match selected {
            Some(idx) => return Ok(Choice::Run(bodies[idx])),
            None => {
                debug!(input, "menu input not understood");
                ctx.console.say(NOT_UNDERSTOOD);
                ctx.console.say("");
            }
        }
    }
}

/// Zero-based index for a menu number in `1..=len`. Anything else, including
/// out-of-range numbers, goes to the classifier.
fn menu_index(input: &str, len: usize) -> Option<usize> {
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    input
        .parse::<usize>()
        .ok()
        .filter(|number| (1..=len).contains(number))
        .map(|number| number - 1)
}

/// Ask the session which entry `text` means. Malformed replies are "no match".
fn classify(ctx: &StepContext<'_>, entries: &[String], text: &str) -> Result<Option<usize>> {
    let (system, user) = classifier_prompt(entries, text)?;
    let log = ctx.session.start(&system, &user, CHOICE_INPUT_LABEL)?;
    let selected = classify_reply(log.last_content(), entries);
    if selected.is_none() {
        debug!(reply = log.last_content(), "classifier reply did not match a menu entry");
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::GenConfig;
    use crate::test_support::{ScriptedConsole, ScriptedSession, TestProject};

    fn choose_with(session: &ScriptedSession, console: &ScriptedConsole) -> Choice {
        let project = TestProject::new().expect("project");
        let stores = project.stores();
        let config = GenConfig::default();
        let ctx = StepContext {
            session,
            stores: &stores,
            console,
            config: &config,
        };
        choose(&ctx, &loop_bodies()).expect("choose")
    }

    #[test]
    fn menu_lists_loop_bodies_by_title() {
        assert_eq!(
            menu_entries(&loop_bodies()),
            vec!["1. Feedback", "2. Evaluate"]
        );
    }

    #[test]
    fn done_and_quit_terminate_without_session_calls() {
        for word in ["done", "quit"] {
            let session = ScriptedSession::new(Vec::<String>::new());
            let console = ScriptedConsole::new([word]);
            assert_eq!(choose_with(&session, &console), Choice::Done);
            assert!(session.requests().is_empty());
        }
    }

    #[test]
    fn number_selects_directly() {
        let session = ScriptedSession::new(Vec::<String>::new());
        let console = ScriptedConsole::new(["2"]);
        assert_eq!(
            choose_with(&session, &console),
            Choice::Run(WorkflowId::LoopBodyEvaluate)
        );
        assert!(session.requests().is_empty());
    }

    #[test]
    fn out_of_range_number_goes_to_classifier() {
        let session = ScriptedSession::new(["[]", r#"[{"C": "1. Feedback"}]"#]);
        let console = ScriptedConsole::new(["7", "0"]);
        assert_eq!(
            choose_with(&session, &console),
            Choice::Run(WorkflowId::LoopBodyFeedback)
        );
        let requests = session.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].turns[1].content().contains('7'));
        assert_eq!(console.output().matches(NOT_UNDERSTOOD).count(), 1);
    }

    #[test]
    fn menu_index_accepts_only_numbers_in_range() {
        assert_eq!(menu_index("2", 2), Some(1));
        assert_eq!(menu_index("02", 2), Some(1));
        assert_eq!(menu_index("3", 2), None);
        assert_eq!(menu_index("0", 2), None);
        assert_eq!(menu_index("-1", 2), None);
        assert_eq!(menu_index("", 2), None);
    }

    #[test]
    fn free_text_is_classified() {
        let session = ScriptedSession::new([r#"[{"C": "2. Evaluate"}]"#]);
        let console = ScriptedConsole::new(["let me try running it"]);
        assert_eq!(
            choose_with(&session, &console),
            Choice::Run(WorkflowId::LoopBodyEvaluate)
        );
        let requests = session.requests();
        assert_eq!(requests[0].label, CHOICE_INPUT_LABEL);
        assert!(requests[0].turns[0].content().contains("1. Feedback\n2. Evaluate"));
        assert!(requests[0].turns[1].content().contains("let me try running it"));
    }

    #[test]
    fn malformed_classification_reprompts_instead_of_failing() {
        let session = ScriptedSession::new(["Sure! I think feedback.", "[{'C': None}]"]);
        let console = ScriptedConsole::new(["hmm", "whatever", "done"]);
        assert_eq!(choose_with(&session, &console), Choice::Done);
        assert_eq!(console.output().matches(NOT_UNDERSTOOD).count(), 2);
        assert_eq!(console.output().matches("Choose a step to run:").count(), 3);
    }
}
