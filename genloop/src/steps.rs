//! Step bodies.
//!
//! Each step reads what it needs from the stores, talks to the session and
//! writes its artifacts back. The engine persists the returned log under the
//! step's name, which is how `respec`, `gen_clarified_code` and `fix_code`
//! find the conversations they continue.

use std::process::Command;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::choice_loop;
use crate::core::clarify::{NOTHING_MORE, is_clarification_done};
use crate::core::codec::extract_code_blocks;
use crate::core::errors::StepError;
use crate::core::types::{ConversationLog, Turn};
use crate::engine::{Step, StepContext};
use crate::io::files::{
    ALL_OUTPUT, WriteReport, encode_files, parse_file_list, to_files, to_selected_files,
};
use crate::io::process::{RunExit, run_interruptible};
use crate::io::prompt::{Preprompt, clarify_followup, preprompt, system_prompt};
use crate::io::review::{REVIEW_KEY, Review, collect_review};

pub const SIMPLE_GEN: Step = Step {
    name: "simple_gen",
    run: simple_gen,
};
pub const CLARIFY: Step = Step {
    name: "clarify",
    run: clarify,
};
pub const GEN_SPEC: Step = Step {
    name: "gen_spec",
    run: gen_spec,
};
pub const RESPEC: Step = Step {
    name: "respec",
    run: respec,
};
pub const GEN_UNIT_TESTS: Step = Step {
    name: "gen_unit_tests",
    run: gen_unit_tests,
};
pub const GEN_CLARIFIED_CODE: Step = Step {
    name: "gen_clarified_code",
    run: gen_clarified_code,
};
pub const GEN_CODE: Step = Step {
    name: "gen_code",
    run: gen_code,
};
pub const FIX_CODE: Step = Step {
    name: "fix_code",
    run: fix_code,
};
pub const GEN_ENTRYPOINT: Step = Step {
    name: "gen_entrypoint",
    run: gen_entrypoint,
};
pub const EXECUTE_ENTRYPOINT: Step = Step {
    name: "execute_entrypoint",
    run: execute_entrypoint,
};
pub const HUMAN_REVIEW: Step = Step {
    name: "human_review",
    run: human_review,
};
pub const ASK_FEEDBACK: Step = Step {
    name: "ask_feedback",
    run: ask_feedback,
};
pub const USE_FEEDBACK: Step = Step {
    name: "use_feedback",
    run: use_feedback,
};
pub const IMPROVE_EXISTING_CODE: Step = Step {
    name: "improve_existing_code",
    run: improve_existing_code,
};
pub const CHOICE_LOOP: Step = Step {
    name: "choice_loop",
    run: choice_loop::run,
};

const ASSUME_INSTRUCTION: &str =
    "Make your own assumptions and state them explicitly before starting";
const REITERATE_SPEC: &str = "Based on the conversation so far, please reiterate the \
specification for the program. If there are things that can be improved, please incorporate \
the improvements. If you are satisfied with the specification, just write out the \
specification word by word again.";
const FIX_REQUEST: &str = "Please fix any errors in the code above.";

/// The operator's prompt. Falls back to the legacy `main_prompt` file.
fn get_prompt(ctx: &StepContext<'_>) -> Result<String> {
    if let Some(prompt) = ctx.stores.input.get("prompt")? {
        return Ok(prompt);
    }
    if let Some(prompt) = ctx.stores.input.get("main_prompt")? {
        ctx.console.say("Please put the prompt in the file `prompt`, not `main_prompt`");
        return Ok(prompt);
    }
    Err(StepError::MissingArtifact {
        store: ctx.stores.input.name().to_string(),
        key: "prompt".to_string(),
    }
    .into())
}

fn instructions(prompt: &str) -> String {
    format!("Instructions: {prompt}")
}

/// Decode `reply` into the workspace and tell the operator about anything
/// that did not land.
fn apply_reply(ctx: &StepContext<'_>, reply: &str) -> Result<WriteReport> {
    let report = to_files(reply, &ctx.stores.workspace)?;
    report_writes(ctx, reply, &report);
    Ok(report)
}

fn report_writes(ctx: &StepContext<'_>, reply: &str, report: &WriteReport) {
    let decoded = report.written.len() + report.skipped.len() + report.failed.len();
    if decoded == 0 && !reply.trim().is_empty() {
        ctx.console.say(&format!(
            "No files found in the reply; it was kept as workspace/{ALL_OUTPUT}."
        ));
    }
    for (path, reason) in &report.failed {
        ctx.console.say(&format!("Could not write {path}: {reason}"));
    }
}

fn simple_gen(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let system = system_prompt(&ctx.stores.preprompts)?;
    let prompt = get_prompt(ctx)?;
    let log = ctx.session.start(&system, &prompt, SIMPLE_GEN.name)?;
    apply_reply(ctx, log.last_content())?;
    Ok(log)
}

fn clarify(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let qa = preprompt(&ctx.stores.preprompts, Preprompt::Qa)?;
    let mut log = ConversationLog::from_turns(vec![Turn::system(qa)]);
    let mut user_input = get_prompt(ctx)?;
    let legacy = ctx.config.clarify.legacy_no_prefix;

    loop {
        log = ctx.session.next(log, Some(&user_input), CLARIFY.name)?;
        let reply = log.last_content();
        if is_clarification_done(reply, legacy) {
            ctx.console.say(NOTHING_MORE);
            break;
        }

        ctx.console.say(reply);
        let answer = ctx.console.ask("(answer in text, or \"c\" to move on)\n")?;
        let answer = answer.trim();
        if answer.is_empty() || answer == "c" {
            ctx.console.say("(letting the model make its own assumptions)");
            log = ctx.session.next(log, Some(ASSUME_INSTRUCTION), CLARIFY.name)?;
            ctx.console.say(log.last_content());
            return Ok(log);
        }
        user_input = clarify_followup(answer)?;
    }

    Ok(log)
}

fn gen_spec(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let prompt = get_prompt(ctx)?;
    let log = ConversationLog::from_turns(vec![
        Turn::system(system_prompt(&ctx.stores.preprompts)?),
        Turn::system(instructions(&prompt)),
    ]);
    let spec = preprompt(&ctx.stores.preprompts, Preprompt::Spec)?;
    let log = ctx.session.next(log, Some(&spec), GEN_SPEC.name)?;
    ctx.stores.memory.set("specification", log.last_content())?;
    Ok(log)
}

fn respec(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let mut log = ctx.stores.load_log(GEN_SPEC.name)?;
    log.push(Turn::system(preprompt(
        &ctx.stores.preprompts,
        Preprompt::Respec,
    )?));
    let log = ctx.session.next(log, None, RESPEC.name)?;
    let log = ctx.session.next(log, Some(REITERATE_SPEC), RESPEC.name)?;
    ctx.stores.memory.set("specification", log.last_content())?;
    Ok(log)
}

fn gen_unit_tests(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let prompt = get_prompt(ctx)?;
    let specification = ctx.stores.memory.require("specification")?;
    let log = ConversationLog::from_turns(vec![
        Turn::system(system_prompt(&ctx.stores.preprompts)?),
        Turn::user(instructions(&prompt)),
        Turn::user(format!("Specification:\n\n{specification}")),
    ]);
    let unit_tests = preprompt(&ctx.stores.preprompts, Preprompt::UnitTests)?;
    let log = ctx.session.next(log, Some(&unit_tests), GEN_UNIT_TESTS.name)?;
    ctx.stores.memory.set("unit_tests", log.last_content())?;
    apply_reply(ctx, log.last_content())?;
    Ok(log)
}

fn gen_clarified_code(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let clarified = ctx.stores.load_log(CLARIFY.name)?;
    let mut log = ConversationLog::from_turns(vec![Turn::system(system_prompt(
        &ctx.stores.preprompts,
    )?)]);
    log.extend(clarified.without_leading(1).turns().iter().cloned());
    let use_qa = preprompt(&ctx.stores.preprompts, Preprompt::UseQa)?;
    let log = ctx.session.next(log, Some(&use_qa), GEN_CLARIFIED_CODE.name)?;
    apply_reply(ctx, log.last_content())?;
    Ok(log)
}

fn gen_code(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let prompt = get_prompt(ctx)?;
    let specification = ctx.stores.memory.require("specification")?;
    let unit_tests = ctx.stores.memory.require("unit_tests")?;
    let log = ConversationLog::from_turns(vec![
        Turn::system(system_prompt(&ctx.stores.preprompts)?),
        Turn::user(instructions(&prompt)),
        Turn::user(format!("Specification:\n\n{specification}")),
        Turn::user(format!("Unit tests:\n\n{unit_tests}")),
    ]);
    let use_qa = preprompt(&ctx.stores.preprompts, Preprompt::UseQa)?;
    let log = ctx.session.next(log, Some(&use_qa), GEN_CODE.name)?;
    apply_reply(ctx, log.last_content())?;
    Ok(log)
}

fn fix_code(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let code_output = ctx
        .stores
        .load_log(GEN_CODE.name)?
        .last_content()
        .to_string();
    let prompt = get_prompt(ctx)?;
    let log = ConversationLog::from_turns(vec![
        Turn::system(system_prompt(&ctx.stores.preprompts)?),
        Turn::user(instructions(&prompt)),
        Turn::user(code_output),
        Turn::system(preprompt(&ctx.stores.preprompts, Preprompt::FixCode)?),
    ]);
    let log = ctx.session.next(log, Some(FIX_REQUEST), FIX_CODE.name)?;
    apply_reply(ctx, log.last_content())?;
    Ok(log)
}

fn gen_entrypoint(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let codebase = ctx.stores.workspace.require(ALL_OUTPUT)?;
    let system = preprompt(&ctx.stores.preprompts, Preprompt::Entrypoint)?;
    let log = ctx.session.start(
        &system,
        &format!("Information about the codebase:\n\n{codebase}"),
        GEN_ENTRYPOINT.name,
    )?;
    let commands = extract_code_blocks(log.last_content());
    if commands.trim().is_empty() {
        warn!("entrypoint reply contained no code blocks");
        ctx.console.say("The model returned no commands; the entrypoint is empty.");
    }
    ctx.stores.workspace.set(&ctx.config.execute.entrypoint, &commands)?;
    Ok(log)
}

fn execute_entrypoint(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let entrypoint = &ctx.config.execute.entrypoint;
    let command = ctx.stores.workspace.require(entrypoint)?;

    ctx.console.say("Do you want to execute this code?\n");
    ctx.console.say(&command);
    ctx.console.say("\nIf yes, press enter. Otherwise, type \"no\"\n");
    let answer = ctx.console.ask("")?;
    if !matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes") {
        ctx.console.say("Ok, not executing the code.");
        return Ok(ConversationLog::new());
    }

    ctx.console.say("Executing the code...\n");
    ctx.console.say(
        "Note: If it does not work as expected, consider running the code in another way than above.\n",
    );
    ctx.console.say("You can press ctrl+c *once* to stop the execution.\n");

    let mut cmd = Command::new(&ctx.config.execute.shell);
    cmd.arg(entrypoint).current_dir(ctx.stores.workspace.root());
    match run_interruptible(cmd)? {
        RunExit::Exited(status) if status.success() => {
            info!("entrypoint finished");
        }
        RunExit::Exited(status) => {
            warn!(exit_code = ?status.code(), "entrypoint failed");
            ctx.console.say(&format!(
                "Execution finished with exit code {}.",
                status
                    .code()
                    .map_or_else(|| "unknown".to_string(), |code| code.to_string())
            ));
        }
        RunExit::Interrupted => {
            ctx.console.say("\nStopping execution.\nExecution stopped.\n");
        }
    }
    Ok(ConversationLog::new())
}

fn human_review(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let review = collect_review(ctx.console)?;
    ctx.stores.memory.set(REVIEW_KEY, &review.to_json()?)?;
    Ok(ConversationLog::new())
}

fn ask_feedback(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let review = match ctx.stores.memory.get(REVIEW_KEY)? {
        Some(raw) => Some(Review::from_json(&raw)?),
        None => None,
    };
    match &review {
        Some(review) => ctx
            .console
            .say(&format!("The most recent review was:\n{}\n", review.summary())),
        None => ctx.console.say("There is no review yet.\n"),
    }

    let answer = ctx
        .console
        .ask("Press enter to use the review as feedback, or type a new one: ")?;
    let feedback = if !answer.trim().is_empty() {
        answer
    } else if let Some(review) = review {
        review.summary()
    } else {
        return Err(StepError::MissingArtifact {
            store: ctx.stores.memory.name().to_string(),
            key: REVIEW_KEY.to_string(),
        }
        .into());
    };
    ctx.stores.input.set("feedback", &feedback)?;
    Ok(ConversationLog::new())
}

fn use_feedback(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let prompt = get_prompt(ctx)?;
    let previous = ctx.stores.workspace.require(ALL_OUTPUT)?;
    let feedback = ctx.stores.input.require("feedback")?;
    let log = ConversationLog::from_turns(vec![
        Turn::system(system_prompt(&ctx.stores.preprompts)?),
        Turn::user(instructions(&prompt)),
        Turn::assistant(previous),
        Turn::system(preprompt(&ctx.stores.preprompts, Preprompt::UseFeedback)?),
    ]);
    let log = ctx.session.next(log, Some(&feedback), USE_FEEDBACK.name)?;
    apply_reply(ctx, log.last_content())?;
    Ok(log)
}

fn improve_existing_code(ctx: &StepContext<'_>) -> Result<ConversationLog> {
    let prompt = get_prompt(ctx)?;
    let files = parse_file_list(&ctx.stores.input.require("file_list")?);
    if files.is_empty() {
        bail!("file_list names no files to improve");
    }
    let encoded = encode_files(&ctx.stores.workspace, &files)?;
    let log = ConversationLog::from_turns(vec![
        Turn::system(preprompt(&ctx.stores.preprompts, Preprompt::Improve)?),
        Turn::user(encoded),
    ]);
    let log = ctx.session.next(
        log,
        Some(&format!("Request: {prompt}")),
        IMPROVE_EXISTING_CODE.name,
    )?;

    let reply = log.last_content();
    let report = to_selected_files(reply, &ctx.stores.workspace, &files)?;
    report_writes(ctx, reply, &report);
    if !report.skipped.is_empty() {
        ctx.console.say(&format!(
            "Ignored files not in file_list: {}",
            report.skipped.join(", ")
        ));
    }
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;
    use crate::engine::run_steps;
    use crate::io::config::GenConfig;
    use crate::test_support::{ScriptedConsole, ScriptedSession, TestProject};

    struct Fixture {
        project: TestProject,
        config: GenConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let project = TestProject::new().expect("project");
            project.write_input("prompt", "build a CLI calculator");
            Self {
                project,
                config: GenConfig::default(),
            }
        }

        fn run(
            &self,
            steps: &[Step],
            session: &ScriptedSession,
            console: &ScriptedConsole,
        ) -> Result<()> {
            let stores = self.project.stores();
            let ctx = StepContext {
                session,
                stores: &stores,
                console,
                config: &self.config,
            };
            run_steps(steps, &ctx)
        }
    }

    const CODE_REPLY: &str = "main.py\n```python\nprint(1)\n```\n";

    #[test]
    fn simple_gen_writes_files_and_full_reply() {
        let fx = Fixture::new();
        let session = ScriptedSession::new([CODE_REPLY]);
        let console = ScriptedConsole::new(Vec::<String>::new());
        fx.run(&[SIMPLE_GEN], &session, &console).expect("run");

        let stores = fx.project.stores();
        assert_eq!(stores.workspace.require("main.py").expect("main"), "print(1)");
        assert_eq!(stores.workspace.require(ALL_OUTPUT).expect("all"), CODE_REPLY);
        let request = &session.requests()[0];
        assert_eq!(request.label, "simple_gen");
        assert_eq!(request.turns[1], Turn::user("build a CLI calculator"));
    }

    #[test]
    fn prose_only_reply_tells_operator_no_files_were_found() {
        let fx = Fixture::new();
        let session = ScriptedSession::new(["I would need more details first."]);
        let console = ScriptedConsole::new(Vec::<String>::new());
        fx.run(&[SIMPLE_GEN], &session, &console).expect("run");

        assert!(console.output().contains("No files found in the reply"));
        let stores = fx.project.stores();
        assert_eq!(stores.workspace.keys().expect("keys"), vec![ALL_OUTPUT]);
    }

    #[test]
    fn files_in_reply_are_not_reported_missing() {
        let fx = Fixture::new();
        let session = ScriptedSession::new([CODE_REPLY]);
        let console = ScriptedConsole::new(Vec::<String>::new());
        fx.run(&[SIMPLE_GEN], &session, &console).expect("run");

        assert!(!console.output().contains("No files found"));
    }

    #[test]
    fn legacy_main_prompt_is_used_with_a_warning() {
        let project = TestProject::new().expect("project");
        project.write_input("main_prompt", "old style");
        let config = GenConfig::default();
        let session = ScriptedSession::new([CODE_REPLY]);
        let console = ScriptedConsole::new(Vec::<String>::new());
        let stores = project.stores();
        let ctx = StepContext {
            session: &session,
            stores: &stores,
            console: &console,
            config: &config,
        };
        run_steps(&[SIMPLE_GEN], &ctx).expect("run");
        assert!(console.output().contains("not `main_prompt`"));
        assert_eq!(session.requests()[0].turns[1].content(), "old style");
    }

    #[test]
    fn missing_prompt_is_a_precondition_failure() {
        let project = TestProject::new().expect("project");
        let config = GenConfig::default();
        let session = ScriptedSession::new(Vec::<String>::new());
        let console = ScriptedConsole::new(Vec::<String>::new());
        let stores = project.stores();
        let ctx = StepContext {
            session: &session,
            stores: &stores,
            console: &console,
            config: &config,
        };
        let err = run_steps(&[GEN_SPEC], &ctx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StepError>(),
            Some(StepError::MissingArtifact { key, .. }) if key == "prompt"
        ));
        assert!(session.requests().is_empty());
    }

    #[test]
    fn clarify_stops_on_sentinel_after_answers() {
        let fx = Fixture::new();
        let session = ScriptedSession::new(["Which operators?", "Nothing more to clarify."]);
        let console = ScriptedConsole::new(["+ and -"]);
        fx.run(&[CLARIFY], &session, &console).expect("run");

        let log = fx.project.stores().load_log("clarify").expect("log");
        assert_eq!(log.len(), 5);
        assert_eq!(log.turns()[0].role(), Role::System);
        assert!(log.turns()[3].content().starts_with("+ and -\n\nIs anything else unclear?"));
        assert!(console.is_exhausted());
    }

    #[test]
    fn clarify_continue_asks_model_to_assume() {
        let fx = Fixture::new();
        let session = ScriptedSession::new(["Which operators?", "Assuming + - * /."]);
        let console = ScriptedConsole::new(["c"]);
        fx.run(&[CLARIFY], &session, &console).expect("run");

        let requests = session.requests();
        assert_eq!(requests[1].turns.last().map(Turn::content), Some(ASSUME_INSTRUCTION));
        assert_eq!(
            fx.project.stores().load_log("clarify").expect("log").last_content(),
            "Assuming + - * /."
        );
    }

    #[test]
    fn clarify_no_prefix_only_terminates_in_legacy_mode() {
        let fx = Fixture::new();
        let session = ScriptedSession::new(["No, but which base?", "Nothing more to clarify."]);
        let console = ScriptedConsole::new(["decimal"]);
        fx.run(&[CLARIFY], &session, &console).expect("run");
        assert_eq!(session.requests().len(), 2);

        let mut legacy = Fixture::new();
        legacy.config.clarify.legacy_no_prefix = true;
        let session = ScriptedSession::new(["No, but which base?"]);
        let console = ScriptedConsole::new(Vec::<String>::new());
        legacy.run(&[CLARIFY], &session, &console).expect("run");
        assert_eq!(session.requests().len(), 1);
    }

    #[test]
    fn gen_clarified_code_replaces_priming_turn() {
        let fx = Fixture::new();
        let session = ScriptedSession::new(["Nothing more to clarify.", CODE_REPLY]);
        let console = ScriptedConsole::new(Vec::<String>::new());
        fx.run(&[CLARIFY, GEN_CLARIFIED_CODE], &session, &console).expect("run");

        let sent = &session.requests()[1].turns;
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].role(), Role::System);
        assert!(sent[0].content().contains("Useful to know:"));
        assert_eq!(sent[1], Turn::user("build a CLI calculator"));
        assert_eq!(sent[2], Turn::assistant("Nothing more to clarify."));
        assert!(fx.project.stores().workspace.contains("main.py"));
    }

    #[test]
    fn respec_without_gen_spec_log_is_missing_dependency() {
        let fx = Fixture::new();
        let session = ScriptedSession::new(Vec::<String>::new());
        let console = ScriptedConsole::new(Vec::<String>::new());
        let err = fx.run(&[RESPEC], &session, &console).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StepError>(),
            Some(StepError::MissingLog { step }) if step == "gen_spec"
        ));
    }

    #[test]
    fn respec_continues_gen_spec_conversation() {
        let fx = Fixture::new();
        let session = ScriptedSession::new(["spec v1", "looks fine", "spec v2"]);
        let console = ScriptedConsole::new(Vec::<String>::new());
        fx.run(&[GEN_SPEC, RESPEC], &session, &console).expect("run");

        let requests = session.requests();
        assert_eq!(requests[1].turns.len(), 5);
        assert_eq!(requests[1].turns[3], Turn::assistant("spec v1"));
        assert_eq!(requests[2].turns.last().map(Turn::content), Some(REITERATE_SPEC));
        assert_eq!(
            fx.project.stores().memory.require("specification").expect("spec"),
            "spec v2"
        );
    }

    #[test]
    fn fix_code_builds_on_gen_code_output() {
        let fx = Fixture::new();
        let stores = fx.project.stores();
        stores.memory.set("specification", "S").expect("spec");
        stores.memory.set("unit_tests", "T").expect("tests");
        let session = ScriptedSession::new([CODE_REPLY, "main.py\n```python\nprint(2)\n```\n"]);
        let console = ScriptedConsole::new(Vec::<String>::new());
        fx.run(&[GEN_CODE, FIX_CODE], &session, &console).expect("run");

        let sent = &session.requests()[1].turns;
        assert_eq!(sent[2], Turn::user(CODE_REPLY));
        assert_eq!(sent.last().map(Turn::content), Some(FIX_REQUEST));
        assert_eq!(stores.workspace.require("main.py").expect("main"), "print(2)");
    }

    #[test]
    fn gen_entrypoint_extracts_all_code_blocks() {
        let fx = Fixture::new();
        fx.project.stores().workspace.set(ALL_OUTPUT, CODE_REPLY).expect("seed");
        let session = ScriptedSession::new([
            "Install:\n```sh\npip install -r requirements.txt\n```\nRun:\n```\npython main.py\n```\n",
        ]);
        let console = ScriptedConsole::new(Vec::<String>::new());
        fx.run(&[GEN_ENTRYPOINT], &session, &console).expect("run");

        assert_eq!(
            fx.project.stores().workspace.require("run.sh").expect("run.sh"),
            "pip install -r requirements.txt\n\npython main.py\n"
        );
        assert!(
            session.requests()[0].turns[1]
                .content()
                .starts_with("Information about the codebase:\n\nmain.py")
        );
    }

    #[test]
    fn execute_entrypoint_declined_runs_nothing() {
        let fx = Fixture::new();
        fx.project
            .stores()
            .workspace
            .set("run.sh", "touch ran.txt")
            .expect("seed");
        let session = ScriptedSession::new(Vec::<String>::new());
        let console = ScriptedConsole::new(["no"]);
        fx.run(&[EXECUTE_ENTRYPOINT], &session, &console).expect("run");

        assert!(console.output().contains("Ok, not executing the code."));
        assert!(!fx.project.stores().workspace.contains("ran.txt"));
    }

    #[test]
    fn execute_entrypoint_failure_is_reported_not_fatal() {
        let fx = Fixture::new();
        fx.project
            .stores()
            .workspace
            .set("run.sh", "touch ran.txt\nexit 7")
            .expect("seed");
        let session = ScriptedSession::new(Vec::<String>::new());
        let console = ScriptedConsole::new([""]);
        fx.run(&[EXECUTE_ENTRYPOINT], &session, &console).expect("run");

        assert!(fx.project.stores().workspace.contains("ran.txt"));
        assert!(console.output().contains("exit code 7"));
    }

    #[test]
    fn feedback_defaults_to_review_summary() {
        let fx = Fixture::new();
        let session = ScriptedSession::new(Vec::<String>::new());
        let console = ScriptedConsole::new(["n", "it crashes", ""]);
        fx.run(&[HUMAN_REVIEW, ASK_FEEDBACK], &session, &console).expect("run");

        let feedback = fx.project.stores().input.require("feedback").expect("feedback");
        assert!(feedback.starts_with("Ran: no."));
        assert!(feedback.contains("it crashes"));
    }

    #[test]
    fn feedback_without_review_or_answer_aborts() {
        let fx = Fixture::new();
        let session = ScriptedSession::new(Vec::<String>::new());
        let console = ScriptedConsole::new([""]);
        let err = fx.run(&[ASK_FEEDBACK], &session, &console).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StepError>(),
            Some(StepError::MissingArtifact { key, .. }) if key == "review"
        ));
    }

    #[test]
    fn use_feedback_replays_previous_output() {
        let fx = Fixture::new();
        let stores = fx.project.stores();
        stores.workspace.set(ALL_OUTPUT, CODE_REPLY).expect("seed");
        fx.project.write_input("feedback", "print two instead");
        let session = ScriptedSession::new(["main.py\n```python\nprint(2)\n```\n"]);
        let console = ScriptedConsole::new(Vec::<String>::new());
        fx.run(&[USE_FEEDBACK], &session, &console).expect("run");

        let sent = &session.requests()[0].turns;
        assert_eq!(sent[2], Turn::assistant(CODE_REPLY));
        assert_eq!(sent[4], Turn::user("print two instead"));
        assert_eq!(stores.workspace.require("main.py").expect("main"), "print(2)");
    }

    #[test]
    fn improve_only_touches_listed_files() {
        let fx = Fixture::new();
        let stores = fx.project.stores();
        stores.workspace.set("main.py", "print(1)").expect("seed");
        stores.workspace.set("util.py", "X = 1").expect("seed");
        fx.project.write_input("file_list", "main.py\n");
        let session = ScriptedSession::new([
            "main.py\n```python\nprint(3)\n```\n\nutil.py\n```python\nX = 2\n```\n",
        ]);
        let console = ScriptedConsole::new(Vec::<String>::new());
        fx.run(&[IMPROVE_EXISTING_CODE], &session, &console).expect("run");

        assert_eq!(stores.workspace.require("main.py").expect("main"), "print(3)");
        assert_eq!(stores.workspace.require("util.py").expect("util"), "X = 1");
        assert!(console.output().contains("Ignored files not in file_list: util.py"));
        assert!(session.requests()[0].turns[1].content().starts_with("main.py\n```python\n"));
    }
}
