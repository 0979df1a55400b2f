//! Prompt material: embedded preprompts with per-project overrides, and the
//! minijinja templates that compose them.

use anyhow::Result;
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::clarify::NOTHING_MORE;
use crate::io::store::FileStore;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const CLASSIFIER_TEMPLATE: &str = include_str!("prompts/classifier.md");
const CLASSIFIER_INPUT_TEMPLATE: &str = include_str!("prompts/classifier_input.md");
const CLARIFY_FOLLOWUP_TEMPLATE: &str = include_str!("prompts/clarify_followup.md");

/// Named instruction texts a step sends to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprompt {
    Generate,
    Philosophy,
    Qa,
    Spec,
    Respec,
    UnitTests,
    UseQa,
    FixCode,
    UseFeedback,
    Improve,
    Entrypoint,
}

impl Preprompt {
    pub const ALL: [Preprompt; 11] = [
        Preprompt::Generate,
        Preprompt::Philosophy,
        Preprompt::Qa,
        Preprompt::Spec,
        Preprompt::Respec,
        Preprompt::UnitTests,
        Preprompt::UseQa,
        Preprompt::FixCode,
        Preprompt::UseFeedback,
        Preprompt::Improve,
        Preprompt::Entrypoint,
    ];

    /// Key of the override file in the project's preprompts store.
    pub fn name(self) -> &'static str {
        match self {
            Preprompt::Generate => "generate",
            Preprompt::Philosophy => "philosophy",
            Preprompt::Qa => "qa",
            Preprompt::Spec => "spec",
            Preprompt::Respec => "respec",
            Preprompt::UnitTests => "unit_tests",
            Preprompt::UseQa => "use_qa",
            Preprompt::FixCode => "fix_code",
            Preprompt::UseFeedback => "use_feedback",
            Preprompt::Improve => "improve",
            Preprompt::Entrypoint => "entrypoint",
        }
    }

    fn embedded(self) -> &'static str {
        match self {
            Preprompt::Generate => include_str!("prompts/generate.md"),
            Preprompt::Philosophy => include_str!("prompts/philosophy.md"),
            Preprompt::Qa => include_str!("prompts/qa.md"),
            Preprompt::Spec => include_str!("prompts/spec.md"),
            Preprompt::Respec => include_str!("prompts/respec.md"),
            Preprompt::UnitTests => include_str!("prompts/unit_tests.md"),
            Preprompt::UseQa => include_str!("prompts/use_qa.md"),
            Preprompt::FixCode => include_str!("prompts/fix_code.md"),
            Preprompt::UseFeedback => include_str!("prompts/use_feedback.md"),
            Preprompt::Improve => include_str!("prompts/improve.md"),
            Preprompt::Entrypoint => include_str!("prompts/entrypoint.md"),
        }
    }
}

/// Preprompt text: the project override when present, else the embedded default.
pub fn preprompt(overrides: &FileStore, which: Preprompt) -> Result<String> {
    if let Some(text) = overrides.get(which.name())? {
        debug!(preprompt = which.name(), "using project override");
        return Ok(text);
    }
    Ok(which.embedded().to_string())
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("classifier", CLASSIFIER_TEMPLATE)
            .expect("classifier template should be valid");
        env.add_template("classifier_input", CLASSIFIER_INPUT_TEMPLATE)
            .expect("classifier input template should be valid");
        env.add_template("clarify_followup", CLARIFY_FOLLOWUP_TEMPLATE)
            .expect("clarify follow-up template should be valid");
        Self { env }
    }
}

/// System prompt for code generation: `generate` plus `philosophy`.
pub fn system_prompt(overrides: &FileStore) -> Result<String> {
    let generate = preprompt(overrides, Preprompt::Generate)?;
    let philosophy = preprompt(overrides, Preprompt::Philosophy)?;
    let engine = PromptEngine::new();
    let rendered = engine.env.get_template("system")?.render(context! {
        generate => generate.trim_end(),
        philosophy => philosophy.trim_end(),
    })?;
    Ok(rendered)
}

/// System and user turns asking the model to classify `text` over `choices`.
pub fn classifier_prompt(choices: &[String], text: &str) -> Result<(String, String)> {
    let engine = PromptEngine::new();
    let system = engine
        .env
        .get_template("classifier")?
        .render(context! { choices => choices })?;
    let user = engine
        .env
        .get_template("classifier_input")?
        .render(context! { text => text.trim() })?;
    Ok((system, user))
}

/// Operator answer plus the instruction to continue or send the sentinel.
pub fn clarify_followup(answer: &str) -> Result<String> {
    let engine = PromptEngine::new();
    let rendered = engine
        .env
        .get_template("clarify_followup")?
        .render(context! { answer => answer, sentinel => NOTHING_MORE })?;
    Ok(rendered)
}
