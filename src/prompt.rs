//! System prompt assembly.
//!
//! The assembled prompt is itself a template (see [`template`]), so any text
//! that did not come from us (environment values, piped input) has its braces
//! doubled before it is spliced in.

pub mod template;

pub use template::{
    escape_braces, ChatMessage, ChatPromptTemplate, MessageTemplate, PromptTemplate, Role,
    TemplateError, TemplateVars,
};

use crate::constants::SKIPPY_PROMPT;
use crate::system_info::SystemFacts;

/// Renders host facts and the full environment as a tagged block, with every
/// brace escaped.
pub fn build_system_info_block(facts: &SystemFacts) -> String {
    let envs: String = facts
        .env_vars
        .iter()
        .map(|(k, v)| format!("<{k}>{v}</{k}>"))
        .collect();

    let block = format!(
        "
<system_info>
    <os>{}</os>
    <shell>{}</shell>
    <current_working_directory>{}</current_working_directory>
    <free_disk_space>{}</free_disk_space>
    <free_memory>{}</free_memory>
    <cpu_count>{}</cpu_count>
    <cpu_usage>{}</cpu_usage>
    <environment_variables>
        {}
    </environment_variables>
</system_info>
",
        facts.os,
        facts.shell,
        facts.current_dir,
        facts.free_disk_space(),
        facts.free_memory(),
        facts.cpu_count(),
        facts.cpu_usage(),
        envs
    );
    escape_braces(&block)
}

/// The persona replaces the base instruction outright; the two are never
/// combined.
pub fn select_base_instruction(persona_enabled: bool, base: &str) -> &str {
    if persona_enabled {
        SKIPPY_PROMPT
    } else {
        base
    }
}

/// Base instruction, then the environment block, then piped input.
///
/// `env_block` must already be escaped ([`build_system_info_block`] does
/// this); `piped_input` is raw and gets escaped here.
pub fn assemble(base: &str, env_block: Option<&str>, piped_input: Option<&str>) -> String {
    let mut prompt = base.to_string();
    if let Some(block) = env_block {
        prompt.push_str(block);
    }
    if let Some(input) = piped_input {
        prompt.push_str("\n\n<input_from_previous_command>\n");
        prompt.push_str(&escape_braces(input));
        prompt.push_str("\n</input_from_previous_command>");
    }
    prompt
}

/// Everything that goes into one system prompt.
#[derive(Debug, Clone, Default)]
pub struct SystemPromptParts {
    pub base_instruction: String,
    pub persona_overlay: bool,
    pub environment: Option<SystemFacts>,
    pub piped_input: Option<String>,
}

impl SystemPromptParts {
    pub fn new(base_instruction: impl Into<String>) -> Self {
        Self {
            base_instruction: base_instruction.into(),
            ..Default::default()
        }
    }

    pub fn with_persona(mut self, enabled: bool) -> Self {
        self.persona_overlay = enabled;
        self
    }

    pub fn with_environment(mut self, facts: Option<SystemFacts>) -> Self {
        self.environment = facts;
        self
    }

    pub fn with_piped_input(mut self, input: Option<String>) -> Self {
        self.piped_input = input;
        self
    }

    pub fn assemble(&self) -> String {
        let base = select_base_instruction(self.persona_overlay, &self.base_instruction);
        let env_block = self.environment.as_ref().map(build_system_info_block);
        assemble(base, env_block.as_deref(), self.piped_input.as_deref())
    }
}
