use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

use crate::constants::{CHAT_HISTORY_VARIABLE, USER_INPUT_VARIABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("missing value for template variable `{0}`")]
    MissingVariable(String),
    #[error("single '{{' at byte {0} is not closed")]
    UnclosedBrace(usize),
    #[error("single '}}' at byte {0} has no matching '{{'")]
    UnmatchedClosingBrace(usize),
    #[error("empty placeholder at byte {0}")]
    EmptyPlaceholder(usize),
    #[error("invalid placeholder pattern: {0}")]
    InvalidPattern(String),
}

/// Doubles every `{` and `}` so the text renders back verbatim.
pub fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// Values available to a template while it renders.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    text: HashMap<String, String>,
    messages: HashMap<String, Vec<ChatMessage>>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.text.insert(name.into(), value.into());
        self
    }

    pub fn with_messages(mut self, name: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        self.messages.insert(name.into(), messages);
        self
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.text.get(name).map(String::as_str)
    }

    pub fn messages(&self, name: &str) -> Option<&[ChatMessage]> {
        self.messages.get(name).map(Vec::as_slice)
    }
}

/// A single-message template: `{name}` substitutes a variable, `{{` and `}}`
/// produce literal braces. Substituted values are inserted as-is.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, vars: &TemplateVars) -> Result<String, TemplateError> {
        let pattern = Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]")
            .map_err(|e| TemplateError::InvalidPattern(e.to_string()))?;
        let mut out = String::with_capacity(self.template.len());
        let mut last = 0;

        for caps in pattern.captures_iter(&self.template) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&self.template[last..whole.start()]);
            last = whole.end();

            match (whole.as_str(), caps.get(1)) {
                ("{{", _) => out.push('{'),
                ("}}", _) => out.push('}'),
                (_, Some(name)) if name.as_str().is_empty() => {
                    return Err(TemplateError::EmptyPlaceholder(whole.start()))
                }
                (_, Some(name)) => {
                    let value = vars
                        .text(name.as_str())
                        .ok_or_else(|| TemplateError::MissingVariable(name.as_str().to_string()))?;
                    out.push_str(value);
                }
                ("{", None) => return Err(TemplateError::UnclosedBrace(whole.start())),
                _ => return Err(TemplateError::UnmatchedClosingBrace(whole.start())),
            }
        }
        out.push_str(&self.template[last..]);
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub enum MessageTemplate {
    System(PromptTemplate),
    Human(PromptTemplate),
    /// Expands to the messages stored under the variable, or to nothing.
    Placeholder(String),
}

impl MessageTemplate {
    pub fn format(&self, vars: &TemplateVars) -> Result<Vec<ChatMessage>, TemplateError> {
        match self {
            MessageTemplate::System(t) => Ok(vec![ChatMessage::new(Role::System, t.render(vars)?)]),
            MessageTemplate::Human(t) => Ok(vec![ChatMessage::new(Role::User, t.render(vars)?)]),
            MessageTemplate::Placeholder(name) => {
                Ok(vars.messages(name).map(<[_]>::to_vec).unwrap_or_default())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    messages: Vec<MessageTemplate>,
}

impl ChatPromptTemplate {
    pub fn new(messages: Vec<MessageTemplate>) -> Self {
        Self { messages }
    }

    /// System prompt, prior turns, then the user's request.
    pub fn for_cli(system_prompt: &str) -> Self {
        Self::new(vec![
            MessageTemplate::System(PromptTemplate::new(system_prompt)),
            MessageTemplate::Placeholder(CHAT_HISTORY_VARIABLE.to_string()),
            MessageTemplate::Human(PromptTemplate::new(format!("{{{USER_INPUT_VARIABLE}}}"))),
        ])
    }

    pub fn format_messages(&self, vars: &TemplateVars) -> Result<Vec<ChatMessage>, TemplateError> {
        let mut result = Vec::new();
        for template in &self.messages {
            result.extend(template.format(vars)?);
        }
        Ok(result)
    }
}
