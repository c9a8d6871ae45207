use std::io::{IsTerminal, Read};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{Level, LogLevel};
use indicatif::{ProgressBar, ProgressFinish};
use tracing::info;

use crate::bedrock::{BedrockClient, BedrockConfig};
use crate::constants::{DEFAULT_SYSTEM_PROMPT, USER_INPUT_VARIABLE};
use crate::prompt::{ChatPromptTemplate, SystemPromptParts, TemplateVars};
use crate::runner::GenerationRunner;
use crate::settings::Settings;
use crate::system_info::SystemFacts;

/// Default log level, taken from the `verbosity` setting.
#[derive(Debug)]
pub struct ConfigLogLevel {}

impl LogLevel for ConfigLogLevel {
    fn default() -> Option<Level> {
        let level = Settings::new()
            .ok()
            .and_then(|settings| settings.verbosity)
            .and_then(|verbosity| verbosity.parse::<Level>().ok())
            .unwrap_or(Level::Warn);
        Some(level)
    }
}

/// Bedrock-powered AI assistant for command-line usage.
///
/// Answers questions, generates code and helps with tasks directly from the
/// terminal. With --env the assistant is told about your OS, shell and
/// available resources.
#[derive(Parser, Debug)]
#[command(name = "bedrock", author, version, about, long_about)]
pub struct CliArgs {
    /// System prompt for the AI assistant
    #[arg(short = 'p', long)]
    pub system_prompt: Option<String>,

    /// AWS region
    #[arg(short, long)]
    pub region: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// Maximum number of tokens to generate
    #[arg(short, long)]
    pub max_tokens: Option<i32>,

    /// Bedrock model id
    #[arg(long)]
    pub model_id: Option<String>,

    /// Wait for the whole response instead of streaming it
    #[arg(long)]
    pub no_streaming: bool,

    /// Read the output of a previous command from stdin
    #[arg(short = 'o', long)]
    pub stdin: bool,

    /// Tell the assistant about this system and its environment variables
    #[arg(short, long)]
    pub env: bool,

    /// Answer as Skippy the Magnificent
    #[arg(short, long)]
    pub skippy_mode: bool,

    /// Print token usage and cost after the response
    #[arg(short = 'k', long)]
    pub show_tokens_used: bool,

    /// Enable tracing (generates a trace-timestamp.json file).
    #[arg(long)]
    pub tracing: bool,

    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<ConfigLogLevel>,

    /// The request for the assistant
    #[arg(required = true)]
    pub user_input: Vec<String>,
}

pub struct AiCli {
    settings: Settings,
    args: CliArgs,
    start: Instant,
}

impl AiCli {
    pub fn new(settings: Settings, args: CliArgs, start: Option<Instant>) -> Self {
        Self {
            settings,
            args,
            start: start.unwrap_or_else(Instant::now),
        }
    }

    pub fn exec(self) -> Result<()> {
        let piped_input = if self.args.stdin {
            Some(read_stdin()?)
        } else {
            None
        };
        let facts = self.args.env.then(SystemFacts::collect);
        let system_prompt = self.system_prompt_parts(facts, piped_input).assemble();

        let vars = TemplateVars::new().with_text(USER_INPUT_VARIABLE, self.user_input());
        let messages = ChatPromptTemplate::for_cli(&system_prompt)
            .format_messages(&vars)
            .context("Unable to format prompt messages")?;
        info!("Prepared {} messages in {:?}", messages.len(), self.start.elapsed());

        let config = self.bedrock_config();
        tokio::runtime::Runtime::new()?.block_on(async {
            let client = BedrockClient::connect(config).await;
            let mut runner = GenerationRunner::new(tokio::io::stdout());
            if let Some(spinner) = waiting_spinner() {
                runner = runner.with_spinner(spinner);
            }

            runner
                .respond(
                    client.generate(&messages),
                    self.args.show_tokens_used,
                    &self.settings.cost_rates,
                )
                .await?;
            info!("generated the output in {:?}", self.start.elapsed());
            Ok::<(), anyhow::Error>(())
        })
    }

    /// Positional words joined by single spaces.
    pub fn user_input(&self) -> String {
        self.args.user_input.join(" ")
    }

    /// CLI flag, then the configured prompt, then the built-in default.
    pub fn system_prompt_parts(
        &self,
        facts: Option<SystemFacts>,
        piped_input: Option<String>,
    ) -> SystemPromptParts {
        let base = self
            .args
            .system_prompt
            .as_deref()
            .or(self.settings.model_config.system_prompt.as_deref())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        SystemPromptParts::new(base)
            .with_persona(self.args.skippy_mode)
            .with_environment(facts)
            .with_piped_input(piped_input)
    }

    /// Flags take precedence over settings.
    pub fn bedrock_config(&self) -> BedrockConfig {
        let model = &self.settings.model_config;
        BedrockConfig {
            region: self
                .args
                .region
                .clone()
                .unwrap_or_else(|| self.settings.aws_settings.region.clone()),
            profile: self.settings.aws_settings.profile.clone(),
            model_id: self.args.model_id.clone().unwrap_or_else(|| model.model_id.clone()),
            temperature: self.args.temperature.unwrap_or(model.temperature),
            max_tokens: self.args.max_tokens.unwrap_or(model.max_tokens),
            streaming: model.streaming && !self.args.no_streaming,
        }
    }
}

fn read_stdin() -> Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Unable to read from stdin")?;
    info!("Read {} bytes from stdin", input.len());
    Ok(input)
}

fn waiting_spinner() -> Option<ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let spinner = ProgressBar::new_spinner().with_finish(ProgressFinish::AndClear);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Some(spinner)
}
