use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseStreamOutput, InferenceConfiguration, Message,
    StopReason, SystemContentBlock, TokenUsage,
};
use aws_sdk_bedrockruntime::Client;

use anyhow::Result;
use futures::stream::{self, LocalBoxStream, StreamExt};
use tracing::{debug, info, warn};

use crate::prompt::{ChatMessage, Role};
use crate::runner::GenerationEvent;
use crate::usage::UsageCounters;

/// Everything needed to reach the model. Built once per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BedrockConfig {
    pub region: String,
    pub profile: Option<String>,
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: i32,
    pub streaming: bool,
}

pub struct BedrockClient {
    client: Client,
    config: BedrockConfig,
}

impl BedrockClient {
    /// Resolves credentials through the default AWS provider chain.
    pub async fn connect(config: BedrockConfig) -> Self {
        info!("Using region: {}", config.region);
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let Some(profile) = &config.profile {
            info!("Using profile: {}", profile);
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;
        info!("Creating bedrock client");
        Self {
            client: Client::new(&sdk_config),
            config,
        }
    }

    /// Sends `messages` to the model and returns its response as a stream of
    /// events. Without streaming the whole reply arrives as one fragment.
    pub async fn generate(
        &self,
        messages: &[ChatMessage],
    ) -> Result<LocalBoxStream<'static, Result<GenerationEvent>>> {
        let (system, messages) = to_bedrock_messages(messages)?;
        if self.config.streaming {
            self.converse_stream(system, messages).await
        } else {
            self.converse(system, messages).await
        }
    }

    fn inference_config(&self) -> InferenceConfiguration {
        InferenceConfiguration::builder()
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build()
    }

    async fn converse_stream(
        &self,
        system: Vec<SystemContentBlock>,
        messages: Vec<Message>,
    ) -> Result<LocalBoxStream<'static, Result<GenerationEvent>>> {
        info!("Sending streaming request to {}", self.config.model_id);
        let response = self
            .client
            .converse_stream()
            .model_id(&self.config.model_id)
            .set_system(Some(system))
            .set_messages(Some(messages))
            .inference_config(self.inference_config())
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send message: {}", DisplayErrorContext(&e)))?;
        info!("Response received");

        let events = stream::try_unfold(response.stream, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(Some(output)) => {
                        if let Some(event) = to_generation_event(output) {
                            return Ok(Some((event, receiver)));
                        }
                    }
                    // means the stream is complete
                    Ok(None) => return Ok(None),
                    Err(e) => {
                        return Err(anyhow::anyhow!(
                            "Response stream failed: {}",
                            DisplayErrorContext(&e)
                        ))
                    }
                }
            }
        });
        Ok(events.boxed_local())
    }

    async fn converse(
        &self,
        system: Vec<SystemContentBlock>,
        messages: Vec<Message>,
    ) -> Result<LocalBoxStream<'static, Result<GenerationEvent>>> {
        info!("Sending request to {}", self.config.model_id);
        let response = self
            .client
            .converse()
            .model_id(&self.config.model_id)
            .set_system(Some(system))
            .set_messages(Some(messages))
            .inference_config(self.inference_config())
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send message: {}", DisplayErrorContext(&e)))?;
        info!("Response received, stop reason: {:?}", response.stop_reason());

        let text: String = response
            .output()
            .and_then(|output| output.as_message().ok())
            .map(|message| {
                message
                    .content()
                    .iter()
                    .filter_map(|block| block.as_text().ok())
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default();

        let mut events = vec![Ok(GenerationEvent::Text(text))];
        if let Some(usage) = response.usage() {
            events.push(Ok(GenerationEvent::Usage(usage_counters(usage))));
        }
        Ok(stream::iter(events).boxed_local())
    }
}

/// Splits chat messages into Bedrock's separate system blocks and
/// conversation turns.
pub fn to_bedrock_messages(
    messages: &[ChatMessage],
) -> Result<(Vec<SystemContentBlock>, Vec<Message>)> {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for message in messages {
        let role = match message.role {
            Role::System => {
                system.push(SystemContentBlock::Text(message.content.clone()));
                continue;
            }
            Role::User => ConversationRole::User,
            Role::Assistant => ConversationRole::Assistant,
        };
        turns.push(
            Message::builder()
                .role(role)
                .content(ContentBlock::Text(message.content.clone()))
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build message: {}", e))?,
        );
    }
    Ok((system, turns))
}

/// Maps one stream item to an event; anything that is neither text nor
/// usage is logged and skipped.
pub fn to_generation_event(output: ConverseStreamOutput) -> Option<GenerationEvent> {
    match output {
        ConverseStreamOutput::ContentBlockDelta(event) => {
            let delta = event.delta()?;
            debug!("{:?}", delta);
            delta
                .as_text()
                .ok()
                .map(|text| GenerationEvent::Text(text.clone()))
        }
        ConverseStreamOutput::Metadata(e) => {
            debug!("Metadata: {:?}", e);
            e.usage().map(|usage| GenerationEvent::Usage(usage_counters(usage)))
        }
        ConverseStreamOutput::MessageStop(e) => {
            debug!("MessageStop: {:?}", e);
            if e.stop_reason() == &StopReason::MaxTokens {
                warn!("Response was cut off at the max token limit");
            }
            None
        }
        ConverseStreamOutput::MessageStart(e) => {
            debug!("MessageStart: {:?}", e);
            None
        }
        ConverseStreamOutput::ContentBlockStart(e) => {
            debug!("ContentBlockStart: {:?}", e);
            None
        }
        ConverseStreamOutput::ContentBlockStop(e) => {
            debug!("ContentBlockStop: {:?}", e);
            None
        }
        _ => {
            debug!("Received unknown stream event");
            None
        }
    }
}

fn usage_counters(usage: &TokenUsage) -> UsageCounters {
    UsageCounters::new(
        u64::try_from(usage.input_tokens()).unwrap_or(0),
        u64::try_from(usage.output_tokens()).unwrap_or(0),
    )
}
