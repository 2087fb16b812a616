pub mod client;
pub mod config;
pub mod gemini;
pub mod payload;
pub mod prompts;

use anyhow::{bail, Result};
use lumina_contracts::chat::ChatMessage;
use lumina_contracts::events::{emit_optional, EventWriter};
use lumina_contracts::models::{
    ModelSelection, ModelSelector, CHAT_MODEL, FAST_IMAGE_MODEL, PRO_IMAGE_MODEL, THINKING_MODEL,
};
use lumina_contracts::ratio::{resolve_sizing, AspectRatio, Dimensions, SizeTier, Sizing};
use lumina_contracts::sections::{parse_response, ParsedResponse};
use lumina_contracts::store::{
    AddOutcome, ArtifactKind, ArtifactStore, GeneratedArtifact, SavedPrompt, StoreOutcome,
};
use lumina_contracts::{StoreWarning, UpstreamError};
use serde_json::{json, Value};

pub use client::{DryrunClient, EditRequest, ImageRequest, UpstreamClient};
pub use config::LuminaConfig;
pub use gemini::GeminiClient;
pub use payload::{decode_payload, payload_from_file, DecodedPayload, EncodedImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Fast,
    Pro,
}

impl Quality {
    pub fn image_model(self) -> &'static str {
        match self {
            Quality::Fast => FAST_IMAGE_MODEL,
            Quality::Pro => PRO_IMAGE_MODEL,
        }
    }

    pub fn from_preset(preset: &str) -> Option<Self> {
        match preset.trim().to_ascii_lowercase().as_str() {
            "fast" | "free" => Some(Quality::Fast),
            "pro" | "quality" => Some(Quality::Pro),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StudioSettings {
    pub aspect_ratio: AspectRatio,
    pub quality: Quality,
    pub extended_reasoning: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub prompt: String,
    /// Falls back to the studio's current ratio.
    pub ratio: Option<AspectRatio>,
    /// Explicit size; wins over a size written in the prompt.
    pub dimensions: Option<Dimensions>,
    pub quality: Option<Quality>,
    /// Reference image as a data URL.
    pub reference: Option<String>,
    pub negative_prompt: Option<String>,
}

impl GenerateOptions {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    /// Source image as a data URL.
    pub image: String,
    pub prompt: String,
    pub ratio: Option<AspectRatio>,
    pub quality: Option<Quality>,
}

#[derive(Debug, Clone, Default)]
pub struct LogoOptions {
    pub brand: String,
    pub style: Option<String>,
    pub colors: Option<String>,
    pub quality: Option<Quality>,
}

/// A produced image. `artifact` is always displayable; `warning` reports a
/// store problem without failing the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioImage {
    pub artifact: GeneratedArtifact,
    pub warning: Option<StoreWarning>,
    pub persisted: bool,
    pub model: String,
    pub sizing: Sizing,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub message: ChatMessage,
    pub parsed: ParsedResponse,
    pub model: String,
}

struct ImageJob {
    kind: ArtifactKind,
    prompt: String,
    sizing: Sizing,
    quality: Quality,
    reference: Option<String>,
    negative_prompt: Option<String>,
}

/// Wires user actions to the upstream client, the sizing rules, the response
/// parser and the local store.
pub struct Studio {
    client: Box<dyn UpstreamClient>,
    store: ArtifactStore,
    selector: ModelSelector,
    events: Option<EventWriter>,
    settings: StudioSettings,
}

impl Studio {
    pub fn new(client: Box<dyn UpstreamClient>, store: ArtifactStore) -> Self {
        Self {
            client,
            store,
            selector: ModelSelector::new(None),
            events: None,
            settings: StudioSettings::default(),
        }
    }

    /// Dryrun or Gemini client plus the file store under the configured home.
    pub fn from_config(
        config: &LuminaConfig,
        dryrun: bool,
        events: Option<EventWriter>,
    ) -> Result<Self> {
        let client: Box<dyn UpstreamClient> = if dryrun {
            Box::new(DryrunClient::new())
        } else {
            Box::new(GeminiClient::from_config(config)?)
        };
        let studio = Self::new(client, config.open_store(events.clone()));
        Ok(match events {
            Some(events) => studio.with_events(events),
            None => studio,
        })
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn provider(&self) -> &str {
        self.client.provider()
    }

    pub fn settings(&self) -> StudioSettings {
        self.settings
    }

    pub fn settings_mut(&mut self) -> &mut StudioSettings {
        &mut self.settings
    }

    pub fn generate(&mut self, options: GenerateOptions) -> Result<StudioImage> {
        let prompt = options.prompt.trim();
        if prompt.is_empty() {
            bail!("prompt is empty");
        }
        let sizing = resolve_sizing(
            options.dimensions,
            prompt,
            options.ratio.unwrap_or(self.settings.aspect_ratio),
        );
        self.render(ImageJob {
            kind: ArtifactKind::Generated,
            prompt: prompt.to_string(),
            sizing,
            quality: options.quality.unwrap_or(self.settings.quality),
            reference: options.reference,
            negative_prompt: options.negative_prompt,
        })
    }

    pub fn design_logo(&mut self, options: LogoOptions) -> Result<StudioImage> {
        let brand = options.brand.trim();
        if brand.is_empty() {
            bail!("brand name is empty");
        }
        let prompt =
            prompts::logo_prompt(brand, options.style.as_deref(), options.colors.as_deref());
        self.render(ImageJob {
            kind: ArtifactKind::Logo,
            prompt,
            sizing: Sizing {
                ratio: AspectRatio::Square,
                tier: SizeTier::OneK,
                dimensions: None,
            },
            quality: options.quality.unwrap_or(self.settings.quality),
            reference: None,
            negative_prompt: None,
        })
    }

    pub fn edit(&mut self, options: EditOptions) -> Result<StudioImage> {
        let prompt = options.prompt.trim();
        if prompt.is_empty() {
            bail!("edit instruction is empty");
        }
        if payload::split_data_url(&options.image).is_none() {
            bail!("edit source must be a base64 data URL");
        }
        let quality = options.quality.unwrap_or(self.settings.quality);
        let selection = self.select(quality.image_model(), "edit")?;
        let model = selection.model.name.clone();
        let sizing = Sizing {
            ratio: options.ratio.unwrap_or(self.settings.aspect_ratio),
            tier: SizeTier::OneK,
            dimensions: None,
        };
        let metadata = match options.ratio {
            Some(ratio) => format!("{model} · edit · {ratio}"),
            None => format!("{model} · edit"),
        };

        self.emit(
            "generation_started",
            json!({ "kind": ArtifactKind::Edited, "model": model, "prompt": prompt }),
        );
        let result = self.client.edit_image(&EditRequest {
            model: model.clone(),
            image: options.image.clone(),
            prompt: prompt.to_string(),
            ratio: options.ratio,
            pro_tier: quality == Quality::Pro,
        });
        self.finish(ArtifactKind::Edited, prompt, metadata, selection, sizing, result)
    }

    /// Sends `message` to the text model; extended reasoning selects the
    /// thinking model.
    pub fn chat(&mut self, history: &[ChatMessage], message: &str) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            bail!("message is empty");
        }
        let extended = self.settings.extended_reasoning;
        let selection = if extended {
            self.select(THINKING_MODEL, "thinking")?
        } else {
            self.select(CHAT_MODEL, "text")?
        };
        let model = selection.model.name;

        let text = match self
            .client
            .send_chat_message(&model, history, message, extended)
        {
            Ok(text) => text,
            Err(err) => {
                self.emit_failure("CHAT", &model, &err);
                return Err(err.into());
            }
        };
        let parsed = parse_response(&text);
        self.emit(
            "chat_reply",
            json!({
                "model": model,
                "extended_reasoning": extended,
                "enhanced_prompt": parsed.enhanced_prompt.is_some(),
                "style_options": parsed.style_options.len(),
            }),
        );
        Ok(ChatReply {
            message: ChatMessage::model(text),
            parsed,
            model,
        })
    }

    /// Asks the text model for an Enhanced Prompt and Style Suggestions.
    pub fn enhance_prompt(&mut self, prompt: &str) -> Result<ChatReply> {
        if prompt.trim().is_empty() {
            bail!("prompt is empty");
        }
        self.chat(&[], &prompts::enhance_request(prompt))
    }

    pub fn history(&self) -> Vec<GeneratedArtifact> {
        self.store.list_artifacts()
    }

    pub fn artifact(&self, id: &str) -> Option<GeneratedArtifact> {
        self.store.get_artifact(id)
    }

    pub fn delete_artifact(&mut self, id: &str) -> StoreOutcome<Vec<GeneratedArtifact>> {
        self.store.delete_artifact(id)
    }

    pub fn clear_history(&mut self) -> StoreOutcome<()> {
        self.store.clear_artifacts()
    }

    pub fn saved_prompts(&self) -> Vec<SavedPrompt> {
        self.store.list_saved_prompts()
    }

    pub fn save_prompt(&mut self, text: &str, tags: Vec<String>) -> Result<AddOutcome<SavedPrompt>> {
        if text.trim().is_empty() {
            bail!("prompt is empty");
        }
        Ok(self.store.add_saved_prompt_with_tags(text.trim(), tags))
    }

    pub fn delete_saved_prompt(&mut self, id: &str) -> StoreOutcome<Vec<SavedPrompt>> {
        self.store.delete_saved_prompt(id)
    }

    fn render(&mut self, job: ImageJob) -> Result<StudioImage> {
        let selection = self.select(job.quality.image_model(), "image")?;
        let model = selection.model.name.clone();
        // Only the pro path takes an explicit output size.
        let size_tier = (job.quality == Quality::Pro && selection.model.supports_size_tier())
            .then_some(job.sizing.tier);
        let metadata = match size_tier {
            Some(tier) => format!("{model} · {} · {tier}", job.sizing.ratio),
            None => format!("{model} · {}", job.sizing.ratio),
        };

        self.emit(
            "generation_started",
            json!({
                "kind": job.kind,
                "model": model,
                "ratio": job.sizing.ratio,
                "size_tier": size_tier,
                "prompt": job.prompt,
            }),
        );
        let result = self.client.generate_image(&ImageRequest {
            model: model.clone(),
            prompt: job.prompt.clone(),
            ratio: job.sizing.ratio,
            size_tier,
            pro_tier: job.quality == Quality::Pro,
            reference: job.reference,
            negative_prompt: job.negative_prompt,
        });
        self.finish(job.kind, &job.prompt, metadata, selection, job.sizing, result)
    }

    fn finish(
        &mut self,
        kind: ArtifactKind,
        prompt: &str,
        metadata: String,
        selection: ModelSelection,
        sizing: Sizing,
        result: Result<EncodedImage, UpstreamError>,
    ) -> Result<StudioImage> {
        let image = match result {
            Ok(image) => image,
            Err(err) => {
                self.emit_failure(kind.as_str(), &selection.model.name, &err);
                return Err(err.into());
            }
        };
        let outcome = self
            .store
            .add_artifact(kind, image.to_data_url(), prompt, Some(metadata));
        let persisted = outcome.persisted();
        Ok(StudioImage {
            artifact: outcome.item,
            warning: outcome.warning,
            persisted,
            model: selection.model.name,
            sizing,
            fallback_reason: selection.fallback_reason,
        })
    }

    fn select(&self, requested: &str, capability: &str) -> Result<ModelSelection> {
        let selection = self
            .selector
            .select_for_provider(self.client.provider(), Some(requested), capability)
            .map_err(anyhow::Error::msg)?;
        if let Some(reason) = selection.fallback_reason.as_deref() {
            log::debug!("{reason} Using '{}'.", selection.model.name);
        }
        Ok(selection)
    }

    fn emit_failure(&self, kind: &str, model: &str, err: &UpstreamError) {
        self.emit(
            "generation_failed",
            json!({
                "kind": kind,
                "model": model,
                "error": err.to_string(),
                "retryable": err.is_retryable_by_user(),
            }),
        );
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let payload = payload.as_object().cloned().unwrap_or_default();
        emit_optional(self.events.as_ref(), event_type, payload);
    }
}
