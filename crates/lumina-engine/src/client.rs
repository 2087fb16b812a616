use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lumina_contracts::chat::ChatMessage;
use lumina_contracts::ratio::{pixel_size, resolve_closest_ratio, AspectRatio, SizeTier};
use lumina_contracts::UpstreamError;
use sha2::{Digest, Sha256};

use crate::payload::{decode_payload, EncodedImage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub ratio: AspectRatio,
    /// Only set for models that honour explicit output sizes.
    pub size_tier: Option<SizeTier>,
    pub pro_tier: bool,
    /// Optional reference image as a data URL.
    pub reference: Option<String>,
    pub negative_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub model: String,
    /// Source image as a data URL.
    pub image: String,
    pub prompt: String,
    pub ratio: Option<AspectRatio>,
    pub pro_tier: bool,
}

/// Opaque generation backend. Implementations never retry.
pub trait UpstreamClient: Send + Sync {
    fn provider(&self) -> &str;
    fn generate_image(&self, request: &ImageRequest) -> Result<EncodedImage, UpstreamError>;
    fn edit_image(&self, request: &EditRequest) -> Result<EncodedImage, UpstreamError>;
    fn send_chat_message(
        &self,
        model: &str,
        history: &[ChatMessage],
        message: &str,
        extended_reasoning: bool,
    ) -> Result<String, UpstreamError>;
}

/// Output edge is divided by this so offline images stay small.
const DRYRUN_SCALE: u32 = 8;

/// Offline client: solid-colour PNGs hashed from the prompt and a canned
/// assistant reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunClient;

impl DryrunClient {
    pub fn new() -> Self {
        Self
    }
}

impl UpstreamClient for DryrunClient {
    fn provider(&self) -> &str {
        "dryrun"
    }

    fn generate_image(&self, request: &ImageRequest) -> Result<EncodedImage, UpstreamError> {
        let (width, height) = pixel_size(request.ratio, request.size_tier.unwrap_or_default());
        let seed = request.reference.as_deref().unwrap_or_default();
        render_png(
            width / DRYRUN_SCALE,
            height / DRYRUN_SCALE,
            &request.prompt,
            seed,
        )
    }

    fn edit_image(&self, request: &EditRequest) -> Result<EncodedImage, UpstreamError> {
        let source = decode_payload(&request.image)
            .ok()
            .and_then(|decoded| image::load_from_memory(&decoded.bytes).ok())
            .ok_or_else(|| UpstreamError::generic("edit source is not a decodable image"))?;
        let ratio = request
            .ratio
            .unwrap_or_else(|| resolve_closest_ratio(source.width(), source.height()));
        let (width, height) = match request.ratio {
            Some(_) => {
                let (width, height) = pixel_size(ratio, SizeTier::OneK);
                (width / DRYRUN_SCALE, height / DRYRUN_SCALE)
            }
            None => (source.width(), source.height()),
        };
        render_png(width, height, &request.prompt, &request.image)
    }

    fn send_chat_message(
        &self,
        _model: &str,
        history: &[ChatMessage],
        message: &str,
        extended_reasoning: bool,
    ) -> Result<String, UpstreamError> {
        let subject = message
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("Original prompt:"))
            .and_then(|line| line.strip_prefix("Original prompt:"))
            .unwrap_or(message)
            .trim();
        if subject.is_empty() {
            return Err(UpstreamError::no_result("response"));
        }
        let depth = if extended_reasoning {
            "layered depth and carefully reasoned composition"
        } else {
            "soft cinematic lighting"
        };
        Ok(format!(
            "Here is a richer take on your idea (turn {}).\n\n\
**Enhanced Prompt:** {subject}, rendered with {depth}, fine surface detail and a balanced palette.\n\n\
**Style Suggestions:**\n\
* Photorealistic\n\
* Watercolor illustration\n\
* Neon noir",
            history.len() / 2 + 1
        ))
    }
}

fn render_png(width: u32, height: u32, prompt: &str, seed: &str) -> Result<EncodedImage, UpstreamError> {
    let (r, g, b) = color_from_prompt(prompt, seed);
    let image = RgbImage::from_pixel(width.max(1), height.max(1), Rgb([r, g, b]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| UpstreamError::generic(format!("dryrun image encode failed: {err}")))?;
    Ok(EncodedImage::from_bytes("image/png", &bytes))
}

fn color_from_prompt(prompt: &str, seed: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(seed.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

#[cfg(test)]
mod tests {
    use lumina_contracts::sections::parse_response;

    use super::*;
    use crate::prompts::enhance_request;

    fn image_request(prompt: &str, ratio: AspectRatio, tier: Option<SizeTier>) -> ImageRequest {
        ImageRequest {
            model: "dryrun-image-1".to_string(),
            prompt: prompt.to_string(),
            ratio,
            size_tier: tier,
            pro_tier: false,
            reference: None,
            negative_prompt: None,
        }
    }

    fn decode(image: &EncodedImage) -> anyhow::Result<DynamicImage> {
        let decoded = decode_payload(&image.to_data_url())?;
        Ok(image::load_from_memory(&decoded.bytes)?)
    }

    #[test]
    fn dryrun_image_follows_ratio_and_tier() -> anyhow::Result<()> {
        let client = DryrunClient::new();
        let wide = client.generate_image(&image_request("a", AspectRatio::Wide, None))?;
        let wide = decode(&wide)?;
        assert_eq!((wide.width(), wide.height()), (128, 72));

        let big = client.generate_image(&image_request(
            "a",
            AspectRatio::Square,
            Some(SizeTier::TwoK),
        ))?;
        let big = decode(&big)?;
        assert_eq!((big.width(), big.height()), (256, 256));
        Ok(())
    }

    #[test]
    fn dryrun_colour_is_deterministic_per_prompt() -> anyhow::Result<()> {
        let client = DryrunClient::new();
        let first = client.generate_image(&image_request("fox", AspectRatio::Square, None))?;
        let again = client.generate_image(&image_request("fox", AspectRatio::Square, None))?;
        let other = client.generate_image(&image_request("owl", AspectRatio::Square, None))?;
        assert_eq!(first, again);
        assert_ne!(first, other);
        Ok(())
    }

    #[test]
    fn dryrun_edit_keeps_source_size_without_ratio() -> anyhow::Result<()> {
        let client = DryrunClient::new();
        let source = client.generate_image(&image_request("src", AspectRatio::Tall, None))?;
        let edited = client.edit_image(&EditRequest {
            model: "dryrun-image-1".to_string(),
            image: source.to_data_url(),
            prompt: "add snow".to_string(),
            ratio: None,
            pro_tier: false,
        })?;
        let edited = decode(&edited)?;
        assert_eq!((edited.width(), edited.height()), (72, 128));

        let bad = client.edit_image(&EditRequest {
            model: "dryrun-image-1".to_string(),
            image: "data:image/png;base64,AAAA".to_string(),
            prompt: "add snow".to_string(),
            ratio: None,
            pro_tier: false,
        });
        assert!(matches!(bad, Err(UpstreamError::Generic { .. })));
        Ok(())
    }

    #[test]
    fn dryrun_reply_is_parseable() -> anyhow::Result<()> {
        let client = DryrunClient::new();
        let reply = client.send_chat_message("dryrun-text-1", &[], &enhance_request("a cat"), false)?;
        let parsed = parse_response(&reply);
        assert!(parsed
            .enhanced_prompt
            .unwrap_or_default()
            .starts_with("a cat, rendered with"));
        assert_eq!(
            parsed.style_options,
            vec!["Photorealistic", "Watercolor illustration", "Neon noir"]
        );

        let empty = client.send_chat_message("dryrun-text-1", &[], "   ", true);
        assert!(matches!(empty, Err(UpstreamError::NoResult { .. })));
        Ok(())
    }
}
