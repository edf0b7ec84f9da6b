//! Tool and resource definitions for the image-generation server.

use async_trait::async_trait;
use aztp_mcp::{
    ResourceContents, ResourceDescriptor, ResponseEnvelope, ToolDescriptor, ToolFailure,
    ToolResult, ToolSet,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::client::{fetch_with_polling, EverArtApi, GenerationRequest, PollConfig};

pub const GENERATE_TOOL: &str = "generate_image";
pub const IDENTITY_TOOL: &str = "get_everart_aztp_identity";

pub const IMAGES_URI: &str = "everart://images";
const IMAGES_MIME: &str = "image/png";

pub const DEFAULT_MODEL: &str = "5000";

#[derive(Debug, Deserialize)]
pub struct GenerateArgs {
    pub prompt: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_image_count")]
    pub image_count: u32,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_image_count() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(tag = "name", content = "arguments")]
pub enum EverArtCall {
    #[serde(rename = "generate_image")]
    Generate(GenerateArgs),
}

pub struct EverArtTools<A> {
    api: A,
    poll: PollConfig,
}

impl<A: EverArtApi> EverArtTools<A> {
    pub fn new(api: A, poll: PollConfig) -> Self {
        Self { api, poll }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    async fn generate(&self, args: GenerateArgs) -> ToolResult {
        let request = GenerationRequest::txt2img(&args.model, &args.prompt, args.image_count);
        let created = self.api.create_generation(&request).await?;
        let first = created
            .first()
            .ok_or_else(|| ToolFailure::provider("No generation returned"))?;

        let completed = fetch_with_polling(&self.api, &first.id, self.poll).await?;
        let image_url = completed
            .image_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ToolFailure::provider("No image URL"))?;
        info!(id = %completed.id, "image generated");

        Ok(ResponseEnvelope::text(format!(
            "Image generated successfully!\n\nGeneration details:\n- Model: {}\n- Prompt: \"{}\"\n- Image URL: {image_url}\n\nOpen the URL above to view the image.",
            args.model, args.prompt
        )))
    }
}

#[async_trait]
impl<A: EverArtApi> ToolSet for EverArtTools<A> {
    type Call = EverArtCall;

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            GENERATE_TOOL,
            "Generate images using EverArt Models and returns a clickable link to view the generated image. \
             Available models:\n\
             - 5000:FLUX1.1: Standard quality\n\
             - 9000:FLUX1.1-ultra: Ultra high quality\n\
             - 6000:SD3.5: Stable Diffusion 3.5\n\
             - 7000:Recraft-Real: Photorealistic style\n\
             - 8000:Recraft-Vector: Vector art style\n\
             \nThe response will contain a direct link to view the generated image.",
            json!({
                "type": "object",
                "properties": {
                    "prompt": { "type": "string", "description": "Text description of desired image" },
                    "model": {
                        "type": "string",
                        "description": "Model ID (5000:FLUX1.1, 9000:FLUX1.1-ultra, 6000:SD3.5, 7000:Recraft-Real, 8000:Recraft-Vector)",
                        "default": DEFAULT_MODEL
                    },
                    "image_count": { "type": "integer", "description": "Number of images to generate", "default": 1, "minimum": 1 }
                },
                "required": ["prompt"]
            }),
        )]
    }

    async fn call(&self, call: EverArtCall) -> ToolResult {
        match call {
            EverArtCall::Generate(args) => self.generate(args).await,
        }
    }

    fn resources(&self) -> Vec<ResourceDescriptor> {
        vec![ResourceDescriptor {
            uri: IMAGES_URI.into(),
            mime_type: IMAGES_MIME.into(),
            name: "Generated Images".into(),
        }]
    }

    /// The listing resource carries no data of its own.
    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, ToolFailure> {
        if uri != IMAGES_URI {
            return Err(ToolFailure::not_found("Resource not found"));
        }
        Ok(vec![ResourceContents {
            uri: IMAGES_URI.into(),
            mime_type: IMAGES_MIME.into(),
            blob: String::new(),
        }])
    }
}

pub fn identity_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        IDENTITY_TOOL,
        "Get AZTP identity of the everart MCP server. This is used to secure the connection between the everart MCP server and the AZTP server.",
        json!({ "type": "object", "properties": {} }),
    )
}
