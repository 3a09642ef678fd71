//! Concrete LLM client variants, one per backend.

mod anthropic;
mod assistant;
mod gemini;
mod grpc_proxy;
mod ollama;
mod openai;
mod openai_responses;
mod stackspot;

pub use anthropic::ClaudeClient;
pub use assistant::AssistantClient;
pub use gemini::GeminiClient;
pub use grpc_proxy::GrpcProxyClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use openai_responses::OpenAiResponsesClient;
pub use stackspot::StackSpotClient;
