pub mod providers;

use herald_core::config::ModelConfig;
use herald_core::Result;

pub use providers::openai::OpenAiGenerator;

/// Create the content generator for the configured provider.
///
/// Every supported provider speaks the OpenAI chat completions dialect.
pub fn create_generator(config: &ModelConfig) -> Result<OpenAiGenerator> {
    OpenAiGenerator::from_config(config)
}
