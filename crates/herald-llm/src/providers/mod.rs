pub mod openai;
pub mod presets;

pub use openai::OpenAiGenerator;
