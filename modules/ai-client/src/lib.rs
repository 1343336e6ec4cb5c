pub mod error;
pub mod ollama;
pub mod traits;
pub mod util;

pub use error::AiError;
pub use ollama::{Ollama, OllamaPromptBuilder};
pub use traits::PromptBuilder;
pub use util::{sole_word, truncate_chars};
