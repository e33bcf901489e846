pub(crate) mod http_errors;
pub mod ollama;
pub mod openai;
