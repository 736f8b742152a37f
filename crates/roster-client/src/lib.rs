pub mod inference;

pub use inference::HfInferenceClient;
