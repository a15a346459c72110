//! Configuration module for roadsafe.
//!
//! Handles loading and managing application settings, credentials and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts, CONDITION_RULES};
pub use settings::{
    Credentials, EmbeddingSettings, GeneralSettings, PromptSettings, PromptVariant,
    ProviderSettings, RagSettings, Settings, StoreBackend, VectorStoreSettings,
};
