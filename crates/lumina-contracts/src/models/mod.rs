mod registry;
mod selectors;

pub use registry::{
    ModelRegistry, ModelSpec, CHAT_MODEL, DRYRUN_IMAGE_MODEL, DRYRUN_TEXT_MODEL, FAST_IMAGE_MODEL,
    PRO_IMAGE_MODEL, THINKING_MODEL,
};
pub use selectors::{ModelSelection, ModelSelector};
