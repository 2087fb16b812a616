use indexmap::IndexMap;

pub const FAST_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const PRO_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const CHAT_MODEL: &str = "gemini-2.5-flash";
pub const THINKING_MODEL: &str = "gemini-3-pro-preview";
pub const DRYRUN_IMAGE_MODEL: &str = "dryrun-image-1";
pub const DRYRUN_TEXT_MODEL: &str = "dryrun-text-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
    pub context_window: Option<u64>,
    /// Paid tier; permission failures on these models suggest the free tier.
    pub pro_tier: bool,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }

    /// Whether the model honours an explicit 1K/2K/4K output size.
    pub fn supports_size_tier(&self) -> bool {
        self.supports("size_tier")
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str,
                      provider: &str,
                      capabilities: &[&str],
                      context_window: Option<u64>,
                      pro_tier: bool| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
                context_window,
                pro_tier,
            },
        );
    };

    insert(FAST_IMAGE_MODEL, "gemini", &["image", "edit"], None, false);
    insert(
        PRO_IMAGE_MODEL,
        "gemini",
        &["image", "edit", "size_tier"],
        None,
        true,
    );
    insert(
        CHAT_MODEL,
        "gemini",
        &["text", "vision"],
        Some(1_048_576),
        false,
    );
    insert(
        THINKING_MODEL,
        "gemini",
        &["text", "vision", "thinking"],
        Some(1_048_576),
        false,
    );
    insert(
        DRYRUN_IMAGE_MODEL,
        "dryrun",
        &["image", "edit", "size_tier"],
        None,
        false,
    );
    insert(
        DRYRUN_TEXT_MODEL,
        "dryrun",
        &["text", "thinking"],
        Some(8192),
        false,
    );

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_keeps_insertion_order() {
        let registry = ModelRegistry::default();
        let names: Vec<&str> = registry.list().map(|model| model.name.as_str()).collect();
        assert_eq!(names[0], FAST_IMAGE_MODEL);
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn only_pro_image_model_is_paid_and_sized() {
        let registry = ModelRegistry::default();
        let pro = registry.get(PRO_IMAGE_MODEL).cloned();
        assert!(pro.as_ref().map(|model| model.pro_tier).unwrap_or(false));
        assert!(pro.map(|model| model.supports_size_tier()).unwrap_or(false));

        let fast = registry.ensure(FAST_IMAGE_MODEL, "edit");
        assert!(fast.map(|model| !model.supports_size_tier()).unwrap_or(false));
        assert!(registry.ensure(CHAT_MODEL, "image").is_none());
    }
}
