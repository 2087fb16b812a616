use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_default(),
        }
    }

    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        self.select_from(None, requested, capability)
    }

    /// Like [`ModelSelector::select`], restricted to one provider's models.
    pub fn select_for_provider(
        &self,
        provider: &str,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        self.select_from(Some(provider), requested, capability)
    }

    fn select_from(
        &self,
        provider: Option<&str>,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        let matches_provider =
            |model: &ModelSpec| provider.map_or(true, |value| model.provider == value);

        let (fallback_reason, requested_text) = if let Some(requested_value) = requested {
            if let Some(model) = self
                .registry
                .ensure(requested_value, capability)
                .filter(|model| matches_provider(model))
            {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            (
                Some(format!(
                    "Requested model '{requested_value}' unavailable for capability '{capability}'."
                )),
                Some(requested_value.to_string()),
            )
        } else {
            (Some("No model specified; using default.".to_string()), None)
        };

        let Some(model) = self
            .registry
            .by_capability(capability)
            .into_iter()
            .find(|model| matches_provider(model))
        else {
            return Err(format!(
                "No models available for capability '{capability}'."
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested_text,
            fallback_reason,
        })
    }
}
