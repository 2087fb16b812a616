use std::fmt;

use thiserror::Error;

/// Failure of an upstream generation or chat call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("permission denied: {message}")]
    PermissionDenied { pro_tier: bool, message: String },
    #[error("rate limited: {message}")]
    RateLimited { message: String },
    #[error("{message}")]
    Generic { message: String },
    #[error("upstream returned no {what}")]
    NoResult { what: String },
}

impl UpstreamError {
    pub fn generic(message: impl Into<String>) -> Self {
        UpstreamError::Generic {
            message: message.into(),
        }
    }

    pub fn no_result(what: impl Into<String>) -> Self {
        UpstreamError::NoResult { what: what.into() }
    }

    /// Maps an HTTP status and response body onto the error taxonomy.
    ///
    /// `pro_tier` records whether the call targeted the paid image model so
    /// the user message can suggest falling back to the free tier.
    pub fn classify(status: Option<u16>, body: &str, pro_tier: bool) -> Self {
        let message = body.trim().to_string();
        let upper = message.to_ascii_uppercase();
        if status == Some(403) || upper.contains("PERMISSION_DENIED") || upper.contains("\"403\"")
        {
            return UpstreamError::PermissionDenied { pro_tier, message };
        }
        if status == Some(429) || upper.contains("RESOURCE_EXHAUSTED") || upper.contains("\"429\"")
        {
            return UpstreamError::RateLimited { message };
        }
        let message = match status {
            Some(code) if message.is_empty() => format!("request failed ({code})"),
            Some(code) => format!("request failed ({code}): {message}"),
            None => message,
        };
        UpstreamError::Generic { message }
    }

    pub fn is_retryable_by_user(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }

    /// Text shown to the user when the call fails.
    pub fn user_message(&self) -> String {
        match self {
            UpstreamError::PermissionDenied { pro_tier: true, .. } => {
                "Permission denied for the Pro image model. It requires a paid API tier; \
                 switch to the free (fast) model or check your billing settings."
                    .to_string()
            }
            UpstreamError::PermissionDenied { pro_tier: false, .. } => {
                "Permission denied. Check that your API key is valid and has access to this model."
                    .to_string()
            }
            UpstreamError::RateLimited { .. } => {
                "Rate limit reached. Please wait a moment and try again.".to_string()
            }
            UpstreamError::Generic { message } => message.clone(),
            UpstreamError::NoResult { what } => {
                format!("The model returned no {what}. Try rephrasing your prompt.")
            }
        }
    }
}

/// Failure of the local key/value substrate.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded ({needed} bytes needed, limit {limit})")]
    QuotaExceeded { needed: usize, limit: usize },
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage payload invalid: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Non-fatal outcome of a persistence operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWarning {
    /// The write only fit after dropping the older half of the collection.
    Evicted { dropped: usize },
    /// The write did not fit even after eviction; nothing was persisted.
    QuotaExceeded { attempted: usize },
    WriteFailed { message: String },
}

impl fmt::Display for StoreWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreWarning::Evicted { dropped } => write!(
                f,
                "Storage is full; removed {dropped} older item(s) from history to make room."
            ),
            StoreWarning::QuotaExceeded { attempted } => write!(
                f,
                "Storage is full; could not save history ({attempted} item(s) attempted)."
            ),
            StoreWarning::WriteFailed { message } => {
                write!(f, "Could not save to local storage: {message}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_permission_distinguishes_pro_tier() {
        let pro = UpstreamError::classify(Some(403), "caller lacks access", true);
        assert!(matches!(
            pro,
            UpstreamError::PermissionDenied { pro_tier: true, .. }
        ));
        assert!(pro.user_message().contains("free"));

        let plain = UpstreamError::classify(None, "{\"status\": \"PERMISSION_DENIED\"}", false);
        assert!(matches!(
            plain,
            UpstreamError::PermissionDenied {
                pro_tier: false,
                ..
            }
        ));
        assert!(plain.user_message().contains("API key"));
    }

    #[test]
    fn classify_rate_limit() {
        let err = UpstreamError::classify(Some(429), "", false);
        assert!(err.is_retryable_by_user());
        assert!(err.user_message().contains("wait"));
        assert!(matches!(
            UpstreamError::classify(Some(400), "RESOURCE_EXHAUSTED: quota", false),
            UpstreamError::RateLimited { .. }
        ));
    }

    #[test]
    fn classify_generic_keeps_raw_message() {
        let err = UpstreamError::classify(Some(500), "backend exploded", false);
        assert_eq!(err.user_message(), "request failed (500): backend exploded");
        assert_eq!(
            UpstreamError::classify(None, "socket closed", true).user_message(),
            "socket closed"
        );
    }

    #[test]
    fn no_result_names_missing_payload() {
        let err = UpstreamError::no_result("image");
        assert_eq!(err.to_string(), "upstream returned no image");
        assert!(err.user_message().starts_with("The model returned no image."));
    }

    #[test]
    fn store_warning_messages() {
        assert!(StoreWarning::Evicted { dropped: 3 }
            .to_string()
            .contains("removed 3"));
        assert!(StoreWarning::QuotaExceeded { attempted: 1 }
            .to_string()
            .contains("could not save"));
    }
}
