//! User parameters for a session
//!
//! Parameters are passed explicitly into every generation request. The
//! scheduler keeps the current set and replaces it on `update_parameters`,
//! so a request always carries what the user last asked for.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Persona used when the caller does not pick one
pub const DEFAULT_PERSONA: &str = "Steve Jobs";

/// Validated parameters carried by every generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    /// Listener name
    pub name: String,
    /// What the listener needs to hear about (already merged with details)
    pub context: String,
    /// Voice/persona identifier understood by the generation service
    pub persona: String,
}

impl SessionParams {
    /// Reject missing name or context
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidStartRequest("name is required".to_string()));
        }
        if self.context.trim().is_empty() {
            return Err(Error::InvalidStartRequest(
                "context is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Raw start request as entered by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub name: String,
    pub context: String,
    #[serde(default)]
    pub persona: Option<String>,
    /// Free-form extra context appended to `context`
    #[serde(default)]
    pub details: Option<String>,
}

impl StartRequest {
    pub fn new(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: context.into(),
            persona: None,
            details: None,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Validate and normalize into [`SessionParams`]
    ///
    /// Non-empty details are folded into the context; an empty persona
    /// falls back to [`DEFAULT_PERSONA`].
    pub fn into_params(self) -> Result<SessionParams> {
        let name = self.name.trim().to_string();
        let context = self.context.trim().to_string();

        let context = match self.details.as_deref().map(str::trim) {
            Some(details) if !details.is_empty() && !context.is_empty() => {
                format!("{}. Additional context about me: {}", context, details)
            }
            _ => context,
        };

        let persona = self
            .persona
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PERSONA.to_string());

        let params = SessionParams {
            name,
            context,
            persona,
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_request() {
        let params = StartRequest::new("Ada", "ship the compiler")
            .into_params()
            .unwrap();
        assert_eq!(params.name, "Ada");
        assert_eq!(params.context, "ship the compiler");
        assert_eq!(params.persona, DEFAULT_PERSONA);
    }

    #[test]
    fn test_details_are_merged_into_context() {
        let params = StartRequest::new("Ada", "focus on my startup")
            .with_details("  I sleep four hours a night ")
            .with_persona("Hormozi")
            .into_params()
            .unwrap();
        assert_eq!(
            params.context,
            "focus on my startup. Additional context about me: I sleep four hours a night"
        );
        assert_eq!(params.persona, "Hormozi");
    }

    #[test]
    fn test_blank_details_and_persona_ignored() {
        let params = StartRequest::new("Ada", "run a marathon")
            .with_details("   ")
            .with_persona("")
            .into_params()
            .unwrap();
        assert_eq!(params.context, "run a marathon");
        assert_eq!(params.persona, DEFAULT_PERSONA);
    }

    #[test]
    fn test_missing_name_or_context_rejected() {
        let err = StartRequest::new("  ", "context").into_params().unwrap_err();
        assert!(matches!(err, Error::InvalidStartRequest(_)));

        // Details alone do not count as context
        let err = StartRequest::new("Ada", "")
            .with_details("lots of detail")
            .into_params()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStartRequest(_)));
    }
}
