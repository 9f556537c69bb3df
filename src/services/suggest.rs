// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP value suggestions from a hosted text-generation model.

use crate::error::AppError;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static regex is valid"));

/// Client for the inference endpoint.
#[derive(Clone)]
pub struct XpSuggester {
    http: reqwest::Client,
    api_url: String,
    api_token: Option<String>,
}

/// Prompt sent to the model for one action title.
pub fn build_prompt(action: &str) -> String {
    format!(
        "Suggest a fair XP value (1-100) for the following action: \"{}\". Only return the number.",
        action
    )
}

/// First run of ASCII digits in `text`, if it fits in a `u32`.
///
/// The model is asked for 1-100 but nothing enforces it, so no clamping is
/// applied here.
pub fn extract_first_integer(text: &str) -> Option<u32> {
    FIRST_INTEGER
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

impl XpSuggester {
    pub fn new(
        api_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            api_token,
        })
    }

    /// Ask the model for an XP value. `None` means it answered without a number.
    pub async fn suggest(&self, action: &str) -> Result<Option<u32>, AppError> {
        let body = serde_json::json!({ "inputs": build_prompt(action) });

        let mut request = self.http.post(&self.api_url).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout("xp suggestion".to_string())
            } else {
                AppError::Upstream(format!("Suggestion request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("HTTP {}: {}", status, body)));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("JSON parse error: {}", e)))?;

        let generated = payload
            .get(0)
            .and_then(|first| first.get("generated_text"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        let xp = extract_first_integer(generated);
        tracing::debug!(?xp, "XP suggestion received");
        Ok(xp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_quotes_action() {
        assert_eq!(
            build_prompt("Go for a run"),
            "Suggest a fair XP value (1-100) for the following action: \"Go for a run\". Only return the number."
        );
    }

    #[test]
    fn test_extract_first_integer() {
        assert_eq!(extract_first_integer("I would say 25 XP, maybe 30"), Some(25));
        assert_eq!(extract_first_integer("250"), Some(250));
        assert_eq!(extract_first_integer("no idea"), None);
        assert_eq!(extract_first_integer(""), None);
    }

    #[test]
    fn test_overflowing_number_is_none() {
        assert_eq!(extract_first_integer("99999999999999999999"), None);
    }
}
