//! Tier-3 classifier backed by an OpenAI-compatible chat-completions API.
//!
//! The model is asked for a single JSON object `{action, confidence, target}`
//! choosing from the known action labels. Anything around the object in the
//! reply is ignored.

use async_trait::async_trait;
use parley_core::config::LlmConfig;
use parley_core::types::clamp_confidence;
use parley_dictionary::DEFAULT_COMMANDS;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::classifier::{Classification, IntentClassifier};
use crate::error::ClassifierError;

/// HTTP classifier.
pub struct LlmClassifier {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    system_prompt: String,
}

impl LlmClassifier {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        let actions = known_actions();
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
            system_prompt: build_system_prompt(&actions),
        }
    }

    /// Build from configuration, reading the key from `api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ClassifierError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ClassifierError::Unavailable(format!("{} not set", config.api_key_env))
        })?;
        Ok(Self::new(api_key, config.api_url.clone(), config.model.clone()))
    }

    /// Replace the advertised action list, e.g. to include learned actions.
    pub fn with_actions(mut self, actions: &[(String, String)]) -> Self {
        self.system_prompt = build_system_prompt(actions);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, user: &str) -> Result<String, ClassifierError> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: 100,
            temperature: 0.0,
            messages: vec![
                Message {
                    role: "system".into(),
                    content: self.system_prompt.clone(),
                },
                Message {
                    role: "user".into(),
                    content: user.into(),
                },
            ],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api(format!("{}: {}", status, body)));
        }

        let completion: ChatResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ClassifierError::Malformed("empty choices".into()))
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(
        &self,
        utterance: &str,
        context: Option<&str>,
    ) -> Result<Classification, ClassifierError> {
        let user = format!(
            "FOREGROUND APP: {}\nUTTERANCE: {}",
            context.unwrap_or("unknown"),
            utterance
        );
        let reply = self.complete(&user).await?;
        let classification = parse_classification(&reply)?;
        tracing::debug!(
            model = %self.model,
            action = %classification.action,
            confidence = classification.confidence,
            "LLM classification"
        );
        Ok(classification)
    }
}

/// Shipped action labels with descriptions, one per action.
fn known_actions() -> Vec<(String, String)> {
    let mut actions: Vec<(String, String)> = Vec::new();
    for command in DEFAULT_COMMANDS {
        if !actions.iter().any(|(a, _)| a == command.action) {
            actions.push((command.action.to_string(), command.description.to_string()));
        }
    }
    actions
}

fn build_system_prompt(actions: &[(String, String)]) -> String {
    let mut prompt = String::from(
        "You classify short spoken utterances for a voice dictation tool.\n\
         Decide whether the utterance is a command or ordinary dictation.\n\n\
         AVAILABLE ACTIONS:\n",
    );
    for (action, description) in actions {
        prompt.push_str(&format!("- {}: {}\n", action, description));
    }
    prompt.push_str(
        "- OPEN_APP: open an application (target = application name)\n\
         \nIf the utterance is dictation, use action \"none\".\n\
         OUTPUT FORMAT (JSON only, no explanation):\n\
         {\"action\": \"ACTION\", \"confidence\": 0.0-1.0, \"target\": \"string or null\"}\n",
    );
    prompt
}

/// Extract JSON object from a model reply (handles surrounding text).
fn extract_json(response: &str) -> Result<&str, ClassifierError> {
    let start = response
        .find('{')
        .ok_or_else(|| ClassifierError::Malformed("no JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| ClassifierError::Malformed("no closing brace in response".into()))?;
    Ok(&response[start..=end])
}

/// Parse a model reply into a [`Classification`] with a trimmed,
/// upper-cased action and a clamped confidence.
pub fn parse_classification(response: &str) -> Result<Classification, ClassifierError> {
    let json = extract_json(response)?;
    let mut c: Classification = serde_json::from_str(json)
        .map_err(|e| ClassifierError::Malformed(format!("{} - response: {}", e, response)))?;
    c.action = c.action.trim().to_ascii_uppercase();
    c.confidence = clamp_confidence(c.confidence);
    c.target = c.target.filter(|t| !t.trim().is_empty());
    Ok(c)
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::is_no_action;

    #[test]
    fn test_parse_plain_object() {
        let c = parse_classification(r#"{"action": "open_app", "confidence": 0.9, "target": "Spotify"}"#)
            .unwrap();
        assert_eq!(c.action, "OPEN_APP");
        assert_eq!(c.target.as_deref(), Some("Spotify"));
    }

    #[test]
    fn test_parse_with_surrounding_text() {
        let reply = "Sure! Here you go:\n{\"action\": \"SAVE_FILE\", \"confidence\": 0.8, \"target\": null}\nAnything else?";
        let c = parse_classification(reply).unwrap();
        assert_eq!(c.action, "SAVE_FILE");
        assert!(c.target.is_none());
    }

    #[test]
    fn test_parse_none_answer() {
        let c = parse_classification(r#"{"action": "none", "confidence": 0.1}"#).unwrap();
        assert!(is_no_action(&c.action));
    }

    #[test]
    fn test_parse_clamps_and_drops_blank_target() {
        let c = parse_classification(r#"{"action": "MUTE", "confidence": 1.4, "target": "  "}"#)
            .unwrap();
        assert_eq!(c.confidence, 1.0);
        assert!(c.target.is_none());
    }

    #[test]
    fn test_parse_malformed() {
        for reply in ["I can't help with that", "} backwards {", r#"{"confidence": 0.9}"#] {
            assert!(
                matches!(parse_classification(reply), Err(ClassifierError::Malformed(_))),
                "{reply}"
            );
        }
    }

    #[test]
    fn test_system_prompt_lists_each_action_once() {
        let prompt = build_system_prompt(&known_actions());
        assert_eq!(prompt.matches("- SAVE_FILE:").count(), 1);
        assert!(prompt.contains("- CLOSE_TAB: close the current tab"));
    }

    #[test]
    fn test_from_config_missing_key() {
        let config = LlmConfig {
            api_key_env: "PARLEY_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            LlmClassifier::from_config(&config),
            Err(ClassifierError::Unavailable(_))
        ));
    }

    #[test]
    fn test_with_actions_replaces_prompt() {
        let classifier = LlmClassifier::new("k".into(), "http://localhost".into(), "m".into())
            .with_actions(&[("LAUNCH_ROCKET".to_string(), "launch it".to_string())]);
        assert!(classifier.system_prompt.contains("LAUNCH_ROCKET"));
        assert!(!classifier.system_prompt.contains("SAVE_FILE"));
        assert_eq!(classifier.model(), "m");
    }
}
