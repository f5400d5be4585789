//! Message moderation: a remote classifier behind a hard timeout, with a
//! deterministic denylist fallback. `classify` never fails and never lets
//! uncertainty pass a message through unchecked.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ModerationConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub inappropriate: bool,
    pub reason: Option<String>,
}

impl Verdict {
    pub fn clean() -> Verdict {
        Verdict { inappropriate: false, reason: None }
    }
}

pub struct ModerationService {
    remote: Option<RemoteClassifier>,
    timeout: Duration,
}

impl ModerationService {
    pub fn from_config(config: &ModerationConfig) -> ModerationService {
        let remote = config.api_key.as_ref().map(|key| RemoteClassifier {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: key.clone(),
            model: config.model.clone(),
        });
        ModerationService { remote, timeout: config.timeout }
    }

    /// Denylist only; what the service degrades to without an API key.
    pub fn fallback_only() -> ModerationService {
        ModerationService { remote: None, timeout: Duration::from_secs(1) }
    }

    pub async fn classify(&self, text: &str) -> Verdict {
        if let Some(remote) = &self.remote {
            match tokio::time::timeout(self.timeout, remote.classify(text)).await {
                Ok(Ok(Some(verdict))) => return verdict,
                Ok(Ok(None)) => {
                    tracing::debug!("classifier verdict inconclusive, falling back");
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "remote moderation failed, falling back");
                }
                Err(_) => {
                    tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "remote moderation timed out, falling back");
                }
            }
        }

        denylist_check(text)
    }
}

const SYSTEM_PROMPT: &str = r#"You are a chat content moderator. Analyze the following message and determine if it contains:
- Profanity, slang, or abusive language
- Hate speech or discrimination
- Threats or harassment
- Sexually explicit content
- Spam or gibberish meant to bypass filters

Respond with ONLY a JSON object in this exact format:
{"isInappropriate": true/false, "reason": "brief reason or null"}

Be strict but fair. Normal conversations, friendly banter, and mild expressions are OK. Only flag genuinely harmful or abusive content."#;

struct RemoteClassifier {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
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

impl RemoteClassifier {
    /// `Ok(None)` means the response could not be read as a verdict; the
    /// caller must consult the fallback.
    async fn classify(&self, text: &str) -> reqwest::Result<Option<Verdict>> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: text },
            ],
            temperature: 0.1,
            max_tokens: 100,
        };

        let response: ChatResponse = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(parse_verdict(&content))
    }
}

#[derive(Deserialize)]
struct RawVerdict {
    #[serde(rename = "isInappropriate")]
    is_inappropriate: bool,
    #[serde(default)]
    reason: Option<String>,
}

fn parse_verdict(content: &str) -> Option<Verdict> {
    // The model is told to answer with a bare JSON object but tends to wrap
    // it in prose; take the outermost braces.
    let braced = content
        .find('{')
        .zip(content.rfind('}'))
        .filter(|(start, end)| start < end)
        .map(|(start, end)| &content[start..=end]);
    if let Some(json) = braced {
        if let Ok(raw) = serde_json::from_str::<RawVerdict>(json) {
            return Some(Verdict { inappropriate: raw.is_inappropriate, reason: raw.reason });
        }
    }

    let lowered = content.to_lowercase();
    if lowered.contains(r#""isinappropriate": true"#) || lowered.contains(r#""isinappropriate":true"#) {
        return Some(Verdict {
            inappropriate: true,
            reason: Some("Content flagged by AI moderator".to_owned()),
        });
    }

    None
}

const DENYLIST: &[&str] = &[
    "fuck", "shit", "ass", "bitch", "damn", "hell", "bastard", "dick",
    "pussy", "cock", "cunt", "whore", "slut", "nigger", "nigga", "faggot",
    "retard", "idiot", "stupid", "moron", "dumb", "kill yourself", "kys",
    "die", "rape", "stfu", "wtf", "lmfao", "bullshit", "asshole",
    "motherfucker", "fucker", "dumbass", "jackass", "piss", "crap",
    "douche", "wanker", "twat", "prick", "screw you", "go to hell",
    "suck my", "blow me", "eat shit", "piece of shit",
];

fn denylist_check(text: &str) -> Verdict {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();

    for term in DENYLIST {
        if normalized.contains(term) {
            return Verdict {
                inappropriate: true,
                reason: Some("Message contains inappropriate language".to_owned()),
            };
        }
    }

    Verdict::clean()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylist_flags_plain_insults() {
        let verdict = denylist_check("you are an idiot");
        assert!(verdict.inappropriate);
        assert!(verdict.reason.is_some());
    }

    #[test]
    fn denylist_ignores_punctuation() {
        assert!(denylist_check("you're an i-d-i-o-t").inappropriate);
        assert!(denylist_check("S.T.F.U").inappropriate);
    }

    #[test]
    fn denylist_matches_multi_word_terms() {
        assert!(denylist_check("just kill yourself already").inappropriate);
        assert!(denylist_check("go to hell").inappropriate);
    }

    #[test]
    fn denylist_passes_normal_talk() {
        assert_eq!(denylist_check("good morning, how was your week?"), Verdict::clean());
        assert_eq!(denylist_check("see you at 8"), Verdict::clean());
    }

    // Substring matching is deliberately conservative: in fallback mode a
    // false positive beats a miss.
    #[test]
    fn denylist_matches_inside_words() {
        assert!(denylist_check("hello").inappropriate);
    }

    #[test]
    fn verdict_parses_out_of_prose() {
        let verdict = parse_verdict(
            r#"Sure! Here is the verdict: {"isInappropriate": false, "reason": null} Hope that helps."#,
        );
        assert_eq!(verdict, Some(Verdict::clean()));

        let verdict = parse_verdict(r#"{"isInappropriate": true, "reason": "harassment"}"#).unwrap();
        assert!(verdict.inappropriate);
        assert_eq!(verdict.reason.as_deref(), Some("harassment"));
    }

    #[test]
    fn malformed_verdict_is_inconclusive() {
        assert_eq!(parse_verdict("I think this message is fine."), None);
        assert_eq!(parse_verdict("{not json at all}"), None);
        assert_eq!(parse_verdict(""), None);
    }

    #[test]
    fn raw_true_marker_still_flags() {
        // No parseable object, but the assertion is unambiguous.
        let verdict = parse_verdict(r#"my answer: "isInappropriate": true (no json, sorry)"#);
        assert_eq!(
            verdict,
            Some(Verdict {
                inappropriate: true,
                reason: Some("Content flagged by AI moderator".to_owned())
            })
        );

        let verdict = parse_verdict(r#"{"isInappropriate":true, broken json"#);
        assert_eq!(
            verdict,
            Some(Verdict {
                inappropriate: true,
                reason: Some("Content flagged by AI moderator".to_owned())
            })
        );
    }

    #[tokio::test]
    async fn classify_without_remote_uses_denylist() {
        let service = ModerationService::fallback_only();
        assert!(service.classify("you are an idiot").await.inappropriate);
        assert!(!service.classify("good morning").await.inappropriate);
    }
}
