use crate::infrastructure::error::InfraError;
use crate::infrastructure::openai_client::{ChatCompletionClient, CompletionRequest};
use std::sync::Arc;
use url::Url;

/// Ordered keyword table for default suggestions; scanned per task, first
/// match wins.
const DEFAULT_SUGGESTIONS: &[(&str, &str)] = &[
    ("study", "https://www.khanacademy.org"),
    ("research", "https://scholar.google.com"),
    ("write", "https://docs.google.com"),
    ("code", "https://github.com"),
    ("learn", "https://www.coursera.org"),
    ("math", "https://www.wolframalpha.com"),
    ("read", "https://www.gutenberg.org"),
    ("flashcard", "https://quizlet.com"),
    ("note", "https://docs.google.com"),
    ("data", "https://sheets.google.com"),
];

const FALLBACK_SUGGESTION: &str = "https://google.com";

const SUGGEST_SYSTEM_PROMPT: &str = "You are a productivity assistant. Suggest ONE specific website URL that would be most helpful for the given tasks. Respond with only the URL, nothing else.";
const SUGGEST_TEMPERATURE: f32 = 0.5;
const SUGGEST_MAX_TOKENS: u32 = 50;

pub fn default_suggestion(tasks: &[String]) -> String {
    for task in tasks {
        let task = task.to_lowercase();
        for (keyword, suggestion) in DEFAULT_SUGGESTIONS {
            if task.contains(keyword) {
                return (*suggestion).to_string();
            }
        }
    }
    FALLBACK_SUGGESTION.to_string()
}

fn validate_suggestion(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    let candidate = if candidate.starts_with("http") {
        candidate.to_string()
    } else {
        format!("https://{candidate}")
    };
    let parsed = Url::parse(&candidate).ok()?;
    parsed.host_str()?;
    Some(candidate)
}

pub struct RedirectAdvisor {
    chat_client: Arc<dyn ChatCompletionClient>,
    api_key: Option<String>,
}

impl RedirectAdvisor {
    pub fn new(chat_client: Arc<dyn ChatCompletionClient>, api_key: Option<String>) -> Self {
        Self {
            chat_client,
            api_key,
        }
    }

    /// A productive destination for a blocked navigation. Never fails: any
    /// remote error or malformed suggestion resolves to the keyword default.
    pub async fn suggest(&self, blocked_hostname: &str, tasks: &[String]) -> String {
        let default_url = default_suggestion(tasks);

        let Some(api_key) = self.api_key.as_deref() else {
            return default_url;
        };
        if tasks.is_empty() {
            return default_url;
        }

        let request = CompletionRequest {
            system_prompt: SUGGEST_SYSTEM_PROMPT.to_string(),
            user_prompt: format!(
                "User was trying to visit {blocked_hostname} but needs to focus on: {}\nSuggest the most relevant productive website URL:",
                tasks.join(", ")
            ),
            temperature: SUGGEST_TEMPERATURE,
            max_tokens: SUGGEST_MAX_TOKENS,
        };

        match self.chat_client.complete(api_key, &request).await {
            Ok(candidate) => validate_suggestion(&candidate).unwrap_or(default_url),
            Err(_) => default_url,
        }
    }
}
