use crate::infrastructure::classification_cache::ClassificationCache;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::openai_client::{ChatCompletionClient, CompletionRequest};
use std::sync::Arc;

/// Destinations exempt from classification: search pages, the app's own
/// pages, local addresses, and blank/new-tab targets. Matched against the
/// full URL or the exact hostname.
const ALWAYS_ALLOWED: &[&str] = &[
    "focusflow://",
    "newtab",
    "about:blank",
    "about:newtab",
    "localhost",
    "127.0.0.1",
    "google.com/search",
    "google.ca/search",
    "google.co.uk/search",
    "bing.com/search",
    "duckduckgo.com",
    "search.yahoo.com",
];

const PRODUCTIVE_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "wikimedia.org",
    "wikibooks.org",
    "wikiversity.org",
    "khanacademy.org",
    "coursera.org",
    "edx.org",
    "udemy.com",
    "udacity.com",
    "mit.edu",
    "stanford.edu",
    "harvard.edu",
    ".edu",
    "github.com",
    "gitlab.com",
    "stackoverflow.com",
    "developer.mozilla.org",
    "npmjs.com",
    "pypi.org",
    "rubygems.org",
    "docs.google.com",
    "drive.google.com",
    "sheets.google.com",
    "slides.google.com",
    "notion.so",
    "evernote.com",
    "onenote.com",
    "dropbox.com",
    "trello.com",
    "asana.com",
    "monday.com",
    "todoist.com",
    "scholar.google.com",
    "pubmed.ncbi.nlm.nih.gov",
    "jstor.org",
    "arxiv.org",
    "researchgate.net",
    "academia.edu",
    "quizlet.com",
    "anki.com",
    "ankiweb.net",
    "memrise.com",
    "slack.com",
    "teams.microsoft.com",
    "zoom.us",
];

const CLASSIFY_SYSTEM_PROMPT: &str = "You are a productivity assistant. Determine if a website is productive for the given tasks. Educational sites like Wikipedia, Khan Academy, and university sites should generally be allowed for studying. Respond with only \"YES\" if the site would help with the tasks, or \"NO\" if it would be a distraction.";
const CLASSIFY_TEMPERATURE: f32 = 0.3;
const CLASSIFY_MAX_TOKENS: u32 = 10;

pub fn normalize_hostname(hostname: &str) -> String {
    let hostname = hostname.trim().to_ascii_lowercase();
    hostname
        .strip_prefix("www.")
        .unwrap_or(&hostname)
        .to_string()
}

pub fn is_always_allowed(url: &str, hostname: &str) -> bool {
    if hostname.is_empty() {
        return true;
    }
    ALWAYS_ALLOWED
        .iter()
        .any(|allowed| url.contains(allowed) || hostname == *allowed)
}

pub fn heuristic_verdict(hostname: &str) -> bool {
    PRODUCTIVE_DOMAINS
        .iter()
        .any(|domain| hostname.contains(domain))
}

pub struct SiteClassifier {
    chat_client: Arc<dyn ChatCompletionClient>,
    cache: Arc<dyn ClassificationCache>,
    api_key: Option<String>,
}

impl SiteClassifier {
    pub fn new(
        chat_client: Arc<dyn ChatCompletionClient>,
        cache: Arc<dyn ClassificationCache>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            chat_client,
            cache,
            api_key,
        }
    }

    /// Allow/block verdict for one navigation. Remote failures never
    /// propagate; they resolve to the local heuristic verdict.
    pub async fn classify(
        &self,
        url: &str,
        hostname: &str,
        tasks: &[String],
    ) -> Result<bool, InfraError> {
        let hostname = normalize_hostname(hostname);

        if is_always_allowed(url, &hostname) {
            return Ok(true);
        }
        if tasks.is_empty() {
            return Ok(true);
        }
        if let Some(cached) = self.cache.lookup(&hostname, tasks)? {
            return Ok(cached);
        }

        let heuristic = heuristic_verdict(&hostname);
        let verdict = match self.api_key.as_deref() {
            None => heuristic,
            Some(api_key) => self
                .remote_verdict(api_key, &hostname, tasks)
                .await
                .unwrap_or(heuristic),
        };

        self.cache.store(&hostname, tasks, verdict)?;
        Ok(verdict)
    }

    async fn remote_verdict(
        &self,
        api_key: &str,
        hostname: &str,
        tasks: &[String],
    ) -> Result<bool, InfraError> {
        let request = CompletionRequest {
            system_prompt: CLASSIFY_SYSTEM_PROMPT.to_string(),
            user_prompt: format!(
                "Current tasks: {}\nWebsite: {hostname}\nIs this website productive for these tasks?",
                tasks.join(", ")
            ),
            temperature: CLASSIFY_TEMPERATURE,
            max_tokens: CLASSIFY_MAX_TOKENS,
        };

        let answer = self.chat_client.complete(api_key, &request).await?;
        Ok(answer.to_uppercase().contains("YES"))
    }
}
