use crate::application::advisor::RedirectAdvisor;
use crate::application::classifier::{normalize_hostname, SiteClassifier};
use crate::application::commands::{lock_runtime, AppState};
use crate::infrastructure::error::InfraError;
use serde::Serialize;
use url::Url;

const BLOCK_PAGE_BASE: &str = "focusflow://blocked";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckSiteResponse {
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_page_url: Option<String>,
}

impl CheckSiteResponse {
    fn allowed() -> Self {
        Self {
            blocked: false,
            block_page_url: None,
        }
    }
}

/// One navigation event. Gating applies only during a running, unpaused
/// work phase; every internal failure leaves the navigation unblocked.
pub async fn check_site_impl(
    state: &AppState,
    tab_id: u64,
    url: String,
) -> Result<CheckSiteResponse, InfraError> {
    let (gating, tasks) = {
        let runtime = lock_runtime(state)?;
        (runtime.timer.is_gating(), runtime.tasks.clone())
    };
    if !gating || tasks.is_empty() {
        return Ok(CheckSiteResponse::allowed());
    }

    let parsed = match Url::parse(&url) {
        Ok(parsed) => parsed,
        Err(error) => {
            state.log_error("check_site", &format!("unparseable navigation url {url}: {error}"));
            return Ok(CheckSiteResponse::allowed());
        }
    };
    let hostname = normalize_hostname(parsed.host_str().unwrap_or(""));

    let classifier = SiteClassifier::new(
        state.chat_client(),
        state.classification_cache(),
        state.remote_api_key(),
    );
    let productive = match classifier.classify(&url, &hostname, &tasks).await {
        Ok(verdict) => verdict,
        Err(error) => {
            state.log_error(
                "check_site",
                &format!("classification failed for {hostname}: {error}"),
            );
            return Ok(CheckSiteResponse::allowed());
        }
    };
    if productive {
        return Ok(CheckSiteResponse::allowed());
    }

    {
        let mut runtime = lock_runtime(state)?;
        runtime.stats.record_block();
        state.persist_runtime(&runtime)?;
    }

    let advisor = RedirectAdvisor::new(state.chat_client(), state.remote_api_key());
    let redirect_url = advisor.suggest(&hostname, &tasks).await;
    let block_page_url = build_block_page_url(&hostname, &url, &redirect_url, &tasks)?;

    if let Err(error) = state.navigator().navigate(tab_id, &block_page_url) {
        state.log_error(
            "check_site",
            &format!("failed redirecting tab {tab_id}: {error}"),
        );
    }
    state.log_info(
        "check_site",
        &format!("blocked {hostname}; suggested {redirect_url}"),
    );

    Ok(CheckSiteResponse {
        blocked: true,
        block_page_url: Some(block_page_url),
    })
}

fn build_block_page_url(
    site: &str,
    original_url: &str,
    redirect_url: &str,
    tasks: &[String],
) -> Result<String, InfraError> {
    let mut url = Url::parse(BLOCK_PAGE_BASE)
        .map_err(|error| InfraError::InvalidConfig(format!("invalid block page base: {error}")))?;
    url.query_pairs_mut()
        .append_pair("site", site)
        .append_pair("url", original_url)
        .append_pair("redirect", redirect_url)
        .append_pair("tasks", &tasks.join("|"));
    Ok(url.to_string())
}
