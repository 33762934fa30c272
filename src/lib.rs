mod application;
mod domain;
mod infrastructure;

pub use application::advisor::RedirectAdvisor;
pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::classifier::SiteClassifier;
pub use application::commands::{
    get_state_impl, pause_timer_impl, reset_timer_impl, resume_timer_impl, start_timer_impl,
    tick_timer_impl, update_tasks_impl, AppState, GetStateResponse,
};
pub use application::gatekeeper::{check_site_impl, CheckSiteResponse};
pub use domain::models::{Stats, TimerPhase, TimerState};
pub use infrastructure::classification_cache::{ClassificationCache, InMemoryClassificationCache};
pub use infrastructure::credential_store::{
    CredentialStore, InMemoryCredentialStore, KeyringCredentialStore,
};
pub use infrastructure::error::InfraError;
pub use infrastructure::navigator::{NullTabNavigator, RecordingTabNavigator, TabNavigator};
pub use infrastructure::notifier::{LogNotifier, Notifier, RecordingNotifier};
pub use infrastructure::openai_client::{
    ChatCompletionClient, CompletionRequest, ReqwestChatCompletionClient,
};
pub use infrastructure::state_repository::{
    initialize_database, InMemoryStateRepository, PersistedState, SqliteStateRepository,
    StateRepository,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message-style intents exposed to presentation surfaces (popup, block
/// page, content probe). The wire shape mirrors `{type: "..."}` messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IntentRequest {
    StartTimer,
    PauseTimer,
    ResumeTimer,
    ResetTimer,
    GetState,
    UpdateTasks {
        tasks: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    CheckSite {
        tab_id: u64,
        url: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IntentResponse {
    Success { success: bool },
    State(GetStateResponse),
    CheckSite(CheckSiteResponse),
}

pub async fn handle_intent(
    state: &Arc<AppState>,
    request: IntentRequest,
) -> Result<IntentResponse, String> {
    match request {
        IntentRequest::StartTimer => start_timer_impl(state)
            .map(|_| IntentResponse::Success { success: true })
            .map_err(|error| state.command_error("start_timer", &error)),
        IntentRequest::PauseTimer => pause_timer_impl(state)
            .map(|_| IntentResponse::Success { success: true })
            .map_err(|error| state.command_error("pause_timer", &error)),
        IntentRequest::ResumeTimer => resume_timer_impl(state)
            .map(|_| IntentResponse::Success { success: true })
            .map_err(|error| state.command_error("resume_timer", &error)),
        IntentRequest::ResetTimer => reset_timer_impl(state)
            .map(|_| IntentResponse::Success { success: true })
            .map_err(|error| state.command_error("reset_timer", &error)),
        IntentRequest::GetState => get_state_impl(state)
            .map(IntentResponse::State)
            .map_err(|error| state.command_error("get_state", &error)),
        IntentRequest::UpdateTasks { tasks } => update_tasks_impl(state, tasks)
            .map(|_| IntentResponse::Success { success: true })
            .map_err(|error| state.command_error("update_tasks", &error)),
        IntentRequest::CheckSite { tab_id, url } => check_site_impl(state, tab_id, url)
            .await
            .map(IntentResponse::CheckSite)
            .map_err(|error| state.command_error("check_site", &error)),
    }
}
