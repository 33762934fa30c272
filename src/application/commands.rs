use crate::application::bootstrap::bootstrap_workspace;
use crate::domain::models::{
    normalize_tasks, Stats, TickOutcome, TimerPhase, TimerState, WORK_PHASE_MINUTES,
};
use crate::infrastructure::classification_cache::{
    ClassificationCache, InMemoryClassificationCache,
};
use crate::infrastructure::config::read_timezone;
use crate::infrastructure::credential_store::{
    normalize_api_key, CredentialStore, KeyringCredentialStore,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::navigator::{NullTabNavigator, TabNavigator};
use crate::infrastructure::notifier::{LogNotifier, Notifier};
use crate::infrastructure::openai_client::{ChatCompletionClient, ReqwestChatCompletionClient};
use crate::infrastructure::state_repository::{
    PersistedState, SqliteStateRepository, StateRepository,
};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

const API_KEY_ENV_VAR: &str = "FOCUSFLOW_OPENAI_API_KEY";
const TICK_INTERVAL: Duration = Duration::from_secs(1);

const BREAK_STARTED_TITLE: &str = "Great work!";
const BREAK_STARTED_MESSAGE: &str = "Time for a 5-minute break. You earned it!";
const WORK_RESUMED_TITLE: &str = "Break over!";
const WORK_RESUMED_MESSAGE: &str = "Ready to tackle your tasks? Let's go!";

/// The single state-owning authority. Presentation surfaces never hold the
/// runtime record; they send intents and read the responses.
pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    timezone: Tz,
    state_repository: Arc<dyn StateRepository>,
    classification_cache: Arc<dyn ClassificationCache>,
    credential_store: Arc<dyn CredentialStore>,
    chat_client: Arc<dyn ChatCompletionClient>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn TabNavigator>,
    runtime: Mutex<RuntimeState>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    log_guard: Mutex<()>,
}

#[derive(Debug, Clone)]
pub struct RuntimeState {
    pub timer: TimerState,
    pub tasks: Vec<String>,
    pub stats: Stats,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");

        let timezone_name = read_timezone(&config_dir)?;
        let timezone = timezone_name.parse::<Tz>().map_err(|_| {
            InfraError::InvalidConfig(format!("unknown timezone: {timezone_name}"))
        })?;

        let state_repository: Arc<dyn StateRepository> =
            Arc::new(SqliteStateRepository::new(&bootstrap.database_path));
        let today = Utc::now().with_timezone(&timezone).date_naive();
        let runtime = load_runtime(state_repository.as_ref(), today)?;

        Ok(Self {
            config_dir,
            database_path: bootstrap.database_path,
            logs_dir: logs_dir.clone(),
            timezone,
            state_repository,
            classification_cache: Arc::new(InMemoryClassificationCache::default()),
            credential_store: Arc::new(KeyringCredentialStore::default()),
            chat_client: Arc::new(ReqwestChatCompletionClient::new()),
            notifier: Arc::new(LogNotifier::new(logs_dir)),
            navigator: Arc::new(NullTabNavigator),
            runtime: Mutex::new(runtime),
            ticker: Mutex::new(None),
            log_guard: Mutex::new(()),
        })
    }

    pub fn with_state_repository(mut self, repository: Arc<dyn StateRepository>) -> Self {
        self.state_repository = repository;
        self
    }

    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = store;
        self
    }

    pub fn with_chat_client(mut self, client: Arc<dyn ChatCompletionClient>) -> Self {
        self.chat_client = client;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn TabNavigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub(crate) fn chat_client(&self) -> Arc<dyn ChatCompletionClient> {
        Arc::clone(&self.chat_client)
    }

    pub(crate) fn classification_cache(&self) -> Arc<dyn ClassificationCache> {
        Arc::clone(&self.classification_cache)
    }

    pub(crate) fn navigator(&self) -> Arc<dyn TabNavigator> {
        Arc::clone(&self.navigator)
    }

    /// The resolved remote-classifier credential, if any. The environment
    /// variable wins over the credential store; placeholder values count as
    /// absent.
    pub fn remote_api_key(&self) -> Option<String> {
        resolve_api_key(
            |name| std::env::var(name).ok(),
            self.credential_store.as_ref(),
        )
    }

    pub(crate) fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    pub(crate) fn persist_runtime(&self, runtime: &RuntimeState) -> Result<(), InfraError> {
        self.state_repository.save(&PersistedState {
            timer_state: runtime.timer.clone(),
            current_tasks: runtime.tasks.clone(),
            stats: runtime.stats.clone(),
        })
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

fn load_runtime(
    repository: &dyn StateRepository,
    today: NaiveDate,
) -> Result<RuntimeState, InfraError> {
    let mut runtime = match repository.load()? {
        Some(persisted) => RuntimeState {
            timer: persisted.timer_state,
            tasks: persisted.current_tasks,
            stats: persisted.stats,
        },
        None => RuntimeState {
            timer: TimerState::default(),
            tasks: Vec::new(),
            stats: Stats::new(today),
        },
    };

    if runtime.stats.roll_over_if_new_day(today) {
        repository.save(&PersistedState {
            timer_state: runtime.timer.clone(),
            current_tasks: runtime.tasks.clone(),
            stats: runtime.stats.clone(),
        })?;
    }
    Ok(runtime)
}

fn resolve_api_key(
    lookup: impl Fn(&str) -> Option<String>,
    store: &dyn CredentialStore,
) -> Option<String> {
    if let Some(api_key) = normalize_api_key(lookup(API_KEY_ENV_VAR)) {
        return Some(api_key);
    }
    normalize_api_key(store.load_api_key().ok().flatten())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStateResponse {
    pub timer_state: TimerState,
    pub current_tasks: Vec<String>,
    pub stats: Stats,
    pub has_remote_classifier: bool,
}

/// Starts (or restarts) the countdown driver without touching `time_left`.
/// Must run inside a tokio runtime; the driver stops on reset or when the
/// service is dropped.
pub fn start_timer_impl(state: &Arc<AppState>) -> Result<(), InfraError> {
    {
        let mut runtime = lock_runtime(state)?;
        runtime.timer.start();
        state.persist_runtime(&runtime)?;
    }
    spawn_ticker(state)?;
    state.log_info("start_timer", "started countdown driver");
    Ok(())
}

pub fn pause_timer_impl(state: &AppState) -> Result<(), InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.timer.pause();
    state.persist_runtime(&runtime)?;
    drop(runtime);
    state.log_info("pause_timer", "paused countdown");
    Ok(())
}

pub fn resume_timer_impl(state: &AppState) -> Result<(), InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.timer.resume();
    state.persist_runtime(&runtime)?;
    drop(runtime);
    state.log_info("resume_timer", "resumed countdown");
    Ok(())
}

pub fn reset_timer_impl(state: &AppState) -> Result<(), InfraError> {
    stop_ticker(state)?;
    let mut runtime = lock_runtime(state)?;
    runtime.timer.reset();
    state.classification_cache.invalidate_all()?;
    state.persist_runtime(&runtime)?;
    drop(runtime);
    state.log_info("reset_timer", "reset timer and cleared classification cache");
    Ok(())
}

pub fn get_state_impl(state: &AppState) -> Result<GetStateResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(GetStateResponse {
        timer_state: runtime.timer.clone(),
        current_tasks: runtime.tasks.clone(),
        stats: runtime.stats.clone(),
        has_remote_classifier: state.remote_api_key().is_some(),
    })
}

pub fn update_tasks_impl(state: &AppState, tasks: Vec<String>) -> Result<(), InfraError> {
    let tasks = normalize_tasks(tasks);
    let mut runtime = lock_runtime(state)?;
    runtime.tasks = tasks;
    state.classification_cache.invalidate_all()?;
    state.persist_runtime(&runtime)?;
    let count = runtime.tasks.len();
    drop(runtime);
    state.log_info("update_tasks", &format!("updated task list ({count} tasks)"));
    Ok(())
}

/// One countdown second. Exposed for the driver and for deterministic tests.
pub fn tick_timer_impl(state: &AppState) -> Result<(), InfraError> {
    let notification = {
        let mut runtime = lock_runtime(state)?;
        match runtime.timer.tick() {
            TickOutcome::Skipped => return Ok(()),
            TickOutcome::Counted => {
                state.persist_runtime(&runtime)?;
                None
            }
            TickOutcome::Completed(TimerPhase::Work) => {
                let today = state.today();
                runtime.stats.record_work_completion(today, WORK_PHASE_MINUTES);
                state.persist_runtime(&runtime)?;
                Some((BREAK_STARTED_TITLE, BREAK_STARTED_MESSAGE))
            }
            TickOutcome::Completed(TimerPhase::Break) => {
                state.persist_runtime(&runtime)?;
                Some((WORK_RESUMED_TITLE, WORK_RESUMED_MESSAGE))
            }
        }
    };

    if let Some((title, message)) = notification {
        state.notifier.notify(title, message);
    }
    Ok(())
}

pub(crate) fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))
}

fn spawn_ticker(state: &Arc<AppState>) -> Result<(), InfraError> {
    let weak = Arc::downgrade(state);
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(state) = weak.upgrade() else {
                break;
            };
            if let Err(error) = tick_timer_impl(&state) {
                state.log_error("timer_tick", &error.to_string());
            }
        }
    });

    let mut ticker = state
        .ticker
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("ticker lock poisoned: {error}")))?;
    if let Some(previous) = ticker.replace(handle) {
        previous.abort();
    }
    Ok(())
}

fn stop_ticker(state: &AppState) -> Result<(), InfraError> {
    let mut ticker = state
        .ticker
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("ticker lock poisoned: {error}")))?;
    if let Some(handle) = ticker.take() {
        handle.abort();
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::models::{BREAK_PHASE_SECONDS, WORK_PHASE_SECONDS};
    use crate::infrastructure::credential_store::InMemoryCredentialStore;
    use crate::infrastructure::notifier::RecordingNotifier;
    use crate::infrastructure::state_repository::InMemoryStateRepository;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    pub(crate) struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        pub(crate) fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "focusflow-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        pub(crate) fn app_state(&self) -> AppState {
            AppState::new(self.path.clone()).expect("initialize app state")
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn set_timer(state: &AppState, mutate: impl FnOnce(&mut TimerState)) {
        let mut runtime = lock_runtime(state).expect("runtime lock");
        mutate(&mut runtime.timer);
    }

    #[tokio::test]
    async fn start_pause_resume_reset_flow() {
        let workspace = TempWorkspace::new();
        let state = Arc::new(workspace.app_state());

        start_timer_impl(&state).expect("start");
        let snapshot = get_state_impl(&state).expect("get state");
        assert!(snapshot.timer_state.is_running);
        assert!(!snapshot.timer_state.is_paused);

        tick_timer_impl(&state).expect("tick");
        pause_timer_impl(&state).expect("pause");
        tick_timer_impl(&state).expect("paused tick");
        tick_timer_impl(&state).expect("paused tick");
        let paused = get_state_impl(&state).expect("get state");
        assert!(paused.timer_state.is_paused);
        assert_eq!(paused.timer_state.time_left, WORK_PHASE_SECONDS - 1);

        resume_timer_impl(&state).expect("resume");
        tick_timer_impl(&state).expect("tick");
        let resumed = get_state_impl(&state).expect("get state");
        assert_eq!(resumed.timer_state.time_left, WORK_PHASE_SECONDS - 2);

        reset_timer_impl(&state).expect("reset");
        let reset = get_state_impl(&state).expect("get state");
        assert_eq!(reset.timer_state, TimerState::default());
    }

    #[tokio::test]
    async fn reset_clears_the_classification_cache() {
        let workspace = TempWorkspace::new();
        let state = Arc::new(workspace.app_state());

        let tasks = vec!["study calculus".to_string()];
        state
            .classification_cache
            .store("example.com", &tasks, false)
            .expect("seed cache");

        reset_timer_impl(&state).expect("reset");
        assert_eq!(
            state
                .classification_cache
                .lookup("example.com", &tasks)
                .expect("lookup"),
            None
        );
    }

    #[tokio::test]
    async fn work_completion_updates_stats_and_notifies() {
        let workspace = TempWorkspace::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let state = Arc::new(
            workspace
                .app_state()
                .with_notifier(Arc::clone(&notifier) as Arc<dyn Notifier>),
        );

        start_timer_impl(&state).expect("start");
        set_timer(&state, |timer| timer.time_left = 1);
        tick_timer_impl(&state).expect("completing tick");

        let snapshot = get_state_impl(&state).expect("get state");
        assert_eq!(snapshot.timer_state.phase, TimerPhase::Break);
        assert_eq!(snapshot.timer_state.time_left, BREAK_PHASE_SECONDS);
        assert_eq!(snapshot.stats.today_count, 1);
        assert_eq!(snapshot.stats.total_minutes, WORK_PHASE_MINUTES);
        assert_eq!(snapshot.stats.streak, 1);

        let notifications = notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].0, BREAK_STARTED_TITLE);
    }

    #[tokio::test]
    async fn break_completion_flips_back_and_notifies_without_stats() {
        let workspace = TempWorkspace::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let state = Arc::new(
            workspace
                .app_state()
                .with_notifier(Arc::clone(&notifier) as Arc<dyn Notifier>),
        );

        start_timer_impl(&state).expect("start");
        set_timer(&state, |timer| {
            timer.phase = TimerPhase::Break;
            timer.total_seconds = BREAK_PHASE_SECONDS;
            timer.time_left = 1;
        });
        tick_timer_impl(&state).expect("completing tick");

        let snapshot = get_state_impl(&state).expect("get state");
        assert_eq!(snapshot.timer_state.phase, TimerPhase::Work);
        assert_eq!(snapshot.timer_state.time_left, WORK_PHASE_SECONDS);
        assert_eq!(snapshot.stats.today_count, 0);

        let notifications = notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].0, WORK_RESUMED_TITLE);
    }

    #[tokio::test]
    async fn update_tasks_normalizes_and_invalidates_cache() {
        let workspace = TempWorkspace::new();
        let state = Arc::new(workspace.app_state());

        let old_tasks = vec!["study calculus".to_string()];
        state
            .classification_cache
            .store("example.com", &old_tasks, false)
            .expect("seed cache");

        update_tasks_impl(
            &state,
            vec![
                " study calculus ".to_string(),
                "".to_string(),
                "study calculus".to_string(),
                "write essay".to_string(),
            ],
        )
        .expect("update tasks");

        let snapshot = get_state_impl(&state).expect("get state");
        assert_eq!(
            snapshot.current_tasks,
            vec!["study calculus".to_string(), "write essay".to_string()]
        );
        assert_eq!(
            state
                .classification_cache
                .lookup("example.com", &old_tasks)
                .expect("lookup"),
            None
        );
    }

    #[tokio::test]
    async fn every_mutation_persists_the_full_record() {
        let workspace = TempWorkspace::new();
        let repository = Arc::new(InMemoryStateRepository::default());
        let state = Arc::new(
            workspace
                .app_state()
                .with_state_repository(Arc::clone(&repository) as Arc<dyn StateRepository>),
        );

        update_tasks_impl(&state, vec!["study calculus".to_string()]).expect("update tasks");
        start_timer_impl(&state).expect("start");
        tick_timer_impl(&state).expect("tick");

        let persisted = repository.load().expect("load").expect("persisted record");
        assert!(persisted.timer_state.is_running);
        assert_eq!(persisted.timer_state.time_left, WORK_PHASE_SECONDS - 1);
        assert_eq!(persisted.current_tasks, vec!["study calculus".to_string()]);
        assert_eq!(persisted.stats.blocked_today, 0);
    }

    #[test]
    fn state_survives_restart_and_rolls_over_daily_counters() {
        let workspace = TempWorkspace::new();
        {
            let state = workspace.app_state();
            let mut runtime = lock_runtime(&state).expect("runtime lock");
            runtime.stats.blocked_today = 9;
            runtime.stats.today_count = 4;
            runtime.stats.streak = 2;
            runtime.stats.total_minutes = 100;
            runtime.stats.last_date = NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date");
            runtime.tasks = vec!["study calculus".to_string()];
            state.persist_runtime(&runtime).expect("persist");
        }

        let reloaded = workspace.app_state();
        let snapshot = get_state_impl(&reloaded).expect("get state");
        assert_eq!(snapshot.stats.blocked_today, 0, "daily counter resets");
        assert_ne!(
            snapshot.stats.last_date,
            NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date")
        );
        assert_eq!(snapshot.stats.today_count, 4);
        assert_eq!(snapshot.stats.streak, 2);
        assert_eq!(snapshot.stats.total_minutes, 100);
        assert_eq!(snapshot.current_tasks, vec!["study calculus".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_driver_ticks_once_per_second() {
        let workspace = TempWorkspace::new();
        let state = Arc::new(workspace.app_state());

        start_timer_impl(&state).expect("start");
        tokio::time::sleep(Duration::from_millis(3500)).await;

        let snapshot = get_state_impl(&state).expect("get state");
        assert_eq!(snapshot.timer_state.time_left, WORK_PHASE_SECONDS - 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_stops_the_countdown_driver() {
        let workspace = TempWorkspace::new();
        let state = Arc::new(workspace.app_state());

        start_timer_impl(&state).expect("start");
        tokio::time::sleep(Duration::from_millis(1500)).await;
        reset_timer_impl(&state).expect("reset");
        tokio::time::sleep(Duration::from_secs(5)).await;

        let snapshot = get_state_impl(&state).expect("get state");
        assert_eq!(snapshot.timer_state.time_left, WORK_PHASE_SECONDS);
        assert!(!snapshot.timer_state.is_running);
    }

    #[test]
    fn api_key_resolution_prefers_environment_then_store() {
        let store = InMemoryCredentialStore::with_api_key("sk-from-store");

        let from_env = resolve_api_key(|_| Some("sk-from-env".to_string()), &store);
        assert_eq!(from_env, Some("sk-from-env".to_string()));

        let from_store = resolve_api_key(|_| None, &store);
        assert_eq!(from_store, Some("sk-from-store".to_string()));

        let placeholder_env = resolve_api_key(|_| Some("YOUR_API_KEY_HERE".to_string()), &store);
        assert_eq!(placeholder_env, Some("sk-from-store".to_string()));

        let empty = InMemoryCredentialStore::default();
        assert_eq!(resolve_api_key(|_| None, &empty), None);
    }

    #[test]
    fn get_state_reports_remote_classifier_availability() {
        let workspace = TempWorkspace::new();
        let state = workspace
            .app_state()
            .with_credential_store(Arc::new(InMemoryCredentialStore::with_api_key("sk-test"))
                as Arc<dyn CredentialStore>);
        assert!(get_state_impl(&state).expect("get state").has_remote_classifier);

        let without = workspace
            .app_state()
            .with_credential_store(Arc::new(InMemoryCredentialStore::default())
                as Arc<dyn CredentialStore>);
        assert!(!get_state_impl(&without).expect("get state").has_remote_classifier);
    }
}
