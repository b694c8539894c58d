//! Test-only fakes for the agent's collaborators and a ready-made rig.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::agent::{Agent, Collaborators};
use crate::core::snapshot::{Element, PageSnapshot};
use crate::io::clock::Clock;
use crate::io::config::GuideConfig;
use crate::io::memory::InMemoryStore;
use crate::io::model::{GenerateRequest, ModelClient, ModelError, ModelResponse, Role};
use crate::io::search::{SearchError, SearchHit, SearchOptions, SearchProvider, SearchResult};
use crate::io::surface::{Surface, SurfaceCommand, SurfaceError, SurfaceReply, Tab, TabId};

pub const TAB_ID: TabId = 7;
pub const TAB_URL: &str = "https://app.example.com/settings";

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Virtual clock. `sleep` advances time instantly and yields once.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *lock(&self.now) += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *lock(&self.now)
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// Model client answering from per-role queues. An empty queue answers with
/// a non-retryable error so unscripted calls fail loudly.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    queues: Mutex<HashMap<Role, VecDeque<Result<ModelResponse, ModelError>>>>,
    requests: Mutex<Vec<(Role, GenerateRequest)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, role: Role, response: ModelResponse) {
        self.push_result(role, Ok(response));
    }

    pub fn push_error(&self, role: Role, error: ModelError) {
        self.push_result(role, Err(error));
    }

    pub fn push_result(&self, role: Role, result: Result<ModelResponse, ModelError>) {
        lock(&self.queues).entry(role).or_default().push_back(result);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<(Role, GenerateRequest)> {
        lock(&self.requests).clone()
    }

    pub fn models_used(&self, role: Role) -> Vec<String> {
        lock(&self.requests)
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, request)| request.model.clone())
            .collect()
    }

    pub fn pending(&self, role: Role) -> usize {
        lock(&self.queues).get(&role).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(
        &self,
        role: Role,
        request: &GenerateRequest,
    ) -> Result<ModelResponse, ModelError> {
        lock(&self.requests).push((role, request.clone()));
        lock(&self.queues)
            .get_mut(&role)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(ModelError::new(format!("no scripted {role} response"))))
    }
}

/// Surface that records delivered commands and answers snapshots from a
/// configurable page.
#[derive(Debug)]
pub struct RecordingSurface {
    tabs: Mutex<HashMap<TabId, Tab>>,
    active: Mutex<Option<TabId>>,
    snapshot: Mutex<PageSnapshot>,
    not_ready: Mutex<usize>,
    inject_result: Mutex<Result<(), SurfaceError>>,
    visual_failure: Mutex<Option<SurfaceError>>,
    commands: Mutex<Vec<(TabId, SurfaceCommand)>>,
    injections: Mutex<Vec<TabId>>,
}

impl RecordingSurface {
    /// One active tab at [`TAB_URL`] showing [`sample_elements`].
    pub fn new() -> Self {
        let tab = Tab::new(TAB_ID, TAB_URL);
        Self {
            tabs: Mutex::new(HashMap::from([(tab.id, tab)])),
            active: Mutex::new(Some(TAB_ID)),
            snapshot: Mutex::new(PageSnapshot::from_elements(sample_elements())),
            not_ready: Mutex::new(0),
            inject_result: Mutex::new(Ok(())),
            visual_failure: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
            injections: Mutex::new(Vec::new()),
        }
    }

    pub fn add_tab(&self, tab: Tab) {
        lock(&self.tabs).insert(tab.id, tab);
    }

    pub fn set_active(&self, tab: Option<TabId>) {
        *lock(&self.active) = tab;
    }

    pub fn set_elements(&self, elements: Vec<Element>) {
        *lock(&self.snapshot) = PageSnapshot::from_elements(elements);
    }

    /// Answer the next `count` dispatches with `NotReady`.
    pub fn fail_not_ready(&self, count: usize) {
        *lock(&self.not_ready) = count;
    }

    pub fn set_inject_result(&self, result: Result<(), SurfaceError>) {
        *lock(&self.inject_result) = result;
    }

    /// Fail every highlight, pulse and scroll with `error`.
    pub fn fail_visuals(&self, error: SurfaceError) {
        *lock(&self.visual_failure) = Some(error);
    }

    pub fn commands(&self) -> Vec<SurfaceCommand> {
        lock(&self.commands)
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }

    pub fn commands_for(&self, tab: TabId) -> Vec<SurfaceCommand> {
        lock(&self.commands)
            .iter()
            .filter(|(id, _)| *id == tab)
            .map(|(_, command)| command.clone())
            .collect()
    }

    /// Highlight, pulse and scroll commands only.
    pub fn visual_commands(&self) -> Vec<SurfaceCommand> {
        self.commands()
            .into_iter()
            .filter(is_visual)
            .collect()
    }

    pub fn injections(&self) -> Vec<TabId> {
        lock(&self.injections).clone()
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

fn is_visual(command: &SurfaceCommand) -> bool {
    matches!(
        command,
        SurfaceCommand::Highlight { .. } | SurfaceCommand::Pulse { .. } | SurfaceCommand::Scroll { .. }
    )
}

#[async_trait]
impl Surface for RecordingSurface {
    async fn dispatch(
        &self,
        tab: TabId,
        command: &SurfaceCommand,
    ) -> Result<SurfaceReply, SurfaceError> {
        {
            let mut not_ready = lock(&self.not_ready);
            if *not_ready > 0 {
                *not_ready -= 1;
                return Err(SurfaceError::NotReady);
            }
        }
        if is_visual(command)
            && let Some(error) = lock(&self.visual_failure).clone()
        {
            return Err(error);
        }
        lock(&self.commands).push((tab, command.clone()));
        match command {
            SurfaceCommand::CaptureSnapshot => {
                Ok(SurfaceReply::Snapshot(lock(&self.snapshot).clone()))
            }
            _ => Ok(SurfaceReply::Ack),
        }
    }

    async fn inject(&self, tab: TabId) -> Result<(), SurfaceError> {
        lock(&self.injections).push(tab);
        lock(&self.inject_result).clone()
    }

    async fn get_tab(&self, tab: TabId) -> Result<Tab, SurfaceError> {
        lock(&self.tabs)
            .get(&tab)
            .cloned()
            .ok_or(SurfaceError::NoTab(tab))
    }

    async fn active_tab(&self) -> Result<Tab, SurfaceError> {
        let active = (*lock(&self.active)).ok_or(SurfaceError::NoActiveTab)?;
        self.get_tab(active).await
    }
}

/// Search provider returning one canned hit per query.
#[derive(Debug, Default)]
pub struct StaticSearch {
    queries: Mutex<Vec<(String, SearchOptions)>>,
    unavailable: Mutex<bool>,
}

impl StaticSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *lock(&self.unavailable) = unavailable;
    }

    pub fn queries(&self) -> Vec<(String, SearchOptions)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResult, SearchError> {
        if *lock(&self.unavailable) {
            return Err(SearchError::NotConfigured);
        }
        lock(&self.queries).push((query.to_string(), *options));
        Ok(SearchResult {
            query: query.to_string(),
            answer: Some(format!("Answer for {query}")),
            results: vec![SearchHit {
                title: "Help center".to_string(),
                url: "https://help.example.com/billing".to_string(),
                content: Some("Open Settings, then Billing.".to_string()),
            }],
        })
    }
}

/// A settings page with a save button, a billing link and an email field.
pub fn sample_elements() -> Vec<Element> {
    vec![
        Element::new("btn-save")
            .with_tag("button")
            .with_text("Save changes"),
        Element::new("link-billing").with_tag("a").with_text("Billing"),
        Element {
            placeholder: Some("Email address".to_string()),
            ..Element::new("input-email").with_tag("input")
        },
    ]
}

/// Model text answer carrying `{"steps": steps}`.
pub fn plan_response(steps: Value) -> ModelResponse {
    ModelResponse::from_text(&json!({ "steps": steps }).to_string())
}

/// An agent wired to fakes, an in-memory store and a manual clock.
pub struct Rig {
    pub agent: Arc<Agent>,
    pub model: Arc<ScriptedModel>,
    pub surface: Arc<RecordingSurface>,
    pub search: Arc<StaticSearch>,
    pub memory: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(GuideConfig::default())
    }

    /// Panics if `config` fails validation.
    pub fn with_config(config: GuideConfig) -> Self {
        let model = Arc::new(ScriptedModel::new());
        let surface = Arc::new(RecordingSurface::new());
        let search = Arc::new(StaticSearch::new());
        let memory = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new());
        let collaborators = Collaborators {
            memory: memory.clone(),
            surface: surface.clone(),
            model: model.clone(),
            search: search.clone(),
        };
        let agent = Agent::new(config, collaborators, clock.clone()).expect("valid test config");
        Self {
            agent: Arc::new(agent),
            model,
            surface,
            search,
            memory,
            clock,
        }
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}
