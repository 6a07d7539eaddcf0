use crate::auth::{self, callback::CallbackServer, AuthEffect, AuthEvent, AuthStatus};
use crate::cascade::{Cascade, CascadeEvent, CascadeState, FetchRequest, Level, Step};
use crate::config::Config;
use crate::github::{paginate, FetchOutcome, GithubClient, ReleaseAsset};
use crate::persist::{self, KeyValueStore, PersistedState};
use anyhow::{Context, Result};
use ratatui::widgets::ListState;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Level(Level),
    Assets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Help,
}

pub struct App {
    // Config
    pub config: Config,
    pub cascade: Cascade,

    // Persisted state (session + drill-down)
    pub state: PersistedState,
    store: Box<dyn KeyValueStore>,

    // Network
    http: reqwest::Client,
    pub client: Option<GithubClient>,
    fetch_tx: mpsc::UnboundedSender<CascadeEvent>,
    fetch_rx: mpsc::UnboundedReceiver<CascadeEvent>,
    auth_tx: mpsc::UnboundedSender<AuthEvent>,
    auth_rx: mpsc::UnboundedReceiver<AuthEvent>,
    pub callback_listening: bool,

    // UI state
    pub focus: Focus,
    pub input_mode: InputMode,
    pub dropdown_state: ListState,
    pub asset_list_state: ListState,

    // Status
    pub status_message: Option<String>,
    pub status_is_error: bool,
    pub status_set_at: Option<std::time::Instant>,

    // Loading spinner state (used by ui)
    pub spinner_frame: usize,
}

impl App {
    pub fn new(config: Config, store: Box<dyn KeyValueStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("release-finder/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.settings.api_timeout))
            .build()
            .context("Failed to build HTTP client")?;
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let (auth_tx, auth_rx) = mpsc::unbounded_channel();

        Ok(Self {
            cascade: Cascade::from_settings(&config.settings),
            config,
            state: PersistedState::default(),
            store,
            http,
            client: None,
            fetch_tx,
            fetch_rx,
            auth_tx,
            auth_rx,
            callback_listening: false,
            focus: Focus::Level(Level::User),
            input_mode: InputMode::Normal,
            dropdown_state: ListState::default(),
            asset_list_state: ListState::default(),
            status_message: None,
            status_is_error: false,
            status_set_at: None,
            spinner_frame: 0,
        })
    }

    /// Restore the previous session's state, or start blank
    pub fn restore(&mut self) -> bool {
        match persist::load(self.store.as_ref()) {
            Some(saved) => {
                self.state = PersistedState {
                    session: saved.session,
                    cascade: saved.cascade.resumed(),
                };
                self.focus = Focus::Level(*self.state.cascade.visible_levels().last().unwrap_or(&Level::User));
                if self.state.cascade.asset_view().is_some() {
                    self.focus = Focus::Assets;
                    self.asset_list_state.select(Some(0));
                }
                true
            }
            None => {
                self.state = PersistedState::default();
                false
            }
        }
    }

    /// Forget everything persisted
    pub fn reset(&mut self) -> Result<()> {
        persist::clear(self.store.as_mut()).context("Failed to clear persisted state")?;
        self.state = PersistedState::default();
        self.focus = Focus::Level(Level::User);
        Ok(())
    }

    /// Run the startup half of the auth flow against `location`
    pub fn start(&mut self, location: Option<&str>) {
        let session = std::mem::take(&mut self.state.session);
        let (session, effects) = auth::startup(session, location);
        self.state.session = session;
        self.persist();
        self.apply_auth_effects(effects);
        if let Some(bare) = location.and_then(auth::strip_code) {
            tracing::debug!(location = %bare, "authorization code consumed");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.session.is_authenticated()
    }

    pub fn auth_status(&self) -> AuthStatus {
        self.state.session.auth_status
    }

    pub fn cascade_state(&self) -> &CascadeState {
        &self.state.cascade
    }

    /// Feed one event through the reducer, start its fetches, persist
    pub fn dispatch(&mut self, event: CascadeEvent) {
        let state = std::mem::take(&mut self.state.cascade);
        let transition = self.cascade.reduce(state, event);
        self.state.cascade = transition.state;
        for request in transition.fetches {
            self.spawn_fetch(request);
        }
        self.clamp_selection();
        self.persist();
    }

    pub fn dispatch_auth(&mut self, event: AuthEvent) {
        if let AuthEvent::ExchangeFailed(reason) = &event {
            self.set_error(format!("Sign-in failed: {reason}"));
        }
        let session = std::mem::take(&mut self.state.session);
        let (session, effects) = auth::reduce(session, event);
        self.state.session = session;
        self.persist();
        self.apply_auth_effects(effects);
    }

    fn persist(&mut self) {
        if let Err(e) = persist::save(self.store.as_mut(), &self.state) {
            tracing::warn!(error = %e, "failed to persist state");
            self.set_error(format!("Could not save state: {e}"));
        }
    }

    fn apply_auth_effects(&mut self, effects: Vec<AuthEffect>) {
        for effect in effects {
            match effect {
                AuthEffect::ExchangeCode(code) => self.start_exchange(code),
                AuthEffect::ArmClient(token) => match self.build_client() {
                    Ok(client) => {
                        self.client = Some(client.with_token(token));
                        self.set_status("Signed in to GitHub");
                    }
                    Err(e) => self.set_error(format!("Failed to create GitHub client: {e}")),
                },
                AuthEffect::DisarmClient => {
                    self.client = None;
                    self.set_status("Signed out");
                }
            }
        }
    }

    fn build_client(&self) -> Result<GithubClient> {
        let settings = &self.config.settings;
        GithubClient::new(&self.config.github.api_base, settings.api_timeout, settings.per_page)
            .context("Failed to build GitHub client")
    }

    /// Start a background task that runs the token exchange
    fn start_exchange(&mut self, code: String) {
        let http = self.http.clone();
        let relay = self.config.github.relay_url.clone();
        let tx = self.auth_tx.clone();

        tokio::spawn(async move {
            let event = match auth::exchange_code(&http, &relay, &code).await {
                Ok(token) => AuthEvent::TokenReceived(token),
                Err(e) => AuthEvent::ExchangeFailed(e.to_string()),
            };
            let _ = tx.send(event);
        });
    }

    /// Open the authorize page and wait for GitHub to redirect back
    pub fn begin_sign_in(&mut self) {
        let url = match auth::authorize_url(&self.config.github) {
            Ok(url) => url,
            Err(e) => {
                self.set_error(format!("{e}"));
                return;
            }
        };

        if !self.callback_listening {
            self.callback_listening = true;
            let redirect_uri = self.config.github.redirect_uri.clone();
            let tx = self.auth_tx.clone();
            tokio::spawn(async move {
                let result = match CallbackServer::bind(&redirect_uri).await {
                    Ok(server) => server.wait_for_location().await,
                    Err(e) => Err(e),
                };
                let event = match result {
                    Ok(location) => match auth::extract_code(&location) {
                        Some(code) => AuthEvent::CodeReceived(code),
                        None => AuthEvent::ExchangeFailed("redirect carried no code".to_string()),
                    },
                    Err(e) => AuthEvent::ExchangeFailed(e.to_string()),
                };
                let _ = tx.send(event);
            });
        }

        match open::that(url.as_str()) {
            Ok(()) => self.set_status("Complete sign-in in your browser"),
            Err(_) => self.set_status(format!("Open {url} to sign in")),
        }
    }

    pub fn sign_out(&mut self) {
        self.dispatch_auth(AuthEvent::SignOut);
    }

    /// Run a pagination loop for `request` on a background task
    fn spawn_fetch(&mut self, request: FetchRequest) {
        let tx = self.fetch_tx.clone();
        let FetchRequest { ticket, query } = request;

        let Some(client) = self.client.clone() else {
            tracing::warn!(?ticket, "fetch requested before sign-in");
            let _ = tx.send(CascadeEvent::FetchFinished {
                ticket,
                outcome: FetchOutcome::Failed { page: 1, reason: "not signed in".to_string() },
            });
            return;
        };
        let max_pages = query.page_limit(self.config.settings.max_pages);
        tracing::info!(?ticket, ?query, "starting fetch");

        tokio::spawn(async move {
            let page_tx = tx.clone();
            let outcome = paginate(
                client.per_page,
                max_pages,
                |page| {
                    let client = client.clone();
                    let query = query.clone();
                    async move { client.fetch_page(&query, page).await }
                },
                |page, items| match page_tx.send(CascadeEvent::PageLoaded { ticket, page, items }) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(_) => ControlFlow::Break(()),
                },
            )
            .await;
            let _ = tx.send(CascadeEvent::FetchFinished { ticket, outcome });
        });
    }

    /// Drain fetch results (non-blocking)
    pub fn poll_fetches(&mut self) {
        let mut results = Vec::new();
        while let Ok(event) = self.fetch_rx.try_recv() {
            results.push(event);
        }
        for event in results {
            self.dispatch(event);
        }
    }

    /// Drain auth results (non-blocking)
    pub fn poll_auth(&mut self) {
        let mut results = Vec::new();
        while let Ok(event) = self.auth_rx.try_recv() {
            results.push(event);
        }
        for event in results {
            // The listener task is done once it reports anything
            if matches!(event, AuthEvent::CodeReceived(_) | AuthEvent::ExchangeFailed(_)) {
                self.callback_listening = false;
            }
            self.dispatch_auth(event);
        }
    }

    // Focus and text input

    /// Focus targets in tab order
    pub fn focus_order(&self) -> Vec<Focus> {
        let mut order: Vec<Focus> = self.state.cascade.visible_levels().iter().map(|l| Focus::Level(*l)).collect();
        if self.state.cascade.asset_view().is_some() {
            order.push(Focus::Assets);
        }
        order
    }

    pub fn focus_next(&mut self) {
        let order = self.focus_order();
        let pos = order.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.set_focus(order[(pos + 1) % order.len()]);
    }

    pub fn focus_prev(&mut self) {
        let order = self.focus_order();
        let pos = order.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.set_focus(order[(pos + order.len() - 1) % order.len()]);
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        match focus {
            Focus::Level(level) => {
                let has_items = !self.state.cascade.visible_candidates(level).is_empty();
                self.dropdown_state.select(has_items.then_some(0));
            }
            Focus::Assets => {
                if self.asset_list_state.selected().is_none() {
                    self.asset_list_state.select(Some(0));
                }
            }
        }
    }

    /// Keep focus on something that is still visible
    fn ensure_focus_visible(&mut self) {
        if !self.focus_order().contains(&self.focus) {
            let last = self.focus_order().last().copied().unwrap_or(Focus::Level(Level::User));
            self.set_focus(last);
        }
    }

    pub fn focused_level(&self) -> Option<Level> {
        match self.focus {
            Focus::Level(level) => Some(level),
            Focus::Assets => None,
        }
    }

    fn edit_event(level: Level, text: String) -> CascadeEvent {
        match level {
            Level::User => CascadeEvent::EditUserQuery(text),
            Level::Repo => CascadeEvent::EditRepoQuery(text),
            Level::Release => CascadeEvent::EditReleaseQuery(text),
        }
    }

    pub fn type_char(&mut self, c: char) {
        let Some(level) = self.focused_level() else { return };
        let mut text = self.state.cascade.query(level).to_string();
        text.push(c);
        self.dispatch(Self::edit_event(level, text));
        self.dropdown_state.select(Some(0));
        self.ensure_focus_visible();
    }

    pub fn backspace(&mut self) {
        let Some(level) = self.focused_level() else { return };
        let mut text = self.state.cascade.query(level).to_string();
        if text.pop().is_none() {
            return;
        }
        self.dispatch(Self::edit_event(level, text));
        self.dropdown_state.select(Some(0));
        self.ensure_focus_visible();
    }

    pub fn clear_query(&mut self) {
        let Some(level) = self.focused_level() else { return };
        if self.state.cascade.query(level).is_empty() {
            return;
        }
        self.dispatch(Self::edit_event(level, String::new()));
        self.ensure_focus_visible();
    }

    // Dropdown

    pub fn dropdown_len(&self) -> usize {
        self.focused_level()
            .map(|level| self.state.cascade.visible_candidates(level).len())
            .unwrap_or(0)
    }

    pub fn dropdown_next(&mut self) {
        let max = self.dropdown_len();
        if max == 0 {
            return;
        }
        let i = self.dropdown_state.selected().map(|i| (i + 1).min(max - 1)).unwrap_or(0);
        self.dropdown_state.select(Some(i));
    }

    pub fn dropdown_prev(&mut self) {
        if self.dropdown_len() == 0 {
            return;
        }
        let i = self.dropdown_state.selected().map(|i| i.saturating_sub(1)).unwrap_or(0);
        self.dropdown_state.select(Some(i));
    }

    fn clamp_selection(&mut self) {
        let max = self.dropdown_len();
        match self.dropdown_state.selected() {
            _ if max == 0 => self.dropdown_state.select(None),
            Some(i) if i >= max => self.dropdown_state.select(Some(max - 1)),
            None => self.dropdown_state.select(Some(0)),
            _ => {}
        }
    }

    /// Commit the highlighted candidate of the focused level and move on
    pub fn commit_highlighted(&mut self) {
        let Some(level) = self.focused_level() else { return };
        let candidates = self.state.cascade.visible_candidates(level);
        let Some((id, _)) = self.dropdown_state.selected().and_then(|i| candidates.get(i)).cloned() else {
            return;
        };

        let event = match level {
            Level::User => CascadeEvent::CommitUser(id),
            Level::Repo => CascadeEvent::CommitRepo(id),
            Level::Release => CascadeEvent::CommitRelease(id),
        };
        self.dispatch(event);

        let next = match (level, self.state.cascade.step) {
            (Level::User, Step::Repo) => Focus::Level(Level::Repo),
            (Level::Repo, Step::Version) => Focus::Level(Level::Release),
            (Level::Release, _) if self.state.cascade.asset_view().is_some() => {
                self.asset_list_state.select(Some(0));
                Focus::Assets
            }
            _ => self.focus,
        };
        self.set_focus(next);
    }

    // Assets

    pub fn selected_asset(&self) -> Option<&ReleaseAsset> {
        let release = self.state.cascade.asset_view()?;
        release.assets.get(self.asset_list_state.selected()?)
    }

    pub fn asset_next(&mut self) {
        let Some(release) = self.state.cascade.asset_view() else { return };
        let len = release.assets.len();
        if len == 0 {
            return;
        }
        let i = self.asset_list_state.selected().map(|i| (i + 1).min(len - 1)).unwrap_or(0);
        self.asset_list_state.select(Some(i));
    }

    pub fn asset_prev(&mut self) {
        let i = self.asset_list_state.selected().map(|i| i.saturating_sub(1)).unwrap_or(0);
        self.asset_list_state.select(Some(i));
    }

    pub fn open_selected_asset(&mut self) {
        let Some(url) = self.selected_asset().map(|a| a.browser_download_url.clone()) else { return };
        self.open_url(&url);
    }

    pub fn open_release_page(&mut self) {
        let Some(url) = self.state.cascade.asset_view().map(|r| r.html_url.clone()) else { return };
        self.open_url(&url);
    }

    fn open_url(&mut self, url: &str) {
        if url.is_empty() {
            return;
        }
        match open::that(url) {
            Ok(()) => self.set_status(format!("Opened {url}")),
            Err(e) => self.set_error(format!("Failed to open browser: {e}")),
        }
    }

    pub fn copy_selected_asset(&mut self) {
        let Some(url) = self.selected_asset().map(|a| a.browser_download_url.clone()) else { return };
        match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(url.clone())) {
            Ok(()) => self.set_status(format!("Copied {url}")),
            Err(e) => self.set_error(format!("Clipboard unavailable: {e}")),
        }
    }

    // Status & spinner

    pub fn tick_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % 10;
    }

    pub fn spinner_char(&self) -> &'static str {
        const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        SPINNER[self.spinner_frame]
    }

    pub fn is_busy(&self) -> bool {
        let c = &self.state.cascade;
        c.loading_user || c.loading_repo || c.loading_release || self.auth_status() == AuthStatus::Exchanging
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = false;
        self.status_set_at = Some(std::time::Instant::now());
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = true;
        self.status_set_at = Some(std::time::Instant::now());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
        self.status_is_error = false;
        self.status_set_at = None;
    }

    /// Clear status message if it's older than 5 seconds
    pub fn clear_expired_status(&mut self) {
        if let Some(set_at) = self.status_set_at {
            if set_at.elapsed() > Duration::from_secs(5) {
                self.clear_status();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::FetchTicket;
    use crate::github::{GithubRelease, GithubRepo, GithubUser, PageItems};
    use crate::persist::MemoryStore;

    fn app() -> App {
        App::new(Config::default(), Box::new(MemoryStore::new())).unwrap()
    }

    fn user(id: u64, login: &str) -> GithubUser {
        GithubUser { id, login: login.to_string(), avatar_url: String::new(), html_url: String::new() }
    }

    fn repo(id: u64, name: &str) -> GithubRepo {
        GithubRepo {
            id,
            name: name.to_string(),
            full_name: String::new(),
            description: None,
            html_url: String::new(),
            stargazers_count: 0,
        }
    }

    fn release(id: u64) -> GithubRelease {
        GithubRelease {
            id,
            name: None,
            tag_name: format!("v{id}"),
            published_at: None,
            html_url: String::new(),
            body: None,
            prerelease: false,
            draft: false,
            assets: vec![ReleaseAsset {
                id: id * 100,
                name: format!("pkg-{id}.zip"),
                browser_download_url: format!("https://example.invalid/pkg-{id}.zip"),
                size: 10,
                download_count: 1,
                content_type: None,
            }],
        }
    }

    fn current_ticket(app: &App, level: Level) -> FetchTicket {
        FetchTicket { level, generation: app.state.cascade.generation(level) }
    }

    #[test]
    fn test_fetch_without_client_finishes_immediately() {
        let mut app = app();
        app.type_char('o');
        app.type_char('c');
        assert!(app.state.cascade.loading_user);

        app.poll_fetches();
        assert!(!app.state.cascade.loading_user);
        assert!(app.state.cascade.users.is_empty());
    }

    #[test]
    fn test_every_dispatch_is_persisted() {
        let mut app = app();
        app.type_char('x');
        let saved = persist::load(app.store.as_ref()).unwrap();
        assert_eq!(saved.cascade.query_user, "x");
    }

    #[test]
    fn test_restore_round_trip_clears_loading() {
        let mut first = app();
        first.type_char('o');
        first.type_char('c');
        let raw = first.store.get(persist::STATE_KEY).unwrap().unwrap();

        let mut store = MemoryStore::new();
        store.set(persist::STATE_KEY, &raw).unwrap();
        let mut second = App::new(Config::default(), Box::new(store)).unwrap();
        assert!(second.restore());
        assert_eq!(second.state.cascade.query_user, "oc");
        assert!(!second.state.cascade.loading_user);
    }

    #[test]
    fn test_restore_corrupted_starts_blank() {
        let mut store = MemoryStore::new();
        store.set(persist::STATE_KEY, "{oops").unwrap();
        let mut app = App::new(Config::default(), Box::new(store)).unwrap();
        assert!(!app.restore());
        assert_eq!(app.state, PersistedState::default());
    }

    #[test]
    fn test_drill_down_moves_focus() {
        let mut app = app();
        app.type_char('o');
        app.type_char('c');
        let ticket = current_ticket(&app, Level::User);
        app.dispatch(CascadeEvent::PageLoaded {
            ticket,
            page: 1,
            items: PageItems::Users(vec![user(1, "octocat")]),
        });
        app.dropdown_state.select(Some(0));

        app.commit_highlighted();
        assert_eq!(app.focus, Focus::Level(Level::Repo));
        assert_eq!(app.state.cascade.step, Step::Repo);

        let ticket = current_ticket(&app, Level::Repo);
        app.dispatch(CascadeEvent::PageLoaded {
            ticket,
            page: 1,
            items: PageItems::Repos(vec![repo(10, "Hello-World"), repo(11, "Spoon-Knife")]),
        });
        app.type_char('s');
        assert_eq!(app.dropdown_len(), 1);
        app.commit_highlighted();
        assert_eq!(app.state.cascade.committed_repo.as_deref(), Some("Spoon-Knife"));
        assert_eq!(app.focus, Focus::Level(Level::Release));

        let ticket = current_ticket(&app, Level::Release);
        app.dispatch(CascadeEvent::PageLoaded {
            ticket,
            page: 1,
            items: PageItems::Releases(vec![release(1), release(2)]),
        });
        app.dropdown_next();
        app.commit_highlighted();
        assert_eq!(app.focus, Focus::Assets);
        assert_eq!(app.selected_asset().map(|a| a.name.as_str()), Some("pkg-2.zip"));
        assert_eq!(
            app.focus_order(),
            vec![
                Focus::Level(Level::User),
                Focus::Level(Level::Repo),
                Focus::Level(Level::Release),
                Focus::Assets
            ]
        );
    }

    #[test]
    fn test_editing_release_query_hides_assets_and_moves_focus() {
        let mut app = app();
        app.state.cascade.step = Step::Version;
        app.state.cascade.releases = vec![release(1)];
        app.state.cascade.selected_release = Some(release(1));
        app.focus = Focus::Level(Level::Release);

        app.type_char('v');
        assert!(app.state.cascade.asset_view().is_none());
        assert!(!app.focus_order().contains(&Focus::Assets));
    }

    #[test]
    fn test_backspace_on_empty_query_is_noop() {
        let mut app = app();
        app.backspace();
        assert_eq!(app.state.cascade, CascadeState::default());
    }

    #[test]
    fn test_focus_cycles_visible_levels() {
        let mut app = app();
        app.focus_next();
        assert_eq!(app.focus, Focus::Level(Level::User));

        app.state.cascade.step = Step::Repo;
        app.focus_next();
        assert_eq!(app.focus, Focus::Level(Level::Repo));
        app.focus_next();
        assert_eq!(app.focus, Focus::Level(Level::User));
        app.focus_prev();
        assert_eq!(app.focus, Focus::Level(Level::Repo));
    }

    #[test]
    fn test_start_with_persisted_token_arms_client() {
        let mut app = app();
        app.state.session.auth_token = Some("gho_saved".into());
        app.start(None);
        assert!(app.is_authenticated());
        assert!(app.client.as_ref().is_some_and(|c| c.has_token()));
    }

    #[test]
    fn test_sign_out_disarms_client() {
        let mut app = app();
        app.state.session.auth_token = Some("gho_saved".into());
        app.start(None);
        app.sign_out();
        assert!(!app.is_authenticated());
        assert!(app.client.is_none());
        let saved = persist::load(app.store.as_ref()).unwrap();
        assert_eq!(saved.session.auth_token, None);
    }

    #[test]
    fn test_reset_clears_store() {
        let mut app = app();
        app.type_char('z');
        app.reset().unwrap();
        assert!(persist::load(app.store.as_ref()).is_none());
        assert_eq!(app.state, PersistedState::default());
    }

    #[test]
    fn test_status_expiry_helpers() {
        let mut app = app();
        app.set_error("boom");
        assert!(app.status_is_error);
        app.clear_expired_status();
        assert!(app.status_message.is_some());
        app.clear_status();
        assert!(app.status_message.is_none());
    }
}
