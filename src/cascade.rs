//! The user → repository → release drill-down.
//!
//! [`Cascade::reduce`] is a pure function of `(state, event)`. It never
//! performs I/O; fetches it wants started come back as [`FetchRequest`]s and
//! their pages are fed in again as [`CascadeEvent::PageLoaded`].

use crate::config::Settings;
use crate::github::{
    Candidate, FetchOutcome, GithubRelease, GithubRepo, GithubUser, PageItems, PageQuery,
};
use serde::{Deserialize, Serialize};

/// Which levels are visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    User,
    Repo,
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    User,
    Repo,
    Release,
}

/// Identifies the fetch a page belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub level: Level,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: FetchTicket,
    pub query: PageQuery,
}

/// Per-level counters, bumped whenever a level's contents are invalidated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Generations {
    pub user: u64,
    pub repo: u64,
    pub release: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CascadeState {
    pub query_user: String,
    pub committed_user: Option<String>,
    pub users: Vec<GithubUser>,
    pub query_repo: String,
    pub committed_repo: Option<String>,
    pub repos: Vec<GithubRepo>,
    pub query_release: String,
    pub releases: Vec<GithubRelease>,
    /// A release listing has landed since the level was last cleared
    #[serde(default)]
    pub releases_listed: bool,
    pub selected_release: Option<GithubRelease>,
    pub step: Step,
    pub loading_user: bool,
    pub loading_repo: bool,
    pub loading_release: bool,
    pub generations: Generations,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CascadeEvent {
    EditUserQuery(String),
    CommitUser(u64),
    EditRepoQuery(String),
    CommitRepo(u64),
    EditReleaseQuery(String),
    CommitRelease(u64),
    PageLoaded { ticket: FetchTicket, page: u32, items: PageItems },
    FetchFinished { ticket: FetchTicket, outcome: FetchOutcome },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: CascadeState,
    pub fetches: Vec<FetchRequest>,
}

/// Reducer configuration
#[derive(Debug, Clone, Copy)]
pub struct Cascade {
    pub min_user_query_len: usize,
    pub discard_stale: bool,
}

impl Default for Cascade {
    fn default() -> Self {
        Self { min_user_query_len: 2, discard_stale: true }
    }
}

impl Cascade {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            min_user_query_len: settings.min_user_query_len.max(1),
            discard_stale: settings.discard_stale_responses,
        }
    }

    pub fn reduce(&self, mut state: CascadeState, event: CascadeEvent) -> Transition {
        let mut fetches = Vec::new();

        match event {
            CascadeEvent::EditUserQuery(text) => {
                let had_commit = state.committed_user.is_some();
                let fire = text.chars().count() >= self.min_user_query_len;
                state.query_user = text;
                self.clear_repo_level(&mut state);
                self.clear_release_level(&mut state);
                state.step = if had_commit { Step::Repo } else { Step::User };

                if fire {
                    state.generations.user += 1;
                    state.loading_user = true;
                    fetches.push(FetchRequest {
                        ticket: FetchTicket { level: Level::User, generation: state.generations.user },
                        query: PageQuery::SearchUsers { query: state.query_user.clone() },
                    });
                } else if self.discard_stale {
                    // Whatever was in flight no longer matches the query
                    state.generations.user += 1;
                    state.loading_user = false;
                }
            }

            CascadeEvent::CommitUser(id) => {
                let Some(login) = state.users.iter().find(|u| u.id == id).map(|u| u.login.clone()) else {
                    tracing::warn!(id, "commit for unknown user ignored");
                    return Transition { state, fetches };
                };
                tracing::info!(%login, "user committed");
                state.query_user = login.clone();
                state.committed_user = Some(login.clone());
                self.clear_repo_level(&mut state);
                self.clear_release_level(&mut state);
                state.step = Step::Repo;

                state.generations.repo += 1;
                state.loading_repo = true;
                fetches.push(FetchRequest {
                    ticket: FetchTicket { level: Level::Repo, generation: state.generations.repo },
                    query: PageQuery::SearchRepos { owner: login, query: String::new() },
                });
            }

            CascadeEvent::EditRepoQuery(text) => {
                state.query_repo = text;
                self.clear_release_level(&mut state);
            }

            CascadeEvent::CommitRepo(id) => {
                let Some(name) = state.repos.iter().find(|r| r.id == id).map(|r| r.name.clone()) else {
                    tracing::warn!(id, "commit for unknown repository ignored");
                    return Transition { state, fetches };
                };
                let Some(owner) = state.committed_user.clone() else {
                    tracing::warn!(%name, "repository commit without a committed user ignored");
                    return Transition { state, fetches };
                };
                tracing::info!(%owner, %name, "repository committed");
                state.query_repo = name.clone();
                state.committed_repo = Some(name.clone());
                self.clear_release_level(&mut state);
                state.step = Step::Version;

                state.generations.release += 1;
                state.loading_release = true;
                fetches.push(FetchRequest {
                    ticket: FetchTicket { level: Level::Release, generation: state.generations.release },
                    query: PageQuery::ListReleases { owner, repo: name },
                });
            }

            CascadeEvent::EditReleaseQuery(text) => {
                state.query_release = text;
                state.selected_release = None;
            }

            CascadeEvent::CommitRelease(id) => {
                let Some(release) = state.releases.iter().find(|r| r.id == id).cloned() else {
                    tracing::warn!(id, "commit for unknown release ignored");
                    return Transition { state, fetches };
                };
                tracing::info!(tag = %release.tag_name, assets = release.assets.len(), "release committed");
                state.query_release = release.display_name().to_string();
                state.selected_release = Some(release);
            }

            CascadeEvent::PageLoaded { ticket, page, items } => {
                if self.is_stale(&state, ticket) {
                    tracing::debug!(?ticket, page, "discarding page from superseded fetch");
                    return Transition { state, fetches };
                }
                apply_page(&mut state, ticket.level, page, items);
            }

            CascadeEvent::FetchFinished { ticket, outcome } => {
                if self.is_stale(&state, ticket) {
                    tracing::debug!(?ticket, ?outcome, "superseded fetch finished");
                    return Transition { state, fetches };
                }
                tracing::debug!(?ticket, ?outcome, "fetch finished");
                match ticket.level {
                    Level::User => state.loading_user = false,
                    Level::Repo => state.loading_repo = false,
                    Level::Release => state.loading_release = false,
                }
            }
        }

        Transition { state, fetches }
    }

    fn is_stale(&self, state: &CascadeState, ticket: FetchTicket) -> bool {
        self.discard_stale && state.generation(ticket.level) != ticket.generation
    }

    fn clear_repo_level(&self, state: &mut CascadeState) {
        state.query_repo.clear();
        state.committed_repo = None;
        state.repos.clear();
        if self.discard_stale {
            state.generations.repo += 1;
            state.loading_repo = false;
        }
    }

    fn clear_release_level(&self, state: &mut CascadeState) {
        state.query_release.clear();
        state.releases.clear();
        state.releases_listed = false;
        state.selected_release = None;
        if self.discard_stale {
            state.generations.release += 1;
            state.loading_release = false;
        }
    }
}

/// Page 1 replaces the level's list, later pages append
fn apply_page(state: &mut CascadeState, level: Level, page: u32, items: PageItems) {
    match (level, items) {
        (Level::User, PageItems::Users(mut users)) => {
            if page <= 1 {
                // Short logins first: likelier to be the one being typed
                users.sort_by_key(|u| u.login.chars().count());
                state.users = users;
            } else {
                state.users.extend(users);
            }
        }
        (Level::Repo, PageItems::Repos(repos)) => {
            if page <= 1 {
                state.repos = repos;
            } else {
                state.repos.extend(repos);
            }
        }
        (Level::Release, PageItems::Releases(releases)) => {
            state.releases_listed = true;
            if page <= 1 {
                state.releases = releases;
            } else {
                state.releases.extend(releases);
            }
        }
        (level, items) => {
            tracing::warn!(?level, len = items.len(), "page kind does not match level");
        }
    }
}

fn filter_candidates<'a, T: Candidate>(items: &'a [T], query: &str) -> Vec<&'a T> {
    items.iter().filter(|item| item.matches(query)).collect()
}

impl CascadeState {
    pub fn generation(&self, level: Level) -> u64 {
        match level {
            Level::User => self.generations.user,
            Level::Repo => self.generations.repo,
            Level::Release => self.generations.release,
        }
    }

    pub fn is_loading(&self, level: Level) -> bool {
        match level {
            Level::User => self.loading_user,
            Level::Repo => self.loading_repo,
            Level::Release => self.loading_release,
        }
    }

    pub fn query(&self, level: Level) -> &str {
        match level {
            Level::User => &self.query_user,
            Level::Repo => &self.query_repo,
            Level::Release => &self.query_release,
        }
    }

    /// Levels currently shown, in order
    pub fn visible_levels(&self) -> &'static [Level] {
        match self.step {
            Step::User => &[Level::User],
            Step::Repo => &[Level::User, Level::Repo],
            Step::Version => &[Level::User, Level::Repo, Level::Release],
        }
    }

    pub fn visible_users(&self) -> Vec<&GithubUser> {
        filter_candidates(&self.users, &self.query_user)
    }

    pub fn visible_repos(&self) -> Vec<&GithubRepo> {
        filter_candidates(&self.repos, &self.query_repo)
    }

    pub fn visible_releases(&self) -> Vec<&GithubRelease> {
        filter_candidates(&self.releases, &self.query_release)
    }

    /// (id, label) pairs for the dropdown of `level`
    pub fn visible_candidates(&self, level: Level) -> Vec<(u64, String)> {
        match level {
            Level::User => self.visible_users().iter().map(|u| (u.id, u.login.clone())).collect(),
            Level::Repo => self.visible_repos().iter().map(|r| (r.id, r.name.clone())).collect(),
            Level::Release => self
                .visible_releases()
                .iter()
                .map(|r| (r.id, r.display_name().to_string()))
                .collect(),
        }
    }

    /// The committed release whose assets are on display
    pub fn asset_view(&self) -> Option<&GithubRelease> {
        self.selected_release.as_ref()
    }

    /// State as restored after a restart: nothing is in flight any more
    pub fn resumed(mut self) -> Self {
        self.loading_user = false;
        self.loading_repo = false;
        self.loading_release = false;
        self
    }
}
