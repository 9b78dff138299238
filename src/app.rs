use tokio::sync::mpsc;

use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::fetch::HttpFetcher;
use crate::models::Subscription;
use crate::sync::{parse_http_url, SyncEngine, SyncEvent};
use crate::tui::AppAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Url,
    Name,
    ConfirmDelete,
}

/// Work queued by a key press and run on the next loop turn, after the
/// "syncing" state has been drawn.
#[derive(Debug, Clone)]
enum PendingSync {
    Create { name: String, url: String },
    Refresh(String),
    RefreshAll,
    Delete(i64),
}

pub struct App {
    pub engine: SyncEngine<HttpFetcher>,
    events: mpsc::UnboundedReceiver<SyncEvent>,

    // UI State
    pub selected_index: usize,
    pub show_help: bool,
    pub input_mode: InputMode,
    pub url_input: String,
    pub name_input: String,
    pub status: Option<String>,

    // Async state
    pub is_syncing: bool,
    pending: Option<PendingSync>,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let fetcher = HttpFetcher::from_config(config)?;
        let mut engine = SyncEngine::new(repository, fetcher, config.default_name.clone()).await?;
        let events = engine.subscribe();

        Ok(Self {
            engine,
            events,
            selected_index: 0,
            show_help: false,
            input_mode: InputMode::Normal,
            url_input: String::new(),
            name_input: String::new(),
            status: None,
            is_syncing: false,
            pending: None,
        })
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        self.engine.subscriptions()
    }

    pub fn selected_subscription(&self) -> Option<&Subscription> {
        self.subscriptions().get(self.selected_index)
    }

    pub async fn handle_action(&mut self, action: AppAction) -> Result<bool> {
        match action {
            AppAction::Quit => return Ok(true),

            AppAction::MoveUp => {
                if self.selected_index > 0 {
                    self.selected_index -= 1;
                }
            }

            AppAction::MoveDown => {
                let len = self.subscriptions().len();
                if len > 0 && self.selected_index < len - 1 {
                    self.selected_index += 1;
                }
            }

            AppAction::MoveToTop => {
                self.selected_index = 0;
            }

            AppAction::MoveToBottom => {
                self.selected_index = self.subscriptions().len().saturating_sub(1);
            }

            AppAction::AddSubscription => {
                self.url_input.clear();
                self.name_input.clear();
                self.input_mode = InputMode::Url;
            }

            AppAction::RefreshSelected => {
                if let Some(subscription) = self.selected_subscription() {
                    let identifier = subscription.identifier.clone();
                    self.queue(PendingSync::Refresh(identifier), "Updating subscription...");
                }
            }

            AppAction::RefreshAll => {
                if !self.subscriptions().is_empty() {
                    self.queue(PendingSync::RefreshAll, "Updating all subscriptions...");
                }
            }

            AppAction::DeleteSelected => {
                if self.selected_subscription().is_some() {
                    self.input_mode = InputMode::ConfirmDelete;
                }
            }

            AppAction::ConfirmDelete => {
                self.input_mode = InputMode::Normal;
                if let Some(subscription) = self.selected_subscription() {
                    let id = subscription.id;
                    self.queue(PendingSync::Delete(id), "Deleting subscription...");
                }
            }

            AppAction::CancelDelete => {
                self.input_mode = InputMode::Normal;
            }

            AppAction::OpenWebsite => {
                let website = self
                    .selected_subscription()
                    .and_then(|s| s.official_website.clone());
                match website {
                    Some(url) => self.open_website(&url),
                    None => self.status = Some("No website for this subscription".to_string()),
                }
            }

            AppAction::ShowHelp => {
                self.show_help = true;
            }

            AppAction::HideHelp => {
                self.show_help = false;
            }

            AppAction::InputChar(c) => {
                if let Some(input) = self.active_input() {
                    input.push(c);
                }
            }

            AppAction::InputBackspace => {
                if let Some(input) = self.active_input() {
                    input.pop();
                }
            }

            AppAction::InputConfirm => match self.input_mode {
                InputMode::Url => {
                    if self.url_input.trim().is_empty() {
                        self.status = Some("Please enter a subscription URL".to_string());
                    } else {
                        self.input_mode = InputMode::Name;
                    }
                }
                InputMode::Name => {
                    self.input_mode = InputMode::Normal;
                    let pending = PendingSync::Create {
                        name: std::mem::take(&mut self.name_input),
                        url: std::mem::take(&mut self.url_input),
                    };
                    self.queue(pending, "Adding subscription...");
                }
                InputMode::Normal | InputMode::ConfirmDelete => {}
            },

            AppAction::InputCancel => {
                self.input_mode = InputMode::Normal;
                self.url_input.clear();
                self.name_input.clear();
            }
        }

        Ok(false)
    }

    /// The address comes from the subscription endpoint, so only web URLs
    /// are handed to the OS.
    fn open_website(&mut self, url: &str) {
        if let Err(e) = parse_http_url(url) {
            tracing::warn!("Not opening website {}: {}", url, e);
            self.status = Some(format!("Error: refusing to open {url}"));
            return;
        }
        if let Err(e) = open::that(url) {
            tracing::warn!("Failed to open {}: {}", url, e);
            self.status = Some(format!("Could not open {url}"));
        }
    }

    /// The latest status message, falling back to the last engine failure.
    pub fn status_line(&self) -> Option<String> {
        self.status
            .clone()
            .or_else(|| self.engine.last_error().map(|e| format!("Error: {e}")))
    }

    fn active_input(&mut self) -> Option<&mut String> {
        match self.input_mode {
            InputMode::Url => Some(&mut self.url_input),
            InputMode::Name => Some(&mut self.name_input),
            InputMode::Normal | InputMode::ConfirmDelete => None,
        }
    }

    fn queue(&mut self, pending: PendingSync, status: &str) {
        if self.is_syncing {
            return;
        }
        self.is_syncing = true;
        self.status = Some(status.to_string());
        self.pending = Some(pending);
    }

    pub fn has_pending_sync(&self) -> bool {
        self.pending.is_some()
    }

    /// Runs the queued operation. Failures reach the status line as
    /// [`SyncEvent::Error`], so they are not returned here.
    pub async fn run_pending_sync(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let outcome = match pending {
            PendingSync::Create { name, url } => {
                self.engine.create(&name, &url).await.map(|created| {
                    self.select_identifier(&created.identifier);
                })
            }
            PendingSync::Refresh(identifier) => {
                self.engine.refresh_one(&identifier).await.map(|_| {
                    self.select_identifier(&identifier);
                })
            }
            PendingSync::RefreshAll => self.engine.refresh_all().await.map(|count| {
                if count == 0 {
                    self.status = Some("No subscription could be updated".to_string());
                }
            }),
            PendingSync::Delete(id) => self.engine.delete(id).await.map(|_| ()),
        };

        if let Err(e) = outcome {
            tracing::debug!("Sync operation failed: {}", e);
        }

        self.clamp_selection();
        self.is_syncing = false;
        self.poll_events();
    }

    /// Turns engine signals into the status line (non-blocking).
    pub fn poll_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.status = Some(match event {
                SyncEvent::Created { name } => format!("Added {name}"),
                SyncEvent::Refreshed { name } => format!("Updated {name}"),
                SyncEvent::RefreshedAll { count } => format!("Updated {count} subscriptions"),
                SyncEvent::Error { message } => format!("Error: {message}"),
            });
        }
    }

    fn select_identifier(&mut self, identifier: &str) {
        if let Some(index) = self
            .subscriptions()
            .iter()
            .position(|s| s.identifier == identifier)
        {
            self.selected_index = index;
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.subscriptions().len();
        if len == 0 {
            self.selected_index = 0;
        } else if self.selected_index >= len {
            self.selected_index = len - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSubscription;

    async fn app(dir: &tempfile::TempDir) -> App {
        let config = Config {
            db_path: dir.path().join("subs.db").to_string_lossy().to_string(),
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_ms: 500,
            default_name: "Unnamed subscription".to_string(),
        };
        App::new(&config).await.unwrap()
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_action(AppAction::InputChar(c)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn add_flow_collects_url_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir).await;

        app.handle_action(AppAction::AddSubscription).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Url);

        app.handle_action(AppAction::InputConfirm).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Url);
        assert!(app.status.is_some());

        type_text(&mut app, "not a url").await;
        app.handle_action(AppAction::InputConfirm).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Name);

        type_text(&mut app, "Home").await;
        app.handle_action(AppAction::InputConfirm).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.is_syncing);
        assert!(app.has_pending_sync());

        app.run_pending_sync().await;
        assert!(!app.is_syncing);
        assert!(!app.has_pending_sync());
        assert!(app.status.as_deref().unwrap().starts_with("Error"));
        assert!(app.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn status_line_falls_back_to_last_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir).await;
        assert!(app.status_line().is_none());

        app.handle_action(AppAction::AddSubscription).await.unwrap();
        type_text(&mut app, "ftp://sub.example").await;
        app.handle_action(AppAction::InputConfirm).await.unwrap();
        app.handle_action(AppAction::InputConfirm).await.unwrap();
        app.run_pending_sync().await;

        app.status = None;
        let line = app.status_line().unwrap();
        assert!(line.starts_with("Error"));
        assert!(line.contains("ftp"));
    }

    #[tokio::test]
    async fn website_without_web_scheme_is_not_opened() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("subs.db");
        {
            let repository = Repository::new(db_path.to_str().unwrap()).await.unwrap();
            repository
                .create_subscription(
                    NewSubscription {
                        identifier: "a".to_string(),
                        name: "Home".to_string(),
                        subscription_url: "https://sub.example/a".to_string(),
                        official_website: Some("file:///etc/passwd".to_string()),
                        used_traffic: 0,
                        total_traffic: 10,
                        expire_time: 1_999_999_999,
                        last_update_time: 1000,
                    },
                    "payload".to_string(),
                )
                .await
                .unwrap();
        }
        let mut app = app(&dir).await;
        assert_eq!(app.subscriptions().len(), 1);

        app.handle_action(AppAction::OpenWebsite).await.unwrap();
        let status = app.status.as_deref().unwrap();
        assert!(status.starts_with("Error"));
        assert!(status.contains("file"));
    }

    #[tokio::test]
    async fn delete_without_selection_does_not_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir).await;

        app.handle_action(AppAction::DeleteSelected).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(!app.has_pending_sync());
    }

    #[tokio::test]
    async fn cancelling_input_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir).await;

        app.handle_action(AppAction::AddSubscription).await.unwrap();
        type_text(&mut app, "https://sub.example").await;
        app.handle_action(AppAction::InputBackspace).await.unwrap();
        assert_eq!(app.url_input, "https://sub.exampl");

        app.handle_action(AppAction::InputCancel).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.url_input.is_empty());
    }
}
