use chrono::Utc;
use tokio::sync::mpsc;
use ulid::Ulid;
use url::Url;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::fetch::{parse_subscription_info, Fetch};
use crate::models::{MetricsUpdate, NewSubscription, Subscription};

/// Advisory signals for whoever renders the engine's state. The reloaded list
/// and the operation's return value are what count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Created { name: String },
    Refreshed { name: String },
    RefreshedAll { count: usize },
    Error { message: String },
}

#[derive(Debug)]
enum RefreshOutcome {
    Updated,
    Vanished,
    Failed(AppError),
}

pub struct SyncEngine<F: Fetch> {
    repository: Repository,
    fetcher: F,
    default_name: String,
    subscriptions: Vec<Subscription>,
    last_error: Option<String>,
    events: Option<mpsc::UnboundedSender<SyncEvent>>,
}

impl<F: Fetch> SyncEngine<F> {
    pub async fn new(repository: Repository, fetcher: F, default_name: impl Into<String>) -> Result<Self> {
        let subscriptions = repository.list_subscriptions().await?;

        Ok(Self {
            repository,
            fetcher,
            default_name: default_name.into(),
            subscriptions,
            last_error: None,
            events: None,
        })
    }

    /// Starts delivering [`SyncEvent`]s. Replaces any earlier receiver.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Subscriptions as of the last reload, most recently refreshed first.
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn reload(&mut self) -> Result<()> {
        self.subscriptions = self.repository.list_subscriptions().await?;
        Ok(())
    }

    pub async fn config_content(&self, identifier: &str) -> Result<Option<String>> {
        Ok(self
            .repository
            .get_config(identifier)
            .await?
            .map(|config| config.config_content))
    }

    /// Fetches `url` and stores it as a new subscription together with its
    /// config. Nothing is written unless the fetch succeeds.
    pub async fn create(&mut self, name: &str, url: &str) -> Result<Subscription> {
        let result = self.try_create(name, url).await;
        let subscription = self.finish(result).await?;

        tracing::info!("Added subscription {} ({})", subscription.name, subscription.identifier);
        self.emit(SyncEvent::Created {
            name: subscription.name.clone(),
        });
        Ok(subscription)
    }

    async fn try_create(&self, name: &str, url: &str) -> Result<Subscription> {
        let url = validate_url(url)?;
        let fetched = self.fetcher.fetch_subscription(&url).await?;
        let now = Utc::now().timestamp();
        let info = parse_subscription_info(&fetched.headers, now);

        let name = match name.trim() {
            "" => self.default_name.clone(),
            trimmed => trimmed.to_string(),
        };

        let subscription = NewSubscription {
            identifier: new_identifier(),
            name,
            subscription_url: url,
            official_website: info.official_website,
            used_traffic: info.used_traffic,
            total_traffic: info.total_traffic.max(1),
            expire_time: info.expire_time,
            last_update_time: now,
        };
        self.repository
            .create_subscription(subscription, fetched.body)
            .await
    }

    /// Re-fetches one subscription.
    ///
    /// Returns `Ok(false)` when the endpoint fails; stored state is untouched
    /// and the failure is reported as [`SyncEvent::Error`]. Unknown identifiers,
    /// missing URLs and storage failures are returned as errors.
    pub async fn refresh_one(&mut self, identifier: &str) -> Result<bool> {
        let result = self.try_refresh_one(identifier).await;
        match self.finish(result).await {
            Ok(name) => {
                tracing::info!("Refreshed subscription {}", name);
                self.emit(SyncEvent::Refreshed { name });
                Ok(true)
            }
            Err(e) if e.is_network_class() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn try_refresh_one(&self, identifier: &str) -> Result<String> {
        let subscription = self
            .repository
            .get_subscription(identifier)
            .await?
            .ok_or_else(|| AppError::Validation(format!("unknown subscription {identifier}")))?;

        match self.refresh_subscription(&subscription).await? {
            RefreshOutcome::Updated => Ok(self.display_name(&subscription)),
            RefreshOutcome::Vanished => Err(AppError::Validation(format!(
                "subscription {identifier} was deleted during refresh"
            ))),
            RefreshOutcome::Failed(e) => Err(e),
        }
    }

    /// Refreshes every subscription, one request at a time.
    ///
    /// Endpoint failures are logged and skipped. A storage failure stops the
    /// batch and is returned. Returns the number of subscriptions updated.
    pub async fn refresh_all(&mut self) -> Result<usize> {
        let result = self.try_refresh_all().await;
        let count = self.finish(result).await?;

        if count > 0 {
            tracing::info!("Refreshed {} subscriptions", count);
            self.emit(SyncEvent::RefreshedAll { count });
        }
        Ok(count)
    }

    async fn try_refresh_all(&self) -> Result<usize> {
        let subscriptions = self.repository.list_subscriptions().await?;

        let mut outcomes = Vec::with_capacity(subscriptions.len());
        for subscription in &subscriptions {
            let outcome = match self.refresh_subscription(subscription).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_persistence() => {
                    tracing::error!(
                        "Aborting refresh at {}: {}",
                        subscription.identifier,
                        e
                    );
                    return Err(e);
                }
                Err(e) => RefreshOutcome::Failed(e),
            };
            if let RefreshOutcome::Failed(reason) = &outcome {
                tracing::warn!("Failed to refresh {}: {}", subscription.identifier, reason);
            }
            outcomes.push((subscription.identifier.as_str(), outcome));
        }

        tracing::debug!("Refresh outcomes: {:?}", outcomes);
        Ok(outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, RefreshOutcome::Updated))
            .count())
    }

    /// Deletes a subscription and its config. Returns `false` if `id` was unknown.
    pub async fn delete(&mut self, id: i64) -> Result<bool> {
        let result = self.repository.delete_subscription(id).await;
        let deleted = self.finish(result).await?;
        if deleted {
            tracing::info!("Deleted subscription {}", id);
        }
        Ok(deleted)
    }

    /// Fetch, parse and persist one subscription. Endpoint failures come back
    /// as `Failed`; only validation and storage problems are errors.
    async fn refresh_subscription(&self, subscription: &Subscription) -> Result<RefreshOutcome> {
        let url = subscription.refresh_url().ok_or_else(|| {
            AppError::Validation(format!(
                "subscription {} has no URL",
                subscription.identifier
            ))
        })?;

        let fetched = match self.fetcher.fetch_subscription(url).await {
            Ok(fetched) => fetched,
            Err(e) if e.is_network_class() => return Ok(RefreshOutcome::Failed(e)),
            Err(e) => return Err(e),
        };

        let now = Utc::now().timestamp();
        let update = MetricsUpdate::from(parse_subscription_info(&fetched.headers, now));
        let applied = self
            .repository
            .apply_refresh(&subscription.identifier, update, fetched.body, now)
            .await?;

        Ok(if applied {
            RefreshOutcome::Updated
        } else {
            RefreshOutcome::Vanished
        })
    }

    /// Reloads the list from the store whatever the outcome, and reports
    /// failures. A reload failure only wins when the operation itself succeeded.
    async fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        let reloaded = self.reload().await;
        match (result, reloaded) {
            (Ok(value), Ok(())) => {
                self.last_error = None;
                Ok(value)
            }
            (Ok(_), Err(e)) | (Err(e), Ok(())) => {
                self.fail(&e);
                Err(e)
            }
            (Err(e), Err(reload_error)) => {
                tracing::error!("Failed to reload subscriptions: {}", reload_error);
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn fail(&mut self, error: &AppError) {
        tracing::error!("Subscription sync failed: {}", error);
        let message = error.to_string();
        self.last_error = Some(message.clone());
        self.emit(SyncEvent::Error { message });
    }

    fn emit(&mut self, event: SyncEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                self.events = None;
            }
        }
    }

    fn display_name(&self, subscription: &Subscription) -> String {
        if subscription.name.trim().is_empty() {
            self.default_name.clone()
        } else {
            subscription.name.clone()
        }
    }
}

fn validate_url(url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(AppError::Validation("subscription URL is required".to_string()));
    }

    parse_http_url(url)?;
    Ok(url.to_string())
}

/// Accepts only absolute http and https URLs.
pub fn parse_http_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| AppError::Validation(format!("invalid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!(
            "unsupported URL scheme: {}",
            parsed.scheme()
        )));
    }
    Ok(parsed)
}

/// Time-ordered prefix with a random suffix, e.g. `01hx3k...`.
fn new_identifier() -> String {
    Ulid::new().to_string().to_lowercase()
}
