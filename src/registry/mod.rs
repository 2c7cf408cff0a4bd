//! Queue registry: names, URLs, lifecycle rules, attributes and permissions.
//!
//! The registry's own lock is only ever taken before a queue lock, never while
//! holding one.

pub mod queue;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use queue::{QueueHandle, QueueState};

use crate::config::EngineConfig;
use crate::core::clock::Clock;
use crate::error::ValidationError;
use crate::metrics;
use crate::types::attributes::{
    QueueAttributeName, QueueAttributeValue, QueueAttributes, RedrivePolicy,
};
use crate::types::policy::{PermissionAction, QueuePolicy};
use crate::types::validation::{validate_permission_label, validate_queue_name};
use crate::{Error, Result};

/// Most URLs a `list_queues` returns.
pub const MAX_LIST_QUEUES: usize = 1_000;

#[derive(Default)]
struct RegistryInner {
    queues: HashMap<String, Arc<QueueHandle>>,
    recently_deleted: HashMap<String, Instant>,
}

/// All live queues of the engine's account.
pub struct QueueRegistry {
    account_id: String,
    region: String,
    base_url: String,
    deletion_grace: Duration,
    clock: Clock,
    next_id: AtomicU64,
    inner: RwLock<RegistryInner>,
}

impl QueueRegistry {
    /// Empty registry.
    pub fn new(config: &EngineConfig, clock: Clock) -> Self {
        Self {
            account_id: config.account_id.clone(),
            region: config.region.clone(),
            base_url: config.base_url.clone(),
            deletion_grace: Duration::from_secs(config.queue_deletion_grace_secs),
            clock,
            next_id: AtomicU64::new(0),
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// URL of the queue called `name`.
    pub fn queue_url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.account_id, name)
    }

    /// ARN of the queue called `name`.
    pub fn queue_arn(&self, name: &str) -> String {
        format!("arn:aws:sqs:{}:{}:{}", self.region, self.account_id, name)
    }

    /// Create a queue, or return the existing one when its attributes match.
    pub async fn create_queue(
        &self,
        name: &str,
        raw_attributes: &HashMap<String, String>,
    ) -> Result<Arc<QueueHandle>> {
        validate_queue_name(name)?;
        let attributes = QueueAttributes::with_values(QueueAttributeValue::parse_map(raw_attributes)?);
        let now = self.clock.now();

        let mut inner = self.inner.write().await;

        if let Some(deleted_at) = inner.recently_deleted.get(name) {
            if now < *deleted_at + self.deletion_grace {
                return Err(Error::QueueDeletedRecently(name.to_string()));
            }
        }

        if let Some(existing) = inner.queues.get(name) {
            let state = existing.lock().await;
            if state.attributes == attributes {
                debug!(queue_name = %name, "Queue already exists with identical attributes");
                return Ok(existing.clone());
            }
            return Err(Error::QueueNameExists(name.to_string()));
        }

        if let Some(policy) = &attributes.redrive_policy {
            self.check_redrive_target(&inner, name, policy)?;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(QueueHandle::new(
            id,
            name.to_string(),
            self.queue_url(name),
            self.queue_arn(name),
            attributes,
            self.clock.wall(now),
        ));
        inner.recently_deleted.remove(name);
        inner.queues.insert(name.to_string(), handle.clone());
        metrics::get_metrics().queue_count.set(inner.queues.len() as i64);

        info!(queue_name = %name, queue_url = %handle.url(), "Queue created");
        Ok(handle)
    }

    /// Delete a queue. Unknown URLs succeed.
    pub async fn delete_queue(&self, url: &str) -> Result<()> {
        let now = self.clock.now();
        let handle = {
            let mut inner = self.inner.write().await;
            let Some(name) = self.name_from_url(url) else {
                return Ok(());
            };
            let Some(handle) = inner.queues.remove(name) else {
                return Ok(());
            };
            inner.recently_deleted.insert(name.to_string(), now);
            metrics::get_metrics().queue_count.set(inner.queues.len() as i64);
            handle
        };

        handle.mark_deleted();
        let purged = handle.lock().await.store.purge();
        metrics::get_metrics().forget_queue(handle.name());

        info!(queue_name = %handle.name(), purged, "Queue deleted");
        Ok(())
    }

    /// Resolve a live queue by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Arc<QueueHandle>> {
        let inner = self.inner.read().await;
        self.name_from_url(url)
            .and_then(|name| inner.queues.get(name))
            .filter(|handle| handle.url() == url)
            .cloned()
            .ok_or_else(|| Error::QueueDoesNotExist(url.to_string()))
    }

    /// Resolve a live queue by name.
    pub async fn get_by_name(&self, name: &str) -> Option<Arc<QueueHandle>> {
        self.inner.read().await.queues.get(name).cloned()
    }

    /// URL of a live queue.
    pub async fn get_queue_url(&self, name: &str) -> Result<String> {
        self.get_by_name(name)
            .await
            .map(|handle| handle.url().to_string())
            .ok_or_else(|| Error::QueueDoesNotExist(name.to_string()))
    }

    /// URLs of live queues whose name starts with `prefix`, sorted by name.
    pub async fn list_queues(&self, prefix: Option<&str>) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut names: Vec<&String> = inner
            .queues
            .keys()
            .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
            .collect();
        names.sort();
        names
            .into_iter()
            .take(MAX_LIST_QUEUES)
            .map(|name| self.queue_url(name))
            .collect()
    }

    /// URLs of queues whose redrive policy targets the queue at `url`.
    pub async fn list_dead_letter_source_queues(&self, url: &str) -> Result<Vec<String>> {
        let target = self.get_by_url(url).await?;
        let mut sources = Vec::new();
        for handle in self.all_queues().await {
            if Arc::ptr_eq(&handle, &target) {
                continue;
            }
            let state = handle.lock().await;
            let targets_dlq = state
                .attributes
                .redrive_policy
                .as_ref()
                .is_some_and(|p| p.dead_letter_target_arn == target.arn());
            if targets_dlq {
                sources.push(handle.url().to_string());
            }
        }
        sources.sort();
        Ok(sources)
    }

    /// Read attributes; `All` expands to every attribute.
    pub async fn get_queue_attributes(
        &self,
        url: &str,
        names: &[String],
    ) -> Result<BTreeMap<QueueAttributeName, String>> {
        let names = QueueAttributeName::expand(names)?;
        let handle = self.get_by_url(url).await?;

        let mut state = handle.lock().await;
        state.advance(self.clock.now());
        let stats = state.store.stats();

        let mut out = BTreeMap::new();
        for name in names {
            let value = match &name {
                QueueAttributeName::ApproximateNumberOfMessages => Some(stats.visible.to_string()),
                QueueAttributeName::ApproximateNumberOfMessagesNotVisible => {
                    Some(stats.in_flight.to_string())
                }
                QueueAttributeName::ApproximateNumberOfMessagesDelayed => {
                    Some(stats.delayed.to_string())
                }
                QueueAttributeName::CreatedTimestamp => {
                    Some(handle.created_at().timestamp().to_string())
                }
                QueueAttributeName::LastModifiedTimestamp => {
                    Some(state.last_modified.timestamp().to_string())
                }
                QueueAttributeName::QueueArn => Some(handle.arn().to_string()),
                other => state.attributes.render(other),
            };
            if let Some(value) = value {
                out.insert(name, value);
            }
        }
        Ok(out)
    }

    /// Write attributes. Read-only names are ignored.
    pub async fn set_queue_attributes(
        &self,
        url: &str,
        raw_attributes: &HashMap<String, String>,
    ) -> Result<()> {
        let values = QueueAttributeValue::parse_map(raw_attributes)?;
        let handle = self.get_by_url(url).await?;

        for value in &values {
            if let QueueAttributeValue::RedrivePolicy(Some(policy)) = value {
                let inner = self.inner.read().await;
                self.check_redrive_target(&inner, handle.name(), policy)?;
            }
        }

        let mut state = handle.lock().await;
        for value in values {
            state.attributes.apply(value);
        }
        state.last_modified = self.clock.wall_now();

        info!(queue_name = %handle.name(), "Queue attributes updated");
        Ok(())
    }

    /// Grant `actions` to `account_ids` under `label`; an existing label is overwritten.
    pub async fn add_permission(
        &self,
        url: &str,
        label: &str,
        account_ids: &[String],
        actions: &[PermissionAction],
    ) -> Result<()> {
        validate_permission_label(label)?;
        if account_ids.is_empty() || account_ids.iter().any(|id| id.is_empty()) {
            return Err(Error::invalid_parameter(
                "AWSAccountIds",
                "At least one non-empty account id is required",
            ));
        }
        if actions.is_empty() {
            return Err(Error::invalid_parameter(
                "Actions",
                "At least one action is required",
            ));
        }

        let handle = self.get_by_url(url).await?;
        let mut state = handle.lock().await;
        state
            .attributes
            .policy
            .get_or_insert_with(|| QueuePolicy::new(handle.arn()))
            .upsert(label, handle.arn(), account_ids, actions);
        state.last_modified = self.clock.wall_now();

        info!(queue_name = %handle.name(), label = %label, "Permission added");
        Ok(())
    }

    /// Remove the statement with `label`.
    pub async fn remove_permission(&self, url: &str, label: &str) -> Result<()> {
        let handle = self.get_by_url(url).await?;
        let mut state = handle.lock().await;

        let removed = state
            .attributes
            .policy
            .as_mut()
            .is_some_and(|policy| policy.remove(label));
        if !removed {
            warn!(queue_name = %handle.name(), label = %label, "Permission label not found");
            return Err(Error::invalid_parameter(
                "Label",
                format!("Can't find label {}", label),
            ));
        }

        if state
            .attributes
            .policy
            .as_ref()
            .is_some_and(|policy| policy.statements.is_empty())
        {
            state.attributes.policy = None;
        }
        state.last_modified = self.clock.wall_now();

        info!(queue_name = %handle.name(), label = %label, "Permission removed");
        Ok(())
    }

    /// Every live queue.
    pub async fn all_queues(&self) -> Vec<Arc<QueueHandle>> {
        self.inner.read().await.queues.values().cloned().collect()
    }

    /// Forget deletions older than the grace period; returns how many were dropped.
    pub async fn prune_deleted(&self) -> usize {
        let now = self.clock.now();
        let grace = self.deletion_grace;
        let mut inner = self.inner.write().await;
        let before = inner.recently_deleted.len();
        inner
            .recently_deleted
            .retain(|_, deleted_at| now < *deleted_at + grace);
        before - inner.recently_deleted.len()
    }

    fn name_from_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.base_url.as_str())?
            .strip_prefix('/')?
            .strip_prefix(self.account_id.as_str())?
            .strip_prefix('/')
    }

    fn check_redrive_target(
        &self,
        inner: &RegistryInner,
        source: &str,
        policy: &RedrivePolicy,
    ) -> Result<()> {
        let invalid = |reason: String| -> Error {
            ValidationError::InvalidAttributeValue {
                name: "RedrivePolicy".to_string(),
                reason,
            }
            .into()
        };

        let target = policy.target_queue_name();
        if target == source {
            return Err(invalid("A queue cannot be its own dead-letter queue".to_string()));
        }
        if policy.dead_letter_target_arn != self.queue_arn(target)
            || !inner.queues.contains_key(target)
        {
            return Err(invalid(format!(
                "Dead-letter target {} does not exist",
                policy.dead_letter_target_arn
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> QueueRegistry {
        QueueRegistry::new(&EngineConfig::default(), Clock::new())
    }

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_url_and_arn_format() {
        let registry = registry();
        let handle = registry.create_queue("orders", &HashMap::new()).await.unwrap();
        assert_eq!(handle.url(), "http://localhost:9324/000000000000/orders");
        assert_eq!(handle.arn(), "arn:aws:sqs:us-east-1:000000000000:orders");
        assert!(registry.get_by_url(handle.url()).await.is_ok());
        assert!(registry
            .get_by_url("http://localhost:9324/000000000000/Orders")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_idempotent_create_compares_resolved_attributes() {
        let registry = registry();
        let a = registry
            .create_queue("q", &attrs(&[("VisibilityTimeout", "30")]))
            .await
            .unwrap();
        let b = registry.create_queue("q", &HashMap::new()).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let err = registry
            .create_queue("q", &attrs(&[("VisibilityTimeout", "31")]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QueueNameExists(_)));
    }

    #[tokio::test]
    async fn test_list_queues_prefix_sorted() {
        let registry = registry();
        for name in ["beta", "alpha-2", "alpha-1"] {
            registry.create_queue(name, &HashMap::new()).await.unwrap();
        }
        let urls = registry.list_queues(Some("alpha")).await;
        assert_eq!(
            urls,
            vec![registry.queue_url("alpha-1"), registry.queue_url("alpha-2")]
        );
        assert_eq!(registry.list_queues(None).await.len(), 3);
    }

    #[tokio::test]
    async fn test_redrive_target_rules() {
        let registry = registry();
        let missing = format!(
            r#"{{"deadLetterTargetArn":"{}","maxReceiveCount":3}}"#,
            registry.queue_arn("dlq")
        );
        let err = registry
            .create_queue("work", &attrs(&[("RedrivePolicy", missing.as_str())]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidAttributeValue");

        let dlq = registry.create_queue("dlq", &HashMap::new()).await.unwrap();
        let work = registry
            .create_queue("work", &attrs(&[("RedrivePolicy", missing.as_str())]))
            .await
            .unwrap();

        let sources = registry.list_dead_letter_source_queues(dlq.url()).await.unwrap();
        assert_eq!(sources, vec![work.url().to_string()]);

        let own = format!(
            r#"{{"deadLetterTargetArn":"{}","maxReceiveCount":3}}"#,
            work.arn()
        );
        let err = registry
            .set_queue_attributes(work.url(), &attrs(&[("RedrivePolicy", own.as_str())]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidAttributeValue");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletion_grace_and_prune() {
        let registry = registry();
        let handle = registry.create_queue("gone", &HashMap::new()).await.unwrap();
        registry.delete_queue(handle.url()).await.unwrap();
        registry.delete_queue(handle.url()).await.unwrap();
        assert!(handle.is_deleted());

        let err = registry.create_queue("gone", &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::QueueDeletedRecently(_)));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(registry.prune_deleted().await, 1);
        assert!(registry.create_queue("gone", &HashMap::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_attributes_roundtrip_and_read_only_ignored() {
        let registry = registry();
        let handle = registry.create_queue("attrs", &HashMap::new()).await.unwrap();
        registry
            .set_queue_attributes(
                handle.url(),
                &attrs(&[("DelaySeconds", "5"), ("QueueArn", "ignored")]),
            )
            .await
            .unwrap();

        let all = registry
            .get_queue_attributes(handle.url(), &["All".to_string()])
            .await
            .unwrap();
        assert_eq!(all[&QueueAttributeName::DelaySeconds], "5");
        assert_eq!(all[&QueueAttributeName::QueueArn], handle.arn());
        assert_eq!(all[&QueueAttributeName::ApproximateNumberOfMessages], "0");
        assert!(!all.contains_key(&QueueAttributeName::RedrivePolicy));

        let err = registry
            .get_queue_attributes(handle.url(), &["Bogus".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidAttributeName");
    }

    #[tokio::test]
    async fn test_permissions() {
        let registry = registry();
        let handle = registry.create_queue("perm", &HashMap::new()).await.unwrap();
        registry
            .add_permission(
                handle.url(),
                "Consumers",
                &["111122223333".to_string()],
                &[PermissionAction::ReceiveMessage],
            )
            .await
            .unwrap();

        {
            let state = handle.lock().await;
            let policy = state.attributes.policy.as_ref().unwrap();
            assert!(policy.allows("111122223333", "ReceiveMessage"));
            assert!(!policy.allows("111122223333", "SendMessage"));
        }

        registry.remove_permission(handle.url(), "Consumers").await.unwrap();
        let err = registry
            .remove_permission(handle.url(), "Consumers")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidParameterValue");
        assert!(handle.lock().await.attributes.policy.is_none());
    }
}
