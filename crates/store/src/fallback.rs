use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::model::{Checkin, Mood, User, UserUpdate};
use crate::CheckinStore;

/// Retry-with-fallback wrapper.  Every operation goes to `primary`; when it
/// fails with [`crate::StoreError::BackendUnavailable`] the same operation is
/// retried once against `fallback`.  Other errors pass through unchanged.
pub struct FallbackStore {
    primary: Arc<dyn CheckinStore>,
    fallback: Arc<dyn CheckinStore>,
}

impl FallbackStore {
    pub fn new(primary: Arc<dyn CheckinStore>, fallback: Arc<dyn CheckinStore>) -> Self {
        Self { primary, fallback }
    }

    async fn run<'a, T, F>(&'a self, operation: &'static str, call: F) -> StoreResult<T>
    where
        F: Fn(&'a dyn CheckinStore) -> BoxFuture<'a, StoreResult<T>>,
    {
        match call(self.primary.as_ref()).await {
            Err(err) if err.is_unavailable() => {
                warn!(
                    operation,
                    primary = self.primary.backend_name(),
                    fallback = self.fallback.backend_name(),
                    error = %err,
                    "storage: primary unavailable, retrying on fallback"
                );
                call(self.fallback.as_ref()).await
            }
            other => other,
        }
    }
}

/// `user` as known to `store`.  A user resolved by the other backend carries
/// an id `store` cannot key on, so it is resolved again there.
async fn keyed_for(store: &dyn CheckinStore, user: &User) -> StoreResult<User> {
    match user.backend {
        Some(name) if name != store.backend_name() => {
            debug!(
                user = %user.external_id,
                from = name,
                to = store.backend_name(),
                "storage: re-resolving user on other backend"
            );
            store
                .resolve_user(&user.external_id, &user.display_name)
                .await
        }
        _ => Ok(user.clone()),
    }
}

#[async_trait]
impl CheckinStore for FallbackStore {
    fn backend_name(&self) -> &'static str {
        "fallback"
    }

    async fn resolve_user(&self, external_id: &str, display_name: &str) -> StoreResult<User> {
        self.run("resolve_user", |s| s.resolve_user(external_id, display_name))
            .await
    }

    async fn get_user_timezone(&self, external_id: &str) -> StoreResult<Option<String>> {
        self.run("get_user_timezone", |s| s.get_user_timezone(external_id))
            .await
    }

    async fn update_user(&self, external_id: &str, update: &UserUpdate) -> StoreResult<()> {
        self.run("update_user", |s| s.update_user(external_id, update))
            .await
    }

    async fn find_checkin(&self, user: &User, date: NaiveDate) -> StoreResult<Option<Checkin>> {
        self.run("find_checkin", |s| {
            async move { s.find_checkin(&keyed_for(s, user).await?, date).await }.boxed()
        })
        .await
    }

    async fn create_checkin(
        &self,
        user: &User,
        date: NaiveDate,
        message: Option<&str>,
        mood: Option<Mood>,
    ) -> StoreResult<Checkin> {
        self.run("create_checkin", |s| {
            async move {
                let user = keyed_for(s, user).await?;
                s.create_checkin(&user, date, message, mood).await
            }
            .boxed()
        })
        .await
    }

    async fn overwrite_checkin(
        &self,
        user: &User,
        date: NaiveDate,
        message: Option<&str>,
        mood: Option<Mood>,
    ) -> StoreResult<bool> {
        self.run("overwrite_checkin", |s| {
            async move {
                let user = keyed_for(s, user).await?;
                s.overwrite_checkin(&user, date, message, mood).await
            }
            .boxed()
        })
        .await
    }

    async fn list_checkins(&self, user: &User) -> StoreResult<Vec<Checkin>> {
        self.run("list_checkins", |s| {
            async move { s.list_checkins(&keyed_for(s, user).await?).await }.boxed()
        })
        .await
    }

    async fn users_with_reminders(&self) -> StoreResult<Vec<User>> {
        self.run("users_with_reminders", |s| s.users_with_reminders())
            .await
    }
}
