//! Hosted backend: a PostgREST API (as exposed by Supabase) in front of the
//! `users` and `checkins` tables from `sql/schema.sql`.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::model::{Checkin, Mood, User, UserUpdate};
use crate::CheckinStore;

const BACKEND: &str = "hosted";

#[derive(Debug, Clone)]
pub struct HostedStore {
    client: Client,
    rest_url: String,
    key: String,
}

impl HostedStore {
    pub fn new(base_url: &str, key: &str, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(base_url.trim())
            .with_context(|| format!("invalid hosted storage url: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("hosted storage url must be http(s): {base_url}");
        }
        if key.trim().is_empty() {
            bail!("hosted storage key is empty");
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            rest_url: rest_url(base_url),
            key: key.trim().to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.rest_url))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<Vec<T>> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }
        response
            .json::<Vec<T>>()
            .await
            .map_err(|err| StoreError::unavailable(BACKEND, format!("malformed response: {err}")))
    }

    async fn send_minimal(&self, request: RequestBuilder) -> StoreResult<()> {
        let response = request
            .header("Prefer", "return=minimal")
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }
        Ok(())
    }

    async fn find_user(&self, external_id: &str) -> StoreResult<Option<User>> {
        let request = self
            .request(Method::GET, "users")
            .query(&[("select", "*".to_string()), ("external_id", eq(external_id))]);
        Ok(self.fetch_rows::<User>(request).await?.into_iter().next().map(tagged))
    }
}

#[async_trait]
impl CheckinStore for HostedStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn resolve_user(&self, external_id: &str, display_name: &str) -> StoreResult<User> {
        if let Some(user) = self.find_user(external_id).await? {
            return Ok(user);
        }

        // Upsert on the unique external_id so concurrent first contacts
        // converge on one row.
        let request = self
            .request(Method::POST, "users")
            .query(&[("on_conflict", "external_id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&json!([{ "external_id": external_id, "display_name": display_name }]));
        let user = self.fetch_rows::<User>(request).await?.into_iter().next().map(tagged);
        debug!(external_id, "hosted store: user upserted");
        user.ok_or_else(|| StoreError::rejected(BACKEND, 200, "user upsert returned no row"))
    }

    async fn get_user_timezone(&self, external_id: &str) -> StoreResult<Option<String>> {
        Ok(self
            .find_user(external_id)
            .await?
            .and_then(|user| user.timezone))
    }

    async fn update_user(&self, external_id: &str, update: &UserUpdate) -> StoreResult<()> {
        let body = update_body(update);
        if body.is_empty() {
            return Ok(());
        }
        let request = self
            .request(Method::PATCH, "users")
            .query(&[("external_id", eq(external_id))])
            .json(&body);
        self.send_minimal(request).await
    }

    async fn find_checkin(&self, user: &User, date: NaiveDate) -> StoreResult<Option<Checkin>> {
        let request = self.request(Method::GET, "checkins").query(&[
            ("select", "*".to_string()),
            ("user_id", eq(&user.id)),
            ("date", eq(&date.to_string())),
        ]);
        Ok(self.fetch_rows::<Checkin>(request).await?.into_iter().next())
    }

    async fn create_checkin(
        &self,
        user: &User,
        date: NaiveDate,
        message: Option<&str>,
        mood: Option<Mood>,
    ) -> StoreResult<Checkin> {
        let request = self
            .request(Method::POST, "checkins")
            .header("Prefer", "return=representation")
            .json(&json!([{
                "user_id": user.id,
                "date": date,
                "message": message,
                "mood": mood,
            }]));
        match self.fetch_rows::<Checkin>(request).await {
            Ok(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| StoreError::rejected(BACKEND, 201, "insert returned no row")),
            Err(StoreError::Rejected { status: 409, .. }) => Err(StoreError::Duplicate { date }),
            Err(err) => Err(err),
        }
    }

    async fn overwrite_checkin(
        &self,
        user: &User,
        date: NaiveDate,
        message: Option<&str>,
        mood: Option<Mood>,
    ) -> StoreResult<bool> {
        let request = self
            .request(Method::PATCH, "checkins")
            .query(&[("user_id", eq(&user.id)), ("date", eq(&date.to_string()))])
            .header("Prefer", "return=representation")
            .json(&json!({
                "message": message,
                "mood": mood,
                "updated_at": Utc::now(),
            }));
        let rows = self.fetch_rows::<Checkin>(request).await?;
        Ok(!rows.is_empty())
    }

    async fn list_checkins(&self, user: &User) -> StoreResult<Vec<Checkin>> {
        let request = self.request(Method::GET, "checkins").query(&[
            ("select", "*".to_string()),
            ("user_id", eq(&user.id)),
            ("order", "date.desc".to_string()),
        ]);
        self.fetch_rows(request).await
    }

    async fn users_with_reminders(&self) -> StoreResult<Vec<User>> {
        let request = self
            .request(Method::GET, "users")
            .query(&[("select", "*"), ("reminder_time", "not.is.null")]);
        self.fetch_rows(request).await
    }
}

fn tagged(mut user: User) -> User {
    user.backend = Some(BACKEND);
    user
}

/// Only the columns `update` sets; a cleared reminder becomes `null`.
fn update_body(update: &UserUpdate) -> Map<String, Value> {
    let mut body = Map::new();
    if let Some(timezone) = &update.timezone {
        body.insert("timezone".to_string(), json!(timezone));
    }
    if let Some(reminder) = update.reminder_time {
        let reminder = reminder.map(|time| time.format("%H:%M:%S").to_string());
        body.insert("reminder_time".to_string(), json!(reminder));
    }
    body
}

/// `{base}/rest/v1/`, tolerant of a trailing slash on `base`.
fn rest_url(base_url: &str) -> String {
    format!("{}/rest/v1/", base_url.trim().trim_end_matches('/'))
}

/// PostgREST equality filter value.
fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn transport_error(err: reqwest::Error) -> StoreError {
    StoreError::unavailable(BACKEND, err.to_string())
}

/// Server-side failures, throttling and timeouts count as unavailability;
/// other non-success statuses are rejections.
fn classify_status(status: StatusCode, body: String) -> StoreError {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        StoreError::unavailable(BACKEND, format!("{status}: {body}"))
    } else {
        StoreError::rejected(BACKEND, status.as_u16(), body)
    }
}
