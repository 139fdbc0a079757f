//! PostgREST-style HTTP adapter.
//!
//! Tables: `groups`, `students`, `group_students` (rosters), and
//! `group_attendance`. Every request carries the project key both as
//! `apikey` and as a bearer token.

mod rows;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use rollcall_core::config::store::StoreConfig;
use rollcall_core::error::{AppError, ErrorKind};
use rollcall_core::result::AppResult;
use rollcall_core::traits::AttendanceStore;
use rollcall_core::types::{
    AdminId, AttendanceHistoryEntry, AttendanceRecord, NewParticipant, NewSession, PageRequest,
    PageResponse, Participant, ParticipantId, ParticipantKey, ParticipantPage, SessionId,
    SessionPatch, SessionStatus, SessionSummary, StoredAttendance, StoredSession,
};

use self::rows::{
    AttendanceBody, AttendanceRow, GroupPatchBody, GroupRow, GroupSummaryRow, HistoryRow,
    MemberRow, MembershipBody, MembershipRow, NewGroupBody, NewStudentBody, StudentKeyRow,
    StudentRow, parse_content_range_total,
};

const PREFER: &str = "Prefer";

/// HTTP client for the remote attendance store.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base: Url,
}

impl RestStore {
    /// Build a client from configuration.
    pub fn new(config: &StoreConfig) -> AppResult<Self> {
        if config.url.trim().is_empty() {
            return Err(AppError::configuration("store.url must be set for the REST store"));
        }
        let base = Url::parse(&format!("{}/rest/v1/", config.url.trim_end_matches('/')))
            .map_err(|e| AppError::with_source(ErrorKind::Configuration, "Invalid store.url", e))?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| AppError::with_source(ErrorKind::Configuration, "Invalid store.api_key", e))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| AppError::with_source(ErrorKind::Configuration, "Invalid store.api_key", e))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        Ok(Self { client, base })
    }

    /// URL of a table with query parameters appended.
    fn table_url(&self, table: &str, params: &[(&str, String)]) -> AppResult<Url> {
        let mut url = self
            .base
            .join(table)
            .map_err(|e| AppError::with_source(ErrorKind::Internal, "Invalid table URL", e))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in params {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send a request and turn non-success statuses into errors.
    async fn send(&self, request: RequestBuilder, what: &str) -> AppResult<Response> {
        let response = request.send().await.map_err(|e| {
            AppError::with_source(ErrorKind::ExternalService, format!("Failed to {what}"), e)
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, body = %body, "Store request rejected");
        Err(AppError::external(format!("Failed to {what}: HTTP {status}")))
    }

    async fn rows<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> AppResult<Vec<T>> {
        self.send(request, what)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Serialization,
                    format!("Failed to decode response to {what}"),
                    e,
                )
            })
    }
}

/// `in.("a","b")` filter with values quoted.
fn in_filter<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = values
        .into_iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl AttendanceStore for RestStore {
    async fn create_session(&self, new: NewSession) -> AppResult<StoredSession> {
        let url = self.table_url("groups", &[])?;
        let body = NewGroupBody {
            name: &new.name,
            admin_id: new.admin_id,
            status: SessionStatus::Inactive,
        };
        let request = self
            .request(Method::POST, url)
            .header(PREFER, "return=representation")
            .json(&body);
        let created: Vec<GroupRow> = self.rows(request, "create session").await?;
        created
            .into_iter()
            .next()
            .map(StoredSession::from)
            .ok_or_else(|| AppError::external("Store returned no row for the created session"))
    }

    async fn delete_session(&self, id: SessionId) -> AppResult<()> {
        let url = self.table_url("groups", &[("id", eq(id))])?;
        self.send(self.request(Method::DELETE, url), "delete session")
            .await?;
        Ok(())
    }

    async fn fetch_session(&self, id: SessionId) -> AppResult<Option<StoredSession>> {
        let url = self.table_url("groups", &[("id", eq(id)), ("select", "*".to_string())])?;
        let rows: Vec<GroupRow> = self
            .rows(self.request(Method::GET, url), "fetch session")
            .await?;
        Ok(rows.into_iter().next().map(StoredSession::from))
    }

    async fn update_session(&self, id: SessionId, patch: &SessionPatch) -> AppResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let url = self.table_url("groups", &[("id", eq(id))])?;
        let request = self
            .request(Method::PATCH, url)
            .json(&GroupPatchBody::from(patch));
        self.send(request, "update session").await?;
        Ok(())
    }

    async fn list_sessions_for_admin(&self, admin: AdminId) -> AppResult<Vec<SessionSummary>> {
        let url = self.table_url(
            "groups",
            &[
                ("admin_id", eq(admin)),
                ("order", "created_at.desc".to_string()),
                ("select", "id,name,status,created_at".to_string()),
            ],
        )?;
        let rows: Vec<GroupSummaryRow> = self
            .rows(self.request(Method::GET, url), "list sessions")
            .await?;
        Ok(rows.into_iter().map(SessionSummary::from).collect())
    }

    async fn resolve_participants(
        &self,
        ids: &[ParticipantId],
    ) -> AppResult<HashMap<ParticipantId, ParticipantKey>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let url = self.table_url(
            "students",
            &[
                ("student_id", in_filter(ids.iter().map(|id| id.as_str()))),
                ("select", "id,student_id".to_string()),
            ],
        )?;
        let rows: Vec<StudentKeyRow> = self
            .rows(self.request(Method::GET, url), "resolve participants")
            .await?;
        Ok(rows.into_iter().map(|row| (row.student_id, row.id)).collect())
    }

    async fn is_member(&self, session: SessionId, participant: ParticipantKey) -> AppResult<bool> {
        let url = self.table_url(
            "group_students",
            &[
                ("group_id", eq(session)),
                ("student_id", eq(participant)),
                ("select", "group_id".to_string()),
                ("limit", "1".to_string()),
            ],
        )?;
        let rows: Vec<MembershipRow> = self
            .rows(self.request(Method::GET, url), "check membership")
            .await?;
        Ok(!rows.is_empty())
    }

    async fn add_members(&self, session: SessionId, participants: &[ParticipantKey]) -> AppResult<()> {
        if participants.is_empty() {
            return Ok(());
        }
        let url = self.table_url(
            "group_students",
            &[("on_conflict", "group_id,student_id".to_string())],
        )?;
        let body: Vec<MembershipBody> = participants
            .iter()
            .map(|key| MembershipBody {
                group_id: session,
                student_id: *key,
            })
            .collect();
        let request = self
            .request(Method::POST, url)
            .header(PREFER, "resolution=ignore-duplicates")
            .json(&body);
        self.send(request, "add members").await?;
        Ok(())
    }

    async fn list_members(&self, session: SessionId) -> AppResult<Vec<Participant>> {
        let url = self.table_url(
            "group_students",
            &[
                ("group_id", eq(session)),
                ("select", "student_id,students(id,student_id,student_name)".to_string()),
            ],
        )?;
        let rows: Vec<MemberRow> = self
            .rows(self.request(Method::GET, url), "list members")
            .await?;
        let mut members: Vec<Participant> = rows
            .into_iter()
            .filter_map(|row| row.students.map(Participant::from))
            .collect();
        members.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(members)
    }

    async fn sessions_of_participant(&self, participant: ParticipantKey) -> AppResult<Vec<SessionId>> {
        let url = self.table_url(
            "group_students",
            &[
                ("student_id", eq(participant)),
                ("select", "group_id".to_string()),
            ],
        )?;
        let rows: Vec<MembershipRow> = self
            .rows(self.request(Method::GET, url), "list participant sessions")
            .await?;
        Ok(rows.into_iter().map(|row| row.group_id).collect())
    }

    async fn record_attendance(&self, record: &AttendanceRecord) -> AppResult<()> {
        let url = self.table_url(
            "group_attendance",
            &[("on_conflict", "group_id,student_id".to_string())],
        )?;
        let request = self
            .request(Method::POST, url)
            .header(PREFER, "resolution=merge-duplicates")
            .json(&AttendanceBody::from(record));
        self.send(request, "record attendance").await?;
        Ok(())
    }

    async fn list_attendance(&self, session: SessionId) -> AppResult<Vec<StoredAttendance>> {
        let url = self.table_url(
            "group_attendance",
            &[
                ("group_id", eq(session)),
                ("select", "*,students(student_id,student_name)".to_string()),
                ("order", "submitted_at.asc".to_string()),
            ],
        )?;
        let rows: Vec<AttendanceRow> = self
            .rows(self.request(Method::GET, url), "list attendance")
            .await?;
        Ok(rows.into_iter().filter_map(AttendanceRow::into_stored).collect())
    }

    async fn attendance_history(
        &self,
        participant: ParticipantKey,
    ) -> AppResult<Vec<AttendanceHistoryEntry>> {
        let url = self.table_url(
            "group_attendance",
            &[
                ("student_id", eq(participant)),
                ("select", "*,groups(name)".to_string()),
                ("order", "submitted_at.desc".to_string()),
            ],
        )?;
        let rows: Vec<HistoryRow> = self
            .rows(self.request(Method::GET, url), "load attendance history")
            .await?;
        Ok(rows.into_iter().map(AttendanceHistoryEntry::from).collect())
    }

    async fn create_participant(&self, new: NewParticipant) -> AppResult<Participant> {
        let existing = self.resolve_participants(std::slice::from_ref(&new.external_id)).await?;
        if existing.contains_key(&new.external_id) {
            return Err(AppError::conflict(format!(
                "Participant '{}' already exists",
                new.external_id
            )));
        }

        let url = self.table_url("students", &[])?;
        let body = NewStudentBody {
            student_id: new.external_id.as_str(),
            student_name: &new.name,
        };
        let request = self
            .request(Method::POST, url)
            .header(PREFER, "return=representation")
            .json(&body);
        let created: Vec<StudentRow> = self.rows(request, "create participant").await?;
        created
            .into_iter()
            .next()
            .map(Participant::from)
            .ok_or_else(|| AppError::external("Store returned no row for the created participant"))
    }

    async fn list_participants(&self, page: PageRequest) -> AppResult<ParticipantPage> {
        let url = self.table_url(
            "students",
            &[
                ("select", "id,student_id,student_name".to_string()),
                ("order", "student_id.asc".to_string()),
                ("limit", page.limit.to_string()),
                ("offset", page.offset().to_string()),
            ],
        )?;
        let request = self
            .request(Method::GET, url)
            .header(PREFER, "count=exact");
        let response = self.send(request, "list participants").await?;
        let total = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);
        let rows: Vec<StudentRow> = response.json().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Serialization,
                "Failed to decode participant listing",
                e,
            )
        })?;
        let items: Vec<Participant> = rows.into_iter().map(Participant::from).collect();
        let total = total.unwrap_or(page.offset() + items.len() as u64);
        Ok(PageResponse::new(items, page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RestStore {
        RestStore::new(&StoreConfig {
            url: "https://example.test/".to_string(),
            api_key: "anon-key".to_string(),
            ..Default::default()
        })
        .expect("store")
    }

    #[test]
    fn test_table_url_encodes_filters() {
        let url = store()
            .table_url("groups", &[("id", eq("abc")), ("select", "id,name".to_string())])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://example.test/rest/v1/groups?id=eq.abc&select=id%2Cname"
        );
    }

    #[test]
    fn test_in_filter_quotes_values() {
        assert_eq!(in_filter(["S1", "a\"b"]), r#"in.("S1","a\"b")"#);
    }

    #[test]
    fn test_invalid_key_is_configuration_error() {
        let err = RestStore::new(&StoreConfig {
            url: "https://example.test".to_string(),
            api_key: "bad\nkey".to_string(),
            ..Default::default()
        })
        .expect_err("newline in header");
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
