//! Database operations through the PostgREST API

mod filter;
mod query;

use reqwest::{Client, Method};
use serde::Serialize;

use crate::error::Error;
use crate::fetch::{Fetch, FetchBuilder};

pub use filter::*;
pub use query::*;

/// Client for operations on one table
#[derive(Debug, Clone)]
pub struct TableClient {
    /// The base URL for the Supabase project
    url: String,

    /// The anonymous API key for the Supabase project
    key: String,

    /// The table name
    table: String,

    /// HTTP client
    client: Client,

    /// Access token of the signed-in owner; the anon key is sent when absent
    token: Option<String>,

    /// Schema exposed through `Accept-Profile` / `Content-Profile`
    schema: Option<String>,

    /// `X-Client-Info` header value
    client_info: String,
}

impl TableClient {
    /// Create a new TableClient
    pub(crate) fn new(
        url: &str,
        key: &str,
        table: &str,
        client: Client,
        client_info: &str,
    ) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            table: table.to_string(),
            client,
            token: None,
            schema: None,
            client_info: client_info.to_string(),
        }
    }

    /// Authorize requests with a user access token
    pub fn with_auth(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Target a schema other than `public`
    pub fn with_schema(mut self, schema: &str) -> Self {
        if schema != "public" {
            self.schema = Some(schema.to_string());
        }
        self
    }

    /// The table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Get the base URL for REST API requests
    fn get_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }

    /// Start a request carrying the API key, authorization and profile headers
    pub(crate) fn request(&self, method: Method) -> Result<FetchBuilder<'_>, Error> {
        let url = self.get_url();
        let fetch = match method {
            Method::POST => Fetch::post(&self.client, &url),
            Method::PATCH => Fetch::patch(&self.client, &url),
            Method::DELETE => Fetch::delete(&self.client, &url),
            _ => Fetch::get(&self.client, &url),
        };
        let profile_header = if method == Method::GET {
            "Accept-Profile"
        } else {
            "Content-Profile"
        };

        let mut fetch = fetch
            .header("apikey", &self.key)?
            .header("X-Client-Info", &self.client_info)?
            .bearer_auth(self.token.as_deref().unwrap_or(&self.key))?;
        if let Some(schema) = &self.schema {
            fetch = fetch.header(profile_header, schema)?;
        }
        Ok(fetch)
    }

    /// Select specific columns from the table
    pub fn select(&self, columns: &str) -> SelectBuilder<'_> {
        SelectBuilder::new(self, columns)
    }

    /// Insert data into the table
    pub fn insert<T: Serialize>(&self, values: T) -> InsertBuilder<'_, T> {
        InsertBuilder::new(self, values)
    }

    /// Update data in the table
    pub fn update<T: Serialize>(&self, values: T) -> UpdateBuilder<'_, T> {
        UpdateBuilder::new(self, values)
    }

    /// Upsert data in the table (insert or merge on a unique constraint)
    pub fn upsert<T: Serialize>(&self, values: T) -> UpsertBuilder<'_, T> {
        UpsertBuilder::new(self, values)
    }

    /// Delete data from the table
    pub fn delete(&self) -> DeleteBuilder<'_> {
        DeleteBuilder::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn table(server: &MockServer, name: &str) -> TableClient {
        TableClient::new(&server.uri(), "fake-key", name, Client::new(), "habit-sync/test")
    }

    #[tokio::test]
    async fn test_select() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/habits"))
            .and(query_param("select", "*"))
            .and(query_param("user_id", "eq.owner-1"))
            .and(query_param("order", "created_at.asc"))
            .and(header("apikey", "fake-key"))
            .and(header("Authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "name": "Read" },
                { "id": 2, "name": "Run" }
            ])))
            .mount(&mock_server)
            .await;

        let client = table(&mock_server, "habits").with_auth("user-token");
        let mut query = client.select("*");
        query.eq("user_id", "owner-1").order("created_at", true);
        let rows = query.execute::<Value>().await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["name"], "Run");
    }

    #[tokio::test]
    async fn test_anon_key_used_without_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/notes"))
            .and(header("Authorization", "Bearer fake-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let client = table(&mock_server, "notes");
        let rows = client.select("*").execute::<Value>().await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_insert() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/tasks"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(json!({ "title": "Buy milk" })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!([{ "id": 7, "title": "Buy milk" }])),
            )
            .mount(&mock_server)
            .await;

        let client = table(&mock_server, "tasks");
        let rows = client
            .insert(json!({ "title": "Buy milk" }))
            .execute::<Value>()
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], 7);
    }

    #[tokio::test]
    async fn test_upsert_sets_conflict_target() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/sleep_entries"))
            .and(query_param("on_conflict", "user_id,date"))
            .and(header_exists("Prefer"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "hours": 7.5 }])))
            .mount(&mock_server)
            .await;

        let client = table(&mock_server, "sleep_entries");
        let mut upsert = client.upsert(json!({ "hours": 7.5 }));
        upsert.on_conflict("user_id,date");
        let rows = upsert.execute::<Value>().await.unwrap();
        assert_eq!(rows[0]["hours"], 7.5);
    }

    #[tokio::test]
    async fn test_delete_requires_filter() {
        let mock_server = MockServer::start().await;
        let client = table(&mock_server, "habits");

        let result = client.delete().execute().await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_schema_profile_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/notes"))
            .and(header("Content-Profile", "tracker"))
            .and(query_param("id", "eq.3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 3 }])))
            .mount(&mock_server)
            .await;

        let client = table(&mock_server, "notes").with_schema("tracker");
        let mut update = client.update(json!({ "content": "edited" }));
        update.eq("id", 3);
        let rows = update.execute::<Value>().await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_error_handling() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/habit_completions"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint",
                "details": null,
                "hint": null
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/habit_completions"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&mock_server)
            .await;

        let client = table(&mock_server, "habit_completions");

        let err = client
            .insert(json!({ "date": "2024-05-01" }))
            .execute::<Value>()
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("23505"));
        assert_eq!(err.status(), Some(reqwest::StatusCode::CONFLICT));

        let err = client.select("*").execute::<Value>().await.unwrap_err();
        match err {
            Error::Api { status, details } => {
                assert_eq!(status, reqwest::StatusCode::BAD_GATEWAY);
                assert_eq!(details.message.as_deref(), Some("Bad Gateway"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
