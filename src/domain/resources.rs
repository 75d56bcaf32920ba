//! Model Context Protocol read-only resources
//!
//! Exposes fixed views over both stores as JSON documents.

use rust_mcp_sdk::schema::{
    ReadResourceContent, ReadResourceRequestParams, ReadResourceResult, Resource,
    TextResourceContents,
};
use serde_json::{json, Value};

use crate::db::etfs::SortKey;
use crate::domain::utils::{to_pretty_json, DEFAULT_ETF_LIMIT};
use crate::mcp::rpc::{app_error_to_json_rpc, json_rpc_error, json_rpc_result, INTERNAL_ERROR};
use crate::{errors::AppError, AppState};

pub const SCHEMA_RESOURCE_URI: &str = "database://schema";
pub const USERS_RESOURCE_URI: &str = "database://users";
pub const ETF_SAMPLE_RESOURCE_URI: &str = "etf://sample";
pub const ETF_SUMMARY_RESOURCE_URI: &str = "etf://summary";

const RESOURCES: [(&str, &str, &str); 4] = [
    (
        SCHEMA_RESOURCE_URI,
        "Database Schema",
        "Tables and column metadata of the users database",
    ),
    (USERS_RESOURCE_URI, "All Users", "Every user ordered by ID"),
    (
        ETF_SAMPLE_RESOURCE_URI,
        "ETF Sample",
        "The largest ETFs by assets under management",
    ),
    (
        ETF_SUMMARY_RESOURCE_URI,
        "ETF Risk Summary",
        "ETF statistics grouped by risk rating",
    ),
];

pub fn build_resources_list() -> Vec<Resource> {
    RESOURCES
        .iter()
        .map(|(uri, name, description)| Resource {
            annotations: None,
            description: Some(description.to_string()),
            icons: vec![],
            meta: None,
            mime_type: Some("application/json".to_string()),
            name: name.to_string(),
            size: None,
            title: None,
            uri: uri.to_string(),
        })
        .collect()
}

pub async fn read_resource(state: &AppState, uri: &str) -> Result<String, AppError> {
    match uri {
        SCHEMA_RESOURCE_URI => {
            let mut tables = Vec::new();
            for table in state.users.list_tables().await? {
                let columns = state.users.table_columns(&table).await?;
                tables.push(json!({ "table": table, "columns": columns }));
            }
            to_pretty_json(&tables)
        }
        USERS_RESOURCE_URI => to_pretty_json(&state.users.list_users().await?),
        ETF_SAMPLE_RESOURCE_URI => {
            to_pretty_json(&state.etfs.top(SortKey::Aum, DEFAULT_ETF_LIMIT).await?)
        }
        ETF_SUMMARY_RESOURCE_URI => to_pretty_json(&state.etfs.summary().await?),
        _ => Err(AppError::UnknownResource(uri.to_string())),
    }
}

pub async fn handle_resources_read(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INTERNAL_ERROR, "Invalid params");
    };

    let resource_read: ReadResourceRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INTERNAL_ERROR, "Invalid params"),
    };

    match read_resource(state, &resource_read.uri).await {
        Ok(text) => {
            let result = serde_json::to_value(ReadResourceResult {
                contents: vec![ReadResourceContent::from(TextResourceContents {
                    meta: None,
                    mime_type: Some("application/json".to_string()),
                    text,
                    uri: resource_read.uri,
                })],
                meta: None,
            })
            .expect("read resource result serialization");

            json_rpc_result(id, result)
        }
        Err(err) => app_error_to_json_rpc(id, err),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::db::{fixtures::etf_store, users::UserStore};

    async fn state(dir: &tempfile::TempDir) -> AppState {
        let users = UserStore::in_memory().await.expect("users store");
        users.add_user("Ann").await.expect("add user");
        let etfs = etf_store(&dir.path().join("etfs.db")).await;
        AppState::new(None, users, etfs)
    }

    #[test]
    fn lists_fixed_uris() {
        let uris = build_resources_list()
            .into_iter()
            .map(|resource| resource.uri)
            .collect::<Vec<_>>();
        assert_eq!(
            uris,
            vec![
                SCHEMA_RESOURCE_URI,
                USERS_RESOURCE_URI,
                ETF_SAMPLE_RESOURCE_URI,
                ETF_SUMMARY_RESOURCE_URI
            ]
        );
    }

    #[tokio::test]
    async fn reads_each_resource() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let schema: Value =
            serde_json::from_str(&read_resource(&state, SCHEMA_RESOURCE_URI).await.expect("schema"))
                .expect("json");
        assert_eq!(schema[0]["table"], "users");
        assert_eq!(schema[0]["columns"][1]["name"], "name");

        let users: Value =
            serde_json::from_str(&read_resource(&state, USERS_RESOURCE_URI).await.expect("users"))
                .expect("json");
        assert_eq!(users[0]["name"], "Ann");

        let sample: Value = serde_json::from_str(
            &read_resource(&state, ETF_SAMPLE_RESOURCE_URI)
                .await
                .expect("sample"),
        )
        .expect("json");
        assert_eq!(sample[0]["symbol"], "SPY");

        let summary: Value = serde_json::from_str(
            &read_resource(&state, ETF_SUMMARY_RESOURCE_URI)
                .await
                .expect("summary"),
        )
        .expect("json");
        assert_eq!(summary.as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn unknown_uri_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let err = read_resource(&state, "etf://everything")
            .await
            .expect_err("unknown uri");
        assert_eq!(err.to_string(), "Unknown resource: etf://everything");
    }
}
