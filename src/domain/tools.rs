//! Tools exposed via Model Context Protocol
//!
//! The catalogue is a flat table of descriptors keyed by name. A call looks
//! the name up, validates the raw arguments against the descriptor's fields,
//! runs exactly one store operation and wraps the outcome in the result
//! envelope. Every failure, including an unknown name, comes back as a
//! failed tool result rather than a protocol error.

use rust_mcp_sdk::schema::{CallToolRequestParams, CallToolResult, ContentBlock, TextContent, Tool};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::db::etfs::{RiskRating, SortKey};
use crate::domain::utils::{
    compose_advice, to_pretty_json, ADVICE_PICK_COUNT, DEFAULT_ETF_LIMIT,
};
use crate::domain::validation::{
    ensure_select, input_schema, parse_arguments, DefaultValue, FieldKind, FieldSpec,
};
use crate::mcp::rpc::{json_rpc_error, json_rpc_result, INTERNAL_ERROR};
use crate::{errors::AppError, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ExecuteSql,
    GetTableInfo,
    AddUser,
    GetAllUsers,
    DeleteUser,
    UpdateUser,
    InitializeDatabase,
    GetEtfsByRisk,
    SearchEtfs,
    GetTopEtfs,
    GetEtfAdvice,
    GetEtfSummary,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [FieldSpec],
    pub kind: ToolKind,
}

const NON_EMPTY: FieldKind = FieldKind::Text { min_length: 1 };
const RISK: FieldKind = FieldKind::OneOf(&RiskRating::NAMES);

pub const TOOLS: &[ToolDescriptor] = &[
    ToolDescriptor {
        name: "execute_sql",
        description: "Run a read-only SELECT statement against the users database and return all rows",
        fields: &[FieldSpec::required(
            "query",
            "SQL statement; must start with SELECT",
            NON_EMPTY,
        )],
        kind: ToolKind::ExecuteSql,
    },
    ToolDescriptor {
        name: "get_table_info",
        description: "Describe the columns of a table, or list every table when no name is given",
        fields: &[FieldSpec::optional(
            "table_name",
            "Table to describe",
            FieldKind::Text { min_length: 0 },
        )],
        kind: ToolKind::GetTableInfo,
    },
    ToolDescriptor {
        name: "add_user",
        description: "Add a user and return the assigned ID",
        fields: &[FieldSpec::required("name", "User name", NON_EMPTY)],
        kind: ToolKind::AddUser,
    },
    ToolDescriptor {
        name: "get_all_users",
        description: "List every user ordered by ID",
        fields: &[],
        kind: ToolKind::GetAllUsers,
    },
    ToolDescriptor {
        name: "delete_user",
        description: "Delete a user by ID",
        fields: &[FieldSpec::required(
            "id",
            "User ID",
            FieldKind::PositiveInteger,
        )],
        kind: ToolKind::DeleteUser,
    },
    ToolDescriptor {
        name: "update_user",
        description: "Rename a user by ID",
        fields: &[
            FieldSpec::required("id", "User ID", FieldKind::PositiveInteger),
            FieldSpec::required("name", "New user name", NON_EMPTY),
        ],
        kind: ToolKind::UpdateUser,
    },
    ToolDescriptor {
        name: "initialize_database",
        description: "Seed the users table with sample users, optionally clearing it first",
        fields: &[FieldSpec::optional(
            "reset",
            "Clear existing users before seeding",
            FieldKind::Boolean,
        )
        .with_default(DefaultValue::Bool(false))],
        kind: ToolKind::InitializeDatabase,
    },
    ToolDescriptor {
        name: "get_etfs_by_risk",
        description: "List ETFs with the given risk rating, largest AUM first",
        fields: &[
            FieldSpec::required("risk_rating", "Risk rating", RISK),
            FieldSpec::optional(
                "limit",
                "Maximum number of ETFs",
                FieldKind::PositiveInteger,
            )
            .with_default(DefaultValue::Integer(DEFAULT_ETF_LIMIT)),
        ],
        kind: ToolKind::GetEtfsByRisk,
    },
    ToolDescriptor {
        name: "search_etfs",
        description: "Search ETFs whose symbol or name contains the term, largest AUM first",
        fields: &[FieldSpec::required("term", "Search term", NON_EMPTY)],
        kind: ToolKind::SearchEtfs,
    },
    ToolDescriptor {
        name: "get_top_etfs",
        description: "List the top ETFs by AUM, volume or price",
        fields: &[
            FieldSpec::optional(
                "limit",
                "Maximum number of ETFs",
                FieldKind::PositiveInteger,
            )
            .with_default(DefaultValue::Integer(DEFAULT_ETF_LIMIT)),
            FieldSpec::optional("sort_by", "Sort key", FieldKind::OneOf(&SortKey::NAMES))
                .with_default(DefaultValue::Text("aum")),
        ],
        kind: ToolKind::GetTopEtfs,
    },
    ToolDescriptor {
        name: "get_etf_advice",
        description: "Suggest ETFs for a risk tolerance with general guidance",
        fields: &[
            FieldSpec::required("risk_tolerance", "Risk tolerance", RISK),
            FieldSpec::optional(
                "investment_amount",
                "Amount to invest in dollars",
                FieldKind::PositiveNumber,
            ),
            FieldSpec::optional(
                "investment_goal",
                "Investment goal",
                FieldKind::Text { min_length: 0 },
            ),
        ],
        kind: ToolKind::GetEtfAdvice,
    },
    ToolDescriptor {
        name: "get_etf_summary",
        description: "Aggregate ETF statistics grouped by risk rating",
        fields: &[],
        kind: ToolKind::GetEtfSummary,
    },
];

#[derive(Debug, Deserialize)]
struct QueryParams {
    query: String,
}

#[derive(Debug, Deserialize)]
struct TableInfoParams {
    table_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NameParams {
    name: String,
}

#[derive(Debug, Deserialize)]
struct IdParams {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct UpdateUserParams {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct InitializeParams {
    reset: bool,
}

#[derive(Debug, Deserialize)]
struct EtfsByRiskParams {
    risk_rating: RiskRating,
    limit: i64,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    term: String,
}

#[derive(Debug, Deserialize)]
struct TopEtfsParams {
    limit: i64,
    sort_by: SortKey,
}

#[derive(Debug, Deserialize)]
struct AdviceParams {
    risk_tolerance: RiskRating,
    investment_amount: Option<f64>,
    investment_goal: Option<String>,
}

/// Result envelope of one tool call: either content or a failure message,
/// never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success(Vec<String>),
    Failure(String),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn into_call_tool_result(self) -> CallToolResult {
        let (blocks, is_error) = match self {
            Self::Success(blocks) => (blocks, None),
            Self::Failure(message) => (vec![message], Some(true)),
        };

        CallToolResult {
            content: blocks
                .into_iter()
                .map(|text| ContentBlock::from(TextContent::new(text, None, None)))
                .collect(),
            is_error,
            meta: None,
            structured_content: None,
        }
    }
}

pub fn find_tool(name: &str) -> Option<&'static ToolDescriptor> {
    TOOLS.iter().find(|tool| tool.name == name)
}

pub fn build_tools_list() -> Vec<Tool> {
    TOOLS
        .iter()
        .map(|tool| {
            serde_json::from_value(json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": input_schema(tool.fields),
            }))
            .expect("tool descriptor matches the mcp tool schema")
        })
        .collect()
}

pub async fn call_tool(state: &AppState, name: &str, arguments: &Map<String, Value>) -> ToolOutcome {
    match run_tool(state, name, arguments).await {
        Ok(blocks) => ToolOutcome::Success(blocks),
        Err(err) => {
            warn!(tool = %name, error = %err, "tool call failed");
            ToolOutcome::Failure(format!("Error: {err}"))
        }
    }
}

async fn run_tool(
    state: &AppState,
    name: &str,
    arguments: &Map<String, Value>,
) -> Result<Vec<String>, AppError> {
    let tool = find_tool(name).ok_or_else(|| AppError::UnknownTool(name.to_string()))?;
    let fields = tool.fields;

    let text = match tool.kind {
        ToolKind::ExecuteSql => {
            let params: QueryParams = parse_arguments(fields, arguments)?;
            ensure_select(&params.query)?;
            to_pretty_json(&state.users.run_query(&params.query).await?)?
        }
        ToolKind::GetTableInfo => {
            let params: TableInfoParams = parse_arguments(fields, arguments)?;
            match params.table_name.filter(|table| !table.trim().is_empty()) {
                Some(table) => to_pretty_json(&state.users.table_columns(table.trim()).await?)?,
                None => to_pretty_json(&state.users.list_tables().await?)?,
            }
        }
        ToolKind::AddUser => {
            let params: NameParams = parse_arguments(fields, arguments)?;
            let id = state.users.add_user(&params.name).await?;
            format!("User added successfully with ID: {id}")
        }
        ToolKind::GetAllUsers => to_pretty_json(&state.users.list_users().await?)?,
        ToolKind::DeleteUser => {
            let params: IdParams = parse_arguments(fields, arguments)?;
            state.users.delete_user(params.id).await?;
            format!("User with ID {} deleted successfully", params.id)
        }
        ToolKind::UpdateUser => {
            let params: UpdateUserParams = parse_arguments(fields, arguments)?;
            state.users.update_user(params.id, &params.name).await?;
            format!(
                "User with ID {} updated successfully to name: {}",
                params.id, params.name
            )
        }
        ToolKind::InitializeDatabase => {
            let params: InitializeParams = parse_arguments(fields, arguments)?;
            let outcome = state.users.initialize(params.reset).await?;
            let mut message = String::new();
            if params.reset {
                message.push_str(&format!("Cleared {} existing users. ", outcome.cleared));
            }
            if outcome.seeded > 0 {
                message.push_str(&format!(
                    "Database initialized with {} sample users",
                    outcome.seeded
                ));
            } else {
                message.push_str(&format!(
                    "Database already contains {} users; no sample data added",
                    outcome.existing
                ));
            }
            message
        }
        ToolKind::GetEtfsByRisk => {
            let params: EtfsByRiskParams = parse_arguments(fields, arguments)?;
            to_pretty_json(&state.etfs.by_risk(params.risk_rating, params.limit).await?)?
        }
        ToolKind::SearchEtfs => {
            let params: SearchParams = parse_arguments(fields, arguments)?;
            to_pretty_json(&state.etfs.search(&params.term).await?)?
        }
        ToolKind::GetTopEtfs => {
            let params: TopEtfsParams = parse_arguments(fields, arguments)?;
            to_pretty_json(&state.etfs.top(params.sort_by, params.limit).await?)?
        }
        ToolKind::GetEtfAdvice => {
            let params: AdviceParams = parse_arguments(fields, arguments)?;
            let picks = state
                .etfs
                .by_risk(params.risk_tolerance, ADVICE_PICK_COUNT)
                .await?;
            let advice = compose_advice(
                params.risk_tolerance,
                params.investment_amount,
                params.investment_goal.as_deref(),
                &picks,
            );
            return Ok(vec![advice, to_pretty_json(&picks)?]);
        }
        ToolKind::GetEtfSummary => to_pretty_json(&state.etfs.summary().await?)?,
    };

    Ok(vec![text])
}

pub async fn handle_tools_call(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INTERNAL_ERROR, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INTERNAL_ERROR, "Invalid params"),
    };

    let arguments = tool_call.arguments.unwrap_or_default();
    let outcome = call_tool(state, &tool_call.name, &arguments).await;

    json_rpc_result(
        id,
        serde_json::to_value(outcome.into_call_tool_result())
            .expect("tool result serialization"),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{build_tools_list, call_tool, find_tool, ToolOutcome, TOOLS};
    use crate::{
        db::{fixtures::etf_store, users::UserStore},
        AppState,
    };

    async fn state(dir: &tempfile::TempDir) -> AppState {
        let users = UserStore::in_memory().await.expect("users store");
        let etfs = etf_store(&dir.path().join("etfs.db")).await;
        AppState::new(None, users, etfs)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object arguments")
    }

    fn success_text(outcome: ToolOutcome) -> Vec<String> {
        match outcome {
            ToolOutcome::Success(blocks) => blocks,
            ToolOutcome::Failure(message) => panic!("expected success, got {message}"),
        }
    }

    fn failure_text(outcome: ToolOutcome) -> String {
        match outcome {
            ToolOutcome::Failure(message) => message,
            ToolOutcome::Success(blocks) => panic!("expected failure, got {blocks:?}"),
        }
    }

    #[test]
    fn catalogue_names_are_unique_and_listed() {
        let tools = build_tools_list();
        assert_eq!(tools.len(), TOOLS.len());

        let mut names = TOOLS.iter().map(|tool| tool.name).collect::<Vec<_>>();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TOOLS.len());
        assert!(find_tool("execute_sql").is_some());
        assert!(find_tool("drop_everything").is_none());
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let message = failure_text(call_tool(&state, "drop_everything", &Map::new()).await);
        assert_eq!(message, "Error: Unknown tool: drop_everything");
    }

    #[tokio::test]
    async fn execute_sql_rejects_non_select_statements() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        for query in ["DELETE FROM users", "  update users set name = 'x'", "PRAGMA foo"] {
            let outcome = call_tool(&state, "execute_sql", &args(json!({ "query": query }))).await;
            assert_eq!(
                failure_text(outcome),
                "Error: Only SELECT queries are allowed for safety"
            );
        }

        let outcome = call_tool(
            &state,
            "execute_sql",
            &args(json!({ "query": "  select count(*) AS total from users" })),
        )
        .await;
        let rows: Value = serde_json::from_str(&success_text(outcome)[0]).expect("json rows");
        assert_eq!(rows, json!([{ "total": 0 }]));
    }

    #[tokio::test]
    async fn execute_sql_rejects_stacked_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;
        state.users.add_user("Ann").await.expect("add user");

        for query in ["SELECT 1; DELETE FROM users", "select 1; drop table users"] {
            let outcome = call_tool(&state, "execute_sql", &args(json!({ "query": query }))).await;
            assert_eq!(
                failure_text(outcome),
                "Error: Only a single SELECT statement is allowed"
            );
        }

        let listed = success_text(call_tool(&state, "get_all_users", &Map::new()).await);
        let users: Value = serde_json::from_str(&listed[0]).expect("json users");
        assert_eq!(users[0]["name"], "Ann");
    }

    #[tokio::test]
    async fn execute_sql_surfaces_engine_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let message = failure_text(
            call_tool(
                &state,
                "execute_sql",
                &args(json!({ "query": "SELECT * FROM missing_table" })),
            )
            .await,
        );
        assert!(message.starts_with("Error: "));
        assert!(message.contains("missing_table"));
    }

    #[tokio::test]
    async fn add_user_then_list_includes_new_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let added = success_text(call_tool(&state, "add_user", &args(json!({ "name": "Ann" }))).await);
        assert_eq!(added, vec!["User added successfully with ID: 1".to_string()]);

        let listed = success_text(call_tool(&state, "get_all_users", &Map::new()).await);
        let users: Value = serde_json::from_str(&listed[0]).expect("json users");
        assert_eq!(users, json!([{ "id": 1, "name": "Ann" }]));
    }

    #[tokio::test]
    async fn delete_and_update_missing_user_mention_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let message = failure_text(call_tool(&state, "delete_user", &args(json!({ "id": 41 }))).await);
        assert_eq!(message, "Error: No user found with ID: 41");

        let message = failure_text(
            call_tool(&state, "update_user", &args(json!({ "id": 42, "name": "Zed" }))).await,
        );
        assert!(message.contains("42"));
    }

    #[tokio::test]
    async fn user_arguments_are_validated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let message = failure_text(call_tool(&state, "add_user", &args(json!({ "name": "" }))).await);
        assert_eq!(
            message,
            "Error: Field 'name' must contain at least 1 character(s)"
        );

        let message = failure_text(call_tool(&state, "delete_user", &args(json!({ "id": 0 }))).await);
        assert_eq!(message, "Error: Field 'id' must be a positive integer");

        let message = failure_text(call_tool(&state, "update_user", &args(json!({ "id": 1 }))).await);
        assert_eq!(message, "Error: Missing required field: name");
    }

    #[tokio::test]
    async fn initialize_with_reset_yields_seed_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;
        call_tool(&state, "add_user", &args(json!({ "name": "Ann" }))).await;

        let message = success_text(
            call_tool(&state, "initialize_database", &args(json!({ "reset": true }))).await,
        );
        assert_eq!(
            message,
            vec!["Cleared 1 existing users. Database initialized with 3 sample users".to_string()]
        );

        let listed = success_text(call_tool(&state, "get_all_users", &Map::new()).await);
        let users: Vec<Value> = serde_json::from_str(&listed[0]).expect("json users");
        let names = users
            .iter()
            .map(|user| user["name"].as_str().expect("name"))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Alice Johnson", "Bob Smith", "Charlie Brown"]);

        let message =
            success_text(call_tool(&state, "initialize_database", &Map::new()).await);
        assert_eq!(
            message,
            vec!["Database already contains 3 users; no sample data added".to_string()]
        );
    }

    #[tokio::test]
    async fn get_table_info_lists_or_describes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let tables = success_text(call_tool(&state, "get_table_info", &Map::new()).await);
        let tables: Value = serde_json::from_str(&tables[0]).expect("json tables");
        assert_eq!(tables, json!(["users"]));

        let columns = success_text(
            call_tool(&state, "get_table_info", &args(json!({ "table_name": "users" }))).await,
        );
        let columns: Value = serde_json::from_str(&columns[0]).expect("json columns");
        assert_eq!(columns[0]["name"], "id");
        assert_eq!(columns[0]["pk"], true);
        assert_eq!(columns[1]["type"], "TEXT");
    }

    #[tokio::test]
    async fn etfs_by_risk_returns_only_that_rating_by_aum() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let blocks = success_text(
            call_tool(&state, "get_etfs_by_risk", &args(json!({ "risk_rating": "Low" }))).await,
        );
        let etfs: Vec<Value> = serde_json::from_str(&blocks[0]).expect("json etfs");
        assert_eq!(etfs.len(), 2);
        assert!(etfs.iter().all(|etf| etf["risk_rating"] == "Low"));
        let aums = etfs
            .iter()
            .map(|etf| etf["aum"].as_f64().expect("aum"))
            .collect::<Vec<_>>();
        assert!(aums.windows(2).all(|pair| pair[0] >= pair[1]));

        let message = failure_text(
            call_tool(&state, "get_etfs_by_risk", &args(json!({ "risk_rating": "Extreme" }))).await,
        );
        assert_eq!(
            message,
            "Error: Field 'risk_rating' must be one of: Low, Medium, High"
        );
    }

    #[tokio::test]
    async fn top_etfs_defaults_and_sort_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let blocks = success_text(call_tool(&state, "get_top_etfs", &Map::new()).await);
        let etfs: Vec<Value> = serde_json::from_str(&blocks[0]).expect("json etfs");
        assert_eq!(etfs.len(), 6);
        assert_eq!(etfs[0]["symbol"], "SPY");

        let blocks = success_text(
            call_tool(
                &state,
                "get_top_etfs",
                &args(json!({ "sort_by": "price", "limit": 2 })),
            )
            .await,
        );
        let etfs: Vec<Value> = serde_json::from_str(&blocks[0]).expect("json etfs");
        assert_eq!(etfs.len(), 2);
        assert_eq!(etfs[1]["symbol"], "QQQ");

        let outcome =
            call_tool(&state, "get_top_etfs", &args(json!({ "sort_by": "name" }))).await;
        assert!(outcome.is_error());
    }

    #[tokio::test]
    async fn search_and_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let blocks =
            success_text(call_tool(&state, "search_etfs", &args(json!({ "term": "innovation" }))).await);
        let etfs: Vec<Value> = serde_json::from_str(&blocks[0]).expect("json etfs");
        assert_eq!(etfs.len(), 1);
        assert_eq!(etfs[0]["symbol"], "ARKK");

        let blocks = success_text(call_tool(&state, "get_etf_summary", &Map::new()).await);
        let summary: Vec<Value> = serde_json::from_str(&blocks[0]).expect("json summary");
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0]["risk_rating"], "Medium");
        assert_eq!(summary[0]["count"], 2);
    }

    #[tokio::test]
    async fn advice_returns_text_and_data_blocks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state(&dir).await;

        let blocks = success_text(
            call_tool(
                &state,
                "get_etf_advice",
                &args(json!({ "risk_tolerance": "High", "investment_amount": 1000 })),
            )
            .await,
        );
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("ETF Investment Advice for High Risk Tolerance"));
        assert!(blocks[0].contains("1. SOXL"));
        let picks: Vec<Value> = serde_json::from_str(&blocks[1]).expect("json picks");
        assert_eq!(picks.len(), 2);

        let outcome = call_tool(
            &state,
            "get_etf_advice",
            &args(json!({ "risk_tolerance": "Reckless" })),
        )
        .await;
        assert!(outcome.is_error());
    }

    #[test]
    fn envelope_never_mixes_success_and_error() {
        let success = ToolOutcome::Success(vec!["a".to_string(), "b".to_string()])
            .into_call_tool_result();
        assert_eq!(success.content.len(), 2);
        assert_eq!(success.is_error, None);

        let failure = ToolOutcome::Failure("Error: boom".to_string()).into_call_tool_result();
        assert_eq!(failure.content.len(), 1);
        assert_eq!(failure.is_error, Some(true));
    }
}
