use serde_json::{Value, json};

use super::jsonrpc::{JsonRpcErrorResponse, JsonRpcReply, JsonRpcRequest, JsonRpcResponse};
use super::tools::ToolRegistry;

pub const PROTOCOL_VERSION: &str = "2025-03-26";
pub const SERVER_NAME: &str = "dav-mcp-server";

/// Handle one JSON-RPC message. Returns `None` for notifications, which
/// never get a reply.
pub async fn handle_request(
    registry: &ToolRegistry,
    request: &JsonRpcRequest,
) -> Option<JsonRpcReply> {
    if request.is_notification() {
        tracing::debug!(method = %request.method, "notification received");
        return None;
    }

    if request.jsonrpc != "2.0" {
        return Some(
            JsonRpcErrorResponse::invalid_request(
                request.id.clone(),
                format!("Unsupported jsonrpc version '{}'", request.jsonrpc),
            )
            .into(),
        );
    }

    let reply = match request.method.as_str() {
        "initialize" => handle_initialize(registry, request),
        "ping" => JsonRpcResponse::success(request.id.clone(), json!({})).into(),
        "tools/list" => handle_tools_list(registry, request),
        "tools/call" => handle_tools_call(registry, request).await,
        method => {
            tracing::debug!(method, "unknown method");
            JsonRpcErrorResponse::method_not_found(request.id.clone(), method).into()
        }
    };
    Some(reply)
}

/// Handle the MCP initialize request.
fn handle_initialize(registry: &ToolRegistry, request: &JsonRpcRequest) -> JsonRpcReply {
    let provider = registry.provider();
    let files = if provider.supports_file_protocol() {
        " Use list_files and get_file_details to browse stored files."
    } else {
        ""
    };

    let result = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": format!(
            "This MCP server reads calendars, contacts and files from a {} account over DAV. \
             Use list_calendars, then list_calendar_events with a calendar URL; use \
             list_address_books, then list_contacts with an address book URL.{files}",
            provider.provider
        )
    });

    JsonRpcResponse::success(request.id.clone(), result).into()
}

/// Handle tools/list: the registered tool definitions.
fn handle_tools_list(registry: &ToolRegistry, request: &JsonRpcRequest) -> JsonRpcReply {
    JsonRpcResponse::success(
        request.id.clone(),
        json!({ "tools": registry.catalog_json() }),
    )
    .into()
}

/// Handle tools/call: dispatch to the named tool.
async fn handle_tools_call(registry: &ToolRegistry, request: &JsonRpcRequest) -> JsonRpcReply {
    let Some(tool_name) = request.params.get("name").and_then(Value::as_str) else {
        return JsonRpcErrorResponse::invalid_params(
            request.id.clone(),
            "Missing 'name' in params",
        )
        .into();
    };
    let arguments = request
        .params
        .get("arguments")
        .cloned()
        .unwrap_or(Value::Null);

    tracing::debug!(tool = tool_name, "tool call");
    match registry.call(tool_name, arguments).await {
        Ok(result) => match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(request.id.clone(), value).into(),
            Err(e) => JsonRpcErrorResponse::internal_error(request.id.clone(), e.to_string()).into(),
        },
        Err(err) => {
            tracing::warn!(tool = tool_name, error = %err, "tool call rejected");
            JsonRpcErrorResponse::invalid_params(request.id.clone(), err.to_string()).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dav::Protocol;
    use crate::dav::mock::{self, MockDavClient};
    use crate::mcp::tools::tests::{fastmail, registry_with};
    use crate::provider;

    fn request(value: Value) -> JsonRpcRequest {
        serde_json::from_value(value).unwrap()
    }

    async fn reply(registry: &ToolRegistry, value: Value) -> Value {
        let reply = handle_request(registry, &request(value)).await.unwrap();
        serde_json::to_value(reply).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let registry = registry_with(fastmail(), vec![]);
        let resp = reply(
            &registry,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;

        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(resp["result"]["serverInfo"]["name"], SERVER_NAME);
        assert!(resp["result"]["capabilities"]["tools"].is_object());
        let instructions = resp["result"]["instructions"].as_str().unwrap();
        assert!(instructions.contains("fastmail"));
        assert!(instructions.contains("list_files"));
    }

    #[tokio::test]
    async fn test_initialize_icloud_omits_files() {
        let config = provider::resolve("icloud", "bob@icloud.com").unwrap();
        let registry = registry_with(config, vec![]);
        let resp = reply(
            &registry,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
        )
        .await;

        let instructions = resp["result"]["instructions"].as_str().unwrap();
        assert!(instructions.contains("icloud"));
        assert!(!instructions.contains("list_files"));
    }

    #[tokio::test]
    async fn test_notification_gets_no_reply() {
        let registry = registry_with(fastmail(), vec![]);
        let req = request(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
        assert!(handle_request(&registry, &req).await.is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let registry = registry_with(fastmail(), vec![]);
        let resp = reply(&registry, json!({"jsonrpc": "2.0", "id": "p", "method": "ping"})).await;
        assert_eq!(resp["result"], json!({}));
    }

    #[tokio::test]
    async fn test_null_id_gets_reply_with_null_id() {
        let registry = registry_with(fastmail(), vec![]);
        let resp = reply(&registry, json!({"jsonrpc": "2.0", "id": null, "method": "ping"})).await;
        assert_eq!(resp["id"], Value::Null);
        assert_eq!(resp["result"], json!({}));
    }

    #[tokio::test]
    async fn test_tools_list() {
        let registry = registry_with(fastmail(), vec![]);
        let resp = reply(
            &registry,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        )
        .await;

        let tools = resp["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 6);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let dav = Arc::new(
            MockDavClient::new().with_calendars(vec![mock::calendar("https://x/cal/", "Work")]),
        );
        let registry = registry_with(fastmail(), vec![(Protocol::Calendar, dav)]);

        let resp = reply(
            &registry,
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {"name": "list_calendars", "arguments": {}}
            }),
        )
        .await;

        assert!(resp["result"].get("isError").is_none());
        let text = resp["result"]["content"][0]["text"].as_str().unwrap();
        let calendars: Value = serde_json::from_str(text).unwrap();
        assert_eq!(calendars[0]["displayName"], "Work");
    }

    #[tokio::test]
    async fn test_tools_call_failure_is_result_not_rpc_error() {
        let dav = Arc::new(MockDavClient::failing("authenticate"));
        let registry = registry_with(fastmail(), vec![(Protocol::Calendar, dav)]);

        let resp = reply(
            &registry,
            json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "tools/call",
                "params": {"name": "list_calendars"}
            }),
        )
        .await;

        assert!(resp.get("error").is_none());
        assert_eq!(resp["result"]["isError"], true);
    }

    #[tokio::test]
    async fn test_tools_call_missing_name() {
        let registry = registry_with(fastmail(), vec![]);
        let resp = reply(
            &registry,
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {}}),
        )
        .await;
        assert_eq!(resp["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_tools_call_unknown_tool_and_bad_arguments() {
        let config = provider::resolve("icloud", "bob@icloud.com").unwrap();
        let registry = registry_with(config, vec![]);

        let unknown = reply(
            &registry,
            json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call",
                   "params": {"name": "list_files", "arguments": {}}}),
        )
        .await;
        assert_eq!(unknown["error"]["code"], -32602);
        assert_eq!(unknown["error"]["message"], "Unknown tool: list_files");

        let invalid = reply(
            &registry,
            json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call",
                   "params": {"name": "list_contacts", "arguments": {"addressBookUrl": 1}}}),
        )
        .await;
        assert_eq!(invalid["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let registry = registry_with(fastmail(), vec![]);
        let resp = reply(
            &registry,
            json!({"jsonrpc": "2.0", "id": 8, "method": "resources/list"}),
        )
        .await;
        assert_eq!(resp["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_wrong_jsonrpc_version() {
        let registry = registry_with(fastmail(), vec![]);
        let resp = reply(&registry, json!({"jsonrpc": "1.0", "id": 9, "method": "ping"})).await;
        assert_eq!(resp["error"]["code"], -32600);
    }
}
