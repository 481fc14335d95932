pub mod calendars;
pub mod contacts;
pub mod files;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::client::{ClientHandle, ClientSet};
use crate::dav::Protocol;
use crate::error::{CallError, ToolError, ToolResult};
use crate::provider::ProviderConfig;

use self::schema::InputSchema;

/// Body of a tool. Runs after the bound client has authenticated.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn run(&self, client: &ClientHandle, args: Value) -> ToolResult<Value>;
}

/// A tool definition: published metadata plus the handler that serves it.
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    /// Prefix of the error envelope text, e.g. "Failed to list calendars".
    pub failure: &'static str,
    pub input_schema: InputSchema,
    /// Protocol whose client the handler runs against.
    pub requires: Protocol,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

/// Every tool this server knows, regardless of provider.
pub fn catalog() -> Vec<ToolDescriptor> {
    let mut tools = Vec::new();
    tools.extend(calendars::tool_defs());
    tools.extend(contacts::tool_defs());
    tools.extend(files::tool_defs());
    tools
}

/// Deserialize validated arguments into a handler's argument struct.
fn parse_args<T: DeserializeOwned>(args: Value) -> ToolResult<T> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Exact-match lookup of a container by its advertised URL. No trailing
/// slash or case normalization is applied.
fn find_by_url<'a, T>(items: &'a [T], url: &str, url_of: impl Fn(&T) -> &str) -> Option<&'a T> {
    items.iter().find(|item| url_of(item) == url)
}

/// One text block of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// Result envelope returned by `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl CallToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextContent {
                kind: "text",
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }
}

/// The tools available for one provider, bound to its client handles.
pub struct ToolRegistry {
    provider: ProviderConfig,
    clients: ClientSet,
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Register every catalog tool whose protocol `provider` supports.
    pub fn build(provider: ProviderConfig, clients: ClientSet) -> Self {
        let tools: Vec<ToolDescriptor> = catalog()
            .into_iter()
            .filter(|tool| provider.supports(tool.requires))
            .collect();

        tracing::info!(
            provider = %provider.provider,
            tools = tools.len(),
            file_protocol = provider.supports_file_protocol(),
            "tool registry built"
        );

        Self {
            provider,
            clients,
            tools,
        }
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn clients(&self) -> &ClientSet {
        &self.clients
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Catalog entries as published by `tools/list`.
    pub fn catalog_json(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.input_schema.to_json(),
                })
            })
            .collect()
    }

    /// Validate and run a tool. Handler failures come back as error
    /// envelopes; only an unknown tool or invalid arguments return `Err`.
    pub async fn call(&self, name: &str, args: Value) -> Result<CallToolResult, CallError> {
        let tool = self
            .get(name)
            .ok_or_else(|| CallError::UnknownTool(name.to_string()))?;
        let args = tool
            .input_schema
            .validate(args)
            .map_err(|message| CallError::InvalidArguments {
                tool: name.to_string(),
                message,
            })?;

        match self.execute(tool, args).await {
            Ok(text) => Ok(CallToolResult::text(text)),
            Err(err) => {
                tracing::error!(
                    provider = %self.provider.provider,
                    tool = tool.name,
                    error = %err,
                    "tool call failed"
                );
                Ok(CallToolResult::error(format!("{}: {err}", tool.failure)))
            }
        }
    }

    async fn execute(&self, tool: &ToolDescriptor, args: Value) -> ToolResult<String> {
        let client = self
            .clients
            .get(tool.requires)
            .ok_or(ToolError::ClientNotInitialized {
                protocol: tool.requires,
                provider: self.provider.provider,
            })?;

        client.authenticate().await?;
        let value = tool.handler.run(client, args).await?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}
