use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::schema::InputSchema;
use super::{ToolDescriptor, ToolHandler, parse_args};
use crate::client::ClientHandle;
use crate::dav::Protocol;
use crate::error::ToolResult;

pub fn tool_defs() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "list_files",
            description: "List files and folders under a path of the file storage",
            failure: "Failed to list files",
            input_schema: InputSchema::new().optional(
                "path",
                "Folder path relative to the storage root, e.g. Documents/Work (defaults to the root)",
            ),
            requires: Protocol::File,
            handler: Arc::new(ListFiles),
        },
        ToolDescriptor {
            name: "get_file_details",
            description: "Get metadata (content type, etag, whether it is a folder) for a file or folder",
            failure: "Failed to get file details",
            input_schema: InputSchema::new().required(
                "itemUrl",
                "Full URL of the file or folder, as returned by list_files",
            ),
            requires: Protocol::File,
            handler: Arc::new(GetFileDetails),
        },
    ]
}

/// Join a relative path onto a base address with exactly one separator
/// between them. An absent or empty path yields `base` unchanged.
pub fn join_path(base: &str, path: Option<&str>) -> String {
    match path.filter(|p| !p.is_empty()) {
        Some(path) => {
            let base = base.strip_suffix('/').unwrap_or(base);
            let path = path.strip_prefix('/').unwrap_or(path);
            format!("{base}/{path}")
        }
        None => base.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ListFilesArgs {
    path: Option<String>,
}

struct ListFiles;

#[async_trait]
impl ToolHandler for ListFiles {
    async fn run(&self, client: &ClientHandle, args: Value) -> ToolResult<Value> {
        let args: ListFilesArgs = parse_args(args)?;
        let target = join_path(client.base_url(), args.path.as_deref());
        tracing::debug!(url = %target, "listing files");

        let entries = client.dav().list_objects(&target).await?;
        Ok(serde_json::to_value(entries)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileDetailsArgs {
    item_url: String,
}

struct GetFileDetails;

#[async_trait]
impl ToolHandler for GetFileDetails {
    async fn run(&self, client: &ClientHandle, args: Value) -> ToolResult<Value> {
        let args: FileDetailsArgs = parse_args(args)?;
        let entries = client.dav().list_objects(&args.item_url).await?;
        Ok(serde_json::to_value(entries)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use super::join_path;
    use crate::dav::mock::{MockCall, MockDavClient};
    use crate::dav::{DavEntry, Protocol};
    use crate::mcp::tools::tests::{fastmail, registry_with};

    #[test]
    fn test_join_path_single_separator() {
        let base = "https://host/root/";
        assert_eq!(
            join_path(base, Some("Documents/Work")),
            "https://host/root/Documents/Work"
        );
        assert_eq!(
            join_path(base, Some("/Documents/Work")),
            "https://host/root/Documents/Work"
        );
        assert_eq!(
            join_path("https://host/root", Some("Documents")),
            "https://host/root/Documents"
        );
    }

    #[test]
    fn test_join_path_without_path_keeps_base() {
        assert_eq!(join_path("https://host/root/", None), "https://host/root/");
        assert_eq!(join_path("https://host/root/", Some("")), "https://host/root/");
    }

    fn entries() -> Vec<DavEntry> {
        vec![
            DavEntry {
                url: "https://myfiles.fastmail.com/alice@fastmail.com/Documents/".to_string(),
                is_collection: true,
                ..DavEntry::default()
            },
            DavEntry {
                url: "https://myfiles.fastmail.com/alice@fastmail.com/Documents/cv.pdf"
                    .to_string(),
                content_type: Some("application/pdf".to_string()),
                etag: Some("\"cv-1\"".to_string()),
                ..DavEntry::default()
            },
        ]
    }

    #[tokio::test]
    async fn test_list_files_joins_path_onto_base() {
        let dav = Arc::new(MockDavClient::new().with_entries(entries()));
        let registry = registry_with(fastmail(), vec![(Protocol::File, dav.clone())]);

        let result = registry
            .call("list_files", json!({"path": "/Documents"}))
            .await
            .unwrap();

        assert!(!result.is_error);
        let body: Value = serde_json::from_str(&result.content[0].text).unwrap();
        assert_eq!(body[1]["etag"], "\"cv-1\"");
        assert_eq!(
            dav.calls().last(),
            Some(&MockCall::ListObjects {
                container_url: "https://myfiles.fastmail.com/alice@fastmail.com/Documents"
                    .to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_list_files_defaults_to_root() {
        let dav = Arc::new(MockDavClient::new());
        let registry = registry_with(fastmail(), vec![(Protocol::File, dav.clone())]);

        let result = registry.call("list_files", json!({})).await.unwrap();

        assert_eq!(result.content[0].text, "[]");
        assert_eq!(
            dav.calls().last(),
            Some(&MockCall::ListObjects {
                container_url: "https://myfiles.fastmail.com/alice@fastmail.com/".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_file_details_uses_url_verbatim() {
        let dav = Arc::new(MockDavClient::new().with_entries(entries()));
        let registry = registry_with(fastmail(), vec![(Protocol::File, dav.clone())]);
        let item = "https://myfiles.fastmail.com/alice@fastmail.com/Documents/cv.pdf";

        let result = registry
            .call("get_file_details", json!({"itemUrl": item}))
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(
            dav.calls().last(),
            Some(&MockCall::ListObjects {
                container_url: item.to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_file_listing_fault_is_error_envelope() {
        let dav = Arc::new(MockDavClient::failing("list_objects"));
        let registry = registry_with(fastmail(), vec![(Protocol::File, dav)]);

        let result = registry
            .call("get_file_details", json!({"itemUrl": "https://host/x"}))
            .await
            .unwrap();

        assert!(result.is_error);
        assert!(result.content[0].text.starts_with("Failed to get file details: "));
    }

    #[tokio::test]
    async fn test_authenticate_fault_stops_file_tools() {
        for (tool, args, prefix) in [
            ("list_files", json!({"path": "Documents"}), "Failed to list files: "),
            (
                "get_file_details",
                json!({"itemUrl": "https://host/x"}),
                "Failed to get file details: ",
            ),
        ] {
            let dav = Arc::new(MockDavClient::failing("authenticate").with_entries(entries()));
            let registry = registry_with(fastmail(), vec![(Protocol::File, dav.clone())]);

            let result = registry.call(tool, args).await.unwrap();

            assert!(result.is_error);
            assert_eq!(
                result.content[0].text,
                format!("{prefix}authenticate failed: HTTP 500")
            );
            assert_eq!(dav.calls(), vec![MockCall::Authenticate]);
        }
    }
}
