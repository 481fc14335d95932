use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::schema::InputSchema;
use super::{ToolDescriptor, ToolHandler, find_by_url, parse_args};
use crate::client::ClientHandle;
use crate::dav::Protocol;
use crate::error::{ToolError, ToolResult};

pub fn tool_defs() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "list_address_books",
            description: "List all address books (contact lists) in the account",
            failure: "Failed to list address books",
            input_schema: InputSchema::new(),
            requires: Protocol::Contact,
            handler: Arc::new(ListAddressBooks),
        },
        ToolDescriptor {
            name: "list_contacts",
            description: "List every contact in an address book, with the raw vCard and its name, emails, phones and organization",
            failure: "Failed to list contacts",
            input_schema: InputSchema::new().required(
                "addressBookUrl",
                "URL of the address book, exactly as returned by list_address_books",
            ),
            requires: Protocol::Contact,
            handler: Arc::new(ListContacts),
        },
    ]
}

struct ListAddressBooks;

#[async_trait]
impl ToolHandler for ListAddressBooks {
    async fn run(&self, client: &ClientHandle, _args: Value) -> ToolResult<Value> {
        let books = client.dav().list_address_books().await?;
        Ok(serde_json::to_value(books)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListContactsArgs {
    address_book_url: String,
}

struct ListContacts;

#[async_trait]
impl ToolHandler for ListContacts {
    async fn run(&self, client: &ClientHandle, args: Value) -> ToolResult<Value> {
        let args: ListContactsArgs = parse_args(args)?;
        let books = client.dav().list_address_books().await?;
        let book = find_by_url(&books, &args.address_book_url, |b| b.url.as_str())
            .ok_or_else(|| ToolError::NotFound {
                kind: "Address book",
                url: args.address_book_url.clone(),
            })?;

        let vcards = client.dav().list_vcards(book).await?;
        Ok(serde_json::to_value(vcards)?)
    }
}
