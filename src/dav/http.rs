//! `libdav`-backed DAV client using hyper + tower for HTTP.

use std::sync::Arc;

use ::http::Uri;
use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use libdav::caldav::{FindCalendarHomeSet, FindCalendars, GetCalendarResources};
use libdav::carddav::{FindAddressBookHomeSet, FindAddressBooks, GetAddressBookResources};
use libdav::dav::{GetProperty, ListResources, WebDavClient};
use libdav::names;
use secrecy::ExposeSecret;
use tokio::sync::RwLock;
use tower_http::auth::AddAuthorization;
use url::Url;

use super::{
    AddressBook, Calendar, CalendarObject, DavClient, DavEntry, DavError, Protocol, TimeRange,
    VCard,
};
use crate::config::Credentials;

type HttpsClient = Client<HttpsConnector<HttpConnector>, String>;

/// Every request carries `Authorization: Basic ...`, marked sensitive.
type AuthedClient = AddAuthorization<HttpsClient>;

/// DAV client bound to one base address and one set of credentials.
pub struct HttpDavClient {
    protocol: Protocol,
    base_url: Url,
    http: AuthedClient,
    /// Home collection found by the last `authenticate`.
    home_url: RwLock<Option<Url>>,
}

impl std::fmt::Debug for HttpDavClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDavClient")
            .field("protocol", &self.protocol)
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpDavClient {
    /// Build a client. No network traffic happens until `authenticate`.
    pub fn new(
        protocol: Protocol,
        base_url: &str,
        credentials: Arc<Credentials>,
    ) -> Result<Self, DavError> {
        let base_url = parse_url(base_url)?;

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let https_client: HttpsClient =
            Client::builder(hyper_util::rt::TokioExecutor::new()).build(https_connector);
        let http = AddAuthorization::basic(
            https_client,
            &credentials.account_name,
            credentials.secret.expose_secret(),
        );

        Ok(Self {
            protocol,
            base_url,
            http,
            home_url: RwLock::new(None),
        })
    }

    async fn home_url(&self) -> Result<Url, DavError> {
        self.home_url
            .read()
            .await
            .clone()
            .ok_or(DavError::NotAuthenticated(self.protocol))
    }

    /// A WebDAV client rooted at `url`. Requests go to the host that serves
    /// `url`, which may differ from the configured base (iCloud shards
    /// accounts across hosts).
    fn webdav(&self, url: &Url) -> Result<WebDavClient<AuthedClient>, DavError> {
        Ok(WebDavClient::new(to_uri(url)?, self.http.clone()))
    }

    /// Principal lookup on the base address, then the home-set on the
    /// principal. Falls back to the base address when either is absent.
    async fn discover_home(&self) -> Result<Url, DavError> {
        let principal = self
            .webdav(&self.base_url)?
            .find_current_user_principal()
            .await
            .map_err(|e| DavError::request("find current user principal", e))?;

        let Some(principal) = principal else {
            tracing::debug!(
                protocol = %self.protocol,
                url = %self.base_url,
                "no principal, using base URL"
            );
            return Ok(self.base_url.clone());
        };
        let principal_url = resolve_uri(&self.base_url, &principal)?;
        let principal_uri = to_uri(&principal_url)?;
        let webdav = self.webdav(&principal_url)?;

        let home_sets = match self.protocol {
            Protocol::Calendar => {
                webdav
                    .request(FindCalendarHomeSet::new(principal_uri.path()))
                    .await
                    .map_err(|e| DavError::request("find calendar home set", e))?
                    .home_sets
            }
            Protocol::Contact | Protocol::File => {
                webdav
                    .request(FindAddressBookHomeSet::new(principal_uri.path()))
                    .await
                    .map_err(|e| DavError::request("find address book home set", e))?
                    .home_sets
            }
        };

        match home_sets.first() {
            Some(home) => resolve_uri(&principal_url, home),
            None => {
                tracing::debug!(
                    protocol = %self.protocol,
                    principal = %principal_url,
                    "no home set, using base URL"
                );
                Ok(self.base_url.clone())
            }
        }
    }
}

fn parse_url(url: &str) -> Result<Url, DavError> {
    Url::parse(url).map_err(|source| DavError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

fn to_uri(url: &Url) -> Result<Uri, DavError> {
    url.as_str()
        .parse()
        .map_err(|source| DavError::InvalidUri {
            url: url.to_string(),
            source,
        })
}

/// Resolve an href from a response against the URL the request went to.
fn resolve(request_url: &Url, href: &str) -> Result<Url, DavError> {
    request_url.join(href).map_err(|source| DavError::InvalidUrl {
        url: href.to_string(),
        source,
    })
}

fn resolve_uri(request_url: &Url, uri: &Uri) -> Result<Url, DavError> {
    match uri.authority() {
        Some(_) => parse_url(&uri.to_string()),
        None => resolve(request_url, uri.path()),
    }
}

#[async_trait]
impl DavClient for HttpDavClient {
    async fn authenticate(&self) -> Result<(), DavError> {
        let home_url = match self.protocol {
            Protocol::File => {
                // Any authenticated PROPFIND proves the credentials
                self.webdav(&self.base_url)?
                    .find_current_user_principal()
                    .await
                    .map_err(|e| DavError::request("authenticate", e))?;
                self.base_url.clone()
            }
            Protocol::Calendar | Protocol::Contact => self.discover_home().await?,
        };

        tracing::debug!(protocol = %self.protocol, home = %home_url, "account discovered");
        *self.home_url.write().await = Some(home_url);
        Ok(())
    }

    async fn list_calendars(&self) -> Result<Vec<Calendar>, DavError> {
        let home = self.home_url().await?;
        let found = self
            .webdav(&home)?
            .request(FindCalendars::new(to_uri(&home)?.path()))
            .await
            .map_err(|e| DavError::request("find calendars", e))?;

        let mut calendars = Vec::with_capacity(found.calendars.len());
        for collection in found.calendars {
            let url = resolve(&home, &collection.href)?;
            let webdav = self.webdav(&url)?;

            let display_name = webdav
                .request(GetProperty::new(url.path(), &names::DISPLAY_NAME))
                .await
                .ok()
                .and_then(|r| r.value);
            let description = webdav
                .request(GetProperty::new(url.path(), &names::CALENDAR_DESCRIPTION))
                .await
                .ok()
                .and_then(|r| r.value);
            let color = webdav
                .request(GetProperty::new(url.path(), &names::CALENDAR_COLOUR))
                .await
                .ok()
                .and_then(|r| r.value);

            calendars.push(Calendar {
                url: url.to_string(),
                display_name,
                description,
                color,
            });
        }

        Ok(calendars)
    }

    async fn list_calendar_objects(
        &self,
        calendar: &Calendar,
        range: Option<TimeRange>,
    ) -> Result<Vec<CalendarObject>, DavError> {
        let url = parse_url(&calendar.url)?;
        let bounds = range.as_ref().map(TimeRange::to_caldav).transpose()?;

        let response = self
            .webdav(&url)?
            .request(GetCalendarResources::new(url.path()))
            .await
            .map_err(|e| DavError::request("fetch calendar resources", e))?;

        let mut objects = Vec::new();
        for resource in response.resources {
            let content = match resource.content {
                Ok(content) => content,
                Err(status) => {
                    tracing::debug!(href = %resource.href, %status, "skipping calendar resource");
                    continue;
                }
            };
            let object = CalendarObject::new(
                resolve(&url, &resource.href)?,
                Some(content.etag),
                content.data,
            );
            if let Some((start, end)) = &bounds
                && !object.fields.overlaps(start, end)
            {
                continue;
            }
            objects.push(object);
        }

        Ok(objects)
    }

    async fn list_address_books(&self) -> Result<Vec<AddressBook>, DavError> {
        let home = self.home_url().await?;
        let found = self
            .webdav(&home)?
            .request(FindAddressBooks::new(to_uri(&home)?.path()))
            .await
            .map_err(|e| DavError::request("find address books", e))?;

        let mut address_books = Vec::with_capacity(found.addressbooks.len());
        for collection in found.addressbooks {
            let url = resolve(&home, &collection.href)?;
            let display_name = self
                .webdav(&url)?
                .request(GetProperty::new(url.path(), &names::DISPLAY_NAME))
                .await
                .ok()
                .and_then(|r| r.value);

            address_books.push(AddressBook {
                url: url.to_string(),
                display_name,
            });
        }

        Ok(address_books)
    }

    async fn list_vcards(&self, address_book: &AddressBook) -> Result<Vec<VCard>, DavError> {
        let url = parse_url(&address_book.url)?;
        let response = self
            .webdav(&url)?
            .request(GetAddressBookResources::new(url.path()))
            .await
            .map_err(|e| DavError::request("fetch address book resources", e))?;

        let mut cards = Vec::new();
        for resource in response.resources {
            match resource.content {
                Ok(content) => cards.push(VCard::new(
                    resolve(&url, &resource.href)?,
                    Some(content.etag),
                    content.data,
                )),
                Err(status) => {
                    tracing::debug!(href = %resource.href, %status, "skipping address book resource");
                }
            }
        }

        Ok(cards)
    }

    async fn list_objects(&self, container_url: &str) -> Result<Vec<DavEntry>, DavError> {
        let url = parse_url(container_url)?;
        let response = self
            .webdav(&url)?
            .request(ListResources::new(url.path()))
            .await
            .map_err(|e| DavError::request("list resources", e))?;

        response
            .resources
            .into_iter()
            .map(|resource| {
                Ok(DavEntry {
                    url: resolve(&url, &resource.href)?.to_string(),
                    is_collection: resource.resource_type.is_collection,
                    content_type: resource.content_type,
                    etag: resource.etag,
                })
            })
            .collect()
    }
}
