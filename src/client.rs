//! Long-lived per-protocol client handles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Credentials;
use crate::dav::{DavClient, DavError, HttpDavClient, Protocol};
use crate::error::ConfigError;
use crate::provider::ProviderConfig;

/// A DAV client bound to one protocol, base address and set of credentials.
pub struct ClientHandle {
    protocol: Protocol,
    base_url: String,
    dav: Arc<dyn DavClient>,
    authenticated: AtomicBool,
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("protocol", &self.protocol)
            .field("base_url", &self.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl ClientHandle {
    pub fn new(protocol: Protocol, base_url: impl Into<String>, dav: Arc<dyn DavClient>) -> Self {
        Self {
            protocol,
            base_url: base_url.into(),
            dav,
            authenticated: AtomicBool::new(false),
        }
    }

    /// Build a handle backed by the HTTP client. Does not touch the network.
    pub fn connect(
        protocol: Protocol,
        base_url: &str,
        credentials: Arc<Credentials>,
    ) -> Result<Self, DavError> {
        let dav = HttpDavClient::new(protocol, base_url, credentials)?;
        Ok(Self::new(protocol, base_url, Arc::new(dav)))
    }

    /// Authenticate against the server. Repeating it is harmless and
    /// refreshes the discovered account locations.
    pub async fn authenticate(&self) -> Result<(), DavError> {
        self.dav.authenticate().await?;
        if !self.authenticated.swap(true, Ordering::AcqRel) {
            tracing::info!(protocol = %self.protocol, url = %self.base_url, "authenticated");
        }
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn dav(&self) -> &dyn DavClient {
        self.dav.as_ref()
    }
}

/// The handles for one provider: one per protocol it supports.
#[derive(Debug, Default, Clone)]
pub struct ClientSet {
    calendar: Option<Arc<ClientHandle>>,
    contact: Option<Arc<ClientHandle>>,
    file: Option<Arc<ClientHandle>>,
}

impl ClientSet {
    /// Build a handle for every protocol `provider` has a base address for.
    pub fn connect(
        provider: &ProviderConfig,
        credentials: Arc<Credentials>,
    ) -> Result<Self, ConfigError> {
        let mut set = Self::default();
        for protocol in Protocol::ALL {
            if let Some(base_url) = provider.base_url(protocol) {
                let handle = ClientHandle::connect(protocol, base_url, credentials.clone())?;
                tracing::debug!(provider = %provider.provider, %protocol, url = base_url, "client configured");
                set.insert(handle);
            }
        }
        Ok(set)
    }

    /// Add or replace the handle for its protocol.
    pub fn insert(&mut self, handle: ClientHandle) {
        let slot = match handle.protocol() {
            Protocol::Calendar => &mut self.calendar,
            Protocol::Contact => &mut self.contact,
            Protocol::File => &mut self.file,
        };
        *slot = Some(Arc::new(handle));
    }

    pub fn get(&self, protocol: Protocol) -> Option<&Arc<ClientHandle>> {
        match protocol {
            Protocol::Calendar => self.calendar.as_ref(),
            Protocol::Contact => self.contact.as_ref(),
            Protocol::File => self.file.as_ref(),
        }
    }

    /// All configured handles, in protocol order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClientHandle>> {
        Protocol::ALL.into_iter().filter_map(|p| self.get(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dav::mock::{MockCall, MockDavClient};
    use crate::provider;

    fn credentials() -> Arc<Credentials> {
        Arc::new(Credentials::new("alice@fastmail.com", "app-password"))
    }

    #[test]
    fn test_fastmail_gets_three_handles() {
        let config = provider::resolve("fastmail", "alice@fastmail.com").unwrap();
        let set = ClientSet::connect(&config, credentials()).unwrap();

        let protocols: Vec<Protocol> = set.iter().map(|h| h.protocol()).collect();
        assert_eq!(protocols, Protocol::ALL.to_vec());
        assert_eq!(
            set.get(Protocol::File).unwrap().base_url(),
            config.file_url.as_deref().unwrap()
        );
        assert!(set.iter().all(|h| !h.is_authenticated()));
    }

    #[test]
    fn test_icloud_has_no_file_handle() {
        let config = provider::resolve("iCloud", "bob@icloud.com").unwrap();
        let set = ClientSet::connect(&config, credentials()).unwrap();

        assert!(set.get(Protocol::Calendar).is_some());
        assert!(set.get(Protocol::Contact).is_some());
        assert!(set.get(Protocol::File).is_none());
    }

    #[tokio::test]
    async fn test_authenticate_is_repeatable() {
        let mock = Arc::new(MockDavClient::new());
        let handle = ClientHandle::new(Protocol::Calendar, "mock://cal/", mock.clone());
        assert!(!handle.is_authenticated());

        handle.authenticate().await.unwrap();
        handle.authenticate().await.unwrap();

        assert!(handle.is_authenticated());
        assert_eq!(
            mock.calls(),
            vec![MockCall::Authenticate, MockCall::Authenticate]
        );
    }

    #[tokio::test]
    async fn test_failed_authenticate_leaves_flag_unset() {
        let mock = Arc::new(MockDavClient::failing("authenticate"));
        let handle = ClientHandle::new(Protocol::Contact, "mock://card/", mock);

        let err = handle.authenticate().await.unwrap_err();
        assert!(matches!(err, DavError::Request { operation: "authenticate", .. }));
        assert!(!handle.is_authenticated());
    }

    #[test]
    fn test_insert_replaces_existing_handle() {
        let mut set = ClientSet::default();
        set.insert(ClientHandle::new(
            Protocol::File,
            "mock://one/",
            Arc::new(MockDavClient::new()),
        ));
        set.insert(ClientHandle::new(
            Protocol::File,
            "mock://two/",
            Arc::new(MockDavClient::new()),
        ));
        assert_eq!(set.get(Protocol::File).unwrap().base_url(), "mock://two/");
        assert_eq!(set.iter().count(), 1);
    }
}
