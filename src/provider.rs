//! Maps a provider selector onto its DAV server addresses.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::dav::Protocol;
use crate::error::ConfigError;

const FASTMAIL_CALDAV_TEMPLATE: &str = "https://caldav.fastmail.com/dav/calendars/user/";
const FASTMAIL_CARDDAV_TEMPLATE: &str = "https://carddav.fastmail.com/dav/addressbooks/user/";
const FASTMAIL_WEBDAV_TEMPLATE: &str = "https://myfiles.fastmail.com/";

/// iCloud discovers the account from the credentials, so its URLs are fixed.
pub const ICLOUD_CALDAV_URL: &str = "https://caldav.icloud.com/";
pub const ICLOUD_CARDDAV_URL: &str = "https://contacts.icloud.com/";

/// The closed set of supported DAV providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Fastmail,
    Icloud,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Fastmail => "fastmail",
            Provider::Icloud => "icloud",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fastmail" => Ok(Provider::Fastmail),
            "icloud" => Ok(Provider::Icloud),
            _ => Err(ConfigError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// Resolved server addresses for one provider. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub calendar_url: Option<String>,
    pub contact_url: Option<String>,
    pub file_url: Option<String>,
}

impl ProviderConfig {
    /// Base address for a protocol, if the provider speaks it.
    pub fn base_url(&self, protocol: Protocol) -> Option<&str> {
        match protocol {
            Protocol::Calendar => self.calendar_url.as_deref(),
            Protocol::Contact => self.contact_url.as_deref(),
            Protocol::File => self.file_url.as_deref(),
        }
    }

    pub fn supports(&self, protocol: Protocol) -> bool {
        self.base_url(protocol).is_some()
    }

    pub fn supports_file_protocol(&self) -> bool {
        self.supports(Protocol::File)
    }
}

/// Resolve a provider selector (case-insensitive) for the given account.
pub fn resolve(identifier: &str, account_name: &str) -> Result<ProviderConfig, ConfigError> {
    let provider: Provider = identifier.parse()?;

    let config = match provider {
        Provider::Fastmail => ProviderConfig {
            provider,
            calendar_url: Some(account_url(FASTMAIL_CALDAV_TEMPLATE, account_name)?),
            contact_url: Some(account_url(FASTMAIL_CARDDAV_TEMPLATE, account_name)?),
            file_url: Some(account_url(FASTMAIL_WEBDAV_TEMPLATE, account_name)?),
        },
        Provider::Icloud => ProviderConfig {
            provider,
            calendar_url: Some(ICLOUD_CALDAV_URL.to_string()),
            contact_url: Some(ICLOUD_CARDDAV_URL.to_string()),
            file_url: None,
        },
    };

    Ok(config)
}

/// Append `account` to `template` as a single percent-encoded path segment,
/// keeping the trailing slash that marks a collection.
fn account_url(template: &str, account: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidAccountName(account.to_string());
    let mut url = Url::parse(template).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .push(account)
        .push("");
    Ok(url.into())
}
