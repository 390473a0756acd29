//! Application password data model.
//!
//! IMPORTANT: the serialized shape of these types is what existing installs
//! have in their keychain. Renaming a field or variant needs a migration.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::traits::SiteRecord;

/// A server-issued application password.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credential {
    /// Stable id assigned by the server (a UUID string).
    #[serde(rename = "uuid")]
    pub identifier: String,
    /// The secret itself.
    #[serde(rename = "password")]
    pub token: String,
}

impl Credential {
    pub fn new(identifier: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identifier", &self.identifier)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// One way of addressing a site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Owner {
    /// Reached through a WordPress.com account and a numeric site id.
    #[serde(rename_all = "camelCase")]
    DotCom { username: String, site_id: u64 },
    /// Reached directly at its address.
    SelfHosted { username: String, site: String },
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::DotCom { username, site_id } => write!(f, "dotcom:{}@{}", username, site_id),
            Owner::SelfHosted { username, site } => write!(f, "self-hosted:{}@{}", username, site),
        }
    }
}

/// Owners under which a site's credentials are filed.
///
/// A site added through a WordPress.com account gets a `DotCom` owner; once
/// its username is known it also gets a `SelfHosted` owner, so the same
/// credential is found whichever way the site is added later.
pub fn owners_of(record: &SiteRecord) -> Vec<Owner> {
    let mut owners = Vec::with_capacity(2);
    if let (Some(account), Some(site_id)) = (&record.dotcom_account, record.dotcom_site_id) {
        owners.push(Owner::DotCom {
            username: account.username.clone(),
            site_id,
        });
    }
    if let Some(username) = &record.username {
        owners.push(Owner::SelfHosted {
            username: username.clone(),
            site: record.url.clone(),
        });
    }
    owners
}

/// A credential and every owner it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    #[serde(rename = "password")]
    pub credential: Credential,
    pub owners: Vec<Owner>,
}

impl StoredEntry {
    /// Create an entry, dropping duplicate owners while keeping first-seen order.
    pub fn new(credential: Credential, owners: impl IntoIterator<Item = Owner>) -> Self {
        let mut unique: Vec<Owner> = Vec::new();
        for owner in owners {
            if !unique.contains(&owner) {
                unique.push(owner);
            }
        }
        Self {
            credential,
            owners: unique,
        }
    }

    pub fn id(&self) -> &str {
        &self.credential.identifier
    }

    pub fn belongs_to_any(&self, owners: &[Owner]) -> bool {
        self.owners.iter().any(|owner| owners.contains(owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::DotComAccount;

    #[test]
    fn test_wire_format() {
        let entry = StoredEntry::new(
            Credential::new("56cadaa8", "abcd efgh"),
            [
                Owner::DotCom {
                    username: "demo".to_string(),
                    site_id: 456,
                },
                Owner::SelfHosted {
                    username: "demo".to_string(),
                    site: "https://atomic.com".to_string(),
                },
            ],
        );

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "password": { "uuid": "56cadaa8", "password": "abcd efgh" },
                "owners": [
                    { "dotCom": { "username": "demo", "siteId": 456 } },
                    { "selfHosted": { "username": "demo", "site": "https://atomic.com" } }
                ]
            })
        );
    }

    #[test]
    fn test_parses_existing_keychain_payload() {
        let raw = r#"[{"password":{"uuid":"u-1","password":"p-1"},
                       "owners":[{"selfHosted":{"username":"admin","site":"https://example.com"}}]}]"#;
        let entries: Vec<StoredEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id(), "u-1");
        assert_eq!(entries[0].credential.token, "p-1");
    }

    #[test]
    fn test_new_dedupes_owners() {
        let owner = Owner::SelfHosted {
            username: "admin".to_string(),
            site: "https://example.com".to_string(),
        };
        let entry = StoredEntry::new(Credential::new("id", "t"), [owner.clone(), owner]);
        assert_eq!(entry.owners.len(), 1);
    }

    #[test]
    fn test_credential_debug_hides_token() {
        let debug = format!("{:?}", Credential::new("id-1", "super-secret"));
        assert!(debug.contains("id-1"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_owners_of_self_hosted() {
        let record = SiteRecord::self_hosted("https://example.com", "admin");
        assert_eq!(
            owners_of(&record),
            vec![Owner::SelfHosted {
                username: "admin".to_string(),
                site: "https://example.com".to_string(),
            }]
        );
    }

    #[test]
    fn test_owners_of_dotcom_without_site_username() {
        let record = SiteRecord {
            url: "https://atomic.com".to_string(),
            ..Default::default()
        }
        .with_dotcom(
            456,
            DotComAccount {
                username: "testuser".to_string(),
                auth_token: "token".to_string(),
            },
        );
        assert_eq!(
            owners_of(&record),
            vec![Owner::DotCom {
                username: "testuser".to_string(),
                site_id: 456,
            }]
        );
    }

    #[test]
    fn test_belongs_to_any() {
        let dotcom = Owner::DotCom {
            username: "u".to_string(),
            site_id: 1,
        };
        let other = Owner::DotCom {
            username: "u".to_string(),
            site_id: 2,
        };
        let entry = StoredEntry::new(Credential::new("id", "t"), [dotcom.clone()]);
        assert!(entry.belongs_to_any(&[other.clone(), dotcom]));
        assert!(!entry.belongs_to_any(&[other]));
        assert!(!entry.belongs_to_any(&[]));
    }
}
