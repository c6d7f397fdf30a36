//! Contact directory
//!
//! Static registry of the family members and other parties eligible to
//! exchange messages. Loaded once at startup from a JSON file; read-only at
//! runtime, so it is safe to share across requests without locking.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::channel::ChannelKind;

/// A directory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
    /// Must be true before any outbound message is attempted
    pub approved: bool,
    pub channels: Vec<ChannelKind>,
}

impl Contact {
    /// Address used on the given channel, if the contact has one
    pub fn address_for(&self, channel: ChannelKind) -> Option<&str> {
        match channel {
            ChannelKind::Sms => self.phone.as_deref(),
            ChannelKind::Email => self.email.as_deref(),
        }
    }
}

/// Fixed in-memory lookup over the contact set. Absence is a valid outcome,
/// not a failure.
#[derive(Debug, Clone, Default)]
pub struct ContactDirectory {
    contacts: Vec<Contact>,
}

impl ContactDirectory {
    /// Build a directory, enforcing that every contact supports at least one
    /// channel and has an address for each channel it lists.
    pub fn new(contacts: Vec<Contact>) -> Result<Self> {
        for contact in &contacts {
            if contact.channels.is_empty() {
                bail!("contact '{}' lists no channels", contact.id);
            }
            for &channel in &contact.channels {
                if contact.address_for(channel).is_none() {
                    bail!(
                        "contact '{}' lists the {} channel but has no {} address",
                        contact.id,
                        channel.as_str(),
                        match channel {
                            ChannelKind::Sms => "phone",
                            ChannelKind::Email => "email",
                        }
                    );
                }
            }
        }
        Ok(Self { contacts })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read contacts file {}", path.display()))?;
        let contacts: Vec<Contact> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid contacts file {}", path.display()))?;
        Self::new(contacts)
    }

    /// Exact match on the E.164 number
    pub fn find_by_phone(&self, phone: &str) -> Option<&Contact> {
        self.contacts
            .iter()
            .find(|c| c.phone.as_deref() == Some(phone))
    }

    /// Case-insensitive match on the email address
    pub fn find_by_email(&self, email: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| {
            c.email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        })
    }

    /// Case-insensitive exact match on the display name
    pub fn find_by_name(&self, name: &str) -> Option<&Contact> {
        self.contacts
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> ContactDirectory {
        ContactDirectory::new(vec![
            Contact {
                id: "mom".to_string(),
                name: "Mom".to_string(),
                phone: Some("+15551234567".to_string()),
                email: Some("Mom@Family.example".to_string()),
                emoji: Some("🌻".to_string()),
                approved: true,
                channels: vec![ChannelKind::Sms, ChannelKind::Email],
            },
            Contact {
                id: "uncle-joe".to_string(),
                name: "Uncle Joe".to_string(),
                phone: None,
                email: Some("joe@example.com".to_string()),
                emoji: None,
                approved: false,
                channels: vec![ChannelKind::Email],
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_find_by_phone_exact() {
        let dir = directory();
        assert_eq!(dir.find_by_phone("+15551234567").unwrap().name, "Mom");
        assert!(dir.find_by_phone("+15550000000").is_none());
    }

    #[test]
    fn test_find_by_email_case_insensitive() {
        let dir = directory();
        assert_eq!(dir.find_by_email("mom@family.example").unwrap().id, "mom");
        assert_eq!(dir.find_by_email("JOE@EXAMPLE.COM").unwrap().id, "uncle-joe");
        assert!(dir.find_by_email("nobody@example.com").is_none());
    }

    #[test]
    fn test_find_by_name_case_insensitive() {
        let dir = directory();
        assert_eq!(dir.find_by_name("mom").unwrap().id, "mom");
        assert_eq!(dir.find_by_name("UNCLE JOE").unwrap().id, "uncle-joe");
        assert!(dir.find_by_name("Mo").is_none());
    }

    #[test]
    fn test_rejects_contact_without_channels() {
        let result = ContactDirectory::new(vec![Contact {
            id: "bad".to_string(),
            name: "Bad".to_string(),
            phone: None,
            email: None,
            emoji: None,
            approved: true,
            channels: vec![],
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_channel_without_address() {
        let result = ContactDirectory::new(vec![Contact {
            id: "bad".to_string(),
            name: "Bad".to_string(),
            phone: None,
            email: Some("bad@example.com".to_string()),
            emoji: None,
            approved: true,
            channels: vec![ChannelKind::Sms, ChannelKind::Email],
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parses_contacts_json() {
        let raw = r#"[
            {
                "id": "dad",
                "name": "Dad",
                "phone": "+15557654321",
                "emoji": "🛠️",
                "approved": true,
                "channels": ["sms"]
            }
        ]"#;
        let contacts: Vec<Contact> = serde_json::from_str(raw).unwrap();
        let dir = ContactDirectory::new(contacts).unwrap();
        assert_eq!(dir.find_by_name("Dad").unwrap().phone.as_deref(), Some("+15557654321"));
        assert!(dir.find_by_name("Dad").unwrap().email.is_none());
    }
}
