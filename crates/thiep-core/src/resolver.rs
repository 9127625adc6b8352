//! Turns what the user typed (or picked) into the recipient embedded in a
//! card. At most one directory round trip; lookup failures fall back to the
//! guest or placeholder descriptor.

use tracing::{debug, warn};

use thiep_types::models::{GUEST_ID, RecipientDescriptor, UserProfile};

use crate::ports::Directory;

/// Name shown for a recipient whose profile has no display name.
pub const DEFAULT_RECIPIENT_NAME: &str = "Bạn";

/// Where the resolution target came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Manual,
    FriendList,
}

pub async fn resolve_recipient(
    directory: &dyn Directory,
    manual_token: &str,
    selected_friend_id: &str,
    known_users: &[UserProfile],
) -> Option<RecipientDescriptor> {
    let manual = manual_token.trim();
    let (target, source) = if !manual.is_empty() {
        (manual, Source::Manual)
    } else {
        (selected_friend_id.trim(), Source::FriendList)
    };

    if target.is_empty() {
        return None;
    }

    let descriptor = if target.contains('@') {
        resolve_email(directory, target, known_users).await
    } else {
        resolve_account_id(directory, target, source, known_users).await
    };
    debug!("Resolved recipient '{}' to id '{}'", target, descriptor.id);
    Some(descriptor)
}

async fn resolve_email(
    directory: &dyn Directory,
    email: &str,
    known_users: &[UserProfile],
) -> RecipientDescriptor {
    let local = known_users
        .iter()
        .find(|u| u.email.as_deref() == Some(email))
        .cloned();

    let profile = match local {
        Some(profile) => Some(profile),
        None => match directory.find_profile_by_email(email).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Email lookup for '{}' failed: {}", email, e);
                None
            }
        },
    };

    match profile {
        Some(profile) => RecipientDescriptor {
            name: display_name_of(&profile),
            email: Some(profile.email.unwrap_or_else(|| email.to_string())),
            photo: profile.photo_url,
            id: profile.id,
        },
        None => guest(email),
    }
}

async fn resolve_account_id(
    directory: &dyn Directory,
    id: &str,
    source: Source,
    known_users: &[UserProfile],
) -> RecipientDescriptor {
    let mut profile = known_users.iter().find(|u| u.id == id).cloned();

    if profile.is_none() && source == Source::Manual {
        profile = match directory.get_profile(id).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Profile lookup for '{}' failed: {}", id, e);
                None
            }
        };
    }

    match profile {
        Some(profile) => RecipientDescriptor {
            name: display_name_of(&profile),
            email: profile.email,
            photo: profile.photo_url,
            id: profile.id,
        },
        None => unverified(id),
    }
}

fn display_name_of(profile: &UserProfile) -> String {
    profile
        .display_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_RECIPIENT_NAME.to_string())
}

/// Recipient for an email address that matches no account.
pub fn guest(email: &str) -> RecipientDescriptor {
    RecipientDescriptor {
        id: GUEST_ID.to_string(),
        name: email.to_string(),
        email: Some(email.to_string()),
        photo: None,
    }
}

/// Recipient for an account id nobody could confirm.
pub fn unverified(id: &str) -> RecipientDescriptor {
    let prefix: String = id.chars().take(4).collect();
    RecipientDescriptor {
        id: id.to_string(),
        name: format!("ID: {prefix}..."),
        email: None,
        photo: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use thiep_types::models::{Card, ChatMessage, ChatThread, NewCard};

    use crate::error::StoreError;
    use crate::ports::Subscription;

    /// Directory that serves a fixed set of profiles and counts lookups.
    /// With `fail` set every lookup errors.
    #[derive(Default)]
    struct StubDirectory {
        profiles: Vec<UserProfile>,
        fail: bool,
        lookups: AtomicUsize,
    }

    impl StubDirectory {
        fn lookup(&self) -> Result<(), StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(StoreError::Backend(anyhow::anyhow!("unavailable")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Directory for StubDirectory {
        async fn upsert_profile(&self, _: &UserProfile) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
            self.lookup()?;
            Ok(self.profiles.iter().find(|p| p.id == id).cloned())
        }
        async fn find_profile_by_email(
            &self,
            email: &str,
        ) -> Result<Option<UserProfile>, StoreError> {
            self.lookup()?;
            Ok(self
                .profiles
                .iter()
                .find(|p| p.email.as_deref() == Some(email))
                .cloned())
        }
        async fn list_profiles(&self) -> Result<Vec<UserProfile>, StoreError> {
            unreachable!()
        }
        async fn create_card(&self, _: NewCard) -> Result<Card, StoreError> {
            unreachable!()
        }
        async fn get_card(&self, _: &str) -> Result<Option<Card>, StoreError> {
            unreachable!()
        }
        async fn cards_by_author(&self, _: &str) -> Result<Vec<Card>, StoreError> {
            unreachable!()
        }
        async fn cards_by_recipient(&self, _: &str) -> Result<Vec<Card>, StoreError> {
            unreachable!()
        }
        async fn cards_by_recipient_unordered(&self, _: &str) -> Result<Vec<Card>, StoreError> {
            unreachable!()
        }
        async fn upsert_thread(&self, _: &ChatThread) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn append_message(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<ChatMessage, StoreError> {
            unreachable!()
        }
        async fn thread_messages(&self, _: &str) -> Result<Vec<ChatMessage>, StoreError> {
            unreachable!()
        }
        async fn watch_thread(&self, _: &str) -> Result<Subscription, StoreError> {
            unreachable!()
        }
    }

    fn profile(id: &str, name: Option<&str>, email: Option<&str>, photo: Option<&str>) -> UserProfile {
        UserProfile {
            id: id.into(),
            display_name: name.map(Into::into),
            email: email.map(Into::into),
            photo_url: photo.map(Into::into),
            last_seen: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_target_is_unaddressed() {
        let dir = StubDirectory::default();
        assert_eq!(resolve_recipient(&dir, "   ", "", &[]).await, None);
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn known_friend_resolves_without_lookup() {
        let dir = StubDirectory::default();
        let friends = [profile("U123", Some("Minh"), None, Some("p.png"))];

        let got = resolve_recipient(&dir, "U123", "", &friends).await.unwrap();
        assert_eq!(
            got,
            RecipientDescriptor {
                id: "U123".into(),
                name: "Minh".into(),
                email: None,
                photo: Some("p.png".into()),
            }
        );
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn manual_token_wins_over_selection() {
        let dir = StubDirectory::default();
        let friends = [
            profile("U1", Some("Minh"), None, None),
            profile("U2", Some("Lan"), None, None),
        ];

        let got = resolve_recipient(&dir, " U2 ", "U1", &friends).await.unwrap();
        assert_eq!(got.name, "Lan");
    }

    #[tokio::test]
    async fn unknown_email_becomes_guest() {
        let dir = StubDirectory::default();
        let got = resolve_recipient(&dir, "alice@example.com", "", &[])
            .await
            .unwrap();
        assert_eq!(
            got,
            RecipientDescriptor {
                id: "guest".into(),
                name: "alice@example.com".into(),
                email: Some("alice@example.com".into()),
                photo: None,
            }
        );
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn email_found_in_directory_uses_profile() {
        let dir = StubDirectory {
            profiles: vec![profile("U9", None, Some("lan@example.com"), None)],
            ..Default::default()
        };
        let got = resolve_recipient(&dir, "lan@example.com", "", &[]).await.unwrap();
        assert_eq!(got.id, "U9");
        assert_eq!(got.name, DEFAULT_RECIPIENT_NAME);
        assert_eq!(got.email.as_deref(), Some("lan@example.com"));
    }

    #[tokio::test]
    async fn email_match_is_case_sensitive() {
        let dir = StubDirectory::default();
        let friends = [profile("U9", Some("Lan"), Some("Lan@example.com"), None)];
        let got = resolve_recipient(&dir, "lan@example.com", "", &friends)
            .await
            .unwrap();
        assert!(got.is_guest());
    }

    #[tokio::test]
    async fn known_friend_email_resolves_without_lookup() {
        let dir = StubDirectory::default();
        let friends = [profile("U9", Some("Lan"), Some("lan@example.com"), Some("lan.png"))];
        let got = resolve_recipient(&dir, " lan@example.com ", "", &friends)
            .await
            .unwrap();

        assert_eq!(got.id, "U9");
        assert_eq!(got.name, "Lan");
        assert_eq!(got.email.as_deref(), Some("lan@example.com"));
        assert_eq!(got.photo.as_deref(), Some("lan.png"));
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_email_lookup_degrades_to_guest() {
        let dir = StubDirectory { fail: true, ..Default::default() };
        let got = resolve_recipient(&dir, "bob@example.com", "", &[]).await.unwrap();
        assert!(got.is_guest());
        assert_eq!(got.email.as_deref(), Some("bob@example.com"));
    }

    #[tokio::test]
    async fn failing_id_lookup_yields_placeholder() {
        let dir = StubDirectory { fail: true, ..Default::default() };
        for token in ["abcdefgh", "  xyz12345  ", "ab", "Đông Chí 2025"] {
            let trimmed = token.trim();
            let got = resolve_recipient(&dir, token, "", &[]).await.unwrap();
            let prefix: String = trimmed.chars().take(4).collect();
            assert_eq!(got.id, trimmed);
            assert_eq!(got.name, format!("ID: {prefix}..."));
            assert_eq!(got.email, None);
            assert_eq!(got.photo, None);
        }
    }

    #[tokio::test]
    async fn manual_id_is_looked_up_once() {
        let dir = StubDirectory {
            profiles: vec![profile("U7", Some("Hoa"), Some("hoa@example.com"), None)],
            ..Default::default()
        };
        let got = resolve_recipient(&dir, "U7", "", &[]).await.unwrap();
        assert_eq!(got.name, "Hoa");
        assert_eq!(got.email.as_deref(), Some("hoa@example.com"));
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_friend_selection_is_not_looked_up() {
        let dir = StubDirectory {
            profiles: vec![profile("U7", Some("Hoa"), None, None)],
            ..Default::default()
        };
        let got = resolve_recipient(&dir, "", "U7", &[]).await.unwrap();
        assert_eq!(got.name, "ID: U7...");
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }
}
