//! User directory.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::UserSeed;

/// Account role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[default]
    Member,
    Admin,
}

/// A stored account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub display_name: String,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub role: UserRole,
    pub followers: u32,
    pub following: u32,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// The fields of a [`User`] returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeUser {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub display_name: String,
    pub profile_image_url: Option<String>,
    pub role: UserRole,
    pub followers: u32,
    pub following: u32,
}

impl From<&User> for SafeUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            profile_image_url: user.profile_image_url.clone(),
            role: user.role,
            followers: user.followers,
            following: user.following,
        }
    }
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub display_name: String,
    pub role: UserRole,
}

impl From<&UserSeed> for NewUser {
    fn from(seed: &UserSeed) -> Self {
        Self {
            username: seed.username.clone(),
            email: seed.email.clone(),
            display_name: seed.display_name.clone(),
            role: seed.role,
        }
    }
}

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserError {
    #[error("Username must be 3-24 characters of a-z, 0-9 or underscore.")]
    InvalidUsername,

    #[error("Username already exists.")]
    UsernameTaken,

    #[error("Email already exists.")]
    EmailTaken,
}

/// Account storage.
pub trait UserStore: Send + Sync {
    fn create(&self, new_user: NewUser) -> Result<User, UserError>;
    fn find_by_id(&self, id: Uuid) -> Option<User>;
    /// Look up by username, or by username or email when the identifier contains `@`.
    fn find_by_identifier(&self, identifier: &str) -> Option<User>;
    fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Option<User>;
    /// Overwrite the profile's follower counts, which are admin-managed.
    fn set_social_counts(&self, id: Uuid, followers: u32, following: u32) -> Option<User>;
    /// All accounts ordered by username.
    fn list(&self) -> Vec<User>;
}

pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// Usernames are 3 to 24 characters of `[a-z0-9_]`.
pub fn is_valid_username(username: &str) -> bool {
    (3..=24).contains(&username.len())
        && username
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Process-local account table.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
    // Serializes creation so uniqueness checks and inserts cannot interleave.
    create_lock: std::sync::Mutex<()>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated from configuration seeds.
    pub fn seeded(seeds: &[UserSeed]) -> Result<Self, UserError> {
        let store = Self::new();
        for seed in seeds {
            store.create(NewUser::from(seed))?;
        }
        Ok(store)
    }
}

impl UserStore for MemoryUserStore {
    fn create(&self, new_user: NewUser) -> Result<User, UserError> {
        let username = normalize_identifier(&new_user.username);
        if !is_valid_username(&username) {
            return Err(UserError::InvalidUsername);
        }
        let email = new_user
            .email
            .map(|e| normalize_identifier(&e))
            .filter(|e| !e.is_empty());

        let _guard = self
            .create_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for existing in self.users.iter() {
            if existing.username == username {
                return Err(UserError::UsernameTaken);
            }
            if email.is_some() && existing.email == email {
                return Err(UserError::EmailTaken);
            }
        }

        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            display_name: new_user.display_name.trim().to_string(),
            bio: None,
            profile_image_url: None,
            role: new_user.role,
            followers: 0,
            following: 0,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn find_by_id(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|u| u.value().clone())
    }

    fn find_by_identifier(&self, identifier: &str) -> Option<User> {
        let normalized = normalize_identifier(identifier);
        let by_email = normalized.contains('@');
        self.users
            .iter()
            .find(|u| {
                u.username == normalized || (by_email && u.email.as_deref() == Some(normalized.as_str()))
            })
            .map(|u| u.value().clone())
    }

    fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Option<User> {
        let mut user = self.users.get_mut(&id)?;
        if let Some(display_name) = update.display_name {
            user.display_name = display_name;
        }
        if let Some(bio) = update.bio {
            user.bio = Some(bio).filter(|b| !b.is_empty());
        }
        if let Some(url) = update.profile_image_url {
            user.profile_image_url = Some(url);
        }
        Some(user.clone())
    }

    fn set_social_counts(&self, id: Uuid, followers: u32, following: u32) -> Option<User> {
        let mut user = self.users.get_mut(&id)?;
        user.followers = followers;
        user.following = following;
        Some(user.clone())
    }

    fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: Option<&str>) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.map(Into::into),
            display_name: format!("  {username}  "),
            role: UserRole::Member,
        }
    }

    #[test]
    fn test_username_rules() {
        assert!(is_valid_username("abc"));
        assert!(is_valid_username("user_01"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("Upper"));
        assert!(!is_valid_username("has-dash"));
        assert!(!is_valid_username(&"a".repeat(25)));
    }

    #[test]
    fn test_create_normalizes() {
        let store = MemoryUserStore::new();
        let user = store
            .create(new_user("  Alice ", Some(" Alice@Example.COM ")))
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert_eq!(user.display_name, "Alice");
    }

    #[test]
    fn test_duplicates_rejected() {
        let store = MemoryUserStore::new();
        store.create(new_user("alice", Some("a@example.com"))).unwrap();
        assert_eq!(
            store.create(new_user("ALICE", None)),
            Err(UserError::UsernameTaken)
        );
        assert_eq!(
            store.create(new_user("bob", Some("A@example.com"))),
            Err(UserError::EmailTaken)
        );
        assert!(store.create(new_user("carol", None)).is_ok());
        assert!(store.create(new_user("dave", None)).is_ok());
    }

    #[test]
    fn test_find_by_identifier() {
        let store = MemoryUserStore::new();
        let alice = store.create(new_user("alice", Some("a@example.com"))).unwrap();

        assert_eq!(store.find_by_identifier(" ALICE ").map(|u| u.id), Some(alice.id));
        assert_eq!(store.find_by_identifier("a@example.com").map(|u| u.id), Some(alice.id));
        // Email lookup only applies to identifiers containing '@'.
        assert!(store.find_by_identifier("nobody").is_none());
    }

    #[test]
    fn test_update_profile() {
        let store = MemoryUserStore::new();
        let alice = store.create(new_user("alice", None)).unwrap();

        let updated = store
            .update_profile(
                alice.id,
                ProfileUpdate {
                    bio: Some("hi".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("hi"));
        assert_eq!(updated.display_name, "alice");
        assert!(store.update_profile(Uuid::new_v4(), ProfileUpdate::default()).is_none());
    }

    #[test]
    fn test_set_social_counts() {
        let store = MemoryUserStore::new();
        let alice = store.create(new_user("alice", None)).unwrap();
        assert_eq!((alice.followers, alice.following), (0, 0));

        let updated = store.set_social_counts(alice.id, 1_200, 35).unwrap();
        assert_eq!((updated.followers, updated.following), (1_200, 35));
        assert_eq!(store.find_by_id(alice.id).unwrap().followers, 1_200);
        assert!(store.set_social_counts(Uuid::new_v4(), 1, 1).is_none());
    }

    #[test]
    fn test_seed_and_list_sorted() {
        let seeds = vec![
            UserSeed {
                username: "zed".into(),
                email: None,
                display_name: "Zed".into(),
                role: UserRole::Admin,
            },
            UserSeed {
                username: "amy".into(),
                email: None,
                display_name: "Amy".into(),
                role: UserRole::Member,
            },
        ];
        let store = MemoryUserStore::seeded(&seeds).unwrap();
        let names: Vec<_> = store.list().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["amy", "zed"]);
        assert!(store.find_by_identifier("zed").unwrap().is_admin());
    }
}
