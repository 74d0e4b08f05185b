use playur_core::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockUser {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: String,
}

/// An archive the server accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedBuild {
    pub descriptor: BuildDescriptor,
    pub file_name: String,
    pub bytes: usize,
    pub sha256: String,
}

/// Everything the server knows about the one game it hosts.
#[derive(Debug, Clone, Default)]
pub struct MockGame {
    pub game_id: i64,
    pub client_secret: String,

    pub actions: Vec<RemoteRecord>,
    pub elements: Vec<RemoteRecord>,
    pub experiments: Vec<RemoteRecord>,
    pub experiment_groups: Vec<GroupRecord>,
    pub analytics_columns: Vec<RemoteRecord>,
    pub parameter_keys: Vec<String>,

    /// Latest build number per branch.
    pub builds: BTreeMap<String, i64>,
    pub uploads: Vec<UploadedBuild>,
    /// When set, every upload is refused with this message.
    pub upload_rejection: Option<String>,

    pub users: Vec<MockUser>,
}

fn record(name: &str, id: i64) -> RemoteRecord {
    RemoteRecord {
        name: name.to_string(),
        id,
    }
}

impl MockGame {
    pub fn new(game_id: i64, client_secret: impl Into<String>) -> Self {
        Self {
            game_id,
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    /// A small game with a bit of everything, including names that need
    /// sanitizing.
    pub fn sample() -> Self {
        let mut game = Self::new(1, "secret");
        game.actions = vec![record("Jump", 1), record("Collect Coin", 2), record("2x Bonus", 3)];
        game.elements = vec![record("Player", 1), record("Enemy-Spawner", 2)];
        game.experiments = vec![record("Pilot Study", 1), record("Main", 2)];
        game.experiment_groups = vec![
            GroupRecord {
                experiment: "Pilot Study".into(),
                name: "Control".into(),
                id: 1,
            },
            GroupRecord {
                experiment: "Pilot Study".into(),
                name: "Fast Mode".into(),
                id: 2,
            },
        ];
        game.analytics_columns = vec![record("Score", 1), record("Time Taken", 2)];
        game.parameter_keys = vec!["speed".into(), "levels[]".into()];
        game.builds.insert("main".into(), 5);
        game.users.push(MockUser {
            id: 1,
            username: "alice".into(),
            password: "pw1".into(),
            email: "alice@example.org".into(),
        });
        game
    }

    pub fn authorize(&self, game_id: Option<&str>, client_secret: Option<&str>) -> bool {
        let id_matches = game_id
            .and_then(|id| id.trim().parse::<i64>().ok())
            .is_some_and(|id| id == self.game_id);
        id_matches && client_secret == Some(self.client_secret.as_str())
    }

    /// `None` when the branch (or, without a branch, the game) has no builds.
    pub fn latest_build(&self, branch: Option<&str>) -> Option<i64> {
        match branch {
            Some(branch) => self.builds.get(branch).copied(),
            None => self.builds.values().copied().max(),
        }
    }

    pub fn record_upload(&mut self, upload: UploadedBuild) {
        let latest = self
            .builds
            .entry(upload.descriptor.branch.clone())
            .or_insert(0);
        *latest = (*latest).max(upload.descriptor.build_id);
        self.uploads.push(upload);
    }

    pub fn find_user(&self, username: &str, password: &str) -> Option<&MockUser> {
        self.users
            .iter()
            .find(|u| u.username == username && u.password == password)
    }

    pub fn add_user(
        &mut self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<&MockUser, String> {
        if self.users.iter().any(|u| u.username == username) {
            return Err("Username already taken".into());
        }
        let id = self.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        self.users.push(MockUser {
            id,
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
        });
        Ok(&self.users[self.users.len() - 1])
    }
}

/// Shared handle to the game served by a router.
#[derive(Clone, Default)]
pub struct MockState {
    game: Arc<Mutex<MockGame>>,
}

impl MockState {
    pub fn new(game: MockGame) -> Self {
        Self {
            game: Arc::new(Mutex::new(game)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockGame) -> R) -> R {
        let mut game = self.game.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut game)
    }

    pub fn snapshot(&self) -> MockGame {
        self.with(|game| game.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(branch: &str, build_id: i64) -> UploadedBuild {
        UploadedBuild {
            descriptor: BuildDescriptor {
                game_id: 1,
                client_secret: "secret".into(),
                build_id,
                branch: branch.into(),
            },
            file_name: "index.zip".into(),
            bytes: 10,
            sha256: "00".into(),
        }
    }

    #[test]
    fn uploads_advance_their_branch_only() {
        let mut game = MockGame::sample();
        game.record_upload(upload("main", 6));
        game.record_upload(upload("beta", 1));

        assert_eq!(game.latest_build(Some("main")), Some(6));
        assert_eq!(game.latest_build(Some("beta")), Some(1));
        assert_eq!(game.latest_build(Some("nightly")), None);
        assert_eq!(game.latest_build(None), Some(6));
    }

    #[test]
    fn older_upload_does_not_rewind_latest() {
        let mut game = MockGame::sample();
        game.record_upload(upload("main", 3));
        assert_eq!(game.latest_build(Some("main")), Some(5));
        assert_eq!(game.uploads.len(), 1);
    }

    #[test]
    fn authorization_needs_both_values() {
        let game = MockGame::sample();
        assert!(game.authorize(Some("1"), Some("secret")));
        assert!(!game.authorize(Some("1"), Some("nope")));
        assert!(!game.authorize(Some("2"), Some("secret")));
        assert!(!game.authorize(None, Some("secret")));
    }

    #[test]
    fn duplicate_usernames_are_refused() {
        let mut game = MockGame::sample();
        assert_eq!(game.add_user("bob", "pw", "b@x.org").unwrap().id, 2);
        assert!(game.add_user("alice", "other", "a@x.org").is_err());
    }
}
