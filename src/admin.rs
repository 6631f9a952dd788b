//! Admin gate: who may change content and read appeals.

use std::collections::BTreeSet;
use std::sync::RwLock;

use teloxide::types::UserId;
use tracing::info;

use crate::errors::StoreError;
use crate::store::ContentStore;

/// Primary admins from configuration plus admins promoted at runtime
///
/// Primary admins are always trusted and can never be removed, so the set is
/// never empty. Promotions are persisted through the content store before
/// they take effect in memory.
#[derive(Debug)]
pub struct AdminRegistry {
    primary: BTreeSet<UserId>,
    promoted: RwLock<BTreeSet<UserId>>,
}

impl AdminRegistry {
    /// Create a registry; `primary` must contain at least one id
    pub fn new(primary: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            primary: primary.into_iter().collect(),
            promoted: RwLock::new(BTreeSet::new()),
        }
    }

    /// Create a registry and load promoted ids from the store
    pub async fn load<S: ContentStore>(
        primary: impl IntoIterator<Item = UserId>,
        store: &S,
    ) -> Result<Self, StoreError> {
        let primary: BTreeSet<UserId> = primary.into_iter().collect();
        let promoted = store.admins().await?;
        info!(
            primary = primary.len(),
            promoted = promoted.len(),
            "Loaded admin list"
        );
        Ok(Self {
            primary,
            promoted: RwLock::new(promoted),
        })
    }

    /// Membership test, side-effect free
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.primary.contains(&user_id)
            || self
                .promoted
                .read()
                .map(|promoted| promoted.contains(&user_id))
                .unwrap_or(false)
    }

    /// Persist and grant admin rights; returns `false` if already an admin
    pub async fn promote<S: ContentStore>(
        &self,
        store: &S,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        if self.is_admin(user_id) {
            return Ok(false);
        }
        store.add_admin(user_id).await?;
        let mut promoted = self
            .promoted
            .write()
            .map_err(|_| StoreError::Io("admin list lock poisoned".to_string()))?;
        Ok(promoted.insert(user_id))
    }

    /// All admin ids, primary first
    pub fn list(&self) -> Vec<UserId> {
        let mut all: Vec<UserId> = self.primary.iter().copied().collect();
        if let Ok(promoted) = self.promoted.read() {
            all.extend(promoted.iter().filter(|id| !self.primary.contains(id)));
        }
        all
    }

    pub fn is_primary(&self, user_id: UserId) -> bool {
        self.primary.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;

    #[test]
    fn test_primary_admins_are_trusted() {
        let admins = AdminRegistry::new([UserId(1), UserId(2)]);
        assert!(admins.is_admin(UserId(1)));
        assert!(admins.is_admin(UserId(2)));
        assert!(!admins.is_admin(UserId(3)));
        assert_eq!(admins.list(), vec![UserId(1), UserId(2)]);
        assert!(admins.is_primary(UserId(1)));
    }

    #[tokio::test]
    async fn test_load_restores_promoted_admins() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store.add_admin(UserId(7)).await.unwrap();
        store.add_admin(UserId(1)).await.unwrap();

        let admins = AdminRegistry::load([UserId(1)], &store).await.unwrap();
        assert!(admins.is_admin(UserId(7)));
        assert!(!admins.is_primary(UserId(7)));
        assert_eq!(admins.list(), vec![UserId(1), UserId(7)]);
    }
}
