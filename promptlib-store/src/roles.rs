//! Persistent role store.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use promptlib_primitives::{Role, RoleDraft, RoleId, name_key};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::defaults::default_roles;
use crate::exchange::ImportCount;
use crate::record::RecordRef;
use crate::storage::StateStorage;
use crate::{StoreError, StoreResult};

/// Storage key of the role document.
pub const ROLES_KEY: &str = "prompt-library-roles";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleDocument {
    #[serde(default)]
    roles: Vec<Role>,
    #[serde(default)]
    user_roles: Vec<Role>,
}

impl RoleDocument {
    fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter().chain(self.user_roles.iter())
    }

    fn locate(&self, id: &RoleId) -> Option<RecordRef<usize>> {
        if let Some(idx) = self.roles.iter().position(|r| &r.id == id) {
            return Some(RecordRef::Builtin(idx));
        }
        self.user_roles
            .iter()
            .position(|r| &r.id == id)
            .map(RecordRef::User)
    }

    fn ensure_unique_name(&self, name: &str, except: Option<&RoleId>) -> StoreResult<()> {
        let key = name_key(name);
        let taken = self
            .iter()
            .any(|r| Some(&r.id) != except && r.name_key() == key);
        if taken {
            return Err(StoreError::DuplicateRoleName {
                name: name.to_owned(),
            });
        }
        Ok(())
    }
}

pub(crate) fn by_name(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Store owning the built-in and user role collections.
///
/// Every mutation rewrites the `prompt-library-roles` document; the in-memory
/// state only changes once the write succeeded.
pub struct RoleStore {
    storage: Arc<dyn StateStorage>,
    state: RwLock<RoleDocument>,
}

impl RoleStore {
    /// Loads the role document, seeding the packaged roles when absent.
    ///
    /// # Errors
    ///
    /// Propagates storage and serialization errors.
    pub async fn open(storage: Arc<dyn StateStorage>) -> StoreResult<Self> {
        let document = match storage.load(ROLES_KEY).await? {
            Some(raw) => {
                let mut document: RoleDocument = serde_json::from_str(&raw)?;
                for role in &mut document.roles {
                    role.is_default = true;
                }
                for role in &mut document.user_roles {
                    role.is_default = false;
                }
                document
            }
            None => {
                let document = RoleDocument {
                    roles: default_roles()?,
                    user_roles: Vec::new(),
                };
                storage
                    .save(ROLES_KEY, &serde_json::to_string(&document)?)
                    .await?;
                info!(count = document.roles.len(), "seeded built-in roles");
                document
            }
        };

        Ok(Self {
            storage,
            state: RwLock::new(document),
        })
    }

    async fn commit(&self, document: &RoleDocument) -> StoreResult<()> {
        let raw = serde_json::to_string(document)?;
        self.storage.save(ROLES_KEY, &raw).await
    }

    /// Returns every role, built-in and user, sorted by name.
    pub async fn list_all(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.state.read().await.iter().cloned().collect();
        roles.sort_by(|a, b| by_name(&a.name, &b.name));
        roles
    }

    /// Returns the role with the given id.
    pub async fn get(&self, id: &RoleId) -> Option<Role> {
        self.state.read().await.iter().find(|r| &r.id == id).cloned()
    }

    /// Reports which collection holds the role.
    pub async fn locate(&self, id: &RoleId) -> Option<RecordRef<RoleId>> {
        self.state.read().await.locate(id).map(|loc| match loc {
            RecordRef::Builtin(_) => RecordRef::Builtin(id.clone()),
            RecordRef::User(_) => RecordRef::User(id.clone()),
        })
    }

    /// Adds a user role.
    ///
    /// # Errors
    ///
    /// Fails on a blank name, a name already used by any role, a duplicate
    /// explicit id, or a storage error.
    pub async fn add(&self, draft: RoleDraft) -> StoreResult<Role> {
        let (name, description) = draft.normalized()?;
        let mut state = self.state.write().await;
        state.ensure_unique_name(&name, None)?;

        let id = match draft.id {
            Some(id) if !id.is_blank() => {
                if state.locate(&id).is_some() {
                    return Err(StoreError::DuplicateId {
                        kind: "role",
                        id: id.to_string(),
                    });
                }
                id
            }
            _ => RoleId::generate(),
        };

        let now = Utc::now();
        let role = Role {
            id,
            name,
            description,
            is_default: false,
            created_at: now,
            updated_at: now,
        };

        let mut next = state.clone();
        next.user_roles.push(role.clone());
        self.commit(&next).await?;
        *state = next;
        info!(role_id = %role.id, name = %role.name, "role added");
        Ok(role)
    }

    /// Updates the name and description of a role.
    ///
    /// Built-in roles are edited in place within the built-in collection.
    ///
    /// # Errors
    ///
    /// Fails when the role is unknown, the name is blank or taken by another
    /// role, or the write fails.
    pub async fn update(&self, id: &RoleId, draft: RoleDraft) -> StoreResult<Role> {
        let (name, description) = draft.normalized()?;
        let mut state = self.state.write().await;
        let location = state
            .locate(id)
            .ok_or_else(|| StoreError::not_found("role", id))?;
        state.ensure_unique_name(&name, Some(id))?;

        let mut next = state.clone();
        let slot = match location {
            RecordRef::Builtin(idx) => &mut next.roles[idx],
            RecordRef::User(idx) => &mut next.user_roles[idx],
        };
        slot.name = name;
        slot.description = description;
        slot.updated_at = Utc::now();
        let updated = slot.clone();

        self.commit(&next).await?;
        *state = next;
        info!(role_id = %id, builtin = updated.is_default, "role updated");
        Ok(updated)
    }

    /// Deletes a user role and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BuiltinRole`] for built-in roles,
    /// [`StoreError::NotFound`] for unknown ids, or a storage error.
    pub async fn delete(&self, id: &RoleId) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        let idx = match state.locate(id) {
            Some(RecordRef::User(idx)) => idx,
            Some(RecordRef::Builtin(_)) => {
                return Err(StoreError::BuiltinRole { id: id.to_string() });
            }
            None => return Err(StoreError::not_found("role", id)),
        };

        let mut next = state.clone();
        let removed = next.user_roles.remove(idx);
        self.commit(&next).await?;
        *state = next;
        info!(role_id = %id, "role deleted");
        Ok(removed)
    }

    /// Puts a previously deleted user role back, keeping its id and timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] when the id is taken again,
    /// a name collision error, or a storage error.
    pub async fn restore(&self, mut role: Role) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        if state.locate(&role.id).is_some() {
            return Err(StoreError::DuplicateId {
                kind: "role",
                id: role.id.to_string(),
            });
        }
        state.ensure_unique_name(&role.name, None)?;

        let mut next = state.clone();
        role.is_default = false;
        next.user_roles.push(role.clone());
        next.user_roles.sort_by(|a, b| by_name(&a.name, &b.name));
        self.commit(&next).await?;
        *state = next;
        info!(role_id = %role.id, "role restored");
        Ok(role)
    }

    /// Imports roles into the user collection.
    ///
    /// Blank ids are replaced with generated ones. Roles whose id already
    /// exists, or whose name collides with an existing role, are skipped.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn import(&self, roles: Vec<Role>) -> StoreResult<ImportCount> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let mut count = ImportCount::default();
        let now = Utc::now();

        for mut role in roles {
            if role.id.is_blank() {
                role.id = RoleId::generate();
            }
            let name = role.name.trim().to_owned();
            if name.is_empty()
                || next.locate(&role.id).is_some()
                || next.ensure_unique_name(&name, None).is_err()
            {
                debug!(role_id = %role.id, "skipping imported role");
                count.skipped += 1;
                continue;
            }
            role.name = name;
            role.description = role.description.trim().to_owned();
            role.is_default = false;
            role.updated_at = now;
            next.user_roles.push(role);
            count.added += 1;
        }

        if count.added > 0 {
            next.user_roles.sort_by(|a, b| by_name(&a.name, &b.name));
            self.commit(&next).await?;
            *state = next;
        }
        info!(added = count.added, skipped = count.skipped, "roles imported");
        Ok(count)
    }

    /// Returns every role for export, sorted by name.
    pub async fn export(&self) -> Vec<Role> {
        self.list_all().await
    }

    /// Restores the built-in collection from the packaged defaults.
    ///
    /// User roles are untouched.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn reset_defaults(&self) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let defaults = default_roles()?;
        let mut next = state.clone();
        next.user_roles
            .retain(|user| !defaults.iter().any(|builtin| builtin.id == user.id));
        next.roles = defaults;
        self.commit(&next).await?;
        *state = next;
        info!("built-in roles reset");
        Ok(())
    }
}
