use purchasing_core::domain::user::NewUser;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlUserRepository, UserRepository};

/// Baseline roles every deployment needs.
const SEED_ROLES: &[SeedRole] = &[
    SeedRole { name: "admin", description: "System administrator" },
    SeedRole { name: "supervisor", description: "Approves or rejects purchase requests" },
    SeedRole { name: "user", description: "Submits purchase requests" },
];

/// One account per baseline role.
const SEED_USERS: &[SeedUser] = &[
    SeedUser { email: "admin@example.com", full_name: "Administrator", role: "admin" },
    SeedUser { email: "supervisor@example.com", full_name: "Supervisor", role: "supervisor" },
    SeedUser { email: "user@example.com", full_name: "Regular User", role: "user" },
];

struct SeedRole {
    name: &'static str,
    description: &'static str,
}

struct SeedUser {
    email: &'static str,
    full_name: &'static str,
    role: &'static str,
}

/// Initial roles and accounts. Loading is idempotent: existing rows are kept
/// and only missing ones are created.
pub struct SeedDataset;

impl SeedDataset {
    pub fn role_names() -> impl Iterator<Item = &'static str> {
        SEED_ROLES.iter().map(|role| role.name)
    }

    pub fn user_emails() -> impl Iterator<Item = &'static str> {
        SEED_USERS.iter().map(|user| user.email)
    }

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let users = SqlUserRepository::new(pool.clone());
        let mut roles_created = Vec::new();
        let mut users_created = Vec::new();

        for seed in SEED_ROLES {
            if users.find_role_by_name(seed.name).await?.is_none() {
                users.create_role(seed.name, Some(seed.description)).await?;
                roles_created.push(seed.name);
            }
        }

        for seed in SEED_USERS {
            let user = match users.find_by_email(seed.email).await? {
                Some(user) => user,
                None => {
                    users_created.push(seed.email);
                    users
                        .create_user(NewUser {
                            email: seed.email.to_string(),
                            full_name: seed.full_name.to_string(),
                        })
                        .await?
                }
            };
            let role = users.find_role_by_name(seed.role).await?.ok_or_else(|| {
                RepositoryError::Decode(format!("seed role `{}` is missing", seed.role))
            })?;
            users.attach_role(user.id, role.id).await?;
        }

        Ok(SeedResult { roles_created, users_created })
    }

    /// Verify that every seeded role and account exists with its role attached.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let users = SqlUserRepository::new(pool.clone());
        let mut checks = Vec::new();

        for seed in SEED_ROLES {
            checks.push((seed.name, users.find_role_by_name(seed.name).await?.is_some()));
        }

        for seed in SEED_USERS {
            let has_role = match users.find_by_email(seed.email).await? {
                Some(user) => users
                    .roles_for(user.id)
                    .await?
                    .iter()
                    .any(|role| role.name == seed.role),
                None => false,
            };
            checks.push((seed.email, has_role));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub roles_created: Vec<&'static str>,
    pub users_created: Vec<&'static str>,
}

impl SeedResult {
    pub fn is_noop(&self) -> bool {
        self.roles_created.is_empty() && self.users_created.is_empty()
    }
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
