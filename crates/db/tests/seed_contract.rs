use std::collections::HashSet;

use purchasing_db::repositories::{SqlUserRepository, UserRepository};
use purchasing_db::{connect_with_settings, migrations, SeedDataset};
use serde::Deserialize;

type SeedContractTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

#[derive(Debug, Deserialize)]
struct RoleContract {
    name: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct UserContract {
    email: String,
    full_name: String,
    role: String,
    can_decide: bool,
}

#[derive(Debug, Deserialize)]
struct SeedContract {
    dataset_version: String,
    roles: Vec<RoleContract>,
    users: Vec<UserContract>,
}

fn contract() -> SeedContractTestResult<SeedContract> {
    serde_json::from_str(include_str!("../../../config/fixtures/seed_contract.json"))
        .map_err(|error| format!("seed contract JSON must parse: {error}"))
}

#[test]
fn seed_contract_matches_seed_constants() -> SeedContractTestResult {
    let contract = contract()?;
    require_eq!(contract.dataset_version, "purchasing-seed-1");

    let role_names: HashSet<&str> = contract.roles.iter().map(|role| role.name.as_str()).collect();
    let seeded_roles: HashSet<&str> = SeedDataset::role_names().collect();
    require_eq!(role_names, seeded_roles);

    let emails: HashSet<&str> = contract.users.iter().map(|user| user.email.as_str()).collect();
    let seeded_emails: HashSet<&str> = SeedDataset::user_emails().collect();
    require_eq!(emails, seeded_emails);

    for role in &contract.roles {
        require!(!role.description.is_empty(), "role {} needs a description", role.name);
    }
    for user in &contract.users {
        require!(!user.full_name.is_empty(), "user {} needs a full name", user.email);
        require!(
            role_names.contains(user.role.as_str()),
            "user {} references unknown role {}",
            user.email,
            user.role
        );
    }
    Ok(())
}

#[tokio::test]
async fn loaded_seed_matches_contract() -> SeedContractTestResult {
    let contract = contract()?;
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate: {error}"))?;
    SeedDataset::load(&pool).await.map_err(|error| format!("seed: {error}"))?;

    let users = SqlUserRepository::new(pool);
    for expected in &contract.users {
        let user = users
            .find_by_email(&expected.email)
            .await
            .map_err(|error| error.to_string())?
            .ok_or_else(|| format!("seeded user {} is missing", expected.email))?;
        require_eq!(user.full_name, expected.full_name);

        let actor = users
            .resolve_actor(user.id)
            .await
            .map_err(|error| error.to_string())?
            .ok_or_else(|| format!("seeded user {} should be active", expected.email))?;
        require!(
            actor.roles.contains(&expected.role),
            "user {} should hold role {}",
            expected.email,
            expected.role
        );
        require_eq!(actor.is_supervisor(), expected.can_decide);
    }
    Ok(())
}
