//! Idempotent bootstrap seeding, run once at startup after migrations.
//!
//! Every check keys on occupancy (empty roles table, no user holding a role),
//! never on specific email values, so reseeding after a partial failure fills
//! in what is missing without duplicating what is already there.

use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;

use crate::auth::password::hash_password;
use crate::users::repo::NewUser;
use crate::users::repo_types::{Role, RoleCode, User};

const MANAGER_FIXTURES: [(&str, &str, &str, &str); 3] = [
    ("manager1@portal.local", "0033326585", "Nhan", "Nguyen"),
    ("manager2@portal.local", "0033326586", "Tu", "Le"),
    ("manager3@portal.local", "0033326587", "Tuan", "Ha"),
];

const ROOT_FIXTURE: (&str, &str, &str, &str) = ("root@portal.local", "0333326585", "Tuan", "Nguyen");

/// Bootstrap accounts carry a real credential, so the password is a required
/// secret: no fallback, startup aborts without it. Only read when seeding
/// actually has accounts to create.
fn seed_password() -> anyhow::Result<String> {
    validate_seed_password(std::env::var("SEED_PASSWORD").ok())
}

fn validate_seed_password(value: Option<String>) -> anyhow::Result<String> {
    let password =
        value.ok_or_else(|| anyhow::anyhow!("SEED_PASSWORD must be set to seed bootstrap accounts"))?;
    if password.len() < 8 {
        anyhow::bail!("SEED_PASSWORD must be at least 8 characters");
    }
    Ok(password)
}

pub async fn run(db: &PgPool) -> anyhow::Result<()> {
    seed_roles(db).await?;
    seed_root_user(db).await?;
    seed_manager_users(db).await?;
    Ok(())
}

/// Populate the three fixed roles iff the registry is empty, then confirm all
/// three codes are present: user inserts resolve role ids by code, so a
/// partial registry must abort before any account is created.
async fn seed_roles(db: &PgPool) -> anyhow::Result<()> {
    if Role::count(db).await? == 0 {
        info!("no roles detected, seeding");

        sqlx::query(
            r#"
            INSERT INTO roles (name, code)
            VALUES ($1, $2), ($3, $4), ($5, $6)
            "#,
        )
        .bind(RoleCode::Admin.display_name())
        .bind(RoleCode::Admin.as_str())
        .bind(RoleCode::Manager.display_name())
        .bind(RoleCode::Manager.as_str())
        .bind(RoleCode::Envoy.display_name())
        .bind(RoleCode::Envoy.as_str())
        .execute(db)
        .await?;
    }

    let present = Role::all(db).await?;
    for code in [RoleCode::Admin, RoleCode::Manager, RoleCode::Envoy] {
        if !present.iter().any(|role| role.code == code.as_str()) {
            anyhow::bail!("role registry incomplete after seeding: missing {code}");
        }
    }
    Ok(())
}

/// Ensure exactly one user holds the admin role.
async fn seed_root_user(db: &PgPool) -> anyhow::Result<()> {
    if User::count_with_role(db, RoleCode::Admin).await? > 0 {
        return Ok(());
    }
    info!("no root user detected, seeding");

    let (email, phone, first, last) = ROOT_FIXTURE;
    User::create(
        db,
        NewUser {
            email: email.into(),
            phone_number: phone.into(),
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            password_hash: Some(hash_password(&seed_password()?)?),
            activated: true,
            role: Some(RoleCode::Admin),
            ..NewUser::default()
        },
    )
    .await?;
    Ok(())
}

/// Ensure the fixed set of manager accounts exists, keyed on manager-role
/// occupancy rather than on the fixture emails.
async fn seed_manager_users(db: &PgPool) -> anyhow::Result<()> {
    if User::count_with_role(db, RoleCode::Manager).await? > 0 {
        return Ok(());
    }
    info!("no manager users detected, seeding");

    let password_hash = hash_password(&seed_password()?)?;
    for (email, phone, first, last) in MANAGER_FIXTURES {
        User::create(
            db,
            NewUser {
                email: email.into(),
                phone_number: phone.into(),
                first_name: Some(first.into()),
                last_name: Some(last.into()),
                password_hash: Some(password_hash.clone()),
                activated: true,
                verified_at: Some(OffsetDateTime::now_utc()),
                role: Some(RoleCode::Manager),
                ..NewUser::default()
            },
        )
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fixture_accounts_do_not_collide() {
        let mut emails = HashSet::new();
        let mut phones = HashSet::new();
        for (email, phone, _, _) in MANAGER_FIXTURES.iter().chain([&ROOT_FIXTURE]) {
            assert!(emails.insert(*email), "duplicate fixture email: {email}");
            assert!(phones.insert(*phone), "duplicate fixture phone: {phone}");
        }
    }

    #[test]
    fn seed_password_is_required() {
        let err = validate_seed_password(None).unwrap_err();
        assert!(err.to_string().contains("SEED_PASSWORD must be set"));
    }

    #[test]
    fn seed_password_rejects_short_values() {
        assert!(validate_seed_password(Some("123456".into())).is_err());
        assert!(validate_seed_password(Some("long-enough-secret".into())).is_ok());
    }

    #[tokio::test]
    #[ignore = "needs a live PostgreSQL; set DATABASE_URL and SEED_PASSWORD, run with --ignored"]
    async fn seeding_twice_yields_three_roles_one_root_three_managers() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let db = PgPool::connect(&url).await.expect("connect");
        sqlx::migrate!("./migrations").run(&db).await.expect("migrate");

        run(&db).await.expect("first seed");
        run(&db).await.expect("second seed");

        assert_eq!(Role::count(&db).await.unwrap(), 3);
        assert_eq!(User::count_with_role(&db, RoleCode::Admin).await.unwrap(), 1);
        assert_eq!(
            User::count_with_role(&db, RoleCode::Manager).await.unwrap(),
            3
        );
    }
}
