use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::users::repo_types::{Role, RoleCode, User, UserRow};

/// Opaque login identifier. Generated once at creation; an administrator may
/// rotate it later to kill every session issued against the old value.
pub fn gen_alternative_id() -> String {
    Uuid::new_v4().simple().to_string()
}

const USER_SELECT: &str = r#"
    SELECT u.id, u.alternative_id, u.email, u.phone_number, u.first_name,
           u.last_name, u.password_hash, u.avatar_url, u.activated,
           u.created_at, u.verified_at, r.code AS role_code
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

fn decode(row: UserRow) -> Result<User, AppError> {
    User::try_from(row).map_err(AppError::Internal)
}

/// The unique business fields a caller may probe before attempting an insert.
/// Each query answers for its own field only; the closed enum keeps the column
/// list out of caller hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    PhoneNumber,
    Address,
    CitizenId,
    OrganizationName,
    OrganizationRepresenterName,
    OrganizationTaxId,
    OrganizationEmail,
}

impl UniqueField {
    /// Column name, also the field name reported in validation errors.
    pub fn column(&self) -> &'static str {
        match self {
            UniqueField::Email => "email",
            UniqueField::PhoneNumber => "phone_number",
            UniqueField::Address => "address",
            UniqueField::CitizenId => "citizen_id",
            UniqueField::OrganizationName => "organization_name",
            UniqueField::OrganizationRepresenterName => "organization_representer_name",
            UniqueField::OrganizationTaxId => "organization_tax_id",
            UniqueField::OrganizationEmail => "organization_email",
        }
    }
}

/// Fields accepted when inserting a new user. The password arrives already
/// hashed; this module never sees plaintext.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub phone_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    pub activated: bool,
    pub verified_at: Option<OffsetDateTime>,
    pub role: Option<RoleCode>,
    pub address: Option<String>,
    pub citizen_id: Option<String>,
    pub organization_name: Option<String>,
    pub organization_representer_name: Option<String>,
    pub organization_tax_id: Option<String>,
    pub organization_email: Option<String>,
}

impl User {
    /// Look a user up by the session's login identifier. This is the only
    /// lookup the identity path uses; it never resolves by numeric id, which
    /// is what makes identifier rotation invalidate old sessions.
    pub async fn find_by_alternative_id(
        db: &PgPool,
        alternative_id: &str,
    ) -> Result<Option<User>, AppError> {
        let sql = format!("{USER_SELECT} WHERE u.alternative_id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(alternative_id)
            .fetch_optional(db)
            .await?;
        row.map(decode).transpose()
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("{USER_SELECT} WHERE u.email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?;
        row.map(decode).transpose()
    }

    async fn find_by_id(db: &PgPool, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("{USER_SELECT} WHERE u.id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?;
        row.map(decode).transpose()
    }

    /// True iff some user already holds `value` in the given unique field.
    /// A UX convenience only: the unique index is what actually enforces the
    /// invariant when two registrations race.
    pub async fn exists(
        db: &PgPool,
        field: UniqueField,
        value: &str,
    ) -> Result<bool, AppError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM users WHERE {} = $1)",
            field.column()
        );
        let (exists,): (bool,) = sqlx::query_as(&sql).bind(value).fetch_one(db).await?;
        Ok(exists)
    }

    /// Insert a new user. A racing duplicate surfaces as `AlreadyExists` via
    /// the unique-index translation in `AppError`, never as a raw storage
    /// error. Role defaults to envoy, the lowest privilege.
    pub async fn create(db: &PgPool, new_user: NewUser) -> Result<User, AppError> {
        let role = new_user.role.unwrap_or(RoleCode::Envoy);
        let alternative_id = gen_alternative_id();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (alternative_id, email, phone_number, first_name,
                               last_name, password_hash, avatar_url, activated,
                               verified_at, role_id, address, citizen_id,
                               organization_name, organization_representer_name,
                               organization_tax_id, organization_email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                    (SELECT id FROM roles WHERE code = $10),
                    $11, $12, $13, $14, $15, $16)
            RETURNING id
            "#,
        )
        .bind(&alternative_id)
        .bind(&new_user.email)
        .bind(&new_user.phone_number)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.password_hash)
        .bind(&new_user.avatar_url)
        .bind(new_user.activated)
        .bind(new_user.verified_at)
        .bind(role.as_str())
        .bind(&new_user.address)
        .bind(&new_user.citizen_id)
        .bind(&new_user.organization_name)
        .bind(&new_user.organization_representer_name)
        .bind(&new_user.organization_tax_id)
        .bind(&new_user.organization_email)
        .fetch_one(db)
        .await?;

        User::find_by_id(db, id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("inserted user vanished")))
    }

    pub async fn list(db: &PgPool, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let sql = format!("{USER_SELECT} ORDER BY u.created_at DESC LIMIT $1 OFFSET $2");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await?;
        rows.into_iter().map(decode).collect()
    }

    /// Replace the login identifier, addressed by its current value (the
    /// numeric id stays server-side). Every session carrying the old value
    /// resolves to no user on its next request. Returns the fresh identifier,
    /// or None when no such user exists.
    pub async fn rotate_alternative_id(
        db: &PgPool,
        alternative_id: &str,
    ) -> Result<Option<String>, AppError> {
        let fresh = gen_alternative_id();
        let row: Option<(String,)> = sqlx::query_as(
            "UPDATE users SET alternative_id = $2 WHERE alternative_id = $1 RETURNING alternative_id",
        )
        .bind(alternative_id)
        .bind(&fresh)
        .fetch_optional(db)
        .await?;
        Ok(row.map(|(alternative_id,)| alternative_id))
    }

    /// Flip the activation gate. Activating for the first time also stamps
    /// `verified_at`. Returns false when no such user exists.
    pub async fn set_activated(
        db: &PgPool,
        alternative_id: &str,
        activated: bool,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET activated = $2,
                verified_at = CASE
                    WHEN $2 AND verified_at IS NULL THEN now()
                    ELSE verified_at
                END
            WHERE alternative_id = $1
            "#,
        )
        .bind(alternative_id)
        .bind(activated)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count of users holding the given role. Seeding keys on occupancy, not
    /// on specific emails, so a partial seed does not duplicate accounts.
    pub async fn count_with_role(db: &PgPool, role: RoleCode) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE r.code = $1
            "#,
        )
        .bind(role.as_str())
        .fetch_one(db)
        .await?;
        Ok(count)
    }
}

impl Role {
    pub async fn count(db: &PgPool) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM roles")
            .fetch_one(db)
            .await?;
        Ok(count)
    }

    pub async fn all(db: &PgPool) -> Result<Vec<Role>, AppError> {
        let roles = sqlx::query_as::<_, Role>("SELECT id, name, code FROM roles ORDER BY id")
            .fetch_all(db)
            .await?;
        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connect() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let db = PgPool::connect(&url).await.expect("connect");
        sqlx::migrate!("./migrations").run(&db).await.expect("migrate");
        crate::seed::run(&db).await.expect("seed");
        db
    }

    fn new_user(email: &str, phone: &str) -> NewUser {
        NewUser {
            email: email.into(),
            phone_number: phone.into(),
            ..NewUser::default()
        }
    }

    #[tokio::test]
    #[ignore = "needs a live PostgreSQL; set DATABASE_URL and SEED_PASSWORD, run with --ignored"]
    async fn racing_duplicate_emails_leave_exactly_one_row() {
        let db = connect().await;
        let tag = gen_alternative_id();
        let email = format!("race-{tag}@example.com");

        let (a, b) = tokio::join!(
            User::create(&db, new_user(&email, &format!("07{}", &tag[..8]))),
            User::create(&db, new_user(&email, &format!("08{}", &tag[..8]))),
        );

        let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one insert must win");
        let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        match loser {
            AppError::AlreadyExists { field } => assert_eq!(field, "email"),
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
    }

    #[tokio::test]
    #[ignore = "needs a live PostgreSQL; set DATABASE_URL and SEED_PASSWORD, run with --ignored"]
    async fn rotation_kills_lookups_by_the_old_identifier() {
        let db = connect().await;
        let tag = gen_alternative_id();
        let user = User::create(
            &db,
            new_user(&format!("rotate-{tag}@example.com"), &format!("09{}", &tag[..8])),
        )
        .await
        .expect("create");

        let old_id = user.alternative_id.clone();
        let fresh = User::rotate_alternative_id(&db, &old_id)
            .await
            .expect("rotate")
            .expect("user exists");
        assert_ne!(fresh, old_id);

        let by_old = User::find_by_alternative_id(&db, &old_id)
            .await
            .expect("query");
        assert!(by_old.is_none(), "old identifier must no longer resolve");
        assert!(crate::identity::resolve(by_old).needs().is_empty());

        let by_fresh = User::find_by_alternative_id(&db, &fresh)
            .await
            .expect("query");
        assert_eq!(by_fresh.expect("fresh resolves").id, user.id);
    }
}
