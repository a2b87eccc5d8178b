use sqlx::Row;

use paydeck_core::domain::company::CompanyId;
use paydeck_core::domain::user::{Role, User, UserId};

use super::{RepositoryError, UserRepository, MEMBERSHIP_QUERY_LIMIT};
use crate::DbPool;

const USER_COLUMNS: &str = "id, uid, username, email, role, can_print_checks, company_ids";

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_role(s: &str) -> Role {
    match s {
        "admin" => Role::Admin,
        _ => Role::User,
    }
}

pub fn role_as_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::User => "user",
    }
}

fn decode_err(field: &str, error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(format!("users.{field}: {error}"))
}

pub(crate) fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| decode_err("id", e))?;
    let uid: String = row.try_get("uid").map_err(|e| decode_err("uid", e))?;
    let username: Option<String> =
        row.try_get("username").map_err(|e| decode_err("username", e))?;
    let email: Option<String> = row.try_get("email").map_err(|e| decode_err("email", e))?;
    let role_str: String = row.try_get("role").map_err(|e| decode_err("role", e))?;
    let can_print_checks: i64 =
        row.try_get("can_print_checks").map_err(|e| decode_err("can_print_checks", e))?;
    let company_ids_json: String =
        row.try_get("company_ids").map_err(|e| decode_err("company_ids", e))?;

    let company_ids: Vec<String> =
        serde_json::from_str(&company_ids_json).map_err(|e| decode_err("company_ids", e))?;

    Ok(User {
        id: UserId(id),
        uid,
        username,
        email,
        role: parse_role(&role_str),
        can_print_checks: can_print_checks != 0,
        company_ids: company_ids.into_iter().map(CompanyId).collect(),
    })
}

impl SqlUserRepository {
    pub async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let company_ids: Vec<&str> =
            user.company_ids.iter().map(|id| id.0.as_str()).collect();
        let company_ids_json =
            serde_json::to_string(&company_ids).map_err(|e| decode_err("company_ids", e))?;

        sqlx::query(
            "INSERT INTO users (id, uid, username, email, role, can_print_checks, company_ids)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 uid = excluded.uid,
                 username = excluded.username,
                 email = excluded.email,
                 role = excluded.role,
                 can_print_checks = excluded.can_print_checks,
                 company_ids = excluded.company_ids",
        )
        .bind(&user.id.0)
        .bind(&user.uid)
        .bind(&user.username)
        .bind(&user.email)
        .bind(role_as_str(user.role))
        .bind(i64::from(user.can_print_checks))
        .bind(company_ids_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"))
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_user).collect()
    }

    async fn find_by_uids_chunk(&self, uids: &[String]) -> Result<Vec<User>, RepositoryError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        if uids.len() > MEMBERSHIP_QUERY_LIMIT {
            return Err(RepositoryError::membership_limit(uids.len()));
        }

        let placeholders = vec!["?"; uids.len()].join(", ");
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE uid IN ({placeholders})");

        let mut query = sqlx::query(&sql);
        for uid in uids {
            query = query.bind(uid);
        }

        let rows: Vec<sqlx::sqlite::SqliteRow> = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_user).collect()
    }
}

#[cfg(test)]
mod tests {
    use paydeck_core::domain::company::CompanyId;
    use paydeck_core::domain::user::{Role, User, UserId};

    use super::SqlUserRepository;
    use crate::repositories::{RepositoryError, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_user(id: &str, uid: &str, role: Role) -> User {
        User {
            id: UserId(id.to_string()),
            uid: uid.to_string(),
            username: Some(format!("{id}-name")),
            email: None,
            role,
            can_print_checks: role == Role::Admin,
            company_ids: vec![CompanyId("c-1".to_string())],
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trip() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        let user = sample_user("u-1", "auth-u-1", Role::Admin);
        repo.save(user.clone()).await.expect("save");

        let found = repo
            .find_by_id(&UserId("u-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found, user);
    }

    #[tokio::test]
    async fn uid_chunk_lookup_enforces_the_limit() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        repo.save(sample_user("u-1", "auth-u-1", Role::User)).await.expect("save 1");
        repo.save(sample_user("u-2", "auth-u-2", Role::User)).await.expect("save 2");

        let found = repo
            .find_by_uids_chunk(&["auth-u-2".to_string(), "auth-missing".to_string()])
            .await
            .expect("chunk");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.0, "u-2");

        let oversized: Vec<String> = (0..11).map(|i| format!("auth-{i}")).collect();
        let error = repo.find_by_uids_chunk(&oversized).await.expect_err("limit");
        assert!(matches!(error, RepositoryError::MembershipLimitExceeded { .. }));
    }
}
