//! Read-only reference entities: companies and clients.

use sqlx::Row;

use paydeck_core::domain::company::{Client, ClientId, Company, CompanyId};

use super::{ClientRepository, CompanyRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCompanyRepository {
    pool: DbPool,
}

impl SqlCompanyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(table: &str, field: &str, error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(format!("{table}.{field}: {error}"))
}

fn row_to_company(row: &sqlx::sqlite::SqliteRow) -> Result<Company, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| decode_err("companies", "id", e))?;
    let name: String = row.try_get("name").map_err(|e| decode_err("companies", "name", e))?;
    Ok(Company { id: CompanyId(id), name })
}

#[async_trait::async_trait]
impl CompanyRepository for SqlCompanyRepository {
    async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        let row = sqlx::query("SELECT id, name FROM companies WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_company(r)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Company>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query("SELECT id, name FROM companies ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_company).collect()
    }
}

pub struct SqlClientRepository {
    pool: DbPool,
}

impl SqlClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_client(row: &sqlx::sqlite::SqliteRow) -> Result<Client, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| decode_err("clients", "id", e))?;
    let name: String = row.try_get("name").map_err(|e| decode_err("clients", "name", e))?;
    let company_id: Option<String> =
        row.try_get("company_id").map_err(|e| decode_err("clients", "company_id", e))?;
    Ok(Client { id: ClientId(id), name, company_id: company_id.map(CompanyId) })
}

#[async_trait::async_trait]
impl ClientRepository for SqlClientRepository {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, company_id FROM clients WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_client(r)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Client>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query("SELECT id, name, company_id FROM clients ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_client).collect()
    }
}
