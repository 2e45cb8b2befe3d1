//! Employee repository

use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::user_summary_from_row;
use crate::models::{
    employee::{CreateEmployeeRequest, Employee, UpdateEmployeeRequest},
    non_blank,
};

const SELECT_EMPLOYEES: &str = r#"
    SELECT e.id, e.user_id, e.position, e.salary, e.hire_date, e.created_at,
           u.name AS user_name, u.email AS user_email, u.role AS user_role
    FROM employees e
    JOIN users u ON u.id = e.user_id
"#;

fn employee_from_row(row: &PgRow) -> sqlx::Result<Employee> {
    Ok(Employee {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        position: row.try_get("position")?,
        salary: row.try_get("salary")?,
        hire_date: row.try_get("hire_date")?,
        created_at: row.try_get("created_at")?,
        user: Some(user_summary_from_row(row, "user_id")?),
    })
}

/// Employee repository for database operations
#[derive(Clone)]
pub struct EmployeeRepository {
    pool: PgPool,
}

impl EmployeeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> sqlx::Result<Vec<Employee>> {
        let rows = sqlx::query(&format!("{} ORDER BY e.id", SELECT_EMPLOYEES))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(employee_from_row).collect()
    }

    pub async fn find_by_id(&self, id: i32) -> sqlx::Result<Option<Employee>> {
        let row = sqlx::query(&format!("{} WHERE e.id = $1", SELECT_EMPLOYEES))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(employee_from_row).transpose()
    }

    pub async fn exists_for_user(&self, user_id: i32) -> sqlx::Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM employees WHERE user_id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    /// Insert an employee; the hire date defaults to today
    pub async fn create(&self, req: CreateEmployeeRequest) -> sqlx::Result<Employee> {
        info!("Creating employee for user: {}", req.user_id);

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO employees (user_id, position, salary, hire_date)
            VALUES ($1, $2, $3, COALESCE($4, CURRENT_DATE))
            RETURNING id
            "#,
        )
        .bind(req.user_id)
        .bind(req.position.trim())
        .bind(req.salary)
        .bind(req.hire_date)
        .fetch_one(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Overwrite only the supplied fields; a blank position is ignored
    pub async fn update(
        &self,
        id: i32,
        req: UpdateEmployeeRequest,
    ) -> sqlx::Result<Option<Employee>> {
        info!("Updating employee: {}", id);

        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE employees
            SET position = COALESCE($2, position),
                salary = COALESCE($3, salary),
                hire_date = COALESCE($4, hire_date)
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(non_blank(req.position))
        .bind(req.salary)
        .bind(req.hire_date)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: i32) -> sqlx::Result<bool> {
        info!("Deleting employee: {}", id);

        let result = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
