//! Database service for portal-service.

use crate::ledger;
use crate::models::{
    Activity, Client, ClientWithStats, CreateClient, CreateInvoice, CreateInvoiceItem,
    CreatePayment, CreateProject, CreateTask, CreateUser, Invoice, InvoiceItem, InvoiceStatus,
    ListInvoicesFilter, ListProjectsFilter, Payment, Project, Task, TaskStatus, UpdateClient,
    UpdateInvoice, UpdateInvoiceItem, UpdateProject, UpdateTask, User,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const CLIENT_COLUMNS: &str =
    "client_id, owner_id, name, email, phone, company, address, notes, avatar_color, created_utc";

const PROJECT_COLUMNS: &str = "project_id, owner_id, client_id, name, description, status, \
     budget, spent, deadline, progress, created_utc, updated_utc";

const TASK_COLUMNS: &str = "task_id, project_id, title, description, status, priority, due_date, \
     estimated_hours, actual_hours, position, created_utc, updated_utc";

const INVOICE_COLUMNS: &str = "invoice_id, owner_id, client_id, project_id, invoice_number, \
     status, payment_terms, issue_date, due_date, paid_date, sent_utc, tax_rate, \
     discount_percent, notes, subtotal, discount_amount, tax_amount, total, amount_paid, \
     amount_due, created_utc";

const ITEM_COLUMNS: &str =
    "item_id, invoice_id, description, quantity, unit_price, amount, position, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "portal-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    fn begin_err(e: sqlx::Error) -> AppError {
        AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
    }

    fn commit_err(e: sqlx::Error) -> AppError {
        AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
    }

    // -------------------------------------------------------------------------
    // User Operations
    // -------------------------------------------------------------------------

    /// Create a new user account.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: &CreateUser) -> Result<User, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_user"])
            .start_timer();

        let user_id = Uuid::new_v4();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, email, password_hash, full_name, company_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING user_id, email, password_hash, full_name, company_name, avatar_url, created_utc
            "#,
        )
        .bind(user_id)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.full_name)
        .bind(&input.company_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create user: {}", e)),
        })?;

        timer.observe_duration();

        info!(user_id = %user.user_id, "User created");

        Ok(user)
    }

    /// Find a user by email.
    #[instrument(skip(self, email))]
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user_by_email"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, email, password_hash, full_name, company_name, avatar_url, created_utc
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;

        timer.observe_duration();

        Ok(user)
    }

    /// Get a user by ID.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, email, password_hash, full_name, company_name, avatar_url, created_utc
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;

        timer.observe_duration();

        Ok(user)
    }

    // -------------------------------------------------------------------------
    // Client Operations
    // -------------------------------------------------------------------------

    /// Create a new client.
    #[instrument(skip(self, input), fields(owner_id = %owner_id))]
    pub async fn create_client(
        &self,
        owner_id: Uuid,
        input: &CreateClient,
    ) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let client_id = Uuid::new_v4();
        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (client_id, owner_id, name, email, phone, company, address, notes, avatar_color)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, '#10B981'))
            RETURNING {CLIENT_COLUMNS}
            "#,
        ))
        .bind(client_id)
        .bind(owner_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.address)
        .bind(&input.notes)
        .bind(&input.avatar_color)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create client: {}", e)))?;

        timer.observe_duration();

        info!(client_id = %client.client_id, "Client created");

        Ok(client)
    }

    /// List clients for an owner with derived stats.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn list_clients(&self, owner_id: Uuid) -> Result<Vec<ClientWithStats>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_clients"])
            .start_timer();

        let clients = sqlx::query_as::<_, ClientWithStats>(&format!(
            r#"
            SELECT {CLIENT_COLUMNS},
                (SELECT COUNT(*) FROM projects p WHERE p.client_id = c.client_id) AS project_count,
                COALESCE((SELECT SUM(i.total) FROM invoices i
                          WHERE i.client_id = c.client_id AND i.status = 'paid'), 0) AS total_revenue
            FROM clients c
            WHERE owner_id = $1
            ORDER BY created_utc DESC
            "#,
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list clients: {}", e)))?;

        timer.observe_duration();

        Ok(clients)
    }

    /// Get a client by ID with derived stats.
    #[instrument(skip(self), fields(owner_id = %owner_id, client_id = %client_id))]
    pub async fn get_client(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<ClientWithStats>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_client"])
            .start_timer();

        let client = sqlx::query_as::<_, ClientWithStats>(&format!(
            r#"
            SELECT {CLIENT_COLUMNS},
                (SELECT COUNT(*) FROM projects p WHERE p.client_id = c.client_id) AS project_count,
                COALESCE((SELECT SUM(i.total) FROM invoices i
                          WHERE i.client_id = c.client_id AND i.status = 'paid'), 0) AS total_revenue
            FROM clients c
            WHERE owner_id = $1 AND client_id = $2
            "#,
        ))
        .bind(owner_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get client: {}", e)))?;

        timer.observe_duration();

        Ok(client)
    }

    /// Update a client.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, client_id = %client_id))]
    pub async fn update_client(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
        input: &UpdateClient,
    ) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients
            SET name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                company = COALESCE($6, company),
                address = COALESCE($7, address),
                notes = COALESCE($8, notes),
                avatar_color = COALESCE($9, avatar_color)
            WHERE owner_id = $1 AND client_id = $2
            RETURNING {CLIENT_COLUMNS}
            "#,
        ))
        .bind(owner_id)
        .bind(client_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.address)
        .bind(&input.notes)
        .bind(&input.avatar_color)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update client: {}", e)))?;

        timer.observe_duration();

        Ok(client)
    }

    /// Delete a client. Projects keep their rows with `client_id` cleared;
    /// the client's invoices are removed with it.
    #[instrument(skip(self), fields(owner_id = %owner_id, client_id = %client_id))]
    pub async fn delete_client(&self, owner_id: Uuid, client_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_client"])
            .start_timer();

        let result = sqlx::query("DELETE FROM clients WHERE owner_id = $1 AND client_id = $2")
            .bind(owner_id)
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete client: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(client_id = %client_id, "Client deleted");
        }

        Ok(deleted)
    }

    /// Look up a client's display name.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn get_client_name(&self, client_id: Uuid) -> Result<Option<String>, AppError> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM clients WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get client name: {}", e))
            })?;

        Ok(name)
    }

    // -------------------------------------------------------------------------
    // Project Operations
    // -------------------------------------------------------------------------

    /// Create a new project.
    #[instrument(skip(self, input), fields(owner_id = %owner_id))]
    pub async fn create_project(
        &self,
        owner_id: Uuid,
        input: &CreateProject,
    ) -> Result<Project, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_project"])
            .start_timer();

        let project_id = Uuid::new_v4();
        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            INSERT INTO projects (project_id, owner_id, client_id, name, description, status, budget, deadline)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PROJECT_COLUMNS}
            "#,
        ))
        .bind(project_id)
        .bind(owner_id)
        .bind(input.client_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.status.as_str())
        .bind(input.budget)
        .bind(input.deadline)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create project: {}", e)))?;

        timer.observe_duration();

        info!(project_id = %project.project_id, "Project created");

        Ok(project)
    }

    /// List projects for an owner, optionally filtered by status.
    #[instrument(skip(self, filter), fields(owner_id = %owner_id))]
    pub async fn list_projects(
        &self,
        owner_id: Uuid,
        filter: &ListProjectsFilter,
    ) -> Result<Vec<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_projects"])
            .start_timer();

        let projects = sqlx::query_as::<_, Project>(&format!(
            r#"
            SELECT {PROJECT_COLUMNS}
            FROM projects
            WHERE owner_id = $1
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_utc DESC
            "#,
        ))
        .bind(owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list projects: {}", e)))?;

        timer.observe_duration();

        Ok(projects)
    }

    /// Get a project by ID.
    #[instrument(skip(self), fields(owner_id = %owner_id, project_id = %project_id))]
    pub async fn get_project(
        &self,
        owner_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_project"])
            .start_timer();

        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            SELECT {PROJECT_COLUMNS}
            FROM projects
            WHERE owner_id = $1 AND project_id = $2
            "#,
        ))
        .bind(owner_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get project: {}", e)))?;

        timer.observe_duration();

        Ok(project)
    }

    /// Update a project.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, project_id = %project_id))]
    pub async fn update_project(
        &self,
        owner_id: Uuid,
        project_id: Uuid,
        input: &UpdateProject,
    ) -> Result<Option<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_project"])
            .start_timer();

        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            UPDATE projects
            SET client_id = COALESCE($3, client_id),
                name = COALESCE($4, name),
                description = COALESCE($5, description),
                status = COALESCE($6, status),
                budget = COALESCE($7, budget),
                spent = COALESCE($8, spent),
                deadline = COALESCE($9, deadline),
                updated_utc = now()
            WHERE owner_id = $1 AND project_id = $2
            RETURNING {PROJECT_COLUMNS}
            "#,
        ))
        .bind(owner_id)
        .bind(project_id)
        .bind(input.client_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.status.map(|s| s.as_str()))
        .bind(input.budget)
        .bind(input.spent)
        .bind(input.deadline)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update project: {}", e)))?;

        timer.observe_duration();

        Ok(project)
    }

    /// Delete a project and its tasks.
    #[instrument(skip(self), fields(owner_id = %owner_id, project_id = %project_id))]
    pub async fn delete_project(&self, owner_id: Uuid, project_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_project"])
            .start_timer();

        let result = sqlx::query("DELETE FROM projects WHERE owner_id = $1 AND project_id = $2")
            .bind(owner_id)
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete project: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(project_id = %project_id, "Project deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Task Operations
    // -------------------------------------------------------------------------

    /// Recompute and persist a project's progress from its task statuses.
    /// Runs inside the caller's transaction so progress never drifts from
    /// the task rows it derives from.
    async fn recompute_progress(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
    ) -> Result<i32, AppError> {
        let (total, completed) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'completed')
            FROM tasks
            WHERE project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count tasks: {}", e)))?;

        let progress = ledger::project_progress(completed, total);

        sqlx::query("UPDATE projects SET progress = $2, updated_utc = now() WHERE project_id = $1")
            .bind(project_id)
            .bind(progress)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update progress: {}", e))
            })?;

        Ok(progress)
    }

    /// List a project's tasks in display order.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_tasks"])
            .start_timer();

        let tasks = sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM tasks
            WHERE project_id = $1
            ORDER BY position, created_utc
            "#,
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list tasks: {}", e)))?;

        timer.observe_duration();

        Ok(tasks)
    }

    /// Create a task at the end of the project's display order and refresh
    /// the project's progress.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, project_id = %project_id))]
    pub async fn create_task(
        &self,
        owner_id: Uuid,
        project_id: Uuid,
        input: &CreateTask,
    ) -> Result<Option<Task>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_task"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        let owned = sqlx::query_scalar::<_, Uuid>(
            "SELECT project_id FROM projects WHERE owner_id = $1 AND project_id = $2 FOR UPDATE",
        )
        .bind(owner_id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get project: {}", e)))?;

        if owned.is_none() {
            return Ok(None);
        }

        let task_id = Uuid::new_v4();
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (task_id, project_id, title, description, status, priority, due_date,
                estimated_hours, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE project_id = $2))
            RETURNING {TASK_COLUMNS}
            "#,
        ))
        .bind(task_id)
        .bind(project_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.status.as_str())
        .bind(input.priority.as_str())
        .bind(input.due_date)
        .bind(input.estimated_hours)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create task: {}", e)))?;

        Self::recompute_progress(&mut tx, project_id).await?;

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        info!(task_id = %task.task_id, "Task created");

        Ok(Some(task))
    }

    /// Update a task and refresh the project's progress.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, task_id = %task_id))]
    pub async fn update_task(
        &self,
        owner_id: Uuid,
        task_id: Uuid,
        input: &UpdateTask,
    ) -> Result<Option<Task>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_task"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks t
            SET title = COALESCE($3, title),
                description = COALESCE($4, description),
                status = COALESCE($5, status),
                priority = COALESCE($6, priority),
                due_date = COALESCE($7, due_date),
                estimated_hours = COALESCE($8, estimated_hours),
                actual_hours = COALESCE($9, actual_hours),
                updated_utc = now()
            FROM projects p
            WHERE t.task_id = $2 AND p.project_id = t.project_id AND p.owner_id = $1
            RETURNING {}
            "#,
            task_columns_qualified()
        ))
        .bind(owner_id)
        .bind(task_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.status.map(|s| s.as_str()))
        .bind(input.priority.map(|p| p.as_str()))
        .bind(input.due_date)
        .bind(input.estimated_hours)
        .bind(input.actual_hours)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update task: {}", e)))?;

        let task = match task {
            Some(task) => task,
            None => return Ok(None),
        };

        Self::recompute_progress(&mut tx, task.project_id).await?;

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        Ok(Some(task))
    }

    /// Toggle a task between completed and todo, refreshing the project's
    /// progress in the same transaction.
    #[instrument(skip(self), fields(owner_id = %owner_id, task_id = %task_id))]
    pub async fn toggle_task(&self, owner_id: Uuid, task_id: Uuid) -> Result<Option<Task>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["toggle_task"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks t
            SET status = CASE WHEN t.status = $3 THEN $4 ELSE $3 END,
                updated_utc = now()
            FROM projects p
            WHERE t.task_id = $2 AND p.project_id = t.project_id AND p.owner_id = $1
            RETURNING {}
            "#,
            task_columns_qualified()
        ))
        .bind(owner_id)
        .bind(task_id)
        .bind(TaskStatus::Completed.as_str())
        .bind(TaskStatus::Todo.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to toggle task: {}", e)))?;

        let task = match task {
            Some(task) => task,
            None => return Ok(None),
        };

        Self::recompute_progress(&mut tx, task.project_id).await?;

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        info!(task_id = %task.task_id, status = %task.status, "Task toggled");

        Ok(Some(task))
    }

    /// Delete a task and refresh the project's progress.
    #[instrument(skip(self), fields(owner_id = %owner_id, task_id = %task_id))]
    pub async fn delete_task(&self, owner_id: Uuid, task_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_task"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        let project_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            DELETE FROM tasks t
            USING projects p
            WHERE t.task_id = $2 AND p.project_id = t.project_id AND p.owner_id = $1
            RETURNING t.project_id
            "#,
        )
        .bind(owner_id)
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete task: {}", e)))?;

        let project_id = match project_id {
            Some(project_id) => project_id,
            None => return Ok(false),
        };

        Self::recompute_progress(&mut tx, project_id).await?;

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        info!(task_id = %task_id, "Task deleted");

        Ok(true)
    }

    /// Reassign display positions wholesale from an ordered list of task IDs.
    /// Returns the project's tasks in the new order.
    #[instrument(skip(self, ordered_ids), fields(owner_id = %owner_id, project_id = %project_id))]
    pub async fn reorder_tasks(
        &self,
        owner_id: Uuid,
        project_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> Result<Option<Vec<Task>>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reorder_tasks"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        let owned = sqlx::query_scalar::<_, Uuid>(
            "SELECT project_id FROM projects WHERE owner_id = $1 AND project_id = $2 FOR UPDATE",
        )
        .bind(owner_id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get project: {}", e)))?;

        if owned.is_none() {
            return Ok(None);
        }

        for (position, task_id) in ordered_ids.iter().enumerate() {
            sqlx::query(
                "UPDATE tasks SET position = $3, updated_utc = now() \
                 WHERE project_id = $1 AND task_id = $2",
            )
            .bind(project_id)
            .bind(task_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to reorder task: {}", e))
            })?;
        }

        let tasks = sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM tasks
            WHERE project_id = $1
            ORDER BY position, created_utc
            "#,
        ))
        .bind(project_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list tasks: {}", e)))?;

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        Ok(Some(tasks))
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create a draft invoice. The invoice number comes from the owner's
    /// per-year counter, incremented in the same transaction.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, client_id = %input.client_id))]
    pub async fn create_invoice(
        &self,
        owner_id: Uuid,
        input: &CreateInvoice,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let issue_date = input
            .issue_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let due_date = input
            .due_date
            .unwrap_or_else(|| ledger::due_date_from_terms(issue_date, input.payment_terms));
        let year = issue_date.year();

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        let owned = sqlx::query_scalar::<_, Uuid>(
            "SELECT client_id FROM clients WHERE owner_id = $1 AND client_id = $2",
        )
        .bind(owner_id)
        .bind(input.client_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get client: {}", e)))?;

        if owned.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
        }

        let last_seq = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO invoice_counters (owner_id, year, last_seq)
            VALUES ($1, $2, 1)
            ON CONFLICT (owner_id, year)
            DO UPDATE SET last_seq = invoice_counters.last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(owner_id)
        .bind(year)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to advance invoice counter: {}", e))
        })?;

        let invoice_number = ledger::next_invoice_number(last_seq - 1, year);

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (invoice_id, owner_id, client_id, project_id, invoice_number,
                status, payment_terms, issue_date, due_date, tax_rate, discount_percent, notes)
            VALUES ($1, $2, $3, $4, $5, 'draft', $6, $7, $8, $9, $10, $11)
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(invoice_id)
        .bind(owner_id)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(&invoice_number)
        .bind(input.payment_terms.as_str())
        .bind(issue_date)
        .bind(due_date)
        .bind(input.tax_rate)
        .bind(input.discount_percent)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, invoice_number = %invoice.invoice_number, "Invoice created");

        Ok(invoice)
    }

    /// List invoices for an owner, newest first, optionally filtered by status.
    #[instrument(skip(self, filter), fields(owner_id = %owner_id))]
    pub async fn list_invoices(
        &self,
        owner_id: Uuid,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE owner_id = $1
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_utc DESC
            "#,
        ))
        .bind(owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE owner_id = $1 AND invoice_id = $2
            "#,
        ))
        .bind(owner_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// List an invoice's line items in display order.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_items"])
            .start_timer();

        let items = sqlx::query_as::<_, InvoiceItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY position, created_utc
            "#,
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// Update an invoice's header fields, then recompute its ledger fields
    /// from the stored items under the (possibly changed) rates. Setting the
    /// status to paid stamps `paid_date` if it was never set.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET client_id = COALESCE($3, client_id),
                project_id = COALESCE($4, project_id),
                status = COALESCE($5, status),
                payment_terms = COALESCE($6, payment_terms),
                issue_date = COALESCE($7, issue_date),
                due_date = COALESCE($8, due_date),
                tax_rate = COALESCE($9, tax_rate),
                discount_percent = COALESCE($10, discount_percent),
                notes = COALESCE($11, notes),
                paid_date = CASE WHEN $5 = 'paid' THEN COALESCE(paid_date, CURRENT_DATE)
                                 ELSE paid_date END
            WHERE owner_id = $1 AND invoice_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(owner_id)
        .bind(invoice_id)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(input.status.map(|s| s.as_str()))
        .bind(input.payment_terms.map(|t| t.as_str()))
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.tax_rate)
        .bind(input.discount_percent)
        .bind(&input.notes)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        let invoice = match invoice {
            Some(invoice) => invoice,
            None => return Ok(None),
        };

        let invoice = Self::recompute_invoice(&mut tx, &invoice).await?;

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        Ok(Some(invoice))
    }

    /// Delete an invoice along with its items and payments.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, owner_id: Uuid, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let result = sqlx::query("DELETE FROM invoices WHERE owner_id = $1 AND invoice_id = $2")
            .bind(owner_id)
            .bind(invoice_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Invoice deleted");
        }

        Ok(deleted)
    }

    /// Mark a draft invoice as sent, stamping `sent_utc` the first time.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn send_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["send_invoice"])
            .start_timer();

        let existing = self.get_invoice(owner_id, invoice_id).await?;
        match existing {
            Some(ref inv) if inv.status == "draft" => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only draft invoices can be sent"
                )))
            }
            None => return Ok(None),
        }

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = 'sent',
                sent_utc = COALESCE(sent_utc, now())
            WHERE owner_id = $1 AND invoice_id = $2 AND status = 'draft'
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(owner_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to send invoice: {}", e)))?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(invoice_id = %inv.invoice_id, invoice_number = %inv.invoice_number, "Invoice sent");
        }

        Ok(invoice)
    }

    /// Cancel an invoice from any state.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn cancel_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = 'cancelled'
            WHERE owner_id = $1 AND invoice_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(owner_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to cancel invoice: {}", e)))?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(invoice_id = %inv.invoice_id, "Invoice cancelled");
        }

        Ok(invoice)
    }

    /// Mark every sent or partially paid invoice past its due date as
    /// overdue. Idempotent; returns the number of invoices transitioned.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn sweep_overdue(&self, owner_id: Uuid) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sweep_overdue"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'overdue'
            WHERE owner_id = $1
              AND status IN ('sent', 'partially_paid')
              AND due_date < CURRENT_DATE
            "#,
        )
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Overdue sweep failed: {}", e)))?;

        timer.observe_duration();

        let swept = result.rows_affected();
        if swept > 0 {
            info!(swept = swept, "Invoices marked overdue");
        }

        Ok(swept)
    }

    /// Rederive an invoice's ledger fields from its stored items inside the
    /// caller's transaction and persist them.
    async fn recompute_invoice(
        tx: &mut Transaction<'_, Postgres>,
        invoice: &Invoice,
    ) -> Result<Invoice, AppError> {
        let amounts = sqlx::query_scalar::<_, Decimal>(
            "SELECT amount FROM invoice_items WHERE invoice_id = $1",
        )
        .bind(invoice.invoice_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load items: {}", e)))?;

        let totals = ledger::recalculate_totals(
            &amounts,
            invoice.discount_percent,
            invoice.tax_rate,
            invoice.amount_paid,
        );

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET subtotal = $2,
                discount_amount = $3,
                tax_amount = $4,
                total = $5,
                amount_due = $6
            WHERE invoice_id = $1
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(invoice.invoice_id)
        .bind(totals.subtotal)
        .bind(totals.discount_amount)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(totals.amount_due)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to store totals: {}", e)))?;

        Ok(invoice)
    }

    /// Lock and fetch an invoice row inside a transaction.
    async fn lock_invoice(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE owner_id = $1 AND invoice_id = $2
            FOR UPDATE
            "#,
        ))
        .bind(owner_id)
        .bind(invoice_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        Ok(invoice)
    }

    // -------------------------------------------------------------------------
    // Invoice Item Operations
    // -------------------------------------------------------------------------

    /// Add a line item and recompute the invoice's ledger fields in one
    /// transaction.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn add_invoice_item(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        input: &CreateInvoiceItem,
    ) -> Result<Option<(InvoiceItem, Invoice)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_invoice_item"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        let invoice = match Self::lock_invoice(&mut tx, owner_id, invoice_id).await? {
            Some(invoice) => invoice,
            None => return Ok(None),
        };

        let item_id = Uuid::new_v4();
        let amount = ledger::line_amount(input.quantity, input.unit_price);
        let item = sqlx::query_as::<_, InvoiceItem>(&format!(
            r#"
            INSERT INTO invoice_items (item_id, invoice_id, description, quantity, unit_price, amount, position)
            VALUES ($1, $2, $3, $4, $5, $6,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM invoice_items WHERE invoice_id = $2))
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(item_id)
        .bind(invoice_id)
        .bind(&input.description)
        .bind(input.quantity)
        .bind(input.unit_price)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to add item: {}", e)))?;

        let invoice = Self::recompute_invoice(&mut tx, &invoice).await?;

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        info!(item_id = %item.item_id, invoice_id = %invoice_id, "Line item added");

        Ok(Some((item, invoice)))
    }

    /// Update a line item, rederiving its amount and the invoice's ledger
    /// fields in one transaction.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, invoice_id = %invoice_id, item_id = %item_id))]
    pub async fn update_invoice_item(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        item_id: Uuid,
        input: &UpdateInvoiceItem,
    ) -> Result<Option<(InvoiceItem, Invoice)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice_item"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        let invoice = match Self::lock_invoice(&mut tx, owner_id, invoice_id).await? {
            Some(invoice) => invoice,
            None => return Ok(None),
        };

        let existing = sqlx::query_as::<_, InvoiceItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM invoice_items
            WHERE invoice_id = $1 AND item_id = $2
            "#,
        ))
        .bind(invoice_id)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get item: {}", e)))?;

        let existing = match existing {
            Some(existing) => existing,
            None => return Ok(None),
        };

        let quantity = input.quantity.unwrap_or(existing.quantity);
        let unit_price = input.unit_price.unwrap_or(existing.unit_price);
        let amount = ledger::line_amount(quantity, unit_price);

        let item = sqlx::query_as::<_, InvoiceItem>(&format!(
            r#"
            UPDATE invoice_items
            SET description = COALESCE($3, description),
                quantity = $4,
                unit_price = $5,
                amount = $6
            WHERE invoice_id = $1 AND item_id = $2
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(invoice_id)
        .bind(item_id)
        .bind(&input.description)
        .bind(quantity)
        .bind(unit_price)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update item: {}", e)))?;

        let invoice = Self::recompute_invoice(&mut tx, &invoice).await?;

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        Ok(Some((item, invoice)))
    }

    /// Remove a line item and recompute the invoice's ledger fields in one
    /// transaction.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id, item_id = %item_id))]
    pub async fn remove_invoice_item(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_invoice_item"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        let invoice = match Self::lock_invoice(&mut tx, owner_id, invoice_id).await? {
            Some(invoice) => invoice,
            None => return Ok(None),
        };

        let result = sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1 AND item_id = $2")
            .bind(invoice_id)
            .bind(item_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to remove item: {}", e)))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let invoice = Self::recompute_invoice(&mut tx, &invoice).await?;

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        info!(item_id = %item_id, invoice_id = %invoice_id, "Line item removed");

        Ok(Some(invoice))
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Record a payment against an invoice and apply the resulting status
    /// transition in one transaction.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn record_payment(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        input: &CreatePayment,
    ) -> Result<Option<(Payment, Invoice)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let payment_date = input.payment_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        let invoice = match Self::lock_invoice(&mut tx, owner_id, invoice_id).await? {
            Some(invoice) => invoice,
            None => return Ok(None),
        };

        if invoice.status == "cancelled" {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot record a payment on a cancelled invoice"
            )));
        }

        let payment_id = Uuid::new_v4();
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (payment_id, invoice_id, amount, payment_date, note)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING payment_id, invoice_id, amount, payment_date, note, created_utc
            "#,
        )
        .bind(payment_id)
        .bind(invoice_id)
        .bind(input.amount)
        .bind(payment_date)
        .bind(&input.note)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        let outcome = ledger::apply_payment(
            invoice.total,
            invoice.amount_paid,
            InvoiceStatus::from_string(&invoice.status),
            invoice.paid_date,
            input.amount,
            payment_date,
        );

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET amount_paid = $2,
                amount_due = $3,
                status = $4,
                paid_date = $5
            WHERE invoice_id = $1
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(invoice_id)
        .bind(outcome.amount_paid)
        .bind(outcome.amount_due)
        .bind(outcome.status.as_str())
        .bind(outcome.paid_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to apply payment: {}", e)))?;

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        info!(
            payment_id = %payment.payment_id,
            invoice_id = %invoice_id,
            status = %invoice.status,
            "Payment recorded"
        );

        Ok(Some((payment, invoice)))
    }

    /// List an invoice's payments, newest first.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn list_payments(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Vec<Payment>>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        if self.get_invoice(owner_id, invoice_id).await?.is_none() {
            return Ok(None);
        }

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, invoice_id, amount, payment_date, note, created_utc
            FROM payments
            WHERE invoice_id = $1
            ORDER BY created_utc DESC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(Some(payments))
    }

    // -------------------------------------------------------------------------
    // Dashboard Queries
    // -------------------------------------------------------------------------

    /// Headline totals: paid revenue, outstanding draft/sent balance, active
    /// project count, client count.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn dashboard_totals(
        &self,
        owner_id: Uuid,
    ) -> Result<(Decimal, Decimal, i64, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["dashboard_totals"])
            .start_timer();

        let totals = sqlx::query_as::<_, (Decimal, Decimal, i64, i64)>(
            r#"
            SELECT
                COALESCE((SELECT SUM(total) FROM invoices
                          WHERE owner_id = $1 AND status = 'paid'), 0),
                COALESCE((SELECT SUM(amount_due) FROM invoices
                          WHERE owner_id = $1 AND status IN ('draft', 'sent')), 0),
                (SELECT COUNT(*) FROM projects
                 WHERE owner_id = $1 AND status IN ('in_progress', 'review')),
                (SELECT COUNT(*) FROM clients WHERE owner_id = $1)
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load dashboard totals: {}", e))
        })?;

        timer.observe_duration();

        Ok(totals)
    }

    /// Paid revenue per month since `from`, keyed by the first day of the
    /// month. Months with no paid invoices have no row.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn monthly_revenue(
        &self,
        owner_id: Uuid,
        from: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Decimal)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["monthly_revenue"])
            .start_timer();

        let rows = sqlx::query_as::<_, (NaiveDate, Decimal)>(
            r#"
            SELECT date_trunc('month', paid_date)::date AS month, SUM(total)
            FROM invoices
            WHERE owner_id = $1 AND status = 'paid' AND paid_date >= $2
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(owner_id)
        .bind(from)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load monthly revenue: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Project count per status.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn project_status_counts(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<(String, i64)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["project_status_counts"])
            .start_timer();

        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*)
            FROM projects
            WHERE owner_id = $1
            GROUP BY status
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load status counts: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Activity Operations
    // -------------------------------------------------------------------------

    /// Append an entry to the user's activity feed.
    #[instrument(skip(self, details), fields(user_id = %user_id, action = %action))]
    pub async fn log_activity(
        &self,
        user_id: Uuid,
        action: &str,
        entity_type: &str,
        entity_name: &str,
        details: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO activities (activity_id, user_id, action, entity_type, entity_name, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(action)
        .bind(entity_type)
        .bind(entity_name)
        .bind(details)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to log activity: {}", e)))?;

        Ok(())
    }

    /// Most recent activity feed entries.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn recent_activities(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Activity>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recent_activities"])
            .start_timer();

        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT activity_id, user_id, action, entity_type, entity_name, details, created_utc
            FROM activities
            WHERE user_id = $1
            ORDER BY created_utc DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list activities: {}", e))
        })?;

        timer.observe_duration();

        Ok(activities)
    }

    // -------------------------------------------------------------------------
    // Seed Support
    // -------------------------------------------------------------------------

    /// Delete everything the user owns: clients, projects, invoices, and the
    /// activity feed. Child rows go with their parents via cascade.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn purge_owner_data(&self, owner_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["purge_owner_data"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(Self::begin_err)?;

        for statement in [
            "DELETE FROM invoices WHERE owner_id = $1",
            "DELETE FROM projects WHERE owner_id = $1",
            "DELETE FROM clients WHERE owner_id = $1",
            "DELETE FROM activities WHERE user_id = $1",
            "DELETE FROM invoice_counters WHERE owner_id = $1",
        ] {
            sqlx::query(statement)
                .bind(owner_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to purge data: {}", e))
                })?;
        }

        tx.commit().await.map_err(Self::commit_err)?;

        timer.observe_duration();

        info!(owner_id = %owner_id, "Owner data purged");

        Ok(())
    }
}

/// Task columns qualified with the `t.` alias for UPDATE ... FROM joins.
fn task_columns_qualified() -> String {
    TASK_COLUMNS
        .split(", ")
        .map(|col| format!("t.{col}"))
        .collect::<Vec<_>>()
        .join(", ")
}
