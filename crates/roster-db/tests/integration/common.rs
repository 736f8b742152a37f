use roster_db::Database;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Spins up a PostgreSQL container and returns a migrated pool.
///
/// The `ContainerAsync` must be kept in scope for the test duration;
/// dropping it stops the container.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "roster_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{host}:{port}/roster_test");

    // Retry connection until container is fully ready
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    Database::from_pool(pool.clone())
        .migrate()
        .await
        .expect("Failed to run migrations");

    (pool, container)
}

/// Inserts a category and returns its id.
pub async fn insert_category(pool: &PgPool, name: &str) -> i64 {
    let row: (i64,) = sqlx::query_as("INSERT INTO categories (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("Failed to insert category");
    row.0
}

/// Inserts a skill in the given categories and returns its id.
pub async fn insert_skill(pool: &PgPool, name: &str, synonyms: &[&str], categories: &[i64]) -> i64 {
    let synonyms: Vec<String> = synonyms.iter().map(|s| s.to_string()).collect();
    let row: (i64,) =
        sqlx::query_as("INSERT INTO skills (name, synonyms) VALUES ($1, $2) RETURNING id")
            .bind(name)
            .bind(&synonyms)
            .fetch_one(pool)
            .await
            .expect("Failed to insert skill");
    for category_id in categories {
        sqlx::query("INSERT INTO skill_categories (skill_id, category_id) VALUES ($1, $2)")
            .bind(row.0)
            .bind(category_id)
            .execute(pool)
            .await
            .expect("Failed to link skill category");
    }
    row.0
}

/// Inserts an employee holding the given skills and returns its id.
pub async fn insert_employee(pool: &PgPool, name: &str, skills: &[i64]) -> i64 {
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO employees (name, department) VALUES ($1, 'Engineering') RETURNING id",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("Failed to insert employee");
    for skill_id in skills {
        sqlx::query("INSERT INTO employee_skills (employee_id, skill_id) VALUES ($1, $2)")
            .bind(row.0)
            .bind(skill_id)
            .execute(pool)
            .await
            .expect("Failed to link employee skill");
    }
    row.0
}
