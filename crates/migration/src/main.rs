use sea_orm_migration::prelude::*;
use std::env;
use std::process::ExitCode;

use habit_sync_migration::Migrator;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("cli");

    if command == "cli" {
        println!("Running SeaORM migration CLI...");
        cli::run_cli(Migrator).await;
        return ExitCode::SUCCESS;
    }

    match run(command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Migration '{}' failed: {}", command, err);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: &str) -> Result<(), DbErr> {
    let db = get_database_connection().await?;

    match command {
        "up" => {
            println!("Running migrations up...");
            Migrator::up(&db, None).await?;
            println!("Completed migrations up.");
        }
        "down" => {
            println!("Running migrations down...");
            Migrator::down(&db, None).await?;
            println!("Completed migrations down.");
        }
        "fresh" => {
            println!("Refreshing database (down then up)...");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
            println!("Database refresh completed.");
        }
        "status" => {
            let status = Migrator::get_migration_with_status(&db).await?;
            println!("Migration Status:");
            for migration in status {
                println!("{}: {}", migration.name(), migration.status());
            }
        }
        other => {
            return Err(DbErr::Custom(format!(
                "unknown command '{}', expected one of: up, down, fresh, status, cli",
                other
            )))
        }
    }
    Ok(())
}

async fn get_database_connection() -> Result<sea_orm::DatabaseConnection, DbErr> {
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| DbErr::Custom("DATABASE_URL environment variable must be set".into()))?;

    sea_orm::Database::connect(&database_url).await
}
