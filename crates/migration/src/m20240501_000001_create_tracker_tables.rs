use sea_orm_migration::prelude::*;

use crate::rls::{disable_rls_sql, enable_rls_sql, owner_policies};

const SCHEMA: &str = "public";

/// Tables in creation order; dropped in reverse
pub const TRACKER_TABLES: [&str; 5] = [
    "habits",
    "habit_completions",
    "sleep_entries",
    "tasks",
    "notes",
];

#[derive(DeriveIden)]
enum Habits {
    Table,
    Id,
    UserId,
    Name,
    Color,
    CreatedAt,
}

#[derive(DeriveIden)]
enum HabitCompletions {
    Table,
    Id,
    HabitId,
    UserId,
    Date,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SleepEntries {
    Table,
    Id,
    UserId,
    Date,
    Hours,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    UserId,
    Title,
    Date,
    Completed,
    Color,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Notes {
    Table,
    Id,
    UserId,
    Content,
    Date,
    CreatedAt,
}

fn id_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .uuid()
        .not_null()
        .primary_key()
        .default(Expr::cust("gen_random_uuid()"))
        .to_owned()
}

/// Owner column, filled from the caller's token when omitted
fn owner_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .uuid()
        .not_null()
        .default(Expr::cust("auth.uid()"))
        .to_owned()
}

fn created_at_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

fn habits_table() -> TableCreateStatement {
    Table::create()
        .table(Habits::Table)
        .if_not_exists()
        .col(id_column(Habits::Id))
        .col(owner_column(Habits::UserId))
        .col(ColumnDef::new(Habits::Name).text().not_null())
        .col(ColumnDef::new(Habits::Color).text().not_null())
        .col(created_at_column(Habits::CreatedAt))
        .to_owned()
}

/// At most one completion per habit and date; removed with their habit
fn habit_completions_table() -> TableCreateStatement {
    Table::create()
        .table(HabitCompletions::Table)
        .if_not_exists()
        .col(id_column(HabitCompletions::Id))
        .col(ColumnDef::new(HabitCompletions::HabitId).uuid().not_null())
        .col(owner_column(HabitCompletions::UserId))
        .col(ColumnDef::new(HabitCompletions::Date).date().not_null())
        .col(created_at_column(HabitCompletions::CreatedAt))
        .foreign_key(
            ForeignKey::create()
                .name("habit_completions_habit_id_fkey")
                .from(HabitCompletions::Table, HabitCompletions::HabitId)
                .to(Habits::Table, Habits::Id)
                .on_delete(ForeignKeyAction::Cascade),
        )
        .index(
            Index::create()
                .name("habit_completions_habit_id_date_key")
                .unique()
                .col(HabitCompletions::HabitId)
                .col(HabitCompletions::Date),
        )
        .to_owned()
}

/// One entry per owner and date; the unique key is the upsert target
fn sleep_entries_table() -> TableCreateStatement {
    Table::create()
        .table(SleepEntries::Table)
        .if_not_exists()
        .col(id_column(SleepEntries::Id))
        .col(owner_column(SleepEntries::UserId))
        .col(ColumnDef::new(SleepEntries::Date).date().not_null())
        .col(
            ColumnDef::new(SleepEntries::Hours)
                .decimal_len(3, 1)
                .not_null()
                .check(Expr::col(SleepEntries::Hours).between(0, 24)),
        )
        .col(created_at_column(SleepEntries::CreatedAt))
        .index(
            Index::create()
                .name("sleep_entries_user_id_date_key")
                .unique()
                .col(SleepEntries::UserId)
                .col(SleepEntries::Date),
        )
        .to_owned()
}

fn tasks_table() -> TableCreateStatement {
    Table::create()
        .table(Tasks::Table)
        .if_not_exists()
        .col(id_column(Tasks::Id))
        .col(owner_column(Tasks::UserId))
        .col(ColumnDef::new(Tasks::Title).text().not_null())
        .col(ColumnDef::new(Tasks::Date).date().not_null())
        .col(
            ColumnDef::new(Tasks::Completed)
                .boolean()
                .not_null()
                .default(false),
        )
        .col(ColumnDef::new(Tasks::Color).text().null())
        .col(created_at_column(Tasks::CreatedAt))
        .to_owned()
}

fn notes_table() -> TableCreateStatement {
    Table::create()
        .table(Notes::Table)
        .if_not_exists()
        .col(id_column(Notes::Id))
        .col(owner_column(Notes::UserId))
        .col(ColumnDef::new(Notes::Content).text().not_null())
        .col(ColumnDef::new(Notes::Date).date().not_null())
        .col(created_at_column(Notes::CreatedAt))
        .to_owned()
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            habits_table(),
            habit_completions_table(),
            sleep_entries_table(),
            tasks_table(),
            notes_table(),
        ] {
            manager.create_table(table).await?;
        }

        let db = manager.get_connection();
        for table in TRACKER_TABLES {
            db.execute_unprepared(&enable_rls_sql(table, Some(SCHEMA)))
                .await?;
            for policy in owner_policies(table, Some(SCHEMA)) {
                db.execute_unprepared(&policy.create_policy_sql()).await?;
            }
            println!(" -> RLS enabled with owner policies for '{}'.", table);
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for table in TRACKER_TABLES.iter().rev() {
            for policy in owner_policies(table, Some(SCHEMA)) {
                db.execute_unprepared(&policy.drop_policy_sql()).await?;
            }
            db.execute_unprepared(&disable_rls_sql(table, Some(SCHEMA)))
                .await?;
        }

        manager
            .drop_table(Table::drop().table(Notes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SleepEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(HabitCompletions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Habits::Table).to_owned())
            .await
    }
}
