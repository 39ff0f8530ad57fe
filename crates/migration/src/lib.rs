pub use sea_orm_migration::prelude::*;

mod m20240501_000001_create_tracker_tables;

// RLS policy SQL
pub mod rls;

pub use m20240501_000001_create_tracker_tables::TRACKER_TABLES;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m20240501_000001_create_tracker_tables::Migration,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_registered() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, vec!["m20240501_000001_create_tracker_tables"]);
    }
}
