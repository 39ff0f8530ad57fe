//! Query builders for TableClient

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Error;
use crate::postgrest::filter::*;
use crate::postgrest::TableClient;

/// Query string parameters shared by every builder
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    params: Vec<(String, String)>,
}

impl QueryBuilder {
    /// Create a new QueryBuilder
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter, replacing any earlier value for the same key
    pub fn add_param(&mut self, key: &str, value: &str) {
        self.params.retain(|(k, _)| k != key);
        self.params.push((key.to_string(), value.to_string()));
    }

    /// Add a filter on a column
    pub fn add_filter(&mut self, column: &str, op: FilterOperator, value: &str) {
        self.add_param(column, &op.apply(value));
    }

    /// Get the query parameters
    pub fn get_params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Builder for SELECT queries
pub struct SelectBuilder<'a> {
    table: &'a TableClient,
    query: QueryBuilder,
}

impl<'a> SelectBuilder<'a> {
    pub(crate) fn new(table: &'a TableClient, columns: &str) -> Self {
        let mut query = QueryBuilder::new();
        query.add_param("select", columns);
        Self { table, query }
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(&mut self, column: &str, value: T) -> &mut Self {
        self.query
            .add_filter(column, FilterOperator::Eq, &value.to_string());
        self
    }

    /// Order the results by a column
    pub fn order(&mut self, column: &str, ascending: bool) -> &mut Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.query
            .add_param("order", &format!("{}.{}", column, direction));
        self
    }

    /// Execute the query and return the results
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, Error> {
        self.table
            .request(Method::GET)?
            .query(self.query.get_params())
            .execute::<Vec<T>>()
            .await
    }
}

/// Builder for INSERT queries
pub struct InsertBuilder<'a, T: Serialize> {
    table: &'a TableClient,
    values: T,
}

impl<'a, T: Serialize> InsertBuilder<'a, T> {
    pub(crate) fn new(table: &'a TableClient, values: T) -> Self {
        Self { table, values }
    }

    /// Execute the insert and return the inserted rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<Vec<R>, Error> {
        self.table
            .request(Method::POST)?
            .header("Prefer", ReturnOption::Representation.as_str())?
            .json(&self.values)?
            .execute::<Vec<R>>()
            .await
    }
}

/// Builder for UPDATE queries
pub struct UpdateBuilder<'a, T: Serialize> {
    table: &'a TableClient,
    values: T,
    query: QueryBuilder,
}

impl<'a, T: Serialize> UpdateBuilder<'a, T> {
    pub(crate) fn new(table: &'a TableClient, values: T) -> Self {
        Self {
            table,
            values,
            query: QueryBuilder::new(),
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<V: ToString>(&mut self, column: &str, value: V) -> &mut Self {
        self.query
            .add_filter(column, FilterOperator::Eq, &value.to_string());
        self
    }

    /// Execute the update and return the updated rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<Vec<R>, Error> {
        self.table
            .request(Method::PATCH)?
            .header("Prefer", ReturnOption::Representation.as_str())?
            .query(self.query.get_params())
            .json(&self.values)?
            .execute::<Vec<R>>()
            .await
    }
}

/// Builder for UPSERT queries
pub struct UpsertBuilder<'a, T: Serialize> {
    table: &'a TableClient,
    values: T,
    query: QueryBuilder,
}

impl<'a, T: Serialize> UpsertBuilder<'a, T> {
    pub(crate) fn new(table: &'a TableClient, values: T) -> Self {
        Self {
            table,
            values,
            query: QueryBuilder::new(),
        }
    }

    /// Specify the column(s) of the unique constraint to merge on
    pub fn on_conflict(&mut self, columns: &str) -> &mut Self {
        self.query.add_param("on_conflict", columns);
        self
    }

    /// Execute the upsert and return the resulting rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<Vec<R>, Error> {
        let prefer = format!(
            "resolution=merge-duplicates,{}",
            ReturnOption::Representation.as_str()
        );
        self.table
            .request(Method::POST)?
            .header("Prefer", &prefer)?
            .query(self.query.get_params())
            .json(&self.values)?
            .execute::<Vec<R>>()
            .await
    }
}

/// Builder for DELETE queries
pub struct DeleteBuilder<'a> {
    table: &'a TableClient,
    query: QueryBuilder,
}

impl<'a> DeleteBuilder<'a> {
    pub(crate) fn new(table: &'a TableClient) -> Self {
        Self {
            table,
            query: QueryBuilder::new(),
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<V: ToString>(&mut self, column: &str, value: V) -> &mut Self {
        self.query
            .add_filter(column, FilterOperator::Eq, &value.to_string());
        self
    }

    /// Execute the delete without returning the deleted rows
    pub async fn execute(&self) -> Result<(), Error> {
        if self.query.get_params().is_empty() {
            // never issue an unfiltered delete
            return Err(Error::invalid_input("delete requires at least one filter"));
        }
        self.table
            .request(Method::DELETE)?
            .header("Prefer", ReturnOption::Minimal.as_str())?
            .query(self.query.get_params())
            .execute_empty()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_param_replaces_existing_key() {
        let mut query = QueryBuilder::new();
        query.add_param("order", "date.asc");
        query.add_param("order", "date.desc");
        query.add_filter("user_id", FilterOperator::Eq, "abc");
        assert_eq!(
            query.get_params(),
            &[
                ("order".to_string(), "date.desc".to_string()),
                ("user_id".to_string(), "eq.abc".to_string()),
            ]
        );
    }
}
