//! Row-level-security policy SQL

use std::fmt;

/// Expression tying a row to the caller's authenticated identity
pub const OWNER_CHECK: &str = "auth.uid() = user_id";

/// The SQL command a policy applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlsCommand {
    Select,
    Insert,
    Update,
    Delete,
}

impl RlsCommand {
    /// Verb used in generated policy names
    fn verb(&self) -> &'static str {
        match self {
            RlsCommand::Select => "view",
            RlsCommand::Insert => "insert",
            RlsCommand::Update => "update",
            RlsCommand::Delete => "delete",
        }
    }
}

impl fmt::Display for RlsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RlsCommand::Select => write!(f, "SELECT"),
            RlsCommand::Insert => write!(f, "INSERT"),
            RlsCommand::Update => write!(f, "UPDATE"),
            RlsCommand::Delete => write!(f, "DELETE"),
        }
    }
}

/// Role every owner policy is granted to; anonymous callers get nothing
pub const POLICY_ROLE: &str = "authenticated";

/// A `CREATE POLICY` definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RlsPolicy {
    pub name: String,
    pub table: String,
    pub command: RlsCommand,
    /// `USING` clause; `None` for INSERT, which only takes `WITH CHECK`
    pub using: Option<String>,
    pub check: Option<String>,
    pub schema: Option<String>,
}

impl RlsPolicy {
    fn qualified_table(&self) -> String {
        qualify(&self.table, self.schema.as_deref())
    }

    pub fn create_policy_sql(&self) -> String {
        let using_clause = self
            .using
            .as_ref()
            .map_or(String::new(), |u| format!(" USING ({})", u));
        let check_clause = self
            .check
            .as_ref()
            .map_or(String::new(), |c| format!(" WITH CHECK ({})", c));

        format!(
            "CREATE POLICY \"{}\" ON {} FOR {} TO {}{}{};",
            self.name,
            self.qualified_table(),
            self.command,
            POLICY_ROLE,
            using_clause,
            check_clause
        )
    }

    pub fn drop_policy_sql(&self) -> String {
        format!(
            "DROP POLICY IF EXISTS \"{}\" ON {};",
            self.name,
            self.qualified_table()
        )
    }
}

fn qualify(table: &str, schema: Option<&str>) -> String {
    match schema {
        Some(schema) => format!("{}.{}", schema, table),
        None => table.to_string(),
    }
}

/// The four policies that make `table` visible and writable only to its owner.
///
/// SELECT and DELETE filter with `USING`, INSERT validates with `WITH CHECK`,
/// UPDATE does both so a row can't be handed to another owner.
pub fn owner_policies(table: &str, schema: Option<&str>) -> Vec<RlsPolicy> {
    [
        RlsCommand::Select,
        RlsCommand::Insert,
        RlsCommand::Update,
        RlsCommand::Delete,
    ]
    .into_iter()
    .map(|command| {
        let (using, check) = match command {
            RlsCommand::Insert => (None, Some(OWNER_CHECK.to_string())),
            RlsCommand::Update => (Some(OWNER_CHECK.to_string()), Some(OWNER_CHECK.to_string())),
            _ => (Some(OWNER_CHECK.to_string()), None),
        };
        RlsPolicy {
            name: format!("Users can {} own {}", command.verb(), table.replace('_', " ")),
            table: table.to_string(),
            command,
            using,
            check,
            schema: schema.map(str::to_string),
        }
    })
    .collect()
}

pub fn enable_rls_sql(table: &str, schema: Option<&str>) -> String {
    format!(
        "ALTER TABLE {} ENABLE ROW LEVEL SECURITY;",
        qualify(table, schema)
    )
}

pub fn disable_rls_sql(table: &str, schema: Option<&str>) -> String {
    format!(
        "ALTER TABLE {} DISABLE ROW LEVEL SECURITY;",
        qualify(table, schema)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_policies_cover_crud() {
        let policies = owner_policies("sleep_entries", Some("public"));
        let commands: Vec<_> = policies.iter().map(|p| p.command).collect();
        assert_eq!(
            commands,
            vec![
                RlsCommand::Select,
                RlsCommand::Insert,
                RlsCommand::Update,
                RlsCommand::Delete
            ]
        );
        assert!(policies
            .iter()
            .all(|p| p.create_policy_sql().contains(" TO authenticated ")));
    }

    #[test]
    fn test_create_policy_sql() {
        let policies = owner_policies("habit_completions", Some("public"));
        assert_eq!(
            policies[0].create_policy_sql(),
            "CREATE POLICY \"Users can view own habit completions\" ON public.habit_completions \
             FOR SELECT TO authenticated USING (auth.uid() = user_id);"
        );
        assert_eq!(
            policies[1].create_policy_sql(),
            "CREATE POLICY \"Users can insert own habit completions\" ON public.habit_completions \
             FOR INSERT TO authenticated WITH CHECK (auth.uid() = user_id);"
        );
        assert!(policies[2]
            .create_policy_sql()
            .ends_with("USING (auth.uid() = user_id) WITH CHECK (auth.uid() = user_id);"));
    }

    #[test]
    fn test_drop_and_toggle_sql() {
        let policy = &owner_policies("notes", None)[3];
        assert_eq!(
            policy.drop_policy_sql(),
            "DROP POLICY IF EXISTS \"Users can delete own notes\" ON notes;"
        );
        assert_eq!(
            enable_rls_sql("notes", Some("public")),
            "ALTER TABLE public.notes ENABLE ROW LEVEL SECURITY;"
        );
        assert_eq!(
            disable_rls_sql("notes", None),
            "ALTER TABLE notes DISABLE ROW LEVEL SECURITY;"
        );
    }
}
