//! Data sources consulted by the access engine.

use std::future::Future;

use tokio_postgres::Row;

use super::grant::{Actor, RoleGrant, ServiceInfo, Session};
use crate::client::GenericClient;
use crate::config::TableNames;
use crate::error::{CrudError, CrudResult};
use crate::ident::sql_ident;
use crate::value::FieldValue;

/// Read access to sessions, users, the service catalog, role grants and
/// record ownership. `delete_session` is the only write.
pub trait AccessStore: Send + Sync {
    fn find_session(
        &self,
        user_id: &str,
        token: &str,
    ) -> impl Future<Output = CrudResult<Option<Session>>> + Send;

    /// Remove a stale session; returns the number of rows removed.
    fn delete_session(
        &self,
        user_id: &str,
        token: &str,
    ) -> impl Future<Output = CrudResult<u64>> + Send;

    fn find_actor(&self, user_id: &str) -> impl Future<Output = CrudResult<Option<Actor>>> + Send;

    fn find_service(
        &self,
        name: &str,
    ) -> impl Future<Output = CrudResult<Option<ServiceInfo>>> + Send;

    /// Active grants whose service id is in `service_ids` and whose group is in `groups`.
    fn role_grants(
        &self,
        service_ids: &[String],
        groups: &[String],
    ) -> impl Future<Output = CrudResult<Vec<RoleGrant>>> + Send;

    /// Number of rows of `table` among `record_ids` whose `created_by` is `user_id`.
    fn count_owned(
        &self,
        table: &str,
        record_ids: &[String],
        user_id: &str,
    ) -> impl Future<Output = CrudResult<u64>> + Send;
}

/// [`AccessStore`] over a PostgreSQL connection.
pub struct PgAccessStore<'a, C> {
    client: &'a C,
    tables: &'a TableNames,
}

impl<'a, C: GenericClient> PgAccessStore<'a, C> {
    pub fn new(client: &'a C, tables: &'a TableNames) -> Self {
        Self { client, tables }
    }
}

fn column(row: &Row, name: &str) -> CrudResult<FieldValue> {
    row.try_get::<_, FieldValue>(name)
        .map_err(|e| CrudError::decode(name, e.to_string()))
}

fn text(row: &Row, name: &str) -> CrudResult<String> {
    match column(row, name)? {
        FieldValue::String(s) => Ok(s),
        FieldValue::Integer(i) => Ok(i.to_string()),
        FieldValue::Null => Ok(String::new()),
        other => Err(CrudError::decode(
            name,
            format!("expected text, got {}", other.type_name()),
        )),
    }
}

fn flag(row: &Row, name: &str) -> CrudResult<bool> {
    match column(row, name)? {
        FieldValue::Bool(b) => Ok(b),
        FieldValue::Null => Ok(false),
        other => Err(CrudError::decode(
            name,
            format!("expected bool, got {}", other.type_name()),
        )),
    }
}

fn millis(row: &Row, name: &str) -> CrudResult<i64> {
    match column(row, name)? {
        FieldValue::Integer(i) => Ok(i),
        FieldValue::Float(f) => Ok(f as i64),
        FieldValue::Timestamp(t) => Ok(t.timestamp_millis()),
        other => Err(CrudError::decode(
            name,
            format!("expected epoch millis, got {}", other.type_name()),
        )),
    }
}

/// Group lists are stored either as a text/uuid array or as a JSON array.
fn string_list(row: &Row, name: &str) -> CrudResult<Vec<String>> {
    match column(row, name)? {
        FieldValue::StringArray(items) => Ok(items),
        FieldValue::Null => Ok(Vec::new()),
        FieldValue::String(s) if s.trim_start().starts_with('[') => Ok(serde_json::from_str(&s)?),
        FieldValue::String(s) if s.is_empty() => Ok(Vec::new()),
        FieldValue::String(s) => Ok(vec![s]),
        other => Err(CrudError::decode(
            name,
            format!("expected a list of ids, got {}", other.type_name()),
        )),
    }
}

impl<C: GenericClient> AccessStore for PgAccessStore<'_, C> {
    async fn find_session(&self, user_id: &str, token: &str) -> CrudResult<Option<Session>> {
        let sql = format!(
            "SELECT user_id, token, login_name, expire FROM {} WHERE user_id = $1 AND token = $2",
            sql_ident(&self.tables.access_table)?
        );
        let user_id = FieldValue::from(user_id);
        let token = FieldValue::from(token);
        let row = self.client.query_opt(&sql, &[&user_id, &token]).await?;
        row.map(|row| -> CrudResult<Session> {
            Ok(Session {
                user_id: text(&row, "user_id")?,
                token: text(&row, "token")?,
                login_name: text(&row, "login_name")?,
                expire: millis(&row, "expire")?,
            })
        })
        .transpose()
    }

    async fn delete_session(&self, user_id: &str, token: &str) -> CrudResult<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = $1 AND token = $2",
            sql_ident(&self.tables.access_table)?
        );
        let user_id = FieldValue::from(user_id);
        let token = FieldValue::from(token);
        self.client.execute(&sql, &[&user_id, &token]).await
    }

    async fn find_actor(&self, user_id: &str) -> CrudResult<Option<Actor>> {
        let sql = format!(
            "SELECT id, groups, is_admin, is_active FROM {} WHERE id = $1",
            sql_ident(&self.tables.user_table)?
        );
        let id = FieldValue::from(user_id);
        let row = self.client.query_opt(&sql, &[&id]).await?;
        row.map(|row| -> CrudResult<Actor> {
            Ok(Actor {
                user_id: text(&row, "id")?,
                groups: string_list(&row, "groups")?,
                is_admin: flag(&row, "is_admin")?,
                is_active: flag(&row, "is_active")?,
            })
        })
        .transpose()
    }

    async fn find_service(&self, name: &str) -> CrudResult<Option<ServiceInfo>> {
        let sql = format!(
            "SELECT id, name, category FROM {} WHERE name = $1",
            sql_ident(&self.tables.service_table)?
        );
        let name = FieldValue::from(name);
        let row = self.client.query_opt(&sql, &[&name]).await?;
        row.map(|row| -> CrudResult<ServiceInfo> {
            Ok(ServiceInfo {
                id: text(&row, "id")?,
                name: text(&row, "name")?,
                category: text(&row, "category")?,
            })
        })
        .transpose()
    }

    async fn role_grants(
        &self,
        service_ids: &[String],
        groups: &[String],
    ) -> CrudResult<Vec<RoleGrant>> {
        if service_ids.is_empty() || groups.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT service_id, group_id, is_active, can_read, can_create, can_update, can_delete \
             FROM {} WHERE service_id = ANY($1) AND group_id = ANY($2) AND is_active = true",
            sql_ident(&self.tables.role_table)?
        );
        let service_ids = FieldValue::StringArray(service_ids.to_vec());
        let groups = FieldValue::StringArray(groups.to_vec());
        let rows = self.client.query(&sql, &[&service_ids, &groups]).await?;
        rows.iter()
            .map(|row| -> CrudResult<RoleGrant> {
                Ok(RoleGrant {
                    service_id: text(row, "service_id")?,
                    group_id: text(row, "group_id")?,
                    is_active: flag(row, "is_active")?,
                    can_read: flag(row, "can_read")?,
                    can_create: flag(row, "can_create")?,
                    can_update: flag(row, "can_update")?,
                    can_delete: flag(row, "can_delete")?,
                })
            })
            .collect()
    }

    async fn count_owned(&self, table: &str, record_ids: &[String], user_id: &str) -> CrudResult<u64> {
        if record_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE id = ANY($1) AND created_by = $2",
            sql_ident(table)?
        );
        let ids = FieldValue::StringArray(record_ids.to_vec());
        let owner = FieldValue::from(user_id);
        let row = self.client.query_one(&sql, &[&ids, &owner]).await?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| CrudError::decode("count", e.to_string()))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessRequest, TaskType, check_access};
    use crate::test_support::RecordingClient;

    fn tables() -> TableNames {
        TableNames {
            access_table: "app_sessions".to_string(),
            user_table: "app_users".to_string(),
            service_table: "app_services".to_string(),
            role_table: "app_roles".to_string(),
            ..TableNames::default()
        }
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn check_access_starts_with_the_session_lookup() {
        let client = RecordingClient::default();
        let tables = tables();
        let store = PgAccessStore::new(&client, &tables);
        let request = AccessRequest {
            user_id: "u1".to_string(),
            token: "tok".to_string(),
            task: TaskType::Read,
            table_name: "users".to_string(),
            record_ids: strings(&["a"]),
        };

        let err = check_access(&store, &request).await.unwrap_err();

        assert!(matches!(err, CrudError::Unauthenticated(_)));
        assert_eq!(
            client.statements(),
            vec![
                "SELECT user_id, token, login_name, expire FROM app_sessions \
                 WHERE user_id = $1 AND token = $2"
                    .to_string()
            ]
        );
        assert_eq!(client.bound(), vec![2]);
    }

    #[tokio::test]
    async fn lookups_read_the_configured_tables() {
        let client = RecordingClient::default();
        let tables = tables();
        let store = PgAccessStore::new(&client, &tables);

        assert_eq!(store.delete_session("u1", "tok").await.unwrap(), 1);
        assert!(store.find_actor("u1").await.unwrap().is_none());
        assert!(store.find_service("users").await.unwrap().is_none());

        assert_eq!(
            client.statements(),
            vec![
                "DELETE FROM app_sessions WHERE user_id = $1 AND token = $2".to_string(),
                "SELECT id, groups, is_admin, is_active FROM app_users WHERE id = $1".to_string(),
                "SELECT id, name, category FROM app_services WHERE name = $1".to_string(),
            ]
        );
        assert_eq!(client.bound(), vec![2, 1, 1]);
    }

    #[tokio::test]
    async fn role_grants_filter_by_service_group_and_activity() {
        let client = RecordingClient::default();
        let tables = tables();
        let store = PgAccessStore::new(&client, &tables);

        let grants = store
            .role_grants(&strings(&["a", "svc-users"]), &strings(&["staff"]))
            .await
            .unwrap();

        assert!(grants.is_empty());
        assert_eq!(
            client.statements(),
            vec![
                "SELECT service_id, group_id, is_active, can_read, can_create, can_update, \
                 can_delete FROM app_roles WHERE service_id = ANY($1) AND group_id = ANY($2) \
                 AND is_active = true"
                    .to_string()
            ]
        );
        assert_eq!(client.bound(), vec![2]);
    }

    #[tokio::test]
    async fn role_grants_without_groups_skip_the_query() {
        let client = RecordingClient::default();
        let tables = tables();
        let store = PgAccessStore::new(&client, &tables);

        assert!(store.role_grants(&strings(&["a"]), &[]).await.unwrap().is_empty());
        assert!(store.role_grants(&[], &strings(&["staff"])).await.unwrap().is_empty());
        assert!(client.statements().is_empty());
    }

    #[tokio::test]
    async fn count_owned_queries_the_target_table() {
        let client = RecordingClient::default();
        let tables = tables();
        let store = PgAccessStore::new(&client, &tables);

        // No row comes back from the double, so the count itself errors.
        assert!(store.count_owned("orders", &strings(&["a", "b"]), "u1").await.is_err());
        assert_eq!(store.count_owned("orders", &[], "u1").await.unwrap(), 0);

        assert_eq!(
            client.statements(),
            vec!["SELECT COUNT(*) FROM orders WHERE id = ANY($1) AND created_by = $2".to_string()]
        );
    }

    #[tokio::test]
    async fn invalid_table_names_are_rejected_before_any_query() {
        let client = RecordingClient::default();
        let tables = TableNames {
            access_table: "sessions; DROP TABLE users".to_string(),
            ..TableNames::default()
        };
        let store = PgAccessStore::new(&client, &tables);

        assert!(matches!(
            store.find_session("u1", "tok").await,
            Err(CrudError::InvalidIdentifier(_))
        ));
        assert!(store.count_owned("orders x", &strings(&["a"]), "u1").await.is_err());
        assert!(client.statements().is_empty());
    }
}
