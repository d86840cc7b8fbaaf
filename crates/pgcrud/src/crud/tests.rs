use super::*;
use crate::access::tests::{MemoryAccessStore, actor, grant, store_for};
use crate::audit::AuditAck;
use crate::builder::InsertMode;
use crate::query::{QueryGroup, QueryItem};
use crate::test_support::RecordingClient;
use crate::value::record;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    async fn record(
        &self,
        _action: AuditAction,
        _actor_id: &str,
        _entry: &AuditEntry,
    ) -> CrudResult<AuditAck> {
        Err(CrudError::Connection("audit db down".into()))
    }
}

#[derive(Default)]
struct CapturingSink {
    entries: Mutex<Vec<(AuditAction, String, AuditEntry)>>,
}

#[async_trait]
impl AuditSink for CapturingSink {
    async fn record(
        &self,
        action: AuditAction,
        actor_id: &str,
        entry: &AuditEntry,
    ) -> CrudResult<AuditAck> {
        self.entries
            .lock()
            .unwrap()
            .push((action, actor_id.to_string(), entry.clone()));
        Ok(AuditAck {
            message: "ok".into(),
        })
    }
}

fn crud() -> Crud {
    Crud::new(CrudOptions::new())
}

fn no_access() -> MemoryAccessStore {
    MemoryAccessStore::default()
}

fn ada() -> Record {
    record([("name", FieldValue::from("ada")), ("age", FieldValue::from(36))])
}

#[tokio::test]
async fn save_with_id_is_an_update() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users").records(vec![record([
        ("id", FieldValue::from("u1")),
        ("name", FieldValue::from("ada")),
    ])]);

    let res = crud().save_with(&client, &no_access(), &params).await;

    assert_eq!(res.code, ResponseCode::Success);
    assert_eq!(res.message, "Record(s) updated successfully");
    assert_eq!(res.value.record_ids, vec!["u1".to_string()]);
    assert_eq!(res.value.record_count, 1);
    assert_eq!(
        client.statements(),
        vec![
            "BEGIN".to_string(),
            "UPDATE users SET name='ada' WHERE id='u1'".to_string(),
            "COMMIT".to_string(),
        ]
    );
}

#[tokio::test]
async fn save_without_id_creates_with_bound_values() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users").records(vec![ada()]);

    let res = crud().save_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert_eq!(res.message, "Record(s) created successfully");
    assert_eq!(res.value.record_count, 1);
    assert_eq!(
        client.statements(),
        vec![
            "BEGIN".to_string(),
            "INSERT INTO users(age, name) VALUES($1, $2) RETURNING id".to_string(),
            "COMMIT".to_string(),
        ]
    );
}

#[tokio::test]
async fn literal_insert_mode_inlines_values() {
    let client = RecordingClient::default();
    let crud = Crud::new(CrudOptions::new().insert_mode(InsertMode::Literal));
    let params = CrudParams::new("users").records(vec![ada()]);

    let res = crud.save_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert_eq!(
        client.statements()[1],
        "INSERT INTO users(age, name) VALUES(36, 'ada') RETURNING id"
    );
}

#[tokio::test]
async fn empty_id_is_stripped_on_create() {
    let client = RecordingClient::default();
    let mut rec = ada();
    rec.insert("id".into(), FieldValue::from(""));
    let params = CrudParams::new("users").records(vec![rec]);

    let res = crud().save_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert!(!client.statements()[1].contains("id,"));
}

#[tokio::test]
async fn mixed_create_and_update_is_rejected() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users").records(vec![
        record([("id", FieldValue::from("u1")), ("name", FieldValue::from("ada"))]),
        record([("name", FieldValue::from("bob"))]),
    ]);

    let res = crud().save_with(&client, &no_access(), &params).await;

    assert_eq!(res.code, ResponseCode::SaveError);
    assert!(res.message.contains("not both at the same time"));
    assert!(client.statements().is_empty());
}

#[tokio::test]
async fn integer_id_is_an_update() {
    let client = RecordingClient::default();
    let crud = Crud::new(CrudOptions::new().check_access(true));
    let mut store = store_for(actor("u1", false, true));
    store.grants.push(grant("7", TaskType::Update));
    let params = CrudParams::new("users").user("u1", "tok").records(vec![record([
        ("id", FieldValue::from(7)),
        ("name", FieldValue::from("ada")),
    ])]);

    let res = crud.save_with(&client, &store, &params).await;

    assert_eq!(res.code, ResponseCode::Success, "{}", res.message);
    assert_eq!(res.value.record_ids, vec!["7".to_string()]);
    assert_eq!(
        client.statements(),
        vec![
            "BEGIN".to_string(),
            "UPDATE users SET name='ada' WHERE id=7".to_string(),
            "COMMIT".to_string(),
        ]
    );
}

#[tokio::test]
async fn boolean_id_is_a_params_error() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users").records(vec![record([
        ("id", FieldValue::from(true)),
        ("name", FieldValue::from("ada")),
    ])]);

    let res = crud().save_with(&client, &no_access(), &params).await;

    assert_eq!(res.code, ResponseCode::ParamsError);
    assert!(res.message.contains("string or an integer"));
    assert!(client.statements().is_empty());
}

#[tokio::test]
async fn copy_mode_streams_the_batch() {
    let client = RecordingClient::default();
    let crud = Crud::new(CrudOptions::new().insert_mode(InsertMode::Copy));
    let params = CrudParams::new("users").records(vec![ada(), ada()]);

    let res = crud.save_with(&client, &no_access(), &params).await;

    assert!(res.is_success(), "{}", res.message);
    assert_eq!(res.value.record_count, 2);
    assert!(res.value.record_ids.is_empty());
    assert_eq!(
        client.statements(),
        vec![
            "BEGIN".to_string(),
            "SELECT age, name FROM users LIMIT 0".to_string(),
            "COPY users (age, name) FROM STDIN BINARY".to_string(),
            "COMMIT".to_string(),
        ]
    );
    assert_eq!(client.copied().len(), 2);
    assert_eq!(client.copied()[1][1], FieldValue::from("ada"));
}

#[tokio::test]
async fn failed_copy_rolls_back() {
    let client = RecordingClient::failing_on(3);
    let crud = Crud::new(CrudOptions::new().insert_mode(InsertMode::Copy));
    let params = CrudParams::new("users").records(vec![ada()]);

    let res = crud.save_with(&client, &no_access(), &params).await;

    assert_eq!(res.code, ResponseCode::InsertError);
    assert_eq!(client.statements().last().map(String::as_str), Some("ROLLBACK"));
}

#[tokio::test]
async fn open_transaction_nests_through_a_savepoint() {
    let client = RecordingClient::in_open_transaction();
    let params = CrudParams::new("users").records(vec![ada()]);

    let res = crud().save_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    let statements = client.statements();
    assert_eq!(statements.len(), 3);
    let name = statements[0]
        .strip_prefix("SAVEPOINT ")
        .expect("savepoint first");
    assert_eq!(statements[2], format!("RELEASE SAVEPOINT {name}"));
    assert!(!statements.iter().any(|s| s == "BEGIN" || s == "COMMIT"));
}

#[tokio::test]
async fn failure_inside_open_transaction_rolls_back_to_the_savepoint() {
    let client = RecordingClient::failing_on(2).with_open_transaction();
    let params = CrudParams::new("users").ids(["a"]);

    let res = crud().delete_with(&client, &no_access(), &params).await;

    assert_eq!(res.code, ResponseCode::DeleteError);
    let statements = client.statements();
    let name = statements[0]
        .strip_prefix("SAVEPOINT ")
        .expect("savepoint first");
    assert_eq!(
        statements.last(),
        Some(&format!("ROLLBACK TO SAVEPOINT {name}"))
    );
    assert!(!statements.iter().any(|s| s == "ROLLBACK"));
}

#[tokio::test]
async fn failed_insert_rolls_back() {
    let client = RecordingClient::failing_on(2);
    let params = CrudParams::new("users").records(vec![ada(), ada()]);

    let res = crud().save_with(&client, &no_access(), &params).await;

    assert_eq!(res.code, ResponseCode::InsertError);
    assert_eq!(
        client.statements(),
        vec![
            "BEGIN".to_string(),
            "INSERT INTO users(age, name) VALUES($1, $2) RETURNING id".to_string(),
            "ROLLBACK".to_string(),
        ]
    );
}

#[tokio::test]
async fn single_record_with_ids_updates_by_ids() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users")
        .records(vec![record([("active", FieldValue::from(false))])])
        .ids(["a", "b"]);

    let res = crud().save_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert_eq!(
        client.statements()[1],
        "UPDATE users SET active=false WHERE id IN ('a', 'b')"
    );
}

#[tokio::test]
async fn single_record_with_condition_updates_by_predicate() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users")
        .records(vec![record([("active", FieldValue::from(false))])])
        .query(vec![QueryGroup::new(vec![QueryItem::new("age", "gt", 60)])]);

    let res = crud().save_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert_eq!(
        client.statements()[1],
        "UPDATE users SET active=false WHERE (age>60)"
    );
}

#[tokio::test]
async fn invalid_condition_executes_nothing() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users")
        .records(vec![record([("active", FieldValue::from(false))])])
        .query(vec![QueryGroup::new(vec![QueryItem::new("age", "between", 60)])]);

    let res = crud().save_with(&client, &no_access(), &params).await;

    assert_eq!(res.code, ResponseCode::ParamsError);
    assert!(client.statements().is_empty());
}

#[tokio::test]
async fn audit_failure_keeps_the_write() {
    let client = RecordingClient::default();
    let crud = Crud::new(CrudOptions::new().log_create(true)).with_audit(Arc::new(FailingSink));
    let params = CrudParams::new("users").records(vec![ada()]);

    let res = crud.save_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert_eq!(
        res.message,
        "Record(s) created successfully | Audit-log-error: Connection error: audit db down"
    );
    assert_eq!(client.statements().last().map(String::as_str), Some("COMMIT"));
}

#[tokio::test]
async fn update_audit_captures_rows_before_the_write() {
    let client = RecordingClient::default();
    let sink = Arc::new(CapturingSink::default());
    let crud = Crud::new(CrudOptions::new().log_update(true)).with_audit(sink.clone());
    let params = CrudParams::new("users")
        .user("u1", "tok")
        .records(vec![record([
            ("id", FieldValue::from("r1")),
            ("name", FieldValue::from("ada")),
        ])]);

    let res = crud.save_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    let statements = client.statements();
    assert_eq!(statements[1], "SELECT * FROM users WHERE id IN ('r1')");
    assert!(statements[2].starts_with("UPDATE users"));

    let entries = sink.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, AuditAction::Update);
    assert_eq!(entries[0].1, "u1");
    assert_eq!(entries[0].2.table_name, "users");
}

#[tokio::test]
async fn audit_disabled_per_action() {
    let client = RecordingClient::default();
    let sink = Arc::new(CapturingSink::default());
    let crud = Crud::new(CrudOptions::new().log_update(true)).with_audit(sink.clone());
    let params = CrudParams::new("users").records(vec![ada()]);

    let res = crud.save_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert!(sink.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cached_read_skips_the_database() {
    let client = RecordingClient::default();
    let crud = crud();
    let params = CrudParams::new("users").ids(["u1"]);
    crud.cache()
        .set("users", &params.hash_key(), vec![ada()], Duration::from_secs(60));

    let res = crud.get_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert_eq!(res.value.table_records, vec![ada()]);
    assert_eq!(res.value.record_count, 1);
    assert!(client.statements().is_empty());
}

#[tokio::test]
async fn cached_empty_result_is_a_miss() {
    let client = RecordingClient::default();
    let crud = crud();
    let params = CrudParams::new("users");
    crud.cache()
        .set("users", &params.hash_key(), Vec::new(), Duration::from_secs(60));

    let res = crud.get_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert_eq!(client.statements(), vec!["SELECT * FROM users LIMIT 10000".to_string()]);
}

#[tokio::test]
async fn cached_page_is_not_served_for_another_page() {
    let client = RecordingClient::default();
    let crud = crud();
    let first = CrudParams::new("users").limit(1);
    let second = CrudParams::new("users").limit(50).skip(10);
    assert_ne!(first.hash_key(), second.hash_key());
    crud.cache()
        .set("users", &first.hash_key(), vec![ada()], Duration::from_secs(60));

    let res = crud.get_with(&client, &no_access(), &second).await;

    assert!(res.is_success());
    assert_eq!(res.value.record_count, 0);
    assert_eq!(
        client.statements(),
        vec!["SELECT * FROM users LIMIT 50 OFFSET 10".to_string()]
    );
}

#[tokio::test]
async fn disabled_cache_is_not_consulted() {
    let client = RecordingClient::default();
    let crud = Crud::new(CrudOptions::new().cache_enabled(false));
    let params = CrudParams::new("users").ids(["u1"]);
    crud.cache()
        .set("users", &params.hash_key(), vec![ada()], Duration::from_secs(60));

    let res = crud.get_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert_eq!(client.statements().len(), 1);
}

#[tokio::test]
async fn writes_invalidate_the_table_cache() {
    let client = RecordingClient::default();
    let crud = crud();
    let read = CrudParams::new("users").ids(["u1"]);
    crud.cache()
        .set("users", &read.hash_key(), vec![ada()], Duration::from_secs(60));
    crud.cache()
        .set("roles", "k", vec![ada()], Duration::from_secs(60));

    let write = CrudParams::new("users").records(vec![ada()]);
    assert!(crud.save_with(&client, &no_access(), &write).await.is_success());

    assert!(crud.cache().get("users", &read.hash_key()).is_none());
    assert!(crud.cache().get("roles", "k").is_some());
}

#[tokio::test]
async fn read_applies_projection_sort_and_limits() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users")
        .query(vec![QueryGroup::new(vec![QueryItem::new("name", "startsWith", "a")])])
        .project([("name".to_string(), true)].into())
        .sort([("name".to_string(), "desc".to_string())].into())
        .limit(50_000)
        .skip(-5);

    let res = crud().get_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert_eq!(
        client.statements(),
        vec![
            "SELECT id, name FROM users WHERE (name LIKE 'a%') ORDER BY name DESC LIMIT 10000"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn read_compile_error_is_a_params_error() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users")
        .query(vec![QueryGroup::new(vec![QueryItem::new("age", "contains", 3)])]);

    let res = crud().get_with(&client, &no_access(), &params).await;

    assert_eq!(res.code, ResponseCode::ParamsError);
    assert!(client.statements().is_empty());
}

#[tokio::test]
async fn slow_query_times_out() {
    let client = RecordingClient::slow(Duration::from_millis(500));
    let crud = Crud::new(CrudOptions::new().query_timeout(Duration::from_millis(20)));
    let params = CrudParams::new("users");

    let res = crud.get_with(&client, &no_access(), &params).await;

    assert_eq!(res.code, ResponseCode::ReadError);
    assert!(res.message.contains("timeout"));
}

#[tokio::test]
async fn denied_access_executes_nothing() {
    let client = RecordingClient::default();
    let crud = Crud::new(CrudOptions::new().check_access(true));
    let store = store_for(actor("u1", false, true));
    let params = CrudParams::new("users").user("u1", "tok").records(vec![ada()]);

    let res = crud.save_with(&client, &store, &params).await;

    assert_eq!(res.code, ResponseCode::UnAuthorized);
    assert!(client.statements().is_empty());
}

#[tokio::test]
async fn save_checks_the_session_table_first() {
    let client = RecordingClient::default();
    let crud = Crud::new(CrudOptions::new().check_access(true));
    let params = CrudParams::new("orders").user("u1", "tok").records(vec![ada()]);

    let res = crud.save(&client, &params).await;

    assert_eq!(res.code, ResponseCode::UnAuthorized);
    assert_eq!(
        client.statements(),
        vec![
            "SELECT user_id, token, login_name, expire FROM access_keys \
             WHERE user_id = $1 AND token = $2"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn granted_table_role_allows_create() {
    let client = RecordingClient::default();
    let crud = Crud::new(CrudOptions::new().check_access(true));
    let mut store = store_for(actor("u1", false, true));
    store.grants.push(grant("svc-users", TaskType::Create));
    let params = CrudParams::new("users").user("u1", "tok").records(vec![ada()]);

    let res = crud.save_with(&client, &store, &params).await;

    assert!(res.is_success());
    assert_eq!(client.statements().len(), 3);
}

#[tokio::test]
async fn expired_session_is_reported() {
    let client = RecordingClient::default();
    let crud = Crud::new(CrudOptions::new().check_access(true));
    let store = store_for(actor("u1", false, true));
    store.sessions.lock().unwrap()[0].expire = 0;
    let params = CrudParams::new("users").user("u1", "tok").ids(["a"]);

    let res = crud.get_with(&client, &store, &params).await;

    assert_eq!(res.code, ResponseCode::TokenExpired);
    assert!(store.queried("delete_session"));
    assert!(client.statements().is_empty());
}

#[tokio::test]
async fn lookup_skips_access_and_cache() {
    let client = RecordingClient::default();
    let crud = Crud::new(CrudOptions::new().check_access(true));
    let params = CrudParams::new("users").ids(["u1"]);
    crud.cache()
        .set("users", &params.hash_key(), vec![ada()], Duration::from_secs(60));

    let res = crud.lookup(&client, &params).await;

    assert!(res.is_success());
    assert_eq!(
        client.statements(),
        vec!["SELECT * FROM users WHERE id IN ('u1') LIMIT 10000".to_string()]
    );
}

#[tokio::test]
async fn delete_by_ids_runs_in_a_transaction() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users").ids(["a", "b"]);

    let res = crud().delete_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert_eq!(res.message, "Record(s) deleted successfully");
    assert_eq!(res.value.record_count, 1);
    assert_eq!(
        client.statements(),
        vec![
            "BEGIN".to_string(),
            "DELETE FROM users WHERE id IN ('a', 'b')".to_string(),
            "COMMIT".to_string(),
        ]
    );
}

#[tokio::test]
async fn delete_by_condition() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users")
        .query(vec![QueryGroup::new(vec![QueryItem::new("active", "eq", false)])]);

    let res = crud().delete_with(&client, &no_access(), &params).await;

    assert!(res.is_success());
    assert_eq!(client.statements()[1], "DELETE FROM users WHERE (active=false)");
}

#[tokio::test]
async fn delete_without_target_is_a_remove_error() {
    let client = RecordingClient::default();
    let params = CrudParams::new("users");

    let res = crud().delete_with(&client, &no_access(), &params).await;

    assert_eq!(res.code, ResponseCode::RemoveError);
    assert!(client.statements().is_empty());
}

#[tokio::test]
async fn failed_delete_maps_to_delete_error() {
    let client = RecordingClient::failing_on(2);
    let params = CrudParams::new("users").ids(["a"]);

    let res = crud().delete_with(&client, &no_access(), &params).await;

    assert_eq!(res.code, ResponseCode::DeleteError);
    assert_eq!(client.statements().last().map(String::as_str), Some("ROLLBACK"));
}

#[tokio::test]
async fn delete_all_wipes_the_table() {
    let client = RecordingClient::default();
    let res = crud().delete_all(&client, &CrudParams::new("users")).await;

    assert!(res.is_success());
    assert_eq!(client.statements(), vec!["DELETE FROM users".to_string()]);
}

#[test]
fn hash_key_is_canonical() {
    let a = CrudParams::new("users")
        .ids(["a"])
        .sort([("name".to_string(), "asc".to_string()), ("age".to_string(), "desc".to_string())].into());
    let b = CrudParams::new("users")
        .ids(["a"])
        .sort([("age".to_string(), "desc".to_string()), ("name".to_string(), "asc".to_string())].into());
    assert_eq!(a.hash_key(), b.hash_key());
    assert!(a.hash_key().starts_with("users"));

    let c = a.clone().ids(["b"]);
    assert_ne!(a.hash_key(), c.hash_key());
}

#[test]
fn params_deserialize_from_camel_case() {
    let params: CrudParams = serde_json::from_value(serde_json::json!({
        "tableName": "users",
        "recordIds": ["a"],
        "actionParams": [{"name": "ada"}],
        "limit": 5
    }))
    .unwrap();
    assert_eq!(params.table_name, "users");
    assert_eq!(params.record_ids, vec!["a".to_string()]);
    assert_eq!(params.action_params[0].get("name"), Some(&FieldValue::from("ada")));
    assert_eq!(params.limit, 5);
}

#[test]
fn response_serializes_camel_case() {
    let res = ResponseMessage::success(
        "ok",
        CrudOutcome {
            record_count: 2,
            ..Default::default()
        },
    );
    let json = serde_json::to_value(&res).unwrap();
    assert_eq!(json["code"], "success");
    assert_eq!(json["value"]["recordCount"], 2);
    assert!(json["value"]["tableRecords"].is_array());
}
