use crate::graph::{Column, EntityType};
use crate::identity::Identity;
use crate::ipc::error::{auth_err, err};
use crate::ipc::types::{AppState, Request};
use crate::scope::Predicate;
use crate::service::ScopedQueryService;
use crate::store::{Page, SqliteStore, MAX_PAGE_SIZE};
use chrono::Utc;
use serde_json::Value;

/// Handler result: the `Err` side is already a rendered error response.
pub type Reply = Result<Value, Value>;

pub fn get_required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{key}"), None))
}

pub fn get_required_i64(req: &Request, key: &str) -> Result<i64, Value> {
    req.params.get(key).and_then(|v| v.as_i64()).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("params.{key} must be an integer"),
            None,
        )
    })
}

/// Optional positive integer; absent or null falls back to `default`.
pub fn get_optional_usize(req: &Request, key: &str, default: usize) -> Result<usize, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    format!("params.{key} must be a positive integer"),
                    None,
                )
            }),
    }
}

pub fn get_entity(req: &Request) -> Result<EntityType, Value> {
    let raw = get_required_str(req, "entity")?;
    EntityType::parse(raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("unknown entity: {raw}"),
            None,
        )
    })
}

/// Verifies `params.token` against the session codec.
pub fn authenticate(state: &AppState, req: &Request) -> Result<Identity, Value> {
    let Some(token) = req.params.get("token").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "not_authenticated", "missing params.token", None));
    };
    state
        .sessions
        .verify(token, Utc::now())
        .map_err(|e| auth_err(&req.id, &e))
}

pub fn service<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut ScopedQueryService<SqliteStore>, Value> {
    state
        .service
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn get_page(state: &AppState, req: &Request) -> Result<Page, Value> {
    let number = get_optional_usize(req, "page", 1)?;
    let size = get_optional_usize(req, "pageSize", state.page_size)?;
    if size > MAX_PAGE_SIZE {
        return Err(err(
            &req.id,
            "bad_params",
            format!("params.pageSize must be at most {MAX_PAGE_SIZE}"),
            None,
        ));
    }
    let page = Page::new(number, size);
    if page.offset().is_none() {
        return Err(err(&req.id, "bad_params", "params.page is out of range", None));
    }
    Ok(page)
}

/// `params.filter`: camelCase key column to integer (or null for IS NULL), ANDed.
pub fn get_filter(req: &Request) -> Result<Option<Predicate>, Value> {
    let filter = match req.params.get("filter") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(err(
                &req.id,
                "bad_params",
                "params.filter must be an object",
                None,
            ))
        }
    };
    let mut parts = Vec::with_capacity(filter.len());
    for (key, value) in filter {
        let Some(column) = Column::parse_json(key) else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("unknown filter column: {key}"),
                None,
            ));
        };
        let part = match value {
            Value::Null => Predicate::is_null(column),
            v => match v.as_i64() {
                Some(n) => Predicate::eq(column, n),
                None => {
                    return Err(err(
                        &req.id,
                        "bad_params",
                        format!("filter.{key} must be an integer or null"),
                        None,
                    ))
                }
            },
        };
        parts.push(part);
    }
    Ok(match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(Predicate::and(parts)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    fn request(params: Value) -> Request {
        Request {
            id: "1".to_string(),
            method: "records.list".to_string(),
            params,
        }
    }

    #[test]
    fn filter_builds_a_conjunction() {
        let req = request(json!({ "filter": { "lessonId": 3, "studentId": null } }));
        let filter = get_filter(&req).expect("filter").expect("some");
        assert_eq!(
            filter,
            Predicate::and([
                Predicate::eq(Column::LessonId, 3),
                Predicate::is_null(Column::StudentId),
            ])
        );
        let single = request(json!({ "filter": { "classId": 2 } }));
        assert_eq!(
            get_filter(&single).expect("filter"),
            Some(Predicate::eq(Column::ClassId, 2))
        );
    }

    #[test]
    fn filter_rejects_unknown_columns_and_values() {
        let unknown = request(json!({ "filter": { "score": 3 } }));
        let resp = get_filter(&unknown).expect_err("unknown column");
        assert_eq!(resp["error"]["code"], "bad_params");
        let text = request(json!({ "filter": { "lessonId": "3" } }));
        assert!(get_filter(&text).is_err());
    }

    #[test]
    fn entity_names_are_case_insensitive() {
        let req = request(json!({ "entity": "Attendance" }));
        assert_eq!(get_entity(&req).expect("entity"), EntityType::Attendance);
        let bad = request(json!({ "entity": "payroll" }));
        assert!(get_entity(&bad).is_err());
    }

    #[test]
    fn page_params_are_bounded() {
        let mut config = Config::default();
        config.session.secret = "helpers-secret".to_string();
        let state = AppState::new(&config);

        let default = get_page(&state, &request(json!({}))).expect("default page");
        assert_eq!(default, Page::new(1, config.query.page_size));

        let huge = request(json!({ "page": i64::MAX, "pageSize": 10 }));
        let resp = get_page(&state, &huge).expect_err("offset overflow");
        assert_eq!(resp["error"]["code"], "bad_params");

        let wide = request(json!({ "pageSize": MAX_PAGE_SIZE + 1 }));
        assert!(get_page(&state, &wide).is_err());
        let zero = request(json!({ "page": 0 }));
        assert!(get_page(&state, &zero).is_err());
    }
}
