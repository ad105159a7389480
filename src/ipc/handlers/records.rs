use crate::capability::field_access;
use crate::ipc::error::{access_err, err, ok};
use crate::ipc::helpers::{
    authenticate, get_entity, get_filter, get_page, get_required_i64, service, Reply,
};
use crate::ipc::types::{AppState, Request};
use crate::service::{describe, project, Mutated, Mutation};
use serde_json::{json, Value};

fn handle_describe(state: &mut AppState, req: &Request) -> Reply {
    let identity = authenticate(state, req)?;
    let entity = get_entity(req)?;
    let description = describe(&identity, entity);
    Ok(ok(&req.id, json!(description)))
}

fn handle_list(state: &mut AppState, req: &Request) -> Reply {
    let identity = authenticate(state, req)?;
    let entity = get_entity(req)?;
    let filter = get_filter(req)?;
    let page = get_page(state, req)?;
    let visible = field_access(&identity, entity).visible;
    let svc = service(state, req)?;
    let listing = svc
        .list(&identity, entity, filter.as_ref(), Some(page))
        .map_err(|e| access_err(&req.id, &e))?;
    let rows: Vec<Value> = listing.rows.iter().map(|r| project(r, visible)).collect();
    Ok(ok(
        &req.id,
        json!({
            "rows": rows,
            "total": listing.total,
            "page": page.number,
            "pageSize": page.size
        }),
    ))
}

fn handle_get(state: &mut AppState, req: &Request) -> Reply {
    let identity = authenticate(state, req)?;
    let entity = get_entity(req)?;
    let id = get_required_i64(req, "id")?;
    let visible = field_access(&identity, entity).visible;
    let svc = service(state, req)?;
    let record = svc
        .get(&identity, entity, id)
        .map_err(|e| access_err(&req.id, &e))?;
    match record {
        Some(record) => Ok(ok(&req.id, json!({ "record": project(&record, visible) }))),
        None => Err(err(
            &req.id,
            "not_found",
            format!("{entity} {id} not found"),
            Some(json!({ "entity": entity, "id": id })),
        )),
    }
}

fn mutation_from(req: &Request) -> Result<Mutation, Value> {
    match req.method.as_str() {
        "records.create" => match req.params.get("record") {
            Some(record @ Value::Object(_)) => Ok(Mutation::Create {
                record: record.clone(),
            }),
            _ => Err(err(
                &req.id,
                "bad_params",
                "params.record must be an object",
                None,
            )),
        },
        "records.update" => {
            let id = get_required_i64(req, "id")?;
            let Some(Value::Object(patch)) = req.params.get("patch") else {
                return Err(err(
                    &req.id,
                    "bad_params",
                    "params.patch must be an object",
                    None,
                ));
            };
            Ok(Mutation::Update {
                id,
                patch: patch.clone(),
            })
        }
        _ => Ok(Mutation::Delete {
            id: get_required_i64(req, "id")?,
        }),
    }
}

fn handle_mutate(state: &mut AppState, req: &Request) -> Reply {
    let identity = authenticate(state, req)?;
    let entity = get_entity(req)?;
    let mutation = mutation_from(req)?;
    let visible = field_access(&identity, entity).visible;
    let svc = service(state, req)?;
    match svc
        .mutate(&identity, entity, mutation)
        .map_err(|e| access_err(&req.id, &e))?
    {
        Mutated::Written(record) => Ok(ok(&req.id, json!({ "record": project(&record, visible) }))),
        Mutated::Deleted { entity, id } => {
            Ok(ok(&req.id, json!({ "entity": entity, "deleted": id })))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let reply = match req.method.as_str() {
        "access.describe" => handle_describe(state, req),
        "records.list" => handle_list(state, req),
        "records.get" => handle_get(state, req),
        "records.create" | "records.update" | "records.delete" => handle_mutate(state, req),
        _ => return None,
    };
    Some(reply.unwrap_or_else(|e| e))
}
