//! Tenant-scoped collections exposed through `/api/data/:collection`.
//!
//! Humans are served by a query built with the list toolkit and executed
//! under their own row-level security. Agents go through each collection's
//! fixed list procedure, which cannot search or filter, so the same rules are
//! applied in memory to a bounded fetch.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::database::DataStoreError;
use crate::error::ApiError;
use crate::filter::{
    apply_filters, apply_pagination, apply_search, filter_by_fields_in_memory, filter_in_memory, paginate_in_memory,
    CollectionQuery, FilterParams, ListQueryParams, Record, SortDirection,
};
use crate::middleware::{Actor, ActorType};

pub const SOFT_DELETE_PROCEDURE: &str = "soft_delete_record";
pub const RESTORE_PROCEDURE: &str = "restore_record";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub table: &'static str,
    /// Text columns matched by `q`
    pub search_columns: &'static [&'static str],
    /// Columns callers may filter on by exact value
    pub filter_fields: &'static [&'static str],
    /// Procedure returning every live row of a tenant, newest first
    pub agent_list_rpc: &'static str,
}

pub const COLLECTIONS: &[CollectionSpec] = &[
    CollectionSpec {
        name: "tasks",
        table: "tasks",
        search_columns: &["title", "description"],
        filter_fields: &["status", "priority", "assignee_id", "company_id"],
        agent_list_rpc: "list_tasks_for_tenant",
    },
    CollectionSpec {
        name: "companies",
        table: "companies",
        search_columns: &["name", "domain", "industry"],
        filter_fields: &["industry", "status"],
        agent_list_rpc: "list_companies_for_tenant",
    },
    CollectionSpec {
        name: "deals",
        table: "deals",
        search_columns: &["title", "notes"],
        filter_fields: &["stage", "company_id", "owner_id"],
        agent_list_rpc: "list_deals_for_tenant",
    },
    CollectionSpec {
        name: "documents",
        table: "documents",
        search_columns: &["title", "content"],
        filter_fields: &["kind", "folder_id"],
        agent_list_rpc: "list_documents_for_tenant",
    },
];

pub fn find_collection(name: &str) -> Option<&'static CollectionSpec> {
    COLLECTIONS.iter().find(|c| c.name == name)
}

/// One page of a collection listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage {
    pub records: Vec<Record>,
    pub page: u32,
    pub limit: u32,
    /// The agent fetch hit its cap, so matches beyond it were not considered
    pub truncated: bool,
}

/// Base query for a tenant: scoped and ordered newest first with `id` as tiebreak
pub fn tenant_query(spec: &CollectionSpec, tenant_id: &str) -> CollectionQuery {
    CollectionQuery::new(spec.table)
        .eq("tenant_id", tenant_id)
        .order_by("created_at", SortDirection::Desc)
        .order_by("id", SortDirection::Desc)
}

pub async fn list_page(
    actor: &Actor,
    spec: &CollectionSpec,
    params: &ListQueryParams,
    filters: &FilterParams,
    agent_fetch_cap: usize,
) -> Result<ListPage, ApiError> {
    match actor.actor_type {
        ActorType::Human => list_with_query(actor, spec, params, filters).await,
        ActorType::Agent => list_in_memory(actor, spec, params, filters, agent_fetch_cap).await,
    }
}

async fn list_with_query(
    actor: &Actor,
    spec: &CollectionSpec,
    params: &ListQueryParams,
    filters: &FilterParams,
) -> Result<ListPage, ApiError> {
    let query = tenant_query(spec, &actor.tenant_id);
    let query = apply_search(query, &params.q, spec.search_columns);
    let query = apply_filters(query, filters);
    let query = apply_pagination(query, params.page, params.limit);

    let records = actor.data_client.fetch(&query).await?;
    Ok(ListPage {
        records,
        page: params.page,
        limit: params.limit,
        truncated: false,
    })
}

async fn list_in_memory(
    actor: &Actor,
    spec: &CollectionSpec,
    params: &ListQueryParams,
    filters: &FilterParams,
    cap: usize,
) -> Result<ListPage, ApiError> {
    // One row past the cap tells us whether anything was cut off
    let result = actor
        .data_client
        .rpc(
            spec.agent_list_rpc,
            json!({ "p_tenant_id": actor.tenant_id, "p_limit": cap.saturating_add(1) }),
        )
        .await?;

    let mut rows = records_from_value(result)?;
    let truncated = rows.len() > cap;
    if truncated {
        warn!(
            "Agent listing of {} for tenant {} truncated at {} rows",
            spec.name, actor.tenant_id, cap
        );
        rows.truncate(cap);
    }

    let rows = filter_by_fields_in_memory(rows, filters);
    let rows = filter_in_memory(rows, &params.q, spec.search_columns);
    let records = paginate_in_memory(rows, params.page, params.limit);

    debug!("Agent {} listed {} {} rows", actor.actor_id, records.len(), spec.name);
    Ok(ListPage {
        records,
        page: params.page,
        limit: params.limit,
        truncated,
    })
}

pub async fn soft_delete(actor: &Actor, spec: &CollectionSpec, id: &str) -> Result<Value, ApiError> {
    record_action(actor, spec, id, SOFT_DELETE_PROCEDURE).await
}

pub async fn restore(actor: &Actor, spec: &CollectionSpec, id: &str) -> Result<Value, ApiError> {
    record_action(actor, spec, id, RESTORE_PROCEDURE).await
}

async fn record_action(actor: &Actor, spec: &CollectionSpec, id: &str, procedure: &str) -> Result<Value, ApiError> {
    if !actor.actor_type.may_delete_or_restore() {
        return Err(ApiError::forbidden(format!(
            "{} callers cannot delete or restore records",
            actor.actor_type
        )));
    }

    let result = actor
        .data_client
        .rpc(procedure, json!({ "p_table": spec.table, "p_id": id }))
        .await?;
    Ok(result)
}

fn records_from_value(value: Value) -> Result<Vec<Record>, DataStoreError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(rows) => rows
            .into_iter()
            .map(|row| match row {
                Value::Object(record) => Ok(record),
                other => Err(DataStoreError::QueryError(format!("expected a row object, got {}", other))),
            })
            .collect(),
        other => Err(DataStoreError::QueryError(format!("expected a row set, got {}", other))),
    }
}
