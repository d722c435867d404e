//! Defines the endpoint for listing ledger entries a page at a time.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    ledger::{EntryFilter, EntryView, LedgerState, count_entries, list_entries},
    pagination::parse_positive_param,
};

/// The query string for listing entries. Every parameter is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntriesQuery {
    /// Only list entries from this `YYYY-MM` month.
    pub month: Option<String>,
    /// Only list entries of this type.
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    /// The one-based page number.
    pub page: Option<String>,
    /// The number of entries per page.
    pub page_size: Option<String>,
}

/// A page of entries and the numbers needed to page through the rest.
#[derive(Debug, Serialize, Deserialize)]
pub struct EntryList {
    /// The entries on this page, newest first.
    pub items: Vec<EntryView>,
    /// The one-based page number.
    pub page: u64,
    /// The maximum number of entries per page.
    pub page_size: u64,
    /// The number of entries across all pages.
    pub total: u64,
    /// The number of pages.
    pub total_pages: u64,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|value| value.trim()).filter(|value| !value.is_empty())
}

/// A route handler for listing live entries, newest first.
pub async fn list_entries_endpoint(
    State(state): State<LedgerState>,
    query: Result<Query<ListEntriesQuery>, QueryRejection>,
) -> Result<Json<EntryList>, Error> {
    let Query(query) = query.map_err(|rejection| {
        tracing::debug!("rejected query string: {rejection}");
        Error::Validation("invalid query string".to_owned())
    })?;

    let config = &state.pagination_config;
    let page = parse_positive_param(query.page.as_deref(), Error::InvalidPage)?;
    let page_size = parse_positive_param(
        query.page_size.as_deref(),
        Error::InvalidPageSize(config.max_page_size),
    )?;
    let page = config.page_request(page, page_size)?;

    let filter = EntryFilter {
        month: non_blank(query.month.as_ref())
            .map(str::parse)
            .transpose()?,
        entry_type: non_blank(query.entry_type.as_ref())
            .map(str::parse)
            .transpose()?,
    };

    let connection = state.database.connect()?;
    let total = count_entries(&filter, &connection)?;
    let items = list_entries(&filter, page, &connection)?
        .into_iter()
        .map(EntryView::from)
        .collect();

    Ok(Json(EntryList {
        items,
        page: page.page,
        page_size: page.page_size,
        total,
        total_pages: page.page_count(total),
    }))
}
