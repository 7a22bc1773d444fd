//! # List query parsing
//!
//! Turns raw query-string parameters into a validated [`ListQuery`]:
//! equality filters restricted to known fields, `order` tokens, `field`
//! projection and `page`/`size` pagination.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use utoipa::IntoParams;

use crate::{
    config::split_list,
    models::{ListQuery, OrderBy, PageWindow},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid page `{0}`")]
    InvalidPage(String),
    #[error("invalid size `{0}`")]
    InvalidSize(String),
    #[error("unknown field `{0}`")]
    UnknownField(String),
}

/// ListParams
///
/// The reserved list parameters, split from the equality filters.
/// Any other query parameter is a candidate filter.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// 1-based page number; pagination is applied only when present.
    pub page: Option<String>,
    /// Rows per page (defaults to the configured page size).
    pub size: Option<String>,
    /// Comma-separated sort keys; a leading `-` sorts descending.
    pub order: Option<String>,
    /// Comma-separated projection.
    pub field: Option<String>,
    #[serde(skip)]
    pub filters: HashMap<String, String>,
}

impl ListParams {
    pub fn from_map(mut params: HashMap<String, String>) -> Self {
        Self {
            page: non_empty(params.remove("page")),
            size: non_empty(params.remove("size")),
            order: non_empty(params.remove("order")),
            field: non_empty(params.remove("field")),
            filters: params,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses `order` tokens. `-name` is descending; `+name` and bare `name` are ascending.
pub fn parse_order(raw: &str) -> Vec<OrderBy> {
    split_list(raw)
        .into_iter()
        .filter_map(|token| {
            let (field, desc) = match token.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (token.strip_prefix('+').unwrap_or(&token), false),
            };
            let field = field.trim();
            if field.is_empty() {
                return None;
            }
            Some(if desc { OrderBy::desc(field) } else { OrderBy::asc(field) })
        })
        .collect()
}

fn parse_positive(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|n| *n > 0)
}

fn ensure_known(field: &str, known: &[String]) -> Result<(), QueryError> {
    if known.iter().any(|k| k == field) {
        Ok(())
    } else {
        Err(QueryError::UnknownField(field.to_string()))
    }
}

impl ListQuery {
    /// build
    ///
    /// Validates `params` against the model's `known` fields.
    /// - Filters naming unknown fields or carrying empty values are dropped.
    /// - Sort and projection fields must be known, otherwise the query is rejected.
    /// - Without `order`, rows are sorted by `id` descending when the model has an `id`.
    /// - `page` enables pagination with `offset = (page - 1) * size`.
    pub fn build(
        params: ListParams,
        known: &[String],
        default_page_size: u64,
    ) -> Result<Self, QueryError> {
        let filters = params
            .filters
            .into_iter()
            .filter(|(key, value)| !value.is_empty() && known.contains(key))
            .collect();

        let order = match params.order.as_deref() {
            Some(raw) => {
                let order = parse_order(raw);
                for key in &order {
                    ensure_known(&key.field, known)?;
                }
                order
            }
            None if known.iter().any(|k| k == "id") => vec![OrderBy::desc("id")],
            None => Vec::new(),
        };

        let fields = match params.field.as_deref() {
            Some(raw) => {
                let fields = split_list(raw);
                for field in &fields {
                    ensure_known(field, known)?;
                }
                Some(fields).filter(|f| !f.is_empty())
            }
            None => None,
        };

        let page = match params.page {
            Some(raw_page) => {
                let page =
                    parse_positive(&raw_page).ok_or(QueryError::InvalidPage(raw_page.clone()))?;
                let limit = match params.size {
                    Some(raw_size) => {
                        parse_positive(&raw_size).ok_or(QueryError::InvalidSize(raw_size))?
                    }
                    None => default_page_size,
                };
                let offset = (page - 1)
                    .checked_mul(limit)
                    .ok_or(QueryError::InvalidPage(raw_page))?;
                Some(PageWindow { offset, limit })
            }
            None => None,
        };

        Ok(Self { filters, order, fields, page })
    }
}
