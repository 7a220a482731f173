//! Pagination resolver.
//!
//! Derives a normalized [`Pageable`] from the query string once per request
//! and stores it in request extensions. Never rejects a request. A repeated
//! key keeps its first value; a query string that cannot be decoded
//! resolves to the defaults.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Query, Request};
use axum::http::Uri;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::pagination::{Pageable, PaginationQuery};

fn pageable_from_uri(uri: &Uri) -> Pageable {
    let pairs = match Query::<Vec<(String, String)>>::try_from_uri(uri) {
        Ok(Query(pairs)) => pairs,
        Err(e) => {
            debug!(error = %e, "Undecodable pagination query, using defaults");
            Vec::new()
        }
    };

    let mut query = PaginationQuery::default();
    for (key, value) in pairs {
        let slot = match key.as_str() {
            "perPage" => &mut query.per_page,
            "sort" => &mut query.sort,
            "direction" => &mut query.direction,
            "next_page_cursor" => &mut query.next_page_cursor,
            "prev_page_cursor" => &mut query.prev_page_cursor,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    Pageable::from_query(&query)
}

/// Middleware attaching the request's [`Pageable`].
pub async fn resolve_pagination(mut req: Request, next: Next) -> Response {
    let pageable = pageable_from_uri(req.uri());
    req.extensions_mut().insert(pageable);
    next.run(req).await
}

/// Extractor for the request's paging descriptor.
///
/// Uses the descriptor attached by [`resolve_pagination`], or derives one
/// from the URI on routes the resolver does not cover.
#[derive(Debug, Clone)]
pub struct Paging(pub Pageable);

impl<S> FromRequestParts<S> for Paging
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let pageable = parts
            .extensions
            .get::<Pageable>()
            .cloned()
            .unwrap_or_else(|| pageable_from_uri(&parts.uri));
        Ok(Paging(pageable))
    }
}
