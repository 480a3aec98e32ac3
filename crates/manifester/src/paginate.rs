//! Offset/limit pagination over list endpoints
//!
//! List endpoints wrap their records in `{"body": [...]}` and take `offset`
//! and `limit` query parameters. A page shorter than the page size is the
//! last one.

use common::Secret;
use requester::{ApiRequest, Requester, RetryPolicy, send_with_retry};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::AllocationRecord;

#[derive(Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Page<T> {
    #[serde(default)]
    body: Vec<T>,
}

/// Fetch every record from `url`, `page_size` at a time.
///
/// A `page_size` of zero fetches one page without a limit.
pub async fn fetch_paginated<T, R>(
    requester: &R,
    policy: &RetryPolicy,
    token: &Secret<String>,
    url: &str,
    page_size: usize,
) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Requester + ?Sized,
{
    let mut records = Vec::new();
    let mut offset = 0usize;

    loop {
        let mut request = ApiRequest::get(url).bearer(token).query("offset", offset);
        if page_size > 0 {
            request = request.query("limit", page_size);
        }

        let response = send_with_retry(requester, &request, policy).await?;
        if !response.is_success() {
            return Err(Error::Http {
                status: response.status(),
                url: url.to_string(),
            });
        }

        let page: Page<T> = response.json()?;
        let count = page.body.len();
        records.extend(page.body);
        debug!(url, offset, count, "fetched page");

        if page_size == 0 || count != page_size {
            break;
        }
        offset += page_size;
    }

    Ok(records)
}

/// Keep only allocations whose name starts with `prefix`.
pub fn filter_by_prefix(records: Vec<AllocationRecord>, prefix: &str) -> Vec<AllocationRecord> {
    records
        .into_iter()
        .filter(|r| r.name.starts_with(prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use requester::{ApiResponse, Method, MockRequester};
    use serde_json::json;

    const URL: &str = "https://api.example.test/allocations/abc/pools";

    fn pools(range: std::ops::Range<usize>) -> serde_json::Value {
        let body: Vec<_> = range
            .map(|i| json!({"id": format!("pool-{i}"), "subscriptionName": "Red Hat Beta Access", "entitlementsAvailable": 8}))
            .collect();
        json!({ "body": body })
    }

    #[tokio::test]
    async fn collects_all_pages_without_duplicates() {
        let mock = MockRequester::new(|req| {
            match req.query_value("offset") {
                Some("0") => ApiResponse::with_json(200, &pools(0..50)),
                Some("50") => ApiResponse::with_json(200, &pools(50..54)),
                _ => ApiResponse::with_json(200, &json!({"body": []})),
            }
        });

        let token = Secret::from("at");
        let records: Vec<crate::model::Pool> =
            fetch_paginated(&mock, &RetryPolicy::default(), &token, URL, 50)
                .await
                .unwrap();

        assert_eq!(records.len(), 54);
        let mut ids: Vec<_> = records.iter().map(|p| p.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 54);

        let calls = mock.calls_to(Method::Get, "/pools");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].query_value("offset"), Some("50"));
        assert_eq!(calls[1].query_value("limit"), Some("50"));
        assert!(calls.iter().all(|c| c.bearer.is_some()));
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_empty_page() {
        let mock = MockRequester::new(|req| match req.query_value("offset") {
            Some("0") => ApiResponse::with_json(200, &pools(0..50)),
            _ => ApiResponse::with_json(200, &json!({"body": []})),
        });

        let records: Vec<crate::model::Pool> =
            fetch_paginated(&mock, &RetryPolicy::default(), &"at".into(), URL, 50)
                .await
                .unwrap();

        assert_eq!(records.len(), 50);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn error_status_is_http_error() {
        let mock = MockRequester::sequence(vec![ApiResponse::new(401, "unauthorized")]);

        let err = fetch_paginated::<crate::model::Pool, _>(
            &mock,
            &RetryPolicy::default(),
            &"at".into(),
            URL,
            50,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Http { status: 401, .. }), "got: {err:?}");
    }

    #[test]
    fn prefix_filter_drops_foreign_allocations() {
        let record = |name: &str| AllocationRecord {
            uuid: format!("uuid-{name}"),
            name: name.to_string(),
            allocation_type: None,
            version: None,
            entitlements_attached_quantity: None,
            simple_content_access: None,
        };
        let kept = filter_by_prefix(
            vec![record("qe-AbCdEfGh"), record("other-team"), record("qe-ZzYyXxWw")],
            "qe",
        );
        let names: Vec<_> = kept.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["qe-AbCdEfGh", "qe-ZzYyXxWw"]);
    }
}
