//! Paginated object listing and the key/time filters applied on top of it.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, TryStreamExt};
use tracing::debug;

use crate::client::{with_deadline, ClientError, ObjectClient};
use crate::error::{Result, StoreError};

pub const JSON_SUFFIX: &str = ".json";

/// One entry of a raw listing page, before any filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

/// A single page returned by [`ObjectClient::list_page`]
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ListedObject>,
    /// Present while more pages remain
    pub next_continuation_token: Option<String>,
}

/// Key and modification time of a JSON object, as observed at listing time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// Whether `key` names a JSON object.
///
/// The key must end with `.json` and be longer than the suffix itself. A bare
/// root-level `/.json` is rejected too; nested keys such as `logs/.json` are
/// kept.
pub fn is_json_key(key: &str) -> bool {
    if key.len() <= JSON_SUFFIX.len() {
        return false;
    }
    match key.strip_suffix(JSON_SUFFIX) {
        Some(stem) => !stem.is_empty() && stem != "/",
        None => false,
    }
}

/// Whether `object` was modified strictly after `cutoff`. Objects without a
/// modification time never qualify.
pub fn is_modified_after(object: &ListedObject, cutoff: DateTime<Utc>) -> bool {
    object
        .last_modified
        .map(|modified| modified > cutoff)
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ListOptions {
    pub page_size: Option<i32>,
    pub timeout: Option<Duration>,
}

struct Cursor {
    token: Option<String>,
    seen: HashSet<String>,
    exhausted: bool,
    pages: usize,
}

/// Lazily list every object under `prefix`, following continuation tokens
/// until the store reports no further pages.
///
/// The stream is finite and single-use: it owns its cursor and cannot be
/// rewound. A page is only requested once the previous one has been consumed.
pub(crate) fn paginate<'a, C>(
    client: &'a C,
    bucket: &'a str,
    prefix: &'a str,
    options: ListOptions,
) -> impl Stream<Item = Result<ListedObject>> + 'a
where
    C: ObjectClient + ?Sized,
{
    let cursor = Cursor {
        token: None,
        seen: HashSet::new(),
        exhausted: false,
        pages: 0,
    };

    stream::try_unfold(cursor, move |mut cursor| async move {
        if cursor.exhausted {
            return Ok(None);
        }

        let page = with_deadline(
            options.timeout,
            client.list_page(bucket, prefix, cursor.token.as_deref(), options.page_size),
        )
        .await
        .map_err(|source| StoreError::list(bucket, prefix, source))?;

        cursor.pages += 1;
        debug!(
            bucket,
            prefix,
            page = cursor.pages,
            objects = page.objects.len(),
            truncated = page.next_continuation_token.is_some(),
            "Fetched listing page"
        );

        match page.next_continuation_token {
            // Any token seen before means the listing cycles and would never end
            Some(next) if !cursor.seen.insert(next.clone()) => {
                return Err(StoreError::list(
                    bucket,
                    prefix,
                    ClientError::transport(format!(
                        "listing returned continuation token '{}' twice",
                        next
                    )),
                ));
            }
            Some(next) => cursor.token = Some(next),
            None => cursor.exhausted = true,
        }

        Ok::<_, StoreError>(Some((page.objects, cursor)))
    })
    .map_ok(|objects| stream::iter(objects.into_iter().map(Ok::<_, StoreError>)))
    .try_flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;
    use chrono::TimeZone;

    fn listed(key: &str, last_modified: Option<DateTime<Utc>>) -> ListedObject {
        ListedObject {
            key: key.to_string(),
            last_modified,
            size: 0,
        }
    }

    #[test]
    fn json_suffix_filter() {
        assert!(is_json_key("a.json"));
        assert!(is_json_key("reports/2024/01/summary.json"));
        assert!(!is_json_key("reports/summary.jsonl"));
        assert!(!is_json_key("reports/summary.JSON"));
        assert!(!is_json_key("reports/"));
    }

    #[test]
    fn short_and_empty_stem_keys_are_rejected_without_panicking() {
        assert!(!is_json_key(""));
        assert!(!is_json_key("json"));
        assert!(!is_json_key(".json"));
        assert!(!is_json_key("/.json"));
        // Multi-byte keys shorter than the suffix in chars but not in bytes
        assert!(!is_json_key("é.js"));
        assert!(is_json_key("é.json"));
    }

    #[test]
    fn nested_bare_suffix_keys_are_kept() {
        assert!(is_json_key("logs/.json"));
        assert!(is_json_key("daily/.json"));
        assert!(is_json_key("a//.json"));
    }

    #[test]
    fn modified_after_is_strict() {
        let cutoff = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let later = cutoff + chrono::Duration::milliseconds(1);
        let earlier = cutoff - chrono::Duration::seconds(1);

        assert!(is_modified_after(&listed("a.json", Some(later)), cutoff));
        assert!(!is_modified_after(&listed("a.json", Some(cutoff)), cutoff));
        assert!(!is_modified_after(&listed("a.json", Some(earlier)), cutoff));
        assert!(!is_modified_after(&listed("a.json", None), cutoff));
    }

    #[tokio::test]
    async fn paginate_follows_every_page() {
        let client = MemoryClient::new().with_page_size(2).with_bucket("b");
        let now = Utc::now();
        for i in 0..5 {
            client.insert("b", &format!("data/{}.json", i), "{}", now);
        }
        client.insert("b", "other/skip.json", "{}", now);

        let keys: Vec<String> = paginate(&client, "b", "data/", ListOptions::default())
            .map_ok(|object| object.key)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            keys,
            vec![
                "data/0.json",
                "data/1.json",
                "data/2.json",
                "data/3.json",
                "data/4.json"
            ]
        );
        assert_eq!(client.list_calls(), 3);
    }

    #[tokio::test]
    async fn paginate_is_lazy() {
        let client = MemoryClient::new().with_page_size(1).with_bucket("b");
        let now = Utc::now();
        for key in ["a.json", "b.json", "c.json"] {
            client.insert("b", key, "{}", now);
        }

        let stream = paginate(&client, "b", "", ListOptions::default());
        futures::pin_mut!(stream);
        let first = stream.try_next().await.unwrap().unwrap();

        assert_eq!(first.key, "a.json");
        assert_eq!(client.list_calls(), 1);
    }

    #[tokio::test]
    async fn empty_listing_makes_a_single_call() {
        let client = MemoryClient::new().with_bucket("b");
        let objects: Vec<ListedObject> = paginate(&client, "b", "nothing/", ListOptions::default())
            .try_collect()
            .await
            .unwrap();
        assert!(objects.is_empty());
        assert_eq!(client.list_calls(), 1);
    }

    /// Hands out a fixed next token for each token it receives
    struct CyclingClient {
        next: fn(Option<&str>) -> &'static str,
    }

    #[async_trait::async_trait]
    impl ObjectClient for CyclingClient {
        async fn list_page(
            &self,
            _bucket: &str,
            _prefix: &str,
            continuation_token: Option<&str>,
            _max_keys: Option<i32>,
        ) -> std::result::Result<ListPage, ClientError> {
            Ok(ListPage {
                objects: vec![listed("a.json", None)],
                next_continuation_token: Some((self.next)(continuation_token).to_string()),
            })
        }

        async fn get_object(
            &self,
            _: &str,
            _: &str,
        ) -> std::result::Result<bytes::Bytes, ClientError> {
            Err(ClientError::NotFound)
        }

        async fn put_object(
            &self,
            _: &str,
            _: &str,
            _: bytes::Bytes,
        ) -> std::result::Result<(), ClientError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn echoed_token_is_a_list_error() {
        let client = CyclingClient { next: |_| "A" };
        let result: Result<Vec<ListedObject>> =
            paginate(&client, "b", "", ListOptions::default())
                .try_collect()
                .await;
        assert!(matches!(result, Err(StoreError::List { .. })));
    }

    #[tokio::test]
    async fn token_cycle_is_a_list_error() {
        // None -> A -> B -> A
        let client = CyclingClient {
            next: |token| match token {
                Some("A") => "B",
                _ => "A",
            },
        };
        let result: Result<Vec<ListedObject>> =
            paginate(&client, "b", "", ListOptions::default())
                .try_collect()
                .await;
        match result {
            Err(StoreError::List { source, .. }) => {
                assert!(source.to_string().contains("'A' twice"));
            }
            other => panic!("expected list error, got {other:?}"),
        }
    }
}
