//! Paginated remote enumeration
//!
//! Chains `list_objects` pages into one lazy stream of [`RemoteEntry`].

use std::collections::VecDeque;

use futures::Stream;
use futures::stream;
use jiff::Timestamp;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::path::ObjectKey;
use crate::traits::{ListOptions, MAX_KEYS_PER_PAGE, ObjectInfo, ObjectStore};

/// An object found in the bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    pub key: ObjectKey,

    /// Size in bytes
    pub size: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,
}

impl RemoteEntry {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: ObjectKey::new(key),
            size,
            last_modified: None,
        }
    }

    fn from_info(info: ObjectInfo) -> Self {
        Self {
            key: ObjectKey::new(info.key),
            size: info.size_bytes.unwrap_or(0).max(0) as u64,
            last_modified: info.last_modified,
        }
    }
}

/// Pagination state for one listing session
struct Session<'a> {
    store: &'a dyn ObjectStore,
    bucket: String,
    prefix: Option<String>,
    page_size: i32,
    keep_markers: bool,
    token: Option<String>,
    buffer: VecDeque<RemoteEntry>,
    pages: usize,
    exhausted: bool,
}

impl Session<'_> {
    async fn fetch_page(&mut self) -> Result<()> {
        let options = ListOptions {
            recursive: true,
            max_keys: Some(self.page_size),
            prefix: self.prefix.clone(),
            continuation_token: self.token.take(),
            ..Default::default()
        };

        let page = self
            .store
            .list_objects(&self.bucket, options)
            .await
            .map_err(|e| Error::RemoteList {
                bucket: self.bucket.clone(),
                source: Box::new(e),
            })?;

        self.pages += 1;
        debug!(
            bucket = %self.bucket,
            page = self.pages,
            items = page.items.len(),
            truncated = page.truncated,
            "Fetched listing page"
        );

        for info in page.items {
            if !self.keep_markers && (info.is_dir || info.key.ends_with('/')) {
                debug!(key = %info.key, "Skipping directory marker");
                continue;
            }
            self.buffer.push_back(RemoteEntry::from_info(info));
        }

        match (page.truncated, page.continuation_token) {
            (true, Some(token)) => self.token = Some(token),
            (true, None) => {
                warn!(bucket = %self.bucket, "Truncated listing without continuation token");
                self.exhausted = true;
            }
            (false, _) => self.exhausted = true,
        }
        Ok(())
    }
}

/// Lists every object in a bucket, page by page
#[derive(Clone, Copy)]
pub struct RemoteLister<'a> {
    store: &'a dyn ObjectStore,
    prefix: Option<&'a str>,
    page_size: i32,
    keep_markers: bool,
}

impl<'a> RemoteLister<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            prefix: None,
            page_size: MAX_KEYS_PER_PAGE,
            keep_markers: false,
        }
    }

    /// Only list keys starting with `prefix`
    pub fn with_prefix(mut self, prefix: &'a str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Also yield directory marker keys (those ending in `/`)
    pub fn with_markers(mut self) -> Self {
        self.keep_markers = true;
        self
    }

    /// Request smaller pages (clamped to 1..=1000)
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.clamp(1, MAX_KEYS_PER_PAGE);
        self
    }

    /// Stream every object in `bucket`
    ///
    /// Each call starts a new pagination session. A failed page yields one
    /// [`Error::RemoteList`] and ends the stream; entries already yielded stay
    /// valid.
    pub fn list(&self, bucket: &str) -> impl Stream<Item = Result<RemoteEntry>> + Send + use<'a> {
        let session = Session {
            store: self.store,
            bucket: bucket.to_string(),
            prefix: self.prefix.map(str::to_string),
            page_size: self.page_size,
            keep_markers: self.keep_markers,
            token: None,
            buffer: VecDeque::new(),
            pages: 0,
            exhausted: false,
        };

        stream::try_unfold(session, |mut session| async move {
            loop {
                if let Some(entry) = session.buffer.pop_front() {
                    return Ok(Some((entry, session)));
                }
                if session.exhausted {
                    return Ok(None);
                }
                session.fetch_page().await?;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ListResult, MockObjectStore};
    use futures::{StreamExt, TryStreamExt};
    use mockall::Sequence;

    fn page(keys: &[&str], next: Option<&str>) -> ListResult {
        ListResult {
            items: keys.iter().map(|k| ObjectInfo::file(*k, 10)).collect(),
            truncated: next.is_some(),
            continuation_token: next.map(str::to_string),
        }
    }

    fn expect_page(
        store: &mut MockObjectStore,
        seq: &mut Sequence,
        token: Option<&'static str>,
        result: Result<ListResult>,
    ) {
        let mut result = Some(result);
        store
            .expect_list_objects()
            .withf(move |bucket, options| {
                bucket == "photos"
                    && options.recursive
                    && options.continuation_token.as_deref() == token
            })
            .times(1)
            .in_sequence(seq)
            .returning(move |_, _| result.take().expect("page requested twice"));
    }

    #[tokio::test]
    async fn test_pages_are_chained_in_order() {
        let mut store = MockObjectStore::new();
        let mut seq = Sequence::new();
        expect_page(&mut store, &mut seq, None, Ok(page(&["a", "b"], Some("t1"))));
        expect_page(&mut store, &mut seq, Some("t1"), Ok(page(&["c"], Some("t2"))));
        expect_page(&mut store, &mut seq, Some("t2"), Ok(page(&["d"], None)));

        let keys: Vec<String> = RemoteLister::new(&store)
            .list("photos")
            .map_ok(|e| e.key.into_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_entries_then_ends() {
        let mut store = MockObjectStore::new();
        let mut seq = Sequence::new();
        expect_page(&mut store, &mut seq, None, Ok(page(&["a"], Some("t1"))));
        expect_page(
            &mut store,
            &mut seq,
            Some("t1"),
            Err(Error::Network("connection reset".into())),
        );

        let items: Vec<Result<RemoteEntry>> =
            RemoteLister::new(&store).list("photos").collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().key.as_str(), "a");
        assert!(matches!(
            &items[1],
            Err(Error::RemoteList { bucket, .. }) if bucket == "photos"
        ));
    }

    #[tokio::test]
    async fn test_directory_markers_are_skipped() {
        let mut store = MockObjectStore::new();
        store.expect_list_objects().times(1).returning(|_, _| {
            Ok(ListResult {
                items: vec![
                    ObjectInfo::file("img/", 0),
                    ObjectInfo::file("img/1.png", 3),
                    ObjectInfo::dir("docs/"),
                ],
                truncated: false,
                continuation_token: None,
            })
        });

        let entries: Vec<RemoteEntry> = RemoteLister::new(&store)
            .list("photos")
            .try_collect()
            .await
            .unwrap();
        assert_eq!(entries, vec![RemoteEntry::new("img/1.png", 3)]);
    }

    #[tokio::test]
    async fn test_markers_kept_on_request() {
        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .returning(|_, _| Ok(page(&["img/", "img/1.png"], None)));

        let keys: Vec<String> = RemoteLister::new(&store)
            .with_markers()
            .list("photos")
            .map_ok(|e| e.key.into_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(keys, vec!["img/", "img/1.png"]);
    }

    #[tokio::test]
    async fn test_prefix_is_sent_with_every_page() {
        let mut store = MockObjectStore::new();
        let mut seq = Sequence::new();
        store
            .expect_list_objects()
            .withf(|_, o| o.prefix.as_deref() == Some("img/") && o.continuation_token.is_none())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(page(&["img/1.png"], Some("t1"))));
        store
            .expect_list_objects()
            .withf(|_, o| o.prefix.as_deref() == Some("img/") && o.continuation_token.is_some())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(page(&["img/2.png"], None)));

        let entries: Vec<RemoteEntry> = RemoteLister::new(&store)
            .with_prefix("img/")
            .list("photos")
            .try_collect()
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_each_call_starts_a_new_session() {
        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .withf(|_, options| options.continuation_token.is_none())
            .times(2)
            .returning(|_, _| Ok(page(&["only"], None)));

        let lister = RemoteLister::new(&store);
        for _ in 0..2 {
            let entries: Vec<RemoteEntry> = lister.list("photos").try_collect().await.unwrap();
            assert_eq!(entries.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_truncated_without_token_stops() {
        let mut store = MockObjectStore::new();
        store.expect_list_objects().times(1).returning(|_, _| {
            Ok(ListResult {
                items: vec![ObjectInfo::file("x", 1)],
                truncated: true,
                continuation_token: None,
            })
        });

        let entries: Vec<RemoteEntry> = RemoteLister::new(&store)
            .list("photos")
            .try_collect()
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_page_size_is_clamped() {
        let store = MockObjectStore::new();
        assert_eq!(RemoteLister::new(&store).with_page_size(0).page_size, 1);
        assert_eq!(
            RemoteLister::new(&store).with_page_size(5000).page_size,
            MAX_KEYS_PER_PAGE
        );
    }
}
