use std::{
    collections::BTreeMap,
    io,
    ops::Bound,
    path::Path,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::{future::BoxFuture, stream, StreamExt};
use tokio::io::AsyncWrite;

use crate::{
    adapters::ObjectStore,
    fs::{LocalFile, LocalFs, TokioFs},
    model::{
        error::StoreError,
        object::{ListPage, ObjectBody, ObjectRef},
    },
};

#[derive(Clone, Debug)]
enum Behavior {
    Ok,
    NotFound,
    FailAfter(usize),
    Short(usize),
}

#[derive(Clone, Debug)]
struct MockObject {
    body: Vec<u8>,
    behavior: Behavior,
}

/// Counts live handles and remembers the highest count seen.
#[derive(Debug, Default)]
pub struct HandleCounter {
    open: AtomicUsize,
    peak: AtomicUsize,
}

impl HandleCounter {
    fn acquire(self: &Arc<Self>) -> HandleGuard {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        HandleGuard(self.clone())
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct HandleGuard(Arc<HandleCounter>);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.0.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory bucket with paged listing and per-key failure injection.
pub struct MockClient {
    objects: Mutex<BTreeMap<String, MockObject>>,
    page_size: usize,
    chunk_size: usize,
    scripted_pages: Option<Vec<ListPage>>,
    failing_list_page: Option<usize>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
    bodies: Arc<HandleCounter>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: 1000,
            chunk_size: 3,
            scripted_pages: None,
            failing_list_page: None,
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            bodies: Arc::new(HandleCounter::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fails the nth list call (1-based).
    pub fn with_failing_list_page(mut self, page: usize) -> Self {
        self.failing_list_page = Some(page);
        self
    }

    /// Serves these pages in order, ignoring tokens and stored objects.
    pub fn with_scripted_pages(mut self, pages: Vec<ListPage>) -> Self {
        self.scripted_pages = Some(pages);
        self
    }

    fn put(&self, key: &str, body: &[u8], behavior: Behavior) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            MockObject {
                body: body.to_vec(),
                behavior,
            },
        );
    }

    pub fn insert(&self, key: &str, body: &[u8]) {
        self.put(key, body, Behavior::Ok);
    }

    /// Listed, but get_object reports not found.
    pub fn insert_missing(&self, key: &str) {
        self.put(key, b"", Behavior::NotFound);
    }

    /// Body stream errors after `fail_after` bytes.
    pub fn insert_broken(&self, key: &str, body: &[u8], fail_after: usize) {
        self.put(key, body, Behavior::FailAfter(fail_after));
    }

    /// Listed with the full size but the body ends after `len` bytes.
    pub fn insert_short(&self, key: &str, body: &[u8], len: usize) {
        self.put(key, body, Behavior::Short(len));
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> &HandleCounter {
        &self.bodies
    }

    fn chunks(&self, body: &[u8]) -> Vec<io::Result<Bytes>> {
        body.chunks(self.chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect()
    }
}

impl ObjectStore for MockClient {
    fn list_objects<'a>(
        &'a self,
        _bucket: &'a str,
        prefix: Option<&'a str>,
        continuation_token: Option<String>,
    ) -> BoxFuture<'a, Result<ListPage, StoreError>> {
        Box::pin(async move {
            let page = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;

            if self.failing_list_page == Some(page) {
                return Err(StoreError::Request(format!("page {} unavailable", page)));
            }

            if let Some(pages) = &self.scripted_pages {
                return Ok(pages.get(page - 1).cloned().unwrap_or_default());
            }

            let objects = self.objects.lock().unwrap();
            let start = match &continuation_token {
                Some(tok) => Bound::Excluded(tok.clone()),
                None => Bound::Unbounded,
            };

            let mut matching = objects
                .range((start, Bound::Unbounded))
                .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)));

            let listed: Vec<ObjectRef> = matching
                .by_ref()
                .take(self.page_size)
                .map(|(key, o)| ObjectRef::with_size(key.clone(), o.body.len() as u64))
                .collect();
            let is_truncated = matching.next().is_some();
            let next_token = if is_truncated {
                listed.last().map(|o| o.key.clone())
            } else {
                None
            };

            Ok(ListPage {
                objects: listed,
                next_token,
                is_truncated,
            })
        })
    }

    fn get_object<'a>(
        &'a self,
        _bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<ObjectBody, StoreError>> {
        Box::pin(async move {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;

            let object = self.objects.lock().unwrap().get(key).cloned();
            let object = match object {
                None => return Err(StoreError::NotFound(key.to_string())),
                Some(object) => object,
            };

            let items = match object.behavior {
                Behavior::NotFound => return Err(StoreError::NotFound(key.to_string())),
                Behavior::Ok => self.chunks(&object.body),
                Behavior::Short(len) => self.chunks(&object.body[..len]),
                Behavior::FailAfter(n) => {
                    let mut items = self.chunks(&object.body[..n]);
                    items.push(Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "connection reset",
                    )));
                    items
                }
            };

            let guard = self.bodies.acquire();
            let body = stream::iter(items).then(move |item| {
                let _held = &guard;
                async move {
                    tokio::task::yield_now().await;
                    item
                }
            });

            Ok(body.boxed())
        })
    }
}

struct CountedFile {
    inner: Option<LocalFile>,
    _guard: HandleGuard,
}

impl AsyncWrite for CountedFile {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.inner.as_mut() {
            Some(inner) => inner.as_mut().poll_write(cx, buf),
            None => Poll::Ready(Err(io::Error::from_raw_os_error(libc::ENOSPC))),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.inner.as_mut() {
            Some(inner) => inner.as_mut().poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.inner.as_mut() {
            Some(inner) => inner.as_mut().poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

/// Real filesystem where writes to the named files fail with `ENOSPC`.
pub struct FullDiskFs {
    inner: TokioFs,
    full: Vec<String>,
    files: Arc<HandleCounter>,
}

impl FullDiskFs {
    pub fn new(full: &[&str]) -> Self {
        Self {
            inner: TokioFs,
            full: full.iter().map(|name| name.to_string()).collect(),
            files: Arc::new(HandleCounter::default()),
        }
    }

    pub fn files(&self) -> &HandleCounter {
        &self.files
    }

    fn is_full(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.full.iter().any(|full| name.starts_with(full.as_str()))
    }
}

impl LocalFs for FullDiskFs {
    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        self.inner.create_dir_all(path)
    }

    fn create_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<LocalFile>> {
        Box::pin(async move {
            let inner = if self.is_full(path) {
                // The file itself still exists, only writes fail.
                self.inner.create_file(path).await?;
                None
            } else {
                Some(self.inner.create_file(path).await?)
            };

            Ok(Box::pin(CountedFile {
                inner,
                _guard: self.files.acquire(),
            }) as LocalFile)
        })
    }

    fn rename<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        self.inner.rename(from, to)
    }

    fn remove_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        self.inner.remove_file(path)
    }
}
