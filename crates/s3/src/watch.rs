//! Bucket event watcher
//!
//! [`S3Client::watch`] opens one backend subscription and republishes its
//! records as [`Event`]s. A background task pumps records into two bounded
//! channels; the returned streams end as soon as the done token is
//! cancelled, whatever is still buffered.

use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use percent_encoding::percent_decode_str;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bucketfs_core::address::join_path;
use bucketfs_core::notification::{OBJECT_CREATED_PREFIX, OBJECT_REMOVED_PREFIX, parse_event_names};
use bucketfs_core::{BackendStream, Error, NotificationRecord, Result, validate_bucket_name};

use crate::client::S3Client;

/// What to watch for
#[derive(Debug, Clone, Default)]
pub struct WatchParams {
    /// `put` and/or `delete`
    pub events: Vec<String>,
    pub prefix: String,
    pub suffix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Create,
    Remove,
}

/// One object event
#[derive(Debug, Clone)]
pub struct Event {
    pub time: jiff::Timestamp,
    /// Object size; always zero for removals
    pub size: i64,
    /// Address of the affected object
    pub path: String,
    /// Client the watch was started on
    pub client: S3Client,
    pub kind: EventKind,
}

/// A running watch
///
/// Cancel `done` to stop it. Both streams end once `done` is cancelled or
/// the backend subscription closes.
///
/// One task feeds both streams through single-slot buffers. Drain `errors`
/// alongside `events`: once an undelivered error is buffered, the next
/// error blocks the task and with it further events.
pub struct WatchObject {
    pub events: BoxStream<'static, Event>,
    pub errors: BoxStream<'static, Error>,
    pub done: CancellationToken,
}

impl S3Client {
    /// Subscribe to create/remove events below the target
    ///
    /// An object key in the target acts as the prefix filter, so it cannot
    /// be combined with an explicit prefix.
    pub async fn watch(&self, params: &WatchParams) -> Result<WatchObject> {
        let guard = self.lock.lock().await;

        let (bucket, object) = self.bucket_and_object();
        validate_bucket_name(&bucket)?;
        let events = parse_event_names(&params.events)?;
        if !object.is_empty() && !params.prefix.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "object '{object}' and prefix '{}' cannot both be set",
                params.prefix
            )));
        }
        let prefix = if object.is_empty() {
            params.prefix.clone()
        } else {
            object.clone()
        };

        let done = CancellationToken::new();
        let records = self
            .api
            .listen_bucket_notification(&bucket, &prefix, &params.suffix, &events, done.clone())
            .map_err(|e| self.translate(e, &bucket, &object))?;
        drop(guard);

        tracing::debug!(bucket = %bucket, prefix = %prefix, suffix = %params.suffix, "watch started");

        let (event_tx, event_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(1);
        tokio::spawn(pump(
            self.clone(),
            bucket,
            records,
            event_tx,
            error_tx,
            done.clone(),
        ));

        Ok(WatchObject {
            events: until_done(event_rx, done.clone()),
            errors: until_done(error_rx, done.clone()),
            done,
        })
    }

    /// Check that the target can be unwatched
    ///
    /// No subscription state is kept per client; a watch is stopped by
    /// cancelling its done token.
    pub fn unwatch(&self, _params: &WatchParams) -> Result<()> {
        let (bucket, _) = self.bucket_and_object();
        validate_bucket_name(&bucket)
    }

    /// Event for one record, or `None` for event types other than
    /// creation and removal
    fn event_from_record(&self, record: NotificationRecord) -> Result<Option<Event>> {
        let kind = if record.event_name.starts_with(OBJECT_CREATED_PREFIX) {
            EventKind::Create
        } else if record.event_name.starts_with(OBJECT_REMOVED_PREFIX) {
            EventKind::Remove
        } else {
            return Ok(None);
        };

        let key = unescape_key(&record.key)?;
        let sep = self.target.separator;
        let path = if self.virtual_style {
            join_path(sep, &[&key])
        } else {
            join_path(sep, &[&record.bucket, &key])
        };

        Ok(Some(Event {
            time: record.event_time,
            size: match kind {
                EventKind::Create => record.size,
                EventKind::Remove => 0,
            },
            path: self.target.with_path(path).to_string(),
            client: self.clone(),
            kind,
        }))
    }
}

/// Decode a query-escaped object key
fn unescape_key(key: &str) -> Result<String> {
    let key = key.replace('+', " ");
    percent_decode_str(&key)
        .decode_utf8()
        .map(|k| k.into_owned())
        .map_err(|e| Error::InvalidArgument(format!("invalid escaped key '{key}': {e}")))
}

/// Send unless `done` fires first; false when nothing was delivered
async fn deliver<T>(tx: &mpsc::Sender<T>, value: T, done: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = done.cancelled() => false,
        sent = tx.send(value) => sent.is_ok(),
    }
}

async fn pump(
    client: S3Client,
    bucket: String,
    mut records: BackendStream<Vec<NotificationRecord>>,
    events: mpsc::Sender<Event>,
    errors: mpsc::Sender<Error>,
    done: CancellationToken,
) {
    'outer: loop {
        let next = tokio::select! {
            biased;
            _ = done.cancelled() => break,
            next = records.next() => next,
        };
        let batch = match next {
            Some(Ok(batch)) => batch,
            Some(Err(e)) => {
                tracing::debug!(bucket = %bucket, error = %e, "notification error");
                let err = client.translate(e, &bucket, "");
                if !deliver(&errors, err, &done).await && done.is_cancelled() {
                    break;
                }
                continue;
            }
            None => break,
        };

        for record in batch {
            match client.event_from_record(record) {
                Ok(Some(event)) => {
                    if !deliver(&events, event, &done).await {
                        break 'outer;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    if !deliver(&errors, err, &done).await && done.is_cancelled() {
                        break 'outer;
                    }
                }
            }
        }
    }
    tracing::debug!(bucket = %bucket, "watch stopped");
}

/// Receiver as a stream that ends when `done` is cancelled
fn until_done<T: Send + 'static>(mut rx: mpsc::Receiver<T>, done: CancellationToken) -> BoxStream<'static, T> {
    Box::pin(stream! {
        loop {
            let next = tokio::select! {
                biased;
                _ = done.cancelled() => None,
                next = rx.recv() => next,
            };
            match next {
                Some(value) => yield value,
                None => break,
            }
        }
    })
}
