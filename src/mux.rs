//! Readiness multiplexing over a set of links.
//!
//! A single task waits on every watched link at once and wakes up with the
//! first one that delivers a whole record. Waits never time out.

use crate::error::{Result, RingError};
use crate::transport::Link;
use crate::wire::Frame;
use futures::{future, StreamExt};
use std::fmt::Display;

/// The first link that produced something, and what it produced.
pub struct Ready<K> {
    pub key: K,
    pub frame: Result<Frame>,
}

/// Function that blocks until one of `links` has a record (or its end of stream) ready.
///
/// Links already seen closing are skipped. Records left unread on the other
/// links stay buffered inside them for the next wait.
pub async fn wait_any<'a, K, I>(links: I) -> Result<Ready<K>>
where
    K: Copy + Display,
    I: IntoIterator<Item = (K, &'a mut Link)>,
{
    let waits: Vec<_> = links
        .into_iter()
        .filter(|(_, link)| !link.is_closed())
        .map(|(key, link)| {
            Box::pin(async move {
                let next = link.framed_mut().next().await;
                (key, link, next)
            })
        })
        .collect();

    if waits.is_empty() {
        return Err(RingError::Multiplex(
            "no open connection left to wait on".to_string(),
        ));
    }

    let ((key, link, next), _, _) = future::select_all(waits).await;
    let frame = link.settle(next, key);
    Ok(Ready { key, frame })
}
