//! Log sinks for the two push channels. Each runs until shutdown or until its
//! stream fails; a failure on one channel leaves the other running.

use futures_util::StreamExt;
use lib_feedpulse::{EventRouter, EventStream};
use tokio_util::sync::CancellationToken;

pub async fn log_feed_updates(router: EventRouter, shutdown: CancellationToken) {
    drain("feed-update", router.feed_updates(), shutdown, |update| {
        log::info!(
            "Feed {} has {} new article(s): {:?}",
            update.feed_id,
            update.article_ids.len(),
            update.article_ids
        );
    })
    .await;
}

pub async fn log_article_states(router: EventRouter, shutdown: CancellationToken) {
    drain("article-state-change", router.article_states(), shutdown, |change| {
        if change.options.is_unconstrained() {
            log::info!("All articles: {} = {}", change.state, change.value);
        } else {
            log::info!("Articles matching {:?}: {} = {}", change.options, change.state, change.value);
        }
    })
    .await;
}

async fn drain<T, F>(channel: &str, mut events: EventStream<T>, shutdown: CancellationToken, mut on_event: F)
where
    F: FnMut(T),
{
    log::info!("Listening for '{}' events.", channel);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = events.next() => match next {
                Some(Ok(event)) => on_event(event),
                Some(Err(e)) => {
                    log::error!("'{}' stream failed: {}", channel, e);
                    break;
                }
                None => break,
            },
        }
    }
    log::info!("Stopped listening for '{}' events.", channel);
}
