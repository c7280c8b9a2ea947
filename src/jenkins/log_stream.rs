use std::time::Duration;

use futures::stream::{self, Stream, TryStreamExt};
use log::debug;
use tokio::time::sleep;

use super::client::JenkinsClient;
use super::types::BuildNumber;
use crate::error::Result;

enum Cursor {
    Start,
    From(u64),
    Done,
}

/// Console output of a build as a stream of text chunks.
///
/// The first request has no offset; later ones resume from the size the
/// server reported. The stream ends once the server stops announcing more
/// data or does not report a size. A failed fetch is yielded and ends it.
pub fn log_stream<'a>(
    client: &'a JenkinsClient,
    job: &'a str,
    number: &'a BuildNumber,
    poll_interval: Option<Duration>,
) -> impl Stream<Item = Result<String>> + 'a {
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let offset = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::From(offset) => {
                if let Some(interval) = poll_interval {
                    sleep(interval).await;
                }
                Some(offset)
            }
        };

        let chunk = client.fetch_log_chunk(job, number, offset).await?;
        let next = match (chunk.more_data, chunk.next_offset) {
            (true, Some(offset)) => Cursor::From(offset),
            _ => {
                debug!("{job} #{number}: log complete");
                Cursor::Done
            }
        };

        Ok(Some((chunk.text, next)))
    })
}

pub async fn collect_log<S>(chunks: S) -> Result<String>
where
    S: Stream<Item = Result<String>>,
{
    chunks
        .try_fold(String::new(), |mut log, chunk| async move {
            log.push_str(&chunk);
            Ok(log)
        })
        .await
}
