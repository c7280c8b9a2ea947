use log::debug;
use reqwest::header::HeaderMap;

use super::JenkinsClient;
use crate::error::Result;
use crate::jenkins::types::{BuildNumber, LogChunk};

const MORE_DATA_HEADER: &str = "x-more-data";
const TEXT_SIZE_HEADER: &str = "x-text-size";

impl JenkinsClient {
    /// Fetches console output from `offset` onwards (from the start when `None`).
    ///
    /// The returned offset is never behind the requested one, even if the
    /// server reports a smaller size.
    pub async fn fetch_log_chunk(
        &self,
        job: &str,
        number: &BuildNumber,
        offset: Option<u64>,
    ) -> Result<LogChunk> {
        let mut url = self.job_url(job, &[number.as_str(), "logText", "progressiveText"])?;
        if let Some(offset) = offset {
            url.query_pairs_mut().append_pair("start", &offset.to_string());
        }

        let response = self
            .get(&format!("Fetching log of {job} #{number}"), url)
            .await?;

        let more_data = more_data(response.headers());
        let text_size = text_size(response.headers());
        let text = response.text().await?;

        let next_offset = text_size.map(|size| size.max(offset.unwrap_or(0)));
        debug!(
            "{job} #{number}: {} bytes from {offset:?}, more={more_data}, next={next_offset:?}",
            text.len()
        );

        Ok(LogChunk {
            text,
            more_data,
            next_offset,
        })
    }
}

fn more_data(headers: &HeaderMap) -> bool {
    headers
        .get(MORE_DATA_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<bool>().ok())
        .unwrap_or(false)
}

fn text_size(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(TEXT_SIZE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
