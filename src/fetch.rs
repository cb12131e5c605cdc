use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::sync::CLIENT_ID;

const CONCURRENCY: usize = 8;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1000;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// HTML of one page, or why it could not be had.
pub struct FetchedPage {
    pub url: String,
    pub html: Option<String>,
    pub error: Option<String>,
    pub latency_ms: i64,
}

pub struct Fetcher {
    client: reqwest::Client,
    backoff_ms: u64,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(CLIENT_ID)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Fetcher {
            client,
            backoff_ms: BASE_BACKOFF_MS,
        })
    }

    /// Download a page, retrying rate limits and 5xx with exponential backoff.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        for attempt in 0..MAX_RETRIES {
            match self.fetch_once(url).await {
                Ok(html) => return Ok(html),
                Err(FetchError::Retryable(msg)) => {
                    let backoff = Duration::from_millis(self.backoff_ms * 2u64.pow(attempt));
                    warn!(
                        "{} on {} (attempt {}/{}), backing off {:.1}s",
                        msg,
                        url,
                        attempt + 1,
                        MAX_RETRIES,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(FetchError::Fatal(e)) => return Err(e),
            }
        }

        match self.fetch_once(url).await {
            Ok(html) => Ok(html),
            Err(FetchError::Retryable(msg)) => Err(anyhow!("{} on {} after {} retries", msg, url, MAX_RETRIES)),
            Err(FetchError::Fatal(e)) => Err(e),
        }
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Fatal(e.into()))?;
        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(FetchError::Retryable(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(FetchError::Fatal(anyhow!("HTTP {} fetching {}", status.as_u16(), url)));
        }
        response.text().await.map_err(|e| FetchError::Fatal(e.into()))
    }

    /// Fetch many pages concurrently. Results come back in completion order.
    pub async fn fetch_many(self: Arc<Self>, urls: Vec<String>) -> Vec<FetchedPage> {
        let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
        let total = urls.len();

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
        {
            pb.set_style(style.progress_chars("=> "));
        }

        let (tx, mut rx) = tokio::sync::mpsc::channel::<FetchedPage>(CONCURRENCY * 2);

        for url in urls {
            let fetcher = Arc::clone(&self);
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return;
                };
                let start = Instant::now();
                let result = fetcher.fetch_html(&url).await;
                let latency_ms = start.elapsed().as_millis() as i64;
                let page = match result {
                    Ok(html) => FetchedPage { url, html: Some(html), error: None, latency_ms },
                    Err(e) => {
                        warn!("Fetch failed for {}: {}", url, e);
                        FetchedPage { url, html: None, error: Some(e.to_string()), latency_ms }
                    }
                };
                let _ = tx.send(page).await;
            });
        }

        // rx closes once every task has dropped its sender
        drop(tx);

        let mut pages = Vec::with_capacity(total);
        let mut errors = 0usize;
        while let Some(page) = rx.recv().await {
            if page.error.is_some() {
                errors += 1;
            }
            pages.push(page);
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!("Fetched {} pages ({} ok, {} errors)", total, total - errors, errors);
        pages
    }
}

enum FetchError {
    Retryable(String),
    Fatal(anyhow::Error),
}
