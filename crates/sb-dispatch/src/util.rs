use crate::constants::DEFAULT_HTTP_TIMEOUT;

pub fn default_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .gzip(true)
        .brotli(true)
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
}
