use anyhow::{Context, Result, bail};

/// HTTP client trait so webhook delivery can be tested without a network
pub trait HttpClient: Send + Sync {
    /// POST a JSON body and return the response status code
    fn post_json(&self, url: &str, body: &str) -> Result<u16>;
}

/// Real HTTP client using reqwest
pub struct ReqwestClient;

impl HttpClient for ReqwestClient {
    fn post_json(&self, url: &str, body: &str) -> Result<u16> {
        let response = reqwest::blocking::Client::new()
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .with_context(|| format!("Failed to POST to URL: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP request failed with status {}: {}", status, url);
        }

        Ok(status.as_u16())
    }
}

/// Mock HTTP client that records requests
#[cfg(test)]
pub struct MockHttpClient {
    requests: std::sync::Mutex<Vec<(String, String)>>,
    fail: bool,
}

#[cfg(test)]
impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            requests: std::sync::Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// A client whose every request fails
    pub fn failing() -> Self {
        Self {
            requests: std::sync::Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Recorded (url, body) pairs
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl HttpClient for MockHttpClient {
    fn post_json(&self, url: &str, body: &str) -> Result<u16> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), body.to_string()));

        if self.fail {
            bail!("HTTP request failed with status 500 Internal Server Error: {}", url);
        }

        Ok(200)
    }
}
