//! Test utilities for showroom.
//!
//! Provides a scripted network, test data factories, a temporary directory
//! helper and assertion macros for use across all test modules.
//!
//! # Usage
//!
//! ```rust,ignore
//! use showroom::test_utils::*;
//!
//! let fetcher = ScriptedFetcher::new();
//! fetcher.respond("https://cars.example/", 200, "<html>home</html>");
//! fetcher.set_online(false);
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};

use crate::core::models::{FetchRequest, FetchResponse};
use crate::error::{Result, ShowroomError};
use crate::worker::Fetcher;

// =============================================================================
// Scripted network
// =============================================================================

#[derive(Debug, Clone)]
enum Reply {
    Respond(FetchResponse),
    Fail(String),
}

/// In-memory [`Fetcher`] with per-URL answers and an online switch.
///
/// Unscripted URLs answer 404. While offline every fetch fails with
/// [`ShowroomError::Network`], like a browser fetch with no connection.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    offline: AtomicBool,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(url: &str) -> String {
        reqwest::Url::parse(url).map_or_else(|_| url.to_string(), |u| u.to_string())
    }

    /// Answer `url` with a status and body (replaces any earlier script).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn respond(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.respond_with(url, FetchResponse::network(status, body));
    }

    /// Answer `url` with a full response, headers included.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn respond_with(&self, url: &str, response: FetchResponse) {
        self.replies
            .lock()
            .expect("replies lock")
            .insert(Self::normalize(url), Reply::Respond(response));
    }

    /// Fail fetches of `url` at the network level.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail(&self, url: &str, message: &str) {
        self.replies
            .lock()
            .expect("replies lock")
            .insert(Self::normalize(url), Reply::Fail(message.to_string()));
    }

    /// Switch the whole network on or off.
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Delay every answer (to exercise concurrency).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("delay lock") = delay;
    }

    /// Number of fetches attempted, online or not.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request seen, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());

        let delay = *self.delay.lock().expect("delay lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let url = request.url.to_string();
        if self.offline.load(Ordering::SeqCst) {
            return Err(ShowroomError::Network {
                url,
                message: "network is offline".to_string(),
            });
        }

        let reply = self.replies.lock().expect("replies lock").get(&url).cloned();
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(ShowroomError::Network { url, message }),
            None => Ok(FetchResponse::network(404, "not found")),
        }
    }
}

// =============================================================================
// Test Data Factories
// =============================================================================

/// A valid lead form body.
#[must_use]
pub fn make_test_lead_json() -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "phone": "(555) 123-4567",
        "vehicle": "Porsche 911 GT3",
        "budget": "150k-200k",
        "timeline": "1-3 months"
    })
}

/// A valid booking form body.
#[must_use]
pub fn make_test_booking_json() -> Value {
    json!({
        "firstName": "Grace",
        "lastName": "Hopper",
        "email": "grace@example.com",
        "phone": "555-987-6543",
        "brand": "Ferrari",
        "trim": "296 GTB",
        "creditScore": "750+",
        "timeline": "ASAP"
    })
}

/// A valid credit application body.
#[must_use]
pub fn make_test_credit_json() -> Value {
    json!({
        "firstName": "Katherine",
        "lastName": "Johnson",
        "email": "katherine@example.com",
        "phone": "5551234567",
        "dateOfBirth": "1980-08-26",
        "ssn": "123-45-6789",
        "address": "1 Orbit Way",
        "city": "Hampton",
        "state": "VA",
        "zipCode": "23666",
        "employmentStatus": "Employed",
        "employer": "NASA",
        "monthlyIncome": "12000",
        "vehicle": "Lamborghini Urus",
        "downPayment": "40000",
        "housingStatus": "Own"
    })
}

/// Sample config TOML content for testing.
#[must_use]
pub fn make_test_config_toml() -> String {
    r#"[general]
timeout_seconds = 5
log_level = "debug"

[edge]
origin = "https://cars.example"

[worker]
version = "v3"

[sheets]
webhook_url = "https://sheets.example/append"

[email]
api_key = "re_test"
to = "sales@cars.example"
"#
    .to_string()
}

// =============================================================================
// Temporary directories
// =============================================================================

/// An isolated temporary directory removed on drop.
///
/// ```rust,ignore
/// use showroom::test_utils::TestDir;
///
/// let dir = TestDir::new();
/// dir.create_file("config.toml", "[general]\ntimeout_seconds = 30");
/// assert!(dir.file_exists("config.toml"));
/// ```
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Create a file with the given content, creating parents as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.inner.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
    }

    /// Read a file from the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.inner.path().join(name))
    }

    #[must_use]
    pub fn file_exists(&self, name: &str) -> bool {
        self.inner.path().join(name).exists()
    }

    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
///
/// ```rust,ignore
/// use showroom::assert_contains;
///
/// assert_contains!("Lead submitted successfully!", "submitted");
/// ```
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string does NOT contain a substring.
#[macro_export]
macro_rules! assert_not_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            !haystack.contains(needle),
            "Expected string NOT to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}
