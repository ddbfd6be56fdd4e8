use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::{HttpClient, HttpError, HttpResponse};

/// Scripted HTTP client for tests.
///
/// Responses queued for a URL are returned in order; the last queued
/// response keeps being returned once the queue is down to one entry.
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, VecDeque<Result<HttpResponse, String>>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: HttpResponse) -> &Self {
        self.push(url, Ok(response));
        self
    }

    pub fn fail(&self, url: &str, message: &str) -> &Self {
        self.push(url, Err(message.to_string()));
        self
    }

    fn push(&self, url: &str, response: Result<HttpResponse, String>) {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|called| called.as_str() == url)
            .count()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        self.calls.lock().unwrap().push(url.to_string());

        let mut responses = self.responses.lock().unwrap();
        let queue = responses.get_mut(url).ok_or_else(|| HttpError::Transport {
            url: url.to_string(),
            message: "no mock response registered".to_string(),
        })?;

        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };

        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(HttpError::Transport {
                url: url.to_string(),
                message,
            }),
            None => Err(HttpError::Transport {
                url: url.to_string(),
                message: "no mock response registered".to_string(),
            }),
        }
    }
}
