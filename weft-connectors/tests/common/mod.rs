//! Common fixtures for connector integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use weft_core::query::{Find, FindRequest, MemoryFind, Page};
use weft_core::FetchError;

/// Memory-backed `Find` whose datastreams fail a set number of times first
pub struct FlakyFind {
    inner: MemoryFind,
    remaining: Mutex<HashMap<String, u32>>,
}

impl FlakyFind {
    pub fn new(inner: MemoryFind) -> Self {
        Self {
            inner,
            remaining: Mutex::new(HashMap::new()),
        }
    }

    /// Fail the next `times` calls for `id`
    pub fn failing(self, id: &str, times: u32) -> Self {
        self.remaining.lock().unwrap().insert(id.to_string(), times);
        self
    }

    pub fn calls(&self) -> usize {
        self.inner.calls()
    }
}

#[async_trait]
impl Find for FlakyFind {
    async fn find(&self, request: FindRequest) -> Result<Page, FetchError> {
        let fail = {
            let mut remaining = self.remaining.lock().unwrap();
            match remaining.get_mut(&request.datastream_id) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        };

        if fail {
            return Err(FetchError::Status {
                status: 502,
                message: "bad gateway".into(),
            });
        }
        self.inner.find(request).await
    }
}
