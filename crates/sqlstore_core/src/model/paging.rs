//! Paging parameters and result pages.

use serde::{Deserialize, Serialize};

/// Requested page window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingParams {
    pub skip: Option<u64>,
    pub take: Option<u64>,
    /// Requests a total count alongside the page.
    #[serde(default)]
    pub total: bool,
}

impl PagingParams {
    pub fn new(skip: Option<u64>, take: Option<u64>, total: bool) -> Self {
        Self { skip, take, total }
    }

    /// Page size capped at `max_take`; `max_take` when unset.
    pub fn take_or(&self, max_take: u64) -> u64 {
        self.take.map_or(max_take, |take| take.min(max_take))
    }
}

/// One page of items, with the matching count when it was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPage<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl<T> DataPage<T> {
    pub fn new(data: Vec<T>, total: Option<u64>) -> Self {
        Self { data, total }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
