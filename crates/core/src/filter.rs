use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Default,
    Asc,
    Desc,
}

impl Order {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Order::Asc,
            "desc" | "descending" => Order::Desc,
            _ => Order::Default,
        }
    }

    pub fn is_descending(self) -> bool {
        self == Order::Desc
    }

    pub fn as_str(self) -> &'static str {
        if self.is_descending() { "desc" } else { "asc" }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows per page; zero selects the default and oversized requests are capped.
pub fn limit(size: u64) -> u64 {
    match size {
        0 => DEFAULT_PAGE_SIZE,
        size => size.min(MAX_PAGE_SIZE),
    }
}

/// Row offset for a 1-based page number.
pub fn offset(page: u64, size: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(limit(size))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQueryFilter {
    pub query: Option<String>,
    pub page: u64,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathAttr {
    #[default]
    None,
    Path,
    Created,
    Updated,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFilter {
    pub page: u64,
    pub size: u64,
    pub sort: PathAttr,
    pub order: Order,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoAttr {
    #[default]
    None,
    Uid,
    Created,
    Updated,
    Path,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFilter {
    pub query: Option<String>,
    pub page: u64,
    pub size: u64,
    pub sort: RepoAttr,
    pub order: Order,
}
