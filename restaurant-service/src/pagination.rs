use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// Resolved `page`/`limit` pair. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(default_limit)
            .min(MAX_LIMIT);
        Self { page, limit }
    }

    /// Rows to skip. Saturates for absurd page numbers, which simply yields
    /// an empty page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn wrap<T>(self, data: Vec<T>, total: i64) -> Paginated<T> {
        Paginated {
            data,
            meta: PageMeta {
                total,
                page: self.page,
                limit: self.limit,
                last_page: last_page(total, self.limit),
            },
        }
    }
}

fn last_page(total: i64, limit: i64) -> i64 {
    if total <= 0 {
        1
    } else {
        (total + limit - 1) / limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub last_page: i64,
}
