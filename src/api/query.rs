//! OData query-string construction
//!
//! Values are percent-encoded so filter literals containing `&`, `#` or
//! quotes cannot break out of their clause.

/// Builder for `$filter`/`$select`/`$top`/`$search`/`$orderby`/`$count` clauses
#[derive(Debug, Clone, Default)]
pub struct ODataQuery {
    count: Option<bool>,
    filter: Option<String>,
    select: Vec<String>,
    orderby: Option<String>,
    top: Option<u32>,
    search: Option<String>,
}

impl ODataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(mut self, count: bool) -> Self {
        self.count = Some(count);
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.select = fields
            .into_iter()
            .map(|f| f.as_ref().trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        self
    }

    pub fn orderby(mut self, orderby: impl Into<String>) -> Self {
        self.orderby = Some(orderby.into());
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.to_query_string().is_empty()
    }

    /// Encoded query string without the leading `?`
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();

        if let Some(count) = self.count {
            parts.push(format!("$count={}", count));
        }
        if let Some(filter) = &self.filter {
            parts.push(format!("$filter={}", urlencoding::encode(filter)));
        }
        if !self.select.is_empty() {
            parts.push(format!(
                "$select={}",
                urlencoding::encode(&self.select.join(","))
            ));
        }
        if let Some(orderby) = &self.orderby {
            parts.push(format!("$orderby={}", urlencoding::encode(orderby)));
        }
        if let Some(top) = self.top {
            parts.push(format!("$top={}", top));
        }
        if let Some(search) = &self.search {
            parts.push(format!("$search={}", urlencoding::encode(search)));
        }

        parts.join("&")
    }

    /// Append the query to a resource path
    pub fn apply(&self, path: &str) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, query)
        }
    }
}
