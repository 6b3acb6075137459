/// Page window derived from `page` / `perPage` query parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub offset: u64,
}

impl Pagination {
    /// Pages are 1-based; `per_page` is clamped to 1..=100.
    pub fn new(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page.unwrap_or(default_per_page).clamp(1, 100);
        Pagination {
            page,
            per_page,
            offset: u64::from(page - 1) * u64::from(per_page),
        }
    }
}

/// Growing `WHERE` clause with its bind values in order.
#[derive(Debug, Default)]
pub struct Filters {
    conditions: Vec<String>,
    pub binds: Vec<FilterValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    U64(u64),
    I64(i64),
    Bool(bool),
    Str(String),
    Date(chrono::NaiveDate),
}

impl Filters {
    pub fn push(&mut self, condition: &str, value: FilterValue) {
        self.conditions.push(condition.to_string());
        self.binds.push(value);
    }

    pub fn push_many(&mut self, condition: &str, values: impl IntoIterator<Item = FilterValue>) {
        self.conditions.push(condition.to_string());
        self.binds.extend(values);
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

macro_rules! bind_filters {
    ($query:expr, $binds:expr) => {{
        let mut q = $query;
        for value in $binds {
            q = match value {
                $crate::utils::pagination::FilterValue::U64(v) => q.bind(*v),
                $crate::utils::pagination::FilterValue::I64(v) => q.bind(*v),
                $crate::utils::pagination::FilterValue::Bool(v) => q.bind(*v),
                $crate::utils::pagination::FilterValue::Str(v) => q.bind(v.as_str()),
                $crate::utils::pagination::FilterValue::Date(v) => q.bind(*v),
            };
        }
        q
    }};
}

pub(crate) use bind_filters;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_window() {
        assert_eq!(
            Pagination::new(None, None, 20),
            Pagination { page: 1, per_page: 20, offset: 0 }
        );
        assert_eq!(Pagination::new(Some(0), Some(500), 20).per_page, 100);
        assert_eq!(Pagination::new(Some(3), Some(10), 20).offset, 20);
    }

    #[test]
    fn builds_where_clause_in_bind_order() {
        let mut filters = Filters::default();
        assert_eq!(filters.where_clause(), "");

        filters.push("user_id = ?", FilterValue::U64(4));
        filters.push_many(
            "date BETWEEN ? AND ?",
            [
                FilterValue::Str("2024-01-01".into()),
                FilterValue::Str("2024-01-31".into()),
            ],
        );

        assert_eq!(filters.where_clause(), " WHERE user_id = ? AND date BETWEEN ? AND ?");
        assert_eq!(filters.binds.len(), 3);
    }
}
