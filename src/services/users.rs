use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;

use super::StoreError;

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 200;

/// User joined with role, faculty and career names.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct UserRecord {
    pub id: i32,
    #[serde(rename = "usuario")]
    pub login: String,
    #[serde(rename = "activo")]
    pub active: bool,
    #[serde(rename = "rolId")]
    pub role_id: i32,
    #[serde(rename = "rolNombre")]
    pub role_name: String,
    #[serde(rename = "facultadCod")]
    pub faculty_code: String,
    #[serde(rename = "facultadNombre")]
    pub faculty_name: Option<String>,
    #[serde(rename = "carreraCod")]
    pub career_code: Option<String>,
    #[serde(rename = "carreraNombre")]
    pub career_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub role_id: i32,
    pub faculty_code: String,
    pub career_code: Option<String>,
    pub active: bool,
}

/// Partial update. `career_code: Some(None)` clears the career.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub login: Option<String>,
    pub role_id: Option<i32>,
    pub faculty_code: Option<String>,
    pub career_code: Option<Option<String>>,
    pub active: Option<bool>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.login.is_none()
            && self.role_id.is_none()
            && self.faculty_code.is_none()
            && self.career_code.is_none()
            && self.active.is_none()
    }
}

/// Zero-based page with a bounded size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    /// `limit` is clamped to `[1, 200]`, `page` to `>= 0`.
    pub fn clamped(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(0).max(0),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::clamped(None, None)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub faculty_code: Option<String>,
    pub role_id: Option<i32>,
    pub search: Option<String>,
    pub active: Option<bool>,
    pub page: Page,
}

impl UserFilter {
    /// Trimmed, non-empty search text.
    pub fn search_text(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub data: Vec<UserRecord>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

impl UserPage {
    pub fn new(data: Vec<UserRecord>, total: i64, page: Page) -> Self {
        Self {
            data,
            total,
            page: page.page,
            limit: page.limit,
            has_more: page.offset().saturating_add(page.limit) < total,
        }
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fails with `Duplicate` if the login exists and with `InvalidReference`
    /// if the role, faculty or career does not. Nothing is written on failure.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Applies only the supplied fields.
    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<UserRecord, StoreError>;

    async fn find_user(&self, login: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn get_user(&self, id: i32) -> Result<Option<UserRecord>, StoreError>;

    /// Page of users ordered by id descending, plus the total matching count.
    async fn list_users(&self, filter: &UserFilter) -> Result<UserPage, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped_into_range() {
        assert_eq!(Page::clamped(None, Some(0)).limit, 1);
        assert_eq!(Page::clamped(None, Some(-15)).limit, 1);
        assert_eq!(Page::clamped(None, Some(201)).limit, 200);
        assert_eq!(Page::clamped(None, Some(i64::MAX)).limit, 200);
        assert_eq!(Page::clamped(None, Some(50)).limit, 50);
        assert_eq!(Page::clamped(None, None).limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn negative_page_is_clamped_to_zero() {
        assert_eq!(Page::clamped(Some(-3), None).page, 0);
        assert_eq!(Page::clamped(Some(4), Some(10)).offset(), 40);
    }

    #[test]
    fn has_more_reflects_remaining_rows() {
        let page = Page::clamped(Some(0), Some(2));
        assert!(UserPage::new(vec![], 3, page).has_more);
        let last = Page::clamped(Some(1), Some(2));
        assert!(!UserPage::new(vec![], 3, last).has_more);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let page = Page::clamped(Some(i64::MAX), Some(20));
        assert_eq!(page.offset(), i64::MAX);
        assert!(!UserPage::new(vec![], 3, page).has_more);
    }

    #[test]
    fn blank_search_is_ignored() {
        let filter = UserFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(filter.search_text(), None);
    }
}
