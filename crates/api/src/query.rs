//! Shared query parameter types for API handlers.

use rftm_core::error::CoreError;
use rftm_core::pagination::PageRequest;
use rftm_core::run_status::RunStatus;
use rftm_core::types::DbId;
use rftm_db::models::run_history::RunHistoryFilter;
use rftm_db::models::test_case::TestCaseFilter;
use serde::Deserialize;

use crate::config::ServerConfig;

/// Page-number pagination (`?page=&page_size=`).
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PaginationParams {
    /// Validate against the configured default and maximum page size.
    pub fn page_request(&self, config: &ServerConfig) -> Result<PageRequest, CoreError> {
        page_request(self.page, self.page_size, config)
    }
}

fn page_request(
    page: Option<i64>,
    page_size: Option<i64>,
    config: &ServerConfig,
) -> Result<PageRequest, CoreError> {
    PageRequest::new(page, page_size, config.default_page_size, config.max_page_size)
}

/// `GET /history` parameters.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub case_id: Option<DbId>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl HistoryParams {
    /// Parse `status`; an unknown value is a validation error.
    pub fn filter(&self) -> Result<RunHistoryFilter, CoreError> {
        let status = self
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(RunStatus::parse)
            .transpose()?;
        Ok(RunHistoryFilter {
            case_id: self.case_id,
            status,
        })
    }

    pub fn page_request(&self, config: &ServerConfig) -> Result<PageRequest, CoreError> {
        page_request(self.page, self.page_size, config)
    }
}

/// `GET /cases` parameters.
#[derive(Debug, Default, Deserialize)]
pub struct CaseListParams {
    pub test_script_id: Option<DbId>,
    pub name: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl CaseListParams {
    pub fn filter(&self) -> TestCaseFilter {
        TestCaseFilter {
            test_script_id: self.test_script_id,
            name: self.name.clone().filter(|n| !n.trim().is_empty()),
        }
    }

    pub fn page_request(&self, config: &ServerConfig) -> Result<PageRequest, CoreError> {
        page_request(self.page, self.page_size, config)
    }
}
