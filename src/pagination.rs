//! This modules defines the common functionality for paging data.

use crate::Error;

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of items per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a client may request.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl PaginationConfig {
    /// Fill in defaults for missing values and check the page size is within range.
    ///
    /// # Errors
    /// Returns [Error::InvalidPage] for page zero and [Error::InvalidPageSize] if the
    /// page size is zero or larger than [PaginationConfig::max_page_size].
    pub fn page_request(
        &self,
        page: Option<u64>,
        page_size: Option<u64>,
    ) -> Result<PageRequest, Error> {
        let page = page.unwrap_or(self.default_page);
        let page_size = page_size.unwrap_or(self.default_page_size);

        if page < 1 {
            return Err(Error::InvalidPage);
        }

        if page_size < 1 || page_size > self.max_page_size {
            return Err(Error::InvalidPageSize(self.max_page_size));
        }

        Ok(PageRequest { page, page_size })
    }
}

/// A validated, one-based page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// The one-based page number.
    pub page: u64,
    /// The maximum number of items on the page.
    pub page_size: u64,
}

impl PageRequest {
    /// The number of items to skip to reach this page.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// The number of pages needed to show `total` items.
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size)
    }
}

/// Parse an optional, positive integer query parameter.
///
/// Blank values count as missing. `error` is returned for anything that is not an
/// integer greater than zero.
pub fn parse_positive_param(raw: Option<&str>, error: Error) -> Result<Option<u64>, Error> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    match raw.parse::<u64>() {
        Ok(value) if value >= 1 => Ok(Some(value)),
        _ => Err(error),
    }
}
