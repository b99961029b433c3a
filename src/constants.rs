//! Application constants

/// Signed upload URL expiry time in seconds (1 hour)
pub const UPLOAD_URL_EXPIRY_SECS: i64 = 60 * 60;

/// Signed view URL expiry time in seconds (7 days)
pub const VIEW_URL_EXPIRY_SECS: i64 = 7 * 24 * 60 * 60;

/// Azure storage REST version the SAS string-to-sign is laid out for
pub const AZURE_SAS_VERSION: &str = "2020-12-06";

/// Points awarded for each webcam recording upload
pub const WEBCAM_UPLOAD_POINTS: i64 = 5;

/// Currency value of one point
pub const POINTS_CONVERSION_RATE: f64 = 0.01;

/// Number of entries in each "top videos" list of the admin stats
pub const STATS_TOP_N: i64 = 5;

/// Default page size for paginated list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for paginated list endpoints
pub const MAX_PAGE_SIZE: i64 = 100;
