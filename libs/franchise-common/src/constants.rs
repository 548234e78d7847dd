//! Constants shared by the franchise case tracker crates

/// Wire label for a service that has not been started
pub const STATUS_TO_BE_STARTED: &str = "To be Started";

/// Wire label for a service waiting on details from the client
pub const STATUS_DETAIL_REQUIRED: &str = "Detail Required";

/// Wire label for work in progress (shared by every status enumeration)
pub const STATUS_IN_PROGRESS: &str = "In-Progress";

/// Wire label for finished work (shared by every status enumeration)
pub const STATUS_COMPLETED: &str = "Completed";

/// Initial status of a freshly opened case
pub const STATUS_NEW_CASE: &str = "New-Case";

/// Legacy initial status
pub const STATUS_PENDING: &str = "Pending";

/// Legacy terminal status for an accepted service
pub const STATUS_APPROVED: &str = "Approved";

/// Legacy terminal status for a refused service
pub const STATUS_REJECTED: &str = "Rejected";

/// Role label of an administrator
pub const ROLE_ADMIN: &str = "Admin";

/// Role label of a super administrator
pub const ROLE_SUPER_ADMIN: &str = "Super Admin";

/// Default backend base URL
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Default HTTP request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Session file name inside the user config directory
pub const SESSION_FILENAME: &str = "session.json";

/// Maximum remark body length accepted by the remark form
pub const MAX_REMARK_LENGTH: usize = 2000;

/// Environment variable names
pub const ENV_API_URL: &str = "FRANCHISE_API_URL";
pub const ENV_REQUEST_TIMEOUT: &str = "FRANCHISE_REQUEST_TIMEOUT";
pub const ENV_SESSION_PATH: &str = "FRANCHISE_SESSION_PATH";
pub const ENV_DEFAULT_STATUS: &str = "FRANCHISE_DEFAULT_STATUS";
pub const ENV_LOG_LEVEL: &str = "FRANCHISE_LOG_LEVEL";
pub const ENV_JSON_LOGS: &str = "FRANCHISE_JSON_LOGS";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_status_labels() {
        assert_eq!(STATUS_IN_PROGRESS, "In-Progress");
        assert_eq!(STATUS_COMPLETED, "Completed");
        assert_eq!(STATUS_NEW_CASE, "New-Case");
    }

    #[test]
    fn test_legacy_status_labels() {
        assert_eq!(STATUS_PENDING, "Pending");
        assert_eq!(STATUS_APPROVED, "Approved");
        assert_eq!(STATUS_REJECTED, "Rejected");
    }

    #[test]
    fn test_env_names_are_prefixed() {
        for name in [
            ENV_API_URL,
            ENV_REQUEST_TIMEOUT,
            ENV_SESSION_PATH,
            ENV_DEFAULT_STATUS,
            ENV_LOG_LEVEL,
            ENV_JSON_LOGS,
        ] {
            assert!(name.starts_with("FRANCHISE_"), "{name}");
        }
    }

    #[test]
    fn test_limits() {
        assert_eq!(DEFAULT_REQUEST_TIMEOUT_SECS, 30);
        assert_eq!(MAX_REMARK_LENGTH, 2000);
    }
}
