//! Fixed test identifiers for deterministic tests
//!
//! Ticket ids are normally random; tests that seed rows directly use these
//! so failures are easy to read.

// Ticket ids
pub const TEST_LT_ID: &str = "LT-test-login-ticket";
pub const TEST_TGT_ID: &str = "TGT-test-ticket-granting-ticket";
pub const TEST_ST_ID: &str = "ST-test-service-ticket";
pub const TEST_DUPLICATE_TID: &str = "LT-duplicated";
pub const TEST_MISSING_TID: &str = "ST-does-not-exist";

// Users
pub const TEST_USER_ALICE: &str = "alice";
pub const TEST_USER_BOB: &str = "bob";

// Services
pub const TEST_SERVICE_APP: &str = "https://app.example.com/";
pub const TEST_SERVICE_WIKI: &str = "https://wiki.example.com/";
pub const TEST_LOGOUT_URL_APP: &str = "https://app.example.com/logout";
pub const TEST_LOGOUT_URL_WIKI: &str = "https://wiki.example.com/logout";
