//! Response bodies for the hello endpoint.

/// Body returned when the counter could not be updated. Carries no detail.
pub const UPDATE_FAILED_BODY: &str = "failed to update request count\n";

/// `Hello, {name}! (#{count})` plus a trailing newline.
pub fn render(name: &str, count: i64) -> String {
    format!("Hello, {name}! (#{count})\n")
}
