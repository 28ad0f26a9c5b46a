//! Message formatting utilities for feed messages.

use dengon_shared::time::timestamp_to_rfc3339;

use crate::message::RelayMessage;

/// Message formatter for feed messages
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a feed message for forwarding to the notification sink
    ///
    /// # Arguments
    ///
    /// * `message` - The decoded feed message
    /// * `received_at` - Unix timestamp when the message was received (milliseconds)
    ///
    /// # Returns
    ///
    /// A multi-line notification text. Tag and URL lines are omitted when empty.
    pub fn format_feed_notification(message: &RelayMessage, received_at: i64) -> String {
        let mut output = String::from("Feed message:\n");
        output.push_str(&format!("Source: {}\n", message.source_name));
        output.push_str(&format!("Title: {}\n", message.title));
        if !message.tags.is_empty() {
            output.push_str(&format!("Tags: {}\n", message.tags.join(", ")));
        }
        if !message.url.is_empty() {
            output.push_str(&format!("URL: {}\n", message.url));
        }
        output.push_str(&format!("Timestamp: {}", received_at));
        output
    }

    /// Format a feed message as one console line
    pub fn format_console_line(message: &RelayMessage) -> String {
        format!(
            "[{}] {}: {}",
            timestamp_to_rfc3339(message.timestamp_millis),
            message.source_name,
            message.title
        )
    }
}
