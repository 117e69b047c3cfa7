//! HTML body composition for notification emails.
//!
//! Fields render compactly (`name: value` on one line) until the first value
//! that spans several lines. From that field on, every field is rendered in a
//! boxed block, whether or not it contains line breaks itself. When the
//! submitter left an address, a `Reply to:` footer closes the message.

use crate::form::{SubmittedForm, TURNSTILE_FIELD};
use crate::sanitize::text_to_html;

/// Heading at the top of every notification.
pub const HEADING: &str = "New Form Submission";

const WRAPPER_OPEN: &str =
    r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">"#;
const WRAPPER_CLOSE: &str = "</div>";
const HEADING_STYLE: &str = "color: #333; border-bottom: 2px solid #667eea; padding-bottom: 10px;";
const COMPACT_STYLE: &str = "margin: 10px 0;";
const BOXED_STYLE: &str = "background: #f5f5f5; padding: 15px; border-radius: 5px; margin: 20px 0;";
const RULE_STYLE: &str = "border: none; border-top: 1px solid #ddd; margin: 20px 0;";
const FOOTER_STYLE: &str = "color: #666; font-size: 12px;";

/// Build the HTML body for `form`.
///
/// Values are sanitized; field names are inserted as-is. The Turnstile token
/// is never rendered. A non-blank `reply_to` adds a sanitized mailto footer.
pub fn compose_message(form: &SubmittedForm, reply_to: Option<&str>) -> String {
    let mut html = String::new();
    html.push_str(WRAPPER_OPEN);
    html.push('\n');
    html.push_str(&format!("<h2 style=\"{}\">{}</h2>\n", HEADING_STYLE, HEADING));

    let mut boxed = false;
    for (name, value) in form.iter().filter(|(n, _)| *n != TURNSTILE_FIELD) {
        let value = text_to_html(Some(value));
        if value.contains('\n') {
            boxed = true;
        }

        if boxed {
            html.push_str(&format!(
                "<div class=\"field boxed\" style=\"{}\">\n<p style=\"margin: 0;\"><strong>{}:</strong></p>\n<p style=\"margin: 10px 0;\">{}</p>\n</div>\n",
                BOXED_STYLE, name, value
            ));
        } else {
            html.push_str(&format!(
                "<p class=\"field\" style=\"{}\"><strong>{}:</strong> {}</p>\n",
                COMPACT_STYLE, name, value
            ));
        }
    }

    if let Some(address) = reply_to.map(str::trim).filter(|a| !a.is_empty()) {
        let address = text_to_html(Some(address));
        html.push_str(&format!("<hr style=\"{}\">\n", RULE_STYLE));
        html.push_str(&format!(
            "<p class=\"reply-to\" style=\"{}\">Reply to: <a href=\"mailto:{}\">{}</a></p>\n",
            FOOTER_STYLE, address, address
        ));
    }

    html.push_str(WRAPPER_CLOSE);
    html
}
