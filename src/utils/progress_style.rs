use indicatif::ProgressStyle;

const ONLY_MESSAGE_TEMPLATE: &str = "{spinner} {wide_msg}";
const COUNT_TEMPLATE: &str = "{spinner} {msg:30} {wide_bar:} {pos:>4}/{len}";

pub struct ProgressStyleTemplate;

impl ProgressStyleTemplate {
    pub fn only_message() -> ProgressStyle {
        ProgressStyle::with_template(ONLY_MESSAGE_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    /// Bar for a known number of steps, such as logins to resolve.
    pub fn count_bar() -> ProgressStyle {
        ProgressStyle::with_template(COUNT_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }
}
