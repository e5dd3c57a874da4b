/// HTML cleaner for item content.
///
/// Keeps ammonia's default allowlist of formatting tags plus inline images;
/// scripts, event handlers, styles and `javascript:` URLs are removed.
pub struct Sanitizer {
    builder: ammonia::Builder<'static>,
}

impl Sanitizer {
    pub fn new() -> Self {
        let mut builder = ammonia::Builder::default();
        builder
            .add_tags(&["img"])
            .add_tag_attributes("img", &["src", "alt", "title", "width", "height"]);
        Self { builder }
    }

    pub fn clean(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}
