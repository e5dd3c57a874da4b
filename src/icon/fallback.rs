/// Generic feed glyph served when no site icon can be found (16x16 PNG).
pub const GENERIC_ICON: &[u8] = include_bytes!("../../assets/generic_feed.png");

pub fn generic_icon() -> Vec<u8> {
    GENERIC_ICON.to_vec()
}
