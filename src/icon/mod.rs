//! Site icons keyed by domain.
//!
//! Lookup falls through a local icon directory, the `icons` table, a remote
//! favicon service and finally a built-in glyph, so callers always get an
//! image back. Successful remote fetches are written to the store.

mod fallback;
mod resolver;

pub use fallback::GENERIC_ICON;
pub use resolver::{
    IconPass, IconPassReport, IconRefresh, IconResolver, IconSettings, IconSource, ResolvedIcon,
};
