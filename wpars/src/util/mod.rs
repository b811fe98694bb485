//! Internal helpers shared by the proxies.

pub(crate) mod utils;
