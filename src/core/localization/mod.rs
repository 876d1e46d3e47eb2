// Localized text lookup. The caller always passes the locale explicitly.

pub mod text_catalog;

pub use text_catalog::*;
