pub mod csrf;

pub use csrf::{CsrfClaims, CsrfManager, CSRF_PURPOSE};
