//! Tower layers for HTTP client middleware
//!
//! ## Available Policies
//!
//! - [`RedirectPolicy`] - Redirect policy driven by an optional check callback

mod redirect;

pub use redirect::{CheckRedirectFn, RedirectAction, RedirectAttempt, RedirectPolicy};
