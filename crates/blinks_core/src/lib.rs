pub mod api;
pub mod error;
pub mod filter;
pub mod store;
pub mod types;

pub use api::BlinksApi;
pub use error::{Error, Result};
pub use filter::{categories, BlinkFilter, Tab};
pub use store::BlinkStore;
pub use types::*;

pub mod prelude {
    pub use crate::{Blink, BlinkFilter, BlinkStore, BlinksApi, Error, Result, Tab};
}
