pub mod gating;
pub mod indicators;
pub mod market;
pub mod market_data;
pub mod recommendation;

pub use gating::*;
pub use indicators::*;
pub use market::*;
pub use market_data::*;
pub use recommendation::*;
