pub mod normalize;
pub mod rates;
pub mod setup;
pub mod split;
pub mod ui;
