pub mod all;
pub mod equities;
pub mod foreign;
pub mod funds;
pub mod setup;
pub mod ui;
