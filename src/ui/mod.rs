pub mod blocks;
pub mod event;
pub mod registry;
pub mod view;
