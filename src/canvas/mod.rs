pub mod dimensions;
pub mod dispatch;
pub mod hitl;
pub mod layout;
pub mod model;
pub mod store;
