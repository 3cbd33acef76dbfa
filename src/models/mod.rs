pub mod booking;
pub mod notification;
pub mod payment;
pub mod service;
pub mod user;

pub use booking::*;
pub use notification::*;
pub use payment::*;
pub use service::*;
pub use user::*;
