pub mod fees;
pub mod jwt;
pub mod lifecycle;

pub use fees::{fee_split, FeeSplit, PLATFORM_FEE_RATE};
pub use jwt::JwtService;
