//! Pure field canonicalizers shared by every strategy.

pub mod amount;
pub mod date;
pub mod direction;

pub use amount::{normalize_amount, parse_money, DrCr, ParsedAmount};
pub use date::normalize_date;
pub use direction::{resolve_direction, DirectionHint, DirectionSource};
