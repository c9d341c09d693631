pub mod black76;
pub mod black_scholes;
pub mod model;

pub use black76::Black76;
pub use black_scholes::BlackScholes;
pub use model::{PricingError, PricingModel};
