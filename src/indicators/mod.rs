pub mod engine;
pub mod max_pain;

pub use engine::{
    pcr_open_interest, pcr_volume, IndicatorConfig, IndicatorEngine, IndicatorError, IndicatorSet,
    StrikeGreeks,
};
pub use max_pain::{max_pain, pain_profile, PainPoint};
