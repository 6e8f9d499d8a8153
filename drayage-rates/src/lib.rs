pub mod calculator;
pub mod schedule;

pub use calculator::{ChargeCalculator, ChargeError, ChargeKind, ChargeResult, ChargeSummary, TierCharge};
pub use schedule::{ChargeTier, DemurrageRates, PerDiemRates, RateSchedule, SchedulingRules};
