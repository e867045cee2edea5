pub mod cgt;
pub mod dividends;
pub mod exit_tax;
pub mod ie;

pub use cgt::{CgtAssessment, LossCarryForward};
pub use dividends::DividendAssessment;
pub use exit_tax::ExitTaxAssessment;
pub use ie::MarginalRate;
