//! Experiment drivers (§4.10, supplement): load balance, path length, mass
//! failure, and churn. Each is an external collaborator over the public
//! [`crate::Environment`]/[`crate::Node`] API — none of them participate
//! in protocol correctness, and the core has no dependency on this module.
//!
//! Grounded in `experiments/exp_{1,2,3,4}_*.py` from the original
//! implementation.

pub mod exp1_load_balance;
pub mod exp2_path_length;
pub mod exp3_mass_failure;
pub mod exp4_churn;

pub use exp1_load_balance::{run_load_balance_batch, LoadBalanceReplicate};
pub use exp2_path_length::{run_path_length_batch, PathLengthResult};
pub use exp3_mass_failure::{run_mass_failure_batch, MassFailureReplicate};
pub use exp4_churn::{run_churn_batch, ChurnReplicate};
