//! Overcloud upgrade phases
//!
//! The fast-forward upgrade is three operator-driven phases run in order
//! against one stack:
//!
//! ```text
//! prepare ──► run (one or more times) ──► converge
//! ```
//!
//! - **prepare** updates the plan with the upgrade environment and regenerates
//!   the playbooks
//! - **run** executes the upgrade playbook on every node
//! - **converge** restores the normal deploy outputs
//!
//! Every phase asks for confirmation unless `yes` is set. A declined prompt
//! returns [`PhaseOutcome::Aborted`] without contacting any service.

pub mod ansible;
pub mod confirm;
pub mod deploy;
pub mod error;
pub mod phases;
pub mod process;
pub mod undercloud;

pub use confirm::{Confirmer, FixedConfirmer, StdinConfirmer};
pub use deploy::{CommandDeployer, DeployOptions, DeployOvercloud};
pub use error::{Result, UpgradeError};
pub use phases::{
    BundleSource, CephUpgradeOptions, DeployPhaseOptions, PhaseController, PhaseOutcome,
    PrepareOptions, RunOptions,
};
pub use process::{CommandRunner, CommandSpec, SystemRunner};
pub use undercloud::{deploy_undercloud, UndercloudOptions};
