//! Delegation to the full overcloud deploy

use crate::error::{Result, UpgradeError};
use crate::process::{CommandRunner, CommandSpec};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Logged before any deployment failure is returned
pub const FAILURE_BANNER: &str = "
!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!

An error has occured while deploying the {}.

See the previous output for details about what went wrong.

!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!
";

/// Log the failure banner for `subject` and wrap `reason` as a deployment error
pub fn deployment_failed(subject: &str, reason: impl std::fmt::Display) -> UpgradeError {
    error!("{}", FAILURE_BANNER.replace("{}", subject));
    error!("{}", reason);
    UpgradeError::Deployment(reason.to_string())
}

/// Parameters of one overcloud deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    pub stack: String,
    pub templates: PathBuf,
    /// Applied in order; later files override earlier ones
    pub environment_files: Vec<PathBuf>,
    /// Update the plan but leave the stack alone
    pub update_plan_only: bool,
    /// Passed through verbatim
    pub extra_args: Vec<String>,
}

/// Something that can run a full overcloud deploy
#[async_trait]
pub trait DeployOvercloud: Send + Sync {
    async fn deploy(&self, options: &DeployOptions) -> Result<()>;
}

/// Runs `openstack overcloud deploy`
pub struct CommandDeployer {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl CommandDeployer {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "openstack".to_string(),
        }
    }

    pub fn command(&self, options: &DeployOptions) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.program)
            .args(["overcloud", "deploy", "--stack"])
            .arg(&options.stack)
            .arg("--templates")
            .arg(options.templates.display().to_string());
        for env in &options.environment_files {
            spec = spec.arg("-e").arg(env.display().to_string());
        }
        if options.update_plan_only {
            spec = spec.arg("--update-plan-only");
        }
        spec.args(options.extra_args.iter().cloned())
    }
}

#[async_trait]
impl DeployOvercloud for CommandDeployer {
    async fn deploy(&self, options: &DeployOptions) -> Result<()> {
        let command = self.command(options);
        info!(stack = %options.stack, plan_only = options.update_plan_only, "Deploying overcloud");
        self.runner
            .run(&command)
            .await
            .map_err(|e| deployment_failed("Overcloud", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingRunner;

    fn options() -> DeployOptions {
        DeployOptions {
            stack: "mystack".to_string(),
            templates: PathBuf::from("/usr/share/openstack-tripleo-heat-templates/"),
            environment_files: vec![PathBuf::from("/a.yaml"), PathBuf::from("/b.yaml")],
            update_plan_only: true,
            extra_args: Vec::new(),
        }
    }

    #[test]
    fn test_command_line() {
        let deployer = CommandDeployer::new(Arc::new(RecordingRunner::default()));
        assert_eq!(
            deployer.command(&options()).display(),
            "openstack overcloud deploy --stack mystack \
             --templates /usr/share/openstack-tripleo-heat-templates/ \
             -e /a.yaml -e /b.yaml --update-plan-only"
        );
    }

    #[tokio::test]
    async fn test_failure_is_deployment_error() {
        let deployer = CommandDeployer::new(Arc::new(RecordingRunner::failing("openstack")));
        let err = deployer.deploy(&options()).await.unwrap_err();
        assert!(matches!(err, UpgradeError::Deployment(_)));
    }
}
