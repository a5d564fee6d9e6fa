//! Undercloud install and upgrade
//!
//! Both build one `openstack tripleo deploy` command line and run it locally.

use crate::deploy::deployment_failed;
use crate::error::Result;
use crate::process::{CommandRunner, CommandSpec};
use overcloud_common::constants::{
    TRIPLEO_HEAT_TEMPLATES, UNDERCLOUD_PASSWORD_FILE, UNDERCLOUD_STACKRC_FILE,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndercloudOptions {
    pub upgrade: bool,
    /// Log the command instead of running it
    pub dry_run: bool,
    pub yes: bool,
    pub no_validations: bool,
    pub inflight_validations: bool,
    /// Force stack_action=UPDATE on the ephemeral heat stack
    pub force_stack_update: bool,
    pub verbosity: u8,
}

/// The deploy command for `options`
pub fn deploy_command(options: &UndercloudOptions) -> CommandSpec {
    // A dry run never validates and never runs in-flight checks
    let no_validations = options.dry_run || options.no_validations;
    let inflight = !options.dry_run && options.inflight_validations;

    let mut spec = CommandSpec::new("sudo")
        .args(["--preserve-env", "openstack", "tripleo", "deploy"])
        .args(["--standalone-role", "Undercloud", "--stack", "undercloud"])
        .arg("--local-domain=localdomain")
        .arg(format!("--templates={}", TRIPLEO_HEAT_TEMPLATES))
        .arg("--heat-native")
        .arg("-e")
        .arg(format!("{}environments/undercloud.yaml", TRIPLEO_HEAT_TEMPLATES));

    if !no_validations {
        spec = spec
            .arg("-e")
            .arg(format!("{}environments/tripleo-validations.yaml", TRIPLEO_HEAT_TEMPLATES));
    }
    if inflight {
        spec = spec.arg("--inflight-validations");
    }
    if options.upgrade {
        spec = spec.arg("--upgrade");
        if options.yes {
            spec = spec.arg("-y");
        }
    }
    if options.force_stack_update {
        spec = spec.arg("--force-stack-update");
    }
    if options.verbosity > 1 {
        spec = spec.arg("--debug");
    }
    spec
}

fn completion_message(upgrade: bool) -> String {
    format!(
        "\n\nThe Undercloud has been successfully {}.\n\n\
         Useful files:\n\n\
         Password file is at {}\n\
         The stackrc file is at {}\n\n\
         Use these files to interact with OpenStack services, and\n\
         ensure they are secured.\n",
        if upgrade { "upgraded" } else { "installed" },
        UNDERCLOUD_PASSWORD_FILE,
        UNDERCLOUD_STACKRC_FILE,
    )
}

/// Install or upgrade the undercloud. Returns the command that was (or
/// would have been) run.
pub async fn deploy_undercloud(runner: &dyn CommandRunner, options: &UndercloudOptions) -> Result<CommandSpec> {
    debug!(?options, "Preparing undercloud deploy");
    let command = deploy_command(options);
    warn!("Running: {}", command.display());

    if options.dry_run {
        return Ok(command);
    }

    runner
        .run(&command)
        .await
        .map_err(|e| deployment_failed("Undercloud", e))?;
    warn!("{}", completion_message(options.upgrade));
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpgradeError;
    use crate::process::testing::RecordingRunner;

    #[tokio::test]
    async fn test_dry_run_does_not_execute() {
        let runner = RecordingRunner::default();
        let options = UndercloudOptions {
            dry_run: true,
            inflight_validations: true,
            ..Default::default()
        };

        let command = deploy_undercloud(&runner, &options).await.unwrap();

        assert!(runner.commands().is_empty());
        assert!(!command.args.contains(&"--inflight-validations".to_string()));
        assert!(!command.display().contains("tripleo-validations.yaml"));
    }

    #[tokio::test]
    async fn test_upgrade_flags() {
        let runner = RecordingRunner::default();
        let options = UndercloudOptions {
            upgrade: true,
            yes: true,
            force_stack_update: true,
            ..Default::default()
        };

        deploy_undercloud(&runner, &options).await.unwrap();

        let commands = runner.commands();
        assert_eq!(commands.len(), 1);
        let args = &commands[0].args;
        for flag in ["--upgrade", "-y", "--force-stack-update"] {
            assert!(args.contains(&flag.to_string()), "missing {}", flag);
        }
        assert!(commands[0].display().contains("tripleo-validations.yaml"));
    }

    #[tokio::test]
    async fn test_failure_is_deployment_error() {
        let runner = RecordingRunner::failing("sudo");
        let err = deploy_undercloud(&runner, &UndercloudOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UpgradeError::Deployment(_)));
    }

    #[test]
    fn test_completion_message() {
        assert!(completion_message(true).contains("successfully upgraded"));
        assert!(completion_message(false).contains("~/undercloud-passwords.conf"));
    }
}
