//! Upgrade phases
//!
//! Prepare, run and converge are separate operator invocations against the
//! same named stack. Nothing is persisted between them; each phase checks the
//! remote stack itself and stops at the first error.

use crate::ansible::{self, PlaybookRun};
use crate::confirm::{operator_confirm, Confirmer, StdinConfirmer, CEPH_UPGRADE_WARNING, FFWD_UPGRADE_WARNING};
use crate::deploy::{DeployOptions, DeployOvercloud};
use crate::error::{Result, UpgradeError};
use crate::process::{CommandRunner, SystemRunner};
use async_trait::async_trait;
use overcloud_common::constants::{
    CEPH_ANSIBLE_ROLLING_UPDATE_PLAYBOOK, CEPH_ANSIBLE_SITE_PLAYBOOK, CEPH_UPGRADE_PREPARE_ENV,
    FFWD_UPGRADE_CONVERGE_ENV, FFWD_UPGRADE_PLAYBOOK, FFWD_UPGRADE_PREPARE_ENV,
    FFWD_UPGRADE_PREPARE_SCRIPT, TRIPLEO_HEAT_TEMPLATES,
};
use overcloud_common::{prepend_environment, Stack};
use overcloud_workflow::package_update::{self, PackageUpdate, RunOnNodes, UpdateAnsible};
use overcloud_workflow::{deployment, ConfigDownloader, Orchestrator, StackStore, WorkflowError};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// How a phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    /// The operator declined; nothing was changed
    Aborted,
}

/// Where the generated playbooks come from for local ansible runs
#[async_trait]
pub trait BundleSource: Send + Sync {
    async fn fetch(&self, stack: &str, work_dir: &Path) -> overcloud_workflow::Result<PathBuf>;
}

#[async_trait]
impl BundleSource for ConfigDownloader {
    async fn fetch(&self, stack: &str, work_dir: &Path) -> overcloud_workflow::Result<PathBuf> {
        self.download(stack, work_dir).await
    }
}

/// Options shared by every phase that delegates to a deploy
#[derive(Debug, Clone, Default)]
pub struct DeployPhaseOptions {
    pub stack: String,
    /// Defaults to the installed heat templates
    pub templates: Option<PathBuf>,
    pub environment_files: Vec<PathBuf>,
    pub extra_args: Vec<String>,
    pub yes: bool,
}

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub deploy: DeployPhaseOptions,
    pub container_registry_file: Option<PathBuf>,
    pub ssh_network: String,
    pub ssh_user: String,
    pub ssh_key: PathBuf,
    /// Where `{stack}rc` and `{stack}rc.v3` are written
    pub rc_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub stack: String,
    pub yes: bool,
    pub static_inventory: Option<PathBuf>,
    /// Where a generated inventory is written
    pub inventory_path: PathBuf,
    pub ssh_user: String,
    /// Run ansible locally instead of through the workflow engine
    pub no_workflow: bool,
    pub verbosity: u8,
    /// Where the playbook bundle is unpacked for local runs
    pub work_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CephUpgradeOptions {
    pub deploy: DeployPhaseOptions,
    pub container_registry_file: Option<PathBuf>,
}

/// Sequences the remote and local steps of each upgrade phase
pub struct PhaseController {
    orchestrator: Orchestrator,
    stacks: Arc<dyn StackStore>,
    deployer: Arc<dyn DeployOvercloud>,
    runner: Arc<dyn CommandRunner>,
    bundles: Option<Arc<dyn BundleSource>>,
    confirmer: Arc<dyn Confirmer>,
}

impl PhaseController {
    pub fn new(
        orchestrator: Orchestrator,
        stacks: Arc<dyn StackStore>,
        deployer: Arc<dyn DeployOvercloud>,
    ) -> Self {
        Self {
            orchestrator,
            stacks,
            deployer,
            runner: Arc::new(SystemRunner),
            bundles: None,
            confirmer: Arc::new(StdinConfirmer),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_bundles(mut self, bundles: Arc<dyn BundleSource>) -> Self {
        self.bundles = Some(bundles);
        self
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    /// Refresh the plan and stack outputs for a fast-forward upgrade
    pub async fn prepare(&self, options: &PrepareOptions) -> Result<PhaseOutcome> {
        if !self.confirm(options.deploy.yes, FFWD_UPGRADE_WARNING)? {
            return Ok(PhaseOutcome::Aborted);
        }

        let stack = self.require_stack(&options.deploy.stack).await?;
        let stack_name = stack.stack_name.clone();
        let container_registry = load_container_registry(options.container_registry_file.as_deref())?;
        let deploy = deploy_options(&options.deploy, FFWD_UPGRADE_PREPARE_ENV, true)?;

        package_update::run_on_nodes(
            &self.orchestrator,
            &RunOnNodes {
                server_name: "all".to_string(),
                config_name: "ffwd-upgrade-prepare".to_string(),
                config: FFWD_UPGRADE_PREPARE_SCRIPT.to_string(),
                group: "script".to_string(),
            },
        )
        .await?;

        self.deployer.deploy(&deploy).await?;

        package_update::update(
            &self.orchestrator,
            &PackageUpdate {
                container: stack_name.clone(),
                ceph_ansible_playbook: CEPH_ANSIBLE_SITE_PLAYBOOK.to_string(),
                container_registry,
            },
        )
        .await?;
        package_update::get_config(&self.orchestrator, &stack_name).await?;

        let rcs = deployment::create_overcloudrc(&self.orchestrator, &stack_name).await?;
        deployment::write_overcloudrc(&stack_name, &rcs, &options.rc_dir)?;

        // Outputs changed with the plan update
        let stack = self.require_stack(&options.deploy.stack).await?;
        deployment::get_hosts_and_enable_ssh_admin(
            &self.orchestrator,
            &stack,
            &options.ssh_network,
            &options.ssh_user,
            &options.ssh_key,
        )
        .await?;

        info!(stack = %stack_name, "FFWD Upgrade Prepare complete");
        Ok(PhaseOutcome::Completed)
    }

    /// Run the fast-forward upgrade playbook on every overcloud node
    pub async fn run(&self, options: &RunOptions) -> Result<PhaseOutcome> {
        if !self.confirm(options.yes, FFWD_UPGRADE_WARNING)? {
            return Ok(PhaseOutcome::Aborted);
        }

        let stack = self.require_stack(&options.stack).await?;

        let local = if options.no_workflow {
            let bundles = self.bundles.as_ref().ok_or_else(|| {
                overcloud_common::Error::Config(
                    "no object store configured for playbook download".to_string(),
                )
            })?;
            let workdir = bundles.fetch(&stack.stack_name, &options.work_dir).await?;
            let key = package_update::get_key(&self.orchestrator).await?;
            Some((workdir, key))
        } else {
            None
        };

        let inventory = ansible::resolve_inventory(
            self.runner.as_ref(),
            options.static_inventory.as_deref(),
            &stack.stack_name,
            &options.ssh_user,
            &options.inventory_path,
        )
        .await?;

        match local {
            Some((workdir, key)) => {
                ansible::run_playbook(
                    self.runner.as_ref(),
                    &PlaybookRun {
                        workdir,
                        playbook: FFWD_UPGRADE_PLAYBOOK.to_string(),
                        inventory,
                        limit_hosts: String::new(),
                        ssh_user: options.ssh_user.clone(),
                        private_key: Some(key),
                        skip_tags: String::new(),
                        verbosity: options.verbosity,
                    },
                )
                .await?
            }
            None => {
                let contents = tokio::fs::read_to_string(&inventory)
                    .await
                    .map_err(|e| UpgradeError::io(&inventory, e))?;
                package_update::update_ansible(
                    &self.orchestrator,
                    &UpdateAnsible {
                        inventory: contents,
                        playbook: FFWD_UPGRADE_PLAYBOOK.to_string(),
                        nodes: String::new(),
                        node_user: options.ssh_user.clone(),
                        skip_tags: String::new(),
                    },
                )
                .await
                .map_err(|e| match e {
                    WorkflowError::Deployment(message) => UpgradeError::Ansible(message),
                    other => other.into(),
                })?
            }
        }

        info!(stack = %stack.stack_name, "FFWD Upgrade Run complete");
        Ok(PhaseOutcome::Completed)
    }

    /// Return the stack to normal deploy outputs
    pub async fn converge(&self, options: &DeployPhaseOptions) -> Result<PhaseOutcome> {
        if !self.confirm(options.yes, FFWD_UPGRADE_WARNING)? {
            return Ok(PhaseOutcome::Aborted);
        }

        let stack = self.require_stack(&options.stack).await?;
        let deploy = deploy_options(options, FFWD_UPGRADE_CONVERGE_ENV, false)?;

        self.deployer.deploy(&deploy).await?;
        package_update::ffwd_converge_nodes(&self.orchestrator, &stack.stack_name).await?;

        info!(stack = %stack.stack_name, "FFWD Upgrade Converge complete");
        Ok(PhaseOutcome::Completed)
    }

    /// Rolling upgrade of the ceph cluster, then converge
    pub async fn ceph_upgrade(&self, options: &CephUpgradeOptions) -> Result<PhaseOutcome> {
        if !self.confirm(options.deploy.yes, CEPH_UPGRADE_WARNING)? {
            return Ok(PhaseOutcome::Aborted);
        }

        let stack = self.require_stack(&options.deploy.stack).await?;
        let container_registry = load_container_registry(options.container_registry_file.as_deref())?;
        let deploy = deploy_options(&options.deploy, CEPH_UPGRADE_PREPARE_ENV, true)?;

        self.deployer.deploy(&deploy).await?;
        package_update::update(
            &self.orchestrator,
            &PackageUpdate {
                container: stack.stack_name.clone(),
                ceph_ansible_playbook: CEPH_ANSIBLE_ROLLING_UPDATE_PLAYBOOK.to_string(),
                container_registry,
            },
        )
        .await?;
        package_update::ffwd_converge_nodes(&self.orchestrator, &stack.stack_name).await?;

        info!(stack = %stack.stack_name, "Ceph upgrade complete");
        Ok(PhaseOutcome::Completed)
    }

    fn confirm(&self, yes: bool, prompt: &str) -> Result<bool> {
        let confirmed = operator_confirm(self.confirmer.as_ref(), yes, prompt)
            .map_err(|e| UpgradeError::io("stdin", e))?;
        if !confirmed {
            info!("Operation cancelled by the operator");
        }
        Ok(confirmed)
    }

    async fn require_stack(&self, name: &str) -> Result<Stack> {
        self.stacks
            .get_stack(name)
            .await?
            .ok_or_else(|| UpgradeError::StackNotFound(name.to_string()))
    }
}

impl std::fmt::Debug for PhaseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseController")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

/// Deploy options with `environment` forced in front of the operator's files
fn deploy_options(options: &DeployPhaseOptions, environment: &str, update_plan_only: bool) -> Result<DeployOptions> {
    let templates = options
        .templates
        .clone()
        .unwrap_or_else(|| PathBuf::from(TRIPLEO_HEAT_TEMPLATES));
    let environment_files = prepend_environment(&options.environment_files, &templates, environment)?;
    Ok(DeployOptions {
        stack: options.stack.clone(),
        templates,
        environment_files,
        update_plan_only,
        extra_args: options.extra_args.clone(),
    })
}

/// Read the container image parameters passed to the plan update
pub fn load_container_registry(path: Option<&Path>) -> Result<Option<Map<String, Value>>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = std::fs::read_to_string(path).map_err(|e| UpgradeError::io(path, e))?;
    let value: Value = serde_yaml::from_str(&raw).map_err(|e| {
        overcloud_common::Error::Config(format!("{}: {}", path.display(), e))
    })?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(overcloud_common::Error::InvalidRequest(format!(
            "{} must contain a mapping of container parameters",
            path.display()
        ))
        .into()),
    }
}
