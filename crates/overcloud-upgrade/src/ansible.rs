//! Local ansible execution: inventory generation and playbook runs

use crate::error::{Result, UpgradeError};
use crate::process::{CommandRunner, CommandSpec};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Use `static_inventory` if given, otherwise generate one at `default_path`
pub async fn resolve_inventory(
    runner: &dyn CommandRunner,
    static_inventory: Option<&Path>,
    stack: &str,
    ssh_user: &str,
    default_path: &Path,
) -> Result<PathBuf> {
    if let Some(path) = static_inventory {
        if !path.exists() {
            return Err(UpgradeError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "inventory file not found"),
            ));
        }
        return Ok(path.to_path_buf());
    }

    let command = CommandSpec::new("tripleo-ansible-inventory")
        .arg("--stack")
        .arg(stack)
        .arg("--ansible_ssh_user")
        .arg(ssh_user)
        .arg("--static-yaml-inventory")
        .arg(default_path.display().to_string());
    runner
        .run(&command)
        .await
        .map_err(|e| UpgradeError::Ansible(format!("inventory generation failed: {}", e)))?;

    info!(path = %default_path.display(), "Generated ansible inventory");
    Ok(default_path.to_path_buf())
}

/// A local `ansible-playbook` invocation
#[derive(Debug, Clone)]
pub struct PlaybookRun {
    pub workdir: PathBuf,
    pub playbook: String,
    pub inventory: PathBuf,
    /// Empty runs against every host
    pub limit_hosts: String,
    pub ssh_user: String,
    pub private_key: Option<String>,
    pub skip_tags: String,
    pub verbosity: u8,
}

impl PlaybookRun {
    pub fn command(&self, key_file: Option<&Path>) -> CommandSpec {
        let mut spec = CommandSpec::new("ansible-playbook")
            .current_dir(&self.workdir)
            .arg("-i")
            .arg(self.inventory.display().to_string())
            .arg("-u")
            .arg(&self.ssh_user)
            .arg("--become");
        if let Some(key) = key_file {
            spec = spec.arg("--private-key").arg(key.display().to_string());
        }
        if !self.limit_hosts.is_empty() {
            spec = spec.arg("--limit").arg(&self.limit_hosts);
        }
        if !self.skip_tags.is_empty() {
            spec = spec.arg("--skip-tags").arg(&self.skip_tags);
        }
        if self.verbosity > 0 {
            spec = spec.arg(format!("-{}", "v".repeat(self.verbosity.min(4) as usize)));
        }
        spec.arg(&self.playbook)
    }
}

/// Run a playbook locally.
///
/// A private key is written to the workdir for the duration of the run and
/// removed afterwards, whether or not the playbook succeeded.
pub async fn run_playbook(runner: &dyn CommandRunner, run: &PlaybookRun) -> Result<()> {
    let key_file = match &run.private_key {
        Some(key) => {
            let path = run.workdir.join("ssh_private_key");
            write_key(&path, key).map_err(|e| UpgradeError::io(&path, e))?;
            Some(path)
        }
        None => None,
    };

    let result = runner
        .run(&run.command(key_file.as_deref()))
        .await
        .map_err(|e| UpgradeError::Ansible(e.to_string()));

    if let Some(path) = key_file {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "Failed to remove private key");
        }
    }
    result
}

fn write_key(path: &Path, key: &str) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);
    let mut file = options.open(path)?;
    // mode only applies on create
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(key.as_bytes())?;
    if !key.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingRunner;

    fn run(workdir: &Path) -> PlaybookRun {
        PlaybookRun {
            workdir: workdir.to_path_buf(),
            playbook: "fast_forward_upgrade_playbook.yaml".to_string(),
            inventory: PathBuf::from("/home/stack/inventory.yaml"),
            limit_hosts: String::new(),
            ssh_user: "tripleo-admin".to_string(),
            private_key: None,
            skip_tags: String::new(),
            verbosity: 1,
        }
    }

    #[tokio::test]
    async fn test_static_inventory_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = dir.path().join("hosts.yaml");
        std::fs::write(&inventory, "all: {}").unwrap();
        let runner = RecordingRunner::default();

        let resolved = resolve_inventory(
            &runner,
            Some(&inventory),
            "overcloud",
            "tripleo-admin",
            &dir.path().join("generated.yaml"),
        )
        .await
        .unwrap();

        assert_eq!(resolved, inventory);
        assert!(runner.commands().is_empty());
    }

    #[tokio::test]
    async fn test_inventory_is_generated() {
        let runner = RecordingRunner::default();
        let path = PathBuf::from("/home/stack/tripleo-ansible-inventory.yaml");

        resolve_inventory(&runner, None, "overcloud", "tripleo-admin", &path)
            .await
            .unwrap();

        assert_eq!(
            runner.commands()[0].display(),
            "tripleo-ansible-inventory --stack overcloud --ansible_ssh_user tripleo-admin \
             --static-yaml-inventory /home/stack/tripleo-ansible-inventory.yaml"
        );
    }

    #[test]
    fn test_no_host_limit() {
        let dir = tempfile::tempdir().unwrap();
        let command = run(dir.path()).command(None);
        assert!(!command.args.contains(&"--limit".to_string()));
        assert_eq!(command.args.last().unwrap(), "fast_forward_upgrade_playbook.yaml");
        assert!(command.args.contains(&"-v".to_string()));
    }

    #[tokio::test]
    async fn test_private_key_passed_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let mut playbook = run(dir.path());
        playbook.private_key = Some("KEY".to_string());
        let runner = RecordingRunner::default();

        run_playbook(&runner, &playbook).await.unwrap();

        let key_file = dir.path().join("ssh_private_key");
        assert!(runner.commands()[0]
            .args
            .contains(&key_file.display().to_string()));
        assert!(!key_file.exists());
    }

    #[tokio::test]
    async fn test_private_key_removed_after_failed_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut playbook = run(dir.path());
        playbook.private_key = Some("KEY".to_string());
        let runner = RecordingRunner::failing("ansible-playbook");

        assert!(run_playbook(&runner, &playbook).await.is_err());
        assert!(!dir.path().join("ssh_private_key").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_key_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("ssh_private_key");
        std::fs::write(&key_file, "old").unwrap();
        std::fs::set_permissions(&key_file, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_key(&key_file, "SECRET").unwrap();

        let mode = std::fs::metadata(&key_file).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(std::fs::read_to_string(&key_file).unwrap(), "SECRET\n");
    }

    #[tokio::test]
    async fn test_failure_is_ansible_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::failing("ansible-playbook");
        assert!(matches!(
            run_playbook(&runner, &run(dir.path())).await,
            Err(UpgradeError::Ansible(_))
        ));
    }
}
