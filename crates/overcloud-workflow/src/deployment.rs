//! Post-deploy access: rc files and ssh admin

use crate::error::{Result, WorkflowError};
use crate::execution::WorkflowInput;
use crate::interpret::OperationShape;
use crate::operation::{decode, remote, Orchestrator};
use overcloud_common::constants::workflows;
use overcloud_common::Stack;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Contents of the generated rc files, keyed `overcloudrc` / `overcloudrc.v3`
pub type Overcloudrcs = BTreeMap<String, String>;

/// Generate the rc files for a deployed plan
pub async fn create_overcloudrc(orchestrator: &Orchestrator, container: &str) -> Result<Overcloudrcs> {
    let mut input = WorkflowInput::new();
    input.insert("container".to_string(), Value::from(container));

    let message = orchestrator
        .execute(workflows::CREATE_OVERCLOUDRC, input)
        .await?;
    let rcs = message.payload.get("overcloudrc").cloned();
    decode(
        message,
        OperationShape::Flat,
        remote(workflows::CREATE_OVERCLOUDRC),
    )?;

    match rcs {
        Some(Value::Object(files)) => Ok(files
            .into_iter()
            .filter_map(|(name, content)| match content {
                Value::String(content) => Some((name, content)),
                _ => None,
            })
            .collect()),
        _ => Err(WorkflowError::MalformedMessage(
            "missing 'overcloudrc' mapping".to_string(),
        )),
    }
}

/// Write `{stack}rc` and `{stack}rc.v3` into `dir`, readable by the owner only.
///
/// Returns the paths written.
pub fn write_overcloudrc(stack_name: &str, rcs: &Overcloudrcs, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (key, suffix) in [("overcloudrc", "rc"), ("overcloudrc.v3", "rc.v3")] {
        let Some(content) = rcs.get(key) else {
            warn!(file = key, "rc file missing from workflow result");
            continue;
        };
        let path = dir.join(format!("{}{}", stack_name, suffix));
        write_private(&path, content).map_err(|e| WorkflowError::io(&path, e))?;
        info!(path = %path.display(), "Wrote rc file");
        written.push(path);
    }
    Ok(written)
}

fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        let mut file = options.open(path)?;
        // mode() only applies on create
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(content.as_bytes())
    }
    #[cfg(not(unix))]
    {
        options.open(path)?.write_all(content.as_bytes())
    }
}

/// Authorize `ssh_user` on `hosts` with the given private key
pub async fn enable_ssh_admin(
    orchestrator: &Orchestrator,
    hosts: &[String],
    ssh_user: &str,
    ssh_private_key: &str,
) -> Result<()> {
    let mut input = WorkflowInput::new();
    input.insert("ssh_servers".to_string(), hosts.into());
    input.insert("ssh_user".to_string(), Value::from(ssh_user));
    input.insert("ssh_private_key".to_string(), Value::from(ssh_private_key));

    info!(hosts = hosts.len(), user = %ssh_user, "Enabling ssh admin access");
    orchestrator
        .run(
            workflows::ENABLE_SSH_ADMIN,
            input,
            OperationShape::Flat,
            WorkflowError::Deployment,
        )
        .await?;
    Ok(())
}

/// Discover the stack's hosts on `network` and enable ssh admin on them
pub async fn get_hosts_and_enable_ssh_admin(
    orchestrator: &Orchestrator,
    stack: &Stack,
    network: &str,
    ssh_user: &str,
    ssh_key: &Path,
) -> Result<Vec<String>> {
    let hosts = stack.overcloud_hosts(network);
    if hosts.is_empty() {
        return Err(WorkflowError::Deployment(format!(
            "Cannot find any hosts on '{}' in network '{}'",
            stack.stack_name, network
        )));
    }

    let key = tokio::fs::read_to_string(ssh_key)
        .await
        .map_err(|e| WorkflowError::io(ssh_key, e))?;
    enable_ssh_admin(orchestrator, &hosts, ssh_user, &key).await?;
    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::testing::orchestrator;
    use serde_json::json;

    fn stack_with_hosts() -> Stack {
        Stack::new("id-1", "overcloud").with_output(
            "RoleNetIpMap",
            json!({
                "Controller": {"ctlplane": ["192.168.24.10"]},
                "Compute": {"ctlplane": ["192.168.24.20", "192.168.24.10"]}
            }),
        )
    }

    #[tokio::test]
    async fn test_create_overcloudrc() {
        let (orchestrator, engine, _reporter, _bus) = orchestrator();
        engine.respond(json!({
            "status": "SUCCESS",
            "overcloudrc": {"overcloudrc": "export OS_CLOUD=overcloud", "overcloudrc.v3": "v3"}
        }));

        let rcs = create_overcloudrc(&orchestrator, "overcloud").await.unwrap();

        assert_eq!(rcs["overcloudrc"], "export OS_CLOUD=overcloud");
        assert_eq!(rcs["overcloudrc.v3"], "v3");
        assert_eq!(engine.last_input()["container"], json!("overcloud"));
    }

    #[tokio::test]
    async fn test_create_overcloudrc_failure() {
        let (orchestrator, engine, _reporter, _bus) = orchestrator();
        engine.respond(json!({"status": "ERROR", "message": "no plan"}));

        let err = create_overcloudrc(&orchestrator, "overcloud").await.unwrap_err();
        assert_eq!(err.to_string(), "no plan");
    }

    #[test]
    fn test_write_overcloudrc() {
        let dir = tempfile::tempdir().unwrap();
        let rcs = Overcloudrcs::from([
            ("overcloudrc".to_string(), "rc".to_string()),
            ("overcloudrc.v3".to_string(), "rc3".to_string()),
        ]);

        let written = write_overcloudrc("mystack", &rcs, dir.path()).unwrap();

        assert_eq!(
            written,
            vec![dir.path().join("mystackrc"), dir.path().join("mystackrc.v3")]
        );
        assert_eq!(std::fs::read_to_string(&written[1]).unwrap(), "rc3");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&written[0]).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_enable_ssh_admin_on_discovered_hosts() {
        let (orchestrator, engine, _reporter, _bus) = orchestrator();
        engine.respond(json!({"status": "SUCCESS"}));
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("id_rsa");
        std::fs::write(&key, "PRIVATE").unwrap();

        let hosts = get_hosts_and_enable_ssh_admin(
            &orchestrator,
            &stack_with_hosts(),
            "ctlplane",
            "tripleo-admin",
            &key,
        )
        .await
        .unwrap();

        assert_eq!(hosts, vec!["192.168.24.10", "192.168.24.20"]);
        let input = engine.last_input();
        assert_eq!(input["ssh_servers"], json!(["192.168.24.10", "192.168.24.20"]));
        assert_eq!(input["ssh_private_key"], json!("PRIVATE"));
    }

    #[tokio::test]
    async fn test_no_hosts_fails_before_submitting() {
        let (orchestrator, engine, _reporter, _bus) = orchestrator();

        let err = get_hosts_and_enable_ssh_admin(
            &orchestrator,
            &stack_with_hosts(),
            "storage",
            "tripleo-admin",
            Path::new("/nonexistent"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WorkflowError::Deployment(_)));
        assert_eq!(engine.submission_count(), 0);
    }
}
