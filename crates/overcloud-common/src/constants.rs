//! Well-known names and paths shared by the CLI and the workflow engine.

/// Default location of the heat templates on the undercloud.
pub const TRIPLEO_HEAT_TEMPLATES: &str = "/usr/share/openstack-tripleo-heat-templates/";

/// Default stack name when neither `--stack` nor `OVERCLOUD_STACK_NAME` is set.
pub const DEFAULT_STACK_NAME: &str = "overcloud";

pub const FFWD_UPGRADE_PREPARE_ENV: &str = "environments/lifecycle/ffwd-upgrade-prepare.yaml";
pub const FFWD_UPGRADE_CONVERGE_ENV: &str = "environments/lifecycle/ffwd-upgrade-converge.yaml";
pub const CEPH_UPGRADE_PREPARE_ENV: &str = "environments/lifecycle/ceph-upgrade-prepare.yaml";

pub const FFWD_UPGRADE_PLAYBOOK: &str = "fast_forward_upgrade_playbook.yaml";

/// ceph-ansible playbook used while preparing a fast-forward upgrade.
pub const CEPH_ANSIBLE_SITE_PLAYBOOK: &str = "/usr/share/ceph-ansible/site-docker.yml.sample";

/// ceph-ansible playbook used for the ceph rolling upgrade.
pub const CEPH_ANSIBLE_ROLLING_UPDATE_PLAYBOOK: &str =
    "/usr/share/ceph-ansible/infrastructure-playbooks/rolling_update.yml";

/// Script run on every overcloud node before the ffwd-upgrade plan update.
pub const FFWD_UPGRADE_PREPARE_SCRIPT: &str = "#!/bin/bash
if [[ -f /etc/resolv.conf.save ]] ; then rm /etc/resolv.conf.save; fi
if systemctl is-enabled --quiet os-collect-config; then
    systemctl stop os-collect-config
    systemctl disable os-collect-config
fi
";

/// Nodes introspected at once by the remote engine.
pub const DEFAULT_INTROSPECTION_CONCURRENCY: u32 = 20;

pub const DEFAULT_SSH_USER: &str = "tripleo-admin";
pub const DEFAULT_SSH_NETWORK: &str = "ctlplane";

/// Stack output holding `role -> network -> [ip]`.
pub const ROLE_NET_IP_MAP_OUTPUT: &str = "RoleNetIpMap";

/// Default ansible inventory path, relative to the operator's home directory.
pub const DEFAULT_INVENTORY_FILE: &str = "tripleo-ansible-inventory.yaml";

pub const UNDERCLOUD_PASSWORD_FILE: &str = "~/undercloud-passwords.conf";
pub const UNDERCLOUD_STACKRC_FILE: &str = "~/stackrc";

/// Remote workflow names.
pub mod workflows {
    pub const REGISTER_OR_UPDATE: &str = "tripleo.baremetal.v1.register_or_update";
    pub const PROVIDE: &str = "tripleo.baremetal.v1.provide";
    pub const INTROSPECT: &str = "tripleo.baremetal.v1.introspect";
    pub const INTROSPECT_MANAGEABLE_NODES: &str =
        "tripleo.baremetal.v1.introspect_manageable_nodes";
    pub const PROVIDE_MANAGEABLE_NODES: &str = "tripleo.baremetal.v1.provide_manageable_nodes";

    pub const PACKAGE_UPDATE_PLAN: &str = "tripleo.package_update.v1.package_update_plan";
    pub const GET_CONFIG: &str = "tripleo.package_update.v1.get_config";
    pub const UPDATE_NODES: &str = "tripleo.package_update.v1.update_nodes";
    pub const FFWD_UPGRADE_CONVERGE_PLAN: &str =
        "tripleo.package_update.v1.ffwd_upgrade_converge_plan";

    pub const DEPLOY_ON_SERVERS: &str = "tripleo.deployment.v1.deploy_on_servers";
    pub const CREATE_OVERCLOUDRC: &str = "tripleo.deployment.v1.create_overcloudrc";
    pub const ENABLE_SSH_ADMIN: &str = "tripleo.access.v1.enable_ssh_admin";

    pub const GET_PRIVKEY_ACTION: &str = "tripleo.validations.get_privkey";
}
