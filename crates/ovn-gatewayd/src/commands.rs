//! Shell command builders for the gateway backends

use ovn_gateway_common::shell;

use crate::types::{IpFamily, IpSetMetadata, IpSetNaming, LOCAL_POD_SET, SUBNET_SET};

/// Build the masquerade rule tokens.
///
/// Traffic sourced from a local pod and not destined to any cluster subnet
/// is masqueraded.
pub fn build_nat_rule(naming: &IpSetNaming) -> Vec<String> {
    let pod_set = naming.main_name(LOCAL_POD_SET);
    let subnet_set = naming.main_name(SUBNET_SET);
    vec![
        "-m".to_string(),
        "set".to_string(),
        "--match-set".to_string(),
        pod_set,
        "src".to_string(),
        "-m".to_string(),
        "set".to_string(),
        "!".to_string(),
        "--match-set".to_string(),
        subnet_set,
        "dst".to_string(),
        "-j".to_string(),
        "MASQUERADE".to_string(),
    ]
}

fn iptables_binary(family: IpFamily) -> &'static str {
    match family {
        IpFamily::Ipv4 => shell::IPTABLES_CMD,
        IpFamily::Ipv6 => shell::IP6TABLES_CMD,
    }
}

fn build_iptables_cmd(
    family: IpFamily,
    op: &str,
    table: &str,
    chain: &str,
    rule: &[String],
) -> String {
    let mut cmd = format!(
        "{} -w -t {} {} {}",
        iptables_binary(family),
        shell::shellquote(table),
        op,
        shell::shellquote(chain)
    );
    for token in rule {
        cmd.push(' ');
        cmd.push_str(&shell::shellquote(token));
    }
    cmd
}

/// Build the rule existence check (`-C`); exit code 1 means absent
pub fn build_iptables_check_cmd(
    family: IpFamily,
    table: &str,
    chain: &str,
    rule: &[String],
) -> String {
    build_iptables_cmd(family, "-C", table, chain, rule)
}

/// Build the rule append command (`-A`)
pub fn build_iptables_append_cmd(
    family: IpFamily,
    table: &str,
    chain: &str,
    rule: &[String],
) -> String {
    build_iptables_cmd(family, "-A", table, chain, rule)
}

/// Build the `ipset restore` invocation. The script is fed on stdin.
pub fn build_ipset_restore_cmd() -> String {
    format!("{} restore", shell::IPSET_CMD)
}

/// Render the restore script that atomically replaces one set.
///
/// The new membership is loaded into the temporary set, which is then
/// swapped with the live set and destroyed. Both sets are created with
/// `-exist` so the script is valid whether or not they already exist.
pub fn render_ipset_replace(
    naming: &IpSetNaming,
    meta: &IpSetMetadata,
    members: &[String],
    script: &mut String,
) {
    let main = naming.main_name(&meta.set_id);
    let temp = naming.temp_name(&meta.set_id);
    let create_opts = format!(
        "{} family {} maxelem {}",
        meta.set_type.as_str(),
        naming.family().ipset_family(),
        meta.max_size
    );

    script.push_str(&format!("create {} {} -exist\n", main, create_opts));
    script.push_str(&format!("create {} {} -exist\n", temp, create_opts));
    script.push_str(&format!("flush {}\n", temp));
    for member in members {
        script.push_str(&format!("add {} {}\n", temp, member));
    }
    script.push_str(&format!("swap {} {}\n", temp, main));
    script.push_str(&format!("destroy {}\n", temp));
}

/// Build the router port query against the OVN northbound database.
///
/// With `--data=bare --no-heading` each port is printed as its name line
/// followed by its networks line, records separated by a blank line.
pub fn build_list_router_ports_cmd(nb_address: Option<&str>, timeout_secs: u64) -> String {
    let mut cmd = shell::OVN_NBCTL_CMD.to_string();
    if let Some(addr) = nb_address {
        cmd.push_str(&format!(" --db={}", shell::shellquote(addr)));
    }
    cmd.push_str(&format!(
        " --timeout={} --data=bare --no-heading --columns=name,networks list Logical_Router_Port",
        timeout_secs
    ));
    cmd
}
