//! Cluster subnet snapshot from the logical router port listing

use ovn_gateway_common::{GatewayError, GatewayResult};
use tracing::trace;

/// Name of the router port that joins the cluster router to this node's
/// switch. Its network is node-local and must not be exempted from NAT.
pub fn node_router_port(cluster_router: &str, node_switch: &str) -> String {
    format!("{}-{}", cluster_router, node_switch)
}

/// Parse the router port listing into the list of cluster subnets.
///
/// Non-empty lines alternate between a port name and that port's networks
/// (space separated CIDRs). Networks of `excluded_port` are skipped, all
/// others are returned in listing order.
///
/// A listing that does not pair up fails instead of being read with names
/// and networks shifted against each other.
pub fn parse_subnets(output: &str, excluded_port: &str) -> GatewayResult<Vec<String>> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() % 2 != 0 {
        return Err(GatewayError::malformed_router_ports(format!(
            "expected name/networks pairs, got {} non-empty lines",
            lines.len()
        )));
    }

    let mut subnets = Vec::new();
    for pair in lines.chunks_exact(2) {
        let (name, networks) = (pair[0], pair[1]);

        let cidrs: Vec<&str> = networks.split_whitespace().collect();
        if let Some(bad) = cidrs.iter().find(|cidr| !cidr.contains('/')) {
            return Err(GatewayError::malformed_router_ports(format!(
                "port '{}' has network '{}' without a prefix length",
                name, bad
            )));
        }

        if name == excluded_port {
            trace!(port = %name, "Skipping node router port");
            continue;
        }
        subnets.extend(cidrs.into_iter().map(str::to_string));
    }

    Ok(subnets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_node_router_port() {
        assert_eq!(node_router_port("ovn-cluster", "join"), "ovn-cluster-join");
    }

    #[test]
    fn test_excludes_node_port() {
        let output = "sw-a\n10.1.0.0/16\njoin-a\n100.64.0.0/16\n";
        let subnets = parse_subnets(output, &node_router_port("join", "a")).unwrap();
        assert_eq!(subnets, vec!["10.1.0.0/16".to_string()]);
    }

    #[test]
    fn test_blank_separators_and_order() {
        let output = "\
ovn-cluster-join
100.64.0.1/16

ovn-cluster-ovn-default
10.16.0.1/16

ovn-cluster-tenant-a
10.20.0.1/24
";
        let subnets = parse_subnets(output, "ovn-cluster-join").unwrap();
        assert_eq!(
            subnets,
            vec!["10.16.0.1/16".to_string(), "10.20.0.1/24".to_string()]
        );
    }

    #[test]
    fn test_no_match_keeps_everything() {
        let output = "a\n10.1.0.0/16\nb\n10.2.0.0/16\n";
        let subnets = parse_subnets(output, "ovn-cluster-join").unwrap();
        assert_eq!(
            subnets,
            vec!["10.1.0.0/16".to_string(), "10.2.0.0/16".to_string()]
        );
    }

    #[test]
    fn test_dual_stack_networks_are_split() {
        let output = "ovn-cluster-ovn-default\n10.16.0.1/16 fd00:10:16::1/64\n";
        let subnets = parse_subnets(output, "ovn-cluster-join").unwrap();
        assert_eq!(
            subnets,
            vec!["10.16.0.1/16".to_string(), "fd00:10:16::1/64".to_string()]
        );
    }

    #[test]
    fn test_empty_listing() {
        assert!(parse_subnets("", "ovn-cluster-join").unwrap().is_empty());
        assert!(parse_subnets("\n\n", "ovn-cluster-join").unwrap().is_empty());
    }

    #[test]
    fn test_odd_line_count_is_rejected() {
        let output = "ovn-cluster-join\n100.64.0.1/16\nlonely-port\n";
        let err = parse_subnets(output, "ovn-cluster-join").unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRouterPorts { .. }));
    }

    #[test]
    fn test_misaligned_listing_is_rejected() {
        // A port without networks shifts the following name into the
        // networks position.
        let output = "port-a\nport-b\n10.2.0.0/16\nport-c\n";
        let err = parse_subnets(output, "ovn-cluster-join").unwrap_err();
        assert!(err.to_string().contains("port-b"));
    }
}
