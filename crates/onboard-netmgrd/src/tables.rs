//! Class names, collection paths and built-in object lists

/// Declaration class names
pub mod classes {
    pub const DEVICE_GROUP: &str = "DeviceGroup";
    pub const DNS_RESOLVER: &str = "DNS_Resolver";
    pub const ROUTE: &str = "Route";
    pub const SELF_IP: &str = "SelfIp";
    pub const FIREWALL_POLICY: &str = "FirewallPolicy";
    pub const FIREWALL_ADDRESS_LIST: &str = "FirewallAddressList";
    pub const FIREWALL_PORT_LIST: &str = "FirewallPortList";
    pub const VLAN: &str = "VLAN";
    pub const TRUNK: &str = "Trunk";
    pub const ROUTE_DOMAIN: &str = "RouteDomain";
    pub const REMOTE_AUTH_ROLE: &str = "RemoteAuthRole";
    pub const MANAGEMENT_ROUTE: &str = "ManagementRoute";
    pub const TUNNEL: &str = "Tunnel";
    pub const ROUTE_MAP: &str = "RouteMap";
    pub const ROUTING_ACCESS_LIST: &str = "RoutingAccessList";
    pub const ROUTING_AS_PATH: &str = "RoutingAsPath";
    pub const ROUTING_PREFIX_LIST: &str = "RoutingPrefixList";
    pub const GSLB_MONITOR: &str = "GSLBMonitor";
    pub const GSLB_PROBER_POOL: &str = "GSLBProberPool";
    pub const GSLB_SERVER: &str = "GSLBServer";
    pub const GSLB_DATA_CENTER: &str = "GSLBDataCenter";
    pub const SNMP_TRAP_DESTINATION: &str = "SnmpTrapDestination";
    pub const SNMP_COMMUNITY: &str = "SnmpCommunity";
    pub const SNMP_USER: &str = "SnmpUser";
    pub const AUTHENTICATION: &str = "Authentication";
    pub const PROVISION: &str = "Provision";
    pub const CONFIG_SYNC: &str = "ConfigSync";
}

use classes::*;

/// Order in which classes are deleted
pub const DELETE_ORDER: &[&str] = &[
    DEVICE_GROUP,
    DNS_RESOLVER,
    ROUTE,
    SELF_IP,
    FIREWALL_POLICY,
    FIREWALL_ADDRESS_LIST,
    FIREWALL_PORT_LIST,
    VLAN,
    TRUNK,
    ROUTE_DOMAIN,
    REMOTE_AUTH_ROLE,
    MANAGEMENT_ROUTE,
    TUNNEL,
    ROUTE_MAP,
    ROUTING_ACCESS_LIST,
    ROUTING_AS_PATH,
    ROUTING_PREFIX_LIST,
    GSLB_MONITOR,
    SNMP_TRAP_DESTINATION,
    SNMP_COMMUNITY,
    SNMP_USER,
];

/// GSLB classes pre-deleted together, in transaction order
pub const GSLB_LINKED_CLASSES: &[&str] = &[GSLB_PROBER_POOL, GSLB_SERVER, GSLB_DATA_CENTER];

/// Order in which network classes are applied
pub const NETWORK_APPLY_ORDER: &[&str] = &[
    TRUNK,
    TUNNEL,
    VLAN,
    ROUTE_DOMAIN,
    SELF_IP,
    ROUTE,
    DNS_RESOLVER,
    MANAGEMENT_ROUTE,
    ROUTING_ACCESS_LIST,
    ROUTING_AS_PATH,
    ROUTING_PREFIX_LIST,
    ROUTE_MAP,
    FIREWALL_ADDRESS_LIST,
    FIREWALL_PORT_LIST,
    FIREWALL_POLICY,
];

/// Returns the appliance collection path of a class
pub fn collection_path(class: &str) -> Option<&'static str> {
    let path = match class {
        DEVICE_GROUP => "/tm/cm/device-group",
        DNS_RESOLVER => "/tm/net/dns-resolver",
        ROUTE => "/tm/net/route",
        SELF_IP => "/tm/net/self",
        FIREWALL_POLICY => "/tm/security/firewall/policy",
        FIREWALL_ADDRESS_LIST => "/tm/security/firewall/address-list",
        FIREWALL_PORT_LIST => "/tm/security/firewall/port-list",
        VLAN => "/tm/net/vlan",
        TRUNK => "/tm/net/trunk",
        ROUTE_DOMAIN => "/tm/net/route-domain",
        REMOTE_AUTH_ROLE => "/tm/auth/remote-role/role-info",
        MANAGEMENT_ROUTE => "/tm/sys/management-route",
        TUNNEL => "/tm/net/tunnels/tunnel",
        ROUTE_MAP => "/tm/net/routing/route-map",
        ROUTING_ACCESS_LIST => "/tm/net/routing/access-list",
        ROUTING_AS_PATH => "/tm/net/routing/as-path",
        ROUTING_PREFIX_LIST => "/tm/net/routing/prefix-list",
        GSLB_MONITOR => "/tm/gtm/monitor",
        GSLB_PROBER_POOL => "/tm/gtm/prober-pool",
        GSLB_SERVER => "/tm/gtm/server",
        GSLB_DATA_CENTER => "/tm/gtm/datacenter",
        SNMP_TRAP_DESTINATION => "/tm/sys/snmp/traps",
        SNMP_COMMUNITY => "/tm/sys/snmp/communities",
        SNMP_USER => "/tm/sys/snmp/users",
        _ => return None,
    };
    Some(path)
}

// Appliance paths outside the class table
pub const DEVICE_PATH: &str = "/tm/cm/device";
pub const PROVISION_PATH: &str = "/tm/sys/provision";
pub const AUTH_PATH: &str = "/tm/auth";
pub const TRANSACTION_PATH: &str = "/tm/transaction";

/// Partition holding routes flagged `localOnly`
pub const LOCAL_ONLY_PARTITION: &str = "LOCAL_ONLY";

/// Traffic group of non-floating self IPs
pub const LOCAL_ONLY_TRAFFIC_GROUP: &str = "traffic-group-local-only";

/// Name the permanent default route domain is addressed by
pub const DEFAULT_ROUTE_DOMAIN_NAME: &str = "0";

/// Tunnel profile that implies a companion object
pub const VXLAN_PROFILE: &str = "/Common/vxlan";

/// Suffix of the tunnel companion object
pub const VXLAN_COMPANION_SUFFIX: &str = "-vxlan";

/// Fixed name of remote authentication objects
pub const SYSTEM_AUTH_NAME: &str = "system-auth";

/// Remote authentication kinds, in processing order
pub const AUTH_KINDS: &[&str] = &["radius", "ldap", "tacacs"];

/// Secondary RADIUS servers, deleted after the primary object
pub const RADIUS_SERVER_PATHS: &[&str] = &[
    "/tm/auth/radius-server/system_auth_name1",
    "/tm/auth/radius-server/system_auth_name2",
];

/// LDAP certificate and key files, as (referencing field, file path)
pub const LDAP_FILE_PATHS: &[(&str, &str)] = &[
    ("sslCaCertFile", "/tm/sys/file/ssl-cert/do_ldapCaCert.crt"),
    ("sslClientCert", "/tm/sys/file/ssl-cert/do_ldapClientCert.crt"),
    ("sslClientKey", "/tm/sys/file/ssl-key/do_ldapClientCert.key"),
];

/// Provisioning level meaning "not provisioned"
pub const LEVEL_NONE: &str = "none";

/// Provisioning level that changes resource allocation and needs a reboot
pub const LEVEL_DEDICATED: &str = "dedicated";

/// Built-in objects that are never deleted
pub mod builtins {
    pub const TUNNELS: &[&str] = &["http-tunnel", "socks-tunnel"];
    pub const DNS_RESOLVERS: &[&str] = &["f5-aws-dns"];
    pub const GSLB_MONITORS: &[&str] = &[
        "bigip",
        "bigip_link",
        "gateway_icmp",
        "http",
        "https",
        "tcp",
    ];
    pub const DEVICE_GROUPS: &[&str] = &[
        "device_trust_group",
        "gtm",
        "datasync-global-dg",
        "datasync-device-dg",
        "dos-global-dg",
    ];
}

/// Returns true if `name` is a built-in of `class` by name alone
pub fn is_builtin_name(class: &str, name: &str) -> bool {
    let list: &[&str] = match class {
        ROUTE_DOMAIN => &[DEFAULT_ROUTE_DOMAIN_NAME],
        TUNNEL => builtins::TUNNELS,
        DNS_RESOLVER => builtins::DNS_RESOLVERS,
        GSLB_MONITOR => builtins::GSLB_MONITORS,
        DEVICE_GROUP => builtins::DEVICE_GROUPS,
        _ => return false,
    };
    list.contains(&name)
}
