//! `netdraw inventory`: inventory hosts as toolbox device templates.

use tabled::Tabled;

use netdraw_api::{Host, InventoryClient, TlsMode, TransportConfig};
use netdraw_core::model::DeviceTemplate;
use netdraw_core::{DeviceType, SessionConfig, TlsVerification};

use crate::cli::{GlobalOpts, InventoryArgs, InventoryCommand};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "Host ID")]
    host_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    device_type: String,
}

pub fn transport_for(config: &SessionConfig) -> TransportConfig {
    TransportConfig {
        tls: match &config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout: config.timeout,
        token: config.token.clone(),
    }
}

/// The palette entry a host becomes. Unknown or missing
/// `ansible_topology.type` values fall back to a plain host.
pub fn template_for(host: &Host) -> DeviceTemplate {
    let device_type = host
        .topology_type()
        .and_then(|t| t.parse::<DeviceType>().ok())
        .unwrap_or_default();
    let mut template = DeviceTemplate::new(host.name.clone(), device_type);
    template.host_id = Some(host.id);
    template
}

pub async fn handle(
    args: &InventoryArgs,
    config: &SessionConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        InventoryCommand::Hosts => {
            let client = InventoryClient::new(config.url.as_str(), &transport_for(config))?;
            let hosts = client.list_hosts(config.inventory_id).await?;
            let templates: Vec<DeviceTemplate> = hosts.iter().map(template_for).collect();

            let rendered = output::render_list(
                global.output,
                &templates,
                |t| HostRow {
                    host_id: t.host_id.map(|id| id.to_string()).unwrap_or_default(),
                    name: t.name.clone(),
                    device_type: t.device_type.to_string(),
                },
                |t| t.name.clone(),
            )?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(variables: &str) -> Host {
        Host {
            id: 12,
            name: "leaf1".into(),
            description: String::new(),
            inventory: Some(1),
            enabled: true,
            variables: variables.into(),
        }
    }

    #[test]
    fn topology_type_picks_the_device_type() {
        let t = template_for(&host("ansible_topology:\n  type: switch\n"));
        assert_eq!(t.device_type, DeviceType::Switch);
        assert_eq!(t.host_id, Some(12));
        assert_eq!(t.name, "leaf1");
    }

    #[test]
    fn unknown_types_become_hosts() {
        assert_eq!(template_for(&host(r#"{"ansible_topology": {"type": "toaster"}}"#)).device_type, DeviceType::Host);
        assert_eq!(template_for(&host("")).device_type, DeviceType::Host);
    }

    #[test]
    fn insecure_sessions_skip_verification() {
        let mut config = SessionConfig::new("https://awx.lab".parse().expect("url"), 1);
        config.tls = TlsVerification::DangerAcceptInvalid;
        assert_eq!(transport_for(&config).tls, TlsMode::DangerAcceptInvalid);
    }
}
