use tera::{Context, Tera};

use crate::error::ChannelError;
use crate::models::{SuffixMatch, ETH_TYPE_IPV4};
use crate::utils;

/// Open vSwitch add-flow command for one SUFFIX-tier rule
pub const DEFAULT_SUFFIX_COMMAND_TEMPLATE: &str = "sudo ovs-ofctl add-flow {{ bridge }} \
nw_dst={{ nw_dst }},priority={{ priority }},dl_type={{ dl_type }},idle_timeout={{ idle_timeout }},\
actions=output:{{ port }} --protocols=OpenFlow13";

const TEMPLATE_NAME: &str = "suffix_rule";

/// Typed arguments of one suffix rule command
#[derive(Debug, Clone, Copy)]
pub struct SuffixFlow<'a> {
    pub bridge: &'a str,
    pub output_port: u32,
    pub last_octet: u8,
    pub priority: u16,
    pub idle_timeout_secs: u32,
}

/// Compiled command template. Rendering yields an argv; every substituted
/// value is a number, a dotted address or a checked bridge name, so no value
/// can introduce extra arguments.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    tera: Tera,
}

impl CommandTemplate {
    pub fn new(template: &str) -> anyhow::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, template)
            .map_err(|e| anyhow::anyhow!("Invalid command template: {}", e))?;
        Ok(Self { tera })
    }

    pub fn render(&self, flow: &SuffixFlow<'_>) -> Result<Vec<String>, ChannelError> {
        if !utils::is_valid_bridge_name(flow.bridge) {
            return Err(ChannelError::InvalidCommand(format!("invalid bridge name '{}'", flow.bridge)));
        }
        let suffix = SuffixMatch::new(flow.last_octet);

        let mut context = Context::new();
        context.insert("bridge", flow.bridge);
        context.insert("nw_dst", &suffix.to_string());
        context.insert("suffix", &flow.last_octet);
        context.insert("priority", &flow.priority);
        context.insert("dl_type", &format!("{:#06x}", ETH_TYPE_IPV4));
        context.insert("idle_timeout", &flow.idle_timeout_secs);
        context.insert("port", &flow.output_port);

        let rendered = self
            .tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|e| ChannelError::InvalidCommand(format!("Template rendering failed: {}", e)))?;
        let argv: Vec<String> = rendered.split_whitespace().map(str::to_string).collect();
        if argv.is_empty() {
            return Err(ChannelError::InvalidCommand("command template rendered empty".to_string()));
        }
        Ok(argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_matches_reference_command() {
        let argv = CommandTemplate::new(DEFAULT_SUFFIX_COMMAND_TEMPLATE)
            .unwrap()
            .render(&SuffixFlow {
                bridge: "e000001",
                output_port: 4,
                last_octet: 3,
                priority: 10,
                idle_timeout_secs: 0,
            })
            .unwrap();
        assert_eq!(
            argv.join(" "),
            "sudo ovs-ofctl add-flow e000001 nw_dst=0.0.0.3/0.0.0.255,priority=10,\
dl_type=0x0800,idle_timeout=0,actions=output:4 --protocols=OpenFlow13"
        );
        assert_eq!(argv.len(), 6);
    }

    #[test]
    fn test_custom_template() {
        let template = CommandTemplate::new(
            "ovs-ofctl -O OpenFlow13 add-flow {{ bridge }} ip,nw_dst={{ nw_dst }},priority={{ priority }},actions=output:{{ port }}",
        )
        .unwrap();
        let argv = template
            .render(&SuffixFlow {
                bridge: "a000201",
                output_port: 3,
                last_octet: 2,
                priority: 10,
                idle_timeout_secs: 300,
            })
            .unwrap();
        assert_eq!(argv[0], "ovs-ofctl");
        assert_eq!(argv[4], "a000201");
        assert_eq!(argv[5], "ip,nw_dst=0.0.0.2/0.0.0.255,priority=10,actions=output:3");
    }

    #[test]
    fn test_bad_templates() {
        assert!(CommandTemplate::new("ovs-ofctl {{ bridge").is_err());
        let empty = CommandTemplate::new("   ").unwrap();
        let flow = SuffixFlow { bridge: "e000001", output_port: 3, last_octet: 2, priority: 10, idle_timeout_secs: 0 };
        assert!(matches!(empty.render(&flow), Err(ChannelError::InvalidCommand(_))));
        let unknown = CommandTemplate::new("ovs-ofctl {{ nonexistent }}").unwrap();
        assert!(unknown.render(&flow).is_err());
    }

    #[test]
    fn test_rejects_unsafe_bridge_names() {
        let template = CommandTemplate::new(DEFAULT_SUFFIX_COMMAND_TEMPLATE).unwrap();
        for bridge in ["", "e0;reboot", "e000001 -O", "a0123456789abcdef"] {
            let flow = SuffixFlow { bridge, output_port: 3, last_octet: 2, priority: 10, idle_timeout_secs: 0 };
            match template.render(&flow) {
                Err(ChannelError::InvalidCommand(msg)) => assert!(msg.contains("bridge")),
                other => panic!("{:?} rendered as {:?}", bridge, other),
            }
        }
    }
}
