//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Offline device-configuration rendering."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::fmt::Write;

use ncm_common::NcmResult;
use ncm_model::{Device, Project};

/// Line that opens the configuration body in rendered CLI output. Everything
/// before it (banners, export headers) is dropped from baseline records.
pub const CONFIGURE_TERMINAL_MARKER: &str = "configure terminal";

/// Renders the offline textual configuration of one deployable device. This
/// is the only baseline collaborator with I/O-heavy implementations, so it
/// always runs outside the Domain Store lock.
pub trait ConfigRenderer: Send + Sync {
    /// Render the full CLI configuration for `device` within `project`.
    fn render_device_config(&self, project: &Project, device: &Device) -> NcmResult<String>;
}

/// Drop everything before the line containing the `configure terminal`
/// marker. Output without the marker passes through unchanged.
pub fn strip_to_configure_terminal(rendered: &str) -> &str {
    match rendered.find(CONFIGURE_TERMINAL_MARKER) {
        Some(index) => {
            let line_start = rendered[..index].rfind('\n').map(|i| i + 1).unwrap_or(0);
            &rendered[line_start..]
        }
        None => rendered,
    }
}

/// Renderer backed by the project's own device-configuration tables: one CLI
/// line per key/value setting, bracketed by `configure terminal` / `end`.
#[derive(Debug, Default)]
pub struct TableRenderer;

impl ConfigRenderer for TableRenderer {
    fn render_device_config(&self, project: &Project, device: &Device) -> NcmResult<String> {
        let mut out = String::new();
        let _ = writeln!(out, "! {} {}", device.model_name, device.firmware_version);
        let _ = writeln!(out, "! exported for {}", device.name);
        out.push_str("configure terminal\n");
        let _ = writeln!(out, " hostname {}", device.name);
        if let Some(table) = project.device_configs.get(&device.id) {
            for (key, value) in table {
                let _ = writeln!(out, " {key} {value}");
            }
        }
        out.push_str("end\n");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_drops_the_export_banner() {
        let rendered = "! banner line\n! another\nconfigure terminal\n hostname sw-1\nend\n";
        assert_eq!(
            strip_to_configure_terminal(rendered),
            "configure terminal\n hostname sw-1\nend\n"
        );
    }

    #[test]
    fn strip_passes_markerless_output_through() {
        let rendered = "raw dump without a body";
        assert_eq!(strip_to_configure_terminal(rendered), rendered);
    }

    #[test]
    fn table_renderer_emits_settings_between_brackets() {
        let mut project = Project::new(1, "plant-a");
        let device = Device {
            id: 3,
            name: "sw-3".to_owned(),
            model_name: "X-200".to_owned(),
            firmware_version: "1.4.2".to_owned(),
            managed: true,
            ..Default::default()
        };
        let mut table = std::collections::BTreeMap::new();
        table.insert("vlan".to_owned(), "10".to_owned());
        project.device_configs.insert(3, table);

        let rendered = TableRenderer.render_device_config(&project, &device).unwrap();
        assert!(rendered.contains("configure terminal\n hostname sw-3\n vlan 10\nend\n"));
        let stripped = strip_to_configure_terminal(&rendered);
        assert!(stripped.starts_with("configure terminal"));
        assert!(!stripped.contains("exported for"));
    }
}
