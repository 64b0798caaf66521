//! Model metadata from `POST /api/show`, rendered as a plain-text report.

use serde::{Deserialize, Serialize};

const RULE: &str = "========================================";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub modelfile: Option<String>,

    #[serde(default)]
    pub parameters: Option<String>,

    #[serde(default)]
    pub template: Option<String>,

    #[serde(default)]
    pub details: serde_json::Value,

    #[serde(default)]
    pub model_info: serde_json::Value,
}

impl ModelInfo {
    /// Render the sectioned report written by `bashbot model-info`.
    pub fn render_report(&self, model: &str) -> String {
        let mut out = format!("# Model Information for: {model}\n{RULE}\n\n");

        let sections = [
            ("MODELFILE", text_section(self.modelfile.as_deref())),
            ("PARAMETERS", text_section(self.parameters.as_deref())),
            ("TEMPLATE", text_section(self.template.as_deref())),
            ("DETAILS", json_section(&self.details)),
        ];
        for (title, body) in sections {
            out.push_str(&format!("--- {title} ---\n{body}\n\n{RULE}\n\n"));
        }

        out.push_str(&format!(
            "--- MODEL INFO ---\n{}\n",
            json_section(&self.model_info)
        ));
        out
    }

    /// Default file name for a saved report: `model_info_<model>.txt`, with
    /// `:` replaced so tags stay filesystem-safe.
    pub fn report_file_name(model: &str) -> String {
        format!("model_info_{}.txt", model.replace(':', "_"))
    }
}

fn text_section(value: Option<&str>) -> String {
    value
        .map(|v| v.replace("\\n", "\n").replace("\\\"", "\""))
        .unwrap_or_else(|| "N/A".into())
}

fn json_section(value: &serde_json::Value) -> String {
    if value.is_null() {
        return "{}".into();
    }
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_has_all_sections() {
        let info: ModelInfo = serde_json::from_str(
            r#"{
                "modelfile": "FROM qwen3:8b\\nPARAMETER num_ctx 8192",
                "parameters": "num_ctx 8192",
                "template": "{{ .Prompt }}",
                "details": {"family": "qwen3", "parameter_size": "8.2B"},
                "model_info": {"general.architecture": "qwen3"}
            }"#,
        )
        .unwrap();

        let report = info.render_report("bashbot");
        assert!(report.starts_with("# Model Information for: bashbot\n"));
        for title in ["MODELFILE", "PARAMETERS", "TEMPLATE", "DETAILS", "MODEL INFO"] {
            assert!(report.contains(&format!("--- {title} ---")), "missing {title}");
        }
        assert!(report.contains("FROM qwen3:8b\nPARAMETER num_ctx 8192"));
        assert!(report.contains("\"family\": \"qwen3\""));
    }

    #[test]
    fn missing_fields_render_placeholders() {
        let report = ModelInfo::default().render_report("x");
        assert!(report.contains("--- MODELFILE ---\nN/A"));
        assert!(report.contains("--- DETAILS ---\n{}"));
    }

    #[test]
    fn file_name_is_filesystem_safe() {
        assert_eq!(
            ModelInfo::report_file_name("llama3:8b"),
            "model_info_llama3_8b.txt"
        );
    }
}
