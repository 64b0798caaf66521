//! The tool registry and dispatcher.
//!
//! The registry binds manifests (what the model sees) to capabilities (what
//! runs). Dispatch never fails: every outcome, including unknown tools, bad
//! arguments, capability errors and panics, becomes the text of a tool-role
//! message so the conversation can continue.

use bashbot_core::error::ToolError;
use bashbot_core::memory::MemoryBackend;
use bashbot_core::message::ToolCall;
use bashbot_core::provider::ToolDefinition;
use bashbot_core::tool::{Tool, tool_error_message};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A capability bound to its manifest.
struct ToolEntry {
    capability: Arc<dyn Tool>,
    /// Captured once from `Tool::requires_store` at registration
    requires_store: bool,
    required_arguments: Vec<String>,
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get the manifests to send to the model
/// 2. Dispatch tool calls the model emits
#[derive(Default)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    entries: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a capability to its manifest. Replaces any tool with the same name.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        capability: Arc<dyn Tool>,
    ) -> Result<(), ToolError> {
        if definition.name() != capability.name() {
            return Err(ToolError::NameMismatch {
                manifest: definition.name().to_string(),
                capability: capability.name().to_string(),
            });
        }

        let name = definition.name().to_string();
        let entry = ToolEntry {
            requires_store: capability.requires_store(),
            required_arguments: definition
                .required_arguments()
                .into_iter()
                .map(String::from)
                .collect(),
            capability,
        };
        debug!(tool = %name, requires_store = entry.requires_store, "Registered tool");

        self.add_manifest(definition);
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Advertise a manifest without a capability behind it. Calls to it
    /// dispatch as "not found".
    pub fn add_manifest(&mut self, definition: ToolDefinition) {
        match self
            .definitions
            .iter_mut()
            .find(|d| d.name() == definition.name())
        {
            Some(existing) => *existing = definition,
            None => self.definitions.push(definition),
        }
    }

    /// Build a registry from loaded manifests and the available capabilities.
    ///
    /// Every manifest is advertised. Capabilities without a manifest are
    /// skipped with a warning since the model could never call them.
    pub fn from_manifests(
        manifests: Vec<ToolDefinition>,
        capabilities: Vec<Arc<dyn Tool>>,
    ) -> Result<Self, ToolError> {
        let mut by_name: HashMap<String, Arc<dyn Tool>> = capabilities
            .into_iter()
            .map(|c| (c.name().to_string(), c))
            .collect();

        let mut registry = Self::new();
        for manifest in manifests {
            match by_name.remove(manifest.name()) {
                Some(capability) => registry.register(manifest, capability)?,
                None => {
                    warn!(tool = %manifest.name(), "Manifest has no capability; calls will fail");
                    registry.add_manifest(manifest);
                }
            }
        }

        for name in by_name.keys() {
            warn!(tool = %name, "Capability has no manifest; not exposed to the model");
        }

        Ok(registry)
    }

    /// All manifests, in load order (for sending to the model).
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Names of tools with a capability bound.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Execute a tool call and render the outcome as tool-message content.
    pub async fn dispatch(&self, call: &ToolCall, memory: Option<&dyn MemoryBackend>) -> String {
        let name = call.name();
        match self.try_dispatch(name, call.arguments().clone(), memory).await {
            Ok(output) => {
                debug!(tool = %name, bytes = output.len(), "Tool succeeded");
                output
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool failed");
                tool_error_message(e)
            }
        }
    }

    /// Run a tool with a single string value bound to the first required
    /// argument named in its manifest.
    pub async fn run_single(
        &self,
        name: &str,
        value: &str,
        memory: Option<&dyn MemoryBackend>,
    ) -> String {
        let Some(entry) = self.entries.get(name) else {
            return tool_error_message(ToolError::NotFound(name.to_string()));
        };

        let Some(argument) = entry.required_arguments.first() else {
            return tool_error_message(ToolError::InvalidArguments(format!(
                "manifest for '{name}' declares no required argument"
            )));
        };

        let call = ToolCall::new(name, serde_json::json!({ argument.as_str(): value }));
        self.dispatch(&call, memory).await
    }

    async fn try_dispatch(
        &self,
        name: &str,
        arguments: serde_json::Value,
        memory: Option<&dyn MemoryBackend>,
    ) -> Result<String, ToolError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let arguments = match arguments {
            serde_json::Value::Null => serde_json::json!({}),
            serde_json::Value::Object(_) => arguments,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "expected an object, got {other}"
                )));
            }
        };

        if let Some(missing) = entry
            .required_arguments
            .iter()
            .find(|arg| arguments.get(arg.as_str()).is_none_or(|v| v.is_null()))
        {
            return Err(ToolError::InvalidArguments(format!(
                "missing required argument '{missing}' for tool '{name}'"
            )));
        }

        let memory = if entry.requires_store {
            Some(memory.ok_or_else(|| ToolError::StoreUnavailable(name.to_string()))?)
        } else {
            None
        };

        info!(tool = %name, "Executing tool");
        let outcome = AssertUnwindSafe(entry.capability.execute(arguments, memory))
            .catch_unwind()
            .await;

        match outcome {
            Ok(result) => result,
            Err(panic) => Err(ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: format!("panicked: {}", panic_message(panic.as_ref())),
            }),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bashbot_core::memory::MemoryStats;
    use bashbot_core::message::{ChatMessage, NewMessage, ScoredMessage, StoredMessage, TurnId};
    use bashbot_core::error::MemoryError;
    use bashbot_core::tool::TOOL_ERROR_PREFIX;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(
            &self,
            arguments: serde_json::Value,
            _memory: Option<&dyn MemoryBackend>,
        ) -> Result<String, ToolError> {
            Ok(arguments["text"].as_str().unwrap_or_default().to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
        }

        async fn execute(
            &self,
            _arguments: serde_json::Value,
            _memory: Option<&dyn MemoryBackend>,
        ) -> Result<String, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "fail".into(),
                reason: "disk on fire".into(),
            })
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "explode"
        }

        async fn execute(
            &self,
            _arguments: serde_json::Value,
            _memory: Option<&dyn MemoryBackend>,
        ) -> Result<String, ToolError> {
            panic!("kaboom");
        }
    }

    /// Reports whether it received the store.
    struct StoreProbe;

    #[async_trait]
    impl Tool for StoreProbe {
        fn name(&self) -> &str {
            "probe"
        }

        fn requires_store(&self) -> bool {
            true
        }

        async fn execute(
            &self,
            _arguments: serde_json::Value,
            memory: Option<&dyn MemoryBackend>,
        ) -> Result<String, ToolError> {
            Ok(format!("store: {}", memory.map(|m| m.name()).unwrap_or("none")))
        }
    }

    struct FakeStore;

    #[async_trait]
    impl MemoryBackend for FakeStore {
        fn name(&self) -> &str {
            "fake"
        }
        async fn next_turn_id(&self) -> Result<TurnId, MemoryError> {
            Ok(1)
        }
        async fn append(&self, _m: NewMessage) -> Result<i64, MemoryError> {
            Ok(1)
        }
        async fn recent_context(&self, _b: usize) -> Result<Vec<ChatMessage>, MemoryError> {
            Ok(vec![])
        }
        async fn turn_records(&self, _t: TurnId) -> Result<Vec<StoredMessage>, MemoryError> {
            Ok(vec![])
        }
        async fn prior_records(
            &self,
            _b: TurnId,
            _l: usize,
        ) -> Result<Vec<StoredMessage>, MemoryError> {
            Ok(vec![])
        }
        async fn similar(
            &self,
            _q: &[f32],
            _k: usize,
            _d: f32,
        ) -> Result<Vec<ScoredMessage>, MemoryError> {
            Ok(vec![])
        }
        async fn text_search(&self, term: &str) -> Result<String, MemoryError> {
            Ok(format!("searched {term}"))
        }
        async fn embed_query(&self, _t: &str) -> Vec<f32> {
            vec![]
        }
        async fn stats(&self) -> Result<MemoryStats, MemoryError> {
            Ok(MemoryStats::default())
        }
    }

    fn manifest(name: &str, required: &[&str]) -> ToolDefinition {
        ToolDefinition::new(
            name,
            format!("{name} tool"),
            serde_json::json!({"type": "object", "properties": {}, "required": required}),
        )
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(manifest("echo", &["text"]), Arc::new(EchoTool)).unwrap();
        r.register(manifest("fail", &[]), Arc::new(FailingTool)).unwrap();
        r.register(manifest("explode", &[]), Arc::new(PanickingTool)).unwrap();
        r.register(manifest("probe", &[]), Arc::new(StoreProbe)).unwrap();
        r
    }

    #[tokio::test]
    async fn dispatch_success_returns_output() {
        let call = ToolCall::new("echo", serde_json::json!({"text": "hello"}));
        assert_eq!(registry().dispatch(&call, None).await, "hello");
    }

    #[tokio::test]
    async fn unknown_tool_reports_not_found() {
        let call = ToolCall::new("nonexistent_tool", serde_json::json!({}));
        let out = registry().dispatch(&call, None).await;
        assert_eq!(out, "[TOOL_ERROR] Tool 'nonexistent_tool' not found.");
    }

    #[tokio::test]
    async fn missing_required_argument_is_tool_error() {
        let call = ToolCall::new("echo", serde_json::json!({}));
        let out = registry().dispatch(&call, None).await;
        assert!(out.starts_with(TOOL_ERROR_PREFIX));
        assert!(out.contains("'text'"));
    }

    #[tokio::test]
    async fn non_object_arguments_rejected() {
        let call = ToolCall::new("echo", serde_json::json!("hello"));
        let out = registry().dispatch(&call, None).await;
        assert!(out.starts_with(TOOL_ERROR_PREFIX));
    }

    #[tokio::test]
    async fn capability_error_is_contained() {
        let call = ToolCall::new("fail", serde_json::json!({}));
        let out = registry().dispatch(&call, None).await;
        assert!(out.starts_with("[TOOL_ERROR]"));
        assert!(out.contains("disk on fire"));
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let call = ToolCall::new("explode", serde_json::json!(null));
        let out = registry().dispatch(&call, None).await;
        assert!(out.starts_with("[TOOL_ERROR]"));
        assert!(out.contains("kaboom"));
    }

    #[tokio::test]
    async fn store_is_injected_when_required() {
        let store = FakeStore;
        let call = ToolCall::new("probe", serde_json::json!({}));
        assert_eq!(registry().dispatch(&call, Some(&store)).await, "store: fake");

        let out = registry().dispatch(&call, None).await;
        assert!(out.starts_with(TOOL_ERROR_PREFIX));
        assert!(out.contains("requires the memory store"));
    }

    #[tokio::test]
    async fn store_is_withheld_when_not_required() {
        struct Sniffer;

        #[async_trait]
        impl Tool for Sniffer {
            fn name(&self) -> &str {
                "sniff"
            }
            async fn execute(
                &self,
                _arguments: serde_json::Value,
                memory: Option<&dyn MemoryBackend>,
            ) -> Result<String, ToolError> {
                Ok(memory.is_some().to_string())
            }
        }

        let mut r = ToolRegistry::new();
        r.register(manifest("sniff", &[]), Arc::new(Sniffer)).unwrap();
        let call = ToolCall::new("sniff", serde_json::json!({}));
        assert_eq!(r.dispatch(&call, Some(&FakeStore)).await, "false");
    }

    #[tokio::test]
    async fn run_single_binds_first_required_argument() {
        let out = registry().run_single("echo", "bound value", None).await;
        assert_eq!(out, "bound value");
    }

    #[tokio::test]
    async fn run_single_without_required_argument() {
        let out = registry().run_single("fail", "x", None).await;
        assert!(out.contains("declares no required argument"));
        let out = registry().run_single("missing", "x", None).await;
        assert!(out.contains("not found"));
    }

    #[test]
    fn name_mismatch_rejected() {
        let mut r = ToolRegistry::new();
        let err = r
            .register(manifest("web_search", &[]), Arc::new(EchoTool))
            .unwrap_err();
        assert!(matches!(err, ToolError::NameMismatch { .. }));
        assert!(r.is_empty());
    }

    #[tokio::test]
    async fn from_manifests_advertises_unbound_manifests() {
        let r = ToolRegistry::from_manifests(
            vec![manifest("echo", &["text"]), manifest("orphan", &[])],
            vec![Arc::new(EchoTool) as Arc<dyn Tool>, Arc::new(FailingTool)],
        )
        .unwrap();

        let advertised: Vec<&str> = r.definitions().iter().map(|d| d.name()).collect();
        assert_eq!(advertised, vec!["echo", "orphan"]);
        assert_eq!(r.names(), vec!["echo"]);

        let call = ToolCall::new("orphan", serde_json::json!({}));
        assert!(r.dispatch(&call, None).await.contains("not found"));
    }

    #[test]
    fn reregister_replaces_manifest() {
        let mut r = ToolRegistry::new();
        r.register(manifest("echo", &["text"]), Arc::new(EchoTool)).unwrap();
        r.register(manifest("echo", &[]), Arc::new(EchoTool)).unwrap();
        assert_eq!(r.definitions().len(), 1);
        assert_eq!(r.len(), 1);
    }
}
