use super::{Tool, ToolOutcome};
use crate::permissions::{PermissionManager, PermissionMode};
use std::sync::{Arc, Mutex, PoisonError};

pub type AskCallback = Arc<dyn Fn(&str, &serde_json::Value) -> bool + Send + Sync>;

/// Wraps a tool behind the current permission mode, deciding per invocation
/// whether to simulate, ask, or execute. The wrapped tool's name,
/// description, and parameter schema pass through untouched, so a gated tool
/// is indistinguishable from an ungated one to anything invoking it by name.
pub struct PermissionGate {
    inner: Arc<dyn Tool>,
    permissions: Arc<Mutex<PermissionManager>>,
    ask: AskCallback,
}

impl PermissionGate {
    pub fn new(
        inner: Arc<dyn Tool>,
        permissions: Arc<Mutex<PermissionManager>>,
        ask: AskCallback,
    ) -> Self {
        Self {
            inner,
            permissions,
            ask,
        }
    }

    fn current_mode(&self) -> PermissionMode {
        self.permissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_mode()
    }
}

impl Tool for PermissionGate {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.inner.parameters_schema()
    }

    fn execute(&self, params: &serde_json::Value) -> ToolOutcome {
        match self.current_mode() {
            PermissionMode::Plan => ToolOutcome::simulated(self.name(), params),
            PermissionMode::Ask => {
                if (self.ask)(self.name(), params) {
                    self.inner.execute(params)
                } else {
                    ToolOutcome::denied(self.name())
                }
            }
            PermissionMode::Auto => self.inner.execute(params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Disposition;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTool {
        calls: Arc<AtomicUsize>,
        seen_params: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "counting_tool"
        }

        fn description(&self) -> &str {
            "Counts its invocations."
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"value": {"type": "string"}}})
        }

        fn execute(&self, params: &serde_json::Value) -> ToolOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_params.lock().unwrap().push(params.clone());
            ToolOutcome::success(self.name(), "ran")
        }
    }

    struct Fixture {
        gate: PermissionGate,
        calls: Arc<AtomicUsize>,
        seen_params: Arc<Mutex<Vec<serde_json::Value>>>,
        asks: Arc<AtomicUsize>,
    }

    fn fixture(mode: PermissionMode, ask_answer: bool) -> Fixture {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_params = Arc::new(Mutex::new(Vec::new()));
        let asks = Arc::new(AtomicUsize::new(0));

        let tool = Arc::new(CountingTool {
            calls: Arc::clone(&calls),
            seen_params: Arc::clone(&seen_params),
        });
        let permissions = Arc::new(Mutex::new(PermissionManager::new(mode)));
        let ask_count = Arc::clone(&asks);
        let ask: AskCallback = Arc::new(move |_, _| {
            ask_count.fetch_add(1, Ordering::SeqCst);
            ask_answer
        });

        Fixture {
            gate: PermissionGate::new(tool, permissions, ask),
            calls,
            seen_params,
            asks,
        }
    }

    #[test]
    fn test_plan_mode_simulates_without_executing() {
        let fixture = fixture(PermissionMode::Plan, true);
        let outcome = fixture.gate.execute(&json!({"value": "x"}));

        assert_eq!(fixture.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.asks.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.disposition, Disposition::Simulated);
    }

    #[test]
    fn test_ask_mode_denial_skips_execution() {
        let fixture = fixture(PermissionMode::Ask, false);
        let outcome = fixture.gate.execute(&json!({"value": "x"}));

        assert_eq!(fixture.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.asks.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.disposition, Disposition::Denied);
    }

    #[test]
    fn test_ask_mode_approval_executes_once_with_original_params() {
        let fixture = fixture(PermissionMode::Ask, true);
        let params = json!({"value": "original"});
        let outcome = fixture.gate.execute(&params);

        assert_eq!(fixture.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.asks.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.disposition, Disposition::Executed);
        assert_eq!(fixture.seen_params.lock().unwrap().as_slice(), &[params]);
    }

    #[test]
    fn test_auto_mode_executes_without_asking() {
        let fixture = fixture(PermissionMode::Auto, false);
        let outcome = fixture.gate.execute(&json!({"value": "x"}));

        assert_eq!(fixture.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.asks.load(Ordering::SeqCst), 0);
        assert!(outcome.ok);
    }

    #[test]
    fn test_gate_preserves_wrapped_tool_identity() {
        let fixture = fixture(PermissionMode::Ask, true);
        assert_eq!(fixture.gate.name(), "counting_tool");
        assert_eq!(fixture.gate.description(), "Counts its invocations.");
        assert_eq!(
            fixture.gate.parameters_schema(),
            json!({"type": "object", "properties": {"value": {"type": "string"}}})
        );
    }

    #[test]
    fn test_mode_change_is_picked_up_between_invocations() {
        let fixture = fixture(PermissionMode::Plan, true);
        fixture.gate.execute(&json!({}));
        assert_eq!(fixture.calls.load(Ordering::SeqCst), 0);

        fixture
            .gate
            .permissions
            .lock()
            .unwrap()
            .set_mode(PermissionMode::Auto);
        fixture.gate.execute(&json!({}));
        assert_eq!(fixture.calls.load(Ordering::SeqCst), 1);
    }
}
