//! Suite runner.
//!
//! Executes test cases sequentially on a single caller thread. Every case
//! goes through the same pipeline: preflight (discovery + health check),
//! DAB-version gate, capability gates, execution, outcome classification,
//! best-effort return to the home screen. The runner is non-interactive: a
//! failed preflight skips the rest of the run and partial results are
//! still reported.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use serde_json::{json, Value};

use dab_protocol::{ops, status, DabResponse, Operation};

use crate::capability::{CapabilityStore, Validation};
use crate::checker::DabChecker;
use crate::client::{ClientError, DabClient};
use crate::result::{to_test_id, Outcome, SuiteReport, TestResult};
use crate::suite::Suite;

/// Preflight tuning.
#[derive(Debug, Clone, Copy)]
pub struct PreflightConfig {
    /// Discovery broadcast attempts per preflight.
    pub discovery_attempts: u32,

    /// Settling time after each discovery broadcast.
    pub discovery_wait: Duration,

    /// Health-check retries after the first attempt.
    pub health_retries: u32,

    /// Delay between health-check attempts.
    pub health_retry_delay: Duration,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            discovery_attempts: 1,
            discovery_wait: Duration::from_secs(1),
            health_retries: 3,
            health_retry_delay: Duration::from_secs(10),
        }
    }
}

/// Why a preflight stopped the run.
#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("device '{device_id}' did not appear in discovery results")]
    NotDiscovered { device_id: String },

    #[error("device '{device_id}' did not report healthy")]
    Unhealthy { device_id: String },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// One conformance test case.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub title: String,
    pub operation: Operation,
    pub payload: Value,

    /// Minimum DAB version the case applies to ("2.0", "2.1", ...).
    pub required_version: String,

    /// A negative case expects the device to reject the request.
    pub negative: bool,

    /// Latency bound for a successful reply; 0 means no bound.
    pub expected_latency_ms: u64,

    /// Capability requirement spec evaluated before execution.
    pub gate: Option<String>,
}

impl TestCase {
    pub fn new(title: impl Into<String>, operation: impl Into<Operation>, payload: Value) -> Self {
        Self {
            title: title.into(),
            operation: operation.into(),
            payload,
            required_version: "2.0".to_string(),
            negative: false,
            expected_latency_ms: 0,
            gate: None,
        }
    }

    pub fn requires_version(mut self, version: impl Into<String>) -> Self {
        self.required_version = version.into();
        self
    }

    pub fn negative(mut self) -> Self {
        self.negative = true;
        self
    }

    pub fn expected_latency(mut self, ms: u64) -> Self {
        self.expected_latency_ms = ms;
        self
    }

    pub fn with_gate(mut self, spec: impl Into<String>) -> Self {
        self.gate = Some(spec.into());
        self
    }
}

/// Sequential test-suite executor for one device.
pub struct TestRunner {
    client: Arc<DabClient>,
    checker: DabChecker,
    preflight: PreflightConfig,
    detected_version: Option<String>,
    version_override: Option<String>,
}

impl TestRunner {
    pub fn new(client: Arc<DabClient>, store: Arc<CapabilityStore>) -> Self {
        let checker = DabChecker::new(Arc::clone(&client), store);
        Self {
            client,
            checker,
            preflight: PreflightConfig::default(),
            detected_version: None,
            version_override: None,
        }
    }

    pub fn with_preflight(mut self, preflight: PreflightConfig) -> Self {
        self.preflight = preflight;
        self
    }

    /// Force the DAB version instead of detecting it.
    pub fn with_version_override(mut self, version: impl Into<String>) -> Self {
        self.version_override = Some(version.into());
        self
    }

    pub fn checker(&self) -> &DabChecker {
        &self.checker
    }

    /// Detect the device's DAB version once per run via the `version`
    /// operation, defaulting to "2.0" when detection fails.
    pub fn dab_version(&mut self, device_id: &str) -> String {
        if let Some(version) = &self.version_override {
            return version.clone();
        }
        if let Some(version) = &self.detected_version {
            return version.clone();
        }
        let version = match self
            .client
            .call_default(device_id, &Operation::new(ops::VERSION), &json!({}))
        {
            Ok(response) if response.is_ok() => response
                .field("DAB Version")
                .and_then(Value::as_str)
                .unwrap_or("2.0")
                .to_string(),
            _ => {
                warn!("DAB version detection failed, defaulting to 2.0");
                "2.0".to_string()
            }
        };
        info!("DAB version: {version}");
        self.detected_version = Some(version.clone());
        version
    }

    /// Discovery + health-check gate run before each test.
    pub fn run_preflight(&self, device_id: &str) -> Result<(), PreflightError> {
        info!("preflight: discovering devices to confirm '{device_id}' is online");
        let devices = self
            .client
            .discover(self.preflight.discovery_attempts, self.preflight.discovery_wait)?;
        match devices.iter().find(|d| d.device_id == device_id) {
            Some(device) => info!(
                "target '{device_id}' reachable at {}",
                device.ip.as_deref().unwrap_or("n/a")
            ),
            None => {
                error!(
                    "target '{device_id}' not in discovery results ({} device(s) answered)",
                    devices.len()
                );
                return Err(PreflightError::NotDiscovered {
                    device_id: device_id.to_string(),
                });
            }
        }

        let attempts = self.preflight.health_retries + 1;
        for attempt in 1..=attempts {
            info!("preflight: health check attempt {attempt} of {attempts}");
            let response = self.client.call_default(
                device_id,
                &Operation::new(ops::HEALTH_CHECK),
                &json!({}),
            )?;
            let healthy = response.is_ok()
                && response
                    .field("healthy")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
            if healthy {
                info!("health check passed");
                return Ok(());
            }
            warn!(
                "device not healthy (status {})",
                status::describe(response.status)
            );
            if attempt < attempts {
                thread::sleep(self.preflight.health_retry_delay);
            }
        }
        Err(PreflightError::Unhealthy {
            device_id: device_id.to_string(),
        })
    }

    /// Execute one case end to end and classify the outcome.
    pub fn run_case(&mut self, device_id: &str, case: &TestCase) -> TestResult {
        let request = case.payload.to_string();
        let mut result = TestResult::begin(
            to_test_id(&format!("{}/{}", case.operation, case.title)),
            device_id,
            case.operation.name(),
            request,
        );
        info!(
            "starting test '{}' on topic '{}' for device '{device_id}'",
            case.title, case.operation
        );

        // Version gate: a case for a newer DAB than the device runs is a
        // conditional failure, reported rather than silently dropped.
        let device_version = self.dab_version(device_id);
        if version_lt(&device_version, &case.required_version) {
            result.outcome = Outcome::OptionalFailed;
            result.log(format!(
                "[OPTIONAL_FAILED] requires DAB {} but device reports {device_version}",
                case.required_version
            ));
            return result;
        }

        // Capability gate from the case's requirement spec.
        if let Some(spec) = &case.gate {
            let gate = self.checker.evaluate(device_id, spec);
            if !gate.satisfied {
                result.outcome = Outcome::OptionalFailed;
                let reason = gate
                    .first_unmet
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "unknown requirement".to_string());
                result.log(format!("[OPTIONAL_FAILED] unmet requirement: {reason}"));
                return result;
            }
            result.log("capability gate passed");
        }

        // Operation gate: everything except operations/list itself checks
        // the declared operation list first.
        if case.operation.name() != ops::OPERATIONS_LIST {
            match self
                .checker
                .operation_supported(device_id, case.operation.name())
            {
                Validation::Unsupport => {
                    result.outcome = Outcome::OptionalFailed;
                    result.log(format!(
                        "[OPTIONAL_FAILED] operation '{}' is not declared supported",
                        case.operation
                    ));
                    return result;
                }
                Validation::Support | Validation::Uncertain => {}
            }
        }

        let start = Instant::now();
        let response = match self
            .client
            .call_default(device_id, &case.operation, &case.payload)
        {
            Ok(response) => response,
            Err(err) => {
                result.outcome = Outcome::Skipped;
                result.log(format!("[SKIPPED] internal error during execution: {err}"));
                self.return_to_home(device_id);
                return result;
            }
        };
        result.duration_ms = start.elapsed().as_millis() as u64;
        if let Some(body) = &response.body {
            result.response = body.to_string();
        }

        self.classify(device_id, case, &response, &mut result);
        self.return_to_home(device_id);
        result
    }

    fn classify(
        &self,
        device_id: &str,
        case: &TestCase,
        response: &DabResponse,
        result: &mut TestResult,
    ) {
        if response.is_ok() {
            let within_bound =
                case.expected_latency_ms == 0 || result.duration_ms <= case.expected_latency_ms;
            if case.expected_latency_ms > 0 {
                result.log(format!(
                    "{} latency, expected: {} ms, actual: {} ms",
                    case.operation, case.expected_latency_ms, result.duration_ms
                ));
            }
            if within_bound {
                result.outcome = Outcome::Pass;
                result.log("[ PASS ]");
            } else if case.negative {
                result.outcome = Outcome::Pass;
                result.log("[ PASS ] negative case: validation failed as expected");
            } else {
                result.outcome = Outcome::Failed;
                result.log("[ FAILED ] latency bound exceeded");
            }
            return;
        }

        match response.status {
            code if case.negative && (code == status::BAD_REQUEST || code == status::NOT_FOUND) => {
                result.outcome = Outcome::Pass;
                result.log(format!("[ PASS ] negative case: expected error code {code}"));
            }
            status::NOT_IMPLEMENTED => {
                // A declared operation answering 501 is a hard failure;
                // an undeclared one may simply be optional.
                let declared = self
                    .checker
                    .operation_supported(device_id, case.operation.name());
                if declared == Validation::Support {
                    result.outcome = Outcome::Failed;
                    result.log("[ FAILED ] declared operation is not implemented (501)");
                } else {
                    result.outcome = Outcome::OptionalFailed;
                    result.log("[OPTIONAL_FAILED] operation may not be mandatory (501)");
                }
            }
            status::INTERNAL_ERROR => {
                result.outcome = Outcome::Skipped;
                result.log("[SKIPPED] device reported an internal error (500)");
            }
            code => {
                result.outcome = Outcome::Failed;
                result.log(format!(
                    "[ FAILED ] command failed: {} ({code})",
                    status::describe(code)
                ));
            }
        }
    }

    /// Run a whole suite, writing no files; the caller owns persistence.
    ///
    /// A failed preflight marks the current and all remaining cases
    /// `Skipped` and ends the run; partial results are still returned.
    pub fn run_suite(&mut self, device_id: &str, suite: &Suite) -> SuiteReport {
        info!(
            "starting {} suite with {} test(s)",
            suite.name,
            suite.cases.len()
        );
        let mut results = Vec::with_capacity(suite.cases.len());

        for (index, case) in suite.cases.iter().enumerate() {
            info!(
                "{} progress {}/{}: {}",
                suite.name,
                index + 1,
                suite.cases.len(),
                case.title
            );
            if let Err(err) = self.run_preflight(device_id) {
                warn!("preflight failed, skipping remaining tests: {err}");
                for remaining in &suite.cases[index..] {
                    let mut skipped = TestResult::begin(
                        to_test_id(&format!("{}/{}", remaining.operation, remaining.title)),
                        device_id,
                        remaining.operation.name(),
                        remaining.payload.to_string(),
                    );
                    skipped.log(format!("[SKIPPED] preflight failed: {err}"));
                    results.push(skipped);
                }
                break;
            }
            results.push(self.run_case(device_id, case));
        }

        let device_info = self.device_info(device_id);
        SuiteReport::new(suite.name.clone(), device_info, results)
    }

    /// Fetch and filter `device/info` for the report header.
    pub fn device_info(&self, device_id: &str) -> Value {
        let response = match self.client.call_default(
            device_id,
            &Operation::new(ops::DEVICE_INFO),
            &json!({}),
        ) {
            Ok(response) if response.is_ok() => response,
            _ => {
                warn!("could not fetch device info for '{device_id}'");
                return json!({});
            }
        };
        let mut info = serde_json::Map::new();
        for field in [
            "manufacturer",
            "model",
            "serialNumber",
            "chipset",
            "firmwareVersion",
            "firmwareBuild",
            "deviceId",
        ] {
            if let Some(value) = response.field(field) {
                info.insert(field.to_string(), value.clone());
            }
        }
        Value::Object(info)
    }

    /// Send KEY_HOME once so the next test starts from the home screen.
    /// Best-effort: failures are logged and swallowed.
    fn return_to_home(&self, device_id: &str) {
        let press = json!({"keyCode": "KEY_HOME"});
        if let Err(err) =
            self.client
                .call_default(device_id, &Operation::new(ops::KEY_PRESS), &press)
        {
            warn!("post-test KEY_HOME failed (ignored): {err}");
        }
    }
}

/// Compare dotted version strings numerically, `true` when `a < b`.
/// Unparseable versions never gate a test out.
fn version_lt(a: &str, b: &str) -> bool {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a < b,
        _ => {
            warn!("could not compare DAB versions '{a}' and '{b}'");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_lt() {
        assert!(version_lt("2.0", "2.1"));
        assert!(!version_lt("2.1", "2.1"));
        assert!(!version_lt("2.1", "2.0"));
        assert!(!version_lt("garbage", "2.0"));
    }

    #[test]
    fn test_case_builder() {
        let case = TestCase::new("Launch App", "applications/launch", json!({"appId": "X"}))
            .requires_version("2.1")
            .negative()
            .expected_latency(5000)
            .with_gate("ops: applications/launch");
        assert_eq!(case.required_version, "2.1");
        assert!(case.negative);
        assert_eq!(case.expected_latency_ms, 5000);
        assert!(case.gate.is_some());
    }

    #[test]
    fn test_preflight_defaults() {
        let preflight = PreflightConfig::default();
        assert_eq!(preflight.discovery_attempts, 1);
        assert_eq!(preflight.health_retries, 3);
    }
}
