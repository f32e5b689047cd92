//! Compliance → reporting → clearance submission.
//!
//! Stages run strictly in order. The first stage that does not come back 2xx
//! ends the run; later stages are never attempted.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::gateway::{Stage, StageResponse, SubmissionContext, ZatcaGateway};
use crate::services::metrics::record_submission;
use crate::services::signing::SignedInvoice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Built,
    ComplianceChecking,
    ComplianceApproved,
    ComplianceRejected,
    ReportingSubmitting,
    ReportingSubmitted,
    ReportingFailed,
    ClearanceSubmitting,
    Cleared,
    ClearanceRejected,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Cleared
                | PipelineState::ComplianceRejected
                | PipelineState::ReportingFailed
                | PipelineState::ClearanceRejected
        )
    }
}

/// Per-stage wording used in responses and in `zatca_response`.
struct StageStep {
    stage: Stage,
    running: PipelineState,
    passed: PipelineState,
    failed: PipelineState,
    passed_label: &'static str,
    failed_label: &'static str,
    error_prefix: &'static str,
}

const STAGES: [StageStep; 3] = [
    StageStep {
        stage: Stage::Compliance,
        running: PipelineState::ComplianceChecking,
        passed: PipelineState::ComplianceApproved,
        failed: PipelineState::ComplianceRejected,
        passed_label: "approved",
        failed_label: "rejected",
        error_prefix: "Compliance check failed",
    },
    StageStep {
        stage: Stage::Reporting,
        running: PipelineState::ReportingSubmitting,
        passed: PipelineState::ReportingSubmitted,
        failed: PipelineState::ReportingFailed,
        passed_label: "submitted",
        failed_label: "failed",
        error_prefix: "Reporting failed",
    },
    StageStep {
        stage: Stage::Clearance,
        running: PipelineState::ClearanceSubmitting,
        passed: PipelineState::Cleared,
        failed: PipelineState::ClearanceRejected,
        passed_label: "cleared",
        failed_label: "rejected",
        error_prefix: "Clearance failed",
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageStatuses {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporting_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearance_status: Option<String>,
}

impl StageStatuses {
    fn set(&mut self, stage: Stage, label: &str) {
        let slot = match stage {
            Stage::Compliance => &mut self.compliance_status,
            Stage::Reporting => &mut self.reporting_status,
            Stage::Clearance => &mut self.clearance_status,
        };
        *slot = Some(label.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    pub uuid: Option<String>,
    pub qr_code: Option<String>,
    pub error: Option<String>,
    pub statuses: StageStatuses,
    /// Every state visited, in order, starting at `Built`.
    pub transitions: Vec<PipelineState>,
    /// True when testing mode skipped the remote calls.
    pub bypassed: bool,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Cleared
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClearanceBody {
    uuid: Option<String>,
    #[serde(alias = "qrCode")]
    qr_code: Option<String>,
}

#[derive(Clone)]
pub struct SubmissionPipeline {
    gateway: Arc<dyn ZatcaGateway>,
    testing_mode: bool,
}

impl SubmissionPipeline {
    pub fn new(gateway: Arc<dyn ZatcaGateway>, testing_mode: bool) -> Self {
        if testing_mode {
            tracing::warn!(
                "ZATCA TESTING MODE ENABLED - invoices will NOT be sent to ZATCA, clearance is simulated"
            );
        }
        Self {
            gateway,
            testing_mode,
        }
    }

    pub fn testing_mode(&self) -> bool {
        self.testing_mode
    }

    pub async fn submit(&self, invoice: &SignedInvoice, ctx: &SubmissionContext) -> PipelineOutcome {
        let document = &invoice.document;

        if self.testing_mode {
            tracing::warn!(
                uuid = %document.uuid,
                "Testing mode: skipping ZATCA submission and simulating clearance"
            );
            record_submission("all", "bypassed");
            let mut statuses = StageStatuses::default();
            for step in &STAGES {
                statuses.set(step.stage, step.passed_label);
            }
            return PipelineOutcome {
                state: PipelineState::Cleared,
                uuid: Some(document.uuid.to_string()),
                qr_code: Some(document.qr_code.clone()),
                error: None,
                statuses,
                transitions: vec![PipelineState::Built, PipelineState::Cleared],
                bypassed: true,
            };
        }

        let mut transitions = vec![PipelineState::Built];
        let mut statuses = StageStatuses::default();
        let mut clearance_response = None;

        for step in &STAGES {
            transitions.push(step.running);
            tracing::info!(stage = %step.stage, uuid = %document.uuid, "Submitting invoice stage");

            let failure = match self.gateway.submit(step.stage, invoice, ctx).await {
                Ok(response) if response.is_success() => {
                    record_submission(step.stage.as_str(), "success");
                    if step.stage == Stage::Clearance {
                        clearance_response = Some(response);
                    }
                    None
                }
                Ok(StageResponse { status, body }) => {
                    record_submission(step.stage.as_str(), "rejected");
                    tracing::warn!(stage = %step.stage, status, body = %body, "ZATCA rejected stage");
                    Some(body)
                }
                Err(e) => {
                    record_submission(step.stage.as_str(), "error");
                    tracing::error!(stage = %step.stage, error = %e, "ZATCA stage call failed");
                    Some(e.to_string())
                }
            };

            if let Some(reason) = failure {
                transitions.push(step.failed);
                statuses.set(step.stage, step.failed_label);
                return PipelineOutcome {
                    state: step.failed,
                    uuid: None,
                    qr_code: None,
                    error: Some(format!("{}: {}", step.error_prefix, reason)),
                    statuses,
                    transitions,
                    bypassed: false,
                };
            }

            transitions.push(step.passed);
            statuses.set(step.stage, step.passed_label);
        }

        let body: ClearanceBody = clearance_response
            .and_then(|response| serde_json::from_str(&response.body).ok())
            .unwrap_or_default();

        let uuid = body
            .uuid
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| document.uuid.to_string());
        let qr_code = body
            .qr_code
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| document.qr_code.clone());

        tracing::info!(uuid = %uuid, "Invoice cleared by ZATCA");

        PipelineOutcome {
            state: PipelineState::Cleared,
            uuid: Some(uuid),
            qr_code: Some(qr_code),
            error: None,
            statuses,
            transitions,
            bypassed: false,
        }
    }
}
