//! Pipeline driver.
//!
//! Composes toolchain provisioning, conversion and publishing into a
//! two-phase flow: [`Pipeline::plan`] resolves and pre-checks the
//! destination so a front end can show it before any work starts, then
//! [`Pipeline::execute`] runs the stages and reports how far the run got.

use crate::config::Config;
use crate::convert::{CommandRunner, ConversionRunner, OutputLocation};
use crate::error::Result;
use crate::hub::Registry;
use crate::naming;
use crate::publish::PublishCoordinator;
use crate::toolchain::ToolchainProvisioner;
use serde::Serialize;
use tracing::info;

/// One conversion job as the front end hands it over.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Registry id of the model to convert (`namespace/name`).
    pub source_model_id: String,
    /// Let the converter execute code shipped with the model.
    pub trust_remote_code: bool,
    /// Republish into the operator's own source repository instead of a
    /// suffixed copy.
    pub reuse_same_repository: bool,
}

/// Where a run would publish, decided before any work happens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPlan {
    pub destination_model_id: String,
    /// Browsable URL of the destination.
    pub destination_url: String,
    pub same_repository: bool,
    /// The destination already exists; running would be a no-op.
    pub already_converted: bool,
}

/// Terminal state of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum RunOutcome {
    /// The collision pre-check found an existing conversion.
    AlreadyConverted,
    /// The converter failed; `log` is its stderr or the precheck reason.
    ConversionFailed { log: String },
    /// Conversion succeeded but the upload did not.
    PublishFailed { log: String, error: String },
    /// Converted and uploaded.
    Published { log: String },
}

/// What one run did, for the front end to render.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub destination_model_id: String,
    pub destination_url: String,
    pub outcome: RunOutcome,
}

impl RunReport {
    /// Whether the run left a converted model at the destination.
    pub fn succeeded(&self) -> bool {
        matches!(
            self.outcome,
            RunOutcome::Published { .. } | RunOutcome::AlreadyConverted
        )
    }
}

/// Drives one conversion-and-publish run.
pub struct Pipeline<'a> {
    config: &'a Config,
    registry: &'a dyn Registry,
    runner: &'a dyn CommandRunner,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        registry: &'a dyn Registry,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            registry,
            runner,
        }
    }

    /// Validate the request and resolve its destination.
    ///
    /// For a fresh destination this asks the registry whether it already
    /// exists. Republishing into one's own repository skips the check:
    /// refreshing an existing conversion there is intentional.
    pub async fn plan(&self, request: &ConversionRequest) -> Result<PublishPlan> {
        naming::validate_model_id(&request.source_model_id)?;

        let target = naming::derive_publish_target(
            &request.source_model_id,
            &self.config.registry_username,
            request.reuse_same_repository,
        );

        let already_converted = if target.same_repository {
            false
        } else {
            self.registry
                .repo_exists(&target.destination_model_id)
                .await?
        };

        Ok(PublishPlan {
            destination_url: naming::repo_url(
                &self.config.registry_base_url,
                &target.destination_model_id,
            ),
            destination_model_id: target.destination_model_id,
            same_repository: target.same_repository,
            already_converted,
        })
    }

    /// Execute a planned run.
    ///
    /// `Err` is reserved for configuration and provisioning problems;
    /// conversion and publish failures come back inside the report.
    pub async fn execute(
        &self,
        request: &ConversionRequest,
        plan: &PublishPlan,
    ) -> Result<RunReport> {
        if plan.already_converted {
            info!(
                "{} is already converted at {}",
                request.source_model_id, plan.destination_model_id
            );
            return Ok(report(plan, RunOutcome::AlreadyConverted));
        }

        ToolchainProvisioner::new(self.config).ensure_ready().await?;

        let outcome = ConversionRunner::new(self.config, self.runner)
            .convert(request)
            .await;
        if !outcome.success {
            return Ok(report(plan, RunOutcome::ConversionFailed { log: outcome.log }));
        }

        let output = OutputLocation::new(self.config, &request.source_model_id);
        let coordinator = PublishCoordinator::new(self.config, self.registry);
        match coordinator
            .publish(
                &request.source_model_id,
                &plan.destination_model_id,
                &output,
            )
            .await
        {
            Ok(()) => Ok(report(plan, RunOutcome::Published { log: outcome.log })),
            Err(failure) => Ok(report(
                plan,
                RunOutcome::PublishFailed {
                    log: outcome.log,
                    error: failure.message,
                },
            )),
        }
    }

    /// Plan and execute in one call.
    pub async fn run(&self, request: &ConversionRequest) -> Result<RunReport> {
        let plan = self.plan(request).await?;
        self.execute(request, &plan).await
    }
}

fn report(plan: &PublishPlan, outcome: RunOutcome) -> RunReport {
    RunReport {
        destination_model_id: plan.destination_model_id.clone(),
        destination_url: plan.destination_url.clone(),
        outcome,
    }
}
