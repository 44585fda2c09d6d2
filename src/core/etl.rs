use crate::core::{Pipeline, RunOutcome};
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::StageMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: StageMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: StageMonitor::new(monitor_enabled),
        }
    }

    /// Extract, transform, load. Outputs are always written; in strict mode a hard
    /// validation failure is returned as an error afterwards.
    pub async fn run(&self) -> Result<RunOutcome> {
        tracing::info!("🚀 Starting ETL process...");

        tracing::info!("Extracting data...");
        let raw_data = self.pipeline.extract().await?;
        self.monitor.mark("extract");

        tracing::info!("Transforming data...");
        let result = self.pipeline.transform(raw_data).await?;
        self.monitor.mark("transform");

        for line in result.report.to_string().lines() {
            tracing::info!("{}", line);
        }

        tracing::info!("Loading data...");
        let written_files = self.pipeline.load(&result).await?;
        self.monitor.mark("load");
        self.monitor.log_final_stats();

        let failed_checks: Vec<String> = result
            .report
            .hard_failures()
            .iter()
            .map(|c| c.check_name.clone())
            .collect();
        if !failed_checks.is_empty() {
            tracing::warn!("⚠️ Hard validation failures: {}", failed_checks.join(", "));
            if self.pipeline.strict() {
                return Err(EtlError::ValidationFailed { failed_checks });
            }
        }

        Ok(RunOutcome {
            output_path: self.pipeline.output_path().to_string(),
            written_files,
            rejected_rows: result.rejections.len(),
            sales_rows: result.classified.sales.len(),
            return_rows: result.classified.returns.len(),
            report: result.report,
        })
    }
}
