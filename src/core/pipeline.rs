use crate::core::encoder::{self, EncodedFile};
use crate::core::{classifier, deriver, materializer, normalizer, source, validator};
use crate::core::{ConfigProvider, Pipeline, RawTable, Storage, TransformResult};
use crate::config::settings::TransformSettings;
use crate::utils::error::Result;
use std::path::Path;

/// Run normalize → derive → classify → {validate, materialize} over an in-memory table.
///
/// This is the synchronous core; it performs no I/O.
pub fn run_transform(table: &RawTable, settings: &TransformSettings) -> Result<TransformResult> {
    let normalized = normalizer::normalize(table, settings)?;
    if !normalized.rejections.is_empty() {
        tracing::warn!(
            "⚠️ {} of {} rows rejected during normalization",
            normalized.rejections.len(),
            table.rows.len()
        );
    }

    let enriched = deriver::derive_all(normalized.records, &settings.classification.credit_note);
    let classified = classifier::classify(enriched, &settings.classification);
    let report = validator::validate(&classified);
    let tables = materializer::materialize(&classified, settings.build_dimensions);

    Ok(TransformResult {
        rejections: normalized.rejections,
        classified,
        report,
        tables,
    })
}

pub struct RetailPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> RetailPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    fn output_file(&self, name: &str) -> String {
        Path::new(self.config.output_path())
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    fn encode_outputs(&self, result: &TransformResult) -> Result<Vec<EncodedFile>> {
        let mut files = Vec::new();
        for format in self.config.output_formats() {
            files.extend(encoder::encode_tables(&result.tables, format)?);
        }
        files.push(encoder::encode_report(&result.report)?);
        files.push(encoder::encode_rejections(&result.rejections)?);
        Ok(files)
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for RetailPipeline<S, C> {
    async fn extract(&self) -> Result<RawTable> {
        tracing::debug!("Reading raw input from: {}", self.config.input_path());
        let bytes = self.storage.read_file(self.config.input_path()).await?;
        let table = source::read_table(
            &bytes,
            self.config.input_encoding(),
            self.config.input_delimiter(),
        )?;
        tracing::info!(
            "📥 Loaded {} rows x {} columns from {}",
            table.rows.len(),
            table.headers.len(),
            self.config.input_path()
        );
        Ok(table)
    }

    async fn transform(&self, data: RawTable) -> Result<TransformResult> {
        let settings = self.config.transform_settings()?;
        let result = run_transform(&data, &settings)?;
        tracing::info!(
            "🔀 Split into sales={} returns={} (rejected={})",
            result.classified.sales.len(),
            result.classified.returns.len(),
            result.rejections.len()
        );
        Ok(result)
    }

    async fn load(&self, result: &TransformResult) -> Result<Vec<String>> {
        let files = self.encode_outputs(result)?;
        let mut written = Vec::with_capacity(files.len() + 1);

        for file in &files {
            let path = self.output_file(&file.name);
            tracing::debug!("Writing {} ({} bytes)", path, file.data.len());
            self.storage.write_file(&path, &file.data).await?;
            tracing::info!("💾 [save] {}", path);
            written.push(path);
        }

        if let Some(bundle_name) = self.config.bundle_filename() {
            let zip_data = encoder::bundle(&files)?;
            let path = self.output_file(bundle_name);
            tracing::debug!("Writing ZIP bundle ({} bytes) to storage", zip_data.len());
            self.storage.write_file(&path, &zip_data).await?;
            tracing::info!("📦 [save] {}", path);
            written.push(path);
        }

        Ok(written)
    }

    fn output_path(&self) -> &str {
        self.config.output_path()
    }

    fn strict(&self) -> bool {
        self.config.strict()
    }
}
