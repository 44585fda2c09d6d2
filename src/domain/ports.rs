use crate::config::settings::{InputEncoding, OutputFormat, TransformSettings};
use crate::domain::model::{RawTable, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn input_encoding(&self) -> InputEncoding;
    fn input_delimiter(&self) -> u8;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> Vec<OutputFormat>;
    /// 若設定則將所有輸出另外打包成 zip
    fn bundle_filename(&self) -> Option<&str>;
    fn strict(&self) -> bool;
    fn transform_settings(&self) -> Result<TransformSettings>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<RawTable>;
    async fn transform(&self, data: RawTable) -> Result<TransformResult>;
    async fn load(&self, result: &TransformResult) -> Result<Vec<String>>;
    fn output_path(&self) -> &str;
    fn strict(&self) -> bool;
}
