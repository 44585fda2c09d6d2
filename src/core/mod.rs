pub mod audit;
pub mod classifier;
pub mod deriver;
pub mod encoder;
pub mod etl;
pub mod materializer;
pub mod normalizer;
pub mod pipeline;
pub mod source;
pub mod validator;

pub use crate::domain::model::{RawTable, RunOutcome, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
