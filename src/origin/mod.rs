//! Origin source: the external authority consulted when both tiers miss

mod http;

pub use self::http::HttpOrigin;

use crate::error::OriginError;
use crate::record::Record;
use async_trait::async_trait;

/// Contract for the authoritative source.
///
/// There is no "absent" result: anything short of a valid record for the
/// requested id is an [`OriginError`].
#[async_trait]
pub trait OriginSource: Send + Sync {
    async fn fetch(&self, id: i64) -> Result<Record, OriginError>;
}
