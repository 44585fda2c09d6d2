use crate::config::settings::ClassificationRule;
use crate::domain::model::{ClassifiedDataset, EnrichedRecord, Partition};

/// Credit notes are returns even when the quantity is positive.
pub fn partition_of(record: &EnrichedRecord, rule: &ClassificationRule) -> Partition {
    if record.is_credit_note || record.record.quantity <= 0 {
        return Partition::Return;
    }
    if rule.zero_price_is_return && record.record.unit_price <= 0.0 {
        return Partition::Return;
    }
    Partition::Sale
}

pub fn classify(records: Vec<EnrichedRecord>, rule: &ClassificationRule) -> ClassifiedDataset {
    let input_count = records.len();
    let (sales, returns): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|r| partition_of(r, rule) == Partition::Sale);

    tracing::debug!("Classified {} sales and {} returns", sales.len(), returns.len());
    ClassifiedDataset {
        sales,
        returns,
        input_count,
    }
}
