use crate::domain::model::{
    ClassifiedDataset, CustomerDim, Dimensions, EnrichedRecord, FactLine, InvoiceDim,
    MaterializedTables, ProductDim,
};
use std::collections::HashSet;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fact_line(r: &EnrichedRecord) -> FactLine {
    FactLine {
        invoice_id: r.record.invoice_id.clone(),
        stock_code: r.record.stock_code.clone(),
        description: r.record.description.clone(),
        quantity: r.record.quantity,
        invoice_timestamp: r.record.invoice_timestamp.format(TIMESTAMP_FORMAT).to_string(),
        unit_price: r.record.unit_price,
        customer_id: r.record.customer_id.clone(),
        country: r.record.country.clone(),
        is_credit_note: r.is_credit_note,
        line_total: r.line_total,
        invoice_date: r.record.invoice_timestamp.date(),
        invoice_ym: r.invoice_ym.clone(),
    }
}

/// Keep the first row per key, in input order.
fn dedupe_by<T, K, F>(records: &[EnrichedRecord], key: F, project: impl Fn(&EnrichedRecord) -> T) -> Vec<T>
where
    K: Eq + std::hash::Hash,
    F: Fn(&EnrichedRecord) -> Option<K>,
{
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| match key(*r) {
            Some(k) => seen.insert(k),
            None => false,
        })
        .map(project)
        .collect()
}

/// 維度表一律由 sales 投影而來
pub fn build_dimensions(sales: &[EnrichedRecord]) -> Dimensions {
    let sales_with_customer = sales
        .iter()
        .filter(|r| r.record.customer_id.is_some())
        .map(fact_line)
        .collect();

    let dim_products = dedupe_by(
        sales,
        |r| Some(r.record.stock_code.clone()),
        |r| ProductDim {
            stock_code: r.record.stock_code.clone(),
            description: r.record.description.clone(),
        },
    );

    let dim_customers = dedupe_by(
        sales,
        |r| r.record.customer_id.clone(),
        |r| CustomerDim {
            customer_id: r.record.customer_id.clone().unwrap_or_default(),
            country: r.record.country.clone(),
        },
    );

    let mut invoices: Vec<(chrono::NaiveDateTime, InvoiceDim)> = dedupe_by(
        sales,
        |r| Some(r.record.invoice_id.clone()),
        |r| {
            (
                r.record.invoice_timestamp,
                InvoiceDim {
                    invoice_id: r.record.invoice_id.clone(),
                    invoice_timestamp: r.record.invoice_timestamp.format(TIMESTAMP_FORMAT).to_string(),
                },
            )
        },
    );
    // stable sort：同一時間點維持原始順序
    invoices.sort_by_key(|(ts, _)| *ts);
    let dim_invoices = invoices.into_iter().map(|(_, dim)| dim).collect();

    Dimensions {
        sales_with_customer,
        dim_products,
        dim_customers,
        dim_invoices,
    }
}

pub fn materialize(dataset: &ClassifiedDataset, with_dimensions: bool) -> MaterializedTables {
    MaterializedTables {
        sales: dataset.sales.iter().map(fact_line).collect(),
        returns: dataset.returns.iter().map(fact_line).collect(),
        dimensions: with_dimensions.then(|| build_dimensions(&dataset.sales)),
    }
}
