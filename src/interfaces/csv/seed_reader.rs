use crate::domain::order::{Order, SellerOrder};
use crate::error::{PaymentError, Result};
use crate::infrastructure::in_memory::InMemoryOrderBook;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedKind {
    Order,
    SellerOrder,
}

/// One row of the seed file.
///
/// `owner` is the buyer id for an `order` row and the parent order id for a
/// `seller_order` row. `total` is only read for orders.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedRecord {
    #[serde(rename = "type")]
    pub kind: SeedKind,
    pub id: u64,
    pub owner: u64,
    pub total: Option<Decimal>,
}

/// Reads the orders and seller orders the payment core collaborates with.
///
/// Whitespace is trimmed and short rows are accepted, so the `total` column
/// may be left off seller order rows.
pub struct SeedReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> SeedReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes the rows.
    pub fn records(self) -> impl Iterator<Item = Result<SeedRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }

    /// Loads every row into `book`, stopping at the first bad row.
    /// Returns the number of rows loaded.
    pub async fn load_into(self, book: &InMemoryOrderBook) -> Result<usize> {
        let mut loaded = 0;
        for record in self.records() {
            let record = record?;
            match record.kind {
                SeedKind::Order => {
                    let total = record
                        .total
                        .filter(|total| *total > Decimal::ZERO)
                        .ok_or_else(|| {
                            PaymentError::validation(format!(
                                "Order {} needs a positive total",
                                record.id
                            ))
                        })?;
                    book.insert_order(Order::new(record.id, record.owner, total))
                        .await;
                }
                SeedKind::SellerOrder => {
                    book.insert_seller_order(SellerOrder::new(record.id, record.owner))
                        .await;
                }
            }
            loaded += 1;
        }
        Ok(loaded)
    }
}
