use crate::domain::event::{PaymentEvent, ShipmentEvent};
use crate::domain::payment::PaymentIntent;
use crate::domain::ports::{PaymentStore, ShipmentStore};
use crate::domain::shipment::Shipment;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Payment intents keyed by id.
pub const CF_INTENTS: &str = "intents";
/// Order id to intent id; enforces one intent per order.
pub const CF_INTENT_BY_ORDER: &str = "intent_by_order";
/// External reference to intent id.
pub const CF_INTENT_BY_REFERENCE: &str = "intent_by_reference";
/// Payment ledger keyed by intent id followed by a big-endian sequence number.
pub const CF_PAYMENT_EVENTS: &str = "payment_events";
pub const CF_SHIPMENTS: &str = "shipments";
pub const CF_SHIPMENT_BY_SELLER_ORDER: &str = "shipment_by_seller_order";
pub const CF_SHIPMENT_EVENTS: &str = "shipment_events";

const COLUMN_FAMILIES: [&str; 7] = [
    CF_INTENTS,
    CF_INTENT_BY_ORDER,
    CF_INTENT_BY_REFERENCE,
    CF_PAYMENT_EVENTS,
    CF_SHIPMENTS,
    CF_SHIPMENT_BY_SELLER_ORDER,
    CF_SHIPMENT_EVENTS,
];

/// A persistent store implementation using RocksDB.
///
/// Every write goes through a single `WriteBatch`, so a row, its indexes and
/// its events land atomically. Read-check-write sequences are serialized by
/// `write_lock`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn ledger_key(owner: Uuid, seq: u64) -> Vec<u8> {
    let mut key = owner.as_bytes().to_vec();
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating any missing
    /// column family.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: impl AsRef<[u8]>) -> Result<Option<T>> {
        self.db
            .get_cf(self.cf(cf)?, key)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn read_id(&self, cf: &str, key: impl AsRef<[u8]>) -> Result<Option<Uuid>> {
        Ok(self
            .db
            .get_cf(self.cf(cf)?, key)?
            .and_then(|bytes| Uuid::from_slice(&bytes).ok()))
    }

    /// All values under `owner` in a ledger column family, in key order.
    fn ledger<T: DeserializeOwned>(&self, cf: &str, owner: Uuid) -> Result<Vec<T>> {
        let prefix = owner.as_bytes();
        let iter = self
            .db
            .iterator_cf(self.cf(cf)?, IteratorMode::From(prefix, Direction::Forward));

        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn next_seq(&self, cf: &str, owner: Uuid) -> Result<u64> {
        let prefix = owner.as_bytes();
        let iter = self
            .db
            .iterator_cf(self.cf(cf)?, IteratorMode::From(prefix, Direction::Forward));

        let mut count = 0u64;
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    fn put_payment_events(
        &self,
        batch: &mut WriteBatch,
        intent_id: Uuid,
        events: &[PaymentEvent],
    ) -> Result<()> {
        let cf = self.cf(CF_PAYMENT_EVENTS)?;
        let start = self.next_seq(CF_PAYMENT_EVENTS, intent_id)?;
        for (seq, event) in (start..).zip(events) {
            batch.put_cf(cf, ledger_key(intent_id, seq), encode(event)?);
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, intent: PaymentIntent, event: PaymentEvent) -> Result<PaymentIntent> {
        let _guard = self.write_lock.lock().await;
        let order_key = intent.order_id.to_be_bytes();
        if self.read_id(CF_INTENT_BY_ORDER, order_key)?.is_some() {
            return Err(PaymentError::conflict(format!(
                "PaymentIntent already exists for OrderId={}",
                intent.order_id
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_INTENTS)?, intent.id.as_bytes(), encode(&intent)?);
        batch.put_cf(self.cf(CF_INTENT_BY_ORDER)?, order_key, intent.id.as_bytes());
        if let Some(reference) = intent.external_reference.as_deref() {
            batch.put_cf(self.cf(CF_INTENT_BY_REFERENCE)?, reference, intent.id.as_bytes());
        }
        self.put_payment_events(&mut batch, intent.id, std::slice::from_ref(&event))?;
        self.db.write(batch)?;
        Ok(intent)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentIntent>> {
        self.read(CF_INTENTS, id.as_bytes())
    }

    async fn find_by_order(&self, order_id: u64) -> Result<Option<PaymentIntent>> {
        match self.read_id(CF_INTENT_BY_ORDER, order_id.to_be_bytes())? {
            Some(id) => self.read(CF_INTENTS, id.as_bytes()),
            None => Ok(None),
        }
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<PaymentIntent>> {
        match self.read_id(CF_INTENT_BY_REFERENCE, reference)? {
            Some(id) => self.read(CF_INTENTS, id.as_bytes()),
            None => Ok(None),
        }
    }

    async fn commit(
        &self,
        mut intent: PaymentIntent,
        expected_version: u64,
        events: Vec<PaymentEvent>,
    ) -> Result<PaymentIntent> {
        let _guard = self.write_lock.lock().await;
        let stored: PaymentIntent = self
            .read(CF_INTENTS, intent.id.as_bytes())?
            .ok_or_else(|| PaymentError::not_found(format!("PaymentIntent not found. Id={}", intent.id)))?;
        if stored.version != expected_version {
            return Err(PaymentError::conflict(format!(
                "PaymentIntent {} was modified concurrently",
                intent.id
            )));
        }

        intent.version = expected_version + 1;
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_INTENTS)?, intent.id.as_bytes(), encode(&intent)?);
        if let Some(reference) = intent.external_reference.as_deref() {
            batch.put_cf(self.cf(CF_INTENT_BY_REFERENCE)?, reference, intent.id.as_bytes());
        }
        self.put_payment_events(&mut batch, intent.id, &events)?;
        self.db.write(batch)?;
        Ok(intent)
    }

    async fn append_event(&self, event: PaymentEvent) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let intent_id = event.payment_intent_id;
        if self.db.get_pinned_cf(self.cf(CF_INTENTS)?, intent_id.as_bytes())?.is_none() {
            return Err(PaymentError::not_found(format!(
                "PaymentIntent not found. Id={intent_id}"
            )));
        }

        let mut batch = WriteBatch::default();
        self.put_payment_events(&mut batch, intent_id, std::slice::from_ref(&event))?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn events(&self, intent_id: Uuid) -> Result<Vec<PaymentEvent>> {
        self.ledger(CF_PAYMENT_EVENTS, intent_id)
    }

    async fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<PaymentIntent>> {
        let mut overdue = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_INTENTS)?, IteratorMode::Start) {
            let (_key, value) = item?;
            let intent: PaymentIntent = decode(&value)?;
            if intent.is_overdue(now) {
                overdue.push(intent);
            }
        }
        overdue.sort_by_key(|intent| intent.expires_at);
        Ok(overdue)
    }
}

#[async_trait]
impl ShipmentStore for RocksDBStore {
    async fn find_by_seller_order(&self, seller_order_id: u64) -> Result<Option<Shipment>> {
        let Some(id) = self.read_id(CF_SHIPMENT_BY_SELLER_ORDER, seller_order_id.to_be_bytes())?
        else {
            return Ok(None);
        };
        let shipment: Option<Shipment> = self.read(CF_SHIPMENTS, id.as_bytes())?;
        Ok(shipment.filter(|shipment| !shipment.is_deleted()))
    }

    async fn save(
        &self,
        mut shipment: Shipment,
        expected_version: Option<u64>,
        event: ShipmentEvent,
    ) -> Result<Shipment> {
        let _guard = self.write_lock.lock().await;
        let seller_order_key = shipment.seller_order_id.to_be_bytes();
        let mut batch = WriteBatch::default();

        match expected_version {
            None => {
                if self.read_id(CF_SHIPMENT_BY_SELLER_ORDER, seller_order_key)?.is_some() {
                    return Err(PaymentError::conflict(format!(
                        "Shipment already exists for SellerOrderId={}",
                        shipment.seller_order_id
                    )));
                }
                shipment.version = 0;
                batch.put_cf(
                    self.cf(CF_SHIPMENT_BY_SELLER_ORDER)?,
                    seller_order_key,
                    shipment.id.as_bytes(),
                );
            }
            Some(expected) => {
                let stored: Shipment = self
                    .read(CF_SHIPMENTS, shipment.id.as_bytes())?
                    .ok_or_else(|| {
                        PaymentError::not_found(format!("Shipment not found. Id={}", shipment.id))
                    })?;
                if stored.version != expected {
                    return Err(PaymentError::conflict(format!(
                        "Shipment {} was modified concurrently",
                        shipment.id
                    )));
                }
                shipment.version = expected + 1;
            }
        }

        batch.put_cf(self.cf(CF_SHIPMENTS)?, shipment.id.as_bytes(), encode(&shipment)?);
        let seq = self.next_seq(CF_SHIPMENT_EVENTS, shipment.id)?;
        batch.put_cf(
            self.cf(CF_SHIPMENT_EVENTS)?,
            ledger_key(shipment.id, seq),
            encode(&event)?,
        );
        self.db.write(batch)?;
        Ok(shipment)
    }

    async fn timeline(&self, shipment_id: Uuid) -> Result<Vec<ShipmentEvent>> {
        let shipment: Option<Shipment> = self.read(CF_SHIPMENTS, shipment_id.as_bytes())?;
        match shipment {
            Some(shipment) if !shipment.is_deleted() => {
                self.ledger(CF_SHIPMENT_EVENTS, shipment_id)
            }
            _ => Ok(Vec::new()),
        }
    }
}
