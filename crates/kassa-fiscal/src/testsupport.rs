//! Shared fixtures for kassa-fiscal tests: an in-memory database, a
//! connected software device, a scriptable authority, and a hand-driven
//! network status channel.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};

use kassa_core::request::{InvoiceRequest, NewInvoiceLine};
use kassa_core::types::{NetworkSnapshot, NetworkStatus, PaymentMethod, TaxBracket};
use kassa_db::{Database, DbConfig};
use kassa_signing::{SigningDevice, SoftwareSigningDevice, TransactionSigner};

use crate::authority::testing::MockAuthorityClient;
use crate::config::{QueueConfig, RegisterConfig};
use crate::invoicing::InvoiceService;
use crate::queue::{SubmissionQueue, SubmissionQueueHandle};

/// Everything a fiscal test needs, wired the way production wiring works.
pub(crate) struct Fixture {
    pub db: Database,
    pub signer: Arc<TransactionSigner>,
    pub authority: Arc<MockAuthorityClient>,
    pub status_tx: watch::Sender<NetworkSnapshot>,
    pub register: RegisterConfig,
    pub service: InvoiceService<MockAuthorityClient>,
    pub queue: SubmissionQueueHandle,
}

impl Fixture {
    /// Builds the fixture with the given initial network status. The queue
    /// runs with a one-hour interval so only explicit `cycle_now` calls
    /// drive it deterministically.
    pub async fn new(initial_status: NetworkStatus) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut device = SoftwareSigningDevice::new("SW-TSE-001");
        device.connect().unwrap();
        let device: Arc<Mutex<Box<dyn SigningDevice>>> = Arc::new(Mutex::new(Box::new(device)));
        let signer = Arc::new(TransactionSigner::new(device));

        let authority = Arc::new(MockAuthorityClient::new());
        let register = RegisterConfig::default();

        let (status_tx, status_rx) = watch::channel(NetworkSnapshot {
            status: initial_status,
            last_checked: Utc::now(),
        });

        let service = InvoiceService::new(
            db.clone(),
            Arc::clone(&signer),
            Arc::clone(&authority),
            status_rx.clone(),
            register.clone(),
        );

        let (queue, queue_handle) = SubmissionQueue::new(
            db.clone(),
            Arc::clone(&authority),
            status_rx,
            QueueConfig {
                cycle_interval_secs: 3600,
                retention_days: 30,
            },
            &register,
        );
        tokio::spawn(queue.run());

        Fixture {
            db,
            signer,
            authority,
            status_tx,
            register,
            service,
            queue: queue_handle,
        }
    }

    /// Publishes a new network status snapshot.
    pub fn set_status(&self, status: NetworkStatus) {
        self.status_tx.send_replace(NetworkSnapshot {
            status,
            last_checked: Utc::now(),
        });
    }

    /// The Scenario A request: 100,00 € net at the 20% standard rate.
    pub fn standard_sale(&self) -> InvoiceRequest {
        InvoiceRequest {
            cash_register_id: self.register.cash_register_id.clone(),
            payment_method: PaymentMethod::Cash,
            lines: vec![NewInvoiceLine {
                description: "Tagesmenü".into(),
                quantity: 1,
                unit_price_cents: 10000,
                tax_bracket: TaxBracket::Standard,
            }],
        }
    }
}
