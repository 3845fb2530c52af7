//! Payment processor trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};

/// Where a payment intent is in its lifecycle at the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Created; the client has not confirmed the charge yet.
    RequiresConfirmation,

    /// The charge went through.
    Succeeded,

    Canceled,
}

/// A payment authorization handle issued by the processor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    /// Opaque token the client uses to confirm the charge.
    pub client_secret: String,
    /// Amount in minor currency units.
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    #[serde(skip)]
    pub metadata: HashMap<String, String>,
}

/// Trait for external payment processors.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Creates a payment intent for `amount` minor units of `currency`.
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent>;

    /// Looks up an intent by id.
    async fn retrieve_intent(&self, id: &str) -> Result<Option<PaymentIntent>>;
}

#[derive(Debug, Default)]
struct InMemoryProcessorState {
    intents: HashMap<String, PaymentIntent>,
    next_id: u32,
    fail_on_create: bool,
}

/// In-memory payment processor for testing and local runs.
///
/// Intents are never confirmed on their own; call [`confirm`](Self::confirm)
/// to simulate the client completing the charge.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProcessor {
    state: Arc<RwLock<InMemoryProcessorState>>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryPaymentProcessor {
    /// Creates a new in-memory payment processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the processor to reject intent creation.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Marks an intent as succeeded. Returns false if it does not exist or
    /// was canceled.
    pub async fn confirm(&self, id: &str) -> bool {
        match self.state.write().await.intents.get_mut(id) {
            Some(intent) if intent.status != IntentStatus::Canceled => {
                intent.status = IntentStatus::Succeeded;
                true
            }
            _ => false,
        }
    }

    /// Marks an intent as canceled. Returns false if it does not exist.
    pub async fn cancel(&self, id: &str) -> bool {
        match self.state.write().await.intents.get_mut(id) {
            Some(intent) => {
                intent.status = IntentStatus::Canceled;
                true
            }
            None => false,
        }
    }

    /// Returns how many times `create_intent` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;

        if state.fail_on_create {
            return Err(PaymentError::Provider("card processing declined".to_string()));
        }

        state.next_id += 1;
        let id = format!("pi_{:04}", state.next_id);
        let intent = PaymentIntent {
            client_secret: format!("{id}_secret_{:08x}", state.next_id.wrapping_mul(2_654_435_761)),
            id: id.clone(),
            amount,
            currency: currency.to_lowercase(),
            status: IntentStatus::RequiresConfirmation,
            metadata,
        };
        state.intents.insert(id, intent.clone());

        Ok(intent)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<Option<PaymentIntent>> {
        Ok(self.state.read().await.intents.get(id).cloned())
    }
}
