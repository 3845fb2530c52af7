//! Payment bridge: creates intents and reconciles confirmed ones into orders.

use std::collections::HashMap;
use std::sync::Arc;

use common::DocumentId;
use document_store::DocumentStore;
use domain::{Caller, DomainError, OrderLedger, PaymentOutcome};

use crate::error::{PaymentError, Result};
use crate::processor::{IntentStatus, PaymentIntent, PaymentProcessor};

/// Connects the order ledger to an external payment processor.
///
/// This is the only component that marks orders paid, and it does so only
/// after the processor reports the intent as succeeded.
#[derive(Clone)]
pub struct PaymentBridge<S: DocumentStore> {
    processor: Arc<dyn PaymentProcessor>,
    ledger: OrderLedger<S>,
    currency: String,
}

impl<S: DocumentStore> PaymentBridge<S> {
    /// Creates a new payment bridge charging in `currency`.
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        ledger: OrderLedger<S>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            processor,
            ledger,
            currency: currency.into().to_lowercase(),
        }
    }

    /// The currency intents are created in.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Requests a payment intent for `amount` minor units.
    ///
    /// The amount is validated before the processor is contacted. The intent
    /// records the caller and, when given, the order it is meant for; the
    /// caller must have placed that order.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.email))]
    pub async fn create_payment_intent(
        &self,
        caller: &Caller,
        amount: Option<i64>,
        order_id: Option<DocumentId>,
    ) -> Result<PaymentIntent> {
        let amount = match amount {
            Some(amount) if amount > 0 => amount,
            Some(amount) => {
                return Err(PaymentError::InvalidAmount(format!(
                    "{amount} is not a positive amount"
                )));
            }
            None => return Err(PaymentError::InvalidAmount("amount is required".to_string())),
        };

        let mut metadata = HashMap::from([("email".to_string(), caller.email.to_string())]);
        if let Some(order_id) = order_id {
            let order = self.ledger.get_for(caller, order_id).await?;
            if !order.is_placed_by(&caller.email) {
                return Err(
                    DomainError::forbidden("only the purchaser may pay for an order").into(),
                );
            }
            metadata.insert("orderId".to_string(), order_id.to_string());
        }

        match self
            .processor
            .create_intent(amount, &self.currency, metadata)
            .await
        {
            Ok(intent) => {
                metrics::counter!("payment_intents_created_total").increment(1);
                tracing::info!(intent_id = %intent.id, amount, "payment intent created");
                Ok(intent)
            }
            Err(e) => {
                metrics::counter!("payment_provider_errors_total").increment(1);
                tracing::error!(error = %e, "payment intent creation failed");
                Err(e)
            }
        }
    }

    /// Marks an order paid once its intent is confirmed at the processor.
    ///
    /// Only the purchaser or an admin may confirm. The intent must have been
    /// created by the purchaser (and for this order, if it names one), have
    /// succeeded, be in the bridge's currency and cover the order's price.
    /// An intent pays for one order only. Confirming an already paid order
    /// changes nothing.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.email))]
    pub async fn confirm_order_payment(
        &self,
        caller: &Caller,
        order_id: DocumentId,
        intent_id: &str,
    ) -> Result<PaymentOutcome> {
        let order = self.ledger.get_for(caller, order_id).await?;
        if !order.is_placed_by(&caller.email) && !caller.is_admin() {
            return Err(DomainError::forbidden(
                "only the purchaser or an admin may confirm payment",
            )
            .into());
        }

        let intent = match self.processor.retrieve_intent(intent_id).await {
            Ok(Some(intent)) => intent,
            Ok(None) => {
                return Err(PaymentError::NotConfirmed(format!(
                    "unknown payment intent {intent_id}"
                )));
            }
            Err(e) => {
                metrics::counter!("payment_provider_errors_total").increment(1);
                tracing::error!(error = %e, intent_id, "payment intent lookup failed");
                return Err(e);
            }
        };

        if intent.metadata.get("email").map(String::as_str) != Some(order.purchaser.email.as_str()) {
            return Err(PaymentError::NotConfirmed(format!(
                "payment intent {} was not created by the purchaser",
                intent.id
            )));
        }
        if intent
            .metadata
            .get("orderId")
            .is_some_and(|bound| *bound != order_id.to_string())
        {
            return Err(PaymentError::NotConfirmed(format!(
                "payment intent {} belongs to another order",
                intent.id
            )));
        }
        if intent.status != IntentStatus::Succeeded {
            return Err(PaymentError::NotConfirmed(format!(
                "payment intent {} has not succeeded",
                intent.id
            )));
        }
        if !intent.currency.eq_ignore_ascii_case(&self.currency) {
            return Err(PaymentError::NotConfirmed(format!(
                "payment intent {} is in {}, expected {}",
                intent.id, intent.currency, self.currency
            )));
        }
        if intent.amount < order.price.cents() {
            return Err(PaymentError::NotConfirmed(format!(
                "payment intent {} covers {} of {}",
                intent.id,
                intent.amount,
                order.price.cents()
            )));
        }

        let outcome = self.ledger.mark_paid(order_id, &intent.id).await?;
        if let PaymentOutcome::AlreadyPaid(_) = outcome {
            tracing::info!(order_id = %order_id, "order already paid");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use common::Email;
    use document_store::InMemoryDocumentStore;
    use domain::{Catalog, Money, NewBook, PlaceOrder, Role};

    use super::*;
    use crate::processor::InMemoryPaymentProcessor;

    fn caller(email: &str, role: Role) -> Caller {
        Caller::new(Email::parse(email).unwrap(), "Someone", role)
    }

    fn bridge() -> (PaymentBridge<InMemoryDocumentStore>, InMemoryPaymentProcessor, InMemoryDocumentStore) {
        let store = InMemoryDocumentStore::new();
        let processor = InMemoryPaymentProcessor::new();
        let bridge = PaymentBridge::new(
            Arc::new(processor.clone()),
            OrderLedger::new(store.clone()),
            "USD",
        );
        (bridge, processor, store)
    }

    #[tokio::test]
    async fn test_non_positive_amount_never_reaches_processor() {
        let (bridge, processor, _) = bridge();
        let reader = caller("reader@example.com", Role::User);

        for amount in [Some(0), Some(-5), None] {
            let result = bridge.create_payment_intent(&reader, amount, None).await;
            assert!(matches!(result, Err(PaymentError::InvalidAmount(_))));
        }
        assert_eq!(processor.call_count(), 0);

        let intent = bridge.create_payment_intent(&reader, Some(500), None).await.unwrap();
        assert!(!intent.client_secret.is_empty());
        assert_eq!(intent.currency, "usd");
        assert_eq!(intent.metadata.get("email").map(String::as_str), Some("reader@example.com"));
        assert_eq!(processor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_is_distinct() {
        let (bridge, processor, _) = bridge();
        processor.set_fail_on_create(true).await;

        let result = bridge
            .create_payment_intent(&caller("reader@example.com", Role::User), Some(500), None)
            .await;
        assert!(matches!(result, Err(PaymentError::Provider(_))));
    }

    #[tokio::test]
    async fn test_confirmation_requires_succeeded_intent() {
        let (bridge, processor, store) = bridge();
        let reader = caller("reader@example.com", Role::User);
        let book = Catalog::new(store.clone())
            .create(
                &caller("lib@example.com", Role::Librarian),
                NewBook::new("X", Money::from_cents(500)),
            )
            .await
            .unwrap();
        let order = OrderLedger::new(store.clone())
            .place(&reader, PlaceOrder::new(book.id))
            .await
            .unwrap();

        let short = bridge.create_payment_intent(&reader, Some(499), None).await.unwrap();
        processor.confirm(&short.id).await;
        let result = bridge.confirm_order_payment(&reader, order.id, &short.id).await;
        assert!(matches!(result, Err(PaymentError::NotConfirmed(_))));

        let intent = bridge.create_payment_intent(&reader, Some(500), None).await.unwrap();
        let unconfirmed = bridge.confirm_order_payment(&reader, order.id, &intent.id).await;
        assert!(matches!(unconfirmed, Err(PaymentError::NotConfirmed(_))));

        let unknown = bridge.confirm_order_payment(&reader, order.id, "pi_9999").await;
        assert!(matches!(unknown, Err(PaymentError::NotConfirmed(_))));

        processor.confirm(&intent.id).await;
        let outcome = bridge
            .confirm_order_payment(&reader, order.id, &intent.id)
            .await
            .unwrap();
        assert!(matches!(outcome, PaymentOutcome::Applied(_)));
        assert_eq!(outcome.order().payment_intent_id.as_deref(), Some(intent.id.as_str()));
    }

    #[tokio::test]
    async fn test_librarian_cannot_confirm() {
        let (bridge, processor, store) = bridge();
        let reader = caller("reader@example.com", Role::User);
        let librarian = caller("lib@example.com", Role::Librarian);
        let book = Catalog::new(store.clone())
            .create(&librarian, NewBook::new("X", Money::from_cents(500)))
            .await
            .unwrap();
        let order = OrderLedger::new(store.clone())
            .place(&reader, PlaceOrder::new(book.id))
            .await
            .unwrap();
        let intent = bridge.create_payment_intent(&reader, Some(500), None).await.unwrap();
        processor.confirm(&intent.id).await;

        let result = bridge.confirm_order_payment(&librarian, order.id, &intent.id).await;
        assert!(matches!(
            result,
            Err(PaymentError::Domain(DomainError::Forbidden(_)))
        ));
    }

    #[tokio::test]
    async fn test_canceled_intent_is_not_confirmed() {
        let (bridge, processor, store) = bridge();
        let reader = caller("reader@example.com", Role::User);
        let book = Catalog::new(store.clone())
            .create(
                &caller("lib@example.com", Role::Librarian),
                NewBook::new("X", Money::from_cents(500)),
            )
            .await
            .unwrap();
        let order = OrderLedger::new(store.clone())
            .place(&reader, PlaceOrder::new(book.id))
            .await
            .unwrap();

        let intent = bridge
            .create_payment_intent(&reader, Some(500), Some(order.id))
            .await
            .unwrap();
        assert_eq!(
            intent.metadata.get("orderId").map(String::as_str),
            Some(order.id.to_string().as_str())
        );
        assert!(processor.cancel(&intent.id).await);
        assert!(!processor.confirm(&intent.id).await);

        let result = bridge.confirm_order_payment(&reader, order.id, &intent.id).await;
        assert!(matches!(result, Err(PaymentError::NotConfirmed(_))));
    }

    #[tokio::test]
    async fn test_intent_for_another_users_order_is_refused() {
        let (bridge, processor, store) = bridge();
        let reader = caller("reader@example.com", Role::User);
        let book = Catalog::new(store.clone())
            .create(
                &caller("lib@example.com", Role::Librarian),
                NewBook::new("X", Money::from_cents(500)),
            )
            .await
            .unwrap();
        let order = OrderLedger::new(store.clone())
            .place(&reader, PlaceOrder::new(book.id))
            .await
            .unwrap();

        let other = caller("other@example.com", Role::User);
        let result = bridge
            .create_payment_intent(&other, Some(500), Some(order.id))
            .await;
        assert!(matches!(
            result,
            Err(PaymentError::Domain(DomainError::Forbidden(_)))
        ));
        assert_eq!(processor.call_count(), 0);
    }
}
