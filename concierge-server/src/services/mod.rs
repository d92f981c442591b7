//! External Service Adapters
//!
//! Every collaborator outside this process lives behind a trait here:
//! payment gateway, menu/pricing service, messaging platform, object
//! storage. The lifecycle orchestrator only ever sees the traits.

pub mod automation;
pub mod invoice;
pub mod object_storage;
pub mod payment_gateway;
pub mod pricing;
pub mod promo;
pub mod whatsapp;

pub use automation::AutomationService;
pub use invoice::InvoiceService;
pub use object_storage::{HttpObjectStorage, ObjectStorage};
pub use payment_gateway::{
    DisbursementRequest, DisbursementResponse, GatewayError, HttpPaymentGateway, InvoiceLineItem,
    InvoiceRequest, InvoiceResponse, PaymentGateway,
};
pub use pricing::{
    HttpPricingResolver, PriceDistribution, PricingResolver, ServiceListing, clean_price_string,
};
pub use promo::{PromoQuote, PromoService};
pub use whatsapp::{MessageSender, OutboxService, WhatsAppClient};
