//! Payment tools.
//!
//! Each tool maps onto one or two PayPal REST calls and returns a compact
//! JSON summary of the result as a single text block.

use async_trait::async_trait;
use aztp_mcp::path::resource_segment;
use aztp_mcp::{ResponseEnvelope, ToolDescriptor, ToolFailure, ToolResult, ToolSet};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::client::PayPalApi;

pub const IDENTITY_TOOL: &str = "get_paypal_aztp_identity";

// ── Arguments ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderIntent {
    Capture,
    Authorize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub currency_code: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseUnit {
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Any other purchase-unit fields, passed through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderArgs {
    pub intent: OrderIntent,
    pub purchase_units: Vec<PurchaseUnit>,
    pub merchant_id: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderArgs {
    pub order_id: String,
    pub merchant_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionArgs {
    pub product_id: String,
    pub billing_cycles: Vec<Value>,
    pub merchant_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub setup_fee: Option<Money>,
    pub subscriber_first_name: Option<String>,
    pub subscriber_last_name: Option<String>,
    pub subscriber_email: Option<String>,
    pub brand_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelSubscriptionArgs {
    pub subscription_id: String,
    pub reason: Option<String>,
    pub merchant_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RefundArgs {
    pub capture_id: String,
    pub amount: Option<Money>,
    pub note: Option<String>,
    pub merchant_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PayoutArgs {
    pub sender_batch_id: String,
    pub items: Vec<Value>,
    pub merchant_id: String,
    pub email_subject: Option<String>,
    pub email_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "name", content = "arguments")]
pub enum PayPalCall {
    #[serde(rename = "create_paypal_order")]
    CreateOrder(CreateOrderArgs),
    #[serde(rename = "capture_paypal_order")]
    CaptureOrder(OrderArgs),
    #[serde(rename = "get_order_details")]
    GetOrderDetails(OrderArgs),
    #[serde(rename = "create_paypal_subscription")]
    CreateSubscription(CreateSubscriptionArgs),
    #[serde(rename = "cancel_subscription")]
    CancelSubscription(CancelSubscriptionArgs),
    #[serde(rename = "create_refund")]
    CreateRefund(RefundArgs),
    #[serde(rename = "create_paypal_payout")]
    CreatePayout(PayoutArgs),
}

impl PayPalCall {
    /// Operation name used in failure messages.
    fn operation(&self) -> &'static str {
        match self {
            Self::CreateOrder(_) => "order creation",
            Self::CaptureOrder(_) => "order capture",
            Self::GetOrderDetails(_) => "get order details",
            Self::CreateSubscription(_) => "subscription creation",
            Self::CancelSubscription(_) => "subscription cancellation",
            Self::CreateRefund(_) => "refund creation",
            Self::CreatePayout(_) => "payout creation",
        }
    }

    fn merchant_id(&self) -> &str {
        match self {
            Self::CreateOrder(a) => &a.merchant_id,
            Self::CaptureOrder(a) | Self::GetOrderDetails(a) => &a.merchant_id,
            Self::CreateSubscription(a) => &a.merchant_id,
            Self::CancelSubscription(a) => &a.merchant_id,
            Self::CreateRefund(a) => &a.merchant_id,
            Self::CreatePayout(a) => &a.merchant_id,
        }
    }
}

// ── Summaries ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderSummary {
    order_id: Option<Value>,
    status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    links: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureSummary {
    order_id: Option<Value>,
    status: Option<Value>,
    capture_id: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionSummary {
    subscription_id: Option<Value>,
    plan_id: Value,
    status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    links: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelSummary {
    subscription_id: String,
    status: Option<Value>,
    message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefundSummary {
    refund_id: Option<Value>,
    capture_id: String,
    status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayoutSummary {
    batch_id: Option<Value>,
    status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    links: Option<Value>,
}

fn field(value: &Value, pointer: &str) -> Option<Value> {
    value.pointer(pointer).cloned()
}

fn to_text<T: Serialize>(summary: &T) -> Result<String, String> {
    serde_json::to_string(summary).map_err(|e| e.to_string())
}

fn segment(name: &'static str, value: &str) -> Result<String, String> {
    resource_segment(name, value).map_err(|e| e.to_string())
}

// ── Tool set ──────────────────────────────────────────────────────────────────

/// Buyer redirect targets attached to orders and subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectUrls {
    pub return_url: Option<String>,
    pub cancel_url: Option<String>,
}

pub struct PayPalTools<A> {
    api: A,
    redirects: RedirectUrls,
    clock: fn() -> DateTime<Utc>,
}

impl<A: PayPalApi> PayPalTools<A> {
    pub fn new(api: A, redirects: RedirectUrls) -> Self {
        Self {
            api,
            redirects,
            clock: Utc::now,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, String> {
        self.api
            .request(Method::POST, path, Some(body))
            .await
            .map_err(|e| e.to_string())
    }

    async fn get(&self, path: &str) -> Result<Value, String> {
        self.api
            .request(Method::GET, path, None)
            .await
            .map_err(|e| e.to_string())
    }

    async fn create_order(&self, args: CreateOrderArgs) -> Result<String, String> {
        let body = json!({
            "intent": args.intent,
            "purchase_units": args.purchase_units,
            "application_context": {
                "return_url": self.redirects.return_url,
                "cancel_url": self.redirects.cancel_url
            }
        });
        let order = self.post("/v2/checkout/orders", body).await?;
        to_text(&OrderSummary {
            order_id: field(&order, "/id"),
            status: field(&order, "/status"),
            links: field(&order, "/links"),
        })
    }

    async fn capture_order(&self, args: OrderArgs) -> Result<String, String> {
        let id = segment("order_id", &args.order_id)?;
        let path = format!("/v2/checkout/orders/{id}/capture");
        let order = self.post(&path, json!({})).await?;
        to_text(&CaptureSummary {
            order_id: field(&order, "/id"),
            status: field(&order, "/status"),
            capture_id: Some(
                field(&order, "/purchase_units/0/payments/captures/0/id").unwrap_or(Value::Null),
            ),
        })
    }

    async fn get_order_details(&self, args: OrderArgs) -> Result<String, String> {
        let id = segment("order_id", &args.order_id)?;
        let path = format!("/v2/checkout/orders/{id}");
        let order = self.get(&path).await?;
        to_text(&order)
    }

    async fn create_subscription(&self, args: CreateSubscriptionArgs) -> Result<String, String> {
        let mut preferences = json!({
            "auto_bill_outstanding": true,
            "setup_fee_failure_action": "CONTINUE",
            "payment_failure_threshold": 3
        });
        if let Some(fee) = &args.setup_fee {
            preferences["setup_fee"] = json!(fee);
        }
        let plan = self
            .post(
                "/v1/billing/plans",
                json!({
                    "product_id": args.product_id,
                    "name": args.name.as_deref().unwrap_or("Subscription Plan"),
                    "description": args
                        .description
                        .as_deref()
                        .unwrap_or("Subscription plan created via MCP server"),
                    "billing_cycles": args.billing_cycles,
                    "payment_preferences": preferences
                }),
            )
            .await?;
        let plan_id = field(&plan, "/id").ok_or("plan response has no id")?;

        let start_time = ((self.clock)() + chrono::Duration::hours(24))
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let subscription = self
            .post(
                "/v1/billing/subscriptions",
                json!({
                    "plan_id": plan_id,
                    "start_time": start_time,
                    "subscriber": {
                        "name": {
                            "given_name": args.subscriber_first_name.as_deref().unwrap_or("Subscriber"),
                            "surname": args.subscriber_last_name.as_deref().unwrap_or("User")
                        },
                        "email_address": args.subscriber_email
                    },
                    "application_context": {
                        "brand_name": args.brand_name.as_deref().unwrap_or("Merchant"),
                        "shipping_preference": "NO_SHIPPING",
                        "user_action": "SUBSCRIBE_NOW",
                        "payment_method": {
                            "payer_selected": "PAYPAL",
                            "payee_preferred": "IMMEDIATE_PAYMENT_REQUIRED"
                        },
                        "return_url": self.redirects.return_url,
                        "cancel_url": self.redirects.cancel_url
                    }
                }),
            )
            .await?;

        to_text(&SubscriptionSummary {
            subscription_id: field(&subscription, "/id"),
            plan_id,
            status: field(&subscription, "/status"),
            links: field(&subscription, "/links"),
        })
    }

    async fn cancel_subscription(&self, args: CancelSubscriptionArgs) -> Result<String, String> {
        let id = segment("subscription_id", &args.subscription_id)?;
        let base = format!("/v1/billing/subscriptions/{id}");
        self.post(
            &format!("{base}/cancel"),
            json!({
                "reason": args.reason.as_deref().unwrap_or("Merchant initiated cancellation")
            }),
        )
        .await?;
        let subscription = self.get(&base).await?;
        to_text(&CancelSummary {
            subscription_id: args.subscription_id,
            status: field(&subscription, "/status"),
            message: "Subscription cancelled successfully",
        })
    }

    async fn create_refund(&self, args: RefundArgs) -> Result<String, String> {
        let body = match &args.amount {
            Some(amount) => json!({
                "amount": amount,
                "note_to_payer": args.note.as_deref().unwrap_or("Refund from merchant")
            }),
            None => json!({}),
        };
        let id = segment("capture_id", &args.capture_id)?;
        let path = format!("/v2/payments/captures/{id}/refund");
        let refund = self.post(&path, body).await?;
        to_text(&RefundSummary {
            refund_id: field(&refund, "/id"),
            capture_id: args.capture_id,
            status: field(&refund, "/status"),
            amount: field(&refund, "/amount"),
        })
    }

    async fn create_payout(&self, args: PayoutArgs) -> Result<String, String> {
        let payout = self
            .post(
                "/v1/payments/payouts",
                json!({
                    "sender_batch_header": {
                        "sender_batch_id": args.sender_batch_id,
                        "email_subject": args.email_subject.as_deref().unwrap_or("You have received a payout"),
                        "email_message": args
                            .email_message
                            .as_deref()
                            .unwrap_or("You have received a payout from a merchant")
                    },
                    "items": args.items
                }),
            )
            .await?;
        to_text(&PayoutSummary {
            batch_id: field(&payout, "/batch_header/payout_batch_id"),
            status: field(&payout, "/batch_header/batch_status"),
            links: field(&payout, "/links"),
        })
    }
}

#[async_trait]
impl<A: PayPalApi> ToolSet for PayPalTools<A> {
    type Call = PayPalCall;

    fn tools(&self) -> Vec<ToolDescriptor> {
        tool_descriptors()
    }

    async fn call(&self, call: PayPalCall) -> ToolResult {
        let operation = call.operation();
        debug!(operation, merchant_id = call.merchant_id(), "paypal tool call");

        let outcome = match call {
            PayPalCall::CreateOrder(args) => self.create_order(args).await,
            PayPalCall::CaptureOrder(args) => self.capture_order(args).await,
            PayPalCall::GetOrderDetails(args) => self.get_order_details(args).await,
            PayPalCall::CreateSubscription(args) => self.create_subscription(args).await,
            PayPalCall::CancelSubscription(args) => self.cancel_subscription(args).await,
            PayPalCall::CreateRefund(args) => self.create_refund(args).await,
            PayPalCall::CreatePayout(args) => self.create_payout(args).await,
        };

        outcome
            .map(ResponseEnvelope::text)
            .map_err(|message| ToolFailure::provider(format!("PayPal {operation} failed: {message}")))
    }
}

pub fn identity_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        IDENTITY_TOOL,
        "Get AZTP identity of the PayPal MCP server. This is used to secure the connection between this server and other AZTP servers.",
        json!({ "type": "object", "properties": {} }),
    )
}

fn merchant_id_schema() -> Value {
    json!({ "type": "string", "description": "Merchant's PayPal account ID" })
}

fn money_schema(currency_key: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            currency_key: { "type": "string" },
            "value": { "type": "string" }
        },
        "required": [currency_key, "value"]
    })
}

fn tool_descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "create_paypal_order",
            "Create a PayPal order for processing payments",
            json!({
                "type": "object",
                "properties": {
                    "intent": {
                        "type": "string",
                        "enum": ["CAPTURE", "AUTHORIZE"],
                        "description": "Payment intent (CAPTURE or AUTHORIZE)"
                    },
                    "purchase_units": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "amount": money_schema("currency_code"),
                                "description": { "type": "string" }
                            },
                            "required": ["amount"]
                        }
                    },
                    "merchant_id": merchant_id_schema()
                },
                "required": ["intent", "purchase_units", "merchant_id"]
            }),
        ),
        ToolDescriptor::new(
            "capture_paypal_order",
            "Capture an authorized payment",
            json!({
                "type": "object",
                "properties": {
                    "order_id": { "type": "string", "description": "PayPal order ID to capture" },
                    "merchant_id": merchant_id_schema()
                },
                "required": ["order_id", "merchant_id"]
            }),
        ),
        ToolDescriptor::new(
            "get_order_details",
            "Get details of a specific order",
            json!({
                "type": "object",
                "properties": {
                    "order_id": { "type": "string", "description": "PayPal order ID" },
                    "merchant_id": merchant_id_schema()
                },
                "required": ["order_id", "merchant_id"]
            }),
        ),
        ToolDescriptor::new(
            "create_paypal_subscription",
            "Create a PayPal subscription plan",
            json!({
                "type": "object",
                "properties": {
                    "product_id": { "type": "string", "description": "PayPal product ID" },
                    "billing_cycles": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "frequency": {
                                    "type": "object",
                                    "properties": {
                                        "interval_unit": { "type": "string", "enum": ["DAY", "WEEK", "MONTH", "YEAR"] },
                                        "interval_count": { "type": "integer" }
                                    },
                                    "required": ["interval_unit", "interval_count"]
                                },
                                "tenure_type": { "type": "string", "enum": ["REGULAR", "TRIAL"] },
                                "sequence": { "type": "integer" },
                                "total_cycles": { "type": "integer" },
                                "pricing_scheme": {
                                    "type": "object",
                                    "properties": { "fixed_price": money_schema("currency_code") },
                                    "required": ["fixed_price"]
                                }
                            },
                            "required": ["frequency", "tenure_type", "sequence", "pricing_scheme"]
                        }
                    },
                    "merchant_id": merchant_id_schema()
                },
                "required": ["product_id", "billing_cycles", "merchant_id"]
            }),
        ),
        ToolDescriptor::new(
            "cancel_subscription",
            "Cancel a subscription",
            json!({
                "type": "object",
                "properties": {
                    "subscription_id": { "type": "string", "description": "PayPal subscription ID" },
                    "reason": { "type": "string", "description": "Cancellation reason" },
                    "merchant_id": merchant_id_schema()
                },
                "required": ["subscription_id", "merchant_id"]
            }),
        ),
        ToolDescriptor::new(
            "create_refund",
            "Create a refund for a captured payment",
            json!({
                "type": "object",
                "properties": {
                    "capture_id": { "type": "string", "description": "PayPal capture ID" },
                    "amount": money_schema("currency_code"),
                    "merchant_id": merchant_id_schema()
                },
                "required": ["capture_id", "merchant_id"]
            }),
        ),
        ToolDescriptor::new(
            "create_paypal_payout",
            "Create a payout to transfer funds",
            json!({
                "type": "object",
                "properties": {
                    "sender_batch_id": { "type": "string", "description": "Unique identifier for the payout" },
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "recipient_type": { "type": "string", "enum": ["EMAIL", "PHONE", "PAYPAL_ID"] },
                                "amount": money_schema("currency"),
                                "receiver": { "type": "string" },
                                "note": { "type": "string" }
                            },
                            "required": ["recipient_type", "amount", "receiver"]
                        }
                    },
                    "merchant_id": merchant_id_schema()
                },
                "required": ["sender_batch_id", "items", "merchant_id"]
            }),
        ),
    ]
}
