#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tower::ServiceExt;

use flower_shop_api::{
    app_router,
    config::{AppConfig, VnPayConfig},
    db,
    entities::{category, flower},
    gateway::{vnpay::fields, ParameterSet},
    services::{
        flowers::CreateFlowerRequest,
        categories::CreateCategoryRequest,
        orders::{CreateOrderRequest, OrderDetails, OrderLineRequest},
        payments::ORDER_ID_PARAM,
    },
    AppState,
};

pub const GATEWAY_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";
pub const SECRET_KEY: &str = "TESTSECRETKEY";

pub fn vnpay_config() -> VnPayConfig {
    VnPayConfig {
        url: GATEWAY_URL.into(),
        tmn_code: "DEMO1234".into(),
        secret_key: SECRET_KEY.into(),
        return_url: "http://localhost:8080/api/v1/payments/vnpay/return".into(),
        ..VnPayConfig::default()
    }
}

/// Helper harness for an application backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), vnpay_config());
        cfg.environment = "test".to_string();
        // One connection keeps every query on the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = app_router(state.clone());

        Self { router, state }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_flower(&self, name: &str, price: Decimal, stock: i32) -> flower::Model {
        self.state
            .services
            .flowers
            .create_flower(CreateFlowerRequest {
                name: name.to_string(),
                price,
                image_path: None,
                additional_images: Vec::new(),
                description: Some(format!("{} bouquet", name)),
                stock,
                category_id: None,
            })
            .await
            .expect("seed flower")
    }

    pub async fn seed_category(&self, name: &str) -> category::Model {
        self.state
            .services
            .categories
            .create_category(CreateCategoryRequest {
                name: name.to_string(),
            })
            .await
            .expect("seed category")
    }

    /// Inserts a flower directly, skipping request validation.
    pub async fn insert_flower_unchecked(
        &self,
        name: &str,
        price: Decimal,
        stock: i32,
    ) -> flower::Model {
        flower::ActiveModel {
            name: Set(name.to_string()),
            price: Set(price),
            image_path: Set(None),
            additional_images: Set(None),
            description: Set(None),
            stock: Set(stock),
            category_id: Set(None),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("insert flower")
    }

    pub async fn place_order(&self, lines: &[(i32, i32)]) -> OrderDetails {
        self.place_order_for("Nguyen Van A", "0901234567", lines)
            .await
    }

    pub async fn place_order_for(
        &self,
        customer_name: &str,
        phone: &str,
        lines: &[(i32, i32)],
    ) -> OrderDetails {
        self.state
            .services
            .orders
            .place_order(CreateOrderRequest {
                customer_name: customer_name.to_string(),
                phone: phone.to_string(),
                address: "12 Hoa Lan, Phu Nhuan".to_string(),
                note: None,
                delivery_date: None,
                items: lines
                    .iter()
                    .map(|(flower_id, quantity)| OrderLineRequest {
                        flower_id: *flower_id,
                        quantity: *quantity,
                        selected_style: None,
                    })
                    .collect(),
            })
            .await
            .expect("place order")
    }

    pub async fn flower_stock(&self, id: i32) -> i32 {
        flower::Entity::find_by_id(id)
            .one(self.state.db.as_ref())
            .await
            .expect("load flower")
            .expect("flower exists")
            .stock
    }

    pub async fn set_flower_stock(&self, id: i32, stock: i32) {
        let model = flower::Entity::find_by_id(id)
            .one(self.state.db.as_ref())
            .await
            .expect("load flower")
            .expect("flower exists");
        let mut active: flower::ActiveModel = model.into();
        active.stock = Set(stock);
        active
            .update(self.state.db.as_ref())
            .await
            .expect("update stock");
    }

    /// Gateway fields of a return callback, signed with the test secret.
    pub fn signed_callback(
        &self,
        amount_minor: i64,
        response_code: &str,
        transaction_no: &str,
    ) -> ParameterSet {
        let mut params = ParameterSet::new();
        params
            .insert(fields::TMN_CODE, "DEMO1234")
            .insert(fields::AMOUNT, amount_minor.to_string())
            .insert("vnp_BankCode", "NCB")
            .insert(fields::ORDER_INFO, "Thanh toan don hang")
            .insert(fields::RESPONSE_CODE, response_code)
            .insert(fields::TRANSACTION_NO, transaction_no)
            .insert(fields::TXN_REF, "1700000000000")
            .insert("vnp_PayDate", "20241109143500");
        let signature = self.state.gateway.sign(&params).expect("sign callback");
        params.insert(flower_shop_api::gateway::SECURE_HASH, signature);
        params
    }
}

/// Full callback parameters as the return handler receives them.
pub fn callback_for_order(order_id: i32, params: &ParameterSet) -> ParameterSet {
    let mut all = params.clone();
    all.insert(ORDER_ID_PARAM, order_id.to_string());
    all
}

/// `/api/v1/payments/vnpay/return?...` for the given gateway fields.
pub fn return_uri(order_id: &str, params: &ParameterSet) -> String {
    format!(
        "/api/v1/payments/vnpay/return?orderId={}&{}",
        order_id,
        params.query_string().expect("encode callback")
    )
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub fn decimal_field(value: &Value) -> Decimal {
    value
        .as_str()
        .map(|s| s.parse::<Decimal>().expect("decimal string"))
        .or_else(|| value.as_f64().and_then(|f| Decimal::try_from(f).ok()))
        .expect("decimal value")
}
