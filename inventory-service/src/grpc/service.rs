//! InventoryService gRPC implementation.

use crate::grpc::proto::{
    inventory_service_server::InventoryService, AddInventoryItemRequest, AddInventoryItemResponse,
    AdjustStockRequest, AdjustStockResponse, GetInventoryItemRequest, GetInventoryItemResponse,
    InventoryAlert as ProtoAlert, InventoryItem as ProtoItem,
    InventoryTransaction as ProtoTransaction, ListActiveAlertsRequest, ListActiveAlertsResponse,
    ListInventoryItemsRequest, ListInventoryItemsResponse, ListTransactionsRequest,
    ListTransactionsResponse, RecordUsageRequest, RecordUsageResponse, RecordWasteRequest,
    RecordWasteResponse, ResolveAlertRequest, ResolveAlertResponse, RestockItemRequest,
    RestockItemResponse, VerifyLedgerRequest, VerifyLedgerResponse,
};
use crate::models::{CreateItem, InventoryAlert, InventoryItem, InventoryTransaction, ItemCategory};
use crate::services::metrics::{ERRORS_TOTAL, GRPC_REQUESTS_TOTAL, GRPC_REQUEST_DURATION};
use crate::services::StockLedger;
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::grpc::{
    datetime_to_timestamp, format_decimal, optional_string, parse_decimal,
    parse_optional_decimal, parse_optional_uuid, parse_uuid, IntoStatus,
};
use std::future::Future;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{instrument, warn, Span};

pub struct InventoryServiceImpl {
    ledger: Arc<StockLedger>,
}

impl InventoryServiceImpl {
    pub fn new(ledger: Arc<StockLedger>) -> Self {
        Self { ledger }
    }

    /// Time a handler body and account for its outcome.
    async fn observe<T, F>(&self, method: &'static str, body: F) -> Result<Response<T>, Status>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[method])
            .start_timer();
        let result = body.await;
        timer.observe_duration();

        match result {
            Ok(response) => {
                GRPC_REQUESTS_TOTAL.with_label_values(&[method, "ok"]).inc();
                Ok(Response::new(response))
            }
            Err(err) => {
                let error_type = match &err {
                    AppError::BadRequest(_) => "validation_error",
                    AppError::NotFound(_) => "not_found",
                    AppError::FailedPrecondition(_) => "insufficient_stock",
                    AppError::DatabaseError(_) => "db_error",
                    _ => "internal_error",
                };
                ERRORS_TOTAL.with_label_values(&[error_type]).inc();
                warn!(method, error = %err, "Request failed");
                GRPC_REQUESTS_TOTAL
                    .with_label_values(&[method, error_type])
                    .inc();
                Err(err.into_status())
            }
        }
    }

    fn item_to_proto(item: &InventoryItem) -> ProtoItem {
        ProtoItem {
            item_id: item.item_id.to_string(),
            name: item.name.clone(),
            category: item.category.to_proto(),
            current_stock: format_decimal(&item.current_stock),
            initial_stock: format_decimal(&item.initial_stock),
            minimum_stock: format_decimal(&item.minimum_stock),
            unit: item.unit.clone(),
            cost_per_unit: format_decimal(&item.cost_per_unit),
            supplier: item.supplier.clone().unwrap_or_default(),
            notes: item.notes.clone().unwrap_or_default(),
            last_restocked_at: item.last_restocked_utc.map(datetime_to_timestamp),
            created_at: Some(datetime_to_timestamp(item.created_utc)),
            updated_at: Some(datetime_to_timestamp(item.updated_utc)),
        }
    }

    fn transaction_to_proto(txn: &InventoryTransaction) -> ProtoTransaction {
        ProtoTransaction {
            transaction_id: txn.transaction_id.to_string(),
            item_id: txn.item_id.to_string(),
            item_name: txn.item_name.clone(),
            r#type: txn.transaction_type.to_proto(),
            quantity: format_decimal(&txn.quantity),
            cost_total: txn
                .cost_total
                .as_ref()
                .map(format_decimal)
                .unwrap_or_default(),
            notes: txn.notes.clone().unwrap_or_default(),
            employee_id: txn.employee_id.map(|id| id.to_string()).unwrap_or_default(),
            task_id: txn.task_id.map(|id| id.to_string()).unwrap_or_default(),
            created_at: Some(datetime_to_timestamp(txn.created_utc)),
        }
    }

    fn alert_to_proto(alert: &InventoryAlert) -> ProtoAlert {
        ProtoAlert {
            alert_id: alert.alert_id.to_string(),
            item_id: alert.item_id.to_string(),
            item_name: alert.item_name.clone(),
            unit: alert.unit.clone(),
            alert_type: alert.alert_type.to_proto(),
            threshold_value: format_decimal(&alert.threshold_value),
            current_value: format_decimal(&alert.current_value),
            resolved: alert.resolved,
            created_at: Some(datetime_to_timestamp(alert.created_utc)),
            resolved_at: alert.resolved_utc.map(datetime_to_timestamp),
        }
    }
}

/// `0` (unspecified) means no category.
fn category_from_proto(value: i32) -> Result<Option<ItemCategory>, AppError> {
    if value == 0 {
        return Ok(None);
    }
    ItemCategory::from_proto(value)
        .map(Some)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid category value")))
}

/// Empty strings fall back to zero.
fn decimal_or_zero(value: &str, field: &str) -> Result<Decimal, AppError> {
    Ok(parse_optional_decimal(value, field)?.unwrap_or(Decimal::ZERO))
}

#[tonic::async_trait]
impl InventoryService for InventoryServiceImpl {
    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    #[instrument(
        skip(self, request),
        fields(service = "inventory-service", method = "AddInventoryItem", item_id)
    )]
    async fn add_inventory_item(
        &self,
        request: Request<AddInventoryItemRequest>,
    ) -> Result<Response<AddInventoryItemResponse>, Status> {
        let req = request.into_inner();
        self.observe("AddInventoryItem", async move {
            let category = category_from_proto(req.category)?
                .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("category is required")))?;
            let input = CreateItem {
                initial_stock: decimal_or_zero(&req.initial_stock, "initial_stock")?,
                minimum_stock: decimal_or_zero(&req.minimum_stock, "minimum_stock")?,
                cost_per_unit: decimal_or_zero(&req.cost_per_unit, "cost_per_unit")?,
                name: req.name,
                category,
                unit: req.unit,
                supplier: optional_string(req.supplier),
                notes: optional_string(req.notes),
            };
            let item = self.ledger.add_item(input).await?;
            Span::current().record("item_id", item.item_id.to_string());
            Ok::<_, AppError>(AddInventoryItemResponse {
                item: Some(Self::item_to_proto(&item)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "inventory-service", method = "GetInventoryItem", item_id)
    )]
    async fn get_inventory_item(
        &self,
        request: Request<GetInventoryItemRequest>,
    ) -> Result<Response<GetInventoryItemResponse>, Status> {
        let req = request.into_inner();
        self.observe("GetInventoryItem", async move {
            let item_id = parse_uuid(&req.item_id, "item_id")?;
            Span::current().record("item_id", item_id.to_string());
            let item = self.ledger.get_item(item_id).await?;
            Ok::<_, AppError>(GetInventoryItemResponse {
                item: Some(Self::item_to_proto(&item)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "inventory-service", method = "ListInventoryItems")
    )]
    async fn list_inventory_items(
        &self,
        request: Request<ListInventoryItemsRequest>,
    ) -> Result<Response<ListInventoryItemsResponse>, Status> {
        let req = request.into_inner();
        self.observe("ListInventoryItems", async move {
            let category = category_from_proto(req.category)?;
            let items = self.ledger.list_items(category).await?;
            Ok::<_, AppError>(ListInventoryItemsResponse {
                items: items.iter().map(Self::item_to_proto).collect(),
            })
        })
        .await
    }

    // -------------------------------------------------------------------------
    // Stock movements
    // -------------------------------------------------------------------------

    #[instrument(
        skip(self, request),
        fields(service = "inventory-service", method = "RestockItem", item_id)
    )]
    async fn restock_item(
        &self,
        request: Request<RestockItemRequest>,
    ) -> Result<Response<RestockItemResponse>, Status> {
        let req = request.into_inner();
        self.observe("RestockItem", async move {
            let item_id = parse_uuid(&req.item_id, "item_id")?;
            Span::current().record("item_id", item_id.to_string());
            let quantity = parse_decimal(&req.quantity, "quantity")?;
            let cost_per_unit = parse_optional_decimal(&req.cost_per_unit, "cost_per_unit")?;
            let item = self
                .ledger
                .restock(item_id, quantity, cost_per_unit, optional_string(req.notes))
                .await?;
            Ok::<_, AppError>(RestockItemResponse {
                item: Some(Self::item_to_proto(&item)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "inventory-service", method = "RecordUsage", item_id, task_id)
    )]
    async fn record_usage(
        &self,
        request: Request<RecordUsageRequest>,
    ) -> Result<Response<RecordUsageResponse>, Status> {
        let req = request.into_inner();
        self.observe("RecordUsage", async move {
            let item_id = parse_uuid(&req.item_id, "item_id")?;
            Span::current().record("item_id", item_id.to_string());
            let quantity = parse_decimal(&req.quantity, "quantity")?;
            let task_id = parse_optional_uuid(&req.task_id, "task_id")?;
            if let Some(task_id) = task_id {
                Span::current().record("task_id", task_id.to_string());
            }
            let employee_id = parse_optional_uuid(&req.employee_id, "employee_id")?;
            let item = self
                .ledger
                .record_usage(
                    item_id,
                    quantity,
                    task_id,
                    optional_string(req.notes),
                    employee_id,
                )
                .await?;
            Ok::<_, AppError>(RecordUsageResponse {
                item: Some(Self::item_to_proto(&item)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "inventory-service", method = "RecordWaste", item_id)
    )]
    async fn record_waste(
        &self,
        request: Request<RecordWasteRequest>,
    ) -> Result<Response<RecordWasteResponse>, Status> {
        let req = request.into_inner();
        self.observe("RecordWaste", async move {
            let item_id = parse_uuid(&req.item_id, "item_id")?;
            Span::current().record("item_id", item_id.to_string());
            let quantity = parse_decimal(&req.quantity, "quantity")?;
            let employee_id = parse_optional_uuid(&req.employee_id, "employee_id")?;
            let item = self
                .ledger
                .record_waste(item_id, quantity, optional_string(req.notes), employee_id)
                .await?;
            Ok::<_, AppError>(RecordWasteResponse {
                item: Some(Self::item_to_proto(&item)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "inventory-service", method = "AdjustStock", item_id)
    )]
    async fn adjust_stock(
        &self,
        request: Request<AdjustStockRequest>,
    ) -> Result<Response<AdjustStockResponse>, Status> {
        let req = request.into_inner();
        self.observe("AdjustStock", async move {
            let item_id = parse_uuid(&req.item_id, "item_id")?;
            Span::current().record("item_id", item_id.to_string());
            let delta = parse_decimal(&req.delta, "delta")?;
            let item = self
                .ledger
                .adjust_stock(item_id, delta, optional_string(req.notes))
                .await?;
            Ok::<_, AppError>(AdjustStockResponse {
                item: Some(Self::item_to_proto(&item)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "inventory-service", method = "ListTransactions")
    )]
    async fn list_transactions(
        &self,
        request: Request<ListTransactionsRequest>,
    ) -> Result<Response<ListTransactionsResponse>, Status> {
        let req = request.into_inner();
        self.observe("ListTransactions", async move {
            let item_id = parse_optional_uuid(&req.item_id, "item_id")?;
            let limit = (req.limit > 0).then_some(i64::from(req.limit));
            let transactions = self.ledger.list_transactions(item_id, limit).await?;
            Ok::<_, AppError>(ListTransactionsResponse {
                transactions: transactions
                    .iter()
                    .map(Self::transaction_to_proto)
                    .collect(),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "inventory-service", method = "VerifyLedger", item_id)
    )]
    async fn verify_ledger(
        &self,
        request: Request<VerifyLedgerRequest>,
    ) -> Result<Response<VerifyLedgerResponse>, Status> {
        let req = request.into_inner();
        self.observe("VerifyLedger", async move {
            let item_id = parse_uuid(&req.item_id, "item_id")?;
            Span::current().record("item_id", item_id.to_string());
            let check = self.ledger.verify_ledger(item_id).await?;
            Ok::<_, AppError>(VerifyLedgerResponse {
                item_id: check.item_id.to_string(),
                initial_stock: format_decimal(&check.initial_stock),
                current_stock: format_decimal(&check.current_stock),
                transaction_sum: format_decimal(&check.transaction_sum),
                balanced: check.is_balanced(),
            })
        })
        .await
    }

    // -------------------------------------------------------------------------
    // Alerts
    // -------------------------------------------------------------------------

    #[instrument(
        skip(self, _request),
        fields(service = "inventory-service", method = "ListActiveAlerts")
    )]
    async fn list_active_alerts(
        &self,
        _request: Request<ListActiveAlertsRequest>,
    ) -> Result<Response<ListActiveAlertsResponse>, Status> {
        self.observe("ListActiveAlerts", async move {
            let alerts = self.ledger.list_active_alerts().await?;
            Ok::<_, AppError>(ListActiveAlertsResponse {
                alerts: alerts.iter().map(Self::alert_to_proto).collect(),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "inventory-service", method = "ResolveAlert", alert_id)
    )]
    async fn resolve_alert(
        &self,
        request: Request<ResolveAlertRequest>,
    ) -> Result<Response<ResolveAlertResponse>, Status> {
        let req = request.into_inner();
        self.observe("ResolveAlert", async move {
            let alert_id = parse_uuid(&req.alert_id, "alert_id")?;
            Span::current().record("alert_id", alert_id.to_string());
            let alert = self.ledger.resolve_alert(alert_id).await?;
            Ok::<_, AppError>(ResolveAlertResponse {
                alert: Some(Self::alert_to_proto(&alert)),
            })
        })
        .await
    }
}
