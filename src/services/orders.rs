use crate::{
    db::{with_transaction, DbPool, RetryPolicy},
    entities::{
        order::{self, Entity as OrderEntity, OrderInfo},
        order_recipe_line::{self, Entity as OrderRecipeLineEntity},
        recipe::{self, Entity as RecipeEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{dispatch_order_ready, OrderReadyNotifier},
    services::prepared_stock::PreparedStockLedger,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::{Validate, ValidationError};

/// Order header plus the payload describing what was ordered
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(custom = "validate_non_negative")]
    pub tax: Decimal,
    #[validate(custom = "validate_non_negative")]
    pub total_cost: Decimal,
    pub cashier_id: i32,
    #[validate(email)]
    pub customer_email: Option<String>,
    pub order_info: OrderInfo,
    /// Defaults to the time the order is stored
    #[serde(default)]
    pub order_time: Option<DateTime<Utc>>,
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("must_be_non_negative"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithLines {
    #[serde(flatten)]
    pub order: order::Model,
    pub lines: Vec<order_recipe_line::Model>,
}

/// Places orders and drives prepared-stock consumption when they complete
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    notifier: Arc<dyn OrderReadyNotifier>,
    retry: RetryPolicy,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        notifier: Arc<dyn OrderReadyNotifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            notifier,
            retry,
        }
    }

    /// Stores the order header and one line per distinct recipe in a single
    /// transaction. Quantities are summed across meals and individual items.
    #[instrument(skip(self, request), fields(cashier_id = request.cashier_id))]
    pub async fn place_order(
        &self,
        request: PlaceOrderRequest,
    ) -> Result<OrderWithLines, ServiceError> {
        request.validate()?;
        request
            .order_info
            .check_quantities()
            .map_err(ServiceError::ValidationError)?;
        if request.order_info.is_empty() {
            return Err(ServiceError::ValidationError(
                "order must contain at least one recipe".to_string(),
            ));
        }

        let totals = request.order_info.recipe_quantities();
        let order_info = serde_json::to_value(&request.order_info)
            .map_err(|e| ServiceError::InternalError(format!("encode order info: {}", e)))?;

        let header = order::ActiveModel {
            tax: Set(request.tax),
            total_cost: Set(request.total_cost),
            order_time: Set(request.order_time.unwrap_or_else(Utc::now)),
            cashier_id: Set(request.cashier_id),
            is_completed: Set(false),
            customer_email: Set(request.customer_email.clone()),
            order_info: Set(order_info),
            completed_at: Set(None),
            ..Default::default()
        };

        let placed = with_transaction(&self.db_pool, &self.retry, move |txn| {
            let header = header.clone();
            let totals = totals.clone();
            Box::pin(async move { Self::place_in(txn, header, totals).await })
        })
        .await?;

        counter!("pos.orders.placed", 1);
        info!(
            order_id = placed.order.id,
            lines = placed.lines.len(),
            "order placed"
        );
        self.event_sender.send_or_log(Event::OrderPlaced {
            order_id: placed.order.id,
            line_count: placed.lines.len(),
        });

        Ok(placed)
    }

    /// Marks the order completed and consumes prepared stock for every line.
    ///
    /// The completed flag and all consumptions share one transaction: a
    /// shortfall on any line leaves the order open and every counter untouched.
    #[instrument(skip(self))]
    pub async fn complete_order(&self, order_id: i32) -> Result<order::Model, ServiceError> {
        let result = with_transaction(&self.db_pool, &self.retry, move |txn| {
            Box::pin(Self::complete_in(txn, order_id))
        })
        .await;

        let (order, consumed) = match result {
            Ok(done) => done,
            Err(err) => {
                if let Some(event) = Event::shortage_from(&err) {
                    counter!("pos.orders.completion_shortages", 1);
                    self.event_sender.send_or_log(event);
                }
                return Err(err);
            }
        };

        counter!("pos.orders.completed", 1);
        info!(order_id, lines = consumed.len(), "order completed");

        for (recipe_id, quantity, remaining) in consumed {
            self.event_sender.send_or_log(Event::PreparedStockConsumed {
                recipe_id,
                quantity,
                remaining,
            });
        }
        self.event_sender
            .send_or_log(Event::OrderCompleted { order_id: order.id });

        if let Some(email) = order.customer_email.clone().filter(|e| !e.is_empty()) {
            dispatch_order_ready(self.notifier.clone(), email, order.id);
        }

        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i32) -> Result<Option<OrderWithLines>, ServiceError> {
        let db = &*self.db_pool;
        let Some(order) = OrderEntity::find_by_id(order_id).one(db).await? else {
            return Ok(None);
        };
        let lines = Self::lines_in(db, order_id).await?;
        Ok(Some(OrderWithLines { order, lines }))
    }

    async fn place_in(
        txn: &DatabaseTransaction,
        header: order::ActiveModel,
        totals: BTreeMap<i32, i32>,
    ) -> Result<OrderWithLines, ServiceError> {
        // Header first so the transaction holds the write lock before reading
        let order = header.insert(txn).await?;

        let wanted: BTreeSet<i32> = totals.keys().copied().collect();
        let known: BTreeSet<i32> = RecipeEntity::find()
            .select_only()
            .column(recipe::Column::Id)
            .filter(recipe::Column::Id.is_in(wanted.iter().copied()))
            .into_tuple::<i32>()
            .all(txn)
            .await?
            .into_iter()
            .collect();
        if let Some(missing) = wanted.difference(&known).next() {
            return Err(ServiceError::RecipeNotFound(*missing));
        }

        let lines: Vec<order_recipe_line::ActiveModel> = totals
            .iter()
            .map(|(&recipe_id, &quantity)| order_recipe_line::ActiveModel {
                order_id: Set(order.id),
                recipe_id: Set(recipe_id),
                quantity: Set(quantity),
                ..Default::default()
            })
            .collect();
        if !lines.is_empty() {
            OrderRecipeLineEntity::insert_many(lines)
                .exec_without_returning(txn)
                .await?;
        }

        let lines = Self::lines_in(txn, order.id).await?;
        Ok(OrderWithLines { order, lines })
    }

    async fn complete_in(
        txn: &DatabaseTransaction,
        order_id: i32,
    ) -> Result<(order::Model, Vec<(i32, i32, i32)>), ServiceError> {
        // Conditional flip before any read: it takes the write lock up front and
        // only one concurrent completion can win it
        let flipped = OrderEntity::update_many()
            .col_expr(order::Column::IsCompleted, Expr::value(true))
            .col_expr(order::Column::CompletedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::IsCompleted.eq(false))
            .exec(txn)
            .await?;
        if flipped.rows_affected == 0 {
            let exists = OrderEntity::find_by_id(order_id).one(txn).await?.is_some();
            if !exists {
                return Err(ServiceError::OrderNotFound(order_id));
            }
            warn!(order_id, "order already completed");
            return Err(ServiceError::OrderAlreadyCompleted(order_id));
        }

        let mut consumed = Vec::new();
        for line in Self::lines_in(txn, order_id)
            .await?
            .into_iter()
            .filter(|l| l.quantity > 0)
        {
            let stock = PreparedStockLedger::consume_in(txn, line.recipe_id, line.quantity).await?;
            consumed.push((line.recipe_id, line.quantity, stock.current_stock));
        }

        let order = OrderEntity::find_by_id(order_id)
            .one(txn)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;
        Ok((order, consumed))
    }

    /// Lines in ascending recipe id, the lock order completion follows
    async fn lines_in<C>(
        conn: &C,
        order_id: i32,
    ) -> Result<Vec<order_recipe_line::Model>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(OrderRecipeLineEntity::find()
            .filter(order_recipe_line::Column::OrderId.eq(order_id))
            .order_by_asc(order_recipe_line::Column::RecipeId)
            .all(conn)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn request(tax: Decimal, total: Decimal, email: Option<&str>) -> PlaceOrderRequest {
        PlaceOrderRequest {
            tax,
            total_cost: total,
            cashier_id: 1,
            customer_email: email.map(str::to_string),
            order_info: OrderInfo::default(),
            order_time: None,
        }
    }

    #[rstest]
    #[case(dec!(0), dec!(0), None, true)]
    #[case(dec!(0.80), dec!(10.50), Some("guest@example.com"), true)]
    #[case(dec!(-0.01), dec!(10.50), None, false)]
    #[case(dec!(0.80), dec!(-1), None, false)]
    #[case(dec!(0.80), dec!(10.50), Some("not-an-email"), false)]
    fn header_validation(
        #[case] tax: Decimal,
        #[case] total: Decimal,
        #[case] email: Option<&str>,
        #[case] valid: bool,
    ) {
        assert_eq!(request(tax, total, email).validate().is_ok(), valid);
    }
}
