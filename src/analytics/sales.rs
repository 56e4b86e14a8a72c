//! Sales metrics

use chrono::{DateTime, Days, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::calendar::{Calendar, Span};
use crate::domain::aggregates::{Order, OrderStatus};

const RANKING_SIZE: usize = 5;
const DAILY_BUCKETS: u64 = 7;
const MONTHLY_BUCKETS: u32 = 6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub orders: usize,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u64,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRanking {
    /// Best sellers by quantity, highest first.
    pub top: Vec<ProductSales>,
    /// Weakest sellers by quantity, lowest first.
    pub worst: Vec<ProductSales>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub label: String,
    pub start: i64,
    pub orders: usize,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub this_week: PeriodTotals,
    pub this_month: PeriodTotals,
    pub this_year: PeriodTotals,
    pub last_month: PeriodTotals,
    pub growth_percent: Decimal,
    pub total: PeriodTotals,
    pub average_order_value: Decimal,
    pub products: ProductRanking,
    pub status_distribution: BTreeMap<OrderStatus, usize>,
    pub daily: Vec<SeriesPoint>,
    pub monthly: Vec<SeriesPoint>,
    pub unique_customers: usize,
}

/// Order count and summed `totalPrice` of the orders created inside `span`.
/// Revenue sums saturate at the `Decimal` bounds.
pub fn period_totals(orders: &[Order], span: Span) -> PeriodTotals {
    orders
        .iter()
        .filter(|o| span.contains(o.created_at))
        .fold(PeriodTotals::default(), |acc, o| PeriodTotals { orders: acc.orders + 1, revenue: acc.revenue.saturating_add(o.total_price) })
}

fn all_time(orders: &[Order]) -> PeriodTotals {
    PeriodTotals { orders: orders.len(), revenue: orders.iter().map(|o| o.total_price).fold(Decimal::ZERO, Decimal::saturating_add) }
}

/// Month-over-month revenue change in percent, one decimal. A month with revenue
/// after an empty one counts as `100`; two empty months as `0`.
pub fn growth_percent(this_month: Decimal, last_month: Decimal) -> Decimal {
    if last_month.is_zero() {
        return if this_month > Decimal::ZERO { Decimal::ONE_HUNDRED } else { Decimal::ZERO };
    }
    let change = this_month.saturating_sub(last_month);
    let ratio = change.checked_div(last_month).and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED));
    match ratio {
        Some(ratio) => ratio.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero),
        None if change.is_sign_negative() != last_month.is_sign_negative() => Decimal::MIN,
        None => Decimal::MAX,
    }
}

/// Folds every line item into per-product quantity and revenue. Ties keep the
/// order in which products first appear.
pub fn rank_products(orders: &[Order]) -> ProductRanking {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut sales: Vec<ProductSales> = Vec::new();
    for item in orders.iter().flat_map(|o| o.items.iter()) {
        let slot = *index.entry(item.product_id.as_str()).or_insert_with(|| {
            sales.push(ProductSales {
                product_id: item.product_id.clone(),
                product_name: item.product_name.clone(),
                quantity: 0,
                revenue: Decimal::ZERO,
            });
            sales.len() - 1
        });
        sales[slot].quantity = sales[slot].quantity.saturating_add(u64::from(item.quantity));
        sales[slot].revenue = sales[slot].revenue.saturating_add(item.line_total());
    }
    sales.sort_by(|a, b| b.quantity.cmp(&a.quantity));

    ProductRanking {
        top: sales.iter().take(RANKING_SIZE).cloned().collect(),
        worst: sales.iter().rev().take(RANKING_SIZE).cloned().collect(),
    }
}

/// Orders per status over the whole collection. Every status is present.
pub fn status_distribution(orders: &[Order]) -> BTreeMap<OrderStatus, usize> {
    let mut counts: BTreeMap<OrderStatus, usize> = OrderStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    for order in orders {
        *counts.entry(order.status).or_default() += 1;
    }
    counts
}

pub fn average_order_value(orders: &[Order]) -> Decimal {
    if orders.is_empty() {
        return Decimal::ZERO;
    }
    let total = all_time(orders);
    (total.revenue / Decimal::from(total.orders)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn point(orders: &[Order], span: Span, label: String) -> SeriesPoint {
    let totals = period_totals(orders, span);
    SeriesPoint { label, start: span.start, orders: totals.orders, revenue: totals.revenue }
}

/// The last seven local days including today, oldest first.
pub fn daily_series(orders: &[Order], now: DateTime<Utc>, calendar: &Calendar) -> Vec<SeriesPoint> {
    let today = calendar.today(now);
    (0..DAILY_BUCKETS)
        .rev()
        .map(|back| {
            let date = today - Days::new(back);
            point(orders, calendar.day(date), date.format("%d.%m.").to_string())
        })
        .collect()
}

/// The last six calendar months including the current one, oldest first.
pub fn monthly_series(orders: &[Order], now: DateTime<Utc>, calendar: &Calendar) -> Vec<SeriesPoint> {
    let today = calendar.today(now);
    (0..MONTHLY_BUCKETS)
        .rev()
        .map(|back| {
            let label = calendar.month_start(today, back).format("%b %Y").to_string();
            point(orders, calendar.month(today, back), label)
        })
        .collect()
}

/// Distinct `customerEmail` values, compared verbatim.
pub fn unique_customers(orders: &[Order]) -> usize {
    orders.iter().map(|o| o.customer_email.as_str()).collect::<HashSet<_>>().len()
}

/// Every dashboard metric at once. Revenue counts orders of every status.
pub fn summarize(orders: &[Order], now: DateTime<Utc>, calendar: &Calendar) -> SalesSummary {
    let today = calendar.today(now);
    let this_month = period_totals(orders, calendar.month(today, 0));
    let last_month = period_totals(orders, calendar.month(today, 1));

    SalesSummary {
        this_week: period_totals(orders, calendar.week(today)),
        this_month,
        this_year: period_totals(orders, calendar.year(today)),
        last_month,
        growth_percent: growth_percent(this_month.revenue, last_month.revenue),
        total: all_time(orders),
        average_order_value: average_order_value(orders),
        products: rank_products(orders),
        status_distribution: status_distribution(orders),
        daily: daily_series(orders, now, calendar),
        monthly: monthly_series(orders, now, calendar),
        unique_customers: unique_customers(orders),
    }
}
