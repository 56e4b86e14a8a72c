//! Analytics
//!
//! Pure functions over in-memory order and view collections. Nothing here does
//! I/O or fails: an empty input yields zero counts, zero revenue and `0` growth.
//! Money stays in `Decimal`; timestamps are epoch milliseconds.

pub mod calendar;
pub mod sales;
pub mod views;

pub use calendar::{Calendar, Span};
pub use sales::{
    average_order_value, daily_series, growth_percent, monthly_series, period_totals, rank_products, status_distribution,
    summarize, unique_customers, PeriodTotals, ProductRanking, ProductSales, SalesSummary, SeriesPoint,
};
pub use views::{most_viewed, product_view_report, DayViews, DeviceClass, ViewCount, ViewPeriod, ViewReport};
