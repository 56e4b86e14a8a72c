//! Product view metrics

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::calendar::Calendar;
use crate::domain::aggregates::ProductView;

const MOBILE_MARKERS: [&str; 4] = ["mobile", "android", "iphone", "ipad"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPeriod {
    Today,
    Week,
    Month,
    #[default]
    All,
}

impl ViewPeriod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "today" => Some(Self::Today),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// Earliest included view time: local midnight for today, a rolling
    /// seven or thirty days otherwise.
    pub fn cutoff(&self, now: DateTime<Utc>, calendar: &Calendar) -> Option<i64> {
        match self {
            Self::Today => Some(calendar.midnight(calendar.today(now))),
            Self::Week => Some((now - Duration::days(7)).timestamp_millis()),
            Self::Month => Some((now - Duration::days(30)).timestamp_millis()),
            Self::All => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Desktop,
}

impl DeviceClass {
    /// Substring test on the lowercased user agent. A missing agent counts as desktop.
    pub fn classify(user_agent: Option<&str>) -> Self {
        let agent = user_agent.unwrap_or_default().to_ascii_lowercase();
        if MOBILE_MARKERS.iter().any(|m| agent.contains(m)) { Self::Mobile } else { Self::Desktop }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mobile => write!(f, "mobile"),
            Self::Desktop => write!(f, "desktop"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewCount {
    pub product_id: String,
    pub product_name: String,
    pub views: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayViews {
    pub date: NaiveDate,
    pub label: String,
    pub total: usize,
    pub mobile: usize,
    pub desktop: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewReport {
    pub product_id: String,
    pub period: ViewPeriod,
    pub total: usize,
    pub mobile: usize,
    pub desktop: usize,
    /// Newest day first. Days without views are omitted.
    pub days: Vec<DayViews>,
}

/// Products ranked by number of views, most viewed first; ties keep first-seen order.
pub fn most_viewed(views: &[ProductView], limit: usize) -> Vec<ViewCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<ViewCount> = Vec::new();
    for view in views {
        let slot = *index.entry(view.product_id.as_str()).or_insert_with(|| {
            counts.push(ViewCount { product_id: view.product_id.clone(), product_name: view.product_name.clone(), views: 0 });
            counts.len() - 1
        });
        counts[slot].views += 1;
    }
    counts.sort_by(|a, b| b.views.cmp(&a.views));
    counts.truncate(limit);
    counts
}

/// Per-day breakdown of one product's views inside `period`.
pub fn product_view_report(views: &[ProductView], product_id: &str, period: ViewPeriod, now: DateTime<Utc>, calendar: &Calendar) -> ViewReport {
    let cutoff = period.cutoff(now, calendar);
    let mut days: HashMap<NaiveDate, DayViews> = HashMap::new();
    let mut report = ViewReport { product_id: product_id.to_string(), period, total: 0, mobile: 0, desktop: 0, days: Vec::new() };

    let selected = views
        .iter()
        .filter(|v| v.product_id == product_id)
        .filter(|v| cutoff.map_or(true, |c| v.viewed_at >= c));
    for view in selected {
        let Some(date) = calendar.local_date(view.viewed_at) else { continue };
        let day = days.entry(date).or_insert_with(|| DayViews {
            date,
            label: date.format("%d.%m.").to_string(),
            total: 0,
            mobile: 0,
            desktop: 0,
        });
        day.total += 1;
        report.total += 1;
        match DeviceClass::classify(view.user_agent.as_deref()) {
            DeviceClass::Mobile => {
                day.mobile += 1;
                report.mobile += 1;
            }
            DeviceClass::Desktop => {
                day.desktop += 1;
                report.desktop += 1;
            }
        }
    }

    report.days = days.into_values().collect();
    report.days.sort_by(|a, b| b.date.cmp(&a.date));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn view(product_id: &str, at: DateTime<Utc>, agent: Option<&str>) -> ProductView {
        ProductView {
            product_id: product_id.into(),
            product_name: format!("name {product_id}"),
            viewed_at: at.timestamp_millis(),
            user_agent: agent.map(str::to_string),
            ..Default::default()
        }
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap() }

    #[test]
    fn test_device_classification() {
        assert_eq!(DeviceClass::classify(Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)")), DeviceClass::Mobile);
        assert_eq!(DeviceClass::classify(Some("Mozilla/5.0 (Linux; Android 14)")), DeviceClass::Mobile);
        assert_eq!(DeviceClass::classify(Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")), DeviceClass::Desktop);
        assert_eq!(DeviceClass::classify(None), DeviceClass::Desktop);
    }

    #[test]
    fn test_most_viewed() {
        let views = vec![view("p1", at(1, 1), None), view("p2", at(1, 2), None), view("p2", at(1, 3), None), view("p3", at(1, 4), None)];
        let ranked = most_viewed(&views, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!((ranked[0].product_id.as_str(), ranked[0].views), ("p2", 2));
        assert_eq!(ranked[1].product_id, "p1");
        assert!(most_viewed(&[], 5).is_empty());
    }

    #[test]
    fn test_report_groups_by_day_newest_first() {
        let views = vec![
            view("p1", at(10, 9), Some("iPad")),
            view("p1", at(12, 8), None),
            view("p1", at(12, 20), Some("Android")),
            view("p2", at(12, 20), None),
            view("p1", at(1, 12), None),
        ];
        let now = at(12, 22);
        let cal = Calendar::default();

        let week = product_view_report(&views, "p1", ViewPeriod::Week, now, &cal);
        assert_eq!(week.total, 3);
        assert_eq!(week.mobile, 2);
        assert_eq!(week.days.len(), 2);
        assert_eq!(week.days[0].label, "12.03.");
        assert_eq!((week.days[0].total, week.days[0].mobile, week.days[0].desktop), (2, 1, 1));

        let today = product_view_report(&views, "p1", ViewPeriod::Today, now, &cal);
        assert_eq!(today.total, 2);

        let all = product_view_report(&views, "p1", ViewPeriod::All, now, &cal);
        assert_eq!(all.total, 4);
        assert_eq!(all.days.last().map(|d| d.date), NaiveDate::from_ymd_opt(2024, 3, 1));
    }
}
