//! Automatic quote generation.
//!
//! [`generate_auto_quotes`] is a pure function: given the open RFQs, the product catalogue, the margin table and a
//! clock reading, it decides which RFQs are due for an automatic quote and prices them. Persisting the result is the
//! job of [`crate::AutoQuoteApi`].
//!
//! Pricing rules:
//! * The effective margin for an item is the larger of its category margin and the global default.
//! * `unit_price = supplier_unit_price × (1 + margin/100)`, rounded to the nearest minor unit, half away from zero.
//! * `line_total = unit_price × quantity`, and a quote's `final_price` is the sum of its line totals.
//! * A quote's `margin_percent` is the average of its item margins, weighted by supplier line value.
//! * One quote is produced per supplier per RFQ.
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::db_types::{MarginSetting, Money, NewQuote, NewQuoteItem, Product, QuoteStatus, QuoteType, Rfq, RfqStatus};

pub const DEFAULT_DELAY_MINUTES: i64 = 30;
pub const DEFAULT_LEAD_TIME_DAYS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoQuoteConfig {
    pub enabled: bool,
    /// How long an RFQ must stay open before it is quoted automatically.
    pub delay_minutes: i64,
    pub include_limited_stock: bool,
    /// Quoted lead time. Missing or non-positive values fall back to [`DEFAULT_LEAD_TIME_DAYS`].
    pub lead_time_days: Option<i64>,
}

impl Default for AutoQuoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_minutes: DEFAULT_DELAY_MINUTES,
            include_limited_stock: false,
            lead_time_days: Some(DEFAULT_LEAD_TIME_DAYS),
        }
    }
}

impl AutoQuoteConfig {
    pub fn lead_time(&self) -> String {
        let days = self.lead_time_days.filter(|d| *d > 0).unwrap_or(DEFAULT_LEAD_TIME_DAYS);
        format!("{days} days")
    }
}

/// Category margins plus the global default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarginTable {
    pub global_default: f64,
    pub categories: HashMap<String, f64>,
}

impl MarginTable {
    pub fn new(global_default: f64) -> Self {
        Self { global_default, categories: HashMap::new() }
    }

    pub fn with_category<S: Into<String>>(mut self, category: S, margin: f64) -> Self {
        self.categories.insert(category.into(), margin);
        self
    }

    /// Builds the table from stored settings. The setting without a category is the global default. If there is
    /// none, the default is zero.
    pub fn from_settings(settings: &[MarginSetting]) -> Self {
        let mut table = Self::default();
        let mut has_default = false;
        for setting in settings {
            match &setting.category {
                Some(category) => {
                    table.categories.insert(category.clone(), setting.margin_percent);
                },
                None => {
                    table.global_default = setting.margin_percent;
                    has_default = true;
                },
            }
        }
        if !has_default {
            warn!("🤖️ No global margin is configured. Auto-quotes will use 0% for uncategorised products.");
        }
        table
    }

    pub fn effective_margin(&self, category: Option<&str>) -> f64 {
        let category_margin = category.and_then(|c| self.categories.get(c)).copied().unwrap_or(f64::MIN);
        round_percent(category_margin.max(self.global_default))
    }
}

/// The output for a single RFQ. Every RFQ in the output must be marked as triggered, even if `quotes` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RfqQuotes {
    pub rfq_id: i64,
    pub quotes: Vec<NewQuote>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoQuoteOutput {
    pub rfqs: Vec<RfqQuotes>,
}

impl AutoQuoteOutput {
    pub fn triggered_rfqs(&self) -> Vec<i64> {
        self.rfqs.iter().map(|r| r.rfq_id).collect()
    }

    pub fn quotes(&self) -> impl Iterator<Item = &NewQuote> {
        self.rfqs.iter().flat_map(|r| r.quotes.iter())
    }
}

/// Scans `rfqs` and produces quotes for every open, untriggered RFQ that has waited at least `delay_minutes`.
pub fn generate_auto_quotes(
    rfqs: &[Rfq],
    products: &HashMap<i64, Product>,
    margins: &MarginTable,
    config: &AutoQuoteConfig,
    now: DateTime<Utc>,
) -> AutoQuoteOutput {
    let mut output = AutoQuoteOutput::default();
    if !config.enabled {
        trace!("🤖️ Auto-quoting is disabled");
        return output;
    }
    for rfq in rfqs {
        if rfq.status != RfqStatus::Open || rfq.auto_quote_triggered {
            continue;
        }
        let elapsed = (now - rfq.created_at).num_minutes();
        if elapsed < config.delay_minutes {
            trace!("🤖️ RFQ #{} is {elapsed} minutes old. Not due for an auto-quote yet.", rfq.id);
            continue;
        }
        let quotes = quote_rfq(rfq, products, margins, config);
        debug!("🤖️ RFQ #{} is due for auto-quoting. {} quote(s) generated.", rfq.id, quotes.len());
        output.rfqs.push(RfqQuotes { rfq_id: rfq.id, quotes });
    }
    output
}

fn quote_rfq(rfq: &Rfq, products: &HashMap<i64, Product>, margins: &MarginTable, config: &AutoQuoteConfig) -> Vec<NewQuote> {
    let mut by_supplier = BTreeMap::<i64, Vec<NewQuoteItem>>::new();
    for item in &rfq.items {
        let Some(product) = products.get(&item.product_id) else {
            debug!("🤖️ Product {} on RFQ #{} does not exist. Skipping it.", item.product_id, rfq.id);
            continue;
        };
        if !is_quotable(product, item.quantity, config.include_limited_stock) {
            debug!(
                "🤖️ Product {} on RFQ #{} cannot be quoted ({}, stock {:?}). Skipping it.",
                product.id, rfq.id, product.availability, product.stock
            );
            continue;
        }
        let margin = margins.effective_margin(product.category.as_deref());
        let unit_price = match product.supplier_price.with_margin(margin) {
            Ok(p) => p,
            Err(e) => {
                warn!("🤖️ Could not price product {} on RFQ #{}: {e}", product.id, rfq.id);
                continue;
            },
        };
        by_supplier.entry(product.supplier_id).or_default().push(NewQuoteItem {
            product_id: product.id,
            quantity: item.quantity,
            supplier_unit_price: product.supplier_price,
            margin_percent: margin,
            unit_price,
            line_total: unit_price * item.quantity,
            is_alternative: false,
        });
    }
    by_supplier
        .into_iter()
        .map(|(supplier_id, items)| {
            let supplier_price = items.iter().map(|i| i.supplier_unit_price * i.quantity).sum::<Money>();
            let final_price = items.iter().map(|i| i.line_total).sum::<Money>();
            let margin_percent = weighted_margin(&items, margins.global_default);
            NewQuote {
                rfq_id: rfq.id,
                supplier_id,
                supplier_price,
                margin_percent,
                final_price,
                lead_time: config.lead_time(),
                quote_type: QuoteType::Auto,
                status: QuoteStatus::SentToClient,
                items,
            }
        })
        .collect()
}

fn is_quotable(product: &Product, quantity: i64, include_limited_stock: bool) -> bool {
    use crate::db_types::Availability;
    if quantity <= 0 || product.availability == Availability::OutOfStock {
        return false;
    }
    if matches!(product.stock, Some(s) if s <= 0) {
        return false;
    }
    let short = product.stock.map(|s| s < quantity).unwrap_or(false);
    include_limited_stock || !(product.availability.is_limited() || short)
}

fn weighted_margin(items: &[NewQuoteItem], global_default: f64) -> f64 {
    let (weighted, total) = items.iter().fold((0.0, 0i64), |(weighted, total), item| {
        let value = (item.supplier_unit_price * item.quantity).value();
        (weighted + value as f64 * item.margin_percent, total + value)
    });
    if total == 0 {
        return round_percent(global_default);
    }
    round_percent(weighted / total as f64)
}

/// Rounds a percentage to 2 decimal places, half away from zero.
pub fn round_percent(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;
    use crate::db_types::{Availability, RfqItem};

    fn product(id: i64, supplier_id: i64, price: i64, category: &str) -> Product {
        Product {
            id,
            name: format!("Product {id}"),
            supplier_id,
            category: Some(category.to_string()),
            supplier_price: Money::from(price),
            availability: Availability::InStock,
            stock: None,
        }
    }

    fn rfq(id: i64, created_at: DateTime<Utc>, items: &[(i64, i64)]) -> Rfq {
        Rfq {
            id,
            client_id: 100,
            status: RfqStatus::Open,
            auto_quote_triggered: false,
            created_at,
            items: items
                .iter()
                .enumerate()
                .map(|(i, (product_id, quantity))| RfqItem {
                    id: i as i64 + 1,
                    rfq_id: id,
                    product_id: *product_id,
                    quantity: *quantity,
                    notes: None,
                    flexibility: None,
                })
                .collect(),
        }
    }

    fn catalogue(products: Vec<Product>) -> HashMap<i64, Product> {
        products.into_iter().map(|p| (p.id, p)).collect()
    }

    fn enabled() -> AutoQuoteConfig {
        AutoQuoteConfig { enabled: true, ..Default::default() }
    }

    #[test]
    fn disabled_engine_does_nothing() {
        let now = Utc::now();
        let rfqs = vec![rfq(1, now - Duration::hours(2), &[(1, 1)])];
        let products = catalogue(vec![product(1, 10, 100, "tools")]);
        let output = generate_auto_quotes(&rfqs, &products, &MarginTable::new(5.0), &AutoQuoteConfig::default(), now);
        assert!(output.rfqs.is_empty());
    }

    #[test]
    fn single_supplier_quote() {
        let now = Utc::now();
        let rfqs = vec![rfq(1, now - Duration::minutes(45), &[(1, 5), (2, 2)])];
        let products = catalogue(vec![product(1, 10, 100, "tools"), product(2, 10, 50, "tools")]);
        let margins = MarginTable::new(5.0).with_category("tools", 10.0);
        let output = generate_auto_quotes(&rfqs, &products, &margins, &enabled(), now);
        assert_eq!(output.triggered_rfqs(), vec![1]);
        let quotes = output.quotes().collect::<Vec<_>>();
        assert_eq!(quotes.len(), 1);
        let quote = quotes[0];
        assert_eq!(quote.supplier_id, 10);
        assert_eq!(quote.supplier_price, Money::from(600));
        assert_eq!(quote.final_price, Money::from(660));
        assert_eq!(quote.margin_percent, 10.0);
        assert_eq!(quote.lead_time, "3 days");
        assert_eq!(quote.quote_type, QuoteType::Auto);
        assert_eq!(quote.status, QuoteStatus::SentToClient);
        assert_eq!(quote.items[0].unit_price, Money::from(110));
        assert_eq!(quote.items[0].line_total, Money::from(550));
        assert_eq!(quote.items[1].unit_price, Money::from(55));
        assert_eq!(quote.items[1].line_total, Money::from(110));
    }

    #[test]
    fn global_default_wins_over_lower_category_margin() {
        let now = Utc::now();
        let rfqs = vec![rfq(1, now - Duration::minutes(30), &[(1, 1)])];
        let products = catalogue(vec![product(1, 10, 1000, "bulk")]);
        let margins = MarginTable::new(12.5).with_category("bulk", 4.0);
        let output = generate_auto_quotes(&rfqs, &products, &margins, &enabled(), now);
        let quote = output.quotes().next().unwrap();
        assert_eq!(quote.items[0].margin_percent, 12.5);
        assert_eq!(quote.final_price, Money::from(1125));
    }

    #[test]
    fn one_quote_per_supplier_with_weighted_margin() {
        let now = Utc::now();
        let rfqs = vec![rfq(7, now - Duration::days(1), &[(1, 1), (2, 3), (3, 1)])];
        let products =
            catalogue(vec![product(1, 10, 1000, "tools"), product(2, 20, 200, "paint"), product(3, 10, 3000, "paint")]);
        let margins = MarginTable::new(5.0).with_category("tools", 20.0);
        let output = generate_auto_quotes(&rfqs, &products, &margins, &enabled(), now);
        let quotes = output.quotes().collect::<Vec<_>>();
        assert_eq!(quotes.len(), 2);
        let first = quotes[0];
        assert_eq!(first.supplier_id, 10);
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.supplier_price, Money::from(4000));
        assert_eq!(first.final_price, Money::from(1200 + 3150));
        // (1000 * 20 + 3000 * 5) / 4000
        assert_eq!(first.margin_percent, 8.75);
        let second = quotes[1];
        assert_eq!(second.supplier_id, 20);
        assert_eq!(second.final_price, Money::from(630));
        assert_eq!(second.margin_percent, 5.0);
    }

    #[test]
    fn rfqs_that_are_too_young_or_already_handled_are_ignored() {
        let now = Utc::now();
        let mut triggered = rfq(2, now - Duration::hours(3), &[(1, 1)]);
        triggered.auto_quote_triggered = true;
        let mut closed = rfq(3, now - Duration::hours(3), &[(1, 1)]);
        closed.status = RfqStatus::Quoted;
        let rfqs = vec![rfq(1, now - Duration::minutes(29), &[(1, 1)]), triggered, closed];
        let products = catalogue(vec![product(1, 10, 100, "tools")]);
        let output = generate_auto_quotes(&rfqs, &products, &MarginTable::new(5.0), &enabled(), now);
        assert!(output.rfqs.is_empty());
    }

    #[test]
    fn out_of_stock_only_rfq_is_triggered_without_quotes() {
        let now = Utc::now();
        let mut gone = product(1, 10, 100, "tools");
        gone.availability = Availability::OutOfStock;
        let mut empty = product(2, 10, 100, "tools");
        empty.stock = Some(0);
        let rfqs = vec![rfq(1, now - Duration::hours(1), &[(1, 1), (2, 1), (99, 1)])];
        let output = generate_auto_quotes(&rfqs, &catalogue(vec![gone, empty]), &MarginTable::new(5.0), &enabled(), now);
        assert_eq!(output.triggered_rfqs(), vec![1]);
        assert_eq!(output.quotes().count(), 0);
    }

    #[test]
    fn limited_stock_needs_opt_in() {
        let now = Utc::now();
        let mut limited = product(1, 10, 100, "tools");
        limited.availability = Availability::LimitedStock;
        let mut short = product(2, 10, 100, "tools");
        short.stock = Some(3);
        let products = catalogue(vec![limited, short]);
        let rfqs = vec![rfq(1, now - Duration::hours(1), &[(1, 1), (2, 5)])];
        let margins = MarginTable::new(0.0);

        let output = generate_auto_quotes(&rfqs, &products, &margins, &enabled(), now);
        assert_eq!(output.quotes().count(), 0);

        let config = AutoQuoteConfig { include_limited_stock: true, ..enabled() };
        let output = generate_auto_quotes(&rfqs, &products, &margins, &config, now);
        let quote = output.quotes().next().unwrap();
        assert_eq!(quote.items.len(), 2);
        assert_eq!(quote.final_price, Money::from(600));
    }

    #[test]
    fn rounding() {
        assert_eq!(round_percent(10.125), 10.13);
        assert_eq!(round_percent(-2.375), -2.38);
        assert_eq!(round_percent(7.0), 7.0);
        let now = Utc::now();
        // 333 * 1.15 = 382.95
        let rfqs = vec![rfq(1, now - Duration::hours(1), &[(1, 3)])];
        let products = catalogue(vec![product(1, 10, 333, "tools")]);
        let output = generate_auto_quotes(&rfqs, &products, &MarginTable::new(15.0), &enabled(), now);
        let quote = output.quotes().next().unwrap();
        assert_eq!(quote.items[0].unit_price, Money::from(383));
        assert_eq!(quote.final_price, Money::from(1149));
    }

    #[test]
    fn lead_time() {
        let config = AutoQuoteConfig { lead_time_days: Some(7), ..Default::default() };
        assert_eq!(config.lead_time(), "7 days");
        let config = AutoQuoteConfig { lead_time_days: Some(0), ..Default::default() };
        assert_eq!(config.lead_time(), "3 days");
        let config = AutoQuoteConfig { lead_time_days: None, ..Default::default() };
        assert_eq!(config.lead_time(), "3 days");
    }

    #[test]
    fn margin_table_from_settings() {
        let settings = vec![
            MarginSetting { id: 1, category: None, margin_percent: 7.5 },
            MarginSetting { id: 2, category: Some("tools".into()), margin_percent: 12.0 },
        ];
        let table = MarginTable::from_settings(&settings);
        assert_eq!(table.effective_margin(Some("tools")), 12.0);
        assert_eq!(table.effective_margin(Some("paint")), 7.5);
        assert_eq!(table.effective_margin(None), 7.5);
    }
}
