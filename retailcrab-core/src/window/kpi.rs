use super::*;

/// Running KPI state for one `(window, key)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiAccumulator {
    /// Number of invoices, orders and returns alike.
    pub count: u64,
    pub total_cost: f64,
    pub returns: u64,
}

/// Finalized KPIs for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub order_count: u64,
    pub total_sales_volume: f64,
    pub avg_transaction_size: f64,
    pub return_rate: f64,
}

/// count / sum / average / rate-of-return over enriched events.
///
/// Averages are sum divided by count at emission time, never a running mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct KpiAggregate;

impl AggregateFunction<EnrichedEvent, KpiAccumulator, KpiSummary> for KpiAggregate {
    fn create_accumulator(&self) -> KpiAccumulator {
        KpiAccumulator::default()
    }

    fn add(&self, acc: &mut KpiAccumulator, element: &EnrichedEvent) {
        acc.count += 1;
        acc.total_cost += element.total_cost;
        acc.returns += u64::from(element.is_return);
    }

    fn get_result(&self, acc: KpiAccumulator) -> KpiSummary {
        let (avg_transaction_size, return_rate) = if acc.count == 0 {
            (0.0, 0.0)
        } else {
            let n = acc.count as f64;
            (acc.total_cost / n, acc.returns as f64 / n)
        };
        KpiSummary {
            order_count: acc.count,
            total_sales_volume: acc.total_cost,
            avg_transaction_size,
            return_rate,
        }
    }
}

pub type GlobalKeyFn = fn(&EnrichedEvent);
pub type CountryKeyFn = fn(&EnrichedEvent) -> String;

/// Time-only KPIs.
pub type GlobalKpiAggregator =
    WindowAggregator<(), EnrichedEvent, KpiAccumulator, KpiSummary, GlobalKeyFn, KpiAggregate>;

/// Time and country KPIs.
pub type CountryKpiAggregator =
    WindowAggregator<String, EnrichedEvent, KpiAccumulator, KpiSummary, CountryKeyFn, KpiAggregate>;

fn global_key(_event: &EnrichedEvent) {}

fn country_key(event: &EnrichedEvent) -> String {
    event.country().to_string()
}

pub fn global_kpi_aggregator(window_size: Duration, allowed_lateness: Duration) -> GlobalKpiAggregator {
    WindowAggregator::new(
        global_key as GlobalKeyFn,
        TumblingEventTimeWindows::of(window_size),
        KpiAggregate,
        allowed_lateness,
    )
}

pub fn country_kpi_aggregator(
    window_size: Duration,
    allowed_lateness: Duration,
) -> CountryKpiAggregator {
    WindowAggregator::new(
        country_key as CountryKeyFn,
        TumblingEventTimeWindows::of(window_size),
        KpiAggregate,
        allowed_lateness,
    )
}
