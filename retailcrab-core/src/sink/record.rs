use super::*;

/// One output row: an ordered field -> value mapping.
pub type Record = serde_json::Map<String, Value>;

/// The three logical output contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputStream {
    /// invoice_no, country, timestamp, total_cost, total_items, is_order, is_return
    RawEvents,
    /// window_start, window_end, order_count, total_sales_volume, avg_transaction_size, return_rate
    GlobalKpi,
    /// window_start, window_end, country, order_count, total_sales_volume, return_rate
    CountryKpi,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RawEvents => "raw-events",
            Self::GlobalKpi => "global-kpi",
            Self::CountryKpi => "country-kpi",
        };
        f.write_str(name)
    }
}

pub fn raw_event_record(event: &EnrichedEvent) -> Record {
    let mut record = Record::new();
    record.insert("invoice_no".into(), event.event.invoice_no.into());
    record.insert("country".into(), event.event.country.clone().into());
    record.insert("timestamp".into(), format_event_time(event.timestamp()).into());
    record.insert("total_cost".into(), event.total_cost.into());
    record.insert("total_items".into(), event.total_items.into());
    record.insert("is_order".into(), event.is_order.into());
    record.insert("is_return".into(), event.is_return.into());
    record
}

pub fn global_kpi_record(result: &WindowResult<(), KpiSummary>) -> Record {
    let mut record = Record::new();
    record.insert("window_start".into(), format_event_time(result.window.start).into());
    record.insert("window_end".into(), format_event_time(result.window.end).into());
    record.insert("order_count".into(), result.value.order_count.into());
    record.insert("total_sales_volume".into(), result.value.total_sales_volume.into());
    record.insert("avg_transaction_size".into(), result.value.avg_transaction_size.into());
    record.insert("return_rate".into(), result.value.return_rate.into());
    record
}

pub fn country_kpi_record(result: &WindowResult<String, KpiSummary>) -> Record {
    let mut record = Record::new();
    record.insert("window_start".into(), format_event_time(result.window.start).into());
    record.insert("window_end".into(), format_event_time(result.window.end).into());
    record.insert("country".into(), result.key.clone().into());
    record.insert("order_count".into(), result.value.order_count.into());
    record.insert("total_sales_volume".into(), result.value.total_sales_volume.into());
    record.insert("return_rate".into(), result.value.return_rate.into());
    record
}

/// Everything one micro-batch produced, grouped by output stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutput {
    pub raw_events: Vec<Record>,
    pub global_kpis: Vec<Record>,
    pub country_kpis: Vec<Record>,
}

impl BatchOutput {
    pub fn records(&self, stream: OutputStream) -> &[Record] {
        match stream {
            OutputStream::RawEvents => &self.raw_events,
            OutputStream::GlobalKpi => &self.global_kpis,
            OutputStream::CountryKpi => &self.country_kpis,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw_events.is_empty() && self.global_kpis.is_empty() && self.country_kpis.is_empty()
    }
}
