use tracing::{Span, field};

use super::TraceId;

/// Root span for one job invocation (ingestion cycle, evaluation cycle,
/// one dispatch). Unit-level fields are filled in later via [`annotate_span`].
pub fn job_span(job: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "job",
        job = %job,
        trace_id = %trace_id.as_str(),
        stock = field::Empty,
        alert_id = field::Empty
    )
}

pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!(
        "child",
        name = %name,
        stock = field::Empty,
        alert_id = field::Empty
    )
}

/// Records the unit currently being processed on the active span.
pub fn annotate_span(stock: Option<&str>, alert_id: Option<&dyn std::fmt::Display>) {
    let span = Span::current();
    if let Some(symbol) = stock {
        span.record("stock", field::display(symbol));
    }
    if let Some(id) = alert_id {
        span.record("alert_id", field::display(id));
    }
}
